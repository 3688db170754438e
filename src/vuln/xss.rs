// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! XSS exercises: reflected search and a stored comment board.
//!
//! Each tier applies one deliberately inadequate sanitizer before the
//! input is interpolated into an HTML fragment:
//!
//! - basic: no output encoding at all.
//! - medium: strips the literal lowercase `<script>` / `</script>` pair;
//!   `<SCRIPT>`, `<script src=...>`, and event handlers pass.
//! - hard: strips `javascript:` and `onerror=` only; plain script tags
//!   pass untouched.
//! - expert: strips complete `<script ...>...</script>` blocks
//!   case-insensitively; unterminated tags, nested-tag splicing, and
//!   event handlers pass.
//!
//! The response carries the rendered fragment plus which attack markers
//! survived sanitization, so a lab client can verify the bypass without
//! a browser.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::{contains_ci, find_ci, VulnLevel};

// ===== Reports =====

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct XssReport {
    pub level: VulnLevel,
    /// The HTML fragment as it would be served.
    pub html: String,
    pub injection_detected: bool,
    /// Attack markers still present after sanitization.
    pub surviving_markers: Vec<String>,
}

/// One stored comment, kept with its raw input so different tiers can
/// re-render it.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StoredComment {
    pub id: u64,
    pub username: String,
    pub comment: String,
    pub level: VulnLevel,
    pub created_at: DateTime<Utc>,
}

/// In-memory comment board for the stored-XSS exercise.
#[derive(Debug, Default)]
pub struct CommentBoard {
    next_id: u64,
    comments: Vec<StoredComment>,
}

impl CommentBoard {
    /// Store a comment as submitted. Sanitization happens at render
    /// time, which is exactly the mistake being demonstrated.
    pub fn post(&mut self, username: &str, comment: &str, level: VulnLevel) -> StoredComment {
        self.next_id += 1;
        let stored = StoredComment {
            id: self.next_id,
            username: username.to_string(),
            comment: comment.to_string(),
            level,
            created_at: Utc::now(),
        };
        self.comments.push(stored.clone());
        stored
    }

    pub fn comments(&self) -> &[StoredComment] {
        &self.comments
    }

    pub fn clear(&mut self) {
        self.comments.clear();
    }
}

// ===== Entry points =====

/// Reflected XSS: the search term lands in the result heading.
pub fn reflected_search(level: VulnLevel, query: &str) -> XssReport {
    let sanitized = sanitize(level, query);
    report(level, format!("<h1>Search Results for: {sanitized}</h1>"), query)
}

/// Stored XSS: render one comment the way the board would serve it.
pub fn render_comment(comment: &StoredComment) -> XssReport {
    let sanitized = sanitize(comment.level, &comment.comment);
    report(
        comment.level,
        format!(
            "<div class='comment'>User {} says: {}</div>",
            comment.username, sanitized
        ),
        &comment.comment,
    )
}

fn report(level: VulnLevel, html: String, raw_input: &str) -> XssReport {
    XssReport {
        level,
        injection_detected: looks_injected(raw_input),
        surviving_markers: surviving_markers(&html),
        html,
    }
}

// ===== Sanitizers =====

fn sanitize(level: VulnLevel, input: &str) -> String {
    match level {
        VulnLevel::Basic => input.to_string(),
        VulnLevel::Medium => input.replace("<script>", "").replace("</script>", ""),
        VulnLevel::Hard => strip_ci(&strip_ci(input, "javascript:"), "onerror="),
        VulnLevel::Expert => strip_script_blocks(input),
    }
}

/// Remove every case-insensitive occurrence of `needle`.
fn strip_ci(input: &str, needle: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(pos) = find_ci(rest, needle) {
        out.push_str(&rest[..pos]);
        rest = &rest[pos + needle.len()..];
    }
    out.push_str(rest);
    out
}

/// Remove complete `<script ...>...</script>` blocks, case-insensitively
/// and non-greedily. An unterminated opening tag is left alone, which is
/// the expert-tier bypass.
fn strip_script_blocks(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    loop {
        let Some(open) = find_ci(rest, "<script") else {
            break;
        };
        let after_open = &rest[open + "<script".len()..];
        let Some(tag_end) = after_open.find('>') else {
            break;
        };
        let body = &after_open[tag_end + 1..];
        let Some(close) = find_ci(body, "</script>") else {
            break;
        };
        out.push_str(&rest[..open]);
        rest = &body[close + "</script>".len()..];
    }
    out.push_str(rest);
    out
}

fn looks_injected(input: &str) -> bool {
    contains_ci(input, "<script")
        || contains_ci(input, "javascript:")
        || contains_ci(input, "onerror")
        || contains_ci(input, "onload")
        || contains_ci(input, "<img")
        || contains_ci(input, "<svg")
        || contains_ci(input, "<iframe")
}

/// Which recognizable attack markers made it into the output.
fn surviving_markers(html: &str) -> Vec<String> {
    ["<script", "javascript:", "onerror=", "onload=", "<img", "<svg", "<iframe"]
        .into_iter()
        .filter(|marker| contains_ci(html, marker))
        .map(str::to_string)
        .collect()
}
