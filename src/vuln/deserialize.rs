// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Insecure deserialization exercises over type-tagged JSON payloads.
//!
//! A payload object carrying `__type__` is treated as a gadget and
//! dispatched instead of being loaded as data. Dispatch is simulated:
//! the report records what each gadget would have done, and no command
//! runs, no file is read, no socket opens.
//!
//! Tier ladder:
//! - basic: `command` gadgets dispatch.
//! - medium: `base64` wrappers are decoded and their payload re-dispatched.
//! - hard: `chain` gadgets run their members in sequence.
//! - expert: `file` and `connect` gadgets dispatch.
//!
//! [`load_safe`] is the comparison point: a strict loader that rejects
//! any document containing a `__type__` tag at any depth.

use base64ct::{Base64, Encoding};
use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;

use super::VulnLevel;

/// Nesting bound for wrappers and chains.
const MAX_DEPTH: usize = 8;

/// What a dispatched gadget would have done.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "snake_case", tag = "kind", content = "detail")]
pub enum GadgetEffect {
    /// A shell command would have executed.
    CommandExecution(String),
    /// A host file would have been read.
    FileRead(String),
    /// An outbound connection would have opened.
    NetworkConnect(String),
    /// A wrapped payload was decoded and re-dispatched.
    Base64Unwrapped(usize),
    /// A gadget chain ran this many members.
    ChainDispatched(usize),
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DeserializeReport {
    pub level: VulnLevel,
    /// Effects of every gadget that dispatched, in dispatch order.
    pub effects: Vec<GadgetEffect>,
    /// Gadget tags the tier refused to dispatch.
    pub refused: Vec<String>,
    pub injection_detected: bool,
    /// The document loaded as plain data, when it carried no gadget.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of the strict comparison loader.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SafeLoadReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Deserialize `raw` at the given tier, dispatching whatever gadgets
/// the tier permits.
pub fn load(level: VulnLevel, raw: &str) -> DeserializeReport {
    let mut report = DeserializeReport {
        level,
        effects: Vec::new(),
        refused: Vec::new(),
        injection_detected: false,
        data: None,
        error: None,
    };
    match serde_json::from_str::<Value>(raw) {
        Ok(value) => {
            let data = dispatch(level, &value, 0, &mut report);
            report.injection_detected = !report.effects.is_empty() || !report.refused.is_empty();
            report.data = data;
        }
        Err(err) => report.error = Some(err.to_string()),
    }
    report
}

/// The strict loader: any `__type__` tag anywhere makes the document
/// unloadable.
pub fn load_safe(raw: &str) -> SafeLoadReport {
    match serde_json::from_str::<Value>(raw) {
        Ok(value) if contains_type_tag(&value) => SafeLoadReport {
            data: None,
            error: Some("type-tagged objects are not allowed".to_string()),
        },
        Ok(value) => SafeLoadReport {
            data: Some(value),
            error: None,
        },
        Err(err) => SafeLoadReport {
            data: None,
            error: Some(err.to_string()),
        },
    }
}

/// Dispatch one value. Returns the value as plain data when it carries
/// no gadget tag, `None` when a gadget consumed it.
fn dispatch(
    level: VulnLevel,
    value: &Value,
    depth: usize,
    report: &mut DeserializeReport,
) -> Option<Value> {
    if depth > MAX_DEPTH {
        report.error = Some("payload nesting too deep".to_string());
        return None;
    }
    let Some(tag) = value.get("__type__").and_then(Value::as_str) else {
        return Some(value.clone());
    };

    match tag {
        "command" => {
            let command = string_field(value, "command");
            report.effects.push(GadgetEffect::CommandExecution(command));
        }
        "base64" if level >= VulnLevel::Medium => {
            let encoded = string_field(value, "payload");
            match Base64::decode_vec(&encoded)
                .ok()
                .and_then(|bytes| String::from_utf8(bytes).ok())
            {
                Some(inner) => match serde_json::from_str::<Value>(&inner) {
                    Ok(inner) => {
                        report.effects.push(GadgetEffect::Base64Unwrapped(depth + 1));
                        dispatch(level, &inner, depth + 1, report);
                    }
                    Err(err) => report.error = Some(err.to_string()),
                },
                None => report.error = Some("payload is not valid base64".to_string()),
            }
        }
        "chain" if level >= VulnLevel::Hard => {
            let members = value
                .get("gadgets")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            report.effects.push(GadgetEffect::ChainDispatched(members.len()));
            for member in &members {
                dispatch(level, member, depth + 1, report);
            }
        }
        "file" if level >= VulnLevel::Expert => {
            let path = string_field(value, "path");
            report.effects.push(GadgetEffect::FileRead(path));
        }
        "connect" if level >= VulnLevel::Expert => {
            let host = string_field(value, "host");
            let port = value.get("port").and_then(Value::as_u64).unwrap_or(4444);
            report
                .effects
                .push(GadgetEffect::NetworkConnect(format!("{host}:{port}")));
        }
        other => report.refused.push(other.to_string()),
    }
    None
}

fn string_field(value: &Value, field: &str) -> String {
    value
        .get(field)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn contains_type_tag(value: &Value) -> bool {
    match value {
        Value::Object(map) => {
            map.contains_key("__type__") || map.values().any(contains_type_tag)
        }
        Value::Array(items) => items.iter().any(contains_type_tag),
        _ => false,
    }
}
