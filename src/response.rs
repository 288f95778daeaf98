//! Response cleanup
//!
//! Specialists are told to answer in prose, but models still wrap answers in
//! JSON envelopes like `{"dsa_agent_response": {...}}`. These helpers unwrap
//! them before text reaches the user.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashSet;

use crate::agent::{Event, EventKind};

static GUEST_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)guest_[a-f0-9]{6}").unwrap());

/// Clean a single response text, returning the input when nothing applies
pub fn clean_response(text: &str) -> String {
    try_parse_json_wrapper(text).unwrap_or_else(|| text.to_string())
}

/// Try to extract content from a JSON-wrapped response.
/// Returns None when the text is not a JSON object.
pub fn try_parse_json_wrapper(text: &str) -> Option<String> {
    let text = text.trim();
    if !(text.starts_with('{') && text.ends_with('}')) {
        return None;
    }

    let data: Map<String, Value> = serde_json::from_str(text).ok()?;

    if let Some(content) = data.get("dsa_agent_response") {
        if let Value::Object(obj) = content {
            if let Some(explanation) = obj.get("explanation") {
                return Some(value_text(explanation));
            }
            if obj.contains_key("code") {
                return Some(format_code_response(obj));
            }
        }
        return Some(value_text(content));
    }

    for key in ["developer_agent_response", "system_design_agent_response"] {
        if let Some(content) = data.get(key) {
            return Some(value_text(content));
        }
    }

    if data.len() == 1 {
        if let Some(content) = data.get("response") {
            return Some(value_text(content));
        }
    }

    for (key, value) in &data {
        if key.ends_with("_response") {
            if let Some(explanation) = value.get("explanation") {
                return Some(value_text(explanation));
            }
            return Some(value_text(value));
        }
    }

    serde_json::to_string_pretty(&Value::Object(data)).ok()
}

/// Format a code-heavy response with explanation, code and complexity
pub fn format_code_response(data: &Map<String, Value>) -> String {
    let mut output = Vec::new();

    if let Some(explanation) = data.get("explanation") {
        output.push(value_text(explanation));
    }

    if let Some(code) = data.get("code") {
        let lang = data
            .get("language")
            .and_then(|v| v.as_str())
            .unwrap_or("python");
        output.push(format!("```{}\n{}\n```", lang, value_text(code)));
    }

    if let Some(complexity) = data.get("complexity") {
        output.push(format!("**Complexity Analysis:**\n{}", value_text(complexity)));
    }

    output.join("\n\n")
}

/// Strings as-is, everything else as compact JSON
fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Join the text events of a turn into one response: cleaned, trimmed,
/// duplicates dropped, in order.
pub fn collect_response(events: &[Event]) -> Option<String> {
    let mut seen = HashSet::new();
    let mut parts = Vec::new();

    for event in events.iter().filter(|e| e.kind == EventKind::Text) {
        let text = clean_response(event.text.trim());
        if !text.is_empty() && seen.insert(text.clone()) {
            parts.push(text);
        }
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n\n"))
    }
}

/// Author of the last text event in a turn
pub fn last_author(events: &[Event]) -> Option<&str> {
    events
        .iter()
        .rev()
        .find(|e| e.kind == EventKind::Text)
        .map(|e| e.author.as_str())
}

/// First guest ID mentioned in a text, lowercased
pub fn extract_guest_id(text: &str) -> Option<String> {
    GUEST_ID_RE.find(text).map(|m| m.as_str().to_lowercase())
}

/// Friendly title for an agent name
pub fn display_name(author: &str) -> String {
    let known = match author {
        "root_agent" | "ai_tutor" => Some("AI Tutor"),
        "dsa_agent" => Some("DSA Specialist"),
        "dsa_tutor" => Some("DSA Tutor"),
        "dsa_solver" => Some("DSA Solver"),
        "code_generator" => Some("Code Generator"),
        "code_reviewer" => Some("Code Reviewer"),
        "developer_agent" => Some("Developer Tutor"),
        "system_design_agent" => Some("System Design Tutor"),
        "search_agent" => Some("Search Agent"),
        "account_agent" => Some("Account Manager"),
        _ => None,
    };

    match known {
        Some(name) => name.to_string(),
        None => title_case(author),
    }
}

/// `system_design` -> `System Design`
pub fn title_case(s: &str) -> String {
    s.split(|c: char| c == '_' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(|c| c.to_lowercase())).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_untouched() {
        assert!(try_parse_json_wrapper("Arrays store elements contiguously.").is_none());
        assert!(try_parse_json_wrapper("{not json}").is_none());
        assert_eq!(clean_response("hello"), "hello");
    }

    #[test]
    fn test_dsa_wrapper_with_explanation() {
        let text = r#"{"dsa_agent_response": {"explanation": "Use two pointers."}}"#;
        assert_eq!(try_parse_json_wrapper(text).unwrap(), "Use two pointers.");
    }

    #[test]
    fn test_dsa_wrapper_with_code() {
        let text = r#"{"dsa_agent_response": {"code": "def f(): pass", "language": "python", "complexity": "O(1)"}}"#;
        let cleaned = try_parse_json_wrapper(text).unwrap();
        assert!(cleaned.starts_with("```python\ndef f(): pass\n```"));
        assert!(cleaned.contains("**Complexity Analysis:**\nO(1)"));
    }

    #[test]
    fn test_generic_wrappers() {
        assert_eq!(
            try_parse_json_wrapper(r#"{"developer_agent_response": "Use hooks."}"#).unwrap(),
            "Use hooks."
        );
        assert_eq!(try_parse_json_wrapper(r#"{"response": "ok"}"#).unwrap(), "ok");
        assert_eq!(
            try_parse_json_wrapper(r#"{"general_agent_response": {"explanation": "x"}}"#).unwrap(),
            "x"
        );
    }

    #[test]
    fn test_unknown_object_pretty_printed() {
        let cleaned = try_parse_json_wrapper(r#"{"a": 1, "b": 2}"#).unwrap();
        assert!(cleaned.contains("\n"));
        assert!(cleaned.contains("\"a\": 1"));
    }

    #[test]
    fn test_collect_response_dedups() {
        let events = vec![
            Event::text("ai_tutor", "  Hello  "),
            Event::tool_call("ai_tutor", "dsa_agent"),
            Event::text("ai_tutor", "Hello"),
            Event::text("ai_tutor", r#"{"response": "World"}"#),
        ];
        assert_eq!(collect_response(&events).unwrap(), "Hello\n\nWorld");
        assert_eq!(last_author(&events), Some("ai_tutor"));
        assert!(collect_response(&[]).is_none());
    }

    #[test]
    fn test_extract_guest_id() {
        let text = "Guest session created! (ID: GUEST_1a2B3c)";
        assert_eq!(extract_guest_id(text).unwrap(), "guest_1a2b3c");
        assert!(extract_guest_id("guest_zz").is_none());
    }

    #[test]
    fn test_display_names() {
        assert_eq!(display_name("code_reviewer"), "Code Reviewer");
        assert_eq!(display_name("ai_tutor"), "AI Tutor");
        assert_eq!(display_name("quiz_master"), "Quiz Master");
        assert_eq!(title_case("system_design"), "System Design");
    }
}
