//! Embedded tool-call fallback parser (spec.md §4.2 step 3, §6 "Tool-call
//! envelope (model-to-engine)"). A safety net for models that ignore native
//! tool-calling: scans assistant text for one of four envelope shapes, in
//! the order spec.md lists them, and lifts matches out of the user-visible
//! text. Kept strictly separate from the native path (spec.md §9): when the
//! provider already returned native tool calls, [`parse_embedded_calls`] is
//! never invoked — the native path wins and any embedded envelope in the
//! text is discarded unparsed.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::domain::ToolCall;

static TOOL_CALL_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<tool_call>\s*(.*?)\s*</tool_call>").unwrap());
static FUNCTION_CALL_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<function_call>\s*(.*?)\s*</function_call>").unwrap());
static SELF_CLOSING_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<([A-Za-z_][\w-]*)((?:\s+[\w:-]+="[^"]*")*)\s*/>"#).unwrap());
static XML_ATTR: Lazy<Regex> = Lazy::new(|| Regex::new(r#"([\w:-]+)="([^"]*)""#).unwrap());
static BARE_JSON_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^[ \t]*(\{.*\})[ \t]*$").unwrap());

/// Reserved self-closing-tag attribute name whose value is JSON-decoded as the whole params
/// object, rather than being one scalar param among the tag's other attributes.
const PARAMS_ATTR: &str = "params";

struct Match {
    start: usize,
    end: usize,
    call: ToolCall,
}

fn fresh_correlation_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn params_object_from_value(value: Value) -> Option<Value> {
    // Accepts {"name":..., "parameters"|"params"|"arguments": {...}} envelopes; the name-bearing
    // object is required, the params key is optional (defaults to an empty object).
    let obj = value.as_object()?;
    let name = obj.get("name")?.as_str()?.to_string();
    let params = obj
        .get("parameters")
        .or_else(|| obj.get("params"))
        .or_else(|| obj.get("arguments"))
        .cloned()
        .unwrap_or_else(|| Value::Object(Default::default()));
    Some(Value::Array(vec![Value::String(name), params]))
}

fn parse_json_envelope(raw: &str) -> Option<(String, Value)> {
    let value: Value = serde_json::from_str(raw.trim()).ok()?;
    let pair = params_object_from_value(value)?;
    let mut arr = pair.as_array()?.iter();
    let name = arr.next()?.as_str()?.to_string();
    let params = arr.next()?.clone();
    Some((name, params))
}

fn parse_self_closing(full: regex::Captures) -> Option<(String, Value, usize, usize)> {
    let whole = full.get(0)?;
    let name = full.get(1)?.as_str().to_string();
    let attrs_str = full.get(2).map(|m| m.as_str()).unwrap_or("");

    let mut params_obj = serde_json::Map::new();
    let mut params_override: Option<Value> = None;
    for attr in XML_ATTR.captures_iter(attrs_str) {
        let key = attr.get(1)?.as_str();
        let value = attr.get(2)?.as_str();
        if key == PARAMS_ATTR {
            if let Ok(parsed) = serde_json::from_str::<Value>(value) {
                params_override = Some(parsed);
                continue;
            }
        }
        params_obj.insert(key.to_string(), Value::String(value.to_string()));
    }

    let params = params_override.unwrap_or(Value::Object(params_obj));
    Some((name, params, whole.start(), whole.end()))
}

/// Scans `text` for embedded tool-call envelopes in spec.md §6's declared order
/// (`<tool_call>`, `<function_call>`, self-closing XML, bare JSON line), and returns the text
/// with every match removed alongside the extracted [`ToolCall`]s (in the order they appeared).
/// Each extracted call is given a fresh correlation id since the fallback grammar carries none.
pub fn parse_embedded_calls(text: &str) -> (String, Vec<ToolCall>) {
    let mut matches: Vec<Match> = Vec::new();

    for caps in TOOL_CALL_TAG.captures_iter(text) {
        let whole = caps.get(0).unwrap();
        if let Some((name, params)) = parse_json_envelope(caps.get(1).unwrap().as_str()) {
            matches.push(Match {
                start: whole.start(),
                end: whole.end(),
                call: ToolCall {
                    correlation_id: fresh_correlation_id(),
                    name,
                    params,
                },
            });
        }
    }

    for caps in FUNCTION_CALL_TAG.captures_iter(text) {
        let whole = caps.get(0).unwrap();
        if overlaps_existing(&matches, whole.start(), whole.end()) {
            continue;
        }
        if let Some((name, params)) = parse_json_envelope(caps.get(1).unwrap().as_str()) {
            matches.push(Match {
                start: whole.start(),
                end: whole.end(),
                call: ToolCall {
                    correlation_id: fresh_correlation_id(),
                    name,
                    params,
                },
            });
        }
    }

    for caps in SELF_CLOSING_TAG.captures_iter(text) {
        let start = caps.get(0).unwrap().start();
        let end = caps.get(0).unwrap().end();
        if overlaps_existing(&matches, start, end) {
            continue;
        }
        if let Some((name, params, s, e)) = parse_self_closing(caps) {
            matches.push(Match {
                start: s,
                end: e,
                call: ToolCall {
                    correlation_id: fresh_correlation_id(),
                    name,
                    params,
                },
            });
        }
    }

    for caps in BARE_JSON_LINE.captures_iter(text) {
        let whole = caps.get(0).unwrap();
        if overlaps_existing(&matches, whole.start(), whole.end()) {
            continue;
        }
        let raw = caps.get(1).unwrap().as_str();
        if let Some((name, params)) = parse_json_envelope(raw) {
            matches.push(Match {
                start: whole.start(),
                end: whole.end(),
                call: ToolCall {
                    correlation_id: fresh_correlation_id(),
                    name,
                    params,
                },
            });
        }
    }

    matches.sort_by_key(|m| m.start);

    let mut cleaned = String::with_capacity(text.len());
    let mut cursor = 0;
    let mut calls = Vec::with_capacity(matches.len());
    for m in matches {
        cleaned.push_str(&text[cursor..m.start]);
        cursor = m.end;
        calls.push(m.call);
    }
    cleaned.push_str(&text[cursor..]);

    (cleaned.trim().to_string(), calls)
}

fn overlaps_existing(matches: &[Match], start: usize, end: usize) -> bool {
    matches.iter().any(|m| start < m.end && end > m.start)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_tool_call_tag_and_strips_it() {
        let text = r#"Let me check that. <tool_call>{"name": "web_search", "arguments": {"q": "rust"}}</tool_call>"#;
        let (cleaned, calls) = parse_embedded_calls(text);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "web_search");
        assert_eq!(calls[0].params, serde_json::json!({"q": "rust"}));
        assert!(!cleaned.contains("tool_call"));
        assert_eq!(cleaned, "Let me check that.");
    }

    #[test]
    fn extracts_function_call_tag() {
        let text = r#"<function_call>{"name": "get_weather", "params": {"city": "Madrid"}}</function_call>"#;
        let (_cleaned, calls) = parse_embedded_calls(text);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "get_weather");
        assert_eq!(calls[0].params["city"], "Madrid");
    }

    #[test]
    fn extracts_self_closing_xml_with_scalar_attrs() {
        let text = r#"<search_notes query="milk" limit="5"/>"#;
        let (cleaned, calls) = parse_embedded_calls(text);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "search_notes");
        assert_eq!(calls[0].params["query"], "milk");
        assert_eq!(calls[0].params["limit"], "5");
        assert!(cleaned.is_empty());
    }

    #[test]
    fn self_closing_xml_scalar_params_attribute_falls_back_to_string() {
        // A `params` attribute whose value doesn't parse as JSON (XML attribute quoting can't
        // carry literal double quotes) is kept as an ordinary scalar attribute instead.
        let (_cleaned, calls) = parse_embedded_calls(r#"<create_note params="title-only"/>"#);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "create_note");
        assert_eq!(calls[0].params["params"], "title-only");
    }

    #[test]
    fn extracts_bare_json_line() {
        let text = "Sure, one moment.\n{\"name\": \"fetch_webpage\", \"arguments\": {\"url\": \"https://a\"}}\nDone.";
        let (cleaned, calls) = parse_embedded_calls(text);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "fetch_webpage");
        assert_eq!(cleaned, "Sure, one moment.\n\nDone.");
    }

    #[test]
    fn plain_text_with_no_envelope_is_unchanged() {
        let text = "Just a normal reply with no tool calls.";
        let (cleaned, calls) = parse_embedded_calls(text);
        assert!(calls.is_empty());
        assert_eq!(cleaned, text);
    }

    #[test]
    fn each_extracted_call_gets_a_distinct_correlation_id() {
        let text = r#"<tool_call>{"name": "a", "arguments": {}}</tool_call><tool_call>{"name": "b", "arguments": {}}</tool_call>"#;
        let (_cleaned, calls) = parse_embedded_calls(text);
        assert_eq!(calls.len(), 2);
        assert_ne!(calls[0].correlation_id, calls[1].correlation_id);
    }
}
