//! Response body decoding
//!
//! The remote service answers either with a bare JSON body or with an
//! event-stream body. Event-stream bodies are split into events on blank
//! lines; each event's `data:` lines carry the JSON payload.

use serde_json::Value;

/// Literal data values that end a stream and carry no payload
const STREAM_TERMINATORS: [&str; 2] = ["[DONE]", "DONE"];

/// One server-sent event
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: Vec<String>,
}

impl SseEvent {
    fn is_empty(&self) -> bool {
        self.event.is_none() && self.data.is_empty()
    }
}

/// Split an event-stream body into events
///
/// Comment lines (leading `:`) and lines without a field separator are
/// ignored. Field names and values are trimmed.
pub fn parse_events(text: &str) -> Vec<SseEvent> {
    let mut events = Vec::new();
    let mut current = SseEvent::default();

    for line in text.lines() {
        let line = line.trim_end_matches('\r');

        if line.is_empty() {
            if !current.is_empty() {
                events.push(std::mem::take(&mut current));
            }
            continue;
        }
        if line.starts_with(':') {
            continue;
        }

        let Some((field, value)) = line.split_once(':') else {
            continue;
        };
        match field.trim() {
            "event" => current.event = Some(value.trim().to_string()),
            "data" => current.data.push(value.trim().to_string()),
            _ => {}
        }
    }

    if !current.is_empty() {
        events.push(current);
    }
    events
}

fn looks_like_json(candidate: &str) -> bool {
    candidate.starts_with('{') || candidate.starts_with('[')
}

/// First JSON object or array carried by an event-stream body
///
/// Per event, each data line is tried on its own first, then the event's data
/// lines joined with newlines. If no event yields JSON the raw body is scanned
/// from its first `{`.
pub fn first_json(text: &str) -> Option<Value> {
    for event in parse_events(text) {
        for chunk in &event.data {
            let candidate = chunk.trim();
            if candidate.is_empty() || STREAM_TERMINATORS.contains(&candidate) {
                continue;
            }
            if looks_like_json(candidate) {
                if let Ok(value) = serde_json::from_str(candidate) {
                    return Some(value);
                }
            }
        }

        let joined = event.data.join("\n");
        let joined = joined.trim();
        if looks_like_json(joined) {
            if let Ok(value) = serde_json::from_str(joined) {
                return Some(value);
            }
        }
    }

    scan_first_json(text)
}

/// Decode the first JSON value starting at the first `{` of `text`
///
/// Trailing content after the value is ignored.
pub fn scan_first_json(text: &str) -> Option<Value> {
    let start = text.find('{')?;
    serde_json::Deserializer::from_str(&text[start..])
        .into_iter::<Value>()
        .next()?
        .ok()
}

/// Unwrap a JSON-RPC response to the payload callers care about
///
/// - a response with an `error` field is returned unchanged
/// - a `result` object is unwrapped, and its `structuredContent` object one
///   level further when present
/// - anything else is returned unchanged
pub fn normalize(value: Value) -> Value {
    let Value::Object(mut obj) = value else {
        return value;
    };

    if obj.contains_key("error") {
        return Value::Object(obj);
    }

    match obj.remove("result") {
        Some(Value::Object(mut result)) => match result.remove("structuredContent") {
            Some(structured @ Value::Object(_)) => structured,
            Some(other) => {
                result.insert("structuredContent".to_string(), other);
                Value::Object(result)
            }
            None => Value::Object(result),
        },
        Some(other) => {
            obj.insert("result".to_string(), other);
            Value::Object(obj)
        }
        None => Value::Object(obj),
    }
}

/// Prefix of `text` at most `max_chars` characters long, for log previews
pub fn preview(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
