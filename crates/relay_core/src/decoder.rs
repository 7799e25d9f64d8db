//! Messages API response decoding.

use serde_json::{Map, Value};

use crate::error::DecodeError;

/// One element of the response `content` array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentBlock {
    Text(String),
    Thinking(String),
    /// Any block type carrying no reply text (tool use, search results, ...).
    Unrecognized(String),
}

impl ContentBlock {
    fn from_value(
        index: usize,
        value: &Value,
        reasoning_enabled: bool,
    ) -> Result<Self, DecodeError> {
        let block = value
            .as_object()
            .ok_or(DecodeError::BlockNotObject { index })?;

        match block.get("type").and_then(Value::as_str) {
            Some("text") => string_field(block, index, "text", "text").map(ContentBlock::Text),
            Some("thinking") if reasoning_enabled => {
                string_field(block, index, "thinking", "thinking").map(ContentBlock::Thinking)
            }
            other => Ok(ContentBlock::Unrecognized(other.unwrap_or_default().to_string())),
        }
    }
}

fn string_field(
    block: &Map<String, Value>,
    index: usize,
    block_type: &'static str,
    field: &'static str,
) -> Result<String, DecodeError> {
    block
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(DecodeError::MissingField {
            index,
            block_type,
            field,
        })
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedResponse {
    pub reply_text: String,
    /// Always empty when reasoning is disabled.
    pub reasoning_text: String,
}

impl DecodedResponse {
    pub fn reasoning(&self) -> Option<&str> {
        (!self.reasoning_text.is_empty()).then_some(self.reasoning_text.as_str())
    }
}

/// Parse the raw content array into typed blocks.
pub fn parse_blocks(
    body: &[u8],
    reasoning_enabled: bool,
) -> Result<Vec<ContentBlock>, DecodeError> {
    let root: Value = serde_json::from_slice(body)?;
    let root = root.as_object().ok_or(DecodeError::NotAnObject)?;
    let content = root
        .get("content")
        .and_then(Value::as_array)
        .ok_or(DecodeError::MissingContent)?;
    if content.is_empty() {
        return Err(DecodeError::EmptyContent);
    }

    content
        .iter()
        .enumerate()
        .map(|(index, value)| ContentBlock::from_value(index, value, reasoning_enabled))
        .collect()
}

/// Decode a complete body into reply and reasoning text, concatenated in
/// array order. Any malformed block fails the whole decode.
pub fn decode_response(
    body: &[u8],
    reasoning_enabled: bool,
) -> Result<DecodedResponse, DecodeError> {
    let mut decoded = DecodedResponse::default();
    for block in parse_blocks(body, reasoning_enabled)? {
        match block {
            ContentBlock::Text(text) => decoded.reply_text.push_str(&text),
            ContentBlock::Thinking(thinking) => decoded.reasoning_text.push_str(&thinking),
            ContentBlock::Unrecognized(kind) => {
                log::debug!("Skipping `{kind}` content block");
            }
        }
    }
    Ok(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body(value: Value) -> Vec<u8> {
        serde_json::to_vec(&value).unwrap()
    }

    #[test]
    fn text_blocks_concatenate_around_other_blocks() {
        let payload = body(json!({
            "id": "msg_01",
            "type": "message",
            "role": "assistant",
            "content": [
                {"type": "text", "text": "A"},
                {
                    "type": "tool_use",
                    "id": "toolu_1",
                    "name": "web_search",
                    "input": {"query": "x"}
                },
                {"type": "text", "text": "B"}
            ],
            "stop_reason": "end_turn"
        }));

        let decoded = decode_response(&payload, false).unwrap();
        assert_eq!(decoded.reply_text, "AB");
        assert_eq!(decoded.reasoning(), None);
    }

    #[test]
    fn thinking_is_ignored_when_reasoning_disabled() {
        let payload = body(json!({
            "content": [
                {"type": "thinking", "thinking": "secret plan", "signature": "sig"},
                {"type": "text", "text": "Answer"}
            ]
        }));

        let decoded = decode_response(&payload, false).unwrap();
        assert_eq!(decoded.reply_text, "Answer");
        assert!(decoded.reasoning_text.is_empty());
    }

    #[test]
    fn thinking_is_collected_when_reasoning_enabled() {
        let payload = body(json!({
            "content": [
                {"type": "thinking", "thinking": "step one. "},
                {"type": "redacted_thinking", "data": "opaque"},
                {"type": "thinking", "thinking": "step two."},
                {"type": "text", "text": "Done"}
            ]
        }));

        let decoded = decode_response(&payload, true).unwrap();
        assert_eq!(decoded.reasoning(), Some("step one. step two."));
        assert_eq!(decoded.reply_text, "Done");
    }

    #[test]
    fn malformed_thinking_only_matters_with_reasoning_on() {
        let payload = body(json!({
            "content": [
                {"type": "thinking"},
                {"type": "text", "text": "ok"}
            ]
        }));

        assert_eq!(decode_response(&payload, false).unwrap().reply_text, "ok");
        assert!(matches!(
            decode_response(&payload, true),
            Err(DecodeError::MissingField {
                index: 0,
                field: "thinking",
                ..
            })
        ));
    }

    #[test]
    fn untyped_block_is_unrecognized() {
        let blocks = parse_blocks(br#"{"content":[{"foo":1}]}"#, false).unwrap();
        assert_eq!(blocks, vec![ContentBlock::Unrecognized(String::new())]);
    }

    #[test]
    fn rejects_invalid_json() {
        assert!(matches!(
            decode_response(b"{\"content\": [", false),
            Err(DecodeError::InvalidJson(_))
        ));
    }

    #[test]
    fn rejects_non_object_root() {
        assert!(matches!(
            decode_response(b"[1, 2]", false),
            Err(DecodeError::NotAnObject)
        ));
    }

    #[test]
    fn rejects_missing_or_non_array_content() {
        assert!(matches!(
            decode_response(br#"{"type":"message"}"#, false),
            Err(DecodeError::MissingContent)
        ));
        assert!(matches!(
            decode_response(br#"{"content":"hello"}"#, false),
            Err(DecodeError::MissingContent)
        ));
    }

    #[test]
    fn rejects_empty_content() {
        assert!(matches!(
            decode_response(br#"{"content":[]}"#, false),
            Err(DecodeError::EmptyContent)
        ));
    }

    #[test]
    fn rejects_non_object_block() {
        assert!(matches!(
            decode_response(br#"{"content":[{"type":"text","text":"a"}, "b"]}"#, false),
            Err(DecodeError::BlockNotObject { index: 1 })
        ));
    }

    #[test]
    fn rejects_text_block_with_non_string_text() {
        let err =
            decode_response(br#"{"content":[{"type":"text","text":42}]}"#, false).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::MissingField {
                index: 0,
                block_type: "text",
                field: "text"
            }
        ));
    }
}
