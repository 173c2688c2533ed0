//! Stream Codec
//!
//! Decodes inbound text frames into [`StreamMessage`]s. Each frame is
//! decoded independently; a failure affects that frame only.
//!
//! The type tag is inspected before the payload so an unknown message type
//! is reported as such instead of as a generic schema mismatch.

use serde_json::Value;

use super::messages::StreamMessage;
use crate::domain::record::Record;

/// Codec errors.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON parsing failed or a record did not match the schema.
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    /// Unknown message type.
    #[error("unknown message type: {0}")]
    UnknownMessageType(String),

    /// Invalid message format.
    #[error("invalid message format: {0}")]
    InvalidFormat(String),
}

impl CodecError {
    /// Metric label.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::Json(_) => "json",
            Self::UnknownMessageType(_) => "unknown_type",
            Self::InvalidFormat(_) => "invalid_format",
        }
    }
}

/// JSON codec for the market stream.
#[derive(Debug, Default, Clone)]
pub struct StreamCodec;

impl StreamCodec {
    /// Create a new codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Decode one text frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame is not a JSON object, lacks a `type` or
    /// `data` array, names an unknown type, or carries malformed records.
    pub fn decode(&self, text: &str) -> Result<StreamMessage, CodecError> {
        let trimmed = text.trim();
        if !trimmed.starts_with('{') {
            return Err(CodecError::InvalidFormat(format!(
                "expected JSON object, got: {}...",
                preview(trimmed)
            )));
        }

        let mut value: Value = serde_json::from_str(trimmed)?;

        let msg_type = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| CodecError::InvalidFormat("missing 'type' field".to_string()))?
            .to_owned();

        let data = match value.get_mut("data").map(Value::take) {
            Some(data @ Value::Array(_)) => data,
            Some(_) => {
                return Err(CodecError::InvalidFormat(
                    "'data' must be an array".to_string(),
                ));
            }
            None => return Err(CodecError::InvalidFormat("missing 'data' field".to_string())),
        };

        match msg_type.as_str() {
            "SNAPSHOT" => Ok(StreamMessage::Snapshot(decode_records(data)?)),
            "UPDATE" => Ok(StreamMessage::Update(decode_records(data)?)),
            other => Err(CodecError::UnknownMessageType(other.to_string())),
        }
    }

    /// Encode a message to its wire form.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn encode(&self, message: &StreamMessage) -> Result<String, CodecError> {
        Ok(serde_json::to_string(message)?)
    }
}

fn decode_records(data: Value) -> Result<Vec<Record>, CodecError> {
    Ok(serde_json::from_value(data)?)
}

fn preview(text: &str) -> &str {
    let end = text
        .char_indices()
        .nth(50)
        .map_or(text.len(), |(index, _)| index);
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECORD: &str = r#"{"id":"asset-1","symbol":"AAPL","category":"Technology","price":180.5,"volume":900,"change":0.12,"timestamp":1718000000000}"#;

    #[test]
    fn decode_snapshot() {
        let codec = StreamCodec::new();
        let text = format!(r#"{{"type":"SNAPSHOT","data":[{RECORD},{RECORD}]}}"#);
        let message = codec.decode(&text).unwrap();

        assert_eq!(message.type_name(), "SNAPSHOT");
        assert_eq!(message.len(), 2);
    }

    #[test]
    fn decode_update_with_whitespace() {
        let codec = StreamCodec::new();
        let text = format!("  \n{{\"type\":\"UPDATE\",\"data\":[{RECORD}]}}\n");
        match codec.decode(&text).unwrap() {
            StreamMessage::Update(batch) => assert_eq!(batch[0].id, "asset-1"),
            other => panic!("expected update, got {other:?}"),
        }
    }

    #[test]
    fn decode_empty_update() {
        let message = StreamCodec::new()
            .decode(r#"{"type":"UPDATE","data":[]}"#)
            .unwrap();
        assert!(message.is_empty());
    }

    #[test]
    fn unknown_type_is_reported() {
        let err = StreamCodec::new()
            .decode(r#"{"type":"HEARTBEAT","data":[]}"#)
            .unwrap_err();
        assert!(matches!(err, CodecError::UnknownMessageType(t) if t == "HEARTBEAT"));
    }

    #[test]
    fn missing_fields_are_invalid_format() {
        let codec = StreamCodec::new();
        assert!(matches!(
            codec.decode(r#"{"data":[]}"#),
            Err(CodecError::InvalidFormat(_))
        ));
        assert!(matches!(
            codec.decode(r#"{"type":"UPDATE"}"#),
            Err(CodecError::InvalidFormat(_))
        ));
        assert!(matches!(
            codec.decode(r#"{"type":"UPDATE","data":{}}"#),
            Err(CodecError::InvalidFormat(_))
        ));
    }

    #[test]
    fn non_object_is_invalid_format() {
        let err = StreamCodec::new().decode("[1,2,3]").unwrap_err();
        assert_eq!(err.reason(), "invalid_format");
    }

    #[test]
    fn malformed_json_and_records_are_json_errors() {
        let codec = StreamCodec::new();
        assert_eq!(codec.decode("{not json").unwrap_err().reason(), "json");
        assert_eq!(
            codec
                .decode(r#"{"type":"UPDATE","data":[{"id":"x"}]}"#)
                .unwrap_err()
                .reason(),
            "json"
        );
    }

    #[test]
    fn encode_matches_wire_shape() {
        let text = StreamCodec::new()
            .encode(&StreamMessage::Snapshot(vec![]))
            .unwrap();
        assert_eq!(text, r#"{"type":"SNAPSHOT","data":[]}"#);
    }

    #[test]
    fn preview_respects_char_boundaries() {
        let text = "é".repeat(80);
        assert_eq!(preview(&text).chars().count(), 50);
    }
}
