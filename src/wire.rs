//! Wire messages understood by Roman's broadcast endpoint
//!
//! The same shapes are used for webhook replies and for broadcasts, e.g.
//!
//! ```json
//! {"type": "text", "text": {"data": "Hello"}}
//! {"type": "call", "call": {"version": "3.0", "type": "GROUPSTART", "resp": false, "sessid": ""}}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Call protocol version Roman expects in call messages
pub const CALL_VERSION: &str = "3.0";

// =============================================================================
// Wire Message
// =============================================================================

/// Outbound wire message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WireMessage {
    Text { text: TextContent },
    Call { call: CallContent },
    Attachment { attachment: AttachmentContent },
}

impl WireMessage {
    /// Plain text message
    pub fn text(data: impl Into<String>) -> Self {
        Self::Text {
            text: TextContent { data: data.into() },
        }
    }

    /// Ask clients to start a group call (rings the phones)
    pub fn call_start() -> Self {
        Self::call(CallKind::GroupStart)
    }

    /// Leave the group call
    pub fn call_drop() -> Self {
        Self::call(CallKind::GroupLeave)
    }

    fn call(kind: CallKind) -> Self {
        Self::Call {
            call: CallContent {
                version: CALL_VERSION.to_string(),
                kind,
                resp: false,
                sessid: String::new(),
            },
        }
    }

    /// Binary attachment (audio, image, file)
    pub fn attachment(attachment: AttachmentContent) -> Self {
        Self::Attachment { attachment }
    }

    /// Short name used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Call { .. } => "call",
            Self::Attachment { .. } => "attachment",
        }
    }
}

// =============================================================================
// Payloads
// =============================================================================

/// Text body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextContent {
    pub data: String,
}

/// Call signal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallContent {
    pub version: String,
    #[serde(rename = "type")]
    pub kind: CallKind,
    pub resp: bool,
    pub sessid: String,
}

/// Call signal type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CallKind {
    GroupStart,
    GroupLeave,
}

/// Attachment body
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentContent {
    /// Base64 encoded content
    pub data: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// Duration in milliseconds (audio only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<Value>,
    /// Audio level samples used to draw the waveform
    #[serde(skip_serializing_if = "Option::is_none")]
    pub levels: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_message_shape() {
        let message = WireMessage::text("Hello");
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({"type": "text", "text": {"data": "Hello"}})
        );
    }

    #[test]
    fn test_text_message_parses_back() {
        let parsed: WireMessage =
            serde_json::from_str(r#"{"type":"text","text":{"data":"Hello"}}"#).unwrap();
        assert_eq!(parsed, WireMessage::text("Hello"));
    }

    #[test]
    fn test_call_messages() {
        assert_eq!(
            serde_json::to_value(WireMessage::call_start()).unwrap(),
            json!({"type": "call", "call": {"version": "3.0", "type": "GROUPSTART", "resp": false, "sessid": ""}})
        );
        assert_eq!(
            serde_json::to_value(WireMessage::call_drop()).unwrap(),
            json!({"type": "call", "call": {"version": "3.0", "type": "GROUPLEAVE", "resp": false, "sessid": ""}})
        );
    }

    #[test]
    fn test_attachment_omits_missing_fields() {
        let message = WireMessage::attachment(AttachmentContent {
            data: "AAAA".to_string(),
            mime_type: Some("audio/mp4".to_string()),
            duration: Some(json!(1500)),
            ..Default::default()
        });
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({"type": "attachment", "attachment": {"data": "AAAA", "mimeType": "audio/mp4", "duration": 1500}})
        );
        assert_eq!(message.kind(), "attachment");
    }
}
