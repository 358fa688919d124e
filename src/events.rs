//! Inbound Roman webhook events

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::wire::AttachmentContent;

/// Event envelope shared by all event types
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEvent {
    #[serde(rename = "type")]
    event_type: String,
    user_id: String,
    message_id: String,
    #[serde(flatten)]
    payload: Map<String, Value>,
}

/// A webhook call from Roman
#[derive(Debug, Clone, PartialEq)]
pub struct InboundEvent {
    /// Event type exactly as Roman sent it
    pub event_type: String,
    pub user_id: String,
    pub message_id: String,
    pub kind: EventKind,
}

/// Event types the bridge reacts to
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    /// `conversation.init`: the bot was added to a conversation
    Init,
    /// `conversation.new_text`
    NewText(TextEvent),
    /// `conversation.call`
    Call(CallEvent),
    /// `conversation.audio.new`, `conversation.new_image`, `conversation.file.new`, `conversation.asset.data`
    Asset(AssetPayload),
    /// Anything else is acknowledged and ignored
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct TextEvent {
    #[serde(default)]
    pub text: String,
}

/// `call` is kept untyped; only `call.resp == true` matters
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct CallEvent {
    #[serde(default)]
    pub call: Option<Value>,
}

impl CallEvent {
    /// Someone accepted or joined the call
    pub fn is_answered(&self) -> bool {
        self.call
            .as_ref()
            .and_then(|call| call.get("resp"))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

/// Asset fields as Roman sent them, typed only once the sender is known to be an admin
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AssetPayload(pub Map<String, Value>);

impl AssetPayload {
    pub fn parse(self) -> Result<AssetEvent, serde_json::Error> {
        serde_json::from_value(Value::Object(self.0))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetEvent {
    /// Base64 encoded content
    pub attachment: String,
    /// Caption; Roman shows it as the file name
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    /// Forwarded untouched
    #[serde(default)]
    pub duration: Option<Value>,
    /// Forwarded untouched
    #[serde(default)]
    pub levels: Option<Value>,
}

impl AssetEvent {
    pub fn into_attachment(self) -> AttachmentContent {
        AttachmentContent {
            data: self.attachment,
            filename: self.text,
            mime_type: self.mime_type,
            duration: self.duration,
            levels: self.levels,
        }
    }
}

impl InboundEvent {
    /// Parse a webhook body. Text and call payloads are typed here; asset
    /// payloads wait for the admin check.
    pub fn from_slice(body: &[u8]) -> Result<Self, serde_json::Error> {
        let raw: RawEvent = serde_json::from_slice(body)?;

        let kind = match raw.event_type.as_str() {
            "conversation.init" => EventKind::Init,
            "conversation.new_text" => {
                EventKind::NewText(serde_json::from_value(Value::Object(raw.payload))?)
            }
            "conversation.call" => EventKind::Call(serde_json::from_value(Value::Object(raw.payload))?),
            "conversation.audio.new"
            | "conversation.new_image"
            | "conversation.file.new"
            | "conversation.asset.data" => EventKind::Asset(AssetPayload(raw.payload)),
            _ => EventKind::Unknown,
        };

        Ok(Self {
            event_type: raw.event_type,
            user_id: raw.user_id,
            message_id: raw.message_id,
            kind,
        })
    }
}
