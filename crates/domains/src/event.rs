//! # Inbound events
//!
//! The contract the external transport must satisfy: a stable actor
//! identity, a chat-type discriminator, and a typed payload. The engine
//! never sees raw transport frames.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatKind {
    Private,
    Group,
    Channel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatContext {
    pub chat_ref: i64,
    pub kind: ChatKind,
}

/// Payload discriminants the conversation engine dispatches on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventPayload {
    /// A slash command, including the leading `/`.
    Command(String),
    /// Free text.
    Text(String),
    /// An image attachment; `media_ref` is the upstream file handle.
    Image { media_ref: String },
    /// A button press; `token` is `action` or `action:argument`.
    Callback { token: String },
}

impl EventPayload {
    /// Splits a callback token into `(action, optional argument)`.
    /// Returns `None` for non-callback payloads.
    pub fn callback_parts(&self) -> Option<(&str, Option<&str>)> {
        match self {
            EventPayload::Callback { token } => match token.split_once(':') {
                Some((action, arg)) => Some((action, Some(arg))),
                None => Some((token.as_str(), None)),
            },
            _ => None,
        }
    }
}

/// One update from the transport, normalized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundEvent {
    /// Stable, opaque identity of the acting user on the upstream channel.
    pub actor_external_id: i64,
    pub chat: ChatContext,
    /// Transport-side identity of the inbound message, when it has one.
    pub message_ref: Option<i64>,
    pub payload: EventPayload,
}

impl InboundEvent {
    pub fn is_private(&self) -> bool {
        self.chat.kind == ChatKind::Private
    }
}
