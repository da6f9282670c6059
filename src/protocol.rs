//! Room event channel: event names and payload shapes.
//!
//! DESIGN
//! ======
//! Event names and payload shapes are the compatibility surface with the
//! server and are reproduced verbatim:
//!
//! Outbound: `join {name, room}` (acked), `sendMessage "<text>"` (acked),
//! `typing {name, room}`, `stopTyping {name, room}`.
//!
//! Inbound: `chatHistory [Message]`, `message Message`,
//! `roomData {room, users}`, `typing {name}`, `stopTyping {name}`.
//!
//! Inbound payloads are decoded leniently: unknown fields are ignored and
//! optional fields default, because the server is an external collaborator.

use packets::SocketPacket;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::debug;

use crate::identity::JoinParams;

pub const JOIN: &str = "join";
pub const SEND_MESSAGE: &str = "sendMessage";
pub const TYPING: &str = "typing";
pub const STOP_TYPING: &str = "stopTyping";
pub const MESSAGE: &str = "message";
pub const CHAT_HISTORY: &str = "chatHistory";
pub const ROOM_DATA: &str = "roomData";

// =============================================================================
// INBOUND PAYLOADS
// =============================================================================

/// A chat message as pushed by the server. Immutable once received.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Stable identifier, when the server assigns one. Only a render key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Author display name.
    pub user: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<MessageTime>,
    /// Author's participant id, when the server includes it.
    #[serde(default, rename = "userId", alias = "user_id", skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// Message timestamp: epoch milliseconds or an RFC 3339 string.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageTime {
    Millis(i64),
    Text(String),
}

impl MessageTime {
    #[must_use]
    pub fn to_datetime(&self) -> Option<OffsetDateTime> {
        match self {
            Self::Millis(ms) => match OffsetDateTime::from_unix_timestamp_nanos(i128::from(*ms) * 1_000_000) {
                Ok(at) => Some(at),
                Err(error) => {
                    debug!(%error, millis = *ms, "protocol: message time out of range");
                    None
                }
            },
            Self::Text(raw) => match OffsetDateTime::parse(raw, &Rfc3339) {
                Ok(at) => Some(at),
                Err(error) => {
                    debug!(%error, %raw, "protocol: message time is not RFC 3339");
                    None
                }
            },
        }
    }

    /// `h:mm AM`, e.g. `3:07 PM`. Epoch millis render in UTC; RFC 3339
    /// strings keep their own offset.
    #[must_use]
    pub fn clock_label(&self) -> Option<String> {
        let at = self.to_datetime()?;
        let format = time::macros::format_description!("[hour repr:12 padding:none]:[minute] [period]");
        match at.format(&format) {
            Ok(label) => Some(label),
            Err(error) => {
                debug!(%error, "protocol: message time not formattable");
                None
            }
        }
    }
}

/// A connected member of the room.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    /// Server-assigned socket id; unique per room per connection.
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
}

/// Authoritative roster broadcast.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    #[serde(default, alias = "participants")]
    pub users: Vec<Participant>,
}

/// Payload of inbound `typing` / `stopTyping`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypingNotice {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
}

// =============================================================================
// OUTBOUND EVENTS
// =============================================================================

/// Client to server event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outbound {
    Join(JoinParams),
    SendMessage(String),
    Typing(JoinParams),
    StopTyping(JoinParams),
}

impl Outbound {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Join(_) => JOIN,
            Self::SendMessage(_) => SEND_MESSAGE,
            Self::Typing(_) => TYPING,
            Self::StopTyping(_) => STOP_TYPING,
        }
    }

    /// Whether the server answers this event with an acknowledgement.
    #[must_use]
    pub fn expects_ack(&self) -> bool {
        matches!(self, Self::Join(_) | Self::SendMessage(_))
    }

    /// Encode as a Socket.IO EVENT packet.
    ///
    /// # Errors
    ///
    /// Propagates `serde_json` serialization errors.
    pub fn to_packet(&self, ack_id: Option<u64>) -> Result<SocketPacket, serde_json::Error> {
        let arg = match self {
            Self::Join(params) | Self::Typing(params) | Self::StopTyping(params) => serde_json::to_value(params)?,
            Self::SendMessage(text) => Value::String(text.clone()),
        };
        Ok(SocketPacket::event(self.name(), vec![arg], ack_id))
    }
}

/// Error carried by an acknowledgement, if any.
///
/// The first callback argument is the error: `null`, absent, `false` and the
/// empty string mean success; a string is the error text; an object's
/// `error` (or `message`) field is used when present.
#[must_use]
pub fn ack_error(args: &[Value]) -> Option<String> {
    match args.first()? {
        Value::Null | Value::Bool(false) => None,
        Value::String(text) if text.is_empty() => None,
        Value::String(text) => Some(text.clone()),
        Value::Object(map) => {
            let field = map.get("error").or_else(|| map.get("message"));
            match field {
                Some(Value::String(text)) => Some(text.clone()),
                Some(Value::Null | Value::Bool(false)) => None,
                Some(other) => Some(other.to_string()),
                None if map.is_empty() => None,
                None => Some(Value::Object(map.clone()).to_string()),
            }
        }
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
#[path = "protocol_test.rs"]
mod tests;
