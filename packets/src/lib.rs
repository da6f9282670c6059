//! Engine.IO v4 / Socket.IO v4 text packet codec for the room-chat websocket.
//!
//! This crate owns the wire representation used by the `roomchat` client.
//! Each websocket text frame carries one Engine.IO packet; Engine.IO
//! `message` packets carry one Socket.IO packet. Payloads stay flexible
//! (`serde_json::Value`) so the event layer decides what each event means.
//!
//! Binary attachments (`b` engine packets, Socket.IO types 5 and 6) are
//! rejected: the room protocol is JSON-only.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Namespace used when a Socket.IO packet carries none.
pub const DEFAULT_NAMESPACE: &str = "/";

/// Error returned by the decode functions.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The frame was empty; every packet starts with a type digit.
    #[error("empty packet")]
    Empty,
    /// The leading character is not a known Engine.IO packet type.
    #[error("unknown engine.io packet type: {0:?}")]
    UnknownEngineType(char),
    /// The leading character is not a known Socket.IO packet type.
    #[error("unknown socket.io packet type: {0:?}")]
    UnknownSocketType(char),
    /// The ack id digits do not fit in a `u64`.
    #[error("invalid ack id: {0}")]
    InvalidAckId(String),
    /// Binary packets and attachments are not part of this protocol.
    #[error("binary packets are not supported")]
    BinaryUnsupported,
    /// The payload after the header is not valid JSON.
    #[error("malformed packet payload: {0}")]
    Json(#[from] serde_json::Error),
    /// An EVENT packet whose payload is not a JSON array.
    #[error("event payload is not an array")]
    NotAnArray,
    /// An EVENT packet whose array does not start with a string name.
    #[error("event payload has no event name")]
    MissingEventName,
}

// =============================================================================
// ENGINE.IO
// =============================================================================

/// Handshake body of the Engine.IO `open` packet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    /// Engine session id (not the Socket.IO socket id).
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    /// Milliseconds between server pings.
    #[serde(default)]
    pub ping_interval: u64,
    /// Milliseconds the server waits for a pong.
    #[serde(default)]
    pub ping_timeout: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_payload: Option<u64>,
}

/// One Engine.IO packet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EnginePacket {
    Open(Handshake),
    Close,
    /// Server heartbeat; the payload is echoed back in the pong.
    Ping(String),
    Pong(String),
    /// Carries an encoded Socket.IO packet.
    Message(String),
    Upgrade,
    Noop,
}

/// Decode one websocket text frame into an Engine.IO packet.
///
/// # Errors
///
/// Returns [`CodecError::Empty`] for an empty frame,
/// [`CodecError::UnknownEngineType`] for an unknown type digit,
/// [`CodecError::BinaryUnsupported`] for base64 binary packets and
/// [`CodecError::Json`] for a malformed `open` handshake.
pub fn decode_engine(text: &str) -> Result<EnginePacket, CodecError> {
    let mut chars = text.chars();
    let Some(kind) = chars.next() else {
        return Err(CodecError::Empty);
    };
    let payload = chars.as_str();

    match kind {
        '0' => Ok(EnginePacket::Open(serde_json::from_str(payload)?)),
        '1' => Ok(EnginePacket::Close),
        '2' => Ok(EnginePacket::Ping(payload.to_owned())),
        '3' => Ok(EnginePacket::Pong(payload.to_owned())),
        '4' => Ok(EnginePacket::Message(payload.to_owned())),
        '5' => Ok(EnginePacket::Upgrade),
        '6' => Ok(EnginePacket::Noop),
        'b' => Err(CodecError::BinaryUnsupported),
        other => Err(CodecError::UnknownEngineType(other)),
    }
}

/// Encode an Engine.IO packet as a websocket text frame.
#[must_use]
pub fn encode_engine(packet: &EnginePacket) -> String {
    match packet {
        // Serializing a struct of strings and integers cannot fail.
        EnginePacket::Open(handshake) => format!("0{}", serde_json::to_string(handshake).unwrap_or_default()),
        EnginePacket::Close => "1".to_owned(),
        EnginePacket::Ping(payload) => format!("2{payload}"),
        EnginePacket::Pong(payload) => format!("3{payload}"),
        EnginePacket::Message(payload) => format!("4{payload}"),
        EnginePacket::Upgrade => "5".to_owned(),
        EnginePacket::Noop => "6".to_owned(),
    }
}

// =============================================================================
// SOCKET.IO
// =============================================================================

/// Socket.IO packet type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SocketKind {
    Connect,
    Disconnect,
    Event,
    Ack,
    ConnectError,
}

impl SocketKind {
    #[must_use]
    pub fn as_char(self) -> char {
        match self {
            Self::Connect => '0',
            Self::Disconnect => '1',
            Self::Event => '2',
            Self::Ack => '3',
            Self::ConnectError => '4',
        }
    }

    fn from_char(value: char) -> Result<Self, CodecError> {
        match value {
            '0' => Ok(Self::Connect),
            '1' => Ok(Self::Disconnect),
            '2' => Ok(Self::Event),
            '3' => Ok(Self::Ack),
            '4' => Ok(Self::ConnectError),
            '5' | '6' => Err(CodecError::BinaryUnsupported),
            other => Err(CodecError::UnknownSocketType(other)),
        }
    }
}

/// One Socket.IO packet.
#[derive(Clone, Debug, PartialEq)]
pub struct SocketPacket {
    pub kind: SocketKind,
    /// Namespace, `/` unless the sender named another.
    pub namespace: String,
    /// Present on events that expect an acknowledgement and on the ack itself.
    pub ack_id: Option<u64>,
    pub data: Option<Value>,
}

impl SocketPacket {
    /// CONNECT request for the default namespace.
    #[must_use]
    pub fn connect() -> Self {
        Self { kind: SocketKind::Connect, namespace: DEFAULT_NAMESPACE.to_owned(), ack_id: None, data: None }
    }

    /// DISCONNECT for the default namespace: the client leaving.
    #[must_use]
    pub fn disconnect() -> Self {
        Self { kind: SocketKind::Disconnect, namespace: DEFAULT_NAMESPACE.to_owned(), ack_id: None, data: None }
    }

    /// EVENT packet `[name, ...args]`, optionally asking for an ack.
    #[must_use]
    pub fn event(name: &str, args: Vec<Value>, ack_id: Option<u64>) -> Self {
        let mut items = Vec::with_capacity(args.len() + 1);
        items.push(Value::String(name.to_owned()));
        items.extend(args);
        Self { kind: SocketKind::Event, namespace: DEFAULT_NAMESPACE.to_owned(), ack_id, data: Some(Value::Array(items)) }
    }

    /// ACK packet answering the event with the given id.
    #[must_use]
    pub fn ack(id: u64, args: Vec<Value>) -> Self {
        Self {
            kind: SocketKind::Ack,
            namespace: DEFAULT_NAMESPACE.to_owned(),
            ack_id: Some(id),
            data: Some(Value::Array(args)),
        }
    }

    /// Event name, when this is a well-formed EVENT packet.
    #[must_use]
    pub fn event_name(&self) -> Option<&str> {
        match (self.kind, &self.data) {
            (SocketKind::Event, Some(Value::Array(items))) => items.first().and_then(Value::as_str),
            _ => None,
        }
    }

    /// Split an EVENT packet into its name and arguments.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::NotAnArray`] when the payload is not an array
    /// and [`CodecError::MissingEventName`] when it does not start with a string.
    pub fn into_event(self) -> Result<(String, Vec<Value>), CodecError> {
        let Some(Value::Array(mut items)) = self.data else {
            return Err(CodecError::NotAnArray);
        };
        if items.is_empty() {
            return Err(CodecError::MissingEventName);
        }
        match items.remove(0) {
            Value::String(name) => Ok((name, items)),
            _ => Err(CodecError::MissingEventName),
        }
    }

    /// Callback arguments of an ACK packet. Non-array payloads count as a
    /// single argument.
    #[must_use]
    pub fn into_ack_args(self) -> Vec<Value> {
        match self.data {
            Some(Value::Array(items)) => items,
            Some(other) => vec![other],
            None => Vec::new(),
        }
    }

    /// Socket id carried by the server's CONNECT reply.
    #[must_use]
    pub fn sid(&self) -> Option<&str> {
        match (self.kind, &self.data) {
            (SocketKind::Connect, Some(data)) => data.get("sid").and_then(Value::as_str),
            _ => None,
        }
    }

    /// Human-readable reason carried by a CONNECT_ERROR packet.
    #[must_use]
    pub fn error_message(&self) -> Option<String> {
        if self.kind != SocketKind::ConnectError {
            return None;
        }
        match &self.data {
            Some(Value::String(message)) => Some(message.clone()),
            Some(data) => Some(
                data.get("message")
                    .and_then(Value::as_str)
                    .map_or_else(|| data.to_string(), ToOwned::to_owned),
            ),
            None => Some("connection refused".to_owned()),
        }
    }
}

/// Decode the payload of an Engine.IO `message` packet.
///
/// # Errors
///
/// Returns [`CodecError::Empty`], [`CodecError::UnknownSocketType`],
/// [`CodecError::BinaryUnsupported`], [`CodecError::InvalidAckId`] or
/// [`CodecError::Json`] depending on which part of the packet is malformed.
pub fn decode_socket(text: &str) -> Result<SocketPacket, CodecError> {
    let mut chars = text.chars();
    let Some(kind) = chars.next() else {
        return Err(CodecError::Empty);
    };
    let kind = SocketKind::from_char(kind)?;
    let mut rest = chars.as_str();

    let namespace = if rest.starts_with('/') {
        if let Some((namespace, tail)) = rest.split_once(',') {
            rest = tail;
            namespace.to_owned()
        } else {
            let namespace = rest.to_owned();
            rest = "";
            namespace
        }
    } else {
        DEFAULT_NAMESPACE.to_owned()
    };

    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    let ack_id = if digits == 0 {
        None
    } else {
        let raw = &rest[..digits];
        Some(raw.parse::<u64>().map_err(|_| CodecError::InvalidAckId(raw.to_owned()))?)
    };

    let body = &rest[digits..];
    let data = if body.is_empty() { None } else { Some(serde_json::from_str(body)?) };

    Ok(SocketPacket { kind, namespace, ack_id, data })
}

/// Encode a Socket.IO packet (without the Engine.IO prefix).
#[must_use]
pub fn encode_socket(packet: &SocketPacket) -> String {
    let mut out = String::new();
    out.push(packet.kind.as_char());
    if !packet.namespace.is_empty() && packet.namespace != DEFAULT_NAMESPACE {
        out.push_str(&packet.namespace);
        out.push(',');
    }
    if let Some(id) = packet.ack_id {
        // Writing into a String is infallible.
        write!(out, "{id}").unwrap_or_default();
    }
    if let Some(data) = &packet.data {
        out.push_str(&data.to_string());
    }
    out
}

/// Encode a Socket.IO packet wrapped in an Engine.IO `message`, ready to
/// send as one websocket text frame.
#[must_use]
pub fn encode_message(packet: &SocketPacket) -> String {
    encode_engine(&EnginePacket::Message(encode_socket(packet)))
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
