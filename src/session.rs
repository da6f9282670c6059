//! Room session state machine.
//!
//! DESIGN
//! ======
//! `Session` is the transport-free core of one chat view. It owns the
//! transcript, roster and typing set, the typing debounce, the draft and the
//! pending acknowledgements. Every input (inbound event, ack, keystroke,
//! submit, timer, teardown) is a method call that returns the events the
//! transport must send, in order. The connection driver owns the socket and
//! calls these methods one at a time, so no fold ever runs concurrently.
//!
//! Inbound events are dispatched through a handler table keyed by event
//! name. The table is filled once when the namespace connects and emptied
//! once at teardown; after that every inbound event finds no handler and is
//! dropped, which is what makes a late event after teardown harmless.
//!
//! LIFECYCLE
//! =========
//! 1. `new` → `Connecting`, no handlers
//! 2. `connected(sid)` → handlers registered, `join` emitted with an ack id
//! 3. join ack without error → `Joined`; with error → `JoinRejected`
//! 4. `teardown` → timer cancelled, `stopTyping` returned, handlers
//!    deregistered, `Closed`. Repeat calls return nothing.
//!
//! The handlers are gone by the time the caller sends the returned
//! `stopTyping`, so the wire order is deregister then stop. No inbound event
//! can be dispatched in between: the driver sends the teardown emits without
//! reading the socket, and after `Closed` nothing is dispatched anyway.

use std::collections::HashMap;
use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::error::ChatError;
use crate::identity::JoinParams;
use crate::projection::{self, Roster, Transcript, TypingSet};
use crate::protocol::{self, Message, Outbound, Participant, RoomData, TypingNotice};
use crate::typing::{TypingDebounce, TypingSignal};

// =============================================================================
// VIEW STATE
// =============================================================================

/// Everything the UI renders for one session.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RoomState {
    pub self_name: String,
    pub room: String,
    /// Server-assigned socket id, once the namespace is connected.
    pub self_id: Option<String>,
    pub transcript: Transcript,
    pub roster: Roster,
    pub typing: TypingSet,
}

impl RoomState {
    fn new(params: &JoinParams) -> Self {
        Self { self_name: params.name.clone(), room: params.room.clone(), ..Self::default() }
    }

    /// Whether `msg` was written by this session. Prefers the participant id
    /// when both sides have one; falls back to the trimmed display name.
    #[must_use]
    pub fn is_own(&self, msg: &Message) -> bool {
        match (&self.self_id, &msg.user_id) {
            (Some(me), Some(author)) => me == author,
            _ => msg.user.trim() == self.self_name,
        }
    }

    #[must_use]
    pub fn typing_label(&self) -> Option<String> {
        projection::typing_label(&self.typing)
    }
}

/// Which part of [`RoomState`] an inbound event changed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Change {
    Transcript,
    Roster,
    Typing,
}

// =============================================================================
// HANDLER TABLE
// =============================================================================

pub type Handler = fn(&mut RoomState, Vec<Value>) -> Result<Change, serde_json::Error>;

/// Inbound handlers keyed by event name.
#[derive(Default)]
pub struct HandlerTable {
    handlers: HashMap<&'static str, Handler>,
}

impl HandlerTable {
    /// Register `handler` for `event`, replacing any previous one.
    pub fn register(&mut self, event: &'static str, handler: Handler) {
        self.handlers.insert(event, handler);
    }

    /// Remove every handler. Returns how many were registered.
    pub fn deregister_all(&mut self) -> usize {
        let count = self.handlers.len();
        self.handlers.clear();
        count
    }

    #[must_use]
    pub fn get(&self, event: &str) -> Option<Handler> {
        self.handlers.get(event).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

fn register_room_handlers(table: &mut HandlerTable) {
    table.register(protocol::CHAT_HISTORY, on_chat_history);
    table.register(protocol::MESSAGE, on_message);
    table.register(protocol::ROOM_DATA, on_room_data);
    table.register(protocol::TYPING, on_typing);
    table.register(protocol::STOP_TYPING, on_stop_typing);
}

fn first_arg<T: serde::de::DeserializeOwned>(args: Vec<Value>) -> Result<T, serde_json::Error> {
    serde_json::from_value(args.into_iter().next().unwrap_or(Value::Null))
}

fn on_chat_history(state: &mut RoomState, args: Vec<Value>) -> Result<Change, serde_json::Error> {
    let history: Vec<Message> = first_arg(args)?;
    projection::apply_history(&mut state.transcript, history);
    Ok(Change::Transcript)
}

fn on_message(state: &mut RoomState, args: Vec<Value>) -> Result<Change, serde_json::Error> {
    let msg: Message = first_arg(args)?;
    projection::apply_message(&mut state.transcript, msg);
    Ok(Change::Transcript)
}

fn on_room_data(state: &mut RoomState, args: Vec<Value>) -> Result<Change, serde_json::Error> {
    let data: RoomData = first_arg(args)?;
    projection::apply_room_data(&mut state.roster, data);
    Ok(Change::Roster)
}

fn on_typing(state: &mut RoomState, args: Vec<Value>) -> Result<Change, serde_json::Error> {
    let notice: TypingNotice = first_arg(args)?;
    projection::apply_typing(&mut state.typing, &notice.name, &state.self_name);
    Ok(Change::Typing)
}

fn on_stop_typing(state: &mut RoomState, args: Vec<Value>) -> Result<Change, serde_json::Error> {
    let notice: TypingNotice = first_arg(args)?;
    projection::apply_stop_typing(&mut state.typing, &notice.name);
    Ok(Change::Typing)
}

// =============================================================================
// SESSION
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Connecting,
    Joined,
    Closed,
}

/// An outbound event plus the ack id it was registered under, if any.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Emit {
    pub event: Outbound,
    pub ack_id: Option<u64>,
}

/// What a successful acknowledgement resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AckOutcome {
    Joined,
    Sent,
    /// No pending request with that id (already torn down, or a stray ack).
    Unknown,
}

#[derive(Debug)]
enum PendingAck {
    Join,
    Send { text: String },
}

pub struct Session {
    params: JoinParams,
    phase: Phase,
    state: RoomState,
    handlers: HandlerTable,
    typing: TypingDebounce,
    draft: String,
    next_ack_id: u64,
    pending: HashMap<u64, PendingAck>,
}

impl Session {
    #[must_use]
    pub fn new(params: JoinParams, typing_idle: Duration) -> Self {
        Self {
            state: RoomState::new(&params),
            params,
            phase: Phase::Connecting,
            handlers: HandlerTable::default(),
            typing: TypingDebounce::new(typing_idle),
            draft: String::new(),
            next_ack_id: 0,
            pending: HashMap::new(),
        }
    }

    #[must_use]
    pub fn params(&self) -> &JoinParams {
        &self.params
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub fn state(&self) -> &RoomState {
        &self.state
    }

    #[must_use]
    pub fn draft(&self) -> &str {
        &self.draft
    }

    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// The namespace handshake completed: register inbound handlers and
    /// return the `join` request. Returns `None` if already connected or
    /// no longer connecting.
    pub fn connected(&mut self, sid: Option<String>) -> Option<Emit> {
        if self.phase != Phase::Connecting || !self.handlers.is_empty() {
            return None;
        }
        self.state.self_id = sid;
        register_room_handlers(&mut self.handlers);
        Some(self.request(Outbound::Join(self.params.clone()), PendingAck::Join))
    }

    /// Fold one inbound event. Events with no registered handler (unknown
    /// names, or anything after teardown) are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::InvalidJson`] when the payload does not match the
    /// event's shape; state is left unchanged.
    pub fn handle_event(&mut self, event: &str, args: Vec<Value>) -> Result<Option<Change>, ChatError> {
        let Some(handler) = self.handlers.get(event) else {
            debug!(%event, phase = ?self.phase, "session: no handler for event");
            return Ok(None);
        };
        let change = handler(&mut self.state, args)?;
        Ok(Some(change))
    }

    /// Resolve the pending request with ack id `id`.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::JoinRejected`] when the join ack carries an error
    /// and [`ChatError::SendFailed`] when a send ack does. A failed send
    /// leaves the draft in place for a retry.
    pub fn handle_ack(&mut self, id: u64, args: &[Value]) -> Result<AckOutcome, ChatError> {
        let Some(pending) = self.pending.remove(&id) else {
            debug!(ack_id = id, "session: ack for unknown request");
            return Ok(AckOutcome::Unknown);
        };

        match pending {
            PendingAck::Join => {
                if let Some(error) = protocol::ack_error(args) {
                    return Err(ChatError::JoinRejected(error));
                }
                self.phase = Phase::Joined;
                let me = Participant {
                    id: self.state.self_id.clone().unwrap_or_default(),
                    name: self.params.name.clone(),
                    room: Some(self.params.room.clone()),
                };
                projection::apply_self_entry(&mut self.state.roster, me);
                info!(name = %self.params.name, room = %self.params.room, "session: joined");
                Ok(AckOutcome::Joined)
            }
            PendingAck::Send { text } => {
                if let Some(error) = protocol::ack_error(args) {
                    return Err(ChatError::SendFailed(error));
                }
                // Keep keystrokes typed while the ack was in flight.
                if self.draft == text {
                    self.draft.clear();
                }
                Ok(AckOutcome::Sent)
            }
        }
    }

    /// The draft changed (one keystroke).
    pub fn input_at(&mut self, text: &str, now: Instant) -> Vec<Emit> {
        if self.phase == Phase::Closed {
            return Vec::new();
        }
        text.clone_into(&mut self.draft);
        if self.phase != Phase::Joined {
            return Vec::new();
        }
        self.typing.keystroke_at(now).map(|signal| self.signal(signal)).into_iter().collect()
    }

    /// Submit the draft. A blank draft sends nothing.
    pub fn submit(&mut self) -> Vec<Emit> {
        if self.phase != Phase::Joined || self.draft.trim().is_empty() {
            return Vec::new();
        }
        let text = self.draft.clone();
        let mut out = vec![self.request(Outbound::SendMessage(text.clone()), PendingAck::Send { text })];
        if let Some(signal) = self.typing.message_sent() {
            out.push(self.signal(signal));
        }
        out
    }

    /// When the typing quiet interval expires, if it is running.
    #[must_use]
    pub fn typing_deadline(&self) -> Option<Instant> {
        self.typing.deadline()
    }

    /// Fire the typing timer if its deadline has passed.
    pub fn poll_typing_at(&mut self, now: Instant) -> Vec<Emit> {
        self.typing.poll_at(now).map(|signal| self.signal(signal)).into_iter().collect()
    }

    /// Tear the session down: cancel the typing deadline, return the final
    /// `stopTyping`, deregister every handler and drop pending requests.
    /// The caller sends what is returned and then closes the transport.
    /// Calling it again returns nothing.
    pub fn teardown(&mut self) -> Vec<Emit> {
        if self.phase == Phase::Closed {
            return Vec::new();
        }
        let out: Vec<Emit> = self.typing.teardown().map(|signal| self.signal(signal)).into_iter().collect();
        let removed = self.handlers.deregister_all();
        self.pending.clear();
        self.phase = Phase::Closed;
        debug!(handlers = removed, room = %self.params.room, "session: torn down");
        out
    }

    fn request(&mut self, event: Outbound, pending: PendingAck) -> Emit {
        let id = self.next_ack_id;
        self.next_ack_id += 1;
        self.pending.insert(id, pending);
        Emit { event, ack_id: Some(id) }
    }

    fn signal(&self, signal: TypingSignal) -> Emit {
        let event = match signal {
            TypingSignal::Typing => Outbound::Typing(self.params.clone()),
            TypingSignal::StopTyping => Outbound::StopTyping(self.params.clone()),
        };
        Emit { event, ack_id: None }
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
