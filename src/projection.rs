//! Presence and history projection.
//!
//! Folds inbound room events into the transcript, roster and typing set the
//! UI renders. Every fold is deterministic and idempotent under a repeated
//! identical event; none can fail.

use crate::protocol::{Message, Participant, RoomData};

// =============================================================================
// STATE
// =============================================================================

/// Messages received for the current room, in server arrival order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Participants currently in the room, as last broadcast by the server.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Roster {
    room: Option<String>,
    participants: Vec<Participant>,
}

impl Roster {
    #[must_use]
    pub fn room(&self) -> Option<&str> {
        self.room.as_deref()
    }

    #[must_use]
    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    #[must_use]
    pub fn contains_id(&self, id: &str) -> bool {
        self.participants.iter().any(|p| p.id == id)
    }
}

/// Names of other participants currently typing, in the order they started.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TypingSet {
    names: Vec<String>,
}

impl TypingSet {
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

// =============================================================================
// FOLDS
// =============================================================================

/// Replace the transcript wholesale with the replayed history.
pub fn apply_history(transcript: &mut Transcript, history: Vec<Message>) {
    transcript.messages = history;
}

/// Append one message. Never reorders and never deduplicates.
pub fn apply_message(transcript: &mut Transcript, msg: Message) {
    transcript.messages.push(msg);
}

/// Replace the roster wholesale.
pub fn apply_room_data(roster: &mut Roster, data: RoomData) {
    roster.room = data.room.filter(|room| !room.is_empty());
    roster.participants = data.users;
}

/// Add the local participant when the roster does not list it yet. The next
/// `roomData` replaces this entry along with everything else.
pub fn apply_self_entry(roster: &mut Roster, me: Participant) {
    let listed = if me.id.is_empty() {
        roster.participants.iter().any(|p| p.name == me.name)
    } else {
        roster.contains_id(&me.id)
    };
    if !listed {
        roster.participants.push(me);
    }
}

/// Add `name` unless it is the local participant or already present.
pub fn apply_typing(set: &mut TypingSet, name: &str, self_name: &str) {
    let name = name.trim();
    if name.is_empty() || name == self_name || set.contains(name) {
        return;
    }
    set.names.push(name.to_owned());
}

/// Remove `name` if present.
pub fn apply_stop_typing(set: &mut TypingSet, name: &str) {
    let name = name.trim();
    set.names.retain(|n| n != name);
}

/// Indicator text: `Bob is typing...` or `Bob, Cy are typing...`.
#[must_use]
pub fn typing_label(set: &TypingSet) -> Option<String> {
    match set.names.as_slice() {
        [] => None,
        [one] => Some(format!("{one} is typing...")),
        many => Some(format!("{} are typing...", many.join(", "))),
    }
}

#[cfg(test)]
#[path = "projection_test.rs"]
mod tests;
