//! Typing debounce state machine.
//!
//! DESIGN
//! ======
//! Converts raw keystroke activity into `typing` / `stopTyping` transitions:
//!
//! ```text
//! idle   --keystroke-->            typing   emits Typing (once)
//! typing --keystroke-->            typing   reschedules the deadline
//! typing --deadline passes-->      idle     emits StopTyping
//! any    --message sent-->         idle     emits StopTyping, deadline cancelled
//! any    --teardown-->             closed   emits StopTyping once
//! ```
//!
//! There is at most one deadline at a time; a keystroke replaces it. The
//! machine holds no timer itself: callers pass `now` and sleep until
//! [`TypingDebounce::deadline`], so it is driven the same way in tests and in
//! the connection's event loop.

use std::time::Duration;

use tokio::time::Instant;

/// Transition the session must announce to the room.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TypingSignal {
    Typing,
    StopTyping,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TypingState {
    Idle,
    Typing { deadline: Instant },
    Closed,
}

#[derive(Debug)]
pub struct TypingDebounce {
    state: TypingState,
    idle_after: Duration,
}

impl TypingDebounce {
    #[must_use]
    pub fn new(idle_after: Duration) -> Self {
        Self { state: TypingState::Idle, idle_after }
    }

    #[must_use]
    pub fn state(&self) -> TypingState {
        self.state
    }

    /// The pending quiet-interval deadline, if one is scheduled.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            TypingState::Typing { deadline } => Some(deadline),
            TypingState::Idle | TypingState::Closed => None,
        }
    }

    /// Record a keystroke at `now`.
    pub fn keystroke_at(&mut self, now: Instant) -> Option<TypingSignal> {
        let deadline = now + self.idle_after;
        match self.state {
            TypingState::Closed => None,
            TypingState::Idle => {
                self.state = TypingState::Typing { deadline };
                Some(TypingSignal::Typing)
            }
            TypingState::Typing { .. } => {
                self.state = TypingState::Typing { deadline };
                None
            }
        }
    }

    /// Fire the quiet-interval timer if its deadline has passed.
    pub fn poll_at(&mut self, now: Instant) -> Option<TypingSignal> {
        match self.state {
            TypingState::Typing { deadline } if now >= deadline => {
                self.state = TypingState::Idle;
                Some(TypingSignal::StopTyping)
            }
            _ => None,
        }
    }

    /// A message was submitted. Sending always announces "not typing",
    /// even when the timer already fired.
    pub fn message_sent(&mut self) -> Option<TypingSignal> {
        if self.state == TypingState::Closed {
            return None;
        }
        self.state = TypingState::Idle;
        Some(TypingSignal::StopTyping)
    }

    /// Cancel any pending deadline for good. Returns `StopTyping` on the
    /// first call only, whatever the prior state.
    pub fn teardown(&mut self) -> Option<TypingSignal> {
        if self.state == TypingState::Closed {
            return None;
        }
        self.state = TypingState::Closed;
        Some(TypingSignal::StopTyping)
    }
}

#[cfg(test)]
#[path = "typing_test.rs"]
mod tests;
