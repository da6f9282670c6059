//! # roomchat
//!
//! Client session core for a room-based chat service spoken over Socket.IO.
//!
//! The crate is split the same way the data flows:
//! - `identity`: join parameter validation and the entry-screen query form
//! - `protocol`: event names, payload shapes, ack error rules
//! - `projection`: pure folds from room events to transcript, roster, typing set
//! - `typing`: the typing debounce state machine
//! - `session`: transport-free session state machine and handler table
//! - `connection`: the websocket driver task and the public `Connection` handle
//!
//! Wire framing lives in the sibling `packets` crate.

pub mod config;
pub mod connection;
pub mod error;
pub mod identity;
pub mod projection;
pub mod protocol;
pub mod session;
pub mod typing;

pub use config::ChatConfig;
pub use connection::{Connection, Notice};
pub use error::ChatError;
pub use identity::{InvalidParams, JoinParams};
pub use session::RoomState;
