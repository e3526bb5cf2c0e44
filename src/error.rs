//! Error types for the chat server
//!
//! Defines fatal application errors, the validation errors reported back
//! to clients, and event submission errors.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;
use tokio_util::codec::LinesCodecError;

/// Application-level errors
///
/// These are fatal for the connection (or the process at startup) and are
/// only ever logged, never sent to a client.
#[derive(Debug, Error)]
pub enum AppError {
    /// IO error (fatal)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Line framing error: over-long line or invalid UTF-8 (fatal)
    #[error("Line framing error: {0}")]
    Lines(#[from] LinesCodecError),

    /// The event queue refused an event (fatal for the connection)
    #[error("Event submission failed: {0}")]
    Submit(#[from] SubmitError),
}

/// Username validation errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum UsernameError {
    /// Nothing but whitespace was entered
    #[error("Username cannot be empty")]
    Empty,

    /// Characters outside `[A-Za-z0-9_-]`, or longer than 20 characters
    #[error("Invalid username")]
    Invalid,
}

/// Command and chat errors
///
/// Recovered locally: each one becomes a system notice to the sender.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// `/join` while already in a room
    #[error("Already in a room")]
    AlreadyInRoom,

    /// `/join` without a room name
    #[error("Missing room name")]
    MissingRoomName,

    /// `/join` with a name that is not a configured room
    #[error("Room not found: {0}")]
    RoomNotFound(String),

    /// Session already listed as a member of the target room
    #[error("Already a member of the room")]
    AlreadyMember,

    /// `/leave` while not in any room
    #[error("Not in room")]
    NotInRoom,

    /// Chat text sent while not in any room
    #[error("Nobody can hear you")]
    NobodyListening,
}

/// Event channel submission errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SubmitError {
    /// The event queue is at capacity
    #[error("Event channel full")]
    Full,

    /// The hub has stopped
    #[error("Event channel closed")]
    Closed,
}
