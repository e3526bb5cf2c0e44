//! Message protocol definitions
//!
//! Server → client lines. Every message renders to exactly the bytes written
//! to the transport, terminated by a single newline.

use std::fmt;

use crate::error::{CommandError, UsernameError};

/// Greeting sent on connect, before any username is set
pub const WELCOME: &str = "Welcome to the chat server! Please set your username";

/// Server → Client message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// Greeting sent once per connection
    Welcome,
    /// Notice from the server: `[system]: <text>`
    System(String),
    /// Chat line from another user: `[<from>]: <text>`
    Chat { from: String, text: String },
}

impl ServerMessage {
    pub fn system(text: impl Into<String>) -> Self {
        ServerMessage::System(text.into())
    }

    pub fn chat(from: impl Into<String>, text: impl Into<String>) -> Self {
        ServerMessage::Chat {
            from: from.into(),
            text: text.into(),
        }
    }
}

impl fmt::Display for ServerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerMessage::Welcome => writeln!(f, "{WELCOME}"),
            ServerMessage::System(text) => writeln!(f, "[system]: {text}"),
            ServerMessage::Chat { from, text } => writeln!(f, "[{from}]: {text}"),
        }
    }
}

/// Convert a rejected username into the corrective prompt
impl From<UsernameError> for ServerMessage {
    fn from(err: UsernameError) -> Self {
        let text = match err {
            UsernameError::Empty => "Username cannot be empty. Please try again:",
            UsernameError::Invalid => {
                "Invalid username. Usernames can only contain letters, numbers, underscores, \
                 and hyphens, and must be 1-20 characters long. Please try again:"
            }
        };
        ServerMessage::system(text)
    }
}

/// Convert a CommandError into the notice sent back to the client
impl From<CommandError> for ServerMessage {
    fn from(err: CommandError) -> Self {
        let text = match err {
            CommandError::AlreadyInRoom => {
                "You are already in a room. Please leave it before joining another one."
            }
            CommandError::MissingRoomName => "Please provide a room name to join.",
            CommandError::RoomNotFound(_) => "Room does not exist.",
            CommandError::AlreadyMember => "You are already in the room",
            CommandError::NotInRoom => "You are not in any room.",
            CommandError::NobodyListening => "Nobody can hear you.",
        };
        ServerMessage::system(text)
    }
}
