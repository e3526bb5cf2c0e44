//! Line protocol interpretation
//!
//! Pure functions: given a snapshot of the session and one input line, decide
//! what the hub should do. Nothing here touches the registries.

use crate::error::UsernameError;
use crate::types::Username;

/// Leading character of every command line
pub const COMMAND_PREFIX: char = '/';

/// Lines sent in reply to `/help`
pub const HELP_LINES: [&str; 4] = [
    "/rooms - list of rooms",
    "/join [roomname] - join room",
    "/leave - leave current room",
    "/help - list of commands",
];

/// The parts of a session's state that decide how input is read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionView {
    pub has_username: bool,
    pub in_room: bool,
}

/// A parsed slash command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Rooms,
    /// `None` when no room name was given
    Join(Option<String>),
    Leave,
    Help,
    /// Unrecognized command token; ignored by the hub
    Unknown(String),
}

/// What the hub should do with one line of input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Candidate username accepted
    SetUsername(Username),
    /// Candidate username rejected; prompt again
    RejectUsername(UsernameError),
    Command(Command),
    /// Trimmed, non-empty chat text for the sender's room
    Chat(String),
    /// Chat text while not in a room
    NobodyListening,
    /// Nothing to do
    Ignore,
}

/// Interpret one input line against the session's current state
pub fn interpret(view: SessionView, input: &str) -> Action {
    if !view.has_username {
        return match Username::parse(input) {
            Ok(username) => Action::SetUsername(username),
            Err(err) => Action::RejectUsername(err),
        };
    }

    if input.starts_with(COMMAND_PREFIX) {
        return match parse_command(input) {
            Some(command) => Action::Command(command),
            None => Action::Ignore,
        };
    }

    if !view.in_room {
        return Action::NobodyListening;
    }

    let text = input.trim();
    if text.is_empty() {
        Action::Ignore
    } else {
        Action::Chat(text.to_string())
    }
}

/// Tokenize a command line
///
/// Strips one leading prefix and splits on whitespace. Returns `None` when no
/// command token remains (a bare `/`).
pub fn parse_command(input: &str) -> Option<Command> {
    let stripped = input.strip_prefix(COMMAND_PREFIX).unwrap_or(input);
    let mut tokens = stripped.split_whitespace();
    let name = tokens.next()?;

    let command = match name {
        "rooms" => Command::Rooms,
        "join" => Command::Join(tokens.next().map(str::to_string)),
        "leave" => Command::Leave,
        "help" => Command::Help,
        other => Command::Unknown(other.to_string()),
    };
    Some(command)
}
