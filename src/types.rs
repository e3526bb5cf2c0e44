//! Basic type definitions for the chat server
//!
//! Provides newtype wrappers for type safety:
//! - `SessionId`: UUID-based unique session identifier
//! - `RoomName`: name of one of the rooms configured at startup
//! - `Username`: a display name that has passed validation

use std::borrow::Borrow;
use std::sync::LazyLock;

use regex::Regex;
use uuid::Uuid;

use crate::error::UsernameError;

static USERNAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,20}$").unwrap());

/// Unique session identifier (newtype pattern)
///
/// Wraps a UUID v4 for type-safe session identification.
/// Implements Hash and Eq for use as HashMap keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Create a new random session ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Room name, used as the key of the room registry
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoomName(pub String);

impl RoomName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RoomName {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for RoomName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl Borrow<str> for RoomName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RoomName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Validated display name
///
/// Letters, digits, underscores and hyphens, 1 to 20 characters.
/// Can only be obtained through [`Username::parse`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Username(String);

impl Username {
    /// Validate a candidate name. Surrounding whitespace is trimmed first.
    pub fn parse(input: &str) -> Result<Self, UsernameError> {
        let candidate = input.trim();
        if candidate.is_empty() {
            return Err(UsernameError::Empty);
        }
        if !USERNAME_PATTERN.is_match(candidate) {
            return Err(UsernameError::Invalid);
        }
        Ok(Self(candidate.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Username {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
