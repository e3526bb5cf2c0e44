//! Room struct definition
//!
//! A named broadcast scope. The set of rooms is fixed at startup; only the
//! membership changes at runtime.

use std::collections::HashSet;

use crate::types::{RoomName, SessionId};

/// Chat room
#[derive(Debug)]
pub struct Room {
    /// Registry key
    pub name: RoomName,
    members: HashSet<SessionId>,
}

impl Room {
    /// Create an empty room
    pub fn new(name: RoomName) -> Self {
        Self {
            name,
            members: HashSet::new(),
        }
    }

    /// Add a member. Returns false if the session was already listed.
    pub fn add_member(&mut self, id: SessionId) -> bool {
        self.members.insert(id)
    }

    /// Remove a member. Returns false if the session was not listed.
    pub fn remove_member(&mut self, id: SessionId) -> bool {
        self.members.remove(&id)
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.members.contains(&id)
    }

    pub fn members(&self) -> impl Iterator<Item = SessionId> + '_ {
        self.members.iter().copied()
    }

    /// Every member except `id`
    pub fn others(&self, id: SessionId) -> impl Iterator<Item = SessionId> + '_ {
        self.members.iter().copied().filter(move |member| *member != id)
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
