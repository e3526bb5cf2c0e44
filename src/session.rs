//! Session struct definition
//!
//! Server-side state for one connected client. Mutable fields are only ever
//! touched by the hub task.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::debug;

use crate::message::ServerMessage;
use crate::protocol::SessionView;
use crate::types::{RoomName, SessionId, Username};

/// Outcome of a non-blocking enqueue onto an outbound buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    /// Buffer full; the message was discarded
    Dropped,
    /// The connection's writer is gone
    Closed,
}

/// Connected client state
///
/// Created by the connection adapter, then handed to the hub with the
/// connect event. The adapter keeps only the receiving end of the outbox.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    username: Option<Username>,
    room: Option<RoomName>,
    outbox: mpsc::Sender<ServerMessage>,
}

impl Session {
    pub fn new(id: SessionId, outbox: mpsc::Sender<ServerMessage>) -> Self {
        Self {
            id,
            username: None,
            room: None,
            outbox,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Returns the username if set, otherwise an empty string.
    pub fn display_name(&self) -> &str {
        self.username.as_ref().map_or("", Username::as_str)
    }

    pub fn has_username(&self) -> bool {
        self.username.is_some()
    }

    pub fn room(&self) -> Option<&RoomName> {
        self.room.as_ref()
    }

    pub(crate) fn set_username(&mut self, username: Username) {
        self.username = Some(username);
    }

    pub(crate) fn set_room(&mut self, room: RoomName) {
        self.room = Some(room);
    }

    pub(crate) fn take_room(&mut self) -> Option<RoomName> {
        self.room.take()
    }

    /// Snapshot used by the protocol layer
    pub fn view(&self) -> SessionView {
        SessionView {
            has_username: self.username.is_some(),
            in_room: self.room.is_some(),
        }
    }

    /// Enqueue a message without waiting
    pub fn deliver(&self, msg: ServerMessage) -> Delivery {
        match self.outbox.try_send(msg) {
            Ok(()) => Delivery::Delivered,
            Err(TrySendError::Full(_)) => {
                debug!("Outbox full for {}, message dropped", self.id);
                Delivery::Dropped
            }
            Err(TrySendError::Closed(_)) => Delivery::Closed,
        }
    }
}
