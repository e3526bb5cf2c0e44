//! Events flowing into the hub
//!
//! Many connection adapters produce, one hub consumes. The channel is bounded;
//! producers that must not wait use [`EventSender::try_submit`].

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::oneshot;

use crate::error::SubmitError;
use crate::session::Session;
use crate::types::{RoomName, SessionId};

/// Events sent from connection adapters to the hub
#[derive(Debug)]
pub enum HubEvent {
    /// New connection accepted
    Connect { session: Session },
    /// One line of client input, newline stripped
    RawInput { session_id: SessionId, line: String },
    /// Connection closed
    Disconnect { session_id: SessionId },
    /// Registry snapshot request
    Stats { reply: oneshot::Sender<HubStats> },
}

/// Point-in-time view of the hub's registries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubStats {
    /// Connected sessions
    pub sessions: usize,
    /// Connected sessions that have chosen a username
    pub named: usize,
    /// Member count per room, sorted by room name
    pub rooms: Vec<(RoomName, usize)>,
}

impl HubStats {
    pub fn members_of(&self, room: &str) -> Option<usize> {
        self.rooms
            .iter()
            .find(|(name, _)| name.as_str() == room)
            .map(|(_, count)| *count)
    }
}

/// Producer handle for the hub's event channel
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::Sender<HubEvent>,
}

/// Create the bounded event channel
pub fn event_channel(capacity: usize) -> (EventSender, mpsc::Receiver<HubEvent>) {
    let (tx, rx) = mpsc::channel(capacity);
    (EventSender { tx }, rx)
}

impl EventSender {
    /// Submit without waiting
    pub fn try_submit(&self, event: HubEvent) -> Result<(), SubmitError> {
        self.tx.try_send(event).map_err(|err| match err {
            TrySendError::Full(_) => SubmitError::Full,
            TrySendError::Closed(_) => SubmitError::Closed,
        })
    }

    /// Submit, waiting for queue space
    ///
    /// Only used for connect and disconnect, which must not be lost.
    pub async fn submit(&self, event: HubEvent) -> Result<(), SubmitError> {
        self.tx.send(event).await.map_err(|_| SubmitError::Closed)
    }

    /// Ask the hub for a snapshot of its registries
    ///
    /// Returns `None` if the hub has stopped.
    pub async fn stats(&self) -> Option<HubStats> {
        let (reply, rx) = oneshot::channel();
        self.submit(HubEvent::Stats { reply }).await.ok()?;
        rx.await.ok()
    }
}
