//! Hub actor implementation
//!
//! The single task that owns every registry: connected sessions and rooms.
//! Events are handled one at a time in arrival order, so none of this state
//! needs a lock. The hub never writes to a transport and never waits on an
//! outbound buffer; every send is a `try_send` that may drop.

use std::collections::{BTreeMap, HashMap};

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::error::CommandError;
use crate::event::{HubEvent, HubStats};
use crate::message::ServerMessage;
use crate::protocol::{self, Action, Command, HELP_LINES};
use crate::room::Room;
use crate::session::{Delivery, Session};
use crate::types::{RoomName, SessionId};

/// Result of one broadcast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub dropped: usize,
}

/// The hub actor
pub struct Hub {
    /// All connected sessions: SessionId -> Session
    sessions: HashMap<SessionId, Session>,
    /// Configured rooms: RoomName -> Room
    rooms: BTreeMap<RoomName, Room>,
    /// Event receiver channel
    receiver: mpsc::Receiver<HubEvent>,
}

impl Hub {
    /// Create a hub serving the given fixed set of rooms
    pub fn new(
        receiver: mpsc::Receiver<HubEvent>,
        rooms: impl IntoIterator<Item = RoomName>,
    ) -> Self {
        let rooms = rooms
            .into_iter()
            .map(|name| (name.clone(), Room::new(name)))
            .collect();
        Self {
            sessions: HashMap::new(),
            rooms,
            receiver,
        }
    }

    /// Run the event loop until every sender is dropped
    pub async fn run(mut self) {
        info!("Hub started with {} rooms", self.rooms.len());

        while let Some(event) = self.receiver.recv().await {
            self.handle_event(event);
        }

        info!("Hub shutting down");
    }

    /// Apply a single event
    pub fn handle_event(&mut self, event: HubEvent) {
        match event {
            HubEvent::Connect { session } => self.handle_connect(session),
            HubEvent::RawInput { session_id, line } => self.handle_raw_input(session_id, &line),
            HubEvent::Disconnect { session_id } => self.handle_disconnect(session_id),
            HubEvent::Stats { reply } => {
                let _ = reply.send(self.stats());
            }
        }
    }

    pub fn session(&self, id: SessionId) -> Option<&Session> {
        self.sessions.get(&id)
    }

    pub fn room(&self, name: &str) -> Option<&Room> {
        self.rooms.get(name)
    }

    fn handle_connect(&mut self, session: Session) {
        let id = session.id();
        info!("Session {} connected", id);
        session.deliver(ServerMessage::Welcome);
        self.sessions.insert(id, session);
        debug!("Total sessions: {}", self.sessions.len());
    }

    fn handle_disconnect(&mut self, id: SessionId) {
        let Some(mut session) = self.sessions.remove(&id) else {
            debug!("Disconnect for unknown session {}, ignoring", id);
            return;
        };

        if let Some(room_name) = session.take_room() {
            if let Some(room) = self.rooms.get_mut(&room_name) {
                room.remove_member(id);
            }
            let notice = format!("{} just left the room.", session.display_name());
            self.broadcast(id, &room_name, ServerMessage::system(notice));
        }

        // Dropping the session closes its outbox; the writer drains and stops.
        drop(session);

        info!("Session {} disconnected", id);
        debug!("Total sessions: {}", self.sessions.len());
    }

    fn handle_raw_input(&mut self, id: SessionId, line: &str) {
        let Some(session) = self.sessions.get(&id) else {
            debug!("Input from unknown session {}, ignoring", id);
            return;
        };

        match protocol::interpret(session.view(), line) {
            Action::SetUsername(username) => {
                let Some(session) = self.sessions.get_mut(&id) else {
                    return;
                };
                info!("Session {} set username to '{}'", id, username);
                session.deliver(ServerMessage::system(format!("Username set to {username}")));
                session.deliver(ServerMessage::system(
                    "You can learn list of commands by typing /help",
                ));
                session.set_username(username);
            }
            Action::RejectUsername(err) => {
                debug!("Session {} rejected username: {}", id, err);
                self.reply(id, err.into());
            }
            Action::Command(command) => {
                if let Err(err) = self.handle_command(id, command) {
                    debug!("Session {} command failed: {}", id, err);
                    self.reply(id, err.into());
                }
            }
            Action::Chat(text) => self.handle_chat(id, text),
            Action::NobodyListening => self.reply(id, CommandError::NobodyListening.into()),
            Action::Ignore => {}
        }
    }

    fn handle_command(&mut self, id: SessionId, command: Command) -> Result<(), CommandError> {
        match command {
            Command::Rooms => {
                let names: Vec<&str> = self.rooms.keys().map(RoomName::as_str).collect();
                self.reply(id, ServerMessage::system(names.join("\n")));
                Ok(())
            }
            Command::Join(room) => self.handle_join(id, room),
            Command::Leave => self.handle_leave(id),
            Command::Help => {
                for line in HELP_LINES {
                    self.reply(id, ServerMessage::system(line));
                }
                Ok(())
            }
            Command::Unknown(name) => {
                debug!("Session {} sent unknown command '{}'", id, name);
                Ok(())
            }
        }
    }

    fn handle_join(&mut self, id: SessionId, room: Option<String>) -> Result<(), CommandError> {
        let Some(session) = self.sessions.get_mut(&id) else {
            return Ok(());
        };

        if session.room().is_some() {
            return Err(CommandError::AlreadyInRoom);
        }
        let name = room.ok_or(CommandError::MissingRoomName)?;
        let room = self
            .rooms
            .get_mut(name.as_str())
            .ok_or_else(|| CommandError::RoomNotFound(name.clone()))?;
        if !room.add_member(id) {
            return Err(CommandError::AlreadyMember);
        }

        let room_name = room.name.clone();
        session.set_room(room_name.clone());
        info!("Session {} joined room {}", id, room_name);

        session.deliver(ServerMessage::system(format!("You just joined: {room_name}")));
        let notice = format!("{} just joined the room.", session.display_name());
        self.broadcast(id, &room_name, ServerMessage::system(notice));
        Ok(())
    }

    fn handle_leave(&mut self, id: SessionId) -> Result<(), CommandError> {
        let Some(session) = self.sessions.get_mut(&id) else {
            return Ok(());
        };

        let room_name = session.take_room().ok_or(CommandError::NotInRoom)?;
        if let Some(room) = self.rooms.get_mut(&room_name) {
            room.remove_member(id);
        }
        info!("Session {} left room {}", id, room_name);

        session.deliver(ServerMessage::system(format!("You just left: {room_name}")));
        let notice = format!("{} just left the room.", session.display_name());
        self.broadcast(id, &room_name, ServerMessage::system(notice));
        Ok(())
    }

    fn handle_chat(&self, id: SessionId, text: String) {
        let Some(session) = self.sessions.get(&id) else {
            return;
        };
        let Some(room_name) = session.room() else {
            return;
        };

        let msg = ServerMessage::chat(session.display_name(), text);
        self.broadcast(id, room_name, msg);
    }

    /// Send `msg` to every member of `room` except `sender`
    ///
    /// Recipients with a full outbox miss this message; nobody else is affected.
    pub fn broadcast(
        &self,
        sender: SessionId,
        room: &RoomName,
        msg: ServerMessage,
    ) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        let Some(room) = self.rooms.get(room) else {
            return report;
        };

        for member in room.others(sender) {
            let Some(recipient) = self.sessions.get(&member) else {
                continue;
            };
            match recipient.deliver(msg.clone()) {
                Delivery::Delivered => report.delivered += 1,
                Delivery::Dropped | Delivery::Closed => report.dropped += 1,
            }
        }

        debug!(
            "Broadcast in {}: {} delivered, {} dropped",
            room.name, report.delivered, report.dropped
        );
        report
    }

    fn reply(&self, id: SessionId, msg: ServerMessage) {
        if let Some(session) = self.sessions.get(&id) {
            session.deliver(msg);
        }
    }

    fn stats(&self) -> HubStats {
        HubStats {
            sessions: self.sessions.len(),
            named: self.sessions.values().filter(|s| s.has_username()).count(),
            rooms: self
                .rooms
                .values()
                .map(|room| (room.name.clone(), room.member_count()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::oneshot;

    use super::*;
    use crate::event::event_channel;

    fn test_hub() -> Hub {
        let (_events, rx) = event_channel(8);
        Hub::new(rx, ["room1", "room2", "room3"].map(RoomName::from))
    }

    fn connect(hub: &mut Hub, capacity: usize) -> (SessionId, mpsc::Receiver<ServerMessage>) {
        let (tx, rx) = mpsc::channel(capacity);
        let id = SessionId::new();
        hub.handle_event(HubEvent::Connect {
            session: Session::new(id, tx),
        });
        (id, rx)
    }

    fn input(hub: &mut Hub, id: SessionId, line: &str) {
        hub.handle_event(HubEvent::RawInput {
            session_id: id,
            line: line.to_string(),
        });
    }

    fn drain(rx: &mut mpsc::Receiver<ServerMessage>) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg.to_string());
        }
        out
    }

    /// Connect and pick a username, discarding the setup replies
    fn named(hub: &mut Hub, name: &str, capacity: usize) -> (SessionId, mpsc::Receiver<ServerMessage>) {
        let (id, mut rx) = connect(hub, capacity);
        drain(&mut rx);
        input(hub, id, name);
        drain(&mut rx);
        (id, rx)
    }

    fn joined(
        hub: &mut Hub,
        name: &str,
        room: &str,
    ) -> (SessionId, mpsc::Receiver<ServerMessage>) {
        let (id, mut rx) = named(hub, name, 32);
        input(hub, id, &format!("/join {room}"));
        drain(&mut rx);
        (id, rx)
    }

    /// Session room fields and room member sets agree in both directions
    fn assert_consistent(hub: &Hub) {
        for (id, session) in &hub.sessions {
            if let Some(room) = session.room() {
                assert!(hub.rooms[room].contains(*id), "{id} missing from {room}");
            }
        }
        for room in hub.rooms.values() {
            for member in room.members() {
                let session = hub.sessions.get(&member).expect("member not connected");
                assert_eq!(session.room(), Some(&room.name));
            }
        }
    }

    #[test]
    fn test_connect_sends_welcome() {
        let mut hub = test_hub();
        let (id, mut rx) = connect(&mut hub, 8);

        assert!(hub.session(id).is_some());
        assert_eq!(
            drain(&mut rx),
            vec!["Welcome to the chat server! Please set your username\n"]
        );
    }

    #[test]
    fn test_username_rejected_then_accepted() {
        let mut hub = test_hub();
        let (id, mut rx) = connect(&mut hub, 8);
        drain(&mut rx);

        input(&mut hub, id, "");
        assert_eq!(
            drain(&mut rx),
            vec!["[system]: Username cannot be empty. Please try again:\n"]
        );

        input(&mut hub, id, "bad name");
        let replies = drain(&mut rx);
        assert_eq!(replies.len(), 1);
        assert!(replies[0].starts_with("[system]: Invalid username."));
        assert!(!hub.session(id).unwrap().has_username());

        input(&mut hub, id, "alice");
        assert_eq!(
            drain(&mut rx),
            vec![
                "[system]: Username set to alice\n",
                "[system]: You can learn list of commands by typing /help\n",
            ]
        );
        assert_eq!(hub.session(id).unwrap().display_name(), "alice");
    }

    #[test]
    fn test_rooms_command_lists_all_rooms() {
        let mut hub = test_hub();
        let (id, mut rx) = named(&mut hub, "alice", 8);

        input(&mut hub, id, "/rooms");
        assert_eq!(drain(&mut rx), vec!["[system]: room1\nroom2\nroom3\n"]);
    }

    #[test]
    fn test_help_command() {
        let mut hub = test_hub();
        let (id, mut rx) = named(&mut hub, "alice", 8);

        input(&mut hub, id, "/help");
        let replies = drain(&mut rx);
        assert_eq!(replies.len(), HELP_LINES.len());
        assert_eq!(replies[0], "[system]: /rooms - list of rooms\n");
    }

    #[test]
    fn test_unknown_command_is_silent() {
        let mut hub = test_hub();
        let (id, mut rx) = named(&mut hub, "alice", 8);

        input(&mut hub, id, "/dance");
        input(&mut hub, id, "/");
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_join_confirms_and_notifies() {
        let mut hub = test_hub();
        let (alice, mut alice_rx) = joined(&mut hub, "alice", "room1");
        let (bob, mut bob_rx) = named(&mut hub, "bob", 8);

        input(&mut hub, bob, "/join room1");

        assert_eq!(drain(&mut bob_rx), vec!["[system]: You just joined: room1\n"]);
        assert_eq!(
            drain(&mut alice_rx),
            vec!["[system]: bob just joined the room.\n"]
        );
        let room = hub.room("room1").unwrap();
        assert!(room.contains(alice));
        assert!(room.contains(bob));
        assert_consistent(&hub);
    }

    #[test]
    fn test_second_join_fails_without_leave() {
        let mut hub = test_hub();
        let (id, mut rx) = joined(&mut hub, "alice", "room1");

        input(&mut hub, id, "/join room2");

        assert_eq!(
            drain(&mut rx),
            vec!["[system]: You are already in a room. Please leave it before joining another one.\n"]
        );
        assert_eq!(hub.session(id).unwrap().room(), Some(&RoomName::from("room1")));
        assert!(hub.room("room1").unwrap().contains(id));
        assert!(!hub.room("room2").unwrap().contains(id));
        assert_consistent(&hub);
    }

    #[test]
    fn test_join_rejections() {
        let mut hub = test_hub();
        let (id, mut rx) = named(&mut hub, "alice", 8);

        input(&mut hub, id, "/join");
        assert_eq!(
            drain(&mut rx),
            vec!["[system]: Please provide a room name to join.\n"]
        );

        input(&mut hub, id, "/join lobby");
        assert_eq!(drain(&mut rx), vec!["[system]: Room does not exist.\n"]);

        assert!(hub.session(id).unwrap().room().is_none());
        assert!(hub.rooms.values().all(Room::is_empty));
    }

    #[test]
    fn test_join_when_already_listed() {
        let mut hub = test_hub();
        let (id, mut rx) = named(&mut hub, "alice", 8);
        hub.rooms.get_mut("room1").unwrap().add_member(id);

        assert_eq!(
            hub.handle_join(id, Some("room1".to_string())),
            Err(CommandError::AlreadyMember)
        );
        assert!(hub.session(id).unwrap().room().is_none());
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_leave_without_join() {
        let mut hub = test_hub();
        let (id, mut rx) = named(&mut hub, "alice", 8);

        input(&mut hub, id, "/leave");

        assert_eq!(drain(&mut rx), vec!["[system]: You are not in any room.\n"]);
        assert!(hub.session(id).unwrap().room().is_none());
        assert_consistent(&hub);
    }

    #[test]
    fn test_leave_confirms_and_notifies() {
        let mut hub = test_hub();
        let (alice, mut alice_rx) = joined(&mut hub, "alice", "room1");
        let (bob, mut bob_rx) = joined(&mut hub, "bob", "room1");
        drain(&mut alice_rx);

        input(&mut hub, bob, "/leave");

        assert_eq!(drain(&mut bob_rx), vec!["[system]: You just left: room1\n"]);
        assert_eq!(
            drain(&mut alice_rx),
            vec!["[system]: bob just left the room.\n"]
        );
        assert!(!hub.room("room1").unwrap().contains(bob));
        assert!(hub.room("room1").unwrap().contains(alice));
        assert_consistent(&hub);

        // Can join another room afterwards
        input(&mut hub, bob, "/join room2");
        assert_eq!(drain(&mut bob_rx), vec!["[system]: You just joined: room2\n"]);
        assert!(drain(&mut alice_rx).is_empty());
    }

    #[test]
    fn test_chat_reaches_others_but_not_sender() {
        let mut hub = test_hub();
        let (_alice, mut alice_rx) = joined(&mut hub, "alice", "room1");
        let (bob, mut bob_rx) = joined(&mut hub, "bob", "room1");
        let (_carol, mut carol_rx) = joined(&mut hub, "carol", "room1");
        let (_dave, mut dave_rx) = joined(&mut hub, "dave", "room2");
        drain(&mut alice_rx);
        drain(&mut bob_rx);

        input(&mut hub, bob, "  hi  ");

        assert_eq!(drain(&mut alice_rx), vec!["[bob]: hi\n"]);
        assert_eq!(drain(&mut carol_rx), vec!["[bob]: hi\n"]);
        assert!(drain(&mut bob_rx).is_empty());
        assert!(drain(&mut dave_rx).is_empty());
    }

    #[test]
    fn test_chat_outside_room() {
        let mut hub = test_hub();
        let (id, mut rx) = named(&mut hub, "alice", 8);

        input(&mut hub, id, "hello?");
        assert_eq!(drain(&mut rx), vec!["[system]: Nobody can hear you.\n"]);
    }

    #[test]
    fn test_blank_chat_is_dropped() {
        let mut hub = test_hub();
        let (_alice, mut alice_rx) = joined(&mut hub, "alice", "room1");
        let (bob, mut bob_rx) = joined(&mut hub, "bob", "room1");
        drain(&mut alice_rx);

        input(&mut hub, bob, "   ");

        assert!(drain(&mut alice_rx).is_empty());
        assert!(drain(&mut bob_rx).is_empty());
    }

    #[test]
    fn test_broadcast_alone_in_room() {
        let mut hub = test_hub();
        let (alice, mut alice_rx) = joined(&mut hub, "alice", "room1");

        let report = hub.broadcast(alice, &RoomName::from("room1"), ServerMessage::chat("alice", "echo?"));

        assert_eq!(report, BroadcastReport::default());
        assert!(drain(&mut alice_rx).is_empty());
    }

    #[test]
    fn test_broadcast_drops_for_full_recipient_only() {
        let mut hub = test_hub();
        let (alice, mut alice_rx) = joined(&mut hub, "alice", "room1");
        let (_bob, mut bob_rx) = joined(&mut hub, "bob", "room1");

        // Carol's outbox holds two messages and is never drained below
        let (carol, mut carol_rx) = connect(&mut hub, 2);
        drain(&mut carol_rx);
        input(&mut hub, carol, "carol");
        drain(&mut carol_rx);
        input(&mut hub, carol, "/join room1");
        drain(&mut carol_rx);
        drain(&mut alice_rx);
        drain(&mut bob_rx);

        input(&mut hub, alice, "one");
        input(&mut hub, alice, "two");
        let report = hub.broadcast(alice, &RoomName::from("room1"), ServerMessage::chat("alice", "three"));

        assert_eq!(report, BroadcastReport { delivered: 1, dropped: 1 });
        assert_eq!(
            drain(&mut bob_rx),
            vec!["[alice]: one\n", "[alice]: two\n", "[alice]: three\n"]
        );
        assert_eq!(drain(&mut carol_rx), vec!["[alice]: one\n", "[alice]: two\n"]);
    }

    #[test]
    fn test_disconnect_leaves_room_and_notifies() {
        let mut hub = test_hub();
        let (alice, mut alice_rx) = joined(&mut hub, "alice", "room1");
        let (bob, mut bob_rx) = joined(&mut hub, "bob", "room1");
        drain(&mut alice_rx);

        hub.handle_event(HubEvent::Disconnect { session_id: bob });

        assert_eq!(
            drain(&mut alice_rx),
            vec!["[system]: bob just left the room.\n"]
        );
        assert!(hub.session(bob).is_none());
        assert!(!hub.room("room1").unwrap().contains(bob));
        assert!(hub.room("room1").unwrap().contains(alice));
        // Outbox closed once the hub dropped the session
        assert_eq!(
            bob_rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        );
        assert_consistent(&hub);
    }

    #[test]
    fn test_disconnect_is_idempotent() {
        let mut hub = test_hub();
        let (alice, mut alice_rx) = joined(&mut hub, "alice", "room1");
        let (bob, _bob_rx) = joined(&mut hub, "bob", "room1");
        drain(&mut alice_rx);

        hub.handle_event(HubEvent::Disconnect { session_id: bob });
        hub.handle_event(HubEvent::Disconnect { session_id: bob });

        assert_eq!(drain(&mut alice_rx).len(), 1);
        assert_eq!(hub.sessions.len(), 1);
        assert_eq!(hub.room("room1").unwrap().member_count(), 1);
        assert!(hub.session(alice).is_some());
        assert_consistent(&hub);
    }

    #[test]
    fn test_events_after_disconnect_are_noops() {
        let mut hub = test_hub();
        let (_alice, mut alice_rx) = joined(&mut hub, "alice", "room1");
        let (bob, _bob_rx) = joined(&mut hub, "bob", "room1");
        drain(&mut alice_rx);
        hub.handle_event(HubEvent::Disconnect { session_id: bob });
        drain(&mut alice_rx);

        input(&mut hub, bob, "still here?");
        input(&mut hub, bob, "/join room2");

        assert!(drain(&mut alice_rx).is_empty());
        assert!(hub.session(bob).is_none());
        assert!(hub.room("room2").unwrap().is_empty());
    }

    #[test]
    fn test_disconnect_before_username() {
        let mut hub = test_hub();
        let (id, _rx) = connect(&mut hub, 8);

        hub.handle_event(HubEvent::Disconnect { session_id: id });

        assert!(hub.sessions.is_empty());
    }

    #[tokio::test]
    async fn test_stats_request() {
        let mut hub = test_hub();
        let (_alice, _alice_rx) = joined(&mut hub, "alice", "room2");
        let (_anon, _anon_rx) = connect(&mut hub, 8);

        let (reply, rx) = oneshot::channel();
        hub.handle_event(HubEvent::Stats { reply });
        let stats = rx.await.unwrap();

        assert_eq!(stats.sessions, 2);
        assert_eq!(stats.named, 1);
        assert_eq!(stats.members_of("room1"), Some(0));
        assert_eq!(stats.members_of("room2"), Some(1));
        assert_eq!(stats.rooms.len(), 3);
    }

    #[tokio::test]
    async fn test_run_processes_events_in_order() {
        let (events, rx) = event_channel(16);
        let hub = Hub::new(rx, ["room1"].map(RoomName::from));
        let handle = tokio::spawn(hub.run());

        let (tx, mut out) = mpsc::channel(16);
        let id = SessionId::new();
        events
            .submit(HubEvent::Connect {
                session: Session::new(id, tx),
            })
            .await
            .unwrap();
        for line in ["alice", "/join room1"] {
            events
                .submit(HubEvent::RawInput {
                    session_id: id,
                    line: line.to_string(),
                })
                .await
                .unwrap();
        }

        let stats = events.stats().await.unwrap();
        assert_eq!(stats.named, 1);
        assert_eq!(stats.members_of("room1"), Some(1));
        assert_eq!(
            drain(&mut out),
            vec![
                "Welcome to the chat server! Please set your username\n",
                "[system]: Username set to alice\n",
                "[system]: You can learn list of commands by typing /help\n",
                "[system]: You just joined: room1\n",
            ]
        );

        drop(events);
        handle.await.unwrap();
    }
}
