//! Line-oriented TCP Chat Server Library
//!
//! Clients connect over plain TCP, pick a username, join one of a fixed set
//! of rooms and chat with everyone else in it. Every line is UTF-8 text
//! terminated by a newline, in both directions.
//!
//! # Features
//! - Username setup with validation
//! - Fixed rooms configured at startup
//! - `/rooms`, `/join <room>`, `/leave` and `/help` commands
//! - Room-scoped broadcast chat
//! - Disconnection handling
//!
//! # Architecture
//! Uses the Actor pattern with `mpsc` channels:
//! - `Hub` is the central actor owning all sessions and rooms
//! - Each connection runs a read task and a write task that talk to the hub
//!   only through events and the session's bounded outbox
//! - No locks needed - all state access goes through one ordered event queue
//!
//! Neither side ever blocks on the other: a connection that finds the event
//! queue full is disconnected, and a broadcast to a full outbox is dropped for
//! that recipient.
//!
//! # Example
//! ```ignore
//! use tokio::net::TcpListener;
//! use line_chat::{event_channel, serve, ConnectionSettings, Hub, RoomName};
//!
//! #[tokio::main]
//! async fn main() {
//!     let listener = TcpListener::bind("127.0.0.1:4000").await.unwrap();
//!     let (events, event_rx) = event_channel(32);
//!
//!     tokio::spawn(Hub::new(event_rx, [RoomName::from("lobby")]).run());
//!     serve(listener, events, ConnectionSettings::default()).await;
//! }
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod event;
pub mod hub;
pub mod message;
pub mod protocol;
pub mod room;
pub mod server;
pub mod session;
pub mod types;

// Re-export main types for convenience
pub use config::{Config, ConnectionSettings};
pub use connection::{handle_connection, Disconnector};
pub use error::{AppError, CommandError, SubmitError, UsernameError};
pub use event::{event_channel, EventSender, HubEvent, HubStats};
pub use hub::{BroadcastReport, Hub};
pub use message::ServerMessage;
pub use room::Room;
pub use server::serve;
pub use session::{Delivery, Session};
pub use types::{RoomName, SessionId, Username};
