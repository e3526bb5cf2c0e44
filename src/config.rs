//! Command line configuration

use clap::Parser;

use crate::types::RoomName;

/// Rooms served when none are given on the command line
pub const DEFAULT_ROOMS: [&str; 3] = ["room1", "room2", "room3"];

/// Per-connection limits handed to every connection adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionSettings {
    /// Pending messages a session's outbox can hold before broadcasts to it drop
    pub outbox_capacity: usize,
    /// Longest accepted input line in bytes, excluding the newline
    pub max_line_length: usize,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            outbox_capacity: 16,
            max_line_length: 64 * 1024,
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Parser)]
#[command(name = "line_chat")]
#[command(version)]
#[command(about = "Line-oriented TCP chat server with rooms")]
pub struct Config {
    /// TCP port to listen on
    pub port: u16,

    /// Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Room to serve (repeatable)
    #[arg(long = "room", value_name = "NAME", default_values_t = DEFAULT_ROOMS.map(String::from).to_vec())]
    pub rooms: Vec<String>,

    /// Capacity of the hub's event queue
    #[arg(long, default_value_t = 32, value_parser = clap::value_parser!(u32).range(1..))]
    pub event_capacity: u32,

    /// Capacity of each session's outbound buffer
    #[arg(long, default_value_t = 16, value_parser = clap::value_parser!(u32).range(1..))]
    pub outbox_capacity: u32,

    /// Maximum input line length in bytes
    #[arg(long, default_value_t = 64 * 1024)]
    pub max_line_length: usize,
}

impl Config {
    /// Address string for `TcpListener::bind`
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Configured rooms, duplicates removed
    pub fn room_names(&self) -> Vec<RoomName> {
        let mut names: Vec<RoomName> = self.rooms.iter().cloned().map(RoomName::from).collect();
        names.sort();
        names.dedup();
        names
    }

    pub fn connection_settings(&self) -> ConnectionSettings {
        ConnectionSettings {
            outbox_capacity: self.outbox_capacity as usize,
            max_line_length: self.max_line_length,
        }
    }
}
