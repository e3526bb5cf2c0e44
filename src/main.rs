//! Line chat server - Entry Point
//!
//! Parses the command line, binds the listener, starts the hub actor and
//! accepts connections until Ctrl-C.

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use line_chat::{event_channel, serve, Config, Hub};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=line_chat=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("line_chat=info")),
        )
        .init();

    // A missing or malformed port ends the process quietly
    let config = match Config::try_parse() {
        Ok(config) => config,
        Err(e) => {
            let _ = e.print();
            return Ok(());
        }
    };

    let addr = config.bind_addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Error starting server on {}: {}", addr, e);
            return Ok(());
        }
    };
    info!("Chat server listening on {}", addr);

    // Create the hub's event channel and start the actor
    let (events, event_rx) = event_channel(config.event_capacity as usize);
    let rooms = config.room_names();
    info!(
        "Serving rooms: {}",
        rooms.iter().map(|r| r.as_str()).collect::<Vec<_>>().join(", ")
    );
    tokio::spawn(Hub::new(event_rx, rooms).run());

    tokio::select! {
        _ = serve(listener, events, config.connection_settings()) => {}
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutting down");
        }
    }

    Ok(())
}
