//! TCP accept loop

use tokio::net::TcpListener;
use tracing::{debug, error, info};

use crate::config::ConnectionSettings;
use crate::connection::handle_connection;
use crate::event::EventSender;

/// Accept connections forever, spawning an adapter task for each
///
/// Accept errors are logged and the loop carries on.
pub async fn serve(listener: TcpListener, events: EventSender, settings: ConnectionSettings) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                info!("New connection from {}", addr);
                if let Err(e) = stream.set_nodelay(true) {
                    debug!("Could not set TCP_NODELAY for {}: {}", addr, e);
                }
                let events = events.clone();

                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, events, settings).await {
                        error!("Connection handler error for {}: {}", addr, e);
                    }
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}
