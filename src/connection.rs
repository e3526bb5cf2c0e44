//! Connection adapter
//!
//! Bridges one accepted stream and the hub: a read task turns incoming lines
//! into `RawInput` events, a write task drains the session's outbox onto the
//! stream. Either side may end the connection; a [`Disconnector`] makes sure
//! the hub hears about it exactly once.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tracing::{debug, info, warn};

use crate::config::ConnectionSettings;
use crate::error::{AppError, SubmitError};
use crate::event::{EventSender, HubEvent};
use crate::message::ServerMessage;
use crate::session::Session;
use crate::types::SessionId;

/// One-shot disconnect trigger shared by the read and write tasks
#[derive(Debug)]
pub struct Disconnector {
    session_id: SessionId,
    events: EventSender,
    fired: AtomicBool,
}

impl Disconnector {
    pub fn new(session_id: SessionId, events: EventSender) -> Self {
        Self {
            session_id,
            events,
            fired: AtomicBool::new(false),
        }
    }

    /// Submit the disconnect event if nobody has yet
    ///
    /// Never waits: when the queue is full the submission moves to its own
    /// task, so aborting the caller cannot lose it. Returns true for the call
    /// that fired.
    pub fn disconnect(&self) -> bool {
        if self.fired.swap(true, Ordering::AcqRel) {
            return false;
        }
        let session_id = self.session_id;
        match self.events.try_submit(HubEvent::Disconnect { session_id }) {
            Ok(()) => {}
            Err(SubmitError::Full) => {
                let events = self.events.clone();
                tokio::spawn(async move {
                    let _ = events.submit(HubEvent::Disconnect { session_id }).await;
                });
            }
            Err(SubmitError::Closed) => {
                debug!("Hub gone before disconnect of {}", session_id);
            }
        }
        true
    }

    #[cfg(test)]
    fn has_fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }
}

/// Handle one accepted connection until it closes
///
/// Registers a new session with the hub, then runs the read and write tasks.
pub async fn handle_connection<S>(
    stream: S,
    events: EventSender,
    settings: ConnectionSettings,
) -> Result<(), AppError>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let session_id = SessionId::new();
    let (outbox, outbox_rx) = mpsc::channel::<ServerMessage>(settings.outbox_capacity);

    events
        .submit(HubEvent::Connect {
            session: Session::new(session_id, outbox),
        })
        .await?;

    let (reader, writer) = tokio::io::split(stream);
    let disconnector = Arc::new(Disconnector::new(session_id, events.clone()));

    let mut read_task = tokio::spawn(read_lines(
        session_id,
        reader,
        events,
        Arc::clone(&disconnector),
        settings.max_line_length,
    ));
    let mut write_task = tokio::spawn(write_messages(
        session_id,
        writer,
        outbox_rx,
        Arc::clone(&disconnector),
    ));

    tokio::select! {
        _ = &mut read_task => {
            // The hub closes the outbox once it handles the disconnect;
            // the writer flushes what is left and stops.
            let _ = write_task.await;
        }
        _ = &mut write_task => {
            read_task.abort();
        }
    }

    disconnector.disconnect();
    info!("Session {} connection closed", session_id);

    Ok(())
}

/// Stream → hub
async fn read_lines<R>(
    session_id: SessionId,
    reader: ReadHalf<R>,
    events: EventSender,
    disconnector: Arc<Disconnector>,
    max_line_length: usize,
) where
    R: AsyncRead,
{
    match forward_lines(session_id, reader, &events, max_line_length).await {
        Ok(()) => debug!("Session {} closed its stream", session_id),
        Err(AppError::Submit(SubmitError::Full)) => {
            warn!("Event queue full, disconnecting {}", session_id);
        }
        Err(AppError::Lines(LinesCodecError::MaxLineLengthExceeded)) => {
            warn!("Session {} sent a line over {} bytes", session_id, max_line_length);
        }
        Err(e) => debug!("Read task for {} stopped: {}", session_id, e),
    }

    disconnector.disconnect();
}

async fn forward_lines<R>(
    session_id: SessionId,
    reader: ReadHalf<R>,
    events: &EventSender,
    max_line_length: usize,
) -> Result<(), AppError>
where
    R: AsyncRead,
{
    let mut lines = FramedRead::new(reader, LinesCodec::new_with_max_length(max_line_length));

    while let Some(line) = lines.next().await {
        let line = line?;
        events.try_submit(HubEvent::RawInput { session_id, line })?;
    }
    Ok(())
}

/// Outbox → stream
async fn write_messages<W>(
    session_id: SessionId,
    mut writer: WriteHalf<W>,
    mut outbox: mpsc::Receiver<ServerMessage>,
    disconnector: Arc<Disconnector>,
) where
    W: AsyncWrite,
{
    if let Err(e) = drain_outbox(&mut writer, &mut outbox).await {
        warn!("Write error for {}: {}", session_id, e);
        // Stop accepting messages before telling the hub
        outbox.close();
        disconnector.disconnect();
        return;
    }

    let _ = writer.shutdown().await;
    debug!("Write task ended for {}", session_id);
}

async fn drain_outbox<W>(
    writer: &mut WriteHalf<W>,
    outbox: &mut mpsc::Receiver<ServerMessage>,
) -> Result<(), AppError>
where
    W: AsyncWrite,
{
    while let Some(msg) = outbox.recv().await {
        writer.write_all(msg.to_string().as_bytes()).await?;
    }
    Ok(())
}
