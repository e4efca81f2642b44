//! Action push channel.
//!
//! The lock controller pushes its recent action history over a WebSocket
//! as JSON arrays of `{action, action_type, action_time}`. One connection
//! is opened per [`PushChannel::start`]; there is no reconnection.

use crate::notice::ActionRecord;
use crate::state::{dispatch, DashboardEvent, Outcome, SharedDashboard};
use crate::{DoorPassError, Result};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

/// Events emitted by the push channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushEvent {
    Connected,
    /// A decoded action batch; `seq` counts batches on this connection.
    Batch { seq: u64, records: Vec<ActionRecord> },
    Disconnected,
    Error(String),
}

/// Decode one push payload.
///
/// Payloads that are valid JSON but not an array are ignored.
pub fn parse_batch(text: &str) -> Result<Option<Vec<ActionRecord>>> {
    let value: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| DoorPassError::Serialization(format!("Malformed push payload: {}", e)))?;
    if !value.is_array() {
        return Ok(None);
    }
    serde_json::from_value(value)
        .map(Some)
        .map_err(|e| DoorPassError::Serialization(format!("Invalid action record: {}", e)))
}

pub struct PushChannel {
    url: String,
    event_tx: mpsc::Sender<PushEvent>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl PushChannel {
    pub fn new(url: impl Into<String>, event_tx: mpsc::Sender<PushEvent>) -> Self {
        Self {
            url: url.into(),
            event_tx,
            shutdown_tx: None,
            handle: None,
        }
    }

    /// Open the connection in a background task.
    pub fn start(&mut self) {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
        self.shutdown_tx = Some(shutdown_tx);
        self.handle = Some(tokio::spawn(Self::run(
            self.url.clone(),
            self.event_tx.clone(),
            shutdown_rx,
        )));
    }

    /// Close the connection and wait for the background task to finish.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!("Push channel task failed: {}", e);
            }
        }
    }

    async fn run(
        url: String,
        event_tx: mpsc::Sender<PushEvent>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        let (ws_stream, _) = match connect_async(url.as_str()).await {
            Ok(connection) => connection,
            Err(e) => {
                warn!("Could not open push channel {}: {}", url, e);
                let _ = event_tx.send(PushEvent::Error(e.to_string())).await;
                let _ = event_tx.send(PushEvent::Disconnected).await;
                return;
            }
        };
        info!("Push channel connected to {}", url);
        let _ = event_tx.send(PushEvent::Connected).await;

        let (mut write, mut read) = ws_stream.split();
        let mut seq = 0u64;

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    let _ = write.send(Message::Close(None)).await;
                    break;
                }
                msg = read.next() => match msg {
                    Some(Ok(Message::Text(text))) => match parse_batch(&text) {
                        Ok(Some(records)) => {
                            seq += 1;
                            debug!("Push batch #{} with {} action(s)", seq, records.len());
                            let _ = event_tx.send(PushEvent::Batch { seq, records }).await;
                        }
                        Ok(None) => debug!("Ignoring non-array push payload"),
                        Err(e) => warn!("{}", e),
                    },
                    Some(Ok(Message::Ping(data))) => {
                        let _ = write.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        warn!("Push channel error: {}", e);
                        let _ = event_tx.send(PushEvent::Error(e.to_string())).await;
                        break;
                    }
                    Some(Ok(_)) => {}
                },
            }
        }

        info!("Push channel closed");
        let _ = event_tx.send(PushEvent::Disconnected).await;
    }
}

/// Apply push events to the dashboard until the channel closes.
pub async fn run_notice_feed(
    mut events: mpsc::Receiver<PushEvent>,
    state: SharedDashboard,
) -> Result<()> {
    while let Some(event) = events.recv().await {
        match event {
            PushEvent::Batch { seq, records } => {
                let count = records.len();
                let outcome = dispatch(
                    &state,
                    DashboardEvent::NoticesPushed {
                        seq,
                        batch: records,
                    },
                )?;
                if outcome == Outcome::Applied {
                    info!("Applied {} pushed action(s)", count);
                }
            }
            PushEvent::Connected => debug!("Notice feed attached"),
            PushEvent::Disconnected => break,
            PushEvent::Error(e) => warn!("Notice feed error: {}", e),
        }
    }
    Ok(())
}
