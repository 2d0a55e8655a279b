//! Persistent transcript channel
//!
//! A WebSocket to the backend that carries recording announcements and audio
//! chunks out and transcripts back. The connection task owns the socket;
//! everyone else holds a cloneable [`ChannelHandle`].

mod protocol;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use crate::config::ChannelConfig;
use crate::events::{Event, Inbox};
use crate::stt::{TranscriptEvent, TranscriptSource};
use crate::{Error, Result};

pub use protocol::{ClientMessage, ServerMessage};

/// Connectivity of the transcript channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelStatus {
    /// Socket open
    Connected,
    /// Socket lost; reconnecting
    Disconnected,
    /// Reconnection attempts exhausted
    GaveUp,
    /// The server reported an error
    ServerError(String),
}

/// Sending side of the transcript channel
#[derive(Debug, Clone)]
pub struct ChannelHandle {
    tx: mpsc::UnboundedSender<ClientMessage>,
    intent: Arc<watch::Sender<bool>>,
    connected: Arc<AtomicBool>,
}

impl ChannelHandle {
    /// Queue a message for the server
    ///
    /// # Errors
    ///
    /// Returns error if the channel task has exited
    pub fn send(&self, message: ClientMessage) -> Result<()> {
        tracing::debug!(event = message.name(), "channel send");
        self.tx
            .send(message)
            .map_err(|_| Error::Channel("transcript channel closed".to_string()))
    }

    /// Record whether the assistant wants to be recording
    ///
    /// A reconnect re-announces `start_recording` while this is set.
    pub fn set_recording_intent(&self, recording: bool) {
        self.intent.send_replace(recording);
    }

    /// Whether the socket is currently open
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// A handle wired to an in-process peer instead of a socket
    #[must_use]
    pub fn pair() -> (Self, ChannelPeer) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (intent, intent_rx) = watch::channel(false);
        let connected = Arc::new(AtomicBool::new(true));

        (
            Self {
                tx,
                intent: Arc::new(intent),
                connected: Arc::clone(&connected),
            },
            ChannelPeer {
                rx,
                intent: intent_rx,
                connected,
            },
        )
    }
}

/// Server side of [`ChannelHandle::pair`]
#[derive(Debug)]
pub struct ChannelPeer {
    rx: mpsc::UnboundedReceiver<ClientMessage>,
    intent: watch::Receiver<bool>,
    connected: Arc<AtomicBool>,
}

impl ChannelPeer {
    /// Next message from the client
    pub async fn recv(&mut self) -> Option<ClientMessage> {
        self.rx.recv().await
    }

    /// Next message if one is queued
    pub fn try_recv(&mut self) -> Option<ClientMessage> {
        self.rx.try_recv().ok()
    }

    /// Current recording intent
    #[must_use]
    pub fn recording_intent(&self) -> bool {
        *self.intent.borrow()
    }

    /// Simulate the socket going up or down
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Release);
    }
}

/// Connect to `url` in the background
///
/// Status changes and transcripts are posted to `inbox`.
#[must_use]
pub fn spawn(url: Url, config: ChannelConfig, inbox: Inbox) -> (ChannelHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let (intent, intent_rx) = watch::channel(false);
    let connected = Arc::new(AtomicBool::new(false));

    let handle = ChannelHandle {
        tx,
        intent: Arc::new(intent),
        connected: Arc::clone(&connected),
    };

    let task = tokio::spawn(run(url, config, inbox, rx, intent_rx, connected));
    (handle, task)
}

async fn run(
    url: Url,
    config: ChannelConfig,
    inbox: Inbox,
    mut outgoing: mpsc::UnboundedReceiver<ClientMessage>,
    intent: watch::Receiver<bool>,
    connected: Arc<AtomicBool>,
) {
    let mut failures = 0u32;

    loop {
        match connect_async(url.as_str()).await {
            Ok((ws, _)) => {
                failures = 0;

                // Anything queued while offline is stale
                while outgoing.try_recv().is_ok() {}

                connected.store(true, Ordering::Release);
                tracing::info!(url = %url, "transcript channel connected");
                let _ = inbox.send(Event::Channel(ChannelStatus::Connected));

                let owner_gone = session(ws, &inbox, &mut outgoing, &intent).await;

                connected.store(false, Ordering::Release);
                if owner_gone {
                    tracing::debug!("transcript channel owner gone");
                    return;
                }
                tracing::warn!("transcript channel disconnected");
                let _ = inbox.send(Event::Channel(ChannelStatus::Disconnected));
            }
            Err(e) => {
                failures += 1;
                tracing::warn!(
                    error = %e,
                    attempt = failures,
                    max = config.reconnect_attempts,
                    "transcript channel connect failed"
                );
                if failures >= config.reconnect_attempts {
                    tracing::error!("transcript channel gave up reconnecting");
                    let _ = inbox.send(Event::Channel(ChannelStatus::GaveUp));
                    return;
                }
            }
        }

        tokio::time::sleep(config.reconnect_delay).await;
    }
}

/// Pump one connection; returns true when the owner dropped every handle
async fn session<S>(
    ws: S,
    inbox: &Inbox,
    outgoing: &mut mpsc::UnboundedReceiver<ClientMessage>,
    intent: &watch::Receiver<bool>,
) -> bool
where
    S: futures::Stream<Item = std::result::Result<Message, tokio_tungstenite::tungstenite::Error>>
        + futures::Sink<Message, Error = tokio_tungstenite::tungstenite::Error>
        + Unpin,
{
    let (mut write, mut read) = ws.split();

    if *intent.borrow() {
        if let Ok(json) = ClientMessage::StartRecording.to_json() {
            tracing::debug!("re-announcing recording after reconnect");
            if write.send(Message::Text(json.into())).await.is_err() {
                return false;
            }
        }
    }

    loop {
        tokio::select! {
            message = outgoing.recv() => {
                let Some(message) = message else {
                    let _ = write.close().await;
                    return true;
                };
                match message.to_json() {
                    Ok(json) => {
                        if let Err(e) = write.send(Message::Text(json.into())).await {
                            tracing::warn!(error = %e, event = message.name(), "channel send failed");
                            return false;
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "channel encode failed"),
                }
            }
            frame = read.next() => {
                let frame = match frame {
                    Some(Ok(m)) => m,
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "channel read failed");
                        return false;
                    }
                    None => return false,
                };

                match frame {
                    Message::Text(text) => handle_server_message(&text, inbox),
                    Message::Close(frame) => {
                        tracing::debug!(?frame, "channel closed by server");
                        return false;
                    }
                    _ => {}
                }
            }
        }
    }
}

fn handle_server_message(text: &str, inbox: &Inbox) {
    match ServerMessage::parse(text) {
        Ok(ServerMessage::Connected) => tracing::debug!("server acknowledged connection"),
        Ok(ServerMessage::Transcript { text, is_final }) => {
            tracing::info!(text = %text, is_final, "server transcript");
            let _ = inbox.send(Event::Transcript(TranscriptEvent {
                text,
                is_final,
                source: TranscriptSource::Server,
            }));
        }
        Ok(ServerMessage::Error(message)) => {
            tracing::warn!(message = %message, "server error");
            let _ = inbox.send(Event::Channel(ChannelStatus::ServerError(message)));
        }
        Ok(ServerMessage::Other(event)) => tracing::trace!(event, "unhandled server event"),
        Err(e) => tracing::warn!(error = %e, "malformed server frame"),
    }
}
