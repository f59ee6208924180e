//! WebSocket transport for interactive sessions.
//!
//! The socket runs on its own task. The owner talks to it through a
//! [`SocketHandle`] and hears back through [`TransportEvent`]s tagged with the
//! generation the handle was opened for, so late events from a replaced socket
//! can be told apart from the live one.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::error::SandboxApiError;
use crate::protocol::ClientMessage;

/// Identifies one opened transport within a client.
pub type Generation = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEventKind {
    Opened,
    Message(String),
    Error(String),
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportEvent {
    pub generation: Generation,
    pub kind: TransportEventKind,
}

impl TransportEvent {
    pub fn new(generation: Generation, kind: TransportEventKind) -> Self {
        Self { generation, kind }
    }
}

/// Commands accepted by the socket task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketCommand {
    Send(ClientMessage),
    Close,
}

/// Owner side of one session socket.
#[derive(Debug)]
pub struct SocketHandle {
    generation: Generation,
    commands: UnboundedSender<SocketCommand>,
    task: Option<JoinHandle<()>>,
}

impl SocketHandle {
    pub fn new(generation: Generation, commands: UnboundedSender<SocketCommand>) -> Self {
        Self {
            generation,
            commands,
            task: None,
        }
    }

    pub fn with_task(mut self, task: JoinHandle<()>) -> Self {
        self.task = Some(task);
        self
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Queues a frame. Returns false when the socket task is gone.
    pub fn send(&self, message: ClientMessage) -> bool {
        self.commands.send(SocketCommand::Send(message)).is_ok()
    }

    /// Asks the socket task to close. Frames queued before are still written.
    pub fn close(self) {
        let _ = self.commands.send(SocketCommand::Close);
    }
}

/// Opens a session socket on a background task.
///
/// Must be called from inside a tokio runtime. Connection failures are
/// reported as [`TransportEventKind::Error`] on `events`.
pub fn spawn_session_socket(
    url: String,
    generation: Generation,
    connect_timeout: Option<Duration>,
    events: UnboundedSender<TransportEvent>,
) -> SocketHandle {
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(run_socket(
        url,
        generation,
        connect_timeout,
        commands_rx,
        events,
    ));
    SocketHandle::new(generation, commands_tx).with_task(task)
}

async fn run_socket(
    url: String,
    generation: Generation,
    connect_timeout: Option<Duration>,
    mut commands: UnboundedReceiver<SocketCommand>,
    events: UnboundedSender<TransportEvent>,
) {
    let emit = |kind: TransportEventKind| {
        let _ = events.send(TransportEvent::new(generation, kind));
    };

    debug!(%url, generation, "opening session socket");
    let connected = match connect_timeout {
        Some(limit) => match timeout(limit, connect_async(url.as_str())).await {
            Ok(result) => result.map_err(SandboxApiError::from),
            Err(_) => Err(SandboxApiError::WebSocket(format!(
                "connection timed out after {limit:?}"
            ))),
        },
        None => connect_async(url.as_str())
            .await
            .map_err(SandboxApiError::from),
    };

    let stream = match connected {
        Ok((stream, _response)) => stream,
        Err(error) => {
            warn!(generation, %error, "session socket failed to open");
            emit(TransportEventKind::Error(error.to_string()));
            return;
        }
    };

    info!(generation, "session socket open");
    emit(TransportEventKind::Opened);

    let (mut sink, mut inbound) = stream.split();
    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(SocketCommand::Send(message)) => {
                    let text = message.encode();
                    debug!(generation, frame = %text, "session frame out");
                    if let Err(error) = sink.send(Message::Text(text)).await {
                        emit(TransportEventKind::Error(SandboxApiError::from(error).to_string()));
                        break;
                    }
                }
                Some(SocketCommand::Close) | None => {
                    let _ = sink.send(Message::Close(None)).await;
                    let _ = sink.close().await;
                    emit(TransportEventKind::Closed);
                    break;
                }
            },
            frame = inbound.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    debug!(generation, frame = %text, "session frame in");
                    emit(TransportEventKind::Message(text));
                }
                Some(Ok(Message::Close(_))) | None => {
                    emit(TransportEventKind::Closed);
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(error)) => {
                    emit(TransportEventKind::Error(SandboxApiError::from(error).to_string()));
                    break;
                }
            },
        }
    }
    debug!(generation, "session socket task done");
}
