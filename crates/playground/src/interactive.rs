//! Interactive sessions: one bidirectional channel to a running program.
//!
//! State changes are decided by [`transition`], a pure function over
//! `(state, input)`. [`InteractiveSessionClient`] feeds it inputs and carries
//! out the transport effects it asks for. Every transport event is tagged with
//! the generation of the socket that produced it; only the live socket's
//! events reach the state machine.

use std::sync::Arc;

use sandbox_api::{
    ClientMessage, Generation, OutputChannel, OutputEvent, OutputLog, ServerMessage,
    SocketHandle, TransportEvent, TransportEventKind, INTERRUPT_SENTINEL,
};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

use crate::services::{ExecutionService, SessionConnector};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Active,
    Terminating,
    Closed,
    Failed,
}

impl SessionState {
    pub fn is_running(self) -> bool {
        matches!(self, Self::Connecting | Self::Active | Self::Terminating)
    }

    pub fn can_start(self) -> bool {
        matches!(self, Self::Idle | Self::Closed | Self::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionInput {
    Start,
    /// The session could not be created or its channel could not be opened.
    StartFailed(String),
    Opened,
    Message(ServerMessage),
    TransportError(String),
    PeerClosed,
    Stop,
    /// The transport handle has been released after a stop.
    Released,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEffect {
    Send(ClientMessage),
    CloseTransport,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub next: SessionState,
    pub output: Vec<(OutputChannel, String)>,
    pub effects: Vec<SessionEffect>,
}

impl Transition {
    fn stay(state: SessionState) -> Self {
        Self::to(state)
    }

    fn to(next: SessionState) -> Self {
        Self {
            next,
            output: Vec::new(),
            effects: Vec::new(),
        }
    }

    fn with_output(mut self, channel: OutputChannel, content: impl Into<String>) -> Self {
        self.output.push((channel, content.into()));
        self
    }

    fn with_effect(mut self, effect: SessionEffect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Next state, output lines and transport effects for `input` in `state`.
///
/// Defined for every pair; inputs that make no sense in a state leave it
/// unchanged with no output.
pub fn transition(state: SessionState, input: SessionInput) -> Transition {
    use SessionInput as Input;
    use SessionState as State;

    match (state, input) {
        (State::Idle | State::Closed | State::Failed, Input::Start) => {
            Transition::to(State::Connecting)
        }
        (State::Connecting, Input::StartFailed(error)) => {
            Transition::to(State::Failed)
                .with_output(OutputChannel::System, error)
                .with_effect(SessionEffect::CloseTransport)
        }
        (State::Connecting, Input::Opened) => Transition::to(State::Active),
        (State::Active | State::Terminating, Input::Message(message)) => {
            receive(state, message)
        }
        (State::Connecting | State::Active | State::Terminating, Input::TransportError(error)) => {
            Transition::to(State::Failed)
                .with_output(OutputChannel::System, format!("Connection error: {error}"))
                .with_effect(SessionEffect::CloseTransport)
        }
        (State::Connecting | State::Active | State::Terminating, Input::PeerClosed) => {
            Transition::to(State::Closed).with_effect(SessionEffect::CloseTransport)
        }
        (State::Active, Input::Stop) => Transition::to(State::Terminating)
            .with_effect(SessionEffect::Send(ClientMessage::stop()))
            .with_effect(SessionEffect::CloseTransport),
        (State::Terminating, Input::Released) => Transition::to(State::Closed),
        (_, Input::Stop) => Transition::to(State::Closed).with_effect(SessionEffect::CloseTransport),
        (state, _) => Transition::stay(state),
    }
}

fn receive(state: SessionState, message: ServerMessage) -> Transition {
    let terminal = message.is_terminal();
    let mut transition = match message {
        ServerMessage::Stdout { data } if !data.is_empty() => {
            Transition::stay(state).with_output(OutputChannel::Stdout, data)
        }
        ServerMessage::Stderr { data } if !data.is_empty() => {
            Transition::stay(state).with_output(OutputChannel::Stderr, data)
        }
        ServerMessage::System { status } if !status.is_empty() => {
            Transition::stay(state).with_output(OutputChannel::System, status)
        }
        _ => Transition::stay(state),
    };
    if terminal {
        transition.next = SessionState::Closed;
        transition.effects.push(SessionEffect::CloseTransport);
    }
    transition
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    /// A session is already running; nothing was opened.
    Rejected,
    /// The channel is being opened; `Opened` arrives as a transport event.
    Connecting { session_id: String },
    Failed(String),
}

pub struct InteractiveSessionClient {
    execution: Arc<dyn ExecutionService>,
    connector: Arc<dyn SessionConnector>,
    state: SessionState,
    output: OutputLog,
    next_generation: Generation,
    socket: Option<SocketHandle>,
    session_id: Option<String>,
    events_tx: UnboundedSender<TransportEvent>,
    events_rx: UnboundedReceiver<TransportEvent>,
}

impl InteractiveSessionClient {
    pub fn new(
        execution: Arc<dyn ExecutionService>,
        connector: Arc<dyn SessionConnector>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            execution,
            connector,
            state: SessionState::Idle,
            output: OutputLog::new(),
            next_generation: 0,
            socket: None,
            session_id: None,
            events_tx,
            events_rx,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    pub fn outputs(&self) -> &[OutputEvent] {
        self.output.events()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Generation of the live socket, if one is held.
    pub fn live_generation(&self) -> Option<Generation> {
        self.socket.as_ref().map(SocketHandle::generation)
    }

    /// Creates a session for `language` and starts opening its channel.
    pub async fn start(&mut self, language: &str) -> StartOutcome {
        if !self.state.can_start() {
            debug!(state = ?self.state, "start ignored; session already running");
            return StartOutcome::Rejected;
        }

        self.output.clear();
        self.session_id = None;
        self.next_generation += 1;
        let generation = self.next_generation;
        self.apply(SessionInput::Start);
        info!(language, generation, "interactive session starting");

        let session = match self.execution.create_interactive(language).await {
            Ok(session) => session,
            Err(error) => {
                let message = format!("Failed to start session: {error}");
                warn!(%error, "interactive session could not be created");
                self.apply(SessionInput::StartFailed(message.clone()));
                return StartOutcome::Failed(message);
            }
        };

        let socket = self
            .connector
            .connect(&session.ws_url, generation, self.events_tx.clone());
        self.socket = Some(socket);
        self.session_id = Some(session.session_id.clone());
        StartOutcome::Connecting {
            session_id: session.session_id,
        }
    }

    /// Sends `data` verbatim as stdin. Only an active session accepts input.
    pub fn send_input(&mut self, data: &str) -> bool {
        if self.state != SessionState::Active {
            return false;
        }
        match self.socket.as_ref() {
            Some(socket) => {
                debug!(bytes = data.len(), "stdin sent");
                socket.send(ClientMessage::stdin(data))
            }
            None => false,
        }
    }

    pub fn send_interrupt(&mut self) -> bool {
        self.send_input(INTERRUPT_SENTINEL)
    }

    /// Ends the session from any state. Calling it again is harmless.
    pub fn stop(&mut self) -> Vec<OutputEvent> {
        let mut appended = self.apply(SessionInput::Stop);
        if self.state == SessionState::Terminating {
            appended.extend(self.apply(SessionInput::Released));
        }
        info!(state = ?self.state, "interactive session stopped");
        appended
    }

    /// Appends a line produced locally, for example a failed pre-run sync.
    pub fn record(&mut self, channel: OutputChannel, content: impl Into<String>) -> OutputEvent {
        if !self.is_running() {
            self.output.clear();
        }
        self.output.push(channel, content).clone()
    }

    /// Waits for the next transport event from any socket this client opened.
    pub async fn next_transport_event(&mut self) -> Option<TransportEvent> {
        self.events_rx.recv().await
    }

    pub fn try_next_transport_event(&mut self) -> Option<TransportEvent> {
        self.events_rx.try_recv().ok()
    }

    /// Applies one transport event and returns the output it appended.
    /// Events from sockets other than the live one are dropped.
    pub fn handle_transport_event(&mut self, event: TransportEvent) -> Vec<OutputEvent> {
        if self.live_generation() != Some(event.generation) {
            debug!(
                generation = event.generation,
                live = ?self.live_generation(),
                "stale transport event dropped"
            );
            return Vec::new();
        }

        let input = match event.kind {
            TransportEventKind::Opened => SessionInput::Opened,
            TransportEventKind::Message(text) => match ServerMessage::decode(&text) {
                Ok(message) => SessionInput::Message(message),
                Err(violation) => {
                    warn!(%violation, "session frame skipped");
                    return Vec::new();
                }
            },
            TransportEventKind::Error(error) => SessionInput::TransportError(error),
            TransportEventKind::Closed => SessionInput::PeerClosed,
        };
        self.apply(input)
    }

    fn apply(&mut self, input: SessionInput) -> Vec<OutputEvent> {
        let previous = self.state;
        let transition = transition(self.state, input);
        self.state = transition.next;
        if previous != self.state {
            debug!(from = ?previous, to = ?self.state, "session state changed");
        }

        let appended = transition
            .output
            .into_iter()
            .map(|(channel, content)| self.output.push(channel, content).clone())
            .collect();

        for effect in transition.effects {
            match effect {
                SessionEffect::Send(message) => {
                    if let Some(socket) = self.socket.as_ref() {
                        socket.send(message);
                    }
                }
                SessionEffect::CloseTransport => {
                    if let Some(socket) = self.socket.take() {
                        socket.close();
                    }
                }
            }
        }
        appended
    }
}

impl Drop for InteractiveSessionClient {
    fn drop(&mut self) {
        if let Some(socket) = self.socket.take() {
            socket.close();
        }
    }
}
