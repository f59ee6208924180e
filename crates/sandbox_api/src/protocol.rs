//! Interactive session wire protocol.
//!
//! Both directions are JSON text frames tagged by `type`. Inbound frames are
//! decoded once into [`ServerMessage`]; anything that does not match a known
//! variant is reported as [`ProtocolViolation`] so callers can skip it.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stdin payload the sandbox maps to SIGINT for the running program.
pub const INTERRUPT_SENTINEL: &str = "__CTRL_C__";

/// `system` statuses after which the sandbox closes the session.
pub const TERMINAL_STATUSES: &[&str] = &[
    "terminated",
    "program_exited",
    "exited",
    "stopped",
    "timeout",
];

/// Frames sent by the sandbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Stdout {
        #[serde(default)]
        data: String,
    },
    Stderr {
        #[serde(default)]
        data: String,
    },
    System {
        #[serde(default)]
        status: String,
    },
}

impl ServerMessage {
    pub fn decode(text: &str) -> Result<Self, ProtocolViolation> {
        serde_json::from_str(text).map_err(|error| ProtocolViolation {
            frame: text.to_owned(),
            reason: error.to_string(),
        })
    }

    /// Whether this frame ends the session.
    pub fn is_terminal(&self) -> bool {
        match self {
            Self::System { status } => is_terminal_status(status),
            _ => false,
        }
    }
}

pub fn is_terminal_status(status: &str) -> bool {
    let status = status.trim();
    TERMINAL_STATUSES
        .iter()
        .any(|terminal| status.eq_ignore_ascii_case(terminal))
}

/// Control actions understood by the sandbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlAction {
    Stop,
}

/// Frames sent to the sandbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Stdin { data: String },
    Control { action: ControlAction },
}

impl ClientMessage {
    pub fn stdin(data: impl Into<String>) -> Self {
        Self::Stdin { data: data.into() }
    }

    pub fn stop() -> Self {
        Self::Control {
            action: ControlAction::Stop,
        }
    }

    pub fn encode(&self) -> String {
        match serde_json::to_string(self) {
            Ok(text) => text,
            // Both variants hold only strings and unit enums.
            Err(_) => String::from("{}"),
        }
    }
}

/// An inbound frame that is not part of the protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolViolation {
    pub frame: String,
    pub reason: String,
}

impl fmt::Display for ProtocolViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed session frame ({}): {}", self.reason, self.frame)
    }
}

impl std::error::Error for ProtocolViolation {}
