//! Transport-only client primitives for the remote execution sandbox.
//!
//! This crate owns request/response building and parsing for the sandbox's
//! file-store, execution and session endpoints, the batch output stream
//! decoder, and the interactive session wire protocol and socket. It holds no
//! run state; sequencing runs and tracking edits is the caller's job.

pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod headers;
pub mod payload;
pub mod protocol;
pub mod stream;
pub mod url;
pub mod ws;

pub use client::{ByteStream, SandboxApiClient};
pub use config::SandboxApiConfig;
pub use error::SandboxApiError;
pub use events::{OutputChannel, OutputEvent, OutputLog};
pub use payload::{EntryKind, ExecutionType, FileTreeNode, InteractiveSession, Language};
pub use protocol::{ClientMessage, ServerMessage, INTERRUPT_SENTINEL};
pub use stream::BatchStreamDecoder;
pub use url::{normalize_base_url, resolve_websocket_url};
pub use ws::{Generation, SocketCommand, SocketHandle, TransportEvent, TransportEventKind};

pub use reqwest::StatusCode;
