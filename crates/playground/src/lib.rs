//! Remote sandbox playground runtime.
//!
//! ## Flow
//!
//! Edits live in [`FileSyncCache`]. A run first pushes every pending file to
//! the remote store; on success it either streams a batch run through
//! [`run_batch`] or opens an interactive session through
//! [`InteractiveSessionClient`], which [`RunController`] feeds with lines from
//! the terminal line buffer.
//!
//! ## Configuration
//!
//! The `playground` binary reads `PLAYGROUND_BASE_URL`, `PLAYGROUND_LOG`,
//! `PLAYGROUND_LOG_FILE` and `PLAYGROUND_DEBUG`; command-line flags win over
//! the environment.

pub mod batch;
pub mod display;
pub mod error;
pub mod file_cache;
pub mod interactive;
pub mod lifecycle;
pub mod runtime;
pub mod services;

pub use batch::{run_batch, BatchSummary};
pub use error::{ControllerError, LoadError, StoreError, SyncError};
pub use file_cache::{FileRecord, FileSyncCache};
pub use interactive::{
    transition, InteractiveSessionClient, SessionEffect, SessionInput, SessionState, StartOutcome,
    Transition,
};
pub use lifecycle::SessionLifecycle;
pub use runtime::{ExecutionMode, RunController, RunOutcome};
pub use services::{ExecutionService, FileStore, SessionConnector, SessionService};
