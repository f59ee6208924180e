//! Terminal-side primitives for the sandbox playground client.
//!
//! # Public API Overview
//! - Split raw stdin bytes into keystroke units with [`KeystrokeSplitter`].
//! - Turn keystroke units into committed lines and interrupts with
//!   [`TerminalLineBuffer`].
//! - Hold the terminal in raw mode for the length of a live session with
//!   [`RawModeGuard`].
//! - Read `PLAYGROUND_*` settings with [`EnvConfig`] and install logging with
//!   [`init_logging`].

pub mod config;
pub mod logging;

pub mod core;
pub mod platform;

pub use crate::config::EnvConfig;
pub use crate::logging::init_logging;

/// Line buffering with local echo.
pub use crate::core::line_buffer::{FeedOutcome, LineAction, TerminalLineBuffer};

/// Input splitting for chunked terminal streams.
pub use crate::platform::keystrokes::KeystrokeSplitter;

/// Raw terminal mode.
#[cfg(unix)]
pub use crate::platform::raw_mode::RawModeGuard;
pub use crate::platform::raw_mode::stdin_is_terminal;
