//! Platform-specific terminal integrations.

pub mod keystrokes;
pub mod raw_mode;

pub use keystrokes::KeystrokeSplitter;
#[cfg(unix)]
pub use raw_mode::RawModeGuard;
