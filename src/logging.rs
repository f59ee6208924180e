//! Tracing subscriber setup.
//!
//! Logs go to stderr or to `PLAYGROUND_LOG_FILE`; stdout carries program
//! output and is never written here.

use std::fs::OpenOptions;
use std::io;
use std::sync::Arc;

use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::EnvConfig;

const NOISY_CRATES: [&str; 5] = ["hyper", "hyper_util", "reqwest", "rustls", "tungstenite"];

/// Filter for the given config: an explicit `PLAYGROUND_LOG` directive wins,
/// otherwise `debug` when verbose or debug is on, `warn` when not.
pub fn build_filter(config: &EnvConfig, verbose: bool) -> EnvFilter {
    let base = match config.log_filter.as_deref() {
        Some(directive) => directive.to_owned(),
        None if verbose || config.debug => "debug".to_owned(),
        None => "warn".to_owned(),
    };

    let mut filter = EnvFilter::try_new(&base).unwrap_or_else(|_| EnvFilter::new("warn"));
    for name in NOISY_CRATES {
        if let Ok(directive) = format!("{name}=warn").parse() {
            filter = filter.add_directive(directive);
        }
    }
    filter
}

/// Installs the global subscriber. Calling it twice is harmless; the second
/// install is refused and the error returned.
pub fn init_logging(config: &EnvConfig, verbose: bool) -> io::Result<()> {
    let filter = build_filter(config, verbose);

    let result = match config.log_file.as_deref() {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_ansi(false).with_writer(Arc::new(file)))
                .try_init()
        }
        None => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false).with_writer(io::stderr))
            .try_init(),
    };

    result.map_err(|error| io::Error::new(io::ErrorKind::AlreadyExists, error.to_string()))
}
