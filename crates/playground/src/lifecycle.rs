//! Sandbox session scoping and exit-time teardown.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::services::SessionService;

type Teardown<C> = Box<dyn FnOnce(&mut C) + Send>;

/// Owns the sandbox session for the life of the process.
///
/// `C` is whatever the teardowns need mutable access to at exit (the run
/// controller in the CLI).
pub struct SessionLifecycle<C> {
    service: Arc<dyn SessionService>,
    teardowns: Vec<Teardown<C>>,
    session_error: Option<String>,
    cleaned_up: bool,
}

impl<C> SessionLifecycle<C> {
    pub fn new(service: Arc<dyn SessionService>) -> Self {
        Self {
            service,
            teardowns: Vec::new(),
            session_error: None,
            cleaned_up: false,
        }
    }

    /// Establishes the session cookie. Failure is recorded, not fatal: later
    /// calls may still work against a server that does not need it.
    pub async fn bootstrap(&mut self) -> bool {
        match self.service.bootstrap().await {
            Ok(()) => {
                self.session_error = None;
                true
            }
            Err(error) => {
                warn!(%error, "session bootstrap failed; continuing without a session");
                self.session_error = Some(error.to_string());
                false
            }
        }
    }

    pub fn session_error(&self) -> Option<&str> {
        self.session_error.as_deref()
    }

    pub fn register_teardown<F>(&mut self, teardown: F)
    where
        F: FnOnce(&mut C) + Send + 'static,
    {
        self.teardowns.push(Box::new(teardown));
    }

    pub fn is_cleaned_up(&self) -> bool {
        self.cleaned_up
    }

    /// Cleans up, then hands back `outcome`, so a failed command still
    /// releases the session.
    pub async fn finish<T>(&mut self, context: &mut C, outcome: T) -> T {
        self.cleanup(context).await;
        outcome
    }

    /// Runs every teardown once, in registration order, then releases the
    /// sandbox session. Later calls do nothing. Returns false if it already ran.
    pub async fn cleanup(&mut self, context: &mut C) -> bool {
        if self.cleaned_up {
            return false;
        }
        self.cleaned_up = true;

        for (index, teardown) in self.teardowns.drain(..).enumerate() {
            if catch_unwind(AssertUnwindSafe(|| teardown(context))).is_err() {
                warn!(index, "teardown panicked");
            }
        }

        match self.service.cleanup().await {
            Ok(()) => info!("sandbox session released"),
            Err(error) => debug!(%error, "session cleanup failed"),
        }
        true
    }
}
