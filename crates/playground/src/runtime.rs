//! Run controller: the one place that sequences edits, syncs and runs.
//!
//! A batch run and an interactive session never overlap; `run` is rejected
//! while either is live. Every run first pushes pending files to the store and
//! aborts if any push fails.

use std::sync::Arc;

use sandbox_api::{
    FileTreeNode, Language, OutputChannel, OutputEvent, OutputLog, TransportEvent,
};
use sandbox_term::{LineAction, TerminalLineBuffer};
use tracing::{error, info, warn};

use crate::batch::{run_batch, BatchSummary};
use crate::error::ControllerError;
use crate::file_cache::FileSyncCache;
use crate::interactive::{InteractiveSessionClient, SessionState, StartOutcome};
use crate::services::{ExecutionService, FileStore, SessionConnector};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ExecutionMode {
    Batch,
    #[default]
    Interactive,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Another run is live; nothing happened.
    Rejected,
    Batch(BatchSummary),
    Interactive(StartOutcome),
}

pub struct RunController {
    store: Arc<dyn FileStore>,
    execution: Arc<dyn ExecutionService>,
    cache: FileSyncCache,
    language: Option<Language>,
    mode: ExecutionMode,
    stdin: String,
    batch_output: OutputLog,
    batch_running: bool,
    session: InteractiveSessionClient,
    line_buffer: TerminalLineBuffer,
}

impl RunController {
    pub fn new(
        store: Arc<dyn FileStore>,
        execution: Arc<dyn ExecutionService>,
        connector: Arc<dyn SessionConnector>,
    ) -> Self {
        let session = InteractiveSessionClient::new(Arc::clone(&execution), connector);
        Self {
            store,
            execution,
            cache: FileSyncCache::new(),
            language: None,
            mode: ExecutionMode::default(),
            stdin: String::new(),
            batch_output: OutputLog::new(),
            batch_running: false,
            session,
            line_buffer: TerminalLineBuffer::new(),
        }
    }

    pub fn cache(&self) -> &FileSyncCache {
        &self.cache
    }

    pub fn language(&self) -> Option<&Language> {
        self.language.as_ref()
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn session_state(&self) -> SessionState {
        self.session.state()
    }

    pub fn is_running(&self) -> bool {
        self.batch_running || self.session.is_running()
    }

    /// Switches language: the cache starts over with the language's entry file
    /// holding its starter code. Returns the remote file tree.
    pub async fn select_language(
        &mut self,
        language: Language,
    ) -> Result<Vec<FileTreeNode>, ControllerError> {
        if self.is_running() {
            return Err(ControllerError::RunInProgress);
        }

        self.cache.reset();
        self.batch_output.clear();
        let entry = language.file_name.clone();

        let tree = match self.store.tree().await {
            Ok(tree) => tree,
            Err(error) => {
                warn!(%error, "file tree unavailable");
                Vec::new()
            }
        };

        if !entry.is_empty() {
            self.cache.set_entry_file(&entry);
            // The entry file stays pending until the first run writes it.
            if let Err(error) = self.store.ensure_exists(&entry).await {
                warn!(path = %entry, %error, "entry file could not be created");
            }
            self.cache.create(&entry, language.code_preview.clone());
        }

        info!(language = %language.language_name, entry = %entry, "language selected");
        self.language = Some(language);
        Ok(tree)
    }

    pub async fn open_file(&mut self, path: &str) -> Result<(), ControllerError> {
        self.cache.open(path, self.store.as_ref()).await?;
        Ok(())
    }

    /// Creates `path` remotely, then caches it as an empty active file.
    pub async fn create_file(&mut self, path: &str) -> Result<(), ControllerError> {
        self.store
            .ensure_exists(path)
            .await
            .map_err(|source| ControllerError::store("create", path, source))?;
        self.cache.create(path, "");
        Ok(())
    }

    pub fn close_file(&mut self, path: &str) -> bool {
        let running = self.is_running();
        self.cache.close(path, running)
    }

    pub async fn delete_file(&mut self, path: &str) -> Result<(), ControllerError> {
        if self.cache.entry_file() == Some(path) {
            return Err(ControllerError::EntryFileProtected {
                path: path.to_owned(),
            });
        }
        if self.is_running() {
            return Err(ControllerError::RunInProgress);
        }

        let language = self
            .language
            .as_ref()
            .map(|language| language.language_name.as_str());
        self.store
            .delete(path, language)
            .await
            .map_err(|source| ControllerError::store("delete", path, source))?;
        self.cache.forget(path);
        info!(path, "file deleted");
        Ok(())
    }

    pub fn set_active(&mut self, path: &str) -> Result<(), ControllerError> {
        if self.cache.set_active(path) {
            Ok(())
        } else {
            Err(ControllerError::NotOpen {
                path: path.to_owned(),
            })
        }
    }

    pub fn edit_active(&mut self, content: impl Into<String>) -> bool {
        self.cache.edit_active(content)
    }

    pub fn set_stdin(&mut self, stdin: impl Into<String>) {
        self.stdin = stdin.into();
    }

    pub fn set_mode(&mut self, mode: ExecutionMode) -> Result<(), ControllerError> {
        if self.is_running() {
            return Err(ControllerError::RunInProgress);
        }
        self.mode = mode;
        Ok(())
    }

    /// Syncs pending files, then starts a run in the current mode.
    ///
    /// Batch runs complete before this returns, with each event passed to
    /// `on_output` as it arrives. Interactive runs return once the channel is
    /// being opened; their output comes through
    /// [`RunController::handle_transport_event`].
    pub async fn run(
        &mut self,
        on_output: &mut dyn FnMut(&OutputEvent),
    ) -> Result<RunOutcome, ControllerError> {
        let language_name = self
            .language
            .as_ref()
            .map(|language| language.language_name.clone())
            .ok_or(ControllerError::NoLanguage)?;
        if self.cache.active_path().is_none() {
            return Err(ControllerError::NoActiveFile);
        }
        if self.is_running() {
            return Ok(RunOutcome::Rejected);
        }

        if let Err(sync_error) = self.cache.sync_pending(self.store.as_ref()).await {
            error!(path = %sync_error.path, error = %sync_error.source, "pre-run sync failed");
            let event = self.record_error(sync_error.to_string());
            on_output(&event);
            return Err(sync_error.into());
        }

        match self.mode {
            ExecutionMode::Batch => {
                self.batch_running = true;
                self.batch_output.clear();
                let execution = Arc::clone(&self.execution);
                let log = &mut self.batch_output;
                let summary = run_batch(execution.as_ref(), &language_name, &self.stdin, |event| {
                    on_output(&event);
                    log.append(event);
                })
                .await;
                self.batch_running = false;
                Ok(RunOutcome::Batch(summary))
            }
            ExecutionMode::Interactive => {
                let outcome = self.session.start(&language_name).await;
                if let StartOutcome::Failed(_) = &outcome {
                    for event in self.session.outputs() {
                        on_output(event);
                    }
                }
                self.line_buffer.set_running(self.session.is_running());
                Ok(RunOutcome::Interactive(outcome))
            }
        }
    }

    pub fn stop(&mut self) -> Vec<OutputEvent> {
        let appended = self.session.stop();
        self.line_buffer.set_running(false);
        appended
    }

    /// Feeds one keystroke unit to the line buffer; returns what to echo.
    /// Committed lines go out as stdin, Ctrl+C as the interrupt sentinel.
    pub fn feed_keystroke(&mut self, unit: &str) -> Vec<String> {
        self.line_buffer.set_running(self.session.is_running());
        let outcome = self.line_buffer.feed(unit);
        for action in outcome.actions {
            let delivered = match action {
                LineAction::Commit(line) => self.session.send_input(&line),
                LineAction::Interrupt => self.session.send_interrupt(),
            };
            if !delivered {
                warn!(state = ?self.session.state(), "input dropped; session not active");
            }
        }
        outcome.echo
    }

    pub async fn next_transport_event(&mut self) -> Option<TransportEvent> {
        self.session.next_transport_event().await
    }

    pub fn try_next_transport_event(&mut self) -> Option<TransportEvent> {
        self.session.try_next_transport_event()
    }

    pub fn handle_transport_event(&mut self, event: TransportEvent) -> Vec<OutputEvent> {
        let appended = self.session.handle_transport_event(event);
        if !self.session.is_running() {
            self.line_buffer.set_running(false);
        }
        appended
    }

    /// Output of the latest run in the current mode.
    pub fn outputs(&self) -> &[OutputEvent] {
        match self.mode {
            ExecutionMode::Batch => self.batch_output.events(),
            ExecutionMode::Interactive => self.session.outputs(),
        }
    }

    fn record_error(&mut self, message: String) -> OutputEvent {
        match self.mode {
            ExecutionMode::Batch => {
                self.batch_output.clear();
                self.batch_output
                    .push(OutputChannel::Error, message)
                    .clone()
            }
            ExecutionMode::Interactive => self.session.record(OutputChannel::Error, message),
        }
    }
}
