#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use futures_util::stream;
use playground::{ExecutionService, FileStore, SessionConnector, SessionService, StoreError};
use sandbox_api::{
    ByteStream, ExecutionType, FileTreeNode, Generation, InteractiveSession, Language,
    SandboxApiError, SocketCommand, SocketHandle, StatusCode, TransportEvent, TransportEventKind,
};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

pub fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

pub fn python() -> Language {
    Language {
        id: 1,
        language_name: "python".to_owned(),
        file_extension: ".py".to_owned(),
        file_name: "main.py".to_owned(),
        execution_type: ExecutionType::Interpreted,
        code_preview: "print('hi')\n".to_owned(),
    }
}

#[derive(Default)]
pub struct StoreTrace {
    pub files: BTreeMap<String, String>,
    /// `"<op> <path>"` for every call, in order.
    pub calls: Vec<String>,
    pub fail_read: BTreeSet<String>,
    pub fail_ensure: BTreeSet<String>,
    pub fail_write: BTreeSet<String>,
    pub fail_delete: BTreeSet<String>,
    pub fail_tree: bool,
}

#[derive(Default)]
pub struct FakeStore {
    pub trace: Mutex<StoreTrace>,
}

impl FakeStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_file(self: Arc<Self>, path: &str, content: &str) -> Arc<Self> {
        self.trace()
            .files
            .insert(path.to_owned(), content.to_owned());
        self
    }

    pub fn trace(&self) -> MutexGuard<'_, StoreTrace> {
        lock_unpoisoned(&self.trace)
    }

    pub fn calls(&self) -> Vec<String> {
        self.trace().calls.clone()
    }

    pub fn writes(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|call| call.starts_with("write "))
            .collect()
    }
}

#[async_trait]
impl FileStore for FakeStore {
    async fn tree(&self) -> Result<Vec<FileTreeNode>, StoreError> {
        let mut trace = self.trace();
        trace.calls.push("tree".to_owned());
        if trace.fail_tree {
            return Err(StoreError::unavailable("tree unavailable"));
        }
        Ok(Vec::new())
    }

    async fn read(&self, path: &str) -> Result<String, StoreError> {
        let mut trace = self.trace();
        trace.calls.push(format!("read {path}"));
        if trace.fail_read.contains(path) {
            return Err(StoreError::unavailable(format!("cannot read {path}")));
        }
        trace
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| StoreError::unavailable(format!("{path} not found")))
    }

    async fn ensure_exists(&self, path: &str) -> Result<(), StoreError> {
        let mut trace = self.trace();
        trace.calls.push(format!("ensure {path}"));
        if trace.fail_ensure.contains(path) {
            return Err(StoreError::unavailable(format!("cannot create {path}")));
        }
        trace.files.entry(path.to_owned()).or_default();
        Ok(())
    }

    async fn write(&self, path: &str, content: &str) -> Result<(), StoreError> {
        let mut trace = self.trace();
        trace.calls.push(format!("write {path}"));
        if trace.fail_write.contains(path) {
            return Err(StoreError::unavailable(format!("cannot write {path}")));
        }
        trace.files.insert(path.to_owned(), content.to_owned());
        Ok(())
    }

    async fn delete(&self, path: &str, language: Option<&str>) -> Result<(), StoreError> {
        let mut trace = self.trace();
        trace
            .calls
            .push(format!("delete {path} {}", language.unwrap_or("-")));
        if trace.fail_delete.contains(path) {
            return Err(StoreError::unavailable(format!("cannot delete {path}")));
        }
        trace.files.remove(path);
        Ok(())
    }
}

pub enum ScriptedRun {
    Chunks(Vec<Result<Vec<u8>, String>>),
    Refused(String),
}

#[derive(Default)]
pub struct ExecutionTrace {
    pub batch_runs: Vec<(String, String)>,
    pub interactive_requests: Vec<String>,
    pub scripted_runs: VecDeque<ScriptedRun>,
    pub sessions: VecDeque<Result<InteractiveSession, String>>,
}

#[derive(Default)]
pub struct FakeExecution {
    pub trace: Mutex<ExecutionTrace>,
}

impl FakeExecution {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn trace(&self) -> MutexGuard<'_, ExecutionTrace> {
        lock_unpoisoned(&self.trace)
    }

    pub fn script_chunks(&self, chunks: &[&str]) {
        let chunks = chunks
            .iter()
            .map(|chunk| Ok(chunk.as_bytes().to_vec()))
            .collect();
        self.trace()
            .scripted_runs
            .push_back(ScriptedRun::Chunks(chunks));
    }

    pub fn script_run(&self, run: ScriptedRun) {
        self.trace().scripted_runs.push_back(run);
    }

    pub fn script_session(&self, session_id: &str) {
        self.trace().sessions.push_back(Ok(InteractiveSession {
            session_id: session_id.to_owned(),
            ws_url: format!("ws://sandbox.test/api/ws/{session_id}"),
        }));
    }

    pub fn script_session_failure(&self, message: &str) {
        self.trace().sessions.push_back(Err(message.to_owned()));
    }
}

#[async_trait]
impl ExecutionService for FakeExecution {
    async fn execute_stream(&self, language: &str, stdin: &str) -> Result<ByteStream, StoreError> {
        let mut trace = self.trace();
        trace
            .batch_runs
            .push((language.to_owned(), stdin.to_owned()));
        match trace.scripted_runs.pop_front() {
            Some(ScriptedRun::Chunks(chunks)) => {
                let items: Vec<Result<Vec<u8>, SandboxApiError>> = chunks
                    .into_iter()
                    .map(|chunk| {
                        chunk.map_err(|message| {
                            SandboxApiError::Status(StatusCode::BAD_GATEWAY, message)
                        })
                    })
                    .collect();
                let stream: ByteStream = Box::pin(stream::iter(items));
                Ok(stream)
            }
            Some(ScriptedRun::Refused(message)) => Err(StoreError::unavailable(message)),
            None => Err(StoreError::unavailable("no scripted run")),
        }
    }

    async fn create_interactive(&self, language: &str) -> Result<InteractiveSession, StoreError> {
        let mut trace = self.trace();
        trace.interactive_requests.push(language.to_owned());
        match trace.sessions.pop_front() {
            Some(Ok(session)) => Ok(session),
            Some(Err(message)) => Err(StoreError::unavailable(message)),
            None => Err(StoreError::unavailable("no scripted session")),
        }
    }
}

/// One socket opened through [`FakeConnector`].
pub struct FakeSocket {
    pub ws_url: String,
    pub generation: Generation,
    pub events: UnboundedSender<TransportEvent>,
    pub commands: UnboundedReceiver<SocketCommand>,
}

impl FakeSocket {
    pub fn emit(&self, kind: TransportEventKind) {
        let _ = self
            .events
            .send(TransportEvent::new(self.generation, kind));
    }

    pub fn emit_frame(&self, json: &str) {
        self.emit(TransportEventKind::Message(json.to_owned()));
    }

    /// Commands the client has queued so far.
    pub fn drain_commands(&mut self) -> Vec<SocketCommand> {
        let mut out = Vec::new();
        while let Ok(command) = self.commands.try_recv() {
            out.push(command);
        }
        out
    }
}

#[derive(Default)]
pub struct FakeConnector {
    pub sockets: Mutex<Vec<FakeSocket>>,
}

impl FakeConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn connects(&self) -> usize {
        lock_unpoisoned(&self.sockets).len()
    }

    pub fn sockets(&self) -> MutexGuard<'_, Vec<FakeSocket>> {
        lock_unpoisoned(&self.sockets)
    }
}

impl SessionConnector for FakeConnector {
    fn connect(
        &self,
        ws_url: &str,
        generation: Generation,
        events: UnboundedSender<TransportEvent>,
    ) -> SocketHandle {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        lock_unpoisoned(&self.sockets).push(FakeSocket {
            ws_url: ws_url.to_owned(),
            generation,
            events,
            commands: commands_rx,
        });
        SocketHandle::new(generation, commands_tx)
    }
}

#[derive(Default)]
pub struct FakeSessionService {
    pub bootstraps: Mutex<usize>,
    pub cleanups: Mutex<usize>,
    pub fail_bootstrap: bool,
    pub fail_cleanup: bool,
}

#[async_trait]
impl SessionService for FakeSessionService {
    async fn bootstrap(&self) -> Result<(), StoreError> {
        *lock_unpoisoned(&self.bootstraps) += 1;
        if self.fail_bootstrap {
            return Err(StoreError::unavailable("bootstrap refused"));
        }
        Ok(())
    }

    async fn cleanup(&self) -> Result<(), StoreError> {
        *lock_unpoisoned(&self.cleanups) += 1;
        if self.fail_cleanup {
            return Err(StoreError::unavailable("cleanup refused"));
        }
        Ok(())
    }
}
