//! Remote collaborators the playground talks to.
//!
//! The runtime only sees these traits; [`SandboxApiClient`] implements all
//! of them over HTTP and WebSocket, tests substitute in-memory fakes.

use async_trait::async_trait;
use sandbox_api::{
    ByteStream, EntryKind, FileTreeNode, Generation, InteractiveSession, SandboxApiClient,
    SocketHandle, TransportEvent,
};
use tokio::sync::mpsc::UnboundedSender;

use crate::error::StoreError;

#[async_trait]
pub trait FileStore: Send + Sync {
    async fn tree(&self) -> Result<Vec<FileTreeNode>, StoreError>;

    async fn read(&self, path: &str) -> Result<String, StoreError>;

    /// Creates an empty file if missing. Existing files are left alone.
    async fn ensure_exists(&self, path: &str) -> Result<(), StoreError>;

    async fn write(&self, path: &str, content: &str) -> Result<(), StoreError>;

    async fn delete(&self, path: &str, language: Option<&str>) -> Result<(), StoreError>;
}

#[async_trait]
pub trait ExecutionService: Send + Sync {
    /// Starts a batch run; the body arrives as raw chunks.
    async fn execute_stream(&self, language: &str, stdin: &str) -> Result<ByteStream, StoreError>;

    async fn create_interactive(&self, language: &str) -> Result<InteractiveSession, StoreError>;
}

/// Session scoping: bootstrap sets the session cookie, cleanup releases the
/// sandbox.
#[async_trait]
pub trait SessionService: Send + Sync {
    async fn bootstrap(&self) -> Result<(), StoreError>;

    async fn cleanup(&self) -> Result<(), StoreError>;
}

/// Opens the bidirectional channel of an interactive session.
///
/// Connection outcome is reported asynchronously on `events`, tagged with
/// `generation`.
pub trait SessionConnector: Send + Sync {
    fn connect(
        &self,
        ws_url: &str,
        generation: Generation,
        events: UnboundedSender<TransportEvent>,
    ) -> SocketHandle;
}

#[async_trait]
impl FileStore for SandboxApiClient {
    async fn tree(&self) -> Result<Vec<FileTreeNode>, StoreError> {
        Ok(self.file_tree().await?)
    }

    async fn read(&self, path: &str) -> Result<String, StoreError> {
        Ok(self.read_file(path).await?)
    }

    async fn ensure_exists(&self, path: &str) -> Result<(), StoreError> {
        Ok(self.create_entry(path, EntryKind::File).await?)
    }

    async fn write(&self, path: &str, content: &str) -> Result<(), StoreError> {
        Ok(self.write_file(path, content).await?)
    }

    async fn delete(&self, path: &str, language: Option<&str>) -> Result<(), StoreError> {
        Ok(self.delete_entry(path, language).await?)
    }
}

#[async_trait]
impl ExecutionService for SandboxApiClient {
    async fn execute_stream(&self, language: &str, stdin: &str) -> Result<ByteStream, StoreError> {
        Ok(SandboxApiClient::execute_stream(self, language, stdin).await?)
    }

    async fn create_interactive(&self, language: &str) -> Result<InteractiveSession, StoreError> {
        Ok(SandboxApiClient::create_interactive(self, language).await?)
    }
}

#[async_trait]
impl SessionService for SandboxApiClient {
    async fn bootstrap(&self) -> Result<(), StoreError> {
        Ok(self.bootstrap_session().await?)
    }

    async fn cleanup(&self) -> Result<(), StoreError> {
        Ok(self.cleanup_session().await?)
    }
}

impl SessionConnector for SandboxApiClient {
    fn connect(
        &self,
        ws_url: &str,
        generation: Generation,
        events: UnboundedSender<TransportEvent>,
    ) -> SocketHandle {
        self.open_session_socket(ws_url, generation, events)
    }
}
