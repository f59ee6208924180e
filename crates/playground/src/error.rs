use sandbox_api::SandboxApiError;
use thiserror::Error;

/// Failure reported by a remote collaborator (file store or execution service).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Api(#[from] SandboxApiError),

    #[error("{0}")]
    Unavailable(String),
}

impl StoreError {
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }
}

/// A file could not be fetched from the store; the cache is unchanged.
#[derive(Debug, Error)]
#[error("failed to load {path}: {source}")]
pub struct LoadError {
    pub path: String,
    #[source]
    pub source: StoreError,
}

/// A pending file could not be pushed before a run; the run was not started.
#[derive(Debug, Error)]
#[error("failed to sync {path}: {source}")]
pub struct SyncError {
    pub path: String,
    #[source]
    pub source: StoreError,
}

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("no language selected")]
    NoLanguage,

    #[error("no active file")]
    NoActiveFile,

    #[error("a run is in progress")]
    RunInProgress,

    #[error("{path} is the entry file and cannot be removed")]
    EntryFileProtected { path: String },

    #[error("{path} is not open")]
    NotOpen { path: String },

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error("failed to {operation} {path}: {source}")]
    Store {
        operation: &'static str,
        path: String,
        #[source]
        source: StoreError,
    },
}

impl ControllerError {
    #[must_use]
    pub fn store(operation: &'static str, path: impl Into<String>, source: StoreError) -> Self {
        Self::Store {
            operation,
            path: path.into(),
            source,
        }
    }
}
