use std::pin::Pin;

use futures_util::{Stream, StreamExt};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info};

use crate::config::SandboxApiConfig;
use crate::error::{parse_error_message, SandboxApiError};
use crate::headers::build_headers;
use crate::payload::{
    CreateEntryRequest, DeleteEntryRequest, EntryKind, ExecuteStreamRequest, FileTreeNode,
    InteractiveRequest, InteractiveResponse, InteractiveSession, Language, ReadFileResponse,
    TreeResponse, WriteFileRequest,
};
use crate::url::{endpoint, normalize_base_url, resolve_websocket_url};
use crate::ws::{spawn_session_socket, Generation, SocketHandle, TransportEvent};

/// Raw body chunks of a batch execution stream.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, SandboxApiError>> + Send>>;

/// HTTP client for one sandbox session.
///
/// Every request shares one cookie jar, so the cookie set by
/// [`SandboxApiClient::bootstrap_session`] scopes all later calls.
#[derive(Debug, Clone)]
pub struct SandboxApiClient {
    http: Client,
    config: SandboxApiConfig,
}

impl SandboxApiClient {
    pub fn new(config: SandboxApiConfig) -> Result<Self, SandboxApiError> {
        let mut builder = Client::builder()
            .cookie_store(true)
            .default_headers(header_map(&config)?);
        if let Some(connect_timeout) = config.connect_timeout {
            builder = builder.connect_timeout(connect_timeout);
        }
        let http = builder.build().map_err(SandboxApiError::from)?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &SandboxApiConfig {
        &self.config
    }

    pub fn base_url(&self) -> String {
        normalize_base_url(&self.config.base_url)
    }

    pub fn endpoint(&self, path: &str) -> String {
        endpoint(&self.config.base_url, path)
    }

    /// Request builder with the per-request timeout applied.
    ///
    /// Streaming requests skip the timeout; it would cap the whole body read.
    pub fn build_request(&self, method: Method, path: &str) -> RequestBuilder {
        let request = self.http.request(method, self.endpoint(path));
        match self.config.timeout {
            Some(timeout) => request.timeout(timeout),
            None => request,
        }
    }

    pub async fn bootstrap_session(&self) -> Result<(), SandboxApiError> {
        let response = self
            .build_request(Method::POST, "/sessions/bootstrap")
            .json(&serde_json::json!({}))
            .send()
            .await?;
        ensure_success(response).await?;
        info!(base_url = %self.base_url(), "sandbox session bootstrapped");
        Ok(())
    }

    /// Best-effort release of the sandbox session.
    pub async fn cleanup_session(&self) -> Result<(), SandboxApiError> {
        let response = self
            .build_request(Method::POST, "/sessions/cleanup")
            .json(&serde_json::json!({}))
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }

    pub async fn list_languages(&self) -> Result<Vec<Language>, SandboxApiError> {
        self.get_json("/languages", &[]).await
    }

    pub async fn file_tree(&self) -> Result<Vec<FileTreeNode>, SandboxApiError> {
        let response: TreeResponse = self.get_json("/files/tree", &[]).await?;
        Ok(response.tree)
    }

    pub async fn read_file(&self, path: &str) -> Result<String, SandboxApiError> {
        let response: ReadFileResponse = self.get_json("/files/read", &[("path", path)]).await?;
        Ok(response.content.unwrap_or_default())
    }

    pub async fn write_file(&self, path: &str, content: &str) -> Result<(), SandboxApiError> {
        let response = self
            .build_request(Method::PUT, "/files")
            .json(&WriteFileRequest { path, content })
            .send()
            .await?;
        ensure_success(response).await?;
        debug!(path, bytes = content.len(), "file written");
        Ok(())
    }

    /// Creates a file or directory; the store treats existing entries as success.
    pub async fn create_entry(&self, path: &str, kind: EntryKind) -> Result<(), SandboxApiError> {
        let response = self
            .build_request(Method::POST, "/files")
            .json(&CreateEntryRequest { path, kind })
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }

    pub async fn delete_entry(
        &self,
        path: &str,
        language: Option<&str>,
    ) -> Result<(), SandboxApiError> {
        let response = self
            .build_request(Method::DELETE, "/files")
            .json(&DeleteEntryRequest { path, language })
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }

    /// Starts a batch run and returns its output body as raw chunks.
    pub async fn execute_stream(
        &self,
        language: &str,
        stdin: &str,
    ) -> Result<ByteStream, SandboxApiError> {
        let response = self
            .http
            .post(self.endpoint("/execute/stream"))
            .json(&ExecuteStreamRequest { language, stdin })
            .send()
            .await?;
        let response = ensure_success(response).await?;
        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(SandboxApiError::from));
        Ok(Box::pin(stream))
    }

    pub async fn create_interactive(
        &self,
        language: &str,
    ) -> Result<InteractiveSession, SandboxApiError> {
        let response = self
            .build_request(Method::POST, "/execute/interactive")
            .json(&InteractiveRequest { language })
            .send()
            .await?;
        let response: InteractiveResponse = ensure_success(response).await?.json().await?;

        let session_id = response
            .session_id
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| SandboxApiError::InvalidSession("missing session_id".to_owned()))?;
        let ws_url = response
            .ws_url
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| SandboxApiError::InvalidSession("missing ws_url".to_owned()))?;
        let ws_url = resolve_websocket_url(&self.config.base_url, &ws_url)?;

        info!(%session_id, %ws_url, "interactive session created");
        Ok(InteractiveSession { session_id, ws_url })
    }

    /// Opens the session channel on a background task.
    pub fn open_session_socket(
        &self,
        ws_url: &str,
        generation: Generation,
        events: UnboundedSender<TransportEvent>,
    ) -> SocketHandle {
        spawn_session_socket(
            ws_url.to_owned(),
            generation,
            self.config.connect_timeout,
            events,
        )
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, SandboxApiError> {
        let response = self
            .build_request(Method::GET, path)
            .query(query)
            .send()
            .await?;
        let value = ensure_success(response).await?.json::<T>().await?;
        Ok(value)
    }
}

fn header_map(config: &SandboxApiConfig) -> Result<HeaderMap, SandboxApiError> {
    let mut out = HeaderMap::new();
    for (key, value) in build_headers(config) {
        out.insert(
            HeaderName::from_bytes(key.as_bytes())
                .map_err(|_| SandboxApiError::InvalidHeader(format!("invalid header key: {key}")))?,
            HeaderValue::from_str(&value).map_err(|_| {
                SandboxApiError::InvalidHeader(format!("invalid header value for {key}"))
            })?,
        );
    }
    Ok(out)
}

async fn ensure_success(response: Response) -> Result<Response, SandboxApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(SandboxApiError::Status(
        status,
        parse_error_message(status, &body),
    ))
}
