use url::Url;

use crate::error::SandboxApiError;

/// Default base URL for sandbox requests.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000/api";

/// Normalize a base URL: blank input falls back to the default, trailing
/// slashes are dropped.
pub fn normalize_base_url(input: &str) -> String {
    let base = if input.trim().is_empty() {
        DEFAULT_BASE_URL
    } else {
        input.trim()
    };
    base.trim_end_matches('/').to_string()
}

/// Join an endpoint path (e.g. `/files/read`) onto the base URL.
pub fn endpoint(base_url: &str, path: &str) -> String {
    let base = normalize_base_url(base_url);
    format!("{base}/{}", path.trim_start_matches('/'))
}

/// Resolve the session channel URL returned by `/execute/interactive`.
///
/// Rules:
/// 1) `ws://` / `wss://` URLs are kept unchanged
/// 2) `http://` / `https://` URLs are mapped to `ws://` / `wss://`
/// 3) anything else is a path resolved against the base URL's origin, with the
///    base scheme mapped the same way
pub fn resolve_websocket_url(base_url: &str, ws_url: &str) -> Result<String, SandboxApiError> {
    let ws_url = ws_url.trim();
    if ws_url.is_empty() {
        return Err(SandboxApiError::InvalidSession(
            "empty ws_url".to_owned(),
        ));
    }

    let base = Url::parse(&normalize_base_url(base_url))
        .map_err(|error| SandboxApiError::InvalidBaseUrl(format!("{base_url}: {error}")))?;
    let mut resolved = base
        .join(ws_url)
        .map_err(|error| SandboxApiError::UrlNormalization(format!("{ws_url}: {error}")))?;

    let scheme = match resolved.scheme() {
        "ws" | "wss" => return Ok(resolved.to_string()),
        "http" => "ws",
        "https" => "wss",
        other => {
            return Err(SandboxApiError::UrlNormalization(format!(
                "unsupported session scheme: {other}"
            )))
        }
    };
    resolved
        .set_scheme(scheme)
        .map_err(|_| SandboxApiError::UrlNormalization(format!("cannot map {ws_url} to {scheme}")))?;
    Ok(resolved.to_string())
}
