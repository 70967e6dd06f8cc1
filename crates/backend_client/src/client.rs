//! Backend HTTP client.
//!
//! Blocking reqwest client (no Tokio runtime required). Every request is
//! bounded by the client timeout, and every JSON body is checked for an
//! explicit error indicator before it is decoded as a success payload.

use std::path::Path;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use datadesk_engine::{FileRef, Record};

use crate::wire::{
    self, AgentEditRequest, AgentEditResponse, FileEntry, FilesResponse, LoadRequest,
    LoadResponse, SaveRequest, UploadResponse,
};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Backend API client (blocking).
#[derive(Clone)]
pub struct BackendClient {
    http: reqwest::blocking::Client,
    api_base: String,
}

/// Error type for backend operations.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendError {
    /// Connection refused, DNS, reset, ...
    Network(String),
    /// No response within the client timeout
    Timeout(String),
    /// Non-2xx status without an error body
    Http(u16, String),
    /// Body is not the JSON shape the endpoint promises
    Parse(String),
    /// Body carried an explicit error; message is the backend's own text
    Backend(String),
    /// Local file could not be read for upload
    Io(String),
    /// API base or path does not form a valid URL
    InvalidUrl(String),
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::Network(msg) => write!(f, "Network error: {}", msg),
            BackendError::Timeout(msg) => write!(f, "Request timed out: {}", msg),
            BackendError::Http(code, msg) if msg.is_empty() => write!(f, "HTTP {}", code),
            BackendError::Http(code, msg) => write!(f, "HTTP {}: {}", code, msg),
            BackendError::Parse(msg) => write!(f, "Malformed response: {}", msg),
            BackendError::Backend(msg) => write!(f, "{}", msg),
            BackendError::Io(msg) => write!(f, "I/O error: {}", msg),
            BackendError::InvalidUrl(msg) => write!(f, "Invalid URL: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}

impl BackendError {
    /// True for everything except a backend-reported error.
    pub fn is_transport(&self) -> bool {
        !matches!(self, BackendError::Backend(_))
    }

    fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            BackendError::Timeout(e.to_string())
        } else {
            BackendError::Network(e.to_string())
        }
    }
}

impl BackendClient {
    /// Create a client for `api_base` (e.g. "http://localhost:8000/api/backend").
    pub fn new(api_base: impl Into<String>, timeout: Duration) -> Result<Self, BackendError> {
        let http = reqwest::blocking::Client::builder()
            .user_agent(format!("datadesk/{}", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Upload a local file (multipart field `file`).
    pub fn upload(&self, path: &Path) -> Result<FileRef, BackendError> {
        let form = reqwest::blocking::multipart::Form::new()
            .file("file", path)
            .map_err(|e| BackendError::Io(format!("{}: {}", path.display(), e)))?;
        self.upload_form(form)
    }

    fn upload_form(&self, form: reqwest::blocking::multipart::Form) -> Result<FileRef, BackendError> {
        let url = self.url("/sheets/upload");
        log::debug!("POST {} (multipart)", url);
        let response = self
            .http
            .post(&url)
            .multipart(form)
            .send()
            .map_err(BackendError::from_reqwest)?;
        let body = read_json(response)?;
        decode::<UploadResponse>(body).map(FileRef::from)
    }

    /// Ask the backend to parse a previously uploaded file.
    pub fn load(&self, url: &str) -> Result<LoadResponse, BackendError> {
        let body = self.post_json("/sheets/load", &LoadRequest { url })?;
        decode(body)
    }

    /// Persist the full row set under `filename`. No schema is sent.
    pub fn save(&self, filename: &str, rows: &[Record]) -> Result<(), BackendError> {
        self.post_json("/sheets/save", &SaveRequest { filename, rows })?;
        Ok(())
    }

    /// Natural-language edit. The response is a complete replacement.
    pub fn agent_edit(&self, url: &str, command: &str) -> Result<AgentEditResponse, BackendError> {
        let body = self.post_json("/sheets/agent-edit", &AgentEditRequest { url, command })?;
        decode(body)
    }

    /// Backend's xlsx rendition of a saved file.
    pub fn export_xlsx(&self, filename: &str) -> Result<Vec<u8>, BackendError> {
        let mut url = url::Url::parse(&self.url("/sheets/export/xlsx"))
            .map_err(|e| BackendError::InvalidUrl(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| BackendError::InvalidUrl(self.api_base.clone()))?
            .pop_if_empty()
            .push(filename);

        log::debug!("GET {}", url);
        let response = self.http.get(url).send().map_err(BackendError::from_reqwest)?;
        let status = response.status();
        let bytes = response.bytes().map_err(BackendError::from_reqwest)?;

        if !status.is_success() {
            let text = String::from_utf8_lossy(&bytes).into_owned();
            if let Some(msg) = serde_json::from_str::<Value>(&text).ok().as_ref().and_then(wire::error_message) {
                return Err(BackendError::Backend(msg));
            }
            return Err(BackendError::Http(status.as_u16(), text));
        }

        Ok(bytes.to_vec())
    }

    /// Files available to load.
    pub fn list_files(&self) -> Result<Vec<FileEntry>, BackendError> {
        let body = self.get_json("/system/files")?;
        decode::<FilesResponse>(body).map(|r| r.files)
    }

    // ── Internal helpers ────────────────────────────────────────────

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    fn get_json(&self, path: &str) -> Result<Value, BackendError> {
        let url = self.url(path);
        log::debug!("GET {}", url);
        let response = self.http.get(&url).send().map_err(BackendError::from_reqwest)?;
        read_json(response)
    }

    fn post_json<B: Serialize>(&self, path: &str, body: &B) -> Result<Value, BackendError> {
        let url = self.url(path);
        log::debug!("POST {}", url);
        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .map_err(BackendError::from_reqwest)?;
        read_json(response)
    }
}

// ── Free functions ──────────────────────────────────────────────────

/// Read a response as JSON, surfacing error bodies whatever the status.
fn read_json(response: reqwest::blocking::Response) -> Result<Value, BackendError> {
    let status = response.status();
    let text = response.text().map_err(BackendError::from_reqwest)?;

    let body: Value = match serde_json::from_str(&text) {
        Ok(v) => v,
        Err(_) if !status.is_success() => return Err(BackendError::Http(status.as_u16(), text)),
        // An empty 2xx body is an acknowledgement
        Err(_) if text.trim().is_empty() => Value::Object(Default::default()),
        Err(e) => return Err(BackendError::Parse(e.to_string())),
    };

    if let Some(msg) = wire::error_message(&body) {
        return Err(BackendError::Backend(msg));
    }
    if !status.is_success() {
        return Err(BackendError::Http(status.as_u16(), text));
    }

    Ok(body)
}

fn decode<T: DeserializeOwned>(body: Value) -> Result<T, BackendError> {
    serde_json::from_value(body).map_err(|e| BackendError::Parse(e.to_string()))
}
