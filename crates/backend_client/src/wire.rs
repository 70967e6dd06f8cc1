//! Request and response bodies for the backend endpoints.
//!
//! Responses ignore fields they do not name (`status`, `total`, `editable`,
//! ...). Error bodies are detected before any of these types is decoded.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use datadesk_engine::{Column, FileRef, Record};

// ── Requests ────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct LoadRequest<'a> {
    pub url: &'a str,
}

#[derive(Debug, Serialize)]
pub struct SaveRequest<'a> {
    pub filename: &'a str,
    pub rows: &'a [Record],
}

#[derive(Debug, Serialize)]
pub struct AgentEditRequest<'a> {
    pub url: &'a str,
    pub command: &'a str,
}

// ── Responses ───────────────────────────────────────────────────────

/// `POST /sheets/upload`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UploadResponse {
    pub filename: String,
    pub url: String,
}

impl From<UploadResponse> for FileRef {
    fn from(resp: UploadResponse) -> Self {
        FileRef::new(resp.filename, resp.url)
    }
}

/// `POST /sheets/load`
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct LoadResponse {
    #[serde(default)]
    pub columns: Option<Vec<Column>>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub rows: Vec<Record>,
}

/// `POST /sheets/agent-edit`
///
/// `rows` is required: an edit response without rows is malformed rather
/// than "no rows".
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AgentEditResponse {
    pub rows: Vec<Record>,
    #[serde(default)]
    pub columns: Option<Vec<Column>>,
}

/// One entry of `GET /system/files`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    pub url: String,
    /// Human-readable size ("12.4 KB"); some endpoints send raw byte counts
    #[serde(default, deserialize_with = "string_or_number")]
    pub size: String,
    #[serde(default)]
    pub created: Option<String>,
}

impl FileEntry {
    pub fn file_ref(&self) -> FileRef {
        FileRef::new(self.name.clone(), self.url.clone())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilesResponse {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub files: Vec<FileEntry>,
}

/// Extract the backend's error indicator from a response body.
///
/// `{"error": "msg"}`, `{"error": {"message": "msg"}}` and
/// `{"status": "error", "message": "msg"}` all count. A falsy `error`
/// (`null`, `false`, `""`, `0`) does not.
pub fn error_message(body: &Value) -> Option<String> {
    match body.get("error") {
        None | Some(Value::Null) | Some(Value::Bool(false)) => {}
        Some(Value::String(msg)) if msg.is_empty() => {}
        Some(Value::Number(n)) if n.as_f64() == Some(0.0) => {}
        Some(Value::String(msg)) => return Some(msg.clone()),
        Some(Value::Object(obj)) => {
            return Some(
                obj.get("message")
                    .and_then(|m| m.as_str())
                    .map(String::from)
                    .unwrap_or_else(|| Value::Object(obj.clone()).to_string()),
            )
        }
        Some(other) => return Some(other.to_string()),
    }

    if body.get("status").and_then(|s| s.as_str()) == Some("error") {
        let msg = body
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("backend reported an error");
        return Some(msg.to_string());
    }

    None
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    })
}
