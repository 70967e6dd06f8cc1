use std::fmt;

use datadesk_backend_client::BackendError;
use datadesk_engine::DatasetError;

/// Error type for session operations.
///
/// Every error ends only the operation that raised it; the session is back
/// in `Ready` or `Empty` by the time the caller sees it.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionError {
    /// Rejected locally before any state change or network call
    Validation(String),
    /// A save or agent edit is already in flight
    Busy,
    /// A file is still loading
    Loading,
    /// A newer load or a clear overtook this request; its result was dropped
    Superseded,
    /// Network failure, timeout, bad status or malformed body
    Transport(BackendError),
    /// The backend reported an error; message is its own text
    Backend(String),
    /// Local serialization or file write failed
    Export(String),
}

impl SessionError {
    pub fn no_dataset() -> Self {
        SessionError::Validation("No file is loaded".into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            SessionError::Validation(_) | SessionError::Busy | SessionError::Loading
        )
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Validation(msg) => write!(f, "{}", msg),
            SessionError::Busy => write!(f, "Another operation is still in progress"),
            SessionError::Loading => write!(f, "A file is still loading"),
            SessionError::Superseded => write!(f, "Request was superseded by a newer one"),
            SessionError::Transport(e) => write!(f, "{}", e),
            SessionError::Backend(msg) => write!(f, "{}", msg),
            SessionError::Export(msg) => write!(f, "Export failed: {}", msg),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<BackendError> for SessionError {
    fn from(e: BackendError) -> Self {
        match e {
            BackendError::Backend(msg) => SessionError::Backend(msg),
            other => SessionError::Transport(other),
        }
    }
}

impl From<DatasetError> for SessionError {
    fn from(e: DatasetError) -> Self {
        SessionError::Validation(e.to_string())
    }
}
