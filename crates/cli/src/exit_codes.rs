//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract; scripts rely on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain     | Description                                |
//! |---------|------------|--------------------------------------------|
//! | 0       | Universal  | Success                                    |
//! | 1       | Universal  | General error (unspecified)                |
//! | 2       | Universal  | CLI usage error (bad args, missing file)   |
//! | 3       | Universal  | Export could not be written                |
//! | 20-29   | session    | Session state and input validation         |
//! | 40-49   | backend    | Backend-reported and transport failures    |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into `session_exit_code` or the relevant command

use datadesk_backend_client::BackendError;
use datadesk_session::SessionError;

// =============================================================================
// Universal (0-3)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, unknown file name, unreadable local file.
pub const EXIT_USAGE: u8 = 2;

/// Export serialization or file write failed.
pub const EXIT_EXPORT: u8 = 3;

// =============================================================================
// Session (20-29)
// =============================================================================

/// No file is loaded (nothing in the local snapshot).
pub const EXIT_SESSION_EMPTY: u8 = 20;

/// Another operation holds the session (busy, loading, superseded).
pub const EXIT_SESSION_BUSY: u8 = 21;

/// Invalid input (row out of range, unknown column, empty command).
pub const EXIT_SESSION_INPUT: u8 = 22;

// =============================================================================
// Backend (40-49)
// =============================================================================

/// Backend answered with an explicit error body.
pub const EXIT_BACKEND_ERROR: u8 = 40;

/// Network failure, unexpected status or malformed response.
pub const EXIT_BACKEND_NETWORK: u8 = 41;

/// No response within the configured timeout.
pub const EXIT_BACKEND_TIMEOUT: u8 = 42;

/// Map a SessionError to its exit code.
pub fn session_exit_code(err: &SessionError) -> u8 {
    match err {
        SessionError::Validation(_) if *err == SessionError::no_dataset() => EXIT_SESSION_EMPTY,
        SessionError::Validation(_) => EXIT_SESSION_INPUT,
        SessionError::Busy | SessionError::Loading | SessionError::Superseded => EXIT_SESSION_BUSY,
        SessionError::Backend(_) => EXIT_BACKEND_ERROR,
        SessionError::Transport(e) => backend_exit_code(e),
        SessionError::Export(_) => EXIT_EXPORT,
    }
}

/// Map a BackendError to its exit code.
pub fn backend_exit_code(err: &BackendError) -> u8 {
    match err {
        BackendError::Backend(_) => EXIT_BACKEND_ERROR,
        BackendError::Timeout(_) => EXIT_BACKEND_TIMEOUT,
        // Local file could not be read for upload
        BackendError::Io(_) => EXIT_USAGE,
        BackendError::InvalidUrl(_) => EXIT_USAGE,
        BackendError::Network(_) | BackendError::Http(..) | BackendError::Parse(_) => EXIT_BACKEND_NETWORK,
    }
}
