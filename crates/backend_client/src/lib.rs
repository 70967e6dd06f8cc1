//! Backend API client. Owns the backend wire contract (upload, load, save,
//! agent edit, xlsx export, file listing).
//!
//! No UI concepts. No retries. Every request is bounded by a timeout.

mod client;
pub mod wire;

pub use client::{BackendClient, BackendError, DEFAULT_TIMEOUT};
pub use wire::{AgentEditResponse, FileEntry, LoadResponse};
