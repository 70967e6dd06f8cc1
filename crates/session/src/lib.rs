//! Spreadsheet session controller.
//!
//! Owns the active dataset, its undo/redo history and dirty flag, and
//! bridges them to the backend (load, save, agent edit) and to the durable
//! snapshot store. Front ends hold a `Session` and render from `view()`.

mod backend;
mod controller;
mod error;
mod view;

pub use backend::Backend;
pub use controller::{Session, SessionState};
pub use error::SessionError;
pub use view::{LocalExport, SessionView};
