// Read-only views handed to front ends

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use datadesk_engine::FileRef;
use datadesk_io::ExportFormat;

use crate::controller::SessionState;
use crate::error::SessionError;

/// Point-in-time summary of a session, cheap to clone and render.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionView {
    pub state: SessionState,
    /// Active file, once loaded
    pub source: Option<FileRef>,
    /// File being loaded while `state` is `Loading`
    pub loading: Option<FileRef>,
    pub rows: usize,
    pub columns: usize,
    pub dirty: bool,
    pub can_undo: bool,
    pub can_redo: bool,
    pub undo_depth: usize,
    pub redo_depth: usize,
    pub last_error: Option<String>,
}

/// A serialized dataset ready to be written or offered for download.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalExport {
    pub file_name: String,
    pub format: ExportFormat,
    pub bytes: Vec<u8>,
}

impl LocalExport {
    /// Write under `dir` using the derived file name.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf, SessionError> {
        let path = dir.join(&self.file_name);
        self.write_as(&path)?;
        Ok(path)
    }

    /// Write to an explicit path.
    pub fn write_as(&self, path: &Path) -> Result<(), SessionError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| SessionError::Export(format!("{}: {}", parent.display(), e)))?;
        }
        fs::write(path, &self.bytes)
            .map_err(|e| SessionError::Export(format!("{}: {}", path.display(), e)))
    }
}
