//! Session state machine.
//!
//! `Empty -> Loading -> Ready <-> Busy`, and `clear` returns to `Empty` from
//! anywhere. Backend calls run with the state lock released so local edits
//! stay available while a request is out. A result is applied only if no
//! newer load or clear happened in the meantime (tracked by `epoch`).

use std::fmt;
use std::path::Path;

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;

use datadesk_backend_client::FileEntry;
use datadesk_config::{PersistedSnapshot, SnapshotStore};
use datadesk_engine::{cell, Dataset, DatasetError, FileRef, History};
use datadesk_io::{self as io, ExportFormat};

use crate::backend::Backend;
use crate::error::SessionError;
use crate::view::{LocalExport, SessionView};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Nothing loaded
    Empty,
    /// Waiting for the backend to parse a file
    Loading,
    /// Dataset present, no remote mutation in flight
    Ready,
    /// Save or agent edit in flight; local edits still allowed
    Busy,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Empty => "empty",
            SessionState::Loading => "loading",
            SessionState::Ready => "ready",
            SessionState::Busy => "busy",
        };
        f.write_str(s)
    }
}

type LoadListener = Box<dyn Fn(&FileRef) + Send + Sync>;

struct Inner {
    state: SessionState,
    source: Option<FileRef>,
    loading: Option<FileRef>,
    dataset: Option<Dataset>,
    history: History<Dataset>,
    dirty: bool,
    last_error: Option<String>,
    /// Bumped by load and clear; in-flight results from an older epoch are dropped
    epoch: u64,
    /// Bumped by every change to the dataset
    revision: u64,
}

impl Inner {
    fn empty() -> Self {
        Self {
            state: SessionState::Empty,
            source: None,
            loading: None,
            dataset: None,
            history: History::new(),
            dirty: false,
            last_error: None,
            epoch: 0,
            revision: 0,
        }
    }

    fn fail<T>(&mut self, err: SessionError) -> Result<T, SessionError> {
        if err != SessionError::Superseded {
            self.last_error = Some(err.to_string());
        }
        Err(err)
    }

    fn succeed(&mut self) {
        self.last_error = None;
    }

    fn touch(&mut self) {
        self.dirty = true;
        self.revision += 1;
    }

    fn current(&self) -> Result<&Dataset, SessionError> {
        if self.state == SessionState::Loading {
            return Err(SessionError::Loading);
        }
        self.dataset.as_ref().ok_or_else(SessionError::no_dataset)
    }

    fn current_mut(&mut self) -> Result<&mut Dataset, SessionError> {
        if self.state == SessionState::Loading {
            return Err(SessionError::Loading);
        }
        self.dataset.as_mut().ok_or_else(SessionError::no_dataset)
    }

    /// Gate for save and agent edit: only one remote mutation at a time.
    fn begin_remote(&self) -> Result<FileRef, SessionError> {
        match self.state {
            SessionState::Ready => self.source.clone().ok_or_else(SessionError::no_dataset),
            SessionState::Busy => Err(SessionError::Busy),
            SessionState::Loading => Err(SessionError::Loading),
            SessionState::Empty => Err(SessionError::no_dataset()),
        }
    }
}

/// Spreadsheet session controller.
///
/// All methods take `&self`; share a session across threads behind an `Arc`
/// or a scoped borrow. Listeners run on the thread that completed the load
/// and must not register further listeners from inside the callback.
pub struct Session<B, S> {
    backend: B,
    store: S,
    inner: Mutex<Inner>,
    listeners: Mutex<Vec<LoadListener>>,
}

impl<B: Backend, S: SnapshotStore> Session<B, S> {
    /// Create a session, restoring the persisted snapshot when a valid one exists.
    pub fn new(backend: B, store: S) -> Self {
        let mut inner = Inner::empty();
        match store.read() {
            Ok(Some(snapshot)) => {
                log::info!(
                    "Restored {} ({} rows) from local snapshot",
                    snapshot.source.name,
                    snapshot.rows.len()
                );
                inner.dataset = Some(snapshot.dataset());
                inner.source = Some(snapshot.source);
                inner.state = SessionState::Ready;
            }
            Ok(None) => {}
            Err(e) => log::warn!("Ignoring local snapshot: {}", e),
        }

        Self {
            backend,
            store,
            inner: Mutex::new(inner),
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    // ── Load ────────────────────────────────────────────────────────

    /// Upload a local file.
    pub fn upload(&self, path: &Path) -> Result<FileRef, SessionError> {
        log::debug!("Uploading {}", path.display());
        let result = self.backend.upload(path);
        let mut inner = self.inner.lock();
        match result {
            Ok(file) => {
                inner.succeed();
                Ok(file)
            }
            Err(e) => inner.fail(e.into()),
        }
    }

    /// Upload a local file, then load it.
    pub fn open(&self, path: &Path) -> Result<FileRef, SessionError> {
        {
            let mut inner = self.inner.lock();
            if inner.state == SessionState::Busy {
                return inner.fail(SessionError::Busy);
            }
        }
        let file = self.upload(path)?;
        self.load(file.clone())?;
        Ok(file)
    }

    /// Replace the session with a file the backend already holds.
    ///
    /// The current dataset and history are dropped as soon as the request
    /// starts. A second load issued before this one completes wins; this
    /// call then returns `Superseded` without touching the session.
    pub fn load(&self, file: FileRef) -> Result<(), SessionError> {
        let epoch = {
            let mut inner = self.inner.lock();
            if inner.state == SessionState::Busy {
                return inner.fail(SessionError::Busy);
            }
            inner.epoch += 1;
            inner.state = SessionState::Loading;
            inner.loading = Some(file.clone());
            inner.source = None;
            inner.dataset = None;
            inner.history.clear();
            inner.dirty = false;
            inner.epoch
        };

        log::debug!("Loading {} from {}", file.name, file.url);
        let result = self.backend.load(&file.url);

        {
            let mut guard = self.inner.lock();
            let inner = &mut *guard;
            if inner.epoch != epoch {
                log::debug!("Dropping superseded load of {}", file.name);
                return Err(SessionError::Superseded);
            }
            inner.loading = None;

            match result {
                Ok(resp) => {
                    let dataset = Dataset::from_parts(resp.columns, resp.rows);
                    log::info!(
                        "Loaded {}: {} rows, {} columns",
                        file.name,
                        dataset.row_count(),
                        dataset.column_count()
                    );
                    inner.dataset = Some(dataset);
                    inner.source = Some(file.clone());
                    inner.state = SessionState::Ready;
                    inner.revision += 1;
                    inner.succeed();
                    self.persist(inner);
                }
                Err(e) => {
                    inner.state = SessionState::Empty;
                    return inner.fail(e.into());
                }
            }
        }

        self.notify_loaded(&file);
        Ok(())
    }

    /// Files the backend offers for loading.
    pub fn list_files(&self) -> Result<Vec<FileEntry>, SessionError> {
        let result = self.backend.list_files();
        let mut inner = self.inner.lock();
        match result {
            Ok(files) => {
                inner.succeed();
                Ok(files)
            }
            Err(e) => inner.fail(e.into()),
        }
    }

    // ── Local edits ─────────────────────────────────────────────────

    /// Set one cell. `column` is a key, or a display name when no key matches.
    pub fn edit_cell(&self, row: usize, column: &str, value: Value) -> Result<(), SessionError> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        let result = inner.current_mut().and_then(|dataset| {
            let key = dataset
                .resolve_column(column)
                .map(|c| c.key.clone())
                .ok_or_else(|| DatasetError::UnknownColumn(column.to_string()))?;
            let before = dataset.clone();
            dataset.set_cell(row, &key, value)?;
            Ok(before)
        });

        match result {
            Ok(before) => {
                inner.history.record(before);
                inner.touch();
                inner.succeed();
                Ok(())
            }
            Err(e) => inner.fail(e),
        }
    }

    /// Set one cell from free text, keeping the existing cell's type where
    /// the text allows it.
    pub fn edit_cell_text(&self, row: usize, column: &str, text: &str) -> Result<(), SessionError> {
        let existing = {
            let mut inner = self.inner.lock();
            let existing = inner.current().map(|dataset| {
                dataset
                    .resolve_column(column)
                    .and_then(|c| dataset.get(row, &c.key))
                    .cloned()
                    .unwrap_or(Value::Null)
            });
            match existing {
                Ok(value) => value,
                Err(e) => return inner.fail(e),
            }
        };
        self.edit_cell(row, column, cell::coerce_like(&existing, text))
    }

    /// Restore the snapshot before the last change. `Ok(false)` when there
    /// is nothing to undo.
    pub fn undo(&self) -> Result<bool, SessionError> {
        self.step(|history, current| history.undo(current))
    }

    /// Reapply the most recently undone change. `Ok(false)` when there is
    /// nothing to redo.
    pub fn redo(&self) -> Result<bool, SessionError> {
        self.step(|history, current| history.redo(current))
    }

    fn step(
        &self,
        apply: impl FnOnce(&mut History<Dataset>, Dataset) -> Option<Dataset>,
    ) -> Result<bool, SessionError> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        if inner.state == SessionState::Loading {
            return inner.fail(SessionError::Loading);
        }
        let Some(current) = inner.dataset.clone() else {
            return Ok(false);
        };

        match apply(&mut inner.history, current) {
            Some(restored) => {
                inner.dataset = Some(restored);
                inner.touch();
                inner.succeed();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    // ── Remote mutations ────────────────────────────────────────────

    /// Push the current rows to the backend under the source name.
    ///
    /// On success the session is clean again, unless it was edited while
    /// the request was out. Failure leaves the dataset and dirty flag as
    /// they were.
    pub fn save(&self) -> Result<(), SessionError> {
        let (epoch, revision, source, rows) = {
            let mut guard = self.inner.lock();
            let inner = &mut *guard;
            let source = match inner.begin_remote() {
                Ok(source) => source,
                Err(e) => return inner.fail(e),
            };
            let rows = inner.dataset.as_ref().map(|d| d.rows.clone()).unwrap_or_default();
            inner.state = SessionState::Busy;
            (inner.epoch, inner.revision, source, rows)
        };

        log::debug!("Saving {} rows as {}", rows.len(), source.name);
        let result = self.backend.save(&source.name, &rows);

        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        if inner.epoch != epoch {
            return Err(SessionError::Superseded);
        }
        inner.state = SessionState::Ready;

        match result {
            Ok(()) => {
                if inner.revision == revision {
                    inner.dirty = false;
                }
                inner.succeed();
                self.persist(inner);
                log::info!("Saved {} ({} rows)", source.name, rows.len());
                Ok(())
            }
            Err(e) => inner.fail(e.into()),
        }
    }

    /// Apply a natural-language command through the backend.
    ///
    /// The response replaces the rows wholesale, and the schema too when the
    /// response carries one. A response schema goes through the same column
    /// normalization as a load: a repeated key keeps its first entry and a
    /// blank label shows the key, so such a schema is not kept verbatim.
    /// The previous dataset goes onto the undo stack. A blank command is
    /// rejected without contacting the backend.
    pub fn ai_edit(&self, command: &str) -> Result<(), SessionError> {
        let command = command.trim();
        let (epoch, source) = {
            let mut guard = self.inner.lock();
            let inner = &mut *guard;
            if command.is_empty() {
                return inner.fail(SessionError::Validation("Command is empty".into()));
            }
            let source = match inner.begin_remote() {
                Ok(source) => source,
                Err(e) => return inner.fail(e),
            };
            inner.state = SessionState::Busy;
            (inner.epoch, source)
        };

        log::debug!("Agent edit on {}: {:?}", source.name, command);
        let result = self.backend.agent_edit(&source.url, command);

        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        if inner.epoch != epoch {
            return Err(SessionError::Superseded);
        }
        inner.state = SessionState::Ready;

        match result {
            Ok(resp) => {
                let previous = inner.dataset.take().unwrap_or_default();
                let next = match resp.columns {
                    Some(columns) => Dataset::from_parts(Some(columns), resp.rows),
                    None if previous.columns.is_empty() => Dataset::from_parts(None, resp.rows),
                    None => Dataset::new(previous.columns.clone(), resp.rows),
                };
                log::info!(
                    "Agent edit replaced {}: {} -> {} rows",
                    source.name,
                    previous.row_count(),
                    next.row_count()
                );
                inner.history.record(previous);
                inner.dataset = Some(next);
                inner.touch();
                inner.succeed();
                self.persist(inner);
                Ok(())
            }
            Err(e) => inner.fail(e.into()),
        }
    }

    // ── Export ──────────────────────────────────────────────────────

    /// Serialize the current dataset. No network, no state change.
    pub fn export_local(&self, format: ExportFormat) -> Result<LocalExport, SessionError> {
        let (dataset, name) = {
            let mut inner = self.inner.lock();
            let dataset = inner.current().cloned();
            match dataset {
                Ok(dataset) => (dataset, inner.source.as_ref().map(|s| s.name.clone())),
                Err(e) => return inner.fail(e),
            }
        };

        let bytes = io::export_to_bytes(&dataset, format).map_err(SessionError::Export);
        let mut inner = self.inner.lock();
        match bytes {
            Ok(bytes) => {
                inner.succeed();
                Ok(LocalExport {
                    file_name: io::export_file_name(name.as_deref(), format),
                    format,
                    bytes,
                })
            }
            Err(e) => inner.fail(e),
        }
    }

    /// The backend's xlsx rendition of the last saved copy of the source.
    pub fn export_remote(&self) -> Result<LocalExport, SessionError> {
        let source = {
            let mut inner = self.inner.lock();
            let source = match inner.state {
                SessionState::Loading => Err(SessionError::Loading),
                _ => inner.source.clone().ok_or_else(SessionError::no_dataset),
            };
            match source {
                Ok(source) => source,
                Err(e) => return inner.fail(e),
            }
        };

        log::debug!("Fetching backend xlsx for {}", source.name);
        let result = self.backend.export_xlsx(&source.name);
        let mut inner = self.inner.lock();
        match result {
            Ok(bytes) => {
                inner.succeed();
                Ok(LocalExport {
                    file_name: io::export_file_name(Some(&source.name), ExportFormat::Xlsx),
                    format: ExportFormat::Xlsx,
                    bytes,
                })
            }
            Err(e) => inner.fail(e.into()),
        }
    }

    // ── Lifecycle ───────────────────────────────────────────────────

    /// Drop the dataset, history and persisted snapshot. In-flight requests
    /// complete as `Superseded`.
    pub fn clear(&self) {
        {
            let mut inner = self.inner.lock();
            let epoch = inner.epoch + 1;
            let revision = inner.revision + 1;
            *inner = Inner { epoch, revision, ..Inner::empty() };
        }
        if let Err(e) = self.store.clear() {
            log::warn!("Failed to clear local snapshot: {}", e);
        }
        log::info!("Session cleared");
    }

    pub fn dismiss_error(&self) {
        self.inner.lock().last_error = None;
    }

    /// Register a callback run after every successful load.
    pub fn on_file_loaded(&self, listener: impl Fn(&FileRef) + Send + Sync + 'static) {
        self.listeners.lock().push(Box::new(listener));
    }

    // ── Accessors ───────────────────────────────────────────────────

    pub fn state(&self) -> SessionState {
        self.inner.lock().state
    }

    pub fn source(&self) -> Option<FileRef> {
        self.inner.lock().source.clone()
    }

    /// A copy of the current dataset.
    pub fn dataset(&self) -> Option<Dataset> {
        self.inner.lock().dataset.clone()
    }

    pub fn is_dirty(&self) -> bool {
        self.inner.lock().dirty
    }

    pub fn last_error(&self) -> Option<String> {
        self.inner.lock().last_error.clone()
    }

    pub fn view(&self) -> SessionView {
        let inner = self.inner.lock();
        SessionView {
            state: inner.state,
            source: inner.source.clone(),
            loading: inner.loading.clone(),
            rows: inner.dataset.as_ref().map_or(0, Dataset::row_count),
            columns: inner.dataset.as_ref().map_or(0, Dataset::column_count),
            dirty: inner.dirty,
            can_undo: inner.history.can_undo(),
            can_redo: inner.history.can_redo(),
            undo_depth: inner.history.undo_len(),
            redo_depth: inner.history.redo_len(),
            last_error: inner.last_error.clone(),
        }
    }

    // ── Internal helpers ────────────────────────────────────────────

    /// Best-effort: the backend holds the saved copy, so a failed local
    /// write is only logged.
    fn persist(&self, inner: &Inner) {
        let (Some(source), Some(dataset)) = (&inner.source, &inner.dataset) else {
            return;
        };
        if let Err(e) = self.store.write(&PersistedSnapshot::new(source.clone(), dataset)) {
            log::warn!("Failed to write local snapshot: {}", e);
        }
    }

    fn notify_loaded(&self, file: &FileRef) {
        for listener in self.listeners.lock().iter() {
            listener(file);
        }
    }
}
