// Shared fixtures for session integration tests.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{json, Value};

use datadesk_backend_client::{AgentEditResponse, BackendError, FileEntry, LoadResponse};
use datadesk_config::{MemorySnapshotStore, PersistedSnapshot, SnapshotStore, StoreError};
use datadesk_engine::{Column, FileRef, Record};
use datadesk_session::{Backend, Session};

pub type TestSession = Session<Arc<FakeBackend>, Arc<MemorySnapshotStore>>;

pub fn record(value: Value) -> Record {
    value.as_object().cloned().unwrap()
}

pub fn records(value: Value) -> Vec<Record> {
    value.as_array().unwrap().iter().map(|r| record(r.clone())).collect()
}

pub fn sales() -> FileRef {
    FileRef::new("sales.csv", "http://localhost:8000/files/sales.csv")
}

pub fn sales_response() -> LoadResponse {
    LoadResponse {
        columns: Some(vec![Column::new("a", "A"), Column::new("b", "B")]),
        rows: records(json!([{"a": 1, "b": "x"}, {"a": 2, "b": "y"}])),
    }
}

/// Pauses the next backend call until the test releases it.
struct Gate {
    entered: Sender<()>,
    release: Receiver<()>,
}

/// Scripted backend that records every call.
#[derive(Default)]
pub struct FakeBackend {
    loads: Mutex<HashMap<String, Result<LoadResponse, BackendError>>>,
    edits: Mutex<VecDeque<Result<AgentEditResponse, BackendError>>>,
    save_result: Mutex<Option<BackendError>>,
    calls: Mutex<Vec<String>>,
    gate: Mutex<Option<Gate>>,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Backend that serves `sales.csv`.
    pub fn with_sales() -> Arc<Self> {
        let backend = Self::new();
        backend.serve(&sales(), Ok(sales_response()));
        backend
    }

    pub fn serve(&self, file: &FileRef, response: Result<LoadResponse, BackendError>) {
        self.loads.lock().insert(file.url.clone(), response);
    }

    pub fn queue_edit(&self, response: Result<AgentEditResponse, BackendError>) {
        self.edits.lock().push_back(response);
    }

    pub fn fail_saves(&self, err: BackendError) {
        *self.save_result.lock() = Some(err);
    }

    /// Hold the next backend call. Returns (entered, release): `entered`
    /// fires once the call is in flight, sending on `release` lets it finish.
    pub fn hold_next_call(&self) -> (Receiver<()>, Sender<()>) {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        *self.gate.lock() = Some(Gate { entered: entered_tx, release: release_rx });
        (entered_rx, release_tx)
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn called(&self, call: String) {
        self.calls.lock().push(call);
        let gate = self.gate.lock().take();
        if let Some(gate) = gate {
            let _ = gate.entered.send(());
            let _ = gate.release.recv();
        }
    }
}

impl Backend for FakeBackend {
    fn upload(&self, path: &Path) -> Result<FileRef, BackendError> {
        self.called(format!("upload {}", path.display()));
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| BackendError::Io("no file name".into()))?;
        Ok(FileRef::new(name.clone(), format!("http://localhost:8000/files/{}", name)))
    }

    fn load(&self, url: &str) -> Result<LoadResponse, BackendError> {
        self.called(format!("load {}", url));
        self.loads
            .lock()
            .get(url)
            .cloned()
            .unwrap_or_else(|| Err(BackendError::Backend(format!("File not found: {}", url))))
    }

    fn save(&self, filename: &str, rows: &[Record]) -> Result<(), BackendError> {
        self.called(format!("save {} {}", filename, rows.len()));
        match self.save_result.lock().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn agent_edit(&self, url: &str, command: &str) -> Result<AgentEditResponse, BackendError> {
        self.called(format!("agent-edit {} {}", url, command));
        self.edits
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(BackendError::Backend("no edit scripted".into())))
    }

    fn export_xlsx(&self, filename: &str) -> Result<Vec<u8>, BackendError> {
        self.called(format!("export-xlsx {}", filename));
        Ok(b"PK\x03\x04".to_vec())
    }

    fn list_files(&self) -> Result<Vec<FileEntry>, BackendError> {
        self.called("list-files".into());
        Ok(vec![FileEntry {
            name: "sales.csv".into(),
            url: sales().url,
            size: "1.0 KB".into(),
            created: None,
        }])
    }
}

/// Store whose writes always fail; reads see nothing.
pub struct BrokenStore;

impl SnapshotStore for BrokenStore {
    fn read(&self) -> Result<Option<PersistedSnapshot>, StoreError> {
        Ok(None)
    }

    fn write(&self, _snapshot: &PersistedSnapshot) -> Result<(), StoreError> {
        Err(StoreError::Io("disk full".into()))
    }

    fn clear(&self) -> Result<(), StoreError> {
        Err(StoreError::Io("read-only file system".into()))
    }
}

pub fn session_with(backend: Arc<FakeBackend>) -> (TestSession, Arc<MemorySnapshotStore>) {
    let store = Arc::new(MemorySnapshotStore::new());
    (Session::new(backend, store.clone()), store)
}

/// Session with `sales.csv` already loaded.
pub fn loaded_session() -> (TestSession, Arc<FakeBackend>, Arc<MemorySnapshotStore>) {
    let backend = FakeBackend::with_sales();
    let (session, store) = session_with(backend.clone());
    session.load(sales()).unwrap();
    (session, backend, store)
}
