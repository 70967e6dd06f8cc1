//! Durable local copy of the active session.
//!
//! Three co-addressed keys form one snapshot: the raw row array, the column
//! schema and the source identity. They are written and cleared as a group;
//! a snapshot only counts when all three are present, parse, and carry the
//! same write generation.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use datadesk_engine::{Column, Dataset, FileRef, Record};

pub const ROWS_KEY: &str = "rows.json";
pub const COLUMNS_KEY: &str = "columns.json";
pub const SOURCE_KEY: &str = "source.json";

const KEYS: [&str; 3] = [ROWS_KEY, COLUMNS_KEY, SOURCE_KEY];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedSnapshot {
    pub source: FileRef,
    pub columns: Vec<Column>,
    pub rows: Vec<Record>,
}

impl PersistedSnapshot {
    pub fn new(source: FileRef, dataset: &Dataset) -> Self {
        Self {
            source,
            columns: dataset.columns.clone(),
            rows: dataset.rows.clone(),
        }
    }

    pub fn dataset(&self) -> Dataset {
        Dataset::new(self.columns.clone(), self.rows.clone())
    }
}

/// Error type for snapshot storage.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    /// File system failure (permissions, disk full, ...)
    Io(String),
    /// Stored data is partial or does not parse
    Corrupt(String),
    /// Snapshot could not be encoded
    Serialize(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Io(msg) => write!(f, "snapshot I/O error: {}", msg),
            StoreError::Corrupt(msg) => write!(f, "snapshot is corrupt: {}", msg),
            StoreError::Serialize(msg) => write!(f, "snapshot serialization failed: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

/// Storage capability for the session snapshot.
///
/// Callers treat `write` as best-effort: the backend is the source of truth
/// for saved data, so a failed write is reported here and ignored upstream.
pub trait SnapshotStore: Send + Sync {
    /// `Ok(None)` when nothing is stored.
    fn read(&self) -> Result<Option<PersistedSnapshot>, StoreError>;
    fn write(&self, snapshot: &PersistedSnapshot) -> Result<(), StoreError>;
    fn clear(&self) -> Result<(), StoreError>;
}

impl<T: SnapshotStore + ?Sized> SnapshotStore for Box<T> {
    fn read(&self) -> Result<Option<PersistedSnapshot>, StoreError> {
        (**self).read()
    }

    fn write(&self, snapshot: &PersistedSnapshot) -> Result<(), StoreError> {
        (**self).write(snapshot)
    }

    fn clear(&self) -> Result<(), StoreError> {
        (**self).clear()
    }
}

impl<T: SnapshotStore + ?Sized> SnapshotStore for Arc<T> {
    fn read(&self) -> Result<Option<PersistedSnapshot>, StoreError> {
        (**self).read()
    }

    fn write(&self, snapshot: &PersistedSnapshot) -> Result<(), StoreError> {
        (**self).write(snapshot)
    }

    fn clear(&self) -> Result<(), StoreError> {
        (**self).clear()
    }
}

// ── File store ──────────────────────────────────────────────────────

/// Snapshot kept as three JSON files in one directory.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    dir: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store under `<config dir>/snapshot`.
    pub fn default_location() -> Self {
        Self::new(crate::config_dir().join("snapshot"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }

    fn staging_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.tmp", key))
    }

    fn read_key(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.path(key);
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io(format!("{}: {}", path.display(), e))),
        }
    }

    fn remove_staged(&self) {
        for key in KEYS {
            let _ = fs::remove_file(self.staging_path(key));
        }
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn read(&self) -> Result<Option<PersistedSnapshot>, StoreError> {
        let rows = self.read_key(ROWS_KEY)?;
        let columns = self.read_key(COLUMNS_KEY)?;
        let source = self.read_key(SOURCE_KEY)?;

        let (rows, columns, source) = match (rows, columns, source) {
            (None, None, None) => return Ok(None),
            (Some(r), Some(c), Some(s)) => (r, c, s),
            _ => return Err(StoreError::Corrupt("incomplete snapshot".into())),
        };

        let rows = Stored::open(ROWS_KEY, &rows)?;
        let columns = Stored::open(COLUMNS_KEY, &columns)?;
        // A bare identifier is not JSON at all
        let source = Stored::open(SOURCE_KEY, &source).unwrap_or_else(|_| Stored {
            generation: None,
            data: Value::String(source.trim().to_string()),
        });

        // Keys renamed into place by different writes must not be mixed
        if rows.generation != columns.generation || rows.generation != source.generation {
            return Err(StoreError::Corrupt("keys are from different writes".into()));
        }

        let rows: Vec<Record> = serde_json::from_value(rows.data)
            .map_err(|e| StoreError::Corrupt(format!("{}: {}", ROWS_KEY, e)))?;
        let columns: Vec<Column> = serde_json::from_value(columns.data)
            .map_err(|e| StoreError::Corrupt(format!("{}: {}", COLUMNS_KEY, e)))?;
        let source = parse_source(source.data)?;

        Ok(Some(PersistedSnapshot { source, columns, rows }))
    }

    fn write(&self, snapshot: &PersistedSnapshot) -> Result<(), StoreError> {
        let generation = Uuid::new_v4().to_string();
        let encoded = [
            (ROWS_KEY, Envelope::encode(&generation, &snapshot.rows)),
            (COLUMNS_KEY, Envelope::encode(&generation, &snapshot.columns)),
            (SOURCE_KEY, Envelope::encode(&generation, &snapshot.source)),
        ];

        fs::create_dir_all(&self.dir)
            .map_err(|e| StoreError::Io(format!("{}: {}", self.dir.display(), e)))?;

        // Stage every key first so a failure leaves the previous snapshot intact
        for (key, contents) in encoded {
            let contents = contents.map_err(|e| StoreError::Serialize(e.to_string()))?;
            if let Err(e) = fs::write(self.staging_path(key), contents) {
                self.remove_staged();
                return Err(StoreError::Io(format!("{}: {}", key, e)));
            }
        }

        for key in KEYS {
            if let Err(e) = fs::rename(self.staging_path(key), self.path(key)) {
                self.remove_staged();
                return Err(StoreError::Io(format!("{}: {}", key, e)));
            }
        }

        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.remove_staged();
        for key in KEYS {
            let path = self.path(key);
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(StoreError::Io(format!("{}: {}", path.display(), e))),
            }
        }
        Ok(())
    }
}

/// On-disk form of one key: the payload tagged with the write that produced it.
#[derive(Serialize)]
struct Envelope<'a, T: Serialize> {
    generation: &'a str,
    data: &'a T,
}

impl<'a, T: Serialize> Envelope<'a, T> {
    fn encode(generation: &'a str, data: &'a T) -> serde_json::Result<String> {
        serde_json::to_string(&Envelope { generation, data })
    }
}

/// A key as read back. Files written before generations existed hold the
/// bare payload and have no generation.
struct Stored {
    generation: Option<String>,
    data: Value,
}

impl Stored {
    fn open(key: &str, contents: &str) -> Result<Self, StoreError> {
        let value: Value =
            serde_json::from_str(contents).map_err(|e| StoreError::Corrupt(format!("{}: {}", key, e)))?;
        match value {
            Value::Object(mut map) if map.contains_key("generation") && map.contains_key("data") => {
                let generation = match map.remove("generation") {
                    Some(Value::String(g)) => g,
                    _ => return Err(StoreError::Corrupt(format!("{}: bad generation", key))),
                };
                let data = map.remove("data").unwrap_or(Value::Null);
                Ok(Stored { generation: Some(generation), data })
            }
            data => Ok(Stored { generation: None, data }),
        }
    }
}

/// The source key holds a serialized `FileRef`. A bare identifier string
/// is accepted as both name and locator.
fn parse_source(data: Value) -> Result<FileRef, StoreError> {
    let raw = match data {
        Value::String(raw) => raw.trim().to_string(),
        other => {
            return serde_json::from_value::<FileRef>(other)
                .map_err(|e| StoreError::Corrupt(format!("{}: {}", SOURCE_KEY, e)))
        }
    };
    if raw.is_empty() {
        return Err(StoreError::Corrupt(format!("{}: empty source", SOURCE_KEY)));
    }
    Ok(FileRef::new(raw.clone(), raw))
}

// ── Memory store ────────────────────────────────────────────────────

/// In-process store, for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    slot: Mutex<Option<PersistedSnapshot>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: PersistedSnapshot) -> Self {
        Self { slot: Mutex::new(Some(snapshot)) }
    }

    /// Current contents without going through the trait.
    pub fn peek(&self) -> Option<PersistedSnapshot> {
        self.slot.lock().clone()
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn read(&self) -> Result<Option<PersistedSnapshot>, StoreError> {
        Ok(self.slot.lock().clone())
    }

    fn write(&self, snapshot: &PersistedSnapshot) -> Result<(), StoreError> {
        *self.slot.lock() = Some(snapshot.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        *self.slot.lock() = None;
        Ok(())
    }
}
