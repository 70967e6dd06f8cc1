// Configuration loading and local persistence

pub mod settings;
pub mod snapshot;

use std::path::PathBuf;

pub use settings::Settings;
pub use snapshot::{FileSnapshotStore, MemorySnapshotStore, PersistedSnapshot, SnapshotStore, StoreError};

/// Application directory under the platform config dir (`~/.config/datadesk` on Linux).
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("datadesk")
}
