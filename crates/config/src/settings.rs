// Application settings
// Loaded from ~/.config/datadesk/settings.toml

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_API_BASE: &str = "DATADESK_API_BASE";
pub const ENV_SNAPSHOT_DIR: &str = "DATADESK_SNAPSHOT_DIR";
pub const ENV_TIMEOUT_SECS: &str = "DATADESK_TIMEOUT_SECS";

pub const DEFAULT_API_BASE: &str = "http://localhost:8000/api/backend";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Backend connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSettings {
    /// Base URL all endpoints hang off (e.g. ".../api/backend")
    pub api_base: String,

    /// Upper bound on any single request
    pub timeout_secs: u64,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Local persistence settings
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Where the session snapshot lives. None = <config dir>/snapshot
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_dir: Option<PathBuf>,
}

/// Local export settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    /// "csv", "tsv" or "xlsx"
    pub default_format: String,

    /// Directory exports are written to. None = current directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            default_format: "csv".to_string(),
            output_dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub backend: BackendSettings,
    pub storage: StorageSettings,
    pub export: ExportSettings,
}

impl Settings {
    /// Get the settings file path
    pub fn config_path() -> PathBuf {
        crate::config_dir().join("settings.toml")
    }

    /// Load settings from disk, falling back to defaults
    pub fn load() -> Self {
        let path = Self::config_path();
        match Self::load_from(&path) {
            Ok(Some(settings)) => settings,
            Ok(None) => Self::default(),
            Err(e) => {
                log::warn!("{}; using default settings", e);
                Self::default()
            }
        }
    }

    /// Load from an explicit path. `Ok(None)` when the file does not exist.
    pub fn load_from(path: &Path) -> Result<Option<Self>, String> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(path)
            .map_err(|e| format!("Error reading {}: {}", path.display(), e))?;
        Self::parse(&contents)
            .map(Some)
            .map_err(|e| format!("Error parsing {}: {}", path.display(), e))
    }

    pub fn parse(contents: &str) -> Result<Self, String> {
        toml::from_str(contents).map_err(|e| e.to_string())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), String> {
        // Ensure directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }

        let contents = toml::to_string_pretty(self).map_err(|e| e.to_string())?;
        fs::write(path, contents).map_err(|e| e.to_string())
    }

    /// Apply `DATADESK_*` overrides using the given variable lookup.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(base) = lookup(ENV_API_BASE).filter(|v| !v.trim().is_empty()) {
            self.backend.api_base = base;
        }
        if let Some(dir) = lookup(ENV_SNAPSHOT_DIR).filter(|v| !v.trim().is_empty()) {
            self.storage.snapshot_dir = Some(PathBuf::from(dir));
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            match raw.trim().parse::<u64>() {
                Ok(secs) => self.backend.timeout_secs = secs,
                Err(_) => log::warn!("Ignoring {}={:?}: not a number of seconds", ENV_TIMEOUT_SECS, raw),
            }
        }
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    pub fn snapshot_dir(&self) -> PathBuf {
        self.storage
            .snapshot_dir
            .clone()
            .unwrap_or_else(|| crate::config_dir().join("snapshot"))
    }

    /// Request timeout; never zero.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.backend.timeout_secs.max(1))
    }
}
