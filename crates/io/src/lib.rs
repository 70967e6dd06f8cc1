// Local export of the active dataset

pub mod csv;
pub mod xlsx;

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use datadesk_engine::Dataset;

/// File name used when no source name is known.
pub const DEFAULT_EXPORT_STEM: &str = "export";

/// Formats the dataset can be exported to locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Csv,
    Tsv,
    Xlsx,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Tsv => "tsv",
            ExportFormat::Xlsx => "xlsx",
        }
    }

    /// Infer the format from a path's extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(|e| e.parse().ok())
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "tsv" | "tab" => Ok(ExportFormat::Tsv),
            "xlsx" | "excel" => Ok(ExportFormat::Xlsx),
            other => Err(format!("unknown export format '{}' (expected csv, tsv or xlsx)", other)),
        }
    }
}

/// Derive the download name: source name without its extension, plus the
/// format's extension. Falls back to `export` when there is no usable name.
pub fn export_file_name(source_name: Option<&str>, format: ExportFormat) -> String {
    let stem = source_name
        .map(|name| name.rsplit(['/', '\\']).next().unwrap_or(name))
        .map(strip_extension)
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(DEFAULT_EXPORT_STEM);
    format!("{}.{}", stem, format.extension())
}

fn strip_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(idx) if idx + 1 < name.len() => &name[..idx],
        _ => name,
    }
}

/// Serialize a dataset in the given format.
pub fn export_to_bytes(dataset: &Dataset, format: ExportFormat) -> Result<Vec<u8>, String> {
    match format {
        ExportFormat::Csv => crate::csv::to_bytes(dataset, b','),
        ExportFormat::Tsv => crate::csv::to_bytes(dataset, b'\t'),
        ExportFormat::Xlsx => xlsx::to_bytes(dataset),
    }
}
