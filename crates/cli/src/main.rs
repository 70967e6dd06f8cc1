// DataDesk CLI - spreadsheet sessions against the DataDesk backend
//
// One-shot commands work on the locally persisted session; `shell` keeps a
// single session alive so undo/redo are available.

mod exit_codes;
mod repl;
mod table;

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};

use datadesk_backend_client::{BackendClient, BackendError};
use datadesk_config::{FileSnapshotStore, Settings, SnapshotStore};
use datadesk_engine::FileRef;
use datadesk_io::ExportFormat;
use datadesk_session::{Backend, LocalExport, Session, SessionError};

use exit_codes::{backend_exit_code, session_exit_code, EXIT_ERROR, EXIT_SUCCESS, EXIT_USAGE};

pub(crate) const DEFAULT_SHOW_ROWS: usize = 20;

type CliSession = Session<BackendClient, FileSnapshotStore>;

#[derive(Parser)]
#[command(name = "ddesk")]
#[command(about = "Edit backend-hosted spreadsheets from the terminal")]
#[command(version)]
struct Cli {
    /// Backend API base URL (overrides settings.toml)
    #[arg(long, global = true, value_name = "URL", env = "DATADESK_API_BASE")]
    api_base: Option<String>,

    /// Directory holding the local session snapshot
    #[arg(long, global = true, value_name = "DIR", env = "DATADESK_SNAPSHOT_DIR")]
    snapshot_dir: Option<PathBuf>,

    /// Read settings from this file instead of the default location
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// More log output (-v info, -vv debug). RUST_LOG takes precedence
    #[arg(long, short = 'v', global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a local file and load it
    #[command(after_help = "\
Examples:
  ddesk open sales.csv
  ddesk open ~/Downloads/q1.xlsx")]
    Open {
        /// CSV or Excel file to upload
        file: PathBuf,
    },

    /// Load a file the backend already holds, by name or URL
    #[command(after_help = "\
Examples:
  ddesk load synthetic_customers.csv
  ddesk load http://localhost:8000/files/synthetic_customers.csv")]
    Load {
        /// File name as listed by `ddesk files`, or its URL
        target: String,
    },

    /// List files available on the backend
    Files {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the loaded dataset
    Show {
        /// First row to print (1-based)
        #[arg(long, default_value_t = 1)]
        from: usize,

        /// Number of rows to print
        #[arg(long, short = 'n', default_value_t = DEFAULT_SHOW_ROWS)]
        rows: usize,

        /// Print the full dataset as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the session state
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Set one cell and save the result to the backend
    #[command(after_help = "\
Examples:
  ddesk set 3 Age 41
  ddesk set 1 name \"Ada Lovelace\"
  ddesk set 2 notes ''        # clears the cell")]
    Set {
        /// Row number (1-based)
        row: usize,

        /// Column key or header name
        column: String,

        /// New value; numbers and booleans keep the cell's type
        value: String,
    },

    /// Apply a natural-language edit through the backend agent
    #[command(after_help = "\
Examples:
  ddesk ai remove rows where age is empty
  ddesk ai \"rename column amt to Amount\"")]
    Ai {
        /// The instruction; words are joined with spaces
        #[arg(required = true)]
        command: Vec<String>,
    },

    /// Save the current rows to the backend
    Save,

    /// Export the dataset locally (no network)
    #[command(after_help = "\
Examples:
  ddesk export                    # <name>.csv in the current directory
  ddesk export -f xlsx -o out/
  ddesk export -o - | head        # CSV to stdout")]
    Export {
        /// csv, tsv or xlsx (default: from --output, then settings)
        #[arg(long, short = 'f')]
        format: Option<ExportFormat>,

        /// File or directory to write; `-` for stdout
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Download the backend's xlsx rendition of the saved file
    FetchXlsx {
        /// File or directory to write; `-` for stdout
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Forget the loaded file and delete the local snapshot
    Clear,

    /// Interactive session with undo/redo
    Shell,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp(None)
        .init();
}

fn run(cli: Cli) -> Result<(), CliError> {
    let settings = load_settings(&cli)?;
    let session = open_session(&settings)?;

    match cli.command {
        Commands::Open { file } => cmd_open(&session, &file),
        Commands::Load { target } => cmd_load(&session, &target),
        Commands::Files { json } => cmd_files(&session, json),
        Commands::Show { from, rows, json } => cmd_show(&session, from, rows, json),
        Commands::Status { json } => cmd_status(&session, json),
        Commands::Set { row, column, value } => cmd_set(&session, row, &column, &value),
        Commands::Ai { command } => cmd_ai(&session, &command.join(" ")),
        Commands::Save => cmd_save(&session),
        Commands::Export { format, output } => cmd_export(&session, &settings, format, output),
        Commands::FetchXlsx { output } => cmd_fetch_xlsx(&session, &settings, output),
        Commands::Clear => {
            session.clear();
            println!("Session cleared");
            Ok(())
        }
        Commands::Shell => {
            let stdin = io::stdin();
            let mut stdout = io::stdout();
            repl::run(&session, &settings, stdin.lock(), &mut stdout)
                .map_err(|e| CliError::general(e.to_string()))
        }
    }
}

// ============================================================================
// Setup
// ============================================================================

/// Settings file, then DATADESK_* environment, then command-line flags.
fn load_settings(cli: &Cli) -> Result<Settings, CliError> {
    let mut settings = match &cli.config {
        Some(path) => Settings::load_from(path)
            .map_err(CliError::args)?
            .ok_or_else(|| CliError::args(format!("settings file not found: {}", path.display())))?,
        None => Settings::load(),
    };
    settings.apply_env();

    if let Some(base) = &cli.api_base {
        settings.backend.api_base = base.clone();
    }
    if let Some(dir) = &cli.snapshot_dir {
        settings.storage.snapshot_dir = Some(dir.clone());
    }
    Ok(settings)
}

fn open_session(settings: &Settings) -> Result<CliSession, CliError> {
    log::debug!("API base {}, snapshot in {}", settings.backend.api_base, settings.snapshot_dir().display());
    let client = BackendClient::new(settings.backend.api_base.clone(), settings.timeout())
        .map_err(CliError::backend)?;
    Ok(Session::new(client, FileSnapshotStore::new(settings.snapshot_dir())))
}

// ============================================================================
// Commands
// ============================================================================

fn cmd_open(session: &CliSession, file: &Path) -> Result<(), CliError> {
    let loaded = session.open(file).map_err(CliError::session)?;
    println!("{}", loaded_summary(session, &loaded));
    Ok(())
}

fn cmd_load(session: &CliSession, target: &str) -> Result<(), CliError> {
    let file = resolve_file(session, target)?;
    session.load(file.clone()).map_err(CliError::session)?;
    println!("{}", loaded_summary(session, &file));
    Ok(())
}

fn cmd_files(session: &CliSession, json: bool) -> Result<(), CliError> {
    let files = session.list_files().map_err(CliError::session)?;
    if json {
        println!("{}", to_json(&files)?);
    } else {
        print!("{}", table::render_files(&files));
    }
    Ok(())
}

fn cmd_show(session: &CliSession, from: usize, rows: usize, json: bool) -> Result<(), CliError> {
    let dataset = session
        .dataset()
        .ok_or_else(|| CliError::session(SessionError::no_dataset()))?;
    if json {
        println!("{}", to_json(&dataset)?);
    } else {
        print!("{}", table::render_table(&dataset, from.saturating_sub(1), rows));
    }
    Ok(())
}

fn cmd_status(session: &CliSession, json: bool) -> Result<(), CliError> {
    let view = session.view();
    if json {
        println!("{}", to_json(&view)?);
    } else {
        print!("{}", table::render_status(&view));
    }
    Ok(())
}

fn cmd_set(session: &CliSession, row: usize, column: &str, value: &str) -> Result<(), CliError> {
    let index = row_index(row).map_err(CliError::args)?;
    session.edit_cell_text(index, column, value).map_err(CliError::session)?;
    // Cell edits are not persisted locally; saving is what makes them stick
    session.save().map_err(CliError::session)?;
    println!("Row {} updated and saved", row);
    Ok(())
}

fn cmd_ai(session: &CliSession, command: &str) -> Result<(), CliError> {
    session.ai_edit(command).map_err(CliError::session)?;
    let view = session.view();
    println!("Edit applied: {} rows, {} columns", view.rows, view.columns);
    Ok(())
}

fn cmd_save(session: &CliSession) -> Result<(), CliError> {
    session.save().map_err(CliError::session)?;
    let view = session.view();
    let name = view.source.map(|s| s.name).unwrap_or_default();
    println!("Saved {} ({} rows)", name, view.rows);
    Ok(())
}

fn cmd_export(
    session: &CliSession,
    settings: &Settings,
    format: Option<ExportFormat>,
    output: Option<PathBuf>,
) -> Result<(), CliError> {
    let format = resolve_format(format, output.as_deref(), settings);
    let export = session.export_local(format).map_err(CliError::session)?;
    if let Some(path) = write_export(&export, output.as_deref(), settings).map_err(CliError::session)? {
        eprintln!("Wrote {}", path.display());
    }
    Ok(())
}

fn cmd_fetch_xlsx(session: &CliSession, settings: &Settings, output: Option<PathBuf>) -> Result<(), CliError> {
    let export = session.export_remote().map_err(CliError::session)?;
    if let Some(path) = write_export(&export, output.as_deref(), settings).map_err(CliError::session)? {
        eprintln!("Wrote {}", path.display());
    }
    Ok(())
}

// ============================================================================
// Shared helpers (also used by the shell)
// ============================================================================

pub(crate) fn loaded_summary<B: Backend, S: SnapshotStore>(session: &Session<B, S>, file: &FileRef) -> String {
    let view = session.view();
    format!("Loaded {}: {} rows, {} columns", file.name, view.rows, view.columns)
}

/// A URL is used as-is; anything else must match a file the backend lists.
pub(crate) fn resolve_file<B: Backend, S: SnapshotStore>(
    session: &Session<B, S>,
    target: &str,
) -> Result<FileRef, CliError> {
    if target.contains("://") {
        return Ok(FileRef::from_url(target));
    }
    let files = session.list_files().map_err(CliError::session)?;
    files
        .iter()
        .find(|f| f.name == target)
        .map(|f| f.file_ref())
        .ok_or_else(|| {
            CliError::args(format!("no file named '{}' on the backend", target))
                .with_hint("run `ddesk files` to see what is available")
        })
}

/// Rows are numbered from 1 on the command line.
pub(crate) fn row_index(row: usize) -> Result<usize, String> {
    row.checked_sub(1).ok_or_else(|| "rows are numbered from 1".to_string())
}

/// Explicit format, else the output's extension, else the configured default.
pub(crate) fn resolve_format(explicit: Option<ExportFormat>, output: Option<&Path>, settings: &Settings) -> ExportFormat {
    explicit
        .or_else(|| output.and_then(ExportFormat::from_path))
        .unwrap_or_else(|| {
            settings.export.default_format.parse().unwrap_or_else(|e| {
                log::warn!("export.default_format: {}; using csv", e);
                ExportFormat::Csv
            })
        })
}

/// Write an export. `-` means stdout (returns `None`); a directory receives
/// the derived file name; no output means the configured export directory.
pub(crate) fn write_export(
    export: &LocalExport,
    output: Option<&Path>,
    settings: &Settings,
) -> Result<Option<PathBuf>, SessionError> {
    match output {
        Some(path) if path == Path::new("-") => {
            let mut stdout = io::stdout();
            stdout
                .write_all(&export.bytes)
                .and_then(|()| stdout.flush())
                .map_err(|e| SessionError::Export(e.to_string()))?;
            Ok(None)
        }
        Some(path) if path.is_dir() => export.write_to(path).map(Some),
        Some(path) => export.write_as(path).map(|()| Some(path.to_path_buf())),
        None => {
            let dir = settings.export.output_dir.clone().unwrap_or_else(|| PathBuf::from("."));
            export.write_to(&dir).map(Some)
        }
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, CliError> {
    serde_json::to_string_pretty(value).map_err(|e| CliError::general(e.to_string()))
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn general(msg: impl Into<String>) -> Self {
        Self { code: EXIT_ERROR, message: msg.into(), hint: None }
    }

    /// Create error from session error with proper exit code.
    pub fn session(err: SessionError) -> Self {
        let code = session_exit_code(&err);
        let hint = match &err {
            e if *e == SessionError::no_dataset() => {
                Some("open a file first: `ddesk open <file>` or `ddesk load <name>`".to_string())
            }
            SessionError::Transport(BackendError::Network(_)) => {
                Some("is the backend running? check --api-base or DATADESK_API_BASE".to_string())
            }
            SessionError::Transport(BackendError::Timeout(_)) => {
                Some("raise backend.timeout_secs in settings.toml or set DATADESK_TIMEOUT_SECS".to_string())
            }
            _ => None,
        };
        Self { code, message: err.to_string(), hint }
    }

    pub fn backend(err: BackendError) -> Self {
        Self { code: backend_exit_code(&err), message: err.to_string(), hint: None }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}
