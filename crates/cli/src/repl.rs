//! Interactive shell.
//!
//! Keeps one session alive for the whole run, so cell edits accumulate and
//! undo/redo work. Errors are printed and the shell carries on.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use datadesk_config::{Settings, SnapshotStore};
use datadesk_io::ExportFormat;
use datadesk_session::{Backend, Session, SessionError};

use crate::{loaded_summary, resolve_file, resolve_format, row_index, table, write_export, DEFAULT_SHOW_ROWS};

const PROMPT: &str = "ddesk> ";

const HELP: &str = "\
Commands:
  show [row] [count]        print rows (default: from row 1, 20 rows)
  set <row> <column> <value> set one cell (empty value clears it)
  undo | redo               step through edit history
  ai <instruction>          natural-language edit via the backend
  save                      save rows to the backend
  export [format] [path]    write csv, tsv or xlsx locally
  fetch-xlsx [path]         download the backend's xlsx copy
  open <path>               upload a local file and load it
  load <name|url>           load a file the backend holds
  files                     list backend files
  status                    session state
  dismiss                   clear the last error
  clear                     forget the file and local snapshot
  help | quit";

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ShellCommand {
    Show { offset: usize, limit: usize },
    Set { row: usize, column: String, value: String },
    Undo,
    Redo,
    Ai(String),
    Save,
    Export { format: Option<ExportFormat>, output: Option<PathBuf> },
    FetchXlsx(Option<PathBuf>),
    Open(PathBuf),
    Load(String),
    Files,
    Status,
    Dismiss,
    Clear,
    Help,
    Quit,
}

/// Parse one input line. `Ok(None)` for blank lines and comments.
pub(crate) fn parse(line: &str) -> Result<Option<ShellCommand>, String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };
    // The instruction is passed through untouched
    if word.eq_ignore_ascii_case("ai") {
        return Ok(Some(ShellCommand::Ai(rest.to_string())));
    }
    let args = split_args(rest)?;

    let command = match word.to_ascii_lowercase().as_str() {
        "show" | "ls" => {
            let from = match args.first() {
                Some(n) => parse_number(n, "row")?,
                None => 1,
            };
            let limit = match args.get(1) {
                Some(n) => parse_number(n, "count")?,
                None => DEFAULT_SHOW_ROWS,
            };
            ShellCommand::Show { offset: row_index(from.max(1))?, limit }
        }
        "set" => {
            if args.len() < 2 {
                return Err("usage: set <row> <column> <value>".into());
            }
            let row = row_index(parse_number(&args[0], "row")?)?;
            ShellCommand::Set { row, column: args[1].clone(), value: args[2..].join(" ") }
        }
        "undo" | "u" => ShellCommand::Undo,
        "redo" | "r" => ShellCommand::Redo,
        "save" | "w" => ShellCommand::Save,
        "export" => {
            let mut format = None;
            let mut output = None;
            for arg in &args {
                match arg.parse::<ExportFormat>() {
                    Ok(f) if format.is_none() => format = Some(f),
                    _ if output.is_none() => output = Some(PathBuf::from(arg)),
                    _ => return Err("usage: export [csv|tsv|xlsx] [path]".into()),
                }
            }
            ShellCommand::Export { format, output }
        }
        "fetch-xlsx" => ShellCommand::FetchXlsx(args.first().map(PathBuf::from)),
        "open" => match args.as_slice() {
            [path] => ShellCommand::Open(PathBuf::from(path)),
            _ => return Err("usage: open <path>".into()),
        },
        "load" => match args.as_slice() {
            [target] => ShellCommand::Load(target.clone()),
            _ => return Err("usage: load <name|url>".into()),
        },
        "files" => ShellCommand::Files,
        "status" => ShellCommand::Status,
        "dismiss" => ShellCommand::Dismiss,
        "clear" => ShellCommand::Clear,
        "help" | "?" => ShellCommand::Help,
        "quit" | "exit" | "q" => ShellCommand::Quit,
        other => return Err(format!("unknown command '{}' (try `help`)", other)),
    };
    Ok(Some(command))
}

fn parse_number(text: &str, what: &str) -> Result<usize, String> {
    text.parse().map_err(|_| format!("{} must be a number, got '{}'", what, text))
}

/// Whitespace-separated words; double quotes group words and may be empty.
fn split_args(input: &str) -> Result<Vec<String>, String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quoted = false;

    for ch in input.chars() {
        match ch {
            '"' => {
                quoted = !quoted;
                in_word = true;
            }
            c if c.is_whitespace() && !quoted => {
                if in_word {
                    args.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            c => {
                current.push(c);
                in_word = true;
            }
        }
    }
    if quoted {
        return Err("unterminated quote".into());
    }
    if in_word {
        args.push(current);
    }
    Ok(args)
}

/// Run the shell until `quit` or end of input.
pub(crate) fn run<B, S, R, W>(session: &Session<B, S>, settings: &Settings, input: R, out: &mut W) -> io::Result<()>
where
    B: Backend,
    S: SnapshotStore,
    R: BufRead,
    W: Write,
{
    let view = session.view();
    match &view.source {
        Some(source) => writeln!(out, "{} ({} rows). Type `help` for commands.", source.name, view.rows)?,
        None => writeln!(out, "No file loaded. Type `help` for commands.")?,
    }

    let mut lines = input.lines();
    loop {
        write!(out, "{}", PROMPT)?;
        out.flush()?;

        let Some(line) = lines.next() else {
            writeln!(out)?;
            break;
        };
        let line = line?;

        let command = match parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(msg) => {
                writeln!(out, "error: {}", msg)?;
                continue;
            }
        };
        if command == ShellCommand::Quit {
            break;
        }
        if let Err(message) = execute(session, settings, command, out)? {
            writeln!(out, "error: {}", message)?;
        }
    }

    if session.is_dirty() {
        writeln!(out, "Unsaved edits discarded (use `save` before quitting)")?;
    }
    Ok(())
}

/// Outer `Err` is a broken output stream; inner `Err` is a failed command.
fn execute<B, S, W>(
    session: &Session<B, S>,
    settings: &Settings,
    command: ShellCommand,
    out: &mut W,
) -> io::Result<Result<(), String>>
where
    B: Backend,
    S: SnapshotStore,
    W: Write,
{
    macro_rules! attempt {
        ($e:expr) => {
            match $e {
                Ok(v) => v,
                Err(e) => return Ok(Err(e.to_string())),
            }
        };
    }

    match command {
        ShellCommand::Show { offset, limit } => {
            let dataset = attempt!(session.dataset().ok_or_else(SessionError::no_dataset));
            write!(out, "{}", table::render_table(&dataset, offset, limit))?;
        }
        ShellCommand::Set { row, column, value } => {
            attempt!(session.edit_cell_text(row, &column, &value));
            writeln!(out, "Row {} updated", row + 1)?;
        }
        ShellCommand::Undo => {
            let done = attempt!(session.undo());
            writeln!(out, "{}", if done { "Undone" } else { "Nothing to undo" })?;
        }
        ShellCommand::Redo => {
            let done = attempt!(session.redo());
            writeln!(out, "{}", if done { "Redone" } else { "Nothing to redo" })?;
        }
        ShellCommand::Ai(instruction) => {
            attempt!(session.ai_edit(&instruction));
            let view = session.view();
            writeln!(out, "Edit applied: {} rows, {} columns (undo to revert)", view.rows, view.columns)?;
        }
        ShellCommand::Save => {
            attempt!(session.save());
            writeln!(out, "Saved")?;
        }
        ShellCommand::Export { format, output } => {
            let format = resolve_format(format, output.as_deref(), settings);
            let export = attempt!(session.export_local(format));
            if let Some(path) = attempt!(write_export(&export, output.as_deref(), settings)) {
                writeln!(out, "Wrote {}", path.display())?;
            }
        }
        ShellCommand::FetchXlsx(output) => {
            let export = attempt!(session.export_remote());
            if let Some(path) = attempt!(write_export(&export, output.as_deref(), settings)) {
                writeln!(out, "Wrote {}", path.display())?;
            }
        }
        ShellCommand::Open(path) => {
            let file = attempt!(session.open(&path));
            writeln!(out, "{}", loaded_summary(session, &file))?;
        }
        ShellCommand::Load(target) => {
            let file = attempt!(resolve_file(session, &target).map_err(|e| e.message));
            attempt!(session.load(file.clone()));
            writeln!(out, "{}", loaded_summary(session, &file))?;
        }
        ShellCommand::Files => {
            let files = attempt!(session.list_files());
            write!(out, "{}", table::render_files(&files))?;
        }
        ShellCommand::Status => write!(out, "{}", table::render_status(&session.view()))?,
        ShellCommand::Dismiss => session.dismiss_error(),
        ShellCommand::Clear => {
            session.clear();
            writeln!(out, "Session cleared")?;
        }
        ShellCommand::Help => writeln!(out, "{}", HELP)?,
        ShellCommand::Quit => {}
    }
    Ok(Ok(()))
}
