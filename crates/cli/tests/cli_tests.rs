// Integration tests for the `ddesk` binary against a mock backend.
// Run with: cargo test -p datadesk-cli --test cli_tests -- --nocapture
//
// Every test gets its own snapshot directory and settings file, so nothing
// from the developer's real configuration leaks in.

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};

use httpmock::prelude::*;
use serde_json::json;
use tempfile::TempDir;

const UNREACHABLE: &str = "http://127.0.0.1:9/api/backend";

struct Env {
    dir: TempDir,
    api_base: String,
}

impl Env {
    fn new(api_base: impl Into<String>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("settings.toml"), "[backend]\ntimeout_secs = 5\n").unwrap();
        Self { dir, api_base: api_base.into() }
    }

    fn with_server(server: &MockServer) -> Self {
        Self::new(server.url("/api/backend"))
    }

    fn snapshot_dir(&self) -> PathBuf {
        self.dir.path().join("snapshot")
    }

    fn ddesk(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_ddesk"));
        cmd.current_dir(self.dir.path())
            .env_remove("DATADESK_API_BASE")
            .env_remove("DATADESK_SNAPSHOT_DIR")
            .env_remove("DATADESK_TIMEOUT_SECS")
            .env_remove("RUST_LOG")
            .arg("--config")
            .arg(self.dir.path().join("settings.toml"))
            .arg("--snapshot-dir")
            .arg(self.snapshot_dir())
            .arg("--api-base")
            .arg(&self.api_base);
        cmd
    }

    fn run(&self, args: &[&str]) -> Output {
        self.ddesk().args(args).output().expect("run ddesk")
    }

    fn run_with_stdin(&self, args: &[&str], stdin: &str) -> Output {
        let mut child = self
            .ddesk()
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .expect("spawn ddesk");
        child.stdin.take().unwrap().write_all(stdin.as_bytes()).unwrap();
        child.wait_with_output().expect("wait for ddesk")
    }
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn code(output: &Output) -> i32 {
    output.status.code().expect("exit code")
}

fn mock_sales_load(server: &MockServer) -> String {
    let url = server.url("/files/sales.csv");
    server.mock(|when, then| {
        when.method(POST)
            .path("/api/backend/sheets/load")
            .json_body(json!({"url": url.clone()}));
        then.status(200).json_body(json!({
            "status": "success",
            "columns": [{"key": "a", "name": "A"}, {"key": "b", "name": "B"}],
            "rows": [{"a": 1, "b": "x"}, {"a": 2, "b": "y"}],
            "total": 2
        }));
    });
    url
}

fn load_sales(env: &Env, server: &MockServer) {
    let url = mock_sales_load(server);
    let output = env.run(&["load", &url]);
    assert_eq!(code(&output), 0, "stderr: {}", stderr(&output));
}

// ---------------------------------------------------------------------------
// Empty session
// ---------------------------------------------------------------------------

#[test]
fn status_on_fresh_snapshot_dir() {
    let env = Env::new(UNREACHABLE);
    let output = env.run(&["status"]);

    assert_eq!(code(&output), 0);
    assert!(stdout(&output).contains("state:    empty"));
}

#[test]
fn show_without_file_exits_20() {
    let env = Env::new(UNREACHABLE);
    let output = env.run(&["show"]);

    assert_eq!(code(&output), 20);
    assert!(stderr(&output).contains("error: No file is loaded"));
    assert!(stderr(&output).contains("hint:"));
}

#[test]
fn blank_ai_command_exits_22_without_request() {
    // The backend is unreachable, so any request would surface as exit 41
    let env = Env::new(UNREACHABLE);
    let output = env.run(&["ai", "   "]);

    assert_eq!(code(&output), 22);
    assert!(stderr(&output).contains("Command is empty"));
}

#[test]
fn missing_settings_file_is_usage_error() {
    let output = Command::new(env!("CARGO_BIN_EXE_ddesk"))
        .args(["--config", "/definitely/not/settings.toml", "status"])
        .output()
        .unwrap();
    assert_eq!(code(&output), 2);
}

// ---------------------------------------------------------------------------
// Load / show / export
// ---------------------------------------------------------------------------

#[test]
fn load_then_show_and_export() {
    let server = MockServer::start();
    let env = Env::with_server(&server);
    let url = mock_sales_load(&server);

    let output = env.run(&["load", &url]);
    assert_eq!(code(&output), 0, "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output).trim(), "Loaded sales.csv: 2 rows, 2 columns");

    // Later invocations work from the persisted snapshot
    let output = env.run(&["show"]);
    assert_eq!(code(&output), 0);
    assert_eq!(stdout(&output), "#  A  B\n1  1  x\n2  2  y\n(2 rows)\n");

    let out_dir = env.dir.path().join("exports");
    fs::create_dir_all(&out_dir).unwrap();
    let output = env.run(&["export", "-o", out_dir.to_str().unwrap()]);
    assert_eq!(code(&output), 0, "stderr: {}", stderr(&output));
    assert_eq!(fs::read_to_string(out_dir.join("sales.csv")).unwrap(), "A,B\n1,x\n2,y\n");

    let output = env.run(&["export", "-f", "tsv", "-o", "-"]);
    assert_eq!(stdout(&output), "A\tB\n1\tx\n2\ty\n");

    let xlsx = env.dir.path().join("copy.xlsx");
    let output = env.run(&["export", "-o", xlsx.to_str().unwrap()]);
    assert_eq!(code(&output), 0);
    assert_eq!(&fs::read(&xlsx).unwrap()[..2], b"PK");
}

#[test]
fn load_by_name_uses_file_listing() {
    let server = MockServer::start();
    let env = Env::with_server(&server);
    let url = mock_sales_load(&server);
    server.mock(|when, then| {
        when.method(GET).path("/api/backend/system/files");
        then.status(200).json_body(json!({"files": [
            {"name": "sales.csv", "url": url, "size": "1.1 KB", "created": "2024-05-01 10:00"}
        ]}));
    });

    let output = env.run(&["files"]);
    assert_eq!(code(&output), 0);
    assert!(stdout(&output).starts_with("sales.csv  1.1 KB"));

    let output = env.run(&["load", "sales.csv"]);
    assert_eq!(code(&output), 0, "stderr: {}", stderr(&output));

    let output = env.run(&["load", "nope.csv"]);
    assert_eq!(code(&output), 2);
    assert!(stderr(&output).contains("ddesk files"));
}

#[test]
fn status_json() {
    let server = MockServer::start();
    let env = Env::with_server(&server);
    load_sales(&env, &server);

    let output = env.run(&["status", "--json"]);
    let view: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(view["state"], "ready");
    assert_eq!(view["rows"], 2);
    assert_eq!(view["dirty"], false);
    assert_eq!(view["source"]["name"], "sales.csv");
}

// ---------------------------------------------------------------------------
// Mutations
// ---------------------------------------------------------------------------

#[test]
fn set_edits_and_saves() {
    let server = MockServer::start();
    let env = Env::with_server(&server);
    load_sales(&env, &server);

    let save = server.mock(|when, then| {
        when.method(POST).path("/api/backend/sheets/save").json_body(json!({
            "filename": "sales.csv",
            "rows": [{"a": 1, "b": "x"}, {"a": 2, "b": "z"}]
        }));
        then.status(200).json_body(json!({"status": "success"}));
    });

    let output = env.run(&["set", "2", "B", "z"]);
    assert_eq!(code(&output), 0, "stderr: {}", stderr(&output));
    save.assert();

    let output = env.run(&["show"]);
    assert!(stdout(&output).contains("2  2  z"));
}

#[test]
fn ai_edit_replaces_rows() {
    let server = MockServer::start();
    let env = Env::with_server(&server);
    load_sales(&env, &server);

    server.mock(|when, then| {
        when.method(POST)
            .path("/api/backend/sheets/agent-edit")
            .json_body(json!({"url": server.url("/files/sales.csv"), "command": "keep rows where a > 1"}));
        then.status(200).json_body(json!({"rows": [{"a": 2, "b": "y"}]}));
    });

    let output = env.run(&["ai", "keep", "rows", "where", "a", ">", "1"]);
    assert_eq!(code(&output), 0, "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("1 rows, 2 columns"));

    let output = env.run(&["show"]);
    assert_eq!(stdout(&output), "#  A  B\n1  2  y\n(1 rows)\n");
}

#[test]
fn backend_error_exits_40() {
    let server = MockServer::start();
    let env = Env::with_server(&server);
    server.mock(|when, then| {
        when.method(POST).path("/api/backend/sheets/load");
        then.status(404).json_body(json!({"error": "File not found: gone.csv"}));
    });

    let output = env.run(&["load", &server.url("/files/gone.csv")]);
    assert_eq!(code(&output), 40);
    assert!(stderr(&output).contains("error: File not found: gone.csv"));
}

#[test]
fn unreachable_backend_exits_41() {
    let env = Env::new(UNREACHABLE);
    let output = env.run(&["load", "http://127.0.0.1:9/files/x.csv"]);

    assert_eq!(code(&output), 41);
    assert!(stderr(&output).contains("--api-base"));
}

#[test]
fn clear_removes_snapshot() {
    let server = MockServer::start();
    let env = Env::with_server(&server);
    load_sales(&env, &server);
    assert!(env.snapshot_dir().join("rows.json").exists());

    let output = env.run(&["clear"]);
    assert_eq!(code(&output), 0);
    assert!(!env.snapshot_dir().join("rows.json").exists());

    let output = env.run(&["status"]);
    assert!(stdout(&output).contains("state:    empty"));
}

// ---------------------------------------------------------------------------
// Shell
// ---------------------------------------------------------------------------

#[test]
fn shell_edit_undo_show() {
    let server = MockServer::start();
    let env = Env::with_server(&server);
    load_sales(&env, &server);

    let output = env.run_with_stdin(&["shell"], "set 1 B changed\nshow\nundo\nshow\nquit\n");
    assert_eq!(code(&output), 0, "stderr: {}", stderr(&output));

    let out = stdout(&output);
    assert!(out.starts_with("sales.csv (2 rows)"));
    assert!(out.contains("1  1  changed"));
    assert!(out.contains("Undone"));
    assert!(out.contains("1  1  x"));
}

#[test]
fn shell_ends_on_eof() {
    let env = Env::new(UNREACHABLE);
    let output = env.run_with_stdin(&["shell"], "status\n");
    assert_eq!(code(&output), 0);
    assert!(stdout(&output).contains("state:    empty"));
}
