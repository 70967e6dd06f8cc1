//! HTTP contract tests for the backend client.
//!
//! Each endpoint is exercised against a mock server: request shape, success
//! decoding, and the error-body rule (an `error` field wins over the status).

use std::time::Duration;

use httpmock::prelude::*;
use serde_json::json;

use datadesk_backend_client::{BackendClient, BackendError};
use datadesk_engine::{Column, Dataset, FileRef};

const BASE: &str = "/api/backend";

fn client(server: &MockServer) -> BackendClient {
    BackendClient::new(server.url(BASE), Duration::from_secs(5)).unwrap()
}

fn rows(value: serde_json::Value) -> Vec<datadesk_engine::Record> {
    value
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r.as_object().cloned().unwrap())
        .collect()
}

// ── load ────────────────────────────────────────────────────────────

#[test]
fn load_with_explicit_columns() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/api/backend/sheets/load")
            .json_body(json!({"url": "http://localhost:8000/files/data.csv"}));
        then.status(200).json_body(json!({
            "status": "success",
            "columns": [{"key": "a", "name": "A", "editable": true}, {"key": "b", "name": "B"}],
            "rows": [{"a": 1, "b": "x"}, {"a": 2, "b": "y"}],
            "total": 2
        }));
    });

    let resp = client(&server).load("http://localhost:8000/files/data.csv").unwrap();
    mock.assert();

    let ds = Dataset::from_parts(resp.columns, resp.rows);
    assert_eq!(ds.columns, vec![Column::new("a", "A"), Column::new("b", "B")]);
    assert_eq!(ds.row_count(), 2);
}

#[test]
fn load_error_body_with_404() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/api/backend/sheets/load");
        then.status(404).json_body(json!({"error": "File not found: gone.csv"}));
    });

    let err = client(&server).load("gone.csv").unwrap_err();
    assert_eq!(err, BackendError::Backend("File not found: gone.csv".into()));
    assert_eq!(err.to_string(), "File not found: gone.csv");
}

#[test]
fn load_error_body_with_200() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/api/backend/sheets/load");
        then.status(200).json_body(json!({"error": "could not parse workbook"}));
    });

    let err = client(&server).load("x.xlsx").unwrap_err();
    assert_eq!(err, BackendError::Backend("could not parse workbook".into()));
}

#[test]
fn falsy_error_field_is_success() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/api/backend/sheets/load");
        then.status(200).json_body(json!({"error": "", "rows": [{"a": 1}]}));
    });
    server.mock(|when, then| {
        when.method(POST).path("/api/backend/sheets/save");
        then.status(200).json_body(json!({"error": false, "status": "success"}));
    });

    let resp = client(&server).load("data.csv").unwrap();
    assert_eq!(resp.rows, rows(json!([{"a": 1}])));
    client(&server).save("data.csv", &resp.rows).unwrap();
}

#[test]
fn load_non_json_500_is_http_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/api/backend/sheets/load");
        then.status(500).body("Internal Server Error");
    });

    let err = client(&server).load("x.csv").unwrap_err();
    assert!(matches!(err, BackendError::Http(500, _)), "got {err:?}");
    assert!(err.is_transport());
}

#[test]
fn load_malformed_200_is_parse_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/api/backend/sheets/load");
        then.status(200).body("<html>proxy</html>");
    });

    let err = client(&server).load("x.csv").unwrap_err();
    assert!(matches!(err, BackendError::Parse(_)), "got {err:?}");
}

#[test]
fn load_times_out() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/api/backend/sheets/load");
        then.status(200)
            .delay(Duration::from_secs(3))
            .json_body(json!({"rows": []}));
    });

    let client = BackendClient::new(server.url(BASE), Duration::from_millis(200)).unwrap();
    let err = client.load("slow.csv").unwrap_err();
    assert!(matches!(err, BackendError::Timeout(_)), "got {err:?}");
}

// ── save ────────────────────────────────────────────────────────────

#[test]
fn save_sends_filename_and_rows_only() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/api/backend/sheets/save")
            .json_body(json!({"filename": "data.csv", "rows": [{"a": 1, "b": "x"}]}));
        then.status(200).json_body(json!({}));
    });

    client(&server)
        .save("data.csv", &rows(json!([{"a": 1, "b": "x"}])))
        .unwrap();
    mock.assert();
}

#[test]
fn save_failure_status_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/api/backend/sheets/save");
        then.status(200).json_body(json!({"status": "error", "message": "read-only storage"}));
    });

    let err = client(&server).save("data.csv", &[]).unwrap_err();
    assert_eq!(err, BackendError::Backend("read-only storage".into()));
}

// ── agent edit ──────────────────────────────────────────────────────

#[test]
fn agent_edit_request_and_response() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/api/backend/sheets/agent-edit")
            .json_body(json!({"url": "http://h/files/d.csv", "command": "drop column b"}));
        then.status(200).json_body(json!({"rows": [{"a": 1}], "columns": [{"key": "a", "name": "A"}]}));
    });

    let resp = client(&server)
        .agent_edit("http://h/files/d.csv", "drop column b")
        .unwrap();
    mock.assert();
    assert_eq!(resp.rows, rows(json!([{"a": 1}])));
    assert_eq!(resp.columns, Some(vec![Column::new("a", "A")]));
}

#[test]
fn agent_edit_without_rows_is_malformed() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/api/backend/sheets/agent-edit");
        then.status(200).json_body(json!({"status": "success", "diff_summary": "Executed 1 operations."}));
    });

    let err = client(&server).agent_edit("u", "do it").unwrap_err();
    assert!(matches!(err, BackendError::Parse(_)), "got {err:?}");
}

// ── upload / files / export ─────────────────────────────────────────

#[test]
fn upload_returns_file_ref() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST).path("/api/backend/sheets/upload");
        then.status(200).json_body(json!({
            "status": "success",
            "filename": "20240101_120000_data.csv",
            "url": "http://localhost:8000/files/20240101_120000_data.csv",
            "size": 12
        }));
    });

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.csv");
    std::fs::write(&path, "a,b\n1,x\n").unwrap();

    let file = client(&server).upload(&path).unwrap();
    mock.assert();
    assert_eq!(
        file,
        FileRef::new(
            "20240101_120000_data.csv",
            "http://localhost:8000/files/20240101_120000_data.csv"
        )
    );
}

#[test]
fn upload_missing_local_file_is_io_error() {
    let server = MockServer::start();
    let err = client(&server)
        .upload(std::path::Path::new("/definitely/not/here.csv"))
        .unwrap_err();
    assert!(matches!(err, BackendError::Io(_)), "got {err:?}");
}

#[test]
fn list_files() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/api/backend/system/files");
        then.status(200).json_body(json!({"files": [
            {"name": "synthetic_1.csv", "url": "http://localhost:8000/files/synthetic_1.csv", "size": "3.1 KB", "created": "2024-05-01 10:00"}
        ]}));
    });

    let files = client(&server).list_files().unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].name, "synthetic_1.csv");
    assert_eq!(files[0].size, "3.1 KB");
    assert_eq!(files[0].file_ref().url, "http://localhost:8000/files/synthetic_1.csv");
}

#[test]
fn list_files_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/api/backend/system/files");
        then.status(200).json_body(json!({"error": "Failed to scan files: permission denied"}));
    });

    let err = client(&server).list_files().unwrap_err();
    assert_eq!(err.to_string(), "Failed to scan files: permission denied");
}

#[test]
fn export_xlsx_returns_bytes() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/api/backend/sheets/export/xlsx/data.csv");
        then.status(200)
            .header("content-type", "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet")
            .body(b"PK\x03\x04fake".to_vec());
    });

    let bytes = client(&server).export_xlsx("data.csv").unwrap();
    mock.assert();
    assert_eq!(&bytes[..2], b"PK");
}

#[test]
fn export_xlsx_not_found() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/api/backend/sheets/export/xlsx/missing.csv");
        then.status(404).json_body(json!({"error": "File not found: missing.csv"}));
    });

    let err = client(&server).export_xlsx("missing.csv").unwrap_err();
    assert_eq!(err, BackendError::Backend("File not found: missing.csv".into()));
}

#[test]
fn connection_refused_is_network_error() {
    // Nothing listens on port 9 (discard) in the test environment
    let client = BackendClient::new("http://127.0.0.1:9/api/backend", Duration::from_secs(2)).unwrap();
    let err = client.load("x.csv").unwrap_err();
    assert!(err.is_transport());
}
