// Excel export (write-only; reading xlsx is the backend's job)

use rust_xlsxwriter::{Format, Workbook as XlsxWorkbook, Worksheet};
use serde_json::Value;

use datadesk_engine::Dataset;

/// Sheet name used for exports, matching the backend's own xlsx export.
pub const SHEET_NAME: &str = "data";

/// Excel hard limits
const MAX_ROWS: usize = 1_048_576;
const MAX_COLS: usize = 16_384;

pub fn to_bytes(dataset: &Dataset) -> Result<Vec<u8>, String> {
    let mut workbook = build(dataset)?;
    workbook
        .save_to_buffer()
        .map_err(|e| format!("Failed to serialize workbook: {}", e))
}

fn build(dataset: &Dataset) -> Result<XlsxWorkbook, String> {
    // +1 for the header row
    if dataset.row_count() + 1 > MAX_ROWS {
        return Err(format!(
            "Dataset has {} rows; Excel allows at most {}",
            dataset.row_count(),
            MAX_ROWS - 1
        ));
    }
    if dataset.column_count() > MAX_COLS {
        return Err(format!(
            "Dataset has {} columns; Excel allows at most {}",
            dataset.column_count(),
            MAX_COLS
        ));
    }

    let mut workbook = XlsxWorkbook::new();
    let worksheet = workbook
        .add_worksheet()
        .set_name(SHEET_NAME)
        .map_err(|e| format!("Failed to create sheet '{}': {}", SHEET_NAME, e))?;

    let header_format = Format::new().set_bold();
    for (col, column) in dataset.columns.iter().enumerate() {
        worksheet
            .write_string_with_format(0, col as u16, &column.display_name, &header_format)
            .map_err(|e| format!("Failed to write header '{}': {}", column.key, e))?;
    }

    for (row_idx, record) in dataset.rows.iter().enumerate() {
        // rust_xlsxwriter uses 0-based row/col as u32/u16
        let row32 = (row_idx + 1) as u32;
        for (col, column) in dataset.columns.iter().enumerate() {
            if let Some(value) = record.get(&column.key) {
                write_cell(worksheet, row32, col as u16, value)?;
            }
        }
    }

    Ok(workbook)
}

fn write_cell(worksheet: &mut Worksheet, row: u32, col: u16, value: &Value) -> Result<(), String> {
    let result = match value {
        Value::Null => return Ok(()),
        Value::Bool(b) => worksheet.write_boolean(row, col, *b).map(|_| ()),
        Value::Number(n) => match n.as_f64() {
            Some(f) => worksheet.write_number(row, col, f).map(|_| ()),
            None => worksheet.write_string(row, col, n.to_string()).map(|_| ()),
        },
        Value::String(s) => worksheet.write_string(row, col, s).map(|_| ()),
        other => worksheet.write_string(row, col, other.to_string()).map(|_| ()),
    };
    result.map_err(|e| format!("Failed to write cell ({}, {}): {}", row, col, e))
}
