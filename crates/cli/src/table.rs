// Plain-text rendering for the terminal: dataset grid, session status, file list.

use std::fmt::Write as _;

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use datadesk_backend_client::FileEntry;
use datadesk_engine::Dataset;
use datadesk_session::SessionView;

/// Widest a single column may render before it is truncated.
pub(crate) const MAX_CELL_WIDTH: usize = 24;

const GAP: &str = "  ";

/// Render rows `[offset, offset + limit)` with a 1-based row number gutter.
pub(crate) fn render_table(dataset: &Dataset, offset: usize, limit: usize) -> String {
    let total = dataset.row_count();
    let start = offset.min(total);
    let end = start.saturating_add(limit).min(total);

    let header: Vec<String> = dataset.header().into_iter().map(String::from).collect();
    let body: Vec<Vec<String>> = (start..end).filter_map(|r| dataset.display_row(r)).collect();

    let mut widths: Vec<usize> = header.iter().map(|h| UnicodeWidthStr::width(h.as_str())).collect();
    for row in &body {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(UnicodeWidthStr::width(cell.as_str()));
        }
    }
    for w in &mut widths {
        *w = (*w).clamp(1, MAX_CELL_WIDTH);
    }
    let gutter = end.max(1).to_string().len();

    let mut out = String::new();
    let _ = writeln!(out, "{}", line(&format!("{:>gutter$}", "#"), &header, &widths));
    for (i, row) in body.iter().enumerate() {
        let number = format!("{:>gutter$}", start + i + 1);
        let _ = writeln!(out, "{}", line(&number, row, &widths));
    }

    if total == 0 {
        out.push_str("(no rows)\n");
    } else if start == total {
        let _ = writeln!(out, "(no rows in range, {} total)", total);
    } else if start > 0 || end < total {
        let _ = writeln!(out, "(rows {}-{} of {})", start + 1, end, total);
    } else {
        let _ = writeln!(out, "({} rows)", total);
    }
    out
}

fn line(gutter: &str, cells: &[String], widths: &[usize]) -> String {
    let mut out = gutter.to_string();
    for (cell, &width) in cells.iter().zip(widths) {
        out.push_str(GAP);
        out.push_str(&pad_right(cell, width));
    }
    out.trim_end().to_string()
}

pub(crate) fn render_status(view: &SessionView) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "state:    {}", view.state);
    match (&view.source, &view.loading) {
        (Some(source), _) => {
            let _ = writeln!(out, "file:     {} ({})", source.name, source.url);
        }
        (None, Some(loading)) => {
            let _ = writeln!(out, "loading:  {} ({})", loading.name, loading.url);
        }
        (None, None) => {
            let _ = writeln!(out, "file:     -");
        }
    }
    if view.source.is_some() {
        let _ = writeln!(out, "size:     {} rows, {} columns", view.rows, view.columns);
        let _ = writeln!(out, "modified: {}", if view.dirty { "yes" } else { "no" });
        let _ = writeln!(out, "history:  {} undo, {} redo", view.undo_depth, view.redo_depth);
    }
    if let Some(err) = &view.last_error {
        let _ = writeln!(out, "error:    {}", err);
    }
    out
}

pub(crate) fn render_files(files: &[FileEntry]) -> String {
    if files.is_empty() {
        return "(no files)\n".to_string();
    }
    let name_width = files
        .iter()
        .map(|f| UnicodeWidthStr::width(f.name.as_str()))
        .max()
        .unwrap_or(0)
        .min(48);
    let size_width = files.iter().map(|f| f.size.len()).max().unwrap_or(0);

    let mut out = String::new();
    for f in files {
        let created = f.created.as_deref().unwrap_or("");
        let row = format!(
            "{}{}{:>size_width$}{}{}",
            pad_right(&f.name, name_width),
            GAP,
            f.size,
            GAP,
            created
        );
        let _ = writeln!(out, "{}", row.trim_end());
    }
    out
}

/// Pad or truncate to exactly `width` display columns ("..." marks a cut).
pub(crate) fn pad_right(s: &str, width: usize) -> String {
    let sw = UnicodeWidthStr::width(s);
    if sw <= width {
        return format!("{}{}", s, " ".repeat(width - sw));
    }

    let budget = width.saturating_sub(3);
    let mut used = 0;
    let mut cut = String::new();
    for ch in s.chars() {
        let cw = UnicodeWidthChar::width(ch).unwrap_or(0);
        if used + cw > budget {
            break;
        }
        used += cw;
        cut.push(ch);
    }
    if width >= 3 {
        cut.push_str("...");
        used += 3;
    }
    format!("{}{}", cut, " ".repeat(width.saturating_sub(used)))
}
