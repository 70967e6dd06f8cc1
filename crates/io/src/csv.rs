// CSV/TSV export

use std::io::Write;

use datadesk_engine::cell;
use datadesk_engine::Dataset;

/// Serialize to an in-memory buffer.
pub fn to_bytes(dataset: &Dataset, delimiter: u8) -> Result<Vec<u8>, String> {
    let mut buf = Vec::new();
    write(dataset, &mut buf, delimiter)?;
    Ok(buf)
}

/// Header row of display names in schema order, then one record per row in
/// display order. Cells missing from a record are written empty.
pub fn write<W: Write>(dataset: &Dataset, out: W, delimiter: u8) -> Result<(), String> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(out);

    writer.write_record(dataset.header()).map_err(|e| e.to_string())?;

    for record in &dataset.rows {
        let fields = dataset
            .columns
            .iter()
            .map(|c| record.get(&c.key).map(cell::display).unwrap_or_default());
        writer.write_record(fields).map_err(|e| e.to_string())?;
    }

    writer.flush().map_err(|e| e.to_string())?;
    Ok(())
}
