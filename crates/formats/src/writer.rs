//! Output writer for cleaned datasets

use crate::csv_file::CsvWriter;
use crate::jsonl::JsonlWriter;
use crate::reader::FileFormat;
use crate::{Dataset, Error, Result};
use std::path::Path;
use tracing::info;

/// Write `dataset` to `path`, choosing CSV or JSONL from the extension.
///
/// `columns` restricts and orders the output; `None` writes every column in
/// schema order. Returns the number of records written.
pub fn write_dataset<P: AsRef<Path>>(
    path: P,
    dataset: &Dataset,
    columns: Option<&[String]>,
) -> Result<usize> {
    let path = path.as_ref();
    let columns: Vec<String> = match columns {
        Some(selected) => {
            let unknown: Vec<String> = selected
                .iter()
                .filter(|c| !dataset.has_column(c))
                .cloned()
                .collect();
            if !unknown.is_empty() {
                return Err(Error::MissingColumns(unknown));
            }
            selected.to_vec()
        }
        None => dataset.columns().to_vec(),
    };

    if path.extension().and_then(|e| e.to_str()) == Some("gz") {
        return Err(Error::UnsupportedFormat(
            "Compressed output is not supported".to_string(),
        ));
    }

    match FileFormat::from_path(path)? {
        FileFormat::Csv => {
            let mut writer = CsvWriter::create(path, columns)?;
            for record in dataset.records() {
                writer.write_record(record)?;
            }
            writer.finish()?;
        }
        FileFormat::Jsonl => {
            let mut writer = JsonlWriter::create(path)?;
            for record in dataset.records() {
                writer.write_record(record, &columns)?;
            }
            writer.finish()?;
        }
    }

    info!("Wrote {} records to {:?}", dataset.len(), path);
    Ok(dataset.len())
}
