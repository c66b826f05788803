//! Unified dataset reader abstraction
//!
//! Picks a reader from the file extension and loads a whole input snapshot
//! into a `Dataset`, failing fast when required review columns are missing.

use crate::csv_file::CsvReader;
use crate::jsonl::JsonlReader;
use crate::{Dataset, Error, Record, Result};
use std::path::Path;
use tracing::info;

/// Supported tabular file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Jsonl,
}

impl FileFormat {
    /// Detect the format from the extension, looking through a trailing `.gz`
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| Error::UnsupportedFormat("No file extension found".to_string()))?;

        let extension = if extension == "gz" {
            path.file_stem()
                .map(Path::new)
                .and_then(|stem| stem.extension())
                .and_then(|e| e.to_str())
                .unwrap_or("csv")
        } else {
            extension
        };

        match extension.to_ascii_lowercase().as_str() {
            "csv" => Ok(FileFormat::Csv),
            "jsonl" | "json" | "ndjson" => Ok(FileFormat::Jsonl),
            other => Err(Error::UnsupportedFormat(format!(
                "Unsupported file extension: {}",
                other
            ))),
        }
    }
}

/// Trait for dataset readers providing a unified interface
pub trait DatasetReader: Iterator<Item = Result<Record>> {
    /// Column names known before reading any rows (CSV header)
    fn header(&self) -> Option<Vec<String>>;

    /// Total file size in bytes if known
    fn total_bytes(&self) -> Option<u64>;

    /// Number of bytes processed so far
    fn bytes_processed(&self) -> u64;

    /// Number of records processed so far
    fn records_processed(&self) -> usize;
}

impl<R: std::io::Read> DatasetReader for CsvReader<R> {
    fn header(&self) -> Option<Vec<String>> {
        Some(self.headers().to_vec())
    }

    fn total_bytes(&self) -> Option<u64> {
        CsvReader::total_bytes(self)
    }

    fn bytes_processed(&self) -> u64 {
        CsvReader::bytes_processed(self)
    }

    fn records_processed(&self) -> usize {
        self.rows_processed()
    }
}

impl<R: std::io::Read> DatasetReader for JsonlReader<R> {
    fn header(&self) -> Option<Vec<String>> {
        None
    }

    fn total_bytes(&self) -> Option<u64> {
        JsonlReader::total_bytes(self)
    }

    fn bytes_processed(&self) -> u64 {
        JsonlReader::bytes_processed(self)
    }

    fn records_processed(&self) -> usize {
        self.lines_processed()
    }
}

/// Open a dataset with automatic format detection
///
/// Supported formats:
/// - `.csv`, `.csv.gz` - CSV with a header row
/// - `.jsonl`, `.json`, `.ndjson`, and their `.gz` forms - JSON Lines
pub fn open_dataset<P: AsRef<Path>>(path: P) -> Result<Box<dyn DatasetReader>> {
    let path = path.as_ref();
    let format = FileFormat::from_path(path)?;

    info!("Opening dataset: {:?} (format: {:?})", path, format);

    match format {
        FileFormat::Csv => Ok(Box::new(CsvReader::open(path)?)),
        FileFormat::Jsonl => Ok(Box::new(JsonlReader::open(path)?)),
    }
}

/// Read an entire input snapshot into memory
///
/// Fails with `Error::MissingColumns` before returning any data when one of the
/// required review columns is absent.
pub fn read_dataset<P: AsRef<Path>>(path: P) -> Result<Dataset> {
    let mut reader = open_dataset(path)?;
    let header = reader.header();
    let records = reader.by_ref().collect::<Result<Vec<_>>>()?;

    let dataset = match header {
        Some(columns) => Dataset::new(columns, records),
        None => Dataset::from_records(records),
    };
    dataset.validate_required()?;

    info!(
        "Loaded {} records with {} columns ({} bytes)",
        dataset.len(),
        dataset.columns().len(),
        reader.bytes_processed()
    );

    Ok(dataset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    const HEADER: &str =
        "product_id,user_id,rating,review_content,review_title,about_product";

    #[test]
    fn test_format_detection() {
        assert_eq!(FileFormat::from_path(Path::new("a.csv")).unwrap(), FileFormat::Csv);
        assert_eq!(FileFormat::from_path(Path::new("a.csv.gz")).unwrap(), FileFormat::Csv);
        assert_eq!(FileFormat::from_path(Path::new("a.jsonl")).unwrap(), FileFormat::Jsonl);
        assert_eq!(
            FileFormat::from_path(Path::new("a.jsonl.gz")).unwrap(),
            FileFormat::Jsonl
        );
        assert!(matches!(
            FileFormat::from_path(Path::new("a.txt")),
            Err(Error::UnsupportedFormat(_))
        ));
        assert!(FileFormat::from_path(Path::new("noext")).is_err());
    }

    #[test]
    fn test_read_csv_dataset() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("reviews.csv");
        {
            let mut file = std::fs::File::create(&path).unwrap();
            writeln!(file, "{},rating_count", HEADER).unwrap();
            writeln!(file, "P1,U1,4.2,Good,Nice,Cable,10").unwrap();
            writeln!(file, "P2,U2,|,Bad,Meh,Charger,").unwrap();
        }

        let dataset = read_dataset(&path).unwrap();
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.columns().len(), 7);
        assert!(dataset.records()[1].is_null("rating_count"));
    }

    #[test]
    fn test_missing_required_columns_is_fatal() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("reviews.csv");
        std::fs::write(&path, "product_id,rating\nP1,5\n").unwrap();

        let result = read_dataset(&path);
        assert!(matches!(result, Err(Error::MissingColumns(_))));
    }

    #[test]
    fn test_unreadable_input_is_fatal() {
        let dir = TempDir::new().unwrap();
        let result = read_dataset(dir.path().join("absent.csv"));
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn test_read_jsonl_dataset() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("reviews.jsonl");
        std::fs::write(
            &path,
            concat!(
                r#"{"product_id":"P1","user_id":"U1","rating":"5","review_content":"x","review_title":"y","about_product":"z"}"#,
                "\n"
            ),
        )
        .unwrap();

        let dataset = read_dataset(&path).unwrap();
        assert_eq!(dataset.len(), 1);
        assert!(dataset.has_column("about_product"));
    }
}
