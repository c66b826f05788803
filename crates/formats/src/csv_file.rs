//! CSV reader and writer
//!
//! Reads a header-first CSV file into `Record`s, keeping every cell as a raw
//! string. Empty cells become JSON null. Gzip input is detected by extension.

use crate::record::value_to_text;
use crate::{Error, Record, Result};
use csv::{ReaderBuilder, StringRecord, Writer};
use flate2::read::GzDecoder;
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tracing::{debug, warn};

/// Configuration for the CSV reader
#[derive(Debug, Clone)]
pub struct CsvConfig {
    pub delimiter: u8,
    /// Accept rows whose cell count differs from the header
    pub flexible: bool,
}

impl Default for CsvConfig {
    fn default() -> Self {
        Self {
            delimiter: b',',
            flexible: true,
        }
    }
}

/// Streaming CSV reader yielding one `Record` per data row
pub struct CsvReader<R: Read> {
    reader: csv::Reader<R>,
    headers: Vec<String>,
    rows_read: usize,
    total_bytes: Option<u64>,
}

impl CsvReader<Box<dyn Read>> {
    /// Open a CSV file, auto-detecting gzip compression
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let total_bytes = file.metadata()?.len();

        match path.extension().and_then(|e| e.to_str()) {
            Some("gz") => {
                debug!("Opening gzip-compressed CSV file: {:?}", path);
                let reader: Box<dyn Read> = Box::new(GzDecoder::new(file));
                Self::new_with_config(reader, CsvConfig::default(), None)
            }
            _ => {
                debug!("Opening plain CSV file: {:?}", path);
                let reader: Box<dyn Read> = Box::new(file);
                Self::new_with_config(reader, CsvConfig::default(), Some(total_bytes))
            }
        }
    }
}

impl<R: Read> CsvReader<R> {
    /// Create a CSV reader from any Read source
    pub fn new(reader: R) -> Result<Self> {
        Self::new_with_config(reader, CsvConfig::default(), None)
    }

    /// Create a CSV reader with custom configuration. Reads the header row eagerly.
    pub fn new_with_config(reader: R, config: CsvConfig, total_bytes: Option<u64>) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .delimiter(config.delimiter)
            .flexible(config.flexible)
            .from_reader(reader);

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().trim_start_matches('\u{feff}').to_string())
            .collect();

        if headers.iter().all(|h| h.is_empty()) {
            return Err(Error::InvalidFile("CSV header row is empty".to_string()));
        }

        Ok(Self {
            reader,
            headers,
            rows_read: 0,
            total_bytes,
        })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows_processed(&self) -> usize {
        self.rows_read
    }

    pub fn bytes_processed(&self) -> u64 {
        self.reader.position().byte()
    }

    pub fn total_bytes(&self) -> Option<u64> {
        self.total_bytes
    }

    fn to_record(&self, row: &StringRecord) -> Record {
        if row.len() != self.headers.len() {
            warn!(
                "Row {} has {} cells, header has {}",
                self.rows_read,
                row.len(),
                self.headers.len()
            );
        }

        let data: Map<String, Value> = self
            .headers
            .iter()
            .enumerate()
            .map(|(idx, header)| {
                let value = match row.get(idx) {
                    Some(cell) if !cell.is_empty() => Value::String(cell.to_string()),
                    _ => Value::Null,
                };
                (header.clone(), value)
            })
            .collect();

        Record::new(data, self.rows_read)
    }
}

impl<R: Read> Iterator for CsvReader<R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut row = StringRecord::new();
        match self.reader.read_record(&mut row) {
            Ok(false) => None,
            Ok(true) => {
                self.rows_read += 1;
                Some(Ok(self.to_record(&row)))
            }
            Err(e) => Some(Err(Error::Csv(e))),
        }
    }
}

/// CSV writer emitting a fixed column list
pub struct CsvWriter<W: Write> {
    writer: Writer<W>,
    columns: Vec<String>,
}

impl CsvWriter<File> {
    /// Create (or truncate) a CSV file and write the header row
    pub fn create<P: AsRef<Path>>(path: P, columns: Vec<String>) -> Result<Self> {
        Self::new(File::create(path)?, columns)
    }
}

impl<W: Write> CsvWriter<W> {
    pub fn new(inner: W, columns: Vec<String>) -> Result<Self> {
        let mut writer = Writer::from_writer(inner);
        writer.write_record(&columns)?;
        Ok(Self { writer, columns })
    }

    /// Write one record; missing or null cells are written empty
    pub fn write_record(&mut self, record: &Record) -> Result<()> {
        let row: Vec<String> = self
            .columns
            .iter()
            .map(|c| record.get(c).and_then(value_to_text).unwrap_or_default())
            .collect();
        self.writer.write_record(&row)?;
        Ok(())
    }

    /// Flush buffered rows and hand back the underlying writer
    pub fn finish(mut self) -> Result<W> {
        self.writer.flush()?;
        self.writer
            .into_inner()
            .map_err(|e| Error::Io(e.into_error()))
    }
}
