//! JSON Lines input and output
//!
//! Reviews can arrive as one JSON object per line instead of CSV, and the
//! quality history is appended as JSON lines across runs.

use crate::{Error, Record, Result};
use flate2::read::GzDecoder;
use serde::Serialize;
use serde_json::Value;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;
use tracing::{debug, warn};

const BUFFER_SIZE: usize = 64 * 1024;

/// Streaming JSONL reader that yields one record per object line
pub struct JsonlReader<R: Read> {
    reader: BufReader<R>,
    line_number: usize,
    bytes_read: u64,
    total_bytes: Option<u64>,
}

impl JsonlReader<Box<dyn Read>> {
    /// Open a JSONL file, auto-detecting gzip compression
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let total_bytes = file.metadata()?.len();

        match path.extension().and_then(|e| e.to_str()) {
            Some("gz") => {
                debug!("Opening gzip-compressed JSONL file: {:?}", path);
                let reader: Box<dyn Read> = Box::new(GzDecoder::new(file));
                Ok(Self::with_total(reader, None))
            }
            _ => {
                debug!("Opening plain JSONL file: {:?}", path);
                let reader: Box<dyn Read> = Box::new(file);
                Ok(Self::with_total(reader, Some(total_bytes)))
            }
        }
    }
}

impl<R: Read> JsonlReader<R> {
    pub fn new(reader: R) -> Self {
        Self::with_total(reader, None)
    }

    fn with_total(reader: R, total_bytes: Option<u64>) -> Self {
        Self {
            reader: BufReader::with_capacity(BUFFER_SIZE, reader),
            line_number: 0,
            bytes_read: 0,
            total_bytes,
        }
    }

    pub fn lines_processed(&self) -> usize {
        self.line_number
    }

    pub fn bytes_processed(&self) -> u64 {
        self.bytes_read
    }

    pub fn total_bytes(&self) -> Option<u64> {
        self.total_bytes
    }
}

impl<R: Read> Iterator for JsonlReader<R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut line = String::new();

        loop {
            line.clear();
            match self.reader.read_line(&mut line) {
                Ok(0) => return None,
                Ok(n) => {
                    self.bytes_read += n as u64;
                    self.line_number += 1;

                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }

                    match serde_json::from_str::<Value>(trimmed) {
                        Ok(Value::Object(map)) => {
                            return Some(Ok(Record::new(map, self.line_number)));
                        }
                        Ok(_) => {
                            warn!(
                                "Skipping non-object JSON at line {}",
                                self.line_number
                            );
                        }
                        Err(e) => {
                            warn!(
                                "Failed to parse JSON at line {}: {}",
                                self.line_number, e
                            );
                        }
                    }
                }
                Err(e) => return Some(Err(Error::Io(e))),
            }
        }
    }
}

/// Buffered JSONL writer for records and serializable reports
pub struct JsonlWriter<W: Write> {
    writer: BufWriter<W>,
    lines_written: usize,
}

impl JsonlWriter<File> {
    /// Create (or truncate) a JSONL file
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(File::create(path)?))
    }

    /// Open a JSONL file for appending, creating it when missing.
    /// Existing lines are never rewritten.
    pub fn append<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::new(file))
    }
}

impl<W: Write> JsonlWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            writer: BufWriter::new(inner),
            lines_written: 0,
        }
    }

    /// Write a record restricted to `columns`, in that order
    pub fn write_record(&mut self, record: &Record, columns: &[String]) -> Result<()> {
        let projected: serde_json::Map<String, Value> = columns
            .iter()
            .map(|c| (c.clone(), record.get(c).cloned().unwrap_or(Value::Null)))
            .collect();
        self.write_value(&projected)
    }

    /// Write any serializable value as one line
    pub fn write_value<T: Serialize>(&mut self, value: &T) -> Result<()> {
        serde_json::to_writer(&mut self.writer, value)?;
        self.writer.write_all(b"\n")?;
        self.lines_written += 1;
        Ok(())
    }

    pub fn lines_written(&self) -> usize {
        self.lines_written
    }

    pub fn finish(mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
