//! Dataset model and file formats for review data
//!
//! This crate holds the in-memory `Record`/`Dataset` representation shared by
//! every pipeline stage, plus CSV and JSONL readers and writers.

pub mod csv_file;
pub mod error;
pub mod jsonl;
pub mod reader;
pub mod record;
pub mod writer;

pub use error::{Error, Result};
pub use reader::{open_dataset, read_dataset, DatasetReader, FileFormat};
pub use record::{Dataset, Record};
pub use writer::write_dataset;
