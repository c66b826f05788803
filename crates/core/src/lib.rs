//! Cleaning pipeline for product-review datasets
//!
//! Business-key deduplication, data-quality observation with a block/observe
//! enforcement policy, and the staged pipeline that ties the record-level
//! filters together.

pub mod error;
pub mod exact_dedup;
pub mod hash;
pub mod pipeline;
pub mod quality;

pub use error::{Error, Result};
pub use exact_dedup::{DedupConfig, DedupStats, ExactDeduplicator};
pub use pipeline::{Pipeline, PipelineBuilder, PipelineConfig, PipelineRun, Stage, StageListener};
pub use quality::{EnforcementMode, Observer, QualityHistory, QualityPolicy, QualityReport};
