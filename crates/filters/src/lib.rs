//! Record-level transforms for review cleaning
//!
//! Text normalization, segment-level language filtering, rating coercion
//! with rule-based sentiment labels, and numeric column cleanup.

pub mod error;
pub mod language;
pub mod numeric;
pub mod sentiment;
pub mod text_preprocessing;

pub use error::{Error, Result};
pub use language::{
    Detection, Lang, LanguageClassifier, LanguageFilter, LanguageFilterConfig, LanguageStats,
};
pub use sentiment::{Rating, Sentiment, SentimentRule, SentimentRules};
pub use text_preprocessing::TextNormalizer;
