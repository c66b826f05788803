//! Segment-level language filtering
//!
//! Removes non-English (or, more generally, non-allowed) segments from a text
//! field while keeping the field itself. Text is split into sentences and then
//! into script runs; each segment is classified on its own. Segments the
//! classifier cannot decide on are kept.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;
use whatlang::{detect, detect_script, Script};

pub use whatlang::Lang;

/// Segments shorter than this (chars) are not sent to the classifier
const MIN_DETECTION_LENGTH: usize = 20;

/// Language filter configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LanguageFilterConfig {
    /// List of allowed language codes (ISO 639-3 or 639-1)
    pub allowed_languages: Vec<String>,
    /// Minimum confidence for a detection to count (0.0 to 1.0)
    pub confidence_threshold: f64,
    /// Segments shorter than this many chars are treated as undecided
    pub min_text_length: usize,
}

impl Default for LanguageFilterConfig {
    fn default() -> Self {
        Self::english_only()
    }
}

impl LanguageFilterConfig {
    pub fn english_only() -> Self {
        Self {
            allowed_languages: vec!["eng".to_string()],
            confidence_threshold: 0.5,
            min_text_length: MIN_DETECTION_LENGTH,
        }
    }

    /// English plus Hindi, for review sets where Hindi content is wanted
    pub fn english_and_hindi() -> Self {
        Self {
            allowed_languages: vec!["eng".to_string(), "hin".to_string()],
            ..Self::english_only()
        }
    }
}

/// Output of a language classifier for one segment
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub lang: Lang,
    pub confidence: f64,
}

/// Black-box language identification
pub trait LanguageClassifier {
    /// Detect the language of `text`, or `None` when no decision is possible
    fn detect(&self, text: &str) -> Option<Detection>;
}

/// Classifier backed by whatlang's trigram models
#[derive(Debug, Clone, Copy, Default)]
pub struct WhatlangClassifier;

impl LanguageClassifier for WhatlangClassifier {
    fn detect(&self, text: &str) -> Option<Detection> {
        detect(text).map(|info| Detection {
            lang: info.lang(),
            confidence: info.confidence(),
        })
    }
}

/// Decision for a single segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentVerdict {
    Keep,
    Drop,
    /// Too short, no script, failed or low-confidence detection. Kept.
    Undecided,
}

/// Result of filtering one field
#[derive(Debug, Clone, PartialEq)]
pub struct FilteredText {
    pub text: String,
    pub kept: usize,
    pub dropped: usize,
    pub undecided: usize,
}

impl FilteredText {
    pub fn segments(&self) -> usize {
        self.kept + self.dropped + self.undecided
    }
}

/// Language filter over segments of a field
pub struct LanguageFilter<C = WhatlangClassifier> {
    classifier: C,
    allowed_languages: HashSet<Lang>,
    allowed_scripts: Vec<Script>,
    confidence_threshold: f64,
    min_text_length: usize,
}

impl LanguageFilter<WhatlangClassifier> {
    /// Create a new language filter from configuration
    pub fn new(config: LanguageFilterConfig) -> Result<Self> {
        Self::with_classifier(config, WhatlangClassifier)
    }
}

impl<C: LanguageClassifier> LanguageFilter<C> {
    /// Create a filter with a custom classifier
    pub fn with_classifier(config: LanguageFilterConfig, classifier: C) -> Result<Self> {
        let mut allowed_languages = HashSet::new();
        let mut allowed_scripts: Vec<Script> = Vec::new();

        for lang_code in &config.allowed_languages {
            let lang = Self::parse_language_code(lang_code)?;
            allowed_languages.insert(lang);
            for script in scripts_for(lang) {
                if !allowed_scripts.contains(script) {
                    allowed_scripts.push(*script);
                }
            }
        }

        if allowed_languages.is_empty() {
            return Err(anyhow!("At least one language must be specified"));
        }

        if !(0.0..=1.0).contains(&config.confidence_threshold) {
            return Err(anyhow!("Confidence threshold must be between 0.0 and 1.0"));
        }

        Ok(Self {
            classifier,
            allowed_languages,
            allowed_scripts,
            confidence_threshold: config.confidence_threshold,
            min_text_length: config.min_text_length,
        })
    }

    /// Keep only allowed-language segments, joined by single spaces in order.
    /// If every segment is dropped the result is empty.
    pub fn filter_text(&self, text: &str) -> FilteredText {
        let mut out = FilteredText {
            text: String::new(),
            kept: 0,
            dropped: 0,
            undecided: 0,
        };

        for segment in segment_text(text) {
            let verdict = self.classify_segment(&segment);
            match verdict {
                SegmentVerdict::Keep => out.kept += 1,
                SegmentVerdict::Drop => {
                    out.dropped += 1;
                    continue;
                }
                SegmentVerdict::Undecided => {
                    debug!("Language undecided, keeping segment: {:?}", segment);
                    out.undecided += 1;
                }
            }
            if !out.text.is_empty() {
                out.text.push(' ');
            }
            out.text.push_str(&segment);
        }

        out
    }

    /// Classify one segment
    pub fn classify_segment(&self, segment: &str) -> SegmentVerdict {
        let script = match detect_script(segment) {
            Some(script) => script,
            None => return SegmentVerdict::Undecided,
        };

        // A script no allowed language is written in settles it at any length.
        if !self.allowed_scripts.contains(&script) {
            return SegmentVerdict::Drop;
        }

        if segment.chars().count() < self.min_text_length {
            return SegmentVerdict::Undecided;
        }

        match self.classifier.detect(segment) {
            Some(d) if d.confidence >= self.confidence_threshold => {
                if self.allowed_languages.contains(&d.lang) {
                    SegmentVerdict::Keep
                } else {
                    SegmentVerdict::Drop
                }
            }
            _ => SegmentVerdict::Undecided,
        }
    }

    /// Parse language code (ISO 639-3 or 639-1)
    fn parse_language_code(code: &str) -> Result<Lang> {
        match code.to_lowercase().as_str() {
            "eng" | "en" => Ok(Lang::Eng),
            "hin" | "hi" => Ok(Lang::Hin),
            "spa" | "es" => Ok(Lang::Spa),
            "fra" | "fr" => Ok(Lang::Fra),
            "deu" | "de" => Ok(Lang::Deu),
            "por" | "pt" => Ok(Lang::Por),
            "ita" | "it" => Ok(Lang::Ita),
            "nld" | "nl" => Ok(Lang::Nld),
            "rus" | "ru" => Ok(Lang::Rus),
            "ara" | "ar" => Ok(Lang::Ara),
            "ben" | "bn" => Ok(Lang::Ben),
            "tam" | "ta" => Ok(Lang::Tam),
            "tel" | "te" => Ok(Lang::Tel),
            "mar" | "mr" => Ok(Lang::Mar),
            "jpn" | "ja" => Ok(Lang::Jpn),
            "zho" | "zh" => Ok(Lang::Cmn),
            "kor" | "ko" => Ok(Lang::Kor),
            _ => Err(anyhow!("Unsupported language code: {}", code)),
        }
    }
}

/// Scripts a language is written in
fn scripts_for(lang: Lang) -> &'static [Script] {
    match lang {
        Lang::Hin | Lang::Mar => &[Script::Devanagari],
        Lang::Rus => &[Script::Cyrillic],
        Lang::Ara => &[Script::Arabic],
        Lang::Ben => &[Script::Bengali],
        Lang::Tam => &[Script::Tamil],
        Lang::Tel => &[Script::Telugu],
        Lang::Jpn => &[Script::Hiragana, Script::Katakana, Script::Mandarin],
        Lang::Cmn => &[Script::Mandarin],
        Lang::Kor => &[Script::Hangul],
        _ => &[Script::Latin],
    }
}

/// Split text into sentences, then each sentence into runs of words sharing a
/// script. Words without a script (digits) join the current run.
pub fn segment_text(text: &str) -> Vec<String> {
    let mut segments = Vec::new();

    for sentence in text.split(|c: char| matches!(c, '.' | '!' | '?' | '\n')) {
        let mut run: Vec<&str> = Vec::new();
        let mut run_script: Option<Script> = None;

        for word in sentence.split_whitespace() {
            if let Some(script) = detect_script(word) {
                match run_script {
                    Some(current) if current != script => {
                        segments.push(run.join(" "));
                        run.clear();
                        run_script = Some(script);
                    }
                    None => run_script = Some(script),
                    _ => {}
                }
            }
            run.push(word);
        }

        if !run.is_empty() {
            segments.push(run.join(" "));
        }
    }

    segments
}

/// Aggregate statistics for a language-filtering pass over many fields
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LanguageStats {
    pub fields: usize,
    pub emptied_fields: usize,
    pub segments: usize,
    pub kept: usize,
    pub dropped: usize,
    pub undecided: usize,
    #[serde(skip)]
    retention_sum: f64,
    retention_min: Option<f64>,
    retention_max: Option<f64>,
}

impl LanguageStats {
    /// Account for one filtered field
    pub fn record(&mut self, original: &str, filtered: &FilteredText) {
        self.fields += 1;
        self.segments += filtered.segments();
        self.kept += filtered.kept;
        self.dropped += filtered.dropped;
        self.undecided += filtered.undecided;
        if filtered.text.is_empty() && !original.trim().is_empty() {
            self.emptied_fields += 1;
        }

        let ratio = retention_ratio(original, &filtered.text);
        self.retention_sum += ratio;
        self.retention_min = Some(self.retention_min.map_or(ratio, |m| m.min(ratio)));
        self.retention_max = Some(self.retention_max.map_or(ratio, |m| m.max(ratio)));
    }

    pub fn retention_min(&self) -> f64 {
        self.retention_min.unwrap_or(0.0)
    }

    pub fn retention_max(&self) -> f64 {
        self.retention_max.unwrap_or(0.0)
    }

    pub fn retention_avg(&self) -> f64 {
        if self.fields == 0 {
            0.0
        } else {
            self.retention_sum / self.fields as f64
        }
    }
}

/// Share of the original text (in chars) that survived filtering, rounded to
/// two decimals. Empty originals score 0.
pub fn retention_ratio(original: &str, cleaned: &str) -> f64 {
    let original_len = original.chars().count();
    if original_len == 0 {
        return 0.0;
    }
    let ratio = cleaned.chars().count() as f64 / original_len as f64;
    (ratio * 100.0).round() / 100.0
}
