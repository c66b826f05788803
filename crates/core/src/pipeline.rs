//! Staged review-cleaning pipeline
//!
//! Runs the stages strictly in order over the whole dataset:
//! normalize, language filter, dedup, optional numeric cleaning, annotate.
//! Every stage takes the previous dataset by reference and returns a new one.
//! Quality checkpoints sit between stages; a blocking breach at a checkpoint
//! stops the stage that follows it and the run ends with the last completed
//! dataset.

use crate::exact_dedup::{self, DedupConfig, DedupStats};
use crate::quality::{Observer, QualityConfig, QualityHistory, QualityReport};
use crate::{Error, Result};
use reviewclean_filters::language::{FilteredText, LanguageClassifier, WhatlangClassifier};
use reviewclean_filters::numeric::{clean_currency, clean_percentage};
use reviewclean_filters::{
    LanguageFilter, LanguageFilterConfig, LanguageStats, Rating, Sentiment, SentimentRules,
    TextNormalizer,
};
use reviewclean_formats::record::{
    clean_column_name, is_null_value, value_to_text, ABOUT_PRODUCT, RATING, RATING_NUMERIC,
    REVIEW_CONTENT, REVIEW_TITLE, SENTIMENT,
};
use reviewclean_formats::{Dataset, Record};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{error, info};

pub const CHECKPOINT_INGEST: &str = "ingest";

/// Name reported when the last checkpoint blocks persisting the result
pub const WRITE_STAGE: &str = "write";

/// Marker written to `rating_numeric` for unparseable ratings
pub const INVALID_RATING: &str = "invalid";

/// Pipeline stages in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Normalize,
    LanguageFilter,
    Dedup,
    NumericClean,
    Annotate,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Normalize => "normalize",
            Stage::LanguageFilter => "language_filter",
            Stage::Dedup => "dedup",
            Stage::NumericClean => "numeric_clean",
            Stage::Annotate => "annotate",
        }
    }

    /// Name of the quality checkpoint taken after this stage, if any
    pub fn checkpoint(&self) -> Option<&'static str> {
        match self {
            Stage::NumericClean => None,
            other => Some(other.as_str()),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Text columns to normalize
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizationConfig {
    pub columns: Vec<String>,
}

impl Default for NormalizationConfig {
    fn default() -> Self {
        Self {
            columns: vec![
                REVIEW_CONTENT.to_string(),
                REVIEW_TITLE.to_string(),
                ABOUT_PRODUCT.to_string(),
            ],
        }
    }
}

/// Rating coercion and labeling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SentimentConfig {
    pub rating_column: String,
    pub rules: SentimentRules,
    /// Exclude records whose rating is present but unparseable
    pub drop_invalid_ratings: bool,
}

impl Default for SentimentConfig {
    fn default() -> Self {
        Self {
            rating_column: RATING.to_string(),
            rules: SentimentRules::default(),
            drop_invalid_ratings: false,
        }
    }
}

/// Price and percentage columns that get a numeric `<col>_clean` twin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NumericConfig {
    pub currency_columns: Vec<String>,
    pub percentage_columns: Vec<String>,
}

impl Default for NumericConfig {
    fn default() -> Self {
        Self {
            currency_columns: vec!["actual_price".to_string(), "discounted_price".to_string()],
            percentage_columns: vec!["discount_percentage".to_string()],
        }
    }
}

/// Pipeline configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub normalization: NormalizationConfig,
    pub language: LanguageFilterConfig,
    pub dedup: DedupConfig,
    pub sentiment: SentimentConfig,
    pub quality: QualityConfig,
    pub numeric: NumericConfig,
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.dedup.key_columns.is_empty() {
            return Err(Error::InvalidConfig(
                "dedup.key_columns must not be empty".to_string(),
            ));
        }
        if self.sentiment.rating_column.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "sentiment.rating_column must not be empty".to_string(),
            ));
        }
        self.sentiment.rules.validate()?;
        self.quality.policy.validate()?;
        Ok(())
    }
}

/// Link/markup counts for one normalized column
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ColumnScan {
    pub column: String,
    pub fields: usize,
    pub with_links: usize,
    pub with_html: usize,
}

impl ColumnScan {
    pub fn links_pct(&self) -> f64 {
        share(self.with_links, self.fields)
    }

    pub fn html_pct(&self) -> f64 {
        share(self.with_html, self.fields)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NormalizeStats {
    pub columns: Vec<ColumnScan>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ColumnLanguageStats {
    pub column: String,
    #[serde(flatten)]
    pub stats: LanguageStats,
    pub retention_avg: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LanguageStageStats {
    pub columns: Vec<ColumnLanguageStats>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ColumnNumericStats {
    pub column: String,
    pub parsed: usize,
    pub unparseable: usize,
    pub null: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NumericStats {
    pub columns: Vec<ColumnNumericStats>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnnotateStats {
    pub numeric: usize,
    pub invalid: usize,
    pub missing: usize,
    pub dropped_invalid: usize,
    pub labels: BTreeMap<Sentiment, usize>,
}

/// Per-stage statistics of one run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunStats {
    pub input_records: usize,
    pub output_records: usize,
    pub normalize: Option<NormalizeStats>,
    pub language: Option<LanguageStageStats>,
    pub dedup: Option<DedupStats>,
    pub numeric: Option<NumericStats>,
    pub annotate: Option<AnnotateStats>,
}

impl RunStats {
    pub fn duplicates_removed(&self) -> usize {
        self.dedup.as_ref().map_or(0, |d| d.duplicates_found)
    }
}

/// Outcome of a pipeline run. Present even when a stage was blocked: the
/// history and the last completed dataset are always kept.
#[derive(Debug)]
pub struct PipelineRun {
    pub history: QualityHistory,
    /// Output of the last completed stage (the input if none completed)
    pub dataset: Dataset,
    pub completed: Vec<Stage>,
    pub stats: RunStats,
    pub failure: Option<Error>,
}

impl PipelineRun {
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    /// The stage a quality gate stopped, if any
    pub fn blocked_stage(&self) -> Option<&str> {
        match &self.failure {
            Some(Error::StageBlocked { stage, .. }) => Some(stage.as_str()),
            _ => None,
        }
    }

    pub fn into_result(self) -> Result<Dataset> {
        match self.failure {
            Some(err) => Err(err),
            None => Ok(self.dataset),
        }
    }
}

/// Hooks for progress reporting
pub trait StageListener {
    fn stage_started(&mut self, _stage: Stage) {}
    fn stage_finished(&mut self, _stage: Stage, _records: usize) {}
    fn checkpoint(&mut self, _report: &QualityReport) {}
}

impl StageListener for () {}

/// The review-cleaning pipeline
pub struct Pipeline<C = WhatlangClassifier> {
    config: PipelineConfig,
    normalizer: TextNormalizer,
    markup: TextNormalizer,
    language: LanguageFilter<C>,
    observer: Observer,
}

impl Pipeline<WhatlangClassifier> {
    /// Create a new pipeline with the given configuration
    pub fn new(config: PipelineConfig) -> Result<Self> {
        Self::with_classifier(config, WhatlangClassifier)
    }
}

impl<C: LanguageClassifier> Pipeline<C> {
    /// Create a pipeline that identifies languages with `classifier`
    pub fn with_classifier(config: PipelineConfig, classifier: C) -> Result<Self> {
        config.validate()?;
        let language = LanguageFilter::with_classifier(config.language.clone(), classifier)
            .map_err(|e| Error::InvalidConfig(format!("language: {}", e)))?;
        let observer = Observer::new(&config.quality, config.dedup.key_columns.clone())?;

        Ok(Self {
            config,
            normalizer: TextNormalizer::full(),
            markup: TextNormalizer::markup_only(),
            language,
            observer,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn observer(&self) -> &Observer {
        &self.observer
    }

    /// Stages that will run for `dataset`, in order. Numeric cleaning is
    /// included only when a configured price/percentage column is present.
    pub fn stages_for(&self, dataset: &Dataset) -> Vec<Stage> {
        let mut stages = vec![Stage::Normalize, Stage::LanguageFilter, Stage::Dedup];
        if self.numeric_columns().any(|c| dataset.has_column(c)) {
            stages.push(Stage::NumericClean);
        }
        stages.push(Stage::Annotate);
        stages
    }

    /// Run all stages without progress reporting
    pub fn run(&self, input: Dataset) -> PipelineRun {
        self.run_with_listener(input, &mut ())
    }

    pub fn run_with_listener<L: StageListener>(
        &self,
        input: Dataset,
        listener: &mut L,
    ) -> PipelineRun {
        let stages = self.stages_for(&input);
        let mut history = QualityHistory::new();
        let mut stats = RunStats {
            input_records: input.len(),
            ..Default::default()
        };
        let mut completed = Vec::with_capacity(stages.len());

        let mut current = input;
        let mut gate = self.gate(
            CHECKPOINT_INGEST,
            stages.first() == Some(&Stage::Dedup),
            &current,
            &mut history,
            listener,
        );

        for (idx, &stage) in stages.iter().enumerate() {
            if let Some(reasons) = gate.take() {
                let gated = gated_stage(&stages[idx..]);
                return blocked(gated, reasons, history, current, completed, stats);
            }

            listener.stage_started(stage);
            let next = match stage {
                Stage::Normalize => {
                    let (out, s) = self.normalize(&current);
                    stats.normalize = Some(s);
                    out
                }
                Stage::LanguageFilter => {
                    let (out, s) = self.filter_languages(&current);
                    stats.language = Some(s);
                    out
                }
                Stage::Dedup => {
                    let (out, s) = self.deduplicate(&current);
                    stats.dedup = Some(s);
                    out
                }
                Stage::NumericClean => {
                    let (out, s) = self.clean_numeric(&current);
                    stats.numeric = Some(s);
                    out
                }
                Stage::Annotate => {
                    let (out, s) = self.annotate(&current);
                    stats.annotate = Some(s);
                    out
                }
            };
            listener.stage_finished(stage, next.len());
            completed.push(stage);
            current = next;

            if let Some(checkpoint) = stage.checkpoint() {
                let gates_dedup = stages.get(idx + 1) == Some(&Stage::Dedup);
                gate = self.gate(checkpoint, gates_dedup, &current, &mut history, listener);
            }
        }

        if let Some(reasons) = gate.take() {
            return blocked(WRITE_STAGE, reasons, history, current, completed, stats);
        }

        stats.output_records = current.len();
        info!(
            "Pipeline finished: {} records in, {} out",
            stats.input_records, stats.output_records
        );
        PipelineRun {
            history,
            dataset: current,
            completed,
            stats,
            failure: None,
        }
    }

    /// Observe a dataset without running any stage. Every threshold,
    /// including the key-null gate, is judged.
    pub fn profile(&self, checkpoint: &str, dataset: &Dataset) -> QualityHistory {
        let mut history = QualityHistory::new();
        self.observer.checkpoint(checkpoint, true, dataset, &mut history);
        history
    }

    /// Take a checkpoint and return the blocking reasons, if any
    fn gate<L: StageListener>(
        &self,
        checkpoint: &str,
        gates_dedup: bool,
        dataset: &Dataset,
        history: &mut QualityHistory,
        listener: &mut L,
    ) -> Option<Vec<String>> {
        let report = self.observer.checkpoint(checkpoint, gates_dedup, dataset, history);
        listener.checkpoint(report);
        let reasons: Vec<String> = report
            .blocking_breaches()
            .map(|breach| format!("[{}] {}", checkpoint, breach))
            .collect();
        if reasons.is_empty() {
            None
        } else {
            Some(reasons)
        }
    }

    /// Add `<col>_clean` for every configured text column present.
    /// Null input becomes the empty string.
    pub fn normalize(&self, dataset: &Dataset) -> (Dataset, NormalizeStats) {
        let columns: Vec<&String> = self
            .config
            .normalization
            .columns
            .iter()
            .filter(|c| dataset.has_column(c))
            .collect();

        let mut scans: Vec<ColumnScan> = columns
            .iter()
            .map(|c| ColumnScan {
                column: c.to_string(),
                ..Default::default()
            })
            .collect();

        let mut buffer = String::new();
        let records: Vec<Record> = dataset
            .records()
            .iter()
            .map(|record| {
                let mut record = record.clone();
                for (column, scan) in columns.iter().zip(scans.iter_mut()) {
                    let raw = cell_text(&record, column);
                    let cleaned = match raw.as_deref() {
                        Some(text) => {
                            let found = TextNormalizer::scan(text);
                            scan.with_links += usize::from(found.has_link);
                            scan.with_html += usize::from(found.has_html);
                            self.normalizer.normalize_into(text, &mut buffer);
                            buffer.clone()
                        }
                        None => String::new(),
                    };
                    scan.fields += 1;
                    record.set(&clean_column_name(column), Value::String(cleaned));
                }
                record
            })
            .collect();

        let mut out = dataset.with_records(records);
        for column in &columns {
            out.ensure_column(&clean_column_name(column));
        }

        for scan in &scans {
            info!(
                column = %scan.column,
                fields_with_links = scan.with_links,
                links_pct = scan.links_pct(),
                fields_with_html = scan.with_html,
                html_pct = scan.html_pct(),
                "Normalized column"
            );
        }

        (out, NormalizeStats { columns: scans })
    }

    /// Rebuild every `<col>_clean` column from its raw column with
    /// non-allowed-language segments removed. Segmentation runs on the raw
    /// text with only markup and links stripped, since the normalized text
    /// has no sentence punctuation left. Record count is unchanged.
    pub fn filter_languages(&self, dataset: &Dataset) -> (Dataset, LanguageStageStats) {
        let columns: Vec<(&String, String)> = self
            .config
            .normalization
            .columns
            .iter()
            .map(|c| (c, clean_column_name(c)))
            .filter(|(raw, clean)| dataset.has_column(raw) && dataset.has_column(clean))
            .collect();

        let mut per_column: Vec<LanguageStats> = vec![LanguageStats::default(); columns.len()];

        let records: Vec<Record> = dataset
            .records()
            .iter()
            .map(|record| {
                let mut record = record.clone();
                for ((raw, clean), stats) in columns.iter().zip(per_column.iter_mut()) {
                    let before = record.text(clean).unwrap_or_default().to_string();
                    let filtered = match cell_text(&record, raw) {
                        Some(text) => self.language.filter_text(&self.markup.normalize(&text)),
                        None => FilteredText {
                            text: String::new(),
                            kept: 0,
                            dropped: 0,
                            undecided: 0,
                        },
                    };
                    let filtered = FilteredText {
                        text: self.normalizer.normalize(&filtered.text),
                        ..filtered
                    };
                    stats.record(&before, &filtered);
                    record.set(clean, Value::String(filtered.text));
                }
                record
            })
            .collect();

        let columns: Vec<ColumnLanguageStats> = columns
            .into_iter()
            .zip(per_column)
            .map(|((_, column), stats)| {
                info!(
                    column = %column,
                    segments = stats.segments,
                    kept = stats.kept,
                    dropped = stats.dropped,
                    undecided = stats.undecided,
                    emptied_fields = stats.emptied_fields,
                    retention_min = stats.retention_min(),
                    retention_avg = stats.retention_avg(),
                    retention_max = stats.retention_max(),
                    "Language filter"
                );
                ColumnLanguageStats {
                    column,
                    retention_avg: stats.retention_avg(),
                    stats,
                }
            })
            .collect();

        (dataset.with_records(records), LanguageStageStats { columns })
    }

    /// Drop later records repeating an earlier business key
    pub fn deduplicate(&self, dataset: &Dataset) -> (Dataset, DedupStats) {
        exact_dedup::deduplicate(dataset, &self.config.dedup)
    }

    /// Add a numeric `<col>_clean` for configured price and percentage columns.
    /// Unparseable values become null.
    pub fn clean_numeric(&self, dataset: &Dataset) -> (Dataset, NumericStats) {
        let numeric = &self.config.numeric;
        let columns: Vec<(&String, fn(&str) -> Option<f64>)> = numeric
            .currency_columns
            .iter()
            .map(|c| (c, clean_currency as fn(&str) -> Option<f64>))
            .chain(
                numeric
                    .percentage_columns
                    .iter()
                    .map(|c| (c, clean_percentage as fn(&str) -> Option<f64>)),
            )
            .filter(|(c, _)| dataset.has_column(c))
            .collect();

        let mut stats: Vec<ColumnNumericStats> = columns
            .iter()
            .map(|(c, _)| ColumnNumericStats {
                column: c.to_string(),
                ..Default::default()
            })
            .collect();

        let records: Vec<Record> = dataset
            .records()
            .iter()
            .map(|record| {
                let mut record = record.clone();
                for ((column, parse), stat) in columns.iter().zip(stats.iter_mut()) {
                    let value = match cell_text(&record, column) {
                        None => {
                            stat.null += 1;
                            Value::Null
                        }
                        Some(raw) => match parse(&raw).and_then(Number::from_f64) {
                            Some(n) => {
                                stat.parsed += 1;
                                Value::Number(n)
                            }
                            None => {
                                stat.unparseable += 1;
                                Value::Null
                            }
                        },
                    };
                    record.set(&clean_column_name(column), value);
                }
                record
            })
            .collect();

        let mut out = dataset.with_records(records);
        for (column, _) in &columns {
            out.ensure_column(&clean_column_name(column));
        }
        for stat in &stats {
            info!(
                column = %stat.column,
                parsed = stat.parsed,
                unparseable = stat.unparseable,
                null = stat.null,
                "Numeric column cleaned"
            );
        }

        (out, NumericStats { columns: stats })
    }

    /// Add `rating_numeric` and `sentiment`. Invalid ratings are kept with
    /// `unknown` unless `drop_invalid_ratings` is set.
    pub fn annotate(&self, dataset: &Dataset) -> (Dataset, AnnotateStats) {
        let sentiment = &self.config.sentiment;
        let mut stats = AnnotateStats::default();
        for label in Sentiment::ALL {
            stats.labels.insert(label, 0);
        }

        let records: Vec<Record> = dataset
            .records()
            .iter()
            .filter_map(|record| {
                let raw = cell_text(record, &sentiment.rating_column);
                let (rating, label) = sentiment.rules.annotate(raw.as_deref());

                let numeric = match rating {
                    Rating::Numeric(v) => {
                        stats.numeric += 1;
                        Number::from_f64(v).map_or(Value::Null, Value::Number)
                    }
                    Rating::Invalid => {
                        if sentiment.drop_invalid_ratings {
                            stats.dropped_invalid += 1;
                            return None;
                        }
                        stats.invalid += 1;
                        Value::String(INVALID_RATING.to_string())
                    }
                    Rating::Missing => {
                        stats.missing += 1;
                        Value::Null
                    }
                };
                *stats.labels.entry(label).or_insert(0) += 1;

                let mut record = record.clone();
                record.set(RATING_NUMERIC, numeric);
                record.set(SENTIMENT, Value::String(label.as_str().to_string()));
                Some(record)
            })
            .collect();

        let mut out = dataset.with_records(records);
        out.ensure_column(RATING_NUMERIC);
        out.ensure_column(SENTIMENT);

        info!(
            numeric = stats.numeric,
            invalid = stats.invalid,
            missing = stats.missing,
            dropped_invalid = stats.dropped_invalid,
            "Ratings annotated"
        );

        (out, stats)
    }

    fn numeric_columns(&self) -> impl Iterator<Item = &String> {
        self.config
            .numeric
            .currency_columns
            .iter()
            .chain(self.config.numeric.percentage_columns.iter())
    }
}

/// Builder for pipeline configuration
#[derive(Debug, Clone, Default)]
pub struct PipelineBuilder {
    config: PipelineConfig,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn language(mut self, language: LanguageFilterConfig) -> Self {
        self.config.language = language;
        self
    }

    pub fn key_columns(mut self, columns: Vec<String>) -> Self {
        self.config.dedup.key_columns = columns;
        self
    }

    pub fn quality(mut self, quality: QualityConfig) -> Self {
        self.config.quality = quality;
        self
    }

    pub fn sentiment_rules(mut self, rules: SentimentRules) -> Self {
        self.config.sentiment.rules = rules;
        self
    }

    pub fn drop_invalid_ratings(mut self, drop: bool) -> Self {
        self.config.sentiment.drop_invalid_ratings = drop;
        self
    }

    pub fn build(self) -> Result<Pipeline> {
        Pipeline::new(self.config)
    }

    pub fn build_with_classifier<C: LanguageClassifier>(self, classifier: C) -> Result<Pipeline<C>> {
        Pipeline::with_classifier(self.config, classifier)
    }
}

/// The stage a gate in front of `remaining` stops: the next one followed by
/// a checkpoint, or the write when none is left. A stage without its own
/// checkpoint (numeric cleaning) shares the gate of the stage after it.
fn gated_stage(remaining: &[Stage]) -> &'static str {
    remaining
        .iter()
        .find(|stage| stage.checkpoint().is_some())
        .map_or(WRITE_STAGE, Stage::as_str)
}

fn blocked(
    stage: &str,
    reasons: Vec<String>,
    history: QualityHistory,
    dataset: Dataset,
    completed: Vec<Stage>,
    mut stats: RunStats,
) -> PipelineRun {
    error!("Stage {} blocked: {}", stage, reasons.join("; "));
    stats.output_records = dataset.len();
    PipelineRun {
        history,
        dataset,
        completed,
        stats,
        failure: Some(Error::StageBlocked {
            stage: stage.to_string(),
            reasons,
        }),
    }
}

/// Text of a non-null cell
fn cell_text(record: &Record, column: &str) -> Option<String> {
    let value = record.get(column);
    if is_null_value(value) {
        None
    } else {
        value.and_then(value_to_text)
    }
}

fn share(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        let pct = count as f64 * 100.0 / total as f64;
        (pct * 100.0).round() / 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quality::{Metric, QualityPolicy, Threshold};
    use reviewclean_filters::{Detection, Lang};

    /// Spanish or French when a marker word is present, English otherwise
    struct KeywordClassifier;

    impl LanguageClassifier for KeywordClassifier {
        fn detect(&self, text: &str) -> Option<Detection> {
            let lang = if text.contains("español") {
                Lang::Spa
            } else if text.contains("produit") {
                Lang::Fra
            } else {
                Lang::Eng
            };
            Some(Detection {
                lang,
                confidence: 1.0,
            })
        }
    }

    fn review(product: &str, user: Option<&str>, rating: Option<&str>, content: &str) -> Record {
        Record::from_pairs(
            [
                ("product_id", Some(product)),
                ("user_id", user),
                ("rating", rating),
                ("review_content", Some(content)),
                ("review_title", Some("Title")),
                ("about_product", Some("About")),
            ],
            0,
        )
    }

    fn pipeline() -> Pipeline {
        Pipeline::new(PipelineConfig::default()).unwrap()
    }

    #[test]
    fn test_normalize_adds_clean_columns() {
        let dataset = Dataset::from_records(vec![review(
            "P1",
            Some("U1"),
            Some("4"),
            "<b>Visit http://x.com NOW!!</b>",
        )]);
        let (out, stats) = pipeline().normalize(&dataset);

        assert_eq!(out.records()[0].text("review_content_clean"), Some("visit now"));
        assert_eq!(out.records()[0].text("review_title_clean"), Some("title"));
        assert!(out.has_column("about_product_clean"));
        assert_eq!(stats.columns[0].with_links, 1);
        assert_eq!(stats.columns[0].with_html, 1);
        // input untouched
        assert!(!dataset.has_column("review_content_clean"));
    }

    #[test]
    fn test_normalize_null_becomes_empty() {
        let mut record = review("P1", Some("U1"), Some("4"), "x");
        record.set("review_title", Value::Null);
        let (out, _) = pipeline().normalize(&Dataset::from_records(vec![record]));
        assert_eq!(out.records()[0].text("review_title_clean"), Some(""));
    }

    #[test]
    fn test_language_filter_keeps_row_count() {
        let records = vec![
            review("P1", Some("U1"), Some("4"), "Great product, बहुत अच्छा"),
            review("P2", Some("U1"), Some("4"), "बहुत अच्छा है"),
        ];
        let p = pipeline();
        let (normalized, _) = p.normalize(&Dataset::from_records(records));
        let (filtered, stats) = p.filter_languages(&normalized);

        assert_eq!(filtered.len(), 2);
        assert_eq!(
            filtered.records()[0].text("review_content_clean"),
            Some("great product")
        );
        assert_eq!(filtered.records()[1].text("review_content_clean"), Some(""));
        assert_eq!(stats.columns[0].stats.emptied_fields, 1);
    }

    #[test]
    fn test_language_filter_splits_sentences() {
        let records = vec![
            review(
                "P1",
                Some("U1"),
                Some("4"),
                "Great product, works well. Es un producto muy bueno en español.",
            ),
            review(
                "P2",
                Some("U2"),
                Some("4"),
                "Ce produit est vraiment super bien! I love it, highly recommended",
            ),
            review("P3", Some("U3"), Some("4"), "<b>Visit http://x.com NOW!!</b>"),
        ];
        let p = PipelineBuilder::new()
            .build_with_classifier(KeywordClassifier)
            .unwrap();
        let (normalized, _) = p.normalize(&Dataset::from_records(records));
        let (filtered, stats) = p.filter_languages(&normalized);

        let texts: Vec<_> = filtered
            .records()
            .iter()
            .map(|r| r.text("review_content_clean").unwrap())
            .collect();
        assert_eq!(
            texts,
            vec!["great product works well", "i love it highly recommended", "visit now"]
        );
        let content = &stats.columns[0];
        assert_eq!(content.column, "review_content_clean");
        assert_eq!(content.stats.dropped, 2);
        assert_eq!(content.stats.emptied_fields, 0);
    }

    #[test]
    fn test_language_filter_drops_spanish_sentence() {
        let language = LanguageFilterConfig {
            confidence_threshold: 0.0,
            ..Default::default()
        };
        let p = PipelineBuilder::new().language(language).build().unwrap();
        let records = vec![review(
            "P1",
            Some("U1"),
            Some("2"),
            "The charger stopped working after two weeks of use. \
             Es un producto muy malo y llegó roto a mi casa.",
        )];
        let (normalized, _) = p.normalize(&Dataset::from_records(records));
        let (filtered, _) = p.filter_languages(&normalized);

        assert_eq!(
            filtered.records()[0].text("review_content_clean"),
            Some("the charger stopped working after two weeks of use")
        );
    }

    #[test]
    fn test_emptied_content_does_not_block_dedup() {
        let records = vec![
            review("P1", Some("U1"), Some("4"), "Great value"),
            review("P2", Some("U2"), Some("4"), "बहुत अच्छा है"),
            review("P3", Some("U3"), Some("5"), "बढ़िया"),
            review("P4", Some("U4"), Some("3"), "Works fine"),
            review("P5", Some("U5"), Some("2"), "Too small"),
        ];
        let run = pipeline().run(Dataset::from_records(records));

        assert!(run.is_success());
        assert_eq!(run.dataset.len(), 5);
        let report = run.history.get("language_filter").unwrap();
        assert!(!report.is_blocking());
        let duplicates = report.duplicates.as_ref().unwrap();
        assert_eq!(duplicates.emptied_key_fields[0].null_count, 2);
    }

    #[test]
    fn test_annotate_labels_and_markers() {
        let records = vec![
            review("P1", Some("U1"), Some("4.2"), "a"),
            review("P2", Some("U1"), Some("|"), "b"),
            review("P3", Some("U1"), None, "c"),
            review("P4", Some("U1"), Some("2"), "d"),
        ];
        let (out, stats) = pipeline().annotate(&Dataset::from_records(records));

        let labels: Vec<_> = out.records().iter().map(|r| r.text("sentiment").unwrap()).collect();
        assert_eq!(labels, vec!["positive", "unknown", "unknown", "negative"]);
        assert_eq!(out.records()[0].get("rating_numeric"), Some(&serde_json::json!(4.2)));
        assert_eq!(out.records()[1].text("rating_numeric"), Some("invalid"));
        assert_eq!(out.records()[2].get("rating_numeric"), Some(&Value::Null));
        assert_eq!(stats.invalid, 1);
        assert_eq!(stats.missing, 1);
        assert_eq!(stats.labels[&Sentiment::Unknown], 2);
    }

    #[test]
    fn test_drop_invalid_ratings() {
        let p = PipelineBuilder::new().drop_invalid_ratings(true).build().unwrap();
        let records = vec![
            review("P1", Some("U1"), Some("4"), "a"),
            review("P2", Some("U1"), Some("|"), "b"),
            review("P3", Some("U1"), None, "c"),
        ];
        let (out, stats) = p.annotate(&Dataset::from_records(records));
        assert_eq!(out.len(), 2);
        assert_eq!(stats.dropped_invalid, 1);
    }

    #[test]
    fn test_clean_numeric() {
        let mut record = review("P1", Some("U1"), Some("4"), "a");
        record.set("actual_price", Value::String("₹1,099".to_string()));
        record.set("discount_percentage", Value::String("64%".to_string()));
        let dataset = Dataset::from_records(vec![record]);

        let p = pipeline();
        assert!(p.stages_for(&dataset).contains(&Stage::NumericClean));

        let (out, stats) = p.clean_numeric(&dataset);
        assert_eq!(out.records()[0].get("actual_price_clean"), Some(&serde_json::json!(1099.0)));
        assert_eq!(out.records()[0].get("discount_percentage_clean"), Some(&serde_json::json!(64.0)));
        assert!(!out.has_column("discounted_price_clean"));
        assert_eq!(stats.columns.len(), 2);
    }

    #[test]
    fn test_full_run() {
        let records = vec![
            review("P1", Some("U1"), Some("4.0"), "Great product!"),
            review("P1", Some("U1"), Some("4.0"), "great   product"),
            review("P2", Some("U2"), Some("3.0"), "It is ok"),
        ];
        let run = pipeline().run(Dataset::from_records(records));

        assert!(run.is_success());
        assert_eq!(
            run.completed,
            vec![Stage::Normalize, Stage::LanguageFilter, Stage::Dedup, Stage::Annotate]
        );
        assert_eq!(run.dataset.len(), 2);
        assert_eq!(run.stats.duplicates_removed(), 1);
        let checkpoints: Vec<_> = run.history.reports().iter().map(|r| r.checkpoint.as_str()).collect();
        assert_eq!(
            checkpoints,
            vec!["ingest", "normalize", "language_filter", "dedup", "annotate"]
        );
    }

    #[test]
    fn test_key_nulls_block_dedup() {
        let records = vec![
            review("P1", None, Some("4"), "a"),
            review("P2", None, Some("4"), "b"),
            review("P3", Some("U3"), Some("4"), "c"),
        ];
        let run = pipeline().run(Dataset::from_records(records));

        assert!(!run.is_success());
        assert_eq!(run.blocked_stage(), Some("dedup"));
        assert_eq!(run.completed, vec![Stage::Normalize, Stage::LanguageFilter]);
        assert_eq!(run.dataset.len(), 3);
        assert!(run.dataset.has_column("review_content_clean"));
        assert!(run.history.get("dedup").is_none());
    }

    #[test]
    fn test_observe_mode_does_not_block() {
        let quality = QualityConfig {
            policy: QualityPolicy::observe_only(),
            ..Default::default()
        };
        let p = PipelineBuilder::new().quality(quality).build().unwrap();
        let records = vec![
            review("P1", None, Some("4"), "a"),
            review("P2", None, Some("4"), "b"),
        ];
        let run = p.run(Dataset::from_records(records));
        assert!(run.is_success());
        assert!(!run.history.get("language_filter").unwrap().breaches.is_empty());
    }

    #[test]
    fn test_annotate_checkpoint_gates_write() {
        let mut quality = QualityConfig::default();
        quality.policy.unknown_sentiment_pct = Threshold::block(0.0);
        let p = PipelineBuilder::new().quality(quality).build().unwrap();

        let records = vec![review("P1", Some("U1"), Some("abc"), "fine")];
        let run = p.run(Dataset::from_records(records));

        assert_eq!(run.blocked_stage(), Some("write"));
        assert!(run.completed.contains(&Stage::Annotate));
        let report = run.history.last().unwrap();
        assert!(report
            .blocking_breaches()
            .any(|b| b.metric == Metric::UnknownSentimentPct));
        assert!(run.into_result().is_err());
    }

    #[test]
    fn test_dedup_checkpoint_gates_annotate_past_numeric_clean() {
        // One null discount in three rows is 33%, in two deduplicated rows 50%
        let priced = |product: &str, user: &str, content: &str, discount: Option<&str>| {
            let mut record = review(product, Some(user), Some("4"), content);
            record.set("actual_price", Value::String("₹1,099".to_string()));
            record.set(
                "discount_percentage",
                discount.map_or(Value::Null, |d| Value::String(d.to_string())),
            );
            record
        };
        let records = vec![
            priced("P1", "U1", "Solid cable", Some("64%")),
            priced("P1", "U1", "Solid cable", Some("64%")),
            priced("P2", "U2", "Charges fast", None),
        ];
        let mut quality = QualityConfig::default();
        quality.policy.column_null_pct = Threshold::block(40.0);
        let p = PipelineBuilder::new().quality(quality).build().unwrap();

        let dataset = Dataset::from_records(records);
        assert!(p.stages_for(&dataset).contains(&Stage::NumericClean));
        let run = p.run(dataset);

        assert_eq!(run.blocked_stage(), Some("annotate"));
        assert_eq!(
            run.completed,
            vec![Stage::Normalize, Stage::LanguageFilter, Stage::Dedup]
        );
        assert_eq!(run.dataset.len(), 2);
        assert!(run.stats.numeric.is_none());
        assert!(run.history.last().unwrap().blocking_breaches().any(|b| {
            b.metric == Metric::ColumnNullPct && b.column.as_deref() == Some("discount_percentage")
        }));
    }

    #[test]
    fn test_gated_stage_names() {
        assert_eq!(gated_stage(&[Stage::Dedup, Stage::Annotate]), "dedup");
        assert_eq!(gated_stage(&[Stage::NumericClean, Stage::Annotate]), "annotate");
        assert_eq!(gated_stage(&[]), WRITE_STAGE);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = PipelineConfig {
            dedup: DedupConfig {
                key_columns: vec![],
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(Pipeline::new(config), Err(Error::InvalidConfig(_))));

        let bad_language = PipelineBuilder::new().language(LanguageFilterConfig {
            allowed_languages: vec!["xx".to_string()],
            ..Default::default()
        });
        assert!(bad_language.build().is_err());
    }

    #[test]
    fn test_config_serde_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"sentiment": {"drop_invalid_ratings": true}}"#).unwrap();
        assert!(config.sentiment.drop_invalid_ratings);
        assert_eq!(config.sentiment.rating_column, "rating");
        assert_eq!(config.dedup, DedupConfig::default());
    }
}
