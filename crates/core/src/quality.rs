//! Data-quality observation and enforcement
//!
//! The [`Observer`] computes a [`QualityReport`] for a dataset snapshot at a
//! named checkpoint. Reports are always logged; a [`QualityPolicy`] decides
//! which threshold breaches are only observed and which block the next stage.
//! The observer never modifies the dataset it looks at.

use crate::exact_dedup::{business_key, BusinessKey};
use crate::{Error, Result};
use ahash::AHashMap;
use reviewclean_filters::Sentiment;
use reviewclean_formats::jsonl::JsonlWriter;
use reviewclean_formats::record::{is_null_value, source_column_name, value_to_text, SENTIMENT};
use reviewclean_formats::Dataset;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::{info, warn};

/// Whether a breach is only logged or halts the next stage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnforcementMode {
    #[default]
    Observe,
    Block,
}

/// Metrics a policy can put a threshold on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Null percentage of each business-key column
    DedupKeyNullPct,
    /// Null percentage of each column
    ColumnNullPct,
    /// Percentage of rows with at least one null
    RowNullPct,
    /// Percentage of records repeating an earlier business key
    DuplicatePct,
    /// Percentage of records labeled `unknown`
    UnknownSentimentPct,
}

impl Metric {
    pub const ALL: [Metric; 5] = [
        Metric::DedupKeyNullPct,
        Metric::ColumnNullPct,
        Metric::RowNullPct,
        Metric::DuplicatePct,
        Metric::UnknownSentimentPct,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::DedupKeyNullPct => "dedup_key_null_pct",
            Metric::ColumnNullPct => "column_null_pct",
            Metric::RowNullPct => "row_null_pct",
            Metric::DuplicatePct => "duplicate_pct",
            Metric::UnknownSentimentPct => "unknown_sentiment_pct",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Upper bound on a percentage metric. A value strictly above `max_pct`
/// breaches; `None` never breaches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    #[serde(default)]
    pub max_pct: Option<f64>,
    #[serde(default)]
    pub mode: EnforcementMode,
}

impl Threshold {
    pub fn observe(max_pct: f64) -> Self {
        Self {
            max_pct: Some(max_pct),
            mode: EnforcementMode::Observe,
        }
    }

    pub fn block(max_pct: f64) -> Self {
        Self {
            max_pct: Some(max_pct),
            mode: EnforcementMode::Block,
        }
    }

    pub fn is_breached(&self, value_pct: f64) -> bool {
        self.max_pct.is_some_and(|max| value_pct > max)
    }
}

/// Per-metric thresholds and their enforcement mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QualityPolicy {
    pub dedup_key_null_pct: Threshold,
    pub column_null_pct: Threshold,
    pub row_null_pct: Threshold,
    pub duplicate_pct: Threshold,
    pub unknown_sentiment_pct: Threshold,
}

impl Default for QualityPolicy {
    fn default() -> Self {
        Self {
            dedup_key_null_pct: Threshold::block(20.0),
            column_null_pct: Threshold::observe(20.0),
            row_null_pct: Threshold::observe(10.0),
            duplicate_pct: Threshold::default(),
            unknown_sentiment_pct: Threshold::default(),
        }
    }
}

impl QualityPolicy {
    /// A policy that only observes: every default threshold, nothing blocks
    pub fn observe_only() -> Self {
        let mut policy = Self::default();
        for metric in Metric::ALL {
            policy.threshold_mut(metric).mode = EnforcementMode::Observe;
        }
        policy
    }

    pub fn threshold(&self, metric: Metric) -> &Threshold {
        match metric {
            Metric::DedupKeyNullPct => &self.dedup_key_null_pct,
            Metric::ColumnNullPct => &self.column_null_pct,
            Metric::RowNullPct => &self.row_null_pct,
            Metric::DuplicatePct => &self.duplicate_pct,
            Metric::UnknownSentimentPct => &self.unknown_sentiment_pct,
        }
    }

    pub fn threshold_mut(&mut self, metric: Metric) -> &mut Threshold {
        match metric {
            Metric::DedupKeyNullPct => &mut self.dedup_key_null_pct,
            Metric::ColumnNullPct => &mut self.column_null_pct,
            Metric::RowNullPct => &mut self.row_null_pct,
            Metric::DuplicatePct => &mut self.duplicate_pct,
            Metric::UnknownSentimentPct => &mut self.unknown_sentiment_pct,
        }
    }

    /// Change only the enforcement mode of one metric
    pub fn with_mode(mut self, metric: Metric, mode: EnforcementMode) -> Self {
        self.threshold_mut(metric).mode = mode;
        self
    }

    pub fn validate(&self) -> Result<()> {
        for metric in Metric::ALL {
            if let Some(max) = self.threshold(metric).max_pct {
                if !(0.0..=100.0).contains(&max) {
                    return Err(Error::InvalidConfig(format!(
                        "{}.max_pct must be between 0 and 100, got {}",
                        metric, max
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Observer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    pub policy: QualityPolicy,
    /// Columns whose values are expected to be unique (logged, not enforced)
    pub uniqueness_columns: Vec<String>,
    /// How many duplicate values to include in uniqueness warnings
    pub sample_size: usize,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            policy: QualityPolicy::default(),
            uniqueness_columns: vec!["product_link".to_string()],
            sample_size: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnNulls {
    pub column: String,
    pub null_count: usize,
    pub null_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateMetrics {
    pub key_columns: Vec<String>,
    /// Records that repeat an earlier key (what deduplication would remove)
    pub duplicate_count: usize,
    pub duplicate_pct: f64,
    /// All members of key groups larger than one, first occurrences included
    pub records_in_duplicate_groups: usize,
    /// Nulls per key column. A derived `<col>_clean` key is counted on its
    /// raw column when present, so text emptied by cleaning is not a
    /// missing key.
    pub key_nulls: Vec<ColumnNulls>,
    /// Derived key fields that are empty only because cleaning removed
    /// their content. Reported, never judged.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub emptied_key_fields: Vec<ColumnNulls>,
    /// Records where at least one key component is null
    pub any_key_null_count: usize,
    pub any_key_null_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelShare {
    pub label: String,
    pub count: usize,
    pub pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UniquenessStats {
    pub column: String,
    pub non_null: usize,
    pub distinct: usize,
    pub duplicate_count: usize,
    pub duplicate_pct: f64,
    pub duplicate_samples: Vec<String>,
}

/// A metric value above its configured threshold
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Breach {
    pub metric: Metric,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    pub value_pct: f64,
    pub max_pct: f64,
    pub mode: EnforcementMode,
}

impl fmt::Display for Breach {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.column {
            Some(column) => write!(
                f,
                "{} for '{}' is {:.2}% (max {:.2}%)",
                self.metric, column, self.value_pct, self.max_pct
            ),
            None => write!(
                f,
                "{} is {:.2}% (max {:.2}%)",
                self.metric, self.value_pct, self.max_pct
            ),
        }
    }
}

/// Immutable snapshot of quality metrics at one checkpoint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityReport {
    /// Position in the run, starting at 1
    pub sequence: usize,
    pub checkpoint: String,
    pub total_records: usize,
    pub column_nulls: Vec<ColumnNulls>,
    pub rows_with_nulls: usize,
    pub row_null_pct: f64,
    /// Absent when any business-key column is missing from the snapshot
    pub duplicates: Option<DuplicateMetrics>,
    /// Present only when the snapshot has a `sentiment` column
    pub labels: Option<Vec<LabelShare>>,
    pub uniqueness: Vec<UniquenessStats>,
    pub breaches: Vec<Breach>,
}

impl QualityReport {
    pub fn column_null_pct(&self, column: &str) -> Option<f64> {
        self.column_nulls
            .iter()
            .find(|c| c.column == column)
            .map(|c| c.null_pct)
    }

    pub fn label(&self, label: &str) -> Option<&LabelShare> {
        self.labels.as_ref()?.iter().find(|l| l.label == label)
    }

    pub fn blocking_breaches(&self) -> impl Iterator<Item = &Breach> {
        self.breaches
            .iter()
            .filter(|b| b.mode == EnforcementMode::Block)
    }

    pub fn is_blocking(&self) -> bool {
        self.blocking_breaches().next().is_some()
    }
}

/// Run-scoped, append-only list of reports
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct QualityHistory {
    reports: Vec<QualityReport>,
}

impl QualityHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, report: QualityReport) {
        self.reports.push(report);
    }

    pub fn next_sequence(&self) -> usize {
        self.reports.len() + 1
    }

    pub fn reports(&self) -> &[QualityReport] {
        &self.reports
    }

    pub fn last(&self) -> Option<&QualityReport> {
        self.reports.last()
    }

    pub fn get(&self, checkpoint: &str) -> Option<&QualityReport> {
        self.reports.iter().find(|r| r.checkpoint == checkpoint)
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    /// Append every report as one JSON line to `path`. Earlier lines in the
    /// file are left alone.
    pub fn append_to<P: AsRef<Path>>(&self, path: P) -> Result<usize> {
        let mut writer = JsonlWriter::append(path.as_ref())?;
        for report in &self.reports {
            writer.write_value(report)?;
        }
        let written = writer.lines_written();
        writer.finish()?;
        info!("Appended {} quality reports to {:?}", written, path.as_ref());
        Ok(written)
    }
}

/// Computes, logs and judges quality reports
#[derive(Debug, Clone)]
pub struct Observer {
    policy: QualityPolicy,
    key_columns: Vec<String>,
    uniqueness_columns: Vec<String>,
    sample_size: usize,
}

impl Observer {
    pub fn new(config: &QualityConfig, key_columns: Vec<String>) -> Result<Self> {
        config.policy.validate()?;
        Ok(Self {
            policy: config.policy.clone(),
            key_columns,
            uniqueness_columns: config.uniqueness_columns.clone(),
            sample_size: config.sample_size,
        })
    }

    pub fn policy(&self) -> &QualityPolicy {
        &self.policy
    }

    /// Observe `dataset` at `checkpoint`, log the report and append it to
    /// `history`. Returns the stored report.
    ///
    /// Key-null thresholds are only judged when `gates_dedup` is set, i.e. at
    /// the checkpoint right before deduplication; elsewhere key null
    /// percentages are reported but never breach.
    pub fn checkpoint<'h>(
        &self,
        checkpoint: &str,
        gates_dedup: bool,
        dataset: &Dataset,
        history: &'h mut QualityHistory,
    ) -> &'h QualityReport {
        let report = self.observe(checkpoint, history.next_sequence(), gates_dedup, dataset);
        log_report(&report);
        history.push(report);
        &history.reports[history.reports.len() - 1]
    }

    /// Compute a report without logging or storing it
    pub fn observe(
        &self,
        checkpoint: &str,
        sequence: usize,
        gates_dedup: bool,
        dataset: &Dataset,
    ) -> QualityReport {
        let total = dataset.len();

        let column_nulls: Vec<ColumnNulls> = dataset
            .columns()
            .iter()
            .map(|column| column_nulls(dataset, column))
            .collect();

        let rows_with_nulls = dataset
            .records()
            .iter()
            .filter(|record| {
                dataset
                    .columns()
                    .iter()
                    .any(|column| record.is_null(column))
            })
            .count();

        let duplicates = self.duplicate_metrics(dataset);
        let labels = label_distribution(dataset);
        let uniqueness = self
            .uniqueness_columns
            .iter()
            .filter(|column| dataset.has_column(column))
            .map(|column| uniqueness_stats(dataset, column, self.sample_size))
            .collect();

        let mut report = QualityReport {
            sequence,
            checkpoint: checkpoint.to_string(),
            total_records: total,
            column_nulls,
            rows_with_nulls,
            row_null_pct: pct(rows_with_nulls, total),
            duplicates,
            labels,
            uniqueness,
            breaches: Vec::new(),
        };
        report.breaches = self.evaluate(&report, gates_dedup);
        report
    }

    fn duplicate_metrics(&self, dataset: &Dataset) -> Option<DuplicateMetrics> {
        if self.key_columns.is_empty()
            || self.key_columns.iter().any(|c| !dataset.has_column(c))
        {
            return None;
        }

        let total = dataset.len();
        let mut groups: AHashMap<BusinessKey, usize> = AHashMap::with_capacity(total);
        let mut any_key_null_count = 0;

        for record in dataset.records() {
            let key = business_key(record, &self.key_columns);
            if key.iter().any(Option::is_none) {
                any_key_null_count += 1;
            }
            *groups.entry(key).or_insert(0) += 1;
        }

        let duplicate_count = total - groups.len();
        let records_in_duplicate_groups = groups.values().filter(|&&n| n > 1).sum();
        let mut key_nulls = Vec::with_capacity(self.key_columns.len());
        let mut emptied_key_fields = Vec::new();
        for column in &self.key_columns {
            let source = source_column_name(column).filter(|raw| dataset.has_column(raw));
            match source {
                Some(raw) => {
                    key_nulls.push(ColumnNulls {
                        column: column.clone(),
                        ..column_nulls(dataset, raw)
                    });
                    let emptied = dataset
                        .records()
                        .iter()
                        .filter(|record| record.is_null(column) && !record.is_null(raw))
                        .count();
                    emptied_key_fields.push(ColumnNulls {
                        column: column.clone(),
                        null_count: emptied,
                        null_pct: pct(emptied, total),
                    });
                }
                None => key_nulls.push(column_nulls(dataset, column)),
            }
        }

        Some(DuplicateMetrics {
            key_columns: self.key_columns.clone(),
            duplicate_count,
            duplicate_pct: pct(duplicate_count, total),
            records_in_duplicate_groups,
            key_nulls,
            emptied_key_fields,
            any_key_null_count,
            any_key_null_pct: pct(any_key_null_count, total),
        })
    }

    fn evaluate(&self, report: &QualityReport, gates_dedup: bool) -> Vec<Breach> {
        let mut breaches = Vec::new();
        let mut check = |metric: Metric, column: Option<&str>, value_pct: f64| {
            let threshold = self.policy.threshold(metric);
            if let Some(max_pct) = threshold.max_pct.filter(|_| threshold.is_breached(value_pct)) {
                breaches.push(Breach {
                    metric,
                    column: column.map(str::to_string),
                    value_pct,
                    max_pct,
                    mode: threshold.mode,
                });
            }
        };

        if let Some(duplicates) = report.duplicates.as_ref().filter(|_| gates_dedup) {
            for key in &duplicates.key_nulls {
                check(Metric::DedupKeyNullPct, Some(key.column.as_str()), key.null_pct);
            }
        }
        for column in &report.column_nulls {
            check(Metric::ColumnNullPct, Some(column.column.as_str()), column.null_pct);
        }
        check(Metric::RowNullPct, None, report.row_null_pct);
        if let Some(duplicates) = &report.duplicates {
            check(Metric::DuplicatePct, None, duplicates.duplicate_pct);
        }
        if let Some(unknown) = report.label(Sentiment::Unknown.as_str()) {
            check(Metric::UnknownSentimentPct, None, unknown.pct);
        }

        breaches
    }
}

fn column_nulls(dataset: &Dataset, column: &str) -> ColumnNulls {
    let null_count = dataset
        .records()
        .iter()
        .filter(|record| record.is_null(column))
        .count();
    ColumnNulls {
        column: column.to_string(),
        null_count,
        null_pct: pct(null_count, dataset.len()),
    }
}

fn label_distribution(dataset: &Dataset) -> Option<Vec<LabelShare>> {
    if !dataset.has_column(SENTIMENT) {
        return None;
    }

    let mut counts: Vec<(String, usize)> = Sentiment::ALL
        .iter()
        .map(|s| (s.as_str().to_string(), 0))
        .collect();

    for record in dataset.records() {
        let label = match record.get(SENTIMENT) {
            value if is_null_value(value) => "null".to_string(),
            Some(value) => value_to_text(value).unwrap_or_default(),
            None => "null".to_string(),
        };
        match counts.iter_mut().find(|(l, _)| *l == label) {
            Some((_, count)) => *count += 1,
            None => counts.push((label, 1)),
        }
    }

    let total = dataset.len();
    Some(
        counts
            .into_iter()
            .map(|(label, count)| LabelShare {
                label,
                count,
                pct: pct(count, total),
            })
            .collect(),
    )
}

fn uniqueness_stats(dataset: &Dataset, column: &str, sample_size: usize) -> UniquenessStats {
    let mut counts: AHashMap<String, usize> = AHashMap::new();
    let mut first_seen: Vec<String> = Vec::new();

    for record in dataset.records() {
        let value = record.get(column);
        if is_null_value(value) {
            continue;
        }
        if let Some(text) = value.and_then(value_to_text) {
            let count = counts.entry(text.clone()).or_insert(0);
            if *count == 0 {
                first_seen.push(text);
            }
            *count += 1;
        }
    }

    let non_null: usize = counts.values().sum();
    let distinct = counts.len();
    let duplicate_count = non_null - distinct;
    let duplicate_samples = first_seen
        .into_iter()
        .filter(|v| counts.get(v).is_some_and(|&n| n > 1))
        .take(sample_size)
        .collect();

    UniquenessStats {
        column: column.to_string(),
        non_null,
        distinct,
        duplicate_count,
        duplicate_pct: pct(duplicate_count, non_null),
        duplicate_samples,
    }
}

/// Percentage rounded to two decimals; 0 for an empty base
fn pct(count: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let value = count as f64 * 100.0 / total as f64;
    (value * 100.0).round() / 100.0
}

fn log_report(report: &QualityReport) {
    info!(
        checkpoint = %report.checkpoint,
        sequence = report.sequence,
        records = report.total_records,
        rows_with_nulls = report.rows_with_nulls,
        row_null_pct = report.row_null_pct,
        "Quality checkpoint"
    );

    for column in report.column_nulls.iter().filter(|c| c.null_count > 0) {
        info!(
            checkpoint = %report.checkpoint,
            column = %column.column,
            null_count = column.null_count,
            null_pct = column.null_pct,
            "Column nulls"
        );
    }

    if let Some(duplicates) = &report.duplicates {
        info!(
            checkpoint = %report.checkpoint,
            duplicate_count = duplicates.duplicate_count,
            duplicate_pct = duplicates.duplicate_pct,
            records_in_duplicate_groups = duplicates.records_in_duplicate_groups,
            any_key_null_pct = duplicates.any_key_null_pct,
            "Business key duplicates"
        );
    }

    if let Some(labels) = &report.labels {
        for share in labels {
            info!(
                checkpoint = %report.checkpoint,
                label = %share.label,
                count = share.count,
                pct = share.pct,
                "Sentiment distribution"
            );
        }
    }

    for stats in &report.uniqueness {
        if stats.duplicate_count > 0 {
            warn!(
                checkpoint = %report.checkpoint,
                column = %stats.column,
                duplicates = stats.duplicate_count,
                duplicate_pct = stats.duplicate_pct,
                "Values are not unique, sample: {:?}",
                stats.duplicate_samples
            );
        } else {
            info!(
                checkpoint = %report.checkpoint,
                column = %stats.column,
                values = stats.non_null,
                "All values unique"
            );
        }
    }

    for breach in &report.breaches {
        match breach.mode {
            EnforcementMode::Block => warn!(
                checkpoint = %report.checkpoint,
                metric = %breach.metric,
                "Blocking quality breach: {}",
                breach
            ),
            EnforcementMode::Observe => warn!(
                checkpoint = %report.checkpoint,
                metric = %breach.metric,
                "Quality threshold exceeded (observe only): {}",
                breach
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reviewclean_formats::Record;
    use tempfile::TempDir;

    fn keys() -> Vec<String> {
        vec![
            "product_id".to_string(),
            "user_id".to_string(),
            "review_content_clean".to_string(),
        ]
    }

    fn observer(policy: QualityPolicy) -> Observer {
        let config = QualityConfig {
            policy,
            ..Default::default()
        };
        Observer::new(&config, keys()).unwrap()
    }

    fn row(product: &str, user: Option<&str>, content: Option<&str>) -> Record {
        Record::from_pairs(
            [
                ("product_id", Some(product)),
                ("user_id", user),
                ("review_content_clean", content),
            ],
            0,
        )
    }

    #[test]
    fn test_column_null_percentage() {
        let records: Vec<Record> = (0..10)
            .map(|i| {
                let user = if i < 2 { None } else { Some("U1") };
                let id = format!("P{}", i);
                row(&id, user, Some("fine"))
            })
            .collect();
        let dataset = Dataset::from_records(records);

        let report = observer(QualityPolicy::default()).observe("ingest", 1, false, &dataset);
        assert_eq!(report.column_null_pct("user_id"), Some(20.0));
        assert_eq!(report.column_null_pct("product_id"), Some(0.0));
        assert_eq!(report.rows_with_nulls, 2);
        assert_eq!(report.row_null_pct, 20.0);
    }

    #[test]
    fn test_blank_strings_count_as_null() {
        let dataset = Dataset::from_records(vec![
            row("P1", Some("   "), Some("x")),
            row("P2", Some("U2"), Some("")),
        ]);
        let report = observer(QualityPolicy::default()).observe("ingest", 1, false, &dataset);
        assert_eq!(report.column_null_pct("user_id"), Some(50.0));
        assert_eq!(report.column_null_pct("review_content_clean"), Some(50.0));
        assert_eq!(report.rows_with_nulls, 2);
    }

    #[test]
    fn test_duplicate_metrics_keep_first() {
        let dataset = Dataset::from_records(vec![
            row("P1", Some("U1"), Some("great product")),
            row("P1", Some("U1"), Some("great product")),
            row("P1", Some("U1"), Some("great product")),
            row("P2", Some("U1"), Some("ok")),
        ]);
        let report = observer(QualityPolicy::default()).observe("dedup", 1, false, &dataset);
        let duplicates = report.duplicates.unwrap();
        assert_eq!(duplicates.duplicate_count, 2);
        assert_eq!(duplicates.duplicate_pct, 50.0);
        assert_eq!(duplicates.records_in_duplicate_groups, 3);
    }

    #[test]
    fn test_duplicates_skipped_without_key_columns() {
        let dataset = Dataset::from_records(vec![Record::from_pairs(
            [("product_id", Some("P1"))],
            1,
        )]);
        let report = observer(QualityPolicy::default()).observe("ingest", 1, false, &dataset);
        assert!(report.duplicates.is_none());
        assert!(!report.is_blocking());
    }

    #[test]
    fn test_key_null_breach_blocks_by_default() {
        let dataset = Dataset::from_records(vec![
            row("P1", None, Some("a")),
            row("P2", None, Some("b")),
            row("P3", Some("U3"), Some("c")),
            row("P4", Some("U4"), Some("d")),
        ]);
        let report = observer(QualityPolicy::default()).observe("language_filter", 1, true, &dataset);

        assert!(report.is_blocking());
        let blocking: Vec<_> = report.blocking_breaches().collect();
        assert_eq!(blocking.len(), 1);
        assert_eq!(blocking[0].metric, Metric::DedupKeyNullPct);
        assert_eq!(blocking[0].column.as_deref(), Some("user_id"));
        assert_eq!(blocking[0].value_pct, 50.0);

        // The same column also breaches the observe-only column threshold
        assert!(report
            .breaches
            .iter()
            .any(|b| b.metric == Metric::ColumnNullPct && b.mode == EnforcementMode::Observe));
    }

    #[test]
    fn test_key_nulls_counted_on_raw_column() {
        // Two reviews whose cleaned text was emptied by the language filter
        let records: Vec<Record> = [
            ("P1", "Great value", "great value"),
            ("P2", "बहुत अच्छा है", ""),
            ("P3", "बढ़िया", ""),
            ("P4", "Works fine", "works fine"),
            ("P5", "Too small", "too small"),
        ]
        .into_iter()
        .map(|(product, raw, clean)| {
            Record::from_pairs(
                [
                    ("product_id", Some(product)),
                    ("user_id", Some("U1")),
                    ("review_content", Some(raw)),
                    ("review_content_clean", Some(clean)),
                ],
                0,
            )
        })
        .collect();
        let dataset = Dataset::from_records(records);

        let report = observer(QualityPolicy::default()).observe("language_filter", 1, true, &dataset);
        assert!(!report.is_blocking());

        let duplicates = report.duplicates.as_ref().unwrap();
        let content = duplicates
            .key_nulls
            .iter()
            .find(|k| k.column == "review_content_clean")
            .unwrap();
        assert_eq!(content.null_count, 0);
        assert_eq!(duplicates.emptied_key_fields[0].null_count, 2);
        assert_eq!(duplicates.emptied_key_fields[0].null_pct, 40.0);
        // Still visible through the observe-only column metric
        assert_eq!(report.column_null_pct("review_content_clean"), Some(40.0));
    }

    #[test]
    fn test_null_raw_key_still_blocks() {
        let dataset = Dataset::from_records(vec![
            Record::from_pairs(
                [
                    ("product_id", Some("P1")),
                    ("user_id", Some("U1")),
                    ("review_content", None),
                    ("review_content_clean", Some("")),
                ],
                0,
            ),
            Record::from_pairs(
                [
                    ("product_id", Some("P2")),
                    ("user_id", Some("U2")),
                    ("review_content", Some("Fine")),
                    ("review_content_clean", Some("fine")),
                ],
                0,
            ),
        ]);
        let report = observer(QualityPolicy::default()).observe("language_filter", 1, true, &dataset);
        let blocking: Vec<_> = report.blocking_breaches().collect();
        assert_eq!(blocking.len(), 1);
        assert_eq!(blocking[0].column.as_deref(), Some("review_content_clean"));
        assert_eq!(blocking[0].value_pct, 50.0);
    }

    #[test]
    fn test_observe_only_policy_never_blocks() {
        let dataset = Dataset::from_records(vec![row("P1", None, None), row("P2", None, None)]);
        let report = observer(QualityPolicy::observe_only()).observe("language_filter", 1, true, &dataset);
        assert!(!report.breaches.is_empty());
        assert!(!report.is_blocking());
    }

    #[test]
    fn test_threshold_is_strict() {
        let threshold = Threshold::block(20.0);
        assert!(!threshold.is_breached(20.0));
        assert!(threshold.is_breached(20.01));
        assert!(!Threshold::default().is_breached(100.0));
    }

    #[test]
    fn test_promoted_metric_blocks() {
        let mut policy = QualityPolicy::default();
        policy.unknown_sentiment_pct = Threshold::block(10.0);

        let records: Vec<Record> = ["positive", "unknown", "unknown", "negative"]
            .iter()
            .enumerate()
            .map(|(i, label)| {
                let id = format!("P{}", i);
                let mut record = row(&id, Some("U1"), Some("text"));
                record.set("sentiment", serde_json::Value::String(label.to_string()));
                record
            })
            .collect();
        let dataset = Dataset::from_records(records);

        let report = observer(policy).observe("annotate", 1, false, &dataset);
        assert_eq!(report.label("unknown").unwrap().count, 2);
        assert_eq!(report.label("unknown").unwrap().pct, 50.0);
        assert_eq!(report.label("neutral").unwrap().count, 0);
        assert!(report
            .blocking_breaches()
            .any(|b| b.metric == Metric::UnknownSentimentPct));
    }

    #[test]
    fn test_labels_absent_without_sentiment_column() {
        let dataset = Dataset::from_records(vec![row("P1", Some("U1"), Some("x"))]);
        let report = observer(QualityPolicy::default()).observe("dedup", 1, false, &dataset);
        assert!(report.labels.is_none());
    }

    #[test]
    fn test_uniqueness_samples() {
        let records: Vec<Record> = ["a", "b", "a", "c", "b", "a"]
            .iter()
            .enumerate()
            .map(|(i, link)| {
                Record::from_pairs([("product_link", Some(*link))], i + 1)
            })
            .collect();
        let dataset = Dataset::from_records(records);

        let report = observer(QualityPolicy::default()).observe("ingest", 1, false, &dataset);
        let stats = &report.uniqueness[0];
        assert_eq!(stats.non_null, 6);
        assert_eq!(stats.distinct, 3);
        assert_eq!(stats.duplicate_count, 3);
        assert_eq!(stats.duplicate_pct, 50.0);
        assert_eq!(stats.duplicate_samples, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_empty_dataset() {
        let dataset = Dataset::new(keys(), Vec::new());
        let report = observer(QualityPolicy::default()).observe("ingest", 1, false, &dataset);
        assert_eq!(report.total_records, 0);
        assert_eq!(report.row_null_pct, 0.0);
        assert!(report.breaches.is_empty());
    }

    #[test]
    fn test_observer_does_not_mutate() {
        let dataset = Dataset::from_records(vec![row("P1", None, Some("x"))]);
        let before = dataset.clone();
        let _ = observer(QualityPolicy::default()).observe("ingest", 1, false, &dataset);
        assert_eq!(dataset, before);
    }

    #[test]
    fn test_history_sequence_and_jsonl_append() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("history.jsonl");
        let observer = observer(QualityPolicy::default());
        let dataset = Dataset::from_records(vec![row("P1", Some("U1"), Some("x"))]);

        let mut history = QualityHistory::new();
        observer.checkpoint("ingest", false, &dataset, &mut history);
        let second = observer.checkpoint("normalize", false, &dataset, &mut history);
        assert_eq!(second.sequence, 2);
        assert_eq!(history.get("ingest").unwrap().sequence, 1);

        assert_eq!(history.append_to(&path).unwrap(), 2);
        assert_eq!(history.append_to(&path).unwrap(), 2);

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["checkpoint"], "ingest");
        assert_eq!(first["sequence"], 1);
    }

    #[test]
    fn test_policy_validation_and_parsing() {
        let mut policy = QualityPolicy::default();
        policy.row_null_pct = Threshold::observe(140.0);
        assert!(Observer::new(
            &QualityConfig {
                policy,
                ..Default::default()
            },
            keys()
        )
        .is_err());

        let json = r#"{"duplicate_pct": {"max_pct": 5.0, "mode": "block"}}"#;
        let parsed: QualityPolicy = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.duplicate_pct, Threshold::block(5.0));
        assert_eq!(parsed.dedup_key_null_pct, Threshold::block(20.0));

        let unknown = r#"{"nope": {"max_pct": 5.0}}"#;
        assert!(serde_json::from_str::<QualityPolicy>(unknown).is_err());
    }
}
