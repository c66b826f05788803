//! Progress reporting and visualization for CLI

use std::path::Path;
use std::time::{Duration, Instant};

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use reviewclean_core::pipeline::{RunStats, Stage, StageListener};
use reviewclean_core::quality::{QualityHistory, QualityReport};
use reviewclean_filters::Sentiment;

/// Progress reporter with one spinner per pipeline stage
pub struct ProgressReporter {
    multi: MultiProgress,
    current: Option<(Stage, ProgressBar, Instant)>,
    quality_bar: ProgressBar,
    input_records: usize,
}

impl ProgressReporter {
    /// Create a reporter for a run over `input_records` records. A hidden
    /// reporter draws nothing (used with `--json`).
    pub fn new(input_records: usize, visible: bool) -> Self {
        let multi = if visible {
            MultiProgress::new()
        } else {
            MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
        };

        // Quality bar for checkpoint results
        let quality_bar = multi.add(ProgressBar::new(0));
        quality_bar.set_style(style("Quality: {msg}", ProgressStyle::default_bar()));
        quality_bar.set_message("waiting for ingest checkpoint");

        Self {
            multi,
            current: None,
            quality_bar,
            input_records,
        }
    }

    /// Finish progress reporting
    pub fn finish(&mut self) {
        if let Some((stage, bar, _)) = self.current.take() {
            bar.abandon_with_message(format!("{} interrupted", stage));
        }
        self.quality_bar.finish();
    }

    /// Format large numbers with thousand separators
    fn format_number(n: usize) -> String {
        if n >= 1_000_000 {
            format!("{:.1}M", n as f64 / 1_000_000.0)
        } else if n >= 1_000 {
            format!("{:.1}K", n as f64 / 1_000.0)
        } else {
            n.to_string()
        }
    }
}

impl StageListener for ProgressReporter {
    fn stage_started(&mut self, stage: Stage) {
        let bar = self.multi.insert_before(&self.quality_bar, ProgressBar::new_spinner());
        bar.set_style(style(
            "{spinner:.cyan} [{elapsed_precise}] {prefix:<16} {msg}",
            ProgressStyle::default_spinner(),
        ));
        bar.set_prefix(stage.to_string());
        bar.set_message(format!("{} records", Self::format_number(self.input_records)));
        bar.enable_steady_tick(Duration::from_millis(100));
        self.current = Some((stage, bar, Instant::now()));
    }

    fn stage_finished(&mut self, stage: Stage, records: usize) {
        if let Some((_, bar, started)) = self.current.take() {
            bar.finish_with_message(format!(
                "{} records in {:.2?}",
                Self::format_number(records),
                started.elapsed()
            ));
        }
        self.input_records = records;
        tracing::debug!("Stage {} finished with {} records", stage, records);
    }

    fn checkpoint(&mut self, report: &QualityReport) {
        let blocking = report.blocking_breaches().count();
        let msg = if report.breaches.is_empty() {
            format!("{} ok", report.checkpoint)
        } else {
            format!(
                "{} | {} breaches ({} blocking) | {:.1}% rows with nulls",
                report.checkpoint,
                report.breaches.len(),
                blocking,
                report.row_null_pct
            )
        };
        self.quality_bar.set_message(msg);
    }
}

fn style(template: &str, fallback: ProgressStyle) -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(template)
        .map(|s| s.tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ "))
        .unwrap_or(fallback)
}

/// Print a formatted summary report
pub fn print_summary_report(
    input: &Path,
    output: Option<&Path>,
    stats: &RunStats,
    history: &QualityHistory,
) {
    let total = stats.input_records;

    println!("\n{}", "═".repeat(60));
    println!("Review Cleaning Complete");
    println!("{}", "═".repeat(60));
    println!("Input:              {}", input.display());

    if let Some(output_path) = output {
        println!("Output:             {}", output_path.display());
    } else {
        println!("Output:             (nothing written)");
    }

    println!("Total records:      {}", format_with_commas(total));

    let duplicates = stats.duplicates_removed();
    if duplicates > 0 {
        println!(
            "Duplicates removed: {} ({:.1}%)",
            format_with_commas(duplicates),
            percent(duplicates, total)
        );
    }

    if let Some(annotate) = &stats.annotate {
        if annotate.dropped_invalid > 0 {
            println!(
                "Invalid ratings:    {} dropped",
                format_with_commas(annotate.dropped_invalid)
            );
        }
        for label in Sentiment::ALL {
            let count = annotate.labels.get(&label).copied().unwrap_or(0);
            println!(
                "  {:<17} {} ({:.1}%)",
                format!("{}:", label),
                format_with_commas(count),
                percent(count, stats.output_records)
            );
        }
    }

    println!(
        "Final dataset:      {} ({:.1}%)",
        format_with_commas(stats.output_records),
        percent(stats.output_records, total)
    );

    let breaches: usize = history.reports().iter().map(|r| r.breaches.len()).sum();
    println!(
        "Quality reports:    {} checkpoints, {} breaches",
        history.len(),
        breaches
    );
    for report in history.reports() {
        for breach in &report.breaches {
            println!("  [{}] {}", report.checkpoint, breach);
        }
    }

    println!("{}", "═".repeat(60));
}

/// Print one checkpoint report in human-readable form
pub fn print_quality_report(report: &QualityReport) {
    println!(
        "Checkpoint #{} '{}': {} records",
        report.sequence,
        report.checkpoint,
        format_with_commas(report.total_records)
    );
    println!(
        "  Rows with nulls:  {} ({:.2}%)",
        format_with_commas(report.rows_with_nulls),
        report.row_null_pct
    );
    for nulls in report.column_nulls.iter().filter(|c| c.null_count > 0) {
        println!(
            "  {:<17} {} null ({:.2}%)",
            format!("{}:", nulls.column),
            format_with_commas(nulls.null_count),
            nulls.null_pct
        );
    }
    if let Some(duplicates) = &report.duplicates {
        println!(
            "  Duplicate keys:   {} ({:.2}%) over {}",
            format_with_commas(duplicates.duplicate_count),
            duplicates.duplicate_pct,
            duplicates.key_columns.join(", ")
        );
    }
    if let Some(labels) = &report.labels {
        for share in labels {
            println!("  {:<17} {} ({:.2}%)", format!("{}:", share.label), share.count, share.pct);
        }
    }
    for uniqueness in &report.uniqueness {
        println!(
            "  Repeated {}: {} ({:.2}%)",
            uniqueness.column,
            format_with_commas(uniqueness.duplicate_count),
            uniqueness.duplicate_pct
        );
    }
    for breach in &report.breaches {
        println!("  BREACH [{:?}] {}", breach.mode, breach);
    }
}

fn percent(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        (count as f64 / total as f64) * 100.0
    }
}

/// Format number with thousand separators
pub fn format_with_commas(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
