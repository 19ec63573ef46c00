//! Output formatting and styling module.
//!
//! Provides a centralized interface for all CLI output: colored status lines,
//! rendering of engine events, the progress bar and the end-of-run tables.

use crate::engine::OutcomeEvent;
use crate::stats::StatsSnapshot;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;

/// Manages all CLI output with consistent styling and formatting.
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message in red with an X mark.
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Prints a warning message in yellow with a warning symbol.
    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    /// Prints an info message in cyan.
    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    /// Prints a section header.
    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    /// Prints the simulation banner.
    pub fn simulation_notice(message: &str) {
        println!("{}", format!("[SIMULATION MODE] {}", message).blue().bold());
    }

    /// Styles an engine event the way it is shown on the console.
    pub fn styled_event(event: &OutcomeEvent) -> String {
        let text = event.to_string();
        match event {
            OutcomeEvent::Moved { .. } | OutcomeEvent::SimulatedMove { .. } => text,
            OutcomeEvent::Renamed { .. } | OutcomeEvent::SimulatedRename { .. } => {
                text.yellow().to_string()
            }
            OutcomeEvent::SkippedSameLocation { .. } => text.dimmed().to_string(),
            OutcomeEvent::Error { .. } | OutcomeEvent::Aborted => text.red().to_string(),
            OutcomeEvent::Summary { simulated, .. } => {
                let text = format!("\n{}", text);
                if *simulated {
                    text.blue().bold().to_string()
                } else {
                    text.green().bold().to_string()
                }
            }
        }
    }

    /// Prints an engine event; errors go to stderr.
    pub fn event(event: &OutcomeEvent) {
        let line = Self::styled_event(event);
        if event.is_error() {
            eprintln!("{}", line);
        } else {
            println!("{}", line);
        }
    }

    /// Creates and returns a progress bar for a run over `total` files.
    pub fn create_progress_bar(total: u64) -> ProgressBar {
        let pb = ProgressBar::new(total);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░");
        pb.set_style(style);
        pb
    }

    /// Prints the per-run counters and the elapsed time.
    pub fn stats_summary(stats: &StatsSnapshot, elapsed_secs: f64) {
        let rule = "=".repeat(30);
        println!("\n{}", rule.bright_black());
        println!("{}", "OPERATION SUMMARY".bold());
        println!("Total Time:       {:.4} sec", elapsed_secs);
        println!("Files Processed:  {}", stats.processed);
        println!("Files Skipped:    {}", stats.skipped);
        println!("Files Excluded:   {}", stats.excluded);
        let errors = format!("Critical Errors:  {}", stats.errored);
        if stats.errored > 0 {
            println!("{}", errors.red());
        } else {
            println!("{}", errors);
        }
        println!("{}", rule.bright_black());
    }

    /// Prints a summary table of affected files by category.
    pub fn category_table(category_counts: &BTreeMap<String, usize>) {
        if category_counts.is_empty() {
            return;
        }
        Self::header("BY CATEGORY");

        let total: usize = category_counts.values().sum();
        let width = category_counts
            .keys()
            .map(|name| name.len())
            .max()
            .unwrap_or(0)
            .max(8); // At least "Category" width

        println!(
            "{:<width$} | {}",
            "Category".bold(),
            "Files".bold(),
            width = width
        );
        println!("{}", "-".repeat(width + 10));

        for (category, count) in category_counts {
            println!(
                "{:<width$} | {} {}",
                category,
                count.to_string().green(),
                plural(*count),
                width = width
            );
        }

        println!("{}", "-".repeat(width + 10));
        println!(
            "{:<width$} | {} {}",
            "Total".bold(),
            total.to_string().green().bold(),
            plural(total),
            width = width
        );
    }
}

fn plural(count: usize) -> &'static str {
    if count == 1 { "file" } else { "files" }
}

/// Tallies affected files per category folder from a stream of events.
#[derive(Debug, Default)]
pub struct CategoryTally {
    counts: BTreeMap<String, usize>,
}

impl CategoryTally {
    /// Creates an empty tally.
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts `event` under its destination folder; events without a destination are ignored.
    pub fn record(&mut self, event: &OutcomeEvent) {
        let category = event
            .destination()
            .and_then(|to| to.parent())
            .and_then(|dir| dir.file_name())
            .map(|name| name.to_string_lossy().into_owned());

        if let Some(category) = category {
            *self.counts.entry(category).or_insert(0) += 1;
        }
    }

    /// Affected files per category folder, sorted by name.
    pub fn counts(&self) -> &BTreeMap<String, usize> {
        &self.counts
    }
}
