//! Terminal output for the courier CLI: spinner and colored result blocks.
//!
//! Uses `indicatif` for the in-flight spinner and `console` for styling.
//! Structured logs go through `tracing`; this module is only the
//! human-facing presentation on top.

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::dispatch::MetricsSnapshot;

/// Visual progress for a single dispatched job.
pub struct JobProgress {
    pb: ProgressBar,
    green: Style,
    red: Style,
}

impl JobProgress {
    /// Start the spinner with a short job label.
    pub fn start(label: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .expect("invalid template"),
        );
        pb.set_message(format!("dispatching: {label}"));
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
        }
    }

    /// Clear the spinner and report success.
    pub fn succeed(&self) {
        self.pb.finish_and_clear();
        println!("  {} job completed", self.green.apply_to("✓"));
    }

    /// Clear the spinner and report failure.
    pub fn fail(&self, message: &str) {
        self.pb.finish_and_clear();
        println!("  {} job failed: {message}", self.red.apply_to("✗"));
    }
}

/// Print a queue metrics snapshot as a styled JSON block.
pub fn print_metrics(snapshot: &MetricsSnapshot) {
    let header = Style::new().cyan().bold();
    println!();
    println!("{}", header.apply_to("─── Queue Metrics ───"));
    println!(
        "{}",
        serde_json::to_string_pretty(snapshot).unwrap_or_default()
    );
}
