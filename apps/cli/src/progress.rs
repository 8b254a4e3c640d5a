//! Terminal progress rendering with indicatif.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use confluence_export_shared::{ProgressEvent, ProgressObserver};

/// Spinner while discovering, bar while fetching and exporting.
///
/// Safe to share between fetch tasks: `ProgressBar` is internally
/// synchronised.
pub(crate) struct CliProgress {
    bar: ProgressBar,
    verbose: bool,
}

impl CliProgress {
    pub(crate) fn new(verbose: bool) -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(spinner_style());
        bar.enable_steady_tick(Duration::from_millis(80));
        Self { bar, verbose }
    }

    /// Remove the bar before the summary is printed.
    pub(crate) fn finish(&self) {
        self.bar.finish_and_clear();
    }

    fn start_bar(&self, total: usize, phase: &str) {
        self.bar.set_style(bar_style());
        self.bar.set_length(total as u64);
        self.bar.set_position(0);
        self.bar.set_message(phase.to_string());
    }
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "✓"])
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
}

impl ProgressObserver for CliProgress {
    fn on_progress(&self, event: ProgressEvent<'_>) {
        match event {
            ProgressEvent::RootStarted { id, current, total } => {
                self.bar.set_style(spinner_style());
                self.bar
                    .set_message(format!("Discovering [{current}/{total}] page {id}"));
            }
            ProgressEvent::Discovered { root_id, count } => {
                self.bar
                    .println(format!("  + found {count} descendant(s) under {root_id}"));
            }
            ProgressEvent::FetchStarted { total } => self.start_bar(total, "Fetching"),
            ProgressEvent::PageFetched { title, .. } => {
                self.bar.inc(1);
                self.bar.set_message(format!("Fetched {title}"));
            }
            ProgressEvent::PageSkipped { id, error } => {
                self.bar.inc(1);
                self.bar.println(format!("  x skipped {id}: {error}"));
            }
            ProgressEvent::ExportStarted { total } => self.start_bar(total, "Exporting"),
            ProgressEvent::PageExported {
                title,
                format,
                path,
            } => {
                self.bar.inc(1);
                self.bar.set_message(format!("Exported {title} ({format})"));
                if self.verbose {
                    self.bar.println(format!("  + {path}"));
                }
            }
            ProgressEvent::ExportFailed {
                title,
                format,
                error,
            } => {
                self.bar.inc(1);
                self.bar
                    .println(format!("  x {title} ({format}): {error}"));
            }
        }
    }
}
