use bagpost_core::{BatchSummary, Error, ProgressReporter, UploadOutcome};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;

const BAR_TEMPLATE: &str =
    "  {spinner:.cyan} Uploading [{bar:30.cyan/dim}] {pos}/{len} recordings {msg}";

/// CLI progress reporter: one bar across the batch, one line per recording.
pub struct CliReporter {
    bar: ProgressBar,
}

impl CliReporter {
    pub fn new() -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template(BAR_TEMPLATE)
                .unwrap()
                .progress_chars("━╸─")
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
        );
        Self { bar }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

impl ProgressReporter for CliReporter {
    fn on_batch_start(&self, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.enable_steady_tick(std::time::Duration::from_millis(80));
    }

    fn on_recording_start(&self, index: usize, _total: usize, path: &Path) {
        self.bar.set_position(index.saturating_sub(1) as u64);
        self.bar.set_message(file_name(path));
    }

    fn on_recording_complete(&self, path: &Path, outcome: &UploadOutcome) {
        let line = match outcome {
            UploadOutcome::Success { archived } => format!(
                "  {} {} → {}",
                "✓".green(),
                file_name(path),
                archived.display()
            ),
            UploadOutcome::TransportFailure { status: Some(code) } => format!(
                "  {} {} rejected by archive (HTTP {})",
                "✗".red(),
                file_name(path),
                code
            ),
            UploadOutcome::TransportFailure { status: None } => {
                format!("  {} {} upload failed", "✗".red(), file_name(path))
            }
            UploadOutcome::SkippedUnsafe { reason } => format!(
                "  {} {} skipped: {}",
                "!".yellow(),
                file_name(path),
                reason
            ),
            UploadOutcome::SkippedAlreadyProcessed => {
                format!("  {} {} already uploaded", "·".dimmed(), file_name(path))
            }
        };
        self.bar.println(line);
        self.bar.inc(1);
    }

    fn on_recording_error(&self, path: &Path, error: &Error) {
        self.bar
            .println(format!("  {} {}: {}", "✗".red(), file_name(path), error));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, summary: &BatchSummary) {
        self.bar.finish_and_clear();
        eprintln!(
            "  {} {} of {} recording(s) uploaded in {:.2}s",
            "✓".green(),
            summary.uploaded,
            summary.discovered,
            summary.duration.as_secs_f64()
        );
    }
}
