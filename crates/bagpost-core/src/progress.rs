use crate::driver::{BatchSummary, UploadOutcome};
use std::path::Path;

/// Trait for reporting batch progress.
///
/// CLI implements with indicatif; quiet runs use `SilentReporter`.
/// All methods have default no-op implementations.
pub trait ProgressReporter {
    fn on_batch_start(&self, _total: usize) {}
    fn on_recording_start(&self, _index: usize, _total: usize, _path: &Path) {}
    fn on_recording_complete(&self, _path: &Path, _outcome: &UploadOutcome) {}
    fn on_recording_error(&self, _path: &Path, _error: &crate::Error) {}
    fn on_batch_complete(&self, _summary: &BatchSummary) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}
