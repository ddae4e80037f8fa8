use crate::archive::{self, ArchiveClient, UploadForm};
use crate::bag::Bag;
use crate::config::AppConfig;
use crate::error::Error;
use crate::identify::Confidence;
use crate::naming;
use crate::progress::ProgressReporter;
use crate::rename::Renamer;
use crate::scanner;
use crate::tags::{publish_tags, TagError, TagGenerator};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Vehicle type and unit both unknown.
    Unidentified,
    /// Vehicle type known from contents, unit unknown.
    UnitUnknown,
    TaggingFailed(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Unidentified => write!(f, "source vehicle could not be identified"),
            SkipReason::UnitUnknown => write!(f, "individual vehicle name is unknown"),
            SkipReason::TaggingFailed(e) => write!(f, "tagging failed: {}", e),
        }
    }
}

/// What happened to one recording in this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// Uploaded and moved into the completed directory.
    Success { archived: PathBuf },
    /// Upload attempted and refused or not delivered; file left in place.
    TransportFailure { status: Option<u16> },
    /// Not safe to upload; file left in place (possibly renamed).
    SkippedUnsafe { reason: SkipReason },
    /// Already inside the completed directory.
    SkippedAlreadyProcessed,
}

#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    pub discovered: usize,
    pub uploaded: usize,
    pub upload_failed: usize,
    pub skipped_unsafe: usize,
    pub already_processed: usize,
    /// Recordings that hit an unexpected per-file error (I/O, unreadable bag, rename collision).
    pub errors: Vec<(PathBuf, String)>,
    pub duration: Duration,
}

impl BatchSummary {
    fn record(&mut self, outcome: &UploadOutcome) {
        match outcome {
            UploadOutcome::Success { .. } => self.uploaded += 1,
            UploadOutcome::TransportFailure { .. } => self.upload_failed += 1,
            UploadOutcome::SkippedUnsafe { .. } => self.skipped_unsafe += 1,
            UploadOutcome::SkippedAlreadyProcessed => self.already_processed += 1,
        }
    }
}

/// Drives each discovered recording through
/// validate/rename → tag → publish → upload → relocate.
///
/// Only setup failures (scan root, authentication) are returned as errors;
/// per-recording failures are logged and the batch moves on.
pub struct UploadDriver<'a> {
    config: &'a AppConfig,
    client: &'a dyn ArchiveClient,
    tag_generator: TagGenerator,
}

impl<'a> UploadDriver<'a> {
    pub fn new(config: &'a AppConfig, client: &'a dyn ArchiveClient) -> Self {
        Self {
            config,
            client,
            tag_generator: TagGenerator::default(),
        }
    }

    pub fn with_tag_generator(mut self, tag_generator: TagGenerator) -> Self {
        self.tag_generator = tag_generator;
        self
    }

    pub fn run(&self, reporter: &dyn ProgressReporter) -> Result<BatchSummary, Error> {
        let start = Instant::now();
        let root = fs::canonicalize(&self.config.scan_root)?;

        // Fatal on failure; nothing has been touched yet.
        let token = self.client.fetch_token()?;
        let upload_url = archive::upload_url(&self.config.base_url);

        let recordings = scanner::discover_recordings(
            &root,
            &self.config.extension,
            self.config.recursive,
            &self.config.ignore_patterns,
        )?;
        let total = recordings.len();
        info!(
            "Found {} recording(s) in {} ({})",
            total,
            root.display(),
            if self.config.recursive { "recursive" } else { "shallow" }
        );
        reporter.on_batch_start(total);

        let mut summary = BatchSummary {
            discovered: total,
            ..BatchSummary::default()
        };

        for (i, path) in recordings.iter().enumerate() {
            info!("Processing recording {} ({}/{})", display_name(path), i + 1, total);
            reporter.on_recording_start(i + 1, total, path);

            match self.process_recording(path, &root, &token, &upload_url) {
                Ok(outcome) => {
                    debug!("{}: {:?}", display_name(path), outcome);
                    summary.record(&outcome);
                    reporter.on_recording_complete(path, &outcome);
                }
                Err(e) => {
                    error!("Error processing {}: {}", path.display(), e);
                    reporter.on_recording_error(path, &e);
                    summary.errors.push((path.clone(), e.to_string()));
                }
            }
        }

        summary.duration = start.elapsed();
        info!(
            "Batch finished in {:.2}s: {} uploaded, {} upload failures, {} skipped as unsafe, \
             {} already processed, {} errors",
            summary.duration.as_secs_f64(),
            summary.uploaded,
            summary.upload_failed,
            summary.skipped_unsafe,
            summary.already_processed,
            summary.errors.len(),
        );
        reporter.on_batch_complete(&summary);
        Ok(summary)
    }

    /// Runs one recording through the pipeline. `Err` is reserved for
    /// unexpected I/O and unreadable recordings; every expected outcome,
    /// including tagging and transport failures, is an `UploadOutcome`.
    pub fn process_recording(
        &self,
        path: &Path,
        root: &Path,
        token: &str,
        upload_url: &str,
    ) -> Result<UploadOutcome, Error> {
        if scanner::is_in_completed_dir(path, root, &self.config.completed_dir) {
            info!(
                "Ignoring pre-existing recording {} in '{}'",
                display_name(path),
                path.parent().unwrap_or(root).display()
            );
            return Ok(UploadOutcome::SkippedAlreadyProcessed);
        }

        let decision = Renamer::new(&self.config.vehicles).evaluate(path)?;
        if !decision.eligible {
            let confidence = decision
                .identification
                .as_ref()
                .map(|id| id.confidence)
                .unwrap_or(Confidence::Failed);
            let reason = match confidence {
                Confidence::Content => SkipReason::UnitUnknown,
                _ => SkipReason::Unidentified,
            };
            if reason == SkipReason::UnitUnknown {
                warn!(
                    "{} needs manual name completion before it can be uploaded",
                    display_name(&decision.path)
                );
            }
            warn!(
                "{} does not have enough metadata to be uploaded safely ({}; confidence: {}). \
                 Skipping without upload.",
                display_name(&decision.path),
                reason,
                confidence
            );
            return Ok(UploadOutcome::SkippedUnsafe { reason });
        }
        let path = decision.path;

        if let Err(e) = self.tag_recording(&path) {
            error!(
                "Error tagging {}: {}. Skipping without upload.",
                display_name(&path),
                e
            );
            return Ok(UploadOutcome::SkippedUnsafe {
                reason: SkipReason::TaggingFailed(e.to_string()),
            });
        }

        let form = UploadForm::for_recording(&path, token);
        let status = match self.client.post_multipart(upload_url, form) {
            Ok(status) => status,
            Err(e) => {
                error!("Upload of {} failed: {}", display_name(&path), e);
                return Ok(UploadOutcome::TransportFailure { status: None });
            }
        };
        if !archive::is_success(status) {
            error!("Post request failed with status code {}.", status);
            return Ok(UploadOutcome::TransportFailure {
                status: Some(status),
            });
        }

        info!("Successful file upload. Moving file to subdirectory.");
        let archived = relocate(&path, &self.config.completed_dir)?;
        Ok(UploadOutcome::Success { archived })
    }

    /// Generates and appends tags. The bag is closed on every path: explicitly
    /// on success, by drop when an error returns early.
    fn tag_recording(&self, path: &Path) -> Result<(), TagError> {
        let mut bag = Bag::open_append(path)?;
        let tags = self.tag_generator.generate(&bag)?;
        publish_tags(&mut bag, &tags)?;
        bag.close()?;
        Ok(())
    }
}

/// Moves `path` into `completed_dir` beside it, creating the directory if needed.
pub fn relocate(path: &Path, completed_dir: &str) -> Result<PathBuf, Error> {
    let parent = path
        .parent()
        .ok_or_else(|| Error::Other(format!("{} has no parent directory", path.display())))?;
    let file_name = path
        .file_name()
        .ok_or_else(|| Error::Other(format!("{} has no file name", path.display())))?;

    let dest_dir = parent.join(completed_dir);
    fs::create_dir_all(&dest_dir)?;
    let dest = dest_dir.join(file_name);
    naming::rename_no_clobber(path, &dest)?;
    Ok(dest)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_relocate_creates_completed_dir() {
        let tmp = tempdir().unwrap();
        let file = tmp.path().join("remus_shadow_t.bag");
        fs::write(&file, b"x").unwrap();

        let dest = relocate(&file, "uploaded").unwrap();
        assert_eq!(dest, tmp.path().join("uploaded").join("remus_shadow_t.bag"));
        assert!(dest.exists());
        assert!(!file.exists());

        // Second relocation into the existing directory.
        let other = tmp.path().join("remus_shadow_u.bag");
        fs::write(&other, b"y").unwrap();
        relocate(&other, "uploaded").unwrap();
        assert!(tmp.path().join("uploaded/remus_shadow_u.bag").exists());
    }

    #[test]
    fn test_summary_counts() {
        let mut summary = BatchSummary::default();
        summary.record(&UploadOutcome::SkippedAlreadyProcessed);
        summary.record(&UploadOutcome::TransportFailure { status: Some(500) });
        summary.record(&UploadOutcome::SkippedUnsafe {
            reason: SkipReason::UnitUnknown,
        });
        summary.record(&UploadOutcome::Success {
            archived: PathBuf::from("x"),
        });
        assert_eq!(summary.already_processed, 1);
        assert_eq!(summary.upload_failed, 1);
        assert_eq!(summary.skipped_unsafe, 1);
        assert_eq!(summary.uploaded, 1);
    }
}
