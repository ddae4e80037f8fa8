use crate::catalog::VehicleCatalog;
use crate::recording::RecordingSource;
use std::fmt;
use std::path::{Component, Path};
use tracing::{debug, warn};

/// How the source vehicle was inferred. Upload safety depends on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Confidence {
    /// Nothing matched.
    Failed,
    /// A parent directory is named after a known unit.
    Directory,
    /// Only the vehicle type could be fingerprinted from message types.
    Content,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Confidence::Failed => "failed",
            Confidence::Directory => "directory",
            Confidence::Content => "content",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identification {
    pub vehicle_type: Option<String>,
    pub vehicle_name: Option<String>,
    pub confidence: Confidence,
}

impl Identification {
    pub fn failed() -> Self {
        Self {
            vehicle_type: None,
            vehicle_name: None,
            confidence: Confidence::Failed,
        }
    }
}

pub struct SourceIdentifier<'a> {
    catalog: &'a VehicleCatalog,
}

impl<'a> SourceIdentifier<'a> {
    pub fn new(catalog: &'a VehicleCatalog) -> Self {
        Self { catalog }
    }

    /// Directory evidence first, then content evidence, then failure.
    pub fn identify<R: RecordingSource + ?Sized>(&self, recording: &R) -> Identification {
        debug!("Identifying {} by directory", recording.location().display());
        if let Some(found) = self.by_directory(recording.location()) {
            return found;
        }

        debug!("Directory identification failed; trying contents");
        if let Some(found) = self.by_content(&recording.content_signals()) {
            return found;
        }

        debug!("Content identification failed");
        Identification::failed()
    }

    /// Matches parent directory names against unit names (never type names).
    /// The deepest matching directory wins.
    pub fn by_directory(&self, path: &Path) -> Option<Identification> {
        let parent = path.parent()?;
        parent
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => part.to_str(),
                _ => None,
            })
            .filter_map(|part| {
                self.catalog.type_of_name(part).map(|entry| Identification {
                    vehicle_type: Some(entry.vehicle_type.clone()),
                    vehicle_name: Some(part.to_string()),
                    confidence: Confidence::Directory,
                })
            })
            .last()
    }

    /// Matches message types against each vehicle type's unique signal.
    /// The individual unit is never recoverable this way.
    pub fn by_content(&self, signals: &std::collections::BTreeSet<String>) -> Option<Identification> {
        let matches: Vec<&str> = self
            .catalog
            .iter()
            .filter(|entry| signals.contains(&entry.content_signal))
            .map(|entry| entry.vehicle_type.as_str())
            .collect();

        if matches.len() > 1 {
            warn!(
                "Recording carries signals of several vehicle types {:?}; using '{}'",
                matches,
                matches[matches.len() - 1]
            );
        }

        matches.last().map(|vehicle_type| Identification {
            vehicle_type: Some(vehicle_type.to_string()),
            vehicle_name: None,
            confidence: Confidence::Content,
        })
    }
}
