use crate::bag::Bag;
use crate::catalog::VehicleCatalog;
use crate::error::Error;
use crate::identify::{Confidence, Identification, SourceIdentifier};
use crate::naming::{self, CanonicalName};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Result of evaluating a recording's filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameDecision {
    /// Where the recording lives now (renamed or not).
    pub path: PathBuf,
    /// Safe to tag and upload.
    pub eligible: bool,
    /// `None` when the existing name already satisfied the convention.
    pub identification: Option<Identification>,
}

pub struct Renamer<'a> {
    catalog: &'a VehicleCatalog,
}

impl<'a> Renamer<'a> {
    pub fn new(catalog: &'a VehicleCatalog) -> Self {
        Self { catalog }
    }

    /// Validates the filename and, when it fails, identifies the source,
    /// builds the canonical name and renames the file. The rename happens
    /// even when the result is not upload-eligible, so the new name tells an
    /// operator what is and is not known.
    pub fn evaluate(&self, path: &Path) -> Result<RenameDecision, Error> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        info!("Evaluating filename {}", file_name);

        if !naming::needs_rename(&file_name, self.catalog) {
            info!("{} has a valid name", file_name);
            return Ok(RenameDecision {
                path: path.to_path_buf(),
                eligible: true,
                identification: None,
            });
        }
        info!("{} has an invalid name; renaming", file_name);

        let (identification, timestamp) = {
            let bag = Bag::open(path)?;
            let identification = SourceIdentifier::new(self.catalog).identify(&bag);
            let timestamp = naming::timestamp_token(bag.start_time()?);
            (identification, timestamp)
        };

        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default();
        let built_name = CanonicalName {
            vehicle_type: identification.vehicle_type.clone(),
            vehicle_name: identification.vehicle_name.clone(),
            mission: None,
            timestamp,
        }
        .file_name(&extension);

        let eligible = is_eligible(identification.confidence);
        match identification.confidence {
            Confidence::Failed => warn!(
                "Could not retrieve vehicle info, named recording {}. Do not upload it until \
                 its source vehicle is identified.",
                built_name
            ),
            Confidence::Directory => info!("Retrieved name {} from directory", built_name),
            Confidence::Content => warn!(
                "Retrieved name {} from contents. The individual vehicle could not be \
                 identified; add its name to the filename manually before uploading.",
                built_name
            ),
        }

        let new_path = path.with_file_name(&built_name);
        naming::rename_no_clobber(path, &new_path)?;

        Ok(RenameDecision {
            path: new_path,
            eligible,
            identification: Some(identification),
        })
    }
}

/// Only directory evidence names an individual unit, so only it is safe.
pub fn is_eligible(confidence: Confidence) -> bool {
    match confidence {
        Confidence::Failed => false,
        Confidence::Directory => true,
        Confidence::Content => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eligibility_policy() {
        assert!(!is_eligible(Confidence::Failed));
        assert!(is_eligible(Confidence::Directory));
        assert!(!is_eligible(Confidence::Content));
    }

    #[test]
    fn test_valid_name_skips_identification() {
        let catalog = VehicleCatalog::default();
        let renamer = Renamer::new(&catalog);
        // The file does not even need to exist: a valid name is never opened.
        let path = Path::new("/nowhere/remus_casper_20240101-000000.bag");
        let decision = renamer.evaluate(path).unwrap();
        assert!(decision.eligible);
        assert_eq!(decision.path, path);
        assert!(decision.identification.is_none());
    }
}
