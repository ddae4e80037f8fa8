//! The canonical filename convention:
//! `vehicletype_vehiclename[_missionlabel]_YYYY-MM-DD-HH-MM-SS.<ext>`

use crate::bag::RosTime;
use crate::catalog::VehicleCatalog;
use crate::error::Error;
use crate::scanner;
use chrono::{Local, TimeZone};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const SEPARATOR: char = '_';
pub const UNKNOWN_TYPE: &str = "unknowntype";
pub const UNKNOWN_NAME: &str = "unknownname";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";

/// Whether `filename` fails the naming convention.
///
/// Valid names split into 3 or 4 `_`-separated segments whose first two are a
/// catalog vehicle type and one of its units. Anything else, including mission
/// labels that themselves contain `_`, needs renaming.
pub fn needs_rename(filename: &str, catalog: &VehicleCatalog) -> bool {
    let segments: Vec<&str> = filename.split(SEPARATOR).collect();
    if !(3..=4).contains(&segments.len()) {
        return true;
    }
    !catalog.is_known(segments[0], segments[1])
}

/// The start-of-recording token used in filenames and the `date/time` tag,
/// in local time and truncated to whole seconds.
pub fn timestamp_token(start: RosTime) -> String {
    match Local.timestamp_opt(start.sec as i64, 0).earliest() {
        Some(local) => local.format(TIMESTAMP_FORMAT).to_string(),
        None => {
            warn!("Start time {} has no local representation", start);
            start.sec.to_string()
        }
    }
}

/// Canonical filename for a recording whose provenance is (partly) known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalName {
    pub vehicle_type: Option<String>,
    pub vehicle_name: Option<String>,
    pub mission: Option<String>,
    pub timestamp: String,
}

impl CanonicalName {
    pub fn file_name(&self, extension: &str) -> String {
        let mut segments = vec![
            self.vehicle_type.as_deref().unwrap_or(UNKNOWN_TYPE),
            self.vehicle_name.as_deref().unwrap_or(UNKNOWN_NAME),
        ];
        if let Some(mission) = &self.mission {
            segments.push(mission);
        }
        segments.push(&self.timestamp);

        let stem = segments.join("_");
        if extension.is_empty() {
            stem
        } else {
            format!("{}.{}", stem, extension)
        }
    }
}

/// Renames `from` to `to` in place, never overwriting a different file.
pub fn rename_no_clobber(from: &Path, to: &Path) -> Result<(), Error> {
    if from == to {
        return Ok(());
    }
    if to.exists() {
        return Err(Error::RenameCollision {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
        });
    }
    fs::rename(from, to)?;
    Ok(())
}

/// Manual provenance override: prefix every recording directly inside `dir`
/// with `type_name_`. Returns the new paths.
pub fn hard_rename(
    dir: &Path,
    extension: &str,
    vehicle_type: &str,
    vehicle_name: &str,
    catalog: &VehicleCatalog,
) -> Result<Vec<PathBuf>, Error> {
    if !catalog.is_known(vehicle_type, vehicle_name) {
        warn!(
            "'{}_{}' is not in the vehicle catalog; renamed files will still fail validation",
            vehicle_type, vehicle_name
        );
    }

    let files = scanner::discover_recordings(dir, extension, false, &[])?;

    let mut renamed = Vec::with_capacity(files.len());
    for file in files {
        let Some(old_name) = file.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        let target = file.with_file_name(format!("{}_{}_{}", vehicle_type, vehicle_name, old_name));
        match rename_no_clobber(&file, &target) {
            Ok(()) => {
                info!("Renamed {} to {}", old_name, target.display());
                renamed.push(target);
            }
            Err(e) => warn!("Skipping {}: {}", file.display(), e),
        }
    }
    debug!("Hard rename finished, {} file(s) renamed", renamed.len());
    Ok(renamed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_segment_count_outside_bounds_needs_rename() {
        let catalog = VehicleCatalog::default();
        for name in [
            "recording1.bag",
            "remus_shadow.bag",
            "remus_shadow_msn_extra_2024-01-01-00-00-00.bag",
            "remus_shadow_a_b_c_d.bag",
        ] {
            assert!(needs_rename(name, &catalog), "{}", name);
        }
    }

    #[test]
    fn test_valid_type_and_name_pass_regardless_of_rest() {
        let catalog = VehicleCatalog::default();
        for name in [
            "remus_casper_20240101-000000.bag",
            "remus_shadow_msn3_2024-01-01-00-00-00.bag",
            "buoy_sugar_whatever",
            "buoy_shrew_x_y",
        ] {
            assert!(!needs_rename(name, &catalog), "{}", name);
        }
    }

    #[test]
    fn test_unknown_type_or_name_needs_rename() {
        let catalog = VehicleCatalog::default();
        assert!(needs_rename("remus_sugar_2024.bag", &catalog));
        assert!(needs_rename("glider_shadow_2024.bag", &catalog));
        assert!(needs_rename("shadow_remus_2024.bag", &catalog));
        assert!(needs_rename("unknowntype_unknownname_2024.bag", &catalog));
        assert!(needs_rename("buoy_unknownname_2024.bag", &catalog));
    }

    #[test]
    fn test_timestamp_token_shape() {
        let token = timestamp_token(RosTime::new(1_700_000_000, 999_999_999));
        let expected = Local
            .timestamp_opt(1_700_000_000, 0)
            .unwrap()
            .format("%Y-%m-%d-%H-%M-%S")
            .to_string();
        assert_eq!(token, expected);
        assert_eq!(token.split('-').count(), 6);
        assert!(!token.contains('_'));
    }

    #[test]
    fn test_canonical_file_name_placeholders() {
        let name = CanonicalName {
            vehicle_type: None,
            vehicle_name: None,
            mission: None,
            timestamp: "2024-01-01-00-00-00".to_string(),
        };
        assert_eq!(
            name.file_name("bag"),
            "unknowntype_unknownname_2024-01-01-00-00-00.bag"
        );

        let name = CanonicalName {
            vehicle_type: Some("buoy".to_string()),
            vehicle_name: None,
            mission: Some("msn7".to_string()),
            timestamp: "t".to_string(),
        };
        assert_eq!(name.file_name(""), "buoy_unknownname_msn7_t");
    }

    #[test]
    fn test_rename_no_clobber_refuses_existing_target() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.bag");
        let b = dir.path().join("b.bag");
        fs::write(&a, "a").unwrap();
        fs::write(&b, "b").unwrap();

        assert!(matches!(
            rename_no_clobber(&a, &b),
            Err(Error::RenameCollision { .. })
        ));
        assert_eq!(fs::read_to_string(&b).unwrap(), "b");
        rename_no_clobber(&a, &a).unwrap();
        assert!(a.exists());
    }

    #[test]
    fn test_hard_rename_prefixes_matching_files() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("one.bag"), "").unwrap();
        fs::write(dir.path().join("two.bag"), "").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested/three.bag"), "").unwrap();

        let renamed = hard_rename(
            dir.path(),
            "bag",
            "remus",
            "casper",
            &VehicleCatalog::default(),
        )
        .unwrap();

        assert_eq!(renamed.len(), 2);
        assert!(dir.path().join("remus_casper_one.bag").exists());
        assert!(dir.path().join("remus_casper_two.bag").exists());
        assert!(dir.path().join("notes.txt").exists());
        assert!(dir.path().join("nested/three.bag").exists());
    }
}
