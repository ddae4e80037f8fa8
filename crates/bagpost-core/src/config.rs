use crate::catalog::VehicleCatalog;
use crate::error::Error;
use config::{Config, Environment, File as ConfigFile};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_BASE_URL: &str = "http://128.128.231.113:8080";

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// Archive web root; uploads go to `{base_url}/bags/upload`.
    pub base_url: String,
    /// Descend into subdirectories of `scan_root`.
    pub recursive: bool,
    /// Log to file only.
    pub quiet: bool,
    pub scan_root: PathBuf,
    /// Recording file extension, without the dot.
    pub extension: String,
    /// Subdirectory that archived recordings are moved into. Its presence in a
    /// path marks a recording as already processed.
    pub completed_dir: String,
    pub log_file: String,
    pub ignore_patterns: Vec<String>,
    pub vehicles: VehicleCatalog,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            recursive: false,
            quiet: false,
            scan_root: PathBuf::from("."),
            extension: "bag".to_string(),
            completed_dir: "uploaded".to_string(),
            log_file: "log.txt".to_string(),
            ignore_patterns: Vec::new(),
            vehicles: VehicleCatalog::default(),
        }
    }
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), Error> {
        self.vehicles.validate()?;
        if self.completed_dir.is_empty() || self.completed_dir.contains(['/', '\\']) {
            return Err(Error::Other(format!(
                "completed_dir '{}' must be a single directory name",
                self.completed_dir
            )));
        }
        if self.extension.starts_with('.') {
            return Err(Error::Other(format!(
                "extension '{}' must not start with '.'",
                self.extension
            )));
        }
        Ok(())
    }
}

/// `Config.toml` in the working directory (optional), then `BAGPOST_*`
/// environment variables.
pub fn load_configuration() -> Result<AppConfig, Error> {
    load_configuration_from("Config")
}

pub fn load_configuration_from(name: &str) -> Result<AppConfig, Error> {
    let builder = Config::builder()
        .add_source(ConfigFile::with_name(name).required(false))
        .add_source(Environment::with_prefix("BAGPOST").try_parsing(true))
        .build()?;
    let config = builder.try_deserialize::<AppConfig>()?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let name = dir.path().join("Absent");
        let config = load_configuration_from(name.to_str().unwrap()).unwrap();
        assert_eq!(config.completed_dir, "uploaded");
        assert_eq!(config.extension, "bag");
        assert!(config.vehicles.is_known("remus", "bullwinkle"));
    }

    #[test]
    fn test_file_overrides_and_catalog() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("Custom.toml");
        fs::write(
            &path,
            r#"
base_url = "http://archive.local:8080"
recursive = true

[[vehicles]]
vehicle_type = "glider"
content_signal = "glider_msgs/Status"
names = ["wanda"]
"#,
        )
        .unwrap();

        let name = dir.path().join("Custom");
        let config = load_configuration_from(name.to_str().unwrap()).unwrap();
        assert_eq!(config.base_url, "http://archive.local:8080");
        assert!(config.recursive);
        assert!(!config.quiet);
        assert!(config.vehicles.is_known("glider", "wanda"));
        assert!(config.vehicles.get("remus").is_none());
    }

    #[test]
    fn test_invalid_catalog_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("Dup.toml");
        fs::write(
            &path,
            r#"
[[vehicles]]
vehicle_type = "a"
content_signal = "same/Type"
names = ["x"]

[[vehicles]]
vehicle_type = "b"
content_signal = "same/Type"
names = ["y"]
"#,
        )
        .unwrap();

        let name = dir.path().join("Dup");
        assert!(matches!(
            load_configuration_from(name.to_str().unwrap()),
            Err(Error::Catalog(_))
        ));
    }

    #[test]
    fn test_completed_dir_must_be_a_name() {
        let config = AppConfig {
            completed_dir: "a/b".to_string(),
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
