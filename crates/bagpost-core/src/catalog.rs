use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One vehicle family: the message type only it publishes, and its units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleType {
    pub vehicle_type: String,
    pub content_signal: String,
    pub names: Vec<String>,
}

impl VehicleType {
    pub fn has_name(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }
}

/// Known vehicle types, kept in configuration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VehicleCatalog {
    entries: Vec<VehicleType>,
}

impl Default for VehicleCatalog {
    fn default() -> Self {
        Self {
            entries: vec![
                VehicleType {
                    vehicle_type: "remus".to_string(),
                    content_signal: "ros_remus/Status".to_string(),
                    names: vec![
                        "shadow".to_string(),
                        "casper".to_string(),
                        "bullwinkle".to_string(),
                    ],
                },
                VehicleType {
                    vehicle_type: "buoy".to_string(),
                    content_signal: "ros_gwb/ScheduleStatus".to_string(),
                    names: vec![
                        "sugar".to_string(),
                        "skipper".to_string(),
                        "shrew".to_string(),
                    ],
                },
            ],
        }
    }
}

impl VehicleCatalog {
    pub fn new(entries: Vec<VehicleType>) -> Result<Self, Error> {
        let catalog = Self { entries };
        catalog.validate()?;
        Ok(catalog)
    }

    /// Type keys and content signals must be unique; names must be usable
    /// as filename segments.
    pub fn validate(&self) -> Result<(), Error> {
        let mut types = HashSet::new();
        let mut signals = HashSet::new();

        for entry in &self.entries {
            if entry.vehicle_type.is_empty() || entry.vehicle_type.contains('_') {
                return Err(Error::Catalog(format!(
                    "invalid vehicle type '{}'",
                    entry.vehicle_type
                )));
            }
            if !types.insert(entry.vehicle_type.as_str()) {
                return Err(Error::Catalog(format!(
                    "duplicate vehicle type '{}'",
                    entry.vehicle_type
                )));
            }
            if !signals.insert(entry.content_signal.as_str()) {
                return Err(Error::Catalog(format!(
                    "content signal '{}' is shared by more than one vehicle type",
                    entry.content_signal
                )));
            }
            if let Some(bad) = entry
                .names
                .iter()
                .find(|n| n.is_empty() || n.contains('_'))
            {
                return Err(Error::Catalog(format!(
                    "invalid vehicle name '{}' for type '{}'",
                    bad, entry.vehicle_type
                )));
            }
        }
        Ok(())
    }

    pub fn get(&self, vehicle_type: &str) -> Option<&VehicleType> {
        self.entries.iter().find(|e| e.vehicle_type == vehicle_type)
    }

    pub fn iter(&self) -> impl Iterator<Item = &VehicleType> {
        self.entries.iter()
    }

    /// True when `name` is a registered unit of `vehicle_type`.
    pub fn is_known(&self, vehicle_type: &str, name: &str) -> bool {
        self.get(vehicle_type).is_some_and(|e| e.has_name(name))
    }

    /// Vehicle type whose unit list contains `name`. The last matching
    /// entry wins when a name is registered under several types.
    pub fn type_of_name(&self, name: &str) -> Option<&VehicleType> {
        self.entries.iter().rev().find(|e| e.has_name(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(t: &str, signal: &str, names: &[&str]) -> VehicleType {
        VehicleType {
            vehicle_type: t.to_string(),
            content_signal: signal.to_string(),
            names: names.iter().map(|n| n.to_string()).collect(),
        }
    }

    #[test]
    fn test_default_catalog_is_valid() {
        let catalog = VehicleCatalog::default();
        catalog.validate().unwrap();
        assert!(catalog.is_known("remus", "shadow"));
        assert!(catalog.is_known("buoy", "shrew"));
        assert!(!catalog.is_known("remus", "sugar"));
        assert!(!catalog.is_known("glider", "shadow"));
    }

    #[test]
    fn test_duplicate_content_signal_rejected() {
        let result = VehicleCatalog::new(vec![
            entry("remus", "ros_remus/Status", &["shadow"]),
            entry("iver", "ros_remus/Status", &["blue"]),
        ]);
        assert!(matches!(result, Err(Error::Catalog(_))));
    }

    #[test]
    fn test_duplicate_type_rejected() {
        let result = VehicleCatalog::new(vec![
            entry("remus", "a/A", &["shadow"]),
            entry("remus", "b/B", &["casper"]),
        ]);
        assert!(matches!(result, Err(Error::Catalog(_))));
    }

    #[test]
    fn test_separator_in_name_rejected() {
        let result = VehicleCatalog::new(vec![entry("remus", "a/A", &["big_shadow"])]);
        assert!(matches!(result, Err(Error::Catalog(_))));
    }

    #[test]
    fn test_type_of_name() {
        let catalog = VehicleCatalog::default();
        assert_eq!(
            catalog.type_of_name("skipper").map(|e| e.vehicle_type.as_str()),
            Some("buoy")
        );
        assert!(catalog.type_of_name("remus").is_none());
    }
}
