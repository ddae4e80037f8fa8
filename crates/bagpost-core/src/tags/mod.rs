//! Descriptive tags derived from a recording's canonical name and contents.

pub mod publish;
pub mod remus;

pub use publish::{publish_tags, METADATA_CHANNEL};

use crate::bag::BagError;
use crate::naming::{self, SEPARATOR};
use crate::recording::RecordingSource;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use thiserror::Error;
use tracing::{debug, info};

/// Recoverable tagging failures. The recording is left unmoved and
/// unuploaded; none of these abort a batch.
#[derive(Error, Debug)]
pub enum TagError {
    #[error("filename '{0}' does not carry vehicle type and name segments")]
    BadFileName(String),

    #[error("channel '{0}' is absent or has no samples")]
    EmptyChannel(String),

    #[error("channel '{channel}' sample has no usable '{field}' field")]
    BadField { channel: String, field: String },

    #[error(transparent)]
    Bag(#[from] BagError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TagValue {
    Text(String),
    Number(f64),
    Flag(bool),
    Set(BTreeSet<String>),
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagValue::Text(s) => f.write_str(s),
            TagValue::Number(n) => write!(f, "{:?}", n),
            TagValue::Flag(b) => write!(f, "{}", b),
            TagValue::Set(items) => {
                let joined: Vec<&str> = items.iter().map(String::as_str).collect();
                write!(f, "{{{}}}", joined.join(", "))
            }
        }
    }
}

impl From<&str> for TagValue {
    fn from(s: &str) -> Self {
        TagValue::Text(s.to_string())
    }
}

impl From<String> for TagValue {
    fn from(s: String) -> Self {
        TagValue::Text(s)
    }
}

/// Insertion-ordered tag mapping. Re-inserting a key replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagSet {
    entries: Vec<(String, TagValue)>,
}

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: &str, value: impl Into<TagValue>) {
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key.to_string(), value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&TagValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn extend(&mut self, other: TagSet) {
        for (key, value) in other.entries {
            self.insert(&key, value);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TagValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Newline-separated `key:value` lines, trailing whitespace trimmed.
    pub fn to_metadata_text(&self) -> String {
        let mut text = String::new();
        for (key, value) in self.iter() {
            text.push_str(&format!("{}:{}\n", key, value));
        }
        text.trim_end().to_string()
    }
}

/// Extra tags for one vehicle type, computed from recording contents only.
pub type VehicleTagger = fn(&dyn RecordingSource) -> Result<TagSet, TagError>;

/// Universal tags plus a per-vehicle-type extension registry.
pub struct TagGenerator {
    taggers: HashMap<String, VehicleTagger>,
}

impl Default for TagGenerator {
    fn default() -> Self {
        let mut generator = Self::empty();
        generator.register("remus", remus::status_tags);
        generator
    }
}

impl TagGenerator {
    /// A generator with no vehicle-specific taggers.
    pub fn empty() -> Self {
        Self {
            taggers: HashMap::new(),
        }
    }

    pub fn register(&mut self, vehicle_type: &str, tagger: VehicleTagger) {
        self.taggers.insert(vehicle_type.to_string(), tagger);
    }

    pub fn has_tagger(&self, vehicle_type: &str) -> bool {
        self.taggers.contains_key(vehicle_type)
    }

    /// `vehicle`, `name`, `date/time` and `year` for every recording, then
    /// whatever the vehicle type's tagger contributes (nothing by default).
    pub fn generate(&self, recording: &dyn RecordingSource) -> Result<TagSet, TagError> {
        let file_name = recording
            .location()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        info!("Generating tags for {}", file_name);

        let mut segments = file_name.split(SEPARATOR);
        let (vehicle, name) = match (segments.next(), segments.next()) {
            (Some(vehicle), Some(name)) => (vehicle.to_string(), name.to_string()),
            _ => return Err(TagError::BadFileName(file_name)),
        };

        let date_time = naming::timestamp_token(recording.start_time()?);
        let year: String = date_time.chars().take(4).collect();

        let mut tags = TagSet::new();
        tags.insert("vehicle", vehicle.as_str());
        tags.insert("name", name);
        tags.insert("date/time", date_time);
        tags.insert("year", year);

        if let Some(tagger) = self.taggers.get(&vehicle) {
            debug!("Applying '{}' tagger", vehicle);
            tags.extend(tagger(recording)?);
        }

        Ok(tags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bag::{BagError, Message, RosTime, Value};
    use std::path::{Path, PathBuf};

    struct NamedRecording {
        path: PathBuf,
        start: RosTime,
        status: Vec<Message>,
    }

    impl NamedRecording {
        fn new(path: &str) -> Self {
            Self {
                path: PathBuf::from(path),
                start: RosTime::new(1_700_000_000, 999_000_000),
                status: Vec::new(),
            }
        }
    }

    impl RecordingSource for NamedRecording {
        fn location(&self) -> &Path {
            &self.path
        }
        fn start_time(&self) -> Result<RosTime, BagError> {
            Ok(self.start)
        }
        fn end_time(&self) -> Result<RosTime, BagError> {
            Ok(RosTime::new(self.start.sec + 60, 0))
        }
        fn content_signals(&self) -> BTreeSet<String> {
            BTreeSet::new()
        }
        fn read_channel(&self, channel: &str) -> Result<Vec<Message>, BagError> {
            assert_eq!(channel, remus::STATUS_CHANNEL);
            Ok(self.status.clone())
        }
    }

    fn keys(tags: &TagSet) -> Vec<&str> {
        tags.iter().map(|(k, _)| k).collect()
    }

    #[test]
    fn test_universal_tags_for_type_without_tagger() {
        let rec = NamedRecording::new("/data/buoy_sugar_2023-11-14-22-13-20.bag");
        let tags = TagGenerator::default().generate(&rec).unwrap();

        let date_time = naming::timestamp_token(rec.start);
        assert_eq!(keys(&tags), vec!["vehicle", "name", "date/time", "year"]);
        assert_eq!(tags.get("vehicle"), Some(&TagValue::from("buoy")));
        assert_eq!(tags.get("name"), Some(&TagValue::from("sugar")));
        assert_eq!(tags.get("date/time"), Some(&TagValue::Text(date_time.clone())));
        assert_eq!(tags.get("year"), Some(&TagValue::Text(date_time[..4].to_string())));
    }

    #[test]
    fn test_registered_tagger_extends_universal_tags() {
        let mut rec = NamedRecording::new("/data/remus_casper_msn2_2023-11-14-22-13-20.bag");
        rec.status = vec![Message {
            time: rec.start,
            value: Value::Message(vec![
                ("in_mission".to_string(), Value::Bool(true)),
                ("depth".to_string(), Value::Float(3.0)),
                ("mission_mode".to_string(), Value::String("survey".to_string())),
            ]),
        }];
        let tags = TagGenerator::default().generate(&rec).unwrap();

        assert_eq!(
            keys(&tags),
            vec![
                "vehicle",
                "name",
                "date/time",
                "year",
                "mission state",
                "max depth",
                "mission modes"
            ]
        );
        assert!(tags.to_metadata_text().contains("max depth:3.0\n"));
    }

    #[test]
    fn test_filename_without_name_segment_is_rejected() {
        let rec = NamedRecording::new("/data/recording.bag");
        assert!(matches!(
            TagGenerator::empty().generate(&rec),
            Err(TagError::BadFileName(_))
        ));
    }

    #[test]
    fn test_whole_numbers_keep_decimal_point() {
        assert_eq!(TagValue::Number(3.0).to_string(), "3.0");
        assert_eq!(TagValue::Number(12.35).to_string(), "12.35");
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let mut tags = TagSet::new();
        tags.insert("a", "1");
        tags.insert("b", "2");
        tags.insert("a", "3");
        let keys: Vec<&str> = tags.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(tags.get("a"), Some(&TagValue::Text("3".into())));
    }

    #[test]
    fn test_metadata_text_format() {
        let mut tags = TagSet::new();
        tags.insert("vehicle", "remus");
        tags.insert("max depth", TagValue::Number(12.35));
        tags.insert("mission state", TagValue::Flag(true));
        tags.insert(
            "mission modes",
            TagValue::Set(["survey".to_string(), "idle".to_string()].into()),
        );
        tags.insert("note", "trailing   ");

        assert_eq!(
            tags.to_metadata_text(),
            "vehicle:remus\nmax depth:12.35\nmission state:true\nmission modes:{idle, survey}\nnote:trailing"
        );
    }

    #[test]
    fn test_registry_defaults() {
        let generator = TagGenerator::default();
        assert!(generator.has_tagger("remus"));
        assert!(!generator.has_tagger("buoy"));
        assert!(!TagGenerator::empty().has_tagger("remus"));
    }
}
