use super::{TagError, TagSet, TagValue};
use crate::recording::RecordingSource;
use std::collections::BTreeSet;

pub const STATUS_CHANNEL: &str = "/status";

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// REMUS status-channel tags: `mission state`, `max depth`, `mission modes`.
///
/// `mission state` comes from the first sample only and is assumed constant
/// for the whole recording; it is not re-checked against later samples.
pub fn status_tags(recording: &dyn RecordingSource) -> Result<TagSet, TagError> {
    let samples = recording.read_channel(STATUS_CHANNEL)?;
    let first = samples
        .first()
        .ok_or_else(|| TagError::EmptyChannel(STATUS_CHANNEL.to_string()))?;

    let bad_field = |field: &str| TagError::BadField {
        channel: STATUS_CHANNEL.to_string(),
        field: field.to_string(),
    };

    let in_mission = first
        .value
        .field("in_mission")
        .and_then(|v| v.as_bool())
        .ok_or_else(|| bad_field("in_mission"))?;

    let mut max_depth = f64::NEG_INFINITY;
    let mut modes = BTreeSet::new();
    for sample in &samples {
        let depth = sample
            .value
            .field("depth")
            .and_then(|v| v.as_f64())
            .ok_or_else(|| bad_field("depth"))?;
        max_depth = max_depth.max(round2(depth));

        let mode = sample
            .value
            .field("mission_mode")
            .ok_or_else(|| bad_field("mission_mode"))?;
        modes.insert(mode.to_string());
    }

    let mut tags = TagSet::new();
    tags.insert("mission state", TagValue::Flag(in_mission));
    tags.insert("max depth", TagValue::Number(max_depth));
    tags.insert("mission modes", TagValue::Set(modes));
    Ok(tags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bag::{BagError, Message, RosTime, Value};
    use std::path::{Path, PathBuf};

    struct StatusRecording {
        path: PathBuf,
        samples: Vec<Message>,
    }

    impl RecordingSource for StatusRecording {
        fn location(&self) -> &Path {
            &self.path
        }
        fn start_time(&self) -> Result<RosTime, BagError> {
            Ok(RosTime::new(1, 0))
        }
        fn end_time(&self) -> Result<RosTime, BagError> {
            Ok(RosTime::new(2, 0))
        }
        fn content_signals(&self) -> BTreeSet<String> {
            BTreeSet::new()
        }
        fn read_channel(&self, channel: &str) -> Result<Vec<Message>, BagError> {
            assert_eq!(channel, STATUS_CHANNEL);
            Ok(self.samples.clone())
        }
    }

    fn status(in_mission: bool, depth: f64, mode: &str) -> Message {
        Message {
            time: RosTime::default(),
            value: Value::Message(vec![
                ("in_mission".to_string(), Value::Bool(in_mission)),
                ("depth".to_string(), Value::Float(depth)),
                ("mission_mode".to_string(), Value::String(mode.to_string())),
            ]),
        }
    }

    fn recording(samples: Vec<Message>) -> StatusRecording {
        StatusRecording {
            path: PathBuf::from("remus_shadow_2024-01-01-00-00-00.bag"),
            samples,
        }
    }

    #[test]
    fn test_status_tags() {
        let rec = recording(vec![
            status(true, 1.004, "descend"),
            status(false, 12.346, "survey"),
            status(true, 3.0, "survey"),
        ]);
        let tags = status_tags(&rec).unwrap();

        assert_eq!(tags.get("mission state"), Some(&TagValue::Flag(true)));
        assert_eq!(tags.get("max depth"), Some(&TagValue::Number(12.35)));
        assert_eq!(
            tags.get("mission modes"),
            Some(&TagValue::Set(
                ["descend".to_string(), "survey".to_string()].into()
            ))
        );
    }

    #[test]
    fn test_mission_state_reads_first_sample_only() {
        let rec = recording(vec![status(false, 1.0, "idle"), status(true, 2.0, "survey")]);
        let tags = status_tags(&rec).unwrap();
        assert_eq!(tags.get("mission state"), Some(&TagValue::Flag(false)));
    }

    #[test]
    fn test_empty_status_channel_is_an_error() {
        let rec = recording(Vec::new());
        assert!(matches!(status_tags(&rec), Err(TagError::EmptyChannel(_))));
    }

    #[test]
    fn test_missing_depth_field() {
        let mut sample = status(true, 1.0, "idle");
        if let Value::Message(fields) = &mut sample.value {
            fields.retain(|(name, _)| name != "depth");
        }
        let rec = recording(vec![sample]);
        match status_tags(&rec) {
            Err(TagError::BadField { field, .. }) => assert_eq!(field, "depth"),
            other => panic!("expected BadField, got {:?}", other),
        }
    }
}
