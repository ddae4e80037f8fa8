use super::{TagError, TagSet};
use crate::recording::RecordingWriter;
use tracing::{debug, info};

/// Reserved channel for appended tag records.
pub const METADATA_CHANNEL: &str = "/metadata";

/// Appends `tags` as one text record on the metadata channel, stamped with the
/// recording's own end time so its time range is unchanged.
///
/// The record only reaches disk when the writer is closed; callers own that.
pub fn publish_tags<W: RecordingWriter + ?Sized>(
    recording: &mut W,
    tags: &TagSet,
) -> Result<(), TagError> {
    let text = tags.to_metadata_text();
    debug!("Publishing metadata:\n{}", text);

    let end = recording.end_time()?;
    recording.append_text(METADATA_CHANNEL, end, &text)?;
    info!(
        "Tagged {} with {} tag(s)",
        recording.location().display(),
        tags.len()
    );
    Ok(())
}
