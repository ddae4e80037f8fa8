use crate::bag::{encode_string_message, Bag, BagError, Message, RosTime, STRING_MESSAGE};
use std::collections::BTreeSet;
use std::path::Path;

/// Read access to a recording, as needed by identification and tagging.
pub trait RecordingSource {
    fn location(&self) -> &Path;
    fn start_time(&self) -> Result<RosTime, BagError>;
    fn end_time(&self) -> Result<RosTime, BagError>;
    /// Distinct message types present; used to fingerprint the vehicle type.
    fn content_signals(&self) -> BTreeSet<String>;
    fn read_channel(&self, channel: &str) -> Result<Vec<Message>, BagError>;
}

/// Append access for publishing metadata.
pub trait RecordingWriter: RecordingSource {
    fn append_text(&mut self, channel: &str, time: RosTime, text: &str) -> Result<(), BagError>;
}

impl RecordingSource for Bag {
    fn location(&self) -> &Path {
        self.path()
    }

    fn start_time(&self) -> Result<RosTime, BagError> {
        Bag::start_time(self)
    }

    fn end_time(&self) -> Result<RosTime, BagError> {
        Bag::end_time(self)
    }

    fn content_signals(&self) -> BTreeSet<String> {
        self.message_types()
    }

    fn read_channel(&self, channel: &str) -> Result<Vec<Message>, BagError> {
        self.read_messages(channel)
    }
}

impl RecordingWriter for Bag {
    fn append_text(&mut self, channel: &str, time: RosTime, text: &str) -> Result<(), BagError> {
        self.append(channel, &STRING_MESSAGE, time, encode_string_message(text))
    }
}
