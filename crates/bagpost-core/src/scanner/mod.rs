pub mod walk;

pub use walk::{discover_recordings, is_in_completed_dir};
