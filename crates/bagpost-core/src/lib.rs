pub mod archive;
pub mod bag;
pub mod catalog;
pub mod config;
pub mod driver;
pub mod error;
pub mod identify;
pub mod naming;
pub mod progress;
pub mod recording;
pub mod rename;
pub mod scanner;
pub mod tags;

pub use config::AppConfig;
pub use driver::{BatchSummary, SkipReason, UploadDriver, UploadOutcome};
pub use error::Error;
pub use progress::{ProgressReporter, SilentReporter};
