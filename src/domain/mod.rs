pub mod error;
pub mod model;
pub mod progress;

pub use error::AppError;
pub use model::{DownloadRequest, HistoryEntry, JobHandle, StatusEvent, TrackerPhase};
pub use progress::{ParseError, ProgressSnapshot};
