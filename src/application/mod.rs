pub mod download_coordinator;
pub mod progress_tracker;

pub use download_coordinator::DownloadCoordinator;
pub use progress_tracker::MessageSource;
