pub mod database;
pub mod detector;
pub mod manager;

pub use database::{RecordStore, StoreLocation};
pub use detector::{BackendDescriptor, BackendKind, DatabaseDetector, IntegrityReport, recommend};
pub use manager::{DataManager, SyncOutcome};
