pub mod api;
pub mod bundle;
pub mod config;
pub mod error;
pub mod project;
pub mod storage;
pub mod todo;
pub mod utils;

pub use bundle::ExportBundle;
pub use error::SyncError;
