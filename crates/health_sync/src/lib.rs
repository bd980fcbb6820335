//! Daily health-data export: pulls yesterday's records from the tracker
//! APIs and uploads them to object storage.

pub mod error;
pub mod runner;
pub mod settings;
pub mod storage;

pub use error::{SyncError, SyncResult};
pub use runner::{Clients, RunReport, Runner};
pub use settings::RunSettings;
