// Stats persistence module
pub mod document;
pub mod json_store;
pub mod lock;
pub mod migrations;

// Re-export key types for easier access
pub use document::{Aggregate, StatsDocument, StatsSummary};
pub use json_store::{LoadStatus, StatsStore};
