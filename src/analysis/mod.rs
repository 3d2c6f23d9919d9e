// Analysis module: retention, recording and querying of compression stats
pub mod query;
pub mod recorder;
pub mod retention;
pub mod tokens;

// Re-export key types for easier access
pub use query::{
    ModelBreakdown, Period, QueryEngine, QueryParams, QueryResult, QuerySummary, TimeWindow,
};
pub use recorder::{CompressionEvent, CompressionRecorder};
pub use retention::{RetentionReport, enforce};
pub use tokens::{Cl100kCounter, TokenCounter};
