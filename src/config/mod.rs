// Configuration module
pub mod settings;

pub use settings::{Config, MAX_QUERY_LIMIT};
