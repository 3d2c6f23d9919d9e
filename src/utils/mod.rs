// Utility functions module
pub mod clock;
pub mod date_parse;

// Re-export for easy access
pub use clock::Clock;
pub use date_parse::{parse_flexible_date, parse_optional_date};
