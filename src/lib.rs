// compstats library crate
// Exposes modules for the binary and integration testing

pub mod analysis;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod models;
pub mod output;
pub mod storage;
pub mod utils;

pub use error::{StatsError, StatsResult};
