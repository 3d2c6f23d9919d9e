// Command handlers module
pub mod config;
pub mod record;
pub mod stats;

// Re-export command handlers for easy access
pub use config::handle_config_action;
pub use record::handle_record_command;
pub use stats::handle_stats_command;

/// Report a failed command on stdout (JSON) or stderr (text).
pub fn handle_error(message: &str, err: &dyn std::fmt::Display, json_output: bool) {
    if json_output {
        println!(
            "{}",
            serde_json::json!({
                "status": "error",
                "message": format!("{message}: {err}"),
            })
        );
    } else {
        eprintln!("Error: {message}: {err}");
    }
}
