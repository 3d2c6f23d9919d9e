use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "compstats")]
#[command(about = "Compression usage and cost-savings tracker")]
#[command(version)]
pub struct Cli {
    /// Verbose output (debug logging on stderr)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// JSON output format
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show current configuration
    Show,
    /// Initialize fresh configuration
    Init,
    /// Set configuration value
    Set {
        /// Configuration key (e.g., pricing.model)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show compression statistics for a time window
    Stats {
        /// Preset window: all, today, week, month
        #[arg(long)]
        period: Option<String>,

        /// Last N days (1-365); takes priority over every other window option
        #[arg(long)]
        days: Option<i64>,

        /// Window start: YYYY-MM-DD, ISO date-time, today, now or -N[dwmy]
        #[arg(long, allow_hyphen_values = true)]
        since: Option<String>,

        /// Window end, same forms as --since (default: now)
        #[arg(long, allow_hyphen_values = true)]
        until: Option<String>,

        /// List individual compressions from the last 30 days
        #[arg(long)]
        details: bool,

        /// Maximum number of listed compressions (1-100)
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Record a compression performed by an external tool
    Record {
        /// Path of the compressed file or directory
        path: String,

        /// File holding the compressed output
        #[arg(long)]
        compressed_file: PathBuf,

        /// File holding the original content; estimated from the level when
        /// omitted or unreadable
        #[arg(long)]
        original_file: Option<PathBuf>,

        /// Compression level: minimal, signatures, full
        #[arg(long, default_value = "full")]
        level: String,

        /// Output format tag of the compressed text
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_stats_flags() {
        let cli = Cli::try_parse_from([
            "compstats", "stats", "--since", "-7d", "--details", "--limit", "5", "--json",
        ])
        .unwrap();
        assert!(cli.json);
        match cli.command {
            Some(Commands::Stats {
                since,
                until,
                details,
                limit,
                ..
            }) => {
                assert_eq!(since.as_deref(), Some("-7d"));
                assert!(until.is_none());
                assert!(details);
                assert_eq!(limit, Some(5));
            }
            _ => panic!("expected stats command"),
        }
    }

    #[test]
    fn test_parse_record_defaults() {
        let cli = Cli::try_parse_from([
            "compstats",
            "record",
            "src/",
            "--compressed-file",
            "/tmp/out.txt",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Record {
                path,
                original_file,
                level,
                format,
                ..
            }) => {
                assert_eq!(path, "src/");
                assert!(original_file.is_none());
                assert_eq!(level, "full");
                assert_eq!(format, "text");
            }
            _ => panic!("expected record command"),
        }
    }

    #[test]
    fn test_record_requires_compressed_file() {
        assert!(Cli::try_parse_from(["compstats", "record", "a.rs"]).is_err());
    }
}
