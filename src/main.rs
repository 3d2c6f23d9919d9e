// compstats: compression usage and cost-savings tracker
use clap::Parser;
use compstats::cli::{Cli, Commands};
use compstats::commands::record::RecordOptions;
use compstats::commands::stats::StatsOptions;
use compstats::commands::{handle_config_action, handle_record_command, handle_stats_command};
use compstats::config::Config;
use tracing_subscriber::EnvFilter;

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("COMPSTATS_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    // An unusable config never blocks recording or querying;
    // `config show/set` load it strictly on their own.
    let config = Config::load_default_lenient();

    // CLI flag takes precedence over the configured format
    let json_output = cli.json || config.output.format == "json";

    let result = match cli.command {
        Some(Commands::Stats {
            period,
            days,
            since,
            until,
            details,
            limit,
        }) => {
            let options = StatsOptions {
                period,
                days,
                since,
                until,
                details,
                limit,
            };
            handle_stats_command(options, &config, json_output).await
        }
        Some(Commands::Record {
            path,
            compressed_file,
            original_file,
            level,
            format,
        }) => {
            let options = RecordOptions {
                path,
                compressed_file,
                original_file,
                level,
                format,
            };
            handle_record_command(options, &config, json_output).await
        }
        Some(Commands::Config { action }) => handle_config_action(action, json_output),
        None => {
            let options = StatsOptions {
                period: None,
                days: None,
                since: None,
                until: None,
                details: false,
                limit: None,
            };
            handle_stats_command(options, &config, json_output).await
        }
    };

    if result.is_err() {
        std::process::exit(1);
    }
}
