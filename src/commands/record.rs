// Record command: store one compression event
use crate::analysis::{Cl100kCounter, CompressionRecorder};
use crate::commands::handle_error;
use crate::config::Config;
use crate::models::{CompressionLevel, CompressionRecord, LlmDetector};
use crate::output::OutputFormat;
use crate::storage::StatsStore;
use anyhow::Context;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

pub struct RecordOptions {
    pub path: String,
    pub compressed_file: PathBuf,
    pub original_file: Option<PathBuf>,
    pub level: String,
    pub format: String,
}

pub async fn handle_record_command(
    options: RecordOptions,
    config: &Config,
    json_output: bool,
) -> anyhow::Result<()> {
    let record = match record_compression(options).await {
        Ok(record) => record,
        Err(e) => {
            handle_error("Failed to record compression", &format!("{e:#}"), json_output);
            return Err(e);
        }
    };

    if json_output {
        println!("{}", record.to_json()?);
    } else {
        println!("Recorded compression of {}", record.path);
        println!(
            "{}",
            record.to_table_with_options(config.output.decimal_places, config.output.unicode)
        );
    }
    Ok(())
}

async fn record_compression(options: RecordOptions) -> anyhow::Result<CompressionRecord> {
    let level: CompressionLevel = options.level.parse()?;
    let compressed = fs::read_to_string(&options.compressed_file).with_context(|| {
        format!(
            "Failed to read compressed output: {}",
            options.compressed_file.display()
        )
    })?;

    let detector = LlmDetector::from_environment();
    let recorder = CompressionRecorder::new(
        StatsStore::at_default_path()?,
        Arc::new(detector),
        Arc::new(Cl100kCounter),
    );

    let record = match options.original_file {
        Some(original_file) => {
            recorder
                .record_with_reader(
                    &options.path,
                    || fs::read_to_string(&original_file),
                    &compressed,
                    level,
                    &options.format,
                )
                .await?
        }
        None => {
            recorder
                .record_compression_with_estimation(
                    &options.path,
                    &compressed,
                    level,
                    &options.format,
                )
                .await?
        }
    };
    Ok(record)
}
