use crate::analysis::retention;
use crate::analysis::tokens::TokenCounter;
use crate::error::StatsResult;
use crate::models::detector::CostEstimator;
use crate::models::record::{CompressionLevel, CompressionRecord};
use crate::storage::StatsStore;
use crate::utils::Clock;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

/// One compression performed by the external tool.
#[derive(Debug, Clone)]
pub struct CompressionEvent {
    pub path: String,
    /// Original text, when the caller still has it.
    pub original: Option<String>,
    pub compressed: String,
    pub level: CompressionLevel,
    pub format: String,
}

/// Turns compression events into records and appends them to the stats file.
#[derive(Clone)]
pub struct CompressionRecorder {
    store: StatsStore,
    estimator: Arc<dyn CostEstimator>,
    counter: Arc<dyn TokenCounter>,
    clock: Clock,
}

impl CompressionRecorder {
    pub fn new(
        store: StatsStore,
        estimator: Arc<dyn CostEstimator>,
        counter: Arc<dyn TokenCounter>,
    ) -> Self {
        Self {
            store,
            estimator,
            counter,
            clock: Clock::System,
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &StatsStore {
        &self.store
    }

    /// Record a compression whose original text is known.
    pub async fn record_compression(
        &self,
        path: &str,
        original: &str,
        compressed: &str,
        level: CompressionLevel,
        format: &str,
    ) -> StatsResult<CompressionRecord> {
        let record = self.build_record(self.clock.now(), path, Some(original), compressed, level, format);
        self.append(vec![record.clone()]).await?;
        Ok(record)
    }

    /// Record a compression without the original text; the original token
    /// count is reconstructed from the level's estimation factor.
    pub async fn record_compression_with_estimation(
        &self,
        path: &str,
        compressed: &str,
        level: CompressionLevel,
        format: &str,
    ) -> StatsResult<CompressionRecord> {
        let record = self.build_record(self.clock.now(), path, None, compressed, level, format);
        self.append(vec![record.clone()]).await?;
        Ok(record)
    }

    /// Record a compression, reading the original through `read_original`.
    /// A failed read falls back to estimation.
    pub async fn record_with_reader<F>(
        &self,
        path: &str,
        read_original: F,
        compressed: &str,
        level: CompressionLevel,
        format: &str,
    ) -> StatsResult<CompressionRecord>
    where
        F: FnOnce() -> std::io::Result<String>,
    {
        match read_original() {
            Ok(original) => {
                self.record_compression(path, &original, compressed, level, format)
                    .await
            }
            Err(e) => {
                warn!("Cannot read original content of {path}, estimating instead: {e}");
                self.record_compression_with_estimation(path, compressed, level, format)
                    .await
            }
        }
    }

    /// Record several events with a single load/save of the stats file.
    pub async fn record_batch(
        &self,
        events: Vec<CompressionEvent>,
    ) -> StatsResult<Vec<CompressionRecord>> {
        if events.is_empty() {
            return Ok(Vec::new());
        }

        let now = self.clock.now();
        let records: Vec<CompressionRecord> = events
            .iter()
            .map(|event| {
                self.build_record(
                    now,
                    &event.path,
                    event.original.as_deref(),
                    &event.compressed,
                    event.level,
                    &event.format,
                )
            })
            .collect();

        self.append(records.clone()).await?;
        Ok(records)
    }

    /// Build a record, measuring the original when given and estimating it
    /// otherwise, then attach the cost block if pricing succeeds.
    pub fn build_record(
        &self,
        timestamp: DateTime<Utc>,
        path: &str,
        original: Option<&str>,
        compressed: &str,
        level: CompressionLevel,
        format: &str,
    ) -> CompressionRecord {
        let compressed_tokens = self.counter.count_tokens(compressed);

        let record = match original {
            Some(original) => {
                let original_tokens = self.counter.count_tokens(original);
                CompressionRecord::new(timestamp, path, original_tokens, compressed_tokens, level, format)
            }
            None => {
                let estimated_original =
                    (compressed_tokens as f64 * level.estimation_factor()).round() as u64;
                CompressionRecord::new(timestamp, path, estimated_original, compressed_tokens, level, format)
                    .mark_estimated()
            }
        };

        match self.estimator.estimate(record.tokens_saved) {
            Ok(cost) => record.with_cost(cost),
            Err(e) => {
                warn!("Cost calculation failed for {path}, recording without cost: {e:#}");
                record
            }
        }
    }

    /// Append under the file lock, apply retention and persist. File I/O
    /// runs on the blocking pool.
    async fn append(&self, records: Vec<CompressionRecord>) -> StatsResult<()> {
        let _guard = self.store.lock().await;
        let now = self.clock.now();
        let store = self.store.clone();
        let count = records.len();

        let total = tokio::task::spawn_blocking(move || -> StatsResult<u64> {
            let mut doc = store.load(now);
            for record in records {
                doc.push_record(record);
            }
            let doc = retention::enforce(doc, now);
            store.save(&doc)?;
            Ok(doc.summary.total_compressions)
        })
        .await??;

        debug!(records = count, total, "Compression recorded");
        Ok(())
    }
}
