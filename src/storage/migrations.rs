use crate::analysis::retention;
use crate::models::record::{CompressionLevel, CompressionRecord, COST_CURRENCY};
use crate::storage::document::StatsDocument;
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Pre-tier stats file: one undifferentiated list of records and no version.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum LegacyStats {
    Flat(Vec<LegacyRecord>),
    Wrapped { compressions: Vec<LegacyRecord> },
}

impl LegacyStats {
    pub fn into_records(self) -> Vec<LegacyRecord> {
        match self {
            LegacyStats::Flat(records) => records,
            LegacyStats::Wrapped { compressions } => compressions,
        }
    }
}

/// A record as written by the legacy format. Derived fields are ignored and
/// recomputed from the token counts.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyRecord {
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub path: String,
    pub original_tokens: u64,
    pub compressed_tokens: u64,
    #[serde(default = "default_level")]
    pub level: CompressionLevel,
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default)]
    pub estimated: bool,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub client: Option<String>,
    #[serde(default)]
    pub price_per_m_tok: Option<f64>,
    #[serde(rename = "costSavingsUSD", default)]
    pub cost_savings_usd: Option<f64>,
}

fn default_level() -> CompressionLevel {
    CompressionLevel::Full
}

fn default_format() -> String {
    "text".to_string()
}

impl LegacyRecord {
    pub fn into_record(self) -> CompressionRecord {
        let mut record = CompressionRecord::new(
            self.timestamp,
            self.path,
            self.original_tokens,
            self.compressed_tokens,
            self.level,
            self.format,
        );
        record.estimated = self.estimated;

        // Cost fields only come across as a complete block.
        if let (Some(model), Some(cost)) = (self.model, self.cost_savings_usd) {
            record.model = Some(model);
            record.client = Some(self.client.unwrap_or_else(|| "unknown".to_string()));
            record.price_per_m_tok = self.price_per_m_tok;
            record.cost_savings_usd = Some(cost);
            record.currency = Some(COST_CURRENCY.to_string());
        }
        record
    }
}

/// Build a tiered document from legacy records.
///
/// Every record is appended as if it had just been recorded, the summary is
/// rebuilt from scratch, and one retention pass places each record in the
/// tier its age calls for.
pub fn migrate_legacy(records: Vec<LegacyRecord>, now: DateTime<Utc>) -> StatsDocument {
    let mut records: Vec<CompressionRecord> =
        records.into_iter().map(LegacyRecord::into_record).collect();
    records.sort_by_key(|record| record.timestamp);

    let mut doc = StatsDocument::new();
    for record in records {
        doc.push_record(record);
    }

    retention::enforce(doc, now)
}
