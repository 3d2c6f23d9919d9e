use crate::models::record::CompressionRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const STATS_VERSION: &str = "2.0";

/// Records younger than this stay in `recent` with full detail.
pub const RECENT_DAYS: i64 = 30;
/// Daily aggregates are kept until their date is this old.
pub const DAILY_DAYS: i64 = 365;
/// Monthly aggregates are purged after this many (365-day) years.
pub const MONTHLY_YEARS: i64 = 5;

/// Summed numbers of a set of records. Used for both the daily (`YYYY-MM-DD`)
/// and monthly (`YYYY-MM`) tiers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Aggregate {
    pub count: u64,
    pub original_tokens: u64,
    pub compressed_tokens: u64,
    pub tokens_saved: i64,
    #[serde(
        rename = "costSavingsUSD",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub cost_savings_usd: Option<f64>,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub records_with_cost: u64,
}

pub type DailyAggregate = Aggregate;
pub type MonthlyAggregate = Aggregate;

fn is_zero(value: &u64) -> bool {
    *value == 0
}

impl Aggregate {
    pub fn add_record(&mut self, record: &CompressionRecord) {
        self.count += 1;
        self.original_tokens += record.original_tokens;
        self.compressed_tokens += record.compressed_tokens;
        self.tokens_saved += record.tokens_saved;
        if let Some(cost) = record.cost_savings_usd {
            *self.cost_savings_usd.get_or_insert(0.0) += cost;
            self.records_with_cost += 1;
        }
    }

    pub fn merge(&mut self, other: &Aggregate) {
        self.count += other.count;
        self.original_tokens += other.original_tokens;
        self.compressed_tokens += other.compressed_tokens;
        self.tokens_saved += other.tokens_saved;
        if let Some(cost) = other.cost_savings_usd {
            *self.cost_savings_usd.get_or_insert(0.0) += cost;
        }
        self.records_with_cost += other.records_with_cost;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSummary {
    pub total_compressions: u64,
    pub total_original_tokens: u64,
    pub total_compressed_tokens: u64,
    pub total_tokens_saved: i64,
}

impl StatsSummary {
    pub fn add_record(&mut self, record: &CompressionRecord) {
        self.total_compressions += 1;
        self.total_original_tokens += record.original_tokens;
        self.total_compressed_tokens += record.compressed_tokens;
        self.total_tokens_saved += record.tokens_saved;
    }

    pub fn add_aggregate(&mut self, aggregate: &Aggregate) {
        self.total_compressions += aggregate.count;
        self.total_original_tokens += aggregate.original_tokens;
        self.total_compressed_tokens += aggregate.compressed_tokens;
        self.total_tokens_saved += aggregate.tokens_saved;
    }

    /// Remove a purged aggregate from the totals.
    pub fn subtract_aggregate(&mut self, aggregate: &Aggregate) {
        self.total_compressions = self.total_compressions.saturating_sub(aggregate.count);
        self.total_original_tokens = self
            .total_original_tokens
            .saturating_sub(aggregate.original_tokens);
        self.total_compressed_tokens = self
            .total_compressed_tokens
            .saturating_sub(aggregate.compressed_tokens);
        self.total_tokens_saved -= aggregate.tokens_saved;
    }
}

/// The persisted, tiered stats document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsDocument {
    pub version: String,
    #[serde(default)]
    pub recent: Vec<CompressionRecord>,
    #[serde(default)]
    pub daily: BTreeMap<String, DailyAggregate>,
    #[serde(default)]
    pub monthly: BTreeMap<String, MonthlyAggregate>,
    #[serde(default)]
    pub summary: StatsSummary,
}

impl Default for StatsDocument {
    fn default() -> Self {
        Self {
            version: STATS_VERSION.to_string(),
            recent: Vec::new(),
            daily: BTreeMap::new(),
            monthly: BTreeMap::new(),
            summary: StatsSummary::default(),
        }
    }
}

impl StatsDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record to `recent` and add it to the running summary.
    pub fn push_record(&mut self, record: CompressionRecord) {
        self.summary.add_record(&record);
        self.recent.push(record);
    }

    /// Totals recomputed from the three tiers.
    pub fn tier_totals(&self) -> StatsSummary {
        let mut totals = StatsSummary::default();
        for record in &self.recent {
            totals.add_record(record);
        }
        for aggregate in self.daily.values().chain(self.monthly.values()) {
            totals.add_aggregate(aggregate);
        }
        totals
    }

    /// Total cost recorded across all tiers, `None` if nothing carries cost.
    pub fn tier_cost_total(&self) -> Option<f64> {
        let recent = self.recent.iter().filter_map(|r| r.cost_savings_usd);
        let aggregated = self
            .daily
            .values()
            .chain(self.monthly.values())
            .filter_map(|a| a.cost_savings_usd);
        recent.chain(aggregated).fold(None, |acc, cost| Some(acc.unwrap_or(0.0) + cost))
    }

    pub fn summary_matches_tiers(&self) -> bool {
        self.summary == self.tier_totals()
    }

    pub fn is_empty(&self) -> bool {
        self.recent.is_empty() && self.daily.is_empty() && self.monthly.is_empty()
    }
}

pub fn day_key(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d").to_string()
}

pub fn month_key(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y-%m").to_string()
}

/// `YYYY-MM` prefix of a `YYYY-MM-DD` key.
pub fn month_of_day_key(day_key: &str) -> String {
    day_key.get(..7).unwrap_or(day_key).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::record::CompressionLevel;
    use crate::models::pricing::CostSavings;
    use chrono::TimeZone;

    fn record(original: u64, compressed: u64, cost: Option<f64>) -> CompressionRecord {
        let ts = Utc.with_ymd_and_hms(2025, 4, 2, 10, 0, 0).unwrap();
        let record = CompressionRecord::new(ts, "a.rs", original, compressed, CompressionLevel::Full, "text");
        match cost {
            Some(cost_savings_usd) => record.with_cost(CostSavings {
                cost_savings_usd,
                model: "claude-sonnet-4".to_string(),
                client: "unknown".to_string(),
                price_per_m_tok: 3.0,
            }),
            None => record,
        }
    }

    #[test]
    fn test_keys() {
        let ts = Utc.with_ymd_and_hms(2025, 4, 2, 23, 59, 59).unwrap();
        assert_eq!(day_key(ts), "2025-04-02");
        assert_eq!(month_key(ts), "2025-04");
        assert_eq!(month_of_day_key("2025-04-02"), "2025-04");
    }

    #[test]
    fn test_aggregate_accumulates_records() {
        let mut aggregate = Aggregate::default();
        aggregate.add_record(&record(100, 40, Some(0.5)));
        aggregate.add_record(&record(50, 10, None));

        assert_eq!(aggregate.count, 2);
        assert_eq!(aggregate.original_tokens, 150);
        assert_eq!(aggregate.compressed_tokens, 50);
        assert_eq!(aggregate.tokens_saved, 100);
        assert_eq!(aggregate.cost_savings_usd, Some(0.5));
        assert_eq!(aggregate.records_with_cost, 1);
    }

    #[test]
    fn test_aggregate_without_cost_has_no_cost_field() {
        let mut aggregate = Aggregate::default();
        aggregate.add_record(&record(100, 40, None));
        let json = serde_json::to_value(&aggregate).unwrap();
        assert!(json.get("costSavingsUSD").is_none());
        assert!(json.get("recordsWithCost").is_none());
    }

    #[test]
    fn test_push_record_keeps_summary_in_sync() {
        let mut doc = StatsDocument::new();
        doc.push_record(record(1000, 200, None));
        doc.push_record(record(500, 100, Some(0.01)));

        assert_eq!(doc.summary.total_compressions, 2);
        assert_eq!(doc.summary.total_tokens_saved, 1200);
        assert!(doc.summary_matches_tiers());
        assert_eq!(doc.tier_cost_total(), Some(0.01));
    }

    #[test]
    fn test_document_json_shape() {
        let mut doc = StatsDocument::new();
        doc.push_record(record(10, 5, None));
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["version"], STATS_VERSION);
        assert!(json["recent"].is_array());
        assert!(json["daily"].is_object());
        assert!(json["monthly"].is_object());
        assert_eq!(json["summary"]["totalCompressions"], 1);
    }
}
