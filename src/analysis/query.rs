use crate::analysis::retention;
use crate::config::MAX_QUERY_LIMIT;
use crate::error::{StatsError, StatsResult};
use crate::models::record::{CompressionRecord, round_to};
use crate::storage::document::{Aggregate, StatsDocument, day_key, month_key};
use crate::storage::{LoadStatus, StatsStore};
use crate::utils::{Clock, parse_flexible_date, parse_optional_date};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

pub const DEFAULT_QUERY_LIMIT: usize = 10;
pub const MAX_RELATIVE_DAYS: i64 = 365;

/// Fixed presets kept for callers that predate relative and explicit ranges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    #[default]
    All,
    Today,
    Week,
    Month,
}

impl Period {
    /// Window length in days; `None` is unbounded.
    pub fn days(&self) -> Option<i64> {
        match self {
            Period::All => None,
            Period::Today => Some(1),
            Period::Week => Some(7),
            Period::Month => Some(30),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Period::All => "all",
            Period::Today => "today",
            Period::Week => "week",
            Period::Month => "month",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = StatsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all" => Ok(Period::All),
            "today" => Ok(Period::Today),
            "week" => Ok(Period::Week),
            "month" => Ok(Period::Month),
            other => Err(StatsError::validation(format!(
                "Invalid period '{other}'. Must be 'all', 'today', 'week', or 'month'"
            ))),
        }
    }
}

/// Query parameters. The window is taken from the first of `relative_days`,
/// `start_date`/`end_date`, `period` that is set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryParams {
    pub relative_days: Option<i64>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub period: Option<Period>,
    pub include_details: bool,
    pub limit: Option<usize>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn relative_days(mut self, days: i64) -> Self {
        self.relative_days = Some(days);
        self
    }

    pub fn range(mut self, start: Option<&str>, end: Option<&str>) -> Self {
        self.start_date = start.map(str::to_string);
        self.end_date = end.map(str::to_string);
        self
    }

    pub fn period(mut self, period: Period) -> Self {
        self.period = Some(period);
        self
    }

    pub fn with_details(mut self, limit: Option<usize>) -> Self {
        self.include_details = true;
        self.limit = limit;
        self
    }
}

/// Resolved query window. A missing bound is unbounded on that side.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeWindow {
    #[serde(rename = "windowStart")]
    pub start: Option<DateTime<Utc>>,
    #[serde(rename = "windowEnd")]
    pub end: Option<DateTime<Utc>>,
    #[serde(rename = "windowLabel")]
    pub label: String,
}

impl TimeWindow {
    pub fn unbounded() -> Self {
        Self {
            start: None,
            end: None,
            label: "all time".to_string(),
        }
    }

    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        self.start.is_none_or(|start| timestamp >= start)
            && self.end.is_none_or(|end| timestamp <= end)
    }

    /// Whether a `YYYY-MM-DD` key lies within the window's dates.
    pub fn contains_day(&self, key: &str) -> bool {
        self.start.is_none_or(|start| key >= day_key(start).as_str())
            && self.end.is_none_or(|end| key <= day_key(end).as_str())
    }

    /// Whether a `YYYY-MM` key lies within the window's months.
    pub fn contains_month(&self, key: &str) -> bool {
        self.start.is_none_or(|start| key >= month_key(start).as_str())
            && self.end.is_none_or(|end| key <= month_key(end).as_str())
    }
}

/// Resolve the window described by `params` at `now`.
pub fn resolve_window(params: &QueryParams, now: DateTime<Utc>) -> StatsResult<TimeWindow> {
    if let Some(days) = params.relative_days {
        if !(1..=MAX_RELATIVE_DAYS).contains(&days) {
            return Err(StatsError::validation(format!(
                "relativeDays must be between 1 and {MAX_RELATIVE_DAYS}, got {days}"
            )));
        }
        return Ok(TimeWindow {
            start: Some(now - Duration::days(days)),
            end: Some(now),
            label: format!("last {days} days"),
        });
    }

    if params.start_date.is_some() || params.end_date.is_some() {
        let start = params
            .start_date
            .as_deref()
            .map(|expr| parse_flexible_date(expr, now))
            .transpose()?;
        let end = parse_optional_date(params.end_date.as_deref(), now)?;

        if let Some(start) = start {
            if start > end {
                return Err(StatsError::validation(format!(
                    "startDate ({}) is after endDate ({})",
                    start.to_rfc3339(),
                    end.to_rfc3339()
                )));
            }
        }

        let label = format!(
            "{} to {}",
            params.start_date.as_deref().unwrap_or("beginning"),
            params.end_date.as_deref().unwrap_or("now")
        );
        return Ok(TimeWindow {
            start,
            end: Some(end),
            label,
        });
    }

    let period = params.period.unwrap_or_default();
    Ok(match period.days() {
        Some(days) => TimeWindow {
            start: Some(now - Duration::days(days)),
            end: Some(now),
            label: period.to_string(),
        },
        None => TimeWindow::unbounded(),
    })
}

/// An explicit limit must be in range; the configured default is clamped.
fn resolve_limit(params: &QueryParams, default_limit: usize) -> StatsResult<usize> {
    match params.limit {
        Some(limit) if !(1..=MAX_QUERY_LIMIT).contains(&limit) => Err(StatsError::validation(
            format!("limit must be between 1 and {MAX_QUERY_LIMIT}, got {limit}"),
        )),
        Some(limit) => Ok(limit),
        None => Ok(default_limit.clamp(1, MAX_QUERY_LIMIT)),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuerySummary {
    pub total_compressions: u64,
    pub total_original_tokens: u64,
    pub total_compressed_tokens: u64,
    pub total_tokens_saved: i64,
    pub average_compression_ratio: f64,
    pub average_savings_percentage: f64,
    #[serde(rename = "totalCostSavingsUSD")]
    pub total_cost_savings_usd: f64,
    pub records_with_cost: u64,
    #[serde(rename = "averageCostPerCompressionUSD")]
    pub average_cost_per_compression: f64,
}

impl QuerySummary {
    fn add_aggregate(&mut self, aggregate: &Aggregate) {
        self.total_compressions += aggregate.count;
        self.total_original_tokens += aggregate.original_tokens;
        self.total_compressed_tokens += aggregate.compressed_tokens;
        self.total_tokens_saved += aggregate.tokens_saved;
        self.total_cost_savings_usd += aggregate.cost_savings_usd.unwrap_or(0.0);
        self.records_with_cost += aggregate.records_with_cost;
    }

    fn finish(mut self) -> Self {
        if self.total_original_tokens > 0 {
            let original = self.total_original_tokens as f64;
            self.average_compression_ratio =
                round_to(self.total_compressed_tokens as f64 / original, 3);
            self.average_savings_percentage =
                round_to(self.total_tokens_saved as f64 / original * 100.0, 1);
        }
        if self.records_with_cost > 0 {
            self.average_cost_per_compression = round_to(
                self.total_cost_savings_usd / self.records_with_cost as f64,
                4,
            );
        }
        self.total_cost_savings_usd = round_to(self.total_cost_savings_usd, 2);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelBreakdown {
    pub model: String,
    pub compressions: u64,
    pub tokens_saved: i64,
    #[serde(rename = "costSavingsUSD")]
    pub cost_savings_usd: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    #[serde(flatten)]
    pub window: TimeWindow,
    pub summary: QuerySummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_breakdown: Option<Vec<ModelBreakdown>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub records: Option<Vec<CompressionRecord>>,
}

/// Filter a document to a window and summarize it.
pub fn query_document(
    doc: &StatsDocument,
    window: TimeWindow,
    include_details: bool,
    limit: usize,
) -> QueryResult {
    let matching: Vec<&CompressionRecord> = doc
        .recent
        .iter()
        .filter(|record| window.contains(record.timestamp))
        .collect();

    let mut summary = QuerySummary::default();
    for record in &matching {
        let mut single = Aggregate::default();
        single.add_record(record);
        summary.add_aggregate(&single);
    }
    for (_, aggregate) in doc.daily.iter().filter(|(key, _)| window.contains_day(key)) {
        summary.add_aggregate(aggregate);
    }
    for (_, aggregate) in doc
        .monthly
        .iter()
        .filter(|(key, _)| window.contains_month(key))
    {
        summary.add_aggregate(aggregate);
    }

    let breakdown = model_breakdown(&matching);

    let records = include_details.then(|| {
        let mut records: Vec<CompressionRecord> = matching.iter().map(|r| (*r).clone()).collect();
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        records.truncate(limit);
        records
    });

    QueryResult {
        window,
        summary: summary.finish(),
        model_breakdown: (!breakdown.is_empty()).then_some(breakdown),
        records,
    }
}

/// Per-model totals over cost-bearing records, highest cost first.
pub fn model_breakdown(records: &[&CompressionRecord]) -> Vec<ModelBreakdown> {
    let mut by_model: HashMap<&str, ModelBreakdown> = HashMap::new();

    for record in records {
        let (Some(model), Some(cost)) = (record.model.as_deref(), record.cost_savings_usd) else {
            continue;
        };
        let entry = by_model.entry(model).or_insert_with(|| ModelBreakdown {
            model: model.to_string(),
            compressions: 0,
            tokens_saved: 0,
            cost_savings_usd: 0.0,
        });
        entry.compressions += 1;
        entry.tokens_saved += record.tokens_saved;
        entry.cost_savings_usd += cost;
    }

    let mut breakdown: Vec<ModelBreakdown> = by_model
        .into_values()
        .map(|mut entry| {
            entry.cost_savings_usd = round_to(entry.cost_savings_usd, 2);
            entry
        })
        .collect();
    breakdown.sort_by(|a, b| {
        b.cost_savings_usd
            .total_cmp(&a.cost_savings_usd)
            .then_with(|| a.model.cmp(&b.model))
    });
    breakdown
}

/// Answers time-window queries against the stats file.
#[derive(Debug, Clone)]
pub struct QueryEngine {
    store: StatsStore,
    clock: Clock,
    default_limit: usize,
}

impl QueryEngine {
    pub fn new(store: StatsStore) -> Self {
        Self {
            store,
            clock: Clock::System,
            default_limit: DEFAULT_QUERY_LIMIT,
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_default_limit(mut self, limit: usize) -> Self {
        self.default_limit = limit;
        self
    }

    /// Run a query. Parameters are validated before the stats file is
    /// touched, so a rejected query never has side effects.
    pub async fn query(&self, params: &QueryParams) -> StatsResult<QueryResult> {
        let now = self.clock.now();
        let window = resolve_window(params, now)?;
        let limit = resolve_limit(params, self.default_limit)?;

        let doc = {
            let _guard = self.store.lock().await;
            let store = self.store.clone();
            tokio::task::spawn_blocking(move || {
                let (doc, status) = store.load_with_status(now);
                if let LoadStatus::Migrated { records } = status {
                    match store.save(&doc) {
                        Ok(()) => debug!("Persisted migrated stats ({records} legacy records)"),
                        Err(e) => warn!("Could not persist migrated stats: {e}"),
                    }
                }
                doc
            })
            .await?
        };

        let doc = retention::enforce(doc, now);
        debug!(window = %window.label, "Running stats query");
        Ok(query_document(&doc, window, params.include_details, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::pricing::CostSavings;
    use crate::models::record::CompressionLevel;
    use crate::storage::json_store::STATS_FILE_NAME;
    use chrono::TimeZone;
    use std::fs;
    use tempfile::TempDir;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap()
    }

    fn record(days_ago: i64, saved: u64, cost: Option<(&str, f64)>) -> CompressionRecord {
        let record = CompressionRecord::new(
            now() - Duration::days(days_ago),
            format!("f{days_ago}.rs"),
            saved * 2,
            saved,
            CompressionLevel::Full,
            "text",
        );
        match cost {
            Some((model, cost_savings_usd)) => record.with_cost(CostSavings {
                cost_savings_usd,
                model: model.to_string(),
                client: "unknown".to_string(),
                price_per_m_tok: 3.0,
            }),
            None => record,
        }
    }

    fn sample_doc() -> StatsDocument {
        let mut doc = StatsDocument::new();
        doc.push_record(record(400, 1000, Some(("claude-sonnet-4", 1.0))));
        doc.push_record(record(60, 500, None));
        doc.push_record(record(10, 200, Some(("gpt-4o", 0.75))));
        doc.push_record(record(3, 100, Some(("claude-sonnet-4", 0.25))));
        doc.push_record(record(1, 50, Some(("claude-sonnet-4", 0.25))));
        retention::enforce(doc, now())
    }

    #[test]
    fn test_relative_days_bounds() {
        assert!(resolve_window(&QueryParams::new().relative_days(0), now()).is_err());
        assert!(resolve_window(&QueryParams::new().relative_days(366), now()).is_err());
        let err = resolve_window(&QueryParams::new().relative_days(400), now()).unwrap_err();
        assert!(err.is_validation());

        let window = resolve_window(&QueryParams::new().relative_days(365), now()).unwrap();
        assert_eq!(window.start, Some(now() - Duration::days(365)));
        assert_eq!(window.end, Some(now()));
    }

    #[test]
    fn test_relative_days_takes_priority() {
        let params = QueryParams::new()
            .relative_days(7)
            .range(Some("garbage"), None)
            .period(Period::Today);
        let window = resolve_window(&params, now()).unwrap();
        assert_eq!(window.start, Some(now() - Duration::days(7)));
    }

    #[test]
    fn test_range_defaults() {
        let window = resolve_window(&QueryParams::new().range(Some("2025-01-01"), None), now()).unwrap();
        assert_eq!(window.start, Some(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()));
        assert_eq!(window.end, Some(now()));

        let window = resolve_window(&QueryParams::new().range(None, Some("-1d")), now()).unwrap();
        assert_eq!(window.start, None);
        assert_eq!(window.end, Some(now() - Duration::days(1)));
    }

    #[test]
    fn test_start_after_end_fails() {
        let params = QueryParams::new().range(Some("2025-03-01"), Some("2025-02-01"));
        assert!(matches!(
            resolve_window(&params, now()),
            Err(StatsError::Validation(_))
        ));
    }

    #[test]
    fn test_malformed_date_fails() {
        let params = QueryParams::new().range(Some("invalid-date"), None);
        assert!(matches!(
            resolve_window(&params, now()),
            Err(StatsError::InvalidDateFormat { .. })
        ));
    }

    #[test]
    fn test_periods() {
        assert_eq!(resolve_window(&QueryParams::new(), now()).unwrap(), TimeWindow::unbounded());
        let week = resolve_window(&QueryParams::new().period(Period::Week), now()).unwrap();
        assert_eq!(week.start, Some(now() - Duration::days(7)));
        assert_eq!("Month".parse::<Period>().unwrap(), Period::Month);
        assert!("fortnight".parse::<Period>().is_err());
    }

    #[test]
    fn test_relative_days_matches_equivalent_range() {
        let doc = sample_doc();
        let relative = resolve_window(&QueryParams::new().relative_days(7), now()).unwrap();
        let range = resolve_window(&QueryParams::new().range(Some("-7d"), Some("now")), now()).unwrap();

        let a = query_document(&doc, relative, true, 100);
        let b = query_document(&doc, range, true, 100);
        assert_eq!(a.summary, b.summary);
        assert_eq!(a.records, b.records);
        assert_eq!(a.model_breakdown, b.model_breakdown);
    }

    #[test]
    fn test_all_matches_tier_totals() {
        let doc = sample_doc();
        let result = query_document(&doc, TimeWindow::unbounded(), false, 10);
        let totals = doc.tier_totals();

        assert_eq!(result.summary.total_compressions, totals.total_compressions);
        assert_eq!(result.summary.total_original_tokens, totals.total_original_tokens);
        assert_eq!(result.summary.total_tokens_saved, totals.total_tokens_saved);
        assert_eq!(result.summary.total_cost_savings_usd, 2.25);
        assert_eq!(result.summary.records_with_cost, 4);
        assert_eq!(result.summary.average_cost_per_compression, 0.5625);
        assert_eq!(result.summary.average_compression_ratio, 0.5);
        assert!(result.records.is_none());
    }

    #[test]
    fn test_windows_include_aggregate_tiers() {
        let doc = sample_doc();
        assert_eq!(doc.daily.len(), 1);
        assert_eq!(doc.monthly.len(), 1);

        let window = resolve_window(&QueryParams::new().relative_days(90), now()).unwrap();
        let result = query_document(&doc, window, false, 10);
        // 60-day-old daily bucket plus three recent records
        assert_eq!(result.summary.total_compressions, 4);
    }

    #[test]
    fn test_model_breakdown_uses_recent_records_only() {
        let doc = sample_doc();
        let result = query_document(&doc, TimeWindow::unbounded(), false, 10);
        let breakdown = result.model_breakdown.unwrap();

        assert_eq!(breakdown.len(), 2);
        assert_eq!(breakdown[0].model, "gpt-4o");
        assert_eq!(breakdown[0].cost_savings_usd, 0.75);
        assert_eq!(breakdown[1].model, "claude-sonnet-4");
        // the 400-day-old sonnet record is folded into monthly
        assert_eq!(breakdown[1].compressions, 2);
        assert_eq!(breakdown[1].cost_savings_usd, 0.5);
    }

    #[test]
    fn test_no_cost_means_zero_average() {
        let mut doc = StatsDocument::new();
        doc.push_record(record(1, 10, None));
        let result = query_document(&doc, TimeWindow::unbounded(), false, 10);
        assert_eq!(result.summary.average_cost_per_compression, 0.0);
        assert!(result.model_breakdown.is_none());
    }

    #[test]
    fn test_details_most_recent_first_and_limited() {
        let doc = sample_doc();
        let result = query_document(&doc, TimeWindow::unbounded(), true, 2);
        let records = result.records.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].timestamp, now() - Duration::days(1));
        assert_eq!(records[1].timestamp, now() - Duration::days(3));
    }

    #[test]
    fn test_day_and_month_key_matching() {
        let window = TimeWindow {
            start: Some(Utc.with_ymd_and_hms(2025, 3, 10, 15, 0, 0).unwrap()),
            end: Some(Utc.with_ymd_and_hms(2025, 4, 2, 8, 0, 0).unwrap()),
            label: String::new(),
        };
        assert!(window.contains_day("2025-03-10"));
        assert!(window.contains_day("2025-04-02"));
        assert!(!window.contains_day("2025-03-09"));
        assert!(window.contains_month("2025-03"));
        assert!(window.contains_month("2025-04"));
        assert!(!window.contains_month("2025-05"));
    }

    #[tokio::test]
    async fn test_engine_rejects_bad_limit_without_touching_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(STATS_FILE_NAME);
        fs::write(&path, r#"[{"timestamp":"2025-06-14T00:00:00Z","originalTokens":10,"compressedTokens":5}]"#)
            .unwrap();
        let engine = QueryEngine::new(StatsStore::new(&path)).with_clock(Clock::Fixed(now()));

        let err = engine
            .query(&QueryParams::new().with_details(Some(101)))
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert!(fs::read_to_string(&path).unwrap().starts_with('['));
    }

    #[test]
    fn test_default_limit_is_clamped_but_explicit_limit_is_checked() {
        assert_eq!(resolve_limit(&QueryParams::new(), 0).unwrap(), 1);
        assert_eq!(resolve_limit(&QueryParams::new(), 500).unwrap(), MAX_QUERY_LIMIT);
        assert_eq!(resolve_limit(&QueryParams::new().with_details(Some(7)), 0).unwrap(), 7);
        assert!(resolve_limit(&QueryParams::new().with_details(Some(0)), 10).is_err());
    }

    #[tokio::test]
    async fn test_engine_with_zero_default_limit_still_answers() {
        let dir = TempDir::new().unwrap();
        let engine = QueryEngine::new(StatsStore::new(dir.path().join(STATS_FILE_NAME)))
            .with_clock(Clock::Fixed(now()))
            .with_default_limit(0);

        let result = engine.query(&QueryParams::new()).await.unwrap();
        assert_eq!(result.summary.total_compressions, 0);
        assert!(!dir.path().join(STATS_FILE_NAME).exists());
    }

    #[tokio::test]
    async fn test_engine_persists_migrated_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(STATS_FILE_NAME);
        fs::write(&path, r#"[{"timestamp":"2025-06-14T00:00:00Z","originalTokens":10,"compressedTokens":5}]"#)
            .unwrap();
        let engine = QueryEngine::new(StatsStore::new(&path)).with_clock(Clock::Fixed(now()));

        let result = engine.query(&QueryParams::new()).await.unwrap();
        assert_eq!(result.summary.total_compressions, 1);

        let (_, status) = StatsStore::new(&path).load_with_status(now());
        assert_eq!(status, LoadStatus::Current);
    }

    #[test]
    fn test_result_json_shape() {
        let doc = sample_doc();
        let window = resolve_window(&QueryParams::new().relative_days(7), now()).unwrap();
        let json = serde_json::to_value(query_document(&doc, window, true, 10)).unwrap();
        assert!(json["windowStart"].is_string());
        assert_eq!(json["windowLabel"], "last 7 days");
        assert!(json["summary"]["totalCostSavingsUSD"].is_number());
        assert!(json["modelBreakdown"].is_array());
        assert!(json["records"].is_array());
    }
}
