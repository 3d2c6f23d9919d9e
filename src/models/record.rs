use crate::error::StatsError;
use crate::models::pricing::CostSavings;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Multiplier applied to compressed tokens when the original is unavailable
/// and the level gives no better hint.
pub const DEFAULT_ESTIMATION_FACTOR: f64 = 4.0;

pub const COST_CURRENCY: &str = "USD";

/// Compression level declared by the external compression tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionLevel {
    Minimal,
    Signatures,
    Full,
}

impl CompressionLevel {
    /// Ratio of original to compressed tokens typically seen at this level.
    pub fn estimation_factor(&self) -> f64 {
        match self {
            CompressionLevel::Minimal => 10.0,
            CompressionLevel::Signatures => 6.0,
            CompressionLevel::Full => DEFAULT_ESTIMATION_FACTOR,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CompressionLevel::Minimal => "minimal",
            CompressionLevel::Signatures => "signatures",
            CompressionLevel::Full => "full",
        }
    }
}

impl fmt::Display for CompressionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompressionLevel {
    type Err = StatsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "minimal" => Ok(CompressionLevel::Minimal),
            "signatures" => Ok(CompressionLevel::Signatures),
            "full" => Ok(CompressionLevel::Full),
            other => Err(StatsError::validation(format!(
                "Invalid compression level '{other}'. Must be 'minimal', 'signatures', or 'full'"
            ))),
        }
    }
}

/// One compression event. Immutable once written to the stats document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressionRecord {
    pub timestamp: DateTime<Utc>,
    pub path: String,
    pub original_tokens: u64,
    pub compressed_tokens: u64,
    pub tokens_saved: i64,
    pub compression_ratio: f64,
    pub savings_percentage: f64,
    pub level: CompressionLevel,
    pub format: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub estimated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_per_m_tok: Option<f64>,
    #[serde(
        rename = "costSavingsUSD",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub cost_savings_usd: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

impl CompressionRecord {
    /// Build a record, deriving `tokensSaved`, ratio and percentage from the
    /// two token counts.
    pub fn new(
        timestamp: DateTime<Utc>,
        path: impl Into<String>,
        original_tokens: u64,
        compressed_tokens: u64,
        level: CompressionLevel,
        format: impl Into<String>,
    ) -> Self {
        let (tokens_saved, compression_ratio, savings_percentage) =
            derived_fields(original_tokens, compressed_tokens);

        Self {
            timestamp,
            path: path.into(),
            original_tokens,
            compressed_tokens,
            tokens_saved,
            compression_ratio,
            savings_percentage,
            level,
            format: format.into(),
            estimated: false,
            model: None,
            client: None,
            price_per_m_tok: None,
            cost_savings_usd: None,
            currency: None,
        }
    }

    pub fn mark_estimated(mut self) -> Self {
        self.estimated = true;
        self
    }

    /// Attach the cost block. All five cost fields are set together.
    pub fn with_cost(mut self, cost: CostSavings) -> Self {
        self.model = Some(cost.model);
        self.client = Some(cost.client);
        self.price_per_m_tok = Some(cost.price_per_m_tok);
        self.cost_savings_usd = Some(cost.cost_savings_usd);
        self.currency = Some(COST_CURRENCY.to_string());
        self
    }

    pub fn has_cost(&self) -> bool {
        self.cost_savings_usd.is_some()
    }

    /// Whether the derived fields agree with the token counts.
    pub fn is_consistent(&self) -> bool {
        let (saved, ratio, percentage) =
            derived_fields(self.original_tokens, self.compressed_tokens);
        self.tokens_saved == saved
            && (self.compression_ratio - ratio).abs() < 1e-9
            && (self.savings_percentage - percentage).abs() < 1e-9
    }
}

fn derived_fields(original_tokens: u64, compressed_tokens: u64) -> (i64, f64, f64) {
    let tokens_saved = original_tokens as i64 - compressed_tokens as i64;
    if original_tokens == 0 {
        return (tokens_saved, 0.0, 0.0);
    }

    let original = original_tokens as f64;
    let ratio = round_to(compressed_tokens as f64 / original, 3);
    let percentage = round_to(tokens_saved as f64 / original * 100.0, 1);
    (tokens_saved, ratio, percentage)
}

/// Round half away from zero to `places` decimal places.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
