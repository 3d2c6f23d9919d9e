use crate::analysis::query::{ModelBreakdown, QueryResult, QuerySummary};
use crate::models::record::CompressionRecord;
use serde::Serialize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

/// Trait for items that can be displayed as tables or JSON
pub trait OutputFormat {
    fn to_table(&self) -> String {
        self.to_table_with_options(2, true)
    }
    fn to_json(&self) -> Result<String, serde_json::Error>;
    fn to_table_with_options(&self, decimal_places: u8, unicode: bool) -> String;
}

/// Row for the summary metric/value table
#[derive(Tabled, Serialize, Debug)]
pub struct SummaryRow {
    #[tabled(rename = "Metric")]
    pub metric: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

/// Row for the per-model cost breakdown
#[derive(Tabled, Serialize, Debug)]
pub struct ModelBreakdownRow {
    #[tabled(rename = "Model")]
    pub model: String,
    #[tabled(rename = "Compressions")]
    pub compressions: String,
    #[tabled(rename = "Tokens Saved")]
    pub tokens_saved: String,
    #[tabled(rename = "Cost Saved")]
    pub cost: String,
}

/// Row for individual compression records
#[derive(Tabled, Serialize, Debug)]
pub struct RecordRow {
    #[tabled(rename = "Time")]
    pub time: String,
    #[tabled(rename = "Path")]
    pub path: String,
    #[tabled(rename = "Level")]
    pub level: String,
    #[tabled(rename = "Original")]
    pub original: String,
    #[tabled(rename = "Compressed")]
    pub compressed: String,
    #[tabled(rename = "Saved")]
    pub saved: String,
    #[tabled(rename = "Cost Saved")]
    pub cost: String,
}

impl SummaryRow {
    fn new(metric: &str, value: String) -> Self {
        Self {
            metric: metric.to_string(),
            value,
        }
    }

    pub fn from_summary(summary: &QuerySummary, decimal_places: u8) -> Vec<Self> {
        vec![
            Self::new("Compressions", format_number(summary.total_compressions)),
            Self::new("Original tokens", format_number(summary.total_original_tokens)),
            Self::new("Compressed tokens", format_number(summary.total_compressed_tokens)),
            Self::new("Tokens saved", format_signed(summary.total_tokens_saved)),
            Self::new(
                "Avg. compression ratio",
                format!("{:.3}", summary.average_compression_ratio),
            ),
            Self::new(
                "Avg. savings",
                format!("{:.1}%", summary.average_savings_percentage),
            ),
            Self::new(
                "Cost saved",
                format_currency(summary.total_cost_savings_usd, decimal_places),
            ),
            Self::new(
                "Avg. cost per compression",
                format_currency(summary.average_cost_per_compression, decimal_places.max(4)),
            ),
        ]
    }
}

impl ModelBreakdownRow {
    pub fn from_breakdown(entry: &ModelBreakdown, decimal_places: u8) -> Self {
        Self {
            model: entry.model.clone(),
            compressions: format_number(entry.compressions),
            tokens_saved: format_signed(entry.tokens_saved),
            cost: format_currency(entry.cost_savings_usd, decimal_places),
        }
    }
}

impl RecordRow {
    pub fn from_record(record: &CompressionRecord, decimal_places: u8) -> Self {
        let level = if record.estimated {
            format!("{} (est.)", record.level)
        } else {
            record.level.to_string()
        };

        Self {
            time: record.timestamp.format("%Y-%m-%d %H:%M").to_string(),
            path: record.path.clone(),
            level,
            original: format_number(record.original_tokens),
            compressed: format_number(record.compressed_tokens),
            saved: format!(
                "{} ({:.1}%)",
                format_signed(record.tokens_saved),
                record.savings_percentage
            ),
            cost: record
                .cost_savings_usd
                .map(|cost| format_currency(cost, decimal_places))
                .unwrap_or_else(|| "-".to_string()),
        }
    }
}

/// Render rows with rounded unicode borders or plain ASCII.
pub fn render_table<T: Tabled>(rows: Vec<T>, unicode: bool) -> String {
    let mut table = Table::new(rows);
    if unicode {
        table.with(Style::rounded());
    } else {
        table.with(Style::ascii());
    }
    table.to_string()
}

impl OutputFormat for QueryResult {
    fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    fn to_table_with_options(&self, decimal_places: u8, unicode: bool) -> String {
        let mut output = format!("Compression stats ({})\n", self.window.label);

        if self.summary.total_compressions == 0 {
            output.push_str("No compressions recorded in this period.");
            return output;
        }

        output.push_str(&render_table(
            SummaryRow::from_summary(&self.summary, decimal_places),
            unicode,
        ));

        if let Some(breakdown) = &self.model_breakdown {
            let rows: Vec<ModelBreakdownRow> = breakdown
                .iter()
                .map(|entry| ModelBreakdownRow::from_breakdown(entry, decimal_places))
                .collect();
            output.push_str("\n\nCost savings by model (last 30 days of detail)\n");
            output.push_str(&render_table(rows, unicode));
        }

        if let Some(records) = &self.records {
            output.push_str("\n\nRecent compressions\n");
            if records.is_empty() {
                output.push_str("No individual records in this period.");
            } else {
                let rows: Vec<RecordRow> = records
                    .iter()
                    .map(|record| RecordRow::from_record(record, decimal_places))
                    .collect();
                output.push_str(&render_table(rows, unicode));
            }
        }

        output
    }
}

impl OutputFormat for CompressionRecord {
    fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    fn to_table_with_options(&self, decimal_places: u8, unicode: bool) -> String {
        render_table(vec![RecordRow::from_record(self, decimal_places)], unicode)
    }
}

/// Format a number with commas for thousands separator
pub fn format_number(n: u64) -> String {
    if n == 0 {
        return "0".to_string();
    }

    let mut result = String::new();
    let s = n.to_string();
    let chars: Vec<char> = s.chars().collect();

    for (i, ch) in chars.iter().enumerate() {
        if i > 0 && (chars.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(*ch);
    }

    result
}

/// Like [`format_number`], keeping the sign of negative savings
pub fn format_signed(n: i64) -> String {
    if n < 0 {
        format!("-{}", format_number(n.unsigned_abs()))
    } else {
        format_number(n as u64)
    }
}

/// Format a dollar amount with the given number of decimal places
pub fn format_currency(amount: f64, decimal_places: u8) -> String {
    format!("${:.*}", decimal_places as usize, amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::query::TimeWindow;
    use crate::models::record::CompressionLevel;
    use chrono::{TimeZone, Utc};

    fn summary() -> QuerySummary {
        QuerySummary {
            total_compressions: 3,
            total_original_tokens: 12000,
            total_compressed_tokens: 3000,
            total_tokens_saved: 9000,
            average_compression_ratio: 0.25,
            average_savings_percentage: 75.0,
            total_cost_savings_usd: 1.5,
            records_with_cost: 3,
            average_cost_per_compression: 0.5,
        }
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(123), "123");
        assert_eq!(format_number(1234), "1,234");
        assert_eq!(format_number(1234567), "1,234,567");
        assert_eq!(format_number(1000000000), "1,000,000,000");
        assert_eq!(format_signed(-1234), "-1,234");
    }

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(0.0, 2), "$0.00");
        assert_eq!(format_currency(1.5, 2), "$1.50");
        assert_eq!(format_currency(123.456, 2), "$123.46");
        assert_eq!(format_currency(0.0123, 4), "$0.0123");
    }

    #[test]
    fn test_summary_rows() {
        let rows = SummaryRow::from_summary(&summary(), 2);
        assert_eq!(rows[0].value, "3");
        assert_eq!(rows[1].value, "12,000");
        assert_eq!(rows[3].value, "9,000");
        assert_eq!(rows[5].value, "75.0%");
        assert_eq!(rows[6].value, "$1.50");
    }

    #[test]
    fn test_record_row_marks_estimates() {
        let ts = Utc.with_ymd_and_hms(2025, 6, 1, 8, 30, 0).unwrap();
        let record = CompressionRecord::new(ts, "src/lib.rs", 400, 100, CompressionLevel::Full, "text")
            .mark_estimated();
        let row = RecordRow::from_record(&record, 2);
        assert_eq!(row.time, "2025-06-01 08:30");
        assert_eq!(row.level, "full (est.)");
        assert_eq!(row.saved, "300 (75.0%)");
        assert_eq!(row.cost, "-");
    }

    #[test]
    fn test_empty_result_table() {
        let result = QueryResult {
            window: TimeWindow::unbounded(),
            summary: QuerySummary::default(),
            model_breakdown: None,
            records: None,
        };
        assert!(result.to_table().contains("No compressions recorded"));
    }

    #[test]
    fn test_result_table_sections() {
        let result = QueryResult {
            window: TimeWindow::unbounded(),
            summary: summary(),
            model_breakdown: Some(vec![ModelBreakdown {
                model: "claude-sonnet-4".to_string(),
                compressions: 3,
                tokens_saved: 9000,
                cost_savings_usd: 1.5,
            }]),
            records: Some(Vec::new()),
        };

        let table = result.to_table_with_options(2, false);
        assert!(table.contains("all time"));
        assert!(table.contains("claude-sonnet-4"));
        assert!(table.contains("Cost savings by model"));
        assert!(table.contains("No individual records"));
        assert!(table.contains('+'));
    }

    #[test]
    fn test_result_json_output() {
        let result = QueryResult {
            window: TimeWindow::unbounded(),
            summary: summary(),
            model_breakdown: None,
            records: None,
        };
        let json = result.to_json().unwrap();
        assert!(json.contains("\"totalCompressions\": 3"));
        assert!(!json.contains("modelBreakdown"));
    }
}
