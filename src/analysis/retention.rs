use crate::storage::document::{
    DAILY_DAYS, MONTHLY_YEARS, RECENT_DAYS, StatsDocument, day_key, month_key, month_of_day_key,
};
use chrono::{DateTime, Duration, Utc};
use tracing::debug;

/// What a retention pass moved between tiers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetentionReport {
    pub records_folded: usize,
    pub days_folded: usize,
    pub months_purged: usize,
}

impl RetentionReport {
    pub fn is_noop(&self) -> bool {
        *self == Self::default()
    }
}

/// Age the document's tiers relative to `now`.
///
/// Records older than [`RECENT_DAYS`] are summed into their day's bucket,
/// day buckets older than [`DAILY_DAYS`] into their month's bucket, and
/// month buckets older than [`MONTHLY_YEARS`] are dropped. Folding leaves
/// `summary` untouched; a purged month is subtracted from it. Running the
/// pass again with the same `now` changes nothing.
pub fn enforce(doc: StatsDocument, now: DateTime<Utc>) -> StatsDocument {
    enforce_with_report(doc, now).0
}

pub fn enforce_with_report(
    mut doc: StatsDocument,
    now: DateTime<Utc>,
) -> (StatsDocument, RetentionReport) {
    let mut report = RetentionReport::default();

    let recent_cutoff = now - Duration::days(RECENT_DAYS);
    let daily_cutoff = day_key(now - Duration::days(DAILY_DAYS));
    let monthly_cutoff = month_key(now - Duration::days(MONTHLY_YEARS * 365));

    // recent -> daily
    let (still_recent, aged): (Vec<_>, Vec<_>) = std::mem::take(&mut doc.recent)
        .into_iter()
        .partition(|record| record.timestamp > recent_cutoff);
    for record in &aged {
        doc.daily
            .entry(day_key(record.timestamp))
            .or_default()
            .add_record(record);
    }
    doc.recent = still_recent;
    report.records_folded = aged.len();

    // daily -> monthly
    let aged_days: Vec<String> = doc
        .daily
        .range(..daily_cutoff)
        .map(|(key, _)| key.clone())
        .collect();
    for key in aged_days {
        if let Some(aggregate) = doc.daily.remove(&key) {
            doc.monthly
                .entry(month_of_day_key(&key))
                .or_default()
                .merge(&aggregate);
            report.days_folded += 1;
        }
    }

    // monthly -> gone
    let expired_months: Vec<String> = doc
        .monthly
        .range(..monthly_cutoff)
        .map(|(key, _)| key.clone())
        .collect();
    for key in expired_months {
        if let Some(aggregate) = doc.monthly.remove(&key) {
            doc.summary.subtract_aggregate(&aggregate);
            report.months_purged += 1;
        }
    }

    if !report.is_noop() {
        debug!(
            records_folded = report.records_folded,
            days_folded = report.days_folded,
            months_purged = report.months_purged,
            "Retention applied"
        );
    }

    (doc, report)
}
