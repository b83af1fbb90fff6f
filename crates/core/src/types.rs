use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One day of activity for one marketing channel, as delivered by the
/// time-series store. At most one record exists per (date, channel) pair;
/// spend and revenue are non-negative and in the same currency unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyChannelRecord {
    pub date: NaiveDate,
    pub channel: String,
    pub spend: f64,
    pub impressions: u64,
    pub clicks: u64,
    pub conversions: u64,
    pub revenue: f64,
}

/// Inclusive date window for a request. A date with no record inside the
/// window means "no activity recorded", which is distinct from a record
/// with zero spend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Build a range, swapping the endpoints if they arrive reversed.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self { start: end, end: start }
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// Number of calendar days covered, endpoints included.
    pub fn num_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// Days between `date` and the end of the range (0 for the end date).
    pub fn days_from_end(&self, date: NaiveDate) -> i64 {
        (self.end - date).num_days()
    }

    /// The trailing `n`-day sub-window, clamped to the range start.
    pub fn last_days(&self, n: i64) -> DateRange {
        let start = (self.end - chrono::Duration::days(n - 1)).max(self.start);
        DateRange { start, end: self.end }
    }

    /// The window of equal length immediately before this one.
    pub fn preceding(&self) -> DateRange {
        let len = self.num_days();
        DateRange {
            start: self.start - chrono::Duration::days(len),
            end: self.start - chrono::Duration::days(1),
        }
    }
}

/// Campaign metadata attached to a channel's activity window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub channel: String,
    pub campaign_name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub budget: f64,
    pub campaign_type: CampaignType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignType {
    Awareness,
    Conversion,
    Retention,
}

/// Per-date context rows: holidays and a seasonality index (1.0 = normal).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalFactor {
    pub date: NaiveDate,
    pub is_holiday: bool,
    pub holiday_name: Option<String>,
    pub seasonality_index: f64,
}
