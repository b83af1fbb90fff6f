//! Weekly trend aggregation for a single channel.

use chrono::{Datelike, NaiveDate};
use mix_core::error::{MixError, MixResult};
use mix_core::types::{DailyChannelRecord, DateRange};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeeklyTrend {
    /// Monday of the ISO week the totals cover.
    pub week_start: NaiveDate,
    pub spend: f64,
    pub revenue: f64,
    pub conversions: u64,
    pub roas: f64,
}

/// Aggregate one channel's rows into Monday-anchored weekly totals,
/// oldest week first. `UnknownChannel` when the window holds no rows.
pub fn weekly_trends(
    records: &[DailyChannelRecord],
    channel: &str,
    range: DateRange,
) -> MixResult<Vec<WeeklyTrend>> {
    let rows: Vec<&DailyChannelRecord> = records
        .iter()
        .filter(|r| r.channel == channel && range.contains(r.date))
        .collect();
    if rows.is_empty() {
        return Err(MixError::UnknownChannel(channel.to_string()));
    }

    let mut weeks: BTreeMap<NaiveDate, (f64, f64, u64)> = BTreeMap::new();
    for r in rows {
        let week_start =
            r.date - chrono::Duration::days(r.date.weekday().num_days_from_monday() as i64);
        let entry = weeks.entry(week_start).or_insert((0.0, 0.0, 0));
        entry.0 += r.spend;
        entry.1 += r.revenue;
        entry.2 += r.conversions;
    }

    Ok(weeks
        .into_iter()
        .map(|(week_start, (spend, revenue, conversions))| WeeklyTrend {
            week_start,
            spend,
            revenue,
            conversions,
            roas: if spend > 0.0 { revenue / spend } else { 0.0 },
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(date: NaiveDate, spend: f64, revenue: f64) -> DailyChannelRecord {
        DailyChannelRecord {
            date,
            channel: "Email".to_string(),
            spend,
            impressions: 5_000,
            clicks: 120,
            conversions: 10,
            revenue,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_weeks_anchor_on_monday() {
        // 2024-03-04 is a Monday; 03-06 and 03-10 land in the same ISO week,
        // 03-11 starts the next one.
        let records = vec![
            record(date(2024, 3, 6), 100.0, 300.0),
            record(date(2024, 3, 10), 50.0, 100.0),
            record(date(2024, 3, 11), 200.0, 800.0),
        ];
        let range = DateRange::new(date(2024, 3, 1), date(2024, 3, 31));
        let trends = weekly_trends(&records, "Email", range).unwrap();

        assert_eq!(trends.len(), 2);
        assert_eq!(trends[0].week_start, date(2024, 3, 4));
        assert!((trends[0].spend - 150.0).abs() < 1e-9);
        assert!((trends[0].roas - 400.0 / 150.0).abs() < 1e-9);
        assert_eq!(trends[1].week_start, date(2024, 3, 11));
        assert_eq!(trends[1].conversions, 10);
    }

    #[test]
    fn test_weeks_come_back_oldest_first() {
        let records = vec![
            record(date(2024, 3, 20), 10.0, 20.0),
            record(date(2024, 3, 5), 10.0, 20.0),
        ];
        let range = DateRange::new(date(2024, 3, 1), date(2024, 3, 31));
        let trends = weekly_trends(&records, "Email", range).unwrap();

        assert!(trends[0].week_start < trends[1].week_start);
    }

    #[test]
    fn test_unknown_channel_is_an_error() {
        let records = vec![record(date(2024, 3, 5), 10.0, 20.0)];
        let range = DateRange::new(date(2024, 3, 1), date(2024, 3, 31));
        assert!(matches!(
            weekly_trends(&records, "TikTok", range),
            Err(MixError::UnknownChannel(_))
        ));
    }
}
