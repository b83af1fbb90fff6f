//! Program-level overview metrics with comparisons against the preceding
//! period of equal length.

use chrono::{DateTime, Utc};
use mix_core::types::{DailyChannelRecord, DateRange};
use serde::{Deserialize, Serialize};

/// Absolute and relative change versus the preceding period. Both are zero
/// when the preceding period had no value to compare against.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MetricDelta {
    pub value: f64,
    pub percentage: f64,
}

impl MetricDelta {
    fn between(previous: f64, current: f64) -> Self {
        if previous == 0.0 {
            return Self {
                value: 0.0,
                percentage: 0.0,
            };
        }
        let value = current - previous;
        Self {
            value,
            percentage: value / previous * 100.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverviewMetrics {
    pub range: DateRange,
    pub total_spend: f64,
    pub total_revenue: f64,
    pub total_conversions: u64,
    /// Revenue per spend unit (0 when there was no spend).
    pub roas: f64,
    /// Revenue per conversion (0 when there were no conversions).
    pub avg_order_value: f64,
    pub spend_change: MetricDelta,
    pub revenue_change: MetricDelta,
    pub conversions_change: MetricDelta,
    pub roas_change: MetricDelta,
    pub computed_at: DateTime<Utc>,
}

struct PeriodTotals {
    spend: f64,
    revenue: f64,
    conversions: u64,
}

impl PeriodTotals {
    fn over(records: &[DailyChannelRecord], range: &DateRange) -> Self {
        let rows = records.iter().filter(|r| range.contains(r.date));
        let mut totals = Self {
            spend: 0.0,
            revenue: 0.0,
            conversions: 0,
        };
        for r in rows {
            totals.spend += r.spend;
            totals.revenue += r.revenue;
            totals.conversions += r.conversions;
        }
        totals
    }

    fn roas(&self) -> f64 {
        if self.spend > 0.0 {
            self.revenue / self.spend
        } else {
            0.0
        }
    }
}

/// Period totals plus deltas against the window immediately before.
pub fn overview(records: &[DailyChannelRecord], range: DateRange) -> OverviewMetrics {
    let current = PeriodTotals::over(records, &range);
    let previous = PeriodTotals::over(records, &range.preceding());

    let avg_order_value = if current.conversions > 0 {
        current.revenue / current.conversions as f64
    } else {
        0.0
    };

    OverviewMetrics {
        range,
        total_spend: current.spend,
        total_revenue: current.revenue,
        total_conversions: current.conversions,
        roas: current.roas(),
        avg_order_value,
        spend_change: MetricDelta::between(previous.spend, current.spend),
        revenue_change: MetricDelta::between(previous.revenue, current.revenue),
        conversions_change: MetricDelta::between(
            previous.conversions as f64,
            current.conversions as f64,
        ),
        roas_change: MetricDelta::between(previous.roas(), current.roas()),
        computed_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(day: u32, spend: f64, revenue: f64, conversions: u64) -> DailyChannelRecord {
        DailyChannelRecord {
            date: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
            channel: "Google Ads".to_string(),
            spend,
            impressions: 10_000,
            clicks: 300,
            conversions,
            revenue,
        }
    }

    #[test]
    fn test_overview_totals_and_roas() {
        let records = vec![
            record(11, 1_000.0, 4_000.0, 40),
            record(12, 1_000.0, 2_000.0, 20),
        ];
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2024, 3, 11).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 20).unwrap(),
        );
        let metrics = overview(&records, range);

        assert!((metrics.total_spend - 2_000.0).abs() < 1e-9);
        assert!((metrics.total_revenue - 6_000.0).abs() < 1e-9);
        assert_eq!(metrics.total_conversions, 60);
        assert!((metrics.roas - 3.0).abs() < 1e-9);
        assert!((metrics.avg_order_value - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_deltas_compare_against_preceding_period() {
        // 10-day window 11..20 vs preceding 1..10.
        let records = vec![
            record(5, 1_000.0, 3_000.0, 30),
            record(15, 1_500.0, 6_000.0, 45),
        ];
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2024, 3, 11).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 20).unwrap(),
        );
        let metrics = overview(&records, range);

        assert!((metrics.spend_change.value - 500.0).abs() < 1e-9);
        assert!((metrics.spend_change.percentage - 50.0).abs() < 1e-9);
        assert!((metrics.revenue_change.percentage - 100.0).abs() < 1e-9);
        assert!((metrics.conversions_change.percentage - 50.0).abs() < 1e-9);
        // ROAS moved from 3.0 to 4.0.
        assert!((metrics.roas_change.value - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_previous_period_yields_zero_deltas() {
        let records = vec![record(15, 1_500.0, 6_000.0, 45)];
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2024, 3, 11).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 20).unwrap(),
        );
        let metrics = overview(&records, range);

        assert!(metrics.spend_change.value.abs() < 1e-12);
        assert!(metrics.spend_change.percentage.abs() < 1e-12);
        assert!(metrics.roas_change.percentage.is_finite());
    }
}
