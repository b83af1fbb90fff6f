//! Per-channel performance breakdown: funnel rates, spend baselines, an
//! optimal-spend estimate from marginal-ROAS decline, and the channel's
//! best-performing days.

use chrono::{DateTime, NaiveDate, Utc};
use mix_core::error::{MixError, MixResult};
use mix_core::types::{DailyChannelRecord, DateRange};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Rolling window for the marginal-ROAS scan over spend-sorted days.
const MARGINAL_WINDOW: usize = 7;
/// Marginal ROAS below this fraction of the overall ROAS marks the
/// declining point.
const DECLINE_FRACTION: f64 = 0.8;
/// Change below this many currency units reads as already optimized.
const OPPORTUNITY_FLOOR: f64 = 100.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BestDay {
    pub date: NaiveDate,
    pub roas: f64,
    pub revenue: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelPerformance {
    pub channel: String,
    pub range: DateRange,
    pub total_spend: f64,
    pub total_revenue: f64,
    pub roas: f64,
    /// Clicks per impression (0 when no impressions).
    pub ctr: f64,
    /// Conversions per click (0 when no clicks).
    pub conversion_rate: f64,
    /// Spend per conversion (0 when no conversions).
    pub cost_per_acquisition: f64,
    pub avg_daily_spend: f64,
    /// Mean spend over the trailing 7 recorded days.
    pub current_daily_spend: f64,
    pub optimal_daily_spend: f64,
    pub opportunity: String,
    /// Up to five highest-ROAS days in the window.
    pub best_days: Vec<BestDay>,
    pub computed_at: DateTime<Utc>,
}

/// Detailed metrics for one channel over a window. `UnknownChannel` when the
/// window holds no rows for it.
pub fn channel_performance(
    records: &[DailyChannelRecord],
    channel: &str,
    range: DateRange,
) -> MixResult<ChannelPerformance> {
    let mut rows: Vec<&DailyChannelRecord> = records
        .iter()
        .filter(|r| r.channel == channel && range.contains(r.date))
        .collect();
    if rows.is_empty() {
        return Err(MixError::UnknownChannel(channel.to_string()));
    }
    rows.sort_by_key(|r| r.date);

    let total_spend: f64 = rows.iter().map(|r| r.spend).sum();
    let total_revenue: f64 = rows.iter().map(|r| r.revenue).sum();
    let total_impressions: u64 = rows.iter().map(|r| r.impressions).sum();
    let total_clicks: u64 = rows.iter().map(|r| r.clicks).sum();
    let total_conversions: u64 = rows.iter().map(|r| r.conversions).sum();

    let roas = ratio(total_revenue, total_spend);
    let ctr = ratio(total_clicks as f64, total_impressions as f64);
    let conversion_rate = ratio(total_conversions as f64, total_clicks as f64);
    let cost_per_acquisition = ratio(total_spend, total_conversions as f64);

    let avg_daily_spend = total_spend / rows.len() as f64;
    let last_date = rows.last().map(|r| r.date).unwrap_or(range.end);
    let recent_start = last_date - chrono::Duration::days(6);
    let recent: Vec<&&DailyChannelRecord> =
        rows.iter().filter(|r| r.date >= recent_start).collect();
    let current_daily_spend =
        recent.iter().map(|r| r.spend).sum::<f64>() / recent.len().max(1) as f64;

    let optimal_daily_spend = find_optimal_spend(&rows, roas);
    let opportunity = describe_opportunity(optimal_daily_spend, avg_daily_spend);

    let mut by_roas: Vec<BestDay> = rows
        .iter()
        .filter(|r| r.spend > 0.0)
        .map(|r| BestDay {
            date: r.date,
            roas: r.revenue / r.spend,
            revenue: r.revenue,
        })
        .collect();
    by_roas.sort_by(|a, b| b.roas.partial_cmp(&a.roas).unwrap_or(std::cmp::Ordering::Equal));
    by_roas.truncate(5);

    debug!(channel, days = rows.len(), roas, "channel performance computed");

    Ok(ChannelPerformance {
        channel: channel.to_string(),
        range,
        total_spend,
        total_revenue,
        roas,
        ctr,
        conversion_rate,
        cost_per_acquisition,
        avg_daily_spend,
        current_daily_spend,
        optimal_daily_spend,
        opportunity,
        best_days: by_roas,
        computed_at: Utc::now(),
    })
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

/// Scan days sorted by spend and compare each day against the day
/// `MARGINAL_WINDOW` positions earlier; the first spend level whose marginal
/// ROAS drops below `DECLINE_FRACTION` of the overall ROAS is the optimal
/// point. Without a clear declining point, fall back to the 90th percentile
/// of observed spend.
fn find_optimal_spend(rows: &[&DailyChannelRecord], overall_roas: f64) -> f64 {
    let mut by_spend: Vec<&&DailyChannelRecord> = rows.iter().collect();
    by_spend.sort_by(|a, b| a.spend.partial_cmp(&b.spend).unwrap_or(std::cmp::Ordering::Equal));

    if by_spend.len() > MARGINAL_WINDOW {
        for i in MARGINAL_WINDOW..by_spend.len() {
            let marginal_spend = by_spend[i].spend - by_spend[i - MARGINAL_WINDOW].spend;
            if marginal_spend <= 0.0 {
                continue;
            }
            let marginal_revenue = by_spend[i].revenue - by_spend[i - MARGINAL_WINDOW].revenue;
            let marginal_roas = marginal_revenue / marginal_spend;
            if marginal_roas < overall_roas * DECLINE_FRACTION {
                return by_spend[i].spend;
            }
        }
    }

    // 90th percentile of spend.
    let idx = ((by_spend.len() as f64) * 0.9).floor() as usize;
    by_spend[idx.min(by_spend.len() - 1)].spend
}

fn describe_opportunity(optimal: f64, current: f64) -> String {
    let difference = optimal - current;
    if difference.abs() < OPPORTUNITY_FLOOR {
        "Spend is optimized".to_string()
    } else if difference > 0.0 {
        format!("Increase by ${:.0}/day", difference.abs())
    } else {
        format!("Reduce by ${:.0}/day", difference.abs())
    }
}
