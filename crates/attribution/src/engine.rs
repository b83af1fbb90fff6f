//! Attribution engine — assigns each channel its fractional share of the
//! conversions and revenue observed in a date range, under one of four
//! closed models.

use chrono::{DateTime, NaiveDate, Utc};
use mix_core::config::AttributionConfig;
use mix_core::types::{DailyChannelRecord, DateRange};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// The supported attribution models. The set is closed: every consumer
/// dispatches on this enum, there is no open registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributionModel {
    Linear,
    TimeDecay,
    UShaped,
    DataDriven,
}

impl AttributionModel {
    pub const ALL: [AttributionModel; 4] = [
        AttributionModel::Linear,
        AttributionModel::TimeDecay,
        AttributionModel::UShaped,
        AttributionModel::DataDriven,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            AttributionModel::Linear => "linear",
            AttributionModel::TimeDecay => "time_decay",
            AttributionModel::UShaped => "u_shaped",
            AttributionModel::DataDriven => "data_driven",
        }
    }
}

/// One channel's share of the period under a single model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelAttribution {
    pub channel: String,
    /// Credit share in [0, 1]. Shares across channels sum to 1 unless the
    /// report is flagged empty.
    pub weight: f64,
    pub attributed_conversions: f64,
    pub attributed_revenue: f64,
    /// Share on the 0–100 scale.
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributionReport {
    pub model: AttributionModel,
    pub range: DateRange,
    pub total_conversions: u64,
    pub total_revenue: f64,
    /// True when the range holds zero conversions across every channel;
    /// all weights are zero in that case.
    pub empty: bool,
    pub channels: Vec<ChannelAttribution>,
    pub computed_at: DateTime<Utc>,
}

impl AttributionReport {
    pub fn channel(&self, name: &str) -> Option<&ChannelAttribution> {
        self.channels.iter().find(|c| c.channel == name)
    }
}

pub struct AttributionEngine {
    config: AttributionConfig,
}

impl AttributionEngine {
    pub fn new(config: AttributionConfig) -> Self {
        Self { config }
    }

    /// Attribute the range's conversions and revenue across channels.
    ///
    /// Records outside the range are ignored. A range with zero conversions
    /// across all channels yields all-zero weights flagged `empty` rather
    /// than an error.
    pub fn attribute(
        &self,
        records: &[DailyChannelRecord],
        range: DateRange,
        model: AttributionModel,
    ) -> AttributionReport {
        let rows: Vec<&DailyChannelRecord> =
            records.iter().filter(|r| range.contains(r.date)).collect();

        let channels: BTreeSet<&str> = rows.iter().map(|r| r.channel.as_str()).collect();
        let total_conversions: u64 = rows.iter().map(|r| r.conversions).sum();
        let total_revenue: f64 = rows.iter().map(|r| r.revenue).sum();

        debug!(
            model = model.name(),
            channels = channels.len(),
            rows = rows.len(),
            "attribution requested"
        );

        if total_conversions == 0 {
            warn!(model = model.name(), "no conversions in range, flagging empty");
            let zeroed = channels.iter().map(|&c| (c.to_string(), 0.0)).collect();
            return Self::report(model, range, 0, total_revenue, true, zeroed);
        }

        let weights = match model {
            AttributionModel::Linear => self.touch_share_weights(&rows, range, |_| 1.0),
            AttributionModel::TimeDecay => {
                let half_life = self.config.half_life_days;
                self.touch_share_weights(&rows, range, |days_from_end| {
                    (2.0_f64).powf(-(days_from_end as f64) / half_life)
                })
            }
            AttributionModel::UShaped => self.u_shaped_weights(&rows, range),
            AttributionModel::DataDriven => self.data_driven_weights(&rows, range),
        };

        Self::report(model, range, total_conversions, total_revenue, false, weights)
    }

    /// Per-date touch shares aggregated under a date weighting function.
    ///
    /// A channel's credit for one date is its share of that date's total
    /// conversions; dates with zero conversions contribute nothing rather
    /// than dividing by zero. The date weight depends only on the distance
    /// to the range end, and the final weights are normalized by the total
    /// date weight so they sum to one.
    fn touch_share_weights(
        &self,
        rows: &[&DailyChannelRecord],
        range: DateRange,
        date_weight: impl Fn(i64) -> f64,
    ) -> BTreeMap<String, f64> {
        let daily = Self::daily_conversions(rows);

        let mut weights: BTreeMap<String, f64> =
            rows.iter().map(|r| (r.channel.clone(), 0.0)).collect();
        let mut weight_sum = 0.0;

        for (date, (by_channel, date_total)) in &daily {
            if *date_total == 0 {
                continue;
            }
            let w = date_weight(range.days_from_end(*date));
            weight_sum += w;
            for (channel, conversions) in by_channel {
                let share = *conversions as f64 / *date_total as f64;
                *weights.entry(channel.clone()).or_insert(0.0) += w * share;
            }
        }

        if weight_sum > 0.0 {
            for w in weights.values_mut() {
                *w /= weight_sum;
            }
        }
        weights
    }

    /// Position-based weighting: 40% of credit to the date with the single
    /// highest conversions (first-touch proxy), 40% to the highest-converting
    /// date inside the trailing window (last-touch proxy), 20% split evenly
    /// across the remaining converting dates. Ranges spanning fewer than
    /// three observed dates collapse to the linear model.
    fn u_shaped_weights(
        &self,
        rows: &[&DailyChannelRecord],
        range: DateRange,
    ) -> BTreeMap<String, f64> {
        let daily = Self::daily_conversions(rows);
        let observed_dates = daily.len();
        if observed_dates < 3 {
            return self.touch_share_weights(rows, range, |_| 1.0);
        }

        // First-touch proxy: highest-converting date, earliest on ties.
        let peak = daily
            .iter()
            .filter(|(_, (_, total))| *total > 0)
            .max_by(|(da, (_, ta)), (db, (_, tb))| ta.cmp(tb).then(db.cmp(da)))
            .map(|(date, _)| *date);

        let peak = match peak {
            Some(date) => date,
            // No converting date at all; caller already handled the empty
            // case, but stay defensive.
            None => return self.touch_share_weights(rows, range, |_| 1.0),
        };

        // Last-touch proxy: highest-converting date within the trailing
        // window, latest on ties. Falls back onto the overall peak when the
        // window saw no conversions.
        let last_window = range.last_days(self.config.last_touch_window_days);
        let late_peak = daily
            .iter()
            .filter(|(date, (_, total))| *total > 0 && last_window.contains(**date))
            .max_by(|(da, (_, ta)), (db, (_, tb))| ta.cmp(tb).then(da.cmp(db)))
            .map(|(date, _)| *date)
            .unwrap_or(peak);

        let middle: Vec<NaiveDate> = daily
            .iter()
            .filter(|(date, (_, total))| *total > 0 && **date != peak && **date != late_peak)
            .map(|(date, _)| *date)
            .collect();

        let mut date_weights: BTreeMap<NaiveDate, f64> = BTreeMap::new();
        *date_weights.entry(peak).or_insert(0.0) += 0.4;
        *date_weights.entry(late_peak).or_insert(0.0) += 0.4;
        for date in &middle {
            *date_weights.entry(*date).or_insert(0.0) += 0.2 / middle.len() as f64;
        }

        let mut weights: BTreeMap<String, f64> =
            rows.iter().map(|r| (r.channel.clone(), 0.0)).collect();
        let mut weight_sum = 0.0;

        for (date, w) in &date_weights {
            let (by_channel, date_total) = &daily[date];
            weight_sum += w;
            for (channel, conversions) in by_channel {
                let share = *conversions as f64 / *date_total as f64;
                *weights.entry(channel.clone()).or_insert(0.0) += w * share;
            }
        }

        if weight_sum > 0.0 {
            for w in weights.values_mut() {
                *w /= weight_sum;
            }
        }
        weights
    }

    /// Leave-one-out counterfactual: a channel's raw credit is the revenue
    /// the period loses when that channel's rows are zeroed out. Raw credits
    /// are normalized into shares; when every credit is zero the model falls
    /// back to linear.
    fn data_driven_weights(
        &self,
        rows: &[&DailyChannelRecord],
        range: DateRange,
    ) -> BTreeMap<String, f64> {
        let baseline: f64 = rows.iter().map(|r| r.revenue).sum();

        let channels: BTreeSet<&str> = rows.iter().map(|r| r.channel.as_str()).collect();
        let mut raw: BTreeMap<String, f64> = BTreeMap::new();
        for channel in &channels {
            let without: f64 = rows
                .iter()
                .filter(|r| r.channel != *channel)
                .map(|r| r.revenue)
                .sum();
            raw.insert(channel.to_string(), (baseline - without).max(0.0));
        }

        let raw_sum: f64 = raw.values().sum();
        if raw_sum <= 0.0 {
            debug!("all leave-one-out credits are zero, falling back to linear");
            return self.touch_share_weights(rows, range, |_| 1.0);
        }

        raw.into_iter().map(|(c, v)| (c, v / raw_sum)).collect()
    }

    /// Per-date conversion counts: date -> (channel -> conversions, total).
    fn daily_conversions(
        rows: &[&DailyChannelRecord],
    ) -> BTreeMap<NaiveDate, (BTreeMap<String, u64>, u64)> {
        let mut daily: BTreeMap<NaiveDate, (BTreeMap<String, u64>, u64)> = BTreeMap::new();
        for r in rows {
            let entry = daily.entry(r.date).or_default();
            *entry.0.entry(r.channel.clone()).or_insert(0) += r.conversions;
            entry.1 += r.conversions;
        }
        daily
    }

    fn report(
        model: AttributionModel,
        range: DateRange,
        total_conversions: u64,
        total_revenue: f64,
        empty: bool,
        weights: BTreeMap<String, f64>,
    ) -> AttributionReport {
        let channels = weights
            .into_iter()
            .map(|(channel, weight)| ChannelAttribution {
                channel,
                weight,
                attributed_conversions: weight * total_conversions as f64,
                attributed_revenue: weight * total_revenue,
                percentage: weight * 100.0,
            })
            .collect();

        AttributionReport {
            model,
            range,
            total_conversions,
            total_revenue,
            empty,
            channels,
            computed_at: Utc::now(),
        }
    }
}

impl Default for AttributionEngine {
    fn default() -> Self {
        Self::new(AttributionConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
