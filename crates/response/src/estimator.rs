//! Saturation estimation — per-channel curve fitting plus the derived
//! saturation point, spend baselines, and efficiency classification.

use crate::curve::{CurveForm, ResponseCurve};
use crate::fit;
use chrono::{DateTime, Utc};
use mix_core::config::SaturationConfig;
use mix_core::error::{MixError, MixResult};
use mix_core::types::DailyChannelRecord;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Where a channel's current spend sits relative to its saturation point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EfficiencyStatus {
    UnderInvested,
    Efficient,
    OverSaturated,
}

impl EfficiencyStatus {
    /// Classification rule: under half the saturation point is
    /// under-invested, up to the saturation point is efficient, beyond it
    /// is over-saturated.
    pub fn classify(current_spend: f64, saturation_point: f64) -> Self {
        if current_spend < 0.5 * saturation_point {
            EfficiencyStatus::UnderInvested
        } else if current_spend <= saturation_point {
            EfficiencyStatus::Efficient
        } else {
            EfficiencyStatus::OverSaturated
        }
    }
}

/// One sample of the marginal-returns curve, for plotting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarginalReturnPoint {
    pub spend: f64,
    pub marginal_roas: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaturationAnalysis {
    pub channel: String,
    pub curve: ResponseCurve,
    pub saturation_point: f64,
    /// Mean spend over the trailing window (design default 7 days).
    pub current_spend: f64,
    /// Mean spend over the full input window.
    pub avg_daily_spend: f64,
    pub efficiency_status: EfficiencyStatus,
    /// Samples spanning [0, 2x saturation point].
    pub marginal_returns_curve: Vec<MarginalReturnPoint>,
    pub low_confidence: bool,
    pub computed_at: DateTime<Utc>,
}

pub struct SaturationEstimator {
    config: SaturationConfig,
}

impl SaturationEstimator {
    pub fn new(config: SaturationConfig) -> Self {
        Self { config }
    }

    /// Fit a response curve for one channel's records.
    ///
    /// Days with zero spend are excluded from fitting but still count toward
    /// spend baselines. Fewer than two distinct positive-spend days is an
    /// `InsufficientData` error. A diverged or poor fit (b <= 0 or R² below
    /// the configured floor) falls back to a flat-ROAS line flagged
    /// low-confidence; the fallback is reported, never silently discarded.
    pub fn fit(&self, channel: &str, records: &[DailyChannelRecord]) -> MixResult<ResponseCurve> {
        let pairs: Vec<(f64, f64)> = records
            .iter()
            .filter(|r| r.channel == channel && r.spend > 0.0)
            .map(|r| (r.spend, r.revenue))
            .collect();

        let distinct_days: BTreeSet<_> = records
            .iter()
            .filter(|r| r.channel == channel && r.spend > 0.0)
            .map(|r| r.date)
            .collect();
        if distinct_days.len() < 2 {
            return Err(MixError::InsufficientData {
                channel: channel.to_string(),
                positive_spend_days: distinct_days.len(),
            });
        }

        let spend: Array1<f64> = pairs.iter().map(|(s, _)| *s).collect();
        let revenue: Array1<f64> = pairs.iter().map(|(_, r)| *r).collect();
        let spend_min = spend.iter().cloned().fold(f64::INFINITY, f64::min);
        let spend_max = spend.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let domain_max = spend_max * self.config.extrapolation_factor;

        let outcome = fit::fit_saturating(&spend, &revenue, self.config.fit_max_iterations);
        debug!(
            channel,
            a = outcome.a,
            b = outcome.b,
            r_squared = outcome.r_squared,
            iterations = outcome.iterations,
            converged = outcome.converged,
            "saturating fit finished"
        );

        let accepted =
            outcome.converged && outcome.b > 0.0 && outcome.r_squared >= self.config.min_r_squared;

        if accepted {
            let mut curve = ResponseCurve {
                channel: channel.to_string(),
                form: CurveForm::Saturating {
                    a: outcome.a,
                    b: outcome.b,
                },
                r_squared: outcome.r_squared,
                observed_spend_range: (spend_min, spend_max),
                domain_max,
                saturation_spend: 0.0,
                low_confidence: false,
            };
            curve.saturation_spend = curve.saturation_point(self.config.marginal_threshold);
            return Ok(curve);
        }

        // Flat-ROAS fallback over the fitting pairs.
        let total_spend: f64 = spend.sum();
        let total_revenue: f64 = revenue.sum();
        let k = total_revenue / total_spend;
        warn!(
            channel,
            r_squared = outcome.r_squared,
            converged = outcome.converged,
            roas = k,
            "saturating fit rejected, using flat-ROAS fallback"
        );

        Ok(ResponseCurve {
            channel: channel.to_string(),
            form: CurveForm::FlatRoas { k },
            r_squared: outcome.r_squared.max(0.0),
            observed_spend_range: (spend_min, spend_max),
            domain_max,
            saturation_spend: domain_max,
            low_confidence: true,
        })
    }

    /// Fit plus derived quantities: saturation point, spend baselines,
    /// efficiency status, and the sampled marginal-returns curve.
    pub fn analyze(
        &self,
        channel: &str,
        records: &[DailyChannelRecord],
    ) -> MixResult<SaturationAnalysis> {
        let curve = self.fit(channel, records)?;

        let rows: Vec<&DailyChannelRecord> =
            records.iter().filter(|r| r.channel == channel).collect();
        let avg_daily_spend = mean_spend(&rows);

        let last_date = rows.iter().map(|r| r.date).max();
        let current_spend = match last_date {
            Some(end) => {
                let recent_start = end - chrono::Duration::days(self.config.recent_window_days - 1);
                let recent: Vec<&DailyChannelRecord> = rows
                    .iter()
                    .filter(|r| r.date >= recent_start)
                    .cloned()
                    .collect();
                mean_spend(&recent)
            }
            None => 0.0,
        };

        let saturation_point = curve.saturation_spend;
        let efficiency_status = EfficiencyStatus::classify(current_spend, saturation_point);
        let marginal_returns_curve =
            self.sample_marginal_returns(&curve, 2.0 * saturation_point);

        Ok(SaturationAnalysis {
            channel: channel.to_string(),
            saturation_point,
            current_spend,
            avg_daily_spend,
            efficiency_status,
            marginal_returns_curve,
            low_confidence: curve.low_confidence,
            curve,
            computed_at: Utc::now(),
        })
    }

    fn sample_marginal_returns(
        &self,
        curve: &ResponseCurve,
        span: f64,
    ) -> Vec<MarginalReturnPoint> {
        let points = self.config.curve_sample_points.max(2);
        (0..points)
            .map(|i| {
                let spend = span * i as f64 / (points - 1) as f64;
                MarginalReturnPoint {
                    spend,
                    marginal_roas: curve.marginal_return_at(spend),
                }
            })
            .collect()
    }
}

impl Default for SaturationEstimator {
    fn default() -> Self {
        Self::new(SaturationConfig::default())
    }
}

fn mean_spend(rows: &[&DailyChannelRecord]) -> f64 {
    if rows.is_empty() {
        return 0.0;
    }
    rows.iter().map(|r| r.spend).sum::<f64>() / rows.len() as f64
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
