//! Cross-model comparison — runs every attribution model over one range and
//! reports how much the channel shares disagree, plus which model is the
//! most stable choice.

use crate::engine::{AttributionEngine, AttributionModel, AttributionReport};
use chrono::{DateTime, Utc};
use mix_core::config::AttributionConfig;
use mix_core::types::{DailyChannelRecord, DateRange};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Spread of one channel's percentage share across the four models.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VarianceStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub variance: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelComparison {
    pub range: DateRange,
    /// Per-model attribution results, keyed by model name.
    pub models: BTreeMap<String, AttributionReport>,
    /// Per-channel spread of percentage shares across models.
    pub channel_variance: BTreeMap<String, VarianceStats>,
    pub recommended_model: AttributionModel,
    pub recommendation: String,
    pub computed_at: DateTime<Utc>,
}

/// Thin composition layer over [`AttributionEngine`]: same inputs, all
/// models at once.
pub struct ComparisonReporter {
    engine: AttributionEngine,
}

impl ComparisonReporter {
    pub fn new(config: AttributionConfig) -> Self {
        Self {
            engine: AttributionEngine::new(config),
        }
    }

    pub fn compare(&self, records: &[DailyChannelRecord], range: DateRange) -> ModelComparison {
        let reports: Vec<AttributionReport> = AttributionModel::ALL
            .iter()
            .map(|&model| self.engine.attribute(records, range, model))
            .collect();

        // channel -> percentage per model, in ALL order.
        let mut shares: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        for report in &reports {
            for c in &report.channels {
                shares
                    .entry(c.channel.clone())
                    .or_insert_with(Vec::new)
                    .push(c.percentage);
            }
        }

        let channel_variance: BTreeMap<String, VarianceStats> = shares
            .iter()
            .map(|(channel, pcts)| (channel.clone(), Self::stats(pcts)))
            .collect();

        let recommended_model = Self::most_stable_model(&reports, &channel_variance);
        let recommendation = format!(
            "{} attribution is the most stable choice: its channel shares sit closest \
             to the cross-model mean for this period",
            recommended_model.name()
        );

        debug!(
            recommended = recommended_model.name(),
            channels = channel_variance.len(),
            "model comparison complete"
        );

        ModelComparison {
            range,
            models: reports
                .into_iter()
                .map(|r| (r.model.name().to_string(), r))
                .collect(),
            channel_variance,
            recommended_model,
            recommendation,
            computed_at: Utc::now(),
        }
    }

    fn stats(values: &[f64]) -> VarianceStats {
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        VarianceStats {
            min,
            max,
            mean,
            variance,
        }
    }

    /// The model whose shares deviate least from the cross-model mean share,
    /// channel by channel. Ties prefer data_driven, then u_shaped, then
    /// time_decay, then linear.
    fn most_stable_model(
        reports: &[AttributionReport],
        channel_variance: &BTreeMap<String, VarianceStats>,
    ) -> AttributionModel {
        const PREFERENCE: [AttributionModel; 4] = [
            AttributionModel::DataDriven,
            AttributionModel::UShaped,
            AttributionModel::TimeDecay,
            AttributionModel::Linear,
        ];

        let mut best = PREFERENCE[0];
        let mut best_score = f64::INFINITY;

        for &model in &PREFERENCE {
            let report = match reports.iter().find(|r| r.model == model) {
                Some(r) => r,
                None => continue,
            };
            let mut score = 0.0;
            let mut count = 0usize;
            for c in &report.channels {
                if let Some(stats) = channel_variance.get(&c.channel) {
                    score += (c.percentage - stats.mean).powi(2);
                    count += 1;
                }
            }
            if count > 0 {
                score /= count as f64;
            }
            if score < best_score {
                best_score = score;
                best = model;
            }
        }
        best
    }
}

impl Default for ComparisonReporter {
    fn default() -> Self {
        Self::new(AttributionConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
