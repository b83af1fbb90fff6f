use crate::error::{MixError, MixResult};
use serde::Deserialize;

/// Engine tunables. Loaded from a `channel-mix.toml` file and environment
/// variables with the prefix `CHANNEL_MIX__`; every field has a default so
/// an empty environment yields the design defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub attribution: AttributionConfig,
    #[serde(default)]
    pub saturation: SaturationConfig,
    #[serde(default)]
    pub optimizer: OptimizerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AttributionConfig {
    /// Half-life in days for the time-decay model.
    #[serde(default = "default_half_life_days")]
    pub half_life_days: f64,
    /// Width of the last-touch window for the u-shaped model.
    #[serde(default = "default_last_touch_window_days")]
    pub last_touch_window_days: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SaturationConfig {
    /// Saturation is where marginal return falls to this fraction of the
    /// marginal return at zero spend.
    #[serde(default = "default_marginal_threshold")]
    pub marginal_threshold: f64,
    /// Curve domain extends to max observed spend times this factor.
    #[serde(default = "default_extrapolation_factor")]
    pub extrapolation_factor: f64,
    /// Fits below this R² are rejected in favor of the flat-ROAS fallback.
    #[serde(default = "default_min_r_squared")]
    pub min_r_squared: f64,
    #[serde(default = "default_fit_max_iterations")]
    pub fit_max_iterations: usize,
    /// Points sampled for the marginal-returns plotting curve.
    #[serde(default = "default_curve_sample_points")]
    pub curve_sample_points: usize,
    /// Trailing window defining "current" daily spend.
    #[serde(default = "default_recent_window_days")]
    pub recent_window_days: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OptimizerConfig {
    /// Hard ceiling on water-filling increments.
    #[serde(default = "default_max_increments")]
    pub max_increments: usize,
    /// Increments never shrink below this many currency units.
    #[serde(default = "default_min_increment")]
    pub min_increment: f64,
    /// Explicit increment size; when unset, `total_budget / max_increments`.
    #[serde(default)]
    pub increment: Option<f64>,
    /// Relative change below which a recommendation is "maintain".
    #[serde(default = "default_action_threshold")]
    pub action_threshold: f64,
    /// Relative change above which a recommendation is high priority.
    #[serde(default = "default_high_priority_fraction")]
    pub high_priority_fraction: f64,
}

impl EngineConfig {
    pub fn load() -> MixResult<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name("channel-mix").required(false))
            .add_source(config::Environment::with_prefix("CHANNEL_MIX").separator("__"))
            .build()
            .map_err(|e| MixError::Config(e.to_string()))?;

        settings
            .try_deserialize()
            .map_err(|e| MixError::Config(e.to_string()))
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            attribution: AttributionConfig::default(),
            saturation: SaturationConfig::default(),
            optimizer: OptimizerConfig::default(),
        }
    }
}

impl Default for AttributionConfig {
    fn default() -> Self {
        Self {
            half_life_days: default_half_life_days(),
            last_touch_window_days: default_last_touch_window_days(),
        }
    }
}

impl Default for SaturationConfig {
    fn default() -> Self {
        Self {
            marginal_threshold: default_marginal_threshold(),
            extrapolation_factor: default_extrapolation_factor(),
            min_r_squared: default_min_r_squared(),
            fit_max_iterations: default_fit_max_iterations(),
            curve_sample_points: default_curve_sample_points(),
            recent_window_days: default_recent_window_days(),
        }
    }
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            max_increments: default_max_increments(),
            min_increment: default_min_increment(),
            increment: None,
            action_threshold: default_action_threshold(),
            high_priority_fraction: default_high_priority_fraction(),
        }
    }
}

// Default functions
fn default_half_life_days() -> f64 {
    7.0
}
fn default_last_touch_window_days() -> i64 {
    3
}
fn default_marginal_threshold() -> f64 {
    0.2
}
fn default_extrapolation_factor() -> f64 {
    2.0
}
fn default_min_r_squared() -> f64 {
    0.1
}
fn default_fit_max_iterations() -> usize {
    200
}
fn default_curve_sample_points() -> usize {
    20
}
fn default_recent_window_days() -> i64 {
    7
}
fn default_max_increments() -> usize {
    1000
}
fn default_min_increment() -> f64 {
    1.0
}
fn default_action_threshold() -> f64 {
    0.05
}
fn default_high_priority_fraction() -> f64 {
    0.2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_design_values() {
        let cfg = EngineConfig::default();
        assert!((cfg.attribution.half_life_days - 7.0).abs() < f64::EPSILON);
        assert_eq!(cfg.attribution.last_touch_window_days, 3);
        assert!((cfg.saturation.marginal_threshold - 0.2).abs() < f64::EPSILON);
        assert_eq!(cfg.saturation.fit_max_iterations, 200);
        assert_eq!(cfg.saturation.curve_sample_points, 20);
        assert_eq!(cfg.optimizer.max_increments, 1000);
        assert!((cfg.optimizer.min_increment - 1.0).abs() < f64::EPSILON);
        assert!(cfg.optimizer.increment.is_none());
    }
}
