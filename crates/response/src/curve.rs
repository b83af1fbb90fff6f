//! Fitted revenue-response curves.

use serde::{Deserialize, Serialize};

/// The functional form a channel's revenue response was fitted to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "form")]
pub enum CurveForm {
    /// `revenue(spend) = a * (1 - e^(-b * spend))`, a and b positive.
    Saturating { a: f64, b: f64 },
    /// `revenue(spend) = k * spend` — the flat-ROAS fallback used when the
    /// saturating fit is rejected.
    FlatRoas { k: f64 },
}

/// A per-channel response curve fitted from one data window. Owned by the
/// caller; the estimator never caches these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseCurve {
    pub channel: String,
    pub form: CurveForm,
    /// Goodness of fit on the positive-spend pairs the fit used.
    pub r_squared: f64,
    /// (min, max) observed positive spend in the fitting window.
    pub observed_spend_range: (f64, f64),
    /// Upper end of the curve's valid domain: max observed spend times the
    /// extrapolation factor.
    pub domain_max: f64,
    /// Spend at which marginal return decays to the configured fraction of
    /// its value at zero spend. For a flat-ROAS curve the marginal return
    /// never decays, so this reports the domain end instead.
    pub saturation_spend: f64,
    /// Set on flat-ROAS fallbacks; downstream consumers must not treat the
    /// saturation spend of a low-confidence curve as a fitted knee.
    pub low_confidence: bool,
}

impl ResponseCurve {
    /// Projected revenue at a spend level. Negative spend is clamped to 0.
    pub fn revenue_at(&self, spend: f64) -> f64 {
        let spend = spend.max(0.0);
        match self.form {
            CurveForm::Saturating { a, b } => a * (1.0 - (-b * spend).exp()),
            CurveForm::FlatRoas { k } => k * spend,
        }
    }

    /// Derivative of the response at a spend level (marginal ROAS).
    pub fn marginal_return_at(&self, spend: f64) -> f64 {
        let spend = spend.max(0.0);
        match self.form {
            CurveForm::Saturating { a, b } => a * b * (-b * spend).exp(),
            CurveForm::FlatRoas { k } => k,
        }
    }

    /// Spend at which the marginal return falls to `threshold` times the
    /// marginal return at zero: `e^(-b * s) = threshold`.
    pub fn saturation_point(&self, threshold: f64) -> f64 {
        match self.form {
            CurveForm::Saturating { b, .. } => (1.0 / threshold).ln() / b,
            CurveForm::FlatRoas { .. } => self.domain_max,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn saturating(a: f64, b: f64) -> ResponseCurve {
        ResponseCurve {
            channel: "test".to_string(),
            form: CurveForm::Saturating { a, b },
            r_squared: 0.95,
            observed_spend_range: (100.0, 5_000.0),
            domain_max: 10_000.0,
            saturation_spend: (5.0_f64).ln() / b,
            low_confidence: false,
        }
    }

    #[test]
    fn test_saturating_revenue_approaches_asymptote() {
        let curve = saturating(30_000.0, 0.001);
        assert!(curve.revenue_at(0.0).abs() < 1e-12);
        assert!(curve.revenue_at(10_000.0) < 30_000.0);
        assert!(curve.revenue_at(10_000.0) > 29_000.0);
    }

    #[test]
    fn test_marginal_return_at_zero_is_a_times_b() {
        let curve = saturating(30_000.0, 0.001);
        assert!((curve.marginal_return_at(0.0) - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_saturation_point_matches_threshold_decay() {
        let curve = saturating(30_000.0, 0.0005);
        let s = curve.saturation_point(0.2);
        // At the saturation point the marginal return is 20% of its value
        // at zero spend.
        let ratio = curve.marginal_return_at(s) / curve.marginal_return_at(0.0);
        assert!((ratio - 0.2).abs() < 1e-9);
        assert!((s - (5.0_f64).ln() / 0.0005).abs() < 1e-6);
    }

    #[test]
    fn test_flat_roas_has_constant_marginal_return() {
        let curve = ResponseCurve {
            channel: "test".to_string(),
            form: CurveForm::FlatRoas { k: 2.5 },
            r_squared: 0.0,
            observed_spend_range: (10.0, 500.0),
            domain_max: 1_000.0,
            saturation_spend: 1_000.0,
            low_confidence: true,
        };
        assert!((curve.marginal_return_at(0.0) - 2.5).abs() < 1e-12);
        assert!((curve.marginal_return_at(900.0) - 2.5).abs() < 1e-12);
        assert!((curve.revenue_at(400.0) - 1_000.0).abs() < 1e-9);
        assert!((curve.saturation_point(0.2) - 1_000.0).abs() < 1e-12);
    }

    #[test]
    fn test_negative_spend_is_clamped() {
        let curve = saturating(30_000.0, 0.001);
        assert!(curve.revenue_at(-50.0).abs() < 1e-12);
        assert!((curve.marginal_return_at(-50.0) - curve.marginal_return_at(0.0)).abs() < 1e-12);
    }
}
