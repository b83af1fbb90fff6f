//! Budget scenario comparison — runs the optimizer once per candidate
//! budget and ranks the outcomes by ROI.

use crate::engine::BudgetOptimizer;
use crate::plan::SpendBounds;
use chrono::{DateTime, Utc};
use mix_core::error::MixResult;
use mix_response::ResponseCurve;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioRequest {
    pub name: String,
    pub total_budget: f64,
    #[serde(default)]
    pub bounds: BTreeMap<String, SpendBounds>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioOutcome {
    pub name: String,
    pub total_budget: f64,
    pub projected_revenue: f64,
    pub revenue_lift: f64,
    /// Projected revenue per budget unit (0 for a zero budget).
    pub roi: f64,
    pub allocation: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioComparison {
    pub scenarios: Vec<ScenarioOutcome>,
    /// Name of the highest-ROI scenario; absent when no scenarios were given.
    pub best_scenario: Option<String>,
    pub computed_at: DateTime<Utc>,
}

impl BudgetOptimizer {
    /// Optimize each scenario against the same fitted curves and current
    /// spend. Any invalid scenario fails the whole comparison; partial
    /// comparisons would silently drop a requested scenario.
    pub fn simulate_scenarios(
        &self,
        curves: &BTreeMap<String, ResponseCurve>,
        current_spend: &BTreeMap<String, f64>,
        scenarios: &[ScenarioRequest],
    ) -> MixResult<ScenarioComparison> {
        let mut outcomes = Vec::with_capacity(scenarios.len());

        for scenario in scenarios {
            let plan = self.optimize(
                curves,
                current_spend,
                scenario.total_budget,
                &scenario.bounds,
            )?;
            let roi = if scenario.total_budget > 0.0 {
                plan.projected_revenue / scenario.total_budget
            } else {
                0.0
            };
            debug!(name = %scenario.name, budget = scenario.total_budget, roi, "scenario evaluated");
            outcomes.push(ScenarioOutcome {
                name: scenario.name.clone(),
                total_budget: scenario.total_budget,
                projected_revenue: plan.projected_revenue,
                revenue_lift: plan.revenue_lift,
                roi,
                allocation: plan.optimized_allocation,
            });
        }

        let best_scenario = outcomes
            .iter()
            .max_by(|a, b| a.roi.partial_cmp(&b.roi).unwrap_or(std::cmp::Ordering::Equal))
            .map(|o| o.name.clone());

        Ok(ScenarioComparison {
            scenarios: outcomes,
            best_scenario,
            computed_at: Utc::now(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
