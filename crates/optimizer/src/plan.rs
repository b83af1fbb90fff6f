//! Allocation plans and the recommendation records derived from them.
//! A plan is built once per request and never mutated afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-channel allocation limits. `max` defaults to unbounded.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SpendBounds {
    #[serde(default)]
    pub min: f64,
    #[serde(default = "unbounded")]
    pub max: f64,
}

fn unbounded() -> f64 {
    f64::INFINITY
}

impl Default for SpendBounds {
    fn default() -> Self {
        Self {
            min: 0.0,
            max: f64::INFINITY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendedAction {
    Increase,
    Decrease,
    Maintain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
    Low,
}

/// One channel's spend move, derived deterministically from the plan and
/// the channel's current spend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub channel: String,
    pub action: RecommendedAction,
    pub current_spend: f64,
    pub recommended_spend: f64,
    pub change_amount: f64,
    /// Relative change on the 0–100 scale; 0 when there is no current spend
    /// to compare against.
    pub change_percentage: f64,
    pub priority: Priority,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationPlan {
    pub total_budget: f64,
    /// Non-negative per-channel spend summing to the budget (within one
    /// increment) unless every channel hit its bound maximum first.
    pub optimized_allocation: BTreeMap<String, f64>,
    pub projected_revenue: f64,
    /// Revenue the curves project at the channels' current spend — the lift
    /// baseline, intentionally not the raw historical revenue.
    pub current_revenue: f64,
    pub revenue_lift: f64,
    /// Lift relative to current total spend, 0–100 scale.
    pub roi_improvement: f64,
    pub recommendations: Vec<Recommendation>,
    pub computed_at: DateTime<Utc>,
}

impl AllocationPlan {
    pub fn allocated_total(&self) -> f64 {
        self.optimized_allocation.values().sum()
    }

    pub fn recommendation(&self, channel: &str) -> Option<&Recommendation> {
        self.recommendations.iter().find(|r| r.channel == channel)
    }
}
