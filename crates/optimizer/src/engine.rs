//! Water-filling budget optimizer.
//!
//! Awards the budget one increment at a time to the channel with the highest
//! marginal return at its running allocation. With every response curve
//! concave this equalizes marginal returns across unconstrained channels,
//! which is the continuous optimum of the allocation problem up to one
//! increment of discretization error.

use crate::plan::{AllocationPlan, Priority, Recommendation, RecommendedAction, SpendBounds};
use chrono::Utc;
use mix_core::config::OptimizerConfig;
use mix_core::error::{MixError, MixResult};
use mix_response::{EfficiencyStatus, ResponseCurve};
use std::collections::BTreeMap;
use tracing::{debug, info};

pub struct BudgetOptimizer {
    config: OptimizerConfig,
}

impl BudgetOptimizer {
    pub fn new(config: OptimizerConfig) -> Self {
        Self { config }
    }

    /// Solve the single-period allocation over the given fitted curves.
    ///
    /// Validation happens before any allocation work: a negative budget,
    /// a bound with min > max or a negative min, or bound minimums that
    /// already exceed the budget are all rejected as `InvalidBudget`.
    /// An increment too fine for the budget is rejected as
    /// `IterationCeilingExceeded` — never a partial or overshooting plan.
    pub fn optimize(
        &self,
        curves: &BTreeMap<String, ResponseCurve>,
        current_spend: &BTreeMap<String, f64>,
        total_budget: f64,
        bounds: &BTreeMap<String, SpendBounds>,
    ) -> MixResult<AllocationPlan> {
        if curves.is_empty() {
            return Err(MixError::InvalidBudget(
                "no response curves to allocate across".to_string(),
            ));
        }
        if total_budget < 0.0 || !total_budget.is_finite() {
            return Err(MixError::InvalidBudget(format!(
                "total budget must be non-negative, got {total_budget}"
            )));
        }
        for (channel, b) in bounds {
            if b.min < 0.0 {
                return Err(MixError::InvalidBudget(format!(
                    "channel '{channel}' has a negative bound minimum"
                )));
            }
            if b.min > b.max {
                return Err(MixError::InvalidBudget(format!(
                    "channel '{channel}' has bound min {} above max {}",
                    b.min, b.max
                )));
            }
        }

        // Start every channel at its bound minimum.
        let mut allocation: BTreeMap<&str, f64> = curves
            .keys()
            .map(|channel| {
                let min = bounds.get(channel).map(|b| b.min).unwrap_or(0.0);
                (channel.as_str(), min)
            })
            .collect();

        let committed: f64 = allocation.values().sum();
        if committed > total_budget {
            return Err(MixError::InvalidBudget(format!(
                "bound minimums total {committed}, exceeding the budget {total_budget}"
            )));
        }

        let increment = self
            .config
            .increment
            .unwrap_or(total_budget / self.config.max_increments as f64)
            .max(self.config.min_increment);
        let mut remaining = total_budget - committed;

        let required = (remaining / increment).ceil() as usize;
        if required > self.config.max_increments {
            return Err(MixError::IterationCeilingExceeded {
                required,
                ceiling: self.config.max_increments,
            });
        }

        debug!(
            channels = curves.len(),
            total_budget,
            increment,
            required,
            "starting water-filling allocation"
        );

        // Partial awards at a bound maximum retire that channel, so the loop
        // runs at most `required` full steps plus one per channel.
        let step_ceiling = required + curves.len();
        let mut steps = 0usize;
        while remaining > 1e-9 {
            steps += 1;
            if steps > step_ceiling {
                return Err(MixError::IterationCeilingExceeded {
                    required: steps,
                    ceiling: step_ceiling,
                });
            }

            let best = curves
                .iter()
                .filter_map(|(channel, curve)| {
                    let spent = allocation[channel.as_str()];
                    let max = bounds
                        .get(channel)
                        .map(|b| b.max)
                        .unwrap_or(f64::INFINITY);
                    if spent + 1e-9 >= max {
                        return None;
                    }
                    Some((channel.as_str(), curve.marginal_return_at(spent), max))
                })
                .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

            let (channel, _, max) = match best {
                Some(b) => b,
                // Every channel is at its maximum; leave the rest unspent
                // rather than overshoot a bound.
                None => break,
            };

            let headroom = max - allocation[channel];
            let award = increment.min(remaining).min(headroom);
            if let Some(spent) = allocation.get_mut(channel) {
                *spent += award;
            }
            remaining -= award;
        }

        let projected_revenue: f64 = curves
            .iter()
            .map(|(channel, curve)| curve.revenue_at(allocation[channel.as_str()]))
            .sum();
        let current_revenue: f64 = curves
            .iter()
            .map(|(channel, curve)| {
                curve.revenue_at(current_spend.get(channel).copied().unwrap_or(0.0))
            })
            .sum();
        let revenue_lift = projected_revenue - current_revenue;
        let current_total: f64 = curves
            .keys()
            .map(|channel| current_spend.get(channel).copied().unwrap_or(0.0))
            .sum();
        let roi_improvement = if current_total > 0.0 {
            revenue_lift / current_total * 100.0
        } else {
            0.0
        };

        let recommendations = self.recommendations(curves, current_spend, &allocation);

        info!(
            total_budget,
            allocated = total_budget - remaining,
            projected_revenue,
            revenue_lift,
            "allocation plan built"
        );

        Ok(AllocationPlan {
            total_budget,
            optimized_allocation: allocation
                .into_iter()
                .map(|(c, v)| (c.to_string(), v))
                .collect(),
            projected_revenue,
            current_revenue,
            revenue_lift,
            roi_improvement,
            recommendations,
            computed_at: Utc::now(),
        })
    }

    /// Derive per-channel moves from the optimized allocation.
    ///
    /// Action is increase/decrease outside a +-5% band around current spend.
    /// Priority is high when the relative change exceeds the configured
    /// fraction or the channel is over-saturated/under-invested on its own
    /// curve, medium above half that fraction, low otherwise.
    fn recommendations(
        &self,
        curves: &BTreeMap<String, ResponseCurve>,
        current_spend: &BTreeMap<String, f64>,
        allocation: &BTreeMap<&str, f64>,
    ) -> Vec<Recommendation> {
        let mut recommendations: Vec<Recommendation> = curves
            .iter()
            .map(|(channel, curve)| {
                let current = current_spend.get(channel).copied().unwrap_or(0.0);
                let recommended = allocation[channel.as_str()];
                let change = recommended - current;

                let action = if recommended > current * (1.0 + self.config.action_threshold) {
                    RecommendedAction::Increase
                } else if recommended < current * (1.0 - self.config.action_threshold) {
                    RecommendedAction::Decrease
                } else {
                    RecommendedAction::Maintain
                };

                let relative = if current > 0.0 {
                    change.abs() / current
                } else if change.abs() > 0.0 {
                    f64::INFINITY
                } else {
                    0.0
                };
                let efficiency =
                    EfficiencyStatus::classify(current, curve.saturation_spend);
                let priority = if relative > self.config.high_priority_fraction
                    || efficiency != EfficiencyStatus::Efficient
                {
                    Priority::High
                } else if relative > self.config.high_priority_fraction / 2.0 {
                    Priority::Medium
                } else {
                    Priority::Low
                };

                Recommendation {
                    channel: channel.clone(),
                    action,
                    current_spend: current,
                    recommended_spend: recommended,
                    change_amount: change,
                    change_percentage: if current > 0.0 {
                        change / current * 100.0
                    } else {
                        0.0
                    },
                    priority,
                }
            })
            .collect();

        recommendations.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then_with(|| {
                    b.change_amount
                        .abs()
                        .partial_cmp(&a.change_amount.abs())
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
        });
        recommendations
    }
}

impl Default for BudgetOptimizer {
    fn default() -> Self {
        Self::new(OptimizerConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use mix_response::CurveForm;

    fn curve(channel: &str, a: f64, b: f64) -> (String, ResponseCurve) {
        (
            channel.to_string(),
            ResponseCurve {
                channel: channel.to_string(),
                form: CurveForm::Saturating { a, b },
                r_squared: 0.95,
                observed_spend_range: (100.0, 10_000.0),
                domain_max: 20_000.0,
                saturation_spend: (5.0_f64).ln() / b,
                low_confidence: false,
            },
        )
    }

    fn two_channel_curves() -> BTreeMap<String, ResponseCurve> {
        [
            curve("A", 50_000.0, 0.0005),
            curve("B", 20_000.0, 0.002),
        ]
        .into_iter()
        .collect()
    }

    fn spend(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
        pairs.iter().map(|(c, v)| (c.to_string(), *v)).collect()
    }

    // 1. Validation ---------------------------------------------------------

    #[test]
    fn test_negative_budget_is_rejected() {
        let optimizer = BudgetOptimizer::default();
        let err = optimizer
            .optimize(&two_channel_curves(), &spend(&[]), -1.0, &BTreeMap::new())
            .unwrap_err();
        assert!(matches!(err, MixError::InvalidBudget(_)));
    }

    #[test]
    fn test_inverted_bounds_are_rejected() {
        let optimizer = BudgetOptimizer::default();
        let bounds = [(
            "A".to_string(),
            SpendBounds {
                min: 5_000.0,
                max: 1_000.0,
            },
        )]
        .into_iter()
        .collect();
        let err = optimizer
            .optimize(&two_channel_curves(), &spend(&[]), 10_000.0, &bounds)
            .unwrap_err();
        assert!(matches!(err, MixError::InvalidBudget(_)));
    }

    #[test]
    fn test_minimums_exceeding_budget_are_rejected() {
        let optimizer = BudgetOptimizer::default();
        let bounds = [
            ("A".to_string(), SpendBounds { min: 6_000.0, max: f64::INFINITY }),
            ("B".to_string(), SpendBounds { min: 6_000.0, max: f64::INFINITY }),
        ]
        .into_iter()
        .collect();
        let err = optimizer
            .optimize(&two_channel_curves(), &spend(&[]), 10_000.0, &bounds)
            .unwrap_err();
        assert!(matches!(err, MixError::InvalidBudget(_)));
    }

    #[test]
    fn test_too_fine_an_increment_hits_the_ceiling() {
        let config = OptimizerConfig {
            increment: Some(1.0),
            ..OptimizerConfig::default()
        };
        let optimizer = BudgetOptimizer::new(config);
        let err = optimizer
            .optimize(
                &two_channel_curves(),
                &spend(&[]),
                100_000.0,
                &BTreeMap::new(),
            )
            .unwrap_err();
        match err {
            MixError::IterationCeilingExceeded { required, ceiling } => {
                assert_eq!(required, 100_000);
                assert_eq!(ceiling, 1_000);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    // 2. Allocation behavior ------------------------------------------------

    #[test]
    fn test_allocation_conserves_budget() {
        let optimizer = BudgetOptimizer::default();
        let plan = optimizer
            .optimize(
                &two_channel_curves(),
                &spend(&[("A", 5_000.0), ("B", 5_000.0)]),
                10_000.0,
                &BTreeMap::new(),
            )
            .unwrap();

        assert!((plan.allocated_total() - 10_000.0).abs() < 1e-6);
        assert!(plan.optimized_allocation.values().all(|&v| v >= 0.0));
    }

    #[test]
    fn test_marginal_returns_equalize_across_channels() {
        // A (a=50000, b=0.0005) vs B (a=20000, b=0.002), budget 10000,
        // no bounds. B wins early increments (higher a*b),
        // A wins the bulk as B saturates; the final marginal returns agree
        // within one increment's drift.
        let curves = two_channel_curves();
        let optimizer = BudgetOptimizer::default();
        let plan = optimizer
            .optimize(&curves, &spend(&[]), 10_000.0, &BTreeMap::new())
            .unwrap();

        let alloc_a = plan.optimized_allocation["A"];
        let alloc_b = plan.optimized_allocation["B"];
        assert!(alloc_a > alloc_b, "A should end with the larger share");
        // Continuous optimum is A ~ 7812, B ~ 2188.
        assert!((alloc_a - 7_812.0).abs() < 100.0, "alloc_a = {alloc_a}");

        let m_a = curves["A"].marginal_return_at(alloc_a);
        let m_b = curves["B"].marginal_return_at(alloc_b);
        assert!(
            (m_a - m_b).abs() / m_a < 0.05,
            "marginal returns diverge: {m_a} vs {m_b}"
        );
    }

    #[test]
    fn test_first_increment_goes_to_the_steeper_curve() {
        // With a tiny budget everything lands on B, whose marginal return
        // at zero (a*b = 40) beats A's (25).
        let optimizer = BudgetOptimizer::default();
        let plan = optimizer
            .optimize(&two_channel_curves(), &spend(&[]), 100.0, &BTreeMap::new())
            .unwrap();

        assert!(plan.optimized_allocation["B"] > 0.0);
        assert!(plan.optimized_allocation["A"].abs() < 1e-9);
    }

    #[test]
    fn test_bounds_are_never_violated() {
        let curves = two_channel_curves();
        let bounds: BTreeMap<String, SpendBounds> = [
            ("A".to_string(), SpendBounds { min: 500.0, max: 3_000.0 }),
            ("B".to_string(), SpendBounds { min: 1_000.0, max: f64::INFINITY }),
        ]
        .into_iter()
        .collect();
        let optimizer = BudgetOptimizer::default();
        let plan = optimizer
            .optimize(&curves, &spend(&[]), 10_000.0, &bounds)
            .unwrap();

        let alloc_a = plan.optimized_allocation["A"];
        let alloc_b = plan.optimized_allocation["B"];
        assert!(alloc_a >= 500.0 - 1e-9 && alloc_a <= 3_000.0 + 1e-9);
        assert!(alloc_b >= 1_000.0 - 1e-9);
        // A's unconstrained share (~7812) is capped, so B absorbs the rest.
        assert!((alloc_a - 3_000.0).abs() < 1e-6);
        assert!((plan.allocated_total() - 10_000.0).abs() < 1e-6);
    }

    #[test]
    fn test_all_channels_capped_leaves_budget_unspent() {
        let curves = two_channel_curves();
        let bounds: BTreeMap<String, SpendBounds> = [
            ("A".to_string(), SpendBounds { min: 0.0, max: 1_000.0 }),
            ("B".to_string(), SpendBounds { min: 0.0, max: 1_000.0 }),
        ]
        .into_iter()
        .collect();
        let optimizer = BudgetOptimizer::default();
        let plan = optimizer
            .optimize(&curves, &spend(&[]), 10_000.0, &bounds)
            .unwrap();

        assert!((plan.allocated_total() - 2_000.0).abs() < 1e-6);
    }

    #[test]
    fn test_optimizer_is_a_fixed_point_on_its_own_output() {
        let curves = two_channel_curves();
        let optimizer = BudgetOptimizer::default();
        let first = optimizer
            .optimize(&curves, &spend(&[("A", 1_000.0), ("B", 9_000.0)]), 10_000.0, &BTreeMap::new())
            .unwrap();

        let second = optimizer
            .optimize(&curves, &first.optimized_allocation, 10_000.0, &BTreeMap::new())
            .unwrap();

        let increment = 10_000.0 / 1_000.0;
        for (channel, alloc) in &second.optimized_allocation {
            let prev = first.optimized_allocation[channel];
            assert!(
                (alloc - prev).abs() <= increment + 1e-6,
                "{channel} moved from {prev} to {alloc}"
            );
        }
        assert!(second
            .recommendations
            .iter()
            .all(|r| r.action == RecommendedAction::Maintain));
    }

    // 3. Projection and lift ------------------------------------------------

    #[test]
    fn test_lift_is_measured_on_the_curves_not_history() {
        let curves = two_channel_curves();
        let current = spend(&[("A", 8_000.0), ("B", 2_000.0)]);
        let optimizer = BudgetOptimizer::default();
        let plan = optimizer
            .optimize(&curves, &current, 10_000.0, &BTreeMap::new())
            .unwrap();

        let expected_current: f64 =
            curves["A"].revenue_at(8_000.0) + curves["B"].revenue_at(2_000.0);
        assert!((plan.current_revenue - expected_current).abs() < 1e-9);
        assert!((plan.revenue_lift - (plan.projected_revenue - plan.current_revenue)).abs() < 1e-9);
        // Reallocating toward the optimum can only help on the same curves.
        assert!(plan.revenue_lift >= -1e-6);
    }

    #[test]
    fn test_roi_improvement_guards_zero_current_spend() {
        let optimizer = BudgetOptimizer::default();
        let plan = optimizer
            .optimize(&two_channel_curves(), &spend(&[]), 10_000.0, &BTreeMap::new())
            .unwrap();
        assert!((plan.roi_improvement - 0.0).abs() < 1e-12);
        assert!(plan.roi_improvement.is_finite());
    }

    // 4. Recommendations ----------------------------------------------------

    #[test]
    fn test_actions_follow_the_five_percent_band() {
        let curves = two_channel_curves();
        let current = spend(&[("A", 7_800.0), ("B", 6_000.0)]);
        let optimizer = BudgetOptimizer::default();
        let plan = optimizer
            .optimize(&curves, &current, 10_000.0, &BTreeMap::new())
            .unwrap();

        // A ends near 7812 — within 5% of 7800 — while B drops hard.
        assert_eq!(
            plan.recommendation("A").unwrap().action,
            RecommendedAction::Maintain
        );
        assert_eq!(
            plan.recommendation("B").unwrap().action,
            RecommendedAction::Decrease
        );
    }

    #[test]
    fn test_large_relative_change_is_high_priority() {
        let curves = two_channel_curves();
        let current = spend(&[("A", 2_000.0), ("B", 8_000.0)]);
        let optimizer = BudgetOptimizer::default();
        let plan = optimizer
            .optimize(&curves, &current, 10_000.0, &BTreeMap::new())
            .unwrap();

        // A roughly quadruples and B collapses; both moves dwarf the 20%
        // high-priority fraction.
        assert_eq!(plan.recommendation("A").unwrap().priority, Priority::High);
        assert_eq!(plan.recommendation("B").unwrap().priority, Priority::High);
    }

    #[test]
    fn test_recommendations_sort_high_priority_first() {
        let curves = two_channel_curves();
        let current = spend(&[("A", 2_000.0), ("B", 8_000.0)]);
        let optimizer = BudgetOptimizer::default();
        let plan = optimizer
            .optimize(&curves, &current, 10_000.0, &BTreeMap::new())
            .unwrap();

        for pair in plan.recommendations.windows(2) {
            assert!(pair[0].priority <= pair[1].priority);
        }
    }
}
