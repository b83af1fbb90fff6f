//! Multi-model revenue attribution — fractional credit assignment across
//! channels under linear, time-decay, u-shaped, and data-driven models,
//! plus cross-model comparison reporting.

pub mod comparison;
pub mod engine;

pub use comparison::{ComparisonReporter, ModelComparison};
pub use engine::{AttributionEngine, AttributionModel, AttributionReport};
