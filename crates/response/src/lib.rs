//! Response-curve estimation — fits a diminishing-returns revenue curve per
//! channel from daily spend/revenue pairs and derives saturation points,
//! marginal returns, and efficiency classifications.

pub mod curve;
pub mod estimator;
mod fit;

pub use curve::{CurveForm, ResponseCurve};
pub use estimator::{EfficiencyStatus, SaturationAnalysis, SaturationEstimator};
