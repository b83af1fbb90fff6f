//! Levenberg-Marquardt least squares for the two-parameter saturating
//! response `revenue = a * (1 - e^(-b * spend))`. The normal equations are
//! 2x2, so the damped Gauss-Newton step is solved in closed form.

use ndarray::Array1;

pub(crate) struct FitOutcome {
    pub a: f64,
    pub b: f64,
    pub r_squared: f64,
    pub iterations: usize,
    pub converged: bool,
}

const LAMBDA_INIT: f64 = 1e-3;
const LAMBDA_MAX: f64 = 1e12;
const STEP_TOLERANCE: f64 = 1e-8;
const SSE_TOLERANCE: f64 = 1e-12;

/// Fit `a * (1 - e^(-b * spend))` to the given positive-spend pairs.
///
/// Initial guess: a = 1.5x the observed max revenue, b = 1 / mean spend.
/// The damping factor grows on rejected steps and shrinks on accepted ones;
/// steps that would push a or b non-positive are rejected outright.
pub(crate) fn fit_saturating(
    spend: &Array1<f64>,
    revenue: &Array1<f64>,
    max_iterations: usize,
) -> FitOutcome {
    let n = spend.len();
    debug_assert_eq!(n, revenue.len());

    let max_revenue = revenue.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let mean_spend = spend.sum() / n as f64;

    let mut a = (1.5 * max_revenue).max(f64::MIN_POSITIVE);
    let mut b = 1.0 / mean_spend;
    let mut sse = sum_squared_error(spend, revenue, a, b);
    let mut lambda = LAMBDA_INIT;
    let mut converged = false;
    let mut iterations = 0;

    while iterations < max_iterations {
        iterations += 1;

        let exp_term = spend.mapv(|x| (-b * x).exp());
        let j_a = exp_term.mapv(|e| 1.0 - e);
        let j_b = spend * &exp_term * a;
        let residual = revenue - &(&j_a * a);

        let jtj_aa: f64 = j_a.iter().map(|v| v * v).sum();
        let jtj_bb: f64 = j_b.iter().map(|v| v * v).sum();
        let jtj_ab: f64 = j_a.iter().zip(j_b.iter()).map(|(x, y)| x * y).sum();
        let jtr_a: f64 = j_a.iter().zip(residual.iter()).map(|(x, r)| x * r).sum();
        let jtr_b: f64 = j_b.iter().zip(residual.iter()).map(|(x, r)| x * r).sum();

        // Damped normal equations: (JtJ + lambda * diag(JtJ)) delta = Jtr.
        let m_aa = jtj_aa * (1.0 + lambda);
        let m_bb = jtj_bb * (1.0 + lambda);
        let det = m_aa * m_bb - jtj_ab * jtj_ab;
        if det.abs() < f64::MIN_POSITIVE || !det.is_finite() {
            lambda *= 10.0;
            if lambda > LAMBDA_MAX {
                break;
            }
            continue;
        }

        let delta_a = (jtr_a * m_bb - jtr_b * jtj_ab) / det;
        let delta_b = (jtr_b * m_aa - jtr_a * jtj_ab) / det;
        let next_a = a + delta_a;
        let next_b = b + delta_b;

        if next_a <= 0.0 || next_b <= 0.0 || !next_a.is_finite() || !next_b.is_finite() {
            lambda *= 10.0;
            if lambda > LAMBDA_MAX {
                break;
            }
            continue;
        }

        let next_sse = sum_squared_error(spend, revenue, next_a, next_b);
        if next_sse < sse {
            let step_small = delta_a.abs() <= STEP_TOLERANCE * a.abs()
                && delta_b.abs() <= STEP_TOLERANCE * b.abs();
            let sse_small = (sse - next_sse) <= SSE_TOLERANCE * sse.max(1.0);

            a = next_a;
            b = next_b;
            sse = next_sse;
            lambda = (lambda / 10.0).max(1e-12);

            if step_small || sse_small {
                converged = true;
                break;
            }
        } else {
            lambda *= 10.0;
            if lambda > LAMBDA_MAX {
                break;
            }
        }
    }

    FitOutcome {
        a,
        b,
        r_squared: r_squared(spend, revenue, a, b),
        iterations,
        converged,
    }
}

fn sum_squared_error(spend: &Array1<f64>, revenue: &Array1<f64>, a: f64, b: f64) -> f64 {
    spend
        .iter()
        .zip(revenue.iter())
        .map(|(x, y)| {
            let predicted = a * (1.0 - (-b * x).exp());
            (y - predicted).powi(2)
        })
        .sum()
}

/// Coefficient of determination. A zero-variance revenue series reports 0,
/// never NaN, so callers reject it toward the flat-ROAS fallback.
fn r_squared(spend: &Array1<f64>, revenue: &Array1<f64>, a: f64, b: f64) -> f64 {
    let n = revenue.len() as f64;
    let mean = revenue.sum() / n;
    let sst: f64 = revenue.iter().map(|y| (y - mean).powi(2)).sum();
    if sst <= 0.0 {
        return 0.0;
    }
    1.0 - sum_squared_error(spend, revenue, a, b) / sst
}
