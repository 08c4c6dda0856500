//! Reference curves and assembly of series for plotting.

use crate::config::check_num;
use anyhow::{Context, Result};

/// Discrete time grid, `times[n] = n * step_duration`.
pub fn time_grid(n_steps: usize, step_duration: f64) -> Result<Vec<f64>> {
    check_num(n_steps, 1..).context("invalid number of steps")?;
    check_num(step_duration, f64::MIN_POSITIVE..f64::INFINITY).context("invalid step duration")?;
    Ok((0..n_steps).map(|n| n as f64 * step_duration).collect())
}

/// Exact solution of the decay equation, `exp(-decay_rate * t)`.
///
/// Negative rates describe growth and are rejected.
pub fn exact_solution(times: &[f64], decay_rate: f64) -> Result<Vec<f64>> {
    check_num(decay_rate, 0.0..f64::INFINITY).context("invalid decay rate")?;
    Ok(times.iter().map(|&t| (-decay_rate * t).exp()).collect())
}

/// Expectation of the discrete process, `(1 - decay_prob)^n`.
///
/// This is what the ensemble average estimates without bias; it differs
/// from [`exact_solution`] by the error of the Euler discretization.
pub fn expected_survival(n_steps: usize, decay_prob: f64) -> Result<Vec<f64>> {
    check_num(decay_prob, 0.0..=1.0).context("invalid decay probability")?;
    let survival_prob = 1.0 - decay_prob;
    let mut expected = Vec::with_capacity(n_steps);
    let mut val = 1.0;
    for _ in 0..n_steps {
        expected.push(val);
        val *= survival_prob;
    }
    Ok(expected)
}

/// Zip a series with its time grid into `(time, value)` pairs.
///
/// # Panics
/// Panics if the lengths differ; callers always build both from the same grid.
pub fn pair<T: Copy>(series: &[T], times: &[f64]) -> Vec<(f64, T)> {
    assert_eq!(
        series.len(),
        times.len(),
        "series and time grid must have the same length"
    );
    times.iter().copied().zip(series.iter().copied()).collect()
}
