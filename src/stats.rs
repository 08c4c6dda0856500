use serde::{Deserialize, Serialize};

/// Streaming accumulator of mean, variance and extrema (Welford's algorithm).
pub struct Accumulator {
    n_vals: usize,
    mean: f64,
    diff_2_sum: f64,
    max_abs: f64,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct AccumulatorReport {
    pub n_vals: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub max_abs: f64,
}

impl Accumulator {
    pub fn new() -> Self {
        Self {
            n_vals: 0,
            mean: 0.0,
            diff_2_sum: 0.0,
            max_abs: 0.0,
        }
    }

    pub fn add(&mut self, val: f64) {
        self.n_vals += 1;

        let diff_a = val - self.mean;
        self.mean += diff_a / self.n_vals as f64;

        let diff_b = val - self.mean;
        self.diff_2_sum += diff_a * diff_b;

        self.max_abs = self.max_abs.max(val.abs());
    }

    pub fn report(&self) -> AccumulatorReport {
        AccumulatorReport {
            n_vals: self.n_vals,
            mean: if self.n_vals > 0 { self.mean } else { f64::NAN },
            std_dev: if self.n_vals > 1 {
                (self.diff_2_sum / (self.n_vals as f64 - 1.0)).sqrt()
            } else {
                f64::NAN
            },
            max_abs: self.max_abs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_mean_and_spread() {
        let mut acc = Accumulator::new();
        for val in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, -9.0] {
            acc.add(val);
        }
        let report = acc.report();
        assert_eq!(report.n_vals, 8);
        assert!((report.mean - 2.75).abs() < 1e-12);
        let var = [2.0f64, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, -9.0]
            .iter()
            .map(|val| (val - 2.75).powi(2))
            .sum::<f64>()
            / 7.0;
        assert!((report.std_dev - var.sqrt()).abs() < 1e-12);
        assert_eq!(report.max_abs, 9.0);
    }

    #[test]
    fn empty_and_single_values() {
        let mut acc = Accumulator::new();
        assert!(acc.report().mean.is_nan());

        acc.add(0.5);
        let report = acc.report();
        assert_eq!(report.mean, 0.5);
        assert!(report.std_dev.is_nan());
    }
}
