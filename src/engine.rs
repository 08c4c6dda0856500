use crate::model::{ALIVE, DEAD, Ensemble, Output, Params};
use anyhow::Result;
use rand::prelude::*;
use rand::distr::StandardUniform;
use rand_chacha::ChaCha12Rng;

/// Source of uniform random reals in `[0, 1)`.
pub trait UniformSource {
    fn next_uniform(&mut self) -> f64;
}

impl<R: Rng + ?Sized> UniformSource for R {
    fn next_uniform(&mut self) -> f64 {
        StandardUniform.sample(self)
    }
}

/// Advance one member by a single step.
///
/// A draw is always consumed, even for dead members, so the stream of
/// draws depends only on the (step, member) enumeration order.
fn next_state<S: UniformSource + ?Sized>(prev: u8, decay_prob: f64, src: &mut S) -> u8 {
    let r = src.next_uniform();
    if r > decay_prob { prev } else { DEAD }
}

/// Simulate the ensemble keeping only the latest time slice.
///
/// Consumes exactly `(n_steps - 1) * n_members` draws from `src`.
pub fn simulate<S: UniformSource + ?Sized>(par: &Params, src: &mut S) -> Output {
    let n_members = par.n_members();
    let decay_prob = par.decay_prob();

    let mut output = Output::with_capacity(par.n_steps());
    let mut slice = vec![ALIVE; n_members];
    output.record(&slice);

    for _ in 1..par.n_steps() {
        for state in slice.iter_mut() {
            *state = next_state(*state, decay_prob, src);
        }
        output.record(&slice);
    }

    output
}

/// Simulate the ensemble retaining its full history.
///
/// Consumes draws in the same order as [`simulate`], so both reduce to the
/// same [`Output`] for the same source.
///
/// # Errors
/// Returns an error, before any draw, if the history would exceed
/// [`MAX_HISTORY_STATES`](crate::model::MAX_HISTORY_STATES).
pub fn simulate_ensemble<S: UniformSource + ?Sized>(
    par: &Params,
    src: &mut S,
) -> Result<Ensemble> {
    let decay_prob = par.decay_prob();

    let mut ensemble = Ensemble::new(par.n_steps(), par.n_members())?;
    for step in 1..par.n_steps() {
        let (prev, next) = ensemble.slice_pair_mut(step);
        for (state, &prev_state) in next.iter_mut().zip(prev) {
            *state = next_state(prev_state, decay_prob, src);
        }
    }

    Ok(ensemble)
}

/// Simulation engine.
///
/// Owns the random number generator and remembers its seed,
/// so every run can be reproduced.
pub struct Engine {
    seed: u64,
    rng: ChaCha12Rng,
}

impl Engine {
    /// Create a new `Engine` from a fixed seed, or from a seed drawn from the OS.
    pub fn new(seed: Option<u64>) -> Result<Self> {
        let seed = match seed {
            Some(seed) => seed,
            None => ChaCha12Rng::try_from_os_rng()?.next_u64(),
        };
        let rng = ChaCha12Rng::seed_from_u64(seed);
        Ok(Self { seed, rng })
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Run the ensemble simulation for the given parameters.
    pub fn perform_simulation(&mut self, par: &Params) -> Output {
        log_start(par);
        let output = simulate(par, &mut self.rng);
        log_end(&output);
        output
    }

    /// Run the ensemble simulation and keep the full history.
    pub fn perform_full_simulation(&mut self, par: &Params) -> Result<Ensemble> {
        log_start(par);
        let ensemble = simulate_ensemble(par, &mut self.rng)?;
        log_end(&ensemble.reduce());
        Ok(ensemble)
    }
}

fn log_start(par: &Params) {
    log::info!(
        "simulating {} members over {} steps (decay probability {})",
        par.n_members(),
        par.n_steps(),
        par.decay_prob()
    );
}

fn log_end(output: &Output) {
    let survivors = output.average.last().copied().unwrap_or(f64::NAN);
    log::info!("completed, final surviving fraction {survivors:.6}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::expected_survival;

    /// Replays a fixed sequence of draws, counting how many were consumed.
    struct Scripted {
        draws: Vec<f64>,
        n_used: usize,
    }

    impl Scripted {
        fn new(draws: Vec<f64>) -> Self {
            Self { draws, n_used: 0 }
        }
    }

    impl UniformSource for Scripted {
        fn next_uniform(&mut self) -> f64 {
            let r = self.draws[self.n_used % self.draws.len()];
            self.n_used += 1;
            r
        }
    }

    #[test]
    fn scripted_single_member() {
        let par = Params::new(4, 1, 0.1, 1.0).unwrap();
        let mut src = Scripted::new(vec![0.5, 0.05, 0.9]);

        let output = simulate(&par, &mut src);

        assert_eq!(output.trajectory, vec![1, 1, 0, 0]);
        assert_eq!(output.average, vec![1.0, 1.0, 0.0, 0.0]);
        assert_eq!(src.n_used, 3);
    }

    #[test]
    fn draw_equal_to_probability_kills() {
        let par = Params::new(2, 1, 0.25, 1.0).unwrap();
        let output = simulate(&par, &mut Scripted::new(vec![0.25]));
        assert_eq!(output.trajectory, vec![1, 0]);
    }

    #[test]
    fn dead_members_still_draw() {
        let par = Params::new(6, 3, 1.0, 1.0).unwrap();
        let mut src = Scripted::new(vec![0.5]);

        let output = simulate(&par, &mut src);

        assert_eq!(output.average, vec![1.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(src.n_used, 5 * 3);
    }

    #[test]
    fn zero_probability_never_decays() {
        let par = Params::new(20, 7, 0.0, 1.0).unwrap();
        let mut rng = ChaCha12Rng::seed_from_u64(3);

        let output = simulate(&par, &mut rng);

        assert_eq!(output.trajectory, vec![1; 20]);
        assert_eq!(output.average, vec![1.0; 20]);
    }

    #[test]
    fn unit_probability_decays_at_first_step() {
        let par = Params::new(5, 11, 1.0, 1.0).unwrap();
        let mut rng = ChaCha12Rng::seed_from_u64(4);

        let output = simulate(&par, &mut rng);

        assert_eq!(output.average, vec![1.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(output.trajectory, vec![1, 0, 0, 0, 0]);
    }

    #[test]
    fn single_step_consumes_nothing() {
        let par = Params::new(1, 4, 0.1, 1.0).unwrap();
        let mut src = Scripted::new(vec![0.0]);

        let output = simulate(&par, &mut src);

        assert_eq!(output.average, vec![1.0]);
        assert_eq!(output.trajectory, vec![1]);
        assert_eq!(src.n_used, 0);
    }

    #[test]
    fn members_are_absorbed_and_average_decreases() {
        let par = Params::new(60, 200, 0.1, 1.0).unwrap();
        let mut rng = ChaCha12Rng::seed_from_u64(42);

        let ensemble = simulate_ensemble(&par, &mut rng).unwrap();

        for member in 0..ensemble.n_members() {
            for step in 1..ensemble.n_steps() {
                if ensemble.state(step - 1, member) == DEAD {
                    assert_eq!(ensemble.state(step, member), DEAD);
                }
            }
        }

        let output = ensemble.reduce();
        assert_eq!(output.average[0], 1.0);
        for pair in output.average.windows(2) {
            assert!(0.0 <= pair[1] && pair[1] <= pair[0]);
        }
    }

    #[test]
    fn oversized_history_is_rejected_before_drawing() {
        let par = Params::new(1_000_000, 10_000_000, 0.1, 1.0).unwrap();
        let mut src = Scripted::new(vec![0.5]);

        assert!(simulate_ensemble(&par, &mut src).is_err());
        assert_eq!(src.n_used, 0);

        let par = Params::new(usize::MAX, 2, 0.1, 1.0).unwrap();
        assert!(simulate_ensemble(&par, &mut src).is_err());
        assert_eq!(src.n_used, 0);
    }

    #[test]
    fn dense_and_rolling_agree() {
        let par = Params::new(30, 50, 0.2, 0.5).unwrap();

        let rolling = simulate(&par, &mut ChaCha12Rng::seed_from_u64(9));
        let dense = simulate_ensemble(&par, &mut ChaCha12Rng::seed_from_u64(9))
            .unwrap()
            .reduce();

        assert_eq!(rolling, dense);
    }

    #[test]
    fn engine_is_reproducible() {
        let par = Params::new(40, 100, 0.1, 1.0).unwrap();

        let mut engine_a = Engine::new(Some(1234)).unwrap();
        let mut engine_b = Engine::new(Some(engine_a.seed())).unwrap();

        assert_eq!(
            engine_a.perform_simulation(&par),
            engine_b.perform_simulation(&par)
        );

        let mut engine_c = Engine::new(Some(1234)).unwrap();
        assert_eq!(
            engine_c.perform_full_simulation(&par).unwrap().reduce(),
            Engine::new(Some(1234)).unwrap().perform_simulation(&par)
        );
    }

    #[test]
    fn large_ensemble_follows_expectation() {
        let n_steps = 21;
        let par = Params::new(n_steps, 100_000, 0.1, 1.0).unwrap();

        let output = simulate(&par, &mut rand::rng());
        let expected = expected_survival(n_steps, par.decay_prob()).unwrap();

        for step in 0..n_steps {
            let avg = output.average[step];
            assert!(
                (avg - expected[step]).abs() < 0.01,
                "step {step}: average {avg} vs expected {}",
                expected[step]
            );
            // The discrete process lags the exponential by less than 0.02.
            let exact = (-0.1 * step as f64).exp();
            assert!((avg - exact).abs() < 0.03, "step {step}: average {avg} vs exact {exact}");
        }
    }
}
