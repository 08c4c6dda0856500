//! Simulation data types.

use crate::config::{Config, check_num};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Validated parameters of a single simulation run.
///
/// Only constructible through [`Params::new`], so a value of this type
/// always describes a valid Bernoulli decay process.
#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
pub struct Params {
    n_steps: usize,
    n_members: usize,
    decay_rate: f64,
    step_duration: f64,
    decay_prob: f64,
}

impl Params {
    /// Validate the inputs and derive the per-step decay probability.
    ///
    /// # Errors
    /// Returns an error if `n_steps` or `n_members` is zero, if `decay_rate`
    /// is negative or not finite, if `step_duration` is not strictly positive,
    /// or if `decay_rate * step_duration` lies outside `[0, 1]`.
    pub fn new(
        n_steps: usize,
        n_members: usize,
        decay_rate: f64,
        step_duration: f64,
    ) -> Result<Self> {
        check_num(n_steps, 1..).context("invalid number of steps")?;
        check_num(n_members, 1..).context("invalid number of ensemble members")?;
        check_num(decay_rate, 0.0..f64::INFINITY).context("invalid decay rate")?;
        check_num(step_duration, f64::MIN_POSITIVE..f64::INFINITY)
            .context("invalid step duration")?;

        let decay_prob = decay_rate * step_duration;
        check_num(decay_prob, 0.0..=1.0).context("invalid decay probability")?;

        Ok(Self {
            n_steps,
            n_members,
            decay_rate,
            step_duration,
            decay_prob,
        })
    }

    /// Build the parameters described by a configuration.
    pub fn from_config(cfg: &Config) -> Result<Self> {
        Self::new(
            cfg.ensemble.n_steps,
            cfg.ensemble.n_members,
            cfg.model.decay_rate,
            cfg.model.step_duration,
        )
    }

    pub fn n_steps(&self) -> usize {
        self.n_steps
    }

    pub fn n_members(&self) -> usize {
        self.n_members
    }

    pub fn decay_rate(&self) -> f64 {
        self.decay_rate
    }

    pub fn step_duration(&self) -> f64 {
        self.step_duration
    }

    pub fn decay_prob(&self) -> f64 {
        self.decay_prob
    }
}

/// Member state: dead.
pub const DEAD: u8 = 0;
/// Member state: alive.
pub const ALIVE: u8 = 1;

/// Largest number of states a kept ensemble history may hold (1 GiB).
pub const MAX_HISTORY_STATES: usize = 1 << 30;

/// Check that a full history of `n_steps * n_members` states fits the cap.
pub fn check_history_size(n_steps: usize, n_members: usize) -> Result<()> {
    let n_states = n_steps
        .checked_mul(n_members)
        .context("number of history states overflows")?;
    check_num(n_states, 1..=MAX_HISTORY_STATES).context("invalid number of history states")?;
    Ok(())
}

/// Full history of an ensemble.
///
/// Dense arena of `n_steps * n_members` states stored slice by slice,
/// so the state of member `i` at step `n` lives at `n * n_members + i`.
#[derive(Debug, Clone)]
pub struct Ensemble {
    n_members: usize,
    states: Vec<u8>,
}

impl Ensemble {
    /// Ensemble with slice 0 alive and every later slice still unset (dead).
    pub fn new(n_steps: usize, n_members: usize) -> Result<Self> {
        check_history_size(n_steps, n_members)?;
        let mut states = vec![DEAD; n_steps * n_members];
        states[..n_members].fill(ALIVE);
        Ok(Self { n_members, states })
    }

    pub fn n_steps(&self) -> usize {
        self.states.len() / self.n_members
    }

    pub fn n_members(&self) -> usize {
        self.n_members
    }

    /// State of every member at `step`.
    pub fn slice(&self, step: usize) -> &[u8] {
        &self.states[step * self.n_members..(step + 1) * self.n_members]
    }

    /// Previous slice (read-only) and current slice (mutable) at `step >= 1`.
    pub fn slice_pair_mut(&mut self, step: usize) -> (&[u8], &mut [u8]) {
        let (head, tail) = self.states.split_at_mut(step * self.n_members);
        (&head[(step - 1) * self.n_members..], &mut tail[..self.n_members])
    }

    /// State of `member` at `step`.
    pub fn state(&self, step: usize, member: usize) -> u8 {
        self.states[step * self.n_members + member]
    }

    /// First step at which each member is dead, `None` if it survives every step.
    pub fn decay_steps(&self) -> Vec<Option<usize>> {
        (0..self.n_members())
            .map(|member| (0..self.n_steps()).find(|&step| self.state(step, member) == DEAD))
            .collect()
    }

    /// Reduce the ensemble to its average and the path of member 0.
    pub fn reduce(&self) -> Output {
        let mut output = Output::with_capacity(self.n_steps());
        for step in 0..self.n_steps() {
            output.record(self.slice(step));
        }
        output
    }
}

/// Reduction of an ensemble.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Output {
    /// State of member 0 at every step.
    pub trajectory: Vec<u8>,
    /// Mean state over all members at every step.
    pub average: Vec<f64>,
}

impl Output {
    pub fn with_capacity(n_steps: usize) -> Self {
        Self {
            trajectory: Vec::with_capacity(n_steps),
            average: Vec::with_capacity(n_steps),
        }
    }

    /// Append the reduction of one time slice.
    pub fn record(&mut self, slice: &[u8]) {
        self.trajectory.push(slice[0]);
        let sum: f64 = slice.iter().map(|&state| state as f64).sum();
        self.average.push(sum / slice.len() as f64);
    }
}

/// Assembled result of a run, every series paired with its time.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Report {
    pub params: Params,
    pub seed: u64,

    pub trajectory: Vec<(f64, u8)>,
    pub average: Vec<(f64, f64)>,
    pub exact: Vec<(f64, f64)>,
    pub expected: Vec<(f64, f64)>,

    /// Decay step of every member, present only when the full history was kept.
    pub decay_steps: Option<Vec<Option<usize>>>,
}
