use crate::model::{Params, check_history_size};
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, fs, ops::RangeBounds, path::Path};

/// Decay model parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Decay rate (gamma).
    #[serde(default = "default_decay_rate")]
    pub decay_rate: f64,
    /// Duration of a single time step.
    #[serde(default = "default_step_duration")]
    pub step_duration: f64,
}

/// Ensemble parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct EnsembleConfig {
    /// Number of independent trajectories.
    pub n_members: usize,
    /// Number of time points, including `t = 0`.
    pub n_steps: usize,
    /// Seed of the random number generator (drawn from the OS if absent).
    #[serde(default)]
    pub seed: Option<u64>,
    /// Keep the full ensemble history and record when each member decays.
    #[serde(default)]
    pub keep_history: bool,
}

/// Simulation configuration parameters.
///
/// Loaded from a TOML file and validated before use.
/// See [`Config::from_file`] for loading.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub model: ModelConfig,
    pub ensemble: EnsembleConfig,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            decay_rate: default_decay_rate(),
            step_duration: default_step_duration(),
        }
    }
}

fn default_decay_rate() -> f64 {
    0.1
}

fn default_step_duration() -> f64 {
    1.0
}

impl Config {
    /// Load a [`Config`] from a file.
    ///
    /// The file must be TOML-encoded and contain a serialized [`Config`].
    /// Performs validation on all parameters before returning.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;
        Self::from_toml(&contents)
    }

    /// Parse and validate a [`Config`] from a TOML string.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents).context("failed to deserialize config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    /// Check every parameter against its allowed range.
    pub fn validate(&self) -> Result<()> {
        check_num(self.ensemble.n_members, 1..=10_000_000)
            .context("invalid number of ensemble members")?;
        check_num(self.ensemble.n_steps, 1..=1_000_000).context("invalid number of steps")?;

        if self.ensemble.keep_history {
            check_history_size(self.ensemble.n_steps, self.ensemble.n_members)
                .context("ensemble history too large to keep")?;
        }

        Params::from_config(self).context("invalid model parameters")?;

        Ok(())
    }
}

pub fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}
