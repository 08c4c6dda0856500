use crate::analysis::analyze;
use crate::config::Config;
use crate::engine::Engine;
use crate::model::{Params, Report};
use crate::reference::{exact_solution, expected_survival, pair, time_grid};
use anyhow::{Context, Result};
use glob::glob;
use rmp_serde::{decode, encode};
use serde::{Serialize, de::DeserializeOwned};
use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

/// Command-line overrides of the ensemble configuration.
#[derive(Debug)]
pub struct Overrides {
    pub n_members: Option<usize>,
    pub n_steps: Option<usize>,
    pub seed: Option<u64>,
}

pub struct Manager {
    sim_dir: PathBuf,
    cfg: Config,
}

impl Manager {
    pub fn new<P: AsRef<Path>>(sim_dir: P) -> Result<Self> {
        let sim_dir = sim_dir.as_ref().to_path_buf();

        let cfg =
            Config::from_file(sim_dir.join("config.toml")).context("failed to construct cfg")?;
        log::info!("{cfg:#?}");

        Ok(Self { sim_dir, cfg })
    }

    pub fn create_run(&self, overrides: Overrides) -> Result<()> {
        let mut cfg = self.cfg.clone();
        if let Some(n_members) = overrides.n_members {
            cfg.ensemble.n_members = n_members;
        }
        if let Some(n_steps) = overrides.n_steps {
            cfg.ensemble.n_steps = n_steps;
        }
        if overrides.seed.is_some() {
            cfg.ensemble.seed = overrides.seed;
        }
        cfg.validate().context("invalid overrides")?;

        let par = Params::from_config(&cfg).context("failed to construct params")?;

        let mut engine = Engine::new(cfg.ensemble.seed).context("failed to construct engine")?;
        log::info!("using seed {}", engine.seed());

        let (output, decay_steps) = if cfg.ensemble.keep_history {
            let ensemble = engine
                .perform_full_simulation(&par)
                .context("failed to simulate full ensemble")?;
            (ensemble.reduce(), Some(ensemble.decay_steps()))
        } else {
            (engine.perform_simulation(&par), None)
        };

        let times = time_grid(par.n_steps(), par.step_duration())
            .context("failed to construct time grid")?;
        let exact = exact_solution(&times, par.decay_rate())
            .context("failed to compute exact solution")?;
        let expected = expected_survival(par.n_steps(), par.decay_prob())
            .context("failed to compute expected survival")?;

        let report = Report {
            params: par,
            seed: engine.seed(),
            trajectory: pair(&output.trajectory, &times),
            average: pair(&output.average, &times),
            exact: pair(&exact, &times),
            expected: pair(&expected, &times),
            decay_steps,
        };

        let run_idx = self.count_run_dirs().context("failed to count run dirs")?;
        let run_dir = self.run_dir(run_idx);
        fs::create_dir_all(&run_dir).with_context(|| format!("failed to create {run_dir:?}"))?;
        log::info!("created {run_dir:?}");

        write_file(self.report_file(run_idx), &report).context("failed to save report")?;

        Ok(())
    }

    pub fn analyze_sim(&self) -> Result<()> {
        let n_runs = self.count_run_dirs().context("failed to count run dirs")?;
        for run_idx in 0..n_runs {
            let report_file = self.report_file(run_idx);
            let report: Report = read_file(&report_file)
                .with_context(|| format!("failed to load {report_file:?}"))?;

            let results = analyze(&report)
                .with_context(|| format!("failed to analyze run {run_idx}"))?;
            log::info!(
                "run {run_idx}: max deviation from exact {:.6}, from expected {:.6}",
                results.dev_exact.max_abs,
                results.dev_expected.max_abs
            );

            write_file(self.results_file(run_idx), &results).context("failed to save results")?;
        }

        Ok(())
    }

    pub fn clean_sim(&self) -> Result<()> {
        let pattern = self.sim_dir.join("run-*");
        let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;
        for run_dir in glob(pattern)
            .context("failed to glob run dirs")?
            .filter_map(Result::ok)
            .filter(|p| p.is_dir())
        {
            fs::remove_dir_all(&run_dir)
                .with_context(|| format!("failed to remove {run_dir:?}"))?;
            log::info!("removed {run_dir:?}");
        }

        Ok(())
    }

    fn count_run_dirs(&self) -> Result<usize> {
        let pattern = self.sim_dir.join("run-*");
        let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;
        let count = glob(pattern)
            .context("failed to glob run dirs")?
            .filter_map(Result::ok)
            .filter(|p| p.is_dir())
            .count();
        Ok(count)
    }

    fn run_dir(&self, run_idx: usize) -> PathBuf {
        self.sim_dir.join(format!("run-{run_idx:04}"))
    }

    fn report_file(&self, run_idx: usize) -> PathBuf {
        self.run_dir(run_idx).join("report.msgpack")
    }

    fn results_file(&self, run_idx: usize) -> PathBuf {
        self.run_dir(run_idx).join("results.msgpack")
    }
}

fn write_file<P: AsRef<Path>, T: Serialize>(file: P, value: &T) -> Result<()> {
    let file = file.as_ref();
    let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
    let mut writer = BufWriter::new(file);
    encode::write_named(&mut writer, value).context("failed to serialize value")?;
    writer.flush().context("failed to flush writer stream")?;
    Ok(())
}

fn read_file<P: AsRef<Path>, T: DeserializeOwned>(file: P) -> Result<T> {
    let file = file.as_ref();
    let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
    let mut reader = BufReader::new(file);
    decode::from_read(&mut reader).context("failed to deserialize value")
}
