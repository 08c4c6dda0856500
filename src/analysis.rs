use crate::model::{DEAD, Report};
use crate::stats::{Accumulator, AccumulatorReport};
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

/// Comparison of a run's ensemble average with the reference curves.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct Results {
    /// Deviation `average - exact` over all steps.
    pub dev_exact: AccumulatorReport,
    /// Deviation `average - expected` over all steps.
    pub dev_expected: AccumulatorReport,
    /// Step at which the example trajectory decays, if it does.
    pub example_decay_step: Option<usize>,
    /// Statistics of member decay steps, if the full history was kept.
    pub decay_steps: Option<DecayStepsReport>,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct DecayStepsReport {
    pub n_decayed: usize,
    pub n_survived: usize,
    /// Fraction of members that decayed.
    pub decayed_frac: f64,
    /// Probability of decaying within the simulated window.
    pub expected_decayed_frac: f64,
    /// Decay steps of the members that decayed.
    pub step: AccumulatorReport,
}

pub fn analyze(report: &Report) -> Result<Results> {
    let n_steps = report.params.n_steps();
    for (name, len) in [
        ("trajectory", report.trajectory.len()),
        ("average", report.average.len()),
        ("exact", report.exact.len()),
        ("expected", report.expected.len()),
    ] {
        if len != n_steps {
            bail!("{name} series must have {n_steps} points, but has {len}");
        }
    }

    let dev_exact = deviation(&report.average, &report.exact);
    let dev_expected = deviation(&report.average, &report.expected);

    let example_decay_step = report
        .trajectory
        .iter()
        .position(|&(_, state)| state == DEAD);

    let decay_steps = match &report.decay_steps {
        Some(decay_steps) => Some(
            summarize_decay_steps(decay_steps, report)
                .context("failed to summarize decay steps")?,
        ),
        None => None,
    };

    Ok(Results {
        dev_exact,
        dev_expected,
        example_decay_step,
        decay_steps,
    })
}

fn deviation(series: &[(f64, f64)], reference: &[(f64, f64)]) -> AccumulatorReport {
    let mut acc = Accumulator::new();
    for (&(_, val), &(_, ref_val)) in series.iter().zip(reference) {
        acc.add(val - ref_val);
    }
    acc.report()
}

fn summarize_decay_steps(
    decay_steps: &[Option<usize>],
    report: &Report,
) -> Result<DecayStepsReport> {
    let n_members = report.params.n_members();
    if decay_steps.len() != n_members {
        bail!(
            "expected {n_members} decay steps, but found {}",
            decay_steps.len()
        );
    }

    let mut acc = Accumulator::new();
    for &step in decay_steps.iter().flatten() {
        acc.add(step as f64);
    }
    let step = acc.report();

    let n_decayed = step.n_vals;
    let expected_decayed_frac = 1.0 - report.expected.last().map_or(1.0, |&(_, val)| val);

    Ok(DecayStepsReport {
        n_decayed,
        n_survived: n_members - n_decayed,
        decayed_frac: n_decayed as f64 / n_members as f64,
        expected_decayed_frac,
        step,
    })
}
