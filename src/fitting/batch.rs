//! # Batch fitting
//!
//! Fits many traces with one model and keeps going when a single fit fails.
//! Every attempt yields a [`FitOutcome`] whose [`FitContext`] (group key,
//! file index, peak index) locates the trace, so a failed fit can be traced
//! back to its file without aborting the other fits.
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::assembler::SampleSet;
use crate::binning::bin_data;
use crate::fitting::guess::{decay_guess, initial_guess, peak_extent, tolerance_bounds};
use crate::fitting::{fit_model, FitMethod, FitOptions, FitResult, ModelKind};
use crate::specfit_errors::SpecFitError;

/// Location of the fitted trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FitContext {
    pub group: String,
    pub file_index: usize,
    pub peak_index: Option<usize>,
}

#[derive(Debug)]
pub struct FitOutcome {
    pub context: FitContext,
    pub result: Result<FitResult, SpecFitError>,
}

impl FitOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Where the initial parameters of each fit come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuessStrategy {
    /// The same parameters for every trace.
    Fixed(Vec<f64>),
    /// Line-shape policy on the trace smoothed with `smoothing_sigma`.
    LineShape { smoothing_sigma: f64 },
    /// `(max, t1, min)` for single exponential decays.
    Decay { t1: f64 },
}

impl GuessStrategy {
    pub fn guess(&self, model: ModelKind, x: &[f64], y: &[f64]) -> Result<Vec<f64>, SpecFitError> {
        match self {
            GuessStrategy::Fixed(p) => Ok(p.clone()),
            GuessStrategy::LineShape { smoothing_sigma } => {
                initial_guess(model, x, y, *smoothing_sigma)
            }
            GuessStrategy::Decay { t1 } => {
                if model != ModelKind::ExpDecay {
                    return Err(SpecFitError::UnsupportedGuess(model.to_string()));
                }
                Ok(decay_guess(y, *t1)?.to_vec())
            }
        }
    }
}

/// Peak fitting settings.
///
/// Fields
/// -----------------
/// * `model` – line-shape model fitted around each peak.
/// * `half_window` – samples taken on each side of the peak.
/// * `edge_fraction` – when set, the window instead extends while the trace
///   stays above `edge_fraction · y[peak]` (see [`peak_extent`]).
/// * `smoothing_sigma` – Gaussian smoothing of the window before guessing.
/// * `tolerance` – relative bound half-widths around the guess, one per
///   parameter or a single value; empty means unbounded.
/// * `method` – optimiser, chosen from the bounds when `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeakFitConfig {
    pub model: ModelKind,
    pub half_window: usize,
    pub edge_fraction: Option<f64>,
    pub smoothing_sigma: f64,
    pub tolerance: Vec<f64>,
    pub method: Option<FitMethod>,
}

impl Default for PeakFitConfig {
    fn default() -> Self {
        PeakFitConfig {
            model: ModelKind::Lorentzian,
            half_window: 10,
            edge_fraction: None,
            smoothing_sigma: 0.3,
            tolerance: Vec::new(),
            method: None,
        }
    }
}

fn fit_one(
    model: ModelKind,
    x: &[f64],
    y: &[f64],
    strategy: &GuessStrategy,
    tolerance: &[f64],
    options: &FitOptions,
) -> Result<FitResult, SpecFitError> {
    let guess = strategy.guess(model, x, y)?;
    if tolerance.is_empty() {
        return fit_model(model, x, y, &guess, options);
    }
    let bounded = FitOptions {
        bounds: Some(tolerance_bounds(&guess, tolerance)?),
        ..options.clone()
    };
    fit_model(model, x, y, &guess, &bounded)
}

fn log_failure(outcome: &FitOutcome, model: ModelKind) {
    if let Err(e) = &outcome.result {
        let c = &outcome.context;
        match c.peak_index {
            Some(p) => warn!(
                "{model} fit failed for group {}, file {}, peak {p}: {e}",
                c.group, c.file_index
            ),
            None => warn!(
                "{model} fit failed for group {}, file {}: {e}",
                c.group, c.file_index
            ),
        }
    }
}

/// Fit every sample of a set.
///
/// Arguments
/// -----------------
/// * `group` – group key reported in each [`FitContext`].
/// * `samples` – traces to fit, in file order.
/// * `model` – model fitted to every trace.
/// * `strategy` – initial-guess source.
/// * `tolerance` – relative bounds around each guess, empty for unbounded.
/// * `options` – optimiser options; any bounds in it are replaced when
///   `tolerance` is non-empty.
///
/// Return
/// ----------
/// * One [`FitOutcome`] per sample, in file order.
pub fn fit_sample_set(
    group: &str,
    samples: &SampleSet,
    model: ModelKind,
    strategy: &GuessStrategy,
    tolerance: &[f64],
    options: &FitOptions,
) -> Vec<FitOutcome> {
    let outcomes: Vec<FitOutcome> = samples
        .iter()
        .enumerate()
        .map(|(file_index, sample)| {
            let outcome = FitOutcome {
                context: FitContext {
                    group: group.to_string(),
                    file_index,
                    peak_index: None,
                },
                result: fit_one(model, &sample.x, &sample.y, strategy, tolerance, options),
            };
            log_failure(&outcome, model);
            outcome
        })
        .collect();

    info!(
        "group {group}: {}/{} {model} fits converged",
        outcomes.iter().filter(|o| o.is_ok()).count(),
        outcomes.len()
    );
    outcomes
}

/// Fit a line shape in a window around each detected peak of one trace.
///
/// Return
/// ----------
/// * One [`FitOutcome`] per peak, carrying the peak index in its context.
pub fn fit_peaks(
    group: &str,
    file_index: usize,
    x: &[f64],
    y: &[f64],
    peaks: &[usize],
    config: &PeakFitConfig,
) -> Vec<FitOutcome> {
    let options = FitOptions {
        method: config.method,
        ..Default::default()
    };
    let strategy = GuessStrategy::LineShape {
        smoothing_sigma: config.smoothing_sigma,
    };
    let n = x.len().min(y.len());

    peaks
        .iter()
        .map(|&peak| {
            let (start, stop) = match config.edge_fraction {
                Some(fraction) => peak_extent(&y[..n], peak, fraction),
                None => (
                    peak.saturating_sub(config.half_window),
                    (peak + config.half_window + 1).min(n),
                ),
            };
            let result = if start >= stop {
                Err(SpecFitError::EmptySample)
            } else {
                fit_one(
                    config.model,
                    &x[start..stop],
                    &y[start..stop],
                    &strategy,
                    &config.tolerance,
                    &options,
                )
            };
            let outcome = FitOutcome {
                context: FitContext {
                    group: group.to_string(),
                    file_index,
                    peak_index: Some(peak),
                },
                result,
            };
            log_failure(&outcome, config.model);
            outcome
        })
        .collect()
}

/// Mode-bin estimate of one parameter over all successful fits, e.g. the
/// typical T1 of a decay ensemble.
///
/// Return
/// ----------
/// * `Err(EmptySample)` when no fit succeeded.
pub fn ensemble_estimate(
    outcomes: &[FitOutcome],
    param_index: usize,
    bins: usize,
) -> Result<f64, SpecFitError> {
    let values: Vec<f64> = outcomes
        .iter()
        .filter_map(|o| o.result.as_ref().ok())
        .filter_map(|r| r.params.get(param_index).copied())
        .collect();
    bin_data(&values, bins)
}
