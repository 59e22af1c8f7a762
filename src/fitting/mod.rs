//! # Fitting Engine
//!
//! Non-linear least-squares fitting of the [`ModelKind`] catalogue to `(x, y)`
//! samples, returning fitted parameters and their standard errors.
//!
//! ## Overview
//! -----------------
//! * [`fit_model`] – the single entry point: model + samples + initial guess
//!   + [`FitOptions`] → [`FitResult`],
//! * [`models`] – model functions and the [`ModelKind`] schema,
//! * [`levenberg_marquardt`] – the optimiser and covariance estimate,
//! * [`guess`] – reproducible initial guesses and tolerance bounds,
//! * [`batch`] – per-sample and per-peak fitting with failure isolation.
//!
//! ## Failure semantics
//! -----------------
//! A fit that converged with large standard errors is an `Ok`. Every way in
//! which standard errors cannot be computed (iteration budget exhausted,
//! singular or non-positive covariance, fewer samples than parameters) is an
//! `Err(SpecFitError::FitDidNotConverge(..))` carrying the [`FitFailure`]
//! reason.
//!
//! ## Example
//! -----------------
//! ```
//! use specfit::fitting::{fit_model, FitOptions, models::{exp_decay, ModelKind}};
//!
//! let x: Vec<f64> = (0..40).map(|i| i as f64 * 0.25).collect();
//! let y: Vec<f64> = x.iter().map(|&t| exp_decay(t, 5.0, 3.0, 1.0)).collect();
//!
//! let fit = fit_model(ModelKind::ExpDecay, &x, &y, &[4.0, 2.0, 0.5], &FitOptions::default()).unwrap();
//! assert!((fit.params[1] - 3.0).abs() < 1e-6);
//! ```
pub mod batch;
pub mod fit_result;
pub mod guess;
pub mod levenberg_marquardt;
pub mod models;

use std::fmt;
use std::str::FromStr;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_FTOL, DEFAULT_GTOL, DEFAULT_MAX_ITER, DEFAULT_XTOL};
use crate::specfit_errors::{FitFailure, SpecFitError};

pub use fit_result::FitResult;
pub use models::ModelKind;

use levenberg_marquardt::{covariance, minimize, LmSettings};

/// Optimiser selector.
///
/// `"lm"` is the unconstrained Levenberg–Marquardt method and rejects bounds.
/// `"trf"` and `"dogbox"` both select [`FitMethod::TrustRegion`], a
/// Levenberg–Marquardt iteration whose steps are projected onto the bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FitMethod {
    #[serde(rename = "lm")]
    LevenbergMarquardt,
    #[serde(rename = "trf", alias = "dogbox")]
    TrustRegion,
}

impl FromStr for FitMethod {
    type Err = SpecFitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lm" => Ok(FitMethod::LevenbergMarquardt),
            "trf" | "dogbox" => Ok(FitMethod::TrustRegion),
            other => Err(SpecFitError::InvalidFitMethod(other.to_string())),
        }
    }
}

impl fmt::Display for FitMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FitMethod::LevenbergMarquardt => write!(f, "lm"),
            FitMethod::TrustRegion => write!(f, "trf"),
        }
    }
}

/// Per-parameter box constraints. Infinite entries leave a side open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamBounds {
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

impl ParamBounds {
    pub fn new(lower: Vec<f64>, upper: Vec<f64>) -> Self {
        ParamBounds { lower, upper }
    }

    pub fn unbounded(n: usize) -> Self {
        ParamBounds {
            lower: vec![f64::NEG_INFINITY; n],
            upper: vec![f64::INFINITY; n],
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.lower.iter().all(|v| *v == f64::NEG_INFINITY)
            && self.upper.iter().all(|v| *v == f64::INFINITY)
    }

    /// Check lengths, ordering and that `guess` lies inside the box.
    pub fn validate(&self, guess: &[f64]) -> Result<(), SpecFitError> {
        let n = guess.len();
        if self.lower.len() != n || self.upper.len() != n {
            return Err(SpecFitError::InvalidBounds(format!(
                "expected {n} lower/upper values, got {}/{}",
                self.lower.len(),
                self.upper.len()
            )));
        }
        for (j, ((lo, hi), p)) in self.lower.iter().zip(&self.upper).zip(guess).enumerate() {
            if lo.is_nan() || hi.is_nan() || lo >= hi {
                return Err(SpecFitError::InvalidBounds(format!(
                    "parameter {j}: lower bound {lo} must be below upper bound {hi}"
                )));
            }
            if p < lo || p > hi {
                return Err(SpecFitError::InvalidBounds(format!(
                    "parameter {j}: initial guess {p} outside [{lo}, {hi}]"
                )));
            }
        }
        Ok(())
    }
}

/// Options of one fit.
///
/// Defaults: unbounded, method chosen from the bounds (Levenberg–Marquardt
/// when unbounded, trust-region otherwise), `max_iter = 500`,
/// `ftol = xtol = 1e-12`, `gtol = 1e-14`.
#[derive(Debug, Clone, PartialEq)]
pub struct FitOptions {
    pub method: Option<FitMethod>,
    pub bounds: Option<ParamBounds>,
    pub max_iter: usize,
    pub ftol: f64,
    pub xtol: f64,
    pub gtol: f64,
}

impl Default for FitOptions {
    fn default() -> Self {
        FitOptions {
            method: None,
            bounds: None,
            max_iter: DEFAULT_MAX_ITER,
            ftol: DEFAULT_FTOL,
            xtol: DEFAULT_XTOL,
            gtol: DEFAULT_GTOL,
        }
    }
}

impl FitOptions {
    pub fn builder() -> FitOptionsBuilder {
        FitOptionsBuilder::default()
    }

    fn settings(&self) -> LmSettings {
        LmSettings {
            max_iter: self.max_iter,
            ftol: self.ftol,
            xtol: self.xtol,
            gtol: self.gtol,
        }
    }
}

/// Builder for [`FitOptions`], with validation.
#[derive(Debug, Clone, Default)]
pub struct FitOptionsBuilder {
    options: FitOptions,
}

impl FitOptionsBuilder {
    pub fn method(mut self, method: FitMethod) -> Self {
        self.options.method = Some(method);
        self
    }

    pub fn bounds(mut self, bounds: ParamBounds) -> Self {
        self.options.bounds = Some(bounds);
        self
    }

    pub fn max_iter(mut self, v: usize) -> Self {
        self.options.max_iter = v;
        self
    }

    pub fn ftol(mut self, v: f64) -> Self {
        self.options.ftol = v;
        self
    }

    pub fn xtol(mut self, v: f64) -> Self {
        self.options.xtol = v;
        self
    }

    pub fn gtol(mut self, v: f64) -> Self {
        self.options.gtol = v;
        self
    }

    pub fn build(self) -> Result<FitOptions, SpecFitError> {
        let o = &self.options;
        if o.max_iter == 0 {
            return Err(SpecFitError::InvalidConfig("max_iter must be >= 1".into()));
        }
        for (name, v) in [("ftol", o.ftol), ("xtol", o.xtol), ("gtol", o.gtol)] {
            if !(v.is_finite() && v >= 0.0) {
                return Err(SpecFitError::InvalidConfig(format!(
                    "{name} must be finite and >= 0"
                )));
            }
        }
        Ok(self.options)
    }
}

/// Fit `model` to `(x, y)`.
///
/// Arguments
/// -----------------
/// * `model` – model to fit.
/// * `x`, `y` – samples, equal lengths.
/// * `guess` – initial parameters in the model's schema order.
/// * `options` – method, bounds and stopping thresholds.
///
/// Return
/// ----------
/// * `Ok(FitResult)` with parameters and standard errors.
/// * `Err(InvalidParameterCount)` for a guess of the wrong length.
/// * `Err(DimensionMismatch)` when `x` and `y` differ in length.
/// * `Err(InvalidBounds)` for malformed bounds, a guess outside them, or
///   bounds combined with [`FitMethod::LevenbergMarquardt`].
/// * `Err(FitDidNotConverge)` when the optimiser or the covariance fails.
///
/// See also
/// ------------
/// * [`guess::initial_guess`] – reproducible initial guesses.
/// * [`guess::tolerance_bounds`] – bounds around a guess.
pub fn fit_model(
    model: ModelKind,
    x: &[f64],
    y: &[f64],
    guess: &[f64],
    options: &FitOptions,
) -> Result<FitResult, SpecFitError> {
    model.check_params(guess)?;
    if x.len() != y.len() {
        return Err(SpecFitError::DimensionMismatch {
            context: format!("{model} fit x/y"),
            left: x.len(),
            right: y.len(),
        });
    }

    let bounds = options.bounds.as_ref().filter(|b| !b.is_unbounded());
    if let Some(b) = &options.bounds {
        b.validate(guess)?;
    }
    let method = options.method.unwrap_or(if bounds.is_some() {
        FitMethod::TrustRegion
    } else {
        FitMethod::LevenbergMarquardt
    });
    if method == FitMethod::LevenbergMarquardt && bounds.is_some() {
        return Err(SpecFitError::InvalidBounds(
            "method 'lm' does not support bounds".into(),
        ));
    }

    let n = guess.len();
    if x.len() <= n {
        return Err(FitFailure::Underdetermined {
            points: x.len(),
            params: n,
        }
        .into());
    }

    let report = minimize(
        |xi, p| model.eval_unchecked(xi, p),
        x,
        y,
        guess,
        bounds.map(|b| (b.lower.as_slice(), b.upper.as_slice())),
        &options.settings(),
    )?;
    let (cov, std_errors) = covariance(&report.jacobian, report.rss)?;

    debug!(
        "{model} ({method}) converged in {} iterations, rss = {:.3e}",
        report.iterations, report.rss
    );

    Ok(FitResult {
        model,
        params: report.params,
        std_errors,
        covariance: cov,
        rss: report.rss,
        dof: x.len() - n,
        iterations: report.iterations,
    })
}

#[cfg(test)]
mod fitting_test {
    use super::*;
    use approx::assert_relative_eq;

    fn decay_data() -> (Vec<f64>, Vec<f64>) {
        let x: Vec<f64> = (0..60).map(|i| i as f64 * 0.2).collect();
        let y = x
            .iter()
            .map(|&t| models::exp_decay(t, 5.0, 3.0, 1.0))
            .collect();
        (x, y)
    }

    #[test]
    fn test_method_parsing() {
        assert_eq!("lm".parse::<FitMethod>().unwrap(), FitMethod::LevenbergMarquardt);
        assert_eq!("dogbox".parse::<FitMethod>().unwrap(), FitMethod::TrustRegion);
        assert_eq!(
            "nelder".parse::<FitMethod>().unwrap_err(),
            SpecFitError::InvalidFitMethod("nelder".into())
        );
    }

    #[test]
    fn test_noiseless_exp_decay() {
        let (x, y) = decay_data();
        let fit = fit_model(ModelKind::ExpDecay, &x, &y, &[4.0, 2.0, 0.5], &FitOptions::default())
            .unwrap();
        assert_relative_eq!(fit.params[0], 5.0, epsilon = 1e-8);
        assert_relative_eq!(fit.params[1], 3.0, epsilon = 1e-8);
        assert_relative_eq!(fit.params[2], 1.0, epsilon = 1e-8);
        assert!(fit.std_errors.iter().all(|e| *e < 1e-6));
    }

    #[test]
    fn test_lm_rejects_bounds() {
        let (x, y) = decay_data();
        let options = FitOptions::builder()
            .method(FitMethod::LevenbergMarquardt)
            .bounds(ParamBounds::new(vec![0.0; 3], vec![10.0; 3]))
            .build()
            .unwrap();
        assert!(matches!(
            fit_model(ModelKind::ExpDecay, &x, &y, &[4.0, 2.0, 0.5], &options),
            Err(SpecFitError::InvalidBounds(_))
        ));
    }

    #[test]
    fn test_bounded_fit_and_infeasible_guess() {
        let (x, y) = decay_data();
        let options = FitOptions::builder()
            .bounds(ParamBounds::new(vec![0.0, 0.5, -2.0], vec![10.0, 10.0, 2.0]))
            .build()
            .unwrap();
        let fit = fit_model(ModelKind::ExpDecay, &x, &y, &[4.0, 2.0, 0.5], &options).unwrap();
        assert_relative_eq!(fit.params[1], 3.0, epsilon = 1e-6);

        assert!(matches!(
            fit_model(ModelKind::ExpDecay, &x, &y, &[4.0, 20.0, 0.5], &options),
            Err(SpecFitError::InvalidBounds(_))
        ));
    }

    #[test]
    fn test_failures_are_distinct_from_success() {
        let (x, y) = decay_data();
        assert_eq!(
            fit_model(ModelKind::ExpDecay, &x[..3], &y[..3], &[4.0, 2.0, 0.5], &FitOptions::default())
                .unwrap_err(),
            SpecFitError::FitDidNotConverge(FitFailure::Underdetermined {
                points: 3,
                params: 3
            })
        );

        let options = FitOptions::builder().max_iter(1).build().unwrap();
        assert_eq!(
            fit_model(ModelKind::ExpDecay, &x, &y, &[1.0, 0.5, 0.0], &options).unwrap_err(),
            SpecFitError::FitDidNotConverge(FitFailure::IterationLimit(1))
        );

        assert!(matches!(
            fit_model(ModelKind::Gaussian, &x, &y, &[1.0, 2.0], &FitOptions::default()),
            Err(SpecFitError::InvalidParameterCount { got: 2, .. })
        ));
    }
}
