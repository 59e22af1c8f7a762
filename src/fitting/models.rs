//! # Model catalogue
//!
//! Line-shape and decay models fitted by the engine. Each model is a plain
//! function of one abscissa value; [`ModelKind`] is the closed set the engine
//! dispatches on, carrying each model's parameter-name schema.
//!
//! | model | parameters |
//! |---|---|
//! | [`gaussian`] | `amp, y0, x0, sigma` |
//! | [`lorentzian`] | `amp, y0, x0, gamma` (FWHM) |
//! | [`pseudo_voigt`] | `y0, amp_g, x0_g, sigma, amp_l, x0_l, gamma, eta` |
//! | [`n_gaussian`] | `[amp_i, y0_i, x0_i, sigma_i] × N` |
//! | [`straight`] | `a, b` |
//! | [`exp_decay`] | `y0, t1, offset` |
//! | [`dbl_exp_decay`] | `y1, y2, t1, t2, offset` |
//! | [`rise_time`] | `amp, t0, tr` |
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::specfit_errors::SpecFitError;

/// `amp·exp(-(x-x0)²/(2σ²)) + y0`
pub fn gaussian(x: f64, amp: f64, y0: f64, x0: f64, sigma: f64) -> f64 {
    amp * (-(x - x0).powi(2) / (2.0 * sigma * sigma)).exp() + y0
}

/// `amp·(γ/2)²/((x-x0)² + (γ/2)²) + y0`; `gamma` is the full width at half maximum.
pub fn lorentzian(x: f64, amp: f64, y0: f64, x0: f64, gamma: f64) -> f64 {
    let hw2 = (0.5 * gamma).powi(2);
    amp * hw2 / ((x - x0).powi(2) + hw2) + y0
}

/// Weighted sum of a Gaussian and a Lorentzian sharing one baseline:
/// `η·G(x) + (1-η)·L(x) + y0`.
#[allow(clippy::too_many_arguments)]
pub fn pseudo_voigt(
    x: f64,
    y0: f64,
    amp_g: f64,
    x0_g: f64,
    sigma: f64,
    amp_l: f64,
    x0_l: f64,
    gamma: f64,
    eta: f64,
) -> f64 {
    eta * gaussian(x, amp_g, 0.0, x0_g, sigma) + (1.0 - eta) * lorentzian(x, amp_l, 0.0, x0_l, gamma)
        + y0
}

/// Sum of `params.len() / 4` independent Gaussians.
///
/// Return
/// ----------
/// * `Err(InvalidParameterCount)` when `params` is empty or not a multiple of 4.
pub fn n_gaussian(x: f64, params: &[f64]) -> Result<f64, SpecFitError> {
    if params.is_empty() || params.len() % 4 != 0 {
        return Err(SpecFitError::InvalidParameterCount {
            model: "n_gaussian".into(),
            block: 4,
            got: params.len(),
        });
    }
    Ok(params
        .chunks_exact(4)
        .map(|p| gaussian(x, p[0], p[1], p[2], p[3]))
        .sum())
}

pub fn straight(x: f64, a: f64, b: f64) -> f64 {
    a * x + b
}

/// `y0·exp(-x/t1) + offset`
pub fn exp_decay(x: f64, y0: f64, t1: f64, offset: f64) -> f64 {
    y0 * (-x / t1).exp() + offset
}

/// `y1·exp(-x/t1) + y2·exp(-x/t2) + offset`
pub fn dbl_exp_decay(x: f64, y1: f64, y2: f64, t1: f64, t2: f64, offset: f64) -> f64 {
    y1 * (-x / t1).exp() + y2 * (-x / t2).exp() + offset
}

/// `amp·(1 - exp(-(t-t0)/tr))`
pub fn rise_time(t: f64, amp: f64, t0: f64, tr: f64) -> f64 {
    amp * (1.0 - (-(t - t0) / tr).exp())
}

/// Closed set of fittable models.
///
/// Serialised in snake case, `NGaussian` as `{"n_gaussian": N}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Gaussian,
    Lorentzian,
    PseudoVoigt,
    NGaussian(usize),
    Straight,
    ExpDecay,
    DblExpDecay,
    RiseTime,
}

impl ModelKind {
    pub fn name(&self) -> &'static str {
        match self {
            ModelKind::Gaussian => "gaussian",
            ModelKind::Lorentzian => "lorentzian",
            ModelKind::PseudoVoigt => "pseudo_voigt",
            ModelKind::NGaussian(_) => "n_gaussian",
            ModelKind::Straight => "straight",
            ModelKind::ExpDecay => "exp_decay",
            ModelKind::DblExpDecay => "dbl_exp_decay",
            ModelKind::RiseTime => "rise_time",
        }
    }

    /// Size of one repeated parameter block. Only [`ModelKind::NGaussian`]
    /// repeats; for other models this is the full parameter count.
    pub fn block_size(&self) -> usize {
        match self {
            ModelKind::Gaussian | ModelKind::Lorentzian | ModelKind::NGaussian(_) => 4,
            ModelKind::PseudoVoigt => 8,
            ModelKind::Straight => 2,
            ModelKind::ExpDecay | ModelKind::RiseTime => 3,
            ModelKind::DblExpDecay => 5,
        }
    }

    pub fn param_count(&self) -> usize {
        match self {
            ModelKind::NGaussian(n) => 4 * n,
            other => other.block_size(),
        }
    }

    pub fn param_names(&self) -> Vec<String> {
        let fixed: &[&str] = match self {
            ModelKind::Gaussian => &["amp", "y0", "x0", "sigma"],
            ModelKind::Lorentzian => &["amp", "y0", "x0", "gamma"],
            ModelKind::PseudoVoigt => &["y0", "amp_g", "x0_g", "sigma", "amp_l", "x0_l", "gamma", "eta"],
            ModelKind::Straight => &["a", "b"],
            ModelKind::ExpDecay => &["y0", "t1", "offset"],
            ModelKind::DblExpDecay => &["y1", "y2", "t1", "t2", "offset"],
            ModelKind::RiseTime => &["amp", "t0", "tr"],
            ModelKind::NGaussian(n) => {
                return (0..*n)
                    .flat_map(|i| ["amp", "y0", "x0", "sigma"].map(|p| format!("{p}_{i}")))
                    .collect();
            }
        };
        fixed.iter().map(|s| s.to_string()).collect()
    }

    /// Check that `params` has this model's length.
    pub fn check_params(&self, params: &[f64]) -> Result<(), SpecFitError> {
        let expected = self.param_count();
        if expected == 0 || params.len() != expected {
            return Err(SpecFitError::InvalidParameterCount {
                model: self.to_string(),
                block: self.block_size(),
                got: params.len(),
            });
        }
        Ok(())
    }

    /// Evaluate at one point. `params` must already have passed
    /// [`ModelKind::check_params`].
    pub(crate) fn eval_unchecked(&self, x: f64, p: &[f64]) -> f64 {
        match self {
            ModelKind::Gaussian => gaussian(x, p[0], p[1], p[2], p[3]),
            ModelKind::Lorentzian => lorentzian(x, p[0], p[1], p[2], p[3]),
            ModelKind::PseudoVoigt => {
                pseudo_voigt(x, p[0], p[1], p[2], p[3], p[4], p[5], p[6], p[7])
            }
            ModelKind::NGaussian(_) => p
                .chunks_exact(4)
                .map(|b| gaussian(x, b[0], b[1], b[2], b[3]))
                .sum(),
            ModelKind::Straight => straight(x, p[0], p[1]),
            ModelKind::ExpDecay => exp_decay(x, p[0], p[1], p[2]),
            ModelKind::DblExpDecay => dbl_exp_decay(x, p[0], p[1], p[2], p[3], p[4]),
            ModelKind::RiseTime => rise_time(x, p[0], p[1], p[2]),
        }
    }

    pub fn evaluate(&self, x: f64, params: &[f64]) -> Result<f64, SpecFitError> {
        self.check_params(params)?;
        Ok(self.eval_unchecked(x, params))
    }

    pub fn evaluate_all(&self, x: &[f64], params: &[f64]) -> Result<Vec<f64>, SpecFitError> {
        self.check_params(params)?;
        Ok(x.iter().map(|&xi| self.eval_unchecked(xi, params)).collect())
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelKind::NGaussian(n) => write!(f, "n_gaussian({n})"),
            other => write!(f, "{}", other.name()),
        }
    }
}
