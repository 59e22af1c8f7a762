//! # Initial guesses and tolerance bounds
//!
//! Reproducible starting points for the fitting engine.
//!
//! ## Line-shape policy
//! -----------------
//! [`line_shape_guess`] smooths the window with a Gaussian filter, then takes
//! * the maximum as amplitude,
//! * the mean as baseline,
//! * the abscissa of the maximum as centre,
//! * the distance between the first and last samples at or above half the
//!   maximum as FWHM (one sample spacing when that distance is zero).
//!
//! [`initial_guess`] maps this onto each model's parameter schema, and
//! [`tolerance_bounds`] turns a guess into a box of relative half-width
//! `tolerance` around it.
use crate::constants::FWHM_PER_SIGMA;
use crate::fitting::models::ModelKind;
use crate::fitting::ParamBounds;
use crate::smoothing::gaussian_filter;
use crate::specfit_errors::SpecFitError;

/// Features of a single peak read off smoothed data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineShapeGuess {
    pub amplitude: f64,
    pub baseline: f64,
    pub center: f64,
    pub fwhm: f64,
}

fn smallest_step(x: &[f64]) -> f64 {
    x.windows(2)
        .map(|w| (w[1] - w[0]).abs())
        .filter(|d| *d > 0.0)
        .fold(f64::INFINITY, f64::min)
}

/// Read amplitude, baseline, centre and FWHM off `(x, y)` smoothed with a
/// Gaussian filter of `smoothing_sigma` samples (`0` disables smoothing).
pub fn line_shape_guess(
    x: &[f64],
    y: &[f64],
    smoothing_sigma: f64,
) -> Result<LineShapeGuess, SpecFitError> {
    if x.len() != y.len() {
        return Err(SpecFitError::DimensionMismatch {
            context: "line-shape guess x/y".into(),
            left: x.len(),
            right: y.len(),
        });
    }
    if y.is_empty() {
        return Err(SpecFitError::EmptySample);
    }

    let smoothed = gaussian_filter(y, smoothing_sigma);
    let (argmax, amplitude) = smoothed
        .iter()
        .copied()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |best, (i, v)| {
            if v > best.1 {
                (i, v)
            } else {
                best
            }
        });
    let baseline = smoothed.iter().sum::<f64>() / smoothed.len() as f64;

    let half_max = 0.5 * amplitude;
    let above: Vec<usize> = smoothed
        .iter()
        .enumerate()
        .filter(|(_, v)| **v >= half_max)
        .map(|(i, _)| i)
        .collect();
    let mut fwhm = match (above.first(), above.last()) {
        (Some(&lo), Some(&hi)) => (x[hi] - x[lo]).abs(),
        _ => 0.0,
    };
    if fwhm == 0.0 {
        let step = smallest_step(x);
        fwhm = if step.is_finite() { step } else { 1.0 };
    }

    Ok(LineShapeGuess {
        amplitude,
        baseline,
        center: x[argmax],
        fwhm,
    })
}

/// Model-ordered initial parameters derived from [`line_shape_guess`].
///
/// Supported models: Gaussian, Lorentzian, pseudo-Voigt (η = 0.5),
/// one-component N-Gaussian, and straight line (end-point slope). Decay
/// models need a time-constant guess and use [`decay_guess`] instead.
pub fn initial_guess(
    model: ModelKind,
    x: &[f64],
    y: &[f64],
    smoothing_sigma: f64,
) -> Result<Vec<f64>, SpecFitError> {
    if model == ModelKind::Straight {
        if x.len() != y.len() || x.len() < 2 {
            return Err(SpecFitError::UnsupportedGuess(format!(
                "{model} needs at least two aligned samples"
            )));
        }
        let n = x.len() - 1;
        let a = (y[n] - y[0]) / (x[n] - x[0]);
        return Ok(vec![a, y[0] - a * x[0]]);
    }

    let g = line_shape_guess(x, y, smoothing_sigma)?;
    let sigma = g.fwhm / FWHM_PER_SIGMA;
    match model {
        ModelKind::Gaussian | ModelKind::NGaussian(1) => {
            Ok(vec![g.amplitude, g.baseline, g.center, sigma])
        }
        ModelKind::Lorentzian => Ok(vec![g.amplitude, g.baseline, g.center, g.fwhm]),
        ModelKind::PseudoVoigt => Ok(vec![
            g.baseline,
            g.amplitude,
            g.center,
            sigma,
            g.amplitude,
            g.center,
            g.fwhm,
            0.5,
        ]),
        other => Err(SpecFitError::UnsupportedGuess(other.to_string())),
    }
}

/// `(y0, t1, offset)` guess for [`ModelKind::ExpDecay`]: the trace maximum,
/// the supplied time constant and the trace minimum.
pub fn decay_guess(y: &[f64], t1: f64) -> Result<[f64; 3], SpecFitError> {
    let max = y.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = y.iter().copied().fold(f64::INFINITY, f64::min);
    if !(max.is_finite() && min.is_finite()) {
        return Err(SpecFitError::EmptySample);
    }
    Ok([max, t1, min])
}

/// Box of relative half-width `tolerance` around `guess`.
///
/// For `g > 0` the box is `[g·(1-t), g·(1+t)]`, for `g < 0` the factors swap
/// so that lower stays below upper, and `g = 0` gets `[-t, t]`. `tolerance`
/// holds one value per parameter, or a single value applied to all.
pub fn tolerance_bounds(guess: &[f64], tolerance: &[f64]) -> Result<ParamBounds, SpecFitError> {
    let tol = |j: usize| -> Result<f64, SpecFitError> {
        match tolerance {
            [t] => Ok(*t),
            ts if ts.len() == guess.len() => Ok(ts[j]),
            ts => Err(SpecFitError::InvalidBounds(format!(
                "{} tolerances for {} parameters",
                ts.len(),
                guess.len()
            ))),
        }
    };

    let mut lower = Vec::with_capacity(guess.len());
    let mut upper = Vec::with_capacity(guess.len());
    for (j, &g) in guess.iter().enumerate() {
        let t = tol(j)?;
        if !(t.is_finite() && t > 0.0) {
            return Err(SpecFitError::InvalidBounds(format!(
                "tolerance {t} must be finite and > 0"
            )));
        }
        let (lo, hi) = if g > 0.0 {
            (g * (1.0 - t), g * (1.0 + t))
        } else if g < 0.0 {
            (g * (1.0 + t), g * (1.0 - t))
        } else {
            (-t, t)
        };
        lower.push(lo);
        upper.push(hi);
    }
    Ok(ParamBounds::new(lower, upper))
}

/// Index window `[start, stop)` around `peak` where `y` stays above
/// `fraction · y[peak]`, walking outwards from the peak.
pub fn peak_extent(y: &[f64], peak: usize, fraction: f64) -> (usize, usize) {
    if peak >= y.len() {
        return (0, 0);
    }
    let threshold = fraction * y[peak];
    let mut start = peak;
    while start > 0 && y[start - 1] > threshold {
        start -= 1;
    }
    let mut stop = peak + 1;
    while stop < y.len() && y[stop] > threshold {
        stop += 1;
    }
    (start, stop)
}
