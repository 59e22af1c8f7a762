//! Smoothing filters applied before guessing line-shape parameters and before
//! peak detection.
use crate::constants::GAUSSIAN_TRUNCATE;

/// Map an out-of-range index back into `0..n` by half-sample symmetric
/// reflection (`d c b a | a b c d | d c b a`).
fn reflect(index: isize, n: usize) -> usize {
    let period = 2 * n as isize;
    let j = index.rem_euclid(period);
    if j >= n as isize {
        (period - j - 1) as usize
    } else {
        j as usize
    }
}

/// Normalised Gaussian kernel of standard deviation `sigma`, truncated at
/// `GAUSSIAN_TRUNCATE · sigma` and at `max_radius` taps on each side.
fn gaussian_kernel(sigma: f64, max_radius: usize) -> Vec<f64> {
    let radius = (GAUSSIAN_TRUNCATE * sigma + 0.5).min(max_radius as f64) as isize;
    let weights: Vec<f64> = (-radius..=radius)
        .map(|k| (-0.5 * (k as f64 / sigma).powi(2)).exp())
        .collect();
    let total: f64 = weights.iter().sum();
    weights.into_iter().map(|w| w / total).collect()
}

/// One-dimensional Gaussian filter with reflected boundaries.
///
/// `sigma` is in samples. A non-positive or non-finite `sigma` returns the
/// input unchanged. The kernel never reaches further than the trace length on
/// either side, so a huge `sigma` gives values close to the trace mean.
pub fn gaussian_filter(y: &[f64], sigma: f64) -> Vec<f64> {
    if y.is_empty() || !(sigma.is_finite() && sigma > 0.0) {
        return y.to_vec();
    }
    let kernel = gaussian_kernel(sigma, y.len());
    let radius = (kernel.len() / 2) as isize;
    let n = y.len();

    (0..n as isize)
        .map(|i| {
            kernel
                .iter()
                .enumerate()
                .map(|(k, w)| w * y[reflect(i + k as isize - radius, n)])
                .sum()
        })
        .collect()
}

/// Centred moving average over `window` samples.
///
/// The window shrinks at both ends instead of padding, so the output has the
/// input's length and edge values average fewer samples. `window <= 1`
/// returns the input unchanged.
pub fn moving_average(y: &[f64], window: usize) -> Vec<f64> {
    if window <= 1 || y.is_empty() {
        return y.to_vec();
    }
    let half = window / 2;
    let n = y.len();
    (0..n)
        .map(|i| {
            let lo = i.saturating_sub(half);
            let hi = (i + window - half).min(n);
            y[lo..hi].iter().sum::<f64>() / (hi - lo) as f64
        })
        .collect()
}
