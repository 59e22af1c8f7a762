//! # Mode-bin averaging
//!
//! [`bin_data`] estimates a "typical" value of a sample as the mean of its most
//! populated equal-width histogram bin. It is used as a background-level
//! estimator (the background dominates the histogram) and as a robust centre
//! for ensembles of fitted decay times.
//!
//! ## Binning convention
//! -----------------
//! `[min, max]` is split into `N` bins of width `(max - min) / N`. Bin `k`
//! covers `[min + k·w, min + (k+1)·w)`, except the last bin which also
//! includes `max`. When two bins hold the same number of samples the lower
//! one wins.
//!
//! This is an equal-width approximation of the mode, not a density
//! estimate: the result depends on `N`, and a single outlier stretches the
//! range and widens every bin.
use crate::specfit_errors::SpecFitError;

fn finite(data: &[f64]) -> Vec<f64> {
    data.iter().copied().filter(|v| v.is_finite()).collect()
}

/// Arithmetic mean of the finite values of `data`.
pub fn mean(data: &[f64]) -> Result<f64, SpecFitError> {
    let values = finite(data);
    if values.is_empty() {
        return Err(SpecFitError::EmptySample);
    }
    Ok(values.iter().sum::<f64>() / values.len() as f64)
}

/// Bin index of every finite value of `data`, with the sample range.
fn assign(values: &[f64], n_bins: usize) -> (Vec<usize>, f64, f64) {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let width = (max - min) / n_bins as f64;
    let bins = values
        .iter()
        .map(|v| {
            if width == 0.0 {
                0
            } else {
                (((v - min) / width).floor() as usize).min(n_bins - 1)
            }
        })
        .collect();
    (bins, min, max)
}

/// Sample count of each of the `n_bins` bins (non-finite values ignored).
pub fn bin_counts(data: &[f64], n_bins: usize) -> Result<Vec<usize>, SpecFitError> {
    let values = finite(data);
    if values.is_empty() || n_bins == 0 {
        return Err(SpecFitError::EmptySample);
    }
    let (bins, _, _) = assign(&values, n_bins);
    let mut counts = vec![0; n_bins];
    for b in bins {
        counts[b] += 1;
    }
    Ok(counts)
}

/// Mean of the most populated of `n_bins` equal-width bins.
///
/// Arguments
/// -----------------
/// * `data` – sample; non-finite values are ignored.
/// * `n_bins` – number of bins, `0` returns the plain mean.
///
/// Return
/// ----------
/// * The mode-bin mean. A sample with zero range returns its mean.
/// * `Err(EmptySample)` when `data` has no finite value.
///
/// ```
/// use specfit::binning::bin_data;
///
/// let background = bin_data(&[1.0, 1.0, 1.0, 1.0, 100.0], 5).unwrap();
/// assert_eq!(background, 1.0);
/// ```
pub fn bin_data(data: &[f64], n_bins: usize) -> Result<f64, SpecFitError> {
    if n_bins == 0 {
        return mean(data);
    }
    let values = finite(data);
    if values.is_empty() {
        return Err(SpecFitError::EmptySample);
    }
    let (bins, min, max) = assign(&values, n_bins);
    if min == max {
        return mean(&values);
    }

    let mut counts = vec![0usize; n_bins];
    let mut sums = vec![0.0; n_bins];
    for (v, b) in values.iter().zip(&bins) {
        counts[*b] += 1;
        sums[*b] += v;
    }

    // first maximum wins ties
    let mut mode = 0;
    for (k, &c) in counts.iter().enumerate() {
        if c > counts[mode] {
            mode = k;
        }
    }
    Ok(sums[mode] / counts[mode] as f64)
}

#[cfg(test)]
mod binning_test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_outlier_does_not_move_mode() {
        assert_eq!(bin_data(&[1.0, 1.0, 1.0, 1.0, 100.0], 5).unwrap(), 1.0);
    }

    #[test]
    fn test_zero_bins_is_plain_mean() {
        assert_relative_eq!(bin_data(&[1.0, 2.0, 6.0], 0).unwrap(), 3.0);
    }

    #[test]
    fn test_edges_and_ties() {
        // width 1: [0,1) [1,2) [2,3]
        assert_eq!(bin_counts(&[0.0, 1.0, 1.5, 3.0, 2.0], 3).unwrap(), vec![1, 2, 2]);
        // tie between bins 1 and 2 goes to bin 1
        assert_relative_eq!(bin_data(&[0.0, 1.0, 1.5, 3.0, 2.0], 3).unwrap(), 1.25);
    }

    #[test]
    fn test_degenerate_samples() {
        assert_eq!(bin_data(&[2.0, 2.0], 4).unwrap(), 2.0);
        assert_eq!(bin_data(&[], 4), Err(SpecFitError::EmptySample));
        assert_eq!(bin_data(&[f64::NAN], 0), Err(SpecFitError::EmptySample));
        assert_eq!(bin_data(&[f64::NAN, 3.0, 3.0], 2).unwrap(), 3.0);
    }
}
