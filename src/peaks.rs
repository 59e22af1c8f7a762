//! # Peak Finder
//!
//! Local-maximum detection with height and prominence thresholds, scaled to
//! the maximum of the searched window.
//!
//! ## Definitions
//! -----------------
//! * **local maximum** – a sample strictly greater than its left neighbour and
//!   strictly greater than the first differing sample to its right. A flat
//!   top (plateau) reports its middle index (rounded down). End points are
//!   never peaks.
//! * **height** – the sample value itself.
//! * **prominence** – the peak value minus the higher of the two minima found
//!   when walking left and right from the peak until a strictly higher
//!   sample or the end of the window is reached.
//!
//! A peak is kept when it satisfies every configured threshold. Relative
//! thresholds are multiplied by `max(y)` over the searched window.
use serde::{Deserialize, Serialize};

use crate::constants::{SampleIndex, XLimits};
use crate::signal::zoom;
use crate::specfit_errors::SpecFitError;

/// Relative detection thresholds. Each fraction multiplies the window maximum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeakCriteria {
    pub height_fraction: Option<f64>,
    pub prominence_fraction: Option<f64>,
}

impl PeakCriteria {
    pub fn height(fraction: f64) -> Self {
        PeakCriteria {
            height_fraction: Some(fraction),
            prominence_fraction: None,
        }
    }

    pub fn prominence(fraction: f64) -> Self {
        PeakCriteria {
            height_fraction: None,
            prominence_fraction: Some(fraction),
        }
    }

    pub fn with_height(self, fraction: f64) -> Self {
        PeakCriteria {
            height_fraction: Some(fraction),
            ..self
        }
    }
}

/// Indices of all local maxima, plateaus reduced to their middle sample.
pub fn local_maxima(y: &[f64]) -> Vec<SampleIndex> {
    let n = y.len();
    let mut peaks = Vec::new();
    if n < 3 {
        return peaks;
    }
    let mut i = 1;
    while i < n - 1 {
        if y[i - 1] < y[i] {
            let mut ahead = i + 1;
            while ahead < n - 1 && y[ahead] == y[i] {
                ahead += 1;
            }
            if y[ahead] < y[i] {
                peaks.push((i + ahead - 1) / 2);
                i = ahead;
            }
        }
        i += 1;
    }
    peaks
}

/// Prominence of each peak in `peaks` (indices into `y`).
pub fn prominences(y: &[f64], peaks: &[SampleIndex]) -> Vec<f64> {
    peaks
        .iter()
        .map(|&peak| {
            let top = y[peak];

            let mut left_min = top;
            for &v in y[..=peak].iter().rev() {
                if v > top {
                    break;
                }
                left_min = left_min.min(v);
            }

            let mut right_min = top;
            for &v in &y[peak..] {
                if v > top {
                    break;
                }
                right_min = right_min.min(v);
            }

            top - left_min.max(right_min)
        })
        .collect()
}

/// Local maxima of `y` passing the absolute `height` and `prominence`
/// thresholds (`None` disables a threshold).
///
/// ```
/// use specfit::peaks::find_peaks;
///
/// let y = [0.0, 1.0, 5.0, 1.0, 0.0, 0.0, 2.0, 0.0];
/// assert_eq!(find_peaks(&y, None, None), vec![2, 6]);
/// assert_eq!(find_peaks(&y, Some(2.5), None), vec![2]);
/// ```
pub fn find_peaks(y: &[f64], height: Option<f64>, prominence: Option<f64>) -> Vec<SampleIndex> {
    let mut peaks = local_maxima(y);
    if let Some(h) = height {
        peaks.retain(|&i| y[i] >= h);
    }
    if let Some(p) = prominence {
        let proms = prominences(y, &peaks);
        peaks = peaks
            .into_iter()
            .zip(proms)
            .filter(|(_, prom)| *prom >= p)
            .map(|(i, _)| i)
            .collect();
    }
    peaks
}

/// Peaks of `y` inside an optional x-window, with thresholds relative to the
/// window maximum.
///
/// Arguments
/// -----------------
/// * `x` – sample positions, used only to locate `window`.
/// * `y` – sample values.
/// * `criteria` – height and/or prominence fractions.
/// * `window` – optional `(lower, upper)` x-range, see [`zoom`].
///
/// Return
/// ----------
/// * Peak indices into the full `y` (window offset added back). An empty
///   vector when nothing qualifies.
/// * `Err(DimensionMismatch)` when a window is requested and `x`, `y` differ
///   in length.
pub fn find_relative_peaks(
    x: &[f64],
    y: &[f64],
    criteria: &PeakCriteria,
    window: Option<XLimits>,
) -> Result<Vec<SampleIndex>, SpecFitError> {
    let (start, stop) = match window {
        Some(bounds) => {
            if x.len() != y.len() {
                return Err(SpecFitError::DimensionMismatch {
                    context: "peak window x/y".into(),
                    left: x.len(),
                    right: y.len(),
                });
            }
            zoom(x, bounds)
        }
        None => (0, y.len()),
    };

    let sub = &y[start..stop];
    let Some(local_max) = sub.iter().copied().filter(|v| !v.is_nan()).reduce(f64::max) else {
        return Ok(Vec::new());
    };

    let height = criteria.height_fraction.map(|f| f * local_max);
    let prominence = criteria.prominence_fraction.map(|f| f * local_max);

    Ok(find_peaks(sub, height, prominence)
        .into_iter()
        .map(|i| i + start)
        .collect())
}

/// x positions of the given peak indices (out-of-range indices are skipped).
pub fn peak_positions(x: &[f64], peaks: &[SampleIndex]) -> Vec<f64> {
    peaks.iter().filter_map(|&i| x.get(i).copied()).collect()
}

#[cfg(test)]
mod peaks_test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_plateau_midpoint_and_edges() {
        assert_eq!(local_maxima(&[0.0, 2.0, 2.0, 2.0, 0.0]), vec![2]);
        assert_eq!(local_maxima(&[0.0, 2.0, 2.0, 0.0]), vec![1]);
        assert_eq!(local_maxima(&[3.0, 1.0, 2.0]), Vec::<usize>::new());
        assert_eq!(local_maxima(&[0.0, 1.0, 1.0]), Vec::<usize>::new());
    }

    #[test]
    fn test_prominence() {
        let y = [0.0, 3.0, 1.0, 4.0, 0.0];
        let peaks = local_maxima(&y);
        assert_eq!(peaks, vec![1, 3]);
        let proms = prominences(&y, &peaks);
        assert_relative_eq!(proms[0], 2.0);
        assert_relative_eq!(proms[1], 4.0);
        assert_eq!(find_peaks(&y, None, Some(2.5)), vec![3]);
    }

    #[test]
    fn test_relative_height_fraction() {
        let y = [0.0, 1.0, 5.0, 1.0, 0.0, 0.0, 2.0, 0.0];
        let x: Vec<f64> = (0..y.len()).map(|i| i as f64).collect();
        let peaks = find_relative_peaks(&x, &y, &PeakCriteria::height(0.5), None).unwrap();
        assert_eq!(peaks, vec![2]);
    }

    #[test]
    fn test_window_offsets_back_into_full_trace() {
        let y = [0.0, 1.0, 5.0, 1.0, 0.0, 0.0, 2.0, 0.0];
        let x: Vec<f64> = (0..y.len()).map(|i| i as f64 * 10.0).collect();
        // window 40..70 excludes the tall peak, so 2.0 is the local max
        let peaks =
            find_relative_peaks(&x, &y, &PeakCriteria::height(0.9), Some((40.0, 70.0))).unwrap();
        assert_eq!(peaks, vec![6]);
        assert_eq!(peak_positions(&x, &peaks), vec![60.0]);
    }

    #[test]
    fn test_no_peaks_is_empty() {
        let y = [1.0, 2.0, 3.0];
        assert!(find_relative_peaks(&y, &y, &PeakCriteria::default(), None)
            .unwrap()
            .is_empty());
        assert!(find_relative_peaks(&[], &[], &PeakCriteria::default(), None)
            .unwrap()
            .is_empty());
    }
}
