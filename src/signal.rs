//! # Window and trigger helpers
//!
//! Index arithmetic on sampled axes: locating an x-range inside a sampled
//! axis, cutting a trace to that range, and locating the edge of a trigger
//! trace in a transient measurement.
use serde::{Deserialize, Serialize};

use crate::constants::XLimits;

/// Index of the sample of `axis` closest to `value` (first one on ties).
pub fn nearest_index(axis: &[f64], value: f64) -> Option<usize> {
    axis.iter()
        .enumerate()
        .filter(|(_, v)| !v.is_nan())
        .min_by(|(_, a), (_, b)| (*a - value).abs().total_cmp(&(*b - value).abs()))
        .map(|(i, _)| i)
}

/// Locate an x-range inside a sampled axis.
///
/// Arguments
/// -----------------
/// * `axis` – sampled x values, ascending or descending.
/// * `bounds` – `(lower, upper)` values of the region of interest.
///
/// Return
/// ----------
/// * The half-open index window `(start, stop)` from the samples nearest to
///   each bound. The sample nearest to the upper bound is included, and
///   `start <= stop` holds for descending axes too. `(0, 0)` for an empty axis.
///
/// See also
/// ------------
/// * [`truncate`] – apply the window to the axis.
pub fn zoom(axis: &[f64], bounds: XLimits) -> (usize, usize) {
    let (Some(a), Some(b)) = (nearest_index(axis, bounds.0), nearest_index(axis, bounds.1)) else {
        return (0, 0);
    };
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    (lo, (hi + 1).min(axis.len()))
}

/// Samples of `axis` inside `bounds` (see [`zoom`]).
pub fn truncate(axis: &[f64], bounds: XLimits) -> &[f64] {
    let (start, stop) = zoom(axis, bounds);
    &axis[start..stop]
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Edge {
    #[default]
    Rising,
    Falling,
}

/// First index at which a trigger trace crosses `threshold` on the given edge.
///
/// A sample is "high" when it is `>= threshold`. A rising edge is the first
/// high sample following a low one, a falling edge the first low sample
/// following a high one. A trace that starts high counts as rising at index 0.
pub fn find_trigger(data: &[f64], threshold: f64, edge: Edge) -> Option<usize> {
    let mut previous_high = false;
    for (i, v) in data.iter().enumerate() {
        let high = *v >= threshold;
        match edge {
            Edge::Rising if high && !previous_high => return Some(i),
            Edge::Falling if !high && previous_high => return Some(i),
            _ => {}
        }
        previous_high = high;
    }
    None
}
