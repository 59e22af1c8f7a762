//! # Optical-Density Engine
//!
//! `OD = ln(correction · reference / transmission)`, element-wise.
//!
//! ## Pairing
//! -----------------
//! A group with several reference and several signal traces is combined
//! according to [`OdPairing`]:
//! * [`OdPairing::Cartesian`] (default) – every reference against every
//!   signal, `|refs| × |signals|` curves ordered reference-major,
//! * [`OdPairing::Zip`] – reference `i` against signal `i`, truncated to the
//!   shorter of the two sets.
//!
//! The x axis of each curve is the signal's x axis.
//!
//! ## Numerical edge cases
//! -----------------
//! A non-positive transmission yields `inf`/`NaN` and is kept as is. Masking
//! those values is left to the consumer.
use itertools::iproduct;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::assembler::{GroupData, Sample, SampleSet};
use crate::specfit_errors::SpecFitError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OdPairing {
    #[default]
    Cartesian,
    Zip,
}

/// One OD curve and the indices of the traces it was computed from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OdCurve {
    pub reference_index: usize,
    pub signal_index: usize,
    pub x: Vec<f64>,
    pub od: Vec<f64>,
}

/// A reference/signal pair whose OD could not be computed.
#[derive(Debug)]
pub struct PairFailure {
    pub reference_index: usize,
    pub signal_index: usize,
    pub error: SpecFitError,
}

/// All OD curves of one group.
#[derive(Debug, Default)]
pub struct OdSet {
    pub key: String,
    pub curves: Vec<OdCurve>,
    pub failures: Vec<PairFailure>,
}

/// Element-wise optical density of two equally long traces.
///
/// ```
/// use specfit::optical_density::optical_density;
///
/// let od = optical_density(&[2.0, 2.0, 2.0], &[1.0, 1.0, 1.0], 1.0).unwrap();
/// assert!(od.iter().all(|v| (v - std::f64::consts::LN_2).abs() < 1e-15));
/// ```
pub fn optical_density(
    reference: &[f64],
    transmission: &[f64],
    correction: f64,
) -> Result<Vec<f64>, SpecFitError> {
    if reference.len() != transmission.len() {
        return Err(SpecFitError::DimensionMismatch {
            context: "reference/transmission".into(),
            left: reference.len(),
            right: transmission.len(),
        });
    }
    Ok(reference
        .iter()
        .zip(transmission)
        .map(|(r, t)| (correction * r / t).ln())
        .collect())
}

fn od_curve(
    (ri, reference): (usize, &Sample),
    (si, signal): (usize, &Sample),
    correction: f64,
) -> Result<OdCurve, SpecFitError> {
    let od = optical_density(&reference.y, &signal.y, correction).map_err(|e| match e {
        SpecFitError::DimensionMismatch { left, right, .. } => SpecFitError::DimensionMismatch {
            context: format!("{} / {}", reference.source, signal.source),
            left,
            right,
        },
        other => other,
    })?;
    Ok(OdCurve {
        reference_index: ri,
        signal_index: si,
        x: signal.x.clone(),
        od,
    })
}

/// OD curves of every reference/signal pair selected by `pairing`.
///
/// Pairs of unequal length are collected in [`OdSet::failures`]; the other
/// pairs are still computed.
pub fn od_sets(
    key: &str,
    references: &SampleSet,
    signals: &SampleSet,
    correction: f64,
    pairing: OdPairing,
) -> OdSet {
    let pairs: Vec<((usize, &Sample), (usize, &Sample))> = match pairing {
        OdPairing::Cartesian => {
            iproduct!(references.iter().enumerate(), signals.iter().enumerate()).collect()
        }
        OdPairing::Zip => {
            if references.len() != signals.len() {
                warn!(
                    "group {key}: zipping {} references with {} signals, extra traces ignored",
                    references.len(),
                    signals.len()
                );
            }
            references
                .iter()
                .enumerate()
                .zip(signals.iter().enumerate())
                .collect()
        }
    };

    let mut set = OdSet {
        key: key.to_string(),
        ..Default::default()
    };
    for (reference, signal) in pairs {
        match od_curve(reference, signal, correction) {
            Ok(curve) => set.curves.push(curve),
            Err(error) => {
                warn!("group {key}: {error}");
                set.failures.push(PairFailure {
                    reference_index: reference.0,
                    signal_index: signal.0,
                    error,
                });
            }
        }
    }
    set
}

/// OD curves of one assembled group.
///
/// Return
/// ----------
/// * `Err(EmptyGroup)` when the group has no reference or no signal trace.
pub fn od_group(
    group: &GroupData,
    correction: f64,
    pairing: OdPairing,
) -> Result<OdSet, SpecFitError> {
    if group.references.is_empty() {
        return Err(SpecFitError::EmptyGroup(format!("{} (reference)", group.key)));
    }
    if group.signals.is_empty() {
        return Err(SpecFitError::EmptyGroup(format!("{} (signal)", group.key)));
    }
    Ok(od_sets(
        &group.key,
        &group.references,
        &group.signals,
        correction,
        pairing,
    ))
}

/// OD values at the given peak indices, keeping only indices inside the
/// inclusive index range `lims` when one is given.
pub fn od_at_peaks(od: &[f64], peaks: &[usize], lims: Option<(usize, usize)>) -> Vec<f64> {
    peaks
        .iter()
        .filter(|&&i| lims.map_or(true, |(lo, hi)| i >= lo && i <= hi))
        .filter_map(|&i| od.get(i).copied())
        .collect()
}

#[cfg(test)]
mod optical_density_test {
    use super::*;
    use approx::assert_relative_eq;
    use camino::Utf8PathBuf;

    fn sample(name: &str, y: Vec<f64>) -> Sample {
        Sample {
            source: Utf8PathBuf::from(name),
            x: (0..y.len()).map(|i| i as f64).collect(),
            y,
        }
    }

    #[test]
    fn test_od_of_uniform_traces() {
        let od = optical_density(&[2.0; 3], &[1.0; 3], 1.0).unwrap();
        for v in od {
            assert_relative_eq!(v, std::f64::consts::LN_2);
        }
        let corrected = optical_density(&[1.0], &[1.0], 2.0).unwrap();
        assert_relative_eq!(corrected[0], std::f64::consts::LN_2);
    }

    #[test]
    fn test_non_positive_transmission_is_preserved() {
        let od = optical_density(&[1.0, 1.0, 0.0], &[0.0, -1.0, 0.0], 1.0).unwrap();
        assert_eq!(od[0], f64::INFINITY);
        assert!(od[1].is_nan());
        assert!(od[2].is_nan());
    }

    #[test]
    fn test_cartesian_and_zip_pairing() {
        let refs = SampleSet::new(vec![sample("r0", vec![2.0; 2]), sample("r1", vec![4.0; 2])]);
        let sigs = SampleSet::new(vec![
            sample("s0", vec![1.0; 2]),
            sample("s1", vec![2.0; 2]),
            sample("s2", vec![1.0; 3]),
        ]);

        let cartesian = od_sets("k", &refs, &sigs, 1.0, OdPairing::Cartesian);
        assert_eq!(cartesian.curves.len(), 4);
        assert_eq!(cartesian.failures.len(), 2);
        let order: Vec<(usize, usize)> = cartesian
            .curves
            .iter()
            .map(|c| (c.reference_index, c.signal_index))
            .collect();
        assert_eq!(order, vec![(0, 0), (0, 1), (1, 0), (1, 1)]);
        assert_relative_eq!(cartesian.curves[2].od[0], 4.0_f64.ln());

        let zipped = od_sets("k", &refs, &sigs, 1.0, OdPairing::Zip);
        assert_eq!(zipped.curves.len(), 2);
        assert!(zipped.failures.is_empty());
        assert_relative_eq!(zipped.curves[1].od[0], 2.0_f64.ln());
    }

    #[test]
    fn test_group_without_reference() {
        let group = GroupData {
            key: "V".into(),
            references: SampleSet::default(),
            signals: SampleSet::new(vec![sample("s0", vec![1.0])]),
        };
        assert_eq!(
            od_group(&group, 1.0, OdPairing::Cartesian).unwrap_err(),
            SpecFitError::EmptyGroup("V (reference)".into())
        );
    }

    #[test]
    fn test_od_at_peaks_range() {
        let od = [0.0, 0.1, 0.2, 0.3, 0.4];
        assert_eq!(od_at_peaks(&od, &[1, 3, 9], None), vec![0.1, 0.3]);
        assert_eq!(od_at_peaks(&od, &[1, 3, 4], Some((2, 4))), vec![0.3, 0.4]);
    }
}
