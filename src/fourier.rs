//! # Fourier transform of sampled traces
//!
//! Discrete Fourier transform of a uniformly sampled trace, with the bin
//! frequencies in the usual unshifted order:
//!
//! ```text
//! [0, 1, …, ⌈n/2⌉ - 1, -⌊n/2⌋, …, -1] / (n · d)
//! ```
//!
//! where `d` is the sample spacing. The spacing is taken from the first two
//! samples of the time axis; a non-uniform axis is not checked.
use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

use crate::specfit_errors::SpecFitError;

/// Spectrum of one trace, bin `k` at `frequencies[k]`.
#[derive(Debug, Clone, PartialEq)]
pub struct FftSpectrum {
    pub frequencies: Vec<f64>,
    pub values: Vec<Complex<f64>>,
}

impl FftSpectrum {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `|X_k|` per bin.
    pub fn magnitudes(&self) -> Vec<f64> {
        self.values.iter().map(|c| c.norm()).collect()
    }

    /// Bin of largest magnitude with a strictly positive frequency.
    pub fn dominant_frequency(&self) -> Option<f64> {
        self.frequencies
            .iter()
            .zip(&self.values)
            .filter(|(f, _)| **f > 0.0)
            .max_by(|a, b| a.1.norm().total_cmp(&b.1.norm()))
            .map(|(f, _)| *f)
    }
}

/// Sample frequencies of an `n`-point transform with sample spacing `spacing`.
pub fn fft_frequencies(n: usize, spacing: f64) -> Vec<f64> {
    let scale = 1.0 / (n as f64 * spacing);
    let positive = n.div_ceil(2);
    (0..n)
        .map(|k| {
            if k < positive {
                k as f64 * scale
            } else {
                -((n - k) as f64) * scale
            }
        })
        .collect()
}

/// Forward FFT of `amplitude` sampled at `time`.
///
/// Arguments
/// -----------------
/// * `time` – sample times, uniformly spaced.
/// * `amplitude` – real samples, same length as `time`.
///
/// Return
/// ----------
/// * The unnormalised transform with its bin frequencies, in units of
///   `1 / time`.
/// * [`SpecFitError::EmptySample`] for empty input,
///   [`SpecFitError::DimensionMismatch`] for unequal lengths,
///   [`SpecFitError::InvalidSpacing`] when `time[1] - time[0]` is zero or not
///   finite.
pub fn fft_spectrum(time: &[f64], amplitude: &[f64]) -> Result<FftSpectrum, SpecFitError> {
    if time.len() != amplitude.len() {
        return Err(SpecFitError::DimensionMismatch {
            context: "fft time/amplitude".into(),
            left: time.len(),
            right: amplitude.len(),
        });
    }
    let n = time.len();
    if n == 0 {
        return Err(SpecFitError::EmptySample);
    }
    // a single sample has only the zero-frequency bin
    let frequencies = if n == 1 {
        vec![0.0]
    } else {
        let spacing = time[1] - time[0];
        if !(spacing.is_finite() && spacing != 0.0) {
            return Err(SpecFitError::InvalidSpacing(spacing));
        }
        fft_frequencies(n, spacing)
    };

    let mut buffer: Vec<Complex<f64>> = amplitude.iter().map(|&a| Complex::new(a, 0.0)).collect();
    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(n);
    fft.process(&mut buffer);

    Ok(FftSpectrum {
        frequencies,
        values: buffer,
    })
}

#[cfg(test)]
mod fourier_test {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    #[test]
    fn test_frequency_order() {
        assert_eq!(
            fft_frequencies(5, 0.5),
            vec![0.0, 0.4, 0.8, -0.8, -0.4]
        );
        assert_eq!(
            fft_frequencies(4, 0.25),
            vec![0.0, 1.0, -2.0, -1.0]
        );
    }

    #[test]
    fn test_tone_lands_in_its_bin() {
        // 64 samples at 1 ms, 125 Hz = bin 8
        let time: Vec<f64> = (0..64).map(|i| i as f64 * 1e-3).collect();
        let amplitude: Vec<f64> = time
            .iter()
            .map(|t| 1.0 + (2.0 * PI * 125.0 * t).cos())
            .collect();

        let spectrum = fft_spectrum(&time, &amplitude).unwrap();
        assert_eq!(spectrum.len(), 64);
        assert_relative_eq!(spectrum.frequencies[8], 125.0, epsilon = 1e-9);
        assert_relative_eq!(spectrum.dominant_frequency().unwrap(), 125.0, epsilon = 1e-9);

        let magnitudes = spectrum.magnitudes();
        // DC carries the mean, the tone splits between ±125 Hz
        assert_relative_eq!(magnitudes[0], 64.0, epsilon = 1e-9);
        assert_relative_eq!(magnitudes[8], 32.0, epsilon = 1e-9);
        assert_relative_eq!(magnitudes[56], 32.0, epsilon = 1e-9);
        assert!(magnitudes[3] < 1e-9);
    }

    #[test]
    fn test_invalid_input() {
        assert_eq!(fft_spectrum(&[], &[]).unwrap_err(), SpecFitError::EmptySample);
        assert!(matches!(
            fft_spectrum(&[0.0, 1.0], &[1.0]),
            Err(SpecFitError::DimensionMismatch { left: 2, right: 1, .. })
        ));
        assert_eq!(
            fft_spectrum(&[1.0, 1.0, 2.0], &[1.0, 2.0, 3.0]).unwrap_err(),
            SpecFitError::InvalidSpacing(0.0)
        );
        let single = fft_spectrum(&[3.0], &[2.5]).unwrap();
        assert_eq!(single.frequencies, vec![0.0]);
        assert_eq!(single.values, vec![Complex::new(2.5, 0.0)]);
    }
}
