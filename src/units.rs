//! Conversion between the spectral axes an instrument can export: wavelength
//! in nm, wavenumber in cm⁻¹ and frequency in Hz.
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::{NM_PER_CM, NM_PER_M, SPEED_OF_LIGHT};
use crate::specfit_errors::SpecFitError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpectralUnit {
    /// nm
    #[default]
    Wavelength,
    /// cm⁻¹
    Wavenumber,
    /// Hz
    Frequency,
}

impl SpectralUnit {
    fn to_nm(self, value: f64) -> f64 {
        match self {
            SpectralUnit::Wavelength => value,
            SpectralUnit::Wavenumber => NM_PER_CM / value,
            SpectralUnit::Frequency => SPEED_OF_LIGHT / value * NM_PER_M,
        }
    }

    fn from_nm(self, nm: f64) -> f64 {
        match self {
            SpectralUnit::Wavelength => nm,
            SpectralUnit::Wavenumber => NM_PER_CM / nm,
            SpectralUnit::Frequency => SPEED_OF_LIGHT / (nm / NM_PER_M),
        }
    }
}

impl fmt::Display for SpectralUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SpectralUnit::Wavelength => "nm",
            SpectralUnit::Wavenumber => "cm^-1",
            SpectralUnit::Frequency => "Hz",
        };
        write!(f, "{s}")
    }
}

impl FromStr for SpectralUnit {
    type Err = SpecFitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "nm" | "wavelength" => Ok(SpectralUnit::Wavelength),
            "cm^-1" | "cm-1" | "wavenumber" => Ok(SpectralUnit::Wavenumber),
            "Hz" | "hz" | "frequency" => Ok(SpectralUnit::Frequency),
            other => Err(SpecFitError::InvalidConfig(format!(
                "unknown spectral unit {other:?}"
            ))),
        }
    }
}

/// Convert one value between spectral units. Zero maps to infinity for the
/// reciprocal conversions.
///
/// ```
/// use specfit::units::{convert, SpectralUnit};
///
/// let k = convert(500.0, SpectralUnit::Wavelength, SpectralUnit::Wavenumber);
/// assert!((k - 20_000.0).abs() < 1e-9);
/// ```
pub fn convert(value: f64, from: SpectralUnit, to: SpectralUnit) -> f64 {
    if from == to {
        return value;
    }
    to.from_nm(from.to_nm(value))
}

pub fn convert_all(values: &[f64], from: SpectralUnit, to: SpectralUnit) -> Vec<f64> {
    values.iter().map(|&v| convert(v, from, to)).collect()
}
