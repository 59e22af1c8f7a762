//! # Constants and type definitions for specfit
//!
//! Character sets and delimiters used by the record parser, physical constants
//! used by unit conversion, numerical defaults for the fitting engine, and the
//! type aliases shared by the pipeline stages.

// -------------------------------------------------------------------------------------------------
// Record parsing
// -------------------------------------------------------------------------------------------------

/// Characters allowed on a numeric data line (digits, sign, decimal point,
/// exponent markers, delimiters and intra-line whitespace).
pub const NUMERIC_LINE_CHARS: &str = "0123456789\n\t\r eE-+,.;";

/// Regex used to split a line into tokens.
pub const DELIMITER_PATTERN: &str = r"[\t,;]";

/// Regex used to extract numeric labels (temperature, angle, ...) from file names.
pub const DIGIT_RUN_PATTERN: &str = r"\d+";

// -------------------------------------------------------------------------------------------------
// Physical constants
// -------------------------------------------------------------------------------------------------

/// Speed of light in m/s
pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;

/// Nanometres per centimetre, converts a wavenumber in cm⁻¹ to a wavelength in nm
pub const NM_PER_CM: f64 = 1e7;

/// Metres → nanometres
pub const NM_PER_M: f64 = 1e9;

/// FWHM = 2·√(2·ln 2)·σ for a Gaussian
pub const FWHM_PER_SIGMA: f64 = 2.354_820_045_030_949_4;

// -------------------------------------------------------------------------------------------------
// Fitting defaults
// -------------------------------------------------------------------------------------------------

/// Default iteration budget of the least-squares optimiser
pub const DEFAULT_MAX_ITER: usize = 500;

/// Relative reduction of the residual sum of squares considered as converged
pub const DEFAULT_FTOL: f64 = 1e-12;

/// Relative step size considered as converged
pub const DEFAULT_XTOL: f64 = 1e-12;

/// Infinity norm of the gradient considered as converged
pub const DEFAULT_GTOL: f64 = 1e-14;

/// Initial Levenberg–Marquardt damping
pub const INITIAL_DAMPING: f64 = 1e-3;

/// Floor of the damping once steps keep succeeding
pub const MIN_DAMPING: f64 = 1e-12;

/// Damping above which the optimiser is considered stalled at a minimum
pub const MAX_DAMPING: f64 = 1e20;

/// Radius of the Gaussian smoothing kernel, in units of σ
pub const GAUSSIAN_TRUNCATE: f64 = 4.0;

/// Largest accepted peak-fit smoothing σ, in samples
pub const MAX_SMOOTHING_SIGMA: f64 = 1e4;

// -------------------------------------------------------------------------------------------------
// Type aliases
// -------------------------------------------------------------------------------------------------

/// Index of a sample inside a window
pub type SampleIndex = usize;

/// Closed x-range `(lower, upper)` used to restrict a window
pub type XLimits = (f64, f64);
