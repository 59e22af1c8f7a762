//! # Analysis configuration
//!
//! [`AnalysisConfig`] is the single immutable record handed to the pipeline
//! entry point. It replaces per-script constants (paths, calibration
//! factors, wavelengths of interest) with one validated value.
//!
//! ## Construction
//! -----------------
//! * [`AnalysisConfig::builder`] – fluent builder, validated by
//!   [`AnalysisConfigBuilder::build`],
//! * [`AnalysisConfig::from_json_file`] / [`AnalysisConfig::from_json_str`] –
//!   JSON with any subset of fields (missing fields take their defaults),
//!   validated the same way.
//!
//! ## Validation
//! -----------------
//! * `calibration_factor`, `correction_factor` finite and `> 0`,
//! * `window_limits` finite with `lower < upper`,
//! * peak fractions in `(0, 1]`,
//! * `file_glob` compiles,
//! * `peak_fit.smoothing_sigma` in `[0, MAX_SMOOTHING_SIGMA]`, `peak_fit.tolerance` entries `> 0`,
//!   `peak_fit.edge_fraction` in `[0, 1)`.
use std::cmp::Ordering::{Equal, Greater, Less};
use std::fmt;
use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use globset::Glob;
use serde::Deserialize;

use crate::assembler::AssemblerOptions;
use crate::constants::{XLimits, MAX_SMOOTHING_SIGMA};
use crate::discovery::ClassifierOptions;
use crate::fitting::batch::PeakFitConfig;
use crate::optical_density::OdPairing;
use crate::peaks::PeakCriteria;
use crate::router::{Disambiguation, KeySegment};
use crate::specfit_errors::SpecFitError;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    // --- discovery ---
    pub root_path: Utf8PathBuf,
    pub file_glob: Option<String>,
    pub extensions: Vec<String>,
    pub exclusions: Vec<String>,
    pub folders: Vec<String>,
    pub drop_empty_folders: bool,

    // --- grouping ---
    pub reference_keys: Vec<String>,
    /// Classification keys; empty with `numeric_groups` derives them from the
    /// file names, empty otherwise puts every file in one group.
    pub group_keys: Vec<String>,
    /// Route each file to the group equal to the first digit run of its key
    /// segment instead of matching keys as substrings.
    pub numeric_groups: bool,
    pub key_segment: KeySegment,
    pub disambiguation: Disambiguation,
    pub require_reference: bool,
    pub trim_ragged: bool,

    // --- numerics ---
    /// Multiplies every x value (instrument wavelength calibration).
    pub calibration_factor: f64,
    /// Multiplies the reference trace before the OD ratio.
    pub correction_factor: f64,
    pub od_pairing: OdPairing,
    /// Moving-average window applied to OD curves; `<= 1` disables it.
    pub averaging_window: usize,
    /// Replace the references and the signals of each group by their
    /// element-wise mean before the OD ratio.
    pub average_repeats: bool,

    // --- peaks ---
    /// Vertical markers for plotting, in x units.
    pub wavelengths_of_interest: Vec<f64>,
    pub window_limits: Option<XLimits>,
    pub peak_criteria: Option<PeakCriteria>,
    pub peak_fit: Option<PeakFitConfig>,
    /// Vertical offset between stacked curves in plot bundles.
    pub stack_shift: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            root_path: Utf8PathBuf::from("."),
            file_glob: None,
            extensions: vec![".csv".into(), ".txt".into()],
            exclusions: Vec::new(),
            folders: Vec::new(),
            drop_empty_folders: true,

            reference_keys: vec!["ref".into()],
            group_keys: Vec::new(),
            numeric_groups: false,
            key_segment: KeySegment::default(),
            disambiguation: Disambiguation::default(),
            require_reference: false,
            trim_ragged: false,

            calibration_factor: 1.0,
            correction_factor: 1.0,
            od_pairing: OdPairing::default(),
            averaging_window: 0,
            average_repeats: false,

            wavelengths_of_interest: Vec::new(),
            window_limits: None,
            peak_criteria: None,
            peak_fit: None,
            stack_shift: 0.0,
        }
    }
}

fn gt0(x: f64) -> bool {
    x.is_finite() && x.partial_cmp(&0.0) == Some(Greater)
}

fn fraction(x: f64) -> bool {
    gt0(x) && matches!(x.partial_cmp(&1.0), Some(Less) | Some(Equal))
}

fn invalid(msg: impl Into<String>) -> SpecFitError {
    SpecFitError::InvalidConfig(msg.into())
}

impl AnalysisConfig {
    pub fn builder(root_path: impl Into<Utf8PathBuf>) -> AnalysisConfigBuilder {
        AnalysisConfigBuilder::new(root_path)
    }

    /// Parse and validate a JSON configuration.
    pub fn from_json_str(text: &str) -> Result<Self, SpecFitError> {
        let config: AnalysisConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Utf8Path) -> Result<Self, SpecFitError> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<(), SpecFitError> {
        if !gt0(self.calibration_factor) {
            return Err(invalid("calibration_factor must be finite and > 0"));
        }
        if !gt0(self.correction_factor) {
            return Err(invalid("correction_factor must be finite and > 0"));
        }
        if let Some((lo, hi)) = self.window_limits {
            if !(lo.is_finite() && hi.is_finite() && lo < hi) {
                return Err(invalid("window_limits require finite lower < upper"));
            }
        }
        if let Some(c) = &self.peak_criteria {
            for (name, v) in [
                ("height_fraction", c.height_fraction),
                ("prominence_fraction", c.prominence_fraction),
            ] {
                if let Some(v) = v {
                    if !fraction(v) {
                        return Err(invalid(format!("{name} must be in (0, 1]")));
                    }
                }
            }
        }
        if let Some(fit) = &self.peak_fit {
            if !(0.0..=MAX_SMOOTHING_SIGMA).contains(&fit.smoothing_sigma) {
                return Err(invalid(format!(
                    "peak_fit.smoothing_sigma must be in [0, {MAX_SMOOTHING_SIGMA}]"
                )));
            }
            if fit.tolerance.iter().any(|t| !gt0(*t)) {
                return Err(invalid("peak_fit.tolerance entries must be > 0"));
            }
            if let Some(e) = fit.edge_fraction {
                if !(e.is_finite() && (0.0..1.0).contains(&e)) {
                    return Err(invalid("peak_fit.edge_fraction must be in [0, 1)"));
                }
            }
        }
        if !self.stack_shift.is_finite() {
            return Err(invalid("stack_shift must be finite"));
        }
        if let Some(pattern) = &self.file_glob {
            Glob::new(pattern)?;
        }
        Ok(())
    }

    pub fn classifier_options(&self) -> ClassifierOptions {
        ClassifierOptions {
            extensions: self.extensions.clone(),
            exclusions: self.exclusions.clone(),
            folders: self.folders.clone(),
            file_glob: self.file_glob.clone(),
            drop_empty_folders: self.drop_empty_folders,
        }
    }

    pub fn assembler_options(&self) -> AssemblerOptions {
        AssemblerOptions {
            key_segment: self.key_segment,
            disambiguation: self.disambiguation,
            calibration_factor: self.calibration_factor,
            require_reference: self.require_reference,
            trim_ragged: self.trim_ragged,
            numeric_labels: self.numeric_groups,
        }
    }
}

/// Builder for [`AnalysisConfig`], with validation.
#[derive(Debug, Clone)]
pub struct AnalysisConfigBuilder {
    config: AnalysisConfig,
}

impl AnalysisConfigBuilder {
    pub fn new(root_path: impl Into<Utf8PathBuf>) -> Self {
        AnalysisConfigBuilder {
            config: AnalysisConfig {
                root_path: root_path.into(),
                ..Default::default()
            },
        }
    }

    pub fn file_glob(mut self, pattern: impl Into<String>) -> Self {
        self.config.file_glob = Some(pattern.into());
        self
    }

    pub fn extensions<S: Into<String>>(mut self, v: impl IntoIterator<Item = S>) -> Self {
        self.config.extensions = v.into_iter().map(Into::into).collect();
        self
    }

    pub fn exclusions<S: Into<String>>(mut self, v: impl IntoIterator<Item = S>) -> Self {
        self.config.exclusions = v.into_iter().map(Into::into).collect();
        self
    }

    pub fn folders<S: Into<String>>(mut self, v: impl IntoIterator<Item = S>) -> Self {
        self.config.folders = v.into_iter().map(Into::into).collect();
        self
    }

    pub fn drop_empty_folders(mut self, v: bool) -> Self {
        self.config.drop_empty_folders = v;
        self
    }

    pub fn reference_keys<S: Into<String>>(mut self, v: impl IntoIterator<Item = S>) -> Self {
        self.config.reference_keys = v.into_iter().map(Into::into).collect();
        self
    }

    pub fn group_keys<S: Into<String>>(mut self, v: impl IntoIterator<Item = S>) -> Self {
        self.config.group_keys = v.into_iter().map(Into::into).collect();
        self
    }

    pub fn numeric_groups(mut self, v: bool) -> Self {
        self.config.numeric_groups = v;
        self
    }

    pub fn key_segment(mut self, v: KeySegment) -> Self {
        self.config.key_segment = v;
        self
    }

    pub fn disambiguation(mut self, v: Disambiguation) -> Self {
        self.config.disambiguation = v;
        self
    }

    pub fn require_reference(mut self, v: bool) -> Self {
        self.config.require_reference = v;
        self
    }

    pub fn trim_ragged(mut self, v: bool) -> Self {
        self.config.trim_ragged = v;
        self
    }

    pub fn calibration_factor(mut self, v: f64) -> Self {
        self.config.calibration_factor = v;
        self
    }

    pub fn correction_factor(mut self, v: f64) -> Self {
        self.config.correction_factor = v;
        self
    }

    pub fn od_pairing(mut self, v: OdPairing) -> Self {
        self.config.od_pairing = v;
        self
    }

    pub fn averaging_window(mut self, v: usize) -> Self {
        self.config.averaging_window = v;
        self
    }

    pub fn average_repeats(mut self, v: bool) -> Self {
        self.config.average_repeats = v;
        self
    }

    pub fn wavelengths_of_interest(mut self, v: Vec<f64>) -> Self {
        self.config.wavelengths_of_interest = v;
        self
    }

    pub fn window_limits(mut self, lower: f64, upper: f64) -> Self {
        self.config.window_limits = Some((lower, upper));
        self
    }

    pub fn peak_criteria(mut self, v: PeakCriteria) -> Self {
        self.config.peak_criteria = Some(v);
        self
    }

    pub fn peak_fit(mut self, v: PeakFitConfig) -> Self {
        self.config.peak_fit = Some(v);
        self
    }

    pub fn stack_shift(mut self, v: f64) -> Self {
        self.config.stack_shift = v;
        self
    }

    pub fn build(self) -> Result<AnalysisConfig, SpecFitError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl fmt::Display for AnalysisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const PARAM_COL: usize = 44;
        writeln!(f, "Analysis configuration")?;
        writeln!(f, "----------------------")?;

        macro_rules! line {
            ($fmt:expr, $val:expr, $comment:expr) => {{
                let s = format!($fmt, $val);
                let pad = " ".repeat(PARAM_COL.saturating_sub(s.len()).max(1));
                writeln!(f, "  {}{}# {}", s, pad, $comment)
            }};
        }

        line!("root_path          = {}", self.root_path, "Measurement directory")?;
        line!("extensions         = {:?}", self.extensions, "Accepted file suffixes")?;
        line!("reference_keys     = {:?}", self.reference_keys, "Reference markers")?;
        line!("group_keys         = {:?}", self.group_keys, "Classification keys")?;
        line!("calibration_factor = {}", self.calibration_factor, "x multiplier")?;
        line!("correction_factor  = {}", self.correction_factor, "Reference multiplier")?;
        line!("od_pairing         = {:?}", self.od_pairing, "Reference/signal pairing")?;
        line!("averaging_window   = {}", self.averaging_window, "OD moving average")?;
        line!("average_repeats    = {}", self.average_repeats, "Mean of repeated traces")?;
        line!("window_limits      = {:?}", self.window_limits, "Peak search x-range")?;
        line!("peak_fit           = {:?}", self.peak_fit.as_ref().map(|p| p.model), "Peak line shape")?;
        Ok(())
    }
}

#[cfg(test)]
mod config_test {
    use super::*;
    use crate::fitting::ModelKind;

    #[test]
    fn test_builder_validation() {
        let ok = AnalysisConfig::builder("data")
            .reference_keys(["bg"])
            .group_keys(["H", "V"])
            .window_limits(600.0, 610.0)
            .peak_criteria(PeakCriteria::height(0.5))
            .build()
            .unwrap();
        assert_eq!(ok.root_path, Utf8PathBuf::from("data"));
        assert_eq!(ok.reference_keys, vec!["bg"]);

        assert_eq!(
            AnalysisConfig::builder("data")
                .calibration_factor(0.0)
                .build()
                .unwrap_err(),
            invalid("calibration_factor must be finite and > 0")
        );
        assert!(AnalysisConfig::builder("data")
            .window_limits(10.0, 1.0)
            .build()
            .is_err());
        assert!(AnalysisConfig::builder("data")
            .peak_criteria(PeakCriteria::prominence(1.5))
            .build()
            .is_err());
        assert!(matches!(
            AnalysisConfig::builder("data").file_glob("[").build(),
            Err(SpecFitError::GlobError(_))
        ));
    }

    #[test]
    fn test_smoothing_sigma_is_capped() {
        let with_sigma = |smoothing_sigma: f64| {
            AnalysisConfig::builder("data")
                .peak_fit(PeakFitConfig {
                    model: ModelKind::Lorentzian,
                    smoothing_sigma,
                    ..Default::default()
                })
                .build()
        };
        assert!(with_sigma(0.0).is_ok());
        assert!(with_sigma(MAX_SMOOTHING_SIGMA).is_ok());
        for sigma in [-1.0, 1e12, f64::INFINITY, f64::NAN] {
            assert!(
                matches!(with_sigma(sigma), Err(SpecFitError::InvalidConfig(_))),
                "{sigma} accepted"
            );
        }
    }

    #[test]
    fn test_json_partial_fields() {
        let config = AnalysisConfig::from_json_str(
            r#"{
                "root_path": "runs/2023-05",
                "group_keys": ["80", "180"],
                "disambiguation": "longest_match",
                "od_pairing": "zip",
                "window_limits": [605.0, 607.5],
                "peak_fit": {"model": "gaussian", "tolerance": [0.1]}
            }"#,
        )
        .unwrap();
        assert_eq!(config.disambiguation, Disambiguation::LongestMatch);
        assert_eq!(config.od_pairing, OdPairing::Zip);
        assert_eq!(config.window_limits, Some((605.0, 607.5)));
        let fit = config.peak_fit.unwrap();
        assert_eq!(fit.model, ModelKind::Gaussian);
        assert_eq!(fit.half_window, 10);
        assert_eq!(config.calibration_factor, 1.0);
    }

    #[test]
    fn test_json_rejects_unknown_and_invalid() {
        assert!(matches!(
            AnalysisConfig::from_json_str(r#"{"root": "x"}"#),
            Err(SpecFitError::JsonError(_))
        ));
        assert!(matches!(
            AnalysisConfig::from_json_str(r#"{"correction_factor": -1.0}"#),
            Err(SpecFitError::InvalidConfig(_))
        ));
    }
}
