//! # Spectral analysis pipeline
//!
//! [`SpectralAnalysis`] is the single entry point driven by an explicit
//! [`AnalysisConfig`]. It chains the components in file order:
//!
//! 1. **Classify** the measurement tree ([`interrogate_directory`]),
//! 2. **Assemble** reference/signal sample sets per group ([`assemble`]),
//! 3. **OD** for every group ([`od_group`]), optionally smoothed with a
//!    moving average of `averaging_window` samples,
//! 4. **Peaks** on every OD curve inside `window_limits`
//!    ([`find_relative_peaks`]) when `peak_criteria` is set,
//! 5. **Peak fits** around each detected peak ([`fit_peaks`]) when
//!    `peak_fit` is set.
//!
//! ## Failure policy
//! -----------------
//! Nothing in the batch aborts the run. Unreadable files, empty groups and
//! failed fits are collected in the [`AnalysisReport`] with enough context
//! to locate the trace; the caller decides whether any of them is fatal.
//!
//! ## Example
//! -----------------
//! ```rust, no_run
//! use specfit::config::AnalysisConfig;
//! use specfit::peaks::PeakCriteria;
//! use specfit::pipeline::SpectralAnalysis;
//!
//! let config = AnalysisConfig::builder("measurements/2023-05-12")
//!     .reference_keys(["ref"])
//!     .group_keys(["80", "180"])
//!     .window_limits(600.0, 612.0)
//!     .peak_criteria(PeakCriteria::height(0.5))
//!     .build()
//!     .unwrap();
//!
//! let report = SpectralAnalysis::new(config).run().unwrap();
//! for group in &report.groups {
//!     println!("{}: {} OD curves", group.key, group.od.curves.len());
//! }
//! ```
use camino::Utf8Path;
use log::{debug, info, warn};

use crate::assembler::{assemble, FileFailure, GroupData, GroupFailure, SampleSet};
use crate::config::AnalysisConfig;
use crate::discovery::interrogate_directory;
use crate::export::{PlotBundle, PlotSeries};
use crate::fitting::batch::{fit_peaks, FitOutcome};
use crate::optical_density::{od_group, OdSet};
use crate::peaks::find_relative_peaks;
use crate::smoothing::moving_average;
use crate::specfit_errors::SpecFitError;

/// Results of one group.
///
/// `peaks` and `labels` are parallel to `od.curves`.
#[derive(Debug)]
pub struct GroupAnalysis {
    pub key: String,
    pub od: OdSet,
    pub labels: Vec<String>,
    pub peaks: Vec<Vec<usize>>,
    pub fits: Vec<FitOutcome>,
}

/// Everything a run produced, including the collected failures.
#[derive(Debug, Default)]
pub struct AnalysisReport {
    pub groups: Vec<GroupAnalysis>,
    /// Directory entries that could not be listed.
    pub discovery_failures: Vec<SpecFitError>,
    pub file_failures: Vec<FileFailure>,
    pub group_failures: Vec<GroupFailure>,
    pub wavelengths_of_interest: Vec<f64>,
    pub stack_shift: f64,
}

impl AnalysisReport {
    pub fn group(&self, key: &str) -> Option<&GroupAnalysis> {
        self.groups.iter().find(|g| g.key == key)
    }

    pub fn fit_outcomes(&self) -> impl Iterator<Item = &FitOutcome> {
        self.groups.iter().flat_map(|g| g.fits.iter())
    }

    /// Number of collected failures of any kind, including OD pairs and fits.
    pub fn failure_count(&self) -> usize {
        self.discovery_failures.len()
            + self.file_failures.len()
            + self.group_failures.len()
            + self
                .groups
                .iter()
                .map(|g| g.od.failures.len() + g.fits.iter().filter(|f| !f.is_ok()).count())
                .sum::<usize>()
    }

    /// One plot bundle per group: every OD curve with its peak overlay, the
    /// wavelengths of interest as markers and the configured stacking shift.
    pub fn plot_bundles(&self) -> Vec<PlotBundle> {
        self.groups
            .iter()
            .map(|group| PlotBundle {
                title: group.key.clone(),
                series: group
                    .od
                    .curves
                    .iter()
                    .zip(&group.labels)
                    .zip(&group.peaks)
                    .map(|((curve, label), peaks)| PlotSeries {
                        label: label.clone(),
                        x: curve.x.clone(),
                        y: curve.od.clone(),
                        peaks: peaks.clone(),
                    })
                    .collect(),
                markers: self.wavelengths_of_interest.clone(),
                stack_shift: self.stack_shift,
            })
            .collect()
    }
}

fn file_stem(path: &Utf8Path) -> &str {
    path.file_stem().unwrap_or(path.as_str())
}

#[derive(Debug, Clone)]
pub struct SpectralAnalysis {
    config: AnalysisConfig,
}

impl SpectralAnalysis {
    pub fn new(config: AnalysisConfig) -> Self {
        SpectralAnalysis { config }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Run the whole pipeline.
    ///
    /// Return
    /// ----------
    /// * `Err` only when the configuration is invalid or the root directory
    ///   cannot be read at all; every other failure lands in the report.
    pub fn run(&self) -> Result<AnalysisReport, SpecFitError> {
        let config = &self.config;
        config.validate()?;

        let listing = interrogate_directory(&config.root_path, &config.classifier_options())?;
        let paths = listing.file_paths();
        info!(
            "{}: {} files in {} folders",
            config.root_path,
            paths.len(),
            listing.entries.len()
        );

        let dataset = assemble(
            &paths,
            &config.reference_keys,
            &config.group_keys,
            &config.assembler_options(),
        );

        let mut report = AnalysisReport {
            discovery_failures: listing.failures,
            file_failures: dataset.file_failures,
            group_failures: dataset.group_failures,
            wavelengths_of_interest: config.wavelengths_of_interest.clone(),
            stack_shift: config.stack_shift,
            ..Default::default()
        };

        for group in &dataset.groups {
            match self.analyse_group(group) {
                Ok(analysis) => report.groups.push(analysis),
                Err(error) => {
                    warn!("group {}: {error}", group.key);
                    report.group_failures.push(GroupFailure {
                        key: group.key.clone(),
                        error,
                    });
                }
            }
        }

        info!(
            "analysis finished: {} groups, {} failures",
            report.groups.len(),
            report.failure_count()
        );
        Ok(report)
    }

    /// OD, peaks and peak fits of one assembled group.
    pub fn analyse_group(&self, group: &GroupData) -> Result<GroupAnalysis, SpecFitError> {
        let config = &self.config;
        let averaged;
        let group = if config.average_repeats {
            averaged = average_group(group)?;
            &averaged
        } else {
            group
        };
        let mut od = od_group(group, config.correction_factor, config.od_pairing)?;

        if config.averaging_window > 1 {
            for curve in &mut od.curves {
                curve.od = moving_average(&curve.od, config.averaging_window);
            }
        }

        let labels = od
            .curves
            .iter()
            .map(|curve| {
                let signal = group.signals.get(curve.signal_index);
                let reference = group.references.get(curve.reference_index);
                match (signal, reference) {
                    (Some(s), Some(r)) => {
                        format!("{} / {}", file_stem(&s.source), file_stem(&r.source))
                    }
                    _ => format!("{}#{}", group.key, curve.signal_index),
                }
            })
            .collect();

        let mut peaks = Vec::with_capacity(od.curves.len());
        let mut fits = Vec::new();
        for curve in &od.curves {
            let found = match &config.peak_criteria {
                Some(criteria) => {
                    find_relative_peaks(&curve.x, &curve.od, criteria, config.window_limits)?
                }
                None => Vec::new(),
            };
            if let Some(peak_fit) = &config.peak_fit {
                fits.extend(fit_peaks(
                    &group.key,
                    curve.signal_index,
                    &curve.x,
                    &curve.od,
                    &found,
                    peak_fit,
                ));
            }
            peaks.push(found);
        }

        debug!(
            "group {}: {} curves, {} peaks",
            group.key,
            od.curves.len(),
            peaks.iter().map(Vec::len).sum::<usize>()
        );

        Ok(GroupAnalysis {
            key: group.key.clone(),
            od,
            labels,
            peaks,
            fits,
        })
    }
}

/// One mean reference and one mean signal per group; an empty side stays
/// empty.
fn average_group(group: &GroupData) -> Result<GroupData, SpecFitError> {
    let mean = |set: &SampleSet| -> Result<SampleSet, SpecFitError> {
        if set.is_empty() {
            Ok(SampleSet::default())
        } else {
            Ok(SampleSet::new(vec![set.average()?]))
        }
    };
    Ok(GroupData {
        key: group.key.clone(),
        references: mean(&group.references)?,
        signals: mean(&group.signals)?,
    })
}

#[cfg(test)]
mod pipeline_test {
    use super::*;
    use crate::assembler::Sample;
    use crate::peaks::PeakCriteria;
    use approx::assert_relative_eq;
    use camino::Utf8PathBuf;

    fn sample(name: &str, x: Vec<f64>, y: Vec<f64>) -> Sample {
        Sample {
            source: Utf8PathBuf::from(name),
            x,
            y,
        }
    }

    fn group() -> GroupData {
        let x: Vec<f64> = (0..8).map(|i| 600.0 + i as f64).collect();
        let reference = vec![2.0; 8];
        // OD = ln(2 / t) gives [0,1,5,1,0,0,2,0] shaped peaks
        let od = [0.0, 1.0, 5.0, 1.0, 0.0, 0.0, 2.0, 0.0];
        let signal = od.iter().map(|v: &f64| 2.0 / v.exp()).collect();
        GroupData {
            key: "80".into(),
            references: SampleSet::new(vec![sample("d/hwp80_ref.csv", x.clone(), reference)]),
            signals: SampleSet::new(vec![sample("d/hwp80_sig.csv", x, signal)]),
        }
    }

    #[test]
    fn test_group_od_and_peaks() {
        let config = AnalysisConfig::builder(".")
            .peak_criteria(PeakCriteria::height(0.5))
            .build()
            .unwrap();
        let analysis = SpectralAnalysis::new(config).analyse_group(&group()).unwrap();
        assert_eq!(analysis.od.curves.len(), 1);
        assert_relative_eq!(analysis.od.curves[0].od[2], 5.0, epsilon = 1e-12);
        assert_eq!(analysis.peaks, vec![vec![2]]);
        assert_eq!(analysis.labels, vec!["hwp80_sig / hwp80_ref"]);
        assert!(analysis.fits.is_empty());
    }

    #[test]
    fn test_window_limits_restrict_peaks() {
        let config = AnalysisConfig::builder(".")
            .peak_criteria(PeakCriteria::height(0.5))
            .window_limits(604.0, 607.0)
            .build()
            .unwrap();
        let analysis = SpectralAnalysis::new(config).analyse_group(&group()).unwrap();
        assert_eq!(analysis.peaks, vec![vec![6]]);
    }

    #[test]
    fn test_repeats_are_averaged_before_od() {
        let mut data = group();
        let base = data.signals.get(0).unwrap().clone();
        let scaled = |factor: f64, name: &str| Sample {
            source: Utf8PathBuf::from(name),
            x: base.x.clone(),
            y: base.y.iter().map(|v| v * factor).collect(),
        };
        data.signals = SampleSet::new(vec![
            scaled(0.5, "d/hwp80_sig_1.csv"),
            scaled(1.5, "d/hwp80_sig_2.csv"),
        ]);

        let plain = AnalysisConfig::builder(".").build().unwrap();
        let analysis = SpectralAnalysis::new(plain).analyse_group(&data).unwrap();
        assert_eq!(analysis.od.curves.len(), 2);

        let config = AnalysisConfig::builder(".")
            .average_repeats(true)
            .build()
            .unwrap();
        let analysis = SpectralAnalysis::new(config).analyse_group(&data).unwrap();
        assert_eq!(analysis.od.curves.len(), 1);
        assert_relative_eq!(analysis.od.curves[0].od[2], 5.0, epsilon = 1e-12);
        assert_eq!(analysis.labels, vec!["hwp80_sig_1 / hwp80_ref"]);
    }

    #[test]
    fn test_missing_reference_is_group_error() {
        let mut data = group();
        data.references = SampleSet::default();
        let config = AnalysisConfig::builder(".").build().unwrap();
        assert_eq!(
            SpectralAnalysis::new(config).analyse_group(&data).unwrap_err(),
            SpecFitError::EmptyGroup("80 (reference)".into())
        );
    }

    #[test]
    fn test_plot_bundles_carry_markers() {
        let config = AnalysisConfig::builder(".")
            .peak_criteria(PeakCriteria::height(0.5))
            .build()
            .unwrap();
        let analysis = SpectralAnalysis::new(config).analyse_group(&group()).unwrap();
        let report = AnalysisReport {
            groups: vec![analysis],
            wavelengths_of_interest: vec![602.0],
            stack_shift: 0.5,
            ..Default::default()
        };
        let bundles = report.plot_bundles();
        assert_eq!(bundles.len(), 1);
        assert_eq!(bundles[0].title, "80");
        assert_eq!(bundles[0].series[0].peaks, vec![2]);
        assert_eq!(bundles[0].markers, vec![602.0]);
        assert_eq!(report.failure_count(), 0);
    }
}
