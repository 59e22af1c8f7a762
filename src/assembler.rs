//! # Dataset Assembler
//!
//! Turns a flat list of measurement files into per-group reference/signal
//! sample sets.
//!
//! ## Overview
//! -----------------
//! For every path:
//! 1. the reference split is decided by [`search_segments`] over the
//!    configured [`KeySegment`] against the reference markers,
//! 2. the group membership is decided by [`route_keys`] over the same
//!    segment against the group keys, then narrowed by the
//!    [`Disambiguation`] policy,
//! 3. the file is parsed once with [`RawRecord::read`] and columns 0/1 become a
//!    [`Sample`] (x multiplied by the calibration factor).
//!
//! Files that fail to parse, have mismatched columns or are ambiguous under
//! [`Disambiguation::ErrorOnAmbiguity`] are reported in
//! [`AssembledDataset::file_failures`]; the rest of the batch goes on.
//! Groups that end up empty (or without a reference when one is required)
//! are reported in [`AssembledDataset::group_failures`].
//!
//! With no group keys every file goes into a single group named
//! [`ALL_GROUP`].
//!
//! With [`AssemblerOptions::numeric_labels`] the substring routing is
//! replaced by exact label equality: a file belongs to the group whose key
//! equals its [`numeric_label`], so `hwp180_sig.csv` never lands in group
//! `"80"`. The group keys then only select and order the labels; when they
//! are empty every label found becomes a group.
use std::collections::HashMap;
use std::sync::LazyLock;

use camino::{Utf8Path, Utf8PathBuf};
use itertools::Itertools;
use log::{debug, info, warn};
use regex::Regex;
use serde::Serialize;

use crate::constants::DIGIT_RUN_PATTERN;
use crate::jagged::JaggedArray;
use crate::natural_sort::natural_cmp;
use crate::record::RawRecord;
use crate::router::{
    resolve_groups, route_keys, search_segments, Disambiguation, KeySegment, RoutedPath,
};
use crate::specfit_errors::SpecFitError;

/// Group name used when no group keys are configured.
pub const ALL_GROUP: &str = "all";

static DIGIT_RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(DIGIT_RUN_PATTERN).expect("digit pattern is a valid regex"));

/// One file's `(x, y)` trace. `x` and `y` always have the same length.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    pub source: Utf8PathBuf,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

impl Sample {
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

/// Ordered samples, one per source file. Lengths may differ between samples.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SampleSet {
    samples: Vec<Sample>,
}

impl SampleSet {
    pub fn new(samples: Vec<Sample>) -> Self {
        SampleSet { samples }
    }

    pub fn push(&mut self, sample: Sample) {
        self.samples.push(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Sample> {
        self.samples.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Sample> {
        self.samples.iter()
    }

    pub fn xs(&self) -> JaggedArray {
        self.samples.iter().map(|s| s.x.clone()).collect()
    }

    pub fn ys(&self) -> JaggedArray {
        self.samples.iter().map(|s| s.y.clone()).collect()
    }

    pub fn sources(&self) -> Vec<&Utf8Path> {
        self.samples.iter().map(|s| s.source.as_path()).collect()
    }

    /// Element-wise mean of repeated acquisitions.
    ///
    /// The x axis and source of the result are those of the first sample.
    ///
    /// Return
    /// ----------
    /// * [`SpecFitError::EmptySample`] for an empty set,
    /// * [`SpecFitError::DimensionMismatch`] when a sample length differs from
    ///   the first one.
    pub fn average(&self) -> Result<Sample, SpecFitError> {
        let first = self.samples.first().ok_or(SpecFitError::EmptySample)?;
        let mut sum = vec![0.0; first.len()];
        for sample in &self.samples {
            if sample.y.len() != sum.len() {
                return Err(SpecFitError::DimensionMismatch {
                    context: format!("average of {}", sample.source),
                    left: sum.len(),
                    right: sample.y.len(),
                });
            }
            sum.iter_mut().zip(&sample.y).for_each(|(acc, v)| *acc += v);
        }
        let count = self.samples.len() as f64;
        Ok(Sample {
            source: first.source.clone(),
            x: first.x.clone(),
            y: sum.into_iter().map(|v| v / count).collect(),
        })
    }
}

impl<'a> IntoIterator for &'a SampleSet {
    type Item = &'a Sample;
    type IntoIter = std::slice::Iter<'a, Sample>;

    fn into_iter(self) -> Self::IntoIter {
        self.samples.iter()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupData {
    pub key: String,
    pub references: SampleSet,
    pub signals: SampleSet,
}

#[derive(Debug)]
pub struct FileFailure {
    pub path: Utf8PathBuf,
    pub error: SpecFitError,
}

#[derive(Debug)]
pub struct GroupFailure {
    pub key: String,
    pub error: SpecFitError,
}

#[derive(Debug, Default)]
pub struct AssembledDataset {
    pub groups: Vec<GroupData>,
    pub file_failures: Vec<FileFailure>,
    pub group_failures: Vec<GroupFailure>,
}

impl AssembledDataset {
    pub fn group(&self, key: &str) -> Option<&GroupData> {
        self.groups.iter().find(|g| g.key == key)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AssemblerOptions {
    pub key_segment: KeySegment,
    pub disambiguation: Disambiguation,
    pub calibration_factor: f64,
    pub require_reference: bool,
    pub trim_ragged: bool,
    /// Group by exact numeric label instead of key substrings.
    pub numeric_labels: bool,
}

impl Default for AssemblerOptions {
    fn default() -> Self {
        AssemblerOptions {
            key_segment: KeySegment::default(),
            disambiguation: Disambiguation::default(),
            calibration_factor: 1.0,
            require_reference: false,
            trim_ragged: false,
            numeric_labels: false,
        }
    }
}

/// First run of digits in the selected segment of `path`.
///
/// ```
/// use camino::Utf8Path;
/// use specfit::assembler::numeric_label;
/// use specfit::router::KeySegment;
///
/// let path = Utf8Path::new("run3/T80K_sig.csv");
/// assert_eq!(numeric_label(path, KeySegment::FileName).as_deref(), Some("80"));
/// assert_eq!(numeric_label(path, KeySegment::FullPath).as_deref(), Some("3"));
/// ```
pub fn numeric_label(path: &Utf8Path, segment: KeySegment) -> Option<String> {
    DIGIT_RUN_RE
        .find(segment.select(path))
        .map(|m| m.as_str().to_string())
}

/// Unique numeric labels of `paths`, in natural order.
pub fn numeric_group_keys(paths: &[Utf8PathBuf], segment: KeySegment) -> Vec<String> {
    paths
        .iter()
        .filter_map(|p| numeric_label(p, segment))
        .unique()
        .sorted_by(|a, b| natural_cmp(a, b))
        .collect()
}

/// Parse one file into a [`Sample`].
///
/// Arguments
/// -----------------
/// * `path` – file to read.
/// * `calibration_factor` – multiplies every x value.
/// * `trim_ragged` – truncate mismatched x/y columns instead of failing.
pub fn load_sample(
    path: &Utf8Path,
    calibration_factor: f64,
    trim_ragged: bool,
) -> Result<Sample, SpecFitError> {
    let record = RawRecord::read(path)?;
    let (mut x, y) = record.xy(trim_ragged)?;
    if calibration_factor != 1.0 {
        x.iter_mut().for_each(|v| *v *= calibration_factor);
    }
    Ok(Sample {
        source: path.to_path_buf(),
        x,
        y,
    })
}

/// Build the per-group reference/signal sample sets.
///
/// Arguments
/// -----------------
/// * `paths` – files to assemble, in the order samples should appear.
/// * `reference_keys` – markers identifying reference traces in the key segment.
/// * `group_keys` – classification keys; empty means a single [`ALL_GROUP`],
///   or every label found when `options.numeric_labels` is set.
/// * `options` – key segment, disambiguation, labels, calibration and ragged
///   policy.
///
/// Return
/// ----------
/// * An [`AssembledDataset`] holding one [`GroupData`] per surviving key in
///   key order, plus the collected per-file and per-group failures.
pub fn assemble<R, G>(
    paths: &[Utf8PathBuf],
    reference_keys: &[R],
    group_keys: &[G],
    options: &AssemblerOptions,
) -> AssembledDataset
where
    R: AsRef<str>,
    G: AsRef<str>,
{
    let mut dataset = AssembledDataset::default();

    let (reference_paths, _) = search_segments(paths, reference_keys, options.key_segment);

    let (group_keys, mut routed): (Vec<String>, Vec<RoutedPath>) = if options.numeric_labels {
        let keys: Vec<String> = if group_keys.is_empty() {
            numeric_group_keys(paths, options.key_segment)
        } else {
            group_keys.iter().map(|k| k.as_ref().to_string()).collect()
        };
        debug!("numeric group keys: {keys:?}");
        let routed = paths
            .iter()
            .map(|p| RoutedPath {
                path: p.clone(),
                keys: numeric_label(p, options.key_segment)
                    .filter(|label| keys.contains(label))
                    .into_iter()
                    .collect(),
            })
            .collect();
        (keys, routed)
    } else if group_keys.is_empty() {
        let routed = paths
            .iter()
            .map(|p| RoutedPath {
                path: p.clone(),
                keys: vec![ALL_GROUP.to_string()],
            })
            .collect();
        (vec![ALL_GROUP.to_string()], routed)
    } else {
        let keys: Vec<String> = group_keys.iter().map(|k| k.as_ref().to_string()).collect();
        let routed = route_keys(paths, &keys, options.key_segment);
        (keys, routed)
    };

    if options.disambiguation == Disambiguation::ErrorOnAmbiguity {
        routed.retain(|rp| {
            if rp.keys.len() > 1 {
                let error = SpecFitError::AmbiguousKey {
                    path: rp.path.to_string(),
                    keys: rp.keys.clone(),
                };
                warn!("{error}");
                dataset.file_failures.push(FileFailure {
                    path: rp.path.clone(),
                    error,
                });
                false
            } else {
                true
            }
        });
    }

    let file_groups = match resolve_groups(&routed, &group_keys, options.disambiguation) {
        Ok(groups) => groups,
        Err(error) => {
            // only ambiguity fails here and ambiguous paths were removed above
            dataset.group_failures.push(GroupFailure {
                key: group_keys.join(","),
                error,
            });
            return dataset;
        }
    };

    // each file is parsed once even if it belongs to several groups
    let mut loaded: HashMap<&Utf8Path, Sample> = HashMap::new();
    for path in file_groups.iter().flat_map(|(_, p)| p.iter()).unique() {
        match load_sample(path, options.calibration_factor, options.trim_ragged) {
            Ok(sample) => {
                debug!("loaded {path} ({} samples)", sample.len());
                loaded.insert(path.as_path(), sample);
            }
            Err(error) => {
                warn!("skipping {path}: {error}");
                dataset.file_failures.push(FileFailure {
                    path: path.clone(),
                    error,
                });
            }
        }
    }

    for (key, group_paths) in file_groups.iter() {
        let mut references = SampleSet::default();
        let mut signals = SampleSet::default();
        for path in group_paths {
            let Some(sample) = loaded.get(path.as_path()) else {
                continue;
            };
            if reference_paths.contains(path) {
                references.push(sample.clone());
            } else {
                signals.push(sample.clone());
            }
        }

        if references.is_empty() && signals.is_empty() {
            warn!("group {key}: no file could be assembled");
            dataset.group_failures.push(GroupFailure {
                key: key.to_string(),
                error: SpecFitError::EmptyGroup(key.to_string()),
            });
            continue;
        }
        if options.require_reference && references.is_empty() {
            warn!("group {key}: no reference trace");
            dataset.group_failures.push(GroupFailure {
                key: key.to_string(),
                error: SpecFitError::EmptyGroup(format!("{key} (reference)")),
            });
            continue;
        }

        dataset.groups.push(GroupData {
            key: key.to_string(),
            references,
            signals,
        });
    }

    info!(
        "assembled {} groups from {} files ({} file failures, {} group failures)",
        dataset.groups.len(),
        paths.len(),
        dataset.file_failures.len(),
        dataset.group_failures.len()
    );
    dataset
}
