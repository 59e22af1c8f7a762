//! # Path Router
//!
//! Partitions flat path lists by case-sensitive, unanchored substring match
//! against classification keys (polarisation codes, temperature labels,
//! reference markers).
//!
//! ## Overview
//! -----------------
//! * [`search_paths`] – split paths into `matched` / `unmatched` against the
//!   whole path string; input order is preserved in both outputs.
//! * [`search_segments`] – same split, matched against a chosen
//!   [`KeySegment`] of each path.
//! * [`route_keys`] – for every path, **all** keys it matches. A path can match
//!   several keys (`"80"` and `"180"`), so the caller picks a
//!   [`Disambiguation`] policy and [`resolve_groups`] builds the
//!   [`FileGroup`] accordingly.
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use crate::specfit_errors::SpecFitError;

/// Part of a path that keys are matched against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeySegment {
    /// The whole path string.
    FullPath,
    /// The final component (tail).
    #[default]
    FileName,
    /// Everything before the final component (head).
    Parent,
}

impl KeySegment {
    pub fn select<'a>(&self, path: &'a Utf8Path) -> &'a str {
        match self {
            KeySegment::FullPath => path.as_str(),
            KeySegment::FileName => path.file_name().unwrap_or(""),
            KeySegment::Parent => path.parent().map_or("", Utf8Path::as_str),
        }
    }
}

/// Policy applied when one path matches several keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disambiguation {
    /// The path is listed under every key it matches.
    #[default]
    AllMatches,
    /// The first matching key in key order wins.
    FirstMatch,
    /// The longest matching key wins; ties go to the earlier key.
    LongestMatch,
    /// A path matching more than one key is an error.
    ErrorOnAmbiguity,
}

/// A path and every key found in its selected segment, in key order.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutedPath {
    pub path: Utf8PathBuf,
    pub keys: Vec<String>,
}

/// Key → paths mapping. Keys keep their input order, paths keep input order
/// within each key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileGroup {
    groups: Vec<(String, Vec<Utf8PathBuf>)>,
}

impl FileGroup {
    pub fn get(&self, key: &str) -> Option<&[Utf8PathBuf]> {
        self.groups
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, paths)| paths.as_slice())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Utf8PathBuf])> {
        self.groups.iter().map(|(k, p)| (k.as_str(), p.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Split `paths` into those containing at least one key anywhere in the
/// path string and the rest.
///
/// ```
/// use specfit::router::search_paths;
///
/// let paths = ["x_ref_1.csv", "x_sig_1.csv"];
/// let (matched, unmatched) = search_paths(&paths, &["ref"]);
/// assert_eq!(matched, vec!["x_ref_1.csv"]);
/// assert_eq!(unmatched, vec!["x_sig_1.csv"]);
/// ```
pub fn search_paths<P, K>(paths: &[P], keys: &[K]) -> (Vec<P>, Vec<P>)
where
    P: AsRef<str> + Clone,
    K: AsRef<str>,
{
    paths
        .iter()
        .cloned()
        .partition(|p| keys.iter().any(|k| p.as_ref().contains(k.as_ref())))
}

/// [`search_paths`] against a [`KeySegment`] of each path.
pub fn search_segments<K: AsRef<str>>(
    paths: &[Utf8PathBuf],
    keys: &[K],
    segment: KeySegment,
) -> (Vec<Utf8PathBuf>, Vec<Utf8PathBuf>) {
    paths.iter().cloned().partition(|p| {
        let haystack = segment.select(p);
        keys.iter().any(|k| haystack.contains(k.as_ref()))
    })
}

/// Every key matched by every path. Paths matching no key are kept with an
/// empty key list.
pub fn route_keys<K: AsRef<str>>(
    paths: &[Utf8PathBuf],
    keys: &[K],
    segment: KeySegment,
) -> Vec<RoutedPath> {
    paths
        .iter()
        .map(|p| {
            let haystack = segment.select(p);
            RoutedPath {
                path: p.clone(),
                keys: keys
                    .iter()
                    .map(AsRef::as_ref)
                    .filter(|k| haystack.contains(k))
                    .map(str::to_string)
                    .collect(),
            }
        })
        .collect()
}

/// Build a [`FileGroup`] from routed paths under a disambiguation policy.
///
/// Every key in `keys` gets an entry, possibly empty; unmatched paths are
/// dropped.
pub fn resolve_groups<K: AsRef<str>>(
    routed: &[RoutedPath],
    keys: &[K],
    policy: Disambiguation,
) -> Result<FileGroup, SpecFitError> {
    let mut groups: Vec<(String, Vec<Utf8PathBuf>)> = keys
        .iter()
        .map(|k| (k.as_ref().to_string(), Vec::new()))
        .collect();

    for rp in routed {
        let chosen: Vec<&String> = match policy {
            Disambiguation::AllMatches => rp.keys.iter().collect(),
            Disambiguation::FirstMatch => rp.keys.first().into_iter().collect(),
            Disambiguation::LongestMatch => rp
                .keys
                .iter()
                .rev()
                .max_by_key(|k| k.len())
                .into_iter()
                .collect(),
            Disambiguation::ErrorOnAmbiguity => {
                if rp.keys.len() > 1 {
                    return Err(SpecFitError::AmbiguousKey {
                        path: rp.path.to_string(),
                        keys: rp.keys.clone(),
                    });
                }
                rp.keys.iter().collect()
            }
        };
        for key in chosen {
            if let Some((_, paths)) = groups.iter_mut().find(|(k, _)| k == key) {
                paths.push(rp.path.clone());
            }
        }
    }

    Ok(FileGroup { groups })
}
