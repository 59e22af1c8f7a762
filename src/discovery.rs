//! # Directory Classifier
//!
//! Walks a measurement directory and lists the analysis folders and their
//! qualifying files.
//!
//! ## Layout semantics
//! -----------------
//! The **first-level directories** under the root are the analysis folders
//! (one per sample, session or polarisation set). Each folder is walked
//! recursively and its files are listed relative to the folder. Files lying
//! directly in the root are ignored when the root has sub-directories; when
//! it has none, the root itself is the single folder, named `"."`.
//!
//! ## Filtering
//! -----------------
//! * **allow-list** – when [`ClassifierOptions::folders`] is non-empty only
//!   folders named in it are kept,
//! * **exclusions** – a folder whose name, or a file whose relative path,
//!   contains any exclusion substring is dropped (`notes`, `setup`, ...),
//! * **extensions** – file names must end with one of the suffixes
//!   (case-sensitive, list `.csv` and `.CSV` separately if both occur),
//! * **file_glob** – optional glob matched against the file name.
//!
//! Folders and files come out in natural order (`a1, a2, a10`); grouped
//! series downstream assume that order. Whether a folder left with no
//! qualifying file is kept (with an empty list) or dropped is decided by
//! [`ClassifierOptions::drop_empty_folders`].
//!
//! ## Errors
//! -----------------
//! Failing to read the root itself is returned as an error. Unreadable
//! entries further down are logged and collected in
//! [`DirectoryListing::failures`] so the rest of the tree is still listed.
use camino::{Utf8Path, Utf8PathBuf};
use globset::{Glob, GlobMatcher};
use log::{debug, warn};
use walkdir::WalkDir;

use crate::natural_sort::{natural_cmp, natural_sort};
use crate::specfit_errors::SpecFitError;

/// Name used for the root when it has no sub-directories.
pub const ROOT_FOLDER: &str = ".";

#[derive(Debug, Clone, Default)]
pub struct ClassifierOptions {
    pub extensions: Vec<String>,
    pub exclusions: Vec<String>,
    pub folders: Vec<String>,
    pub file_glob: Option<String>,
    pub drop_empty_folders: bool,
}

/// One analysis folder and its qualifying files (relative to the folder).
#[derive(Debug, Clone, PartialEq)]
pub struct FolderEntry {
    pub name: String,
    pub files: Vec<String>,
}

#[derive(Debug, Default)]
pub struct DirectoryListing {
    pub root: Utf8PathBuf,
    pub entries: Vec<FolderEntry>,
    pub failures: Vec<SpecFitError>,
}

impl DirectoryListing {
    pub fn folder_names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    /// Per-folder file lists, parallel to [`DirectoryListing::folder_names`].
    pub fn file_lists(&self) -> Vec<&[String]> {
        self.entries.iter().map(|e| e.files.as_slice()).collect()
    }

    pub fn total_files(&self) -> usize {
        self.entries.iter().map(|e| e.files.len()).sum()
    }

    /// Full paths of every listed file, folder by folder.
    pub fn file_paths(&self) -> Vec<Utf8PathBuf> {
        self.entries
            .iter()
            .flat_map(|entry| {
                let folder = if entry.name == ROOT_FOLDER {
                    self.root.clone()
                } else {
                    self.root.join(&entry.name)
                };
                entry
                    .files
                    .iter()
                    .map(move |file| folder.join(file))
                    .collect::<Vec<_>>()
            })
            .collect()
    }
}

fn to_utf8(path: &std::path::Path) -> Result<&Utf8Path, SpecFitError> {
    Utf8Path::from_path(path).ok_or_else(|| SpecFitError::Utf8PathError(path.display().to_string()))
}

fn is_excluded(name: &str, exclusions: &[String]) -> bool {
    exclusions.iter().any(|x| name.contains(x.as_str()))
}

struct FileFilter<'a> {
    options: &'a ClassifierOptions,
    glob: Option<GlobMatcher>,
}

impl<'a> FileFilter<'a> {
    fn new(options: &'a ClassifierOptions) -> Result<Self, SpecFitError> {
        let glob = match &options.file_glob {
            Some(pattern) => Some(Glob::new(pattern)?.compile_matcher()),
            None => None,
        };
        Ok(FileFilter { options, glob })
    }

    fn accepts(&self, relative: &str, file_name: &str) -> bool {
        if is_excluded(relative, &self.options.exclusions) {
            return false;
        }
        if !self.options.extensions.is_empty()
            && !self
                .options
                .extensions
                .iter()
                .any(|ext| file_name.ends_with(ext.as_str()))
        {
            return false;
        }
        self.glob.as_ref().map_or(true, |g| g.is_match(file_name))
    }
}

/// List the qualifying files of one folder, recursively, in natural order.
fn list_folder(
    folder: &Utf8Path,
    filter: &FileFilter<'_>,
    failures: &mut Vec<SpecFitError>,
) -> Vec<String> {
    let mut files = Vec::new();
    for entry in WalkDir::new(folder).min_depth(1) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("skipping unreadable entry under {folder}: {e}");
                failures.push(e.into());
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = match to_utf8(entry.path()) {
            Ok(p) => p,
            Err(e) => {
                warn!("{e}");
                failures.push(e);
                continue;
            }
        };
        let Ok(relative) = path.strip_prefix(folder) else {
            continue;
        };
        let file_name = relative.file_name().unwrap_or(relative.as_str());
        if filter.accepts(relative.as_str(), file_name) {
            files.push(relative.as_str().to_string());
        }
    }
    natural_sort(&mut files);
    files
}

/// Enumerate the analysis folders under `root` and their qualifying files.
///
/// Arguments
/// -----------------
/// * `root` – measurement directory.
/// * `options` – extension/exclusion/allow-list/glob filters and the
///   empty-folder policy.
///
/// Return
/// ----------
/// * A [`DirectoryListing`] with folders and files in natural order, or an
///   error if the root cannot be read or the glob does not compile.
pub fn interrogate_directory(
    root: &Utf8Path,
    options: &ClassifierOptions,
) -> Result<DirectoryListing, SpecFitError> {
    let filter = FileFilter::new(options)?;
    let mut failures = Vec::new();

    let mut folders = Vec::new();
    for entry in WalkDir::new(root).min_depth(1).max_depth(1) {
        let entry = entry?;
        if entry.file_type().is_dir() {
            let path = to_utf8(entry.path())?;
            if let Some(name) = path.file_name() {
                folders.push(name.to_string());
            }
        }
    }

    let mut entries = Vec::new();
    if folders.is_empty() {
        debug!("{root} has no sub-directories, listing it as a single folder");
        let files = list_folder(root, &filter, &mut failures);
        entries.push(FolderEntry {
            name: ROOT_FOLDER.to_string(),
            files,
        });
    } else {
        folders.sort_by(|a, b| natural_cmp(a, b));
        for name in folders {
            if !options.folders.is_empty() && !options.folders.contains(&name) {
                continue;
            }
            if is_excluded(&name, &options.exclusions) {
                debug!("excluding folder {name}");
                continue;
            }
            let files = list_folder(&root.join(&name), &filter, &mut failures);
            entries.push(FolderEntry { name, files });
        }
    }

    if options.drop_empty_folders {
        entries.retain(|e| {
            if e.files.is_empty() {
                debug!("dropping empty folder {}", e.name);
            }
            !e.files.is_empty()
        });
    }

    Ok(DirectoryListing {
        root: root.to_path_buf(),
        entries,
        failures,
    })
}
