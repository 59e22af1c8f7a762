#![allow(dead_code)]

use std::fs;

use approx::assert_relative_eq;
use camino::{Utf8Path, Utf8PathBuf};
use specfit::fitting::FitResult;
use tempfile::TempDir;

/// Temporary directory and its UTF-8 path; keep the `TempDir` alive.
pub fn utf8_tempdir() -> (TempDir, Utf8PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
    (dir, root)
}

/// Write `content` at `root/relative`, creating parent directories.
pub fn write_file(root: &Utf8Path, relative: &str, content: &str) -> Utf8PathBuf {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}

/// Spectrometer-style export: two metadata lines then `x;y` rows.
pub fn spectrum_file(x: &[f64], y: &[f64]) -> String {
    let mut text = String::from("Integration time (ms);100\nWavelength (nm);Counts\n");
    for (xi, yi) in x.iter().zip(y) {
        text.push_str(&format!("{xi};{yi}\n"));
    }
    text
}

pub fn assert_params_close(fit: &FitResult, expected: &[f64], epsilon: f64) {
    assert_eq!(fit.params.len(), expected.len());
    for (actual, expected) in fit.params.iter().zip(expected) {
        assert_relative_eq!(*actual, *expected, epsilon = epsilon, max_relative = epsilon);
    }
}
