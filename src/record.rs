//! # Numeric Record Parser
//!
//! Reads instrument-exported text/CSV files into a [`RawRecord`]: column-oriented
//! numeric data plus the leftover non-numeric lines as metadata columns.
//!
//! ## Line classification
//! -----------------
//! A line is **data** iff it contains at least one digit and every character
//! belongs to [`NUMERIC_LINE_CHARS`](crate::constants::NUMERIC_LINE_CHARS)
//! (digits, sign, decimal point, `e`/`E`, delimiters, whitespace). Any other
//! non-blank line is **metadata**. Blank lines are skipped.
//!
//! Both kinds of line are split on `[\t,;]`, tokens are trimmed and empty
//! tokens dropped. Data tokens are parsed as `f64` and appended column-wise.
//!
//! ## Ragged columns
//! -----------------
//! A row with fewer tokens than previous rows leaves the trailing columns
//! unextended; a row with more tokens opens new columns. The resulting
//! columns can therefore have different lengths, and that shape is kept as
//! is (no padding). [`RawRecord::xy`] decides what to do with a ragged pair.
//!
//! ## Errors
//! -----------------
//! A token on a data line that does not parse as a float (e.g. `1e`, `--`) is a
//! [`SpecFitError::ParseError`] carrying the path, the 1-based line number and
//! the token. Tokens are never coerced to zero.
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::sync::LazyLock;

use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, warn};
use regex::Regex;

use crate::constants::{DELIMITER_PATTERN, NUMERIC_LINE_CHARS};
use crate::jagged::JaggedArray;
use crate::specfit_errors::SpecFitError;

static DELIMITER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(DELIMITER_PATTERN).expect("delimiter pattern is a valid regex"));

/// Parsed content of one file.
///
/// Fields
/// -----------------
/// * `source` – path the record was read from (`None` for in-memory text).
/// * `data` – numeric columns, possibly of unequal length.
/// * `metadata` – raw string tokens of the non-numeric lines, column-wise.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    pub source: Option<Utf8PathBuf>,
    pub data: JaggedArray,
    pub metadata: Vec<Vec<String>>,
}

/// Return `true` when `line` is a numeric data line.
pub fn is_numeric_line(line: &str) -> bool {
    line.chars().any(|c| c.is_ascii_digit()) && line.chars().all(|c| NUMERIC_LINE_CHARS.contains(c))
}

/// Split a line on the delimiter set, trimming tokens and dropping empty ones.
pub fn tokenize(line: &str) -> Vec<&str> {
    DELIMITER_RE
        .split(line)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect()
}

impl RawRecord {
    /// Read and parse a file. The handle is closed before returning.
    pub fn read(path: &Utf8Path) -> Result<Self, SpecFitError> {
        let file = File::open(path)?;
        let mut record = parse_lines(BufReader::new(file), path.as_str())?;
        record.source = Some(path.to_path_buf());
        debug!(
            "parsed {path}: {} data columns {:?}, {} metadata columns",
            record.data.len(),
            record.data.lengths(),
            record.metadata.len()
        );
        Ok(record)
    }

    /// Parse in-memory text. `label` is used in error messages.
    pub fn parse_str(text: &str, label: &str) -> Result<Self, SpecFitError> {
        parse_lines(text.as_bytes(), label)
    }

    pub fn column(&self, index: usize) -> Option<&[f64]> {
        self.data.row(index)
    }

    /// Columns 0 and 1 as an `(x, y)` pair.
    ///
    /// Arguments
    /// -----------------
    /// * `trim` – when the two columns differ in length, truncate both to the
    ///   shorter one instead of failing.
    ///
    /// Return
    /// ----------
    /// * `Err(MissingColumn)` when fewer than two columns were parsed.
    /// * `Err(DimensionMismatch)` when the lengths differ and `trim` is `false`.
    pub fn xy(&self, trim: bool) -> Result<(Vec<f64>, Vec<f64>), SpecFitError> {
        let x = self.data.require_row(0)?;
        let y = self.data.require_row(1)?;

        if x.len() != y.len() {
            let context = self
                .source
                .as_ref()
                .map_or_else(|| "record columns 0/1".to_string(), |p| p.to_string());
            if !trim {
                return Err(SpecFitError::DimensionMismatch {
                    context,
                    left: x.len(),
                    right: y.len(),
                });
            }
            warn!(
                "{context}: trimming ragged columns ({} vs {})",
                x.len(),
                y.len()
            );
            let n = x.len().min(y.len());
            return Ok((x[..n].to_vec(), y[..n].to_vec()));
        }
        Ok((x.to_vec(), y.to_vec()))
    }
}

fn parse_lines<R: BufRead>(mut reader: R, label: &str) -> Result<RawRecord, SpecFitError> {
    let mut data = JaggedArray::new();
    let mut metadata: Vec<Vec<String>> = Vec::new();
    let mut buf = Vec::new();
    let mut line_no = 0;

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        line_no += 1;
        // instrument exports are not always UTF-8 (degree signs, µ)
        let line = String::from_utf8_lossy(&buf);
        if line.trim().is_empty() {
            continue;
        }

        let tokens = tokenize(&line);
        if is_numeric_line(&line) {
            for (index, token) in tokens.iter().enumerate() {
                let value = token
                    .parse::<f64>()
                    .map_err(|_| SpecFitError::ParseError {
                        path: label.to_string(),
                        line: line_no,
                        token: token.to_string(),
                    })?;
                data.push_at(index, value);
            }
        } else {
            for (index, token) in tokens.iter().enumerate() {
                if metadata.len() <= index {
                    metadata.resize_with(index + 1, Vec::new);
                }
                metadata[index].push(token.to_string());
            }
        }
    }

    Ok(RawRecord {
        source: None,
        data,
        metadata,
    })
}

#[cfg(test)]
mod record_test {
    use super::*;

    #[test]
    fn test_numeric_predicate() {
        assert!(is_numeric_line("1.5,2.5\r\n"));
        assert!(is_numeric_line("-1.0e-3\t+4E5;6"));
        assert!(is_numeric_line("  12  "));
        assert!(!is_numeric_line("Wavelength (nm),Power"));
        assert!(!is_numeric_line("1.0,2.0,x"));
        assert!(!is_numeric_line("e,E,-"));
        assert!(!is_numeric_line(""));
    }

    #[test]
    fn test_parse_mixed_file() {
        let text = "Instrument: OSA\nWavelength,Power\n1,10\n2,20;0.5\n3\n\n";
        let record = RawRecord::parse_str(text, "mem").unwrap();

        assert_eq!(record.data.lengths(), vec![3, 2, 1]);
        assert_eq!(record.column(0), Some(&[1.0, 2.0, 3.0][..]));
        assert_eq!(record.column(2), Some(&[0.5][..]));
        assert_eq!(
            record.metadata,
            vec![
                vec!["Instrument: OSA".to_string(), "Wavelength".to_string()],
                vec!["Power".to_string()]
            ]
        );
    }

    #[test]
    fn test_malformed_numeric_token() {
        let err = RawRecord::parse_str("1,2\n3,1e\n", "bad.csv").unwrap_err();
        assert_eq!(
            err,
            SpecFitError::ParseError {
                path: "bad.csv".into(),
                line: 2,
                token: "1e".into()
            }
        );
    }

    #[test]
    fn test_xy_ragged_policy() {
        let record = RawRecord::parse_str("1,10\n2,20\n3\n", "mem").unwrap();

        assert_eq!(
            record.xy(false),
            Err(SpecFitError::DimensionMismatch {
                context: "record columns 0/1".into(),
                left: 3,
                right: 2
            })
        );
        let (x, y) = record.xy(true).unwrap();
        assert_eq!(x, vec![1.0, 2.0]);
        assert_eq!(y, vec![10.0, 20.0]);
    }

    #[test]
    fn test_single_column_is_missing_y() {
        let record = RawRecord::parse_str("1\n2\n", "mem").unwrap();
        assert_eq!(
            record.xy(false),
            Err(SpecFitError::MissingColumn {
                index: 1,
                available: 1
            })
        );
    }
}
