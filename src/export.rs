//! # Export
//!
//! Plain columnar output of a run for any plotting or spreadsheet surface.
//!
//! * [`write_od_curves`] – long-format CSV, one row per OD sample:
//!   `group,curve,label,reference_index,signal_index,x,od`,
//! * [`write_fit_outcomes`] – long-format CSV, one row per fitted parameter,
//!   or one row with an `error` message per failed fit,
//! * [`write_plot_bundles`] – JSON list of [`PlotBundle`]. JSON has no
//!   NaN or infinity, so non-finite samples are written as the strings
//!   `"NaN"`, `"inf"` and `"-inf"` and read back as the same values.
//!
//! [`export_report`] writes the three files into an output directory.
use std::fs::{self, File};
use std::io::{BufWriter, Write};

use camino::{Utf8Path, Utf8PathBuf};
use log::info;
use serde::{Deserialize, Serialize};

use crate::fitting::batch::FitOutcome;
use crate::pipeline::{AnalysisReport, GroupAnalysis};
use crate::specfit_errors::SpecFitError;

pub const OD_CURVES_FILE: &str = "od_curves.csv";
pub const FIT_RESULTS_FILE: &str = "fit_results.csv";
pub const PLOT_BUNDLES_FILE: &str = "plot_bundles.json";

/// One curve to draw.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotSeries {
    pub label: String,
    #[serde(with = "non_finite")]
    pub x: Vec<f64>,
    #[serde(with = "non_finite")]
    pub y: Vec<f64>,
    /// Indices into `x`/`y` to overlay as peak markers.
    pub peaks: Vec<usize>,
}

/// Everything needed for one figure.
///
/// `markers` are vertical lines at x positions (wavelengths of interest).
/// Series `i` is meant to be drawn shifted up by `i · stack_shift`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotBundle {
    pub title: String,
    pub series: Vec<PlotSeries>,
    #[serde(with = "non_finite")]
    pub markers: Vec<f64>,
    pub stack_shift: f64,
}

/// `Vec<f64>` with non-finite values as strings.
mod non_finite {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    #[serde(untagged)]
    enum JsonFloat {
        Number(f64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(values: &[f64], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(values.iter().map(|&v| {
            if v.is_finite() {
                JsonFloat::Number(v)
            } else if v.is_nan() {
                JsonFloat::Text("NaN".into())
            } else if v > 0.0 {
                JsonFloat::Text("inf".into())
            } else {
                JsonFloat::Text("-inf".into())
            }
        }))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f64>, D::Error> {
        Vec::<JsonFloat>::deserialize(deserializer)?
            .into_iter()
            .map(|v| match v {
                JsonFloat::Number(x) => Ok(x),
                JsonFloat::Text(text) => match text.as_str() {
                    "NaN" => Ok(f64::NAN),
                    "inf" => Ok(f64::INFINITY),
                    "-inf" => Ok(f64::NEG_INFINITY),
                    other => Err(D::Error::custom(format!("not a number: {other:?}"))),
                },
            })
            .collect()
    }
}

#[derive(Debug, Serialize)]
struct OdRow<'a> {
    group: &'a str,
    curve: usize,
    label: &'a str,
    reference_index: usize,
    signal_index: usize,
    x: f64,
    od: f64,
}

#[derive(Debug, Serialize)]
struct FitRow<'a> {
    group: &'a str,
    file_index: usize,
    peak_index: Option<usize>,
    model: String,
    param: Option<String>,
    value: Option<f64>,
    std_error: Option<f64>,
    rss: Option<f64>,
    dof: Option<usize>,
    error: Option<String>,
}

pub fn write_od_curves<W: Write>(writer: W, groups: &[GroupAnalysis]) -> Result<(), SpecFitError> {
    let mut wtr = csv::Writer::from_writer(writer);
    for group in groups {
        for (curve_index, curve) in group.od.curves.iter().enumerate() {
            let label = group.labels.get(curve_index).map_or("", String::as_str);
            for (&x, &od) in curve.x.iter().zip(&curve.od) {
                wtr.serialize(OdRow {
                    group: &group.key,
                    curve: curve_index,
                    label,
                    reference_index: curve.reference_index,
                    signal_index: curve.signal_index,
                    x,
                    od,
                })?;
            }
        }
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_fit_outcomes<'a, W, I>(writer: W, outcomes: I) -> Result<(), SpecFitError>
where
    W: Write,
    I: IntoIterator<Item = &'a FitOutcome>,
{
    let mut wtr = csv::Writer::from_writer(writer);
    for outcome in outcomes {
        let c = &outcome.context;
        match &outcome.result {
            Ok(fit) => {
                for (name, value, std_error) in fit.named() {
                    wtr.serialize(FitRow {
                        group: &c.group,
                        file_index: c.file_index,
                        peak_index: c.peak_index,
                        model: fit.model.to_string(),
                        param: Some(name),
                        value: Some(value),
                        std_error: Some(std_error),
                        rss: Some(fit.rss),
                        dof: Some(fit.dof),
                        error: None,
                    })?;
                }
            }
            Err(e) => wtr.serialize(FitRow {
                group: &c.group,
                file_index: c.file_index,
                peak_index: c.peak_index,
                model: String::new(),
                param: None,
                value: None,
                std_error: None,
                rss: None,
                dof: None,
                error: Some(e.to_string()),
            })?,
        }
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_plot_bundles<W: Write>(writer: W, bundles: &[PlotBundle]) -> Result<(), SpecFitError> {
    serde_json::to_writer_pretty(writer, bundles)?;
    Ok(())
}

/// Write the OD curves, fit results and plot bundles of `report` into
/// `out_dir` (created when missing).
///
/// Return
/// ----------
/// * The written file paths.
pub fn export_report(
    report: &AnalysisReport,
    out_dir: &Utf8Path,
) -> Result<Vec<Utf8PathBuf>, SpecFitError> {
    fs::create_dir_all(out_dir)?;

    let od_path = out_dir.join(OD_CURVES_FILE);
    write_od_curves(BufWriter::new(File::create(&od_path)?), &report.groups)?;

    let fit_path = out_dir.join(FIT_RESULTS_FILE);
    write_fit_outcomes(BufWriter::new(File::create(&fit_path)?), report.fit_outcomes())?;

    let plot_path = out_dir.join(PLOT_BUNDLES_FILE);
    let mut plot_file = BufWriter::new(File::create(&plot_path)?);
    write_plot_bundles(&mut plot_file, &report.plot_bundles())?;
    plot_file.flush()?;

    info!("exported {od_path}, {fit_path} and {plot_path}");
    Ok(vec![od_path, fit_path, plot_path])
}

#[cfg(test)]
mod export_test {
    use super::*;
    use crate::fitting::batch::FitContext;
    use crate::fitting::{FitResult, ModelKind};
    use crate::optical_density::{OdCurve, OdSet};
    use nalgebra::DMatrix;

    fn context(peak: Option<usize>) -> FitContext {
        FitContext {
            group: "80".into(),
            file_index: 1,
            peak_index: peak,
        }
    }

    #[test]
    fn test_fit_rows_long_format() {
        let outcomes = vec![
            FitOutcome {
                context: context(Some(4)),
                result: Ok(FitResult {
                    model: ModelKind::Straight,
                    params: vec![2.0, 1.0],
                    std_errors: vec![0.5, 0.25],
                    covariance: DMatrix::zeros(2, 2),
                    rss: 0.0,
                    dof: 3,
                    iterations: 2,
                }),
            },
            FitOutcome {
                context: context(None),
                result: Err(SpecFitError::EmptySample),
            },
        ];
        let mut buffer = Vec::new();
        write_fit_outcomes(&mut buffer, &outcomes).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "group,file_index,peak_index,model,param,value,std_error,rss,dof,error"
        );
        assert_eq!(lines.len(), 4);
        assert!(lines[1].starts_with("80,1,4,straight,a,2.0,0.5"));
        assert!(lines[3].starts_with("80,1,,,,,,,,"));
    }

    #[test]
    fn test_od_rows_and_plot_json() {
        let group = GroupAnalysis {
            key: "all".into(),
            od: OdSet {
                key: "all".into(),
                curves: vec![OdCurve {
                    reference_index: 0,
                    signal_index: 2,
                    x: vec![500.0, 501.0],
                    od: vec![0.1, 0.2],
                }],
                failures: Vec::new(),
            },
            labels: vec!["s / r".into()],
            peaks: vec![vec![1]],
            fits: Vec::new(),
        };
        let mut buffer = Vec::new();
        write_od_curves(&mut buffer, std::slice::from_ref(&group)).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert_eq!(
            text.lines().collect::<Vec<_>>(),
            vec![
                "group,curve,label,reference_index,signal_index,x,od",
                "all,0,s / r,0,2,500.0,0.1",
                "all,0,s / r,0,2,501.0,0.2",
            ]
        );

        let report = AnalysisReport {
            groups: vec![group],
            ..Default::default()
        };
        let mut json = Vec::new();
        write_plot_bundles(&mut json, &report.plot_bundles()).unwrap();
        let bundles: Vec<PlotBundle> = serde_json::from_slice(&json).unwrap();
        assert_eq!(bundles, report.plot_bundles());
    }

    #[test]
    fn test_plot_json_keeps_non_finite_values() {
        let bundle = PlotBundle {
            title: "80".into(),
            series: vec![PlotSeries {
                label: "s / r".into(),
                x: vec![500.0, 501.0, 502.0, 503.0],
                y: vec![f64::INFINITY, f64::NAN, f64::NEG_INFINITY, 0.5],
                peaks: vec![3],
            }],
            markers: vec![501.0],
            stack_shift: 0.0,
        };
        let mut json = Vec::new();
        write_plot_bundles(&mut json, std::slice::from_ref(&bundle)).unwrap();
        let text = String::from_utf8(json).unwrap();
        assert!(!text.contains("null"));
        assert!(text.contains("\"NaN\""));

        let back: Vec<PlotBundle> = serde_json::from_str(&text).unwrap();
        let y = &back[0].series[0].y;
        assert_eq!(y[0], f64::INFINITY);
        assert!(y[1].is_nan());
        assert_eq!(y[2], f64::NEG_INFINITY);
        assert_eq!(y[3], 0.5);
        assert_eq!(back[0].series[0].x, bundle.series[0].x);
        assert_eq!(back[0].markers, vec![501.0]);

        let bad = text.replace("\"NaN\"", "\"nan?\"");
        assert!(serde_json::from_str::<Vec<PlotBundle>>(&bad).is_err());
    }
}
