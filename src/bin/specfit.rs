use anyhow::{bail, Context, Result};
use camino::Utf8PathBuf;
use clap::Parser;
use log::{error, info};

use specfit::config::AnalysisConfig;
use specfit::export::export_report;
use specfit::pipeline::{AnalysisReport, SpectralAnalysis};

#[derive(Parser, Debug)]
#[command(name = "specfit", about = "OD, peak and line-shape analysis of a measurement tree")]
struct Cli {
    /// JSON analysis configuration.
    #[arg(long)]
    config: Utf8PathBuf,
    /// Overrides `root_path` of the configuration.
    #[arg(long)]
    root: Option<Utf8PathBuf>,
    /// Output directory for CSV and plot bundle files.
    #[arg(long, default_value = "specfit_out")]
    out: Utf8PathBuf,
    /// Exit with an error when any file, group, pair or fit failed.
    #[arg(long)]
    strict: bool,
}

fn report_failures(report: &AnalysisReport) {
    for e in &report.discovery_failures {
        error!("discovery: {e}");
    }
    for f in &report.file_failures {
        error!("{}: {}", f.path, f.error);
    }
    for g in &report.group_failures {
        error!("group {}: {}", g.key, g.error);
    }
    for group in &report.groups {
        for pair in &group.od.failures {
            error!(
                "group {} reference {} / signal {}: {}",
                group.key, pair.reference_index, pair.signal_index, pair.error
            );
        }
    }
    for outcome in report.fit_outcomes() {
        if let Err(e) = &outcome.result {
            error!("fit {:?}: {e}", outcome.context);
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let mut config = AnalysisConfig::from_json_file(&cli.config)
        .with_context(|| format!("loading configuration {}", cli.config))?;
    if let Some(root) = cli.root {
        config.root_path = root;
    }
    info!("\n{config}");

    let report = SpectralAnalysis::new(config)
        .run()
        .context("running the analysis")?;
    let written = export_report(&report, &cli.out)
        .with_context(|| format!("exporting results to {}", cli.out))?;
    for path in &written {
        info!("wrote {path}");
    }

    let failures = report.failure_count();
    if failures > 0 {
        report_failures(&report);
        if cli.strict {
            bail!("{failures} failures collected");
        }
    }
    Ok(())
}
