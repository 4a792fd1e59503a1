//! Command-line front end
//!
//! Reads one file, repairs it according to its container kind, writes the
//! result and emits the report as pretty JSON (to `--report` or stdout).

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use clap::Parser;
use serde::Serialize;
use tracing::{info, warn};

use crate::archive::detection::{detect_container, ContainerKind};
use crate::config::RepairConfig;
use crate::repair::{repair_pdf, repair_with_config};

#[derive(Parser, Debug)]
#[command(
    name = "office-repair",
    about = "Recover content from damaged DOCX/XLSX/PPTX (and trim damaged PDF) files."
)]
pub struct Args {
    /// Damaged input file.
    pub input: PathBuf,

    /// Where to write the repaired file.
    pub output: PathBuf,

    /// JSON file overriding repair heuristics.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Write the JSON report here instead of stdout.
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,

    /// Log file/line and thread ids.
    #[arg(long)]
    pub verbose: bool,
}

/// Whether anything came out of the run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Repaired,
    NothingRecovered,
}

#[derive(Serialize)]
struct CliReport<'a, T: Serialize> {
    input: &'a str,
    output: &'a str,
    container: ContainerKind,
    report: &'a T,
}

/// Repair `args.input` into `args.output`
pub fn run(args: &Args) -> Result<RunStatus, String> {
    let config = match &args.config {
        Some(path) => RepairConfig::load(&path.to_string_lossy())?,
        None => RepairConfig::default(),
    };

    let input = args.input.to_string_lossy();
    let output = args.output.to_string_lossy();

    let raw = fs::read(&args.input).map_err(|e| format!("Failed to read {}: {}", input, e))?;
    let container = detect_container(&raw);
    info!(path = %input, len = raw.len(), container = ?container, "Repairing file");

    let (repaired, report_json, status) = match container {
        ContainerKind::Pdf => {
            let outcome = repair_pdf(&raw);
            let json = render_report(&input, &output, container, &outcome)?;
            (outcome.repaired_bytes, json, RunStatus::Repaired)
        }
        ContainerKind::Zip | ContainerKind::Unknown => {
            if container == ContainerKind::Unknown {
                warn!(path = %input, "No known signature at start of file, scanning anyway");
            }
            let outcome = repair_with_config(&raw, &config);
            let status = if outcome.report.is_total_failure() {
                RunStatus::NothingRecovered
            } else {
                RunStatus::Repaired
            };
            let json = render_report(&input, &output, container, &outcome.report)?;
            (outcome.repaired_bytes, json, status)
        }
    };

    fs::write(&args.output, &repaired)
        .map_err(|e| format!("Failed to write {}: {}", output, e))?;

    match &args.report {
        Some(path) => fs::write(path, report_json.as_bytes())
            .map_err(|e| format!("Failed to write report {}: {}", path.display(), e))?,
        None => {
            let stdout = std::io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(report_json.as_bytes())
                .and_then(|_| handle.write_all(b"\n"))
                .map_err(|e| format!("Failed to print report: {}", e))?;
        }
    }

    info!(path = %output, len = repaired.len(), status = ?status, "Repaired file written");
    Ok(status)
}

fn render_report<T: Serialize>(
    input: &str,
    output: &str,
    container: ContainerKind,
    report: &T,
) -> Result<String, String> {
    serde_json::to_string_pretty(&CliReport { input, output, container, report })
        .map_err(|e| format!("Failed to serialize report: {}", e))
}
