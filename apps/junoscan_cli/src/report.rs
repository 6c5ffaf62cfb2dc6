use anyhow::{Context, Result};
use junoscan_model::{HostOutcome, RunSummary};
use std::fs::{create_dir_all, File};
use std::io::Write;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Csv,
    Json,
}

impl ReportFormat {
    pub fn from_path(path: &Path) -> Option<ReportFormat> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "csv" => Some(ReportFormat::Csv),
            "json" => Some(ReportFormat::Json),
            _ => None,
        }
    }
}

/// Writes the run to `path` when its extension names a supported format.
/// Returns whether a file was written.
pub fn write(path: &Path, summary: &RunSummary) -> Result<bool> {
    let Some(format) = ReportFormat::from_path(path) else {
        warn!(
            "result file {} not written: only .csv and .json are supported",
            path.display()
        );
        return Ok(false);
    };

    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    match format {
        ReportFormat::Csv => export_csv(summary, csv::Writer::from_writer(file))?,
        ReportFormat::Json => export_json(summary, file)?,
    }
    info!("wrote {} host results to {}", summary.outcomes.len(), path.display());
    Ok(true)
}

pub fn export_csv<W: Write>(summary: &RunSummary, mut writer: csv::Writer<W>) -> Result<()> {
    writer.write_record(["host", "status", "hostname", "version", "reason"])?;
    for outcome in &summary.outcomes {
        let (hostname, version) = match outcome {
            HostOutcome::Success(info) => (info.hostname.as_str(), info.version.as_str()),
            _ => ("", ""),
        };
        writer.write_record([
            outcome.host(),
            status_label(outcome),
            hostname,
            version,
            outcome.reason().unwrap_or(""),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

pub fn export_json<W: Write>(summary: &RunSummary, mut writer: W) -> Result<()> {
    serde_json::to_writer_pretty(&mut writer, summary)?;
    writeln!(writer)?;
    Ok(())
}

fn status_label(outcome: &HostOutcome) -> &'static str {
    match outcome {
        HostOutcome::Success(_) => "success",
        HostOutcome::TransportFailure { .. } => "transport_failure",
        HostOutcome::AuthFailure { .. } => "auth_failure",
        HostOutcome::OtherFailure { .. } => "other_failure",
    }
}
