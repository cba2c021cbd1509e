use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to write line: {source}")]
    WriteLine {
        #[source]
        source: std::fmt::Error,
    },
    #[error("Failed to serialize report: {source}")]
    Serialize {
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to write report '{path}': {source}")]
    WriteReport {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to read report '{path}': {source}")]
    ReadReport {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse report '{path}': {source}")]
    ParseReport {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Report '{path}' holds an error outcome, not run statistics.")]
    ReportHasNoStats { path: PathBuf },
    #[error("{count} metric(s) regressed beyond the threshold.")]
    RegressionsDetected { count: usize },
    #[error("Run failed: {message}")]
    RunFailed { message: String },
}
