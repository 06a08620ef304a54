use thiserror::Error;

/// Failure while turning a table into a series bundle.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("no usable columns: {0}")]
    NoUsableColumns(String),
    #[error("recording is empty or too short: {valid} valid row(s), need at least 2")]
    EmptyOrShort { valid: usize },
    #[error("malformed input at row {row}: {reason}")]
    Malformed { row: usize, reason: String },
    #[error("failed to read {path}: {reason}")]
    Io { path: String, reason: String },
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FilterError {
    #[error("invalid band: lowcut {lowcut} Hz, highcut {highcut} Hz")]
    InvalidBand { lowcut: f64, highcut: f64 },
    #[error("highcut {highcut} Hz is not below the Nyquist frequency {nyquist} Hz")]
    BandAboveNyquist { highcut: f64, nyquist: f64 },
    #[error("filter order must be at least 1")]
    InvalidOrder,
}

/// Anything that can end an ingest + analysis job.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Ingest(#[from] IngestError),
    #[error(transparent)]
    Filter(#[from] FilterError),
    #[error("analysis cancelled")]
    Cancelled,
}
