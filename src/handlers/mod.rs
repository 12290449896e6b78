//! Job boundaries used by the CLI
//!
//! - `upload` → accept a sheet and queue a job
//! - `jobs` → job status queries and report download

pub mod jobs;
pub mod upload;

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("Unsupported file type '{0}' (expected .xlsx, .xls or .csv)")]
    UnsupportedExtension(String),

    #[error("Uploaded file is empty")]
    EmptyFile,

    #[error("Job {0} not found")]
    JobNotFound(Uuid),

    #[error("Job {0} has no report yet")]
    ReportNotReady(Uuid),

    #[error("Report file {0} is missing")]
    ReportMissing(String),

    #[error("File error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Job store error: {0}")]
    Store(#[from] anyhow::Error),
}

impl HandlerError {
    /// Stable code for the JSON error envelope
    pub fn code(&self) -> &'static str {
        match self {
            HandlerError::UnsupportedExtension(_) => "UNSUPPORTED_FILE_TYPE",
            HandlerError::EmptyFile => "EMPTY_FILE",
            HandlerError::JobNotFound(_) => "JOB_NOT_FOUND",
            HandlerError::ReportNotReady(_) => "REPORT_NOT_READY",
            HandlerError::ReportMissing(_) => "REPORT_MISSING",
            HandlerError::Io { .. } => "IO_ERROR",
            HandlerError::Store(_) => "STORE_ERROR",
        }
    }
}
