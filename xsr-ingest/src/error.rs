//! Error types for xsr-ingest
//!
//! Pipeline errors are fatal for a run: nothing downstream (file naming,
//! downloads) may proceed once one is raised. An unrecognized quality label is
//! not an error; it scores as the `-1` sentinel.

use crate::services::archive_client::ArchiveError;
use crate::services::file_downloader::TransferError;
use thiserror::Error;

/// Naming pipeline errors
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A scan entry is missing a required field or carries an unparsable value
    #[error("Malformed input record (series {series}): {reason}")]
    MalformedInputRecord { series: String, reason: String },

    /// Two or more series ended up with the same instance name
    #[error("Instance names not unique: {}", duplicates.join(", "))]
    NamingCollision { duplicates: Vec<String> },

    /// An exclusion pattern failed to compile
    #[error("Invalid exclusion pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

impl PipelineError {
    pub(crate) fn malformed(series: impl Into<String>, reason: impl Into<String>) -> Self {
        PipelineError::MalformedInputRecord {
            series: series.into(),
            reason: reason.into(),
        }
    }
}

/// Top-level error for a retrieval run
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("Transfer error: {0}")]
    Transfer(#[from] TransferError),

    #[error("Common error: {0}")]
    Common(#[from] xsr_common::Error),
}

/// Result type for retrieval runs
pub type IngestResult<T> = Result<T, IngestError>;
