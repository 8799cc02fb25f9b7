//! Error types for tap-callminer
//!
//! This module provides error handling for the library, including:
//! - Export lifecycle errors (submission, polling, download, extraction, cleanup)
//! - Schema discovery and per-stream data file errors
//! - Machine-readable error codes for the embedding application

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for tap-callminer operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for tap-callminer
///
/// Each variant includes contextual information to help diagnose issues.
/// Coercion problems are never reported through this type: malformed values
/// degrade to `null` instead.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "job_poll_max_count")
        key: Option<String>,
    },

    /// Export job lifecycle error
    #[error("export error: {0}")]
    Export(#[from] ExportError),

    /// Schema discovery failed (dynamic schema could not be resolved)
    #[error("schema discovery failed for stream {stream}: {reason}")]
    Discovery {
        /// The stream whose schema could not be resolved
        stream: String,
        /// The reason discovery failed
        reason: String,
    },

    /// A per-data-type file in the extracted archive could not be read
    #[error("failed to read {stream} data from {path}: {reason}")]
    DataFile {
        /// The stream being read
        stream: String,
        /// The file that was expected or being decoded
        path: PathBuf,
        /// The reason reading failed
        reason: String,
    },

    /// The bulk export API answered with a non-success status
    #[error("{operation} returned HTTP {status}: {body}")]
    Api {
        /// The API operation that failed (e.g., "submit export job")
        operation: String,
        /// HTTP status code
        status: u16,
        /// Response body (possibly truncated)
        body: String,
    },

    /// Unknown stream name requested
    #[error("unknown stream: {0}")]
    UnknownStream(String),

    /// Watermark state could not be loaded or persisted
    #[error("state error: {0}")]
    State(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Export job lifecycle errors
///
/// Every variant except [`ExportError::Submission`] is raised after the job
/// exists server-side, so the orchestrator always runs cleanup before
/// surfacing it.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The export job could not be created
    #[error("failed to submit export job: {reason}")]
    Submission {
        /// The reason submission failed
        reason: String,
    },

    /// The job execution did not complete within the configured number of polls
    #[error(
        "export job {job_id} incomplete (polled {max_polls} time(s) at {interval_secs}s intervals). `job_poll_max_count` may need adjusting"
    )]
    PollTimeout {
        /// The export job that was being polled
        job_id: String,
        /// Configured `job_poll_max_count`
        max_polls: u32,
        /// Configured poll interval in seconds
        interval_secs: u64,
    },

    /// The export archive could not be downloaded
    #[error("failed to download export for job execution {execution_id}: {reason}")]
    Download {
        /// The job execution whose archive was being downloaded
        execution_id: String,
        /// The reason the download failed
        reason: String,
    },

    /// The export archive could not be extracted
    #[error("extraction failed for {archive}: {reason}")]
    Extraction {
        /// The archive file that failed to extract
        archive: PathBuf,
        /// The reason extraction failed
        reason: String,
    },

    /// A server-side resource could not be deleted
    #[error("failed to clean up {resource} {id}: {reason}")]
    Cleanup {
        /// The kind of resource ("job" or "job execution")
        resource: &'static str,
        /// The resource identifier
        id: String,
        /// The reason the delete failed
        reason: String,
    },
}

impl Error {
    /// Machine-readable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Export(e) => match e {
                ExportError::Submission { .. } => "submission_failed",
                ExportError::PollTimeout { .. } => "poll_timeout",
                ExportError::Download { .. } => "download_failed",
                ExportError::Extraction { .. } => "extraction_failed",
                ExportError::Cleanup { .. } => "cleanup_failed",
            },
            Error::Discovery { .. } => "discovery_failed",
            Error::DataFile { .. } => "data_file_error",
            Error::Api { .. } => "api_error",
            Error::UnknownStream(_) => "unknown_stream",
            Error::State(_) => "state_error",
            Error::Io(_) => "io_error",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
            Error::Other(_) => "internal_error",
        }
    }

    /// Whether this error aborts the whole run rather than a single stream
    ///
    /// Data file errors are scoped to one stream; sibling streams reading the
    /// same extraction context are unaffected.
    pub fn is_fatal_to_run(&self) -> bool {
        !matches!(self, Error::DataFile { .. })
    }

    /// Build an [`Error::Api`] from a failed response, consuming its body
    pub(crate) async fn from_response(operation: &str, response: reqwest::Response) -> Self {
        let status = response.status().as_u16();
        let mut body = response.text().await.unwrap_or_default();
        if body.len() > MAX_ERROR_BODY_LEN {
            let mut cut = MAX_ERROR_BODY_LEN;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }
        Error::Api {
            operation: operation.to_string(),
            status,
            body,
        }
    }
}

const MAX_ERROR_BODY_LEN: usize = 512;
