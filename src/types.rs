//! Core types for tap-callminer

use chrono::NaiveDate;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Which records an export job selects relative to its start date
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchMode {
    /// Records created or updated since the start date
    #[default]
    NewAndUpdated,
}

/// Request body for creating an export job
///
/// Built once per run and never modified after submission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportJobRequest {
    /// Job name shown in the CallMiner UI
    pub name: String,
    /// Data types to export, de-duplicated and in selection order
    pub data_types: Vec<String>,
    /// Resume watermark (or the configured start date on a first run)
    pub start_date: NaiveDate,
    /// Search mode relative to `start_date`
    pub search_mode: SearchMode,
    /// Email recipients notified once the export completes
    pub notification_recipients: Vec<String>,
}

impl ExportJobRequest {
    /// Build a request, dropping repeated data types while keeping first-seen order
    pub fn new<I, S>(
        name: impl Into<String>,
        data_types: I,
        start_date: NaiveDate,
        notification_recipients: Vec<String>,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let unique: IndexSet<String> = data_types.into_iter().map(Into::into).collect();

        Self {
            name: name.into(),
            data_types: unique.into_iter().collect(),
            start_date,
            search_mode: SearchMode::NewAndUpdated,
            notification_recipients,
        }
    }

    /// Wire representation expected by `POST /export/job`
    pub fn to_payload(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.name,
            "DataTypes": self.data_types,
            "Duration": {
                "TimeFrame": "Custom",
                "StartDate": self.start_date.format("%Y-%m-%d").to_string(),
                "SearchMode": self.search_mode,
            },
            "EmailRecipients": self.notification_recipients,
        })
    }
}

/// A submitted export job
#[derive(Clone, Debug)]
pub struct ExportJob {
    /// Server-assigned job ID
    pub id: String,
    /// The request the job was created from
    pub request: ExportJobRequest,
}

/// Response of `POST /export/job`
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct CreatedJob {
    #[serde(rename = "Id")]
    pub(crate) id: String,
}

/// Job execution status as reported by the job history endpoint
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JobExecutionStatus {
    /// Queued server-side
    Pending,
    /// Export is being produced
    Running,
    /// Archive is ready for download
    Completed,
    /// Export failed server-side
    Failed,
    /// Any status this crate does not know about
    Other(String),
}

impl From<String> for JobExecutionStatus {
    fn from(status: String) -> Self {
        match status.as_str() {
            "Pending" => JobExecutionStatus::Pending,
            "Running" => JobExecutionStatus::Running,
            "Completed" => JobExecutionStatus::Completed,
            "Failed" => JobExecutionStatus::Failed,
            _ => JobExecutionStatus::Other(status),
        }
    }
}

impl From<JobExecutionStatus> for String {
    fn from(status: JobExecutionStatus) -> Self {
        status.to_string()
    }
}

impl std::fmt::Display for JobExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobExecutionStatus::Pending => write!(f, "Pending"),
            JobExecutionStatus::Running => write!(f, "Running"),
            JobExecutionStatus::Completed => write!(f, "Completed"),
            JobExecutionStatus::Failed => write!(f, "Failed"),
            JobExecutionStatus::Other(s) => write!(f, "{s}"),
        }
    }
}

/// One run instance of an export job, as listed by `GET /export/history`
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct JobExecution {
    /// Server-assigned execution ID
    pub id: String,
    /// Current status
    pub status: JobExecutionStatus,
    /// When the execution was created
    #[serde(default)]
    pub create_date: Option<String>,
    /// When the execution completed
    #[serde(default)]
    pub job_completion_time: Option<String>,
    /// Archive size in bytes
    #[serde(default)]
    pub file_size: Option<u64>,
    /// Absolute URL of the export archive
    #[serde(default)]
    pub download_endpoint: Option<String>,
}

impl JobExecution {
    /// Archive size in megabytes (10^6 bytes), if known
    pub fn file_size_mb(&self) -> Option<f64> {
        self.file_size.map(|bytes| bytes as f64 / 1_000_000.0)
    }
}

/// Handle to the unpacked export archive
///
/// The directory behind `root_directory` belongs to the export session that
/// produced this context and is deleted when that session ends. Holders must
/// not use it afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtractionContext {
    root_directory: PathBuf,
    job_execution_id: String,
}

impl ExtractionContext {
    pub(crate) fn new(root_directory: PathBuf, job_execution_id: String) -> Self {
        Self {
            root_directory,
            job_execution_id,
        }
    }

    /// Directory holding the per-data-type files
    pub fn root_directory(&self) -> &Path {
        &self.root_directory
    }

    /// Job execution the files were produced by
    pub fn job_execution_id(&self) -> &str {
        &self.job_execution_id
    }
}

/// Lifecycle state of one export run
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportState {
    /// Creating the export job
    Submitting,
    /// Job exists, no execution observed yet
    AwaitingExecutionStart,
    /// Execution latched, waiting for completion
    Polling,
    /// Streaming the archive to disk
    Downloading,
    /// Unpacking the archive
    Extracting,
    /// Extraction context handed to the caller
    Ready,
    /// Deleting server-side resources
    CleaningUp,
    /// Run finished and cleaned up
    Done,
    /// Run aborted
    Failed,
}

impl ExportState {
    /// Whether no further transitions can happen
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExportState::Done | ExportState::Failed)
    }
}

impl std::fmt::Display for ExportState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ExportState::Submitting => "submitting",
            ExportState::AwaitingExecutionStart => "awaiting_execution_start",
            ExportState::Polling => "polling",
            ExportState::Downloading => "downloading",
            ExportState::Extracting => "extracting",
            ExportState::Ready => "ready",
            ExportState::CleaningUp => "cleaning_up",
            ExportState::Done => "done",
            ExportState::Failed => "failed",
        };
        write!(f, "{name}")
    }
}
