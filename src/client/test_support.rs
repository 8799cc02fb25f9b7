//! In-memory [`ExportApi`] for unit tests

use super::ExportApi;
use crate::error::{Error, Result};
use crate::schema::ColumnMetadata;
use crate::types::{ExportJobRequest, JobExecution, JobExecutionStatus};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Mutex;

type Scripted<T> = std::result::Result<T, String>;

fn api_error(operation: &str, body: String) -> Error {
    Error::Api {
        operation: operation.to_string(),
        status: 500,
        body,
    }
}

#[derive(Default)]
struct FakeState {
    submit: Option<Scripted<String>>,
    history: VecDeque<Scripted<Vec<JobExecution>>>,
    archive: Option<Scripted<Vec<u8>>>,
    delete_job: Option<Scripted<()>>,
    delete_execution: Option<Scripted<()>>,
    metadata: Option<Scripted<Vec<ColumnMetadata>>>,
    calls: HashMap<&'static str, usize>,
    submitted: Vec<ExportJobRequest>,
    deleted_jobs: Vec<String>,
    deleted_executions: Vec<String>,
}

/// Scripted API double that records every call
///
/// History responses are consumed in order; once exhausted, the last
/// scripted response keeps being returned.
#[derive(Default)]
pub(crate) struct FakeApi {
    state: Mutex<FakeState>,
}

impl FakeApi {
    pub(crate) fn new() -> Self {
        let api = Self::default();
        api.set_submit(Ok("job-1".into()));
        api
    }

    pub(crate) fn set_submit(&self, result: Scripted<String>) {
        self.state.lock().unwrap().submit = Some(result);
    }

    pub(crate) fn push_history(&self, result: Scripted<Vec<JobExecution>>) {
        self.state.lock().unwrap().history.push_back(result);
    }

    pub(crate) fn set_archive(&self, result: Scripted<Vec<u8>>) {
        self.state.lock().unwrap().archive = Some(result);
    }

    pub(crate) fn set_delete_job(&self, result: Scripted<()>) {
        self.state.lock().unwrap().delete_job = Some(result);
    }

    pub(crate) fn set_delete_execution(&self, result: Scripted<()>) {
        self.state.lock().unwrap().delete_execution = Some(result);
    }

    pub(crate) fn set_metadata(&self, result: Scripted<Vec<ColumnMetadata>>) {
        self.state.lock().unwrap().metadata = Some(result);
    }

    pub(crate) fn calls(&self, operation: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .get(operation)
            .copied()
            .unwrap_or(0)
    }

    pub(crate) fn submitted(&self) -> Vec<ExportJobRequest> {
        self.state.lock().unwrap().submitted.clone()
    }

    pub(crate) fn deleted_jobs(&self) -> Vec<String> {
        self.state.lock().unwrap().deleted_jobs.clone()
    }

    pub(crate) fn deleted_executions(&self) -> Vec<String> {
        self.state.lock().unwrap().deleted_executions.clone()
    }

    fn record(&self, operation: &'static str) {
        *self
            .state
            .lock()
            .unwrap()
            .calls
            .entry(operation)
            .or_default() += 1;
    }
}

/// Execution record as returned by the history endpoint
pub(crate) fn execution(id: &str, status: JobExecutionStatus) -> JobExecution {
    let completed = status == JobExecutionStatus::Completed;
    JobExecution {
        id: id.to_string(),
        status,
        create_date: Some("2024-01-01T00:00:00Z".into()),
        job_completion_time: completed.then(|| "2024-01-01T00:05:00Z".into()),
        file_size: completed.then_some(2_000_000),
        download_endpoint: completed.then(|| format!("https://files.example.com/{id}.zip")),
    }
}

#[async_trait]
impl ExportApi for FakeApi {
    async fn submit_job(&self, request: &ExportJobRequest) -> Result<String> {
        self.record("submit_job");
        let mut state = self.state.lock().unwrap();
        state.submitted.push(request.clone());
        state
            .submit
            .clone()
            .unwrap_or_else(|| Ok("job-1".into()))
            .map_err(|e| api_error("submit export job", e))
    }

    async fn job_history(&self, _job_id: &str) -> Result<Vec<JobExecution>> {
        self.record("job_history");
        let mut state = self.state.lock().unwrap();
        let next = if state.history.len() > 1 {
            state.history.pop_front()
        } else {
            state.history.front().cloned()
        };
        next.unwrap_or_else(|| Ok(Vec::new()))
            .map_err(|e| api_error("query job history", e))
    }

    async fn download_archive(&self, _endpoint: &str, dest: &Path) -> Result<u64> {
        self.record("download_archive");
        let archive = self.state.lock().unwrap().archive.clone();
        let bytes = archive
            .unwrap_or_else(|| Ok(Vec::new()))
            .map_err(|e| api_error("download export archive", e))?;
        std::fs::write(dest, &bytes)?;
        Ok(bytes.len() as u64)
    }

    async fn delete_job(&self, job_id: &str) -> Result<()> {
        self.record("delete_job");
        let mut state = self.state.lock().unwrap();
        state.deleted_jobs.push(job_id.to_string());
        state
            .delete_job
            .clone()
            .unwrap_or(Ok(()))
            .map_err(|e| api_error("delete export job", e))
    }

    async fn delete_job_execution(&self, execution_id: &str) -> Result<()> {
        self.record("delete_job_execution");
        let mut state = self.state.lock().unwrap();
        state.deleted_executions.push(execution_id.to_string());
        state
            .delete_execution
            .clone()
            .unwrap_or(Ok(()))
            .map_err(|e| api_error("delete job execution", e))
    }

    async fn call_metadata_config(&self) -> Result<Vec<ColumnMetadata>> {
        self.record("call_metadata_config");
        self.state
            .lock()
            .unwrap()
            .metadata
            .clone()
            .unwrap_or_else(|| Ok(Vec::new()))
            .map_err(|e| api_error("fetch call metadata config", e))
    }
}
