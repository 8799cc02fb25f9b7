//! Export job orchestration
//!
//! One export run walks a fixed lifecycle:
//!
//! 1. submit an export job for the selected data types
//! 2. poll the job history at a fixed interval until the execution completes
//! 3. stream the archive into a fresh temporary directory and unpack it
//! 4. hand a single [`ExtractionContext`] to the caller
//! 5. on success, advance the resume watermark to today (UTC)
//! 6. delete the temporary directory, then the job and (if one was observed)
//!    the job execution server-side
//!
//! Step 6 runs on every exit path after a job was created. Data is only
//! yielded on the happy path; cleanup is unconditional.
//!
//! [`ExportOrchestrator::run`] drives the whole lifecycle around a caller
//! closure. [`ExportOrchestrator::begin_export`] exposes the same lifecycle as
//! two explicit phases for callers that cannot express their consumption as
//! a closure; they must finish the returned [`ExportSession`] with
//! [`ExportSession::complete`] or [`ExportSession::abort`].

mod archive;


use crate::client::ExportApi;
use crate::config::Config;
use crate::error::{Error, ExportError, Result};
use crate::state::WatermarkStore;
use crate::types::{
    ExportJob, ExportJobRequest, ExportState, ExtractionContext, JobExecution, JobExecutionStatus,
};
use chrono::{NaiveDate, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tracing::{debug, error, info, warn};

/// Settings the export lifecycle needs from [`Config`]
#[derive(Clone, Debug)]
pub struct ExportSettings {
    /// Job name and temporary directory prefix
    pub tap_name: String,
    /// Start date used when no watermark has been stored yet
    pub default_start_date: NaiveDate,
    /// Recipients notified by CallMiner once the export completes
    pub notification_recipients: Vec<String>,
    /// Polls allowed before the run is aborted
    pub job_poll_max_count: u32,
    /// Delay between polls
    pub poll_interval: Duration,
}

impl From<&Config> for ExportSettings {
    fn from(config: &Config) -> Self {
        Self {
            tap_name: config.tap_name.clone(),
            default_start_date: config.start_date,
            notification_recipients: config.notification_recipients(),
            job_poll_max_count: config.job_poll_max_count,
            poll_interval: config.poll_interval,
        }
    }
}

/// Runs export jobs against an [`ExportApi`]
pub struct ExportOrchestrator<A: ExportApi> {
    api: Arc<A>,
    settings: ExportSettings,
    watermark: Arc<dyn WatermarkStore>,
}

impl<A: ExportApi> ExportOrchestrator<A> {
    /// Create an orchestrator
    pub fn new(api: Arc<A>, settings: ExportSettings, watermark: Arc<dyn WatermarkStore>) -> Self {
        Self {
            api,
            settings,
            watermark,
        }
    }

    /// Lifecycle settings
    pub fn settings(&self) -> &ExportSettings {
        &self.settings
    }

    /// Run one export and hand its extraction context to `consume`
    ///
    /// The context (and the directory behind it) is only valid until the
    /// future returned by `consume` resolves. The watermark advances only if
    /// `consume` succeeds. Server-side cleanup runs whatever happens after the
    /// job was created; a cleanup failure takes precedence over any earlier
    /// error, which is logged.
    pub async fn run<F, Fut, T>(&self, data_types: &[String], consume: F) -> Result<T>
    where
        F: FnOnce(ExtractionContext) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let session = self.begin_export(data_types).await?;

        match consume(session.context().clone()).await {
            Ok(value) => {
                session.complete().await?;
                Ok(value)
            }
            Err(e) => Err(session.fail(e).await),
        }
    }

    /// Submit an export and wait until its archive is extracted
    ///
    /// If anything fails after the job was created, the job (and any observed
    /// execution) is deleted before the error is returned.
    pub async fn begin_export(&self, data_types: &[String]) -> Result<ExportSession<'_, A>> {
        let request = self.build_request(data_types)?;

        info!(
            name = %request.name,
            data_types = ?request.data_types,
            start_date = %request.start_date,
            "submitting export job"
        );

        let job_id = self
            .api
            .submit_job(&request)
            .await
            .map_err(|e| ExportError::Submission {
                reason: e.to_string(),
            })?;

        info!(job_id = %job_id, "export job submitted");

        let mut handle = JobHandle {
            orchestrator: self,
            job: ExportJob {
                id: job_id,
                request,
            },
            execution_id: None,
            state: ExportState::Submitting,
        };
        handle.transition(ExportState::AwaitingExecutionStart);

        match handle.prepare().await {
            Ok((dir, context)) => {
                handle.transition(ExportState::Ready);
                Ok(ExportSession {
                    handle,
                    dir: Some(dir),
                    context,
                })
            }
            Err(e) => Err(handle.fail(e).await),
        }
    }

    fn build_request(&self, data_types: &[String]) -> Result<ExportJobRequest> {
        if data_types.is_empty() {
            return Err(Error::Config {
                message: "no data types selected for export".to_string(),
                key: None,
            });
        }

        let start_date = match self.watermark.load()? {
            Some(date) => {
                debug!(%date, "resuming from stored watermark");
                date
            }
            None => self.settings.default_start_date,
        };

        Ok(ExportJobRequest::new(
            self.settings.tap_name.clone(),
            data_types.iter().cloned(),
            start_date,
            self.settings.notification_recipients.clone(),
        ))
    }
}

/// A submitted export job whose archive has been extracted
///
/// Created by [`ExportOrchestrator::begin_export`] in the `Ready` state.
/// Dropping a session without calling [`complete`](Self::complete) or
/// [`abort`](Self::abort) leaks the server-side job; this is logged.
pub struct ExportSession<'a, A: ExportApi> {
    handle: JobHandle<'a, A>,
    dir: Option<TempDir>,
    context: ExtractionContext,
}

impl<A: ExportApi> ExportSession<'_, A> {
    /// The submitted job
    pub fn job(&self) -> &ExportJob {
        &self.handle.job
    }

    /// Latched job execution ID
    pub fn job_execution_id(&self) -> Option<&str> {
        self.handle.execution_id.as_deref()
    }

    /// Current lifecycle state
    pub fn state(&self) -> ExportState {
        self.handle.state
    }

    /// The extracted archive, valid until the session is finished
    pub fn context(&self) -> &ExtractionContext {
        &self.context
    }

    /// Finish a successful run: advance the watermark, then clean up
    pub async fn complete(mut self) -> Result<()> {
        let today = Utc::now().date_naive();
        let saved = self.handle.orchestrator.watermark.save(today);
        match &saved {
            Ok(()) => info!(start_date = %today, "watermark advanced"),
            Err(e) => error!(error = %e, "failed to store watermark"),
        }

        self.release_dir();
        let cleaned = self.handle.cleanup().await;

        match (saved, cleaned) {
            (Ok(()), Ok(())) => {
                self.handle.transition(ExportState::Done);
                Ok(())
            }
            (_, Err(e)) | (Err(e), Ok(())) => {
                self.handle.transition(ExportState::Failed);
                Err(e)
            }
        }
    }

    /// Finish without advancing the watermark
    pub async fn abort(mut self) -> Result<()> {
        info!(job_id = %self.handle.job.id, "aborting export");
        self.release_dir();
        let cleaned = self.handle.cleanup().await;
        self.handle.transition(ExportState::Failed);
        cleaned
    }

    async fn fail(mut self, cause: Error) -> Error {
        self.release_dir();
        self.handle.fail(cause).await
    }

    fn release_dir(&mut self) {
        if let Some(dir) = self.dir.take() {
            let path = dir.path().to_path_buf();
            match dir.close() {
                Ok(()) => debug!(?path, "removed extraction directory"),
                Err(e) => warn!(?path, error = %e, "failed to remove extraction directory"),
            }
        }
    }
}

/// Server-side job plus the lifecycle bookkeeping needed to clean it up
struct JobHandle<'a, A: ExportApi> {
    orchestrator: &'a ExportOrchestrator<A>,
    job: ExportJob,
    execution_id: Option<String>,
    state: ExportState,
}

impl<A: ExportApi> JobHandle<'_, A> {
    fn transition(&mut self, next: ExportState) {
        debug!(job_id = %self.job.id, from = %self.state, to = %next, "export state change");
        self.state = next;
    }

    /// Clean up after `cause`, returning the error the caller should see
    ///
    /// A cleanup failure replaces `cause`, which is logged.
    async fn fail(&mut self, cause: Error) -> Error {
        error!(
            job_id = %self.job.id,
            state = %self.state,
            error = %cause,
            "export run failed, cleaning up"
        );
        let cleaned = self.cleanup().await;
        self.transition(ExportState::Failed);

        match cleaned {
            Ok(()) => cause,
            Err(cleanup_error) => {
                error!(
                    job_id = %self.job.id,
                    original_error = %cause,
                    "cleanup failed while unwinding from an earlier error"
                );
                cleanup_error
            }
        }
    }

    /// Poll, download and extract; the directory is removed again on error
    async fn prepare(&mut self) -> Result<(TempDir, ExtractionContext)> {
        let execution = self.poll_until_complete().await?;
        // files are named after the latched execution, which is also the one cleaned up
        let execution_id = self
            .execution_id
            .clone()
            .unwrap_or_else(|| execution.id.clone());

        self.transition(ExportState::Downloading);
        let endpoint =
            execution
                .download_endpoint
                .as_deref()
                .ok_or_else(|| ExportError::Download {
                    execution_id: execution_id.clone(),
                    reason: "completed execution has no download endpoint".to_string(),
                })?;

        let settings = &self.orchestrator.settings;
        let dir = tempfile::Builder::new()
            .prefix(&format!("{}-", settings.tap_name))
            .tempdir()?;
        let archive_path = dir
            .path()
            .join(format!("{}-{}.zip", self.job.id, execution_id));

        info!(
            ?archive_path,
            size_mb = execution.file_size_mb().unwrap_or_default(),
            "downloading export archive"
        );

        self.orchestrator
            .api
            .download_archive(endpoint, &archive_path)
            .await
            .map_err(|e| ExportError::Download {
                execution_id: execution_id.clone(),
                reason: e.to_string(),
            })?;

        self.transition(ExportState::Extracting);
        archive::extract_and_remove(&archive_path, dir.path()).await?;

        let context = ExtractionContext::new(dir.path().to_path_buf(), execution_id);
        Ok((dir, context))
    }

    async fn poll_until_complete(&mut self) -> Result<JobExecution> {
        let max_polls = self.orchestrator.settings.job_poll_max_count;
        let interval = self.orchestrator.settings.poll_interval;
        let mut last_status: Option<JobExecutionStatus> = None;
        let mut count: u32 = 0;

        loop {
            count += 1;
            if count > max_polls {
                return Err(ExportError::PollTimeout {
                    job_id: self.job.id.clone(),
                    max_polls,
                    interval_secs: interval.as_secs(),
                }
                .into());
            }

            let executions = self.orchestrator.api.job_history(&self.job.id).await?;

            match executions.into_iter().next() {
                None => info!(job_id = %self.job.id, "job execution not yet started"),
                Some(execution) => {
                    self.latch_execution(&execution);

                    if last_status.as_ref() != Some(&execution.status) {
                        info!(
                            job_execution_id = %execution.id,
                            status = %execution.status,
                            "job execution status changed"
                        );
                        last_status = Some(execution.status.clone());
                    }

                    if execution.status == JobExecutionStatus::Completed {
                        info!(
                            job_execution_id = %execution.id,
                            completed_at = execution.job_completion_time.as_deref().unwrap_or("unknown"),
                            "job execution completed"
                        );
                        return Ok(execution);
                    }
                }
            }

            info!("waiting {}s... ({}/{})", interval.as_secs(), count, max_polls);
            tokio::time::sleep(interval).await;
        }
    }

    fn latch_execution(&mut self, execution: &JobExecution) {
        match &self.execution_id {
            None => {
                info!(
                    job_execution_id = %execution.id,
                    started_at = execution.create_date.as_deref().unwrap_or("unknown"),
                    "job execution started"
                );
                self.execution_id = Some(execution.id.clone());
                self.transition(ExportState::Polling);
            }
            Some(latched) if latched != &execution.id => {
                warn!(
                    latched = %latched,
                    reported = %execution.id,
                    "job history reported a different execution, keeping the first one"
                );
            }
            Some(_) => {}
        }
    }

    /// Delete the job and, if observed, the job execution
    ///
    /// Both deletes are attempted even if the first fails; the first failure
    /// is returned.
    async fn cleanup(&mut self) -> Result<()> {
        self.transition(ExportState::CleaningUp);
        let api = &self.orchestrator.api;

        info!(job_id = %self.job.id, "cleaning up job");
        let job_result = api
            .delete_job(&self.job.id)
            .await
            .map_err(|e| ExportError::Cleanup {
                resource: "job",
                id: self.job.id.clone(),
                reason: e.to_string(),
            });

        let execution_result = match &self.execution_id {
            Some(execution_id) => {
                info!(job_execution_id = %execution_id, "cleaning up job execution");
                api.delete_job_execution(execution_id)
                    .await
                    .map_err(|e| ExportError::Cleanup {
                        resource: "job execution",
                        id: execution_id.clone(),
                        reason: e.to_string(),
                    })
            }
            None => Ok(()),
        };

        match (job_result, execution_result) {
            (Ok(()), Ok(())) => Ok(()),
            (Err(e), Ok(())) | (Ok(()), Err(e)) => Err(e.into()),
            (Err(job_error), Err(execution_error)) => {
                error!(error = %execution_error, "job execution cleanup also failed");
                Err(job_error.into())
            }
        }
    }
}

impl<A: ExportApi> Drop for JobHandle<'_, A> {
    fn drop(&mut self) {
        if !self.state.is_terminal() {
            error!(
                job_id = %self.job.id,
                job_execution_id = ?self.execution_id,
                state = %self.state,
                "export job dropped before cleanup; server-side job was not deleted"
            );
        }
    }
}
