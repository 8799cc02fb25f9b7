//! CallMiner bulk export API access
//!
//! [`ExportApi`] is the seam between the export lifecycle and HTTP. The
//! production implementation, [`CallMinerClient`], authenticates every request
//! with an OAuth client-credentials token.

mod auth;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_support;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::schema::ColumnMetadata;
use crate::types::{CreatedJob, ExportJobRequest, JobExecution};
use async_trait::async_trait;
use auth::ClientCredentials;
use reqwest::Method;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use url::Url;

/// Size of the write buffer used while streaming an export archive to disk
pub const DOWNLOAD_BUFFER_SIZE: usize = 1024 * 1024;

/// Operations of the bulk export API used by the export lifecycle
///
/// Every method fails with an error on a non-success response; callers
/// decide whether that is fatal.
#[async_trait]
pub trait ExportApi: Send + Sync {
    /// `POST /export/job`, returning the new job's ID
    async fn submit_job(&self, request: &ExportJobRequest) -> Result<String>;

    /// `GET /export/history?id={job_id}`
    async fn job_history(&self, job_id: &str) -> Result<Vec<JobExecution>>;

    /// Stream the archive at `endpoint` into `dest`, returning the byte count
    async fn download_archive(&self, endpoint: &str, dest: &Path) -> Result<u64>;

    /// `DELETE /export/job/{job_id}`
    async fn delete_job(&self, job_id: &str) -> Result<()>;

    /// `DELETE /export/history/{execution_id}`
    async fn delete_job_execution(&self, execution_id: &str) -> Result<()>;

    /// `GET /info/callmetadataconfig`
    async fn call_metadata_config(&self) -> Result<Vec<ColumnMetadata>>;
}

/// Authenticated reqwest client for the CallMiner bulk export API
pub struct CallMinerClient {
    http: reqwest::Client,
    api_base: String,
    request_timeout: Duration,
    credentials: ClientCredentials,
}

impl CallMinerClient {
    /// Client for the configured region
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_endpoints(
            config,
            config.region.api_base_url(),
            config.region.token_url(),
        )
    }

    /// Client against explicit API and token URLs (proxies, test servers)
    pub fn with_endpoints(
        config: &Config,
        api_base: impl Into<String>,
        token_url: impl Into<String>,
    ) -> Result<Self> {
        let api_base = api_base.into();
        let token_url = token_url.into();

        for (key, value) in [("api_base", &api_base), ("token_url", &token_url)] {
            Url::parse(value).map_err(|e| Error::Config {
                message: format!("invalid URL {value}: {e}"),
                key: Some(key.to_string()),
            })?;
        }

        // No overall timeout on the client: archive downloads can legitimately
        // take longer than a single API call. API calls set one per request.
        let http = reqwest::Client::builder()
            .connect_timeout(config.request_timeout)
            .user_agent(concat!("tap-callminer/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            request_timeout: config.request_timeout,
            credentials: ClientCredentials::new(
                token_url,
                config.client_id.clone(),
                config.client_secret.clone(),
                config.request_timeout,
            ),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    async fn request(&self, method: Method, url: &str) -> Result<reqwest::RequestBuilder> {
        let token = self.credentials.access_token(&self.http).await?;
        Ok(self.http.request(method, url).bearer_auth(token))
    }

    /// Send a request and turn non-success responses into [`Error::Api`]
    async fn send(
        &self,
        operation: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response> {
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(Error::from_response(operation, response).await);
        }
        Ok(response)
    }
}

#[async_trait]
impl ExportApi for CallMinerClient {
    async fn submit_job(&self, request: &ExportJobRequest) -> Result<String> {
        let builder = self
            .request(Method::POST, &self.url("/export/job"))
            .await?
            .timeout(self.request_timeout)
            .json(&request.to_payload());

        let created: CreatedJob = self.send("submit export job", builder).await?.json().await?;
        debug!(job_id = %created.id, "export job created");
        Ok(created.id)
    }

    async fn job_history(&self, job_id: &str) -> Result<Vec<JobExecution>> {
        let builder = self
            .request(Method::GET, &self.url("/export/history"))
            .await?
            .timeout(self.request_timeout)
            .query(&[("id", job_id)]);

        let executions = self
            .send("query job history", builder)
            .await?
            .json()
            .await?;
        Ok(executions)
    }

    async fn download_archive(&self, endpoint: &str, dest: &Path) -> Result<u64> {
        Url::parse(endpoint)
            .map_err(|e| Error::Other(format!("invalid download endpoint {endpoint}: {e}")))?;

        let builder = self.request(Method::GET, endpoint).await?;
        let mut response = self.send("download export archive", builder).await?;

        let file = tokio::fs::File::create(dest).await?;
        let mut writer = tokio::io::BufWriter::with_capacity(DOWNLOAD_BUFFER_SIZE, file);
        let mut written: u64 = 0;

        while let Some(chunk) = response.chunk().await? {
            writer.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        writer.flush().await?;

        info!(?dest, bytes = written, "export archive downloaded");
        Ok(written)
    }

    async fn delete_job(&self, job_id: &str) -> Result<()> {
        let builder = self
            .request(Method::DELETE, &self.url(&format!("/export/job/{job_id}")))
            .await?
            .timeout(self.request_timeout);
        self.send("delete export job", builder).await?;
        Ok(())
    }

    async fn delete_job_execution(&self, execution_id: &str) -> Result<()> {
        let builder = self
            .request(
                Method::DELETE,
                &self.url(&format!("/export/history/{execution_id}")),
            )
            .await?
            .timeout(self.request_timeout);
        self.send("delete job execution", builder).await?;
        Ok(())
    }

    async fn call_metadata_config(&self) -> Result<Vec<ColumnMetadata>> {
        let builder = self
            .request(Method::GET, &self.url("/info/callmetadataconfig"))
            .await?
            .timeout(self.request_timeout);

        let columns = self
            .send("fetch call metadata config", builder)
            .await?
            .json()
            .await?;
        Ok(columns)
    }
}
