//! Mock CallMiner bulk export API backed by wiremock

use chrono::NaiveDate;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tap_callminer::{CallMinerClient, Config, ExportSettings, Tap, WatermarkStore};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const JOB_ID: &str = "job-abc";
pub const EXECUTION_ID: &str = "exec123";

/// Config pointing at nothing in particular; endpoints come from the mock server
pub fn test_config(job_poll_max_count: u32) -> Config {
    Config {
        client_id: "client".into(),
        client_secret: "secret".into(),
        notification_email: Some("ops@example.com".into()),
        start_date: NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date"),
        job_poll_max_count,
        poll_interval: Duration::from_millis(10),
        request_timeout: Duration::from_secs(5),
        ..Default::default()
    }
}

/// Start a server that hands out tokens and accepts job creation
pub async fn start_server() -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/connect/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "test-token", "expires_in": 3600})),
        )
        .mount(&server)
        .await;

    server
}

/// Tap wired to `server` through a real [`CallMinerClient`]
pub fn tap_for(
    server: &MockServer,
    config: &Config,
    watermark: Arc<dyn WatermarkStore>,
) -> Tap<CallMinerClient> {
    let client = CallMinerClient::with_endpoints(
        config,
        format!("{}/bulkexport/api", server.uri()),
        format!("{}/connect/token", server.uri()),
    )
    .expect("client");
    Tap::with_api(Arc::new(client), ExportSettings::from(config), watermark)
}

/// `POST /export/job` answering with [`JOB_ID`]
pub fn create_job() -> Mock {
    Mock::given(method("POST"))
        .and(path("/bulkexport/api/export/job"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"Id": JOB_ID})))
}

/// One `GET /export/history` answer
pub fn history(body: serde_json::Value) -> Mock {
    Mock::given(method("GET"))
        .and(path("/bulkexport/api/export/history"))
        .and(query_param("id", JOB_ID))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
}

/// History entry for a running execution
pub fn running() -> serde_json::Value {
    json!([{"Id": EXECUTION_ID, "Status": "Running", "CreateDate": "2024-06-01T00:00:00Z"}])
}

/// History entry for a completed execution downloadable from `server`
pub fn completed(server: &MockServer, file_size: u64) -> serde_json::Value {
    json!([{
        "Id": EXECUTION_ID,
        "Status": "Completed",
        "CreateDate": "2024-06-01T00:00:00Z",
        "JobCompletionTime": "2024-06-01T00:04:00Z",
        "FileSize": file_size,
        "DownloadEndpoint": format!("{}/download/{}", server.uri(), EXECUTION_ID),
    }])
}

/// `GET {DownloadEndpoint}` serving `archive`
pub fn download(archive: Vec<u8>) -> Mock {
    Mock::given(method("GET"))
        .and(path(format!("/download/{EXECUTION_ID}")))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(archive))
}

/// `DELETE /export/job/{JOB_ID}`
pub fn delete_job() -> Mock {
    Mock::given(method("DELETE"))
        .and(path(format!("/bulkexport/api/export/job/{JOB_ID}")))
        .respond_with(ResponseTemplate::new(200))
}

/// `DELETE /export/history/{EXECUTION_ID}`
pub fn delete_execution() -> Mock {
    Mock::given(method("DELETE"))
        .and(path(format!("/bulkexport/api/export/history/{EXECUTION_ID}")))
        .respond_with(ResponseTemplate::new(200))
}
