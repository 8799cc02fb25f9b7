//! Configuration types for tap-callminer

use crate::error::{Error, Result};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// CallMiner API region
///
/// Each region has its own API and identity provider hosts, e.g. `apiuk.callminer.net`
/// and `idpuk.callminer.net` for [`Region::Uk`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Region {
    /// api.callminer.net
    #[default]
    Us,
    /// apif.callminer.net
    UsFisma,
    /// apiuk.callminer.net
    Uk,
    /// apiaus.callminer.net
    Au,
    /// apica.callminer.net
    Ca,
    /// apiew.callminer.net
    Eu,
}

impl Region {
    /// Host suffix appended to `api` and `idp`
    pub fn host_suffix(&self) -> &'static str {
        match self {
            Region::Us => "",
            Region::UsFisma => "f",
            Region::Uk => "uk",
            Region::Au => "aus",
            Region::Ca => "ca",
            Region::Eu => "ew",
        }
    }

    /// Base URL of the bulk export API
    pub fn api_base_url(&self) -> String {
        format!(
            "https://api{}.callminer.net/bulkexport/api",
            self.host_suffix()
        )
    }

    /// OAuth token endpoint
    pub fn token_url(&self) -> String {
        format!("https://idp{}.callminer.net/connect/token", self.host_suffix())
    }
}

/// Main configuration for the tap
///
/// Deserializes from the usual tap config JSON. Only `client_id` and
/// `client_secret` are required; everything else has a default.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// CallMiner bulk export API client ID
    pub client_id: String,

    /// CallMiner bulk export API client secret
    pub client_secret: String,

    /// Email address CallMiner notifies once an export completes
    #[serde(default)]
    pub notification_email: Option<String>,

    /// CallMiner API region (default: US)
    #[serde(default)]
    pub region: Region,

    /// The earliest record date to sync when no watermark exists (default: one year ago)
    #[serde(default = "default_start_date")]
    pub start_date: NaiveDate,

    /// Maximum job poll count (default: 60)
    #[serde(default = "default_job_poll_max_count")]
    pub job_poll_max_count: u32,

    /// Delay between job history polls (default: 60 seconds)
    ///
    /// CallMiner recommends polling once a minute.
    #[serde(default = "default_poll_interval", with = "duration_serde")]
    pub poll_interval: Duration,

    /// Timeout applied to every HTTP request (default: 300 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// Name given to export jobs and temporary directories (default: "tap-callminer")
    #[serde(default = "default_tap_name")]
    pub tap_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            notification_email: None,
            region: Region::default(),
            start_date: default_start_date(),
            job_poll_max_count: default_job_poll_max_count(),
            poll_interval: default_poll_interval(),
            request_timeout: default_request_timeout(),
            tap_name: default_tap_name(),
        }
    }
}

impl Config {
    /// Parse and validate a JSON config document
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for values the export lifecycle cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.client_id.trim().is_empty() {
            return Err(config_error("client_id is required", "client_id"));
        }
        if self.client_secret.trim().is_empty() {
            return Err(config_error("client_secret is required", "client_secret"));
        }
        if self.job_poll_max_count < 1 {
            return Err(config_error(
                "job_poll_max_count must be at least 1",
                "job_poll_max_count",
            ));
        }
        if let Some(email) = &self.notification_email {
            if !email.contains('@') {
                return Err(config_error(
                    format!("notification_email is not an email address: {email}"),
                    "notification_email",
                ));
            }
        }
        if self.tap_name.trim().is_empty() {
            return Err(config_error("tap_name must not be empty", "tap_name"));
        }
        Ok(())
    }

    /// Recipients notified by CallMiner once the export completes
    pub fn notification_recipients(&self) -> Vec<String> {
        self.notification_email.iter().cloned().collect()
    }
}

fn config_error(message: impl Into<String>, key: &str) -> Error {
    Error::Config {
        message: message.into(),
        key: Some(key.to_string()),
    }
}

fn default_start_date() -> NaiveDate {
    (Utc::now() - chrono::Duration::days(365)).date_naive()
}

fn default_job_poll_max_count() -> u32 {
    60
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_tap_name() -> String {
    "tap-callminer".to_string()
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
