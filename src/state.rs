//! Resume watermark storage
//!
//! The watermark is the start date of the next export. It only ever moves
//! forward on a fully successful run.

use crate::error::{Error, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

/// Persists the start date of the next export
pub trait WatermarkStore: Send + Sync {
    /// Stored watermark, or `None` before the first successful run
    fn load(&self) -> Result<Option<NaiveDate>>;

    /// Replace the stored watermark
    fn save(&self, start_date: NaiveDate) -> Result<()>;
}

/// Process-local watermark
#[derive(Debug, Default)]
pub struct MemoryWatermarkStore {
    start_date: Mutex<Option<NaiveDate>>,
}

impl MemoryWatermarkStore {
    /// Store seeded with `start_date`
    pub fn with_start_date(start_date: NaiveDate) -> Self {
        Self {
            start_date: Mutex::new(Some(start_date)),
        }
    }
}

impl WatermarkStore for MemoryWatermarkStore {
    fn load(&self) -> Result<Option<NaiveDate>> {
        let guard = self
            .start_date
            .lock()
            .map_err(|e| Error::State(format!("watermark lock poisoned: {e}")))?;
        Ok(*guard)
    }

    fn save(&self, start_date: NaiveDate) -> Result<()> {
        let mut guard = self
            .start_date
            .lock()
            .map_err(|e| Error::State(format!("watermark lock poisoned: {e}")))?;
        *guard = Some(start_date);
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StateDocument {
    start_date: NaiveDate,
}

/// Watermark kept in a JSON state file: `{"start_date": "YYYY-MM-DD"}`
///
/// A missing file means no watermark. Writes go to a sibling temporary file
/// that is then renamed over the state file.
#[derive(Debug, Clone)]
pub struct JsonFileWatermarkStore {
    path: PathBuf,
}

impl JsonFileWatermarkStore {
    /// Store backed by the file at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// State file location
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl WatermarkStore for JsonFileWatermarkStore {
    fn load(&self) -> Result<Option<NaiveDate>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let document: StateDocument = serde_json::from_str(&content).map_err(|e| {
            Error::State(format!(
                "invalid state file {}: {}",
                self.path.display(),
                e
            ))
        })?;
        Ok(Some(document.start_date))
    }

    fn save(&self, start_date: NaiveDate) -> Result<()> {
        let json = serde_json::to_string_pretty(&StateDocument { start_date })?;

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;

        debug!(path = ?self.path, %start_date, "state file written");
        Ok(())
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn memory_store_starts_empty() {
        let store = MemoryWatermarkStore::default();
        assert_eq!(store.load().unwrap(), None);

        store.save(date(2024, 5, 1)).unwrap();
        assert_eq!(store.load().unwrap(), Some(date(2024, 5, 1)));
    }

    #[test]
    fn seeded_memory_store() {
        let store = MemoryWatermarkStore::with_start_date(date(2023, 1, 1));
        assert_eq!(store.load().unwrap(), Some(date(2023, 1, 1)));
    }

    #[test]
    fn missing_state_file_is_no_watermark() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileWatermarkStore::new(dir.path().join("state.json"));
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn state_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let store = JsonFileWatermarkStore::new(&path);

        store.save(date(2024, 2, 29)).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw, serde_json::json!({"start_date": "2024-02-29"}));
        assert_eq!(store.load().unwrap(), Some(date(2024, 2, 29)));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn corrupt_state_file_is_a_state_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = JsonFileWatermarkStore::new(&path).load().unwrap_err();
        assert!(matches!(err, Error::State(_)));
    }
}
