//! # tap-callminer
//!
//! Extractor for the CallMiner bulk export API.
//!
//! One sync submits a single export job for every selected data type, waits
//! for it to complete, downloads and unpacks the archive into a temporary
//! directory, then decodes each data type's gzip CSV into typed records. The
//! job and its execution are deleted server-side on every exit path, and the
//! resume watermark only advances when every record was consumed.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use tap_callminer::{Config, JsonFileWatermarkStore, Tap};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_json(&std::fs::read_to_string("config.json")?)?;
//!     let state = Arc::new(JsonFileWatermarkStore::new("state.json"));
//!     let tap = Tap::new(&config, state)?;
//!
//!     let summary = tap
//!         .sync(Some(&["alerts", "scores"][..]), |stream, record| {
//!             println!("{} {}", stream.name, serde_json::Value::Object(record));
//!             Ok(())
//!         })
//!         .await?;
//!
//!     println!("synced {} records", summary.total_records());
//!     Ok(())
//! }
//! ```
//!
//! Callers that want the extracted files themselves can drive
//! [`ExportOrchestrator`] directly, either scoped through
//! [`ExportOrchestrator::run`] or in two phases through
//! [`ExportOrchestrator::begin_export`].

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Stream catalog
pub mod catalog;
/// Bulk export API client
pub mod client;
/// Text to typed value coercion
pub mod coerce;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Export job lifecycle
pub mod export;
/// Data file reading
pub mod reader;
/// Stream schemas and type mapping
pub mod schema;
/// Resume watermark storage
pub mod state;
/// Catalog discovery and sync
pub mod tap;
/// Core types
pub mod types;

// Re-export commonly used types
pub use catalog::{Catalog, StreamDefinition};
pub use client::{CallMinerClient, ExportApi};
pub use coerce::{Record, RecordCoercer};
pub use config::{Config, Region};
pub use error::{Error, ExportError, Result};
pub use export::{ExportOrchestrator, ExportSession, ExportSettings};
pub use reader::{DataTypeRecordReader, RecordIter};
pub use schema::{
    DynamicSchemaResolver, FieldProperty, FieldSchema, SchemaProvider, SchemaTypeMapper,
    SemanticType,
};
pub use state::{JsonFileWatermarkStore, MemoryWatermarkStore, WatermarkStore};
pub use tap::{SyncSummary, Tap};
pub use types::{
    ExportJob, ExportJobRequest, ExportState, ExtractionContext, JobExecution,
    JobExecutionStatus, SearchMode,
};
