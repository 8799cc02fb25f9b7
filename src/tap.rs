//! The tap: catalog discovery and one-shot sync of selected streams

use crate::catalog::{Catalog, StreamDefinition};
use crate::client::{CallMinerClient, ExportApi};
use crate::coerce::Record;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::export::{ExportOrchestrator, ExportSettings};
use crate::reader::{DataTypeRecordReader, data_file_path};
use crate::schema::FieldSchema;
use crate::state::WatermarkStore;
use crate::types::ExtractionContext;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::spawn_blocking;
use tracing::{error, info};

/// Decoded records buffered between the decoding thread and the sink
const RECORD_BUFFER: usize = 1024;

/// Outcome of a successful sync
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyncSummary {
    /// Job execution the records came from
    pub job_execution_id: String,
    /// Records handed to the sink, per stream
    pub records: BTreeMap<String, u64>,
}

impl SyncSummary {
    /// Total records across streams
    pub fn total_records(&self) -> u64 {
        self.records.values().sum()
    }
}

/// CallMiner tap
pub struct Tap<A: ExportApi = CallMinerClient> {
    api: Arc<A>,
    catalog: Catalog,
    orchestrator: ExportOrchestrator<A>,
    reader: DataTypeRecordReader,
}

impl Tap<CallMinerClient> {
    /// Tap talking to the configured CallMiner region
    ///
    /// # Errors
    /// Returns error if the config is invalid or the HTTP client cannot be created
    pub fn new(config: &Config, watermark: Arc<dyn WatermarkStore>) -> Result<Self> {
        config.validate()?;
        let api = Arc::new(CallMinerClient::new(config)?);
        Ok(Self::with_api(api, ExportSettings::from(config), watermark))
    }
}

impl<A: ExportApi> Tap<A> {
    /// Tap over any [`ExportApi`] implementation
    pub fn with_api(
        api: Arc<A>,
        settings: ExportSettings,
        watermark: Arc<dyn WatermarkStore>,
    ) -> Self {
        Self {
            orchestrator: ExportOrchestrator::new(Arc::clone(&api), settings, watermark),
            api,
            catalog: Catalog::callminer(),
            reader: DataTypeRecordReader::new(),
        }
    }

    /// Replace the stream catalog
    pub fn with_catalog(mut self, catalog: Catalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Streams this tap can sync
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Catalog document with every stream's key properties and JSON schema
    ///
    /// Resolves remote schemas, so this talks to the API for `contacts`.
    pub async fn discover(&self) -> Result<Value> {
        let mut streams = Vec::with_capacity(self.catalog.streams().len());
        for stream in self.catalog.streams() {
            let schema = stream.schema.schema(self.api.as_ref()).await?;
            streams.push(json!({
                "tap_stream_id": stream.name,
                "stream": stream.name,
                "key_properties": stream.primary_keys,
                "schema": schema.to_json_schema(),
            }));
        }
        Ok(json!({ "streams": streams }))
    }

    /// Export the selected streams and hand every record to `sink`
    ///
    /// `None` selects every stream. Schemas are resolved before the export job
    /// is submitted. A stream that fails to read (or whose records the sink
    /// rejects) does not stop the other streams, but fails the sync: the
    /// watermark is left alone and the first failure is returned once cleanup
    /// has run.
    pub async fn sync<S>(&self, selection: Option<&[&str]>, mut sink: S) -> Result<SyncSummary>
    where
        S: FnMut(&StreamDefinition, Record) -> Result<()>,
    {
        let streams = self.catalog.select(selection)?;

        let mut resolved: Vec<(&StreamDefinition, Arc<FieldSchema>)> =
            Vec::with_capacity(streams.len());
        for stream in &streams {
            let schema = stream.schema.schema(self.api.as_ref()).await?;
            resolved.push((stream, schema));
        }

        let data_types = Catalog::export_data_types(&streams);
        info!(
            streams = streams.len(),
            data_types = ?data_types,
            "starting sync"
        );

        let reader = &self.reader;
        let sink = &mut sink;
        let summary = self
            .orchestrator
            .run(&data_types, |context| async move {
                read_streams(reader, &context, &resolved, sink).await
            })
            .await?;

        info!(
            job_execution_id = %summary.job_execution_id,
            records = summary.total_records(),
            "sync complete"
        );
        Ok(summary)
    }
}

async fn read_streams<S>(
    reader: &DataTypeRecordReader,
    context: &ExtractionContext,
    streams: &[(&StreamDefinition, Arc<FieldSchema>)],
    sink: &mut S,
) -> Result<SyncSummary>
where
    S: FnMut(&StreamDefinition, Record) -> Result<()>,
{
    let mut summary = SyncSummary {
        job_execution_id: context.job_execution_id().to_string(),
        records: BTreeMap::new(),
    };
    let mut first_error: Option<Error> = None;

    for (stream, schema) in streams {
        match read_stream(reader, context, stream, Arc::clone(schema), sink).await {
            Ok(count) => {
                info!(stream = stream.name, records = count, "stream synced");
                summary.records.insert(stream.name.to_string(), count);
            }
            Err(e) => {
                error!(stream = stream.name, error = %e, "stream failed");
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(summary),
    }
}

/// Decode one stream's file on a blocking thread and feed its records to `sink`
///
/// The sink runs on the calling task. If it fails, the channel is closed and
/// the decoding thread stops at its next send.
async fn read_stream<S>(
    reader: &DataTypeRecordReader,
    context: &ExtractionContext,
    stream: &StreamDefinition,
    schema: Arc<FieldSchema>,
    sink: &mut S,
) -> Result<u64>
where
    S: FnMut(&StreamDefinition, Record) -> Result<()>,
{
    let (tx, mut rx) = mpsc::channel::<Result<Record>>(RECORD_BUFFER);
    let path = data_file_path(context, stream);
    let stream_name = stream.name;
    let reader = *reader;

    let decoder = {
        let path = path.clone();
        spawn_blocking(move || {
            let records = match reader.read_file(stream_name, &path, schema) {
                Ok(records) => records,
                Err(e) => {
                    let _ = tx.blocking_send(Err(e));
                    return;
                }
            };
            for record in records {
                if tx.blocking_send(record).is_err() {
                    break;
                }
            }
        })
    };

    let outcome = async {
        let mut count = 0;
        while let Some(record) = rx.recv().await {
            sink(stream, record?)?;
            count += 1;
        }
        Ok::<u64, Error>(count)
    }
    .await;
    drop(rx);

    decoder.await.map_err(|e| Error::DataFile {
        stream: stream_name.to_string(),
        path,
        reason: format!("decoding task panicked: {e}"),
    })?;
    outcome
}
