//! Per-data-type record reading from an extracted export
//!
//! Each data type is exported as `{job_execution_id}_{FilenameDataType}.csv.gz`:
//! a gzip-compressed, UTF-8 CSV (optionally BOM-prefixed) whose header row names
//! the columns. Files made of several concatenated gzip members are read to the
//! end of the last member.

use crate::catalog::StreamDefinition;
use crate::coerce::{Record, RecordCoercer};
use crate::error::{Error, Result};
use crate::schema::FieldSchema;
use crate::types::ExtractionContext;
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// File name of a data type's export inside the extraction directory
pub fn data_file_name(job_execution_id: &str, filename_data_type: &str) -> String {
    format!("{job_execution_id}_{filename_data_type}.csv.gz")
}

/// Path of a stream's export file inside the extraction directory
pub fn data_file_path(context: &ExtractionContext, stream: &StreamDefinition) -> PathBuf {
    context.root_directory().join(data_file_name(
        context.job_execution_id(),
        &stream.filename_data_type(),
    ))
}

/// Reads a stream's records from an extracted export
#[derive(Clone, Copy, Debug, Default)]
pub struct DataTypeRecordReader {
    coercer: RecordCoercer,
}

impl DataTypeRecordReader {
    /// Create a reader
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the stream's file and return its records in file order
    ///
    /// Records are decoded lazily. A missing or undecodable file is an
    /// [`Error::DataFile`] for this stream only.
    pub fn read(
        &self,
        context: &ExtractionContext,
        stream: &StreamDefinition,
        schema: Arc<FieldSchema>,
    ) -> Result<RecordIter> {
        self.read_file(stream.name, &data_file_path(context, stream), schema)
    }

    /// Read a gzip CSV export file directly
    pub fn read_file(
        &self,
        stream_name: &str,
        path: &Path,
        schema: Arc<FieldSchema>,
    ) -> Result<RecordIter> {
        let data_file_error = |reason: String| Error::DataFile {
            stream: stream_name.to_string(),
            path: path.to_path_buf(),
            reason,
        };

        let file = File::open(path).map_err(|e| data_file_error(e.to_string()))?;
        let mut decoded = BufReader::new(MultiGzDecoder::new(file));
        skip_bom(&mut decoded).map_err(|e| data_file_error(e.to_string()))?;

        let mut csv = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(Box::new(decoded) as Box<dyn Read + Send>);
        let headers: Vec<String> = csv
            .headers()
            .map_err(|e| data_file_error(e.to_string()))?
            .iter()
            .map(str::to_string)
            .collect();

        info!(
            stream = stream_name,
            ?path,
            columns = headers.len(),
            "reading export data file"
        );

        Ok(RecordIter {
            stream: stream_name.to_string(),
            path: path.to_path_buf(),
            headers,
            schema,
            coercer: self.coercer,
            rows: csv.into_records(),
            emitted: 0,
            finished: false,
        })
    }
}

fn skip_bom<R: BufRead>(reader: &mut R) -> std::io::Result<()> {
    if reader.fill_buf()?.starts_with(UTF8_BOM) {
        reader.consume(UTF8_BOM.len());
    }
    Ok(())
}

/// Lazy iterator over the typed records of one data file
///
/// Yields at most one error, after which it is exhausted.
pub struct RecordIter {
    stream: String,
    path: PathBuf,
    headers: Vec<String>,
    schema: Arc<FieldSchema>,
    coercer: RecordCoercer,
    rows: csv::StringRecordsIntoIter<Box<dyn Read + Send>>,
    emitted: u64,
    finished: bool,
}

impl RecordIter {
    /// Column names from the header row
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    fn to_record(&self, row: &csv::StringRecord) -> Record {
        if row.len() > self.headers.len() {
            debug!(
                stream = %self.stream,
                line = row.position().map(|p| p.line()),
                surplus = row.len() - self.headers.len(),
                "dropping fields beyond the header row"
            );
        }

        // short rows are padded with nulls
        let values = self
            .headers
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_str(), row.get(i).map(str::to_string)));
        self.coercer.coerce(values, &self.schema)
    }
}

impl Iterator for RecordIter {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.rows.next() {
            Some(Ok(row)) => {
                self.emitted += 1;
                Some(Ok(self.to_record(&row)))
            }
            Some(Err(e)) => {
                self.finished = true;
                Some(Err(Error::DataFile {
                    stream: self.stream.clone(),
                    path: self.path.clone(),
                    reason: e.to_string(),
                }))
            }
            None => {
                self.finished = true;
                debug!(stream = %self.stream, records = self.emitted, "finished export data file");
                None
            }
        }
    }
}
