//! Chunked reading of delimiter-separated DVF exports.

use crate::error::{EstimatorError, Result};
use csv::{ReaderBuilder, StringRecord};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// How raw exports are read.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Rows per chunk.
    pub chunk_size: usize,
    /// Reading stops after the chunk in which this many rows have been read.
    pub sample_cap: usize,
    /// Single-byte field delimiter.
    pub delimiter: char,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            chunk_size: 100_000,
            sample_cap: 500_000,
            delimiter: ',',
        }
    }
}

impl IngestConfig {
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_sample_cap(mut self, sample_cap: usize) -> Self {
        self.sample_cap = sample_cap;
        self
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    fn delimiter_byte(&self) -> Result<u8> {
        u8::try_from(self.delimiter)
            .ok()
            .filter(u8::is_ascii)
            .ok_or_else(|| {
                EstimatorError::Config(format!(
                    "delimiter must be a single ASCII character, got {:?}",
                    self.delimiter
                ))
            })
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(EstimatorError::Config("chunk_size must be positive".into()));
        }
        if self.sample_cap == 0 {
            return Err(EstimatorError::Config("sample_cap must be positive".into()));
        }
        self.delimiter_byte().map(|_| ())
    }
}

/// Source column names with a name-to-position index.
#[derive(Clone, Debug, Default)]
pub struct Headers {
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl Headers {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names
            .into_iter()
            .map(|n| n.into().trim().to_string())
            .collect();
        let mut index = HashMap::with_capacity(names.len());
        for (pos, name) in names.iter().enumerate() {
            // first occurrence wins on duplicated headers
            index.entry(name.clone()).or_insert(pos);
        }
        Self { names, index }
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// The untyped cells of one source row, looked up by column name.
#[derive(Clone, Copy, Debug)]
pub struct RawRecord<'a> {
    headers: &'a Headers,
    record: &'a StringRecord,
}

impl<'a> RawRecord<'a> {
    pub fn new(headers: &'a Headers, record: &'a StringRecord) -> Self {
        Self { headers, record }
    }

    /// Trimmed cell value; empty cells read as missing.
    pub fn get(&self, column: &str) -> Option<&'a str> {
        self.headers
            .position(column)
            .and_then(|pos| self.record.get(pos))
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    pub fn record(&self) -> &'a StringRecord {
        self.record
    }
}

/// Rows read from a source file, sharing one header set.
#[derive(Clone, Debug, Default)]
pub struct RawTable {
    headers: Arc<Headers>,
    records: Vec<StringRecord>,
}

impl RawTable {
    pub fn new(headers: Headers, records: Vec<StringRecord>) -> Self {
        Self {
            headers: Arc::new(headers),
            records,
        }
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn rows(&self) -> impl Iterator<Item = RawRecord<'_>> {
        self.records
            .iter()
            .map(move |record| RawRecord::new(&self.headers, record))
    }

    /// Read a file chunk by chunk until the sample cap is reached.
    pub fn read_path<P: AsRef<Path>>(path: P, config: &IngestConfig) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        info!(path = %path.display(), "loading transactions");
        Self::read_from(file, config)
    }

    pub fn read_from<R: Read>(source: R, config: &IngestConfig) -> Result<Self> {
        let mut reader = ChunkedReader::new(source, config)?;
        let headers = reader.headers().clone();
        let mut records = Vec::new();
        for chunk in reader.by_ref() {
            records.extend(chunk?);
        }
        info!(rows = records.len(), chunks = reader.chunks_read(), "transactions loaded");
        Ok(Self::new(headers, records))
    }
}

/// Iterator over fixed-size chunks of source rows.
///
/// Stops after the chunk in which the cumulative row count reaches the
/// configured sample cap, or at end of input.
pub struct ChunkedReader<R: Read> {
    reader: csv::Reader<R>,
    headers: Headers,
    chunk_size: usize,
    sample_cap: usize,
    rows_read: usize,
    chunks_read: usize,
    done: bool,
}

impl<R: Read> ChunkedReader<R> {
    pub fn new(source: R, config: &IngestConfig) -> Result<Self> {
        config.validate()?;
        let mut reader = ReaderBuilder::new()
            .delimiter(config.delimiter_byte()?)
            .flexible(true)
            .has_headers(true)
            .from_reader(source);
        let headers = Headers::new(reader.byte_headers()?.iter().map(|h| {
            String::from_utf8_lossy(h).trim_start_matches('\u{feff}').to_string()
        }));
        Ok(Self {
            reader,
            headers,
            chunk_size: config.chunk_size,
            sample_cap: config.sample_cap,
            rows_read: 0,
            chunks_read: 0,
            done: false,
        })
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn rows_read(&self) -> usize {
        self.rows_read
    }

    pub fn chunks_read(&self) -> usize {
        self.chunks_read
    }

    fn read_chunk(&mut self) -> Result<Vec<StringRecord>> {
        let mut chunk = Vec::with_capacity(self.chunk_size.min(1 << 16));
        let mut raw = csv::ByteRecord::new();
        while chunk.len() < self.chunk_size {
            if !self.reader.read_byte_record(&mut raw)? {
                self.done = true;
                break;
            }
            chunk.push(StringRecord::from_byte_record_lossy(raw.clone()));
        }
        Ok(chunk)
    }
}

impl<R: Read> Iterator for ChunkedReader<R> {
    type Item = Result<Vec<StringRecord>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_chunk() {
            Ok(chunk) if chunk.is_empty() => None,
            Ok(chunk) => {
                self.rows_read += chunk.len();
                self.chunks_read += 1;
                debug!(chunk = self.chunks_read, rows_read = self.rows_read, "chunk read");
                if self.rows_read >= self.sample_cap {
                    self.done = true;
                }
                Some(Ok(chunk))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
