//! Dataset loader: reads the delimited dataset file into a [`RawTable`].
//!
//! The file is decoded as UTF-8 first. Publisher exports occasionally carry
//! Latin-1 bytes in borrower names and addresses, so a decode failure falls
//! back to ISO-8859-1, where every byte is the code point of the same
//! value. Downstream stages cannot tell which decoding was used.
//!
//! Only the first [`LoaderOptions::max_rows`] data rows are materialized.

use std::path::Path;

use crate::config::LoaderConfig;
use crate::error::IngestError;
use crate::models::{RawDatasetHandle, RawTable};

/// Options for [`load_dataset`].
#[derive(Debug, Clone, Copy)]
pub struct LoaderOptions {
    /// Maximum number of data rows to materialize; the rest are skipped.
    pub max_rows: usize,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self { max_rows: 10_000 }
    }
}

impl From<&LoaderConfig> for LoaderOptions {
    fn from(config: &LoaderConfig) -> Self {
        Self {
            max_rows: config.max_rows,
        }
    }
}

/// Which text encoding produced the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Utf8,
    Latin1,
}

impl Encoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            Encoding::Utf8 => "utf-8",
            Encoding::Latin1 => "iso-8859-1",
        }
    }
}

pub fn load_dataset(
    handle: &RawDatasetHandle,
    options: LoaderOptions,
) -> Result<RawTable, IngestError> {
    load_path(&handle.path, options)
}

pub fn load_path(path: &Path, options: LoaderOptions) -> Result<RawTable, IngestError> {
    let bytes = std::fs::read(path)
        .map_err(|e| IngestError::Load(format!("reading {}: {}", path.display(), e)))?;

    let (text, encoding) = decode(bytes);
    if encoding == Encoding::Latin1 {
        tracing::warn!(
            path = %path.display(),
            "UTF-8 decoding failed, using ISO-8859-1 fallback"
        );
    }

    let table = parse_table(&text, options)?;

    tracing::info!(
        path = %path.display(),
        encoding = encoding.as_str(),
        rows = table.len(),
        columns = table.columns.len(),
        "dataset loaded"
    );

    Ok(table)
}

/// Decode as UTF-8, falling back to ISO-8859-1. A leading UTF-8 byte-order
/// mark is dropped.
pub fn decode(bytes: Vec<u8>) -> (String, Encoding) {
    match String::from_utf8(bytes) {
        Ok(mut text) => {
            if text.starts_with('\u{feff}') {
                text.drain(..'\u{feff}'.len_utf8());
            }
            (text, Encoding::Utf8)
        }
        Err(e) => {
            let text = encoding_rs::mem::decode_latin1(e.as_bytes()).into_owned();
            (text, Encoding::Latin1)
        }
    }
}

/// Parse decoded CSV text. The first record is the header.
pub fn parse_table(text: &str, options: LoaderOptions) -> Result<RawTable, IngestError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());

    let columns: Vec<String> = reader
        .headers()
        .map_err(|e| IngestError::Load(format!("reading header: {}", e)))?
        .iter()
        .map(str::to_string)
        .collect();

    if columns.is_empty() || columns.iter().all(|c| c.trim().is_empty()) {
        return Err(IngestError::Load("dataset has no header row".to_string()));
    }

    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        if rows.len() >= options.max_rows {
            tracing::debug!(max_rows = options.max_rows, "row cap reached");
            break;
        }

        let record = record.map_err(|e| IngestError::Load(format!("row {}: {}", idx + 1, e)))?;
        if record.len() > columns.len() {
            return Err(IngestError::Load(format!(
                "row {}: expected {} fields, saw {}",
                idx + 1,
                columns.len(),
                record.len()
            )));
        }

        let mut row: Vec<String> = record.iter().map(str::to_string).collect();
        row.resize(columns.len(), String::new());
        rows.push(row);
    }

    Ok(RawTable { columns, rows })
}
