//! Reading and writing the on-disk pipeline artifacts.
//!
//! CSV files carry `Title,Description,URL`; embedding files are
//! pretty-printed JSON arrays. Every write goes through a temp file and a
//! rename.

use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::record::{CanonicalRecord, EmbeddedRecord, RawRecord};
use crate::storage;

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("artifact not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("json error in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("missing required column: {0}")]
    MissingColumn(&'static str),
}

impl ArtifactError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            return ArtifactError::NotFound(path.to_path_buf());
        }
        ArtifactError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    fn json(path: &Path, source: serde_json::Error) -> Self {
        ArtifactError::Json {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Header names every catalog CSV must carry.
pub const REQUIRED_COLUMNS: [&str; 3] = ["Title", "Description", "URL"];

/// Rows parsed from a CSV file and how many were skipped as malformed.
#[derive(Debug)]
pub struct CsvRows<T> {
    pub rows: Vec<T>,
    pub skipped: usize,
}

fn read_csv<T: DeserializeOwned>(path: &Path) -> Result<CsvRows<T>, ArtifactError> {
    let data = std::fs::read(path).map_err(|e| ArtifactError::io(path, e))?;

    let now = Instant::now();
    let mut reader = csv::Reader::from_reader(data.as_slice());
    check_columns(reader.headers()?)?;

    let mut rows = vec![];
    let mut skipped = 0;
    for (line, row) in reader.deserialize::<T>().enumerate() {
        match row {
            Ok(row) => rows.push(row),
            Err(err) => {
                // header is line 1
                log::warn!("skipping malformed row {} in {}: {err}", line + 2, path.display());
                skipped += 1;
            }
        }
    }

    log::debug!(
        "took {}ms to read {}",
        now.elapsed().as_micros() as f64 / 1000.0,
        path.display()
    );

    Ok(CsvRows { rows, skipped })
}

fn check_columns(headers: &csv::StringRecord) -> Result<(), ArtifactError> {
    for column in REQUIRED_COLUMNS {
        let present = headers
            .iter()
            .any(|h| h.trim_start_matches('\u{feff}').trim() == column);
        if !present {
            return Err(ArtifactError::MissingColumn(column));
        }
    }
    Ok(())
}

fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), ArtifactError> {
    let mut writer = csv::Writer::from_writer(vec![]);
    for row in rows {
        writer.serialize(row)?;
    }
    let data = writer
        .into_inner()
        .map_err(|e| ArtifactError::io(path, e.into_error()))?;

    storage::write_file(path, &data).map_err(|e| ArtifactError::io(path, e))
}

/// Read the raw catalog. Empty cells become `None`; a missing column is an error.
pub fn read_raw_csv(path: &Path) -> Result<CsvRows<RawRecord>, ArtifactError> {
    read_csv(path)
}

pub fn write_canonical_csv(path: &Path, records: &[CanonicalRecord]) -> Result<(), ArtifactError> {
    write_csv(path, records)
}

pub fn read_canonical_csv(path: &Path) -> Result<CsvRows<CanonicalRecord>, ArtifactError> {
    read_csv(path)
}

pub fn write_embeddings(path: &Path, records: &[EmbeddedRecord]) -> Result<(), ArtifactError> {
    let data = serde_json::to_vec_pretty(records).map_err(|e| ArtifactError::json(path, e))?;
    storage::write_file(path, &data).map_err(|e| ArtifactError::io(path, e))
}

/// Read an embeddings file that must be valid as a whole.
pub fn read_embeddings(path: &Path) -> Result<Vec<EmbeddedRecord>, ArtifactError> {
    let data = std::fs::read(path).map_err(|e| ArtifactError::io(path, e))?;
    serde_json::from_slice(&data).map_err(|e| ArtifactError::json(path, e))
}

/// Elements of an embeddings file, decoded one at a time.
///
/// Both lists keep the element's position in the file.
#[derive(Debug, Default)]
pub struct EmbeddingEntries {
    pub records: Vec<(usize, EmbeddedRecord)>,
    pub rejected: Vec<(usize, String)>,
}

/// Read an embeddings file, keeping every element that decodes.
///
/// Only a file that is not a JSON array is an error.
pub fn read_embedding_entries(path: &Path) -> Result<EmbeddingEntries, ArtifactError> {
    let data = std::fs::read(path).map_err(|e| ArtifactError::io(path, e))?;
    let values: Vec<serde_json::Value> =
        serde_json::from_slice(&data).map_err(|e| ArtifactError::json(path, e))?;

    let mut entries = EmbeddingEntries::default();
    for (idx, value) in values.into_iter().enumerate() {
        match serde_json::from_value::<EmbeddedRecord>(value) {
            Ok(record) => entries.records.push((idx, record)),
            Err(err) => {
                log::warn!("invalid record {idx} in {}: {err}", path.display());
                entries.rejected.push((idx, err.to_string()));
            }
        }
    }
    Ok(entries)
}
