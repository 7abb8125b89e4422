//! Collection schema and idempotent document upserts.
//!
//! Records are validated one by one before they reach the store, so a bad
//! record only fails itself. Store transport errors abort the whole call.

use std::sync::Arc;

use crate::record::EmbeddedRecord;
use crate::store::{CollectionSchema, FieldSpec, SchemaOutcome, StoreError, VectorStore, VECTOR_FIELD};

#[derive(Debug, thiserror::Error)]
pub enum IndexerError {
    #[error("index store error: {0}")]
    Store(#[from] StoreError),

    #[error("store returned {received} results for {sent} documents")]
    ResultCountMismatch { sent: usize, received: usize },
}

/// The product collection layout for vectors of `dimensions` components.
pub fn product_schema(name: &str, dimensions: usize) -> CollectionSchema {
    CollectionSchema {
        name: name.to_string(),
        fields: vec![
            FieldSpec::string("Title"),
            FieldSpec::string("Description"),
            FieldSpec::string("URL"),
            FieldSpec::string("combined_text"),
            FieldSpec::vector(VECTOR_FIELD, dimensions),
        ],
    }
}

/// Give every record without an id its position, as paired by the caller.
/// For a whole batch that is `records.iter_mut().enumerate()`.
///
/// Existing ids are never overwritten, so running this twice is a no-op.
pub fn assign_ids<'a, I>(records: I)
where
    I: IntoIterator<Item = (usize, &'a mut EmbeddedRecord)>,
{
    for (position, record) in records {
        if record.id.is_none() {
            record.id = Some(position.to_string());
        }
    }
}

/// Result of upserting one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub id: String,
    pub error: Option<String>,
}

impl UpsertOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Per-record results of a bulk upsert, in input order.
#[derive(Debug, Clone, Default)]
pub struct UpsertReport {
    pub outcomes: Vec<UpsertOutcome>,
}

impl UpsertReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn failures(&self) -> impl Iterator<Item = &UpsertOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }
}

/// Owns one collection's schema and writes documents into it.
pub struct Indexer {
    store: Arc<dyn VectorStore>,
    schema: CollectionSchema,
    dimensions: usize,
}

impl Indexer {
    pub fn new(store: Arc<dyn VectorStore>, collection: &str, dimensions: usize) -> Self {
        Self {
            store,
            schema: product_schema(collection, dimensions),
            dimensions,
        }
    }

    pub fn schema(&self) -> &CollectionSchema {
        &self.schema
    }

    /// Create the collection unless it already exists.
    pub fn ensure_schema(&self) -> Result<SchemaOutcome, IndexerError> {
        let outcome = self.store.create_collection(&self.schema)?;
        match outcome {
            SchemaOutcome::Created => {
                log::info!("Collection '{}' created successfully", self.schema.name)
            }
            SchemaOutcome::AlreadyExists => {
                log::warn!("Collection '{}' already exists", self.schema.name)
            }
        }
        Ok(outcome)
    }

    /// Insert or replace every valid record, keyed by id.
    pub fn upsert(&self, records: &[EmbeddedRecord]) -> Result<UpsertReport, IndexerError> {
        let mut outcomes = Vec::with_capacity(records.len());
        let mut documents = Vec::new();
        let mut positions = Vec::new();

        for (idx, record) in records.iter().enumerate() {
            match self.validate(record) {
                Ok(()) => {
                    // validate() guarantees an id
                    if let Some(doc) = record.to_document() {
                        positions.push(outcomes.len());
                        documents.push(doc);
                    }
                    outcomes.push(UpsertOutcome {
                        id: record.id.clone().unwrap_or_default(),
                        error: None,
                    });
                }
                Err(reason) => outcomes.push(UpsertOutcome {
                    id: record.id.clone().unwrap_or_else(|| format!("#{idx}")),
                    error: Some(reason),
                }),
            }
        }

        let results = self
            .store
            .upsert_documents(&self.schema.name, &documents)?;

        if results.len() != documents.len() {
            return Err(IndexerError::ResultCountMismatch {
                sent: documents.len(),
                received: results.len(),
            });
        }

        for (pos, result) in positions.into_iter().zip(results) {
            if !result.success {
                outcomes[pos].error = Some(
                    result
                        .error
                        .unwrap_or_else(|| "rejected by index".to_string()),
                );
            }
        }

        let report = UpsertReport { outcomes };
        for failure in report.failures() {
            log::error!(
                "Failed to import document {}: {}",
                failure.id,
                failure.error.as_deref().unwrap_or_default()
            );
        }
        log::info!(
            "Bulk import completed: {} succeeded, {} failed",
            report.succeeded(),
            report.failed()
        );

        Ok(report)
    }

    /// Number of documents currently in the collection.
    pub fn count(&self) -> Result<u64, IndexerError> {
        let info = self.store.collection_info(&self.schema.name)?;
        log::info!(
            "Number of documents in '{}' collection: {}",
            info.name,
            info.num_documents
        );
        Ok(info.num_documents)
    }

    fn validate(&self, record: &EmbeddedRecord) -> Result<(), String> {
        if record.id.as_deref().map_or(true, |id| id.trim().is_empty()) {
            return Err("missing id".to_string());
        }
        if record.embedding.len() != self.dimensions {
            return Err(format!(
                "embedding has {} dimensions, expected {}",
                record.embedding.len(),
                self.dimensions
            ));
        }
        if record.combined_text.trim().is_empty() {
            return Err("combined_text is empty".to_string());
        }
        Ok(())
    }
}
