//! In-memory vector index with cosine distance search.
//!
//! Stores documents keyed by id and answers k-nearest-neighbor queries by
//! brute force. Used for offline search over the embedding artifact.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use crate::record::{Document, SearchHit};

use super::{
    CollectionInfo, CollectionSchema, ImportResult, SchemaOutcome, StoreError, VectorStore,
};

/// One collection: documents ordered by id so that equal distances always
/// come back in the same order.
struct MemoryCollection {
    dimensions: usize,
    documents: BTreeMap<String, Document>,
}

impl MemoryCollection {
    /// Insert or replace a document.
    ///
    /// Returns an error if the embedding has the wrong length or zero norm.
    fn upsert(&mut self, document: Document) -> Result<(), String> {
        if document.embedding.len() != self.dimensions {
            return Err(format!(
                "Dimension mismatch: expected {}, got {}",
                self.dimensions,
                document.embedding.len()
            ));
        }

        if l2_norm(&document.embedding) < f32::EPSILON {
            return Err("Cannot store zero-norm vector".to_string());
        }

        self.documents.insert(document.id.clone(), document);
        Ok(())
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>, StoreError> {
        if query.len() != self.dimensions {
            return Err(StoreError::InvalidQuery(format!(
                "query has {} dimensions, collection has {}",
                query.len(),
                self.dimensions
            )));
        }

        let query_norm = l2_norm(query);
        if query_norm < f32::EPSILON {
            return Err(StoreError::InvalidQuery("zero-norm query vector".to_string()));
        }

        let mut hits: Vec<SearchHit> = self
            .documents
            .values()
            .map(|doc| SearchHit {
                document: doc.clone(),
                distance: Some(cosine_distance(query, &doc.embedding, query_norm)),
            })
            .collect();

        // Stable sort keeps id order for equal distances
        hits.sort_by(|a, b| {
            let a = a.distance.unwrap_or(f32::INFINITY);
            let b = b.distance.unwrap_or(f32::INFINITY);
            a.total_cmp(&b)
        });

        hits.truncate(k);
        Ok(hits)
    }
}

/// Compute L2 norm of a vector.
pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Cosine distance `1 - cos(a, b)`, never negative.
/// Assumes query_norm is precomputed for efficiency.
fn cosine_distance(query: &[f32], target: &[f32], query_norm: f32) -> f32 {
    let target_norm = l2_norm(target);
    if target_norm < f32::EPSILON {
        return 1.0;
    }

    let dot_product: f32 = query.iter().zip(target.iter()).map(|(a, b)| a * b).sum();
    (1.0 - dot_product / (query_norm * target_norm)).max(0.0)
}

/// Process-local `VectorStore`.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, MemoryCollection>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn internal<E: std::fmt::Display>(e: E) -> StoreError {
        StoreError::Internal(format!("Lock poisoned: {}", e))
    }
}

impl VectorStore for MemoryStore {
    fn create_collection(&self, schema: &CollectionSchema) -> Result<SchemaOutcome, StoreError> {
        let dimensions = schema.dimensions().ok_or_else(|| StoreError::Api {
            status: 400,
            message: format!("schema '{}' has no vector field", schema.name),
        })?;

        let mut collections = self.collections.write().map_err(Self::internal)?;
        if collections.contains_key(&schema.name) {
            return Ok(SchemaOutcome::AlreadyExists);
        }

        collections.insert(
            schema.name.clone(),
            MemoryCollection {
                dimensions,
                documents: BTreeMap::new(),
            },
        );
        Ok(SchemaOutcome::Created)
    }

    fn upsert_documents(
        &self,
        collection: &str,
        documents: &[Document],
    ) -> Result<Vec<ImportResult>, StoreError> {
        let mut collections = self.collections.write().map_err(Self::internal)?;
        let target = collections
            .get_mut(collection)
            .ok_or_else(|| StoreError::CollectionNotFound(collection.to_string()))?;

        Ok(documents
            .iter()
            .map(|doc| match target.upsert(doc.clone()) {
                Ok(()) => ImportResult::ok(),
                Err(e) => ImportResult::failed(e),
            })
            .collect())
    }

    fn collection_info(&self, collection: &str) -> Result<CollectionInfo, StoreError> {
        let collections = self.collections.read().map_err(Self::internal)?;
        let target = collections
            .get(collection)
            .ok_or_else(|| StoreError::CollectionNotFound(collection.to_string()))?;

        Ok(CollectionInfo {
            name: collection.to_string(),
            num_documents: target.documents.len() as u64,
        })
    }

    fn vector_search(
        &self,
        collection: &str,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<SearchHit>, StoreError> {
        let collections = self.collections.read().map_err(Self::internal)?;
        let target = collections
            .get(collection)
            .ok_or_else(|| StoreError::CollectionNotFound(collection.to_string()))?;

        target.search(query, k)
    }
}
