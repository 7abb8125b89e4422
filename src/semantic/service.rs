//! Semantic search service for product queries.
//!
//! Provides a high-level interface for semantic search operations:
//! - Validates the query before any model or network work
//! - Embeds the query with the same model used for the catalog
//! - Runs one nearest-neighbor query against the configured collection
//! - Turns every failure into an empty result, logging the cause

use std::sync::Arc;

use crate::record::SearchHit;
use crate::semantic::embeddings::{Embedder, EmbeddingError};
use crate::semantic::ranking;
use crate::store::{StoreError, VectorStore};

/// Default number of neighbors to return
pub const DEFAULT_K: usize = 10;

/// Errors that can occur during semantic search operations.
#[derive(Debug, thiserror::Error)]
pub enum SemanticSearchError {
    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Index error: {0}")]
    Store(#[from] StoreError),
}

/// Service for performing semantic search over one collection.
///
/// Holds no per-query state, so it can be shared across threads.
pub struct SemanticSearchService {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    collection: String,
}

impl SemanticSearchService {
    /// Create a new semantic search service.
    ///
    /// # Arguments
    /// * `embedder` - Model shared with the ingestion pipeline
    /// * `store` - Index to query
    /// * `collection` - Collection name inside the index
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            embedder,
            store,
            collection: collection.into(),
        }
    }

    /// Search for the `k` products closest to `query`.
    ///
    /// Returns an empty list for a blank query (without touching the model or
    /// the index) and for any embedding or index failure.
    pub fn search(&self, query: &str, k: usize) -> Vec<SearchHit> {
        if query.trim().is_empty() {
            log::warn!("Empty search query provided");
            return vec![];
        }
        if k == 0 {
            log::warn!("Search requested zero results");
            return vec![];
        }

        match self.try_search(query, k) {
            Ok(hits) => hits,
            Err(e) => {
                log::error!("Error during search operation");
                log::debug!("Detailed error: {e}");
                vec![]
            }
        }
    }

    /// Same as `search()` but ordered by ascending distance.
    pub fn search_ranked(&self, query: &str, k: usize) -> Vec<SearchHit> {
        ranking::rank(self.search(query, k))
    }

    fn try_search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>, SemanticSearchError> {
        let query_embedding = self.embedder.embed(query)?;
        if query_embedding.len() != self.embedder.dimensions() {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.embedder.dimensions(),
                got: query_embedding.len(),
            }
            .into());
        }

        let hits = self
            .store
            .vector_search(&self.collection, &query_embedding, k)?;
        log::debug!("search returned {} hits", hits.len());

        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Document;
    use crate::store::{CollectionInfo, CollectionSchema, ImportResult, SchemaOutcome};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Embedder that counts calls and returns a fixed vector.
    struct CountingEmbedder {
        calls: AtomicUsize,
        fail: bool,
    }

    impl Embedder for CountingEmbedder {
        fn dimensions(&self) -> usize {
            2
        }

        fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(EmbeddingError::EmbeddingFailed("boom".to_string()));
            }
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }
    }

    /// Store that counts searches and optionally fails them.
    struct CountingStore {
        searches: AtomicUsize,
        fail: bool,
    }

    impl VectorStore for CountingStore {
        fn create_collection(&self, _: &CollectionSchema) -> Result<SchemaOutcome, StoreError> {
            Ok(SchemaOutcome::Created)
        }

        fn upsert_documents(&self, _: &str, docs: &[Document]) -> Result<Vec<ImportResult>, StoreError> {
            Ok(docs.iter().map(|_| ImportResult::ok()).collect())
        }

        fn collection_info(&self, collection: &str) -> Result<CollectionInfo, StoreError> {
            Ok(CollectionInfo {
                name: collection.to_string(),
                num_documents: 0,
            })
        }

        fn vector_search(&self, _: &str, _: &[f32], _: usize) -> Result<Vec<SearchHit>, StoreError> {
            self.searches.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(StoreError::Unhealthy);
            }
            Ok(vec![
                hit("far", Some(0.8)),
                hit("near", Some(0.1)),
            ])
        }
    }

    fn hit(id: &str, distance: Option<f32>) -> SearchHit {
        SearchHit {
            document: Document {
                id: id.to_string(),
                title: id.to_string(),
                description: String::new(),
                url: String::new(),
                combined_text: id.to_string(),
                embedding: vec![],
            },
            distance,
        }
    }

    fn service(
        embed_fails: bool,
        store_fails: bool,
    ) -> (SemanticSearchService, Arc<CountingEmbedder>, Arc<CountingStore>) {
        let embedder = Arc::new(CountingEmbedder {
            calls: AtomicUsize::new(0),
            fail: embed_fails,
        });
        let store = Arc::new(CountingStore {
            searches: AtomicUsize::new(0),
            fail: store_fails,
        });
        let service = SemanticSearchService::new(embedder.clone(), store.clone(), "products");
        (service, embedder, store)
    }

    #[test]
    fn test_blank_query_touches_nothing() {
        let (service, embedder, store) = service(false, false);

        assert!(service.search("", 10).is_empty());
        assert!(service.search("   ", 10).is_empty());
        assert!(service.search("\t\n", 10).is_empty());

        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.searches.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_zero_k_returns_empty() {
        let (service, _, store) = service(false, false);
        assert!(service.search("printer", 0).is_empty());
        assert_eq!(store.searches.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_search_returns_raw_hits() {
        let (service, embedder, store) = service(false, false);
        let hits = service.search("printer", 10);

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].document.id, "far");
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.searches.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_search_ranked_orders_hits() {
        let (service, _, _) = service(false, false);
        let hits = service.search_ranked("printer", 10);
        assert_eq!(hits[0].document.id, "near");
        assert_eq!(hits[1].document.id, "far");
    }

    #[test]
    fn test_embedding_failure_yields_empty() {
        let (service, _, store) = service(true, false);
        assert!(service.search("printer", 10).is_empty());
        assert_eq!(store.searches.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_store_failure_yields_empty() {
        let (service, _, store) = service(false, true);
        assert!(service.search("printer", 10).is_empty());
        assert_eq!(store.searches.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_service_is_shareable_across_threads() {
        let (service, embedder, _) = service(false, false);
        let service = Arc::new(service);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let service = service.clone();
                std::thread::spawn(move || service.search("printer", 5).len())
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), 2);
        }
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 4);
    }
}
