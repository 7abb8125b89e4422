//! Semantic search over product records.
//!
//! # Architecture
//!
//! - `preprocess`: Cleans raw records into canonical ones
//! - `embeddings`: Wraps fastembed for embedding generation
//! - `indexer`: Collection schema and bulk upserts
//! - `service`: Query embedding and nearest-neighbor lookup
//! - `ranking`: Result ordering and display projection
//! - `diagnostics`: Offline similarity checks over embeddings

pub mod diagnostics;
pub mod embeddings;
pub mod indexer;
pub mod preprocess;
pub mod ranking;
mod service;

pub use embeddings::{Embedder, EmbeddingError, EmbeddingModel, SharedEmbedder};
pub use indexer::{Indexer, IndexerError, UpsertReport};
pub use preprocess::{normalize_records, CleanOptions, NormalizeOutcome};
pub use service::{SemanticSearchError, SemanticSearchService, DEFAULT_K};

