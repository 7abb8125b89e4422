//! Vector index backends.
//!
//! - `typesense`: HTTP client for a Typesense server
//! - `memory`: in-process index used for offline search over the embedding artifact

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::record::{Document, SearchHit};

pub mod memory;
pub mod typesense;

pub use memory::MemoryStore;
pub use typesense::TypesenseClient;

/// Name of the vector field in every collection.
pub const VECTOR_FIELD: &str = "embedding";

/// One field of a collection schema, in Typesense's wire shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_dim: Option<usize>,
}

impl FieldSpec {
    pub fn string(name: &str) -> Self {
        Self {
            name: name.to_string(),
            field_type: "string".to_string(),
            num_dim: None,
        }
    }

    pub fn vector(name: &str, dimensions: usize) -> Self {
        Self {
            name: name.to_string(),
            field_type: "float[]".to_string(),
            num_dim: Some(dimensions),
        }
    }
}

/// Collection layout. Fixed at creation; a different dimensionality needs a
/// new collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSchema {
    pub name: String,
    pub fields: Vec<FieldSpec>,
}

impl CollectionSchema {
    /// Dimensionality of the vector field, if the schema has one.
    pub fn dimensions(&self) -> Option<usize> {
        self.fields
            .iter()
            .find(|f| f.name == VECTOR_FIELD)
            .and_then(|f| f.num_dim)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaOutcome {
    Created,
    AlreadyExists,
}

/// Per-document result of a bulk upsert, in request order.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ImportResult {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}

impl ImportResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CollectionInfo {
    pub name: String,
    #[serde(default)]
    pub num_documents: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("server returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("collection '{0}' not found")]
    CollectionNotFound(String),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error("server is not healthy")]
    Unhealthy,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("internal error: {0}")]
    Internal(String),
}

/// The operations the pipeline and search service need from an index.
pub trait VectorStore: Send + Sync {
    /// Create a collection. An existing collection is reported, not an error.
    fn create_collection(&self, schema: &CollectionSchema) -> Result<SchemaOutcome, StoreError>;

    /// Insert or replace documents by id. Returns one result per document.
    fn upsert_documents(
        &self,
        collection: &str,
        documents: &[Document],
    ) -> Result<Vec<ImportResult>, StoreError>;

    fn collection_info(&self, collection: &str) -> Result<CollectionInfo, StoreError>;

    /// The `k` nearest documents to `query` over the vector field.
    fn vector_search(
        &self,
        collection: &str,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<SearchHit>, StoreError>;
}
