use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use homedir::my_home;

use crate::config::Config;
use crate::pipeline;
use crate::semantic::indexer::Indexer;
use crate::semantic::{SemanticSearchService, SharedEmbedder};
use crate::store::{MemoryStore, TypesenseClient, VectorStore};

/// Builds the services a command needs from configuration
pub struct AppFactory;

impl AppFactory {
    /// Load configuration from the base directory, creating it if needed
    pub fn create_config() -> Result<Config> {
        let base_path = Self::get_base_path()?;
        std::fs::create_dir_all(&base_path)
            .context("Failed to create application base directory")?;

        Config::load_with(&base_path).context("Failed to load configuration")
    }

    /// The embedding model, loaded lazily on first use.
    /// Model files are cached under the base directory.
    pub fn create_embedder(config: &Config) -> Arc<SharedEmbedder> {
        Arc::new(SharedEmbedder::new(
            config.embedding.clone(),
            config.base_path().to_path_buf(),
        ))
    }

    /// Connect to Typesense. Fails when the API key is missing or the
    /// server does not answer its health check.
    pub fn create_store(config: &Config) -> Result<Arc<dyn VectorStore>> {
        let client = TypesenseClient::connect(&config.typesense)
            .context("Failed to connect to Typesense")?;
        Ok(Arc::new(client))
    }

    /// An in-memory index filled from the embedding artifact.
    ///
    /// Prefers the file with ids so that ids match the ones imported into
    /// Typesense.
    pub fn create_offline_store(config: &Config) -> Result<Arc<dyn VectorStore>> {
        let with_ids = config.embeddings_with_ids_path();
        let path = if with_ids.exists() {
            with_ids
        } else {
            config.embeddings_path()
        };

        let store = Arc::new(MemoryStore::new());
        Self::fill_store(store.clone(), config, &path)?;
        Ok(store)
    }

    fn fill_store(store: Arc<MemoryStore>, config: &Config, path: &Path) -> Result<()> {
        let loaded = pipeline::load_indexable(path)
            .with_context(|| format!("Failed to load embeddings from {}", path.display()))?;

        let indexer = Self::create_indexer(config, store);
        indexer.ensure_schema()?;
        let report = indexer.upsert(&loaded.records)?;
        log::info!(
            "Loaded {} of {} records into the offline index",
            report.succeeded(),
            loaded.records.len() + loaded.rejected.len()
        );
        Ok(())
    }

    pub fn create_indexer(config: &Config, store: Arc<dyn VectorStore>) -> Indexer {
        Indexer::new(
            store,
            &config.typesense.collection,
            config.embedding.dimensions,
        )
    }

    /// Search service over Typesense, or over the local artifact when `offline`
    pub fn create_search_service(config: &Config, offline: bool) -> Result<SemanticSearchService> {
        let store = if offline {
            Self::create_offline_store(config)?
        } else {
            Self::create_store(config)?
        };

        Ok(SemanticSearchService::new(
            Self::create_embedder(config),
            store,
            config.typesense.collection.clone(),
        ))
    }

    /// Get the base path for the application
    fn get_base_path() -> Result<PathBuf> {
        if let Ok(base_path) = std::env::var("SEMSEARCH_BASE_PATH") {
            return Ok(PathBuf::from(base_path));
        }

        let home = my_home()
            .ok()
            .flatten()
            .context("Could not determine home directory")?;
        Ok(home.join(".local/share/semsearch"))
    }
}
