//! Embedding model wrapper for fastembed.
//!
//! Provides a high-level interface for generating embeddings:
//! - `Embedder` trait used by the pipeline and the search service
//! - Model download with timeout on first use
//! - Batch embedding generation with order-preserving output
//! - `SharedEmbedder`, a lazily-initialized model shared by the whole process

use fastembed::{InitOptions, TextEmbedding};
use once_cell::sync::OnceCell;
use std::path::PathBuf;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Mutex;
use std::time::Duration;

use crate::config::EmbeddingConfig;

/// Default download timeout for model files (5 minutes)
const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// Anything that turns text into fixed-length vectors.
///
/// Implementations must be deterministic and return exactly one vector of
/// `dimensions()` components per input, in input order.
pub trait Embedder: Send + Sync {
    fn dimensions(&self) -> usize;

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.embed_batch(&[text.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::EmbeddingFailed("No embedding returned".to_string()))
    }
}

/// Error type for embedding operations
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("Model initialization failed: {0}")]
    InitFailed(String),

    #[error("Embedding generation failed: {0}")]
    EmbeddingFailed(String),

    #[error("Model download timed out after {0} seconds")]
    DownloadTimeout(u64),

    #[error("Invalid model name: {0}")]
    InvalidModel(String),

    #[error("Input text at position {0} is empty")]
    EmptyInput(usize),

    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

/// Reject blank inputs before they reach a model.
pub fn check_inputs(texts: &[String]) -> Result<(), EmbeddingError> {
    match texts.iter().position(|t| t.trim().is_empty()) {
        Some(pos) => Err(EmbeddingError::EmptyInput(pos)),
        None => Ok(()),
    }
}

/// Verify a model returned one vector of the right length per input.
pub fn check_outputs(
    inputs: usize,
    dimensions: usize,
    vectors: &[Vec<f32>],
) -> Result<(), EmbeddingError> {
    if vectors.len() != inputs {
        return Err(EmbeddingError::EmbeddingFailed(format!(
            "expected {} embeddings, model returned {}",
            inputs,
            vectors.len()
        )));
    }

    match vectors.iter().find(|v| v.len() != dimensions) {
        Some(v) => Err(EmbeddingError::DimensionMismatch {
            expected: dimensions,
            got: v.len(),
        }),
        None => Ok(()),
    }
}

/// Wrapper around fastembed's TextEmbedding model.
/// Uses a Mutex because fastembed's embed() requires &mut self.
pub struct EmbeddingModel {
    model: Mutex<TextEmbedding>,
    model_name: String,
    dimensions: usize,
    batch_size: usize,
}

impl EmbeddingModel {
    /// Create a new embedding model with the given name.
    ///
    /// The model will be downloaded on first use if not cached.
    /// Models are cached in the `models/` subdirectory of `cache_dir`.
    ///
    /// # Arguments
    /// * `model_name` - Name of the model (e.g., "paraphrase-multilingual-MiniLM-L12-v2")
    /// * `cache_dir` - Directory to cache downloaded models
    /// * `batch_size` - Number of texts the model encodes per forward pass
    /// * `download_timeout` - Optional timeout for model download
    pub fn new(
        model_name: &str,
        cache_dir: PathBuf,
        batch_size: usize,
        download_timeout: Option<Duration>,
    ) -> Result<Self, EmbeddingError> {
        let model_enum = Self::parse_model_name(model_name)?;
        let timeout = download_timeout.unwrap_or(DEFAULT_DOWNLOAD_TIMEOUT);

        // Ensure cache directory exists
        let models_dir = cache_dir.join("models");
        std::fs::create_dir_all(&models_dir).map_err(|e| {
            EmbeddingError::InitFailed(format!("Failed to create models directory: {}", e))
        })?;

        let options = InitOptions::new(model_enum)
            .with_cache_dir(models_dir)
            .with_show_download_progress(true);

        // Loading may download the model; the loader thread is abandoned on timeout.
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let _ = tx.send(TextEmbedding::try_new(options));
        });

        let mut model = match rx.recv_timeout(timeout) {
            Ok(result) => result.map_err(|e| EmbeddingError::InitFailed(e.to_string()))?,
            Err(RecvTimeoutError::Timeout) => {
                return Err(EmbeddingError::DownloadTimeout(timeout.as_secs()))
            }
            Err(RecvTimeoutError::Disconnected) => {
                return Err(EmbeddingError::InitFailed(
                    "Model loader thread exited unexpectedly".to_string(),
                ))
            }
        };

        // Get model dimensions by embedding a test string
        let dimensions = Self::probe_dimensions(&mut model)?;

        Ok(Self {
            model: Mutex::new(model),
            model_name: model_name.to_string(),
            dimensions,
            batch_size: batch_size.max(1),
        })
    }

    /// Get the model name
    pub fn name(&self) -> &str {
        &self.model_name
    }

    /// Parse model name string to fastembed enum.
    fn parse_model_name(
        name: &str,
    ) -> Result<fastembed::EmbeddingModel, EmbeddingError> {
        let short = name
            .strip_prefix("sentence-transformers/")
            .unwrap_or(name)
            .to_lowercase();

        match short.as_str() {
            "paraphrase-multilingual-minilm-l12-v2" | "paraphrasemlminilml12v2" => {
                Ok(fastembed::EmbeddingModel::ParaphraseMLMiniLML12V2)
            }
            "paraphrase-multilingual-minilm-l12-v2-q" | "paraphrasemlminilml12v2q" => {
                Ok(fastembed::EmbeddingModel::ParaphraseMLMiniLML12V2Q)
            }
            "paraphrase-multilingual-mpnet-base-v2" | "paraphrasemlmpnetbasev2" => {
                Ok(fastembed::EmbeddingModel::ParaphraseMLMpnetBaseV2)
            }
            "all-minilm-l6-v2" | "allminiml6v2" => {
                Ok(fastembed::EmbeddingModel::AllMiniLML6V2)
            }
            "bge-small-en-v1.5" | "bgesmallenv15" => {
                Ok(fastembed::EmbeddingModel::BGESmallENV15)
            }
            "bge-base-en-v1.5" | "bgebaseenv15" => {
                Ok(fastembed::EmbeddingModel::BGEBaseENV15)
            }
            _ => Err(EmbeddingError::InvalidModel(format!(
                "Unknown model: {}. Supported models: paraphrase-multilingual-MiniLM-L12-v2 (add -q suffix for quantized), paraphrase-multilingual-mpnet-base-v2, all-MiniLM-L6-v2, bge-small-en-v1.5, bge-base-en-v1.5",
                name
            ))),
        }
    }

    /// Probe the model to determine embedding dimensions.
    fn probe_dimensions(model: &mut TextEmbedding) -> Result<usize, EmbeddingError> {
        let test_embeddings = model
            .embed(vec!["test"], None)
            .map_err(|e| EmbeddingError::InitFailed(format!("Failed to probe dimensions: {}", e)))?;

        test_embeddings
            .first()
            .map(|v| v.len())
            .ok_or_else(|| EmbeddingError::InitFailed("Model returned no embedding".to_string()))
    }
}

impl Embedder for EmbeddingModel {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        check_inputs(texts)?;

        let mut model = self.model.lock().map_err(|e| {
            EmbeddingError::EmbeddingFailed(format!("Failed to acquire model lock: {}", e))
        })?;

        let vectors = model
            .embed(texts.to_vec(), Some(self.batch_size))
            .map_err(|e| EmbeddingError::EmbeddingFailed(e.to_string()))?;

        check_outputs(texts.len(), self.dimensions, &vectors)?;
        Ok(vectors)
    }
}

/// Process-wide embedding service.
///
/// The model is materialized on first use (this may download a few hundred
/// megabytes and takes seconds even when cached) and reused afterwards.
/// Concurrent first callers block until the single initialization finishes.
pub struct SharedEmbedder {
    config: EmbeddingConfig,
    cache_dir: PathBuf,
    model: OnceCell<EmbeddingModel>,
}

impl SharedEmbedder {
    pub fn new(config: EmbeddingConfig, cache_dir: PathBuf) -> Self {
        Self {
            config,
            cache_dir,
            model: OnceCell::new(),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.model.get().is_some()
    }

    /// Get the model, loading it if this is the first call.
    pub fn model(&self) -> Result<&EmbeddingModel, EmbeddingError> {
        self.model.get_or_try_init(|| {
            log::info!("Loading embedding model '{}'", self.config.model);

            let model = EmbeddingModel::new(
                &self.config.model,
                self.cache_dir.clone(),
                self.config.batch_size,
                Some(Duration::from_secs(self.config.download_timeout_secs)),
            )?;

            if model.dimensions() != self.config.dimensions {
                return Err(EmbeddingError::DimensionMismatch {
                    expected: self.config.dimensions,
                    got: model.dimensions(),
                });
            }

            log::info!(
                "Embedding model '{}' loaded ({} dimensions)",
                model.name(),
                model.dimensions()
            );
            Ok(model)
        })
    }
}

impl Embedder for SharedEmbedder {
    fn dimensions(&self) -> usize {
        self.config.dimensions
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.model()?.embed_batch(texts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(model: &str) -> EmbeddingConfig {
        EmbeddingConfig {
            model: model.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_invalid_model_name() {
        let temp_dir = tempfile::tempdir().unwrap();
        let result = EmbeddingModel::new("nonexistent-model", temp_dir.path().to_path_buf(), 16, None);
        assert!(matches!(result, Err(EmbeddingError::InvalidModel(_))));
    }

    #[test]
    fn test_model_name_accepts_hub_prefix() {
        let parsed =
            EmbeddingModel::parse_model_name("sentence-transformers/paraphrase-multilingual-MiniLM-L12-v2");
        assert!(matches!(
            parsed,
            Ok(fastembed::EmbeddingModel::ParaphraseMLMiniLML12V2)
        ));
    }

    #[test]
    fn test_check_inputs_rejects_blank() {
        let texts = vec!["ok".to_string(), "   ".to_string()];
        assert!(matches!(check_inputs(&texts), Err(EmbeddingError::EmptyInput(1))));
        assert!(check_inputs(&["fine".to_string()]).is_ok());
    }

    #[test]
    fn test_check_outputs() {
        let vectors = vec![vec![0.0; 4], vec![0.0; 4]];
        assert!(check_outputs(2, 4, &vectors).is_ok());
        assert!(matches!(
            check_outputs(2, 3, &vectors),
            Err(EmbeddingError::DimensionMismatch { expected: 3, got: 4 })
        ));
        assert!(matches!(
            check_outputs(3, 4, &vectors),
            Err(EmbeddingError::EmbeddingFailed(_))
        ));
    }

    #[test]
    fn test_shared_embedder_is_lazy() {
        let temp_dir = tempfile::tempdir().unwrap();
        let embedder = SharedEmbedder::new(test_config("nonexistent-model"), temp_dir.path().to_path_buf());

        assert!(!embedder.is_loaded());
        assert_eq!(embedder.dimensions(), 384);

        let result = embedder.embed("anything");
        assert!(matches!(result, Err(EmbeddingError::InvalidModel(_))));
        assert!(!embedder.is_loaded());
    }

    // Integration tests require model download - run with --ignored
    #[test]
    #[ignore = "requires model download"]
    fn test_shared_embedder_dimensions_across_batch_sizes() {
        let temp_dir = tempfile::tempdir().unwrap();
        let embedder = SharedEmbedder::new(EmbeddingConfig::default(), temp_dir.path().to_path_buf());

        for size in [1usize, 16, 1000] {
            let texts: Vec<String> = (0..size).map(|i| format!("product number {i}")).collect();
            let vectors = embedder.embed_batch(&texts).unwrap();
            assert_eq!(vectors.len(), size);
            assert!(vectors.iter().all(|v| v.len() == 384));
        }
        assert!(embedder.is_loaded());
    }

    #[test]
    #[ignore = "requires model download"]
    fn test_embedding_is_deterministic() {
        let temp_dir = tempfile::tempdir().unwrap();
        let embedder = SharedEmbedder::new(EmbeddingConfig::default(), temp_dir.path().to_path_buf());

        let a = embedder.embed("پرینتر سه بعدی رزینی").unwrap();
        let b = embedder.embed("پرینتر سه بعدی رزینی").unwrap();
        assert_eq!(a, b);
    }
}
