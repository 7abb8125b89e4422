use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::storage::{self, StorageManager};

const CONFIG_FILE: &str = "config.yaml";

/// Default embedding model (multilingual, 384 dimensions)
const DEFAULT_MODEL: &str = "paraphrase-multilingual-MiniLM-L12-v2";
/// Dimensionality produced by the default model
const DEFAULT_DIMENSIONS: usize = 384;
/// Default number of texts encoded per forward pass
const DEFAULT_BATCH_SIZE: usize = 16;
/// Default model download timeout in seconds
const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 300;

const DEFAULT_TYPESENSE_HOST: &str = "localhost";
const DEFAULT_TYPESENSE_PORT: u16 = 8108;
const DEFAULT_TYPESENSE_PROTOCOL: &str = "http";
const DEFAULT_COLLECTION: &str = "products";
const DEFAULT_CONNECTION_TIMEOUT_SECS: u64 = 5;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Configuration errors are fatal: the process must not run with a
/// half-valid configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to access config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("config is malformed: {0}")]
    Malformed(#[from] serde_yml::Error),

    #[error("config file is not valid utf8")]
    NotUtf8,

    #[error("{field}: {message}")]
    Invalid { field: &'static str, message: String },

    #[error("API_KEY is not set in the environment variables")]
    MissingApiKey,
}

fn invalid(field: &'static str, message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        message: message.into(),
    }
}

/// Locations of the pipeline artifacts
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    /// Directory holding all artifacts; relative to the base path when not absolute.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_raw_csv")]
    pub raw_csv: String,

    #[serde(default = "default_cleaned_csv")]
    pub cleaned_csv: String,

    #[serde(default = "default_embeddings_json")]
    pub embeddings_json: String,

    #[serde(default = "default_embeddings_with_ids_json")]
    pub embeddings_with_ids_json: String,

    /// Replace numeric tokens with `<NUMBER>` during cleaning
    #[serde(default)]
    pub redact_numbers: bool,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            raw_csv: default_raw_csv(),
            cleaned_csv: default_cleaned_csv(),
            embeddings_json: default_embeddings_json(),
            embeddings_with_ids_json: default_embeddings_with_ids_json(),
            redact_numbers: false,
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_raw_csv() -> String {
    "products_data.csv".to_string()
}

fn default_cleaned_csv() -> String {
    "cleaned_products_data.csv".to_string()
}

fn default_embeddings_json() -> String {
    "product_embeddings.json".to_string()
}

fn default_embeddings_with_ids_json() -> String {
    "product_embeddings_with_id.json".to_string()
}

/// Configuration for the embedding model
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Model name for embeddings (e.g., "paraphrase-multilingual-MiniLM-L12-v2")
    #[serde(default = "default_model")]
    pub model: String,

    /// Vector length the model must produce; fixes the collection schema
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Display a progress bar while embedding
    #[serde(default = "default_true")]
    pub show_progress: bool,

    /// Timeout for model download in seconds
    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            dimensions: default_dimensions(),
            batch_size: default_batch_size(),
            show_progress: true,
            download_timeout_secs: default_download_timeout_secs(),
        }
    }
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_dimensions() -> usize {
    DEFAULT_DIMENSIONS
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_true() -> bool {
    true
}

fn default_download_timeout_secs() -> u64 {
    DEFAULT_DOWNLOAD_TIMEOUT_SECS
}

/// Connection parameters for the Typesense server.
///
/// The API key is never written to the config file; it comes from `API_KEY`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TypesenseConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_protocol")]
    pub protocol: String,

    #[serde(default = "default_collection")]
    pub collection: String,

    #[serde(default = "default_connection_timeout_secs")]
    pub connection_timeout_secs: u64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for TypesenseConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            protocol: default_protocol(),
            collection: default_collection(),
            connection_timeout_secs: default_connection_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            api_key: None,
        }
    }
}

impl TypesenseConfig {
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.protocol, self.host, self.port)
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// The API key, required before any request is made.
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        match self.api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(ConfigError::MissingApiKey),
        }
    }
}

fn default_host() -> String {
    DEFAULT_TYPESENSE_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_TYPESENSE_PORT
}

fn default_protocol() -> String {
    DEFAULT_TYPESENSE_PROTOCOL.to_string()
}

fn default_collection() -> String {
    DEFAULT_COLLECTION.to_string()
}

fn default_connection_timeout_secs() -> u64 {
    DEFAULT_CONNECTION_TIMEOUT_SECS
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub typesense: TypesenseConfig,

    #[serde(skip_serializing, skip_deserializing)]
    base_path: PathBuf,
}

impl Config {
    fn validate(&self) -> Result<(), ConfigError> {
        let emb = &self.embedding;
        if emb.model.trim().is_empty() {
            return Err(invalid("embedding.model", "must not be empty"));
        }
        if emb.dimensions == 0 {
            return Err(invalid("embedding.dimensions", "must be greater than 0"));
        }
        if emb.batch_size == 0 {
            return Err(invalid("embedding.batch_size", "must be greater than 0"));
        }
        if emb.download_timeout_secs == 0 {
            return Err(invalid(
                "embedding.download_timeout_secs",
                "must be greater than 0",
            ));
        }

        let ts = &self.typesense;
        if ts.protocol != "http" && ts.protocol != "https" {
            return Err(invalid(
                "typesense.protocol",
                format!("must be 'http' or 'https', got '{}'", ts.protocol),
            ));
        }
        if ts.host.trim().is_empty() {
            return Err(invalid("typesense.host", "must not be empty"));
        }
        if ts.collection.trim().is_empty() {
            return Err(invalid("typesense.collection", "must not be empty"));
        }
        if ts.connection_timeout_secs == 0 || ts.request_timeout_secs == 0 {
            return Err(invalid("typesense", "timeouts must be greater than 0"));
        }

        Ok(())
    }

    /// Apply environment overrides. `API_KEY` is only ever read from here.
    fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        self.typesense.api_key = env("API_KEY");

        if let Some(host) = env("TYPESENSE_HOST") {
            self.typesense.host = host;
        }
        if let Some(port) = env("TYPESENSE_PORT") {
            self.typesense.port = port
                .parse()
                .map_err(|_| invalid("TYPESENSE_PORT", format!("not a port number: '{port}'")))?;
        }
        if let Some(protocol) = env("TYPESENSE_PROTOCOL") {
            self.typesense.protocol = protocol;
        }
        if let Some(collection) = env("TYPESENSE_COLLECTION") {
            self.typesense.collection = collection;
        }
        if let Some(model) = env("MODEL_NAME") {
            self.embedding.model = model;
        }

        Ok(())
    }

    pub fn load_with(base_path: &Path) -> Result<Self, ConfigError> {
        Self::load_with_env(base_path, |key| std::env::var(key).ok())
    }

    fn load_with_env(
        base_path: &Path,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let store = storage::BackendLocal::new(base_path)?;

        // create new if does not exist
        if !store.exists(CONFIG_FILE) {
            store.write(CONFIG_FILE, serde_yml::to_string(&Self::default())?.as_bytes())?;
        }

        let config_str =
            String::from_utf8(store.read(CONFIG_FILE)?).map_err(|_| ConfigError::NotUtf8)?;
        let mut config: Self = serde_yml::from_str(&config_str)?;

        config.base_path = base_path.to_path_buf();
        config.apply_env(env)?;
        config.validate()?;

        Ok(config)
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn data_dir(&self) -> PathBuf {
        self.base_path.join(&self.data.data_dir)
    }

    pub fn raw_csv_path(&self) -> PathBuf {
        self.data_dir().join(&self.data.raw_csv)
    }

    pub fn cleaned_csv_path(&self) -> PathBuf {
        self.data_dir().join(&self.data.cleaned_csv)
    }

    pub fn embeddings_path(&self) -> PathBuf {
        self.data_dir().join(&self.data.embeddings_json)
    }

    pub fn embeddings_with_ids_path(&self) -> PathBuf {
        self.data_dir().join(&self.data.embeddings_with_ids_json)
    }
}
