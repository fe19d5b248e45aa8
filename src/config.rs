use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Catalog and config format version.
pub const FORMAT_VERSION: &str = "1.0";

const DEFAULT_LLM_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_LLM_MODEL: &str = "claude-sonnet-4-5-20250929";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// LLM collaborator settings. Accepted under the legacy `oauth` key for
/// stores written by older versions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_llm_model")]
    pub model: String,
    /// Route requests through the local `claude` CLI instead of the HTTP API.
    #[serde(default)]
    pub use_cli: bool,
    /// Store-root-relative file holding a bearer token.
    #[serde(default = "default_token_file")]
    pub token_file: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            api_key: None,
            model: default_llm_model(),
            use_cli: false,
            token_file: default_token_file(),
        }
    }
}

/// Embedding backend used for the cross-document vector index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedderKind {
    OpenAI,
    Ollama,
    Mock,
}

/// Embedding model settings. The dimension is fixed for the lifetime of a
/// store; changing it requires a full index rebuild.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedder_kind")]
    pub provider: EmbedderKind,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_embedding_dimensions")]
    pub dimensions: usize,
    /// Override endpoint for OpenAI-compatible servers; Ollama host for ollama.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_embedding_batch_size")]
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedder_kind(),
            model: default_embedding_model(),
            dimensions: default_embedding_dimensions(),
            endpoint: None,
            api_key: None,
            batch_size: default_embedding_batch_size(),
        }
    }
}

/// Ingest pipeline settings and store sub-directory names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestSettings {
    #[serde(default = "default_max_sample_tokens")]
    pub max_sample_tokens: usize,
    #[serde(default = "default_max_pages_sample")]
    pub max_pages_sample: usize,
    #[serde(default = "default_inbox_dir")]
    pub inbox_dir: String,
    #[serde(default = "default_converted_dir")]
    pub converted_dir: String,
    #[serde(default = "default_tree_index_dir")]
    pub tree_index_dir: String,
    #[serde(default = "default_vector_store_dir")]
    pub vector_store_dir: String,
    #[serde(default = "default_catalog_file")]
    pub catalog_file: String,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            max_sample_tokens: default_max_sample_tokens(),
            max_pages_sample: default_max_pages_sample(),
            inbox_dir: default_inbox_dir(),
            converted_dir: default_converted_dir(),
            tree_index_dir: default_tree_index_dir(),
            vector_store_dir: default_vector_store_dir(),
            catalog_file: default_catalog_file(),
        }
    }
}

/// Full configuration for a metahub store, persisted as `config.json` at
/// the store root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_store_path")]
    pub store_path: String,
    #[serde(default, alias = "oauth")]
    pub llm: LlmConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub ingest: IngestSettings,
    #[serde(default = "default_version")]
    pub version: String,

    /// Resolved absolute store root. Set at load time, never serialized.
    #[serde(skip)]
    root: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
            llm: LlmConfig::default(),
            embedding: EmbeddingConfig::default(),
            ingest: IngestSettings::default(),
            version: default_version(),
            root: PathBuf::from("."),
        }
    }
}

impl Config {
    /// Load configuration for a store rooted at `root`.
    ///
    /// Reads `<root>/config.json` when present, otherwise uses defaults.
    /// A `.env` file at the store root is loaded first so per-store
    /// secrets (e.g. `METAHUB_API_KEY`) can live next to the data.
    pub fn load(root: &Path) -> Result<Self> {
        let _ = dotenvy::from_path(root.join(".env"));

        let config_path = root.join("config.json");
        let mut config: Config = if config_path.is_file() {
            let text = std::fs::read_to_string(&config_path)?;
            serde_json::from_str(&text).map_err(|e| {
                Error::Config(format!("invalid config.json at {}: {e}", config_path.display()))
            })?
        } else {
            Config::default()
        };

        config.root = root.to_path_buf();
        config.validate()?;
        Ok(config)
    }

    /// Construct an in-memory configuration rooted at `root` without
    /// touching the filesystem. Useful for tests.
    pub fn for_root(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            ..Default::default()
        }
    }

    /// Persist this configuration as `<root>/config.json`.
    pub fn save(&self) -> Result<()> {
        crate::store::write_json_atomic(&self.config_path(), self)
    }

    /// Validate constraint invariants on the loaded config.
    fn validate(&self) -> Result<()> {
        if self.embedding.dimensions == 0 {
            return Err(Error::Config("embedding.dimensions must be > 0".into()));
        }
        if self.embedding.batch_size == 0 {
            return Err(Error::Config("embedding.batch_size must be > 0".into()));
        }
        for (name, value) in [
            ("inbox_dir", &self.ingest.inbox_dir),
            ("converted_dir", &self.ingest.converted_dir),
            ("tree_index_dir", &self.ingest.tree_index_dir),
            ("vector_store_dir", &self.ingest.vector_store_dir),
            ("catalog_file", &self.ingest.catalog_file),
        ] {
            if value.trim().is_empty() {
                return Err(Error::Config(format!("ingest.{name} must not be empty")));
            }
        }
        Ok(())
    }

    /// Absolute store root directory.
    pub fn store_root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join("config.json")
    }

    pub fn inbox_path(&self) -> PathBuf {
        self.root.join(&self.ingest.inbox_dir)
    }

    pub fn converted_path(&self) -> PathBuf {
        self.root.join(&self.ingest.converted_dir)
    }

    pub fn tree_index_path(&self) -> PathBuf {
        self.root.join(&self.ingest.tree_index_dir)
    }

    pub fn vector_store_path(&self) -> PathBuf {
        self.root.join(&self.ingest.vector_store_dir)
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.root.join(&self.ingest.catalog_file)
    }

    pub fn hash_index_path(&self) -> PathBuf {
        self.root.join("hash_index.json")
    }

    /// Tree file path for a source ID.
    pub fn tree_path(&self, source_id: &str) -> PathBuf {
        self.tree_index_path().join(format!("{source_id}.tree.json"))
    }

    /// Converted-artifacts directory for a source ID.
    pub fn converted_dir_for(&self, source_id: &str) -> PathBuf {
        self.converted_path().join(source_id)
    }
}

fn default_store_path() -> String {
    ".".to_string()
}

fn default_version() -> String {
    FORMAT_VERSION.to_string()
}

fn default_llm_base_url() -> String {
    DEFAULT_LLM_BASE_URL.to_string()
}

fn default_llm_model() -> String {
    DEFAULT_LLM_MODEL.to_string()
}

fn default_token_file() -> String {
    ".oauth_token".to_string()
}

fn default_embedder_kind() -> EmbedderKind {
    EmbedderKind::OpenAI
}

fn default_embedding_model() -> String {
    DEFAULT_EMBEDDING_MODEL.to_string()
}

fn default_embedding_dimensions() -> usize {
    1536
}

fn default_embedding_batch_size() -> usize {
    32
}

fn default_max_sample_tokens() -> usize {
    2000
}

fn default_max_pages_sample() -> usize {
    2
}

fn default_inbox_dir() -> String {
    "inbox".to_string()
}

fn default_converted_dir() -> String {
    "converted".to_string()
}

fn default_tree_index_dir() -> String {
    "tree_index".to_string()
}

fn default_vector_store_dir() -> String {
    "vector_store".to_string()
}

fn default_catalog_file() -> String {
    "catalog.json".to_string()
}
