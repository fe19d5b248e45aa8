use std::path::PathBuf;

/// All errors that can occur in metahub.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("not a regular file: {}", path.display())]
    NotAFile { path: PathBuf },

    #[error("input not found: {}", path.display())]
    InputNotFound { path: PathBuf },

    #[error("source not found: {id}")]
    SourceNotFound { id: String },

    #[error("node {node_id} not found in source {source_id}")]
    NodeNotFound { source_id: String, node_id: String },

    #[error("file not found under store: {0}")]
    StoreFileNotFound(String),

    #[error("converter failed for {}: {message}", path.display())]
    Converter { path: PathBuf, message: String },

    #[error("llm request failed: {0}")]
    Llm(String),

    #[error("no llm credentials configured: set METAHUB_API_KEY, a token file, or use_cli")]
    AuthMissing,

    #[error("embedding error: {0}")]
    Embedding(String),

    #[error("vector index corrupted: {0}")]
    IndexCorrupted(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("logging initialization failed: {0}")]
    Logging(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
