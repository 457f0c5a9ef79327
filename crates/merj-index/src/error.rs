//! Error types for merj-index.

use std::num::TryFromIntError;
use std::path::PathBuf;

/// Errors that can occur while chunking, indexing or retrieving code.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// IO error reading source files.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Embedding provider error.
    #[error("embedding error: {0}")]
    Llm(#[from] merj_llm::LlmError),

    /// Vector index error.
    #[error("vector store error: {0}")]
    Store(#[from] merj_memory::VectorStoreError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Tree-sitter setup or parsing error.
    #[error("parse failed: {0}")]
    Parse(String),

    /// Source path does not exist.
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Extension unknown, path ignored, or grammar not compiled in.
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    /// Source is not valid UTF-8.
    #[error("cannot decode {} as UTF-8", .0.display())]
    Decode(PathBuf),

    /// Vector collection is absent from the store.
    #[error("Collection '{0}' not found")]
    CollectionNotFound(String),

    /// Repository walk produced nothing to index.
    #[error("no chunks generated from {}", .0.display())]
    NoChunks(PathBuf),

    /// Integer conversion error.
    #[error("integer conversion failed: {0}")]
    IntConversion(#[from] TryFromIntError),

    /// Blocking task failed to complete.
    #[error("task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// Generic catch-all error.
    #[error("{0}")]
    Other(String),
}

impl IndexError {
    /// Missing credentials are the only errors that abort a batch.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Llm(e) if e.is_configuration())
    }
}

/// Result type alias using `IndexError`.
pub type Result<T> = std::result::Result<T, IndexError>;
