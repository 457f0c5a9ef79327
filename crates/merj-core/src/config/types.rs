use serde::{Deserialize, Serialize};

use crate::secret::Secret;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub index: IndexConfig,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_base_url")]
    pub base_url: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_input_type")]
    pub input_type: String,
    /// Texts per request when indexing a whole repository.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default, skip_serializing)]
    pub api_key: Option<Secret>,
}

fn default_embedding_base_url() -> String {
    "https://api.voyageai.com/v1".into()
}

fn default_embedding_model() -> String {
    "voyage-code-3".into()
}

fn default_input_type() -> String {
    "document".into()
}

fn default_batch_size() -> usize {
    128
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: default_embedding_base_url(),
            model: default_embedding_model(),
            input_type: default_input_type(),
            batch_size: default_batch_size(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Qdrant,
    Memory,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    #[serde(default = "default_qdrant_url")]
    pub qdrant_url: String,
}

fn default_qdrant_url() -> String {
    "http://localhost:6334".into()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            qdrant_url: default_qdrant_url(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct RetrievalConfig {
    /// Neighbours requested per chunk.
    #[serde(default = "default_k")]
    pub k: u64,
    /// Largest accepted distance, inclusive.
    #[serde(default = "default_distance_threshold")]
    pub distance_threshold: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_context_length: Option<usize>,
}

fn default_k() -> u64 {
    5
}

fn default_distance_threshold() -> f32 {
    0.5
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            k: default_k(),
            distance_threshold: default_distance_threshold(),
            max_context_length: None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct IndexConfig {
    #[serde(default = "default_respect_gitignore")]
    pub respect_gitignore: bool,
    #[serde(default = "default_collection_prefix")]
    pub collection_prefix: String,
}

fn default_respect_gitignore() -> bool {
    true
}

fn default_collection_prefix() -> String {
    "lca".into()
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            respect_gitignore: default_respect_gitignore(),
            collection_prefix: default_collection_prefix(),
        }
    }
}
