use std::str::FromStr;

use super::{Config, StoreBackend};
use crate::secret::Secret;

fn parsed_env<T: FromStr>(key: &str) -> Option<T> {
    let v = std::env::var(key).ok()?;
    match v.trim().parse::<T>() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            tracing::warn!("ignoring invalid {key} value: {v}");
            None
        }
    }
}

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("VOYAGE_API_KEY")
            && !v.trim().is_empty()
        {
            self.embedding.api_key = Some(Secret::new(v));
        }
        if let Ok(v) = std::env::var("MERJ_EMBEDDING_BASE_URL") {
            self.embedding.base_url = v;
        }
        if let Ok(v) = std::env::var("MERJ_EMBEDDING_MODEL") {
            self.embedding.model = v;
        }
        if let Some(n) = parsed_env::<usize>("MERJ_EMBEDDING_BATCH_SIZE") {
            self.embedding.batch_size = n;
        }
        if let Ok(v) = std::env::var("MERJ_STORE_BACKEND") {
            if let Ok(backend) =
                serde_json::from_value::<StoreBackend>(serde_json::Value::String(v.clone()))
            {
                self.store.backend = backend;
            } else {
                tracing::warn!("ignoring invalid MERJ_STORE_BACKEND value: {v}");
            }
        }
        if let Ok(v) = std::env::var("MERJ_QDRANT_URL") {
            self.store.qdrant_url = v;
        }
        if let Some(k) = parsed_env::<u64>("MERJ_RETRIEVAL_K") {
            self.retrieval.k = k;
        }
        if let Some(t) = parsed_env::<f32>("MERJ_RETRIEVAL_DISTANCE_THRESHOLD") {
            self.retrieval.distance_threshold = t;
        }
        if let Some(n) = parsed_env::<usize>("MERJ_RETRIEVAL_MAX_CONTEXT_LENGTH") {
            self.retrieval.max_context_length = Some(n);
        }
        if let Some(enabled) = parsed_env::<bool>("MERJ_INDEX_RESPECT_GITIGNORE") {
            self.index.respect_gitignore = enabled;
        }
    }
}
