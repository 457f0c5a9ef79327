//! Test-only embedding provider.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::LlmError;
use crate::provider::EmbeddingProvider;

/// Deterministic embedder: known texts map to fixed vectors, everything
/// else gets a vector derived from the text bytes.
#[derive(Debug, Clone)]
pub struct MockEmbedder {
    pub dimensions: usize,
    pub vectors: HashMap<String, Vec<f32>>,
    pub fail: bool,
    pub configured: bool,
    calls: Arc<AtomicUsize>,
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self {
            dimensions: 8,
            vectors: HashMap::new(),
            fail: false,
            configured: true,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl MockEmbedder {
    #[must_use]
    pub fn with_dimensions(dimensions: usize) -> Self {
        Self {
            dimensions,
            ..Self::default()
        }
    }

    /// Embedder whose calls always fail with a transport-like error.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Embedder that behaves as if no API key was set.
    #[must_use]
    pub fn unconfigured() -> Self {
        Self {
            configured: false,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_vector(mut self, text: impl Into<String>, vector: Vec<f32>) -> Self {
        self.vectors.insert(text.into(), vector);
        self
    }

    /// Number of `embed` calls that reached the provider.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn derive_vector(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0_f32; self.dimensions.max(1)];
        let len = v.len();
        for (i, b) in text.bytes().enumerate() {
            v[i % len] += f32::from(b) / 255.0;
        }
        v
    }
}

impl EmbeddingProvider for MockEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        self.ensure_configured()?;
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(LlmError::Other("mock embedding error".into()));
        }
        Ok(texts
            .iter()
            .map(|t| {
                self.vectors
                    .get(t)
                    .cloned()
                    .unwrap_or_else(|| self.derive_vector(t))
            })
            .collect())
    }

    fn ensure_configured(&self) -> Result<(), LlmError> {
        if self.configured {
            Ok(())
        } else {
            Err(LlmError::Configuration("VOYAGE_API_KEY not set".into()))
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn preserves_order_and_counts_calls() {
        let mock = MockEmbedder::with_dimensions(2).with_vector("b", vec![9.0, 9.0]);
        let out = mock
            .embed(&["a".to_owned(), "b".to_owned(), "a".to_owned()])
            .await
            .unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(out[1], vec![9.0, 9.0]);
        assert_eq!(out[0], out[2]);
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn unconfigured_rejects_without_counting() {
        let mock = MockEmbedder::unconfigured();
        let err = mock.embed(&["a".to_owned()]).await.unwrap_err();
        assert!(err.is_configuration());
        assert_eq!(mock.calls(), 0);
    }

    #[tokio::test]
    async fn failing_counts_call() {
        let mock = MockEmbedder::failing();
        assert!(mock.embed(&["a".to_owned()]).await.is_err());
        assert_eq!(mock.calls(), 1);
    }
}
