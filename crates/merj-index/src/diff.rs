//! Conflict diff → chunks → similar historical code.

use std::sync::Arc;

use merj_llm::EmbeddingProvider;
use merj_memory::VectorStore;
use serde::{Deserialize, Serialize};

use crate::chunker::Chunk;
use crate::conflict::{ConflictDescriptor, ConflictFileResult, ConflictResolver};
use crate::error::Result;
use crate::retriever::{RetrievalResult, Retriever};

/// Both sides of a change. Missing keys read as empty lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffInput {
    #[serde(default)]
    pub lbd: Vec<ConflictDescriptor>,
    #[serde(default)]
    pub rbd: Vec<ConflictDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffMetadata {
    pub collection: String,
    pub k: u64,
    pub threshold: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffRetrieval {
    pub local_chunks: Vec<Chunk>,
    pub remote_chunks: Vec<Chunk>,
    pub total_chunks: usize,
    pub rag_results: Vec<RetrievalResult>,
    pub metadata: DiffMetadata,
    /// Set when retrieval itself failed, as opposed to finding no match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retrieval_error: Option<String>,
}

/// Resolves both sides of a diff and retrieves similar code for the union.
pub struct DiffPipeline<P> {
    resolver: ConflictResolver,
    store: Arc<dyn VectorStore>,
    provider: Arc<P>,
}

impl<P: EmbeddingProvider> DiffPipeline<P> {
    #[must_use]
    pub fn new(resolver: ConflictResolver, store: Arc<dyn VectorStore>, provider: Arc<P>) -> Self {
        Self {
            resolver,
            store,
            provider,
        }
    }

    /// Chunk `lbd` then `rbd` and query `collection` once for all chunks.
    ///
    /// Retrieval failures are logged and reported in `retrieval_error` with
    /// empty `rag_results`; the extracted chunks are still returned.
    ///
    /// # Errors
    ///
    /// Only a missing credential is returned as an error.
    pub async fn process_diff(
        &self,
        input: &DiffInput,
        collection: &str,
        k: u64,
        threshold: f32,
    ) -> Result<DiffRetrieval> {
        self.provider.ensure_configured()?;

        let local_chunks = flatten(self.resolver.resolve_conflicts(&input.lbd));
        let remote_chunks = flatten(self.resolver.resolve_conflicts(&input.rbd));
        let all: Vec<Chunk> = local_chunks
            .iter()
            .chain(remote_chunks.iter())
            .cloned()
            .collect();
        tracing::info!(
            local = local_chunks.len(),
            remote = remote_chunks.len(),
            "diff chunks extracted"
        );

        let (rag_results, retrieval_error) = if all.is_empty() {
            (Vec::new(), None)
        } else {
            match self.retrieve(&all, collection, k, threshold).await {
                Ok(results) => (results, None),
                Err(e) if e.is_configuration() => return Err(e),
                Err(e) => {
                    tracing::warn!(collection, "retrieval failed: {e:#}");
                    (Vec::new(), Some(e.to_string()))
                }
            }
        };

        Ok(DiffRetrieval {
            total_chunks: all.len(),
            local_chunks,
            remote_chunks,
            rag_results,
            metadata: DiffMetadata {
                collection: collection.to_owned(),
                k,
                threshold,
            },
            retrieval_error,
        })
    }

    async fn retrieve(
        &self,
        chunks: &[Chunk],
        collection: &str,
        k: u64,
        threshold: f32,
    ) -> Result<Vec<RetrievalResult>> {
        let retriever =
            Retriever::open(Arc::clone(&self.store), Arc::clone(&self.provider), collection).await?;
        retriever.process_chunks(chunks, k, threshold).await
    }
}

fn flatten(results: Vec<ConflictFileResult>) -> Vec<Chunk> {
    results.into_iter().flat_map(|r| r.chunks).collect()
}
