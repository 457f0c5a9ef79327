//! Nearest-neighbour retrieval for chunks under a distance threshold.

use std::collections::HashMap;
use std::sync::Arc;

use merj_llm::EmbeddingProvider;
use merj_memory::{ScoredVectorPoint, VectorStore};
use serde::{Deserialize, Serialize};

use crate::chunker::{Chunk, ChunkType};
use crate::error::{IndexError, Result};

/// The queried chunk as reported alongside its matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OriginalChunk {
    pub file_path: String,
    pub content: String,
    pub chunk_type: ChunkType,
    pub lines: String,
    pub signature: String,
}

impl From<&Chunk> for OriginalChunk {
    fn from(chunk: &Chunk) -> Self {
        Self {
            file_path: chunk.file_path.clone(),
            content: chunk.content.clone(),
            chunk_type: chunk.chunk_type,
            lines: chunk.line_range(),
            signature: chunk.signature.clone(),
        }
    }
}

/// A stored chunk close enough to the query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarMatch {
    pub content: String,
    pub file_path: String,
    pub chunk_type: String,
    pub lines: String,
    pub distance: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub original_chunk: OriginalChunk,
    pub similar_code: Vec<SimilarMatch>,
}

/// Keep hits with a reported distance at or below `threshold`, in rank order.
#[must_use]
pub fn accept_neighbors(hits: Vec<ScoredVectorPoint>, threshold: f32) -> Vec<SimilarMatch> {
    hits.into_iter()
        .filter_map(|hit| {
            let distance = hit.distance.filter(|d| *d <= threshold)?;
            Some(similar_match(&hit.payload, distance))
        })
        .collect()
}

fn similar_match(payload: &HashMap<String, serde_json::Value>, distance: f32) -> SimilarMatch {
    let text = |key: &str, default: &str| {
        payload
            .get(key)
            .and_then(serde_json::Value::as_str)
            .unwrap_or(default)
            .to_owned()
    };
    let line = |key: &str| match payload.get(key) {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Null) | None => "?".to_owned(),
        Some(other) => other.to_string(),
    };
    SimilarMatch {
        content: text("document", ""),
        file_path: text("file_path", "unknown"),
        chunk_type: text("chunk_type", "unknown"),
        lines: format!("{}-{}", line("start_line"), line("end_line")),
        distance,
    }
}

/// Queries one collection for code similar to given chunks.
pub struct Retriever<P> {
    store: Arc<dyn VectorStore>,
    provider: Arc<P>,
    collection: String,
}

impl<P: EmbeddingProvider> Retriever<P> {
    /// Bind to an existing collection.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::CollectionNotFound`] if the collection is absent.
    pub async fn open(
        store: Arc<dyn VectorStore>,
        provider: Arc<P>,
        collection: impl Into<String>,
    ) -> Result<Self> {
        let collection = collection.into();
        if !store.collection_exists(&collection).await? {
            return Err(IndexError::CollectionNotFound(collection));
        }
        Ok(Self {
            store,
            provider,
            collection,
        })
    }

    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Embed all chunks in one call, then query each. One result per chunk,
    /// in input order.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding or any query fails.
    pub async fn process_chunks(
        &self,
        chunks: &[Chunk],
        k: u64,
        distance_threshold: f32,
    ) -> Result<Vec<RetrievalResult>> {
        if chunks.is_empty() {
            return Ok(Vec::new());
        }
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let vectors = self.provider.embed(&texts).await?;
        self.process_embedded(chunks, vectors, k, distance_threshold)
            .await
    }

    /// Query with precomputed vectors, paired with `chunks` by position.
    ///
    /// # Errors
    ///
    /// Returns an error if the counts differ or any query fails.
    pub async fn process_embedded(
        &self,
        chunks: &[Chunk],
        vectors: Vec<Vec<f32>>,
        k: u64,
        distance_threshold: f32,
    ) -> Result<Vec<RetrievalResult>> {
        if vectors.len() != chunks.len() {
            return Err(merj_llm::LlmError::CountMismatch {
                expected: chunks.len(),
                actual: vectors.len(),
            }
            .into());
        }

        let mut results = Vec::with_capacity(chunks.len());
        for (chunk, vector) in chunks.iter().zip(vectors) {
            results.push(
                self.process_single_chunk(chunk, vector, k, distance_threshold)
                    .await?,
            );
        }

        let matched = results.iter().filter(|r| !r.similar_code.is_empty()).count();
        tracing::info!(
            collection = %self.collection,
            chunks = results.len(),
            matched,
            "retrieval complete"
        );
        Ok(results)
    }

    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn process_single_chunk(
        &self,
        chunk: &Chunk,
        vector: Vec<f32>,
        k: u64,
        distance_threshold: f32,
    ) -> Result<RetrievalResult> {
        let hits = self.store.search(&self.collection, vector, k).await?;
        let returned = hits.len();
        let similar_code = accept_neighbors(hits, distance_threshold);
        tracing::debug!(
            signature = %chunk.signature,
            returned,
            accepted = similar_code.len(),
            "neighbors filtered"
        );
        Ok(RetrievalResult {
            original_chunk: OriginalChunk::from(chunk),
            similar_code,
        })
    }
}

#[cfg(test)]
mod tests {
    use merj_llm::mock::MockEmbedder;
    use merj_memory::{InMemoryVectorStore, VectorPoint};

    use super::*;
    use crate::indexer::chunk_point;
    use crate::languages::Lang;

    fn hit(distance: Option<f32>, file: &str) -> ScoredVectorPoint {
        ScoredVectorPoint {
            id: file.into(),
            distance,
            payload: HashMap::from([
                ("document".to_owned(), serde_json::json!("body")),
                ("file_path".to_owned(), serde_json::json!(file)),
                ("chunk_type".to_owned(), serde_json::json!("function")),
                ("start_line".to_owned(), serde_json::json!(3)),
                ("end_line".to_owned(), serde_json::json!(9)),
            ]),
        }
    }

    fn chunk(file: &str, content: &str) -> Chunk {
        Chunk {
            file_path: file.into(),
            language: Lang::Python,
            signature: content.lines().next().unwrap_or_default().into(),
            content: content.into(),
            chunk_type: ChunkType::Function,
            start_line: 1,
            end_line: 2,
            node_types: vec!["function_definition".into()],
        }
    }

    #[test]
    fn threshold_is_inclusive() {
        let accepted = accept_neighbors(
            vec![
                hit(Some(0.1), "a.py"),
                hit(Some(0.5), "b.py"),
                hit(Some(0.5 + 1e-4), "c.py"),
                hit(None, "d.py"),
            ],
            0.5,
        );
        let files: Vec<&str> = accepted.iter().map(|m| m.file_path.as_str()).collect();
        assert_eq!(files, vec!["a.py", "b.py"]);
        assert_eq!(accepted[0].lines, "3-9");
        assert_eq!(accepted[0].content, "body");
    }

    #[test]
    fn rank_order_is_kept() {
        let accepted = accept_neighbors(
            vec![hit(Some(0.4), "far.py"), hit(Some(0.2), "near.py")],
            1.0,
        );
        assert_eq!(accepted[0].file_path, "far.py");
        assert_eq!(accepted[1].file_path, "near.py");
    }

    #[test]
    fn missing_payload_defaults() {
        let accepted = accept_neighbors(
            vec![ScoredVectorPoint {
                id: "x".into(),
                distance: Some(0.0),
                payload: HashMap::new(),
            }],
            0.5,
        );
        assert_eq!(accepted[0].file_path, "unknown");
        assert_eq!(accepted[0].chunk_type, "unknown");
        assert_eq!(accepted[0].lines, "?-?");
        assert_eq!(accepted[0].content, "");
    }

    #[tokio::test]
    async fn open_missing_collection() {
        let result = Retriever::open(
            Arc::new(InMemoryVectorStore::new()),
            Arc::new(MockEmbedder::default()),
            "absent",
        )
        .await;
        assert!(matches!(result, Err(IndexError::CollectionNotFound(name)) if name == "absent"));
    }

    async fn seeded_store() -> Arc<InMemoryVectorStore> {
        let store = Arc::new(InMemoryVectorStore::new());
        store.ensure_collection("hist", 2).await.unwrap();
        let stored: Vec<VectorPoint> = vec![
            chunk_point(&chunk("old/a.py", "def a():\n    pass"), vec![0.0, 0.0]),
            chunk_point(&chunk("old/b.py", "def b():\n    pass"), vec![3.0, 4.0]),
        ];
        store.upsert("hist", stored).await.unwrap();
        store
    }

    #[tokio::test]
    async fn process_chunks_one_result_per_chunk_in_order() {
        let store = seeded_store().await;
        let provider = Arc::new(
            MockEmbedder::with_dimensions(2)
                .with_vector("q1", vec![0.0, 0.5])
                .with_vector("q2", vec![3.0, 4.0])
                .with_vector("q3", vec![100.0, 100.0]),
        );
        let retriever = Retriever::open(store, provider.clone(), "hist").await.unwrap();

        let chunks = vec![chunk("new.py", "q1"), chunk("new.py", "q2"), chunk("new.py", "q3")];
        let results = retriever.process_chunks(&chunks, 5, 0.5).await.unwrap();

        assert_eq!(provider.calls(), 1);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].original_chunk.content, "q1");
        assert_eq!(results[0].similar_code.len(), 1);
        assert_eq!(results[0].similar_code[0].file_path, "old/a.py");
        assert!((results[0].similar_code[0].distance - 0.5).abs() < f32::EPSILON);
        assert_eq!(results[1].similar_code[0].file_path, "old/b.py");
        assert_eq!(results[1].similar_code[0].lines, "1-2");
        assert!(results[2].similar_code.is_empty());
    }

    #[tokio::test]
    async fn process_embedded_rejects_count_mismatch() {
        let store = seeded_store().await;
        let retriever = Retriever::open(store, Arc::new(MockEmbedder::default()), "hist")
            .await
            .unwrap();
        let err = retriever
            .process_embedded(&[chunk("a.py", "x")], vec![], 5, 0.5)
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::Llm(_)));
    }

    #[tokio::test]
    async fn empty_input_skips_embedding() {
        let store = seeded_store().await;
        let provider = Arc::new(MockEmbedder::default());
        let retriever = Retriever::open(store, provider.clone(), "hist").await.unwrap();
        assert!(retriever.process_chunks(&[], 5, 0.5).await.unwrap().is_empty());
        assert_eq!(provider.calls(), 0);
    }
}
