//! Ancestor-commit indexing: walk → chunk → embed → store.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDate;
use merj_llm::EmbeddingProvider;
use merj_memory::{VectorPoint, VectorStore};
use serde::Serialize;

use crate::chunker::Chunk;
use crate::error::{IndexError, Result};
use crate::repository::{WalkOptions, chunk_repository};

const POINT_NAMESPACE: uuid::Uuid = uuid::Uuid::from_bytes([
    0x6d, 0x65, 0x72, 0x6a, 0x2d, 0x63, 0x68, 0x75, 0x6e, 0x6b, 0x2d, 0x69, 0x64, 0x73, 0x2d, 0x31,
]);

/// Which collection holds the index for each ancestor commit.
///
/// Entries are never evicted. The cache has no internal locking; its owner
/// holds it mutably and must synchronize if it is shared across threads.
#[derive(Debug, Default, Clone)]
pub struct CollectionCache {
    known: HashMap<String, String>,
}

impl CollectionCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, commit: &str) -> Option<&str> {
        self.known.get(commit).map(String::as_str)
    }

    pub fn put(&mut self, commit: impl Into<String>, collection: impl Into<String>) {
        self.known.insert(commit.into(), collection.into());
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.known.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }
}

/// `{prefix}_{YYYYMMDD}_{first 8 chars of commit}`.
#[must_use]
pub fn collection_name(prefix: &str, commit: &str, date: NaiveDate) -> String {
    let short: String = commit.chars().take(8).collect();
    format!("{prefix}_{}_{short}", date.format("%Y%m%d"))
}

/// Stable id for a chunk's point: UUID v5 of `file:start-end`.
#[must_use]
pub fn point_id(chunk: &Chunk) -> String {
    let key = format!("{}:{}", chunk.file_path, chunk.line_range());
    uuid::Uuid::new_v5(&POINT_NAMESPACE, key.as_bytes()).to_string()
}

/// Vector point carrying the chunk's content and metadata.
#[must_use]
pub fn chunk_point(chunk: &Chunk, vector: Vec<f32>) -> VectorPoint {
    let payload = HashMap::from([
        ("document".to_owned(), serde_json::json!(chunk.content)),
        ("file_path".to_owned(), serde_json::json!(chunk.file_path)),
        ("language".to_owned(), serde_json::json!(chunk.language.id())),
        ("chunk_type".to_owned(), serde_json::json!(chunk.chunk_type.as_str())),
        ("start_line".to_owned(), serde_json::json!(chunk.start_line)),
        ("end_line".to_owned(), serde_json::json!(chunk.end_line)),
        ("signature".to_owned(), serde_json::json!(chunk.signature)),
    ]);
    VectorPoint {
        id: point_id(chunk),
        vector,
        payload,
    }
}

/// Indexer configuration.
#[derive(Debug, Clone)]
pub struct IndexerConfig {
    /// Texts per embedding request.
    pub batch_size: usize,
    pub collection_prefix: String,
    pub walk: WalkOptions,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            batch_size: 128,
            collection_prefix: "lca".into(),
            walk: WalkOptions::default(),
        }
    }
}

/// Summary of an indexing run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IndexReport {
    pub commit: String,
    pub collection: String,
    pub files_scanned: usize,
    pub chunks: usize,
    /// The collection already existed and nothing was embedded.
    pub reused: bool,
    pub duration_ms: u64,
}

/// Builds one collection per ancestor commit.
pub struct AncestorIndexer<P> {
    store: Arc<dyn VectorStore>,
    provider: Arc<P>,
    config: IndexerConfig,
}

impl<P: EmbeddingProvider> AncestorIndexer<P> {
    #[must_use]
    pub fn new(store: Arc<dyn VectorStore>, provider: Arc<P>, config: IndexerConfig) -> Self {
        Self {
            store,
            provider,
            config,
        }
    }

    /// Index the checkout at `root` for `commit`, reusing an existing
    /// collection when the cache or the store already has one.
    ///
    /// # Errors
    ///
    /// Returns an error if the credential is missing, the repository yields
    /// no chunks, or embedding or storing fails.
    pub async fn index_commit(
        &self,
        root: &Path,
        commit: &str,
        cache: &mut CollectionCache,
    ) -> Result<IndexReport> {
        let start = std::time::Instant::now();
        let mut report = IndexReport {
            commit: commit.to_owned(),
            ..IndexReport::default()
        };

        if let Some(collection) = cache.get(commit) {
            tracing::debug!(commit, collection, "collection cached");
            report.collection = collection.to_owned();
            report.reused = true;
            return Ok(report);
        }

        let collection = collection_name(
            &self.config.collection_prefix,
            commit,
            chrono::Local::now().date_naive(),
        );
        if self.store.collection_exists(&collection).await? {
            tracing::info!(commit, %collection, "reusing existing collection");
            cache.put(commit, collection.clone());
            report.collection = collection;
            report.reused = true;
            return Ok(report);
        }

        self.provider.ensure_configured()?;

        let root_buf: PathBuf = root.to_path_buf();
        let walk = self.config.walk.clone();
        let repo = tokio::task::spawn_blocking(move || chunk_repository(&root_buf, &walk)).await??;
        report.files_scanned = repo.files_scanned;
        if repo.chunks.is_empty() {
            return Err(IndexError::NoChunks(root.to_path_buf()));
        }

        let vectors = self.embed_batched(&repo.chunks).await?;
        let vector_size = u64::try_from(vectors.first().map_or(0, Vec::len))?;
        self.store.ensure_collection(&collection, vector_size).await?;

        let points: Vec<VectorPoint> = repo
            .chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| chunk_point(chunk, vector))
            .collect();
        self.store.upsert(&collection, points).await?;

        cache.put(commit, collection.clone());
        report.collection = collection;
        report.chunks = repo.chunks.len();
        report.duration_ms = start.elapsed().as_millis().try_into().unwrap_or(u64::MAX);
        tracing::info!(
            commit,
            collection = %report.collection,
            chunks = report.chunks,
            duration_ms = report.duration_ms,
            "ancestor indexed"
        );
        Ok(report)
    }

    async fn embed_batched(&self, chunks: &[Chunk]) -> Result<Vec<Vec<f32>>> {
        let batch_size = self.config.batch_size.max(1);
        let total = chunks.len().div_ceil(batch_size);
        let mut vectors = Vec::with_capacity(chunks.len());

        for (i, batch) in chunks.chunks(batch_size).enumerate() {
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            let embedded = self.provider.embed(&texts).await?;
            if embedded.len() != texts.len() {
                return Err(merj_llm::LlmError::CountMismatch {
                    expected: texts.len(),
                    actual: embedded.len(),
                }
                .into());
            }
            vectors.extend(embedded);
            tracing::debug!(progress = format_args!("{}/{total}", i + 1), "embedded batch");
        }
        Ok(vectors)
    }
}
