//! Mapping conflict line numbers to the declared units that enclose them.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

use merj_llm::EmbeddingProvider;
use serde::{Deserialize, Serialize};

use crate::chunker::{Chunk, ChunkType, EmbeddedChunk, unit_chunk};
use crate::error::{IndexError, Result};
use crate::languages::{self, Lang};
use crate::locator::{find_innermost_unit, line_to_row};
use crate::source::{ParsedFile, node_rows};

/// Unique enclosing units for `lines`, in order of first discovery.
///
/// Lines that fall outside every unit, are below 1, or lie past the end of
/// the file are skipped.
#[must_use]
pub fn chunk_functions_from_lines(file: &ParsedFile, lines: &[i64]) -> Vec<Chunk> {
    let mut seen_rows = HashSet::new();
    let mut seen_units = HashSet::new();
    let mut chunks = Vec::new();

    for &line in lines {
        let Some(row) = in_file_row(file, line) else {
            continue;
        };
        if !seen_rows.insert(row) {
            continue;
        }
        let Some(node) = find_innermost_unit(file.root(), row, file.lang()) else {
            continue;
        };
        if !seen_units.insert(node_rows(&node)) {
            continue;
        }
        chunks.extend(unit_chunk(file, &node));
    }
    chunks
}

/// Map every input line to its enclosing unit, or `None`.
#[must_use]
pub fn map_lines_to_functions(file: &ParsedFile, lines: &[i64]) -> BTreeMap<i64, Option<Chunk>> {
    let mut by_span: HashMap<(usize, usize), Option<Chunk>> = HashMap::new();
    let mut mapping = BTreeMap::new();

    for &line in lines {
        let chunk = in_file_row(file, line)
            .and_then(|row| find_innermost_unit(file.root(), row, file.lang()))
            .and_then(|node| {
                by_span
                    .entry(node_rows(&node))
                    .or_insert_with(|| unit_chunk(file, &node))
                    .clone()
            });
        mapping.insert(line, chunk);
    }
    mapping
}

fn in_file_row(file: &ParsedFile, line: i64) -> Option<usize> {
    line_to_row(line).filter(|row| *row < file.line_count())
}

/// Open a file for line lookups.
///
/// `file_path` is the name as the caller gave it. Ignore rules and language
/// detection apply to it, so directories above a relative name never count.
/// `path` is only used to read the file.
///
/// # Errors
///
/// Returns [`IndexError::NotFound`] if the path does not exist and
/// [`IndexError::UnsupportedFileType`] if it has no chunkable language.
/// Read, decode and parse failures propagate as their own variants.
pub fn open_for_lookup(path: &Path, file_path: &str) -> Result<Option<ParsedFile>> {
    if path.as_os_str().is_empty() || !path.exists() {
        return Err(IndexError::NotFound(path.to_path_buf()));
    }
    let lang = supported_lang(Path::new(file_path))?;
    ParsedFile::read(path, file_path, lang)
}

fn supported_lang(name: &Path) -> Result<Lang> {
    languages::resolve(name).ok_or_else(|| {
        let suffix = name
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        IndexError::UnsupportedFileType(suffix)
    })
}

/// [`chunk_functions_from_lines`] for a file on disk. An empty file gives no
/// chunks.
///
/// # Errors
///
/// See [`open_for_lookup`].
pub fn resolve_file(path: &Path, lines: &[i64]) -> Result<Vec<Chunk>> {
    let label = path.display().to_string();
    Ok(open_for_lookup(path, &label)?
        .map(|file| chunk_functions_from_lines(&file, lines))
        .unwrap_or_default())
}

/// [`map_lines_to_functions`] for a file on disk. Every line of an empty
/// file maps to `None`.
///
/// # Errors
///
/// See [`open_for_lookup`].
pub fn map_file_lines(path: &Path, lines: &[i64]) -> Result<BTreeMap<i64, Option<Chunk>>> {
    let label = path.display().to_string();
    Ok(match open_for_lookup(path, &label)? {
        Some(file) => map_lines_to_functions(&file, lines),
        None => lines.iter().map(|&line| (line, None)).collect(),
    })
}

/// One side of a conflict: a file and the lines involved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filefrom: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fileto: Option<String>,
    #[serde(default)]
    pub lns: Vec<i64>,
}

impl ConflictDescriptor {
    #[must_use]
    pub fn new(file: impl Into<String>, lns: Vec<i64>) -> Self {
        Self {
            filefrom: Some(file.into()),
            fileto: None,
            lns,
        }
    }

    /// `filefrom`, else `fileto`, else empty.
    #[must_use]
    pub fn file(&self) -> &str {
        self.filefrom
            .as_deref()
            .or(self.fileto.as_deref())
            .unwrap_or_default()
    }
}

/// Outcome for one conflicted file.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConflictFileResult {
    pub file: String,
    pub conflict_lines: Vec<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub chunks: Vec<Chunk>,
    #[serde(skip)]
    pub embedded_chunks: Vec<EmbeddedChunk>,
}

/// Resolves conflict descriptors against files under a root directory.
#[derive(Debug, Clone)]
pub struct ConflictResolver {
    root: PathBuf,
}

impl Default for ConflictResolver {
    fn default() -> Self {
        Self::new(".")
    }
}

impl ConflictResolver {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn locate(&self, file: &str) -> PathBuf {
        if file.is_empty() {
            return PathBuf::new();
        }
        let path = Path::new(file);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Chunk every descriptor's file without embedding. One record per
    /// descriptor, in order; a failing file never stops the rest.
    #[must_use]
    pub fn resolve_conflicts(&self, descriptors: &[ConflictDescriptor]) -> Vec<ConflictFileResult> {
        descriptors.iter().map(|d| self.resolve_one(d)).collect()
    }

    fn resolve_one(&self, descriptor: &ConflictDescriptor) -> ConflictFileResult {
        let file = descriptor.file();
        let mut result = ConflictFileResult {
            file: file.to_owned(),
            conflict_lines: descriptor.lns.clone(),
            ..ConflictFileResult::default()
        };

        let path = self.locate(file);
        match open_for_lookup(&path, file) {
            Ok(Some(parsed)) => {
                result.chunks = chunk_functions_from_lines(&parsed, &descriptor.lns);
                tracing::debug!(file, chunks = result.chunks.len(), "resolved conflict lines");
            }
            Ok(None) => tracing::debug!(file, "empty file"),
            Err(e @ IndexError::Decode(_)) => tracing::warn!(file, "{e}, no chunks"),
            Err(e) => {
                tracing::warn!(file, "failed to chunk conflict file: {e:#}");
                result.error = Some(e.to_string());
            }
        }
        result
    }

    /// Chunk and embed every descriptor's file, one embedding call per file.
    ///
    /// # Errors
    ///
    /// Only a missing credential is returned as an error. Other embedding
    /// failures are recorded on the file's result and its chunks are kept.
    pub async fn chunk_and_embed_conflicts<P: EmbeddingProvider>(
        &self,
        descriptors: &[ConflictDescriptor],
        provider: &P,
    ) -> Result<Vec<ConflictFileResult>> {
        provider.ensure_configured()?;

        let mut results = self.resolve_conflicts(descriptors);
        for result in &mut results {
            if result.error.is_some() || result.chunks.is_empty() {
                continue;
            }
            let texts: Vec<String> = result.chunks.iter().map(|c| c.content.clone()).collect();
            match provider.embed(&texts).await {
                Ok(vectors) if vectors.len() == result.chunks.len() => {
                    result.embedded_chunks = result
                        .chunks
                        .iter()
                        .cloned()
                        .zip(vectors)
                        .map(|(chunk, embedding)| EmbeddedChunk { chunk, embedding })
                        .collect();
                }
                Ok(vectors) => {
                    let e = merj_llm::LlmError::CountMismatch {
                        expected: result.chunks.len(),
                        actual: vectors.len(),
                    };
                    tracing::warn!(file = %result.file, "{e}");
                    result.error = Some(e.to_string());
                }
                Err(e) if e.is_configuration() => return Err(e.into()),
                Err(e) => {
                    tracing::warn!(file = %result.file, provider = provider.name(), "embedding failed: {e:#}");
                    result.error = Some(e.to_string());
                }
            }
        }

        let embedded: usize = results.iter().map(|r| r.embedded_chunks.len()).sum();
        tracing::info!(files = results.len(), embedded, "conflict chunks embedded");
        Ok(results)
    }
}

/// Compact view of an embedded chunk for reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedChunkSummary {
    pub chunk_signature: String,
    pub chunk_type: ChunkType,
    pub lines: String,
    pub embedding_dimensions: usize,
}

/// Serializable per-file record of a conflict run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictReport {
    pub file: String,
    pub conflict_lines: Vec<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub chunks: Vec<Chunk>,
    pub embedded_chunks_summary: Vec<EmbeddedChunkSummary>,
}

impl From<&ConflictFileResult> for ConflictReport {
    fn from(result: &ConflictFileResult) -> Self {
        Self {
            file: result.file.clone(),
            conflict_lines: result.conflict_lines.clone(),
            error: result.error.clone(),
            chunks: result.chunks.clone(),
            embedded_chunks_summary: result
                .embedded_chunks
                .iter()
                .map(|ec| EmbeddedChunkSummary {
                    chunk_signature: ec.chunk.signature.clone(),
                    chunk_type: ec.chunk.chunk_type,
                    lines: ec.chunk.line_range(),
                    embedding_dimensions: ec.embedding.len(),
                })
                .collect(),
        }
    }
}

#[must_use]
pub fn conflict_reports(results: &[ConflictFileResult]) -> Vec<ConflictReport> {
    results.iter().map(ConflictReport::from).collect()
}

/// Write the reports for `results` as pretty JSON.
///
/// # Errors
///
/// Returns an error if serialization or the write fails.
pub fn save_conflict_results(results: &[ConflictFileResult], output: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(&conflict_reports(results))?;
    std::fs::write(output, json)?;
    tracing::info!(path = %output.display(), files = results.len(), "conflict results saved");
    Ok(())
}
