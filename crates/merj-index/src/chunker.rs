//! Top-level chunking: declared units become their own chunk, everything
//! between them is grouped into `imports_and_globals` filler chunks.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tree_sitter::Node;

use crate::error::{IndexError, Result};
use crate::languages::Lang;
use crate::source::{ParsedFile, node_rows, read_source};

/// Classification of a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkType {
    Function,
    Class,
    Interface,
    Struct,
    Enum,
    Trait,
    TypeDefinition,
    CodeBlock,
    ImportsAndGlobals,
}

impl ChunkType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Class => "class",
            Self::Interface => "interface",
            Self::Struct => "struct",
            Self::Enum => "enum",
            Self::Trait => "trait",
            Self::TypeDefinition => "type_definition",
            Self::CodeBlock => "code_block",
            Self::ImportsAndGlobals => "imports_and_globals",
        }
    }
}

impl std::fmt::Display for ChunkType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Substring rules, checked in order. The first rule with a matching
/// needle decides, so `function_type` is a function.
const CLASSIFICATION_RULES: &[(&[&str], ChunkType)] = &[
    (&["function", "method"], ChunkType::Function),
    (&["class"], ChunkType::Class),
    (&["interface"], ChunkType::Interface),
    (&["struct"], ChunkType::Struct),
    (&["enum"], ChunkType::Enum),
    (&["trait"], ChunkType::Trait),
    (&["type"], ChunkType::TypeDefinition),
];

/// Classify a syntax node kind.
#[must_use]
pub fn classify_node_kind(kind: &str) -> ChunkType {
    CLASSIFICATION_RULES
        .iter()
        .find(|(needles, _)| needles.iter().any(|n| kind.contains(n)))
        .map_or(ChunkType::CodeBlock, |(_, chunk_type)| *chunk_type)
}

/// A contiguous span of source lines, either a declared unit or filler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub file_path: String,
    pub language: Lang,
    pub signature: String,
    pub content: String,
    pub chunk_type: ChunkType,
    /// 1-based, inclusive.
    pub start_line: usize,
    /// 1-based, inclusive.
    pub end_line: usize,
    pub node_types: Vec<String>,
}

impl Chunk {
    /// `"start-end"` as shown in reports.
    #[must_use]
    pub fn line_range(&self) -> String {
        format!("{}-{}", self.start_line, self.end_line)
    }
}

/// A chunk paired with its embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedChunk {
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
}

/// Build the chunk for a declared unit node. Returns `None` when the span
/// holds only whitespace.
pub(crate) fn unit_chunk(file: &ParsedFile, node: &Node<'_>) -> Option<Chunk> {
    let (start, end) = node_rows(node);
    let content = file.lines(start, end);
    if content.trim().is_empty() {
        return None;
    }
    let kind = node.kind();
    Some(Chunk {
        file_path: file.file_path().to_owned(),
        language: file.lang(),
        signature: file.line(start).unwrap_or_default().trim().to_owned(),
        content,
        chunk_type: classify_node_kind(kind),
        start_line: start + 1,
        end_line: end + 1,
        node_types: vec![kind.to_owned()],
    })
}

/// Non-unit siblings accumulated since the last declared unit.
struct Filler {
    start: usize,
    end: usize,
    kinds: Vec<String>,
}

impl Filler {
    fn new(start: usize) -> Self {
        Self {
            start,
            end: start,
            kinds: Vec::new(),
        }
    }

    fn push(&mut self, node: &Node<'_>) {
        let (_, end) = node_rows(node);
        self.end = self.end.max(end);
        let kind = node.kind();
        if !self.kinds.iter().any(|k| k == kind) {
            self.kinds.push(kind.to_owned());
        }
    }

    fn into_chunk(self, file: &ParsedFile) -> Option<Chunk> {
        let content = file.lines(self.start, self.end);
        if content.trim().is_empty() {
            return None;
        }
        Some(Chunk {
            file_path: file.file_path().to_owned(),
            language: file.lang(),
            signature: format!("imports_and_globals:{}", self.start + 1),
            content,
            chunk_type: ChunkType::ImportsAndGlobals,
            start_line: self.start + 1,
            end_line: self.end + 1,
            node_types: self.kinds,
        })
    }
}

/// Partition the root's named children into ordered chunks.
#[must_use]
pub fn chunk_parsed(file: &ParsedFile) -> Vec<Chunk> {
    let root = file.root();
    let lang = file.lang();
    let mut chunks = Vec::new();
    let mut filler: Option<Filler> = None;
    let child_count = u32::try_from(root.named_child_count()).unwrap_or(u32::MAX);

    for i in 0..child_count {
        let Some(child) = root.named_child(i) else {
            continue;
        };
        if lang.is_unit_kind(child.kind()) {
            if let Some(pending) = filler.take() {
                chunks.extend(pending.into_chunk(file));
            }
            chunks.extend(unit_chunk(file, &child));
        } else {
            let (start, _) = node_rows(&child);
            filler.get_or_insert_with(|| Filler::new(start)).push(&child);
        }
    }

    if let Some(pending) = filler {
        chunks.extend(pending.into_chunk(file));
    }
    chunks
}

/// Parse and chunk a source string.
///
/// # Errors
///
/// Returns an error if the grammar is unavailable or parsing fails.
pub fn chunk_source(source: String, file_path: &str, lang: Lang) -> Result<Vec<Chunk>> {
    let file = ParsedFile::parse(source, file_path, lang)?;
    Ok(chunk_parsed(&file))
}

/// Best-effort chunking of a file on disk, labelled with its path.
///
/// Empty, unreadable and undecodable files yield no chunks.
#[must_use]
pub fn chunk_file(path: &Path, lang: Lang) -> Vec<Chunk> {
    chunk_labeled(path, &path.display().to_string(), lang)
}

pub(crate) fn chunk_labeled(path: &Path, label: &str, lang: Lang) -> Vec<Chunk> {
    let source = match read_source(path) {
        Ok(Some(source)) => source,
        Ok(None) => {
            tracing::debug!(path = %path.display(), "empty file, skipping");
            return Vec::new();
        }
        Err(IndexError::Decode(_)) => {
            tracing::debug!(path = %path.display(), "not UTF-8, skipping");
            return Vec::new();
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), "failed to read: {e:#}");
            return Vec::new();
        }
    };

    match chunk_source(source, label, lang) {
        Ok(chunks) => chunks,
        Err(e) => {
            tracing::warn!(path = %path.display(), "failed to chunk: {e:#}");
            Vec::new()
        }
    }
}
