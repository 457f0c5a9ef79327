//! Syntax-aware code chunking and similar-code retrieval.
//!
//! Source files are parsed with tree-sitter and split into top-level
//! chunks. Conflict line numbers are mapped to their innermost enclosing
//! declaration, embedded, and matched against a collection built from an
//! ancestor commit. Results render to a bounded text context.

pub mod chunker;
pub mod conflict;
pub mod context;
pub mod diff;
pub mod error;
pub mod indexer;
pub mod languages;
pub mod locator;
pub mod repository;
pub mod retriever;
pub mod source;

pub use chunker::{Chunk, ChunkType, EmbeddedChunk, chunk_file, chunk_source};
pub use conflict::{
    ConflictDescriptor, ConflictFileResult, ConflictReport, ConflictResolver,
    chunk_functions_from_lines, map_lines_to_functions, save_conflict_results,
};
pub use context::compile_context;
pub use diff::{DiffInput, DiffPipeline, DiffRetrieval};
pub use error::{IndexError, Result};
pub use indexer::{AncestorIndexer, CollectionCache, IndexReport, IndexerConfig};
pub use languages::{Lang, validate_registry};
pub use repository::{RepositoryChunks, WalkOptions, chunk_repository};
pub use retriever::{RetrievalResult, Retriever, SimilarMatch};
