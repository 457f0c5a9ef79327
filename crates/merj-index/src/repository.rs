//! Whole-repository chunking.

use std::collections::BTreeMap;
use std::path::Path;

use crate::chunker::{Chunk, chunk_labeled};
use crate::error::{IndexError, Result};
use crate::languages::{self, Lang, is_ignored_dir_name};

/// Directory walk options.
#[derive(Debug, Clone)]
pub struct WalkOptions {
    /// Skip paths matched by `.gitignore` files.
    pub respect_gitignore: bool,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            respect_gitignore: true,
        }
    }
}

/// Chunks of every supported file under a root.
#[derive(Debug, Default)]
pub struct RepositoryChunks {
    pub chunks: Vec<Chunk>,
    pub files_scanned: usize,
    pub per_language: BTreeMap<Lang, usize>,
}

/// Walk `root` and chunk every resolvable file. Paths in the chunks are
/// relative to `root`. Files that fail to chunk contribute nothing.
///
/// # Errors
///
/// Returns an error if `root` is not a directory.
pub fn chunk_repository(root: &Path, options: &WalkOptions) -> Result<RepositoryChunks> {
    if !root.is_dir() {
        return Err(IndexError::Other(format!(
            "{} is not a directory",
            root.display()
        )));
    }

    let start = std::time::Instant::now();
    let mut out = RepositoryChunks::default();

    let walker = ignore::WalkBuilder::new(root)
        .hidden(false)
        .git_ignore(options.respect_gitignore)
        .git_exclude(options.respect_gitignore)
        .git_global(false)
        .require_git(false)
        .filter_entry(|entry| {
            entry.depth() == 0
                || !entry.file_type().is_some_and(|ft| ft.is_dir())
                || !entry.file_name().to_str().is_some_and(is_ignored_dir_name)
        })
        .sort_by_file_name(|a, b| a.cmp(b))
        .build();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("walk error: {e}");
                continue;
            }
        };
        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }

        let rel = entry.path().strip_prefix(root).unwrap_or(entry.path());
        let Some(lang) = languages::resolve(rel) else {
            continue;
        };
        out.files_scanned += 1;

        let label = rel.to_string_lossy().replace('\\', "/");
        let chunks = chunk_labeled(entry.path(), &label, lang);
        if !chunks.is_empty() {
            *out.per_language.entry(lang).or_default() += chunks.len();
        }
        out.chunks.extend(chunks);
    }

    tracing::info!(
        files = out.files_scanned,
        chunks = out.chunks.len(),
        elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
        "repository chunked"
    );
    for (lang, count) in &out.per_language {
        tracing::debug!(%lang, count, "chunks per language");
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn not_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.py");
        std::fs::write(&file, "x = 1\n").unwrap();
        assert!(chunk_repository(&file, &WalkOptions::default()).is_err());
    }

    #[cfg(feature = "lang-python")]
    #[test]
    fn walks_sorted_and_skips_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "pkg/b.py", "def b():\n    return 2\n");
        write(root, "pkg/a.py", "def a():\n    return 1\n");
        write(root, "node_modules/dep/index.py", "def dep():\n    pass\n");
        write(root, "build/gen.py", "def gen():\n    pass\n");
        write(root, "README.md", "# readme\n");
        write(root, "config.toml", "a = 1\n");
        write(root, "empty.py", "");

        let repo = chunk_repository(root, &WalkOptions::default()).unwrap();
        let files: Vec<&str> = repo.chunks.iter().map(|c| c.file_path.as_str()).collect();
        assert_eq!(files, vec!["pkg/a.py", "pkg/b.py"]);
        assert_eq!(repo.files_scanned, 3);
        assert_eq!(repo.per_language.get(&Lang::Python), Some(&2));
    }

    #[cfg(feature = "lang-python")]
    #[test]
    fn gitignore_is_optional() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, ".gitignore", "generated/\n");
        write(root, "generated/out.py", "def out():\n    pass\n");
        write(root, "src/keep.py", "def keep():\n    pass\n");

        let respected = chunk_repository(root, &WalkOptions::default()).unwrap();
        assert_eq!(respected.chunks.len(), 1);
        assert_eq!(respected.chunks[0].file_path, "src/keep.py");

        let all = chunk_repository(
            root,
            &WalkOptions {
                respect_gitignore: false,
            },
        )
        .unwrap();
        assert_eq!(all.chunks.len(), 2);
    }
}
