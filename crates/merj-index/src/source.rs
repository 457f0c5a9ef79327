//! Reading source files and holding their syntax trees.

use std::ops::Range;
use std::path::Path;

use tree_sitter::{Node, Parser, Tree};

use crate::error::{IndexError, Result};
use crate::languages::Lang;

/// Read a file as UTF-8 text.
///
/// Returns `Ok(None)` for an empty file.
///
/// # Errors
///
/// Returns [`IndexError::Io`] if the file cannot be read and
/// [`IndexError::Decode`] if it is not valid UTF-8.
pub fn read_source(path: &Path) -> Result<Option<String>> {
    let bytes = std::fs::read(path)?;
    if bytes.is_empty() {
        return Ok(None);
    }
    String::from_utf8(bytes)
        .map(Some)
        .map_err(|_| IndexError::Decode(path.to_path_buf()))
}

/// Source text, its line index and its parsed tree.
pub struct ParsedFile {
    file_path: String,
    lang: Lang,
    source: String,
    lines: Vec<Range<usize>>,
    tree: Tree,
}

impl std::fmt::Debug for ParsedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParsedFile")
            .field("file_path", &self.file_path)
            .field("lang", &self.lang)
            .field("lines", &self.lines.len())
            .finish_non_exhaustive()
    }
}

impl ParsedFile {
    /// Parse `source` with the grammar for `lang`.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::UnsupportedFileType`] when the grammar is not
    /// compiled in and [`IndexError::Parse`] if tree-sitter fails.
    pub fn parse(source: String, file_path: impl Into<String>, lang: Lang) -> Result<Self> {
        let file_path = file_path.into();
        let grammar = lang
            .grammar()
            .ok_or_else(|| IndexError::UnsupportedFileType(lang.id().to_owned()))?;

        let mut parser = Parser::new();
        parser
            .set_language(&grammar)
            .map_err(|e| IndexError::Parse(format!("set_language failed: {e}")))?;

        let tree = parser
            .parse(&source, None)
            .ok_or_else(|| IndexError::Parse(format!("parse failed for {file_path}")))?;

        let lines = line_ranges(&source);
        Ok(Self {
            file_path,
            lang,
            source,
            lines,
            tree,
        })
    }

    /// Read and parse a file. `file_path` is the label stored in chunks.
    ///
    /// Returns `Ok(None)` for an empty file.
    ///
    /// # Errors
    ///
    /// Propagates [`read_source`] and [`ParsedFile::parse`] errors.
    pub fn read(path: &Path, file_path: impl Into<String>, lang: Lang) -> Result<Option<Self>> {
        match read_source(path)? {
            Some(source) => Self::parse(source, file_path, lang).map(Some),
            None => Ok(None),
        }
    }

    #[must_use]
    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    #[must_use]
    pub fn lang(&self) -> Lang {
        self.lang
    }

    #[must_use]
    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    #[must_use]
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Text of a 0-based row without its line terminator.
    #[must_use]
    pub fn line(&self, row: usize) -> Option<&str> {
        self.lines.get(row).map(|r| &self.source[r.clone()])
    }

    /// Rows `start..=end` (0-based) joined with `\n`. Rows past the end of
    /// the file are skipped.
    #[must_use]
    pub fn lines(&self, start: usize, end: usize) -> String {
        if start > end {
            return String::new();
        }
        let upper = end.saturating_add(1).min(self.lines.len());
        self.lines
            .get(start..upper)
            .unwrap_or_default()
            .iter()
            .map(|r| &self.source[r.clone()])
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// 0-based inclusive row span of a node. A node whose end sits at column 0
/// of a later row does not occupy that row.
#[must_use]
pub fn node_rows(node: &Node<'_>) -> (usize, usize) {
    let start = node.start_position();
    let end = node.end_position();
    let end_row = if end.column == 0 && end.row > start.row {
        end.row - 1
    } else {
        end.row
    };
    (start.row, end_row)
}

fn line_ranges(source: &str) -> Vec<Range<usize>> {
    let mut ranges = Vec::new();
    let mut offset = 0;
    for piece in source.split_inclusive('\n') {
        let body = piece.strip_suffix('\n').unwrap_or(piece);
        let body = body.strip_suffix('\r').unwrap_or(body);
        ranges.push(offset..offset + body.len());
        offset += piece.len();
    }
    ranges
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_ranges_handle_crlf_and_trailing_newline() {
        let src = "a\r\nbb\n\nccc\n";
        let ranges = line_ranges(src);
        let lines: Vec<&str> = ranges.iter().map(|r| &src[r.clone()]).collect();
        assert_eq!(lines, vec!["a", "bb", "", "ccc"]);
    }

    #[test]
    fn line_ranges_without_trailing_newline() {
        let src = "x\ny";
        assert_eq!(line_ranges(src).len(), 2);
    }

    #[test]
    fn read_source_empty_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.py");
        std::fs::write(&path, "").unwrap();
        assert!(read_source(&path).unwrap().is_none());
    }

    #[test]
    fn read_source_rejects_invalid_utf8() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.py");
        std::fs::write(&path, [0x66, 0x6f, 0xff, 0xfe]).unwrap();
        assert!(matches!(read_source(&path), Err(IndexError::Decode(_))));
    }

    #[test]
    fn read_source_missing_is_io() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            read_source(&dir.path().join("nope.py")),
            Err(IndexError::Io(_))
        ));
    }

    #[cfg(feature = "lang-python")]
    #[test]
    fn parsed_file_lines() {
        let file = ParsedFile::parse("x = 1\ny = 2\nz = 3\n".into(), "a.py", Lang::Python).unwrap();
        assert_eq!(file.line_count(), 3);
        assert_eq!(file.line(1), Some("y = 2"));
        assert_eq!(file.line(3), None);
        assert_eq!(file.lines(1, 2), "y = 2\nz = 3");
        assert_eq!(file.lines(2, 10), "z = 3");
        assert_eq!(file.lines(5, 9), "");
        assert_eq!(file.root().kind(), "module");
    }

    #[cfg(feature = "lang-python")]
    #[test]
    fn node_rows_single_line() {
        let file = ParsedFile::parse("x = 1\n".into(), "a.py", Lang::Python).unwrap();
        let child = file.root().named_child(0).unwrap();
        assert_eq!(node_rows(&child), (0, 0));
    }
}
