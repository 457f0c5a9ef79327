//! Plain-text rendering of retrieval results for prompts and terminals.

use crate::retriever::RetrievalResult;

const PREVIEW_CHARS: usize = 200;
const TRUNCATION_MARKER: &str = "\n... [truncated]";

fn preview(content: &str) -> String {
    if content.chars().count() > PREVIEW_CHARS {
        let mut cut: String = content.chars().take(PREVIEW_CHARS).collect();
        cut.push_str("...");
        cut
    } else {
        content.to_owned()
    }
}

/// Render results as sectioned text.
///
/// With `max_length` set to a positive value, output longer than that many
/// characters is cut there and ends with a truncation marker.
#[must_use]
pub fn compile_context(results: &[RetrievalResult], max_length: Option<usize>) -> String {
    let mut parts: Vec<String> = Vec::new();

    for (i, result) in results.iter().enumerate() {
        let original = &result.original_chunk;
        parts.push(format!(
            "=== Chunk {}: {} ({}) ===",
            i + 1,
            original.file_path,
            original.chunk_type
        ));
        parts.push(format!("Lines {}", original.lines));
        parts.push("Original Code:".to_owned());
        parts.push(original.content.clone());
        parts.push("\nSimilar Code Found:".to_owned());

        for (j, similar) in result.similar_code.iter().enumerate() {
            parts.push(format!(
                "\n  [{}] {} (distance: {:.3})",
                j + 1,
                similar.file_path,
                f64::from(similar.distance)
            ));
            parts.push(format!(
                "      Lines {}, Type: {}",
                similar.lines, similar.chunk_type
            ));
            parts.push(format!("      {}", preview(&similar.content)));
        }

        parts.push("\n".to_owned());
    }

    let context = parts.join("\n");
    match max_length {
        Some(max) if max > 0 && context.chars().count() > max => {
            let mut cut: String = context.chars().take(max).collect();
            cut.push_str(TRUNCATION_MARKER);
            cut
        }
        _ => context,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::ChunkType;
    use crate::retriever::{OriginalChunk, SimilarMatch};

    fn result(similar: Vec<SimilarMatch>) -> RetrievalResult {
        RetrievalResult {
            original_chunk: OriginalChunk {
                file_path: "src/calc.py".into(),
                content: "def add(a, b):\n    return a + b".into(),
                chunk_type: ChunkType::Function,
                lines: "49-50".into(),
                signature: "def add(a, b):".into(),
            },
            similar_code: similar,
        }
    }

    fn similar(content: &str, distance: f32) -> SimilarMatch {
        SimilarMatch {
            content: content.into(),
            file_path: "old/calc.py".into(),
            chunk_type: "function".into(),
            lines: "10-11".into(),
            distance,
        }
    }

    #[test]
    fn golden_rendering() {
        let text = compile_context(&[result(vec![similar("def add(x, y): ...", 0.12345)])], None);
        let expected = "\
=== Chunk 1: src/calc.py (function) ===
Lines 49-50
Original Code:
def add(a, b):
    return a + b

Similar Code Found:

  [1] old/calc.py (distance: 0.123)
      Lines 10-11, Type: function
      def add(x, y): ...

";
        assert_eq!(text, expected);
    }

    #[test]
    fn no_matches_still_renders_header() {
        let text = compile_context(&[result(vec![])], None);
        assert!(text.ends_with("Similar Code Found:\n\n"));
    }

    #[test]
    fn empty_results_render_empty() {
        assert_eq!(compile_context(&[], Some(10)), "");
    }

    #[test]
    fn long_previews_are_cut() {
        let long = "x".repeat(250);
        let text = compile_context(&[result(vec![similar(&long, 0.0)])], None);
        let expected = format!("      {}...", "x".repeat(200));
        assert!(text.contains(&expected));
        assert!(!text.contains(&"x".repeat(201)));

        let exact = "y".repeat(200);
        let text = compile_context(&[result(vec![similar(&exact, 0.0)])], None);
        assert!(text.contains(&format!("      {exact}\n")));
        assert!(!text.contains(&format!("{exact}...")));
    }

    #[test]
    fn truncation_is_character_based() {
        let full = compile_context(&[result(vec![])], None);
        let text = compile_context(&[result(vec![])], Some(20));
        let head: String = full.chars().take(20).collect();
        assert_eq!(text, format!("{head}\n... [truncated]"));
    }

    #[test]
    fn zero_or_large_limit_disables_truncation() {
        let full = compile_context(&[result(vec![])], None);
        assert_eq!(compile_context(&[result(vec![])], Some(0)), full);
        assert_eq!(compile_context(&[result(vec![])], Some(full.chars().count())), full);
    }

    #[test]
    fn numbering_starts_at_one_per_level() {
        let text = compile_context(
            &[
                result(vec![similar("a", 0.1), similar("b", 0.2)]),
                result(vec![]),
            ],
            None,
        );
        assert!(text.contains("=== Chunk 1: "));
        assert!(text.contains("=== Chunk 2: "));
        assert!(text.contains("  [1] old/calc.py (distance: 0.100)"));
        assert!(text.contains("  [2] old/calc.py (distance: 0.200)"));
    }
}
