//! Line to enclosing-unit lookup.

use tree_sitter::Node;

use crate::languages::Lang;
use crate::source::node_rows;

/// Find the most deeply nested unit node of `lang` whose rows contain `row`
/// (0-based).
///
/// Children are searched before their parent, in document order, and the
/// first child subtree holding a match wins. Subtrees whose span excludes
/// the row are skipped.
#[must_use]
pub fn find_innermost_unit<'t>(node: Node<'t>, row: usize, lang: Lang) -> Option<Node<'t>> {
    let (start, end) = node_rows(&node);
    if row < start || row > end {
        return None;
    }

    let child_count = u32::try_from(node.named_child_count()).unwrap_or(u32::MAX);
    for i in 0..child_count {
        let Some(child) = node.named_child(i) else {
            continue;
        };
        if let Some(found) = find_innermost_unit(child, row, lang) {
            return Some(found);
        }
    }

    lang.is_unit_kind(node.kind()).then_some(node)
}

/// 1-based line number to 0-based row, rejecting values below 1.
#[must_use]
pub fn line_to_row(line: i64) -> Option<usize> {
    usize::try_from(line).ok()?.checked_sub(1)
}
