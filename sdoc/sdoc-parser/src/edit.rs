use std::sync::Arc;

use crate::subtree::{Subtree, SubtreeFlags};

/// A change to the source text, in byte offsets.
///
/// The bytes `start_byte..old_end_byte` of the old text were replaced with
/// `start_byte..new_end_byte` of the new text.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct InputEdit {
    pub start_byte: usize,
    pub old_end_byte: usize,
    pub new_end_byte: usize,
}

impl InputEdit {
    /// The edit replacing `range` of some text with `replacement`.
    pub fn replace(range: std::ops::Range<usize>, replacement: &str) -> Self {
        Self {
            start_byte: range.start,
            old_end_byte: range.end,
            new_end_byte: range.start + replacement.len(),
        }
    }
}

/// An edit relative to the start of a subtree, padding included.
#[derive(Clone, Copy, Debug)]
struct Edit {
    start: u32,
    old_end: u32,
    new_end: u32,
}

pub(crate) fn edit_tree(root: &Arc<Subtree>, edit: &InputEdit) -> Arc<Subtree> {
    let edit = Edit {
        start: edit.start_byte as u32,
        old_end: edit.old_end_byte.max(edit.start_byte) as u32,
        new_end: edit.new_end_byte.max(edit.start_byte) as u32,
    };
    edit_subtree(root, edit)
}

fn edit_subtree(subtree: &Arc<Subtree>, edit: Edit) -> Arc<Subtree> {
    let mut node = Subtree::clone(subtree);
    node.flags |= SubtreeFlags::HAS_CHANGES;

    if node.children.is_empty() {
        resize(&mut node, edit);
        return Arc::new(node);
    }

    let is_insertion = edit.old_end == edit.start;
    let mut edit = edit;
    let mut child_left = 0;

    for (index, child) in node.children.iter_mut().enumerate() {
        let child_size = child.total_size();
        let child_right = child_left + child_size;

        // children before the edit, including what their lexing looked at
        if child_right + child.lookahead_bytes < edit.start {
            child_left = child_right;
            continue;
        }

        // children after the edit
        if child_left > edit.old_end || (child_left == edit.old_end && child_size > 0 && index > 0)
        {
            break;
        }

        let child_edit = Edit {
            start: edit.start.saturating_sub(child_left),
            old_end: edit.old_end.saturating_sub(child_left),
            new_end: edit.new_end.saturating_sub(child_left),
        };
        *child = edit_subtree(child, child_edit);

        // only the first child touching the edit receives the inserted text,
        // the ones after it just lose the deleted part
        if child_right > edit.start || (is_insertion && child_right == edit.start) {
            edit.new_end = edit.start;
        }

        child_left = child_right;
    }

    node.summarize_children();
    Arc::new(node)
}

fn resize(node: &mut Subtree, edit: Edit) {
    let padding = node.padding;
    let total = node.total_size();

    if edit.old_end <= padding {
        // entirely in the padding
        node.padding = padding - (edit.old_end - edit.start) + (edit.new_end - edit.start);
    } else if edit.start < padding {
        // starts in the padding and continues into the content
        node.size = total.saturating_sub(edit.old_end);
        node.padding = edit.new_end;
    } else if edit.start < total || (edit.start == total && edit.old_end == edit.start) {
        // inside the content, or an insertion right after it
        node.size = (edit.new_end - padding) + total.saturating_sub(edit.old_end);
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn leaf(padding: u32, size: u32) -> Arc<Subtree> {
        Arc::new(Subtree {
            symbol: 1,
            padding,
            size,
            lookahead_bytes: 0,
            parse_state: 1,
            flags: SubtreeFlags::TOKEN,
            children: Default::default(),
        })
    }

    fn inner(children: Vec<Arc<Subtree>>) -> Arc<Subtree> {
        let mut node = Subtree {
            symbol: 2,
            padding: 0,
            size: 0,
            lookahead_bytes: 0,
            parse_state: 1,
            flags: SubtreeFlags::empty(),
            children: children.into_iter().collect(),
        };
        node.summarize_children();
        Arc::new(node)
    }

    fn extents(node: &Subtree) -> Vec<(u32, u32, bool)> {
        node.children
            .iter()
            .map(|child| (child.padding, child.size, child.has_changes()))
            .collect()
    }

    #[test]
    fn insertion_inside_a_token() {
        // "ab cd" -> "abXX cd"
        let root = inner(vec![leaf(0, 2), leaf(1, 2)]);
        let edited = edit_tree(&root, &InputEdit::replace(1..1, "XX"));

        assert_eq!(7, edited.total_size());
        assert_eq!(vec![(0, 4, true), (1, 2, false)], extents(&edited));
    }

    #[test]
    fn insertion_in_padding() {
        // "ab cd" -> "ab  cd"
        let root = inner(vec![leaf(0, 2), leaf(1, 2)]);
        let edited = edit_tree(&root, &InputEdit::replace(3..3, " "));

        assert_eq!(6, edited.total_size());
        assert_eq!(vec![(0, 2, false), (2, 2, true)], extents(&edited));
    }

    #[test]
    fn deletion_across_tokens() {
        // "ab cd ef" -> "a ef"
        let root = inner(vec![leaf(0, 2), leaf(1, 2), leaf(1, 2)]);
        let edited = edit_tree(&root, &InputEdit::replace(1..5, ""));

        assert_eq!(4, edited.total_size());
        assert_eq!(
            vec![(0, 1, true), (0, 0, true), (1, 2, false)],
            extents(&edited)
        );
    }

    #[test]
    fn append_at_end() {
        let root = inner(vec![leaf(0, 2), leaf(1, 2)]);
        let edited = edit_tree(&root, &InputEdit::replace(5..5, "!"));

        assert_eq!(6, edited.total_size());
        assert!(edited.has_changes());
        assert_eq!(vec![(0, 2, false), (1, 3, true)], extents(&edited));
    }

    #[test]
    fn untouched_tree_keeps_its_children() {
        let first = leaf(0, 2);
        let root = inner(vec![first.clone(), leaf(1, 2)]);
        let edited = edit_tree(&root, &InputEdit::replace(4..5, "z"));

        assert!(Arc::ptr_eq(&first, &edited.children[0]));
        assert_eq!(5, edited.total_size());
    }

    #[test]
    fn insertion_between_tokens_goes_to_the_first() {
        // "abcd" -> "abXcd"
        let root = inner(vec![leaf(0, 2), leaf(0, 2)]);
        let edited = edit_tree(&root, &InputEdit::replace(2..2, "X"));

        assert_eq!(vec![(0, 3, true), (0, 2, false)], extents(&edited));
    }
}
