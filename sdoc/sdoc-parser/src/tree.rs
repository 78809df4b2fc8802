use std::{
    fmt::{Debug, Display, Write},
    ops::Range,
    sync::Arc,
};

use sdoc_core::span::U32Span;
use sdoc_grammar::Symbol;

use crate::{
    edit::{InputEdit, edit_tree},
    language::Language,
    subtree::Subtree,
};

/// A parsed syntax tree.
///
/// Cloning is cheap, clones share all their nodes.
#[derive(Clone)]
pub struct Tree {
    root: Arc<Subtree>,
    language: Language,
}

impl Tree {
    pub(crate) fn new(root: Arc<Subtree>, language: Language) -> Self {
        Self { root, language }
    }

    pub(crate) fn root_subtree(&self) -> &Arc<Subtree> {
        &self.root
    }

    pub fn root_node(&self) -> Node<'_> {
        Node {
            subtree: &self.root,
            start: 0,
            language: &self.language,
        }
    }

    pub fn language(&self) -> &Language {
        &self.language
    }

    /// Adjust the tree to a change of its source text.
    ///
    /// Nodes touched by the edit are marked as changed so that a following
    /// incremental parse does not reuse them.
    pub fn edit(&mut self, edit: &InputEdit) {
        self.root = edit_tree(&self.root, edit);
    }

    /// An indented rendering of every visible node along with its text.
    pub fn debug_tree<'a>(&'a self, source: &'a str) -> DebugTree<'a> {
        DebugTree { tree: self, source }
    }
}

impl Display for Tree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.root_node().to_sexp())
    }
}

impl Debug for Tree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Tree {{ root: {}, language: {:?} }}", self, self.language)
    }
}

/// A visible node of a [Tree].
#[derive(Clone, Copy)]
pub struct Node<'tree> {
    subtree: &'tree Arc<Subtree>,
    /// Absolute position of the subtree's padding
    start: u32,
    language: &'tree Language,
}

impl<'tree> Node<'tree> {
    pub fn kind(&self) -> &'tree str {
        self.language
            .node_kind_for_id(self.subtree.symbol)
            .unwrap_or_default()
    }

    pub fn kind_id(&self) -> Symbol {
        self.subtree.symbol
    }

    pub fn is_named(&self) -> bool {
        self.subtree.is_named()
    }

    /// Skipped input the grammar could not place.
    pub fn is_error(&self) -> bool {
        self.kind_id() == sdoc_grammar::data::ERROR_SYMBOL
    }

    pub fn is_missing(&self) -> bool {
        self.subtree.is_missing()
    }

    pub fn is_extra(&self) -> bool {
        self.subtree.is_extra()
    }

    /// Whether this node is one of the grammar's own error productions.
    pub fn is_recovery(&self) -> bool {
        self.subtree.is_recovery()
    }

    pub fn has_error(&self) -> bool {
        self.subtree.has_error()
    }

    pub fn has_changes(&self) -> bool {
        self.subtree.has_changes()
    }

    pub fn start_byte(&self) -> usize {
        (self.start + self.subtree.padding) as usize
    }

    pub fn end_byte(&self) -> usize {
        (self.start + self.subtree.total_size()) as usize
    }

    pub fn byte_range(&self) -> Range<usize> {
        self.start_byte()..self.end_byte()
    }

    pub fn span(&self) -> U32Span {
        U32Span::new(
            self.start + self.subtree.padding,
            self.start + self.subtree.total_size(),
        )
    }

    pub fn utf8_text<'s>(&self, source: &'s str) -> Option<&'s str> {
        source.get(self.byte_range())
    }

    /// The visible children, with hidden nodes replaced by their own children.
    pub fn children(&self) -> Children<'tree> {
        Children::new(*self)
    }

    pub fn named_children(&self) -> impl Iterator<Item = Node<'tree>> + use<'tree> {
        self.children().filter(Node::is_named)
    }

    pub fn child_count(&self) -> usize {
        visible_count(self.subtree)
    }

    pub fn child(&self, index: usize) -> Option<Node<'tree>> {
        let mut index = index;
        nth_visible(self.subtree, self.start, self.language, &mut index)
    }

    pub fn named_child_count(&self) -> usize {
        self.named_children().count()
    }

    /// Render the named structure as an S-expression.
    pub fn to_sexp(&self) -> String {
        let mut out = String::new();
        write_sexp(self, &mut out);
        out
    }
}

impl Debug for Node<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{Node {} {:?}}}", self.kind(), self.span())
    }
}

impl PartialEq for Node<'_> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(self.subtree, other.subtree) && self.start == other.start
    }
}

/// Iterator over the visible children of a [Node].
pub struct Children<'tree> {
    language: &'tree Language,
    front: Vec<Frame<'tree>>,
    back: Vec<Frame<'tree>>,
    remaining: usize,
}

struct Frame<'tree> {
    children: std::slice::Iter<'tree, Arc<Subtree>>,
    /// Start of the next child from the front, or end of the next child from the back
    offset: u32,
}

impl<'tree> Children<'tree> {
    fn new(node: Node<'tree>) -> Self {
        let subtree = node.subtree;
        Self {
            language: node.language,
            front: vec![Frame {
                children: subtree.children.iter(),
                offset: node.start,
            }],
            back: vec![Frame {
                children: subtree.children.iter(),
                offset: node.start + subtree.total_size(),
            }],
            remaining: visible_count(subtree),
        }
    }
}

impl<'tree> Iterator for Children<'tree> {
    type Item = Node<'tree>;

    fn next(&mut self) -> Option<Node<'tree>> {
        if self.remaining == 0 {
            return None;
        }

        loop {
            let frame = self.front.last_mut()?;
            let Some(child) = frame.children.next() else {
                self.front.pop();
                continue;
            };
            let start = frame.offset;
            frame.offset += child.total_size();

            if child.is_visible() {
                self.remaining -= 1;
                return Some(Node {
                    subtree: child,
                    start,
                    language: self.language,
                });
            }
            if !child.is_token() {
                self.front.push(Frame {
                    children: child.children.iter(),
                    offset: start,
                });
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl DoubleEndedIterator for Children<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        loop {
            let frame = self.back.last_mut()?;
            let Some(child) = frame.children.next_back() else {
                self.back.pop();
                continue;
            };
            let end = frame.offset;
            frame.offset -= child.total_size();
            let start = frame.offset;

            if child.is_visible() {
                self.remaining -= 1;
                return Some(Node {
                    subtree: child,
                    start,
                    language: self.language,
                });
            }
            if !child.is_token() {
                self.back.push(Frame {
                    children: child.children.iter(),
                    offset: end,
                });
            }
        }
    }
}

impl ExactSizeIterator for Children<'_> {}

fn visible_count(subtree: &Subtree) -> usize {
    subtree
        .children
        .iter()
        .map(|child| {
            if child.is_visible() {
                1
            } else if child.is_token() {
                0
            } else {
                visible_count(child)
            }
        })
        .sum()
}

/// The visible child at `index`, counting down `index` past the ones before it.
fn nth_visible<'tree>(
    subtree: &'tree Subtree,
    start: u32,
    language: &'tree Language,
    index: &mut usize,
) -> Option<Node<'tree>> {
    let mut offset = start;
    for child in &subtree.children {
        if child.is_visible() {
            if *index == 0 {
                return Some(Node {
                    subtree: child,
                    start: offset,
                    language,
                });
            }
            *index -= 1;
        } else if !child.is_token() {
            if let Some(node) = nth_visible(child, offset, language, index) {
                return Some(node);
            }
        }
        offset += child.total_size();
    }
    None
}

fn write_sexp(node: &Node, out: &mut String) {
    if node.is_missing() {
        if node.is_named() {
            let _ = write!(out, "(MISSING {})", node.kind());
        } else {
            let _ = write!(out, "(MISSING {:?})", node.kind());
        }
        return;
    }

    let _ = write!(out, "({}", node.kind());
    write_named_descendants(node, out);
    out.push(')');
}

fn write_named_descendants(node: &Node, out: &mut String) {
    for child in node.children() {
        if child.is_named() || child.is_missing() {
            out.push(' ');
            write_sexp(&child, out);
        } else {
            write_named_descendants(&child, out);
        }
    }
}

pub struct DebugTree<'a> {
    tree: &'a Tree,
    source: &'a str,
}

impl Display for DebugTree<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.write_node(f, self.tree.root_node(), 0)
    }
}

impl DebugTree<'_> {
    fn write_node(&self, f: &mut std::fmt::Formatter<'_>, node: Node, indent: usize) -> std::fmt::Result {
        for _ in 0..indent {
            write!(f, "    ")?;
        }
        if node.is_missing() {
            write!(f, "MISSING ")?;
        }
        if node.is_named() {
            write!(f, "{}", node.kind())?;
        } else {
            write!(f, "{:?}", node.kind())?;
        }
        write!(f, " {:?}", node.span())?;

        let children = node.children();
        if children.len() == 0 {
            let text = node.utf8_text(self.source).unwrap_or_default();
            writeln!(f, " {text:?}")?;
        } else {
            writeln!(f)?;
            for child in children {
                self.write_node(f, child, indent + 1)?;
            }
        }

        Ok(())
    }
}
