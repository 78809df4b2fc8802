use sdoc_core::span::U32Span;

use crate::tree::Node;

pub trait NodeView: Sized + Clone {
    type Children: DoubleEndedIterator<Item = Self>;

    fn kind(&self) -> &str;

    fn children(&self) -> Self::Children;

    fn span(&self) -> U32Span;
}

pub trait NodeViewExt: NodeView {
    fn find_child_by_kind(&self, kind: &str) -> Option<Self> {
        self.children().find(|child| child.kind() == kind)
    }

    fn find_children_by_kind<'k>(&self, kind: &'k str) -> impl Iterator<Item = Self> + 'k
    where
        Self: 'k,
    {
        self.children().filter(move |child| child.kind() == kind)
    }

    /// This node and everything below it, in pre-order.
    fn descendants(self) -> Descendants<Self> {
        Descendants { stack: vec![self] }
    }
}

impl<T> NodeViewExt for T where T: NodeView {}

pub struct Descendants<N> {
    stack: Vec<N>,
}

impl<N: NodeView> Iterator for Descendants<N> {
    type Item = N;

    fn next(&mut self) -> Option<N> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children().rev());
        Some(node)
    }
}

impl<'tree> NodeView for Node<'tree> {
    type Children = crate::tree::Children<'tree>;

    fn kind(&self) -> &str {
        Node::kind(self)
    }

    fn children(&self) -> Self::Children {
        Node::children(self)
    }

    fn span(&self) -> U32Span {
        Node::span(self)
    }
}
