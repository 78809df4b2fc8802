//! Position independent syntax tree nodes.
//!
//! A subtree only knows its own extent: the skipped `padding` in front of it,
//! its `size` and how many bytes past its end the lexer looked at. Absolute
//! positions are computed while walking down from the root, which lets an
//! unchanged subtree be shared between an old tree and a reparsed one.

use std::sync::Arc;

use bitflags::bitflags;
use sdoc_grammar::{
    StateId, Symbol,
    data::{ERROR_SYMBOL, SymbolFlags},
};
use thin_vec::ThinVec;

use crate::language::Language;

bitflags! {
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Debug)]
    pub(crate) struct SubtreeFlags: u8 {
        const VISIBLE     = 0b00000001;
        const NAMED       = 0b00000010;
        /// Not part of the grammar's productions, e.g. skipped input
        const EXTRA       = 0b00000100;
        const TOKEN       = 0b00001000;
        /// Inserted by error recovery without consuming input
        const MISSING     = 0b00010000;
        /// An error production of the grammar
        const RECOVERY    = 0b00100000;
        /// This subtree or one of its descendants is an error
        const HAS_ERROR   = 0b01000000;
        /// Touched by an edit since it was parsed
        const HAS_CHANGES = 0b10000000;
    }
}

#[derive(Clone, Debug)]
pub(crate) struct Subtree {
    pub symbol: Symbol,
    pub padding: u32,
    pub size: u32,
    pub lookahead_bytes: u32,
    /// The parse state on top of the stack when this subtree was pushed
    pub parse_state: StateId,
    pub flags: SubtreeFlags,
    pub children: ThinVec<Arc<Subtree>>,
}

impl Subtree {
    pub fn token(
        language: &Language,
        symbol: Symbol,
        padding: u32,
        size: u32,
        lookahead_bytes: u32,
        parse_state: StateId,
    ) -> Self {
        let mut flags = symbol_flags(language, symbol) | SubtreeFlags::TOKEN;
        if symbol == ERROR_SYMBOL {
            flags |= SubtreeFlags::EXTRA;
        }
        if flags.intersects(SubtreeFlags::RECOVERY) || symbol == ERROR_SYMBOL {
            flags |= SubtreeFlags::HAS_ERROR;
        }

        Self {
            symbol,
            padding,
            size,
            lookahead_bytes,
            parse_state,
            flags,
            children: ThinVec::new(),
        }
    }

    pub fn node(
        language: &Language,
        symbol: Symbol,
        children: ThinVec<Arc<Subtree>>,
        parse_state: StateId,
    ) -> Self {
        let mut flags = symbol_flags(language, symbol);
        if flags.intersects(SubtreeFlags::RECOVERY)
            || symbol == ERROR_SYMBOL
            || children
                .iter()
                .any(|child| child.flags.contains(SubtreeFlags::HAS_ERROR))
        {
            flags |= SubtreeFlags::HAS_ERROR;
        }

        let mut node = Self {
            symbol,
            padding: 0,
            size: 0,
            lookahead_bytes: 0,
            parse_state,
            flags,
            children,
        };
        node.summarize_children();
        node
    }

    /// A zero-width node inserted by error recovery.
    pub fn missing(language: &Language, symbol: Symbol, parse_state: StateId) -> Self {
        let mut node = Self::node(language, symbol, ThinVec::new(), parse_state);
        node.flags |= SubtreeFlags::MISSING | SubtreeFlags::HAS_ERROR;
        node
    }

    /// Recompute the extent of an inner node from its children.
    pub fn summarize_children(&mut self) {
        let Some(first) = self.children.first() else {
            return;
        };
        self.padding = first.padding;

        let mut offset = 0;
        let mut examined_end = 0;
        for child in &self.children {
            offset += child.total_size();
            examined_end = examined_end.max(offset + child.lookahead_bytes);
        }

        self.size = offset - self.padding;
        self.lookahead_bytes = examined_end - offset;
    }

    pub fn total_size(&self) -> u32 {
        self.padding + self.size
    }

    pub fn is_token(&self) -> bool {
        self.flags.contains(SubtreeFlags::TOKEN)
    }

    pub fn is_extra(&self) -> bool {
        self.flags.contains(SubtreeFlags::EXTRA)
    }

    pub fn is_visible(&self) -> bool {
        self.flags.contains(SubtreeFlags::VISIBLE)
    }

    pub fn is_named(&self) -> bool {
        self.flags.contains(SubtreeFlags::NAMED)
    }

    pub fn is_missing(&self) -> bool {
        self.flags.contains(SubtreeFlags::MISSING)
    }

    pub fn is_recovery(&self) -> bool {
        self.flags.contains(SubtreeFlags::RECOVERY)
    }

    pub fn has_error(&self) -> bool {
        self.flags.contains(SubtreeFlags::HAS_ERROR)
    }

    pub fn has_changes(&self) -> bool {
        self.flags.contains(SubtreeFlags::HAS_CHANGES)
    }

    /// Whether an error production in this subtree consumed input.
    pub fn has_consumed_recovery(&self) -> bool {
        self.has_error()
            && ((self.is_recovery() && !self.is_missing())
                || self
                    .children
                    .iter()
                    .any(|child| child.has_consumed_recovery()))
    }

    /// Whether this is skipped input that can absorb more skipped input.
    pub fn is_error_token(&self) -> bool {
        self.symbol == ERROR_SYMBOL && self.is_token()
    }
}

fn symbol_flags(language: &Language, symbol: Symbol) -> SubtreeFlags {
    let symbol_flags = language.symbol_flags(symbol);
    let mut flags = SubtreeFlags::empty();
    if symbol_flags.contains(SymbolFlags::VISIBLE) {
        flags |= SubtreeFlags::VISIBLE;
    }
    if symbol_flags.contains(SymbolFlags::NAMED) {
        flags |= SubtreeFlags::NAMED;
    }
    if symbol_flags.contains(SymbolFlags::RECOVERY) {
        flags |= SubtreeFlags::RECOVERY;
    }
    flags
}
