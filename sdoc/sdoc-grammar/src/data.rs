//! The compiled grammar model.
//!
//! A grammar is a lexer automaton and an LR parse table over a shared symbol table.
//! Symbol `0` is always the builtin `end` token. Symbols below
//! [GrammarData::token_count] are terminals, the rest are nonterminals.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

pub type Symbol = u16;
pub type StateId = u16;

/// The end-of-input token.
pub const END_SYMBOL: Symbol = 0;

/// Symbol of nodes produced by the parser for input it had to skip.
/// Never part of a grammar's own symbol table.
pub const ERROR_SYMBOL: Symbol = u16::MAX;

/// The parse state used while recovering from errors.
/// Its lex state is the fallback lexer mode.
pub const ERROR_STATE: StateId = 0;

pub const START_STATE: StateId = 1;

bitflags! {
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
    pub struct SymbolFlags: u8 {
        /// Nodes of this symbol appear in the syntax tree.
        const VISIBLE = 0b001;
        const NAMED = 0b010;
        /// An error production the parser may insert when the input does not fit.
        const RECOVERY = 0b100;
    }
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct SymbolMetadata {
    pub name: String,
    pub flags: SymbolFlags,
}

impl SymbolMetadata {
    pub fn new(name: impl Into<String>, flags: SymbolFlags) -> Self {
        Self {
            name: name.into(),
            flags,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.flags.contains(SymbolFlags::VISIBLE)
    }

    pub fn is_named(&self) -> bool {
        self.flags.contains(SymbolFlags::NAMED)
    }

    pub fn is_recovery(&self) -> bool {
        self.flags.contains(SymbolFlags::RECOVERY)
    }
}

/// A set of characters described by inclusive ranges.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct CharSet {
    ranges: Vec<(char, char)>,
    negated: bool,
}

impl CharSet {
    pub fn one(c: char) -> Self {
        Self::range(c, c)
    }

    pub fn of(chars: &[char]) -> Self {
        Self {
            ranges: chars.iter().map(|c| (*c, *c)).collect(),
            negated: false,
        }
    }

    pub fn range(start: char, end: char) -> Self {
        Self {
            ranges: vec![(start, end)],
            negated: false,
        }
    }

    pub fn with(self, c: char) -> Self {
        self.with_range(c, c)
    }

    pub fn with_range(mut self, start: char, end: char) -> Self {
        self.ranges.push((start, end));
        self
    }

    /// The complement of this set.
    pub fn negated(mut self) -> Self {
        self.negated = !self.negated;
        self
    }

    pub fn contains(&self, c: char) -> bool {
        let in_ranges = self
            .ranges
            .iter()
            .any(|(start, end)| *start <= c && c <= *end);
        in_ranges != self.negated
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum LexStep {
    /// Consume the character and move to the lex state.
    Advance(u16),
    /// Consume the character as padding and restart the token at the lex state.
    Skip(u16),
}

impl LexStep {
    pub fn target(&self) -> u16 {
        match self {
            Self::Advance(state) | Self::Skip(state) => *state,
        }
    }
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct LexTransition {
    pub chars: CharSet,
    pub step: LexStep,
}

#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct LexState {
    /// The token recognized when the lexer reaches this state.
    pub accept: Option<Symbol>,
    /// Step taken at end of input. It does not consume anything.
    pub at_end: Option<LexStep>,
    /// Tried in order, the first matching transition wins.
    pub transitions: Vec<LexTransition>,
}

impl LexState {
    pub fn accepting(symbol: Symbol) -> Self {
        Self {
            accept: Some(symbol),
            ..Default::default()
        }
    }

    pub fn at_end(mut self, step: LexStep) -> Self {
        self.at_end = Some(step);
        self
    }

    pub fn advance(mut self, chars: CharSet, state: u16) -> Self {
        self.transitions.push(LexTransition {
            chars,
            step: LexStep::Advance(state),
        });
        self
    }

    pub fn skip(mut self, chars: CharSet, state: u16) -> Self {
        self.transitions.push(LexTransition {
            chars,
            step: LexStep::Skip(state),
        });
        self
    }

    pub fn step_for(&self, c: char) -> Option<LexStep> {
        self.transitions
            .iter()
            .find(|transition| transition.chars.contains(c))
            .map(|transition| transition.step)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum ParseAction {
    Shift(StateId),
    Reduce { symbol: Symbol, child_count: u8 },
    Accept,
    /// The lookahead can only be handled by error recovery.
    Recover,
}

#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct ParseState {
    pub lex_state: u16,
    /// Actions keyed by terminal lookahead.
    pub actions: Vec<(Symbol, ParseAction)>,
    /// Successor states keyed by nonterminal.
    pub gotos: Vec<(Symbol, StateId)>,
}

impl ParseState {
    pub fn lexing_with(lex_state: u16) -> Self {
        Self {
            lex_state,
            ..Default::default()
        }
    }

    pub fn shift(mut self, lookahead: Symbol, state: StateId) -> Self {
        self.actions.push((lookahead, ParseAction::Shift(state)));
        self
    }

    pub fn reduce(mut self, lookahead: Symbol, symbol: Symbol, child_count: u8) -> Self {
        self.actions.push((
            lookahead,
            ParseAction::Reduce {
                symbol,
                child_count,
            },
        ));
        self
    }

    pub fn accept(mut self, lookahead: Symbol) -> Self {
        self.actions.push((lookahead, ParseAction::Accept));
        self
    }

    pub fn recover(mut self, lookahead: Symbol) -> Self {
        self.actions.push((lookahead, ParseAction::Recover));
        self
    }

    pub fn goto(mut self, symbol: Symbol, state: StateId) -> Self {
        self.gotos.push((symbol, state));
        self
    }
}

/// All of the information that makes a grammar.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct GrammarData {
    pub name: String,
    pub token_count: u16,
    pub symbols: Vec<SymbolMetadata>,
    pub lex_states: Vec<LexState>,
    pub parse_states: Vec<ParseState>,
}

impl GrammarData {
    pub fn symbol(&self, symbol: Symbol) -> Option<&SymbolMetadata> {
        self.symbols.get(symbol as usize)
    }

    pub fn is_terminal(&self, symbol: Symbol) -> bool {
        symbol < self.token_count
    }
}
