//! The StrictDoc document grammar.
//!
//! Recognizes the document header:
//!
//! ```text
//! top_node  := DOCUMENT EOF
//! DOCUMENT  := _document | document_error
//! _document := "[" "DOCUMENT" "]" "\n" "\n" trailing_end_error?
//! ```
//!
//! where `EOF` is a NUL character terminating the input. Every position of the
//! header has an error production so that malformed input still produces a tree.

use std::sync::LazyLock;

use crate::{
    data::{
        CharSet, GrammarData, LexState, LexStep, ParseState, SymbolFlags, SymbolMetadata,
    },
    table::GrammarTable,
};

pub const NAME: &str = "strictdoc";

/// Symbols of the StrictDoc grammar.
pub mod sym {
    use crate::data::Symbol;

    pub const END: Symbol = 0;
    pub const DOCUMENT_ERROR_TOKEN1: Symbol = 1;
    pub const TRAILING_END_ERROR: Symbol = 2;
    pub const EOF: Symbol = 3;
    pub const DOCUMENT_LITERAL: Symbol = 4;
    pub const DOCUMENT_LITERAL_ERROR_TOKEN1: Symbol = 5;
    pub const LEFT_BRACKET: Symbol = 6;
    pub const LEFT_BRACKET_ERROR: Symbol = 7;
    pub const RIGHT_BRACKET: Symbol = 8;
    pub const NEWLINE_CHARACTER: Symbol = 9;
    pub const TOP_NODE: Symbol = 10;
    pub const DOCUMENT: Symbol = 11;
    pub const DOCUMENT_INNER: Symbol = 12;
    pub const DOCUMENT_ERROR: Symbol = 13;
    pub const DOCUMENT_LITERAL_INNER: Symbol = 14;
    pub const DOCUMENT_LITERAL_ERROR: Symbol = 15;
    pub const LEFT_BRACKET_INNER: Symbol = 16;
    pub const RIGHT_BRACKET_INNER: Symbol = 17;
    pub const RIGHT_BRACKET_ERROR: Symbol = 18;
    pub const NEWLINE_CHARACTER_INNER: Symbol = 19;
    pub const NEWLINE_CHARACTER_ERROR: Symbol = 20;
}

pub const TOKEN_COUNT: u16 = 10;

static TABLE: LazyLock<GrammarTable> = LazyLock::new(|| {
    GrammarTable::encode(&grammar_data()).expect("the StrictDoc grammar is serializable")
});

/// The compiled StrictDoc grammar table, shared for the lifetime of the process.
pub fn grammar_table() -> &'static GrammarTable {
    &TABLE
}

pub fn grammar_data() -> GrammarData {
    GrammarData {
        name: NAME.to_string(),
        token_count: TOKEN_COUNT,
        symbols: symbols(),
        lex_states: lex_states(),
        parse_states: parse_states(),
    }
}

fn symbols() -> Vec<SymbolMetadata> {
    const HIDDEN: SymbolFlags = SymbolFlags::empty();
    const HIDDEN_NAMED: SymbolFlags = SymbolFlags::NAMED;
    const NAMED: SymbolFlags = SymbolFlags::VISIBLE.union(SymbolFlags::NAMED);
    const RECOVERY: SymbolFlags = NAMED.union(SymbolFlags::RECOVERY);

    [
        ("end", HIDDEN_NAMED),
        ("document_error_token1", HIDDEN),
        ("trailing_end_error", RECOVERY),
        ("EOF", NAMED),
        ("document_literal", NAMED),
        ("document_literal_error_token1", HIDDEN),
        ("left_bracket", NAMED),
        ("left_bracket_error", RECOVERY),
        ("right_bracket", NAMED),
        ("newline_character", NAMED),
        ("top_node", NAMED),
        ("DOCUMENT", NAMED),
        ("_document", HIDDEN_NAMED),
        ("document_error", RECOVERY),
        ("_document_literal", HIDDEN_NAMED),
        ("document_literal_error", RECOVERY),
        ("_left_bracket", HIDDEN_NAMED),
        ("_right_bracket", HIDDEN_NAMED),
        ("right_bracket_error", RECOVERY),
        ("_newline_character", HIDDEN_NAMED),
        ("newline_character_error", RECOVERY),
    ]
    .into_iter()
    .map(|(name, flags)| SymbolMetadata::new(name, flags))
    .collect()
}

fn whitespace() -> CharSet {
    CharSet::range('\t', '\r').with(' ')
}

/// Horizontal whitespace, i.e. whitespace without `\n`.
fn blank() -> CharSet {
    CharSet::one('\t').with_range('\u{b}', '\r').with(' ')
}

fn not_nul() -> CharSet {
    CharSet::one('\0').negated()
}

fn lex_states() -> Vec<LexState> {
    use sym::*;

    let literal_char = |c: char, next: u16| LexState::default().advance(CharSet::one(c), next);
    let accept = LexState::accepting;

    vec![
        // 0: fallback mode, also used by states expecting `EOF` or `end`
        LexState::default()
            .at_end(LexStep::Advance(15))
            .advance(CharSet::one('\0'), 18)
            .advance(CharSet::one('D'), 11)
            .advance(CharSet::one('['), 24)
            .advance(CharSet::one(']'), 27)
            .skip(whitespace(), 14),
        // 1: after the two header newlines
        LexState::default()
            .advance(CharSet::one('\0'), 18)
            .advance(CharSet::of(&['\n', ' ']), 17)
            .skip(CharSet::range('\t', '\r'), 1),
        // 2: document start
        LexState::default()
            .advance(CharSet::one('\n'), 26)
            .advance(CharSet::one('['), 24)
            .advance(whitespace(), 16)
            .advance(not_nul(), 16),
        // 3: after `[`
        LexState::default()
            .skip(CharSet::one('\n'), 3)
            .advance(CharSet::one('D'), 22)
            .advance(whitespace(), 21)
            .advance(not_nul(), 20),
        // 4: after the literal
        LexState::default()
            .skip(CharSet::one('\n'), 5)
            .advance(CharSet::one(']'), 27)
            .advance(whitespace(), 23)
            .advance(not_nul(), 20),
        // 5
        LexState::default()
            .skip(CharSet::one('\n'), 5)
            .advance(whitespace(), 23)
            .advance(not_nul(), 20),
        // 6: expecting a newline
        LexState::default()
            .advance(CharSet::one('\n'), 28)
            .advance(not_nul(), 16),
        // 7..=13: the letters of `DOCUMENT`
        literal_char('C', 13),
        literal_char('E', 10),
        literal_char('M', 8),
        literal_char('N', 12),
        literal_char('O', 7),
        literal_char('T', 19),
        literal_char('U', 9),
        // 14: fallback mode after skipped whitespace
        LexState::default()
            .at_end(LexStep::Advance(15))
            .advance(CharSet::one('\0'), 18)
            .advance(CharSet::one('D'), 11)
            .skip(whitespace(), 14),
        // 15..
        accept(END),
        accept(DOCUMENT_ERROR_TOKEN1),
        accept(TRAILING_END_ERROR).advance(CharSet::of(&['\n', ' ']), 17),
        accept(EOF),
        accept(DOCUMENT_LITERAL),
        accept(DOCUMENT_LITERAL_ERROR_TOKEN1),
        // 21
        accept(DOCUMENT_LITERAL_ERROR_TOKEN1)
            .advance(CharSet::one('D'), 22)
            .advance(blank(), 21)
            .advance(CharSet::one('\0').with_range('\t', '\r').negated(), 20),
        // 22
        accept(DOCUMENT_LITERAL_ERROR_TOKEN1).advance(CharSet::one('O'), 7),
        // 23
        accept(DOCUMENT_LITERAL_ERROR_TOKEN1)
            .advance(blank(), 23)
            .advance(CharSet::one('\0').with_range('\t', '\r').negated(), 20),
        // 24
        accept(LEFT_BRACKET),
        accept(LEFT_BRACKET_ERROR),
        // 26
        accept(LEFT_BRACKET_ERROR)
            .advance(whitespace(), 26)
            .advance(CharSet::of(&['\0', '[']).negated(), 25),
        // 27
        accept(RIGHT_BRACKET),
        accept(NEWLINE_CHARACTER),
    ]
}

fn parse_states() -> Vec<ParseState> {
    use sym::*;

    vec![
        // 0: error state
        ParseState::lexing_with(0)
            .recover(END)
            .recover(EOF)
            .recover(DOCUMENT_LITERAL)
            .recover(LEFT_BRACKET)
            .recover(RIGHT_BRACKET),
        // 1: start
        ParseState::lexing_with(2)
            .shift(DOCUMENT_ERROR_TOKEN1, 11)
            .shift(LEFT_BRACKET, 2)
            .shift(LEFT_BRACKET_ERROR, 2)
            .goto(TOP_NODE, 12)
            .goto(DOCUMENT, 13)
            .goto(DOCUMENT_INNER, 14)
            .goto(DOCUMENT_ERROR, 14)
            .goto(LEFT_BRACKET_INNER, 2),
        // 2: `[`
        ParseState::lexing_with(3)
            .shift(DOCUMENT_LITERAL, 3)
            .shift(DOCUMENT_LITERAL_ERROR_TOKEN1, 6)
            .goto(DOCUMENT_LITERAL_INNER, 3)
            .goto(DOCUMENT_LITERAL_ERROR, 3),
        // 3: `[DOCUMENT`
        ParseState::lexing_with(4)
            .shift(DOCUMENT_LITERAL_ERROR_TOKEN1, 7)
            .shift(RIGHT_BRACKET, 4)
            .goto(RIGHT_BRACKET_INNER, 4)
            .goto(RIGHT_BRACKET_ERROR, 4),
        // 4: `[DOCUMENT]`
        ParseState::lexing_with(6)
            .shift(DOCUMENT_ERROR_TOKEN1, 8)
            .shift(NEWLINE_CHARACTER, 5)
            .goto(NEWLINE_CHARACTER_INNER, 5)
            .goto(NEWLINE_CHARACTER_ERROR, 5),
        // 5: first newline
        ParseState::lexing_with(6)
            .shift(DOCUMENT_ERROR_TOKEN1, 10)
            .shift(NEWLINE_CHARACTER, 9)
            .goto(NEWLINE_CHARACTER_INNER, 9)
            .goto(NEWLINE_CHARACTER_ERROR, 9),
        // 6
        ParseState::lexing_with(4)
            .reduce(DOCUMENT_LITERAL_ERROR_TOKEN1, DOCUMENT_LITERAL_ERROR, 1)
            .reduce(RIGHT_BRACKET, DOCUMENT_LITERAL_ERROR, 1),
        // 7
        ParseState::lexing_with(6)
            .reduce(DOCUMENT_ERROR_TOKEN1, RIGHT_BRACKET_ERROR, 1)
            .reduce(NEWLINE_CHARACTER, RIGHT_BRACKET_ERROR, 1),
        // 8
        ParseState::lexing_with(6)
            .reduce(DOCUMENT_ERROR_TOKEN1, NEWLINE_CHARACTER_ERROR, 1)
            .reduce(NEWLINE_CHARACTER, NEWLINE_CHARACTER_ERROR, 1),
        // 9: second newline
        ParseState::lexing_with(1)
            .shift(TRAILING_END_ERROR, 16)
            .reduce(EOF, DOCUMENT_INNER, 5),
        // 10
        ParseState::lexing_with(1)
            .reduce(TRAILING_END_ERROR, NEWLINE_CHARACTER_ERROR, 1)
            .reduce(EOF, NEWLINE_CHARACTER_ERROR, 1),
        // 11
        ParseState::lexing_with(0).reduce(EOF, DOCUMENT_ERROR, 1),
        // 12
        ParseState::lexing_with(0).accept(END),
        // 13
        ParseState::lexing_with(0).shift(EOF, 15),
        // 14
        ParseState::lexing_with(0).reduce(EOF, DOCUMENT, 1),
        // 15
        ParseState::lexing_with(0).reduce(END, TOP_NODE, 2),
        // 16
        ParseState::lexing_with(0).reduce(EOF, DOCUMENT_INNER, 6),
    ]
}
