//! Grammar tables for tests.

use sdoc_grammar::{
    GrammarData, GrammarTable,
    data::{CharSet, LexState, LexStep, ParseState, SymbolFlags, SymbolMetadata},
    strictdoc,
};

pub mod word {
    use sdoc_grammar::Symbol;

    pub const END: Symbol = 0;
    pub const LETTER: Symbol = 1;
    pub const WORD: Symbol = 2;
}

/// A grammar with the single rule `word := "a"`, whitespace allowed around it.
pub fn single_rule_grammar() -> GrammarData {
    use word::*;

    GrammarData {
        name: "word".to_string(),
        token_count: 2,
        symbols: vec![
            SymbolMetadata::new("end", SymbolFlags::NAMED),
            SymbolMetadata::new("a", SymbolFlags::VISIBLE),
            SymbolMetadata::new("word", SymbolFlags::VISIBLE | SymbolFlags::NAMED),
        ],
        lex_states: vec![
            LexState::default()
                .at_end(LexStep::Advance(1))
                .advance(CharSet::one('a'), 2)
                .skip(CharSet::of(&[' ', '\t', '\n']), 0),
            LexState::accepting(END),
            LexState::accepting(LETTER),
        ],
        parse_states: vec![
            ParseState::lexing_with(0).recover(END),
            ParseState::lexing_with(0).shift(LETTER, 2).goto(WORD, 3),
            ParseState::lexing_with(0).reduce(END, WORD, 1),
            ParseState::lexing_with(0).accept(END),
        ],
    }
}

pub fn single_rule_table() -> GrammarTable {
    GrammarTable::encode(&single_rule_grammar()).expect("fixture grammar must encode")
}

pub fn strictdoc_table() -> &'static GrammarTable {
    strictdoc::grammar_table()
}

/// Tables that must not load, by name.
pub fn malformed_tables() -> Vec<(&'static str, GrammarTable)> {
    let valid = strictdoc_table().as_bytes();

    let mut trailing = valid.to_vec();
    trailing.push(0);

    let mut wrong_magic = valid.to_vec();
    wrong_magic[0] = b'X';

    let mut unresolved_goto = strictdoc::grammar_data();
    unresolved_goto.parse_states[1].gotos.push((strictdoc::sym::DOCUMENT, 99));

    vec![
        ("empty", GrammarTable::from_bytes(vec![])),
        ("header only", GrammarTable::from_bytes(valid[..8].to_vec())),
        ("truncated header", GrammarTable::from_bytes(valid[..5].to_vec())),
        ("truncated payload", GrammarTable::from_bytes(valid[..valid.len() / 2].to_vec())),
        ("trailing bytes", GrammarTable::from_bytes(trailing)),
        ("wrong magic", GrammarTable::from_bytes(wrong_magic)),
        (
            "future version",
            GrammarTable::encode_with_version(&strictdoc::grammar_data(), 99)
                .expect("fixture grammar must encode"),
        ),
        (
            "unresolved goto",
            GrammarTable::encode(&unresolved_goto).expect("fixture grammar must encode"),
        ),
    ]
}
