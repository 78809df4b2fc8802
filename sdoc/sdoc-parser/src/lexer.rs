//! Runs a grammar's lexer automaton over the source text.

use sdoc_grammar::{Symbol, data::LexStep};

use crate::language::Language;

/// A token found by the lexer. All lengths are in bytes.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) struct Lexed {
    pub symbol: Symbol,
    /// Skipped input in front of the token
    pub padding: u32,
    pub size: u32,
    /// How far past the end of the token the lexer had to look
    pub lookahead_bytes: u32,
}

/// Find the longest token starting at `position`, beginning in `lex_state`.
///
/// Transitions are tried in order. The lexer keeps going while some transition
/// matches and falls back to the last accepting state it passed.
pub(crate) fn lex(language: &Language, text: &str, position: u32, lex_state: u16) -> Option<Lexed> {
    let start = position as usize;
    let mut state = lex_state;
    let mut cursor = start;
    let mut token_start = start;
    let mut examined = start;
    let mut accepted: Option<(Symbol, usize)> = None;
    let mut took_end_step = false;

    loop {
        let current = language.lex_state(state);
        if let Some(symbol) = current.accept {
            accepted = Some((symbol, cursor));
        }

        let next_char = text.get(cursor..).and_then(|rest| rest.chars().next());
        let step = match next_char {
            Some(c) => {
                examined = examined.max(cursor + c.len_utf8());
                current.step_for(c)
            }
            None if took_end_step => None,
            None => {
                took_end_step = true;
                current.at_end
            }
        };

        let consumed = next_char.map(char::len_utf8).unwrap_or(0);
        match step {
            None => break,
            Some(LexStep::Advance(next)) => {
                cursor += consumed;
                state = next;
            }
            Some(LexStep::Skip(next)) => {
                cursor += consumed;
                token_start = cursor;
                accepted = None;
                state = next;
            }
        }
    }

    let (symbol, end) = accepted?;

    Some(Lexed {
        symbol,
        padding: (token_start - start) as u32,
        size: (end - token_start) as u32,
        lookahead_bytes: (examined.max(end) - end) as u32,
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use sdoc_grammar::strictdoc::{self, sym};

    use super::*;

    fn language() -> Language {
        Language::load(strictdoc::grammar_table()).unwrap()
    }

    #[track_caller]
    fn lex_one(text: &str, position: u32, lex_state: u16) -> Option<(&str, String)> {
        let language = language();
        lex(&language, text, position, lex_state).map(|lexed| {
            let start = (position + lexed.padding) as usize;
            let end = start + lexed.size as usize;
            (
                &text[start..end],
                language.node_kind_for_id(lexed.symbol).unwrap().to_string(),
            )
        })
    }

    #[test]
    fn keyword_literal() {
        assert_eq!(
            Some(("DOCUMENT", "document_literal".to_string())),
            lex_one("[DOCUMENT]", 1, 3)
        );
    }

    #[test]
    fn backtracks_to_last_accepting_state() {
        // `D` accepts as a literal error, `DOC` is a prefix of nothing accepting
        assert_eq!(
            Some(("D", "document_literal_error_token1".to_string())),
            lex_one("[DOC", 1, 3)
        );
    }

    #[test]
    fn skipped_whitespace_becomes_padding() {
        let language = language();
        let lexed = lex(&language, "  \0", 0, 0).unwrap();

        assert_eq!(sym::EOF, lexed.symbol);
        assert_eq!(2, lexed.padding);
        assert_eq!(1, lexed.size);
    }

    #[test]
    fn end_of_input() {
        let language = language();
        let lexed = lex(&language, "", 0, 0).unwrap();

        assert_eq!(sym::END, lexed.symbol);
        assert_eq!(0, lexed.size);
    }

    #[test]
    fn no_token_in_mode() {
        // the newline mode has nothing for the terminator
        assert_eq!(None, lex_one("\0", 0, 6));
    }

    #[test]
    fn greedy_trailing_whitespace() {
        assert_eq!(
            Some(("\n \n", "trailing_end_error".to_string())),
            lex_one("\n \n\0", 0, 1)
        );
    }

    #[test]
    fn lookahead_covers_the_rejected_character() {
        let language = language();
        let lexed = lex(&language, "DOCUMENT]", 0, 3).unwrap();

        assert_eq!(sym::DOCUMENT_LITERAL, lexed.symbol);
        assert_eq!(8, lexed.size);
        // the `]` ended the literal
        assert_eq!(1, lexed.lookahead_bytes);

        let lexed = lex(&language, "DOX", 0, 3).unwrap();
        assert_eq!(1, lexed.size);
        // looked at `O` and `X` before backtracking to `D`
        assert_eq!(2, lexed.lookahead_bytes);
    }
}
