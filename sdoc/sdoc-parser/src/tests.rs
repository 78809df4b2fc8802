use std::thread;

use assert_matches::assert_matches;
use indoc::indoc;
use pretty_assertions::assert_eq;
use rstest::rstest;
use sdoc_grammar::{
    GrammarTable, TableError,
    data::{ParseState, SymbolFlags, SymbolMetadata},
    strictdoc,
};

use crate::{
    InputEdit, Language, LanguageError, Parser,
    strictdoc::{EditError, StrictDocParser, language},
    view::NodeViewExt,
};

#[test_log::test]
fn test_can_load_grammar() {
    let mut parser = Parser::new();
    parser
        .set_language(&language().expect("Error loading StrictDoc grammar"))
        .expect("Error loading StrictDoc grammar");
}

#[test_log::test]
fn load_leaves_the_table_untouched() {
    let table = strictdoc::grammar_table();
    let before = table.as_bytes().to_vec();

    let language = Language::load(table).unwrap();

    assert_eq!(before, table.as_bytes());
    assert_eq!("strictdoc", language.name());
    assert_eq!(21, language.symbol_count());
    assert_eq!(10, language.token_count());
    assert_eq!(17, language.state_count());
}

#[test_log::test]
fn symbol_lookup() {
    let language = language().unwrap();

    assert_eq!(Some("DOCUMENT"), language.node_kind_for_id(strictdoc::sym::DOCUMENT));
    assert_eq!(
        Some(strictdoc::sym::TRAILING_END_ERROR),
        language.id_for_node_kind("trailing_end_error")
    );
    assert_eq!(Some("ERROR"), language.node_kind_for_id(u16::MAX));
    assert_eq!(None, language.id_for_node_kind("section"));
}

#[test_log::test]
fn rejects_empty_table() {
    let table = GrammarTable::from_bytes(vec![]);

    assert!(Language::load(&table).is_none());
    assert_matches!(
        Language::try_load(&table),
        Err(LanguageError::Table(TableError::Empty))
    );
}

#[test_log::test]
fn rejects_garbage() {
    let table = GrammarTable::from_bytes(b"not a grammar table".to_vec());

    assert!(Language::load(&table).is_none());
    assert_matches!(
        Language::try_load(&table),
        Err(LanguageError::Table(TableError::BadMagic))
    );
}

#[rstest]
#[case::too_new(99)]
#[case::too_old(12)]
fn rejects_incompatible_version(#[case] version: u32) {
    let table = GrammarTable::encode_with_version(&strictdoc::grammar_data(), version).unwrap();

    assert!(Language::load(&table).is_none());
    assert_matches!(
        Language::try_load(&table),
        Err(LanguageError::IncompatibleVersion { version: v, .. }) if v == version
    );
}

#[test_log::test]
fn accepts_oldest_compatible_version() {
    let table = GrammarTable::encode_with_version(&strictdoc::grammar_data(), 13).unwrap();
    let language = Language::load(&table).unwrap();

    assert_eq!(13, language.version());
    Parser::new().set_language(&language).unwrap();
}

#[test_log::test]
fn rejects_inconsistent_grammar() {
    let mut data = strictdoc::grammar_data();
    data.parse_states[1].gotos.push((strictdoc::sym::EOF, 3));
    let table = GrammarTable::encode(&data).unwrap();

    assert!(Language::load(&table).is_none());
    assert_matches!(
        Language::try_load(&table),
        Err(LanguageError::Inconsistent(msg)) if msg.contains("goto on non-nonterminal")
    );
}

#[test_log::test]
fn rejects_oversized_tables() {
    let mut data = strictdoc::grammar_data();
    data.symbols
        .extend((0..1000).map(|index| SymbolMetadata::new(format!("filler{index}"), SymbolFlags::empty())));
    data.parse_states
        .extend((0..5000).map(|_| ParseState::lexing_with(0)));
    let table = GrammarTable::encode(&data).unwrap();

    assert!(Language::load(&table).is_none());
    assert_matches!(
        Language::try_load(&table),
        Err(LanguageError::Inconsistent(msg)) if msg.contains("table size limit")
    );
}

#[test_log::test]
fn rejects_grammar_that_never_accepts() {
    let mut data = strictdoc::grammar_data();
    data.parse_states[12].actions.clear();
    let table = GrammarTable::encode(&data).unwrap();

    assert_matches!(
        Language::try_load(&table),
        Err(LanguageError::Inconsistent(msg)) if msg.contains("accepts")
    );
}

#[test_log::test]
fn loads_from_many_threads() {
    let languages: Vec<Language> = thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| scope.spawn(|| Language::load(strictdoc::grammar_table())))
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap().unwrap())
            .collect()
    });

    // independent handles
    assert!(!languages[0].ptr_eq(&languages[1]));
    assert!(languages.iter().all(|language| language.name() == "strictdoc"));
}

#[test_log::test]
fn document_basic() {
    let document = StrictDocParser::new()
        .unwrap()
        .parse("[DOCUMENT]\n\n")
        .unwrap();
    let root = document.root_node();

    assert_eq!("top_node", root.kind());
    assert_eq!("[DOCUMENT]\n\n", document.source());

    let doc = root.child(0).unwrap();
    assert_eq!("DOCUMENT", doc.kind());
    assert_eq!(5, doc.child_count());
    assert_eq!(5, doc.named_child_count());
    assert_eq!("newline_character", doc.child(3).unwrap().kind());
    assert_eq!("newline_character", doc.child(4).unwrap().kind());
    assert_eq!(
        Some("DOCUMENT"),
        doc.child(1).unwrap().utf8_text(document.source())
    );
    assert!(!root.has_error());
}

#[test_log::test]
fn children_from_both_ends() {
    let document = StrictDocParser::new()
        .unwrap()
        .parse("[DOCUMENT]\n\n")
        .unwrap();
    let doc = document.root_node().child(0).unwrap();

    let forward: Vec<_> = doc.children().map(|node| node.byte_range()).collect();
    let mut backward: Vec<_> = doc.children().rev().map(|node| node.byte_range()).collect();
    backward.reverse();
    assert_eq!(vec![0..1, 1..9, 9..10, 10..11, 11..12], forward);
    assert_eq!(forward, backward);

    let mut children = doc.children();
    assert_eq!(5, children.len());
    assert_eq!("left_bracket", children.next().unwrap().kind());
    assert_eq!("newline_character", children.next_back().unwrap().kind());
    assert_eq!(3, children.len());
    assert_eq!(
        vec!["document_literal", "right_bracket", "newline_character"],
        children.map(|node| node.kind().to_string()).collect::<Vec<_>>()
    );
    assert_eq!(Some(10..11), doc.child(3).map(|node| node.byte_range()));
    assert_eq!(None, doc.child(5));
}

#[test_log::test]
fn document_debug_tree() {
    let document = StrictDocParser::new()
        .unwrap()
        .parse("[DOCUMENT]\n\n")
        .unwrap();

    assert_eq!(
        indoc! {r#"
            top_node 0..13
                DOCUMENT 0..12
                    left_bracket 0..1 "["
                    document_literal 1..9 "DOCUMENT"
                    right_bracket 9..10 "]"
                    newline_character 10..11 "\n"
                    newline_character 11..12 "\n"
                EOF 12..13 "\0"
        "#},
        document.debug_tree()
    );
    assert_eq!(
        "(top_node (DOCUMENT (left_bracket) (document_literal) (right_bracket) (newline_character) (newline_character)) (EOF))",
        document.tree().to_string()
    );
}

#[test_log::test]
fn document_extra_newline() {
    let error = StrictDocParser::new()
        .unwrap()
        .parse("[DOCUMENT]\n\n\n")
        .unwrap_err();

    assert_eq!("trailing_end_error", error.kind);

    let root = error.document.root_node();
    assert_eq!("top_node", root.kind());
    assert_eq!(2, root.child_count());

    let doc = root.child(0).unwrap();
    assert_eq!("DOCUMENT", doc.kind());
    assert_eq!(6, doc.child_count());
    assert_eq!("newline_character", doc.child(3).unwrap().kind());
    assert_eq!("newline_character", doc.child(4).unwrap().kind());
    assert_eq!("trailing_end_error", doc.child(5).unwrap().kind());
    assert_eq!("EOF", root.child(1).unwrap().kind());
}

#[rstest]
#[case::empty_spaces("   ", "document_error", "top_node")]
#[case::empty("", "document_error", "top_node")]
#[case::incomplete_literal("[DOC", "document_literal_error", "ERROR")]
#[case::misspelled_literal("[DOC UMENT]", "document_literal_error", "ERROR")]
#[case::no_first_newline("[DOCUMENT]", "newline_character_error", "top_node")]
#[case::only_one_newline("[DOCUMENT]\n", "newline_character_error", "top_node")]
#[case::space_instead_of_first_newline("[DOCUMENT] ", "newline_character_error", "ERROR")]
#[case::no_closing_bracket("[DOCUMENT\n\n", "right_bracket_error", "top_node")]
fn document_error(#[case] input: &str, #[case] expected_kind: &str, #[case] root_kind: &str) {
    let error = StrictDocParser::new().unwrap().parse(input).unwrap_err();

    assert_eq!(expected_kind, error.kind);
    assert_eq!(root_kind, error.document.root_node().kind());
    assert!(error.document.root_node().has_error());
    assert_eq!(input.len() + 1, error.document.root_node().end_byte());
}

#[rstest]
#[case::incomplete("[DOC")]
#[case::misspelled("[DOC UMENT]")]
fn broken_literal_gives_up_after_the_literal(#[case] input: &str) {
    let error = StrictDocParser::new().unwrap().parse(input).unwrap_err();
    let root = error.document.root_node();

    assert_eq!("ERROR", root.kind());
    assert_eq!("left_bracket", root.child(0).unwrap().kind());
    assert_eq!("document_literal_error", root.child(1).unwrap().kind());
    assert_eq!(1..2, std::ops::Range::from(error.span));
}

#[test_log::test]
fn error_spans() {
    let mut parser = StrictDocParser::new().unwrap();

    let error = parser.parse("[DOCUMENT]").unwrap_err();
    // inserted where the newline was expected
    assert_eq!(10..10, std::ops::Range::from(error.span));
    let inserted = error
        .document
        .root_node()
        .descendants()
        .find(|node| node.is_missing())
        .unwrap();
    assert_eq!("newline_character_error", inserted.kind());

    let error = parser.parse("[DOCUMENT] ").unwrap_err();
    assert_eq!(10..11, std::ops::Range::from(error.span));
    assert_eq!(
        "unexpected newline_character_error at 10..11",
        error.to_spanned().to_string()
    );
}

#[test_log::test]
fn misspelled_literal_skips_unknown_characters() {
    let error = StrictDocParser::new()
        .unwrap()
        .parse("[DOC UMENT]")
        .unwrap_err();
    let root = error.document.root_node();

    let skipped: Vec<_> = root
        .children()
        .filter(|node| node.is_error())
        .map(|node| node.utf8_text(error.document.text()).unwrap())
        .collect();
    assert_eq!(vec!["UMENT]\0"], skipped);
}

#[test_log::test]
fn find_children_by_kind() {
    let document = StrictDocParser::new()
        .unwrap()
        .parse("[DOCUMENT]\n\n")
        .unwrap();
    let doc = document.root_node().find_child_by_kind("DOCUMENT").unwrap();

    assert_eq!(2, doc.find_children_by_kind("newline_character").count());
    assert!(doc.find_child_by_kind("trailing_end_error").is_none());
}

#[rstest]
#[case::append_newline("[DOCUMENT]\n", 11..11, "\n")]
#[case::fix_literal("[DOC UMENT]\n\n", 4..5, "")]
#[case::break_literal("[DOCUMENT]\n\n", 3..4, "X")]
#[case::trailing("[DOCUMENT]\n\n", 12..12, "\n\n")]
#[case::clear("[DOCUMENT]\n\n", 0..12, "")]
fn incremental_reparse_matches_fresh_parse(
    #[case] input: &str,
    #[case] range: std::ops::Range<usize>,
    #[case] replacement: &str,
) {
    let mut parser = StrictDocParser::new().unwrap();
    let document = parser.parse(input).unwrap_or_else(|error| *error.document);

    let edited = parser
        .edit(document, range.clone(), replacement)
        .unwrap_or_else(EditError::into_document);

    let mut expected_source = input.to_string();
    expected_source.replace_range(range, replacement);
    let fresh = StrictDocParser::new()
        .unwrap()
        .parse(&expected_source)
        .unwrap_or_else(|error| *error.document);

    assert_eq!(expected_source, edited.source());
    assert_eq!(fresh.tree().to_string(), edited.tree().to_string());
    assert_eq!(fresh.debug_tree(), edited.debug_tree());
}

#[test_log::test]
fn incremental_reparse_reuses_leading_tokens() {
    let mut parser = StrictDocParser::new().unwrap();
    let document = parser.parse("[DOCUMENT]\n\n").unwrap();

    let result = parser.edit(document, 11..11, "\n");

    assert_matches!(result, Err(EditError::Syntax(error)) if error.kind == "trailing_end_error");
    // `[` and `DOCUMENT`
    assert_eq!(2, parser.reused_node_count());
}

#[rstest]
#[case::past_the_end(5..15)]
#[case::reversed(std::ops::Range { start: 5, end: 3 })]
#[case::inside_a_char(1..2)]
fn edit_rejects_invalid_ranges(#[case] range: std::ops::Range<usize>) {
    let mut parser = StrictDocParser::new().unwrap();
    let document = parser
        .parse("[\u{e9}DOCUMENT]\n\n")
        .unwrap_or_else(|error| *error.document);

    let error = parser.edit(document, range.clone(), "X").unwrap_err();

    assert_eq!(format!("invalid edit {range:?}"), error.to_string());
    assert_eq!("[\u{e9}DOCUMENT]\n\n", error.into_document().source());
}

#[test_log::test]
fn edit_marks_changed_nodes() {
    let mut parser = Parser::new();
    parser.set_language(&language().unwrap()).unwrap();
    let mut tree = parser.parse("[DOCUMENT]\n\n\0", None).unwrap();

    tree.edit(&InputEdit::replace(10..11, ""));

    let root = tree.root_node();
    assert!(root.has_changes());
    let doc = root.child(0).unwrap();
    assert!(!doc.child(0).unwrap().has_changes());
    assert!(doc.child(3).unwrap().has_changes());
    assert_eq!(11, doc.child(4).unwrap().end_byte());
}

#[test_log::test]
fn non_incremental_config_reuses_nothing() {
    let mut parser = StrictDocParser::with_config(crate::ParserConfig {
        incremental: false,
        ..Default::default()
    })
    .unwrap();
    let document = parser.parse("[DOCUMENT]\n\n").unwrap();

    parser.edit(document, 11..11, "\n").unwrap_err();

    assert_eq!(0, parser.reused_node_count());
}
