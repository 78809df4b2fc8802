//! Parsing StrictDoc documents.
//!
//! The StrictDoc grammar expects its input to end with a NUL character. The
//! [StrictDocParser] appends it and reports the first syntax error it finds in
//! the resulting tree.

use std::ops::Range;

use sdoc_core::{error::SpannedMsgError, span::U32Span};
use sdoc_grammar::strictdoc::grammar_table;
use thiserror::Error;
use tracing::debug;

use crate::{
    config::ParserConfig,
    edit::InputEdit,
    language::{Language, LanguageError},
    parser::Parser,
    tree::{Node, Tree},
    view::NodeViewExt,
};

pub const TERMINATOR: char = '\0';

/// Load the StrictDoc grammar.
pub fn language() -> Result<Language, LanguageError> {
    Language::try_load(grammar_table())
}

pub struct StrictDocParser {
    parser: Parser,
    language: Language,
}

/// A syntactically valid document.
#[derive(Clone, Debug)]
pub struct Document {
    /// The source with the terminator appended
    text: String,
    tree: Tree,
}

#[derive(Debug, Error)]
#[error("syntax error: {kind} at {span:?}")]
pub struct DocumentError {
    /// Kind of the node where the first error was found
    pub kind: String,
    pub span: U32Span,
    /// The document as far as it could be parsed
    pub document: Box<Document>,
}

#[derive(Debug, Error)]
pub enum EditError {
    #[error("invalid edit {range:?}")]
    InvalidRange {
        range: Range<usize>,
        /// The document, left as it was
        document: Box<Document>,
    },
    #[error(transparent)]
    Syntax(DocumentError),
}

impl StrictDocParser {
    pub fn new() -> Result<Self, LanguageError> {
        Self::with_config(ParserConfig::default())
    }

    pub fn with_config(config: ParserConfig) -> Result<Self, LanguageError> {
        let language = language()?;
        let mut parser = Parser::with_config(config);
        parser.set_language(&language)?;

        Ok(Self { parser, language })
    }

    pub fn parse(&mut self, input: &str) -> Result<Document, DocumentError> {
        let mut text = String::with_capacity(input.len() + 1);
        text.push_str(input);
        text.push(TERMINATOR);

        self.parse_text(text, None)
    }

    /// Replace `range` of the document's source with `replacement` and parse
    /// it again, reusing what the edit did not touch.
    ///
    /// `range` must lie within [Document::source] on char boundaries.
    pub fn edit(
        &mut self,
        document: Document,
        range: Range<usize>,
        replacement: &str,
    ) -> Result<Document, EditError> {
        if document.source().get(range.clone()).is_none() {
            return Err(EditError::InvalidRange {
                range,
                document: Box::new(document),
            });
        }

        let Document { mut text, mut tree } = document;
        text.replace_range(range.clone(), replacement);
        tree.edit(&InputEdit::replace(range, replacement));

        self.parse_text(text, Some(&tree))
            .map_err(EditError::Syntax)
    }

    /// Subtrees reused by the last [StrictDocParser::edit].
    pub fn reused_node_count(&self) -> usize {
        self.parser.reused_node_count()
    }

    fn parse_text(&mut self, text: String, old_tree: Option<&Tree>) -> Result<Document, DocumentError> {
        let tree = self
            .parser
            .parse_language(self.language.clone(), &text, old_tree);

        let error = first_error(tree.root_node()).map(|node| (node.kind().to_string(), node.span()));
        let document = Document { text, tree };

        match error {
            None => Ok(document),
            Some((kind, span)) => {
                debug!(%kind, ?span, "syntax error");
                Err(DocumentError {
                    kind,
                    span,
                    document: Box::new(document),
                })
            }
        }
    }
}

/// The first error production in pre-order, or else the first skipped or
/// missing node.
fn first_error(root: Node) -> Option<Node> {
    if !root.has_error() {
        return None;
    }

    root.descendants()
        .find(|node| node.is_recovery())
        .or_else(|| {
            root.descendants()
                .find(|node| node.is_error() || node.is_missing())
        })
}

impl Document {
    /// The source as it was given to the parser.
    pub fn source(&self) -> &str {
        self.text.strip_suffix(TERMINATOR).unwrap_or(&self.text)
    }

    /// The source including the terminator.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn root_node(&self) -> Node<'_> {
        self.tree.root_node()
    }

    pub fn debug_tree(&self) -> String {
        self.tree.debug_tree(&self.text).to_string()
    }
}

impl EditError {
    /// The document after the edit, or unchanged if the edit was rejected.
    pub fn into_document(self) -> Document {
        match self {
            Self::InvalidRange { document, .. } => *document,
            Self::Syntax(error) => *error.document,
        }
    }
}

impl DocumentError {
    pub fn to_spanned(&self) -> SpannedMsgError {
        SpannedMsgError::new(format!("unexpected {}", self.kind), self.span)
    }
}
