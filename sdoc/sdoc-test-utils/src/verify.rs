//! Verdicts on compiled grammar tables.
//!
//! Every check loads the table exactly once and never retries: a table that
//! fails to load will fail the same way every time.

use std::ops::Range;

use sdoc_grammar::GrammarTable;
use sdoc_parser::{InputEdit, Language, Node, Parser, view::NodeViewExt};
use thiserror::Error;
use tracing::{debug, warn};

pub const GRAMMAR_LOAD_FAILURE: &str = "Error loading grammar";
pub const SOURCE_PARSE_FAILURE: &str = "Error parsing source";
pub const INCREMENTAL_REPARSE_DIVERGED: &str = "Incremental reparse diverged";

#[derive(Clone, Copy, PartialEq, Eq, Debug, Error)]
#[error("Error loading grammar")]
pub struct GrammarLoadFailure;

#[derive(Clone, PartialEq, Eq, Debug, Error)]
pub enum VerificationFailure {
    #[error(transparent)]
    GrammarLoad(#[from] GrammarLoadFailure),
    #[error("{0}")]
    Check(String),
    #[error("verification has not run")]
    NotRun,
}

#[derive(Clone, PartialEq, Eq, Default, Debug)]
pub enum Verdict {
    #[default]
    NotRun,
    Passed,
    Failed {
        message: String,
    },
}

impl Verdict {
    fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }

    pub fn is_passed(&self) -> bool {
        matches!(self, Self::Passed)
    }

    pub fn is_finished(&self) -> bool {
        !matches!(self, Self::NotRun)
    }

    /// The diagnostic of a failed verdict.
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Failed { message } => Some(message),
            _ => None,
        }
    }

    pub fn into_result(self) -> Result<(), VerificationFailure> {
        match self {
            Self::Passed => Ok(()),
            Self::NotRun => Err(VerificationFailure::NotRun),
            Self::Failed { message } if message == GRAMMAR_LOAD_FAILURE => {
                Err(GrammarLoadFailure.into())
            }
            Self::Failed { message } => Err(VerificationFailure::Check(message)),
        }
    }

    #[track_caller]
    pub fn assert_passed(&self) {
        match self {
            Self::Passed => {}
            Self::NotRun => panic!("verification has not run"),
            Self::Failed { message } => panic!("{message}"),
        }
    }
}

/// A verification that runs at most once.
///
/// The first [VerificationCase::run] moves the case from `NotRun` to `Passed`
/// or `Failed`, later runs return the recorded verdict.
pub struct VerificationCase<'a> {
    check: Box<dyn FnMut() -> Verdict + 'a>,
    verdict: Verdict,
}

impl<'a> VerificationCase<'a> {
    /// A case verifying that `table` loads.
    pub fn new(table: &'a GrammarTable) -> Self {
        Self::from_fn(move || verify_grammar_loads(table))
    }

    pub fn from_fn(check: impl FnMut() -> Verdict + 'a) -> Self {
        Self {
            check: Box::new(check),
            verdict: Verdict::NotRun,
        }
    }

    pub fn verdict(&self) -> &Verdict {
        &self.verdict
    }

    pub fn run(&mut self) -> &Verdict {
        if !self.verdict.is_finished() {
            self.verdict = (self.check)();
        }
        &self.verdict
    }
}

/// Load `table` and check the parser accepts the resulting language.
pub fn verify_grammar_loads(table: &GrammarTable) -> Verdict {
    match load_parser(table) {
        Ok(_) => {
            debug!("grammar loads");
            Verdict::Passed
        }
        Err(failure) => Verdict::failed(failure.to_string()),
    }
}

/// Load `table`, parse `source` and check the tree is free of errors and well formed.
pub fn verify_grammar_parses(table: &GrammarTable, source: &str) -> Verdict {
    let mut parser = match load_parser(table) {
        Ok(parser) => parser,
        Err(failure) => return Verdict::failed(failure.to_string()),
    };

    let Some(tree) = parser.parse(source, None) else {
        return Verdict::failed(SOURCE_PARSE_FAILURE);
    };
    let root = tree.root_node();

    if root.has_error() {
        debug!(tree = %tree, "source has syntax errors");
        return Verdict::failed(SOURCE_PARSE_FAILURE);
    }

    match check_well_formed(root, source.len()) {
        Ok(()) => Verdict::Passed,
        Err(detail) => Verdict::failed(format!("Malformed syntax tree: {detail}")),
    }
}

/// Parse `source`, replace `range` with `replacement` and check that reparsing
/// with the edited old tree gives the same tree as parsing from scratch.
pub fn verify_incremental_reparse(
    table: &GrammarTable,
    source: &str,
    range: Range<usize>,
    replacement: &str,
) -> Verdict {
    let mut parser = match load_parser(table) {
        Ok(parser) => parser,
        Err(failure) => return Verdict::failed(failure.to_string()),
    };
    if source.get(range.clone()).is_none() {
        return Verdict::failed(format!("Invalid edit {range:?}"));
    }

    let mut edited_source = source.to_string();
    edited_source.replace_range(range.clone(), replacement);

    let Some(mut old_tree) = parser.parse(source, None) else {
        return Verdict::failed(SOURCE_PARSE_FAILURE);
    };
    old_tree.edit(&InputEdit::replace(range, replacement));

    let (Some(reparsed), Some(fresh)) = (
        parser.parse(&edited_source, Some(&old_tree)),
        parser.parse(&edited_source, None),
    ) else {
        return Verdict::failed(SOURCE_PARSE_FAILURE);
    };

    let reparsed_dump = reparsed.debug_tree(&edited_source).to_string();
    let fresh_dump = fresh.debug_tree(&edited_source).to_string();

    if reparsed_dump == fresh_dump {
        Verdict::Passed
    } else {
        debug!(%reparsed_dump, %fresh_dump, "trees differ");
        Verdict::failed(INCREMENTAL_REPARSE_DIVERGED)
    }
}

fn load_parser(table: &GrammarTable) -> Result<Parser, GrammarLoadFailure> {
    let language = Language::load(table).ok_or(GrammarLoadFailure)?;

    let mut parser = Parser::new();
    parser.set_language(&language).map_err(|error| {
        warn!(%error, "parser rejected the language");
        GrammarLoadFailure
    })?;

    Ok(parser)
}

fn check_well_formed(root: Node, len: usize) -> Result<(), String> {
    if root.end_byte() != len {
        return Err(format!(
            "root ends at {} but the source has {len} bytes",
            root.end_byte()
        ));
    }

    for node in root.descendants() {
        let mut previous_end = node.start_byte();
        for child in node.children() {
            if child.start_byte() < previous_end {
                return Err(format!("{child:?} overlaps its preceding sibling"));
            }
            if !node.span().encloses(child.span()) {
                return Err(format!("{child:?} reaches outside {node:?}"));
            }
            previous_end = child.end_byte();
        }
    }

    Ok(())
}
