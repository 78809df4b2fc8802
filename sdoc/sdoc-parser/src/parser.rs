//! The table driven LR parser.
//!
//! The parser shifts and reduces according to the loaded [Language] until the
//! grammar accepts. When the lookahead has no action the parser recovers, in
//! order of preference, by
//!
//! 1. the state's default reduction,
//! 2. one of the grammar's recovery productions, either inserted without
//!    width or wrapping the lookahead token,
//! 3. skipping the lookahead into an `ERROR` node,
//!
//! and wraps the whole input in an `ERROR` root when nothing else is left.
//! An error production that has consumed input is not followed by another
//! repair: the next error gives up.

use std::sync::Arc;

use fnv::FnvHashSet;
use sdoc_grammar::{
    StateId, Symbol,
    data::{END_SYMBOL, ERROR_STATE, ERROR_SYMBOL, ParseAction, START_STATE},
};
use thin_vec::{ThinVec, thin_vec};
use tracing::{debug, trace};

use crate::{
    config::ParserConfig,
    language::{Language, LanguageError, check_version},
    lexer::lex,
    subtree::{Subtree, SubtreeFlags},
    tree::Tree,
};

/// How many recovery productions a zero-width insertion may chain through
/// before reaching a state that handles the lookahead.
const INSERTION_DEPTH: u32 = 8;

#[derive(Debug, Default)]
pub struct Parser {
    language: Option<Language>,
    config: ParserConfig,
    reused_nodes: usize,
}

impl Parser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ParserConfig) -> Self {
        Self {
            language: None,
            config,
            reused_nodes: 0,
        }
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    pub fn set_language(&mut self, language: &Language) -> Result<(), LanguageError> {
        check_version(language.version())?;
        self.language = Some(language.clone());
        Ok(())
    }

    pub fn language(&self) -> Option<&Language> {
        self.language.as_ref()
    }

    /// Parse `text`, reusing the unchanged parts of `old_tree`.
    ///
    /// `old_tree` must have been edited to match `text`, see [Tree::edit].
    /// Returns `None` when no language has been set.
    pub fn parse(&mut self, text: &str, old_tree: Option<&Tree>) -> Option<Tree> {
        let language = self.language.clone()?;
        Some(self.parse_language(language, text, old_tree))
    }

    pub(crate) fn parse_language(
        &mut self,
        language: Language,
        text: &str,
        old_tree: Option<&Tree>,
    ) -> Tree {
        let old_root = old_tree
            .filter(|_| self.config.incremental)
            .filter(|tree| tree.language().ptr_eq(&language))
            .map(|tree| tree.root_subtree().clone());

        debug!(
            language = %language.name(),
            len = text.len(),
            incremental = old_root.is_some(),
            "parse"
        );

        let mut run = ParseRun {
            language: &language,
            text,
            config: self.config,
            stack: vec![],
            position: 0,
            old_root,
            inserted: Default::default(),
            recoveries: 0,
            reused_nodes: 0,
        };
        let root = run.run();

        self.reused_nodes = run.reused_nodes;
        debug!(
            reused = run.reused_nodes,
            recoveries = run.recoveries,
            has_error = root.has_error(),
            "parsed"
        );

        Tree::new(root, language)
    }

    /// The number of subtrees taken over from the old tree by the last parse.
    pub fn reused_node_count(&self) -> usize {
        self.reused_nodes
    }
}

struct StackEntry {
    /// The state after pushing the subtree
    state: StateId,
    subtree: Arc<Subtree>,
}

struct Lookahead {
    subtree: Arc<Subtree>,
    /// The lex state the token was looked for in
    lex_state: u16,
}

enum Recovery {
    Continue(Option<Lookahead>),
    GiveUp(Arc<Subtree>),
}

struct ParseRun<'a> {
    language: &'a Language,
    text: &'a str,
    config: ParserConfig,
    stack: Vec<StackEntry>,
    /// Bytes covered by the stack
    position: u32,
    old_root: Option<Arc<Subtree>>,
    /// Where zero-width recovery nodes were inserted, as (state, position)
    inserted: FnvHashSet<(StateId, u32)>,
    recoveries: u32,
    reused_nodes: usize,
}

impl ParseRun<'_> {
    fn run(&mut self) -> Arc<Subtree> {
        let language = self.language;
        let mut lookahead: Option<Lookahead> = None;

        loop {
            let state = self.top_state();

            if lookahead.is_none() && self.reuse_node(state) {
                continue;
            }

            let mut next = match lookahead.take() {
                Some(lookahead) => lookahead,
                None => self.lex_lookahead(state),
            };

            let mut action = language.action(state, next.subtree.symbol);
            if action.is_none() && next.lex_state != language.lex_mode(state) {
                next = self.lex_lookahead(state);
                action = language.action(state, next.subtree.symbol);
            }

            match action {
                Some(ParseAction::Shift(target)) => {
                    trace!(state, target, symbol = next.subtree.symbol, "shift");
                    self.shift(target, next.subtree);
                }
                Some(ParseAction::Reduce {
                    symbol,
                    child_count,
                }) => {
                    if !self.reduce(symbol, child_count, &next.subtree) {
                        return self.give_up(next.subtree);
                    }
                    lookahead = Some(next);
                }
                Some(ParseAction::Accept) if next.subtree.symbol == END_SYMBOL => {
                    return self.accept(next.subtree);
                }
                _ => match self.recover(state, next) {
                    Recovery::Continue(next) => lookahead = next,
                    Recovery::GiveUp(next) => return self.give_up(next),
                },
            }
        }
    }

    fn top_state(&self) -> StateId {
        self.stack
            .last()
            .map(|entry| entry.state)
            .unwrap_or(START_STATE)
    }

    fn push(&mut self, state: StateId, subtree: Arc<Subtree>) {
        self.stack.push(StackEntry { state, subtree });
    }

    fn shift(&mut self, state: StateId, subtree: Arc<Subtree>) {
        self.position += subtree.total_size();
        self.push(state, subtree);
    }

    /// Lex the next token in the state's lex mode, falling back to the error
    /// state's mode, a single unknown character and finally the end of input.
    fn lex_lookahead(&self, state: StateId) -> Lookahead {
        let language = self.language;
        let lex_state = language.lex_mode(state);
        let error_lex_state = language.lex_mode(ERROR_STATE);

        let lexed = lex(language, self.text, self.position, lex_state).or_else(|| {
            if error_lex_state != lex_state {
                lex(language, self.text, self.position, error_lex_state)
            } else {
                None
            }
        });

        let subtree = match lexed {
            Some(lexed) => Subtree::token(
                language,
                lexed.symbol,
                lexed.padding,
                lexed.size,
                lexed.lookahead_bytes,
                state,
            ),
            None => {
                let rest = self.text.get(self.position as usize..).unwrap_or_default();
                match rest.chars().next() {
                    Some(c) => {
                        trace!(position = self.position, ?c, "no token");
                        Subtree::token(language, ERROR_SYMBOL, 0, c.len_utf8() as u32, 0, state)
                    }
                    None => Subtree::token(language, END_SYMBOL, 0, 0, 0, state),
                }
            }
        };

        Lookahead {
            subtree: Arc::new(subtree),
            lex_state,
        }
    }

    /// Pop the children of `symbol` and push the new node.
    ///
    /// Extras on top of the stack stay above the new node. Returns `false`
    /// without touching the stack when the uncovered state has no goto.
    fn reduce(&mut self, symbol: Symbol, child_count: u8, lookahead: &Subtree) -> bool {
        let mut index = self.stack.len();
        while index > 0 && self.stack[index - 1].subtree.is_extra() {
            index -= 1;
        }
        let extras_start = index;

        let mut remaining = child_count;
        while remaining > 0 && index > 0 {
            index -= 1;
            if !self.stack[index].subtree.is_extra() {
                remaining -= 1;
            }
        }

        let state = match index {
            0 => START_STATE,
            index => self.stack[index - 1].state,
        };
        let Some(target) = self.language.goto(state, symbol) else {
            debug!(state, symbol, "no goto after reduction");
            return false;
        };

        let extras: Vec<_> = self
            .stack
            .drain(extras_start..)
            .map(|entry| entry.subtree)
            .collect();
        let children: ThinVec<_> = self.stack.drain(index..).map(|entry| entry.subtree).collect();

        let mut node = Subtree::node(self.language, symbol, children, state);
        // the reduction depended on the lookahead token
        let extras_size: u32 = extras.iter().map(|extra| extra.total_size()).sum();
        node.lookahead_bytes = node
            .lookahead_bytes
            .max(extras_size + lookahead.total_size() + lookahead.lookahead_bytes);

        trace!(state, target, symbol, child_count, "reduce");

        self.push(target, Arc::new(node));
        for extra in extras {
            self.push(target, extra);
        }

        true
    }

    fn accept(&mut self, end: Arc<Subtree>) -> Arc<Subtree> {
        let entries = std::mem::take(&mut self.stack);
        let Some(root_index) = entries.iter().rposition(|entry| !entry.subtree.is_extra()) else {
            self.stack = entries;
            return self.give_up(end);
        };

        let root = entries[root_index].subtree.clone();
        let mut children = ThinVec::with_capacity(entries.len() + root.children.len());
        for (index, entry) in entries.into_iter().enumerate() {
            if index == root_index && !root.is_token() {
                children.extend(root.children.iter().cloned());
            } else {
                children.push(entry.subtree);
            }
        }
        children.push(end);

        trace!(symbol = root.symbol, "accept");

        Arc::new(Subtree::node(
            self.language,
            root.symbol,
            children,
            root.parse_state,
        ))
    }

    /// Wrap everything parsed so far, the lookahead and the rest of the input
    /// in an `ERROR` root.
    fn give_up(&mut self, lookahead: Arc<Subtree>) -> Arc<Subtree> {
        debug!(position = self.position, "giving up on the input");

        let language = self.language;
        let mut children: ThinVec<_> = self.stack.drain(..).map(|entry| entry.subtree).collect();

        if lookahead.symbol == END_SYMBOL {
            children.push(lookahead);
        } else {
            let lookahead_end = self.position + lookahead.total_size();
            let rest = (self.text.len() as u32).saturating_sub(lookahead_end);

            if lookahead.is_error_token() {
                let mut skipped = Subtree::clone(&lookahead);
                skipped.size += rest;
                children.push(Arc::new(skipped));
            } else {
                children.push(lookahead);
                if rest > 0 {
                    children.push(Arc::new(Subtree::token(
                        language,
                        ERROR_SYMBOL,
                        0,
                        rest,
                        0,
                        ERROR_STATE,
                    )));
                }
            }
            children.push(Arc::new(Subtree::token(
                language,
                END_SYMBOL,
                0,
                0,
                0,
                ERROR_STATE,
            )));
        }

        Arc::new(Subtree::node(language, ERROR_SYMBOL, children, ERROR_STATE))
    }

    fn recover(&mut self, state: StateId, lookahead: Lookahead) -> Recovery {
        let language = self.language;
        let symbol = lookahead.subtree.symbol;

        self.recoveries += 1;
        if self.recoveries > self.config.max_recoveries {
            debug!(max = self.config.max_recoveries, "recovery limit reached");
            return Recovery::GiveUp(lookahead.subtree);
        }

        if let Some((production, child_count)) = language.default_reduction(state) {
            if self.reduce(production, child_count, &lookahead.subtree) {
                trace!(state, production, "default reduction");
                return Recovery::Continue(Some(lookahead));
            }
        }

        if self
            .stack
            .iter()
            .any(|entry| entry.subtree.has_consumed_recovery())
        {
            debug!(state, symbol, "error after an error production");
            return Recovery::GiveUp(lookahead.subtree);
        }

        let recovery_gotos = language.recovery_gotos(state);

        if !self.inserted.contains(&(state, self.position)) {
            let insertion = recovery_gotos
                .iter()
                .find(|(_, target)| self.can_handle(*target, symbol, INSERTION_DEPTH));

            if let Some(&(production, target)) = insertion {
                trace!(state, production, position = self.position, "insert");
                self.inserted.insert((state, self.position));
                let node = Subtree::missing(language, production, state);
                self.push(target, Arc::new(node));
                return Recovery::Continue(Some(lookahead));
            }
        }

        if symbol != END_SYMBOL && symbol != ERROR_SYMBOL {
            if let Some(&(production, target)) = recovery_gotos.first() {
                trace!(state, production, symbol, "wrap");
                let node = Subtree::node(language, production, thin_vec![lookahead.subtree], state);
                self.shift(target, Arc::new(node));
                return Recovery::Continue(None);
            }
        }

        if symbol == END_SYMBOL {
            return Recovery::GiveUp(lookahead.subtree);
        }

        self.skip(lookahead.subtree);
        Recovery::Continue(None)
    }

    /// Whether the lookahead can be handled in `state`, possibly after
    /// inserting more recovery nodes.
    fn can_handle(&self, state: StateId, symbol: Symbol, depth: u32) -> bool {
        let language = self.language;
        language.action(state, symbol).is_some()
            || language.default_reduction(state).is_some()
            || (depth > 0
                && language
                    .recovery_gotos(state)
                    .iter()
                    .any(|(_, target)| self.can_handle(*target, symbol, depth - 1)))
    }

    /// Consume the lookahead as an `ERROR` extra, merging with a preceding one.
    fn skip(&mut self, token: Arc<Subtree>) {
        trace!(position = self.position, symbol = token.symbol, "skip");

        let state = self.top_state();
        self.position += token.total_size();

        let is_error_extra = self
            .stack
            .last()
            .is_some_and(|entry| entry.subtree.symbol == ERROR_SYMBOL && entry.subtree.is_extra());

        let previous = if is_error_extra {
            self.stack.pop().map(|entry| entry.subtree)
        } else {
            None
        };

        let error = match previous {
            Some(previous) => merge_errors(self.language, &previous, token, state),
            None if token.is_error_token() => token,
            None => error_node(self.language, thin_vec![token], state),
        };

        self.push(state, error);
    }

    fn reuse_node(&mut self, state: StateId) -> bool {
        let Some(old_root) = &self.old_root else {
            return false;
        };
        let language = self.language;

        for candidate in reusable_candidates(old_root, self.position) {
            if !self.can_reuse(&candidate, state) {
                continue;
            }

            let target = if language.is_terminal(candidate.symbol) {
                match language.action(state, candidate.symbol) {
                    Some(ParseAction::Shift(target)) => target,
                    _ => continue,
                }
            } else {
                match language.goto(state, candidate.symbol) {
                    Some(target) => target,
                    None => continue,
                }
            };

            trace!(
                state,
                target,
                symbol = candidate.symbol,
                position = self.position,
                "reuse"
            );
            self.reused_nodes += 1;
            self.shift(target, candidate);
            return true;
        }

        false
    }

    fn can_reuse(&self, candidate: &Subtree, state: StateId) -> bool {
        if candidate.has_changes()
            || candidate.has_error()
            || candidate.is_extra()
            || candidate.is_missing()
            || candidate.total_size() == 0
            || candidate.symbol == ERROR_SYMBOL
        {
            return false;
        }

        if self.language.is_terminal(candidate.symbol) {
            self.language.lex_mode(candidate.parse_state) == self.language.lex_mode(state)
        } else {
            candidate.parse_state == state
        }
    }
}

/// The subtrees of the old tree starting at `position`, outermost first.
/// The root itself is never a candidate.
fn reusable_candidates(root: &Arc<Subtree>, position: u32) -> Vec<Arc<Subtree>> {
    let mut candidates = vec![];
    let mut node = root;
    let mut node_start = 0;

    'descend: loop {
        let mut child_start = node_start;
        for child in &node.children {
            let child_end = child_start + child.total_size();
            if child_start > position {
                break;
            }
            if (child_start == position && child.total_size() > 0) || position < child_end {
                if child_start == position {
                    candidates.push(child.clone());
                }
                node = child;
                node_start = child_start;
                continue 'descend;
            }
            child_start = child_end;
        }
        break;
    }

    candidates
}

fn error_node(language: &Language, children: ThinVec<Arc<Subtree>>, state: StateId) -> Arc<Subtree> {
    let mut node = Subtree::node(language, ERROR_SYMBOL, children, state);
    node.flags |= SubtreeFlags::EXTRA;
    Arc::new(node)
}

fn merge_errors(
    language: &Language,
    previous: &Arc<Subtree>,
    token: Arc<Subtree>,
    state: StateId,
) -> Arc<Subtree> {
    if previous.is_error_token() && token.is_error_token() {
        return Arc::new(join_error_tokens(previous, &token));
    }

    let mut children = if previous.is_token() {
        thin_vec![previous.clone()]
    } else {
        previous.children.clone()
    };

    match children.last_mut() {
        Some(last) if last.is_error_token() && token.is_error_token() => {
            *last = Arc::new(join_error_tokens(last, &token));
        }
        _ => children.push(token),
    }

    error_node(language, children, state)
}

fn join_error_tokens(first: &Subtree, second: &Subtree) -> Subtree {
    let mut joined = first.clone();
    joined.size = first.size + second.total_size();
    joined.lookahead_bytes = second.lookahead_bytes;
    joined
}
