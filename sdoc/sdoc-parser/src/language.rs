//! Loading a [GrammarTable] into a [Language] the parser can run.

use std::{fmt::Debug, sync::Arc};

use fnv::FnvHashMap;
use sdoc_grammar::{
    GrammarData, GrammarTable, LANGUAGE_VERSION, MIN_COMPATIBLE_LANGUAGE_VERSION, StateId,
    Symbol, TableError,
    data::{
        ERROR_STATE, ERROR_SYMBOL, LexState, ParseAction, START_STATE, SymbolFlags,
        SymbolMetadata,
    },
};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum LanguageError {
    #[error("{0}")]
    Table(#[from] TableError),
    #[error("grammar version {version} is not within {min}..={max}")]
    IncompatibleVersion { version: u32, min: u32, max: u32 },
    #[error("inconsistent grammar: {0}")]
    Inconsistent(String),
}

/// A loaded grammar.
///
/// Cloning is cheap, and a language never changes after it has been loaded.
#[derive(Clone)]
pub struct Language(Arc<LanguageInner>);

struct LanguageInner {
    name: String,
    version: u32,
    token_count: u16,
    symbols: Vec<SymbolMetadata>,
    symbol_ids: FnvHashMap<String, Symbol>,
    lex_states: Vec<LexState>,
    lex_modes: Vec<u16>,
    /// `state * token_count + terminal`
    actions: Vec<Option<ParseAction>>,
    /// `state * nonterminal_count + (nonterminal - token_count)`
    gotos: Vec<Option<StateId>>,
    default_reductions: Vec<Option<(Symbol, u8)>>,
    recovery_gotos: Vec<Vec<(Symbol, StateId)>>,
}

const ERROR_NAME: &str = "ERROR";

/// Upper bound on the entries of the dense action and goto tables.
const MAX_TABLE_ENTRIES: usize = 1 << 22;

impl Language {
    /// Load a grammar table.
    ///
    /// Returns `None` if the table is empty, malformed or built for an
    /// incompatible version. The table itself is left untouched.
    pub fn load(table: &GrammarTable) -> Option<Self> {
        match Self::try_load(table) {
            Ok(language) => Some(language),
            Err(error) => {
                warn!(%error, "grammar table rejected");
                None
            }
        }
    }

    /// Like [Language::load], keeping the reason for a rejected table.
    pub fn try_load(table: &GrammarTable) -> Result<Self, LanguageError> {
        let version = table.version()?;
        check_version(version)?;

        let data = table.decode()?;
        validate(&data)?;

        let language = Self::from_validated(data, version);
        debug!(
            language = %language.name(),
            version,
            states = language.state_count(),
            symbols = language.symbol_count(),
            "loaded grammar"
        );

        Ok(language)
    }

    fn from_validated(data: GrammarData, version: u32) -> Self {
        let token_count = data.token_count as usize;
        let nonterminal_count = data.symbols.len() - token_count;
        let state_count = data.parse_states.len();

        let mut actions = vec![None; state_count * token_count];
        let mut gotos = vec![None; state_count * nonterminal_count];
        let mut default_reductions = Vec::with_capacity(state_count);
        let mut recovery_gotos = Vec::with_capacity(state_count);
        let mut lex_modes = Vec::with_capacity(state_count);

        for (index, state) in data.parse_states.iter().enumerate() {
            for (symbol, action) in &state.actions {
                actions[index * token_count + *symbol as usize] = Some(*action);
            }
            for (symbol, target) in &state.gotos {
                gotos[index * nonterminal_count + (*symbol as usize - token_count)] = Some(*target);
            }

            default_reductions.push(default_reduction(&state.actions));
            recovery_gotos.push(
                state
                    .gotos
                    .iter()
                    .copied()
                    .filter(|(symbol, _)| data.symbols[*symbol as usize].is_recovery())
                    .collect(),
            );
            lex_modes.push(state.lex_state);
        }

        let symbol_ids = data
            .symbols
            .iter()
            .enumerate()
            .map(|(index, metadata)| (metadata.name.clone(), index as Symbol))
            .collect();

        Self(Arc::new(LanguageInner {
            name: data.name,
            version,
            token_count: data.token_count,
            symbols: data.symbols,
            symbol_ids,
            lex_states: data.lex_states,
            lex_modes,
            actions,
            gotos,
            default_reductions,
            recovery_gotos,
        }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// The ABI version of the table this language was loaded from.
    pub fn version(&self) -> u32 {
        self.0.version
    }

    pub fn symbol_count(&self) -> usize {
        self.0.symbols.len()
    }

    pub fn token_count(&self) -> usize {
        self.0.token_count as usize
    }

    pub fn state_count(&self) -> usize {
        self.0.lex_modes.len()
    }

    pub fn node_kind_for_id(&self, symbol: Symbol) -> Option<&str> {
        if symbol == ERROR_SYMBOL {
            return Some(ERROR_NAME);
        }
        self.0
            .symbols
            .get(symbol as usize)
            .map(|metadata| metadata.name.as_str())
    }

    pub fn id_for_node_kind(&self, kind: &str) -> Option<Symbol> {
        if kind == ERROR_NAME {
            return Some(ERROR_SYMBOL);
        }
        self.0.symbol_ids.get(kind).copied()
    }

    pub fn is_terminal(&self, symbol: Symbol) -> bool {
        symbol < self.0.token_count
    }

    pub(crate) fn symbol_flags(&self, symbol: Symbol) -> SymbolFlags {
        if symbol == ERROR_SYMBOL {
            return SymbolFlags::VISIBLE | SymbolFlags::NAMED;
        }
        self.0
            .symbols
            .get(symbol as usize)
            .map(|metadata| metadata.flags)
            .unwrap_or_else(SymbolFlags::empty)
    }

    pub(crate) fn lex_mode(&self, state: StateId) -> u16 {
        self.0.lex_modes[state as usize]
    }

    pub(crate) fn lex_state(&self, lex_state: u16) -> &LexState {
        &self.0.lex_states[lex_state as usize]
    }

    /// The action for a terminal lookahead. `Recover` entries are reported as `None`.
    pub(crate) fn action(&self, state: StateId, symbol: Symbol) -> Option<ParseAction> {
        if !self.is_terminal(symbol) {
            return None;
        }
        let index = state as usize * self.token_count() + symbol as usize;
        match self.0.actions[index] {
            Some(ParseAction::Recover) | None => None,
            action => action,
        }
    }

    pub(crate) fn goto(&self, state: StateId, symbol: Symbol) -> Option<StateId> {
        if symbol == ERROR_SYMBOL || self.is_terminal(symbol) {
            return None;
        }
        let nonterminal_count = self.symbol_count() - self.token_count();
        let index =
            state as usize * nonterminal_count + (symbol as usize - self.token_count());
        self.0.gotos.get(index).copied().flatten()
    }

    /// The production a state reduces by regardless of lookahead, if any.
    pub(crate) fn default_reduction(&self, state: StateId) -> Option<(Symbol, u8)> {
        self.0.default_reductions[state as usize]
    }

    pub(crate) fn recovery_gotos(&self, state: StateId) -> &[(Symbol, StateId)] {
        &self.0.recovery_gotos[state as usize]
    }

    pub(crate) fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Debug for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Language")
            .field("name", &self.0.name)
            .field("version", &self.0.version)
            .finish()
    }
}

impl PartialEq for Language {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

pub(crate) fn check_version(version: u32) -> Result<(), LanguageError> {
    if (MIN_COMPATIBLE_LANGUAGE_VERSION..=LANGUAGE_VERSION).contains(&version) {
        Ok(())
    } else {
        Err(LanguageError::IncompatibleVersion {
            version,
            min: MIN_COMPATIBLE_LANGUAGE_VERSION,
            max: LANGUAGE_VERSION,
        })
    }
}

fn default_reduction(actions: &[(Symbol, ParseAction)]) -> Option<(Symbol, u8)> {
    let mut production = None;
    for (_, action) in actions {
        match (action, production) {
            (
                ParseAction::Reduce {
                    symbol,
                    child_count,
                },
                None,
            ) => production = Some((*symbol, *child_count)),
            (
                ParseAction::Reduce {
                    symbol,
                    child_count,
                },
                Some(previous),
            ) if previous == (*symbol, *child_count) => {}
            _ => return None,
        }
    }
    production
}

fn validate(data: &GrammarData) -> Result<(), LanguageError> {
    let inconsistent = |msg: String| Err(LanguageError::Inconsistent(msg));

    let symbol_count = data.symbols.len();
    let token_count = data.token_count as usize;
    let lex_count = data.lex_states.len();
    let state_count = data.parse_states.len();

    if token_count == 0 {
        return inconsistent("no terminal symbols".into());
    }
    if token_count > symbol_count {
        return inconsistent(format!(
            "token count {token_count} exceeds symbol count {symbol_count}"
        ));
    }
    if symbol_count >= ERROR_SYMBOL as usize {
        return inconsistent(format!("too many symbols: {symbol_count}"));
    }
    if state_count <= START_STATE as usize {
        return inconsistent(format!("expected a start state, found {state_count} states"));
    }
    if state_count > StateId::MAX as usize + 1 {
        return inconsistent(format!("too many parse states: {state_count}"));
    }
    match state_count.checked_mul(symbol_count) {
        Some(entries) if entries <= MAX_TABLE_ENTRIES => {}
        _ => {
            return inconsistent(format!(
                "{state_count} states by {symbol_count} symbols exceed the table size limit"
            ));
        }
    }
    if data.parse_states[ERROR_STATE as usize].lex_state as usize >= lex_count {
        return inconsistent("error state has no lex state".into());
    }

    for (index, lex_state) in data.lex_states.iter().enumerate() {
        if let Some(symbol) = lex_state.accept {
            if symbol as usize >= token_count {
                return inconsistent(format!("lex state {index} accepts nonterminal {symbol}"));
            }
        }
        let steps = lex_state
            .transitions
            .iter()
            .map(|transition| transition.step)
            .chain(lex_state.at_end);
        for step in steps {
            if step.target() as usize >= lex_count {
                return inconsistent(format!(
                    "lex state {index} steps to missing state {}",
                    step.target()
                ));
            }
        }
    }

    let mut accepts = false;

    for (index, state) in data.parse_states.iter().enumerate() {
        if state.lex_state as usize >= lex_count {
            return inconsistent(format!(
                "parse state {index} uses missing lex state {}",
                state.lex_state
            ));
        }
        for (symbol, action) in &state.actions {
            if *symbol as usize >= token_count {
                return inconsistent(format!(
                    "parse state {index} has an action on nonterminal {symbol}"
                ));
            }
            match action {
                ParseAction::Shift(target) if *target as usize >= state_count => {
                    return inconsistent(format!(
                        "parse state {index} shifts to missing state {target}"
                    ));
                }
                ParseAction::Reduce { symbol, .. }
                    if (*symbol as usize) < token_count || *symbol as usize >= symbol_count =>
                {
                    return inconsistent(format!(
                        "parse state {index} reduces to non-nonterminal {symbol}"
                    ));
                }
                ParseAction::Accept => accepts = true,
                _ => {}
            }
        }
        for (symbol, target) in &state.gotos {
            if (*symbol as usize) < token_count || *symbol as usize >= symbol_count {
                return inconsistent(format!(
                    "parse state {index} has a goto on non-nonterminal {symbol}"
                ));
            }
            if *target as usize >= state_count {
                return inconsistent(format!(
                    "parse state {index} goes to missing state {target}"
                ));
            }
        }
    }

    if !accepts {
        return inconsistent("no parse state accepts the input".into());
    }

    Ok(())
}
