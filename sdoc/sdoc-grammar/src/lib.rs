#![forbid(unsafe_code)]

//! Compiled grammars in a form a parser can load.
//!
//! A grammar travels as an opaque [GrammarTable]. The parser decodes it back
//! into [GrammarData] and validates it before use.

pub mod data;
pub mod strictdoc;
pub mod table;

pub use data::{GrammarData, StateId, Symbol};
pub use table::{GrammarTable, LANGUAGE_VERSION, MIN_COMPATIBLE_LANGUAGE_VERSION, TableError};
