#![forbid(unsafe_code)]

//! An incremental, error recovering parser driven by compiled grammar tables.

pub mod config;
pub mod edit;
pub mod language;
pub mod parser;
pub mod strictdoc;
pub mod tree;
pub mod view;

mod lexer;
mod subtree;

pub use config::ParserConfig;
pub use edit::InputEdit;
pub use language::{Language, LanguageError};
pub use parser::Parser;
pub use tree::{Children, Node, Tree};

#[cfg(test)]
mod tests;
