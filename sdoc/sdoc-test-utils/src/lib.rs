#![forbid(unsafe_code)]

//! Checks that compiled grammar tables load, parse and reparse.

pub mod fixtures;
pub mod init_tracing;
pub mod verify;

pub use verify::{
    GRAMMAR_LOAD_FAILURE, GrammarLoadFailure, VerificationCase, VerificationFailure, Verdict,
    verify_grammar_loads, verify_grammar_parses, verify_incremental_reparse,
};

/// Assert that a `Result` is an error whose message is `$msg`.
#[macro_export]
macro_rules! assert_error_msg {
    ($e:expr, $msg:expr) => {
        match $e {
            Ok(v) => panic!("Expected error, was Ok({v:?})"),
            Err(e) => pretty_assertions::assert_eq!($msg, format!("{e}").trim()),
        }
    };
}
