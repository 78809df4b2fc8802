use std::fmt::Display;

use crate::span::U32Span;

/// A diagnostic message attached to a location in the source text.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct SpannedMsgError {
    pub msg: String,
    pub span: U32Span,
}

impl SpannedMsgError {
    pub fn new(msg: impl Into<String>, span: U32Span) -> Self {
        Self {
            msg: msg.into(),
            span,
        }
    }
}

impl Display for SpannedMsgError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at {:?}", self.msg, self.span)
    }
}

impl std::error::Error for SpannedMsgError {}
