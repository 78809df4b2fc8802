use std::{fmt::Debug, ops::Range};

use serde::{Deserialize, Serialize};

/// A byte range into a source text.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct U32Span {
    pub start: u32,
    pub end: u32,
}

impl U32Span {
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// Whether `other` lies completely inside `self`.
    pub fn encloses(&self, other: Self) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

impl Debug for U32Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

impl From<Range<usize>> for U32Span {
    fn from(value: Range<usize>) -> Self {
        Self {
            start: value.start as u32,
            end: value.end as u32,
        }
    }
}

impl From<U32Span> for Range<usize> {
    fn from(value: U32Span) -> Self {
        value.start as usize..value.end as usize
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn encloses() {
        let outer = U32Span::new(2, 9);

        assert!(outer.encloses(U32Span::new(2, 9)));
        assert!(outer.encloses(U32Span::new(4, 4)));
        assert!(!outer.encloses(U32Span::new(1, 5)));
        assert!(!outer.encloses(U32Span::new(8, 10)));
    }

    #[test]
    fn range_conversion() {
        let span = U32Span::from(3..7);
        assert_eq!(3..7, Range::<usize>::from(span));
        assert_eq!("3..7", format!("{span:?}"));
    }
}
