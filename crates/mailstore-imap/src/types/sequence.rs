//! Sequence sets for message ranges.
//!
//! The same syntax addresses sequence numbers and UIDs; which one is meant
//! depends on whether the command is sent with the `UID` prefix.

use std::num::NonZeroU32;

/// A set of message numbers in IMAP `sequence-set` syntax.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequenceSet {
    /// Single number.
    Single(NonZeroU32),
    /// Inclusive range.
    Range(NonZeroU32, NonZeroU32),
    /// From a number to the highest in the mailbox (`n:*`).
    RangeFrom(NonZeroU32),
    /// The last message (`*`).
    All,
    /// Comma separated union.
    Set(Vec<Self>),
}

impl SequenceSet {
    /// Creates a set from a single number.
    #[must_use]
    pub fn single(n: u32) -> Option<Self> {
        NonZeroU32::new(n).map(Self::Single)
    }

    /// Creates an inclusive range.
    #[must_use]
    pub fn range(start: u32, end: u32) -> Option<Self> {
        Some(Self::Range(NonZeroU32::new(start)?, NonZeroU32::new(end)?))
    }

    /// Creates an open range `start:*`.
    #[must_use]
    pub fn range_from(start: u32) -> Option<Self> {
        NonZeroU32::new(start).map(Self::RangeFrom)
    }

    /// Compacts arbitrary numbers into sorted ranges.
    ///
    /// Zeros and duplicates are dropped. Returns `None` if nothing is left.
    #[must_use]
    pub fn from_numbers(numbers: &[u32]) -> Option<Self> {
        let mut sorted: Vec<NonZeroU32> = numbers.iter().copied().filter_map(NonZeroU32::new).collect();
        sorted.sort_unstable();
        sorted.dedup();

        let mut parts = Vec::new();
        let mut iter = sorted.into_iter();
        let mut start = iter.next()?;
        let mut end = start;
        for n in iter {
            if n.get() == end.get() + 1 {
                end = n;
                continue;
            }
            parts.push(Self::span(start, end));
            start = n;
            end = n;
        }
        parts.push(Self::span(start, end));

        if parts.len() == 1 {
            parts.pop()
        } else {
            Some(Self::Set(parts))
        }
    }

    fn span(start: NonZeroU32, end: NonZeroU32) -> Self {
        if start == end {
            Self::Single(start)
        } else {
            Self::Range(start, end)
        }
    }

    /// Expands a closed set into its numbers. Open forms (`*`, `n:*`) expand
    /// to their known lower bound only.
    #[must_use]
    pub fn numbers(&self) -> Vec<u32> {
        match self {
            Self::Single(n) | Self::RangeFrom(n) => vec![n.get()],
            Self::Range(a, b) => {
                let (lo, hi) = if a <= b { (a.get(), b.get()) } else { (b.get(), a.get()) };
                (lo..=hi).collect()
            }
            Self::All => Vec::new(),
            Self::Set(items) => items.iter().flat_map(Self::numbers).collect(),
        }
    }
}

impl std::fmt::Display for SequenceSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Single(n) => write!(f, "{n}"),
            Self::Range(start, end) => write!(f, "{start}:{end}"),
            Self::RangeFrom(start) => write!(f, "{start}:*"),
            Self::All => write!(f, "*"),
            Self::Set(items) => {
                let s: Vec<_> = items.iter().map(ToString::to_string).collect();
                write!(f, "{}", s.join(","))
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn compacts_runs() {
        let set = SequenceSet::from_numbers(&[9, 1, 2, 3, 5, 7, 8, 2]).unwrap();
        assert_eq!(set.to_string(), "1:3,5,7:9");
    }

    #[test]
    fn single_number() {
        assert_eq!(SequenceSet::from_numbers(&[42]).unwrap().to_string(), "42");
        assert!(SequenceSet::from_numbers(&[]).is_none());
        assert!(SequenceSet::from_numbers(&[0]).is_none());
    }

    #[test]
    fn open_forms() {
        assert_eq!(SequenceSet::range_from(17).unwrap().to_string(), "17:*");
        assert_eq!(SequenceSet::All.to_string(), "*");
        assert_eq!(SequenceSet::range(4, 2).unwrap().numbers(), [2, 3, 4]);
    }

    proptest! {
        #[test]
        fn expansion_matches_input(mut input in proptest::collection::vec(1u32..500, 1..60)) {
            let set = SequenceSet::from_numbers(&input).unwrap();
            input.sort_unstable();
            input.dedup();
            prop_assert_eq!(set.numbers(), input);
        }
    }
}
