//! Command argument types.

use crate::types::{Flag, SequenceSet};

/// STATUS attributes to request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusAttribute {
    /// Number of messages.
    Messages,
    /// Number of recent messages.
    Recent,
    /// Next UID.
    UidNext,
    /// UIDVALIDITY.
    UidValidity,
    /// Number of unseen messages.
    Unseen,
}

impl StatusAttribute {
    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::Messages => "MESSAGES",
            Self::Recent => "RECENT",
            Self::UidNext => "UIDNEXT",
            Self::UidValidity => "UIDVALIDITY",
            Self::Unseen => "UNSEEN",
        }
    }
}

/// Individual FETCH attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchAttribute {
    /// Message flags.
    Flags,
    /// Internal date.
    InternalDate,
    /// RFC822 size.
    Rfc822Size,
    /// Envelope structure.
    Envelope,
    /// Body structure.
    BodyStructure,
    /// UID.
    Uid,
    /// Body section.
    Body {
        /// Section specifier, `None` for the whole message.
        section: Option<String>,
        /// Peek (don't set \Seen).
        peek: bool,
    },
}

impl FetchAttribute {
    /// `BODY.PEEK[]`: the full message without touching `\Seen`.
    #[must_use]
    pub const fn full_body() -> Self {
        Self::Body {
            section: None,
            peek: true,
        }
    }

    /// `BODY.PEEK[HEADER.FIELDS (names)]`.
    #[must_use]
    pub fn header_fields(names: &[&str]) -> Self {
        Self::Body {
            section: Some(format!("HEADER.FIELDS ({})", names.join(" "))),
            peek: true,
        }
    }
}

impl std::fmt::Display for FetchAttribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Flags => f.write_str("FLAGS"),
            Self::InternalDate => f.write_str("INTERNALDATE"),
            Self::Rfc822Size => f.write_str("RFC822.SIZE"),
            Self::Envelope => f.write_str("ENVELOPE"),
            Self::BodyStructure => f.write_str("BODYSTRUCTURE"),
            Self::Uid => f.write_str("UID"),
            Self::Body { section, peek } => {
                let name = if *peek { "BODY.PEEK" } else { "BODY" };
                write!(f, "{name}[{}]", section.as_deref().unwrap_or_default())
            }
        }
    }
}

/// STORE action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreAction {
    /// Replace flags.
    SetFlags(Vec<Flag>),
    /// Add flags.
    AddFlags(Vec<Flag>),
    /// Remove flags.
    RemoveFlags(Vec<Flag>),
}

impl StoreAction {
    /// Add or remove, depending on `set`.
    #[must_use]
    pub fn toggle(flags: Vec<Flag>, set: bool) -> Self {
        if set {
            Self::AddFlags(flags)
        } else {
            Self::RemoveFlags(flags)
        }
    }
}

/// SEARCH criteria.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchCriteria {
    /// All messages.
    All,
    /// Messages with \Answered flag.
    Answered,
    /// Messages with \Deleted flag.
    Deleted,
    /// Messages with \Draft flag.
    Draft,
    /// Messages with \Flagged flag.
    Flagged,
    /// Messages without \Deleted flag.
    Undeleted,
    /// Messages without \Seen flag.
    Unseen,
    /// Messages with \Seen flag.
    Seen,
    /// Messages carrying a keyword.
    Keyword(String),
    /// Sequence number set.
    SequenceSet(SequenceSet),
    /// UID set.
    Uid(SequenceSet),
    /// Subject contains text.
    Subject(String),
    /// From contains text.
    From(String),
    /// To contains text.
    To(String),
    /// Cc contains text.
    Cc(String),
    /// Body contains text.
    Body(String),
    /// Text in header or body.
    Text(String),
    /// Internal date on or after a date (`1-Feb-1994`).
    Since(String),
    /// Internal date before a date.
    Before(String),
    /// Larger than size.
    Larger(u32),
    /// Smaller than size.
    Smaller(u32),
    /// Header field contains value.
    Header(String, String),
    /// AND of criteria.
    And(Vec<Self>),
    /// OR of criteria.
    Or(Box<Self>, Box<Self>),
    /// NOT of criteria.
    Not(Box<Self>),
}

/// SORT keys (RFC 5256).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    /// Internal date.
    Arrival,
    /// First Cc address.
    Cc,
    /// Date header.
    Date,
    /// First From address.
    From,
    /// RFC822 size.
    Size,
    /// Base subject.
    Subject,
    /// First To address.
    To,
}

impl SortKey {
    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::Arrival => "ARRIVAL",
            Self::Cc => "CC",
            Self::Date => "DATE",
            Self::From => "FROM",
            Self::Size => "SIZE",
            Self::Subject => "SUBJECT",
            Self::To => "TO",
        }
    }
}

/// One SORT criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortCriterion {
    /// The key to sort on.
    pub key: SortKey,
    /// Descending order.
    pub reverse: bool,
}

impl SortCriterion {
    /// Ascending criterion.
    #[must_use]
    pub const fn asc(key: SortKey) -> Self {
        Self {
            key,
            reverse: false,
        }
    }

    /// Descending criterion.
    #[must_use]
    pub const fn desc(key: SortKey) -> Self {
        Self { key, reverse: true }
    }
}
