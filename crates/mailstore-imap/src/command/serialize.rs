//! Command serialization helpers.

use crate::types::{Flag, Mailbox};
use crate::utf7;

use super::types::{FetchAttribute, SearchCriteria, SortCriterion, StoreAction};

/// A command on its way to the wire.
///
/// Bytes accumulate in one buffer; every synchronizing literal marks a
/// point where the client has to wait for the server's continuation
/// request before sending the rest.
#[derive(Debug, Default)]
pub struct CommandBuf {
    bytes: Vec<u8>,
    splits: Vec<usize>,
}

impl CommandBuf {
    pub(super) fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(capacity),
            splits: Vec::new(),
        }
    }

    pub(super) fn push(&mut self, b: u8) {
        self.bytes.push(b);
    }

    pub(super) fn extend_from_slice(&mut self, data: &[u8]) {
        self.bytes.extend_from_slice(data);
    }

    /// Announces `data` as `{n}` and appends it after the continuation point.
    pub(super) fn literal(&mut self, data: &[u8]) {
        self.bytes
            .extend_from_slice(format!("{{{}}}\r\n", data.len()).as_bytes());
        self.splits.push(self.bytes.len());
        self.bytes.extend_from_slice(data);
    }

    /// Number of literals in the command.
    #[must_use]
    pub fn literal_count(&self) -> usize {
        self.splits.len()
    }

    /// The wire bytes split at each continuation point. The first part is
    /// sent at once, every further part after a `+` from the server.
    #[must_use]
    pub fn parts(&self) -> Vec<&[u8]> {
        let mut parts = Vec::with_capacity(self.splits.len() + 1);
        let mut start = 0;
        for &split in &self.splits {
            parts.push(&self.bytes[start..split]);
            start = split;
        }
        parts.push(&self.bytes[start..]);
        parts
    }

    /// All wire bytes, literals included.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Writes an astring: an atom, a quoted string, or a literal when the
/// value holds control characters or 8-bit bytes.
pub fn write_astring(buf: &mut CommandBuf, s: &str) {
    if s.bytes().any(needs_literal) {
        buf.literal(s.as_bytes());
    } else if s.is_empty() || s.bytes().any(needs_quoting) {
        buf.push(b'"');
        for b in s.bytes() {
            if b == b'"' || b == b'\\' {
                buf.push(b'\\');
            }
            buf.push(b);
        }
        buf.push(b'"');
    } else {
        buf.extend_from_slice(s.as_bytes());
    }
}

/// Writes an atom, dropping bytes an atom cannot carry.
fn write_atom(buf: &mut CommandBuf, s: &str) {
    for b in s.bytes() {
        if !needs_quoting(b) && !needs_literal(b) {
            buf.push(b);
        }
    }
}

/// Writes a mailbox name in modified UTF-7.
pub fn write_mailbox(buf: &mut CommandBuf, mailbox: &Mailbox) {
    if mailbox.is_inbox() {
        buf.extend_from_slice(b"INBOX");
    } else {
        write_astring(buf, &utf7::encode(mailbox.as_str()));
    }
}

/// Returns true if the byte cannot appear in an atom but can be quoted.
const fn needs_quoting(b: u8) -> bool {
    matches!(
        b,
        b' ' | b'"' | b'\\' | b'(' | b')' | b'{' | b'%' | b'*' | b']'
    )
}

/// Returns true if the byte cannot appear in a quoted string.
const fn needs_literal(b: u8) -> bool {
    b < 0x20 || b >= 0x7F
}

/// True if any free-text search value is not plain ASCII, in which case
/// SEARCH must name its charset.
#[must_use]
pub fn search_needs_charset(criteria: &SearchCriteria) -> bool {
    match criteria {
        SearchCriteria::Subject(s)
        | SearchCriteria::From(s)
        | SearchCriteria::To(s)
        | SearchCriteria::Cc(s)
        | SearchCriteria::Body(s)
        | SearchCriteria::Text(s) => !s.is_ascii(),
        SearchCriteria::Header(name, value) => !name.is_ascii() || !value.is_ascii(),
        SearchCriteria::And(items) => items.iter().any(search_needs_charset),
        SearchCriteria::Or(a, b) => search_needs_charset(a) || search_needs_charset(b),
        SearchCriteria::Not(c) => search_needs_charset(c),
        _ => false,
    }
}

/// Joins FETCH items with single spaces, in input order.
#[must_use]
pub fn join_fetch_items(items: &[FetchAttribute]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Writes a parenthesized FETCH item list.
pub fn write_fetch_items(buf: &mut CommandBuf, items: &[FetchAttribute]) {
    buf.push(b'(');
    buf.extend_from_slice(join_fetch_items(items).as_bytes());
    buf.push(b')');
}

/// Writes a parenthesized flag list.
pub fn write_flag_list(buf: &mut CommandBuf, flags: &[Flag]) {
    buf.push(b'(');
    for (i, flag) in flags.iter().enumerate() {
        if i > 0 {
            buf.push(b' ');
        }
        match flag {
            Flag::Keyword(keyword) => write_atom(buf, keyword),
            system => buf.extend_from_slice(system.as_str().as_bytes()),
        }
    }
    buf.push(b')');
}

/// Writes STORE action.
pub fn write_store_action(buf: &mut CommandBuf, action: &StoreAction, silent: bool) {
    let (prefix, flags) = match action {
        StoreAction::SetFlags(f) => ("FLAGS", f),
        StoreAction::AddFlags(f) => ("+FLAGS", f),
        StoreAction::RemoveFlags(f) => ("-FLAGS", f),
    };
    buf.extend_from_slice(prefix.as_bytes());
    if silent {
        buf.extend_from_slice(b".SILENT");
    }
    buf.push(b' ');
    write_flag_list(buf, flags);
}

/// Writes SORT criteria, parenthesized.
pub fn write_sort_criteria(buf: &mut CommandBuf, criteria: &[SortCriterion]) {
    buf.push(b'(');
    for (i, criterion) in criteria.iter().enumerate() {
        if i > 0 {
            buf.push(b' ');
        }
        if criterion.reverse {
            buf.extend_from_slice(b"REVERSE ");
        }
        buf.extend_from_slice(criterion.key.as_str().as_bytes());
    }
    buf.push(b')');
}

/// Writes SEARCH criteria.
pub fn write_search_criteria(buf: &mut CommandBuf, criteria: &SearchCriteria) {
    match criteria {
        SearchCriteria::All => buf.extend_from_slice(b"ALL"),
        SearchCriteria::Answered => buf.extend_from_slice(b"ANSWERED"),
        SearchCriteria::Deleted => buf.extend_from_slice(b"DELETED"),
        SearchCriteria::Draft => buf.extend_from_slice(b"DRAFT"),
        SearchCriteria::Flagged => buf.extend_from_slice(b"FLAGGED"),
        SearchCriteria::Undeleted => buf.extend_from_slice(b"UNDELETED"),
        SearchCriteria::Unseen => buf.extend_from_slice(b"UNSEEN"),
        SearchCriteria::Seen => buf.extend_from_slice(b"SEEN"),
        SearchCriteria::Keyword(k) => {
            buf.extend_from_slice(b"KEYWORD ");
            write_atom(buf, k);
        }
        SearchCriteria::SequenceSet(set) => {
            buf.extend_from_slice(set.to_string().as_bytes());
        }
        SearchCriteria::Uid(set) => {
            buf.extend_from_slice(b"UID ");
            buf.extend_from_slice(set.to_string().as_bytes());
        }
        SearchCriteria::Subject(s) => write_keyed(buf, b"SUBJECT ", s),
        SearchCriteria::From(s) => write_keyed(buf, b"FROM ", s),
        SearchCriteria::To(s) => write_keyed(buf, b"TO ", s),
        SearchCriteria::Cc(s) => write_keyed(buf, b"CC ", s),
        SearchCriteria::Body(s) => write_keyed(buf, b"BODY ", s),
        SearchCriteria::Text(s) => write_keyed(buf, b"TEXT ", s),
        SearchCriteria::Since(date) => {
            buf.extend_from_slice(b"SINCE ");
            write_atom(buf, date);
        }
        SearchCriteria::Before(date) => {
            buf.extend_from_slice(b"BEFORE ");
            write_atom(buf, date);
        }
        SearchCriteria::Larger(size) => {
            buf.extend_from_slice(format!("LARGER {size}").as_bytes());
        }
        SearchCriteria::Smaller(size) => {
            buf.extend_from_slice(format!("SMALLER {size}").as_bytes());
        }
        SearchCriteria::Header(name, value) => {
            buf.extend_from_slice(b"HEADER ");
            write_astring(buf, name);
            buf.push(b' ');
            write_astring(buf, value);
        }
        SearchCriteria::And(criteria) => {
            if criteria.is_empty() {
                buf.extend_from_slice(b"ALL");
            }
            for (i, c) in criteria.iter().enumerate() {
                if i > 0 {
                    buf.push(b' ');
                }
                write_search_criteria(buf, c);
            }
        }
        SearchCriteria::Or(a, b) => {
            buf.extend_from_slice(b"OR ");
            write_search_key(buf, a);
            buf.push(b' ');
            write_search_key(buf, b);
        }
        SearchCriteria::Not(c) => {
            buf.extend_from_slice(b"NOT ");
            write_search_key(buf, c);
        }
    }
}

fn write_keyed(buf: &mut CommandBuf, key: &[u8], value: &str) {
    buf.extend_from_slice(key);
    write_astring(buf, value);
}

/// Operands of OR/NOT must be a single key; conjunctions are parenthesized.
fn write_search_key(buf: &mut CommandBuf, criteria: &SearchCriteria) {
    if let SearchCriteria::And(items) = criteria
        && items.len() > 1
    {
        buf.push(b'(');
        write_search_criteria(buf, criteria);
        buf.push(b')');
    } else {
        write_search_criteria(buf, criteria);
    }
}
