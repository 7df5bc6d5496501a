//! Mailbox types.

use super::{Flags, SeqNum, Uid, UidValidity};

/// Mailbox name, held decoded (not in modified UTF-7).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Mailbox(pub String);

impl Mailbox {
    /// Creates a new mailbox name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The INBOX mailbox.
    #[must_use]
    pub fn inbox() -> Self {
        Self("INBOX".to_string())
    }

    /// Returns true for INBOX, which is case-insensitive per RFC 3501.
    #[must_use]
    pub fn is_inbox(&self) -> bool {
        self.0.eq_ignore_ascii_case("INBOX")
    }

    /// Returns the mailbox name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Mailbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Mailbox {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Mailbox {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Mailbox state reported by SELECT/EXAMINE.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MailboxStatus {
    /// Number of messages in the mailbox.
    pub exists: u32,
    /// Number of recent messages.
    pub recent: u32,
    /// First unseen message sequence number.
    pub unseen: Option<SeqNum>,
    /// Next UID to be assigned.
    pub uid_next: Option<Uid>,
    /// UIDVALIDITY value.
    pub uid_validity: Option<UidValidity>,
    /// Flags defined for this mailbox.
    pub flags: Flags,
    /// Flags that can be permanently stored.
    pub permanent_flags: Flags,
    /// Whether the server granted read-only access.
    pub read_only: bool,
}

impl MailboxStatus {
    /// Returns true when PERMANENTFLAGS carried `\*`.
    #[must_use]
    pub fn allows_user_flags(&self) -> bool {
        self.permanent_flags.allows_user_flags()
    }
}

/// Message counters from `STATUS mbox (MESSAGES RECENT UNSEEN)`.
///
/// `None` means the server did not report the attribute, which is distinct
/// from a reported zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    /// MESSAGES
    pub total: Option<u32>,
    /// RECENT
    pub recent: Option<u32>,
    /// UNSEEN
    pub unseen: Option<u32>,
}

/// LIST or LSUB response data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListResponse {
    /// Mailbox attributes.
    pub attributes: Vec<MailboxAttribute>,
    /// Hierarchy delimiter, `None` for a flat namespace.
    pub delimiter: Option<char>,
    /// Mailbox name.
    pub mailbox: Mailbox,
}

impl ListResponse {
    /// Returns true if the attribute is present.
    #[must_use]
    pub fn has(&self, attribute: &MailboxAttribute) -> bool {
        self.attributes.contains(attribute)
    }

    /// The mailbox can be selected and therefore hold messages.
    #[must_use]
    pub fn is_selectable(&self) -> bool {
        !self.has(&MailboxAttribute::NoSelect) && !self.has(&MailboxAttribute::NonExistent)
    }

    /// The mailbox may contain child mailboxes.
    #[must_use]
    pub fn can_have_children(&self) -> bool {
        !self.has(&MailboxAttribute::NoInferiors)
    }
}

/// Mailbox attributes from LIST/LSUB responses.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MailboxAttribute {
    /// `\Noselect`
    NoSelect,
    /// `\Noinferiors`
    NoInferiors,
    /// `\NonExistent` (RFC 5258)
    NonExistent,
    /// `\HasNoChildren`
    HasNoChildren,
    /// `\HasChildren`
    HasChildren,
    /// `\Marked`
    Marked,
    /// `\Unmarked`
    Unmarked,
    /// `\Subscribed`
    Subscribed,
    /// `\Drafts` (RFC 6154)
    Drafts,
    /// `\Sent` (RFC 6154)
    Sent,
    /// `\Trash` (RFC 6154)
    Trash,
    /// `\Junk` (RFC 6154)
    Junk,
    /// `\Archive` (RFC 6154)
    Archive,
    /// Anything else.
    Unknown(String),
}

impl MailboxAttribute {
    /// Parses a mailbox attribute string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "\\NOSELECT" => Self::NoSelect,
            "\\NOINFERIORS" => Self::NoInferiors,
            "\\NONEXISTENT" => Self::NonExistent,
            "\\HASNOCHILDREN" => Self::HasNoChildren,
            "\\HASCHILDREN" => Self::HasChildren,
            "\\MARKED" => Self::Marked,
            "\\UNMARKED" => Self::Unmarked,
            "\\SUBSCRIBED" => Self::Subscribed,
            "\\DRAFTS" => Self::Drafts,
            "\\SENT" => Self::Sent,
            "\\TRASH" => Self::Trash,
            "\\JUNK" | "\\SPAM" => Self::Junk,
            "\\ARCHIVE" => Self::Archive,
            _ => Self::Unknown(s.to_string()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::Flag;

    #[test]
    fn inbox_is_case_insensitive() {
        assert!(Mailbox::new("inbox").is_inbox());
        assert!(Mailbox::inbox().is_inbox());
        assert!(!Mailbox::new("INBOX/Sent").is_inbox());
    }

    #[test]
    fn user_flags_follow_permanent_flags() {
        let mut status = MailboxStatus::default();
        assert!(!status.allows_user_flags());
        status.permanent_flags = Flags::from_vec(vec![Flag::Seen, Flag::MayCreate]);
        assert!(status.allows_user_flags());
    }

    #[test]
    fn selectable_and_inferiors() {
        let entry = ListResponse {
            attributes: vec![MailboxAttribute::NoSelect],
            delimiter: Some('/'),
            mailbox: Mailbox::new("Shared"),
        };
        assert!(!entry.is_selectable());
        assert!(entry.can_have_children());

        let entry = ListResponse {
            attributes: vec![MailboxAttribute::parse("\\NoInferiors")],
            delimiter: Some('/'),
            mailbox: Mailbox::new("Trash"),
        };
        assert!(entry.is_selectable());
        assert!(!entry.can_have_children());
    }

    #[test]
    fn attribute_parse() {
        assert_eq!(MailboxAttribute::parse("\\Spam"), MailboxAttribute::Junk);
        assert_eq!(
            MailboxAttribute::parse("\\NonExistent"),
            MailboxAttribute::NonExistent
        );
        assert_eq!(
            MailboxAttribute::parse("\\XCustom"),
            MailboxAttribute::Unknown("\\XCustom".to_string())
        );
    }
}
