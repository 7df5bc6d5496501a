//! Response data types.

use crate::types::{
    AclEntry, Capability, Flags, ListResponse, Mailbox, Namespaces, Quota, ResponseCode, Rights,
    SeqNum, StatusCounts, ThreadNode, Uid, UidValidity,
};

/// FETCH response item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchItem {
    /// FLAGS
    Flags(Flags),
    /// INTERNALDATE, unparsed (`"17-Jul-1996 02:44:25 -0700"`).
    InternalDate(String),
    /// RFC822.SIZE
    Rfc822Size(u32),
    /// ENVELOPE
    Envelope(Box<Envelope>),
    /// UID
    Uid(Uid),
    /// `BODY[section]<origin>` data.
    Body {
        /// Section specifier, `None` for the whole message.
        section: Option<String>,
        /// Origin offset of a partial fetch.
        origin: Option<u32>,
        /// Body data, `None` for NIL.
        data: Option<Vec<u8>>,
    },
    /// BODYSTRUCTURE
    BodyStructure(BodyStructure),
}

/// Message envelope.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Envelope {
    /// Date header.
    pub date: Option<String>,
    /// Subject header, unfolded but not MIME decoded.
    pub subject: Option<String>,
    /// From addresses.
    pub from: Vec<Address>,
    /// Sender addresses.
    pub sender: Vec<Address>,
    /// Reply-To addresses.
    pub reply_to: Vec<Address>,
    /// To addresses.
    pub to: Vec<Address>,
    /// Cc addresses.
    pub cc: Vec<Address>,
    /// Bcc addresses.
    pub bcc: Vec<Address>,
    /// In-Reply-To header.
    pub in_reply_to: Option<String>,
    /// Message-ID header.
    pub message_id: Option<String>,
}

/// Address from an envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    /// Display name.
    pub name: Option<String>,
    /// Source route (obsolete).
    pub adl: Option<String>,
    /// Local part.
    pub mailbox: Option<String>,
    /// Domain part.
    pub host: Option<String>,
}

impl Address {
    /// Returns `local@domain` when both parts are present.
    #[must_use]
    pub fn email(&self) -> Option<String> {
        match (&self.mailbox, &self.host) {
            (Some(m), Some(h)) => Some(format!("{m}@{h}")),
            _ => None,
        }
    }
}

/// Body structure, reduced to what listing views need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyStructure {
    /// A single part.
    Single {
        /// MIME type, upper case.
        media_type: String,
        /// MIME subtype, upper case.
        media_subtype: String,
        /// Content-Type parameters.
        params: Vec<(String, String)>,
        /// Content-Transfer-Encoding.
        encoding: String,
        /// Size in octets.
        size: u32,
        /// Line count for TEXT parts.
        lines: Option<u32>,
    },
    /// A multipart container.
    Multipart {
        /// Child parts.
        parts: Vec<Self>,
        /// Multipart subtype, upper case.
        subtype: String,
    },
}

impl BodyStructure {
    /// `type/subtype` in lower case.
    #[must_use]
    pub fn content_type(&self) -> String {
        match self {
            Self::Single {
                media_type,
                media_subtype,
                ..
            } => format!("{media_type}/{media_subtype}").to_ascii_lowercase(),
            Self::Multipart { subtype, .. } => format!("multipart/{subtype}").to_ascii_lowercase(),
        }
    }

    /// True for `multipart/mixed` and anything nesting a non-text leaf.
    #[must_use]
    pub fn has_attachments(&self) -> bool {
        match self {
            Self::Single { media_type, .. } => {
                !media_type.eq_ignore_ascii_case("TEXT")
                    && !media_type.eq_ignore_ascii_case("MULTIPART")
            }
            Self::Multipart { parts, subtype } => {
                subtype.eq_ignore_ascii_case("MIXED") || parts.iter().any(Self::has_attachments)
            }
        }
    }
}

/// STATUS response item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusItem {
    /// MESSAGES
    Messages(u32),
    /// RECENT
    Recent(u32),
    /// UIDNEXT
    UidNext(Uid),
    /// UIDVALIDITY
    UidValidity(UidValidity),
    /// UNSEEN
    Unseen(u32),
}

impl From<&[StatusItem]> for StatusCounts {
    fn from(items: &[StatusItem]) -> Self {
        let mut counts = Self::default();
        for item in items {
            match item {
                StatusItem::Messages(n) => counts.total = Some(*n),
                StatusItem::Recent(n) => counts.recent = Some(*n),
                StatusItem::Unseen(n) => counts.unseen = Some(*n),
                StatusItem::UidNext(_) | StatusItem::UidValidity(_) => {}
            }
        }
        counts
    }
}

/// Untagged response data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UntaggedResponse {
    /// OK with optional code.
    Ok {
        /// Optional response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// NO
    No {
        /// Optional response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// BAD
    Bad {
        /// Optional response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// PREAUTH greeting.
    PreAuth {
        /// Optional response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// BYE: the server is closing the connection.
    Bye {
        /// Optional response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// CAPABILITY
    Capability(Vec<Capability>),
    /// LIST
    List(ListResponse),
    /// LSUB
    Lsub(ListResponse),
    /// FLAGS
    Flags(Flags),
    /// EXISTS
    Exists(u32),
    /// RECENT
    Recent(u32),
    /// EXPUNGE
    Expunge(SeqNum),
    /// FETCH
    Fetch {
        /// Message sequence number.
        seq: SeqNum,
        /// Fetch data items.
        items: Vec<FetchItem>,
    },
    /// SEARCH: sequence numbers, or UIDs for `UID SEARCH`.
    Search(Vec<u32>),
    /// SORT: sequence numbers, or UIDs for `UID SORT`, in sort order.
    Sort(Vec<u32>),
    /// THREAD: one root per thread.
    Thread(Vec<ThreadNode>),
    /// STATUS
    Status {
        /// Mailbox name.
        mailbox: Mailbox,
        /// Reported items.
        items: Vec<StatusItem>,
    },
    /// NAMESPACE
    Namespace(Namespaces),
    /// QUOTA
    Quota(Quota),
    /// QUOTAROOT
    QuotaRoot {
        /// Mailbox the roots apply to.
        mailbox: Mailbox,
        /// Quota root names, possibly empty.
        roots: Vec<String>,
    },
    /// ACL
    Acl {
        /// Mailbox name.
        mailbox: Mailbox,
        /// Identifier and rights pairs.
        entries: Vec<AclEntry>,
    },
    /// MYRIGHTS
    MyRights {
        /// Mailbox name.
        mailbox: Mailbox,
        /// Rights of the logged in user.
        rights: Rights,
    },
    /// Any other untagged data, kept as text.
    Other {
        /// Response keyword.
        name: String,
        /// Remainder of the line.
        text: String,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn status_items_to_counts() {
        let items = [StatusItem::Messages(10), StatusItem::Unseen(3)];
        let counts = StatusCounts::from(&items[..]);
        assert_eq!(counts.total, Some(10));
        assert_eq!(counts.recent, None);
        assert_eq!(counts.unseen, Some(3));
    }

    #[test]
    fn address_email() {
        let addr = Address {
            name: None,
            adl: None,
            mailbox: Some("joe".into()),
            host: Some("example.org".into()),
        };
        assert_eq!(addr.email().as_deref(), Some("joe@example.org"));
        let partial = Address {
            host: None,
            ..addr
        };
        assert!(partial.email().is_none());
    }

    #[test]
    fn attachments_detection() {
        let text = BodyStructure::Single {
            media_type: "TEXT".into(),
            media_subtype: "PLAIN".into(),
            params: vec![],
            encoding: "7BIT".into(),
            size: 10,
            lines: Some(1),
        };
        assert!(!text.has_attachments());
        assert_eq!(text.content_type(), "text/plain");

        let alternative = BodyStructure::Multipart {
            parts: vec![text.clone(), text.clone()],
            subtype: "ALTERNATIVE".into(),
        };
        assert!(!alternative.has_attachments());

        let mixed = BodyStructure::Multipart {
            parts: vec![text],
            subtype: "MIXED".into(),
        };
        assert!(mixed.has_attachments());
    }
}
