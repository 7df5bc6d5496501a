//! Message model types and the FETCH profile built from requested fields.

use chrono::{DateTime, FixedOffset};
use mailstore_imap::parser::{Address, FetchItem};
use mailstore_imap::{FetchAttribute, Flag, Flags, SeqNum};
use serde::{Deserialize, Serialize};

use crate::encoded_word::decode_header;

/// INTERNALDATE format, e.g. `17-Jul-1996 02:44:25 -0700`.
const INTERNAL_DATE_FORMAT: &str = "%d-%b-%Y %H:%M:%S %z";

/// Message data a caller can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageField {
    /// System flags and keywords.
    Flags,
    /// Color label, derived from `$cl_N` keywords.
    ColorLabel,
    /// INTERNALDATE.
    ReceivedDate,
    /// RFC822.SIZE.
    Size,
    /// Subject, addresses, Date and Message-ID from the ENVELOPE.
    Envelope,
    /// Content type and attachment marker from the BODYSTRUCTURE.
    Structure,
    /// The raw message.
    Content,
}

/// FETCH items for the requested fields. UID always comes first and the
/// full body is only requested for [`MessageField::Content`].
#[must_use]
pub fn fetch_profile(fields: &[MessageField]) -> Vec<FetchAttribute> {
    let mut items = vec![FetchAttribute::Uid];
    let mut push = |item: FetchAttribute| {
        if !items.contains(&item) {
            items.push(item);
        }
    };
    for field in fields {
        match field {
            MessageField::Flags | MessageField::ColorLabel => push(FetchAttribute::Flags),
            MessageField::ReceivedDate => push(FetchAttribute::InternalDate),
            MessageField::Size => push(FetchAttribute::Rfc822Size),
            MessageField::Envelope => push(FetchAttribute::Envelope),
            MessageField::Structure => push(FetchAttribute::BodyStructure),
            MessageField::Content => push(FetchAttribute::full_body()),
        }
    }
    items
}

/// One of the eleven color labels, stored as keyword `$cl_0` .. `$cl_10`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ColorLabel(u8);

impl ColorLabel {
    /// Highest label number.
    pub const MAX: u8 = 10;

    /// Label `n`, or `None` above [`Self::MAX`].
    #[must_use]
    pub const fn new(n: u8) -> Option<Self> {
        if n <= Self::MAX { Some(Self(n)) } else { None }
    }

    /// Label number.
    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }

    /// The keyword carrying this label.
    #[must_use]
    pub fn flag(self) -> Flag {
        Flag::Keyword(format!("$cl_{}", self.0))
    }

    /// All eleven label keywords.
    #[must_use]
    pub fn all_flags() -> Vec<Flag> {
        (0..=Self::MAX).map(|n| Self(n).flag()).collect()
    }

    /// Parses a `$cl_N` keyword.
    #[must_use]
    pub fn from_flag(flag: &Flag) -> Option<Self> {
        let Flag::Keyword(keyword) = flag else {
            return None;
        };
        let digits = keyword
            .get(..4)
            .filter(|p| p.eq_ignore_ascii_case("$cl_"))
            .and_then(|_| keyword.get(4..))?;
        digits.parse().ok().and_then(Self::new)
    }

    /// The label set on a message. With several labels the highest wins.
    #[must_use]
    pub fn from_flags(flags: &Flags) -> Option<Self> {
        flags.iter().filter_map(Self::from_flag).max()
    }
}

/// A mailbox address with its display name decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailAddress {
    /// Display name.
    pub name: Option<String>,
    /// `local@domain`, or the bare local part for group syntax.
    pub address: String,
}

impl EmailAddress {
    fn from_envelope(addr: &Address) -> Option<Self> {
        let address = addr.email().or_else(|| addr.mailbox.clone())?;
        Some(Self {
            name: addr
                .name
                .as_deref()
                .map(decode_header)
                .filter(|n| !n.is_empty()),
            address,
        })
    }
}

impl std::fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{name} <{}>", self.address),
            None => f.write_str(&self.address),
        }
    }
}

/// A message snapshot captured by one FETCH.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageData {
    /// Folder fullname.
    pub folder: String,
    /// UID, stable within the folder's UIDVALIDITY.
    pub uid: u32,
    /// Sequence number at fetch time.
    pub sequence: u32,
    /// Flags, empty when not fetched.
    pub flags: Flags,
    /// Color label.
    pub color_label: Option<ColorLabel>,
    /// INTERNALDATE.
    pub received: Option<DateTime<FixedOffset>>,
    /// RFC822.SIZE.
    pub size: Option<u32>,
    /// Subject, unfolded and MIME decoded.
    pub subject: Option<String>,
    /// From addresses.
    pub from: Vec<EmailAddress>,
    /// To addresses.
    pub to: Vec<EmailAddress>,
    /// Cc addresses.
    pub cc: Vec<EmailAddress>,
    /// Date header as sent.
    pub sent: Option<String>,
    /// Message-ID header.
    pub message_id: Option<String>,
    /// Top-level content type.
    pub content_type: Option<String>,
    /// Whether the structure contains attachments.
    pub has_attachments: Option<bool>,
    /// Raw message.
    pub content: Option<Vec<u8>>,
}

impl MessageData {
    /// Builds a message from FETCH items. Returns `None` when the response
    /// carried no UID.
    #[must_use]
    pub fn from_fetch(folder: &str, seq: SeqNum, items: &[FetchItem]) -> Option<Self> {
        let mut message = Self {
            folder: folder.to_string(),
            sequence: seq.get(),
            ..Self::default()
        };
        let mut uid = None;

        for item in items {
            match item {
                FetchItem::Uid(u) => uid = Some(u.get()),
                FetchItem::Flags(flags) => {
                    message.color_label = ColorLabel::from_flags(flags);
                    message.flags = flags.clone();
                }
                FetchItem::InternalDate(raw) => message.received = parse_internal_date(raw),
                FetchItem::Rfc822Size(size) => message.size = Some(*size),
                FetchItem::Envelope(envelope) => {
                    message.subject = envelope.subject.as_deref().map(decode_header);
                    message.from = addresses(&envelope.from);
                    message.to = addresses(&envelope.to);
                    message.cc = addresses(&envelope.cc);
                    message.sent.clone_from(&envelope.date);
                    message.message_id.clone_from(&envelope.message_id);
                }
                FetchItem::BodyStructure(structure) => {
                    message.content_type = Some(structure.content_type());
                    message.has_attachments = Some(structure.has_attachments());
                }
                FetchItem::Body {
                    section: None,
                    origin: None,
                    data,
                } => message.content.clone_from(data),
                FetchItem::Body { .. } => {}
            }
        }

        message.uid = uid?;
        Some(message)
    }

    /// True if `\Seen` is set.
    #[must_use]
    pub fn is_seen(&self) -> bool {
        self.flags.is_seen()
    }
}

fn addresses(list: &[Address]) -> Vec<EmailAddress> {
    list.iter().filter_map(EmailAddress::from_envelope).collect()
}

/// Parses an INTERNALDATE value. Single-digit days may be space padded.
#[must_use]
pub fn parse_internal_date(raw: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_str(raw.trim(), INTERNAL_DATE_FORMAT).ok()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use mailstore_imap::Uid;
    use mailstore_imap::parser::Envelope;
    use proptest::prelude::*;

    #[test]
    fn profile_requests_body_only_for_content() {
        let items = fetch_profile(&[MessageField::Flags, MessageField::Envelope]);
        assert_eq!(
            items,
            [
                FetchAttribute::Uid,
                FetchAttribute::Flags,
                FetchAttribute::Envelope
            ]
        );

        let items = fetch_profile(&[MessageField::Content, MessageField::ColorLabel]);
        assert_eq!(
            items,
            [
                FetchAttribute::Uid,
                FetchAttribute::full_body(),
                FetchAttribute::Flags
            ]
        );
    }

    #[test]
    fn profile_deduplicates() {
        let items = fetch_profile(&[MessageField::Flags, MessageField::ColorLabel]);
        assert_eq!(items, [FetchAttribute::Uid, FetchAttribute::Flags]);
    }

    #[test]
    fn internal_date_parsing() {
        let date = parse_internal_date("17-Jul-1996 02:44:25 -0700").unwrap();
        assert_eq!(date.day(), 17);
        assert_eq!(date.hour(), 2);
        assert_eq!(date.offset().local_minus_utc(), -7 * 3600);

        let padded = parse_internal_date(" 7-Jul-1996 02:44:25 +0000").unwrap();
        assert_eq!(padded.day(), 7);

        assert!(parse_internal_date("yesterday").is_none());
    }

    #[test]
    fn color_label_flags() {
        assert_eq!(ColorLabel::new(3).unwrap().flag(), Flag::Keyword("$cl_3".into()));
        assert!(ColorLabel::new(11).is_none());
        assert_eq!(ColorLabel::all_flags().len(), 11);
        assert_eq!(
            ColorLabel::from_flag(&Flag::Keyword("$CL_10".into())),
            ColorLabel::new(10)
        );
        assert_eq!(ColorLabel::from_flag(&Flag::Keyword("$cl_x".into())), None);
        assert_eq!(ColorLabel::from_flag(&Flag::Seen), None);
    }

    #[test]
    fn message_from_fetch() {
        let envelope = Envelope {
            subject: Some("=?utf-8?B?SMOpbGxv?= world".into()),
            from: vec![Address {
                name: Some("Alice".into()),
                adl: None,
                mailbox: Some("alice".into()),
                host: Some("example.com".into()),
            }],
            ..Envelope::default()
        };
        let items = vec![
            FetchItem::Uid(Uid::new(42).unwrap()),
            FetchItem::Flags(Flags::from_vec(vec![
                Flag::Seen,
                Flag::Keyword("$cl_2".into()),
            ])),
            FetchItem::Rfc822Size(1234),
            FetchItem::Envelope(Box::new(envelope)),
        ];

        let message = MessageData::from_fetch("INBOX", SeqNum::new(7).unwrap(), &items).unwrap();
        assert_eq!(message.uid, 42);
        assert_eq!(message.sequence, 7);
        assert!(message.is_seen());
        assert_eq!(message.color_label, ColorLabel::new(2));
        assert_eq!(message.size, Some(1234));
        assert_eq!(message.subject.as_deref(), Some("Héllo world"));
        assert_eq!(message.from[0].to_string(), "Alice <alice@example.com>");
    }

    #[test]
    fn fetch_without_uid_is_skipped() {
        let items = vec![FetchItem::Rfc822Size(10)];
        assert!(MessageData::from_fetch("INBOX", SeqNum::new(1).unwrap(), &items).is_none());
    }

    proptest! {
        #[test]
        fn any_label_round_trips_through_its_keyword(n in 0u8..=10) {
            let label = ColorLabel::new(n).unwrap();
            prop_assert_eq!(ColorLabel::from_flag(&label.flag()), Some(label));
        }
    }
}
