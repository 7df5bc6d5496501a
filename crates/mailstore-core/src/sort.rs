//! Sort fields, their server-side SORT keys and local comparators.

use std::cmp::Ordering;

use chrono::{DateTime, FixedOffset};
use mailstore_imap::{Flag, SortCriterion, SortKey};
use serde::{Deserialize, Serialize};

use crate::model::{EmailAddress, MessageData};
use crate::{Error, ErrorKind, Result};

/// Fields messages can be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    /// INTERNALDATE.
    ReceivedDate,
    /// Date header.
    SentDate,
    /// First From address.
    From,
    /// First To address.
    To,
    /// First Cc address.
    Cc,
    /// Subject.
    Subject,
    /// RFC822.SIZE.
    Size,
    /// `\Flagged` before unflagged.
    Flagged,
    /// Color label number.
    ColorLabel,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    /// Smallest first.
    #[default]
    Ascending,
    /// Largest first.
    Descending,
}

impl SortField {
    /// The SORT key for this field.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::UnsupportedSortField`] for fields SORT cannot express.
    pub fn server_key(self) -> Result<SortKey> {
        match self {
            Self::ReceivedDate => Ok(SortKey::Arrival),
            Self::SentDate => Ok(SortKey::Date),
            Self::From => Ok(SortKey::From),
            Self::To => Ok(SortKey::To),
            Self::Cc => Ok(SortKey::Cc),
            Self::Subject => Ok(SortKey::Subject),
            Self::Size => Ok(SortKey::Size),
            Self::Flagged | Self::ColorLabel => Err(Error::new(ErrorKind::UnsupportedSortField {
                field: self.to_string(),
            })),
        }
    }

    /// The SORT criterion for this field and direction.
    ///
    /// # Errors
    ///
    /// See [`Self::server_key`].
    pub fn criterion(self, direction: SortDirection) -> Result<SortCriterion> {
        let key = self.server_key()?;
        Ok(match direction {
            SortDirection::Ascending => SortCriterion::asc(key),
            SortDirection::Descending => SortCriterion::desc(key),
        })
    }
}

impl std::fmt::Display for SortField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::ReceivedDate => "received_date",
            Self::SentDate => "sent_date",
            Self::From => "from",
            Self::To => "to",
            Self::Cc => "cc",
            Self::Subject => "subject",
            Self::Size => "size",
            Self::Flagged => "flagged",
            Self::ColorLabel => "color_label",
        })
    }
}

fn first_address(list: &[EmailAddress]) -> Option<String> {
    list.first().map(|a| {
        a.name
            .as_deref()
            .unwrap_or(&a.address)
            .to_lowercase()
    })
}

fn sent_date(message: &MessageData) -> Option<DateTime<FixedOffset>> {
    message
        .sent
        .as_deref()
        .and_then(|raw| DateTime::parse_from_rfc2822(raw.trim()).ok())
}

fn compare_field(a: &MessageData, b: &MessageData, field: SortField) -> Ordering {
    match field {
        // `None` orders before any date.
        SortField::ReceivedDate => a.received.cmp(&b.received),
        SortField::SentDate => sent_date(a).cmp(&sent_date(b)),
        SortField::From => first_address(&a.from).cmp(&first_address(&b.from)),
        SortField::To => first_address(&a.to).cmp(&first_address(&b.to)),
        SortField::Cc => first_address(&a.cc).cmp(&first_address(&b.cc)),
        SortField::Subject => a
            .subject
            .as_deref()
            .map(str::to_lowercase)
            .cmp(&b.subject.as_deref().map(str::to_lowercase)),
        SortField::Size => a.size.cmp(&b.size),
        SortField::Flagged => a
            .flags
            .contains(&Flag::Flagged)
            .cmp(&b.flags.contains(&Flag::Flagged)),
        SortField::ColorLabel => a.color_label.cmp(&b.color_label),
    }
}

/// Total order on messages by `field`, ties broken by UID. The descending
/// order is the exact inverse of the ascending one.
#[must_use]
pub fn compare(a: &MessageData, b: &MessageData, field: SortField, direction: SortDirection) -> Ordering {
    let ordering = compare_field(a, b, field).then_with(|| a.uid.cmp(&b.uid));
    match direction {
        SortDirection::Ascending => ordering,
        SortDirection::Descending => ordering.reverse(),
    }
}

/// Sorts messages in place.
pub fn sort_messages(messages: &mut [MessageData], field: SortField, direction: SortDirection) {
    messages.sort_by(|a, b| compare(a, b, field, direction));
}

/// Reorders `messages` to follow `uids`. Messages whose UID is not listed
/// are dropped.
#[must_use]
pub fn order_by_uids(messages: Vec<MessageData>, uids: &[u32]) -> Vec<MessageData> {
    let mut by_uid: std::collections::HashMap<u32, MessageData> =
        messages.into_iter().map(|m| (m.uid, m)).collect();
    uids.iter().filter_map(|uid| by_uid.remove(uid)).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn message(uid: u32, received: Option<i64>) -> MessageData {
        MessageData {
            uid,
            received: received.map(|secs| {
                FixedOffset::east_opt(0)
                    .unwrap()
                    .timestamp_opt(secs, 0)
                    .unwrap()
            }),
            ..MessageData::default()
        }
    }

    #[test]
    fn missing_date_sorts_first_ascending() {
        let mut messages = vec![message(1, Some(200)), message(2, None), message(3, Some(100))];
        sort_messages(&mut messages, SortField::ReceivedDate, SortDirection::Ascending);
        let uids: Vec<u32> = messages.iter().map(|m| m.uid).collect();
        assert_eq!(uids, [2, 3, 1]);

        sort_messages(&mut messages, SortField::ReceivedDate, SortDirection::Descending);
        let uids: Vec<u32> = messages.iter().map(|m| m.uid).collect();
        assert_eq!(uids, [1, 3, 2]);
    }

    #[test]
    fn server_keys() {
        assert_eq!(SortField::ReceivedDate.server_key().unwrap(), SortKey::Arrival);
        assert_eq!(
            SortField::Subject.criterion(SortDirection::Descending).unwrap(),
            SortCriterion::desc(SortKey::Subject)
        );
        let err = SortField::ColorLabel.server_key().unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::UnsupportedSortField { field } if field == "color_label"));
    }

    #[test]
    fn order_follows_uid_list() {
        let messages = vec![message(1, None), message(2, None), message(3, None)];
        let ordered = order_by_uids(messages, &[3, 1, 9]);
        let uids: Vec<u32> = ordered.iter().map(|m| m.uid).collect();
        assert_eq!(uids, [3, 1]);
    }

    fn arb_message() -> impl Strategy<Value = MessageData> {
        (1u32..50, proptest::option::of(0i64..1_000_000)).prop_map(|(uid, secs)| message(uid, secs))
    }

    proptest! {
        #[test]
        fn descending_is_inverse_of_ascending(a in arb_message(), b in arb_message()) {
            let asc = compare(&a, &b, SortField::ReceivedDate, SortDirection::Ascending);
            let desc = compare(&a, &b, SortField::ReceivedDate, SortDirection::Descending);
            prop_assert_eq!(asc, desc.reverse());
        }

        #[test]
        fn ascending_is_a_total_order(a in arb_message(), b in arb_message(), c in arb_message()) {
            let cmp = |x: &MessageData, y: &MessageData| {
                compare(x, y, SortField::ReceivedDate, SortDirection::Ascending)
            };
            // Antisymmetry.
            prop_assert_eq!(cmp(&a, &b), cmp(&b, &a).reverse());
            // Transitivity.
            if cmp(&a, &b) != Ordering::Greater && cmp(&b, &c) != Ordering::Greater {
                prop_assert_ne!(cmp(&a, &c), Ordering::Greater);
            }
        }

        #[test]
        fn none_precedes_every_date(secs in 0i64..1_000_000, uid in 1u32..50) {
            let undated = message(uid, None);
            let dated = message(uid, Some(secs));
            prop_assert_eq!(
                compare(&undated, &dated, SortField::ReceivedDate, SortDirection::Ascending),
                Ordering::Less
            );
        }
    }

    #[test]
    fn dates_compare_across_offsets() {
        let utc: DateTime<FixedOffset> = "2024-01-01T10:00:00+00:00".parse().unwrap();
        let cet: DateTime<FixedOffset> = "2024-01-01T10:30:00+01:00".parse().unwrap();
        let a = MessageData {
            uid: 1,
            received: Some(utc),
            ..MessageData::default()
        };
        let b = MessageData {
            uid: 2,
            received: Some(cet),
            ..MessageData::default()
        };
        // 09:30 UTC is earlier than 10:00 UTC.
        assert_eq!(
            compare(&b, &a, SortField::ReceivedDate, SortDirection::Ascending),
            Ordering::Less
        );
    }
}
