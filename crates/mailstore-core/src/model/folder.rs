//! Folder model types.

use mailstore_imap::{ListResponse, MailboxAttribute, Rights};
use serde::{Deserialize, Serialize};

use crate::collab::Entity;

/// Default folder slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultSlot {
    /// INBOX, always present.
    Inbox,
    /// Drafts.
    Drafts,
    /// Sent messages.
    Sent,
    /// Trash.
    Trash,
    /// Spam.
    Spam,
    /// Messages the user confirmed as spam.
    ConfirmedSpam,
    /// Messages the user confirmed as not spam.
    ConfirmedHam,
}

impl DefaultSlot {
    /// Every slot, INBOX first.
    pub const ALL: [Self; 7] = [
        Self::Inbox,
        Self::Drafts,
        Self::Sent,
        Self::Trash,
        Self::Spam,
        Self::ConfirmedSpam,
        Self::ConfirmedHam,
    ];

    /// Name used when nothing else is configured.
    #[must_use]
    pub const fn canonical_name(self) -> &'static str {
        match self {
            Self::Inbox => "INBOX",
            Self::Drafts => "Drafts",
            Self::Sent => "Sent",
            Self::Trash => "Trash",
            Self::Spam => "Spam",
            Self::ConfirmedSpam => "Confirmed Spam",
            Self::ConfirmedHam => "Confirmed Ham",
        }
    }

    /// True for the slots that only exist when spam handling needs them.
    #[must_use]
    pub const fn is_spam_slot(self) -> bool {
        matches!(self, Self::Spam | Self::ConfirmedSpam | Self::ConfirmedHam)
    }
}

impl std::fmt::Display for DefaultSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Inbox => "inbox",
            Self::Drafts => "drafts",
            Self::Sent => "sent",
            Self::Trash => "trash",
            Self::Spam => "spam",
            Self::ConfirmedSpam => "confirmed-spam",
            Self::ConfirmedHam => "confirmed-ham",
        })
    }
}

/// One ACL entry, with the protocol identifier mapped to a local entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderPermission {
    /// Local user or group.
    pub entity: Entity,
    /// Granted rights.
    pub rights: Rights,
}

/// A mail folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Folder {
    /// Full path using the server separator. This is the folder's identity.
    pub fullname: String,
    /// Last path component.
    pub name: String,
    /// Hierarchy separator, `None` for a flat namespace.
    pub separator: Option<char>,
    /// The folder can be selected and contain messages.
    pub holds_messages: bool,
    /// The folder can contain subfolders.
    pub holds_folders: bool,
    /// The server reports child folders.
    pub has_subfolders: bool,
    /// The folder is subscribed.
    pub subscribed: bool,
    /// Rights of the logged in user, when known.
    pub own_rights: Option<Rights>,
    /// ACL, populated only for folders the user administers.
    pub permissions: Vec<FolderPermission>,
    /// The default slot this folder serves, if any.
    pub default_slot: Option<DefaultSlot>,
    /// Root of an other-users or shared namespace.
    pub namespace_root: bool,
}

impl Folder {
    /// Builds a folder from its LIST entry.
    #[must_use]
    pub fn from_list(entry: &ListResponse) -> Self {
        let fullname = entry.mailbox.as_str().to_string();
        Self {
            name: leaf_name(&fullname, entry.delimiter).to_string(),
            separator: entry.delimiter,
            holds_messages: entry.is_selectable(),
            holds_folders: entry.can_have_children(),
            has_subfolders: entry.has(&MailboxAttribute::HasChildren),
            subscribed: false,
            own_rights: None,
            permissions: Vec::new(),
            default_slot: None,
            namespace_root: false,
            fullname,
        }
    }

    /// A namespace root that LIST did not return.
    #[must_use]
    pub fn namespace_root(fullname: &str, separator: Option<char>) -> Self {
        Self {
            fullname: fullname.to_string(),
            name: leaf_name(fullname, separator).to_string(),
            separator,
            holds_messages: false,
            holds_folders: true,
            has_subfolders: true,
            subscribed: false,
            own_rights: None,
            permissions: Vec::new(),
            default_slot: None,
            namespace_root: true,
        }
    }

    /// True for INBOX.
    #[must_use]
    pub fn is_inbox(&self) -> bool {
        self.fullname.eq_ignore_ascii_case("INBOX")
    }
}

/// Request to create a folder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolderDescription {
    /// Parent fullname, empty for the top level.
    pub parent: String,
    /// Name of the new folder, without separators.
    pub name: String,
    /// Subscribe after creation.
    pub subscribe: bool,
    /// ACL entries applied after creation.
    pub permissions: Vec<FolderPermission>,
}

impl FolderDescription {
    /// A subscribed folder without ACL entries.
    #[must_use]
    pub fn new(parent: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            parent: parent.into(),
            name: name.into(),
            subscribe: true,
            permissions: Vec::new(),
        }
    }
}

/// Last component of a fullname.
#[must_use]
pub fn leaf_name(fullname: &str, separator: Option<char>) -> &str {
    separator
        .and_then(|sep| fullname.rsplit_once(sep))
        .map_or(fullname, |(_, leaf)| leaf)
}

/// Parent of a fullname, empty at the top level.
#[must_use]
pub fn parent_name(fullname: &str, separator: Option<char>) -> &str {
    separator
        .and_then(|sep| fullname.rsplit_once(sep))
        .map_or("", |(parent, _)| parent)
}

/// Joins a parent fullname and a child name.
#[must_use]
pub fn join_name(parent: &str, separator: char, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}{separator}{name}")
    }
}

/// True if `fullname` is `ancestor` or lies below it.
#[must_use]
pub fn is_within(fullname: &str, ancestor: &str, separator: Option<char>) -> bool {
    if fullname == ancestor {
        return true;
    }
    separator.is_some_and(|sep| {
        fullname
            .strip_prefix(ancestor)
            .is_some_and(|rest| rest.starts_with(sep))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mailstore_imap::Mailbox;

    #[test]
    fn name_helpers() {
        assert_eq!(leaf_name("INBOX/Work/2024", Some('/')), "2024");
        assert_eq!(parent_name("INBOX/Work/2024", Some('/')), "INBOX/Work");
        assert_eq!(parent_name("Top", Some('/')), "");
        assert_eq!(leaf_name("a.b", None), "a.b");
        assert_eq!(join_name("", '.', "Sent"), "Sent");
        assert_eq!(join_name("INBOX", '.', "Sent"), "INBOX.Sent");
    }

    #[test]
    fn within_requires_separator_boundary() {
        assert!(is_within("Trash/Old", "Trash", Some('/')));
        assert!(is_within("Trash", "Trash", Some('/')));
        assert!(!is_within("Trashcan", "Trash", Some('/')));
        assert!(!is_within("Trash/Old", "Trash", None));
    }

    #[test]
    fn folder_kind_from_attributes() {
        let entry = ListResponse {
            attributes: vec![MailboxAttribute::NoInferiors],
            delimiter: Some('/'),
            mailbox: Mailbox::new("Lists/rust"),
        };
        let folder = Folder::from_list(&entry);
        assert_eq!(folder.name, "rust");
        assert!(folder.holds_messages);
        assert!(!folder.holds_folders);

        let entry = ListResponse {
            attributes: vec![MailboxAttribute::NoSelect, MailboxAttribute::HasChildren],
            delimiter: Some('/'),
            mailbox: Mailbox::new("Lists"),
        };
        let folder = Folder::from_list(&entry);
        assert!(!folder.holds_messages);
        assert!(folder.has_subfolders);
    }
}
