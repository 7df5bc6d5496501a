//! IMAP command builder.
//!
//! This module provides types and serialization for IMAP commands. A command
//! serializes to its command line. Values that cannot travel as atoms or
//! quoted strings, and APPEND messages, become literals that the executor
//! sends after the server's continuation request.

mod serialize;
mod tag_generator;
mod types;

use crate::types::{Flag, Mailbox, Rights, SequenceSet};

pub use serialize::{CommandBuf, join_fetch_items};
pub use tag_generator::TagGenerator;
pub use types::{
    FetchAttribute, SearchCriteria, SortCriterion, SortKey, StatusAttribute, StoreAction,
};

use serialize::{
    search_needs_charset, write_astring, write_fetch_items, write_flag_list, write_mailbox,
    write_search_criteria, write_sort_criteria, write_store_action,
};

/// IMAP command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    // Any State Commands
    /// CAPABILITY command.
    Capability,
    /// NOOP command.
    Noop,
    /// LOGOUT command.
    Logout,

    // Not Authenticated State Commands
    /// STARTTLS command.
    StartTls,
    /// LOGIN command.
    Login {
        /// Username.
        username: String,
        /// Password.
        password: String,
    },

    // Authenticated State Commands
    /// SELECT command.
    Select {
        /// Mailbox to select.
        mailbox: Mailbox,
    },
    /// EXAMINE command (read-only SELECT).
    Examine {
        /// Mailbox to examine.
        mailbox: Mailbox,
    },
    /// CREATE command.
    Create {
        /// Mailbox to create.
        mailbox: Mailbox,
    },
    /// DELETE command.
    Delete {
        /// Mailbox to delete.
        mailbox: Mailbox,
    },
    /// RENAME command.
    Rename {
        /// Current mailbox name.
        from: Mailbox,
        /// New mailbox name.
        to: Mailbox,
    },
    /// SUBSCRIBE command.
    Subscribe {
        /// Mailbox to subscribe.
        mailbox: Mailbox,
    },
    /// UNSUBSCRIBE command.
    Unsubscribe {
        /// Mailbox to unsubscribe.
        mailbox: Mailbox,
    },
    /// LIST command.
    List {
        /// Reference name.
        reference: String,
        /// Mailbox pattern.
        pattern: String,
    },
    /// LSUB command.
    Lsub {
        /// Reference name.
        reference: String,
        /// Mailbox pattern.
        pattern: String,
    },
    /// NAMESPACE command.
    Namespace,
    /// STATUS command.
    Status {
        /// Mailbox name.
        mailbox: Mailbox,
        /// Status items to request.
        items: Vec<StatusAttribute>,
    },
    /// APPEND command. The message is sent as a literal.
    Append {
        /// Target mailbox.
        mailbox: Mailbox,
        /// Flags to set.
        flags: Vec<Flag>,
        /// Message data.
        message: Vec<u8>,
    },
    /// GETQUOTAROOT command.
    GetQuotaRoot {
        /// Mailbox name.
        mailbox: Mailbox,
    },
    /// GETQUOTA command.
    GetQuota {
        /// Quota root name.
        root: String,
    },
    /// GETACL command.
    GetAcl {
        /// Mailbox name.
        mailbox: Mailbox,
    },
    /// SETACL command.
    SetAcl {
        /// Mailbox name.
        mailbox: Mailbox,
        /// Protocol identifier.
        identifier: String,
        /// Rights to grant, replacing existing ones.
        rights: Rights,
    },
    /// DELETEACL command.
    DeleteAcl {
        /// Mailbox name.
        mailbox: Mailbox,
        /// Protocol identifier.
        identifier: String,
    },
    /// MYRIGHTS command.
    MyRights {
        /// Mailbox name.
        mailbox: Mailbox,
    },

    // Selected State Commands
    /// CLOSE command.
    Close,
    /// UNSELECT command (RFC 3691).
    Unselect,
    /// EXPUNGE command.
    Expunge,
    /// UID EXPUNGE command (RFC 4315).
    UidExpunge {
        /// UIDs to expunge.
        uids: SequenceSet,
    },
    /// SEARCH command.
    Search {
        /// Search criteria.
        criteria: SearchCriteria,
        /// Use UID SEARCH.
        uid: bool,
    },
    /// SORT command (RFC 5256), always with charset UTF-8.
    Sort {
        /// Sort criteria.
        criteria: Vec<SortCriterion>,
        /// Search criteria.
        search: SearchCriteria,
        /// Use UID SORT.
        uid: bool,
    },
    /// THREAD command (RFC 5256), always with charset UTF-8.
    Thread {
        /// Threading algorithm, e.g. `REFERENCES`.
        algorithm: String,
        /// Search criteria.
        search: SearchCriteria,
        /// Use UID THREAD.
        uid: bool,
    },
    /// FETCH command.
    Fetch {
        /// Sequence set.
        sequence: SequenceSet,
        /// Items to fetch.
        items: Vec<FetchAttribute>,
        /// Use UID FETCH.
        uid: bool,
    },
    /// STORE command.
    Store {
        /// Sequence set.
        sequence: SequenceSet,
        /// Store action.
        action: StoreAction,
        /// Use UID STORE.
        uid: bool,
        /// Silent mode (no FETCH response).
        silent: bool,
    },
    /// COPY command.
    Copy {
        /// Sequence set.
        sequence: SequenceSet,
        /// Destination mailbox.
        mailbox: Mailbox,
        /// Use UID COPY.
        uid: bool,
    },
    /// MOVE command (RFC 6851).
    Move {
        /// Sequence set.
        sequence: SequenceSet,
        /// Destination mailbox.
        mailbox: Mailbox,
        /// Use UID MOVE.
        uid: bool,
    },
}

impl Command {
    /// Returns the command keyword, used in logs and errors.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Capability => "CAPABILITY",
            Self::Noop => "NOOP",
            Self::Logout => "LOGOUT",
            Self::StartTls => "STARTTLS",
            Self::Login { .. } => "LOGIN",
            Self::Select { .. } => "SELECT",
            Self::Examine { .. } => "EXAMINE",
            Self::Create { .. } => "CREATE",
            Self::Delete { .. } => "DELETE",
            Self::Rename { .. } => "RENAME",
            Self::Subscribe { .. } => "SUBSCRIBE",
            Self::Unsubscribe { .. } => "UNSUBSCRIBE",
            Self::List { .. } => "LIST",
            Self::Lsub { .. } => "LSUB",
            Self::Namespace => "NAMESPACE",
            Self::Status { .. } => "STATUS",
            Self::Append { .. } => "APPEND",
            Self::GetQuotaRoot { .. } => "GETQUOTAROOT",
            Self::GetQuota { .. } => "GETQUOTA",
            Self::GetAcl { .. } => "GETACL",
            Self::SetAcl { .. } => "SETACL",
            Self::DeleteAcl { .. } => "DELETEACL",
            Self::MyRights { .. } => "MYRIGHTS",
            Self::Close => "CLOSE",
            Self::Unselect => "UNSELECT",
            Self::Expunge => "EXPUNGE",
            Self::UidExpunge { .. } => "UID EXPUNGE",
            Self::Search { .. } => "SEARCH",
            Self::Sort { .. } => "SORT",
            Self::Thread { .. } => "THREAD",
            Self::Fetch { .. } => "FETCH",
            Self::Store { .. } => "STORE",
            Self::Copy { .. } => "COPY",
            Self::Move { .. } => "MOVE",
        }
    }

    /// Serializes the command with the given tag, including the final CRLF
    /// and any literals inline.
    #[must_use]
    pub fn serialize(&self, tag: &str) -> Vec<u8> {
        self.encode(tag).into_bytes()
    }

    /// Serializes the command, keeping track of where the client has to
    /// wait for continuation requests.
    #[must_use]
    pub fn encode(&self, tag: &str) -> CommandBuf {
        let mut buf = CommandBuf::with_capacity(64);

        buf.extend_from_slice(tag.as_bytes());
        buf.push(b' ');

        match self {
            Self::Capability => buf.extend_from_slice(b"CAPABILITY"),
            Self::Noop => buf.extend_from_slice(b"NOOP"),
            Self::Logout => buf.extend_from_slice(b"LOGOUT"),
            Self::StartTls => buf.extend_from_slice(b"STARTTLS"),

            Self::Login { username, password } => {
                buf.extend_from_slice(b"LOGIN ");
                write_astring(&mut buf, username);
                buf.push(b' ');
                write_astring(&mut buf, password);
            }

            Self::Select { mailbox }
            | Self::Examine { mailbox }
            | Self::Create { mailbox }
            | Self::Delete { mailbox }
            | Self::Subscribe { mailbox }
            | Self::Unsubscribe { mailbox }
            | Self::GetQuotaRoot { mailbox }
            | Self::GetAcl { mailbox }
            | Self::MyRights { mailbox } => {
                buf.extend_from_slice(self.name().as_bytes());
                buf.push(b' ');
                write_mailbox(&mut buf, mailbox);
            }

            Self::Rename { from, to } => {
                buf.extend_from_slice(b"RENAME ");
                write_mailbox(&mut buf, from);
                buf.push(b' ');
                write_mailbox(&mut buf, to);
            }

            Self::List { reference, pattern } | Self::Lsub { reference, pattern } => {
                buf.extend_from_slice(self.name().as_bytes());
                buf.push(b' ');
                write_astring(&mut buf, &crate::utf7::encode(reference));
                buf.push(b' ');
                write_astring(&mut buf, &crate::utf7::encode(pattern));
            }

            Self::Namespace => buf.extend_from_slice(b"NAMESPACE"),

            Self::Status { mailbox, items } => {
                buf.extend_from_slice(b"STATUS ");
                write_mailbox(&mut buf, mailbox);
                buf.extend_from_slice(b" (");
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        buf.push(b' ');
                    }
                    buf.extend_from_slice(item.as_str().as_bytes());
                }
                buf.push(b')');
            }

            Self::Append {
                mailbox,
                flags,
                message,
            } => {
                buf.extend_from_slice(b"APPEND ");
                write_mailbox(&mut buf, mailbox);
                if !flags.is_empty() {
                    buf.push(b' ');
                    write_flag_list(&mut buf, flags);
                }
                buf.push(b' ');
                buf.literal(message);
            }

            Self::GetQuota { root } => {
                buf.extend_from_slice(b"GETQUOTA ");
                write_astring(&mut buf, root);
            }

            Self::SetAcl {
                mailbox,
                identifier,
                rights,
            } => {
                buf.extend_from_slice(b"SETACL ");
                write_mailbox(&mut buf, mailbox);
                buf.push(b' ');
                write_astring(&mut buf, identifier);
                buf.push(b' ');
                write_astring(&mut buf, &rights.to_string());
            }

            Self::DeleteAcl {
                mailbox,
                identifier,
            } => {
                buf.extend_from_slice(b"DELETEACL ");
                write_mailbox(&mut buf, mailbox);
                buf.push(b' ');
                write_astring(&mut buf, identifier);
            }

            Self::Close => buf.extend_from_slice(b"CLOSE"),
            Self::Unselect => buf.extend_from_slice(b"UNSELECT"),
            Self::Expunge => buf.extend_from_slice(b"EXPUNGE"),

            Self::UidExpunge { uids } => {
                buf.extend_from_slice(b"UID EXPUNGE ");
                buf.extend_from_slice(uids.to_string().as_bytes());
            }

            Self::Search { criteria, uid } => {
                write_uid_prefix(&mut buf, *uid);
                buf.extend_from_slice(b"SEARCH ");
                if search_needs_charset(criteria) {
                    buf.extend_from_slice(b"CHARSET UTF-8 ");
                }
                write_search_criteria(&mut buf, criteria);
            }

            Self::Sort {
                criteria,
                search,
                uid,
            } => {
                write_uid_prefix(&mut buf, *uid);
                buf.extend_from_slice(b"SORT ");
                write_sort_criteria(&mut buf, criteria);
                buf.extend_from_slice(b" UTF-8 ");
                write_search_criteria(&mut buf, search);
            }

            Self::Thread {
                algorithm,
                search,
                uid,
            } => {
                write_uid_prefix(&mut buf, *uid);
                buf.extend_from_slice(b"THREAD ");
                buf.extend_from_slice(algorithm.as_bytes());
                buf.extend_from_slice(b" UTF-8 ");
                write_search_criteria(&mut buf, search);
            }

            Self::Fetch {
                sequence,
                items,
                uid,
            } => {
                write_uid_prefix(&mut buf, *uid);
                buf.extend_from_slice(b"FETCH ");
                buf.extend_from_slice(sequence.to_string().as_bytes());
                buf.push(b' ');
                write_fetch_items(&mut buf, items);
            }

            Self::Store {
                sequence,
                action,
                uid,
                silent,
            } => {
                write_uid_prefix(&mut buf, *uid);
                buf.extend_from_slice(b"STORE ");
                buf.extend_from_slice(sequence.to_string().as_bytes());
                buf.push(b' ');
                write_store_action(&mut buf, action, *silent);
            }

            Self::Copy {
                sequence,
                mailbox,
                uid,
            }
            | Self::Move {
                sequence,
                mailbox,
                uid,
            } => {
                write_uid_prefix(&mut buf, *uid);
                buf.extend_from_slice(self.name().as_bytes());
                buf.push(b' ');
                buf.extend_from_slice(sequence.to_string().as_bytes());
                buf.push(b' ');
                write_mailbox(&mut buf, mailbox);
            }
        }

        buf.extend_from_slice(b"\r\n");
        buf
    }
}

fn write_uid_prefix(buf: &mut CommandBuf, uid: bool) {
    if uid {
        buf.extend_from_slice(b"UID ");
    }
}
