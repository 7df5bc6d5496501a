//! Core IMAP types.
//!
//! This module defines the value types shared by the parser, the command
//! serializer and the session, following RFC 3501 and its extensions
//! (NAMESPACE, QUOTA, ACL, SORT/THREAD, UIDPLUS).

#![allow(clippy::missing_const_for_fn)]

mod acl;
mod capability;
mod flags;
mod identifiers;
mod mailbox;
mod namespace;
mod quota;
mod response_code;
mod sequence;
mod thread;

pub use acl::{AclEntry, Right, Rights};
pub use capability::{Capabilities, Capability, Status};
pub use flags::{Flag, Flags};
pub use identifiers::{SeqNum, Tag, Uid, UidValidity};
pub use mailbox::{ListResponse, Mailbox, MailboxAttribute, MailboxStatus, StatusCounts};
pub use namespace::{NamespaceDescr, Namespaces};
pub use quota::{Quota, QuotaResource};
pub use response_code::ResponseCode;
pub use sequence::SequenceSet;
pub use thread::ThreadNode;
