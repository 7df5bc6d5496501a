//! # mailstore-core
//!
//! Folder and message storage on top of an IMAP session.
//!
//! This crate provides:
//! - [`FolderStore`]: create, rename, move, delete, subscribe, ACLs, quota
//! - [`MessageStore`]: fetch, search, sort, thread, flag, copy, move,
//!   append and expunge messages by UID
//! - Default folder provisioning (Drafts, Sent, Trash, Spam and friends)
//!   with discovery of existing folders and per-slot failure isolation
//! - A per-session cache of namespaces, LIST entries and rights
//!
//! ## Example
//!
//! ```ignore
//! use mailstore_core::{FolderStore, ImapStore, MessageStore, StoreConfig};
//! use mailstore_imap::{Config, Session};
//!
//! # async fn run() -> mailstore_core::Result<()> {
//! let session = Session::connect(&Config::new("imap.example.com"), "me", "pw").await?;
//! let store = ImapStore::new(session, StoreConfig::default());
//!
//! for folder in store.list_subfolders("", false).await? {
//!     println!("{}", folder.fullname);
//! }
//! let unread = store.unread_messages("INBOX", &[]).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod cache;
pub mod collab;
pub mod config;
pub mod encoded_word;
mod error;
pub mod model;
mod resolver;
pub mod sort;
pub mod store;

pub use cache::{NamespaceInfo, SessionCache};
pub use collab::{
    AclMapper, Entity, FolderNaming, InMemoryAclMapper, InMemoryFolderNaming, SpamHandler,
    StaticSpamHandler,
};
pub use config::{FolderNames, StoreConfig};
pub use error::{Error, ErrorContext, ErrorKind, RequiredRight, Result};
pub use model::{
    ColorLabel, DefaultSlot, EmailAddress, Folder, FolderDescription, FolderPermission,
    MessageData, MessageField, QuotaInfo, QuotaUsage,
};
pub use sort::{SortDirection, SortField};
pub use store::{APPEND_MARKER_HEADER, FolderStore, ImapStore, MessageStore};
