//! # mailstore-imap
//!
//! The protocol half of the mail store: an IMAP4rev1 client with the
//! extensions a folder and message store needs (UIDPLUS, MOVE, NAMESPACE,
//! SORT, THREAD, QUOTA, ACL, UNSELECT).
//!
//! ## Layers
//!
//! - [`parser`]: sans-I/O lexer and response parser
//! - [`command`]: typed commands and their wire form
//! - [`connection`]: transport, framing, the command executor and the
//!   session that serializes access to one connection
//! - [`types`]: flags, mailboxes, sequence sets, rights, quotas
//! - [`utf7`]: modified UTF-7 for mailbox names
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailstore_imap::{Command, Config, Security, Session};
//!
//! #[tokio::main]
//! async fn main() -> mailstore_imap::Result<()> {
//!     let config = Config::new("imap.example.com").with_security(Security::Implicit);
//!     let session = Session::connect(&config, "user@example.com", "password").await?;
//!
//!     let folders = session
//!         .with_connection(|conn| {
//!             Box::pin(async move {
//!                 conn.execute(&Command::List {
//!                     reference: String::new(),
//!                     pattern: "*".into(),
//!                 })
//!                 .await
//!             })
//!         })
//!         .await?;
//!     for entry in folders.cursor() {
//!         println!("{entry:?}");
//!     }
//!
//!     session.logout().await
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod parser;
pub mod types;
pub mod utf7;

pub use command::{
    Command, FetchAttribute, SearchCriteria, SortCriterion, SortKey, StatusAttribute, StoreAction,
    TagGenerator,
};
pub use connection::{
    AccessMode, Config, Connection, ConnectionFuture, Executor, FramedStream, ImapStream,
    ResponseCursor, Responses, Security, SelectedFolder, Session, Timeouts,
};
pub use error::{Error, Result};
pub use parser::{Response, ResponseParser, UntaggedResponse};
pub use types::{
    AclEntry, Capabilities, Capability, Flag, Flags, ListResponse, Mailbox, MailboxAttribute,
    MailboxStatus, NamespaceDescr, Namespaces, Quota, QuotaResource, ResponseCode, Right, Rights,
    SeqNum, SequenceSet, Status, StatusCounts, Tag, ThreadNode, Uid, UidValidity,
};
