//! IMAP connection management.
//!
//! - [`Config`]: host, port, security mode and timeouts
//! - [`ImapStream`]: plain or TLS transport
//! - [`FramedStream`]: line and literal framing
//! - [`Executor`]: one command at a time, NO/BAD/BYE mapping
//! - [`Session`] / [`Connection`]: login, capabilities, folder selection and
//!   the serialized command channel

mod config;
mod executor;
mod framed;
mod session;
mod stream;

pub use config::{Config, Security, Timeouts};
pub use executor::{Executor, ResponseCursor, Responses};
pub use framed::FramedStream;
pub use session::{AccessMode, Connection, ConnectionFuture, SelectedFolder, Session};
pub use stream::{ImapStream, create_tls_connector, open};
