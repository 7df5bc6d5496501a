//! IMAP protocol parser.
//!
//! A sans-I/O parser for IMAP server responses, split into two layers:
//!
//! - **Lexer**: tokenizes raw bytes into IMAP tokens (atoms, strings, numbers, etc.)
//! - **Response Parser**: builds typed responses from tokens
//!
//! # Example
//!
//! ```
//! use mailstore_imap::parser::{ResponseParser, Response, UntaggedResponse};
//!
//! let response = ResponseParser::parse(b"* QUOTA INBOX (STORAGE 512 1024)\r\n").unwrap();
//! match response {
//!     Response::Untagged(UntaggedResponse::Quota(quota)) => {
//!         assert_eq!(quota.resources.len(), 1);
//!     }
//!     _ => unreachable!(),
//! }
//! ```

pub mod lexer;
pub mod response;

pub use lexer::{Lexer, Token};
pub use response::{
    Address, BodyStructure, Envelope, FetchItem, Response, ResponseParser, StatusItem,
    UntaggedResponse, unfold_header,
};
