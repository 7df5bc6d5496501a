//! IMAP response parser.
//!
//! Parses one complete server response (line plus embedded literals).

#![allow(clippy::missing_errors_doc)]
#![allow(clippy::option_if_let_else)]

mod fetch;
mod helpers;
mod types;

pub use helpers::unfold_header;
pub use types::{Address, BodyStructure, Envelope, FetchItem, StatusItem, UntaggedResponse};

use crate::parser::lexer::{Lexer, Token};
use crate::types::{Quota, ResponseCode, SeqNum, Status, Tag};
use crate::{Error, Result};

use helpers::{
    parse_acl_response, parse_capability_data, parse_flag_list, parse_list_response,
    parse_my_rights_response, parse_namespace_response, parse_number_list,
    parse_quota_response, parse_quota_root_response, parse_response_code, parse_status_response,
    parse_thread_response, read_text_until_crlf,
};

/// A parsed IMAP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Tagged response (command completion).
    Tagged {
        /// The command tag.
        tag: Tag,
        /// Response status.
        status: Status,
        /// Optional response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// Untagged response (server data).
    Untagged(UntaggedResponse),
    /// Continuation request.
    Continuation {
        /// Optional text.
        text: Option<String>,
    },
}

/// Response parser.
pub struct ResponseParser;

impl ResponseParser {
    /// Parses a complete response.
    pub fn parse(input: &[u8]) -> Result<Response> {
        let mut lexer = Lexer::new(input);

        match lexer.next_token()? {
            Token::Asterisk => Self::parse_untagged(&mut lexer).map(Response::Untagged),
            Token::Plus => Ok(Self::parse_continuation(&mut lexer)),
            Token::Atom(tag) => Self::parse_tagged(&mut lexer, tag),
            Token::Number(n) => Self::parse_tagged(&mut lexer, &n.to_string()),
            token => Err(Error::Parse {
                position: 0,
                message: format!("Expected *, +, or tag, got {token:?}"),
            }),
        }
    }

    fn parse_tagged(lexer: &mut Lexer<'_>, tag: &str) -> Result<Response> {
        lexer.expect_space()?;
        let status = Self::parse_status(lexer)?;
        let (code, text) = Self::parse_resp_text(lexer)?;

        Ok(Response::Tagged {
            tag: Tag::new(tag),
            status,
            code,
            text,
        })
    }

    fn parse_untagged(lexer: &mut Lexer<'_>) -> Result<UntaggedResponse> {
        lexer.expect_space()?;

        match lexer.next_token()? {
            Token::Atom(keyword) => Self::parse_untagged_keyword(lexer, keyword),
            Token::Number(n) => Self::parse_message_data(lexer, n),
            token => Err(lexer.error(&format!(
                "Unexpected token in untagged response: {token:?}"
            ))),
        }
    }

    fn parse_untagged_keyword(lexer: &mut Lexer<'_>, keyword: &str) -> Result<UntaggedResponse> {
        let upper = keyword.to_ascii_uppercase();
        let response = match upper.as_str() {
            "OK" => {
                let (code, text) = Self::parse_resp_text(lexer)?;
                UntaggedResponse::Ok { code, text }
            }
            "NO" => {
                let (code, text) = Self::parse_resp_text(lexer)?;
                UntaggedResponse::No { code, text }
            }
            "BAD" => {
                let (code, text) = Self::parse_resp_text(lexer)?;
                UntaggedResponse::Bad { code, text }
            }
            "PREAUTH" => {
                let (code, text) = Self::parse_resp_text(lexer)?;
                UntaggedResponse::PreAuth { code, text }
            }
            "BYE" => {
                let (code, text) = Self::parse_resp_text(lexer)?;
                UntaggedResponse::Bye { code, text }
            }
            "CAPABILITY" => UntaggedResponse::Capability(parse_capability_data(lexer)?),
            "FLAGS" => {
                lexer.expect_space()?;
                UntaggedResponse::Flags(parse_flag_list(lexer)?)
            }
            "LIST" => {
                lexer.expect_space()?;
                UntaggedResponse::List(parse_list_response(lexer)?)
            }
            "LSUB" => {
                lexer.expect_space()?;
                UntaggedResponse::Lsub(parse_list_response(lexer)?)
            }
            "SEARCH" => UntaggedResponse::Search(parse_number_list(lexer)?),
            "SORT" => UntaggedResponse::Sort(parse_number_list(lexer)?),
            "THREAD" => UntaggedResponse::Thread(parse_thread_response(lexer)?),
            "STATUS" => {
                lexer.expect_space()?;
                let (mailbox, items) = parse_status_response(lexer)?;
                UntaggedResponse::Status { mailbox, items }
            }
            "NAMESPACE" => {
                lexer.expect_space()?;
                UntaggedResponse::Namespace(parse_namespace_response(lexer)?)
            }
            "QUOTA" => {
                if lexer.peek() == Some(b' ') {
                    lexer.advance();
                    UntaggedResponse::Quota(parse_quota_response(lexer)?)
                } else {
                    UntaggedResponse::Quota(Quota::default())
                }
            }
            "QUOTAROOT" => {
                lexer.expect_space()?;
                let (mailbox, roots) = parse_quota_root_response(lexer)?;
                UntaggedResponse::QuotaRoot { mailbox, roots }
            }
            "ACL" => {
                lexer.expect_space()?;
                let (mailbox, entries) = parse_acl_response(lexer)?;
                UntaggedResponse::Acl { mailbox, entries }
            }
            "MYRIGHTS" => {
                lexer.expect_space()?;
                let (mailbox, rights) = parse_my_rights_response(lexer)?;
                UntaggedResponse::MyRights { mailbox, rights }
            }
            _ => {
                lexer.skip_spaces();
                UntaggedResponse::Other {
                    name: upper,
                    text: read_text_until_crlf(lexer),
                }
            }
        };
        Ok(response)
    }

    fn parse_message_data(lexer: &mut Lexer<'_>, n: u64) -> Result<UntaggedResponse> {
        lexer.expect_space()?;
        let keyword = lexer.read_atom_string()?.to_ascii_uppercase();
        let n = u32::try_from(n).map_err(|_| lexer.error("Message number exceeds 32 bits"))?;

        match keyword.as_str() {
            "EXISTS" => Ok(UntaggedResponse::Exists(n)),
            "RECENT" => Ok(UntaggedResponse::Recent(n)),
            "EXPUNGE" => Ok(UntaggedResponse::Expunge(Self::seq(lexer, n)?)),
            "FETCH" => {
                let seq = Self::seq(lexer, n)?;
                lexer.expect_space()?;
                let items = fetch::parse_fetch_response(lexer)?;
                Ok(UntaggedResponse::Fetch { seq, items })
            }
            _ => {
                lexer.skip_spaces();
                Ok(UntaggedResponse::Other {
                    name: format!("{n} {keyword}"),
                    text: read_text_until_crlf(lexer),
                })
            }
        }
    }

    fn seq(lexer: &Lexer<'_>, n: u32) -> Result<SeqNum> {
        SeqNum::new(n).ok_or_else(|| lexer.error("Invalid sequence number 0"))
    }

    fn parse_continuation(lexer: &mut Lexer<'_>) -> Response {
        if lexer.peek() == Some(b' ') {
            lexer.advance();
        }
        let text = read_text_until_crlf(lexer);
        Response::Continuation {
            text: if text.is_empty() { None } else { Some(text) },
        }
    }

    fn parse_status(lexer: &mut Lexer<'_>) -> Result<Status> {
        let s = lexer.read_atom_string()?;
        match s.to_ascii_uppercase().as_str() {
            "OK" => Ok(Status::Ok),
            "NO" => Ok(Status::No),
            "BAD" => Ok(Status::Bad),
            "PREAUTH" => Ok(Status::PreAuth),
            "BYE" => Ok(Status::Bye),
            _ => Err(lexer.error(&format!("Invalid status: {s}"))),
        }
    }

    /// Parses `[SP] ["[" code "]" SP] text`. Some servers omit the text.
    fn parse_resp_text(lexer: &mut Lexer<'_>) -> Result<(Option<ResponseCode>, String)> {
        if lexer.peek() == Some(b' ') {
            lexer.advance();
        }
        let code = if lexer.peek() == Some(b'[') {
            Some(parse_response_code(lexer)?)
        } else {
            None
        };
        if lexer.peek() == Some(b' ') {
            lexer.advance();
        }
        Ok((code, read_text_until_crlf(lexer)))
    }
}
