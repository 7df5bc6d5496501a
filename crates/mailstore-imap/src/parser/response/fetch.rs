//! FETCH response parsing.

use crate::parser::lexer::{Lexer, Token};
use crate::types::Uid;
use crate::Result;

use super::helpers::{parse_flag_list, skip_to_close_paren, unfold_header};
use super::types::{Address, BodyStructure, Envelope, FetchItem};

/// Parses the parenthesized item list of a FETCH response.
pub fn parse_fetch_response(lexer: &mut Lexer<'_>) -> Result<Vec<FetchItem>> {
    lexer.expect(Token::LParen)?;

    let mut items = Vec::new();
    loop {
        match lexer.next_token()? {
            Token::RParen => break,
            Token::Space => {}
            Token::Atom(name) => match name.to_ascii_uppercase().as_str() {
                "FLAGS" => {
                    lexer.expect_space()?;
                    items.push(FetchItem::Flags(parse_flag_list(lexer)?));
                }
                "UID" => {
                    lexer.expect_space()?;
                    let n = lexer.read_number()?;
                    let uid = Uid::new(n)
                        .ok_or_else(|| lexer.error("invalid UID value 0 in FETCH response"))?;
                    items.push(FetchItem::Uid(uid));
                }
                "RFC822.SIZE" => {
                    lexer.expect_space()?;
                    items.push(FetchItem::Rfc822Size(lexer.read_number()?));
                }
                "INTERNALDATE" => {
                    lexer.expect_space()?;
                    if let Some(date) = lexer.read_nstring()? {
                        items.push(FetchItem::InternalDate(date));
                    }
                }
                "ENVELOPE" => {
                    lexer.expect_space()?;
                    items.push(FetchItem::Envelope(Box::new(parse_envelope(lexer)?)));
                }
                "BODYSTRUCTURE" => {
                    lexer.expect_space()?;
                    items.push(FetchItem::BodyStructure(parse_body_structure(lexer)?));
                }
                // Non-extensible BODY is a structure, BODY[...] is content.
                "BODY" if lexer.peek() == Some(b' ') => {
                    lexer.expect_space()?;
                    items.push(FetchItem::BodyStructure(parse_body_structure(lexer)?));
                }
                "BODY" | "RFC822" | "RFC822.HEADER" | "RFC822.TEXT" => {
                    let (section, origin) = parse_body_section_and_origin(lexer);
                    lexer.expect_space()?;
                    let data = match lexer.next_token()? {
                        Token::Literal(d) => Some(d),
                        Token::QuotedString(s) => Some(s.into_bytes()),
                        _ => None,
                    };
                    items.push(FetchItem::Body {
                        section,
                        origin,
                        data,
                    });
                }
                _ => skip_fetch_value(lexer)?,
            },
            token => return Err(lexer.error(&format!("Unexpected token in FETCH: {token:?}"))),
        }
    }

    Ok(items)
}

/// Parses the optional `[section]` and `<origin>` after BODY.
fn parse_body_section_and_origin(lexer: &mut Lexer<'_>) -> (Option<String>, Option<u32>) {
    let mut section = None;
    if lexer.peek() == Some(b'[') {
        lexer.advance();
        let mut buf = String::new();
        while let Some(b) = lexer.advance() {
            if b == b']' {
                break;
            }
            buf.push(char::from(b));
        }
        if !buf.is_empty() {
            section = Some(buf);
        }
    }

    let mut origin = None;
    if lexer.peek() == Some(b'<') {
        lexer.advance();
        let mut buf = String::new();
        while let Some(b) = lexer.peek() {
            lexer.advance();
            if b == b'>' {
                break;
            }
            buf.push(char::from(b));
        }
        origin = buf.parse().ok();
    }

    (section, origin)
}

/// Parses an envelope structure. The subject is unfolded here so that MIME
/// decoding downstream sees a single line.
pub fn parse_envelope(lexer: &mut Lexer<'_>) -> Result<Envelope> {
    lexer.expect(Token::LParen)?;

    let date = lexer.read_nstring()?;
    lexer.expect_space()?;
    let subject = lexer.read_nstring()?.map(|s| unfold_header(&s));
    lexer.expect_space()?;
    let from = parse_address_list(lexer)?;
    lexer.expect_space()?;
    let sender = parse_address_list(lexer)?;
    lexer.expect_space()?;
    let reply_to = parse_address_list(lexer)?;
    lexer.expect_space()?;
    let to = parse_address_list(lexer)?;
    lexer.expect_space()?;
    let cc = parse_address_list(lexer)?;
    lexer.expect_space()?;
    let bcc = parse_address_list(lexer)?;
    lexer.expect_space()?;
    let in_reply_to = lexer.read_nstring()?;
    lexer.expect_space()?;
    let message_id = lexer.read_nstring()?;
    lexer.expect(Token::RParen)?;

    Ok(Envelope {
        date,
        subject,
        from,
        sender,
        reply_to,
        to,
        cc,
        bcc,
        in_reply_to,
        message_id,
    })
}

fn parse_address_list(lexer: &mut Lexer<'_>) -> Result<Vec<Address>> {
    if lexer.peek() == Some(b'(') {
        lexer.read_list(parse_address)
    } else {
        lexer.expect(Token::Nil)?;
        Ok(Vec::new())
    }
}

fn parse_address(lexer: &mut Lexer<'_>) -> Result<Address> {
    lexer.expect(Token::LParen)?;
    let name = lexer.read_nstring()?;
    lexer.expect_space()?;
    let adl = lexer.read_nstring()?;
    lexer.expect_space()?;
    let mailbox = lexer.read_nstring()?;
    lexer.expect_space()?;
    let host = lexer.read_nstring()?;
    lexer.expect(Token::RParen)?;

    Ok(Address {
        name,
        adl,
        mailbox,
        host,
    })
}

/// Parses a BODYSTRUCTURE. Extension data is skipped.
pub fn parse_body_structure(lexer: &mut Lexer<'_>) -> Result<BodyStructure> {
    lexer.expect(Token::LParen)?;

    if lexer.peek() == Some(b'(') {
        let mut parts = Vec::new();
        while lexer.peek() == Some(b'(') {
            parts.push(parse_body_structure(lexer)?);
            lexer.skip_spaces();
        }
        let subtype = lexer.read_nstring()?.unwrap_or_default().to_ascii_uppercase();
        skip_to_close_paren(lexer)?;
        return Ok(BodyStructure::Multipart { parts, subtype });
    }

    let media_type = lexer.read_nstring()?.unwrap_or_default().to_ascii_uppercase();
    lexer.expect_space()?;
    let media_subtype = lexer.read_nstring()?.unwrap_or_default().to_ascii_uppercase();
    lexer.expect_space()?;
    let params = parse_body_params(lexer)?;
    lexer.expect_space()?;
    let _id = lexer.read_nstring()?;
    lexer.expect_space()?;
    let _description = lexer.read_nstring()?;
    lexer.expect_space()?;
    let encoding = lexer.read_nstring()?.unwrap_or_default();
    lexer.expect_space()?;
    let size = lexer.read_number()?;

    let lines = if media_type == "TEXT" && lexer.peek() == Some(b' ') {
        lexer.advance();
        Some(lexer.read_number()?)
    } else {
        None
    };

    skip_to_close_paren(lexer)?;

    Ok(BodyStructure::Single {
        media_type,
        media_subtype,
        params,
        encoding,
        size,
        lines,
    })
}

fn parse_body_params(lexer: &mut Lexer<'_>) -> Result<Vec<(String, String)>> {
    if lexer.peek() != Some(b'(') {
        lexer.expect(Token::Nil)?;
        return Ok(Vec::new());
    }
    lexer.read_list(|lx| {
        let key = lx.read_nstring()?.unwrap_or_default();
        lx.expect_space()?;
        let value = lx.read_nstring()?.unwrap_or_default();
        Ok((key, value))
    })
}

/// Skips the value of an unknown FETCH item.
fn skip_fetch_value(lexer: &mut Lexer<'_>) -> Result<()> {
    // Section-like suffixes, e.g. BINARY[1]
    if lexer.peek() == Some(b'[') {
        parse_body_section_and_origin(lexer);
    }
    lexer.expect_space()?;
    if lexer.next_token()? == Token::LParen {
        skip_to_close_paren(lexer)?;
    }
    Ok(())
}
