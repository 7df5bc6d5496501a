//! Parser helper functions.

use crate::parser::lexer::{Lexer, Token};
use crate::types::{
    AclEntry, Capability, Flag, Flags, ListResponse, Mailbox, MailboxAttribute, NamespaceDescr,
    Namespaces, Quota, QuotaResource, ResponseCode, Rights, SeqNum, ThreadNode, Uid, UidValidity,
};
use crate::{Result, utf7};

use super::types::StatusItem;

/// Parses a bracketed response code.
pub fn parse_response_code(lexer: &mut Lexer<'_>) -> Result<ResponseCode> {
    lexer.expect(Token::LBracket)?;

    let atom = lexer.read_atom_string()?;
    let code = match atom.to_ascii_uppercase().as_str() {
        "ALERT" => ResponseCode::Alert,
        "PARSE" => ResponseCode::Parse,
        "READ-ONLY" => ResponseCode::ReadOnly,
        "READ-WRITE" => ResponseCode::ReadWrite,
        "TRYCREATE" => ResponseCode::TryCreate,
        "OVERQUOTA" => ResponseCode::OverQuota,
        "NONEXISTENT" => ResponseCode::NonExistent,
        "ALREADYEXISTS" => ResponseCode::AlreadyExists,
        "NOPERM" => ResponseCode::NoPerm,
        "UIDNEXT" => {
            lexer.expect_space()?;
            let n = lexer.read_number()?;
            ResponseCode::UidNext(Uid::new(n).ok_or_else(|| lexer.error("Invalid UID 0"))?)
        }
        "UIDVALIDITY" => {
            lexer.expect_space()?;
            ResponseCode::UidValidity(read_uid_validity(lexer)?)
        }
        "UNSEEN" => {
            lexer.expect_space()?;
            let n = lexer.read_number()?;
            ResponseCode::Unseen(
                SeqNum::new(n).ok_or_else(|| lexer.error("Invalid sequence number 0"))?,
            )
        }
        "CAPABILITY" => ResponseCode::Capability(parse_capability_data(lexer)?),
        "PERMANENTFLAGS" => {
            lexer.expect_space()?;
            ResponseCode::PermanentFlags(parse_flag_list(lexer)?.into_iter().collect())
        }
        "APPENDUID" => {
            lexer.expect_space()?;
            let uidvalidity = read_uid_validity(lexer)?;
            lexer.expect_space()?;
            let uids = read_uid_set(lexer)?;
            ResponseCode::AppendUid { uidvalidity, uids }
        }
        "COPYUID" => {
            lexer.expect_space()?;
            let uidvalidity = read_uid_validity(lexer)?;
            lexer.expect_space()?;
            let source_uids = read_uid_set(lexer)?;
            lexer.expect_space()?;
            let dest_uids = read_uid_set(lexer)?;
            ResponseCode::CopyUid {
                uidvalidity,
                source_uids,
                dest_uids,
            }
        }
        _ => ResponseCode::Unknown(atom.to_string()),
    };

    while lexer.peek() != Some(b']') && !lexer.is_eof() {
        lexer.advance();
    }
    lexer.expect(Token::RBracket)?;

    Ok(code)
}

fn read_uid_validity(lexer: &mut Lexer<'_>) -> Result<UidValidity> {
    let n = lexer.read_number()?;
    UidValidity::new(n).ok_or_else(|| lexer.error("Invalid UIDVALIDITY 0"))
}

/// Reads a uid-set such as `4`, `3:5` or `3:5,9` and expands it in
/// ascending order per range.
fn read_uid_set(lexer: &mut Lexer<'_>) -> Result<Vec<Uid>> {
    let raw = match lexer.next_token()? {
        Token::Number(n) => n.to_string(),
        Token::Atom(s) => s.to_string(),
        token => return Err(lexer.error(&format!("Expected uid-set, got {token:?}"))),
    };
    expand_uid_set(&raw).ok_or_else(|| lexer.error(&format!("Invalid uid-set: {raw}")))
}

fn expand_uid_set(raw: &str) -> Option<Vec<Uid>> {
    let mut uids = Vec::new();
    for part in raw.split(',') {
        if let Some((a, b)) = part.split_once(':') {
            let a: u32 = a.parse().ok()?;
            let b: u32 = b.parse().ok()?;
            for n in a.min(b)..=a.max(b) {
                uids.push(Uid::new(n)?);
            }
        } else {
            uids.push(Uid::new(part.parse().ok()?)?);
        }
    }
    Some(uids)
}

/// Parses capability data.
pub fn parse_capability_data(lexer: &mut Lexer<'_>) -> Result<Vec<Capability>> {
    let mut caps = Vec::new();
    while lexer.peek() == Some(b' ') {
        lexer.advance();
        if let Token::Atom(s) = lexer.next_token()? {
            caps.push(Capability::parse(s));
        }
    }
    Ok(caps)
}

/// Parses a parenthesized flag list.
pub fn parse_flag_list(lexer: &mut Lexer<'_>) -> Result<Flags> {
    lexer.expect(Token::LParen)?;

    let mut flags = Flags::new();
    loop {
        match lexer.next_token()? {
            Token::RParen => break,
            Token::Atom(s) => flags.insert(Flag::parse(s)),
            Token::Space => {}
            token => {
                return Err(lexer.error(&format!("Unexpected token in flag list: {token:?}")));
            }
        }
    }
    Ok(flags)
}

/// Reads a mailbox name, decoding modified UTF-7 and normalizing INBOX.
pub fn read_mailbox(lexer: &mut Lexer<'_>) -> Result<Mailbox> {
    let raw = lexer.read_astring()?;
    let mailbox = Mailbox::new(utf7::decode_lossy(raw));
    Ok(if mailbox.is_inbox() {
        Mailbox::inbox()
    } else {
        mailbox
    })
}

/// Parses the body of a LIST or LSUB response.
pub fn parse_list_response(lexer: &mut Lexer<'_>) -> Result<ListResponse> {
    lexer.expect(Token::LParen)?;
    let mut attributes = Vec::new();
    loop {
        match lexer.next_token()? {
            Token::RParen => break,
            Token::Atom(s) => attributes.push(MailboxAttribute::parse(s)),
            Token::Space => {}
            token => {
                return Err(lexer.error(&format!("Unexpected token in LIST attributes: {token:?}")));
            }
        }
    }

    lexer.expect_space()?;
    let delimiter = match lexer.next_token()? {
        Token::Nil => None,
        Token::QuotedString(s) => s.chars().next(),
        token => return Err(lexer.error(&format!("Expected delimiter, got {token:?}"))),
    };

    lexer.expect_space()?;
    let mailbox = read_mailbox(lexer)?;

    Ok(ListResponse {
        attributes,
        delimiter,
        mailbox,
    })
}

/// Parses SEARCH or SORT numbers. Trailing non-numeric data (such as a
/// MODSEQ suffix) is ignored.
pub fn parse_number_list(lexer: &mut Lexer<'_>) -> Result<Vec<u32>> {
    let mut nums = Vec::new();
    while lexer.peek() == Some(b' ') {
        lexer.advance();
        if let Token::Number(n) = lexer.next_token()?
            && let Ok(n) = u32::try_from(n)
            && n > 0
        {
            nums.push(n);
        }
    }
    Ok(nums)
}

/// Parses a STATUS response: `mailbox (ATTR n ATTR n ...)`.
///
/// Attributes missing from the list are simply absent from the result.
/// A response without the opening parenthesis is malformed.
pub fn parse_status_response(lexer: &mut Lexer<'_>) -> Result<(Mailbox, Vec<StatusItem>)> {
    let mailbox = read_mailbox(lexer)?;
    lexer.skip_spaces();
    if lexer.peek() != Some(b'(') {
        return Err(lexer.error("STATUS response without attribute list"));
    }

    let pairs = lexer.read_list(|lx| {
        let name = lx.read_atom_string()?.to_ascii_uppercase();
        lx.expect_space()?;
        let value = lx.read_number64()?;
        Ok((name, value))
    })?;

    let items = pairs
        .into_iter()
        .filter_map(|(name, value)| {
            let value = u32::try_from(value).ok()?;
            match name.as_str() {
                "MESSAGES" => Some(StatusItem::Messages(value)),
                "RECENT" => Some(StatusItem::Recent(value)),
                "UNSEEN" => Some(StatusItem::Unseen(value)),
                "UIDNEXT" => Uid::new(value).map(StatusItem::UidNext),
                "UIDVALIDITY" => UidValidity::new(value).map(StatusItem::UidValidity),
                _ => None,
            }
        })
        .collect();

    Ok((mailbox, items))
}

/// Parses a QUOTA response: `root (NAME usage limit ...)`.
///
/// A root followed directly by end of line (or NUL) instead of a list is
/// a valid encoding of "no resource restriction" and yields an empty list.
pub fn parse_quota_response(lexer: &mut Lexer<'_>) -> Result<Quota> {
    let root = lexer.read_astring()?;
    lexer.skip_spaces();

    if lexer.peek() != Some(b'(') {
        if lexer.at_line_end() {
            return Ok(Quota {
                root,
                resources: Vec::new(),
            });
        }
        return Err(lexer.error("Expected resource list after quota root"));
    }

    lexer.expect(Token::LParen)?;
    let mut resources = Vec::new();
    loop {
        lexer.skip_spaces();
        match lexer.peek() {
            Some(b')') => {
                lexer.advance();
                break;
            }
            None => return Err(lexer.error("Unterminated quota resource list")),
            Some(_) => {
                let name = lexer.read_atom_string()?.to_string();
                lexer.expect_space()?;
                let usage = lexer.read_number64()?;
                lexer.expect_space()?;
                let limit = lexer.read_number64()?;
                resources.push(QuotaResource { name, usage, limit });
            }
        }
    }

    Ok(Quota { root, resources })
}

/// Parses a QUOTAROOT response: `mailbox *(SP root)`.
pub fn parse_quota_root_response(lexer: &mut Lexer<'_>) -> Result<(Mailbox, Vec<String>)> {
    let mailbox = read_mailbox(lexer)?;
    let mut roots = Vec::new();
    while lexer.peek() == Some(b' ') {
        lexer.advance();
        if lexer.at_line_end() {
            break;
        }
        roots.push(lexer.read_astring()?);
    }
    Ok((mailbox, roots))
}

/// Parses an ACL response: `mailbox *(SP identifier SP rights)`.
pub fn parse_acl_response(lexer: &mut Lexer<'_>) -> Result<(Mailbox, Vec<AclEntry>)> {
    let mailbox = read_mailbox(lexer)?;
    let mut entries = Vec::new();
    while lexer.peek() == Some(b' ') {
        lexer.advance();
        if lexer.at_line_end() {
            break;
        }
        let identifier = lexer.read_astring()?;
        lexer.expect_space()?;
        let rights = Rights::parse(&lexer.read_astring()?);
        entries.push(AclEntry { identifier, rights });
    }
    Ok((mailbox, entries))
}

/// Parses a MYRIGHTS response: `mailbox SP rights`.
pub fn parse_my_rights_response(lexer: &mut Lexer<'_>) -> Result<(Mailbox, Rights)> {
    let mailbox = read_mailbox(lexer)?;
    lexer.expect_space()?;
    let rights = Rights::parse(&lexer.read_astring()?);
    Ok((mailbox, rights))
}

/// Parses a NAMESPACE response: personal, other users and shared, each
/// NIL or a list of `(prefix delimiter [extensions])`.
pub fn parse_namespace_response(lexer: &mut Lexer<'_>) -> Result<Namespaces> {
    let personal = parse_namespace_class(lexer)?;
    lexer.expect_space()?;
    let other_users = parse_namespace_class(lexer)?;
    lexer.expect_space()?;
    let shared = parse_namespace_class(lexer)?;
    Ok(Namespaces {
        personal,
        other_users,
        shared,
    })
}

fn parse_namespace_class(lexer: &mut Lexer<'_>) -> Result<Vec<NamespaceDescr>> {
    if lexer.peek() == Some(b'(') {
        lexer.read_list(parse_namespace_descr)
    } else {
        lexer.expect(Token::Nil)?;
        Ok(Vec::new())
    }
}

fn parse_namespace_descr(lexer: &mut Lexer<'_>) -> Result<NamespaceDescr> {
    lexer.expect(Token::LParen)?;
    let prefix = utf7::decode_lossy(lexer.read_astring()?);
    lexer.expect_space()?;
    let delimiter = match lexer.next_token()? {
        Token::Nil => None,
        Token::QuotedString(s) => s.chars().next(),
        token => return Err(lexer.error(&format!("Expected delimiter, got {token:?}"))),
    };
    skip_to_close_paren(lexer)?;
    Ok(NamespaceDescr { prefix, delimiter })
}

/// Parses a THREAD response into one tree per thread.
pub fn parse_thread_response(lexer: &mut Lexer<'_>) -> Result<Vec<ThreadNode>> {
    let mut threads = Vec::new();
    loop {
        lexer.skip_spaces();
        if lexer.peek() != Some(b'(') {
            return Ok(threads);
        }
        threads.push(parse_thread_list(lexer)?);
    }
}

/// `thread-list = "(" (thread-members / thread-nested) ")"`: a chain of
/// numbers, each the parent of the next, optionally followed by nested
/// lists that are children of the last number.
fn parse_thread_list(lexer: &mut Lexer<'_>) -> Result<ThreadNode> {
    lexer.expect(Token::LParen)?;
    let mut chain = Vec::new();
    let mut nested = Vec::new();
    loop {
        lexer.skip_spaces();
        match lexer.peek() {
            Some(b')') => {
                lexer.advance();
                break;
            }
            Some(b'(') => nested.push(parse_thread_list(lexer)?),
            Some(_) => chain.push(lexer.read_number()?),
            None => return Err(lexer.error("Unterminated thread list")),
        }
    }

    let mut node = ThreadNode {
        id: chain.pop(),
        children: nested,
    };
    while let Some(id) = chain.pop() {
        node = ThreadNode {
            id: Some(id),
            children: vec![node],
        };
    }
    Ok(node)
}

/// Consumes tokens up to and including the `)` closing the current list.
pub fn skip_to_close_paren(lexer: &mut Lexer<'_>) -> Result<()> {
    let mut depth = 1usize;
    while depth > 0 {
        match lexer.next_token()? {
            Token::LParen => depth += 1,
            Token::RParen => depth -= 1,
            Token::Eof | Token::Crlf => return Err(lexer.error("Unbalanced parentheses")),
            _ => {}
        }
    }
    Ok(())
}

/// Reads text until the end of the line and consumes the line ending.
pub fn read_text_until_crlf(lexer: &mut Lexer<'_>) -> String {
    let remaining = lexer.remaining();
    let end = remaining
        .iter()
        .position(|&b| b == b'\r' || b == b'\n')
        .unwrap_or(remaining.len());

    lexer.skip(end);
    if lexer.peek() == Some(b'\r') {
        lexer.advance();
    }
    if lexer.peek() == Some(b'\n') {
        lexer.advance();
    }

    String::from_utf8_lossy(&remaining[..end]).into_owned()
}

/// Unfolds a header value: CR and LF are removed and every run of spaces
/// and tabs collapses to one space.
#[must_use]
pub fn unfold_header(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut in_whitespace = false;
    for ch in value.chars() {
        match ch {
            '\r' | '\n' => {}
            ' ' | '\t' => {
                if !in_whitespace {
                    out.push(' ');
                    in_whitespace = true;
                }
            }
            _ => {
                out.push(ch);
                in_whitespace = false;
            }
        }
    }
    out
}
