//! RFC 2047 encoded-word decoding for header values.
//!
//! Values are unfolded first (CR/LF dropped, whitespace runs collapsed),
//! then every `=?charset?B|Q?text?=` word is decoded. Whitespace between two
//! adjacent encoded words is not part of the text. Malformed words are kept
//! verbatim.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use encoding_rs::Encoding;
use mailstore_imap::parser::unfold_header;

/// Unfolds and decodes a header value.
#[must_use]
pub fn decode_header(value: &str) -> String {
    let value = unfold_header(value);
    let mut out = String::with_capacity(value.len());
    let mut rest = value.as_str();
    let mut pending_space = String::new();
    let mut after_word = false;

    while !rest.is_empty() {
        if let Some((decoded, consumed)) = rest.starts_with("=?").then(|| decode_word(rest)).flatten()
        {
            // Whitespace between adjacent encoded words is dropped.
            if !after_word {
                out.push_str(&pending_space);
            }
            pending_space.clear();
            out.push_str(&decoded);
            rest = &rest[consumed..];
            after_word = true;
            continue;
        }

        let Some(ch) = rest.chars().next() else {
            break;
        };
        if ch == ' ' {
            pending_space.push(ch);
        } else {
            out.push_str(&pending_space);
            pending_space.clear();
            out.push(ch);
            after_word = false;
        }
        rest = &rest[ch.len_utf8()..];
    }
    out.push_str(&pending_space);
    out
}

/// Decodes one encoded word at the start of `input`. Returns the text and
/// the number of bytes consumed.
fn decode_word(input: &str) -> Option<(String, usize)> {
    let body = input.strip_prefix("=?")?;
    let (charset, body) = body.split_once('?')?;
    let (encoding, body) = body.split_once('?')?;
    let end = body.find("?=")?;
    let text = &body[..end];
    if text.contains(' ') {
        return None;
    }
    let consumed = 2 + charset.len() + 1 + encoding.len() + 1 + end + 2;

    let bytes = match encoding {
        "B" | "b" => STANDARD.decode(text).ok()?,
        "Q" | "q" => decode_q(text)?,
        _ => return None,
    };

    // RFC 2231 language suffix: `utf-8*en`.
    let charset = charset.split('*').next().unwrap_or(charset);
    Some((decode_charset(charset, &bytes), consumed))
}

/// Q encoding: `_` is space, `=XX` is a byte.
fn decode_q(text: &str) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(text.len());
    let mut bytes = text.bytes();
    while let Some(b) = bytes.next() {
        match b {
            b'_' => out.push(b' '),
            b'=' => {
                let hi = bytes.next()?;
                let lo = bytes.next()?;
                let hex = [hi, lo];
                let hex = std::str::from_utf8(&hex).ok()?;
                out.push(u8::from_str_radix(hex, 16).ok()?);
            }
            _ => out.push(b),
        }
    }
    Some(out)
}

/// Unknown labels are read as UTF-8.
fn decode_charset(charset: &str, bytes: &[u8]) -> String {
    match Encoding::for_label_no_replacement(charset.as_bytes()) {
        Some(encoding) => encoding.decode_with_bom_removal(bytes).0.into_owned(),
        None => String::from_utf8_lossy(bytes).into_owned(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_unchanged() {
        assert_eq!(decode_header("Hello world"), "Hello world");
    }

    #[test]
    fn base64_word() {
        assert_eq!(decode_header("=?utf-8?B?SMOpbGxv?="), "Héllo");
    }

    #[test]
    fn q_word() {
        assert_eq!(decode_header("=?UTF-8?Q?H=C3=A9llo_there?="), "Héllo there");
    }

    #[test]
    fn adjacent_words_join_without_space() {
        assert_eq!(decode_header("=?utf-8?Q?a?= =?utf-8?Q?b?="), "ab");
        assert_eq!(decode_header("x =?utf-8?Q?a?= y"), "x a y");
    }

    #[test]
    fn folded_subject_is_unfolded_before_decoding() {
        assert_eq!(
            decode_header("Re: =?utf-8?B?SMOpbGxv?=\r\n\t world"),
            "Re: Héllo world"
        );
    }

    #[test]
    fn latin1_charset() {
        assert_eq!(decode_header("=?ISO-8859-1?Q?caf=E9?="), "café");
    }

    #[test]
    fn windows_1252_charset() {
        assert_eq!(decode_header("=?windows-1252?Q?caf=E9_=80?="), "caf\u{e9} \u{20ac}");
    }

    #[test]
    fn koi8_r_charset() {
        assert_eq!(
            decode_header("=?koi8-r?B?8NLJ18XU?="),
            "\u{41f}\u{440}\u{438}\u{432}\u{435}\u{442}"
        );
    }

    #[test]
    fn unknown_charset_reads_as_utf8() {
        assert_eq!(decode_header("=?x-unknown?Q?caf=C3=A9?="), "caf\u{e9}");
    }

    #[test]
    fn malformed_word_is_kept() {
        assert_eq!(decode_header("=?utf-8?X?abc?="), "=?utf-8?X?abc?=");
        assert_eq!(decode_header("=?utf-8?B?"), "=?utf-8?B?");
    }
}
