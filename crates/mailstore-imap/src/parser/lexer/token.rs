//! IMAP token types.

/// Token types produced by the lexer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token<'a> {
    /// Atom (unquoted string without special characters). Flags such as
    /// `\Seen` and the `\*` wildcard lex as a single atom.
    Atom(&'a str),
    /// Quoted string, unescaped.
    QuotedString(String),
    /// Literal string with size prefix `{n}`.
    Literal(Vec<u8>),
    /// Number. QUOTA usage values can exceed 32 bits.
    Number(u64),
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// Space character.
    Space,
    /// `*` (untagged prefix or sequence wildcard).
    Asterisk,
    /// `+` (continuation prefix).
    Plus,
    /// NIL
    Nil,
    /// CRLF line ending.
    Crlf,
    /// End of input.
    Eof,
}
