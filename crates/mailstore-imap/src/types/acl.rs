//! Access control lists (RFC 4314).

/// A single mailbox right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Right {
    /// `l`: mailbox is visible to LIST/LSUB.
    Lookup,
    /// `r`: SELECT, FETCH, SEARCH, COPY from.
    Read,
    /// `s`: keep `\Seen` across sessions.
    KeepSeen,
    /// `w`: set flags other than `\Seen` and `\Deleted`.
    Write,
    /// `i`: APPEND and COPY into.
    Insert,
    /// `p`: send mail to the submission address.
    Post,
    /// `k` (legacy `c`): create child mailboxes.
    CreateMailbox,
    /// `x` (legacy `c`): delete or rename the mailbox.
    DeleteMailbox,
    /// `t` (legacy `d`): set or clear `\Deleted`.
    DeleteMessages,
    /// `e` (legacy `d`): EXPUNGE.
    Expunge,
    /// `a`: administer the ACL.
    Administer,
}

impl Right {
    /// The RFC 4314 letter for this right.
    #[must_use]
    pub const fn letter(self) -> char {
        match self {
            Self::Lookup => 'l',
            Self::Read => 'r',
            Self::KeepSeen => 's',
            Self::Write => 'w',
            Self::Insert => 'i',
            Self::Post => 'p',
            Self::CreateMailbox => 'k',
            Self::DeleteMailbox => 'x',
            Self::DeleteMessages => 't',
            Self::Expunge => 'e',
            Self::Administer => 'a',
        }
    }

    const fn bit(self) -> u16 {
        1 << (self as u16)
    }

    const ALL: [Self; 11] = [
        Self::Lookup,
        Self::Read,
        Self::KeepSeen,
        Self::Write,
        Self::Insert,
        Self::Post,
        Self::CreateMailbox,
        Self::DeleteMailbox,
        Self::DeleteMessages,
        Self::Expunge,
        Self::Administer,
    ];
}

impl std::fmt::Display for Right {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Lookup => "lookup",
            Self::Read => "read",
            Self::KeepSeen => "keep-seen",
            Self::Write => "write",
            Self::Insert => "insert",
            Self::Post => "post",
            Self::CreateMailbox => "create",
            Self::DeleteMailbox => "delete-mailbox",
            Self::DeleteMessages => "delete",
            Self::Expunge => "expunge",
            Self::Administer => "administer",
        };
        f.write_str(name)
    }
}

/// A set of rights.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Rights(u16);

impl Rights {
    /// No rights at all.
    #[must_use]
    pub const fn none() -> Self {
        Self(0)
    }

    /// Every right. Used when the server does not enforce ACLs.
    #[must_use]
    pub fn all() -> Self {
        Right::ALL.into_iter().collect()
    }

    /// Parses a rights string. Legacy `c` expands to `kx` and `d` to `te`;
    /// unknown letters are ignored.
    #[must_use]
    pub fn parse(letters: &str) -> Self {
        let mut rights = Self::none();
        for ch in letters.chars() {
            match ch {
                'c' => {
                    rights.insert(Right::CreateMailbox);
                    rights.insert(Right::DeleteMailbox);
                }
                'd' => {
                    rights.insert(Right::DeleteMessages);
                    rights.insert(Right::Expunge);
                }
                _ => {
                    if let Some(right) = Right::ALL.into_iter().find(|r| r.letter() == ch) {
                        rights.insert(right);
                    }
                }
            }
        }
        rights
    }

    /// Adds a right.
    pub const fn insert(&mut self, right: Right) {
        self.0 |= right.bit();
    }

    /// Returns true if the right is granted.
    #[must_use]
    pub const fn has(self, right: Right) -> bool {
        self.0 & right.bit() != 0
    }

    /// Returns true if nothing is granted.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Iterates over granted rights.
    pub fn iter(self) -> impl Iterator<Item = Right> {
        Right::ALL.into_iter().filter(move |r| self.has(*r))
    }
}

impl FromIterator<Right> for Rights {
    fn from_iter<I: IntoIterator<Item = Right>>(iter: I) -> Self {
        let mut rights = Self::none();
        for right in iter {
            rights.insert(right);
        }
        rights
    }
}

impl std::fmt::Display for Rights {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for right in self.iter() {
            write!(f, "{}", right.letter())?;
        }
        Ok(())
    }
}

/// One entry of a GETACL response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AclEntry {
    /// Protocol identifier, usually a login name or `anyone`.
    pub identifier: String,
    /// Granted rights.
    pub rights: Rights,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rfc4314_letters() {
        let rights = Rights::parse("lrswi");
        assert!(rights.has(Right::Lookup));
        assert!(rights.has(Right::KeepSeen));
        assert!(rights.has(Right::Insert));
        assert!(!rights.has(Right::Administer));
        assert_eq!(rights.to_string(), "lrswi");
    }

    #[test]
    fn legacy_letters_expand() {
        let rights = Rights::parse("lrcd");
        assert!(rights.has(Right::CreateMailbox));
        assert!(rights.has(Right::DeleteMailbox));
        assert!(rights.has(Right::DeleteMessages));
        assert!(rights.has(Right::Expunge));
        assert_eq!(rights.to_string(), "lrkxte");
    }

    #[test]
    fn unknown_letters_are_ignored() {
        assert_eq!(Rights::parse("l9z"), Rights::parse("l"));
        assert!(Rights::parse("").is_empty());
    }

    #[test]
    fn all_contains_everything() {
        assert_eq!(Rights::all().to_string(), "lrswipkxtea");
    }
}
