//! Server capabilities and response status.

/// Status of a tagged or untagged condition response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Command completed successfully.
    Ok,
    /// Command failed (operational error).
    No,
    /// Command failed (protocol/syntax error).
    Bad,
    /// Server greeting (pre-authenticated).
    PreAuth,
    /// Server is closing the connection.
    Bye,
}

impl Status {
    /// Returns true if this is a successful status.
    #[must_use]
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok | Self::PreAuth)
    }
}

/// Server capability.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Capability {
    /// `IMAP4rev1` (RFC 3501)
    Imap4Rev1,
    /// `IMAP4rev2` (RFC 9051)
    Imap4Rev2,
    /// NAMESPACE (RFC 2342)
    Namespace,
    /// UIDPLUS (RFC 4315)
    UidPlus,
    /// MOVE (RFC 6851)
    Move,
    /// SORT (RFC 5256)
    Sort,
    /// THREAD=<algorithm> (RFC 5256)
    Thread(String),
    /// QUOTA (RFC 2087)
    Quota,
    /// ACL (RFC 4314)
    Acl,
    /// RIGHTS=<letters> (RFC 4314)
    Rights(String),
    /// CHILDREN (RFC 3348)
    Children,
    /// UNSELECT (RFC 3691)
    Unselect,
    /// LITERAL+ (RFC 7888)
    LiteralPlus,
    /// STARTTLS
    StartTls,
    /// LOGINDISABLED
    LoginDisabled,
    /// AUTH=<mechanism>
    Auth(String),
    /// SPECIAL-USE (RFC 6154)
    SpecialUse,
    /// Unknown capability
    Unknown(String),
}

impl Capability {
    /// Parses a capability string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        let upper = s.to_ascii_uppercase();
        match upper.as_str() {
            "IMAP4REV1" => Self::Imap4Rev1,
            "IMAP4REV2" => Self::Imap4Rev2,
            "NAMESPACE" => Self::Namespace,
            "UIDPLUS" => Self::UidPlus,
            "MOVE" => Self::Move,
            "SORT" => Self::Sort,
            "QUOTA" => Self::Quota,
            "ACL" => Self::Acl,
            "CHILDREN" => Self::Children,
            "UNSELECT" => Self::Unselect,
            "LITERAL+" => Self::LiteralPlus,
            "STARTTLS" => Self::StartTls,
            "LOGINDISABLED" => Self::LoginDisabled,
            "SPECIAL-USE" => Self::SpecialUse,
            _ if upper.starts_with("AUTH=") => Self::Auth(s[5..].to_string()),
            _ if upper.starts_with("THREAD=") => Self::Thread(upper[7..].to_string()),
            _ if upper.starts_with("RIGHTS=") => Self::Rights(s[7..].to_string()),
            _ => Self::Unknown(s.to_string()),
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Imap4Rev1 => write!(f, "IMAP4rev1"),
            Self::Imap4Rev2 => write!(f, "IMAP4rev2"),
            Self::Namespace => write!(f, "NAMESPACE"),
            Self::UidPlus => write!(f, "UIDPLUS"),
            Self::Move => write!(f, "MOVE"),
            Self::Sort => write!(f, "SORT"),
            Self::Thread(algorithm) => write!(f, "THREAD={algorithm}"),
            Self::Quota => write!(f, "QUOTA"),
            Self::Acl => write!(f, "ACL"),
            Self::Rights(letters) => write!(f, "RIGHTS={letters}"),
            Self::Children => write!(f, "CHILDREN"),
            Self::Unselect => write!(f, "UNSELECT"),
            Self::LiteralPlus => write!(f, "LITERAL+"),
            Self::StartTls => write!(f, "STARTTLS"),
            Self::LoginDisabled => write!(f, "LOGINDISABLED"),
            Self::Auth(mech) => write!(f, "AUTH={mech}"),
            Self::SpecialUse => write!(f, "SPECIAL-USE"),
            Self::Unknown(s) => write!(f, "{s}"),
        }
    }
}

/// The capability set advertised by a server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities(Vec<Capability>);

impl Capabilities {
    /// Wraps a parsed capability list.
    #[must_use]
    pub const fn new(capabilities: Vec<Capability>) -> Self {
        Self(capabilities)
    }

    /// Returns true if the capability was advertised.
    #[must_use]
    pub fn has(&self, capability: &Capability) -> bool {
        self.0.contains(capability)
    }

    /// Returns true if `THREAD=<algorithm>` was advertised.
    #[must_use]
    pub fn has_thread(&self, algorithm: &str) -> bool {
        self.0
            .iter()
            .any(|c| matches!(c, Capability::Thread(a) if a.eq_ignore_ascii_case(algorithm)))
    }

    /// Iterates over the advertised capabilities.
    pub fn iter(&self) -> impl Iterator<Item = &Capability> {
        self.0.iter()
    }

    /// Returns true if nothing was advertised.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_ok_includes_preauth() {
        assert!(Status::Ok.is_ok());
        assert!(Status::PreAuth.is_ok());
        assert!(!Status::No.is_ok());
        assert!(!Status::Bye.is_ok());
    }

    #[test]
    fn parse_extensions() {
        assert_eq!(Capability::parse("sort"), Capability::Sort);
        assert_eq!(Capability::parse("QUOTA"), Capability::Quota);
        assert_eq!(Capability::parse("UIDPLUS"), Capability::UidPlus);
        assert_eq!(
            Capability::parse("THREAD=references"),
            Capability::Thread("REFERENCES".to_string())
        );
        assert_eq!(
            Capability::parse("RIGHTS=texk"),
            Capability::Rights("texk".to_string())
        );
        assert_eq!(
            Capability::parse("AUTH=PLAIN"),
            Capability::Auth("PLAIN".to_string())
        );
        assert_eq!(
            Capability::parse("XLIST"),
            Capability::Unknown("XLIST".to_string())
        );
    }

    #[test]
    fn display_round_trip() {
        for raw in ["IMAP4rev1", "THREAD=REFERENCES", "AUTH=PLAIN", "UNSELECT"] {
            assert_eq!(Capability::parse(raw).to_string(), raw);
        }
    }

    #[test]
    fn set_lookup() {
        let caps = Capabilities::new(vec![
            Capability::Imap4Rev1,
            Capability::Thread("ORDEREDSUBJECT".to_string()),
            Capability::Thread("REFERENCES".to_string()),
        ]);
        assert!(caps.has(&Capability::Imap4Rev1));
        assert!(!caps.has(&Capability::Sort));
        assert!(caps.has_thread("references"));
        assert!(!caps.has_thread("REFS"));
    }
}
