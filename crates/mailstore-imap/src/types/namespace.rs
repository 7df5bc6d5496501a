//! NAMESPACE data (RFC 2342).

/// One namespace description: prefix plus hierarchy delimiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceDescr {
    /// Prefix, possibly empty, possibly ending with the delimiter.
    pub prefix: String,
    /// Hierarchy delimiter, `None` for a flat namespace.
    pub delimiter: Option<char>,
}

impl NamespaceDescr {
    /// The prefix with any trailing delimiter removed. This is the fullname
    /// of the namespace root folder.
    #[must_use]
    pub fn root(&self) -> &str {
        match self.delimiter {
            Some(d) => self.prefix.strip_suffix(d).unwrap_or(&self.prefix),
            None => &self.prefix,
        }
    }
}

/// The three namespace classes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Namespaces {
    /// Personal namespaces.
    pub personal: Vec<NamespaceDescr>,
    /// Other users' namespaces.
    pub other_users: Vec<NamespaceDescr>,
    /// Shared namespaces.
    pub shared: Vec<NamespaceDescr>,
}

impl Namespaces {
    /// The first personal namespace, if any.
    #[must_use]
    pub fn primary(&self) -> Option<&NamespaceDescr> {
        self.personal.first()
    }

    /// Non-empty roots of the other-users and shared namespaces.
    #[must_use]
    pub fn foreign_roots(&self) -> Vec<&NamespaceDescr> {
        self.other_users
            .iter()
            .chain(&self.shared)
            .filter(|ns| !ns.root().is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descr(prefix: &str, delimiter: char) -> NamespaceDescr {
        NamespaceDescr {
            prefix: prefix.to_string(),
            delimiter: Some(delimiter),
        }
    }

    #[test]
    fn root_strips_trailing_delimiter() {
        assert_eq!(descr("INBOX.", '.').root(), "INBOX");
        assert_eq!(descr("", '/').root(), "");
        assert_eq!(descr("Shared", '/').root(), "Shared");
    }

    #[test]
    fn foreign_roots_skip_empty_prefixes() {
        let ns = Namespaces {
            personal: vec![descr("", '/')],
            other_users: vec![descr("Other Users/", '/')],
            shared: vec![descr("", '/'), descr("Public/", '/')],
        };
        let roots: Vec<_> = ns.foreign_roots().into_iter().map(NamespaceDescr::root).collect();
        assert_eq!(roots, ["Other Users", "Public"]);
        assert_eq!(ns.primary().map(|p| p.prefix.as_str()), Some(""));
    }
}
