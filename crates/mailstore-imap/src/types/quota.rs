//! QUOTA data (RFC 2087).

/// One `(name usage limit)` triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaResource {
    /// Resource name such as `STORAGE` or `MESSAGE`.
    pub name: String,
    /// Current usage. STORAGE is in units of 1024 octets.
    pub usage: u64,
    /// Limit in the same units.
    pub limit: u64,
}

/// A QUOTA response for one quota root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Quota {
    /// Quota root name.
    pub root: String,
    /// Resource limits. Empty means no restriction.
    pub resources: Vec<QuotaResource>,
}

impl Quota {
    /// Looks up a resource by name, case-insensitively.
    #[must_use]
    pub fn resource(&self, name: &str) -> Option<&QuotaResource> {
        self.resources.iter().find(|r| r.name.eq_ignore_ascii_case(name))
    }
}
