//! Quota results.

use mailstore_imap::Quota;

/// Usage of one quota resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaUsage {
    /// Resource name, e.g. `STORAGE` (KiB) or `MESSAGE` (count).
    pub resource: String,
    /// Current usage.
    pub usage: u64,
    /// Limit.
    pub limit: u64,
}

/// The quota governing a folder. No resources means unlimited.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuotaInfo {
    /// Quota root, `None` when the folder has none.
    pub root: Option<String>,
    /// Limited resources.
    pub resources: Vec<QuotaUsage>,
}

impl QuotaInfo {
    /// No limits.
    #[must_use]
    pub fn unlimited() -> Self {
        Self::default()
    }

    /// True when no resource is limited.
    #[must_use]
    pub fn is_unlimited(&self) -> bool {
        self.resources.is_empty()
    }

    /// Looks up a resource, case-insensitively. `None` means unlimited.
    #[must_use]
    pub fn resource(&self, name: &str) -> Option<&QuotaUsage> {
        self.resources
            .iter()
            .find(|r| r.resource.eq_ignore_ascii_case(name))
    }

    /// STORAGE usage and limit in bytes.
    #[must_use]
    pub fn storage_bytes(&self) -> Option<(u64, u64)> {
        self.resource("STORAGE")
            .map(|r| (r.usage.saturating_mul(1024), r.limit.saturating_mul(1024)))
    }
}

impl From<Quota> for QuotaInfo {
    fn from(quota: Quota) -> Self {
        Self {
            root: Some(quota.root),
            resources: quota
                .resources
                .into_iter()
                .map(|r| QuotaUsage {
                    resource: r.name,
                    usage: r.usage,
                    limit: r.limit,
                })
                .collect(),
        }
    }
}
