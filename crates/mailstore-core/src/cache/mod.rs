//! Per-session read-through caches.
//!
//! Entries live as long as the store. Locks are never held across `.await`;
//! every accessor clones out. Structural mutations call
//! [`SessionCache::invalidate`] for every fullname they touch.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use mailstore_imap::{ListResponse, Rights};

use crate::model::{DefaultSlot, is_within};

/// Personal namespace and foreign namespace roots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceInfo {
    /// Prefix for personal folders, ending with the separator or empty.
    pub personal_prefix: String,
    /// Hierarchy separator.
    pub separator: char,
    /// Roots of the other-users and shared namespaces.
    pub foreign_roots: Vec<String>,
}

impl NamespaceInfo {
    /// Fullname of a top-level personal folder.
    #[must_use]
    pub fn personal(&self, name: &str) -> String {
        format!("{}{name}", self.personal_prefix)
    }

    /// The personal prefix without its trailing separator.
    #[must_use]
    pub fn personal_root(&self) -> &str {
        self.personal_prefix
            .strip_suffix(self.separator)
            .unwrap_or(&self.personal_prefix)
    }
}

/// Caches of one store session.
#[derive(Debug, Default)]
pub struct SessionCache {
    entries: RwLock<HashMap<String, ListResponse>>,
    subscriptions: RwLock<HashMap<String, bool>>,
    rights: RwLock<HashMap<String, Rights>>,
    namespaces: RwLock<Option<NamespaceInfo>>,
    mbox: RwLock<Option<bool>>,
    defaults: RwLock<HashMap<DefaultSlot, String>>,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

impl SessionCache {
    /// Empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached LIST entry.
    #[must_use]
    pub fn entry(&self, fullname: &str) -> Option<ListResponse> {
        read(&self.entries).get(fullname).cloned()
    }

    /// Stores a LIST entry.
    pub fn put_entry(&self, entry: ListResponse) {
        write(&self.entries).insert(entry.mailbox.as_str().to_string(), entry);
    }

    /// Drops one LIST entry, e.g. a parent whose children changed.
    pub fn drop_entry(&self, fullname: &str) {
        write(&self.entries).remove(fullname);
    }

    /// Remembered subscription status.
    #[must_use]
    pub fn subscription(&self, fullname: &str) -> Option<bool> {
        read(&self.subscriptions).get(fullname).copied()
    }

    /// Records a subscription status.
    pub fn set_subscription(&self, fullname: &str, subscribed: bool) {
        write(&self.subscriptions).insert(fullname.to_string(), subscribed);
    }

    /// Remembered subscription statuses of `fullname` and its subtree.
    #[must_use]
    pub fn subscriptions_within(&self, fullname: &str, separator: Option<char>) -> Vec<(String, bool)> {
        read(&self.subscriptions)
            .iter()
            .filter(|(name, _)| is_within(name, fullname, separator))
            .map(|(name, subscribed)| (name.clone(), *subscribed))
            .collect()
    }

    /// Cached own rights.
    #[must_use]
    pub fn rights(&self, fullname: &str) -> Option<Rights> {
        read(&self.rights).get(fullname).copied()
    }

    /// Stores own rights.
    pub fn put_rights(&self, fullname: &str, rights: Rights) {
        write(&self.rights).insert(fullname.to_string(), rights);
    }

    /// Drops cached own rights after an ACL change.
    pub fn drop_rights(&self, fullname: &str) {
        write(&self.rights).remove(fullname);
    }

    /// Cached namespace information.
    #[must_use]
    pub fn namespaces(&self) -> Option<NamespaceInfo> {
        read(&self.namespaces).clone()
    }

    /// Stores namespace information.
    pub fn set_namespaces(&self, info: NamespaceInfo) {
        *write(&self.namespaces) = Some(info);
    }

    /// Cached mbox-mode flag.
    #[must_use]
    pub fn mbox(&self) -> Option<bool> {
        *read(&self.mbox)
    }

    /// Stores the mbox-mode flag.
    pub fn set_mbox(&self, mbox: bool) {
        *write(&self.mbox) = Some(mbox);
    }

    /// Resolved fullname of a default folder.
    #[must_use]
    pub fn default_folder(&self, slot: DefaultSlot) -> Option<String> {
        read(&self.defaults).get(&slot).cloned()
    }

    /// All resolved default folders.
    #[must_use]
    pub fn default_folders(&self) -> HashMap<DefaultSlot, String> {
        read(&self.defaults).clone()
    }

    /// Replaces the resolved default folders.
    pub fn set_default_folders(&self, defaults: HashMap<DefaultSlot, String>) {
        *write(&self.defaults) = defaults;
    }

    /// The slot `fullname` serves, if it is a resolved default folder.
    #[must_use]
    pub fn slot_of(&self, fullname: &str) -> Option<DefaultSlot> {
        read(&self.defaults)
            .iter()
            .find(|(_, name)| name.as_str() == fullname)
            .map(|(slot, _)| *slot)
    }

    /// Forgets the resolved default folders.
    pub fn invalidate_defaults(&self) {
        write(&self.defaults).clear();
    }

    /// Drops cached LIST entries and rights of `fullname` and its subtree.
    /// Default folders inside the subtree are forgotten too.
    pub fn invalidate(&self, fullname: &str, separator: Option<char>) {
        write(&self.entries).retain(|name, _| !is_within(name, fullname, separator));
        write(&self.rights).retain(|name, _| !is_within(name, fullname, separator));

        let mut defaults = write(&self.defaults);
        if defaults
            .values()
            .any(|name| is_within(name, fullname, separator))
        {
            tracing::debug!(fullname, "default folder invalidated");
            defaults.clear();
        }
    }

    /// Forgets subscription statuses of `fullname` and its subtree.
    pub fn forget_subscriptions(&self, fullname: &str, separator: Option<char>) {
        write(&self.subscriptions).retain(|name, _| !is_within(name, fullname, separator));
    }
}
