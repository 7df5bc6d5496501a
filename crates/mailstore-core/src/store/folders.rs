//! [`FolderStore`] for [`ImapStore`].

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use mailstore_imap::{
    AccessMode, Capability, Command, Connection, Flag, Mailbox, MailboxAttribute, Right, Rights,
    SearchCriteria, StatusAttribute, StatusCounts, UntaggedResponse,
};
use tokio::io::{AsyncRead, AsyncWrite};

use super::{BoxFuture, FolderStore, ImapStore, fetch_my_rights};
use crate::error::{Error, ErrorKind, RequiredRight, Result};
use crate::model::{
    DefaultSlot, Folder, FolderDescription, FolderPermission, QuotaInfo, is_within, join_name,
    leaf_name, parent_name,
};

#[async_trait]
impl<S> FolderStore for ImapStore<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn exists(&self, fullname: &str) -> Result<bool> {
        let result = async {
            let mut conn = self.lock().await?;
            Ok(self.entry_in(&mut conn, fullname).await?.is_some())
        }
        .await;
        self.finish(result)
    }

    async fn get_folder(&self, fullname: &str) -> Result<Folder> {
        let result = async {
            let mut conn = self.lock().await?;
            self.folder_in(&mut conn, fullname).await
        }
        .await;
        self.finish(result)
    }

    async fn list_subfolders(&self, parent: &str, subscribed_only: bool) -> Result<Vec<Folder>> {
        let result = async {
            let mut conn = self.lock().await?;
            self.list_subfolders_in(&mut conn, parent, subscribed_only)
                .await
        }
        .await;
        self.finish(result)
    }

    async fn create_folder(&self, description: &FolderDescription) -> Result<String> {
        let result = async {
            let mut conn = self.lock().await?;
            self.create_folder_in(&mut conn, description).await
        }
        .await;
        self.finish(result)
    }

    async fn rename_folder(&self, fullname: &str, new_name: &str) -> Result<String> {
        let result = async {
            self.ensure_not_default(fullname).await?;
            let mut conn = self.lock().await?;
            let separator = self.separator_in(&mut conn).await?;
            self.require_entry_in(&mut conn, fullname).await?;
            let name = validate_name(new_name, separator, false)?.0;
            let target = join_name(parent_name(fullname, Some(separator)), separator, name);
            if target == fullname {
                return Ok(target);
            }
            self.rename_in(&mut conn, fullname, &target).await?;
            Ok(target)
        }
        .await;
        self.finish(result)
    }

    async fn move_folder(&self, fullname: &str, new_parent: &str) -> Result<String> {
        let result = async {
            self.ensure_not_default(fullname).await?;
            let mut conn = self.lock().await?;
            let namespace = self.namespace_in(&mut conn).await?;
            let separator = Some(namespace.separator);
            self.require_entry_in(&mut conn, fullname).await?;

            let new_parent = if new_parent.is_empty() {
                namespace.personal_root()
            } else {
                new_parent
            };
            if new_parent == parent_name(fullname, separator) {
                return Ok(fullname.to_string());
            }
            if is_within(new_parent, fullname, separator) {
                return Err(Error::new(ErrorKind::InvalidFolderName {
                    name: fullname.to_string(),
                    reason: "cannot move a folder below itself".to_string(),
                }));
            }
            let leaf = leaf_name(fullname, separator);
            self.move_folder_in(&mut conn, fullname, new_parent, leaf)
                .await
        }
        .await;
        self.finish(result)
    }

    async fn delete_folder(&self, fullname: &str, hard: bool) -> Result<()> {
        let result = async {
            self.ensure_not_default(fullname).await?;
            let trash = if hard {
                None
            } else {
                Some(self.default_folder(DefaultSlot::Trash).await?)
            };
            let mut conn = self.lock().await?;
            self.require_entry_in(&mut conn, fullname).await?;

            if let Some(trash) = trash
                && let Some(name) = self.trash_name_in(&mut conn, fullname, &trash).await?
            {
                tracing::info!(fullname, trash = %trash, "moving folder to trash");
                self.move_folder_in(&mut conn, fullname, &trash, &name)
                    .await?;
                return Ok(());
            }
            self.delete_hard_in(&mut conn, fullname).await
        }
        .await;
        self.finish(result)
    }

    async fn quota(&self, fullname: &str) -> Result<QuotaInfo> {
        if !self.has(&Capability::Quota) {
            return Ok(QuotaInfo::unlimited());
        }
        let result = async {
            let mut conn = self.lock().await?;
            let responses = match conn
                .execute(&Command::GetQuotaRoot {
                    mailbox: Mailbox::new(fullname),
                })
                .await
            {
                Ok(responses) => responses,
                Err(e) if !e.is_fatal() => {
                    tracing::warn!(?e, fullname, "quota unavailable, treating as unlimited");
                    return Ok(QuotaInfo::unlimited());
                }
                Err(e) => return Err(Error::from(e).in_folder(fullname)),
            };
            let quota = responses
                .cursor()
                .extract(|r| match r {
                    UntaggedResponse::Quota(quota) => Some(quota.clone()),
                    _ => None,
                })
                .next();
            Ok(quota.map_or_else(QuotaInfo::unlimited, QuotaInfo::from))
        }
        .await;
        self.finish(result)
    }

    async fn subscribe(&self, fullname: &str, subscribed: bool) -> Result<()> {
        let result = async {
            let mut conn = self.lock().await?;
            self.require_entry_in(&mut conn, fullname).await?;
            let mailbox = Mailbox::new(fullname);
            let command = if subscribed {
                Command::Subscribe { mailbox }
            } else {
                Command::Unsubscribe { mailbox }
            };
            conn.execute(&command)
                .await
                .map_err(|e| Error::from(e).in_folder(fullname))?;
            self.cache.set_subscription(fullname, subscribed);
            Ok(())
        }
        .await;
        self.finish(result)
    }

    async fn counts(&self, fullname: &str) -> Result<StatusCounts> {
        let result = async {
            let mut conn = self.lock().await?;
            let responses = conn
                .execute(&Command::Status {
                    mailbox: Mailbox::new(fullname),
                    items: vec![
                        StatusAttribute::Messages,
                        StatusAttribute::Recent,
                        StatusAttribute::Unseen,
                    ],
                })
                .await
                .map_err(|e| Error::from(e).in_folder(fullname))?;
            Ok(responses
                .cursor()
                .extract(|r| match r {
                    UntaggedResponse::Status { items, .. } => {
                        Some(StatusCounts::from(items.as_slice()))
                    }
                    _ => None,
                })
                .next()
                .unwrap_or_default())
        }
        .await;
        self.finish(result)
    }

    async fn my_rights(&self, fullname: &str) -> Result<Rights> {
        if !self.has(&Capability::Acl) {
            return Ok(Rights::all());
        }
        let result = async {
            let mut conn = self.lock().await?;
            let rights = fetch_my_rights(&mut conn, fullname).await?;
            self.cache.put_rights(fullname, rights);
            Ok(rights)
        }
        .await;
        self.finish(result)
    }

    async fn acl(&self, fullname: &str) -> Result<Vec<FolderPermission>> {
        let result = async {
            self.require_acl_capability()?;
            let mut conn = self.lock().await?;
            let entries = fetch_acl(&mut conn, fullname).await?;
            Ok(entries
                .into_iter()
                .filter_map(|(identifier, rights)| {
                    let entity = self.acl_mapper.entity(&identifier);
                    if entity.is_none() {
                        tracing::debug!(fullname, identifier, "skipping unknown ACL identifier");
                    }
                    entity.map(|entity| FolderPermission { entity, rights })
                })
                .collect())
        }
        .await;
        self.finish(result)
    }

    async fn update_acl(&self, fullname: &str, permissions: &[FolderPermission]) -> Result<()> {
        let result = async {
            self.require_acl_capability()?;
            let mut conn = self.lock().await?;
            self.require_entry_in(&mut conn, fullname).await?;
            self.require_right_in(
                &mut conn,
                fullname,
                Right::Administer,
                RequiredRight::Administer,
            )
            .await?;
            self.apply_acl_in(&mut conn, fullname, permissions, true)
                .await
        }
        .await;
        self.finish(result)
    }

    async fn clear_folder(&self, fullname: &str, hard: bool) -> Result<()> {
        let result = async {
            let trash = if hard {
                None
            } else {
                Some(self.default_folder(DefaultSlot::Trash).await?)
            };
            let mut conn = self.lock().await?;
            let separator = self.separator_in(&mut conn).await?;
            self.select_in(&mut conn, fullname, AccessMode::ReadWrite)
                .await?;
            let uids = self.uid_search_in(&mut conn, SearchCriteria::All).await?;
            if uids.is_empty() {
                return Ok(());
            }
            match trash {
                Some(trash) if !is_within(fullname, &trash, Some(separator)) => {
                    self.move_in(&mut conn, fullname, &trash, &uids).await?;
                }
                _ => {
                    self.require_right_in(
                        &mut conn,
                        fullname,
                        Right::DeleteMessages,
                        RequiredRight::Delete,
                    )
                    .await?;
                    self.store_flags_in(&mut conn, &uids, &[Flag::Deleted], true)
                        .await?;
                    self.expunge_in(&mut conn, fullname, &uids).await?;
                }
            }
            tracing::info!(fullname, count = uids.len(), hard, "folder cleared");
            Ok(())
        }
        .await;
        self.finish(result)
    }

    async fn default_folder(&self, slot: DefaultSlot) -> Result<String> {
        let result = async {
            let missing = || {
                Error::new(ErrorKind::FolderNotFound {
                    fullname: self.naming.default_name(slot),
                })
            };
            let fresh = self.cache.default_folders().is_empty();
            let defaults = self.default_folders().await?;
            match defaults.get(&slot) {
                Some(fullname) => {
                    let mut conn = self.lock().await?;
                    if self.entry_in(&mut conn, fullname).await?.is_some() {
                        return Ok(fullname.clone());
                    }
                    tracing::info!(%slot, fullname = %fullname, "default folder vanished, resolving again");
                }
                // Resolved just now, or never provisioned for this account.
                None if fresh || !self.spam.needs(slot) => return Err(missing()),
                None => tracing::info!(%slot, "default folder missing, resolving again"),
            }

            self.cache.invalidate_defaults();
            let defaults = self.default_folders().await?;
            defaults.get(&slot).cloned().ok_or_else(missing)
        }
        .await;
        self.finish(result)
    }
}

impl<S> ImapStore<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    fn require_acl_capability(&self) -> Result<()> {
        if self.has(&Capability::Acl) {
            Ok(())
        } else {
            Err(Error::new(ErrorKind::CapabilityUnsupported {
                capability: "ACL".to_string(),
            }))
        }
    }

    async fn folder_in(&self, conn: &mut Connection<S>, fullname: &str) -> Result<Folder> {
        let entry = self.require_entry_in(conn, fullname).await?;
        let mut folder = Folder::from_list(&entry);
        folder.subscribed = self.subscribed_in(conn, fullname).await?;
        folder.default_slot = self.cache.slot_of(fullname);

        if entry.is_selectable() {
            let rights = self.own_rights_in(conn, fullname).await?;
            folder.own_rights = Some(rights);
            if self.acls_enforced() && rights.has(Right::Administer) {
                folder.permissions = fetch_acl(conn, fullname)
                    .await?
                    .into_iter()
                    .filter_map(|(identifier, rights)| {
                        self.acl_mapper
                            .entity(&identifier)
                            .map(|entity| FolderPermission { entity, rights })
                    })
                    .collect();
            }
        }
        Ok(folder)
    }

    async fn list_subfolders_in(
        &self,
        conn: &mut Connection<S>,
        parent: &str,
        subscribed_only: bool,
    ) -> Result<Vec<Folder>> {
        let namespace = self.namespace_in(conn).await?;
        let separator = namespace.separator;
        let pattern = if parent.is_empty() {
            "%".to_string()
        } else {
            format!("{parent}{separator}%")
        };

        let lsub = conn
            .execute(&Command::Lsub {
                reference: String::new(),
                pattern: pattern.clone(),
            })
            .await?;
        let subscribed_entries: Vec<_> = lsub
            .cursor()
            .extract(|r| match r {
                UntaggedResponse::Lsub(entry) => Some(entry.clone()),
                _ => None,
            })
            .collect();
        let subscribed: HashSet<String> = subscribed_entries
            .iter()
            .map(|e| e.mailbox.as_str().to_string())
            .collect();
        for name in &subscribed {
            self.cache.set_subscription(name, true);
        }

        let entries = if subscribed_only {
            subscribed_entries
        } else {
            let list = conn
                .execute(&Command::List {
                    reference: String::new(),
                    pattern,
                })
                .await?;
            list.cursor()
                .extract(|r| match r {
                    UntaggedResponse::List(entry) => Some(entry.clone()),
                    _ => None,
                })
                .filter(|entry| !entry.has(&MailboxAttribute::NonExistent))
                .collect()
        };

        let mut folders: Vec<Folder> = entries
            .iter()
            .map(|entry| {
                if !subscribed_only {
                    self.cache.put_entry(entry.clone());
                    if !subscribed.contains(entry.mailbox.as_str()) {
                        self.cache.set_subscription(entry.mailbox.as_str(), false);
                    }
                }
                let mut folder = Folder::from_list(entry);
                folder.subscribed = subscribed.contains(&folder.fullname);
                folder.default_slot = self.cache.slot_of(&folder.fullname);
                folder
            })
            .collect();

        if parent.is_empty() {
            for root in &namespace.foreign_roots {
                if folders.iter().any(|f| f.fullname == *root) {
                    continue;
                }
                let is_subscribed = subscribed.contains(root);
                if subscribed_only && !is_subscribed {
                    continue;
                }
                let mut folder = Folder::namespace_root(root, Some(separator));
                folder.subscribed = is_subscribed;
                folders.push(folder);
            }
        }
        Ok(folders)
    }

    async fn create_folder_in(
        &self,
        conn: &mut Connection<S>,
        description: &FolderDescription,
    ) -> Result<String> {
        let namespace = self.namespace_in(conn).await?;
        let separator = namespace.separator;
        let mbox = self.mbox_in(conn).await?;
        let (name, folders_only) = validate_name(&description.name, separator, mbox)?;

        let parent = if description.parent.is_empty() {
            namespace.personal_root().to_string()
        } else {
            description.parent.clone()
        };
        if !parent.is_empty() {
            let entry = self.require_entry_in(conn, &parent).await?;
            if !entry.can_have_children() {
                return Err(Error::new(ErrorKind::InvalidFolderName {
                    name: description.name.clone(),
                    reason: format!("{parent} cannot hold subfolders"),
                }));
            }
            self.require_right_in(conn, &parent, Right::CreateMailbox, RequiredRight::Create)
                .await?;
        }

        let fullname = join_name(&parent, separator, name);
        if self.entry_in(conn, &fullname).await?.is_some() {
            return Err(Error::new(ErrorKind::FolderAlreadyExists {
                fullname: fullname.clone(),
            })
            .in_folder(&fullname));
        }

        let wire_name = if folders_only {
            format!("{fullname}{separator}")
        } else {
            fullname.clone()
        };
        conn.execute(&Command::Create {
            mailbox: Mailbox::new(wire_name),
        })
        .await
        .map_err(|e| Error::from(e).in_folder(&fullname))?;
        self.cache.drop_entry(&parent);

        if let Err(e) = self.set_up_new_folder_in(conn, &fullname, description).await {
            tracing::warn!(?e, fullname, "setting up new folder failed, removing it");
            if let Err(cleanup) = self.delete_hard_in(conn, &fullname).await {
                tracing::warn!(?cleanup, fullname, "could not remove half-created folder");
            }
            return Err(e);
        }

        tracing::info!(fullname, "folder created");
        Ok(fullname)
    }

    /// Subscription and ACL of a folder that was just created.
    async fn set_up_new_folder_in(
        &self,
        conn: &mut Connection<S>,
        fullname: &str,
        description: &FolderDescription,
    ) -> Result<()> {
        if description.subscribe {
            conn.execute(&Command::Subscribe {
                mailbox: Mailbox::new(fullname),
            })
            .await
            .map_err(|e| Error::from(e).in_folder(fullname))?;
        }
        self.cache.set_subscription(fullname, description.subscribe);
        if !description.permissions.is_empty() {
            self.apply_acl_in(conn, fullname, &description.permissions, false)
                .await?;
        }
        Ok(())
    }

    /// Renames `from` to `to` and carries subscriptions across the subtree.
    async fn rename_in(&self, conn: &mut Connection<S>, from: &str, to: &str) -> Result<()> {
        let separator = self.separator_in(conn).await?;
        if self.entry_in(conn, to).await?.is_some() {
            return Err(Error::new(ErrorKind::FolderAlreadyExists {
                fullname: to.to_string(),
            })
            .in_folder(to));
        }

        let responses = conn
            .execute(&Command::List {
                reference: String::new(),
                pattern: format!("{from}{separator}*"),
            })
            .await?;
        let mut subtree = vec![from.to_string()];
        subtree.extend(responses.cursor().extract(|r| match r {
            UntaggedResponse::List(entry) => Some(entry.mailbox.as_str().to_string()),
            _ => None,
        }));
        // Wildcards in `from` can match names outside the subtree.
        let statuses: Vec<(String, String, bool)> = subtree
            .into_iter()
            .filter_map(|old| {
                let suffix = old.strip_prefix(from)?;
                if !suffix.is_empty() && !suffix.starts_with(separator) {
                    return None;
                }
                let new = format!("{to}{suffix}");
                let subscribed = self.cache.subscription(&old).unwrap_or(true);
                Some((old, new, subscribed))
            })
            .collect();

        if conn
            .selected()
            .is_some_and(|s| is_within(s.mailbox.as_str(), from, Some(separator)))
        {
            conn.unselect().await?;
        }
        conn.execute(&Command::Rename {
            from: Mailbox::new(from),
            to: Mailbox::new(to),
        })
        .await
        .map_err(|e| Error::from(e).in_folder(from))?;

        self.cache.forget_subscriptions(from, Some(separator));
        self.cache.invalidate(from, Some(separator));
        self.cache.invalidate(to, Some(separator));
        self.cache.drop_entry(parent_name(to, Some(separator)));

        for (old, new, subscribed) in statuses {
            if let Err(e) = conn
                .execute(&Command::Unsubscribe {
                    mailbox: Mailbox::new(old.as_str()),
                })
                .await
            {
                if e.is_fatal() {
                    return Err(e.into());
                }
                tracing::debug!(?e, folder = old, "unsubscribing old name failed");
            }
            if subscribed {
                conn.execute(&Command::Subscribe {
                    mailbox: Mailbox::new(new.as_str()),
                })
                .await
                .map_err(|e| Error::from(e).in_folder(&new))?;
            }
            self.cache.set_subscription(&new, subscribed);
        }

        tracing::info!(from, to, "folder renamed");
        Ok(())
    }

    /// Recreates `fullname` as `new_parent/leaf` with its subscription, ACL,
    /// messages and children, then deletes the original.
    pub(crate) fn move_folder_in<'a>(
        &'a self,
        conn: &'a mut Connection<S>,
        fullname: &'a str,
        new_parent: &'a str,
        leaf: &'a str,
    ) -> BoxFuture<'a, String> {
        Box::pin(async move {
            let separator = self.separator_in(conn).await?;
            let target = join_name(new_parent, separator, leaf);
            if self.entry_in(conn, &target).await?.is_some() {
                return Err(Error::new(ErrorKind::FolderAlreadyExists {
                    fullname: target.clone(),
                })
                .in_folder(&target));
            }
            if !new_parent.is_empty() {
                self.require_right_in(
                    conn,
                    new_parent,
                    Right::CreateMailbox,
                    RequiredRight::Create,
                )
                .await?;
            }

            let entry = self.require_entry_in(conn, fullname).await?;
            let children = self.children_in(conn, fullname).await?;
            let mbox = self.mbox_in(conn).await?;
            let wire_name = if mbox && !entry.is_selectable() {
                format!("{target}{separator}")
            } else {
                target.clone()
            };
            conn.execute(&Command::Create {
                mailbox: Mailbox::new(wire_name),
            })
            .await
            .map_err(|e| Error::from(e).in_folder(&target))?;
            self.cache.drop_entry(new_parent);

            let subscribed = self.subscribed_in(conn, fullname).await?;
            if subscribed {
                conn.execute(&Command::Subscribe {
                    mailbox: Mailbox::new(target.as_str()),
                })
                .await?;
            }
            self.cache.set_subscription(&target, subscribed);

            if self.acls_enforced() {
                self.copy_acl_in(conn, fullname, &target).await?;
            }

            if entry.is_selectable() {
                self.select_in(conn, fullname, AccessMode::ReadOnly).await?;
                let uids = self.uid_search_in(conn, SearchCriteria::All).await?;
                for sequence in self.uid_blocks(&uids) {
                    conn.execute(&Command::Copy {
                        sequence,
                        mailbox: Mailbox::new(target.as_str()),
                        uid: true,
                    })
                    .await
                    .map_err(|e| Error::from(e).in_folder(&target))?;
                }
            }

            for child in children {
                let child_leaf = leaf_name(&child, Some(separator)).to_string();
                self.move_folder_in(conn, &child, &target, &child_leaf)
                    .await?;
            }

            self.delete_hard_in(conn, fullname).await?;
            tracing::info!(from = fullname, to = %target, "folder moved");
            Ok(target)
        })
    }

    /// Deletes `fullname` and its subtree, children first.
    pub(crate) fn delete_hard_in<'a>(
        &'a self,
        conn: &'a mut Connection<S>,
        fullname: &'a str,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let separator = self.separator_in(conn).await?;
            for child in self.children_in(conn, fullname).await? {
                self.delete_hard_in(conn, &child).await?;
            }

            if let Err(e) = conn
                .execute(&Command::Unsubscribe {
                    mailbox: Mailbox::new(fullname),
                })
                .await
            {
                if e.is_fatal() {
                    return Err(e.into());
                }
                tracing::debug!(?e, fullname, "folder was not subscribed");
            }
            if conn
                .selected()
                .is_some_and(|s| is_within(s.mailbox.as_str(), fullname, Some(separator)))
            {
                conn.unselect().await?;
            }
            conn.execute(&Command::Delete {
                mailbox: Mailbox::new(fullname),
            })
            .await
            .map_err(|e| Error::from(e).in_folder(fullname))?;

            self.cache.invalidate(fullname, Some(separator));
            self.cache.forget_subscriptions(fullname, Some(separator));
            self.cache.drop_entry(parent_name(fullname, Some(separator)));
            tracing::info!(fullname, "folder deleted");
            Ok(())
        })
    }

    /// Name for `fullname` inside Trash, `None` when it has to be deleted
    /// hard instead: it already is in Trash, or Trash holds no subfolders.
    async fn trash_name_in(
        &self,
        conn: &mut Connection<S>,
        fullname: &str,
        trash: &str,
    ) -> Result<Option<String>> {
        let separator = self.separator_in(conn).await?;
        if is_within(fullname, trash, Some(separator)) {
            return Ok(None);
        }
        let holds_folders = self
            .entry_in(conn, trash)
            .await?
            .is_some_and(|e| e.can_have_children());
        if !holds_folders || self.mbox_in(conn).await? {
            return Ok(None);
        }

        let leaf = leaf_name(fullname, Some(separator));
        let mut candidate = leaf.to_string();
        let mut n = 2;
        while self
            .entry_in(conn, &join_name(trash, separator, &candidate))
            .await?
            .is_some()
        {
            candidate = format!("{leaf} {n}");
            n += 1;
        }
        Ok(Some(candidate))
    }

    /// Applies ACL entries. With `replace`, identifiers not listed lose
    /// their entry, except the logged in user's own.
    async fn apply_acl_in(
        &self,
        conn: &mut Connection<S>,
        fullname: &str,
        permissions: &[FolderPermission],
        replace: bool,
    ) -> Result<()> {
        self.require_acl_capability()?;
        let mut desired: HashMap<String, Rights> = HashMap::new();
        for permission in permissions {
            let identifier = self.acl_mapper.identifier(&permission.entity).ok_or_else(|| {
                Error::configuration(format!(
                    "no ACL identifier for {:?}",
                    permission.entity
                ))
            })?;
            desired.insert(identifier, permission.rights);
        }

        let current: HashMap<String, Rights> = if replace {
            fetch_acl(conn, fullname).await?.into_iter().collect()
        } else {
            HashMap::new()
        };

        for (identifier, rights) in &desired {
            if current.get(identifier) == Some(rights) {
                continue;
            }
            conn.execute(&Command::SetAcl {
                mailbox: Mailbox::new(fullname),
                identifier: identifier.clone(),
                rights: *rights,
            })
            .await
            .map_err(|e| Error::from(e).in_folder(fullname))?;
        }

        let own = conn.login().to_string();
        for identifier in current.keys() {
            if desired.contains_key(identifier) || *identifier == own {
                continue;
            }
            conn.execute(&Command::DeleteAcl {
                mailbox: Mailbox::new(fullname),
                identifier: identifier.clone(),
            })
            .await
            .map_err(|e| Error::from(e).in_folder(fullname))?;
        }

        self.cache.drop_rights(fullname);
        Ok(())
    }

    /// Copies ACL entries other than the user's own. Failures are logged;
    /// the user may not administer the source.
    async fn copy_acl_in(&self, conn: &mut Connection<S>, from: &str, to: &str) -> Result<()> {
        let entries = match fetch_acl(conn, from).await {
            Ok(entries) => entries,
            Err(e) if e.is_command_rejected() => {
                tracing::debug!(?e, from, "ACL not readable, not copied");
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        let own = conn.login().to_string();
        for (identifier, rights) in entries {
            if identifier == own {
                continue;
            }
            if let Err(e) = conn
                .execute(&Command::SetAcl {
                    mailbox: Mailbox::new(to),
                    identifier: identifier.clone(),
                    rights,
                })
                .await
            {
                if e.is_fatal() {
                    return Err(e.into());
                }
                tracing::warn!(?e, to, identifier, "ACL entry not copied");
            }
        }
        Ok(())
    }
}

/// GETACL as identifier and rights pairs.
async fn fetch_acl<S>(conn: &mut Connection<S>, fullname: &str) -> Result<Vec<(String, Rights)>>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let responses = conn
        .execute(&Command::GetAcl {
            mailbox: Mailbox::new(fullname),
        })
        .await
        .map_err(|e| Error::from(e).in_folder(fullname))?;
    Ok(responses
        .cursor()
        .extract(|r| match r {
            UntaggedResponse::Acl { entries, .. } => Some(
                entries
                    .iter()
                    .map(|e| (e.identifier.clone(), e.rights))
                    .collect::<Vec<_>>(),
            ),
            _ => None,
        })
        .flatten()
        .collect())
}

/// Checks a new folder name. Returns the name without a trailing separator
/// and whether it asks for a folder that only holds subfolders, which mbox
/// servers express with one trailing separator.
fn validate_name(name: &str, separator: char, mbox: bool) -> Result<(&str, bool)> {
    let invalid = |reason: &str| {
        Err(Error::new(ErrorKind::InvalidFolderName {
            name: name.to_string(),
            reason: reason.to_string(),
        }))
    };
    if name.trim().is_empty() {
        return invalid("name is empty");
    }
    if mbox
        && let Some(stripped) = name.strip_suffix(separator)
        && !stripped.is_empty()
        && !stripped.contains(separator)
    {
        return Ok((stripped, true));
    }
    if name.contains(separator) {
        return invalid("name contains the hierarchy separator");
    }
    Ok((name, false))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::cache::NamespaceInfo;
    use crate::collab::{Entity, InMemoryAclMapper, StaticSpamHandler};
    use crate::store::test_support::{login, resolved_store, store};
    use tokio_test::io::Builder;

    #[test]
    fn names_with_separator_are_rejected() {
        assert_eq!(validate_name("Work", '/', false).unwrap(), ("Work", false));
        assert!(validate_name("a/b", '/', false).is_err());
        assert!(validate_name("  ", '/', false).is_err());
        assert!(validate_name("Work/", '/', false).is_err());
    }

    #[test]
    fn mbox_allows_one_trailing_separator() {
        assert_eq!(validate_name("Work/", '/', true).unwrap(), ("Work", true));
        assert!(validate_name("a/b/", '/', true).is_err());
        assert!(validate_name("/", '/', true).is_err());
    }

    #[tokio::test]
    async fn exists_uses_list_once() {
        let mock = login(&mut Builder::new(), "")
            .write(b"A0001 LIST \"\" Work\r\n")
            .read(b"* LIST (\\HasNoChildren) \"/\" Work\r\nA0001 OK done\r\n")
            .build();
        let store = resolved_store(mock).await;

        assert!(store.exists("Work").await.unwrap());
        // Cached.
        assert!(store.exists("Work").await.unwrap());
    }

    #[tokio::test]
    async fn missing_folder_is_not_found() {
        let mock = login(&mut Builder::new(), "")
            .write(b"A0001 LIST \"\" Nope\r\n")
            .read(b"A0001 OK done\r\n")
            .build();
        let store = resolved_store(mock).await;

        let err = store.get_folder("Nope").await.unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::FolderNotFound { .. }));
        assert_eq!(err.context().folder.as_deref(), Some("Nope"));
    }

    #[tokio::test]
    async fn get_folder_reports_subscription_and_slot() {
        let mock = login(&mut Builder::new(), "")
            .write(b"A0001 LIST \"\" Sent\r\n")
            .read(b"* LIST (\\HasNoChildren) \"/\" Sent\r\nA0001 OK done\r\n")
            .write(b"A0002 LSUB \"\" Sent\r\n")
            .read(b"* LSUB () \"/\" Sent\r\nA0002 OK done\r\n")
            .build();
        let store = resolved_store(mock).await;

        let folder = store.get_folder("Sent").await.unwrap();
        assert!(folder.subscribed);
        assert!(folder.holds_messages);
        assert_eq!(folder.default_slot, Some(DefaultSlot::Sent));
        assert_eq!(folder.own_rights, Some(Rights::all()));
    }

    #[tokio::test]
    async fn root_listing_adds_namespace_roots() {
        let mock = login(&mut Builder::new(), "")
            .write(b"A0001 LSUB \"\" \"%\"\r\n")
            .read(b"* LSUB () \"/\" INBOX\r\nA0001 OK done\r\n")
            .write(b"A0002 LIST \"\" \"%\"\r\n")
            .read(b"* LIST (\\HasNoChildren) \"/\" INBOX\r\n")
            .read(b"* LIST (\\HasNoChildren) \"/\" Archive\r\n")
            .read(b"A0002 OK done\r\n")
            .build();
        let store = resolved_store(mock).await;
        store.cache.set_namespaces(NamespaceInfo {
            personal_prefix: String::new(),
            separator: '/',
            foreign_roots: vec!["Shared".to_string()],
        });

        let folders = store.list_subfolders("", false).await.unwrap();
        let names: Vec<(&str, bool)> = folders
            .iter()
            .map(|f| (f.fullname.as_str(), f.subscribed))
            .collect();
        assert_eq!(
            names,
            [("INBOX", true), ("Archive", false), ("Shared", false)]
        );
        assert!(folders[2].namespace_root);
        assert_eq!(folders[0].default_slot, Some(DefaultSlot::Inbox));
    }

    #[tokio::test]
    async fn subscribed_listing_skips_unsubscribed_namespace_roots() {
        let mock = login(&mut Builder::new(), "")
            .write(b"A0001 LSUB \"\" \"%\"\r\n")
            .read(b"* LSUB () \"/\" INBOX\r\nA0001 OK done\r\n")
            .build();
        let store = resolved_store(mock).await;
        store.cache.set_namespaces(NamespaceInfo {
            personal_prefix: String::new(),
            separator: '/',
            foreign_roots: vec!["Shared".to_string()],
        });

        let folders = store.list_subfolders("", true).await.unwrap();
        assert_eq!(folders.len(), 1);
        assert_eq!(folders[0].fullname, "INBOX");
    }

    #[tokio::test]
    async fn create_subscribes_and_invalidates_parent() {
        let mock = login(&mut Builder::new(), "")
            .write(b"A0001 LIST \"\" Projects\r\n")
            .read(b"* LIST (\\HasNoChildren) \"/\" Projects\r\nA0001 OK done\r\n")
            .write(b"A0002 LIST \"\" Projects/2024\r\n")
            .read(b"A0002 OK done\r\n")
            .write(b"A0003 CREATE Projects/2024\r\n")
            .read(b"A0003 OK created\r\n")
            .write(b"A0004 SUBSCRIBE Projects/2024\r\n")
            .read(b"A0004 OK done\r\n")
            .build();
        let store = resolved_store(mock).await;

        let fullname = store
            .create_folder(&FolderDescription::new("Projects", "2024"))
            .await
            .unwrap();
        assert_eq!(fullname, "Projects/2024");
        assert!(store.cache.entry("Projects").is_none());
        assert_eq!(store.cache.subscription("Projects/2024"), Some(true));
    }

    #[tokio::test]
    async fn create_existing_folder_fails() {
        let mock = login(&mut Builder::new(), "")
            .write(b"A0001 LIST \"\" Work\r\n")
            .read(b"* LIST () \"/\" Work\r\nA0001 OK done\r\n")
            .build();
        let store = resolved_store(mock).await;

        let err = store
            .create_folder(&FolderDescription::new("", "Work"))
            .await
            .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::FolderAlreadyExists { .. }));
    }

    #[tokio::test]
    async fn failed_acl_removes_new_folder() {
        let mock = login(&mut Builder::new(), "ACL")
            .write(b"A0001 LIST \"\" Team\r\n")
            .read(b"A0001 OK done\r\n")
            .write(b"A0002 CREATE Team\r\n")
            .read(b"A0002 OK created\r\n")
            .write(b"A0003 SETACL Team bob lr\r\n")
            .read(b"A0003 NO permission denied\r\n")
            .write(b"A0004 LIST \"\" \"Team/%\"\r\n")
            .read(b"A0004 OK done\r\n")
            .write(b"A0005 UNSUBSCRIBE Team\r\n")
            .read(b"A0005 NO not subscribed\r\n")
            .write(b"A0006 DELETE Team\r\n")
            .read(b"A0006 OK deleted\r\n")
            .build();
        let store = resolved_store(mock)
            .await
            .with_acl_mapper(Arc::new(InMemoryAclMapper::new().with(Entity::User(7), "bob")));

        let mut description = FolderDescription::new("", "Team");
        description.subscribe = false;
        description.permissions = vec![FolderPermission {
            entity: Entity::User(7),
            rights: Rights::parse("lr"),
        }];
        let err = store.create_folder(&description).await.unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::OperationNotSupported { .. }));
    }

    #[tokio::test]
    async fn failed_subscribe_removes_new_folder() {
        let mock = login(&mut Builder::new(), "")
            .write(b"A0001 LIST \"\" Team\r\n")
            .read(b"A0001 OK done\r\n")
            .write(b"A0002 CREATE Team\r\n")
            .read(b"A0002 OK created\r\n")
            .write(b"A0003 SUBSCRIBE Team\r\n")
            .read(b"A0003 NO subscriptions disabled\r\n")
            .write(b"A0004 LIST \"\" \"Team/%\"\r\n")
            .read(b"A0004 OK done\r\n")
            .write(b"A0005 UNSUBSCRIBE Team\r\n")
            .read(b"A0005 NO not subscribed\r\n")
            .write(b"A0006 DELETE Team\r\n")
            .read(b"A0006 OK deleted\r\n")
            .build();
        let store = resolved_store(mock).await;

        let err = store
            .create_folder(&FolderDescription::new("", "Team"))
            .await
            .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::OperationNotSupported { .. }));
        assert!(store.cache.subscription("Team").is_none());
    }

    #[tokio::test]
    async fn rename_remaps_subscriptions() {
        let mock = login(&mut Builder::new(), "")
            .write(b"A0001 LIST \"\" Old\r\n")
            .read(b"* LIST (\\HasChildren) \"/\" Old\r\nA0001 OK done\r\n")
            .write(b"A0002 LIST \"\" New\r\n")
            .read(b"A0002 OK done\r\n")
            .write(b"A0003 LIST \"\" \"Old/*\"\r\n")
            .read(b"* LIST () \"/\" Old/Sub\r\nA0003 OK done\r\n")
            .write(b"A0004 RENAME Old New\r\n")
            .read(b"A0004 OK renamed\r\n")
            .write(b"A0005 UNSUBSCRIBE Old\r\n")
            .read(b"A0005 OK done\r\n")
            .write(b"A0006 UNSUBSCRIBE Old/Sub\r\n")
            .read(b"A0006 OK done\r\n")
            .write(b"A0007 SUBSCRIBE New/Sub\r\n")
            .read(b"A0007 OK done\r\n")
            .build();
        let store = resolved_store(mock).await;
        store.cache.set_subscription("Old", false);

        let fullname = store.rename_folder("Old", "New").await.unwrap();
        assert_eq!(fullname, "New");
        assert_eq!(store.cache.subscription("New"), Some(false));
        assert_eq!(store.cache.subscription("New/Sub"), Some(true));
        assert!(store.cache.subscription("Old/Sub").is_none());
    }

    #[tokio::test]
    async fn rename_skips_wildcard_matches_outside_the_subtree() {
        let mock = login(&mut Builder::new(), "")
            .write(b"A0001 LIST \"\" \"50%\"\r\n")
            .read(b"* LIST (\\HasChildren) \"/\" \"50%\"\r\n* LIST () \"/\" 500\r\n")
            .read(b"A0001 OK done\r\n")
            .write(b"A0002 LIST \"\" Half\r\n")
            .read(b"A0002 OK done\r\n")
            .write(b"A0003 LIST \"\" \"50%/*\"\r\n")
            .read(b"* LIST () \"/\" \"50%/a\"\r\n* LIST () \"/\" 500/b\r\n")
            .read(b"A0003 OK done\r\n")
            .write(b"A0004 RENAME \"50%\" Half\r\n")
            .read(b"A0004 OK renamed\r\n")
            .write(b"A0005 UNSUBSCRIBE \"50%\"\r\n")
            .read(b"A0005 OK done\r\n")
            .write(b"A0006 SUBSCRIBE Half\r\n")
            .read(b"A0006 OK done\r\n")
            .write(b"A0007 UNSUBSCRIBE \"50%/a\"\r\n")
            .read(b"A0007 OK done\r\n")
            .write(b"A0008 SUBSCRIBE Half/a\r\n")
            .read(b"A0008 OK done\r\n")
            .build();
        let store = resolved_store(mock).await;

        let fullname = store.rename_folder("50%", "Half").await.unwrap();
        assert_eq!(fullname, "Half");
        assert_eq!(store.cache.subscription("Half/a"), Some(true));
        assert!(store.cache.subscription("Half/b").is_none());
        assert!(store.cache.subscription("Half0/b").is_none());
    }

    #[tokio::test]
    async fn secondary_account_retries_missing_slot() {
        let mock = login(&mut Builder::new(), "")
            .write(b"A0001 LIST \"\" \"%\"\r\n")
            .read(b"* LIST () \"/\" INBOX\r\n* LIST () \"/\" Sent\r\n")
            .read(b"* LIST () \"/\" Trash\r\nA0001 OK done\r\n")
            .write(b"A0002 LSUB \"\" \"%\"\r\n")
            .read(b"* LSUB () \"/\" INBOX\r\n* LSUB () \"/\" Sent\r\n")
            .read(b"* LSUB () \"/\" Trash\r\nA0002 OK done\r\n")
            .write(b"A0003 LIST \"\" Drafts\r\n")
            .read(b"* LIST (\\Subscribed) \"/\" Drafts\r\nA0003 OK done\r\n")
            .build();
        let store = resolved_store(mock)
            .await
            .with_spam_handler(Arc::new(StaticSpamHandler {
                spam: false,
                confirmed: false,
            }))
            .primary(false);
        // An earlier resolution could not provide Drafts.
        store.cache.set_default_folders(
            [
                (DefaultSlot::Inbox, "INBOX"),
                (DefaultSlot::Sent, "Sent"),
                (DefaultSlot::Trash, "Trash"),
            ]
            .into_iter()
            .map(|(slot, name)| (slot, name.to_string()))
            .collect(),
        );

        let drafts = store.default_folder(DefaultSlot::Drafts).await.unwrap();
        assert_eq!(drafts, "Drafts");
        assert_eq!(store.cache.default_folder(DefaultSlot::Drafts).as_deref(), Some("Drafts"));

        // Spam is not wanted on this account, so nothing is resolved again.
        let err = store.default_folder(DefaultSlot::Spam).await.unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::FolderNotFound { .. }));
    }

    #[tokio::test]
    async fn default_folder_cannot_be_deleted() {
        let mock = login(&mut Builder::new(), "").build();
        let store = resolved_store(mock).await;

        let err = store.delete_folder("Trash", true).await.unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::DefaultFolderProtected { .. }));
    }

    #[tokio::test]
    async fn soft_delete_inside_trash_is_hard() {
        let mock = login(&mut Builder::new(), "")
            .write(b"A0001 LIST \"\" Trash\r\n")
            .read(b"* LIST (\\HasChildren) \"/\" Trash\r\nA0001 OK done\r\n")
            .write(b"A0002 LIST \"\" Trash/Old\r\n")
            .read(b"* LIST (\\HasNoChildren) \"/\" Trash/Old\r\nA0002 OK done\r\n")
            .write(b"A0003 LIST \"\" \"Trash/Old/%\"\r\n")
            .read(b"A0003 OK done\r\n")
            .write(b"A0004 UNSUBSCRIBE Trash/Old\r\n")
            .read(b"A0004 OK done\r\n")
            .write(b"A0005 DELETE Trash/Old\r\n")
            .read(b"A0005 OK done\r\n")
            .build();
        let store = resolved_store(mock).await;

        store.delete_folder("Trash/Old", false).await.unwrap();
        assert!(store.cache.entry("Trash/Old").is_none());
        // The default folders survive.
        assert_eq!(
            store.cache.default_folder(DefaultSlot::Trash).as_deref(),
            Some("Trash")
        );
    }

    #[tokio::test]
    async fn quota_without_capability_is_unlimited() {
        let mock = login(&mut Builder::new(), "").build();
        let store = store(mock).await;
        assert!(store.quota("INBOX").await.unwrap().is_unlimited());
    }

    #[tokio::test]
    async fn quota_with_empty_resource_list() {
        let mock = login(&mut Builder::new(), "QUOTA")
            .write(b"A0001 GETQUOTAROOT INBOX\r\n")
            .read(b"* QUOTAROOT INBOX \"\"\r\n* QUOTA \"\"\r\nA0001 OK done\r\n")
            .build();
        let store = store(mock).await;
        assert!(store.quota("INBOX").await.unwrap().is_unlimited());
    }

    #[tokio::test]
    async fn quota_storage_resource() {
        let mock = login(&mut Builder::new(), "QUOTA")
            .write(b"A0001 GETQUOTAROOT INBOX\r\n")
            .read(b"* QUOTAROOT INBOX user\r\n* QUOTA user (STORAGE 512 1024)\r\n")
            .read(b"A0001 OK done\r\n")
            .build();
        let store = store(mock).await;

        let quota = store.quota("INBOX").await.unwrap();
        assert_eq!(quota.storage_bytes(), Some((512 * 1024, 1024 * 1024)));
    }

    #[tokio::test]
    async fn counts_keep_unreported_attributes() {
        let mock = login(&mut Builder::new(), "")
            .write(b"A0001 STATUS INBOX (MESSAGES RECENT UNSEEN)\r\n")
            .read(b"* STATUS INBOX (MESSAGES 10 UNSEEN 3)\r\nA0001 OK done\r\n")
            .build();
        let store = store(mock).await;

        let counts = store.counts("INBOX").await.unwrap();
        assert_eq!(counts.total, Some(10));
        assert_eq!(counts.recent, None);
        assert_eq!(counts.unseen, Some(3));
    }

    #[tokio::test]
    async fn update_acl_diffs_entries_and_keeps_own() {
        let mock = login(&mut Builder::new(), "ACL")
            .write(b"A0001 LIST \"\" Team\r\n")
            .read(b"* LIST () \"/\" Team\r\nA0001 OK done\r\n")
            .write(b"A0002 MYRIGHTS Team\r\n")
            .read(b"* MYRIGHTS Team lrswipkxtea\r\nA0002 OK done\r\n")
            .write(b"A0003 GETACL Team\r\n")
            .read(b"* ACL Team user lrswipkxtea carol lr\r\nA0003 OK done\r\n")
            .write(b"A0004 SETACL Team bob lrs\r\n")
            .read(b"A0004 OK done\r\n")
            .write(b"A0005 DELETEACL Team carol\r\n")
            .read(b"A0005 OK done\r\n")
            .build();
        let store = resolved_store(mock)
            .await
            .with_acl_mapper(Arc::new(InMemoryAclMapper::new().with(Entity::User(7), "bob")));

        store
            .update_acl(
                "Team",
                &[FolderPermission {
                    entity: Entity::User(7),
                    rights: Rights::parse("lrs"),
                }],
            )
            .await
            .unwrap();
        assert!(store.cache.rights("Team").is_none());
    }

    #[tokio::test]
    async fn acl_requires_capability() {
        let mock = login(&mut Builder::new(), "").build();
        let store = store(mock).await;

        let err = store.acl("INBOX").await.unwrap_err();
        assert!(matches!(
            err.kind(),
            ErrorKind::CapabilityUnsupported { capability } if capability == "ACL"
        ));
    }
}
