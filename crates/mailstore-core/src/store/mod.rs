//! IMAP-backed folder and message storage.
//!
//! [`ImapStore`] implements [`FolderStore`] and [`MessageStore`] over one
//! [`Session`]. Every public operation takes the connection lock once and
//! runs its whole command sequence inside that critical section, so a
//! select-search-store-expunge sequence never interleaves with another
//! caller. Operations that need default folders resolve them before taking
//! the lock, since resolution locks per slot.

mod expunge;
mod folders;
mod messages;

pub use messages::APPEND_MARKER_HEADER;

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use mailstore_imap::{
    AccessMode, Capability, Command, Connection, Flag, ImapStream, ListResponse, Mailbox,
    MailboxAttribute, MailboxStatus, ResponseCode, Right, Rights, SearchCriteria, SequenceSet,
    Session, StatusCounts, StoreAction, ThreadNode, UntaggedResponse,
};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::cache::{NamespaceInfo, SessionCache};
use crate::collab::{
    AclMapper, FolderNaming, InMemoryAclMapper, InMemoryFolderNaming, SpamHandler,
    StaticSpamHandler,
};
use crate::config::StoreConfig;
use crate::error::{Error, ErrorContext, ErrorKind, RequiredRight, Result};
use crate::model::{
    ColorLabel, DefaultSlot, Folder, FolderDescription, FolderPermission, MessageData,
    MessageField, QuotaInfo, fetch_profile, is_within,
};
use crate::sort::{SortDirection, SortField};

/// Boxed future for recursive folder operations.
pub(crate) type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Folder operations.
#[async_trait]
pub trait FolderStore: Send + Sync {
    /// True if a folder with this fullname exists.
    async fn exists(&self, fullname: &str) -> Result<bool>;

    /// Folder metadata.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::FolderNotFound`] if the folder does not exist.
    async fn get_folder(&self, fullname: &str) -> Result<Folder>;

    /// Direct children of `parent` (empty for the top level). At the top
    /// level, namespace roots LIST did not return are added.
    async fn list_subfolders(&self, parent: &str, subscribed_only: bool) -> Result<Vec<Folder>>;

    /// Creates a folder and returns its fullname.
    ///
    /// Subscribing and applying ACL entries happen after creation. If either
    /// fails the new folder is deleted again and that error returned, so a
    /// folder is never left half set up.
    async fn create_folder(&self, description: &FolderDescription) -> Result<String>;

    /// Renames a folder within its parent. Returns the new fullname.
    async fn rename_folder(&self, fullname: &str, new_name: &str) -> Result<String>;

    /// Moves a folder, with its messages and subfolders, below `new_parent`.
    /// Returns the new fullname.
    async fn move_folder(&self, fullname: &str, new_parent: &str) -> Result<String>;

    /// Deletes a folder. A soft delete moves it into Trash.
    async fn delete_folder(&self, fullname: &str, hard: bool) -> Result<()>;

    /// Quota of the folder's quota root. Unlimited when the server has no
    /// QUOTA support.
    async fn quota(&self, fullname: &str) -> Result<QuotaInfo>;

    /// Subscribes or unsubscribes.
    async fn subscribe(&self, fullname: &str, subscribed: bool) -> Result<()>;

    /// MESSAGES, RECENT and UNSEEN counters.
    async fn counts(&self, fullname: &str) -> Result<StatusCounts>;

    /// Rights of the logged in user.
    async fn my_rights(&self, fullname: &str) -> Result<Rights>;

    /// ACL entries that map to local entities.
    async fn acl(&self, fullname: &str) -> Result<Vec<FolderPermission>>;

    /// Replaces the ACL with `permissions`.
    async fn update_acl(&self, fullname: &str, permissions: &[FolderPermission]) -> Result<()>;

    /// Removes every message. A soft clear moves them into Trash.
    async fn clear_folder(&self, fullname: &str, hard: bool) -> Result<()>;

    /// Fullname of a default folder, resolving default folders on first use.
    async fn default_folder(&self, slot: DefaultSlot) -> Result<String>;
}

/// Message operations. Messages are addressed by folder fullname and UID.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Fetches messages by UID, in the order given. Missing UIDs are skipped.
    async fn get_messages(
        &self,
        folder: &str,
        uids: &[u32],
        fields: &[MessageField],
    ) -> Result<Vec<MessageData>>;

    /// Fetches messages by sequence number, in the order given.
    async fn get_messages_by_sequence(
        &self,
        folder: &str,
        sequences: &[u32],
        fields: &[MessageField],
    ) -> Result<Vec<MessageData>>;

    /// Searches on the server, optionally sorted with SORT.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::UnsupportedSortField`] for fields SORT cannot express,
    /// [`ErrorKind::CapabilityUnsupported`] if the server lacks SORT.
    async fn search(
        &self,
        folder: &str,
        term: Option<&SearchCriteria>,
        sort: Option<(SortField, SortDirection)>,
        fields: &[MessageField],
    ) -> Result<Vec<MessageData>>;

    /// Threads messages with `THREAD=REFERENCES`. Nodes carry UIDs.
    async fn thread_sort(
        &self,
        folder: &str,
        term: Option<&SearchCriteria>,
    ) -> Result<Vec<ThreadNode>>;

    /// Sets or clears flags.
    async fn update_flags(&self, folder: &str, uids: &[u32], flags: &[Flag], set: bool)
    -> Result<()>;

    /// Replaces the color label.
    async fn update_color_label(&self, folder: &str, uids: &[u32], label: ColorLabel)
    -> Result<()>;

    /// Copies messages. Returns the destination UID of each source UID
    /// when the server reports them.
    async fn copy_messages(
        &self,
        source: &str,
        destination: &str,
        uids: &[u32],
    ) -> Result<Vec<Option<u32>>>;

    /// Moves messages. Returns destination UIDs as for copying.
    async fn move_messages(
        &self,
        source: &str,
        destination: &str,
        uids: &[u32],
    ) -> Result<Vec<Option<u32>>>;

    /// Appends raw messages and returns their UIDs.
    async fn append_messages(&self, folder: &str, messages: &[Vec<u8>]) -> Result<Vec<u32>>;

    /// Permanently removes exactly these messages. Other messages flagged
    /// `\Deleted` are left alone.
    async fn expunge(&self, folder: &str, uids: &[u32]) -> Result<()>;

    /// Deletes messages. A soft delete moves them into Trash.
    async fn delete_messages(&self, folder: &str, uids: &[u32], hard: bool) -> Result<()>;

    /// Unseen messages, newest first.
    async fn unread_messages(&self, folder: &str, fields: &[MessageField])
    -> Result<Vec<MessageData>>;

    /// Stores a draft and returns its UID. The replaced draft, if any, is
    /// removed afterwards.
    async fn save_draft(&self, raw: &[u8], replace: Option<u32>) -> Result<u32>;

    /// Sequence numbers of UIDs in the current selection, in input order.
    async fn uids_to_sequence(&self, folder: &str, uids: &[u32]) -> Result<Vec<u32>>;

    /// UIDs of sequence numbers, in input order.
    async fn sequence_to_uids(&self, folder: &str, sequences: &[u32]) -> Result<Vec<u32>>;
}

/// [`FolderStore`] and [`MessageStore`] over one IMAP session.
pub struct ImapStore<S = ImapStream> {
    pub(crate) session: Session<S>,
    pub(crate) cache: SessionCache,
    pub(crate) config: StoreConfig,
    pub(crate) naming: Arc<dyn FolderNaming>,
    pub(crate) acl_mapper: Arc<dyn AclMapper>,
    pub(crate) spam: Arc<dyn SpamHandler>,
    pub(crate) context: ErrorContext,
    pub(crate) primary: bool,
}

impl<S> std::fmt::Debug for ImapStore<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImapStore")
            .field("session", &self.session)
            .field("config", &self.config)
            .field("context", &self.context)
            .field("primary", &self.primary)
            .finish_non_exhaustive()
    }
}

impl ImapStore<ImapStream> {
    /// Connects, logs in and wraps the session.
    ///
    /// # Errors
    ///
    /// Returns connection and authentication errors.
    pub async fn connect(
        imap: &mailstore_imap::Config,
        username: &str,
        password: &str,
        config: StoreConfig,
    ) -> Result<Self> {
        let context = ErrorContext {
            server: Some(imap.host.clone()),
            login: Some(username.to_string()),
            ..ErrorContext::default()
        };
        let session = Session::connect(imap, username, password)
            .await
            .map_err(|e| Error::from(e).with_context(&context))?;
        Ok(Self::new(session, config).with_context(context))
    }
}

impl<S> ImapStore<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wraps an authenticated session with in-memory collaborators.
    #[must_use]
    pub fn new(session: Session<S>, config: StoreConfig) -> Self {
        let naming = InMemoryFolderNaming::new(config.folder_names.clone());
        Self {
            session,
            cache: SessionCache::new(),
            config,
            naming: Arc::new(naming),
            acl_mapper: Arc::new(InMemoryAclMapper::new()),
            spam: Arc::new(StaticSpamHandler::default()),
            context: ErrorContext::default(),
            primary: true,
        }
    }

    /// Uses `naming` for default folder names.
    #[must_use]
    pub fn with_naming(mut self, naming: Arc<dyn FolderNaming>) -> Self {
        self.naming = naming;
        self
    }

    /// Uses `mapper` for ACL identifiers.
    #[must_use]
    pub fn with_acl_mapper(mut self, mapper: Arc<dyn AclMapper>) -> Self {
        self.acl_mapper = mapper;
        self
    }

    /// Uses `handler` to decide which spam folders exist.
    #[must_use]
    pub fn with_spam_handler(mut self, handler: Arc<dyn SpamHandler>) -> Self {
        self.spam = handler;
        self
    }

    /// Context attached to every error.
    #[must_use]
    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = context;
        self
    }

    /// Whether this is the user's primary account. Default folder failures
    /// are fatal only there.
    #[must_use]
    pub const fn primary(mut self, primary: bool) -> Self {
        self.primary = primary;
        self
    }

    /// The underlying session.
    #[must_use]
    pub const fn session(&self) -> &Session<S> {
        &self.session
    }

    /// The per-session caches.
    #[must_use]
    pub const fn cache(&self) -> &SessionCache {
        &self.cache
    }

    /// Logs out.
    ///
    /// # Errors
    ///
    /// Returns transport errors.
    pub async fn logout(&self) -> Result<()> {
        self.finish(self.session.logout().await.map_err(Error::from))
    }

    fn finish<T>(&self, result: Result<T>) -> Result<T> {
        result.map_err(|e| e.with_context(&self.context))
    }

    fn has(&self, capability: &Capability) -> bool {
        self.session.capabilities().has(capability)
    }

    fn acls_enforced(&self) -> bool {
        self.config.enforce_acls && self.has(&Capability::Acl)
    }

    pub(crate) async fn lock(&self) -> Result<tokio::sync::MutexGuard<'_, Connection<S>>> {
        self.session.lock().await.map_err(Error::from)
    }

    /// Personal namespace, detected on first use.
    pub(crate) async fn namespace_in(&self, conn: &mut Connection<S>) -> Result<NamespaceInfo> {
        if let Some(info) = self.cache.namespaces() {
            return Ok(info);
        }
        let info = crate::resolver::detect_namespace(conn).await?;
        self.cache.set_namespaces(info.clone());
        Ok(info)
    }

    async fn separator_in(&self, conn: &mut Connection<S>) -> Result<char> {
        Ok(self.namespace_in(conn).await?.separator)
    }

    pub(crate) async fn mbox_in(&self, conn: &mut Connection<S>) -> Result<bool> {
        if let Some(mbox) = self.cache.mbox() {
            return Ok(mbox);
        }
        let info = self.namespace_in(conn).await?;
        let mbox = crate::resolver::detect_mbox(conn, &info).await?;
        self.cache.set_mbox(mbox);
        Ok(mbox)
    }

    /// The LIST entry of `fullname`, `None` if it does not exist.
    pub(crate) async fn entry_in(
        &self,
        conn: &mut Connection<S>,
        fullname: &str,
    ) -> Result<Option<ListResponse>> {
        if let Some(entry) = self.cache.entry(fullname) {
            return Ok(Some(entry));
        }
        let responses = conn
            .execute(&Command::List {
                reference: String::new(),
                pattern: fullname.to_string(),
            })
            .await?;
        let entry = responses
            .cursor()
            .extract(|r| match r {
                UntaggedResponse::List(entry)
                    if same_folder(entry.mailbox.as_str(), fullname)
                        && !entry.has(&MailboxAttribute::NonExistent) =>
                {
                    Some(entry.clone())
                }
                _ => None,
            })
            .next();
        if let Some(entry) = &entry {
            self.cache.put_entry(entry.clone());
        }
        Ok(entry)
    }

    async fn require_entry_in(
        &self,
        conn: &mut Connection<S>,
        fullname: &str,
    ) -> Result<ListResponse> {
        self.entry_in(conn, fullname)
            .await?
            .ok_or_else(|| Error::folder_not_found(fullname))
    }

    /// Names of the direct children of `fullname`.
    async fn children_in(&self, conn: &mut Connection<S>, fullname: &str) -> Result<Vec<String>> {
        let separator = self.separator_in(conn).await?;
        let responses = conn
            .execute(&Command::List {
                reference: String::new(),
                pattern: format!("{fullname}{separator}%"),
            })
            .await?;
        Ok(responses
            .cursor()
            .extract(|r| match r {
                UntaggedResponse::List(entry) if entry.mailbox.as_str() != fullname => {
                    self.cache.put_entry(entry.clone());
                    Some(entry.mailbox.as_str().to_string())
                }
                _ => None,
            })
            .collect())
    }

    pub(crate) async fn subscribed_in(
        &self,
        conn: &mut Connection<S>,
        fullname: &str,
    ) -> Result<bool> {
        if let Some(subscribed) = self.cache.subscription(fullname) {
            return Ok(subscribed);
        }
        let responses = conn
            .execute(&Command::Lsub {
                reference: String::new(),
                pattern: fullname.to_string(),
            })
            .await?;
        let subscribed = responses.cursor().any(|r| {
            matches!(r, UntaggedResponse::Lsub(entry) if same_folder(entry.mailbox.as_str(), fullname))
        });
        self.cache.set_subscription(fullname, subscribed);
        Ok(subscribed)
    }

    /// Own rights. Everything when ACLs are not enforced.
    async fn own_rights_in(&self, conn: &mut Connection<S>, fullname: &str) -> Result<Rights> {
        if !self.acls_enforced() {
            return Ok(Rights::all());
        }
        if let Some(rights) = self.cache.rights(fullname) {
            return Ok(rights);
        }
        let rights = fetch_my_rights(conn, fullname).await?;
        self.cache.put_rights(fullname, rights);
        Ok(rights)
    }

    async fn require_right_in(
        &self,
        conn: &mut Connection<S>,
        fullname: &str,
        right: Right,
        required: RequiredRight,
    ) -> Result<()> {
        if !self.acls_enforced() {
            return Ok(());
        }
        if self.own_rights_in(conn, fullname).await?.has(right) {
            Ok(())
        } else {
            Err(Error::insufficient(fullname, required))
        }
    }

    /// Selects `fullname` in at least `mode` and returns its status.
    async fn select_in(
        &self,
        conn: &mut Connection<S>,
        fullname: &str,
        mode: AccessMode,
    ) -> Result<MailboxStatus> {
        let mailbox = Mailbox::new(fullname);
        let selected = conn
            .select(&mailbox, mode)
            .await
            .map(|s| (s.mode, s.status.clone()));
        match selected {
            Ok((granted, status)) if granted >= mode => Ok(status),
            Ok(_) => Err(Error::insufficient(fullname, RequiredRight::Write)),
            Err(mailstore_imap::Error::No {
                code: Some(ResponseCode::NonExistent | ResponseCode::TryCreate),
                ..
            }) => {
                self.cache.invalidate(fullname, None);
                Err(Error::folder_not_found(fullname))
            }
            Err(e @ mailstore_imap::Error::No { .. }) => {
                // Tell a vanished folder apart from a refused one.
                self.cache.drop_entry(fullname);
                if self.entry_in(conn, fullname).await?.is_none() {
                    self.cache.invalidate(fullname, None);
                    Err(Error::folder_not_found(fullname))
                } else {
                    Err(Error::from(e).in_folder(fullname))
                }
            }
            Err(e) => Err(Error::from(e).in_folder(fullname)),
        }
    }

    fn uid_blocks(&self, uids: &[u32]) -> Vec<SequenceSet> {
        uid_blocks(uids, self.config.block_size)
    }

    /// `UID STORE +/-FLAGS.SILENT` in blocks on the selected folder.
    async fn store_flags_in(
        &self,
        conn: &mut Connection<S>,
        uids: &[u32],
        flags: &[Flag],
        set: bool,
    ) -> Result<()> {
        for sequence in self.uid_blocks(uids) {
            conn.execute(&Command::Store {
                sequence,
                action: StoreAction::toggle(flags.to_vec(), set),
                uid: true,
                silent: true,
            })
            .await?;
        }
        Ok(())
    }

    /// Fetches `sequence` from the selected folder.
    async fn fetch_in(
        &self,
        conn: &mut Connection<S>,
        folder: &str,
        sequence: SequenceSet,
        uid: bool,
        fields: &[MessageField],
    ) -> Result<Vec<MessageData>> {
        let responses = conn
            .execute(&Command::Fetch {
                sequence,
                items: fetch_profile(fields),
                uid,
            })
            .await?;
        Ok(responses
            .cursor()
            .extract(|r| match r {
                UntaggedResponse::Fetch { seq, items } => {
                    MessageData::from_fetch(folder, *seq, items)
                }
                _ => None,
            })
            .collect())
    }

    /// `UID SEARCH` on the selected folder.
    async fn uid_search_in(
        &self,
        conn: &mut Connection<S>,
        criteria: SearchCriteria,
    ) -> Result<Vec<u32>> {
        let responses = conn
            .execute(&Command::Search {
                criteria,
                uid: true,
            })
            .await?;
        Ok(search_results(&responses))
    }

    /// Refuses to touch default folders or their ancestors.
    async fn ensure_not_default(&self, fullname: &str) -> Result<()> {
        if fullname.eq_ignore_ascii_case("INBOX") {
            return Err(protected(fullname));
        }
        let defaults = self.default_folders().await?;
        let separator = self.cache.namespaces().map(|ns| ns.separator);
        if defaults
            .values()
            .any(|default| is_within(default, fullname, separator))
        {
            return Err(protected(fullname));
        }
        Ok(())
    }

    /// Resolved default folders, resolving them on first use.
    ///
    /// # Errors
    ///
    /// On the primary account, any failure to resolve a needed slot.
    pub async fn default_folders(&self) -> Result<HashMap<DefaultSlot, String>> {
        let defaults = self.cache.default_folders();
        if !defaults.is_empty() {
            return Ok(defaults);
        }
        self.resolve_default_folders().await
    }
}

/// UID sets of at most `block_size` UIDs each, ascending.
fn uid_blocks(uids: &[u32], block_size: usize) -> Vec<SequenceSet> {
    let mut sorted = uids.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    sorted
        .chunks(block_size.max(1))
        .filter_map(SequenceSet::from_numbers)
        .collect()
}

fn protected(fullname: &str) -> Error {
    Error::new(ErrorKind::DefaultFolderProtected {
        fullname: fullname.to_string(),
    })
    .in_folder(fullname)
}

/// INBOX compares case-insensitively, everything else exactly.
fn same_folder(a: &str, b: &str) -> bool {
    a == b || (a.eq_ignore_ascii_case("INBOX") && b.eq_ignore_ascii_case("INBOX"))
}

fn search_results(responses: &mailstore_imap::Responses) -> Vec<u32> {
    responses
        .cursor()
        .extract(|r| match r {
            UntaggedResponse::Search(ids) | UntaggedResponse::Sort(ids) => Some(ids.clone()),
            _ => None,
        })
        .flatten()
        .collect()
}

async fn fetch_my_rights<S>(conn: &mut Connection<S>, fullname: &str) -> Result<Rights>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let responses = conn
        .execute(&Command::MyRights {
            mailbox: Mailbox::new(fullname),
        })
        .await
        .map_err(|e| Error::from(e).in_folder(fullname))?;
    Ok(responses
        .cursor()
        .extract(|r| match r {
            UntaggedResponse::MyRights { rights, .. } => Some(*rights),
            _ => None,
        })
        .next()
        .unwrap_or_else(Rights::none))
}

/// The right needed to change a flag, with the right reported when missing.
const fn flag_right(flag: &Flag) -> (Right, RequiredRight) {
    match flag {
        Flag::Seen => (Right::KeepSeen, RequiredRight::KeepSeen),
        Flag::Deleted => (Right::DeleteMessages, RequiredRight::Delete),
        _ => (Right::Write, RequiredRight::Write),
    }
}
