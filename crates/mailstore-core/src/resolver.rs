//! Namespace detection, mbox-mode probing and default folder resolution.

use std::collections::{HashMap, HashSet};
use std::time::{SystemTime, UNIX_EPOCH};

use mailstore_imap::{
    Capability, Command, Connection, Mailbox, MailboxAttribute, UntaggedResponse,
};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::cache::NamespaceInfo;
use crate::error::{Error, ErrorKind, Result};
use crate::model::{DefaultSlot, leaf_name, parent_name};
use crate::store::ImapStore;

/// Separator assumed when the server reports none.
const DEFAULT_SEPARATOR: char = '/';

/// Personal namespace from NAMESPACE, or from INBOX's LIST entry when the
/// server lacks NAMESPACE.
pub(crate) async fn detect_namespace<S>(conn: &mut Connection<S>) -> Result<NamespaceInfo>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    if conn.has(&Capability::Namespace) {
        let responses = conn.execute(&Command::Namespace).await?;
        let namespaces = responses
            .cursor()
            .extract(|r| match r {
                UntaggedResponse::Namespace(ns) => Some(ns.clone()),
                _ => None,
            })
            .next();
        if let Some(namespaces) = namespaces
            && let Some(primary) = namespaces.primary()
        {
            let separator = primary.delimiter.unwrap_or(DEFAULT_SEPARATOR);
            let mut personal_prefix = primary.prefix.clone();
            if !personal_prefix.is_empty() && !personal_prefix.ends_with(separator) {
                personal_prefix.push(separator);
            }
            let info = NamespaceInfo {
                personal_prefix,
                separator,
                foreign_roots: namespaces
                    .foreign_roots()
                    .into_iter()
                    .map(|ns| ns.root().to_string())
                    .collect(),
            };
            tracing::debug!(prefix = %info.personal_prefix, separator = %info.separator, "namespace detected");
            return Ok(info);
        }
        tracing::debug!("NAMESPACE reported no personal namespace");
    }

    let responses = conn
        .execute(&Command::List {
            reference: String::new(),
            pattern: "INBOX".to_string(),
        })
        .await?;
    let separator = responses
        .cursor()
        .extract(|r| match r {
            UntaggedResponse::List(entry) => entry.delimiter,
            _ => None,
        })
        .next()
        .unwrap_or(DEFAULT_SEPARATOR);
    Ok(NamespaceInfo {
        personal_prefix: String::new(),
        separator,
        foreign_roots: Vec::new(),
    })
}

/// Whether folders cannot hold both messages and subfolders. Decided by
/// creating a temporary folder and a child below it.
pub(crate) async fn detect_mbox<S>(conn: &mut Connection<S>, info: &NamespaceInfo) -> Result<bool>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_nanos());
    let scratch = info.personal(&format!("mailstore-scratch-{nanos:x}"));
    detect_mbox_at(conn, &scratch, info.separator).await
}

async fn detect_mbox_at<S>(conn: &mut Connection<S>, scratch: &str, separator: char) -> Result<bool>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    if let Err(e) = conn
        .execute(&Command::Create {
            mailbox: Mailbox::new(scratch),
        })
        .await
    {
        if e.is_fatal() {
            return Err(e.into());
        }
        tracing::warn!(?e, scratch, "cannot create scratch folder, assuming no mbox mode");
        return Ok(false);
    }

    let child = format!("{scratch}{separator}sub");
    let mbox = match conn
        .execute(&Command::Create {
            mailbox: Mailbox::new(child.as_str()),
        })
        .await
    {
        Ok(_) => {
            remove_scratch(conn, &child).await?;
            false
        }
        Err(e) if e.is_fatal() => return Err(e.into()),
        Err(_) => true,
    };
    remove_scratch(conn, scratch).await?;
    tracing::debug!(mbox, "mbox mode detected");
    Ok(mbox)
}

async fn remove_scratch<S>(conn: &mut Connection<S>, name: &str) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    match conn
        .execute(&Command::Delete {
            mailbox: Mailbox::new(name),
        })
        .await
    {
        Ok(_) => Ok(()),
        Err(e) if e.is_fatal() => Err(e.into()),
        Err(e) => {
            tracing::warn!(?e, name, "scratch folder left behind");
            Ok(())
        }
    }
}

impl<S> ImapStore<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Resolves every needed default folder and caches the result.
    ///
    /// The slots are checked concurrently; each check takes the connection
    /// lock for itself, waiting at most the default folder timeout.
    pub(crate) async fn resolve_default_folders(&self) -> Result<HashMap<DefaultSlot, String>> {
        let (namespace, siblings) = {
            let mut conn = self.lock().await?;
            let namespace = self.namespace_in(&mut conn).await?;
            self.mbox_in(&mut conn).await?;
            let siblings = self.siblings_in(&mut conn, &namespace).await?;
            (namespace, siblings)
        };

        let (drafts, sent, trash, spam, confirmed_spam, confirmed_ham) = tokio::join!(
            self.resolve_slot(DefaultSlot::Drafts, &namespace, &siblings),
            self.resolve_slot(DefaultSlot::Sent, &namespace, &siblings),
            self.resolve_slot(DefaultSlot::Trash, &namespace, &siblings),
            self.resolve_slot(DefaultSlot::Spam, &namespace, &siblings),
            self.resolve_slot(DefaultSlot::ConfirmedSpam, &namespace, &siblings),
            self.resolve_slot(DefaultSlot::ConfirmedHam, &namespace, &siblings),
        );

        let mut defaults = HashMap::from([(DefaultSlot::Inbox, "INBOX".to_string())]);
        for (slot, outcome) in [
            (DefaultSlot::Drafts, drafts),
            (DefaultSlot::Sent, sent),
            (DefaultSlot::Trash, trash),
            (DefaultSlot::Spam, spam),
            (DefaultSlot::ConfirmedSpam, confirmed_spam),
            (DefaultSlot::ConfirmedHam, confirmed_ham),
        ] {
            match outcome {
                Ok(Some(fullname)) => {
                    defaults.insert(slot, fullname);
                }
                Ok(None) => {}
                Err(e) if self.primary => return Err(e),
                Err(e) => tracing::warn!(?e, %slot, "default folder unavailable"),
            }
        }

        tracing::info!(count = defaults.len(), "default folders resolved");
        self.cache.set_default_folders(defaults.clone());
        Ok(defaults)
    }

    /// Selectable folders directly below the personal prefix. Their
    /// subscription state is cached from one LSUB of the same level.
    async fn siblings_in(
        &self,
        conn: &mut Connection<S>,
        namespace: &NamespaceInfo,
    ) -> Result<Vec<String>> {
        let pattern = format!("{}%", namespace.personal_prefix);
        let responses = conn
            .execute(&Command::List {
                reference: String::new(),
                pattern: pattern.clone(),
            })
            .await?;
        let siblings: Vec<String> = responses
            .cursor()
            .extract(|r| match r {
                UntaggedResponse::List(entry) if entry.is_selectable() => {
                    self.cache.put_entry(entry.clone());
                    Some(entry.mailbox.as_str().to_string())
                }
                _ => None,
            })
            .collect();

        match conn
            .execute(&Command::Lsub {
                reference: String::new(),
                pattern,
            })
            .await
        {
            Ok(lsub) => {
                let subscribed: HashSet<String> = lsub
                    .cursor()
                    .extract(|r| match r {
                        UntaggedResponse::Lsub(entry) => Some(entry.mailbox.as_str().to_string()),
                        _ => None,
                    })
                    .collect();
                for name in &siblings {
                    self.cache.set_subscription(name, subscribed.contains(name));
                }
            }
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => tracing::debug!(?e, "LSUB of top-level folders failed"),
        }
        Ok(siblings)
    }

    /// Fullname for one slot, `None` when the slot is not needed.
    async fn resolve_slot(
        &self,
        slot: DefaultSlot,
        namespace: &NamespaceInfo,
        siblings: &[String],
    ) -> Result<Option<String>> {
        if !self.spam.needs(slot) {
            return Ok(None);
        }

        let fullname = if let Some(configured) = self.naming.configured_fullname(slot) {
            configured
        } else {
            let wanted = self.naming.default_name(slot);
            let matches: Vec<&String> = siblings
                .iter()
                .filter(|name| {
                    leaf_name(name, Some(namespace.separator)).eq_ignore_ascii_case(&wanted)
                })
                .collect();
            if let [only] = matches.as_slice() {
                tracing::debug!(%slot, fullname = %only, "adopting existing folder");
                (*only).clone()
            } else {
                if matches.len() > 1 {
                    tracing::debug!(%slot, candidates = matches.len(), "ambiguous match, using canonical name");
                }
                namespace.personal(&wanted)
            }
        };

        let timeout = self.config.default_folder_timeout();
        let mut conn = tokio::time::timeout(timeout, self.lock())
            .await
            .map_err(|_| Error::new(ErrorKind::Timeout { after: timeout }).in_folder(&fullname))??;
        self.ensure_folder_in(&mut conn, &fullname).await?;
        self.naming.persist_fullname(slot, &fullname);
        Ok(Some(fullname))
    }

    /// Creates `fullname` unless it exists and makes sure it is subscribed.
    /// A refused SUBSCRIBE only warns: the folder is usable either way.
    async fn ensure_folder_in(&self, conn: &mut Connection<S>, fullname: &str) -> Result<()> {
        if let Some(entry) = self.entry_in(conn, fullname).await? {
            if entry.has(&MailboxAttribute::Subscribed) {
                self.cache.set_subscription(fullname, true);
                return Ok(());
            }
            match self.subscribed_in(conn, fullname).await {
                Ok(true) => {}
                Ok(false) => self.subscribe_default_in(conn, fullname).await?,
                Err(e) => tracing::warn!(?e, fullname, "subscription state unknown"),
            }
            return Ok(());
        }
        conn.execute(&Command::Create {
            mailbox: Mailbox::new(fullname),
        })
        .await
        .map_err(|e| Error::from(e).in_folder(fullname))?;
        let separator = self.cache.namespaces().map(|ns| ns.separator);
        self.cache.drop_entry(parent_name(fullname, separator));
        tracing::info!(fullname, "default folder created");
        self.subscribe_default_in(conn, fullname).await
    }

    /// SUBSCRIBE that fails only on a lost connection.
    async fn subscribe_default_in(&self, conn: &mut Connection<S>, fullname: &str) -> Result<()> {
        match conn
            .execute(&Command::Subscribe {
                mailbox: Mailbox::new(fullname),
            })
            .await
        {
            Ok(_) => {
                self.cache.set_subscription(fullname, true);
                tracing::debug!(fullname, "default folder subscribed");
                Ok(())
            }
            Err(e) if e.is_fatal() => Err(Error::from(e).in_folder(fullname)),
            Err(e) => {
                tracing::warn!(?e, fullname, "could not subscribe default folder");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::collab::{FolderNaming, InMemoryFolderNaming, StaticSpamHandler};
    use crate::config::FolderNames;
    use crate::store::test_support::{login, store};
    use tokio_test::io::Builder;

    #[tokio::test]
    async fn namespace_from_namespace_command() {
        let mock = login(&mut Builder::new(), "NAMESPACE")
            .write(b"A0001 NAMESPACE\r\n")
            .read(b"* NAMESPACE ((\"INBOX.\" \".\")) ((\"#Users.\" \".\")) ((\"#Public.\" \".\"))\r\n")
            .read(b"A0001 OK done\r\n")
            .build();
        let store = store(mock).await;

        let mut conn = store.session().lock().await.unwrap();
        let info = detect_namespace(&mut conn).await.unwrap();
        assert_eq!(info.personal_prefix, "INBOX.");
        assert_eq!(info.separator, '.');
        assert_eq!(info.foreign_roots, ["#Users", "#Public"]);
    }

    #[tokio::test]
    async fn namespace_falls_back_to_inbox_delimiter() {
        let mock = login(&mut Builder::new(), "")
            .write(b"A0001 LIST \"\" INBOX\r\n")
            .read(b"* LIST (\\HasChildren) \".\" INBOX\r\nA0001 OK done\r\n")
            .build();
        let store = store(mock).await;

        let mut conn = store.session().lock().await.unwrap();
        let info = detect_namespace(&mut conn).await.unwrap();
        assert_eq!(info.personal_prefix, "");
        assert_eq!(info.separator, '.');
        assert!(info.foreign_roots.is_empty());
    }

    #[tokio::test]
    async fn refused_child_means_mbox() {
        let mock = login(&mut Builder::new(), "")
            .write(b"A0001 CREATE scratch\r\n")
            .read(b"A0001 OK done\r\n")
            .write(b"A0002 CREATE scratch/sub\r\n")
            .read(b"A0002 NO cannot create below a mailbox file\r\n")
            .write(b"A0003 DELETE scratch\r\n")
            .read(b"A0003 OK done\r\n")
            .build();
        let store = store(mock).await;

        let mut conn = store.session().lock().await.unwrap();
        assert!(detect_mbox_at(&mut conn, "scratch", '/').await.unwrap());
    }

    #[tokio::test]
    async fn accepted_child_means_no_mbox() {
        let mock = login(&mut Builder::new(), "")
            .write(b"A0001 CREATE scratch\r\n")
            .read(b"A0001 OK done\r\n")
            .write(b"A0002 CREATE scratch/sub\r\n")
            .read(b"A0002 OK done\r\n")
            .write(b"A0003 DELETE scratch/sub\r\n")
            .read(b"A0003 OK done\r\n")
            .write(b"A0004 DELETE scratch\r\n")
            .read(b"A0004 NO in use\r\n")
            .build();
        let store = store(mock).await;

        let mut conn = store.session().lock().await.unwrap();
        assert!(!detect_mbox_at(&mut conn, "scratch", '/').await.unwrap());
    }

    #[tokio::test]
    async fn slots_adopt_create_and_prefer_canonical() {
        let mock = login(&mut Builder::new(), "NAMESPACE")
            .write(b"A0001 NAMESPACE\r\n")
            .read(b"* NAMESPACE ((\"INBOX.\" \".\")) NIL NIL\r\nA0001 OK done\r\n")
            .write(b"A0002 LIST \"\" \"INBOX.%\"\r\n")
            .read(b"* LIST (\\HasNoChildren) \".\" INBOX.drafts\r\n")
            .read(b"* LIST (\\HasNoChildren) \".\" INBOX.Trash\r\n")
            .read(b"* LIST (\\HasNoChildren) \".\" INBOX.TRASH\r\n")
            .read(b"A0002 OK done\r\n")
            .write(b"A0003 LSUB \"\" \"INBOX.%\"\r\n")
            .read(b"* LSUB () \".\" INBOX.drafts\r\n* LSUB () \".\" INBOX.Trash\r\n")
            .read(b"A0003 OK done\r\n")
            .write(b"A0004 LIST \"\" INBOX.Sent\r\n")
            .read(b"A0004 OK done\r\n")
            .write(b"A0005 CREATE INBOX.Sent\r\n")
            .read(b"A0005 OK done\r\n")
            .write(b"A0006 SUBSCRIBE INBOX.Sent\r\n")
            .read(b"A0006 OK done\r\n")
            .write(b"A0007 LIST \"\" INBOX.Spam\r\n")
            .read(b"* LIST (\\Subscribed) \".\" INBOX.Spam\r\nA0007 OK done\r\n")
            .build();
        let naming = Arc::new(InMemoryFolderNaming::new(FolderNames::default()));
        let store = store(mock).await.with_naming(naming.clone());
        store.cache().set_mbox(false);

        let defaults = store.default_folders().await.unwrap();
        assert_eq!(defaults[&DefaultSlot::Inbox], "INBOX");
        assert_eq!(defaults[&DefaultSlot::Drafts], "INBOX.drafts");
        assert_eq!(defaults[&DefaultSlot::Sent], "INBOX.Sent");
        assert_eq!(defaults[&DefaultSlot::Trash], "INBOX.Trash");
        assert_eq!(defaults[&DefaultSlot::Spam], "INBOX.Spam");
        assert!(!defaults.contains_key(&DefaultSlot::ConfirmedHam));
        assert_eq!(
            naming.configured_fullname(DefaultSlot::Drafts).as_deref(),
            Some("INBOX.drafts")
        );
        assert_eq!(store.cache().slot_of("INBOX.Sent"), Some(DefaultSlot::Sent));
    }

    #[tokio::test]
    async fn existing_unsubscribed_defaults_get_subscribed() {
        let mock = login(&mut Builder::new(), "")
            .write(b"A0001 LIST \"\" INBOX\r\n")
            .read(b"* LIST () \"/\" INBOX\r\nA0001 OK done\r\n")
            .write(b"A0002 LIST \"\" \"%\"\r\n")
            .read(b"* LIST () \"/\" INBOX\r\n* LIST () \"/\" Drafts\r\n")
            .read(b"* LIST () \"/\" Sent\r\n* LIST () \"/\" Trash\r\n")
            .read(b"A0002 OK done\r\n")
            .write(b"A0003 LSUB \"\" \"%\"\r\n")
            .read(b"* LSUB () \"/\" INBOX\r\n* LSUB () \"/\" Sent\r\n")
            .read(b"* LSUB () \"/\" Trash\r\nA0003 OK done\r\n")
            .write(b"A0004 SUBSCRIBE Drafts\r\n")
            .read(b"A0004 OK done\r\n")
            .build();
        let store = store(mock)
            .await
            .with_spam_handler(Arc::new(StaticSpamHandler {
                spam: false,
                confirmed: false,
            }));
        store.cache().set_mbox(false);

        let defaults = store.default_folders().await.unwrap();
        assert_eq!(defaults[&DefaultSlot::Drafts], "Drafts");
        assert_eq!(store.cache().subscription("Drafts"), Some(true));
        assert_eq!(store.cache().subscription("Sent"), Some(true));
    }

    #[tokio::test]
    async fn configured_fullname_is_created_when_missing() {
        let mock = login(&mut Builder::new(), "")
            .write(b"A0001 LIST \"\" INBOX\r\n")
            .read(b"* LIST () \"/\" INBOX\r\nA0001 OK done\r\n")
            .write(b"A0002 LIST \"\" \"%\"\r\n")
            .read(b"* LIST () \"/\" INBOX\r\nA0002 OK done\r\n")
            .write(b"A0003 LSUB \"\" \"%\"\r\n")
            .read(b"* LSUB () \"/\" INBOX\r\nA0003 OK done\r\n")
            .write(b"A0004 LIST \"\" Entw&APw-rfe\r\n")
            .read(b"A0004 OK done\r\n")
            .write(b"A0005 CREATE Entw&APw-rfe\r\n")
            .read(b"A0005 OK done\r\n")
            .write(b"A0006 SUBSCRIBE Entw&APw-rfe\r\n")
            .read(b"A0006 OK done\r\n")
            .build();
        let naming = Arc::new(
            InMemoryFolderNaming::new(FolderNames::default())
                .with_fullname(DefaultSlot::Drafts, "Entwürfe"),
        );
        let store = store(mock)
            .await
            .with_naming(naming)
            .with_spam_handler(Arc::new(StaticSpamHandler {
                spam: false,
                confirmed: false,
            }));
        store.cache().set_mbox(false);
        // Only Drafts is left to resolve.
        for slot in [DefaultSlot::Sent, DefaultSlot::Trash] {
            store.cache().put_entry(mailstore_imap::ListResponse {
                attributes: Vec::new(),
                delimiter: Some('/'),
                mailbox: Mailbox::new(slot.canonical_name()),
            });
            store.cache().set_subscription(slot.canonical_name(), true);
        }

        let defaults = store.default_folders().await.unwrap();
        assert_eq!(defaults[&DefaultSlot::Drafts], "Entwürfe");
        assert_eq!(defaults.len(), 4);
    }

    #[tokio::test]
    async fn failures_are_tolerated_on_secondary_accounts() {
        let mock = login(&mut Builder::new(), "")
            .write(b"A0001 LIST \"\" INBOX\r\n")
            .read(b"* LIST () \"/\" INBOX\r\nA0001 OK done\r\n")
            .write(b"A0002 LIST \"\" \"%\"\r\n")
            .read(b"A0002 OK done\r\n")
            .write(b"A0003 LSUB \"\" \"%\"\r\n")
            .read(b"A0003 OK done\r\n")
            .write(b"A0004 LIST \"\" Drafts\r\n")
            .read(b"A0004 OK done\r\n")
            .write(b"A0005 CREATE Drafts\r\n")
            .read(b"A0005 NO [OVERQUOTA] quota exceeded\r\n")
            .write(b"A0006 LIST \"\" Sent\r\n")
            .read(b"* LIST () \"/\" Sent\r\nA0006 OK done\r\n")
            .write(b"A0007 LSUB \"\" Sent\r\n")
            .read(b"* LSUB () \"/\" Sent\r\nA0007 OK done\r\n")
            .write(b"A0008 LIST \"\" Trash\r\n")
            .read(b"* LIST () \"/\" Trash\r\nA0008 OK done\r\n")
            .write(b"A0009 LSUB \"\" Trash\r\n")
            .read(b"A0009 OK done\r\n")
            .write(b"A0010 SUBSCRIBE Trash\r\n")
            .read(b"A0010 NO not allowed\r\n")
            .build();
        let store = store(mock)
            .await
            .with_spam_handler(Arc::new(StaticSpamHandler {
                spam: false,
                confirmed: false,
            }))
            .primary(false);
        store.cache().set_mbox(false);

        let defaults = store.default_folders().await.unwrap();
        assert!(!defaults.contains_key(&DefaultSlot::Drafts));
        assert_eq!(defaults[&DefaultSlot::Sent], "Sent");
        assert_eq!(defaults[&DefaultSlot::Trash], "Trash");
        assert_eq!(store.cache().subscription("Trash"), Some(false));
    }

    #[tokio::test]
    async fn failures_are_fatal_on_the_primary_account() {
        let mock = login(&mut Builder::new(), "")
            .write(b"A0001 LIST \"\" INBOX\r\n")
            .read(b"* LIST () \"/\" INBOX\r\nA0001 OK done\r\n")
            .write(b"A0002 LIST \"\" \"%\"\r\n")
            .read(b"A0002 OK done\r\n")
            .write(b"A0003 LSUB \"\" \"%\"\r\n")
            .read(b"A0003 OK done\r\n")
            .write(b"A0004 LIST \"\" Drafts\r\n")
            .read(b"A0004 OK done\r\n")
            .write(b"A0005 CREATE Drafts\r\n")
            .read(b"A0005 NO [OVERQUOTA] quota exceeded\r\n")
            .write(b"A0006 LIST \"\" Sent\r\n")
            .read(b"* LIST (\\Subscribed) \"/\" Sent\r\nA0006 OK done\r\n")
            .write(b"A0007 LIST \"\" Trash\r\n")
            .read(b"* LIST (\\Subscribed) \"/\" Trash\r\nA0007 OK done\r\n")
            .build();
        let store = store(mock)
            .await
            .with_spam_handler(Arc::new(StaticSpamHandler {
                spam: false,
                confirmed: false,
            }));
        store.cache().set_mbox(false);

        let err = store.default_folders().await.unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::QuotaExceeded { .. }));
        assert!(store.cache().default_folders().is_empty());
    }
}
