//! Expunging exactly a set of UIDs.

use std::collections::HashSet;

use mailstore_imap::{
    AccessMode, Capability, Command, Connection, Flag, SearchCriteria, SequenceSet, StoreAction,
};
use tokio::io::{AsyncRead, AsyncWrite};

use super::ImapStore;
use crate::error::Result;

impl<S> ImapStore<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Expunges `uids`, which must already carry `\Deleted`.
    ///
    /// Uses `UID EXPUNGE` when the server has UIDPLUS. Otherwise, or when
    /// that is refused, other `\Deleted` messages are unflagged around a
    /// plain EXPUNGE so only `uids` go.
    pub(crate) async fn expunge_in(
        &self,
        conn: &mut Connection<S>,
        folder: &str,
        uids: &[u32],
    ) -> Result<()> {
        if uids.is_empty() {
            return Ok(());
        }
        self.select_in(conn, folder, AccessMode::ReadWrite).await?;

        if self.has(&Capability::UidPlus) {
            match self.uid_expunge_in(conn, uids).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => {
                    tracing::warn!(?e, folder, "UID EXPUNGE failed, falling back to EXPUNGE");
                }
            }
        }
        self.expunge_excluding_in(conn, folder, uids).await
    }

    async fn uid_expunge_in(
        &self,
        conn: &mut Connection<S>,
        uids: &[u32],
    ) -> mailstore_imap::Result<()> {
        for sequence in self.uid_blocks(uids) {
            conn.execute(&Command::UidExpunge { uids: sequence })
                .await?;
        }
        Ok(())
    }

    /// Plain EXPUNGE with every other `\Deleted` message unflagged first.
    ///
    /// Unflagging goes block by block and only blocks the server accepted
    /// are flagged again afterwards, whether the EXPUNGE ran or an earlier
    /// step failed. Restoring continues past errors; the first error of the
    /// whole operation is returned. Nothing is restored once the connection
    /// is gone.
    async fn expunge_excluding_in(
        &self,
        conn: &mut Connection<S>,
        folder: &str,
        uids: &[u32],
    ) -> Result<()> {
        let targets: HashSet<u32> = uids.iter().copied().collect();
        let excluded: Vec<u32> = self
            .uid_search_in(conn, SearchCriteria::Deleted)
            .await?
            .into_iter()
            .filter(|uid| !targets.contains(uid))
            .collect();

        if !excluded.is_empty() {
            tracing::debug!(folder, count = excluded.len(), "shielding other deleted messages");
        }
        let mut shielded = Vec::new();
        let mut failure: Option<mailstore_imap::Error> = None;
        for sequence in self.uid_blocks(&excluded) {
            match conn.execute(&deleted_flag(sequence.clone(), false)).await {
                Ok(_) => shielded.push(sequence),
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        if failure.is_none() {
            if let Err(e) = conn.execute(&Command::Expunge).await {
                failure = Some(e);
            }
        }

        for sequence in shielded {
            if failure.as_ref().is_some_and(mailstore_imap::Error::is_fatal) {
                break;
            }
            if let Err(e) = conn.execute(&deleted_flag(sequence, true)).await {
                tracing::warn!(?e, folder, "could not restore \\Deleted");
                failure.get_or_insert(e);
            }
        }

        match failure {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }
}

fn deleted_flag(sequence: SequenceSet, set: bool) -> Command {
    Command::Store {
        sequence,
        action: StoreAction::toggle(vec![Flag::Deleted], set),
        uid: true,
        silent: true,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use crate::error::ErrorKind;
    use crate::store::MessageStore;
    use crate::store::test_support::{login, resolved_store};
    use tokio_test::io::Builder;

    #[tokio::test]
    async fn fallback_keeps_unrelated_deleted_messages() {
        let mock = login(&mut Builder::new(), "")
            .write(b"A0001 SELECT INBOX\r\n")
            .read(b"* 3 EXISTS\r\nA0001 OK [READ-WRITE] done\r\n")
            .write(b"A0002 UID STORE 5,9 +FLAGS.SILENT (\\Deleted)\r\n")
            .read(b"A0002 OK done\r\n")
            .write(b"A0003 UID SEARCH DELETED\r\n")
            .read(b"* SEARCH 5 7 9\r\nA0003 OK done\r\n")
            .write(b"A0004 UID STORE 7 -FLAGS.SILENT (\\Deleted)\r\n")
            .read(b"A0004 OK done\r\n")
            .write(b"A0005 EXPUNGE\r\n")
            .read(b"* 3 EXPUNGE\r\n* 1 EXPUNGE\r\nA0005 OK done\r\n")
            .write(b"A0006 UID STORE 7 +FLAGS.SILENT (\\Deleted)\r\n")
            .read(b"A0006 OK done\r\n")
            .build();
        let store = resolved_store(mock).await;

        store.expunge("INBOX", &[9, 5]).await.unwrap();
    }

    #[tokio::test]
    async fn uid_expunge_with_uidplus() {
        let mock = login(&mut Builder::new(), "UIDPLUS")
            .write(b"A0001 SELECT INBOX\r\n")
            .read(b"A0001 OK [READ-WRITE] done\r\n")
            .write(b"A0002 UID STORE 5,9 +FLAGS.SILENT (\\Deleted)\r\n")
            .read(b"A0002 OK done\r\n")
            .write(b"A0003 UID EXPUNGE 5,9\r\n")
            .read(b"A0003 OK done\r\n")
            .build();
        let store = resolved_store(mock).await;

        store.expunge("INBOX", &[5, 9]).await.unwrap();
    }

    #[tokio::test]
    async fn refused_uid_expunge_falls_back() {
        let mock = login(&mut Builder::new(), "UIDPLUS")
            .write(b"A0001 SELECT INBOX\r\n")
            .read(b"A0001 OK [READ-WRITE] done\r\n")
            .write(b"A0002 UID STORE 4 +FLAGS.SILENT (\\Deleted)\r\n")
            .read(b"A0002 OK done\r\n")
            .write(b"A0003 UID EXPUNGE 4\r\n")
            .read(b"A0003 NO not now\r\n")
            .write(b"A0004 UID SEARCH DELETED\r\n")
            .read(b"* SEARCH 4\r\nA0004 OK done\r\n")
            .write(b"A0005 EXPUNGE\r\n")
            .read(b"A0005 OK done\r\n")
            .build();
        let store = resolved_store(mock).await;

        store.expunge("INBOX", &[4]).await.unwrap();
    }

    #[tokio::test]
    async fn flags_are_restored_when_expunge_is_refused() {
        let mock = login(&mut Builder::new(), "")
            .write(b"A0001 SELECT INBOX\r\n")
            .read(b"A0001 OK [READ-WRITE] done\r\n")
            .write(b"A0002 UID STORE 1 +FLAGS.SILENT (\\Deleted)\r\n")
            .read(b"A0002 OK done\r\n")
            .write(b"A0003 UID SEARCH DELETED\r\n")
            .read(b"* SEARCH 1 2\r\nA0003 OK done\r\n")
            .write(b"A0004 UID STORE 2 -FLAGS.SILENT (\\Deleted)\r\n")
            .read(b"A0004 OK done\r\n")
            .write(b"A0005 EXPUNGE\r\n")
            .read(b"A0005 NO mailbox busy\r\n")
            .write(b"A0006 UID STORE 2 +FLAGS.SILENT (\\Deleted)\r\n")
            .read(b"A0006 OK done\r\n")
            .build();
        let store = resolved_store(mock).await;

        let err = store.expunge("INBOX", &[1]).await.unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::OperationNotSupported { .. }));
    }

    #[tokio::test]
    async fn failed_shield_restores_accepted_blocks() {
        let mock = login(&mut Builder::new(), "")
            .write(b"A0001 SELECT INBOX\r\n")
            .read(b"A0001 OK [READ-WRITE] done\r\n")
            .write(b"A0002 UID STORE 5 +FLAGS.SILENT (\\Deleted)\r\n")
            .read(b"A0002 OK done\r\n")
            .write(b"A0003 UID SEARCH DELETED\r\n")
            .read(b"* SEARCH 5 7 8\r\nA0003 OK done\r\n")
            .write(b"A0004 UID STORE 7 -FLAGS.SILENT (\\Deleted)\r\n")
            .read(b"A0004 OK done\r\n")
            .write(b"A0005 UID STORE 8 -FLAGS.SILENT (\\Deleted)\r\n")
            .read(b"A0005 NO busy\r\n")
            .write(b"A0006 UID STORE 7 +FLAGS.SILENT (\\Deleted)\r\n")
            .read(b"A0006 OK done\r\n")
            .build();
        let mut store = resolved_store(mock).await;
        store.config.block_size = 1;

        let err = store.expunge("INBOX", &[5]).await.unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::OperationNotSupported { .. }));
    }

    #[tokio::test]
    async fn restore_continues_past_errors() {
        let mock = login(&mut Builder::new(), "")
            .write(b"A0001 SELECT INBOX\r\n")
            .read(b"A0001 OK [READ-WRITE] done\r\n")
            .write(b"A0002 UID STORE 1 +FLAGS.SILENT (\\Deleted)\r\n")
            .read(b"A0002 OK done\r\n")
            .write(b"A0003 UID SEARCH DELETED\r\n")
            .read(b"* SEARCH 1 2 3\r\nA0003 OK done\r\n")
            .write(b"A0004 UID STORE 2 -FLAGS.SILENT (\\Deleted)\r\n")
            .read(b"A0004 OK done\r\n")
            .write(b"A0005 UID STORE 3 -FLAGS.SILENT (\\Deleted)\r\n")
            .read(b"A0005 OK done\r\n")
            .write(b"A0006 EXPUNGE\r\n")
            .read(b"* 1 EXPUNGE\r\nA0006 OK done\r\n")
            .write(b"A0007 UID STORE 2 +FLAGS.SILENT (\\Deleted)\r\n")
            .read(b"A0007 NO try later\r\n")
            .write(b"A0008 UID STORE 3 +FLAGS.SILENT (\\Deleted)\r\n")
            .read(b"A0008 OK done\r\n")
            .build();
        let mut store = resolved_store(mock).await;
        store.config.block_size = 1;

        assert!(store.expunge("INBOX", &[1]).await.is_err());
    }

    #[tokio::test]
    async fn nothing_is_restored_after_bye() {
        let mock = login(&mut Builder::new(), "")
            .write(b"A0001 SELECT INBOX\r\n")
            .read(b"A0001 OK [READ-WRITE] done\r\n")
            .write(b"A0002 UID STORE 1 +FLAGS.SILENT (\\Deleted)\r\n")
            .read(b"A0002 OK done\r\n")
            .write(b"A0003 UID SEARCH DELETED\r\n")
            .read(b"* SEARCH 1 2\r\nA0003 OK done\r\n")
            .write(b"A0004 UID STORE 2 -FLAGS.SILENT (\\Deleted)\r\n")
            .read(b"A0004 OK done\r\n")
            .write(b"A0005 EXPUNGE\r\n")
            .read(b"* BYE shutting down\r\n")
            .build();
        let store = resolved_store(mock).await;

        assert!(store.expunge("INBOX", &[1]).await.is_err());
    }
}
