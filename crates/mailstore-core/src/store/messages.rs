//! [`MessageStore`] for [`ImapStore`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use mailstore_imap::{
    AccessMode, Capability, Command, Connection, Flag, Mailbox, MailboxStatus, ResponseCode,
    Responses, Right, SearchCriteria, SequenceSet, ThreadNode, UntaggedResponse,
};
use tokio::io::{AsyncRead, AsyncWrite};

use super::{FolderStore, ImapStore, MessageStore, flag_right, search_results};
use crate::error::{Error, ErrorKind, RequiredRight, Result};
use crate::model::{ColorLabel, DefaultSlot, MessageData, MessageField, is_within};
use crate::sort::{SortDirection, SortField, order_by_uids, sort_messages};

/// Header prepended to the first appended message so it can be found
/// again when the server does not report APPENDUID.
pub const APPEND_MARKER_HEADER: &str = "X-Mailstore-Append-Marker";

static MARKER_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_marker() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_nanos());
    let n = MARKER_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{nanos:x}.{n}")
}

#[async_trait]
impl<S> MessageStore for ImapStore<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn get_messages(
        &self,
        folder: &str,
        uids: &[u32],
        fields: &[MessageField],
    ) -> Result<Vec<MessageData>> {
        if uids.is_empty() {
            return Ok(Vec::new());
        }
        let result = async {
            let mut conn = self.lock().await?;
            self.select_in(&mut conn, folder, AccessMode::ReadOnly)
                .await?;
            let messages = self.fetch_blocks_in(&mut conn, folder, uids, true, fields).await?;
            Ok(order_by_uids(messages, uids))
        }
        .await;
        self.finish(result)
    }

    async fn get_messages_by_sequence(
        &self,
        folder: &str,
        sequences: &[u32],
        fields: &[MessageField],
    ) -> Result<Vec<MessageData>> {
        if sequences.is_empty() {
            return Ok(Vec::new());
        }
        let result = async {
            let mut conn = self.lock().await?;
            self.select_in(&mut conn, folder, AccessMode::ReadOnly)
                .await?;
            let messages = self
                .fetch_blocks_in(&mut conn, folder, sequences, false, fields)
                .await?;
            let mut by_sequence: HashMap<u32, MessageData> =
                messages.into_iter().map(|m| (m.sequence, m)).collect();
            Ok(sequences
                .iter()
                .filter_map(|seq| by_sequence.remove(seq))
                .collect())
        }
        .await;
        self.finish(result)
    }

    async fn search(
        &self,
        folder: &str,
        term: Option<&SearchCriteria>,
        sort: Option<(SortField, SortDirection)>,
        fields: &[MessageField],
    ) -> Result<Vec<MessageData>> {
        let result = async {
            let criterion = sort
                .map(|(field, direction)| field.criterion(direction))
                .transpose()?;
            if criterion.is_some() && !self.has(&Capability::Sort) {
                return Err(Error::new(ErrorKind::CapabilityUnsupported {
                    capability: "SORT".to_string(),
                }));
            }

            let mut conn = self.lock().await?;
            self.select_in(&mut conn, folder, AccessMode::ReadOnly)
                .await?;
            let search = term.cloned().unwrap_or(SearchCriteria::All);
            let uids = if let Some(criterion) = criterion {
                let responses = conn
                    .execute(&Command::Sort {
                        criteria: vec![criterion],
                        search,
                        uid: true,
                    })
                    .await?;
                search_results(&responses)
            } else {
                let mut uids = self.uid_search_in(&mut conn, search).await?;
                uids.sort_unstable();
                uids
            };
            tracing::debug!(folder, hits = uids.len(), sorted = sort.is_some(), "search");

            if uids.is_empty() {
                return Ok(Vec::new());
            }
            let messages = self
                .fetch_blocks_in(&mut conn, folder, &uids, true, fields)
                .await?;
            Ok(order_by_uids(messages, &uids))
        }
        .await;
        self.finish(result)
    }

    async fn thread_sort(
        &self,
        folder: &str,
        term: Option<&SearchCriteria>,
    ) -> Result<Vec<ThreadNode>> {
        let result = async {
            if !self.session.capabilities().has_thread("REFERENCES") {
                return Err(Error::new(ErrorKind::CapabilityUnsupported {
                    capability: "THREAD=REFERENCES".to_string(),
                }));
            }
            let mut conn = self.lock().await?;
            self.select_in(&mut conn, folder, AccessMode::ReadOnly)
                .await?;
            let responses = conn
                .execute(&Command::Thread {
                    algorithm: "REFERENCES".to_string(),
                    search: term.cloned().unwrap_or(SearchCriteria::All),
                    uid: true,
                })
                .await?;
            Ok(responses
                .cursor()
                .extract(|r| match r {
                    UntaggedResponse::Thread(threads) => Some(threads.clone()),
                    _ => None,
                })
                .flatten()
                .collect())
        }
        .await;
        self.finish(result)
    }

    async fn update_flags(
        &self,
        folder: &str,
        uids: &[u32],
        flags: &[Flag],
        set: bool,
    ) -> Result<()> {
        if uids.is_empty() || flags.is_empty() {
            return Ok(());
        }
        let result = async {
            let mut conn = self.lock().await?;
            let status = self
                .select_in(&mut conn, folder, AccessMode::ReadWrite)
                .await?;
            self.check_flags_in(&mut conn, folder, &status, flags)
                .await?;
            self.store_flags_in(&mut conn, uids, flags, set).await
        }
        .await;
        self.finish(result)
    }

    async fn update_color_label(
        &self,
        folder: &str,
        uids: &[u32],
        label: ColorLabel,
    ) -> Result<()> {
        if uids.is_empty() {
            return Ok(());
        }
        let result = async {
            let mut conn = self.lock().await?;
            let status = self
                .select_in(&mut conn, folder, AccessMode::ReadWrite)
                .await?;
            self.check_flags_in(&mut conn, folder, &status, &[label.flag()])
                .await?;
            self.store_flags_in(&mut conn, uids, &ColorLabel::all_flags(), false)
                .await?;
            self.store_flags_in(&mut conn, uids, &[label.flag()], true)
                .await
        }
        .await;
        self.finish(result)
    }

    async fn copy_messages(
        &self,
        source: &str,
        destination: &str,
        uids: &[u32],
    ) -> Result<Vec<Option<u32>>> {
        let result = async {
            let mut conn = self.lock().await?;
            self.copy_in(&mut conn, source, destination, uids).await
        }
        .await;
        self.finish(result)
    }

    async fn move_messages(
        &self,
        source: &str,
        destination: &str,
        uids: &[u32],
    ) -> Result<Vec<Option<u32>>> {
        let result = async {
            let mut conn = self.lock().await?;
            self.move_in(&mut conn, source, destination, uids).await
        }
        .await;
        self.finish(result)
    }

    async fn append_messages(&self, folder: &str, messages: &[Vec<u8>]) -> Result<Vec<u32>> {
        let result = async {
            let mut conn = self.lock().await?;
            self.append_in(&mut conn, folder, messages, &[], &next_marker())
                .await
        }
        .await;
        self.finish(result)
    }

    async fn expunge(&self, folder: &str, uids: &[u32]) -> Result<()> {
        if uids.is_empty() {
            return Ok(());
        }
        let result = async {
            let mut conn = self.lock().await?;
            self.delete_hard_messages_in(&mut conn, folder, uids).await
        }
        .await;
        self.finish(result)
    }

    async fn delete_messages(&self, folder: &str, uids: &[u32], hard: bool) -> Result<()> {
        if uids.is_empty() {
            return Ok(());
        }
        let result = async {
            let trash = if hard {
                None
            } else {
                Some(self.default_folder(DefaultSlot::Trash).await?)
            };
            let mut conn = self.lock().await?;
            let separator = self.separator_in(&mut conn).await?;
            match trash {
                Some(trash) if !is_within(folder, &trash, Some(separator)) => {
                    self.move_in(&mut conn, folder, &trash, uids).await.map(drop)
                }
                _ => self.delete_hard_messages_in(&mut conn, folder, uids).await,
            }
        }
        .await;
        self.finish(result)
    }

    async fn unread_messages(
        &self,
        folder: &str,
        fields: &[MessageField],
    ) -> Result<Vec<MessageData>> {
        let result = async {
            let mut conn = self.lock().await?;
            self.select_in(&mut conn, folder, AccessMode::ReadOnly)
                .await?;
            let responses = conn
                .execute(&Command::Search {
                    criteria: SearchCriteria::Unseen,
                    uid: false,
                })
                .await?;
            let sequences = search_results(&responses);
            if sequences.is_empty() {
                return Ok(Vec::new());
            }
            let mut fields = fields.to_vec();
            if !fields.contains(&MessageField::ReceivedDate) {
                fields.push(MessageField::ReceivedDate);
            }
            let mut messages = self
                .fetch_blocks_in(&mut conn, folder, &sequences, false, &fields)
                .await?;
            sort_messages(&mut messages, SortField::ReceivedDate, SortDirection::Descending);
            Ok(messages)
        }
        .await;
        self.finish(result)
    }

    async fn save_draft(&self, raw: &[u8], replace: Option<u32>) -> Result<u32> {
        let result = async {
            let drafts = self.default_folder(DefaultSlot::Drafts).await?;
            let mut conn = self.lock().await?;
            let uids = self
                .append_in(
                    &mut conn,
                    &drafts,
                    &[raw.to_vec()],
                    &[Flag::Draft, Flag::Seen],
                    &next_marker(),
                )
                .await?;
            let uid = uids.first().copied().ok_or_else(|| {
                Error::new(ErrorKind::Parse {
                    message: format!("no UID for draft appended to {drafts}"),
                })
            })?;
            if let Some(old) = replace {
                self.delete_hard_messages_in(&mut conn, &drafts, &[old])
                    .await?;
            }
            tracing::debug!(folder = %drafts, uid, replaced = ?replace, "draft saved");
            Ok(uid)
        }
        .await;
        self.finish(result)
    }

    async fn uids_to_sequence(&self, folder: &str, uids: &[u32]) -> Result<Vec<u32>> {
        if uids.is_empty() {
            return Ok(Vec::new());
        }
        let result = async {
            let mut conn = self.lock().await?;
            self.select_in(&mut conn, folder, AccessMode::ReadOnly)
                .await?;
            let pairs: HashMap<u32, u32> = self
                .fetch_blocks_in(&mut conn, folder, uids, true, &[])
                .await?
                .into_iter()
                .map(|m| (m.uid, m.sequence))
                .collect();
            Ok(uids.iter().filter_map(|uid| pairs.get(uid).copied()).collect())
        }
        .await;
        self.finish(result)
    }

    async fn sequence_to_uids(&self, folder: &str, sequences: &[u32]) -> Result<Vec<u32>> {
        if sequences.is_empty() {
            return Ok(Vec::new());
        }
        let result = async {
            let mut conn = self.lock().await?;
            self.select_in(&mut conn, folder, AccessMode::ReadOnly)
                .await?;
            let pairs: HashMap<u32, u32> = self
                .fetch_blocks_in(&mut conn, folder, sequences, false, &[])
                .await?
                .into_iter()
                .map(|m| (m.sequence, m.uid))
                .collect();
            Ok(sequences
                .iter()
                .filter_map(|seq| pairs.get(seq).copied())
                .collect())
        }
        .await;
        self.finish(result)
    }
}

impl<S> ImapStore<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// FETCH in blocks on the selected folder.
    async fn fetch_blocks_in(
        &self,
        conn: &mut Connection<S>,
        folder: &str,
        ids: &[u32],
        uid: bool,
        fields: &[MessageField],
    ) -> Result<Vec<MessageData>> {
        let mut messages = Vec::with_capacity(ids.len());
        for sequence in self.uid_blocks(ids) {
            messages.extend(self.fetch_in(conn, folder, sequence, uid, fields).await?);
        }
        Ok(messages)
    }

    /// Rights and PERMANENTFLAGS checks before changing `flags`.
    async fn check_flags_in(
        &self,
        conn: &mut Connection<S>,
        folder: &str,
        status: &MailboxStatus,
        flags: &[Flag],
    ) -> Result<()> {
        for flag in flags {
            let (right, required) = flag_right(flag);
            self.require_right_in(conn, folder, right, required).await?;
            if matches!(flag, Flag::Keyword(_)) && !status.allows_user_flags() {
                return Err(Error::new(ErrorKind::OperationNotSupported {
                    command: "STORE".to_string(),
                    text: format!("{folder} does not store keyword {}", flag.as_str()),
                })
                .in_folder(folder));
            }
        }
        Ok(())
    }

    /// Flags `uids` `\Deleted` and expunges exactly them.
    async fn delete_hard_messages_in(
        &self,
        conn: &mut Connection<S>,
        folder: &str,
        uids: &[u32],
    ) -> Result<()> {
        self.select_in(conn, folder, AccessMode::ReadWrite).await?;
        self.require_right_in(conn, folder, Right::DeleteMessages, RequiredRight::Delete)
            .await?;
        self.require_right_in(conn, folder, Right::Expunge, RequiredRight::Delete)
            .await?;
        self.store_flags_in(conn, uids, &[Flag::Deleted], true)
            .await?;
        self.expunge_in(conn, folder, uids).await
    }

    /// UID COPY in blocks. Destination UIDs in input order, where reported.
    async fn copy_in(
        &self,
        conn: &mut Connection<S>,
        source: &str,
        destination: &str,
        uids: &[u32],
    ) -> Result<Vec<Option<u32>>> {
        if uids.is_empty() {
            return Ok(Vec::new());
        }
        self.require_entry_in(conn, destination).await?;
        self.require_right_in(conn, destination, Right::Insert, RequiredRight::Insert)
            .await?;
        self.select_in(conn, source, AccessMode::ReadOnly).await?;

        let mut mapping = HashMap::new();
        for sequence in self.uid_blocks(uids) {
            let responses = conn
                .execute(&Command::Copy {
                    sequence,
                    mailbox: Mailbox::new(destination),
                    uid: true,
                })
                .await
                .map_err(|e| Error::from(e).in_folder(destination))?;
            collect_copy_uids(&responses, &mut mapping);
        }
        tracing::debug!(source, destination, count = uids.len(), "messages copied");
        Ok(uids.iter().map(|uid| mapping.get(uid).copied()).collect())
    }

    /// UID MOVE when supported, otherwise copy, flag and expunge.
    pub(crate) async fn move_in(
        &self,
        conn: &mut Connection<S>,
        source: &str,
        destination: &str,
        uids: &[u32],
    ) -> Result<Vec<Option<u32>>> {
        if uids.is_empty() {
            return Ok(Vec::new());
        }
        self.select_in(conn, source, AccessMode::ReadWrite).await?;
        self.require_right_in(conn, source, Right::DeleteMessages, RequiredRight::Delete)
            .await?;

        if !self.has(&Capability::Move) {
            let mapping = self.copy_in(conn, source, destination, uids).await?;
            self.delete_hard_messages_in(conn, source, uids).await?;
            return Ok(mapping);
        }

        self.require_entry_in(conn, destination).await?;
        self.require_right_in(conn, destination, Right::Insert, RequiredRight::Insert)
            .await?;
        let mut mapping = HashMap::new();
        for sequence in self.uid_blocks(uids) {
            let responses = conn
                .execute(&Command::Move {
                    sequence,
                    mailbox: Mailbox::new(destination),
                    uid: true,
                })
                .await
                .map_err(|e| Error::from(e).in_folder(destination))?;
            collect_copy_uids(&responses, &mut mapping);
        }
        tracing::debug!(source, destination, count = uids.len(), "messages moved");
        Ok(uids.iter().map(|uid| mapping.get(uid).copied()).collect())
    }

    /// APPENDs `messages` and returns their UIDs. The first message carries
    /// `marker` in [`APPEND_MARKER_HEADER`].
    async fn append_in(
        &self,
        conn: &mut Connection<S>,
        folder: &str,
        messages: &[Vec<u8>],
        flags: &[Flag],
        marker: &str,
    ) -> Result<Vec<u32>> {
        if messages.is_empty() {
            return Ok(Vec::new());
        }
        self.require_entry_in(conn, folder).await?;
        self.require_right_in(conn, folder, Right::Insert, RequiredRight::Insert)
            .await?;

        let mut uids = Vec::with_capacity(messages.len());
        let mut reported = true;
        for (i, message) in messages.iter().enumerate() {
            let data = if i == 0 {
                let mut data = format!("{APPEND_MARKER_HEADER}: {marker}\r\n").into_bytes();
                data.extend_from_slice(message);
                data
            } else {
                message.clone()
            };
            let responses = conn
                .execute(&Command::Append {
                    mailbox: Mailbox::new(folder),
                    flags: flags.to_vec(),
                    message: data,
                })
                .await
                .map_err(|e| Error::from(e).in_folder(folder))?;
            match append_uid(&responses) {
                Some(uid) => uids.push(uid),
                None => reported = false,
            }
        }

        if reported {
            return Ok(uids);
        }
        tracing::debug!(folder, marker, "no APPENDUID, searching for marker");
        self.find_appended_in(conn, folder, messages.len(), marker)
            .await
    }

    /// UIDs of `count` messages appended after the one carrying `marker`.
    async fn find_appended_in(
        &self,
        conn: &mut Connection<S>,
        folder: &str,
        count: usize,
        marker: &str,
    ) -> Result<Vec<u32>> {
        // A stale selection does not see the new messages.
        if conn
            .selected()
            .is_some_and(|s| s.mailbox.as_str() == folder)
        {
            conn.unselect().await?;
        }
        self.select_in(conn, folder, AccessMode::ReadOnly).await?;

        let not_found = || {
            Error::new(ErrorKind::Parse {
                message: format!("appended message not found in {folder}"),
            })
            .in_folder(folder)
        };
        let first = self
            .uid_search_in(
                conn,
                SearchCriteria::Header(APPEND_MARKER_HEADER.to_string(), marker.to_string()),
            )
            .await?
            .into_iter()
            .min()
            .ok_or_else(not_found)?;
        let range = SequenceSet::range_from(first).ok_or_else(not_found)?;
        let mut uids = self.uid_search_in(conn, SearchCriteria::Uid(range)).await?;
        uids.retain(|uid| *uid >= first);
        uids.sort_unstable();
        uids.truncate(count);
        Ok(uids)
    }
}

fn append_uid(responses: &Responses) -> Option<u32> {
    responses.codes().find_map(|code| match code {
        ResponseCode::AppendUid { uids, .. } => uids.first().map(|uid| uid.get()),
        _ => None,
    })
}

fn collect_copy_uids(responses: &Responses, mapping: &mut HashMap<u32, u32>) {
    for code in responses.codes() {
        if let ResponseCode::CopyUid {
            source_uids,
            dest_uids,
            ..
        } = code
        {
            mapping.extend(
                source_uids
                    .iter()
                    .zip(dest_uids)
                    .map(|(source, dest)| (source.get(), dest.get())),
            );
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::store::test_support::{GREETING, login, resolved_store};
    use mailstore_imap::Flags;
    use proptest::prelude::*;
    use tokio_test::io::Builder;

    const COLOR_FLAGS: &str =
        "($cl_0 $cl_1 $cl_2 $cl_3 $cl_4 $cl_5 $cl_6 $cl_7 $cl_8 $cl_9 $cl_10)";

    #[tokio::test]
    async fn messages_follow_requested_uid_order() {
        let mock = login(&mut Builder::new(), "")
            .write(b"A0001 EXAMINE INBOX\r\n")
            .read(b"A0001 OK [READ-ONLY] done\r\n")
            .write(b"A0002 UID FETCH 3,7,99 (UID FLAGS)\r\n")
            .read(b"* 1 FETCH (UID 3 FLAGS (\\Seen))\r\n")
            .read(b"* 2 FETCH (UID 7 FLAGS ($cl_4))\r\n")
            .read(b"A0002 OK done\r\n")
            .build();
        let store = resolved_store(mock).await;

        let messages = store
            .get_messages("INBOX", &[7, 3, 99], &[MessageField::Flags])
            .await
            .unwrap();
        let uids: Vec<u32> = messages.iter().map(|m| m.uid).collect();
        assert_eq!(uids, [7, 3]);
        assert_eq!(messages[0].color_label, ColorLabel::new(4));
        assert!(messages[1].is_seen());
    }

    #[tokio::test]
    async fn empty_uid_list_sends_nothing() {
        let mock = login(&mut Builder::new(), "").build();
        let store = resolved_store(mock).await;
        assert!(store.get_messages("INBOX", &[], &[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn search_without_sort_capability_fails() {
        let mock = login(&mut Builder::new(), "").build();
        let store = resolved_store(mock).await;

        let err = store
            .search(
                "INBOX",
                None,
                Some((SortField::Subject, SortDirection::Ascending)),
                &[],
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err.kind(),
            ErrorKind::CapabilityUnsupported { capability } if capability == "SORT"
        ));
    }

    #[tokio::test]
    async fn search_by_color_label_is_not_sortable() {
        let mock = login(&mut Builder::new(), "SORT").build();
        let store = resolved_store(mock).await;

        let err = store
            .search(
                "INBOX",
                None,
                Some((SortField::ColorLabel, SortDirection::Ascending)),
                &[],
            )
            .await
            .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::UnsupportedSortField { .. }));
    }

    #[tokio::test]
    async fn server_sort_order_is_kept() {
        let mock = login(&mut Builder::new(), "SORT")
            .write(b"A0001 EXAMINE INBOX\r\n")
            .read(b"A0001 OK [READ-ONLY] done\r\n")
            .write(b"A0002 UID SORT (REVERSE ARRIVAL) UTF-8 UNSEEN\r\n")
            .read(b"* SORT 9 2 5\r\nA0002 OK done\r\n")
            .write(b"A0003 UID FETCH 2,5,9 (UID)\r\n")
            .read(b"* 1 FETCH (UID 2)\r\n* 2 FETCH (UID 5)\r\n* 3 FETCH (UID 9)\r\n")
            .read(b"A0003 OK done\r\n")
            .build();
        let store = resolved_store(mock).await;

        let messages = store
            .search(
                "INBOX",
                Some(&SearchCriteria::Unseen),
                Some((SortField::ReceivedDate, SortDirection::Descending)),
                &[],
            )
            .await
            .unwrap();
        let uids: Vec<u32> = messages.iter().map(|m| m.uid).collect();
        assert_eq!(uids, [9, 2, 5]);
    }

    #[tokio::test]
    async fn thread_sort_requires_references() {
        let mock = login(&mut Builder::new(), "THREAD=ORDEREDSUBJECT").build();
        let store = resolved_store(mock).await;

        let err = store.thread_sort("INBOX", None).await.unwrap_err();
        assert!(matches!(
            err.kind(),
            ErrorKind::CapabilityUnsupported { capability } if capability == "THREAD=REFERENCES"
        ));
    }

    #[tokio::test]
    async fn color_label_clears_then_sets() {
        let clear = format!("A0002 UID STORE 4 -FLAGS.SILENT {COLOR_FLAGS}\r\n");
        let mock = login(&mut Builder::new(), "")
            .write(b"A0001 SELECT INBOX\r\n")
            .read(b"* OK [PERMANENTFLAGS (\\Seen \\Deleted \\*)] ok\r\n")
            .read(b"A0001 OK [READ-WRITE] done\r\n")
            .write(clear.as_bytes())
            .read(b"A0002 OK done\r\n")
            .write(b"A0003 UID STORE 4 +FLAGS.SILENT ($cl_2)\r\n")
            .read(b"A0003 OK done\r\n")
            .build();
        let store = resolved_store(mock).await;

        store
            .update_color_label("INBOX", &[4], ColorLabel::new(2).unwrap())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn keywords_need_permanent_flags() {
        let mock = login(&mut Builder::new(), "")
            .write(b"A0001 SELECT INBOX\r\n")
            .read(b"* OK [PERMANENTFLAGS (\\Seen \\Deleted)] ok\r\n")
            .read(b"A0001 OK [READ-WRITE] done\r\n")
            .build();
        let store = resolved_store(mock).await;

        let err = store
            .update_flags("INBOX", &[1], &[Flag::Keyword("$Todo".to_string())], true)
            .await
            .unwrap_err();
        assert!(matches!(
            err.kind(),
            ErrorKind::OperationNotSupported { command, .. } if command == "STORE"
        ));
    }

    #[tokio::test]
    async fn seen_needs_keep_seen_right() {
        let mock = login(&mut Builder::new(), "ACL")
            .write(b"A0001 SELECT Shared\r\n")
            .read(b"A0001 OK [READ-WRITE] done\r\n")
            .write(b"A0002 MYRIGHTS Shared\r\n")
            .read(b"* MYRIGHTS Shared lrw\r\nA0002 OK done\r\n")
            .build();
        let store = resolved_store(mock).await;

        let err = store
            .update_flags("Shared", &[1], &[Flag::Seen], true)
            .await
            .unwrap_err();
        assert!(matches!(
            err.kind(),
            ErrorKind::InsufficientRights {
                right: RequiredRight::KeepSeen,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn copy_maps_destination_uids() {
        let mock = login(&mut Builder::new(), "UIDPLUS")
            .write(b"A0001 LIST \"\" Archive\r\n")
            .read(b"* LIST () \"/\" Archive\r\nA0001 OK done\r\n")
            .write(b"A0002 EXAMINE INBOX\r\n")
            .read(b"A0002 OK [READ-ONLY] done\r\n")
            .write(b"A0003 UID COPY 3:4 Archive\r\n")
            .read(b"A0003 OK [COPYUID 9 3:4 101:102] done\r\n")
            .build();
        let store = resolved_store(mock).await;

        let mapped = store
            .copy_messages("INBOX", "Archive", &[4, 3])
            .await
            .unwrap();
        assert_eq!(mapped, [Some(102), Some(101)]);
    }

    #[tokio::test]
    async fn move_uses_uid_move() {
        let mock = login(&mut Builder::new(), "MOVE UIDPLUS")
            .write(b"A0001 SELECT INBOX\r\n")
            .read(b"A0001 OK [READ-WRITE] done\r\n")
            .write(b"A0002 LIST \"\" Archive\r\n")
            .read(b"* LIST () \"/\" Archive\r\nA0002 OK done\r\n")
            .write(b"A0003 UID MOVE 8 Archive\r\n")
            .read(b"* OK [COPYUID 9 8 55] moved\r\n* 1 EXPUNGE\r\nA0003 OK done\r\n")
            .build();
        let store = resolved_store(mock).await;

        let mapped = store
            .move_messages("INBOX", "Archive", &[8])
            .await
            .unwrap();
        assert_eq!(mapped, [Some(55)]);
    }

    #[tokio::test]
    async fn move_without_capability_copies_and_expunges() {
        let mock = login(&mut Builder::new(), "UIDPLUS")
            .write(b"A0001 SELECT INBOX\r\n")
            .read(b"A0001 OK [READ-WRITE] done\r\n")
            .write(b"A0002 LIST \"\" Archive\r\n")
            .read(b"* LIST () \"/\" Archive\r\nA0002 OK done\r\n")
            .write(b"A0003 UID COPY 8 Archive\r\n")
            .read(b"A0003 OK done\r\n")
            .write(b"A0004 UID STORE 8 +FLAGS.SILENT (\\Deleted)\r\n")
            .read(b"A0004 OK done\r\n")
            .write(b"A0005 UID EXPUNGE 8\r\n")
            .read(b"A0005 OK done\r\n")
            .build();
        let store = resolved_store(mock).await;

        let mapped = store
            .move_messages("INBOX", "Archive", &[8])
            .await
            .unwrap();
        assert_eq!(mapped, [None]);
    }

    #[tokio::test]
    async fn append_reports_appenduid() {
        let mock = login(&mut Builder::new(), "UIDPLUS")
            .write(b"A0001 LIST \"\" Sent\r\n")
            .read(b"* LIST () \"/\" Sent\r\nA0001 OK done\r\n")
            .write(b"A0002 APPEND Sent {35}\r\n")
            .read(b"+ go\r\n")
            .write(b"X-Mailstore-Append-Marker: m1\r\nHi\r\n\r\n")
            .read(b"A0002 OK [APPENDUID 9 41] done\r\n")
            .build();
        let store = resolved_store(mock).await;

        let mut conn = store.lock().await.unwrap();
        let uids = store
            .append_in(&mut conn, "Sent", &[b"Hi\r\n".to_vec()], &[], "m1")
            .await
            .unwrap();
        assert_eq!(uids, [41]);
    }

    #[tokio::test]
    async fn append_without_appenduid_searches_marker() {
        let mock = login(&mut Builder::new(), "")
            .write(b"A0001 LIST \"\" Sent\r\n")
            .read(b"* LIST () \"/\" Sent\r\nA0001 OK done\r\n")
            .write(b"A0002 APPEND Sent {35}\r\n")
            .read(b"+ go\r\n")
            .write(b"X-Mailstore-Append-Marker: m1\r\nHi\r\n\r\n")
            .read(b"A0002 OK done\r\n")
            .write(b"A0003 APPEND Sent {4}\r\n")
            .read(b"+ go\r\n")
            .write(b"Yo\r\n\r\n")
            .read(b"A0003 OK done\r\n")
            .write(b"A0004 EXAMINE Sent\r\n")
            .read(b"A0004 OK [READ-ONLY] done\r\n")
            .write(b"A0005 UID SEARCH HEADER X-Mailstore-Append-Marker m1\r\n")
            .read(b"* SEARCH 12\r\nA0005 OK done\r\n")
            .write(b"A0006 UID SEARCH UID 12:*\r\n")
            .read(b"* SEARCH 14 12 13\r\nA0006 OK done\r\n")
            .build();
        let store = resolved_store(mock).await;

        let mut conn = store.lock().await.unwrap();
        let uids = store
            .append_in(
                &mut conn,
                "Sent",
                &[b"Hi\r\n".to_vec(), b"Yo\r\n".to_vec()],
                &[],
                "m1",
            )
            .await
            .unwrap();
        assert_eq!(uids, [12, 13]);
    }

    #[tokio::test]
    async fn soft_delete_moves_to_trash() {
        let mock = login(&mut Builder::new(), "MOVE")
            .write(b"A0001 LIST \"\" Trash\r\n")
            .read(b"* LIST () \"/\" Trash\r\nA0001 OK done\r\n")
            .write(b"A0002 SELECT INBOX\r\n")
            .read(b"A0002 OK [READ-WRITE] done\r\n")
            .write(b"A0003 UID MOVE 6 Trash\r\n")
            .read(b"A0003 OK done\r\n")
            .build();
        let store = resolved_store(mock).await;

        store.delete_messages("INBOX", &[6], false).await.unwrap();
    }

    #[tokio::test]
    async fn unread_messages_newest_first() {
        let mock = login(&mut Builder::new(), "")
            .write(b"A0001 EXAMINE INBOX\r\n")
            .read(b"A0001 OK [READ-ONLY] done\r\n")
            .write(b"A0002 SEARCH UNSEEN\r\n")
            .read(b"* SEARCH 1 2\r\nA0002 OK done\r\n")
            .write(b"A0003 FETCH 1:2 (UID INTERNALDATE)\r\n")
            .read(b"* 1 FETCH (UID 10 INTERNALDATE \"01-Jan-2024 10:00:00 +0000\")\r\n")
            .read(b"* 2 FETCH (UID 11 INTERNALDATE \"02-Jan-2024 10:00:00 +0000\")\r\n")
            .read(b"A0003 OK done\r\n")
            .build();
        let store = resolved_store(mock).await;

        let messages = store.unread_messages("INBOX", &[]).await.unwrap();
        let uids: Vec<u32> = messages.iter().map(|m| m.uid).collect();
        assert_eq!(uids, [11, 10]);
    }

    #[tokio::test]
    async fn uid_sequence_mapping_round_trips() {
        let mock = login(&mut Builder::new(), "")
            .write(b"A0001 EXAMINE INBOX\r\n")
            .read(b"A0001 OK [READ-ONLY] done\r\n")
            .write(b"A0002 UID FETCH 20,30 (UID)\r\n")
            .read(b"* 2 FETCH (UID 20)\r\n* 3 FETCH (UID 30)\r\nA0002 OK done\r\n")
            .write(b"A0003 FETCH 2:3 (UID)\r\n")
            .read(b"* 2 FETCH (UID 20)\r\n* 3 FETCH (UID 30)\r\nA0003 OK done\r\n")
            .build();
        let store = resolved_store(mock).await;

        let sequences = store.uids_to_sequence("INBOX", &[30, 20]).await.unwrap();
        assert_eq!(sequences, [3, 2]);
        let uids = store.sequence_to_uids("INBOX", &sequences).await.unwrap();
        assert_eq!(uids, [30, 20]);
    }

    /// Minimal peer holding the flags of UID 4 in INBOX. Applies every
    /// `UID STORE` it receives and answers the rest with OK.
    async fn flag_server(stream: tokio::io::DuplexStream, flags: Arc<Mutex<Flags>>) {
        use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

        let (read, mut write) = tokio::io::split(stream);
        let mut lines = BufReader::new(read).lines();
        if write.write_all(GREETING).await.is_err() {
            return;
        }
        while let Ok(Some(line)) = lines.next_line().await {
            let Some((tag, rest)) = line.split_once(' ') else {
                return;
            };
            let mut reply = String::new();
            if rest.starts_with("LOGIN") {
                reply.push_str(&format!("{tag} OK [CAPABILITY IMAP4rev1] logged in\r\n"));
                if write.write_all(reply.as_bytes()).await.is_err() {
                    return;
                }
                continue;
            }
            if rest.starts_with("SELECT") {
                reply.push_str("* OK [PERMANENTFLAGS (\\Seen \\Deleted \\*)] ok\r\n");
            } else if let Some(action) = rest.strip_prefix("UID STORE 4 ") {
                let (op, list) = action.split_once(' ').unwrap();
                let list = list.trim_start_matches('(').trim_end_matches(')');
                let mut flags = flags.lock().unwrap();
                for flag in list.split_whitespace().map(Flag::parse) {
                    if op.starts_with('+') {
                        flags.insert(flag);
                    } else {
                        flags.remove(&flag);
                    }
                }
            }
            reply.push_str(&format!("{tag} OK done\r\n"));
            if write.write_all(reply.as_bytes()).await.is_err() {
                return;
            }
        }
    }

    async fn relabel_twice(initial: Flags, label: ColorLabel) -> (Flags, Flags) {
        let (client, server) = tokio::io::duplex(4096);
        let flags = Arc::new(Mutex::new(initial));
        tokio::spawn(flag_server(server, flags.clone()));

        let config = mailstore_imap::Config::new("imap.example.com")
            .with_security(mailstore_imap::Security::None);
        let session = mailstore_imap::Session::from_stream(client, &config, "user", "pass")
            .await
            .unwrap();
        let store = ImapStore::new(session, crate::config::StoreConfig::default());

        store.update_color_label("INBOX", &[4], label).await.unwrap();
        let once = flags.lock().unwrap().clone();
        store.update_color_label("INBOX", &[4], label).await.unwrap();
        let twice = flags.lock().unwrap().clone();
        (once, twice)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]
        #[test]
        fn color_label_update_is_idempotent(
            existing in proptest::collection::vec(0u8..=10, 0..4),
            seen in any::<bool>(),
            label in 0u8..=10,
        ) {
            let mut flags = Flags::from_vec(
                existing
                    .into_iter()
                    .filter_map(ColorLabel::new)
                    .map(ColorLabel::flag)
                    .collect(),
            );
            if seen {
                flags.insert(Flag::Seen);
            }
            let label = ColorLabel::new(label).unwrap();
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            let (once, twice) = runtime.block_on(relabel_twice(flags, label));
            prop_assert_eq!(&once, &twice);
            prop_assert_eq!(ColorLabel::from_flags(&once), Some(label));
            prop_assert_eq!(once.is_seen(), seen);
        }
    }
}
