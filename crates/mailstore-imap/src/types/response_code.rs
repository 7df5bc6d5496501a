//! Response codes.

use super::{Capability, Flag, SeqNum, Uid, UidValidity};

/// Bracketed response code carried by OK/NO/BAD/BYE responses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseCode {
    /// ALERT: must be shown to the user.
    Alert,
    /// CAPABILITY list sent with the greeting or LOGIN completion.
    Capability(Vec<Capability>),
    /// PARSE: the server failed to parse a message.
    Parse,
    /// PERMANENTFLAGS: flags the client can change permanently.
    PermanentFlags(Vec<Flag>),
    /// READ-ONLY: mailbox selected read-only.
    ReadOnly,
    /// READ-WRITE: mailbox selected read-write.
    ReadWrite,
    /// TRYCREATE: target mailbox does not exist but could be created.
    TryCreate,
    /// UIDNEXT
    UidNext(Uid),
    /// UIDVALIDITY
    UidValidity(UidValidity),
    /// UNSEEN: first unseen sequence number.
    Unseen(SeqNum),
    /// APPENDUID (RFC 4315): UIDs assigned to appended messages.
    AppendUid {
        /// UIDVALIDITY of the destination mailbox.
        uidvalidity: UidValidity,
        /// Assigned UIDs, expanded from the uid-set.
        uids: Vec<Uid>,
    },
    /// COPYUID (RFC 4315): source to destination UID mapping.
    CopyUid {
        /// UIDVALIDITY of the destination mailbox.
        uidvalidity: UidValidity,
        /// Source UIDs.
        source_uids: Vec<Uid>,
        /// Destination UIDs, positionally matching `source_uids`.
        dest_uids: Vec<Uid>,
    },
    /// OVERQUOTA (RFC 5530)
    OverQuota,
    /// NONEXISTENT (RFC 5530)
    NonExistent,
    /// ALREADYEXISTS (RFC 5530)
    AlreadyExists,
    /// NOPERM (RFC 5530)
    NoPerm,
    /// Anything else, kept verbatim.
    Unknown(String),
}
