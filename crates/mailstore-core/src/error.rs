//! Error types for the storage layer.
//!
//! An [`Error`] pairs an [`ErrorKind`], which identifies the failure and
//! carries its structured fields, with an [`ErrorContext`] naming where it
//! happened. Callers match on the kind; `Display` renders both.

use std::fmt;
use std::time::Duration;

use mailstore_imap::ResponseCode;
use thiserror::Error;

/// A right an operation needs on a folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequiredRight {
    /// See the folder.
    Lookup,
    /// Read messages.
    Read,
    /// Change flags other than `\Seen` and `\Deleted`.
    Write,
    /// Set or clear `\Deleted`, expunge.
    Delete,
    /// Append or copy messages into the folder.
    Insert,
    /// Create subfolders.
    Create,
    /// Change the folder's ACL.
    Administer,
    /// Persist `\Seen`.
    KeepSeen,
}

impl fmt::Display for RequiredRight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Lookup => "lookup",
            Self::Read => "read",
            Self::Write => "write",
            Self::Delete => "delete",
            Self::Insert => "insert",
            Self::Create => "create",
            Self::Administer => "administer",
            Self::KeepSeen => "keep-seen",
        })
    }
}

/// What went wrong.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ErrorKind {
    /// The server answered BAD.
    #[error("{command} rejected as malformed: {text}")]
    ProtocolSyntaxError {
        /// Command keyword.
        command: String,
        /// Server text.
        text: String,
    },

    /// The server refused a flag as an invalid system flag.
    #[error("invalid system flag: {text}")]
    InvalidSystemFlag {
        /// Server text.
        text: String,
    },

    /// The server answered NO for any other reason.
    #[error("{command} not permitted: {text}")]
    OperationNotSupported {
        /// Command keyword.
        command: String,
        /// Server text.
        text: String,
    },

    /// The server refused the command because a quota is exhausted.
    #[error("quota exceeded: {text}")]
    QuotaExceeded {
        /// Server text.
        text: String,
    },

    /// The server closed the connection.
    #[error("connection closed: {reason}")]
    ConnectionClosed {
        /// BYE text or local reason.
        reason: String,
    },

    /// The transport failed.
    #[error("connection broken: {reason}")]
    ConnectionBroken {
        /// Underlying failure.
        reason: String,
    },

    /// Login was refused.
    #[error("authentication failed: {text}")]
    AuthenticationFailed {
        /// Server text.
        text: String,
    },

    /// The server lacks an extension the operation needs.
    #[error("server does not support {capability}")]
    CapabilityUnsupported {
        /// Capability name, e.g. `SORT`.
        capability: String,
    },

    /// No folder with this fullname.
    #[error("folder {fullname} does not exist")]
    FolderNotFound {
        /// Folder fullname.
        fullname: String,
    },

    /// A folder with this fullname already exists.
    #[error("folder {fullname} already exists")]
    FolderAlreadyExists {
        /// Folder fullname.
        fullname: String,
    },

    /// The requested name cannot be used.
    #[error("invalid folder name {name:?}: {reason}")]
    InvalidFolderName {
        /// Rejected name.
        name: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Default folders cannot be renamed, moved or deleted.
    #[error("{fullname} is a default folder")]
    DefaultFolderProtected {
        /// Folder fullname.
        fullname: String,
    },

    /// The user lacks a right on a folder.
    #[error("missing {right} right on {fullname}")]
    InsufficientRights {
        /// Folder fullname.
        fullname: String,
        /// The missing right.
        right: RequiredRight,
    },

    /// The server cannot sort by this field.
    #[error("cannot sort by {field} on the server")]
    UnsupportedSortField {
        /// Field name.
        field: String,
    },

    /// A command or lock wait exceeded its deadline.
    #[error("timed out after {after:?}")]
    Timeout {
        /// The deadline that elapsed.
        after: Duration,
    },

    /// A server response could not be understood.
    #[error("unparseable server response: {message}")]
    Parse {
        /// Parser message.
        message: String,
    },

    /// Invalid local configuration.
    #[error("configuration error: {message}")]
    Configuration {
        /// What is wrong.
        message: String,
    },
}

impl ErrorKind {
    /// The server rejected the command itself (NO), as opposed to a
    /// transport or quota problem.
    #[must_use]
    pub const fn is_command_rejected(&self) -> bool {
        matches!(
            self,
            Self::InvalidSystemFlag { .. } | Self::OperationNotSupported { .. }
        )
    }

    /// Only timeouts are worth retrying as-is.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// The connection cannot carry further commands.
    #[must_use]
    pub const fn is_connection_lost(&self) -> bool {
        matches!(
            self,
            Self::ConnectionClosed { .. } | Self::ConnectionBroken { .. } | Self::Timeout { .. }
        )
    }
}

impl From<&mailstore_imap::Error> for ErrorKind {
    fn from(error: &mailstore_imap::Error) -> Self {
        use mailstore_imap::Error as Imap;

        match error {
            Imap::No {
                command,
                code,
                text,
            } => {
                if text.to_ascii_lowercase().contains("invalid system flag") {
                    Self::InvalidSystemFlag { text: text.clone() }
                } else if text.contains("Over quota")
                    || matches!(code, Some(ResponseCode::OverQuota))
                {
                    Self::QuotaExceeded { text: text.clone() }
                } else {
                    Self::OperationNotSupported {
                        command: (*command).to_string(),
                        text: text.clone(),
                    }
                }
            }
            Imap::Bad { command, text } => Self::ProtocolSyntaxError {
                command: (*command).to_string(),
                text: text.clone(),
            },
            Imap::Bye(reason) | Imap::ConnectionClosed(reason) => Self::ConnectionClosed {
                reason: reason.clone(),
            },
            Imap::ConnectionBroken(reason) => Self::ConnectionBroken {
                reason: reason.clone(),
            },
            Imap::Io(e) => Self::ConnectionBroken {
                reason: e.to_string(),
            },
            Imap::Tls(e) => Self::ConnectionBroken {
                reason: e.to_string(),
            },
            Imap::Timeout(after) => Self::Timeout { after: *after },
            Imap::Auth(text) => Self::AuthenticationFailed { text: text.clone() },
            Imap::InvalidDnsName(e) => Self::Configuration {
                message: e.to_string(),
            },
            Imap::Parse { message, .. } | Imap::Protocol(message) | Imap::InvalidState(message) => {
                Self::Parse {
                    message: message.clone(),
                }
            }
        }
    }
}

/// Where an error happened.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorContext {
    /// Folder fullname.
    pub folder: Option<String>,
    /// IMAP server host.
    pub server: Option<String>,
    /// IMAP login.
    pub login: Option<String>,
    /// Local user id.
    pub user: Option<u32>,
    /// Local account id.
    pub account: Option<u32>,
}

impl ErrorContext {
    fn is_empty(&self) -> bool {
        self.folder.is_none()
            && self.server.is_none()
            && self.login.is_none()
            && self.user.is_none()
            && self.account.is_none()
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return Ok(());
        }
        let mut parts = Vec::new();
        if let Some(folder) = &self.folder {
            parts.push(format!("folder={folder}"));
        }
        if let Some(server) = &self.server {
            parts.push(format!("server={server}"));
        }
        if let Some(login) = &self.login {
            parts.push(format!("login={login}"));
        }
        if let Some(user) = self.user {
            parts.push(format!("user={user}"));
        }
        if let Some(account) = self.account {
            parts.push(format!("account={account}"));
        }
        write!(f, " [{}]", parts.join(", "))
    }
}

/// A storage error: kind, context and the protocol error it came from.
#[derive(Debug, Error)]
#[error("{kind}{context}")]
pub struct Error {
    kind: ErrorKind,
    context: ErrorContext,
    #[source]
    source: Option<mailstore_imap::Error>,
}

impl Error {
    /// Creates an error without context.
    #[must_use]
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: ErrorContext::default(),
            source: None,
        }
    }

    /// The failure kind.
    #[must_use]
    pub const fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Where it happened.
    #[must_use]
    pub const fn context(&self) -> &ErrorContext {
        &self.context
    }

    /// The protocol error this was mapped from, if any.
    #[must_use]
    pub const fn protocol_source(&self) -> Option<&mailstore_imap::Error> {
        self.source.as_ref()
    }

    /// Sets the folder unless one is already recorded.
    #[must_use]
    pub fn in_folder(mut self, fullname: &str) -> Self {
        if self.context.folder.is_none() {
            self.context.folder = Some(fullname.to_string());
        }
        self
    }

    /// Fills the session fields that are still empty from `context`.
    #[must_use]
    pub fn with_context(mut self, context: &ErrorContext) -> Self {
        let own = &mut self.context;
        if own.folder.is_none() {
            own.folder.clone_from(&context.folder);
        }
        if own.server.is_none() {
            own.server.clone_from(&context.server);
        }
        if own.login.is_none() {
            own.login.clone_from(&context.login);
        }
        own.user = own.user.or(context.user);
        own.account = own.account.or(context.account);
        self
    }

    /// See [`ErrorKind::is_retryable`].
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    /// See [`ErrorKind::is_command_rejected`].
    #[must_use]
    pub const fn is_command_rejected(&self) -> bool {
        self.kind.is_command_rejected()
    }

    pub(crate) fn folder_not_found(fullname: &str) -> Self {
        Self::new(ErrorKind::FolderNotFound {
            fullname: fullname.to_string(),
        })
        .in_folder(fullname)
    }

    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration {
            message: message.into(),
        })
    }

    pub(crate) fn insufficient(fullname: &str, right: RequiredRight) -> Self {
        Self::new(ErrorKind::InsufficientRights {
            fullname: fullname.to_string(),
            right,
        })
        .in_folder(fullname)
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

impl From<mailstore_imap::Error> for Error {
    fn from(error: mailstore_imap::Error) -> Self {
        Self {
            kind: ErrorKind::from(&error),
            context: ErrorContext::default(),
            source: Some(error),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Self::configuration(error.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Self::configuration(error.to_string())
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    fn no(text: &str, code: Option<ResponseCode>) -> mailstore_imap::Error {
        mailstore_imap::Error::No {
            command: "STORE",
            code,
            text: text.to_string(),
        }
    }

    #[test]
    fn invalid_system_flag_is_case_insensitive() {
        let err = Error::from(no("Invalid System Flag \\Foo", None));
        assert!(matches!(err.kind(), ErrorKind::InvalidSystemFlag { .. }));
        assert!(err.is_command_rejected());
    }

    #[test]
    fn over_quota_by_text_or_code() {
        let by_text = Error::from(no("Over quota", None));
        assert!(matches!(by_text.kind(), ErrorKind::QuotaExceeded { .. }));

        let by_code = Error::from(no("mailbox full", Some(ResponseCode::OverQuota)));
        assert!(matches!(by_code.kind(), ErrorKind::QuotaExceeded { .. }));
        assert!(!by_code.is_command_rejected());
    }

    #[test]
    fn other_no_is_operation_not_supported() {
        let err = Error::from(no("permission denied", None));
        assert_eq!(
            err.kind(),
            &ErrorKind::OperationNotSupported {
                command: "STORE".to_string(),
                text: "permission denied".to_string(),
            }
        );
        assert!(err.protocol_source().is_some());
    }

    #[test]
    fn bad_is_syntax_error() {
        let err = Error::from(mailstore_imap::Error::Bad {
            command: "FETCH",
            text: "junk".to_string(),
        });
        assert!(matches!(err.kind(), ErrorKind::ProtocolSyntaxError { .. }));
    }

    #[test]
    fn only_timeout_is_retryable() {
        let timeout = Error::from(mailstore_imap::Error::Timeout(Duration::from_secs(5)));
        assert!(timeout.is_retryable());

        let closed = Error::from(mailstore_imap::Error::Bye("shutting down".to_string()));
        assert!(matches!(closed.kind(), ErrorKind::ConnectionClosed { .. }));
        assert!(!closed.is_retryable());
        assert!(closed.kind().is_connection_lost());
    }

    #[test]
    fn context_renders_after_kind() {
        let context = ErrorContext {
            server: Some("imap.example.com".to_string()),
            login: Some("alice".to_string()),
            ..ErrorContext::default()
        };
        let err = Error::folder_not_found("Archive/2020").with_context(&context);
        assert_eq!(
            err.to_string(),
            "folder Archive/2020 does not exist [folder=Archive/2020, server=imap.example.com, login=alice]"
        );
    }

    #[test]
    fn folder_is_not_overwritten() {
        let err = Error::folder_not_found("A").in_folder("B");
        assert_eq!(err.context().folder.as_deref(), Some("A"));
    }
}
