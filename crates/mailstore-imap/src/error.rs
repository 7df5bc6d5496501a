//! Error types for the IMAP library.

use std::time::Duration;

use thiserror::Error;

use crate::types::ResponseCode;

/// Errors that can occur during IMAP operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error during network operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS handshake or encryption error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Invalid DNS name for TLS.
    #[error("Invalid DNS name: {0}")]
    InvalidDnsName(#[from] rustls::pki_types::InvalidDnsNameError),

    /// Protocol parsing error.
    #[error("Protocol error at position {position}: {message}")]
    Parse {
        /// Byte position where the error occurred.
        position: usize,
        /// Description of what went wrong.
        message: String,
    },

    /// Authentication failed.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Server returned NO.
    #[error("{command} failed: {text}")]
    No {
        /// Command keyword.
        command: &'static str,
        /// Response code of the tagged completion.
        code: Option<ResponseCode>,
        /// Server text.
        text: String,
    },

    /// Server returned BAD.
    #[error("{command} rejected as malformed: {text}")]
    Bad {
        /// Command keyword.
        command: &'static str,
        /// Server text.
        text: String,
    },

    /// Server sent BYE (disconnecting).
    #[error("Server sent BYE: {0}")]
    Bye(String),

    /// The connection was closed by an earlier BYE or LOGOUT.
    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    /// The connection failed at transport level and cannot be used again.
    #[error("Connection broken: {0}")]
    ConnectionBroken(String),

    /// Operation timed out.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// Invalid state for the requested operation.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Protocol violation or unexpected data.
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl Error {
    /// True if the connection can no longer carry commands.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Io(_)
                | Self::Tls(_)
                | Self::Bye(_)
                | Self::ConnectionClosed(_)
                | Self::ConnectionBroken(_)
                | Self::Timeout(_)
        )
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
