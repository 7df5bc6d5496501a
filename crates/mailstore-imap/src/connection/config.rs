//! Where a session connects and how long it waits.

use std::time::Duration;

/// Transport security of the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Security {
    /// Plain text on port 143.
    None,
    /// Plain text on port 143, upgraded with STARTTLS before login.
    StartTls,
    /// TLS from the first byte, port 993.
    #[default]
    Implicit,
}

impl Security {
    /// Port used when none is configured.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::None | Self::StartTls => 143,
            Self::Implicit => 993,
        }
    }
}

/// Upper bounds for the waits of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// TCP connect and each TLS handshake.
    pub connect: Duration,
    /// One command, from writing the tag to its tagged completion.
    pub command: Duration,
    /// Waiting for another task to release the connection.
    pub lock: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(30),
            command: Duration::from_secs(60),
            lock: Duration::from_secs(30),
        }
    }
}

/// Server address, security mode and timeouts of one session.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server hostname, also used for certificate verification.
    pub host: String,
    /// Transport security.
    pub security: Security,
    /// Session timeouts.
    pub timeouts: Timeouts,
    port: Option<u16>,
}

impl Config {
    /// Implicit TLS to `host` with default timeouts.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            security: Security::default(),
            timeouts: Timeouts::default(),
            port: None,
        }
    }

    /// Port to connect to: the configured one, else the security mode's.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.security.default_port())
    }

    /// Uses `port` regardless of the security mode.
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Switches the security mode.
    #[must_use]
    pub const fn with_security(mut self, security: Security) -> Self {
        self.security = security;
        self
    }

    /// Replaces the timeouts.
    #[must_use]
    pub const fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }
}
