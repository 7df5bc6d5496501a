//! Authenticated IMAP session with a serialized command channel.
//!
//! A [`Session`] owns one [`Connection`] behind an async mutex. Everything
//! that talks to the server goes through [`Session::with_connection`], which
//! holds the lock for the whole closure, so a multi-command sequence (select,
//! search, store, expunge) never interleaves with another caller's commands.
//!
//! ## Example
//!
//! ```ignore
//! use mailstore_imap::connection::{AccessMode, Session};
//! use mailstore_imap::{Command, Config, Mailbox};
//!
//! let session = Session::connect(&Config::new("imap.example.com"), "user", "secret").await?;
//! let exists = session
//!     .with_connection(|conn| {
//!         Box::pin(async move {
//!             let status = conn.select(&Mailbox::inbox(), AccessMode::ReadOnly).await?;
//!             Ok(status.exists)
//!         })
//!     })
//!     .await?;
//! ```
//!
//! ## Folder state
//!
//! ```text
//! Unselected ── EXAMINE ──→ SelectedReadOnly ── SELECT ──→ SelectedReadWrite
//!      ↑                          │  (close, reopen)              │
//!      └──── UNSELECT / CLOSE ────┴───────────────────────────────┘
//! ```
//!
//! A stronger mode than the one held forces close-then-reopen. A weaker
//! request on the same folder keeps the stronger selection.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{Mutex, MutexGuard};

use super::config::{Config, Security};
use super::executor::{Executor, Responses};
use super::stream::{ImapStream, open};
use crate::command::Command;
use crate::parser::UntaggedResponse;
use crate::types::{Capabilities, Capability, Flags, Mailbox, MailboxStatus, ResponseCode};
use crate::{Error, Result};

/// Future returned by closures passed to [`Session::with_connection`].
pub type ConnectionFuture<'c, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'c>>;

/// Folder access mode. `ReadOnly < ReadWrite`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AccessMode {
    /// Opened with EXAMINE.
    ReadOnly,
    /// Opened with SELECT.
    ReadWrite,
}

/// The currently selected folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFolder {
    /// Mailbox name.
    pub mailbox: Mailbox,
    /// Mode granted by the server.
    pub mode: AccessMode,
    /// State reported at selection time.
    pub status: MailboxStatus,
}

/// One authenticated connection and its folder state.
pub struct Connection<S> {
    executor: Executor<S>,
    capabilities: Capabilities,
    selected: Option<SelectedFolder>,
    host: String,
    login: String,
}

impl<S> std::fmt::Debug for Connection<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("host", &self.host)
            .field("login", &self.login)
            .field("selected", &self.selected.as_ref().map(|s| &s.mailbox))
            .finish_non_exhaustive()
    }
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Executes a command on this connection.
    ///
    /// # Errors
    ///
    /// See [`Executor::execute`].
    pub async fn execute(&mut self, command: &Command) -> Result<Responses> {
        let result = self.executor.execute(command).await;
        if !self.executor.is_open() {
            self.selected = None;
        }
        result
    }

    /// Server capabilities as of login.
    #[must_use]
    pub const fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// Shorthand for `capabilities().has(..)`.
    #[must_use]
    pub fn has(&self, capability: &Capability) -> bool {
        self.capabilities.has(capability)
    }

    /// Server host name.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Login name.
    #[must_use]
    pub fn login(&self) -> &str {
        &self.login
    }

    /// False once the server said BYE or the transport failed.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.executor.is_open()
    }

    /// The currently selected folder, if any.
    #[must_use]
    pub const fn selected(&self) -> Option<&SelectedFolder> {
        self.selected.as_ref()
    }

    /// Opens `mailbox` in at least `mode`.
    ///
    /// Reuses the current selection when it is the same folder held in the
    /// same or a stronger mode. The returned status reflects the mode the
    /// server actually granted, which may be read-only even for SELECT.
    ///
    /// # Errors
    ///
    /// Returns the server's NO (no such folder, no permission) or transport
    /// errors. On failure no folder is selected.
    pub async fn select(&mut self, mailbox: &Mailbox, mode: AccessMode) -> Result<&SelectedFolder> {
        let reusable = self
            .selected
            .as_ref()
            .is_some_and(|s| s.mailbox == *mailbox && s.mode >= mode);
        if !reusable {
            // SELECT/EXAMINE deselect the current folder without expunging,
            // and leave nothing selected when they fail.
            self.selected = None;
            let selected = self.open(mailbox, mode).await?;
            self.selected = Some(selected);
        }
        self.selected
            .as_ref()
            .ok_or_else(|| Error::InvalidState("no folder selected".to_string()))
    }

    async fn open(&mut self, mailbox: &Mailbox, mode: AccessMode) -> Result<SelectedFolder> {
        let command = match mode {
            AccessMode::ReadWrite => Command::Select {
                mailbox: mailbox.clone(),
            },
            AccessMode::ReadOnly => Command::Examine {
                mailbox: mailbox.clone(),
            },
        };
        let responses = self.execute(&command).await?;
        let status = mailbox_status(&responses, mode == AccessMode::ReadOnly);
        let granted = if status.read_only {
            AccessMode::ReadOnly
        } else {
            AccessMode::ReadWrite
        };
        tracing::debug!(mailbox = mailbox.as_str(), ?granted, exists = status.exists, "folder opened");
        Ok(SelectedFolder {
            mailbox: mailbox.clone(),
            mode: granted,
            status,
        })
    }

    /// Closes the selected folder without expunging.
    ///
    /// Uses UNSELECT when advertised. Otherwise a read-write folder is first
    /// re-opened with EXAMINE so that CLOSE cannot expunge `\Deleted` messages.
    ///
    /// # Errors
    ///
    /// Returns transport errors; NO from the server is logged and ignored
    /// since the folder is deselected either way.
    pub async fn unselect(&mut self) -> Result<()> {
        let Some(selected) = self.selected.take() else {
            return Ok(());
        };

        let result = if self.has(&Capability::Unselect) {
            self.execute(&Command::Unselect).await.map(drop)
        } else {
            let examined = if selected.mode == AccessMode::ReadWrite {
                self.execute(&Command::Examine {
                    mailbox: selected.mailbox.clone(),
                })
                .await
                .map(drop)
            } else {
                Ok(())
            };
            // A failed EXAMINE already left the folder unselected.
            match examined {
                Ok(()) => self.execute(&Command::Close).await.map(drop),
                Err(e) => Err(e),
            }
        };

        match result {
            Err(e) if !e.is_fatal() => {
                tracing::warn!(?e, mailbox = selected.mailbox.as_str(), "closing folder failed");
                Ok(())
            }
            other => other,
        }
    }

    /// Drops the remembered selection, e.g. after the folder was deleted.
    pub fn forget_selection(&mut self) {
        self.selected = None;
    }
}

/// Builds the mailbox status from SELECT/EXAMINE responses.
fn mailbox_status(responses: &Responses, examined: bool) -> MailboxStatus {
    let mut status = MailboxStatus {
        read_only: examined,
        ..MailboxStatus::default()
    };
    for response in responses.cursor() {
        match response {
            UntaggedResponse::Exists(n) => status.exists = *n,
            UntaggedResponse::Recent(n) => status.recent = *n,
            UntaggedResponse::Flags(flags) => status.flags = flags.clone(),
            _ => {}
        }
    }
    for code in responses.codes() {
        match code {
            ResponseCode::PermanentFlags(flags) => {
                status.permanent_flags = Flags::from_vec(flags.clone());
            }
            ResponseCode::UidNext(uid) => status.uid_next = Some(*uid),
            ResponseCode::UidValidity(v) => status.uid_validity = Some(*v),
            ResponseCode::Unseen(seq) => status.unseen = Some(*seq),
            ResponseCode::ReadOnly => status.read_only = true,
            ResponseCode::ReadWrite => status.read_only = false,
            _ => {}
        }
    }
    status
}

/// An authenticated session: one connection, serialized by a mutex.
pub struct Session<S = ImapStream> {
    connection: Mutex<Connection<S>>,
    capabilities: Capabilities,
    lock_timeout: Duration,
}

impl<S> std::fmt::Debug for Session<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("capabilities", &self.capabilities)
            .field("lock_timeout", &self.lock_timeout)
            .finish_non_exhaustive()
    }
}

impl Session<ImapStream> {
    /// Connects, upgrades with STARTTLS if configured, and logs in.
    ///
    /// # Errors
    ///
    /// Returns connection, TLS, timeout or authentication errors.
    pub async fn connect(config: &Config, username: &str, password: &str) -> Result<Self> {
        let mut stream = open(config).await?;

        if config.security == Security::StartTls {
            let mut executor = Executor::new(stream, config.timeouts.command);
            executor.read_greeting().await?;
            executor.execute(&Command::StartTls).await?;
            stream = executor
                .into_inner()
                .upgrade_to_tls(&config.host, config.timeouts.connect)
                .await?;
            // The greeting is not repeated after the TLS handshake.
            return Self::login(stream, config, username, password, None).await;
        }

        Self::from_stream(stream, config, username, password).await
    }
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Reads the greeting from an already connected stream and logs in.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Bye`] for a rejecting greeting, [`Error::Auth`] when
    /// LOGIN fails or is disabled, and transport errors.
    pub async fn from_stream(
        stream: S,
        config: &Config,
        username: &str,
        password: &str,
    ) -> Result<Self> {
        let mut executor = Executor::new(stream, config.timeouts.command);
        let greeting = executor.read_greeting().await?;
        Self::finish_login(executor, config, username, password, Some(greeting)).await
    }

    async fn login(
        stream: S,
        config: &Config,
        username: &str,
        password: &str,
        greeting: Option<UntaggedResponse>,
    ) -> Result<Self> {
        let executor = Executor::new(stream, config.timeouts.command);
        Self::finish_login(executor, config, username, password, greeting).await
    }

    async fn finish_login(
        mut executor: Executor<S>,
        config: &Config,
        username: &str,
        password: &str,
        greeting: Option<UntaggedResponse>,
    ) -> Result<Self> {
        let (preauth, mut capabilities) = match greeting {
            Some(UntaggedResponse::PreAuth { code, .. }) => (true, capabilities_from(code)),
            Some(UntaggedResponse::Ok { code, .. }) => (false, capabilities_from(code)),
            _ => (false, None),
        };

        if !preauth {
            if capabilities
                .as_ref()
                .is_some_and(|c| c.has(&Capability::LoginDisabled))
            {
                return Err(Error::Auth("LOGIN is disabled by the server".to_string()));
            }
            let responses = executor
                .execute(&Command::Login {
                    username: username.to_string(),
                    password: password.to_string(),
                })
                .await
                .map_err(|e| match e {
                    Error::No { text, .. } => Error::Auth(text),
                    other => other,
                })?;
            // Pre-login capabilities may be incomplete.
            capabilities = capabilities_from(responses.code().cloned());
        }

        let capabilities = match capabilities {
            Some(c) => c,
            None => {
                let responses = executor.execute(&Command::Capability).await?;
                Capabilities::new(
                    responses
                        .cursor()
                        .extract(|r| match r {
                            UntaggedResponse::Capability(caps) => Some(caps.clone()),
                            _ => None,
                        })
                        .flatten()
                        .collect(),
                )
            }
        };

        tracing::info!(host = %config.host, login = username, "IMAP session established");

        Ok(Self {
            connection: Mutex::new(Connection {
                executor,
                capabilities: capabilities.clone(),
                selected: None,
                host: config.host.clone(),
                login: username.to_string(),
            }),
            capabilities,
            lock_timeout: config.timeouts.lock,
        })
    }

    /// Server capabilities, readable without taking the lock.
    #[must_use]
    pub const fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// Runs `f` with exclusive access to the connection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] if the lock is not acquired within the
    /// configured lock timeout, otherwise whatever `f` returns.
    pub async fn with_connection<T, F>(&self, f: F) -> Result<T>
    where
        F: for<'c> FnOnce(&'c mut Connection<S>) -> ConnectionFuture<'c, T>,
    {
        let mut guard = self.lock().await?;
        f(&mut guard).await
    }

    /// Takes exclusive access to the connection until the guard is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] if the lock is not acquired within the
    /// configured lock timeout.
    pub async fn lock(&self) -> Result<MutexGuard<'_, Connection<S>>> {
        tokio::time::timeout(self.lock_timeout, self.connection.lock())
            .await
            .map_err(|_| Error::Timeout(self.lock_timeout))
    }

    /// Sends LOGOUT. The session cannot be used afterwards.
    ///
    /// # Errors
    ///
    /// Returns transport errors; an already closed connection is not an error.
    pub async fn logout(&self) -> Result<()> {
        self.with_connection(|conn| {
            Box::pin(async move {
                if !conn.is_open() {
                    return Ok(());
                }
                conn.unselect().await?;
                conn.execute(&Command::Logout).await.map(drop)
            })
        })
        .await
    }
}

fn capabilities_from(code: Option<ResponseCode>) -> Option<Capabilities> {
    match code {
        Some(ResponseCode::Capability(caps)) => Some(Capabilities::new(caps)),
        _ => None,
    }
}
