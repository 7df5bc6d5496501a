//! Command execution over a framed stream.
//!
//! The executor owns the stream and runs exactly one command at a time:
//! it writes the tagged command line (each literal only after the server's
//! continuation request), collects untagged data until the matching tagged completion and
//! maps NO/BAD/BYE to errors. A BYE or a transport failure poisons the
//! executor so later calls fail without touching the stream.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};

use super::framed::FramedStream;
use crate::command::{Command, TagGenerator};
use crate::parser::{Response, ResponseParser, UntaggedResponse};
use crate::types::{ResponseCode, Status};
use crate::{Error, Result};

/// Data returned by one successful command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Responses {
    untagged: Vec<UntaggedResponse>,
    code: Option<ResponseCode>,
    text: String,
}

impl Responses {
    /// Builds a response set from its parts.
    #[must_use]
    pub const fn new(
        untagged: Vec<UntaggedResponse>,
        code: Option<ResponseCode>,
        text: String,
    ) -> Self {
        Self {
            untagged,
            code,
            text,
        }
    }

    /// Iterates over the untagged responses in arrival order.
    #[must_use]
    pub fn cursor(&self) -> ResponseCursor<'_> {
        ResponseCursor {
            inner: self.untagged.iter(),
        }
    }

    /// Response code of the tagged OK.
    #[must_use]
    pub const fn code(&self) -> Option<&ResponseCode> {
        self.code.as_ref()
    }

    /// Text of the tagged OK.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Response codes of the tagged OK and of every untagged OK, in order.
    pub fn codes(&self) -> impl Iterator<Item = &ResponseCode> {
        self.untagged
            .iter()
            .filter_map(|r| match r {
                UntaggedResponse::Ok { code, .. } => code.as_ref(),
                _ => None,
            })
            .chain(self.code.as_ref())
    }

    /// Consumes the set, returning the untagged responses.
    #[must_use]
    pub fn into_untagged(self) -> Vec<UntaggedResponse> {
        self.untagged
    }
}

/// Read-only cursor over the untagged part of a [`Responses`].
#[derive(Debug, Clone)]
pub struct ResponseCursor<'a> {
    inner: std::slice::Iter<'a, UntaggedResponse>,
}

impl<'a> Iterator for ResponseCursor<'a> {
    type Item = &'a UntaggedResponse;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

impl<'a> ResponseCursor<'a> {
    /// Yields the values `select` extracts, skipping everything else.
    pub fn extract<T>(
        self,
        select: impl FnMut(&'a UntaggedResponse) -> Option<T>,
    ) -> impl Iterator<Item = T> {
        self.filter_map(select)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ChannelState {
    Open,
    Closed(String),
    Broken(String),
}

/// Serial command executor.
pub struct Executor<S> {
    stream: FramedStream<S>,
    tags: TagGenerator,
    timeout: Duration,
    state: ChannelState,
}

impl<S> std::fmt::Debug for Executor<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("tags", &self.tags)
            .field("timeout", &self.timeout)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<S> Executor<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps a connected stream. Each command is bounded by `timeout`.
    pub fn new(stream: S, timeout: Duration) -> Self {
        Self {
            stream: FramedStream::new(stream),
            tags: TagGenerator::default(),
            timeout,
            state: ChannelState::Open,
        }
    }

    /// True until a BYE, LOGOUT, transport error or timeout.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state == ChannelState::Open
    }

    /// Consumes the executor, returning the raw stream.
    pub fn into_inner(self) -> S {
        self.stream.into_inner()
    }

    /// Reads the server greeting.
    ///
    /// # Errors
    ///
    /// Fails on BYE, on anything that is not a greeting, or on I/O errors.
    pub async fn read_greeting(&mut self) -> Result<UntaggedResponse> {
        let timeout = self.timeout;
        let read = async {
            let line = self.stream.read_response().await?;
            ResponseParser::parse(&line)
        };
        let greeting = match tokio::time::timeout(timeout, read).await {
            Err(_) => return Err(self.poison(Error::Timeout(timeout))),
            Ok(Err(e)) => return Err(self.poison(e)),
            Ok(Ok(response)) => response,
        };

        match greeting {
            Response::Untagged(UntaggedResponse::Bye { text, .. }) => {
                Err(self.poison(Error::Bye(text)))
            }
            Response::Untagged(
                greeting @ (UntaggedResponse::Ok { .. } | UntaggedResponse::PreAuth { .. }),
            ) => Ok(greeting),
            other => Err(self.poison(Error::Protocol(format!(
                "unexpected greeting: {other:?}"
            )))),
        }
    }

    /// Executes one command and returns its data.
    ///
    /// # Errors
    ///
    /// - [`Error::Bad`] / [`Error::No`] for tagged BAD / NO.
    /// - [`Error::Bye`] when the server closes the connection; subsequent
    ///   calls return [`Error::ConnectionClosed`].
    /// - [`Error::Timeout`] / I/O errors; subsequent calls return
    ///   [`Error::ConnectionBroken`].
    pub async fn execute(&mut self, command: &Command) -> Result<Responses> {
        match &self.state {
            ChannelState::Open => {}
            ChannelState::Closed(reason) => return Err(Error::ConnectionClosed(reason.clone())),
            ChannelState::Broken(reason) => return Err(Error::ConnectionBroken(reason.clone())),
        }

        let timeout = self.timeout;
        match tokio::time::timeout(timeout, self.round_trip(command)).await {
            Err(_) => {
                tracing::warn!(command = command.name(), ?timeout, "IMAP command timed out");
                Err(self.poison(Error::Timeout(timeout)))
            }
            Ok(Err(e)) if e.is_fatal() => Err(self.poison(e)),
            Ok(result) => {
                if matches!(command, Command::Logout) {
                    self.state = ChannelState::Closed("logged out".to_string());
                }
                result
            }
        }
    }

    fn poison(&mut self, error: Error) -> Error {
        let reason = error.to_string();
        self.state = match &error {
            Error::Bye(text) => ChannelState::Closed(text.clone()),
            Error::ConnectionClosed(_) => ChannelState::Closed(reason),
            _ => ChannelState::Broken(reason),
        };
        error
    }

    async fn round_trip(&mut self, command: &Command) -> Result<Responses> {
        let tag = self.tags.next_tag();
        let encoded = command.encode(&tag);
        tracing::debug!(
            tag,
            command = command.name(),
            literals = encoded.literal_count(),
            "sending command"
        );

        let mut untagged = Vec::new();
        let mut parts = encoded.parts().into_iter();
        if let Some(line) = parts.next() {
            self.stream.write_parts(&[line]).await?;
        }
        for part in parts {
            if let Some(done) = self.read_until(&tag, command, &mut untagged, true).await? {
                // Tagged completion instead of a continuation request.
                return done.map(|(code, text)| Responses::new(untagged, code, text));
            }
            self.stream.write_parts(&[part]).await?;
        }

        match self.read_until(&tag, command, &mut untagged, false).await? {
            Some(done) => done.map(|(code, text)| Responses::new(untagged, code, text)),
            None => Err(Error::Protocol(format!(
                "unexpected continuation request for {}",
                command.name()
            ))),
        }
    }

    /// Reads responses until the tagged completion, or until a continuation
    /// request when `stop_at_continuation` is set (returns `None` then).
    #[allow(clippy::type_complexity)]
    async fn read_until(
        &mut self,
        tag: &str,
        command: &Command,
        untagged: &mut Vec<UntaggedResponse>,
        stop_at_continuation: bool,
    ) -> Result<Option<Result<(Option<ResponseCode>, String)>>> {
        let logout = matches!(command, Command::Logout);
        loop {
            let raw = self.stream.read_response().await?;
            let response = match ResponseParser::parse(&raw) {
                Ok(response) => response,
                Err(e) if is_tagged_with(&raw, tag) => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        ?e,
                        line = %String::from_utf8_lossy(&raw).trim_end(),
                        "skipping unparseable response"
                    );
                    continue;
                }
            };

            match response {
                Response::Continuation { .. } if stop_at_continuation => return Ok(None),
                Response::Continuation { text } => {
                    tracing::warn!(?text, "ignoring unexpected continuation request");
                }
                Response::Untagged(UntaggedResponse::Bye { text, .. }) if !logout => {
                    tracing::info!(%text, command = command.name(), "server closed the connection");
                    return Err(Error::Bye(text));
                }
                Response::Untagged(data) => untagged.push(data),
                Response::Tagged {
                    tag: got,
                    status,
                    code,
                    text,
                } => {
                    if got.as_str() != tag {
                        tracing::warn!(expected = tag, got = got.as_str(), "ignoring stray tagged response");
                        continue;
                    }
                    return Ok(Some(complete(command, status, code, text)));
                }
            }
        }
    }
}

fn is_tagged_with(raw: &[u8], tag: &str) -> bool {
    raw.strip_prefix(tag.as_bytes())
        .is_some_and(|rest| rest.first() == Some(&b' '))
}

fn complete(
    command: &Command,
    status: Status,
    code: Option<ResponseCode>,
    text: String,
) -> Result<(Option<ResponseCode>, String)> {
    match status {
        Status::Ok | Status::PreAuth => Ok((code, text)),
        Status::No => {
            tracing::debug!(command = command.name(), ?code, %text, "command rejected");
            Err(Error::No {
                command: command.name(),
                code,
                text,
            })
        }
        Status::Bad => {
            tracing::warn!(command = command.name(), %text, "command reported as malformed");
            Err(Error::Bad {
                command: command.name(),
                text,
            })
        }
        Status::Bye => Err(Error::Bye(text)),
    }
}
