//! Interactive session: a transport plus a pattern buffer and a transcript.

use std::time::Duration;

use log::{trace, warn};
use tokio::time::Instant;

use super::buffer::{DEFAULT_MAX_BUFFER, PatternBuffer};
use super::patterns::PatternSet;
use super::transcript::Transcript;
use crate::error::ChannelError;
use crate::transport::Transport;

/// Configuration for session behavior.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Timeout for expect calls that don't specify one.
    pub default_timeout: Duration,

    /// Upper bound on unconsumed buffered output.
    pub max_buffer: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(30),
            max_buffer: DEFAULT_MAX_BUFFER,
        }
    }
}

/// Outcome of a successful expect call.
#[derive(Debug, Clone)]
pub struct Expectation {
    /// Index of the alternative that matched.
    pub index: usize,

    /// Output consumed up to and including the match (lossy UTF-8).
    pub consumed: String,

    /// Time spent waiting.
    pub elapsed: Duration,
}

/// One open interactive session with a device.
///
/// Owns its transport and transcript. Every byte read is recorded before
/// it is matched; every line written is recorded (masked if hidden).
pub struct Session<T: Transport> {
    host: String,
    transport: T,
    buffer: PatternBuffer,
    transcript: Transcript,
    default_timeout: Duration,
    /// Alternative matched by the most recent expect.
    last_match: Option<usize>,
    closed: bool,
}

impl<T: Transport> Session<T> {
    /// Wrap an established transport.
    pub fn new(
        host: impl Into<String>,
        transport: T,
        transcript: Transcript,
        config: &SessionConfig,
    ) -> Self {
        Self {
            host: host.into(),
            transport,
            buffer: PatternBuffer::new(config.max_buffer),
            transcript,
            default_timeout: config.default_timeout,
            last_match: None,
            closed: false,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Default timeout for expect calls.
    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Alternative index matched by the most recent expect, if any.
    pub fn last_match(&self) -> Option<usize> {
        self.last_match
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    #[cfg(test)]
    pub(crate) fn transport_for_tests(&self) -> &T {
        &self.transport
    }

    /// Unconsumed output received so far.
    pub fn pending_output(&self) -> std::borrow::Cow<'_, str> {
        self.buffer.as_str_lossy()
    }

    /// Send `line` followed by the transport's line ending.
    pub async fn send_line(&mut self, line: &str, hidden: bool) -> Result<(), ChannelError> {
        if self.closed {
            return Err(ChannelError::Closed);
        }

        let ending = self.transport.line_ending();
        let mut wire = Vec::with_capacity(line.len() + ending.len());
        wire.extend_from_slice(line.as_bytes());
        wire.extend_from_slice(ending.as_bytes());

        self.transport.write_all(&wire).await?;
        self.transcript
            .sent(line.as_bytes(), ending, hidden)
            .map_err(ChannelError::Transcript)?;

        if hidden {
            trace!("{}: sent <hidden>", self.host);
        } else {
            trace!("{}: sent {:?}", self.host, line);
        }
        Ok(())
    }

    /// Wait until one of `patterns` matches the received output.
    ///
    /// `None` uses the session's default timeout. Fails with
    /// [`ChannelError::EndOfStream`] if the device closes the stream first,
    /// or [`ChannelError::PatternTimeout`] if time runs out first; both
    /// carry the unconsumed output.
    pub async fn expect(
        &mut self,
        patterns: &PatternSet,
        timeout: Option<Duration>,
    ) -> Result<Expectation, ChannelError> {
        if self.closed {
            return Err(ChannelError::Closed);
        }
        if patterns.is_empty() {
            return Err(ChannelError::EmptyPatternSet);
        }

        let timeout = timeout.unwrap_or(self.default_timeout);
        let start = Instant::now();
        let deadline = start + timeout;

        loop {
            if let Some(m) = self.buffer.find(patterns) {
                let consumed = self.buffer.consume(&m);
                self.last_match = Some(m.index);
                return Ok(Expectation {
                    index: m.index,
                    consumed: String::from_utf8_lossy(&consumed).into_owned(),
                    elapsed: start.elapsed(),
                });
            }

            let chunk = match tokio::time::timeout_at(deadline, self.transport.read_chunk()).await
            {
                Err(_) => {
                    return Err(ChannelError::PatternTimeout {
                        timeout,
                        partial: self.buffer.as_str_lossy().into_owned(),
                    });
                }
                Ok(Err(e)) => return Err(e.into()),
                Ok(Ok(None)) => {
                    return Err(ChannelError::EndOfStream {
                        partial: self.buffer.as_str_lossy().into_owned(),
                    });
                }
                Ok(Ok(Some(chunk))) => chunk,
            };

            trace!("{}: received {} bytes", self.host, chunk.len());
            self.transcript
                .received(&chunk)
                .map_err(ChannelError::Transcript)?;
            self.buffer.extend(&chunk);
        }
    }

    /// Close the transport and the transcript. Idempotent.
    ///
    /// The transcript is closed even when closing the transport fails.
    pub async fn close(&mut self) -> Result<(), ChannelError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let transport = self.transport.close().await;
        let transcript = self.transcript.close();

        transport?;
        transcript.map_err(ChannelError::Transcript)
    }
}

impl<T: Transport> Drop for Session<T> {
    fn drop(&mut self) {
        if !self.closed {
            warn!("session to {} dropped without close()", self.host);
        }
    }
}
