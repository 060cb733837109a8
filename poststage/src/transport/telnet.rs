//! Telnet transport: a TCP byte stream with NVT option negotiation.
//!
//! The negotiation is handled by [`TelnetCodec`], a sans-IO state machine
//! that separates application data from IAC command sequences and produces
//! the replies to send back. [`TelnetTransport`] drives it over any
//! `AsyncRead + AsyncWrite` stream.

use bytes::{BufMut, Bytes, BytesMut};
use log::{debug, trace};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use super::Transport;
use super::config::ConnectionParams;
use crate::error::TransportError;

const IAC: u8 = 255;
const DONT: u8 = 254;
const DO: u8 = 253;
const WONT: u8 = 252;
const WILL: u8 = 251;
const SB: u8 = 250;
const SE: u8 = 240;

const CR: u8 = b'\r';
const NUL: u8 = 0;

/// Telnet option: echo (RFC 857).
pub const OPT_ECHO: u8 = 1;
/// Telnet option: suppress go-ahead (RFC 858).
pub const OPT_SGA: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Data,
    /// Previous byte was a bare CR.
    Cr,
    Iac,
    Negotiate(u8),
    Sub,
    SubIac,
}

/// Sans-IO telnet decoder.
///
/// Accepts the server echoing and suppressing go-ahead, refuses every
/// other option. A reply is only produced when an option changes state,
/// so a chatty peer cannot drive a negotiation loop.
#[derive(Debug)]
pub struct TelnetCodec {
    state: State,
    /// Options the remote side is enabled for (WILL acknowledged).
    remote: [bool; 256],
    /// Options we are enabled for (DO acknowledged).
    local: [bool; 256],
    /// Options we've already refused, per direction.
    refused_remote: [bool; 256],
    refused_local: [bool; 256],
}

impl Default for TelnetCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl TelnetCodec {
    pub fn new() -> Self {
        Self {
            state: State::Data,
            remote: [false; 256],
            local: [false; 256],
            refused_remote: [false; 256],
            refused_local: [false; 256],
        }
    }

    /// Decode `input`, appending application data to `data` and any
    /// negotiation replies to `replies`.
    pub fn decode(&mut self, input: &[u8], data: &mut BytesMut, replies: &mut BytesMut) {
        let mut rest = input;
        while !rest.is_empty() {
            // Fast path: copy a run of plain bytes up to the next IAC.
            if self.state == State::Data {
                let run = memchr::memchr2(IAC, CR, rest).unwrap_or(rest.len());
                data.extend_from_slice(&rest[..run]);
                rest = &rest[run..];
                if rest.is_empty() {
                    break;
                }
            }

            let byte = rest[0];
            rest = &rest[1..];
            self.state = match (self.state, byte) {
                (State::Data, IAC) => State::Iac,
                (State::Data, CR) => {
                    data.put_u8(CR);
                    State::Cr
                }
                (State::Data, b) => {
                    data.put_u8(b);
                    State::Data
                }
                // CR NUL is a bare carriage return on the wire.
                (State::Cr, NUL) => State::Data,
                (State::Cr, IAC) => State::Iac,
                (State::Cr, CR) => {
                    data.put_u8(CR);
                    State::Cr
                }
                (State::Cr, b) => {
                    data.put_u8(b);
                    State::Data
                }
                (State::Iac, IAC) => {
                    data.put_u8(IAC);
                    State::Data
                }
                (State::Iac, cmd @ (WILL | WONT | DO | DONT)) => State::Negotiate(cmd),
                (State::Iac, SB) => State::Sub,
                // NOP, GA, DM and friends carry no payload.
                (State::Iac, _) => State::Data,
                (State::Negotiate(cmd), option) => {
                    self.negotiate(cmd, option, replies);
                    State::Data
                }
                (State::Sub, IAC) => State::SubIac,
                (State::Sub, _) => State::Sub,
                (State::SubIac, SE) => State::Data,
                (State::SubIac, _) => State::Sub,
            };
        }
    }

    fn negotiate(&mut self, cmd: u8, option: u8, replies: &mut BytesMut) {
        let idx = option as usize;
        match cmd {
            WILL => {
                if Self::accept_remote(option) {
                    if !self.remote[idx] {
                        self.remote[idx] = true;
                        replies.put_slice(&[IAC, DO, option]);
                    }
                } else if !self.refused_remote[idx] {
                    self.refused_remote[idx] = true;
                    replies.put_slice(&[IAC, DONT, option]);
                }
            }
            WONT => {
                if self.remote[idx] {
                    self.remote[idx] = false;
                    replies.put_slice(&[IAC, DONT, option]);
                }
            }
            DO => {
                if Self::accept_local(option) {
                    if !self.local[idx] {
                        self.local[idx] = true;
                        replies.put_slice(&[IAC, WILL, option]);
                    }
                } else if !self.refused_local[idx] {
                    self.refused_local[idx] = true;
                    replies.put_slice(&[IAC, WONT, option]);
                }
            }
            DONT => {
                if self.local[idx] {
                    self.local[idx] = false;
                    replies.put_slice(&[IAC, WONT, option]);
                }
            }
            _ => {}
        }
        trace!("telnet: cmd={} option={}", cmd, option);
    }

    fn accept_remote(option: u8) -> bool {
        matches!(option, OPT_ECHO | OPT_SGA)
    }

    fn accept_local(option: u8) -> bool {
        option == OPT_SGA
    }

    /// Whether the remote side has agreed to echo.
    pub fn remote_echo(&self) -> bool {
        self.remote[OPT_ECHO as usize]
    }

    /// Escape outgoing application data (IAC doubling).
    pub fn encode(data: &[u8]) -> Bytes {
        if memchr::memchr(IAC, data).is_none() {
            return Bytes::copy_from_slice(data);
        }
        let mut out = BytesMut::with_capacity(data.len() + 8);
        for &b in data {
            if b == IAC {
                out.put_slice(&[IAC, IAC]);
            } else {
                out.put_u8(b);
            }
        }
        out.freeze()
    }
}

/// Telnet transport over any async byte stream.
pub struct TelnetTransport<S> {
    stream: S,
    codec: TelnetCodec,
    read_buf: Vec<u8>,
    closed: bool,
}

impl TelnetTransport<TcpStream> {
    /// Dial the console port.
    ///
    /// Without `connect_timeout` this blocks until the OS gives up.
    pub async fn connect(params: &ConnectionParams) -> Result<Self, TransportError> {
        let addr = (params.host.as_str(), params.port());
        let dial = TcpStream::connect(addr);

        let stream = match params.connect_timeout {
            Some(timeout) => tokio::time::timeout(timeout, dial)
                .await
                .map_err(|_| TransportError::Timeout(timeout))?,
            None => dial.await,
        }
        .map_err(|source| TransportError::ConnectionFailed {
            host: params.host.clone(),
            port: params.port(),
            source,
        })?;

        stream.set_nodelay(true)?;
        debug!("telnet: connected to {}", params.socket_addr());
        Ok(Self::new(stream))
    }
}

impl<S> TelnetTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wrap an already established stream.
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            codec: TelnetCodec::new(),
            read_buf: vec![0u8; 4096],
            closed: false,
        }
    }

    /// The negotiation state.
    pub fn codec(&self) -> &TelnetCodec {
        &self.codec
    }
}

impl<S> Transport for TelnetTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn read_chunk(&mut self) -> Result<Option<Bytes>, TransportError> {
        loop {
            let n = match self.stream.read(&mut self.read_buf).await {
                Ok(n) => n,
                Err(e) if is_disconnect(&e) => {
                    debug!("telnet peer went away: {}", e);
                    return Ok(None);
                }
                Err(e) => return Err(e.into()),
            };
            if n == 0 {
                return Ok(None);
            }

            let mut data = BytesMut::with_capacity(n);
            let mut replies = BytesMut::new();
            self.codec
                .decode(&self.read_buf[..n], &mut data, &mut replies);

            if !replies.is_empty() {
                self.stream.write_all(&replies).await?;
                self.stream.flush().await?;
            }

            // A chunk made only of negotiation yields nothing; keep reading.
            if !data.is_empty() {
                return Ok(Some(data.freeze()));
            }
        }
    }

    async fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let encoded = TelnetCodec::encode(data);
        self.stream.write_all(&encoded).await?;
        self.stream.flush().await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.stream.shutdown().await?;
        Ok(())
    }

    fn line_ending(&self) -> &'static str {
        "\r\n"
    }
}

/// Read errors that mean the remote end dropped the connection.
fn is_disconnect(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::UnexpectedEof
    )
}
