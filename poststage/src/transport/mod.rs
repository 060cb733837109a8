//! Transport layer: raw bidirectional byte streams to a device console.
//!
//! A [`Transport`] moves bytes; everything above it (pattern matching,
//! transcripts, procedures) is transport-agnostic. A [`Connector`] dials a
//! transport from [`ConnectionParams`] and is the seam tests use to attach
//! a simulated device.

pub mod config;
mod ssh;
mod telnet;

use std::future::Future;

use bytes::Bytes;
use log::info;
use tokio::net::TcpStream;

pub use config::{ConnectionParams, HostKeyVerification, TransportKind};
pub use ssh::SshTransport;
pub use telnet::{TelnetCodec, TelnetTransport};

use crate::error::TransportError;

/// A character stream to one device.
pub trait Transport: Send {
    /// Read the next chunk of application data.
    ///
    /// Returns `Ok(None)` once the remote side has closed the stream.
    fn read_chunk(&mut self) -> impl Future<Output = Result<Option<Bytes>, TransportError>> + Send;

    /// Write all of `data`.
    fn write_all(&mut self, data: &[u8]) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Close the stream. Idempotent.
    fn close(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Line terminator appended by `send_line`.
    fn line_ending(&self) -> &'static str;
}

/// Factory for transports.
pub trait Connector: Send + Sync {
    /// The transport this connector produces.
    type Transport: Transport;

    /// Establish a transport to the device described by `params`.
    fn connect(
        &self,
        params: &ConnectionParams,
    ) -> impl Future<Output = Result<Self::Transport, TransportError>> + Send;
}

/// Connector that dials real devices over telnet or SSH.
#[derive(Debug, Clone, Copy, Default)]
pub struct NetConnector;

impl Connector for NetConnector {
    type Transport = DeviceTransport;

    async fn connect(&self, params: &ConnectionParams) -> Result<DeviceTransport, TransportError> {
        info!("Connecting to switch: {} via {}", params.host, params.kind);
        match params.kind {
            TransportKind::Telnet => Ok(DeviceTransport::Telnet(
                TelnetTransport::connect(params).await?,
            )),
            TransportKind::Ssh => Ok(DeviceTransport::Ssh(SshTransport::connect(params).await?)),
        }
    }
}

/// A transport produced by [`NetConnector`].
pub enum DeviceTransport {
    Telnet(TelnetTransport<TcpStream>),
    Ssh(SshTransport),
}

impl Transport for DeviceTransport {
    async fn read_chunk(&mut self) -> Result<Option<Bytes>, TransportError> {
        match self {
            DeviceTransport::Telnet(t) => t.read_chunk().await,
            DeviceTransport::Ssh(t) => t.read_chunk().await,
        }
    }

    async fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError> {
        match self {
            DeviceTransport::Telnet(t) => t.write_all(data).await,
            DeviceTransport::Ssh(t) => t.write_all(data).await,
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        match self {
            DeviceTransport::Telnet(t) => t.close().await,
            DeviceTransport::Ssh(t) => t.close().await,
        }
    }

    fn line_ending(&self) -> &'static str {
        match self {
            DeviceTransport::Telnet(t) => t.line_ending(),
            DeviceTransport::Ssh(t) => t.line_ending(),
        }
    }
}
