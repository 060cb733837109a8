//! SSH transport implementation using russh.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use log::{debug, warn};
use russh::client::{self, Handle, Msg};
use russh::keys::PublicKey;
use russh::{Channel, ChannelMsg};
use secrecy::ExposeSecret;

use super::Transport;
use super::config::{ConnectionParams, HostKeyVerification};
use crate::error::TransportError;

/// Terminal size requested for the console PTY.
const TERMINAL_WIDTH: u32 = 511;
const TERMINAL_HEIGHT: u32 = 24;

/// SSH transport: an authenticated russh session with one PTY shell channel.
pub struct SshTransport {
    /// The russh session handle.
    session: Handle<SshHandler>,

    /// The interactive shell channel.
    channel: Channel<Msg>,

    closed: bool,
}

impl SshTransport {
    /// Connect to the SSH server, authenticate and open a shell.
    pub async fn connect(params: &ConnectionParams) -> Result<Self, TransportError> {
        let ssh_config = Arc::new(client::Config::default());

        let host_key_error: Arc<Mutex<Option<TransportError>>> = Arc::new(Mutex::new(None));

        let handler = SshHandler {
            host: params.host.clone(),
            port: params.port(),
            host_key_verification: params.host_key_verification.clone(),
            known_hosts_path: params.known_hosts_path.clone(),
            host_key_error: host_key_error.clone(),
        };

        let dial = client::connect(ssh_config, (params.host.as_str(), params.port()), handler);
        let connected = match params.connect_timeout {
            Some(timeout) => tokio::time::timeout(timeout, dial)
                .await
                .map_err(|_| TransportError::Timeout(timeout))?,
            None => dial.await,
        };

        let mut session = connected.map_err(|e| {
            // Surface the detailed host-key error over russh's generic one.
            let stored = host_key_error
                .lock()
                .ok()
                .and_then(|mut slot| slot.take());
            stored.unwrap_or(TransportError::Ssh(e))
        })?;

        let auth = session
            .authenticate_password(params.username.as_str(), params.password.expose_secret())
            .await
            .map_err(TransportError::Ssh)?;

        if !auth.success() {
            return Err(TransportError::AuthenticationFailed {
                user: params.username.clone(),
            });
        }

        let channel = session
            .channel_open_session()
            .await
            .map_err(TransportError::Ssh)?;

        channel
            .request_pty(true, "vt100", TERMINAL_WIDTH, TERMINAL_HEIGHT, 0, 0, &[])
            .await
            .map_err(TransportError::Ssh)?;

        channel
            .request_shell(true)
            .await
            .map_err(TransportError::Ssh)?;

        debug!("ssh: shell open on {}", params.socket_addr());

        Ok(Self {
            session,
            channel,
            closed: false,
        })
    }
}

impl Transport for SshTransport {
    async fn read_chunk(&mut self) -> Result<Option<Bytes>, TransportError> {
        loop {
            match self.channel.wait().await {
                Some(ChannelMsg::Data { ref data }) => {
                    return Ok(Some(Bytes::copy_from_slice(data)));
                }
                Some(ChannelMsg::ExtendedData { ref data, .. }) => {
                    return Ok(Some(Bytes::copy_from_slice(data)));
                }
                Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => return Ok(None),
                Some(_) => continue,
            }
        }
    }

    async fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.channel.data(data).await.map_err(TransportError::Ssh)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        // The device may already have dropped the channel after `logout`.
        let _ = self.channel.eof().await;
        self.session
            .disconnect(russh::Disconnect::ByApplication, "", "en")
            .await
            .map_err(TransportError::Ssh)?;
        Ok(())
    }

    fn line_ending(&self) -> &'static str {
        "\n"
    }
}

/// SSH client handler for russh.
struct SshHandler {
    host: String,
    port: u16,
    host_key_verification: HostKeyVerification,
    known_hosts_path: Option<PathBuf>,
    /// Stores a detailed host-key error so connect() can surface it
    /// instead of the generic russh::Error::UnknownKey.
    host_key_error: Arc<Mutex<Option<TransportError>>>,
}

impl SshHandler {
    /// Check the host key against known_hosts.
    ///
    /// Returns `Ok(true)` if matched, `Ok(false)` if host not found,
    /// `Err(TransportError::HostKeyChanged)` if key changed.
    fn check_known_hosts(&self, pubkey: &PublicKey) -> Result<bool, TransportError> {
        let result = if let Some(ref path) = self.known_hosts_path {
            russh::keys::check_known_hosts_path(&self.host, self.port, pubkey, path)
        } else {
            russh::keys::check_known_hosts(&self.host, self.port, pubkey)
        };

        match result {
            Ok(matched) => Ok(matched),
            Err(russh::keys::Error::KeyChanged { line }) => Err(TransportError::HostKeyChanged {
                host: self.host.clone(),
                port: self.port,
                line,
            }),
            Err(e) => Err(TransportError::KnownHosts(e.to_string())),
        }
    }

    /// Save a new host key to known_hosts.
    fn learn_host_key(&self, pubkey: &PublicKey) -> Result<(), TransportError> {
        let result = if let Some(ref path) = self.known_hosts_path {
            russh::keys::known_hosts::learn_known_hosts_path(&self.host, self.port, pubkey, path)
        } else {
            russh::keys::known_hosts::learn_known_hosts(&self.host, self.port, pubkey)
        };

        result.map_err(|e| TransportError::KnownHosts(e.to_string()))
    }

    /// Decide whether `pubkey` is acceptable under the configured mode.
    fn verify(&self, pubkey: &PublicKey) -> Result<(), TransportError> {
        match self.host_key_verification {
            HostKeyVerification::Disabled => Ok(()),

            HostKeyVerification::AcceptNew => {
                if !self.check_known_hosts(pubkey)? {
                    if let Err(e) = self.learn_host_key(pubkey) {
                        warn!("Failed to save host key for {}: {}", self.host, e);
                    }
                }
                Ok(())
            }

            HostKeyVerification::Strict => {
                if self.check_known_hosts(pubkey)? {
                    Ok(())
                } else {
                    Err(TransportError::HostKeyUnknown {
                        host: self.host.clone(),
                        port: self.port,
                    })
                }
            }
        }
    }

    fn reject(&self, err: TransportError) -> bool {
        if let Ok(mut slot) = self.host_key_error.lock() {
            *slot = Some(err);
        }
        false
    }
}

impl client::Handler for SshHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        Ok(match self.verify(server_public_key) {
            Ok(()) => true,
            Err(e) => self.reject(e),
        })
    }
}
