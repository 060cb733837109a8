//! Connection configuration.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use serde::Deserialize;

/// How the console session is carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Line-mode telnet over TCP (the staging console).
    #[default]
    Telnet,

    /// SSH with password authentication and a PTY shell.
    Ssh,
}

impl TransportKind {
    /// Well-known port for this transport.
    pub fn default_port(&self) -> u16 {
        match self {
            TransportKind::Telnet => 23,
            TransportKind::Ssh => 22,
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Telnet => f.write_str("telnet"),
            TransportKind::Ssh => f.write_str("ssh"),
        }
    }
}

/// Host key verification mode, analogous to OpenSSH's `StrictHostKeyChecking`.
///
/// Only consulted by the SSH transport.
#[derive(Debug, Clone, Default)]
pub enum HostKeyVerification {
    /// Reject unknown and changed keys.
    Strict,

    /// Accept and auto-learn unknown keys, but reject changed keys.
    AcceptNew,

    /// Accept all keys without checking. The default, since post-staging
    /// zeroizes and regenerates the device host key.
    #[default]
    Disabled,
}

/// Parameters for one device session. Immutable per invocation.
pub struct ConnectionParams {
    /// Target host (hostname or IP address).
    pub host: String,

    /// Port override; `None` uses the transport's well-known port.
    pub port: Option<u16>,

    /// Login username.
    pub username: String,

    /// Login password.
    pub password: SecretString,

    /// Transport carrying the console session.
    pub kind: TransportKind,

    /// Optional bound on dialing. `None` dials without a timeout, like a
    /// direct console connection.
    pub connect_timeout: Option<Duration>,

    /// SSH host key verification mode.
    pub host_key_verification: HostKeyVerification,

    /// Path to a known_hosts file (SSH only).
    pub known_hosts_path: Option<PathBuf>,
}

impl ConnectionParams {
    /// Create connection parameters for a telnet console session.
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port: None,
            username: username.into(),
            password: SecretString::from(password.into()),
            kind: TransportKind::Telnet,
            connect_timeout: None,
            host_key_verification: HostKeyVerification::default(),
            known_hosts_path: None,
        }
    }

    /// Use a different transport.
    pub fn with_kind(mut self, kind: TransportKind) -> Self {
        self.kind = kind;
        self
    }

    /// Override the port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Bound the dial with a timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// The port actually dialed.
    pub fn port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.kind.default_port())
    }

    /// Get the socket address for connection.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port())
    }
}

impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("host", &self.host)
            .field("port", &self.port())
            .field("username", &self.username)
            .field("password", &"********")
            .field("kind", &self.kind)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}
