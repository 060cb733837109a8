//! Builder for post-staging runners.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use super::orchestrator::{PostStage, StageSettings};
use crate::channel::{FileTranscripts, TranscriptStore};
use crate::error::{DriverError, Result};
use crate::platform::fastiron;
use crate::transport::{
    ConnectionParams, Connector, HostKeyVerification, NetConnector, TransportKind,
};

/// Builder for constructing a [`PostStage`] runner.
///
/// # Example
///
/// ```rust,no_run
/// use poststage::driver::StageBuilder;
///
/// # async fn example() -> Result<(), poststage::Error> {
/// let stage = StageBuilder::new("10.1.1.20")
///     .username("ansible")
///     .password("secret")
///     .logfile_directory("/var/log/poststage")
///     .build()?;
///
/// let result = stage.copy_bootrom("10.1.1.5", "kxz10101.bin").await;
/// assert!(result.changed);
/// # Ok(())
/// # }
/// ```
pub struct StageBuilder {
    host: String,
    port: Option<u16>,
    username: Option<String>,
    password: Option<SecretString>,
    kind: TransportKind,
    host_key_verification: HostKeyVerification,
    known_hosts_path: Option<PathBuf>,
    logfile_directory: Option<PathBuf>,
    transcripts: Option<Box<dyn TranscriptStore>>,
    settings: StageSettings,
}

impl StageBuilder {
    /// Create a new builder for the specified switch.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
            username: None,
            password: None,
            kind: TransportKind::default(),
            host_key_verification: HostKeyVerification::default(),
            known_hosts_path: None,
            logfile_directory: None,
            transcripts: None,
            settings: StageSettings::default(),
        }
    }

    /// Set the username for login.
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Set the password for login.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(SecretString::from(password.into()));
        self
    }

    /// Set the password from an already-wrapped secret.
    pub fn secret_password(mut self, password: SecretString) -> Self {
        self.password = Some(password);
        self
    }

    /// Set the transport (default: telnet).
    pub fn transport(mut self, kind: TransportKind) -> Self {
        self.kind = kind;
        self
    }

    /// Override the port (default: the transport's well-known port).
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Bound the dial with a timeout (default: none).
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.settings.connect_timeout = Some(timeout);
        self
    }

    /// Set the timeout for steps that don't declare one (default: 30s).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.settings.default_timeout = timeout;
        self
    }

    /// Set the settle delay (default: 5s).
    pub fn settle_delay(mut self, delay: Duration) -> Self {
        self.settings.settle_delay = delay;
        self
    }

    /// Set the bound on unconsumed buffered output.
    pub fn max_buffer(mut self, bytes: usize) -> Self {
        self.settings.max_buffer = bytes;
        self
    }

    /// Write transcripts under `dir`, creating it if needed.
    pub fn logfile_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.logfile_directory = Some(dir.into());
        self
    }

    /// Use a custom transcript store instead of a directory.
    pub fn transcript_store(mut self, store: impl TranscriptStore + 'static) -> Self {
        self.transcripts = Some(Box::new(store));
        self
    }

    /// Set SSH host key verification (default: disabled).
    pub fn host_key_verification(mut self, mode: HostKeyVerification) -> Self {
        self.host_key_verification = mode;
        self
    }

    /// Set the known_hosts file used by SSH host key verification.
    pub fn known_hosts(mut self, path: impl Into<PathBuf>) -> Self {
        self.known_hosts_path = Some(path.into());
        self
    }

    /// Build a runner that dials real switches.
    pub fn build(self) -> Result<PostStage<NetConnector>> {
        self.build_with(NetConnector)
    }

    /// Build a runner that obtains transports from `connector`.
    ///
    /// Nothing is dialed until an operation runs.
    pub fn build_with<C: Connector>(self, connector: C) -> Result<PostStage<C>> {
        if self.host.trim().is_empty() {
            return Err(invalid("host is required"));
        }
        let username = self.username.ok_or_else(|| invalid("username is required"))?;
        let password = self.password.ok_or_else(|| invalid("password is required"))?;

        let transcripts: Box<dyn TranscriptStore> = match (self.transcripts, self.logfile_directory)
        {
            (Some(store), _) => store,
            (None, Some(dir)) => {
                let store = FileTranscripts::new(&dir).map_err(|source| {
                    DriverError::TranscriptSetup {
                        path: dir.display().to_string(),
                        source,
                    }
                })?;
                Box::new(store)
            }
            (None, None) => return Err(invalid("logfile directory is required")),
        };

        let mut platform = fastiron::platform()?;
        platform.timings.settle = self.settings.settle_delay;

        let params = ConnectionParams {
            host: self.host,
            port: self.port,
            username,
            password,
            kind: self.kind,
            connect_timeout: self.settings.connect_timeout,
            host_key_verification: self.host_key_verification,
            known_hosts_path: self.known_hosts_path,
        };

        Ok(PostStage::new(
            params,
            connector,
            transcripts,
            platform,
            self.settings,
        ))
    }
}

fn invalid(message: &str) -> crate::Error {
    DriverError::InvalidConfig {
        message: message.to_string(),
    }
    .into()
}
