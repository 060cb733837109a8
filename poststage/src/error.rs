//! Error types for poststage.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Main error type for poststage operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Transport-level errors (dialing, authentication)
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Channel operation errors (expect, send, transcript)
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Driver-level errors (procedure steps, configuration)
    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    /// Platform/vendor errors
    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),
}

/// Transport layer errors (TCP/SSH connection, authentication).
#[derive(Error, Debug)]
pub enum TransportError {
    /// Failed to connect to host
    #[error("Connection failed to {host}:{port}: {source}")]
    ConnectionFailed {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    /// SSH handshake or protocol error
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// Authentication failed
    #[error("Authentication failed for user '{user}'")]
    AuthenticationFailed { user: String },

    /// Host key is not in known_hosts (strict checking)
    #[error("Unknown host key for {host}:{port}")]
    HostKeyUnknown { host: String, port: u16 },

    /// Host key differs from the one recorded in known_hosts
    #[error("Host key for {host}:{port} changed (known_hosts line {line})")]
    HostKeyChanged { host: String, port: u16, line: usize },

    /// known_hosts could not be read or written
    #[error("known_hosts error: {0}")]
    KnownHosts(String),

    /// Connection was not established within the configured connect timeout
    #[error("Connect timed out after {0:?}")]
    Timeout(Duration),

    /// I/O error on an established connection
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Channel layer errors (pattern matching, session I/O).
#[derive(Error, Debug)]
pub enum ChannelError {
    /// The remote side closed the stream before a pattern matched
    #[error("End of stream before an expected pattern appeared")]
    EndOfStream {
        /// Unconsumed output received before the stream ended.
        partial: String,
    },

    /// No pattern matched within the allotted time
    #[error("Pattern not found within {timeout:?}")]
    PatternTimeout {
        timeout: Duration,
        /// Unconsumed output received before the timeout.
        partial: String,
    },

    /// Invalid regex pattern
    #[error("Invalid regex pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// An expect call was made with no candidate patterns
    #[error("Expect called with an empty pattern set")]
    EmptyPatternSet,

    /// Session already closed
    #[error("Session closed")]
    Closed,

    /// Transport failed underneath the session
    #[error("Session transport failed: {0}")]
    Transport(#[from] TransportError),

    /// Transcript could not be written
    #[error("Transcript I/O error: {0}")]
    Transcript(#[source] io::Error),
}

impl ChannelError {
    /// Output received but not consumed when the failure happened.
    pub fn partial_output(&self) -> Option<&str> {
        match self {
            ChannelError::EndOfStream { partial } | ChannelError::PatternTimeout { partial, .. } => {
                Some(partial)
            }
            _ => None,
        }
    }
}

/// Driver layer errors (procedure execution, configuration).
#[derive(Error, Debug)]
pub enum DriverError {
    /// A procedure step failed
    #[error("Step '{procedure}/{step}' failed: {source}")]
    StepFailed {
        procedure: String,
        step: String,
        /// Classification declared by the step for this failure.
        kind: FailureKind,
        #[source]
        source: ChannelError,
    },

    /// Invalid configuration in the builder or module parameters
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// The transcript directory or file could not be prepared
    #[error("Transcript setup failed for {path}: {source}")]
    TranscriptSetup {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// Platform/vendor definition errors.
#[derive(Error, Debug)]
pub enum PlatformError {
    /// A prompt pattern in a platform definition failed to compile
    #[error("Invalid pattern '{name}' in platform '{platform}': {source}")]
    InvalidPattern {
        platform: String,
        name: String,
        #[source]
        source: regex::Error,
    },
}

/// Classification of a terminal failure, as reported to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The transport could not be established.
    Connect,
    /// The remote side closed the session before an expected pattern.
    EndOfStream,
    /// No expected pattern within the step's allotted time.
    Timeout,
    /// The local transcript could not be written.
    Io,
    /// Parameters or platform definitions were invalid.
    Config,
}

impl FailureKind {
    /// Classify a channel failure.
    pub fn of_channel(err: &ChannelError) -> Self {
        match err {
            // A transport failing under an established session (reset,
            // broken pipe, SSH disconnect) ends the session.
            ChannelError::EndOfStream { .. } | ChannelError::Closed | ChannelError::Transport(_) => {
                FailureKind::EndOfStream
            }
            ChannelError::PatternTimeout { .. } => FailureKind::Timeout,
            ChannelError::InvalidPattern(_) | ChannelError::EmptyPatternSet => FailureKind::Config,
            ChannelError::Transcript(_) => FailureKind::Io,
        }
    }

    /// Classify any poststage error.
    pub fn of(err: &Error) -> Self {
        match err {
            Error::Transport(_) => FailureKind::Connect,
            Error::Channel(e) => Self::of_channel(e),
            Error::Driver(DriverError::StepFailed { kind, .. }) => *kind,
            Error::Driver(DriverError::InvalidConfig { .. }) => FailureKind::Config,
            Error::Driver(DriverError::TranscriptSetup { .. }) => FailureKind::Io,
            Error::Platform(_) => FailureKind::Config,
        }
    }

    /// The user-facing message for this failure on `host`.
    pub fn message(&self, host: &str) -> String {
        match self {
            FailureKind::Connect | FailureKind::EndOfStream => {
                format!("ERROR -- Unable to connect to {}", host)
            }
            FailureKind::Timeout => {
                format!("ERROR - Did not get expected values returned on {}", host)
            }
            FailureKind::Io => format!("ERROR - Session I/O failed on {}", host),
            FailureKind::Config => format!("ERROR - Invalid parameters for {}", host),
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FailureKind::Connect => "connect",
            FailureKind::EndOfStream => "end-of-stream",
            FailureKind::Timeout => "timeout",
            FailureKind::Io => "io",
            FailureKind::Config => "config",
        };
        f.write_str(name)
    }
}

/// Result type alias using poststage's Error.
pub type Result<T> = std::result::Result<T, Error>;
