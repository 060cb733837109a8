//! Platform definition: the prompts a device shows and the commands it takes.

use std::time::Duration;

use regex::bytes::Regex;

use crate::error::PlatformError;

/// Prompt patterns used to sequence a session.
#[derive(Debug, Clone)]
pub struct Prompts {
    /// Login name prompt shown on connect.
    pub login: Regex,

    /// Password prompt after the login name.
    pub password: Regex,

    /// Privileged EXEC prompt (`#`).
    pub privileged: Regex,

    /// Global configuration prompt (`(config)#`).
    pub config: Regex,
}

/// Completion and status messages the procedures wait for.
#[derive(Debug, Clone)]
pub struct Messages {
    /// New host key pair generated.
    pub key_created: Regex,

    /// A host key pair was already present.
    pub key_exists: Regex,

    /// TFTP download to flash finished.
    pub tftp_done: Regex,

    /// Flash-to-flash copy finished.
    pub flash_done: Regex,
}

/// Command strings, sent verbatim.
#[derive(Debug, Clone)]
pub struct Commands {
    pub enter_config: String,
    pub zeroize_key: String,
    pub generate_key: String,
    pub exit_config: String,
    pub copy_flash_secondary: String,
    pub save_config: String,
    pub logout: String,
}

/// Long-running step timeouts and the settle delay.
#[derive(Debug, Clone)]
pub struct Timings {
    /// Bootrom TFTP download.
    pub bootrom_copy: Duration,

    /// Primary-to-secondary flash copy.
    pub flash_copy: Duration,

    /// Pause after state-changing procedures and between sessions.
    pub settle: Duration,
}

/// All vendor-specific data the procedures are built from.
#[derive(Debug, Clone)]
pub struct PlatformDefinition {
    /// Platform name (e.g. "fastiron").
    pub name: String,
    pub prompts: Prompts,
    pub messages: Messages,
    pub commands: Commands,
    pub timings: Timings,
}

impl PlatformDefinition {
    /// The TFTP bootrom download command.
    pub fn copy_bootrom_command(&self, tftp_server: &str, bootrom: &str) -> String {
        format!("copy tftp flash {} {} bootrom", tftp_server, bootrom)
    }
}

/// Compile a named platform pattern.
pub(crate) fn compile(platform: &str, name: &str, source: &str) -> Result<Regex, PlatformError> {
    Regex::new(source).map_err(|source| PlatformError::InvalidPattern {
        platform: platform.to_string(),
        name: name.to_string(),
        source,
    })
}
