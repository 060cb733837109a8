//! Procedure orchestrator.
//!
//! Each public operation opens one session per procedure: connect, log in,
//! run the procedure, log out, close. Composite operations run their
//! sessions one after another with a settle delay in between, and stop at
//! the first failure.

use std::time::Duration;

use log::{error, info, warn};

use super::automaton::{Automaton, Credentials, ProcedureRun};
use super::params::Operation;
use super::procedure::Procedure;
use super::result::ResultRecord;
use crate::channel::{
    DEFAULT_MAX_BUFFER, OpenMode, Session, SessionConfig, Transcript, TranscriptStore,
};
use crate::error::{DriverError, FailureKind, Result};
use crate::platform::PlatformDefinition;
use crate::transport::{ConnectionParams, Connector, NetConnector, Transport};

/// Tunables shared by every session of an invocation.
#[derive(Debug, Clone)]
pub struct StageSettings {
    /// Timeout for steps that don't declare one.
    pub default_timeout: Duration,

    /// Pause after state-changing procedures and between sessions.
    pub settle_delay: Duration,

    /// Bound on dialing; `None` waits for the OS.
    pub connect_timeout: Option<Duration>,

    /// Upper bound on unconsumed output per session.
    pub max_buffer: usize,
}

impl Default for StageSettings {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(30),
            settle_delay: Duration::from_secs(5),
            connect_timeout: None,
            max_buffer: DEFAULT_MAX_BUFFER,
        }
    }
}

/// Post-staging runner for one switch.
///
/// Built with [`StageBuilder`](super::StageBuilder).
pub struct PostStage<C: Connector = NetConnector> {
    params: ConnectionParams,
    connector: C,
    transcripts: Box<dyn TranscriptStore>,
    platform: PlatformDefinition,
    settings: StageSettings,
}

impl<C: Connector> PostStage<C> {
    pub(crate) fn new(
        params: ConnectionParams,
        connector: C,
        transcripts: Box<dyn TranscriptStore>,
        platform: PlatformDefinition,
        settings: StageSettings,
    ) -> Self {
        Self {
            params,
            connector,
            transcripts,
            platform,
            settings,
        }
    }

    pub fn host(&self) -> &str {
        &self.params.host
    }

    pub fn platform(&self) -> &PlatformDefinition {
        &self.platform
    }

    pub fn settings(&self) -> &StageSettings {
        &self.settings
    }

    /// Download a bootrom image from `tftp_server`.
    pub async fn copy_bootrom(&self, tftp_server: &str, bootrom: &str) -> ResultRecord {
        let procedure = Procedure::copy_bootrom(&self.platform, tftp_server, bootrom);
        self.report(&[procedure]).await
    }

    /// Copy primary flash to secondary and save the configuration.
    pub async fn copy_flash_to_secondary(&self) -> ResultRecord {
        let procedure = Procedure::copy_flash_to_secondary(&self.platform);
        self.report(&[procedure]).await
    }

    /// Zeroize and regenerate the SSH host key.
    pub async fn generate_ssh_key(&self) -> ResultRecord {
        let procedure = Procedure::generate_ssh_key(&self.platform);
        self.report(&[procedure]).await
    }

    /// Full post-staging: key generation, bootrom copy, then flash copy,
    /// each in its own session.
    pub async fn post_stage(&self, tftp_server: &str, bootrom: &str) -> ResultRecord {
        let procedures = [
            Procedure::generate_ssh_key(&self.platform),
            Procedure::copy_bootrom(&self.platform, tftp_server, bootrom),
            Procedure::copy_flash_to_secondary(&self.platform),
        ];
        self.report(&procedures).await
    }

    /// Run `operation`.
    pub async fn run(&self, operation: &Operation) -> ResultRecord {
        match operation {
            Operation::CopyBootrom {
                tftp_server,
                bootrom,
            } => self.copy_bootrom(tftp_server, bootrom).await,
            Operation::CopyFlashSecondary => self.copy_flash_to_secondary().await,
            Operation::GenerateSshKey => self.generate_ssh_key().await,
            Operation::PostStage {
                tftp_server,
                bootrom,
            } => self.post_stage(tftp_server, bootrom).await,
        }
    }

    /// Run `procedures`, one session each, and return their reports.
    ///
    /// The first session truncates the host's transcript and later ones
    /// append to it. Stops at the first failure.
    pub async fn execute(&self, procedures: &[Procedure]) -> Result<Vec<ProcedureRun>> {
        let mut runs = Vec::with_capacity(procedures.len());

        for (index, procedure) in procedures.iter().enumerate() {
            let mode = if index == 0 {
                OpenMode::Truncate
            } else {
                info!(
                    "{}: waiting {:?} before next session",
                    self.host(),
                    self.settings.settle_delay
                );
                tokio::time::sleep(self.settings.settle_delay).await;
                OpenMode::Append
            };

            runs.push(self.run_session(procedure, mode).await?);
        }

        info!("Post-Staging commands finished on {}", self.host());
        Ok(runs)
    }

    async fn report(&self, procedures: &[Procedure]) -> ResultRecord {
        match self.execute(procedures).await {
            Ok(_) => ResultRecord::changed(),
            Err(e) => {
                error!(
                    "{} error on {}: {}",
                    FailureKind::of(&e),
                    self.host(),
                    e
                );
                ResultRecord::failure(self.host(), &e)
            }
        }
    }

    /// One session: connect, log in, run `procedure`, log out, close.
    async fn run_session(&self, procedure: &Procedure, mode: OpenMode) -> Result<ProcedureRun> {
        let host = self.host();
        let transport = self.connector.connect(&self.params).await?;

        let sink = match self.transcripts.open(host, mode) {
            Ok(sink) => sink,
            Err(source) => {
                let mut transport = transport;
                if let Err(e) = transport.close().await {
                    warn!("{}: close after transcript failure: {}", host, e);
                }
                return Err(DriverError::TranscriptSetup {
                    path: host.to_string(),
                    source,
                }
                .into());
            }
        };

        let config = SessionConfig {
            default_timeout: self.settings.default_timeout,
            max_buffer: self.settings.max_buffer,
        };
        let mut session = Session::new(host, transport, Transcript::new(sink), &config);

        let outcome = self.drive(&mut session, procedure).await;

        match (outcome, session.close().await) {
            (Ok(run), Ok(())) => Ok(run),
            (Ok(run), Err(e)) => {
                // The work is done; a failed hang-up doesn't undo it.
                warn!("{}: close failed after {}: {}", host, procedure.name(), e);
                Ok(run)
            }
            (Err(e), close) => {
                if let Err(close_err) = close {
                    warn!("{}: close failed after error: {}", host, close_err);
                }
                Err(e)
            }
        }
    }

    async fn drive<T: Transport>(
        &self,
        session: &mut Session<T>,
        procedure: &Procedure,
    ) -> Result<ProcedureRun> {
        let credentials = Credentials {
            username: &self.params.username,
            password: &self.params.password,
        };

        let login = Procedure::login(&self.platform, self.params.kind);
        Automaton::new(&login).run(session, credentials).await?;
        info!(
            "Logged into {}, executing {}",
            self.host(),
            procedure.name()
        );

        let run = Automaton::new(procedure).run(session, credentials).await?;
        info!("{}: {} complete", self.host(), procedure.name());

        let logout = Procedure::logout(&self.platform);
        Automaton::new(&logout).run(session, credentials).await?;

        Ok(run)
    }
}
