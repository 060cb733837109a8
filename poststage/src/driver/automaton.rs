//! Runs a procedure against an open session.
//!
//! The automaton walks `pending → step_1 → … → step_n → complete`. The first
//! step that fails moves it to `failed`, carrying the failure kind and the
//! step label; nothing is retried.

use std::time::Duration;

use log::{debug, info, warn};
use secrecy::{ExposeSecret, SecretString};
use tokio::time::Instant;

use super::procedure::{Input, Procedure, Step};
use crate::channel::Session;
use crate::error::{ChannelError, DriverError, Error, FailureKind, Result};
use crate::transport::Transport;

/// Values substituted for credential placeholders.
#[derive(Clone, Copy)]
pub struct Credentials<'a> {
    pub username: &'a str,
    pub password: &'a SecretString,
}

/// Where the automaton is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutomatonState {
    Pending,
    /// Executing the step at this index.
    Running(usize),
    Complete,
    Failed { kind: FailureKind, step: String },
}

/// What one step did.
#[derive(Debug, Clone)]
pub struct StepRecord {
    pub label: String,

    /// What was sent (placeholders for credentials).
    pub input: Option<String>,

    /// Index of the matched alternative; `None` for send-only steps.
    pub matched: Option<usize>,

    /// Output consumed by the step's expect.
    pub output: String,

    pub elapsed: Duration,
}

/// Report of a completed procedure.
#[derive(Debug, Clone)]
pub struct ProcedureRun {
    pub procedure: String,
    pub steps: Vec<StepRecord>,
    pub elapsed: Duration,
}

impl ProcedureRun {
    /// Matched alternative of the step labelled `label`.
    pub fn matched(&self, label: &str) -> Option<usize> {
        self.steps
            .iter()
            .find(|s| s.label == label)
            .and_then(|s| s.matched)
    }

    /// All consumed output concatenated.
    pub fn full_output(&self) -> String {
        self.steps
            .iter()
            .map(|s| s.output.as_str())
            .collect::<Vec<_>>()
            .join("")
    }
}

/// Executes one procedure, step by step.
pub struct Automaton<'p> {
    procedure: &'p Procedure,
    state: AutomatonState,
}

impl<'p> Automaton<'p> {
    pub fn new(procedure: &'p Procedure) -> Self {
        Self {
            procedure,
            state: AutomatonState::Pending,
        }
    }

    pub fn state(&self) -> &AutomatonState {
        &self.state
    }

    /// Run every step in order, then the settle delay.
    pub async fn run<T: Transport>(
        &mut self,
        session: &mut Session<T>,
        credentials: Credentials<'_>,
    ) -> Result<ProcedureRun> {
        let procedure = self.procedure;
        let start = Instant::now();
        let mut records = Vec::with_capacity(procedure.steps().len());

        debug!("{}: procedure {} starting", session.host(), procedure.name());

        for (index, step) in procedure.steps().iter().enumerate() {
            self.state = AutomatonState::Running(index);
            let record = self.run_step(session, step, credentials).await?;
            records.push(record);
        }

        if let Some(settle) = procedure.settle() {
            debug!(
                "{}: settling {:?} after {}",
                session.host(),
                settle,
                procedure.name()
            );
            tokio::time::sleep(settle).await;
        }

        self.state = AutomatonState::Complete;
        let elapsed = start.elapsed();
        info!(
            "{}: procedure {} complete in {:?}",
            session.host(),
            procedure.name(),
            elapsed
        );

        Ok(ProcedureRun {
            procedure: procedure.name().to_string(),
            steps: records,
            elapsed,
        })
    }

    async fn run_step<T: Transport>(
        &mut self,
        session: &mut Session<T>,
        step: &Step,
        credentials: Credentials<'_>,
    ) -> Result<StepRecord> {
        let start = Instant::now();

        if let Some(input) = &step.send {
            debug!(
                "{}: {}/{} send {:?}",
                session.host(),
                self.procedure.name(),
                step.label,
                input.describe()
            );
            let line = match input {
                Input::Line(text) => text.as_str(),
                Input::Username => credentials.username,
                Input::Password => credentials.password.expose_secret(),
            };
            if let Err(e) = session.send_line(line, input.is_hidden()).await {
                return Err(self.fail(session.host(), step, e));
            }
        }

        let mut record = StepRecord {
            label: step.label.clone(),
            input: step.send.as_ref().map(|i| i.describe().to_string()),
            matched: None,
            output: String::new(),
            elapsed: Duration::ZERO,
        };

        if !step.is_send_only() {
            debug!(
                "{}: {}/{} expect [{}] within {:?}",
                session.host(),
                self.procedure.name(),
                step.label,
                step.expect.describe(),
                step.timeout.unwrap_or(session.default_timeout())
            );
            match session.expect(&step.expect, step.timeout).await {
                Ok(m) => {
                    record.matched = Some(m.index);
                    record.output = m.consumed;
                }
                Err(e) => return Err(self.fail(session.host(), step, e)),
            }
        }

        record.elapsed = start.elapsed();
        Ok(record)
    }

    /// Move to `failed` and build the classified error.
    fn fail(&mut self, host: &str, step: &Step, err: ChannelError) -> Error {
        let kind = match &err {
            ChannelError::PatternTimeout { .. } => step.on_no_match,
            other => FailureKind::of_channel(other),
        };

        warn!(
            "{}: {}/{} failed ({}): {}",
            host,
            self.procedure.name(),
            step.label,
            kind,
            err
        );
        if let Some(partial) = err.partial_output().filter(|p| !p.is_empty()) {
            warn!("{}: partial output before failure: {:?}", host, partial);
        }

        self.state = AutomatonState::Failed {
            kind,
            step: step.label.clone(),
        };

        DriverError::StepFailed {
            procedure: self.procedure.name().to_string(),
            step: step.label.clone(),
            kind,
            source: err,
        }
        .into()
    }
}
