//! Result record reported to the caller.

use serde::Serialize;

use crate::error::{DriverError, Error, FailureKind};

/// Outcome of one orchestrator operation.
///
/// Serializes to the Ansible module result shape: `changed` always,
/// `failed` and `msg` only on failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultRecord {
    /// True only when every sub-procedure completed.
    pub changed: bool,

    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub failed: bool,

    /// Classified failure message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,

    /// Label of the step that failed, as `procedure/step`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_step: Option<String>,
}

impl ResultRecord {
    /// Full success.
    pub fn changed() -> Self {
        Self {
            changed: true,
            failed: false,
            msg: None,
            failed_step: None,
        }
    }

    /// Failure on `host`, classified from `err`.
    pub fn failure(host: &str, err: &Error) -> Self {
        let failed_step = match err {
            Error::Driver(DriverError::StepFailed {
                procedure, step, ..
            }) => Some(format!("{}/{}", procedure, step)),
            _ => None,
        };

        Self {
            changed: false,
            failed: true,
            msg: Some(FailureKind::of(err).message(host)),
            failed_step,
        }
    }

    /// Check if the record indicates success.
    pub fn is_success(&self) -> bool {
        !self.failed
    }
}
