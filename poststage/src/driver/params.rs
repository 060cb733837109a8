//! Module parameters, as passed by Ansible.

use std::path::PathBuf;

use secrecy::SecretString;
use serde::Deserialize;

use super::builder::StageBuilder;
use crate::error::DriverError;
use crate::transport::TransportKind;

/// Operation named in the module arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    CopyBootrom,
    CopyFlashSecondary,
    GenerateSshKey,
    PostStage,
}

/// A validated operation with its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    CopyBootrom { tftp_server: String, bootrom: String },
    CopyFlashSecondary,
    GenerateSshKey,
    PostStage { tftp_server: String, bootrom: String },
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::CopyBootrom { .. } => OperationKind::CopyBootrom,
            Operation::CopyFlashSecondary => OperationKind::CopyFlashSecondary,
            Operation::GenerateSshKey => OperationKind::GenerateSshKey,
            Operation::PostStage { .. } => OperationKind::PostStage,
        }
    }
}

/// Raw module arguments.
///
/// # Example
///
/// ```rust
/// use poststage::driver::{ModuleParams, Operation};
///
/// let params: ModuleParams = serde_json::from_str(r#"{
///     "host": "10.1.1.20",
///     "username": "ansible",
///     "password": "secret",
///     "bootrom": "kxz10101.bin",
///     "tftpServer": "10.1.1.5",
///     "logfileDirectory": "/tmp/poststage",
///     "operation": "copy_bootrom"
/// }"#).unwrap();
///
/// let (_builder, operation) = params.into_stage().unwrap();
/// assert_eq!(operation, Operation::CopyBootrom {
///     tftp_server: "10.1.1.5".into(),
///     bootrom: "kxz10101.bin".into(),
/// });
/// ```
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleParams {
    pub host: String,
    pub username: String,
    pub password: SecretString,
    #[serde(default)]
    pub bootrom: Option<String>,
    #[serde(default)]
    pub tftp_server: Option<String>,
    pub logfile_directory: PathBuf,
    pub operation: OperationKind,
    #[serde(default)]
    pub transport: TransportKind,
    #[serde(default)]
    pub port: Option<u16>,
}

impl ModuleParams {
    /// Validate the arguments for the chosen operation and produce a
    /// configured builder.
    pub fn into_stage(self) -> Result<(StageBuilder, Operation), DriverError> {
        let operation = match self.operation {
            OperationKind::CopyBootrom => {
                let (tftp_server, bootrom) = image_args(self.tftp_server, self.bootrom)?;
                Operation::CopyBootrom {
                    tftp_server,
                    bootrom,
                }
            }
            OperationKind::PostStage => {
                let (tftp_server, bootrom) = image_args(self.tftp_server, self.bootrom)?;
                Operation::PostStage {
                    tftp_server,
                    bootrom,
                }
            }
            OperationKind::CopyFlashSecondary => Operation::CopyFlashSecondary,
            OperationKind::GenerateSshKey => Operation::GenerateSshKey,
        };

        let mut builder = StageBuilder::new(self.host)
            .username(self.username)
            .secret_password(self.password)
            .transport(self.transport)
            .logfile_directory(self.logfile_directory);
        if let Some(port) = self.port {
            builder = builder.port(port);
        }

        Ok((builder, operation))
    }
}

fn image_args(
    tftp_server: Option<String>,
    bootrom: Option<String>,
) -> Result<(String, String), DriverError> {
    let tftp_server = required("tftpServer", tftp_server)?;
    let bootrom = required("bootrom", bootrom)?;
    Ok((tftp_server, bootrom))
}

fn required(name: &str, value: Option<String>) -> Result<String, DriverError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(DriverError::InvalidConfig {
            message: format!("missing required argument: {}", name),
        }),
    }
}
