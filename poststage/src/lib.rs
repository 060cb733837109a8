//! # poststage
//!
//! Async post-staging automation for Brocade / Ruckus ICX FastIron switches.
//!
//! A freshly staged switch is driven over its console session (telnet or
//! SSH) through a fixed set of expect-style procedures: regenerate the SSH
//! host key, download a bootrom from a TFTP server, copy the primary flash
//! image to secondary and save the configuration.
//!
//! ## Layers
//!
//! - [`transport`]: raw byte streams (telnet with IAC negotiation, SSH via russh)
//! - [`channel`]: the expect engine (pattern buffer, ordered alternatives,
//!   timeouts, transcript)
//! - [`platform`]: FastIron prompts, messages, commands and timings
//! - [`driver`]: procedures, the step automaton and the orchestrator
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use poststage::StageBuilder;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), poststage::Error> {
//!     let stage = StageBuilder::new("10.1.1.20")
//!         .username("ansible")
//!         .password("secret")
//!         .logfile_directory("/var/log/poststage")
//!         .build()?;
//!
//!     let result = stage.post_stage("10.1.1.5", "kxz10101.bin").await;
//!     println!("{}", serde_json::to_string(&result).unwrap());
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod driver;
pub mod error;
pub mod platform;
pub mod transport;

// Re-export main types for convenience
pub use driver::{ModuleParams, Operation, PostStage, ResultRecord, StageBuilder};
pub use error::{Error, FailureKind};
pub use platform::PlatformDefinition;
pub use transport::{ConnectionParams, TransportKind};
