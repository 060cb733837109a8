//! Platform definitions.
//!
//! A platform is pure data: the prompt patterns, status messages, command
//! strings and timings that the procedures in [`crate::driver`] are built
//! from. Only FastIron is defined.

mod definition;
pub mod fastiron;

pub use definition::{Commands, Messages, PlatformDefinition, Prompts, Timings};
