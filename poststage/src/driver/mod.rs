//! High-level post-staging driver.
//!
//! The driver layer turns platform data into [`Procedure`]s, runs them on a
//! session with the [`Automaton`], and sequences sessions per operation in
//! [`PostStage`]. Every operation reports a [`ResultRecord`].

mod automaton;
mod builder;
mod orchestrator;
mod params;
mod procedure;
mod result;

pub use automaton::{Automaton, AutomatonState, Credentials, ProcedureRun, StepRecord};
pub use builder::StageBuilder;
pub use orchestrator::{PostStage, StageSettings};
pub use params::{ModuleParams, Operation, OperationKind};
pub use procedure::{Input, Procedure, Step};
pub use result::ResultRecord;
