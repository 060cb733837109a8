//! Channel layer: the expect engine.
//!
//! This module handles the interactive session: buffering received output,
//! matching ordered alternative patterns with timeouts, and recording the
//! session transcript.

mod buffer;
mod patterns;
mod session;
pub mod transcript;

pub use buffer::{DEFAULT_MAX_BUFFER, PatternBuffer};
pub use patterns::{PatternMatch, PatternSet};
pub use session::{Expectation, Session, SessionConfig};
pub use transcript::{
    FileTranscripts, OpenMode, Transcript, TranscriptSink, TranscriptStore, prepare_log_directory,
    transcript_file_name,
};
