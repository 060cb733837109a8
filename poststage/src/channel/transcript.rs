//! Session transcripts.
//!
//! Everything sent to and received from a device is appended to a
//! transcript sink. The [`Transcript`] guard owns the sink for the
//! lifetime of one session and closes it exactly once, whether the
//! session ends cleanly, fails, or unwinds.
//!
//! Sinks are synchronous. A run drives its sessions one after another on
//! a single task, so a sink is written inline from the expect loop and
//! only ever blocks that run.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use log::{debug, warn};

/// Placeholder recorded instead of hidden input.
pub const MASK: &str = "********";

/// Destination for transcript bytes.
pub trait TranscriptSink: Send {
    /// Append `data`, sent or received, in wire order.
    fn record(&mut self, data: &[u8]) -> io::Result<()>;

    /// Flush and release the sink. Called exactly once by [`Transcript`].
    fn close(&mut self) -> io::Result<()>;
}

/// How a store should open the transcript for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Start a fresh transcript (first session of a run).
    Truncate,
    /// Continue the run's transcript (later sessions).
    Append,
}

/// Opens transcript sinks for sessions.
pub trait TranscriptStore: Send + Sync {
    fn open(&self, host: &str, mode: OpenMode) -> io::Result<Box<dyn TranscriptSink>>;
}

/// Create the transcript directory, including parents.
///
/// An existing directory is fine; an existing non-directory is an error.
pub fn prepare_log_directory(dir: &Path) -> io::Result<()> {
    fs::create_dir_all(dir)
}

/// Transcript file name for `host`.
pub fn transcript_file_name(host: &str) -> String {
    format!("{}--post-stage-log.log", host)
}

/// File-backed transcripts under one directory.
#[derive(Debug, Clone)]
pub struct FileTranscripts {
    directory: PathBuf,
}

impl FileTranscripts {
    /// Use `directory`, creating it if needed.
    pub fn new(directory: impl Into<PathBuf>) -> io::Result<Self> {
        let directory = directory.into();
        prepare_log_directory(&directory)?;
        Ok(Self { directory })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Full path of the transcript for `host`.
    pub fn path_for(&self, host: &str) -> PathBuf {
        self.directory.join(transcript_file_name(host))
    }
}

impl TranscriptStore for FileTranscripts {
    fn open(&self, host: &str, mode: OpenMode) -> io::Result<Box<dyn TranscriptSink>> {
        let path = self.path_for(host);
        let mut options = OpenOptions::new();
        options.create(true);
        match mode {
            OpenMode::Truncate => options.write(true).truncate(true),
            OpenMode::Append => options.append(true),
        };
        let file = options.open(&path)?;
        debug!("transcript: opened {} ({:?})", path.display(), mode);
        Ok(Box::new(FileTranscript {
            writer: BufWriter::new(file),
        }))
    }
}

/// Raw byte log in a file, in the order bytes crossed the wire.
pub struct FileTranscript {
    writer: BufWriter<File>,
}

impl TranscriptSink for FileTranscript {
    fn record(&mut self, data: &[u8]) -> io::Result<()> {
        self.writer.write_all(data)
    }

    fn close(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// Exclusive owner of one session's transcript sink.
pub struct Transcript {
    sink: Option<Box<dyn TranscriptSink>>,
}

impl Transcript {
    pub fn new(sink: Box<dyn TranscriptSink>) -> Self {
        Self { sink: Some(sink) }
    }

    /// A transcript that records nothing.
    pub fn disabled() -> Self {
        Self { sink: None }
    }

    /// Record bytes received from the device.
    pub fn received(&mut self, data: &[u8]) -> io::Result<()> {
        match self.sink.as_mut() {
            Some(sink) => sink.record(data),
            None => Ok(()),
        }
    }

    /// Record a line sent to the device, masking it when hidden.
    pub fn sent(&mut self, line: &[u8], line_ending: &str, hidden: bool) -> io::Result<()> {
        let Some(sink) = self.sink.as_mut() else {
            return Ok(());
        };
        if hidden {
            sink.record(MASK.as_bytes())?;
        } else {
            sink.record(line)?;
        }
        sink.record(line_ending.as_bytes())
    }

    /// Close the sink. Later calls are no-ops.
    pub fn close(&mut self) -> io::Result<()> {
        match self.sink.take() {
            Some(mut sink) => sink.close(),
            None => Ok(()),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.sink.is_none()
    }
}

impl Drop for Transcript {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("transcript: close on drop failed: {}", e);
        }
    }
}
