//! Line-oriented transports feeding the acquisition loop.
//!
//! A `LineSource` yields one raw line per read, blocking at most for its own
//! read timeout. `NoData` (timeout, nothing received) is an ordinary outcome;
//! only unrecoverable transport failures are errors.

mod capture;
mod serial;

pub use capture::CaptureSource;
pub use serial::{SerialLineSource, SerialSettings, TimedLineReader};

use thiserror::Error;

/// Result of a single read on a line source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Bytes received for one read, possibly partial, not yet validated.
    Line(Vec<u8>),
    /// The read timed out without data.
    NoData,
    /// The source is exhausted and will not produce further lines.
    EndOfStream,
}

pub trait LineSource {
    fn read_line(&mut self) -> Result<ReadOutcome, SourceError>;

    /// Human-readable description used in reports.
    fn describe(&self) -> String;
}

impl<S: LineSource + ?Sized> LineSource for Box<S> {
    fn read_line(&mut self) -> Result<ReadOutcome, SourceError> {
        (**self).read_line()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serial port error ({device}): {message}")]
    Serial { device: String, message: String },
}
