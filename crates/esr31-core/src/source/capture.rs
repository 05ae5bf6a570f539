use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use super::{LineSource, ReadOutcome, SourceError};

/// Replays a recorded serial capture, one read per line.
///
/// A blank line stands for a read that timed out; end of input ends the run.
pub struct CaptureSource<R: BufRead> {
    reader: R,
    label: String,
}

impl CaptureSource<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file), path.display().to_string()))
    }
}

impl<R: BufRead> CaptureSource<R> {
    pub fn new(reader: R, label: impl Into<String>) -> Self {
        Self {
            reader,
            label: label.into(),
        }
    }
}

impl<R: BufRead> LineSource for CaptureSource<R> {
    fn read_line(&mut self) -> Result<ReadOutcome, SourceError> {
        let mut line = Vec::new();
        if self.reader.read_until(b'\n', &mut line)? == 0 {
            return Ok(ReadOutcome::EndOfStream);
        }
        if line.iter().all(|b| matches!(b, b'\r' | b'\n')) {
            return Ok(ReadOutcome::NoData);
        }
        Ok(ReadOutcome::Line(line))
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}
