use std::io::{BufRead, BufReader, ErrorKind, Read};
use std::time::Duration;

use serialport::SerialPort;
use tracing::debug;

use super::{LineSource, ReadOutcome, SourceError};

/// Parameters for opening the controller's serial link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialSettings {
    pub device: String,
    pub baud_rate: u32,
    pub timeout: Duration,
}

/// Line reader with serial-style timeout semantics.
///
/// A read that times out before any byte arrives yields `NoData`; one that
/// times out mid-line yields the partial line. Any other I/O error is fatal.
pub struct TimedLineReader<R: Read> {
    reader: BufReader<R>,
    label: String,
}

impl<R: Read> TimedLineReader<R> {
    pub fn new(inner: R, label: impl Into<String>) -> Self {
        Self {
            reader: BufReader::new(inner),
            label: label.into(),
        }
    }
}

impl<R: Read> LineSource for TimedLineReader<R> {
    fn read_line(&mut self) -> Result<ReadOutcome, SourceError> {
        let mut line = Vec::new();
        match self.reader.read_until(b'\n', &mut line) {
            Ok(0) => Ok(ReadOutcome::NoData),
            Ok(_) => Ok(ReadOutcome::Line(line)),
            Err(err) if is_timeout(&err) => {
                if line.is_empty() {
                    Ok(ReadOutcome::NoData)
                } else {
                    debug!(bytes = line.len(), "read timed out mid-line");
                    Ok(ReadOutcome::Line(line))
                }
            }
            Err(err) => Err(SourceError::Io(err)),
        }
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}

fn is_timeout(err: &std::io::Error) -> bool {
    matches!(err.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock)
}

/// Serial device source (8N1, no flow control).
pub type SerialLineSource = TimedLineReader<Box<dyn SerialPort>>;

impl TimedLineReader<Box<dyn SerialPort>> {
    pub fn open(settings: &SerialSettings) -> Result<Self, SourceError> {
        let port = serialport::new(&settings.device, settings.baud_rate)
            .timeout(settings.timeout)
            .data_bits(serialport::DataBits::Eight)
            .stop_bits(serialport::StopBits::One)
            .parity(serialport::Parity::None)
            .flow_control(serialport::FlowControl::None)
            .open()
            .map_err(|e| SourceError::Serial {
                device: settings.device.clone(),
                message: e.to_string(),
            })?;
        debug!(
            device = %settings.device,
            baud_rate = settings.baud_rate,
            timeout_ms = settings.timeout.as_millis() as u64,
            "serial port opened"
        );
        Ok(Self::new(port, format!("serial:{}", settings.device)))
    }
}
