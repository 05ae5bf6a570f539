//! Bounded read → validate → decode → accumulate loop.
//!
//! One run owns its line source and drops it on every exit path. Frames are
//! processed strictly in arrival order, so "last write wins" per field name
//! follows the wire order. Rejected lines never abort a run; only a fatal
//! `SourceError` does.

mod result;

pub use result::{AcquisitionResult, StopReason};

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, trace, warn};

use crate::protocols::esr31::{
    DecodeError, FieldMap, FrameError, Measurement, RejectReason, decode_fields, validate_frame,
};
use crate::source::{CaptureSource, LineSource, ReadOutcome, SourceError};

/// Attempt budget used by the controller's historical receiver.
pub const DEFAULT_MAX_ATTEMPTS: u64 = 12;

#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("source error: {0}")]
    Source(#[from] SourceError),
}

/// Why a single line was not accepted.
#[derive(Debug, Error)]
pub enum Rejection {
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

impl Rejection {
    pub fn reason(&self) -> RejectReason {
        match self {
            Rejection::Frame(err) => err.into(),
            Rejection::Decode(err) => err.into(),
        }
    }
}

/// When a run may end before its attempt budget is used up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopCondition {
    /// Only the budget (or end of stream) ends the run.
    #[default]
    Budget,
    /// Stop after the first accepted frame.
    FirstFrame,
    /// Stop once every field of the map has a value.
    AllFields,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquisitionOptions {
    /// `None` reads until the stop condition or end of stream.
    pub max_attempts: Option<u64>,
    pub stop: StopCondition,
}

impl Default for AcquisitionOptions {
    fn default() -> Self {
        Self {
            max_attempts: Some(DEFAULT_MAX_ATTEMPTS),
            stop: StopCondition::Budget,
        }
    }
}

/// Validate and decode one raw line.
///
/// # Examples
/// ```
/// use esr31_core::{FieldMap, RejectReason, accept_line};
///
/// let err = accept_line(b"* 70 8f 00 *", &FieldMap::esr31()).unwrap_err();
/// assert_eq!(err.reason(), RejectReason::ChecksumMismatch);
/// ```
pub fn accept_line(line: &[u8], map: &FieldMap) -> Result<Vec<Measurement>, Rejection> {
    let payload = validate_frame(line)?;
    Ok(decode_fields(&payload, map)?)
}

/// Run one acquisition with the stop policy from `options`.
///
/// # Examples
/// ```
/// use std::io::Cursor;
///
/// use esr31_core::{AcquisitionOptions, CaptureSource, FieldMap, StopReason, run};
///
/// let capture = Cursor::new(b"\n\nnot a frame\n".to_vec());
/// let source = CaptureSource::new(capture, "memory");
/// let result = run(source, &FieldMap::esr31(), AcquisitionOptions::default())?;
/// assert_eq!(result.attempts(), 3);
/// assert_eq!(result.no_data(), 2);
/// assert_eq!(result.stop_reason(), Some(StopReason::EndOfStream));
/// # Ok::<(), esr31_core::AcquisitionError>(())
/// ```
pub fn run<S: LineSource>(
    source: S,
    map: &FieldMap,
    options: AcquisitionOptions,
) -> Result<AcquisitionResult, AcquisitionError> {
    let stop = options.stop;
    run_until(source, map, options.max_attempts, |result| match stop {
        StopCondition::Budget => false,
        StopCondition::FirstFrame => result.accepted() > 0,
        StopCondition::AllFields => result.covers(map),
    })
}

/// Replay a recorded capture file through `run`.
pub fn acquire_from_capture(
    path: &Path,
    map: &FieldMap,
    options: AcquisitionOptions,
) -> Result<AcquisitionResult, AcquisitionError> {
    let source = CaptureSource::open(path)?;
    run(source, map, options)
}

/// Run one acquisition, stopping early once `done` holds.
///
/// `done` is checked after every attempt; the budget is checked before every
/// read, so a budget of `n` performs at most `n` reads.
///
/// `EndOfStream` only comes from replayed captures: it ends the run without
/// counting an attempt, so a short capture can finish below the budget.
pub fn run_until<S, P>(
    mut source: S,
    map: &FieldMap,
    max_attempts: Option<u64>,
    mut done: P,
) -> Result<AcquisitionResult, AcquisitionError>
where
    S: LineSource,
    P: FnMut(&AcquisitionResult) -> bool,
{
    let mut result = AcquisitionResult::default();

    let stop_reason = loop {
        if max_attempts.is_some_and(|max| result.attempts() >= max) {
            break StopReason::BudgetExhausted;
        }

        let attempt = result.attempts() + 1;
        match source.read_line()? {
            ReadOutcome::EndOfStream => break StopReason::EndOfStream,
            ReadOutcome::NoData => {
                debug!(attempt, "no data before read timeout");
                result.record_rejection(RejectReason::NoData);
            }
            ReadOutcome::Line(line) => {
                let text = String::from_utf8_lossy(&line);
                trace!(attempt, line = %text.trim_end(), "line received");
                match accept_line(&line, map) {
                    Ok(measurements) => {
                        debug!(attempt, fields = measurements.len(), "frame accepted");
                        result.record_frame(measurements);
                    }
                    Err(rejection) => {
                        debug!(attempt, reason = %rejection.reason(), error = %rejection, "frame rejected");
                        result.record_rejection(rejection.reason());
                    }
                }
            }
        }

        if done(&result) {
            break StopReason::ConditionMet;
        }
    };

    result.finish(stop_reason);
    info!(
        source = %source.describe(),
        attempts = result.attempts(),
        accepted = result.accepted(),
        rejected = result.rejected(),
        no_data = result.no_data(),
        stop = ?stop_reason,
        "acquisition finished"
    );
    if result.accepted() == 0 {
        warn!(source = %source.describe(), "no frame accepted during acquisition");
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::collections::VecDeque;
    use std::io::Cursor;
    use std::rc::Rc;

    use super::{AcquisitionError, AcquisitionOptions, StopCondition, StopReason, run, run_until};
    use crate::protocols::esr31::{FieldMap, MeasurementValue, RejectReason, encode_frame};
    use crate::source::{CaptureSource, LineSource, ReadOutcome, SourceError};

    struct Scripted {
        outcomes: VecDeque<Result<ReadOutcome, SourceError>>,
    }

    impl Scripted {
        fn new(outcomes: Vec<Result<ReadOutcome, SourceError>>) -> Self {
            Self {
                outcomes: outcomes.into(),
            }
        }
    }

    impl LineSource for Scripted {
        fn read_line(&mut self) -> Result<ReadOutcome, SourceError> {
            self.outcomes.pop_front().unwrap_or(Ok(ReadOutcome::NoData))
        }

        fn describe(&self) -> String {
            "scripted".to_string()
        }
    }

    /// Sets its flag when dropped, i.e. when the run releases the transport.
    struct Tracked {
        inner: Scripted,
        dropped: Rc<Cell<bool>>,
    }

    impl LineSource for Tracked {
        fn read_line(&mut self) -> Result<ReadOutcome, SourceError> {
            self.inner.read_line()
        }

        fn describe(&self) -> String {
            self.inner.describe()
        }
    }

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.dropped.set(true);
        }
    }

    fn tracked(outcomes: Vec<Result<ReadOutcome, SourceError>>) -> (Tracked, Rc<Cell<bool>>) {
        let dropped = Rc::new(Cell::new(false));
        let source = Tracked {
            inner: Scripted::new(outcomes),
            dropped: Rc::clone(&dropped),
        };
        (source, dropped)
    }

    struct Silent<'a> {
        reads: &'a mut usize,
    }

    impl LineSource for Silent<'_> {
        fn read_line(&mut self) -> Result<ReadOutcome, SourceError> {
            *self.reads += 1;
            Ok(ReadOutcome::NoData)
        }

        fn describe(&self) -> String {
            "silent".to_string()
        }
    }

    fn frame(t1: [u8; 2], o1: u8) -> ReadOutcome {
        let mut data = [0u8; 19];
        data[0..2].copy_from_slice(&t1);
        data[18] = o1;
        ReadOutcome::Line(format!("{}\r\n", encode_frame(&data)).into_bytes())
    }

    fn budget(max: u64) -> AcquisitionOptions {
        AcquisitionOptions {
            max_attempts: Some(max),
            stop: StopCondition::Budget,
        }
    }

    #[test]
    fn budget_of_twelve_reads_exactly_twelve_times() {
        let mut reads = 0;
        let source = Silent { reads: &mut reads };
        let result = run(source, &FieldMap::esr31(), budget(12)).unwrap();
        assert_eq!(reads, 12);
        assert_eq!(result.attempts(), 12);
        assert_eq!(result.accepted(), 0);
        assert_eq!(result.rejected(), 12);
        assert_eq!(result.no_data(), 12);
        assert_eq!(result.stop_reason(), Some(StopReason::BudgetExhausted));
    }

    #[test]
    fn budget_counts_invalid_lines_too() {
        let garbage: Vec<_> = (0..20)
            .map(|_| Ok(ReadOutcome::Line(b"* 70 8f 00 *\n".to_vec())))
            .collect();
        let result = run(Scripted::new(garbage), &FieldMap::esr31(), budget(12)).unwrap();
        assert_eq!(result.attempts(), 12);
        assert_eq!(result.accepted(), 0);
        assert_eq!(result.no_data(), 0);
        assert_eq!(result.rejections()[&RejectReason::ChecksumMismatch], 12);
    }

    #[test]
    fn last_write_wins_across_frames() {
        let source = Scripted::new(vec![
            Ok(frame([0xea, 0x20], 0x00)),
            Ok(frame([0x64, 0x2d], 0x01)),
        ]);
        let result = run(source, &FieldMap::esr31(), budget(2)).unwrap();
        assert_eq!(result.accepted(), 2);
        assert_eq!(
            result.get("T1").map(|m| m.value),
            Some(MeasurementValue::Celsius(342.8))
        );
        assert_eq!(
            result.get("O1").map(|m| m.value),
            Some(MeasurementValue::Flag(true))
        );
    }

    #[test]
    fn rejected_frame_leaves_result_untouched() {
        let source = Scripted::new(vec![
            Ok(frame([0xea, 0x20], 0x00)),
            Ok(ReadOutcome::Line(b"* 70 8f 64 2d 00 *\n".to_vec())),
        ]);
        let result = run(source, &FieldMap::esr31(), budget(2)).unwrap();
        assert_eq!(
            result.get("T1").map(|m| m.value),
            Some(MeasurementValue::Celsius(23.4))
        );
        assert_eq!(result.rejected(), 1);
    }

    #[test]
    fn truncated_frame_is_rejected_whole() {
        let short = ReadOutcome::Line(encode_frame(&[0xea, 0x20]).into_bytes());
        let result = run(Scripted::new(vec![Ok(short)]), &FieldMap::esr31(), budget(1)).unwrap();
        assert!(result.measurements().is_empty());
        assert_eq!(result.rejections()[&RejectReason::TruncatedPayload], 1);
    }

    #[test]
    fn first_frame_stops_early() {
        let source = Scripted::new(vec![
            Ok(ReadOutcome::NoData),
            Ok(frame([0xea, 0x20], 0x00)),
            Ok(frame([0x64, 0x2d], 0x00)),
        ]);
        let options = AcquisitionOptions {
            max_attempts: Some(12),
            stop: StopCondition::FirstFrame,
        };
        let result = run(source, &FieldMap::esr31(), options).unwrap();
        assert_eq!(result.attempts(), 2);
        assert_eq!(result.stop_reason(), Some(StopReason::ConditionMet));
        assert_eq!(
            result.get("T1").map(|m| m.value),
            Some(MeasurementValue::Celsius(23.4))
        );
    }

    #[test]
    fn all_fields_stops_once_covered() {
        let source = Scripted::new(vec![Ok(frame([0xea, 0x20], 0x01))]);
        let options = AcquisitionOptions {
            max_attempts: None,
            stop: StopCondition::AllFields,
        };
        let result = run(source, &FieldMap::esr31(), options).unwrap();
        assert_eq!(result.attempts(), 1);
        assert_eq!(result.stop_reason(), Some(StopReason::ConditionMet));
    }

    #[test]
    fn end_of_stream_ends_unbounded_run() {
        let capture = Cursor::new(format!("{}\n\n", encode_frame(&[0u8; 19])).into_bytes());
        let options = AcquisitionOptions {
            max_attempts: None,
            stop: StopCondition::Budget,
        };
        let result = run(CaptureSource::new(capture, "memory"), &FieldMap::esr31(), options)
            .unwrap();
        assert_eq!(result.attempts(), 2);
        assert_eq!(result.accepted(), 1);
        assert_eq!(result.no_data(), 1);
        assert_eq!(result.stop_reason(), Some(StopReason::EndOfStream));
    }

    #[test]
    fn fatal_source_error_aborts_run() {
        let source = Scripted::new(vec![
            Ok(ReadOutcome::NoData),
            Err(SourceError::Io(std::io::ErrorKind::BrokenPipe.into())),
        ]);
        let err = run(source, &FieldMap::esr31(), budget(12)).unwrap_err();
        assert!(matches!(err, AcquisitionError::Source(SourceError::Io(_))));
    }

    #[test]
    fn source_released_when_budget_exhausted() {
        let (source, dropped) = tracked(Vec::new());
        let result = run(source, &FieldMap::esr31(), budget(3)).unwrap();
        assert_eq!(result.stop_reason(), Some(StopReason::BudgetExhausted));
        assert!(dropped.get());
    }

    #[test]
    fn source_released_on_fatal_error() {
        let (source, dropped) = tracked(vec![Err(SourceError::Io(
            std::io::ErrorKind::BrokenPipe.into(),
        ))]);
        let err = run(source, &FieldMap::esr31(), budget(12)).unwrap_err();
        assert!(matches!(err, AcquisitionError::Source(_)));
        assert!(dropped.get());
    }

    #[test]
    fn capture_end_stops_below_budget() {
        let source = CaptureSource::new(Cursor::new(b"\n".to_vec()), "memory");
        let result = run(source, &FieldMap::esr31(), budget(12)).unwrap();
        assert_eq!(result.attempts(), 1);
        assert_eq!(result.stop_reason(), Some(StopReason::EndOfStream));
    }

    #[test]
    fn custom_predicate_sees_running_result() {
        let source = Scripted::new((0..5).map(|_| Ok(ReadOutcome::NoData)).collect());
        let result = run_until(source, &FieldMap::esr31(), Some(12), |r| r.no_data() == 3).unwrap();
        assert_eq!(result.attempts(), 3);
        assert_eq!(result.stop_reason(), Some(StopReason::ConditionMet));
    }

    #[test]
    fn zero_budget_performs_no_reads() {
        let mut reads = 0;
        let result = run(Silent { reads: &mut reads }, &FieldMap::esr31(), budget(0)).unwrap();
        assert_eq!(reads, 0);
        assert_eq!(result.attempts(), 0);
    }
}
