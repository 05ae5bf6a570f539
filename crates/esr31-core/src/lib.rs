//! ESR31 core library: telemetry frame decoding and acquisition.
//!
//! An ESR31-class solar-thermal controller prints one ASCII-wrapped hex frame
//! per line on its serial link. This crate validates those frames, maps them
//! to named measurements through a static field table, and drives a bounded
//! read loop over an unreliable line source. The result is handed to a
//! time-series sink as a set of records.
//!
//! Pipeline: `source` (line transport) -> `acquisition` (bounded loop) ->
//! `protocols::esr31` (validate, decode) -> accumulated result -> `sink`.
//! Validation and decoding are pure; all I/O lives in `source` and in the
//! caller's `MeasurementSink`.
//!
//! Invariants:
//! - A rejected line never aborts a run; only a fatal transport error does.
//! - Per field name, the last accepted frame wins.
//! - With an attempt budget of `n`, a run performs at most `n` reads.
//!
//! # Examples
//! ```no_run
//! use std::path::Path;
//!
//! use esr31_core::{AcquisitionOptions, FieldMap, acquire_from_capture, make_report};
//!
//! let result = acquire_from_capture(
//!     Path::new("capture.txt"),
//!     &FieldMap::esr31(),
//!     AcquisitionOptions::default(),
//! )?;
//! let report = make_report("capture.txt", &result);
//! println!("accepted frames: {}", report.summary.accepted);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use serde::{Deserialize, Serialize};

mod acquisition;
mod protocols;
mod sink;
mod source;

pub use acquisition::{
    AcquisitionError, AcquisitionOptions, AcquisitionResult, DEFAULT_MAX_ATTEMPTS, Rejection,
    StopCondition, StopReason, accept_line, acquire_from_capture, run, run_until,
};
pub use protocols::esr31::{
    DecodeError, DecodeRule, ESR31_FIELDS, FieldMap, FieldSpec, FrameError, Measurement,
    MeasurementKind, MeasurementValue, RejectReason, VerifiedPayload, decode_fields, encode_frame,
    validate_frame,
};
pub use sink::{
    DEFAULT_MEASUREMENT_PREFIX, FieldValue, MeasurementSink, SinkError, SinkRecord, deliver,
    line_protocol, records_from,
};
pub use source::{
    CaptureSource, LineSource, ReadOutcome, SerialLineSource, SerialSettings, SourceError,
    TimedLineReader,
};

/// Current report schema version.
pub const REPORT_VERSION: u32 = 1;
/// Default timestamp used when the caller does not stamp the report.
pub const DEFAULT_GENERATED_AT: &str = "1970-01-01T00:00:00Z";

/// Outcome of one acquisition run, with deterministic ordering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionReport {
    /// Report schema version (not the binary version).
    pub report_version: u32,
    /// Tool identification metadata.
    pub tool: ToolInfo,
    /// RFC3339 timestamp of report generation.
    pub generated_at: String,
    /// Where the lines came from.
    pub input: InputInfo,
    /// Attempt accounting.
    pub summary: AcquisitionSummary,
    /// Rejected attempts per reason, sorted by reason.
    pub rejections: Vec<RejectionSummary>,
    /// Latest value per field, sorted by name.
    pub measurements: Vec<Measurement>,
}

/// Tool metadata embedded in reports.
///
/// # Examples
/// ```
/// use esr31_core::ToolInfo;
///
/// let tool = ToolInfo {
///     name: "esr31".to_string(),
///     version: "0.1.0".to_string(),
/// };
/// assert_eq!(tool.name, "esr31");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputInfo {
    /// Source description, e.g. `serial:/dev/ttyUSB0` or a capture path.
    pub source: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionSummary {
    pub attempts: u64,
    pub accepted: u64,
    /// Every attempt that did not yield an accepted frame, including `no_data`.
    pub rejected: u64,
    /// Attempts where nothing arrived before the read timeout.
    pub no_data: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<StopReason>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectionSummary {
    pub reason: RejectReason,
    pub count: u64,
}

/// Build a report with base fields filled and empty aggregates.
///
/// # Examples
/// ```
/// use esr31_core::make_stub_report;
///
/// let report = make_stub_report("serial:/dev/ttyUSB0");
/// assert_eq!(report.report_version, esr31_core::REPORT_VERSION);
/// assert!(report.measurements.is_empty());
/// ```
pub fn make_stub_report(source: &str) -> AcquisitionReport {
    AcquisitionReport {
        report_version: REPORT_VERSION,
        tool: ToolInfo {
            name: "esr31".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        },
        generated_at: DEFAULT_GENERATED_AT.to_string(),
        input: InputInfo {
            source: source.to_string(),
        },
        summary: AcquisitionSummary {
            attempts: 0,
            accepted: 0,
            rejected: 0,
            no_data: 0,
            stop_reason: None,
        },
        rejections: vec![],
        measurements: vec![],
    }
}

/// Summarise an acquisition result.
pub fn make_report(source: &str, result: &AcquisitionResult) -> AcquisitionReport {
    let mut report = make_stub_report(source);
    report.summary = AcquisitionSummary {
        attempts: result.attempts(),
        accepted: result.accepted(),
        rejected: result.rejected(),
        no_data: result.no_data(),
        stop_reason: result.stop_reason(),
    };
    report.rejections = result
        .rejections()
        .iter()
        .map(|(reason, count)| RejectionSummary {
            reason: *reason,
            count: *count,
        })
        .collect();
    report.measurements = result.measurements().values().cloned().collect();
    report
}
