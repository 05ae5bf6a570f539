//! Handoff of an acquisition result to a time-series sink.
//!
//! The core only shapes records and renders InfluxDB line protocol; the
//! transport to the database is supplied by the caller through
//! `MeasurementSink`. Delivery is best-effort and happens at most once per
//! run, after acquisition is complete.

pub mod line_protocol;

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::acquisition::AcquisitionResult;
use crate::protocols::esr31::{FieldMap, MeasurementValue};

/// Measurement-name prefix historically used in the database.
pub const DEFAULT_MEASUREMENT_PREFIX: &str = "SOLAR";

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Float(f64),
    Integer(i64),
}

impl From<MeasurementValue> for FieldValue {
    fn from(value: MeasurementValue) -> Self {
        match value {
            MeasurementValue::Celsius(celsius) => FieldValue::Float(celsius),
            MeasurementValue::Flag(flag) => FieldValue::Integer(i64::from(flag)),
        }
    }
}

/// One point for the sink: `{measurement, fields: {kind_label -> value}}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SinkRecord {
    pub measurement: String,
    pub fields: BTreeMap<String, FieldValue>,
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink transport error: {0}")]
    Transport(String),
    #[error("sink rejected write (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },
}

pub trait MeasurementSink {
    fn write(&mut self, records: &[SinkRecord]) -> Result<(), SinkError>;
}

/// Build sink records in field-map order, naming each `prefix + field`.
///
/// # Examples
/// ```
/// use esr31_core::{AcquisitionResult, FieldMap, records_from};
///
/// let records = records_from(&AcquisitionResult::default(), &FieldMap::esr31(), "SOLAR");
/// assert!(records.is_empty());
/// ```
pub fn records_from(result: &AcquisitionResult, map: &FieldMap, prefix: &str) -> Vec<SinkRecord> {
    map.names()
        .filter_map(|name| result.get(name))
        .map(|measurement| SinkRecord {
            measurement: format!("{prefix}{}", measurement.name),
            fields: BTreeMap::from([(
                measurement.kind.label().to_string(),
                FieldValue::from(measurement.value),
            )]),
        })
        .collect()
}

/// Write `records` once; an empty set is not sent.
///
/// Returns the number of records handed to the sink.
pub fn deliver<K: MeasurementSink + ?Sized>(
    sink: &mut K,
    records: &[SinkRecord],
) -> Result<usize, SinkError> {
    if records.is_empty() {
        debug!("nothing to deliver");
        return Ok(0);
    }
    sink.write(records)?;
    debug!(records = records.len(), "records delivered");
    Ok(records.len())
}
