use serde::{Deserialize, Serialize};

use super::error::DecodeError;
use super::layout;
use super::parser::VerifiedPayload;
use super::reader::PayloadReader;

/// Kind of a decoded measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasurementKind {
    /// Signed decimal in °C, one decimal place.
    Temperature,
    /// Discrete on/off state.
    State,
}

impl MeasurementKind {
    /// Field key used when the measurement is written to the sink.
    pub fn label(self) -> &'static str {
        match self {
            MeasurementKind::Temperature => "temp",
            MeasurementKind::State => "state",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MeasurementValue {
    Celsius(f64),
    Flag(bool),
}

/// One named value decoded from an accepted frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub name: String,
    pub kind: MeasurementKind,
    pub value: MeasurementValue,
}

/// How a field is located and interpreted within a verified payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeRule {
    /// Two bytes `(lo, hi)` starting at `lo_offset`.
    Temperature { lo_offset: usize },
    /// One byte at `offset`, tested against `mask`.
    State { offset: usize, mask: u8 },
}

impl DecodeRule {
    pub fn kind(&self) -> MeasurementKind {
        match self {
            DecodeRule::Temperature { .. } => MeasurementKind::Temperature,
            DecodeRule::State { .. } => MeasurementKind::State,
        }
    }

    /// Minimum payload length needed to apply this rule, saturating at
    /// `usize::MAX` for offsets no payload can reach.
    pub fn required_len(&self) -> usize {
        match self {
            DecodeRule::Temperature { lo_offset } => lo_offset.saturating_add(2),
            DecodeRule::State { offset, .. } => offset.saturating_add(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub rule: DecodeRule,
}

/// Known ESR31 layout. Unmapped bytes (the remaining sensors and outputs)
/// are present on the wire but not decoded.
pub const ESR31_FIELDS: &[FieldSpec] = &[
    FieldSpec {
        name: "T1",
        rule: DecodeRule::Temperature {
            lo_offset: layout::T1_RANGE.start,
        },
    },
    FieldSpec {
        name: "T2",
        rule: DecodeRule::Temperature {
            lo_offset: layout::T2_RANGE.start,
        },
    },
    FieldSpec {
        name: "T3",
        rule: DecodeRule::Temperature {
            lo_offset: layout::T3_RANGE.start,
        },
    },
    FieldSpec {
        name: "O1",
        rule: DecodeRule::State {
            offset: layout::O1_OFFSET,
            mask: layout::O1_MASK,
        },
    },
];

/// Ordered, static table of named fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldMap {
    fields: &'static [FieldSpec],
}

impl FieldMap {
    pub const fn new(fields: &'static [FieldSpec]) -> Self {
        Self { fields }
    }

    pub const fn esr31() -> Self {
        Self::new(ESR31_FIELDS)
    }

    pub fn fields(&self) -> &'static [FieldSpec] {
        self.fields
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|field| field.name)
    }

    pub fn get(&self, name: &str) -> Option<&'static FieldSpec> {
        self.fields.iter().find(|field| field.name == name)
    }
}

impl Default for FieldMap {
    fn default() -> Self {
        Self::esr31()
    }
}

/// Decode every field of `map` from `payload`, in map order.
///
/// All-or-nothing: if any field lies beyond the payload, the whole frame is
/// reported as `TruncatedPayload`.
///
/// # Examples
/// ```
/// use esr31_core::{FieldMap, MeasurementValue, decode_fields, encode_frame, validate_frame};
///
/// let mut data = [0u8; 19];
/// data[0] = 0xea;
/// data[1] = 0x20;
/// let payload = validate_frame(encode_frame(&data).as_bytes()).unwrap();
/// let measurements = decode_fields(&payload, &FieldMap::esr31()).unwrap();
/// assert_eq!(measurements[0].name, "T1");
/// assert_eq!(measurements[0].value, MeasurementValue::Celsius(23.4));
/// ```
pub fn decode_fields(
    payload: &VerifiedPayload,
    map: &FieldMap,
) -> Result<Vec<Measurement>, DecodeError> {
    let reader = PayloadReader::new(payload.as_bytes());
    map.fields()
        .iter()
        .map(|field| decode_field(&reader, field))
        .collect()
}

fn decode_field(reader: &PayloadReader<'_>, field: &FieldSpec) -> Result<Measurement, DecodeError> {
    reader.require_len(field.name, field.rule.required_len())?;
    let value = match field.rule {
        DecodeRule::Temperature { lo_offset } => {
            MeasurementValue::Celsius(reader.read_temperature(field.name, lo_offset)?)
        }
        DecodeRule::State { offset, mask } => {
            MeasurementValue::Flag(reader.read_flag(field.name, offset, mask)?)
        }
    };
    Ok(Measurement {
        name: field.name.to_string(),
        kind: field.rule.kind(),
        value,
    })
}
