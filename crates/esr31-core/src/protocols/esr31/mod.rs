//! ESR31 solar-thermal controller telemetry.
//!
//! The controller emits one frame per line: `* 70 8f <b0> ... <bn> <sum> *`.
//! `parser` turns a raw line into a `VerifiedPayload` (delimiters, hex tokens,
//! device signature, additive checksum), and `fields` maps the payload to
//! named measurements through a static `FieldMap`.
//!
//! Wire positions live in `layout`, bounds-checked payload access in
//! `reader`. Nothing here performs I/O.

pub mod error;
pub mod fields;
pub mod layout;
pub mod parser;
pub mod reader;

pub use error::{DecodeError, FrameError, RejectReason};
pub use fields::{
    DecodeRule, ESR31_FIELDS, FieldMap, FieldSpec, Measurement, MeasurementKind,
    MeasurementValue, decode_fields,
};
pub use parser::{VerifiedPayload, encode_frame, validate_frame};
