use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reasons a raw line is not accepted as an ESR31 frame.
///
/// Every variant is recoverable: the caller drops the line and reads the
/// next one.
///
/// # Examples
/// ```
/// use esr31_core::FrameError;
///
/// let err = FrameError::ChecksumMismatch { computed: 0x12, received: 0x13 };
/// assert!(err.to_string().contains("checksum mismatch"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("line too short: need at least {needed} bytes, got {actual}")]
    TooShort { needed: usize, actual: usize },
    #[error("line is not valid text: {reason}")]
    Malformed { reason: String },
    #[error("frame must start and end with '*'")]
    BadDelimiter,
    #[error("invalid hex token {token:?} at position {position}")]
    BadHexToken { position: usize, token: String },
    #[error("unexpected device signature: {found:02x?}")]
    WrongDevice { found: Vec<u8> },
    #[error("checksum mismatch: computed {computed:#04x}, frame carries {received:#04x}")]
    ChecksumMismatch { computed: u8, received: u8 },
}

/// Errors returned while mapping a verified payload to measurements.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("payload truncated: field {field} needs {needed} bytes, payload has {actual}")]
    TruncatedPayload {
        field: String,
        needed: usize,
        actual: usize,
    },
}

/// Stable classification of a rejected read attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    NoData,
    TooShort,
    Malformed,
    BadDelimiter,
    BadHexToken,
    WrongDevice,
    ChecksumMismatch,
    TruncatedPayload,
}

impl RejectReason {
    pub fn as_str(self) -> &'static str {
        match self {
            RejectReason::NoData => "no_data",
            RejectReason::TooShort => "too_short",
            RejectReason::Malformed => "malformed",
            RejectReason::BadDelimiter => "bad_delimiter",
            RejectReason::BadHexToken => "bad_hex_token",
            RejectReason::WrongDevice => "wrong_device",
            RejectReason::ChecksumMismatch => "checksum_mismatch",
            RejectReason::TruncatedPayload => "truncated_payload",
        }
    }
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&FrameError> for RejectReason {
    fn from(value: &FrameError) -> Self {
        match value {
            FrameError::TooShort { .. } => RejectReason::TooShort,
            FrameError::Malformed { .. } => RejectReason::Malformed,
            FrameError::BadDelimiter => RejectReason::BadDelimiter,
            FrameError::BadHexToken { .. } => RejectReason::BadHexToken,
            FrameError::WrongDevice { .. } => RejectReason::WrongDevice,
            FrameError::ChecksumMismatch { .. } => RejectReason::ChecksumMismatch,
        }
    }
}

impl From<&DecodeError> for RejectReason {
    fn from(value: &DecodeError) -> Self {
        match value {
            DecodeError::TruncatedPayload { .. } => RejectReason::TruncatedPayload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DecodeError, FrameError, RejectReason};

    #[test]
    fn reasons_follow_error_variants() {
        let err = FrameError::BadHexToken {
            position: 3,
            token: "zz".to_string(),
        };
        assert_eq!(RejectReason::from(&err), RejectReason::BadHexToken);

        let err = DecodeError::TruncatedPayload {
            field: "O1".to_string(),
            needed: 21,
            actual: 9,
        };
        assert_eq!(RejectReason::from(&err), RejectReason::TruncatedPayload);
    }

    #[test]
    fn reason_serializes_as_snake_case() {
        let json = serde_json::to_string(&RejectReason::ChecksumMismatch).unwrap();
        assert_eq!(json, "\"checksum_mismatch\"");
        assert_eq!(RejectReason::NoData.to_string(), "no_data");
    }

    #[test]
    fn wrong_device_lists_found_bytes() {
        let err = FrameError::WrongDevice {
            found: vec![0x71, 0x8f],
        };
        assert!(err.to_string().contains("71"));
    }
}
