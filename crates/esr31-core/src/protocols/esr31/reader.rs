use super::error::DecodeError;
use super::layout;

/// Bounds-checked access to a verified payload.
///
/// Every read names the field it serves so a short payload surfaces as an
/// actionable `TruncatedPayload`.
pub struct PayloadReader<'a> {
    payload: &'a [u8],
}

impl<'a> PayloadReader<'a> {
    pub fn new(payload: &'a [u8]) -> Self {
        Self { payload }
    }

    pub fn require_len(&self, field: &str, needed: usize) -> Result<(), DecodeError> {
        if self.payload.len() < needed {
            return Err(DecodeError::TruncatedPayload {
                field: field.to_string(),
                needed,
                actual: self.payload.len(),
            });
        }
        Ok(())
    }

    pub fn read_u8(&self, field: &str, offset: usize) -> Result<u8, DecodeError> {
        self.payload
            .get(offset)
            .copied()
            .ok_or_else(|| DecodeError::TruncatedPayload {
                field: field.to_string(),
                needed: offset.saturating_add(1),
                actual: self.payload.len(),
            })
    }

    pub fn read_slice(
        &self,
        field: &str,
        range: std::ops::Range<usize>,
    ) -> Result<&'a [u8], DecodeError> {
        self.payload
            .get(range.clone())
            .ok_or_else(|| DecodeError::TruncatedPayload {
                field: field.to_string(),
                needed: range.end,
                actual: self.payload.len(),
            })
    }

    /// Read a biased little-endian temperature in tenths of a degree.
    pub fn read_temperature(&self, field: &str, lo_offset: usize) -> Result<f64, DecodeError> {
        let bytes = self.read_slice(field, lo_offset..lo_offset.saturating_add(2))?;
        Ok(temperature_from_bytes(bytes[0], bytes[1]))
    }

    pub fn read_flag(&self, field: &str, offset: usize, mask: u8) -> Result<bool, DecodeError> {
        Ok((self.read_u8(field, offset)? & mask) != 0)
    }
}

/// `((hi - 0x20) << 8 | lo) / 10`, evaluated signed so that a high byte
/// below the bias yields a negative reading.
pub fn temperature_from_bytes(lo: u8, hi: u8) -> f64 {
    let raw = ((i32::from(hi) - layout::TEMPERATURE_BIAS) << 8) | i32::from(lo);
    f64::from(raw) / layout::TEMPERATURE_SCALE
}

#[cfg(test)]
mod tests {
    use super::{PayloadReader, temperature_from_bytes};
    use crate::protocols::esr31::error::DecodeError;

    #[test]
    fn temperature_matches_protocol_formula() {
        // (0x0d << 8) | 0x64 = 3428
        assert!((temperature_from_bytes(0x64, 0x2d) - 342.8).abs() < 1e-9);
        assert!((temperature_from_bytes(0xea, 0x20) - 23.4).abs() < 1e-9);
    }

    #[test]
    fn temperature_below_bias_is_negative() {
        // 0x1f - 0x20 = -1 -> (-256 | 0xce) = -50
        assert!((temperature_from_bytes(0xce, 0x1f) + 5.0).abs() < 1e-9);
    }

    #[test]
    fn read_flag_applies_mask() {
        let payload = [0x03, 0x02];
        let reader = PayloadReader::new(&payload);
        assert!(reader.read_flag("A", 0, 0x01).unwrap());
        assert!(!reader.read_flag("B", 1, 0x01).unwrap());
    }

    #[test]
    fn read_past_end_is_truncated() {
        let payload = [0x70, 0x8f, 0x01];
        let reader = PayloadReader::new(&payload);
        let err = reader.read_temperature("T1", 2).unwrap_err();
        assert_eq!(
            err,
            DecodeError::TruncatedPayload {
                field: "T1".to_string(),
                needed: 4,
                actual: 3,
            }
        );
    }

    #[test]
    fn huge_offsets_do_not_overflow() {
        let payload = [0x70, 0x8f, 0x01];
        let reader = PayloadReader::new(&payload);
        assert!(matches!(
            reader.read_temperature("T9", usize::MAX - 1),
            Err(DecodeError::TruncatedPayload { needed: usize::MAX, .. })
        ));
        assert!(matches!(
            reader.read_flag("O9", usize::MAX, 0x01),
            Err(DecodeError::TruncatedPayload { needed: usize::MAX, .. })
        ));
    }

    #[test]
    fn require_len_reports_shortfall() {
        let payload = [0u8; 4];
        let reader = PayloadReader::new(&payload);
        assert!(reader.require_len("O1", 4).is_ok());
        assert!(matches!(
            reader.require_len("O1", 21),
            Err(DecodeError::TruncatedPayload { needed: 21, .. })
        ));
    }
}
