use super::error::FrameError;
use super::layout;
use crate::protocols::common::codec::{additive_checksum, hex_tokens, parse_hex_byte};

/// Byte payload of a frame that passed delimiter, signature and checksum
/// checks. Only `validate_frame` constructs it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedPayload(Vec<u8>);

impl VerifiedPayload {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Trailing checksum byte.
    pub fn checksum(&self) -> u8 {
        self.0.last().copied().unwrap_or_default()
    }
}

impl AsRef<[u8]> for VerifiedPayload {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Validate one raw line as an ESR31 frame.
///
/// Checks run cheapest first: length, text, delimiters, hex tokens, device
/// signature, checksum. Every failure is a typed `FrameError`.
///
/// # Examples
/// ```
/// use esr31_core::{FrameError, validate_frame};
///
/// let payload = validate_frame(b"* 70 8f 01 00 *\r\n").unwrap();
/// assert_eq!(payload.as_bytes(), &[0x70, 0x8f, 0x01, 0x00]);
///
/// let err = validate_frame(b"70 8f 01 00").unwrap_err();
/// assert_eq!(err, FrameError::BadDelimiter);
/// ```
pub fn validate_frame(raw: &[u8]) -> Result<VerifiedPayload, FrameError> {
    if raw.len() < layout::MIN_RAW_LEN {
        return Err(FrameError::TooShort {
            needed: layout::MIN_RAW_LEN,
            actual: raw.len(),
        });
    }

    let text = std::str::from_utf8(raw)
        .map_err(|e| FrameError::Malformed {
            reason: e.to_string(),
        })?
        .trim();

    let interior = frame_interior(text).ok_or(FrameError::BadDelimiter)?;
    let bytes = decode_tokens(interior)?;

    let signature = bytes.get(layout::SIGNATURE_RANGE);
    if signature != Some(&layout::DEVICE_SIGNATURE[..]) {
        return Err(FrameError::WrongDevice {
            found: bytes.iter().take(layout::DEVICE_SIGNATURE.len()).copied().collect(),
        });
    }

    // Signature check guarantees at least two bytes here.
    let (received, data) = match bytes.split_last() {
        Some((last, rest)) => (*last, rest),
        None => return Err(FrameError::WrongDevice { found: Vec::new() }),
    };
    let computed = additive_checksum(data);
    if computed != received {
        return Err(FrameError::ChecksumMismatch { computed, received });
    }

    Ok(VerifiedPayload(bytes))
}

/// Render data bytes as a wire frame: signature prefixed, checksum appended.
///
/// # Examples
/// ```
/// use esr31_core::{encode_frame, validate_frame};
///
/// let line = encode_frame(&[0xea, 0x20]);
/// assert_eq!(line, "* 70 8f ea 20 09 *");
/// assert!(validate_frame(line.as_bytes()).is_ok());
/// ```
pub fn encode_frame(data: &[u8]) -> String {
    let mut bytes = Vec::with_capacity(layout::DEVICE_SIGNATURE.len() + data.len() + 1);
    bytes.extend_from_slice(&layout::DEVICE_SIGNATURE);
    bytes.extend_from_slice(data);
    bytes.push(additive_checksum(&bytes));
    format!(
        "{d} {} {d}",
        hex_tokens(&bytes),
        d = layout::FRAME_DELIMITER
    )
}

fn frame_interior(text: &str) -> Option<&str> {
    let inner = text
        .strip_prefix(layout::FRAME_DELIMITER)?
        .strip_suffix(layout::FRAME_DELIMITER)?;
    let inner = inner.strip_prefix(layout::TOKEN_SEPARATOR).unwrap_or(inner);
    Some(inner.strip_suffix(layout::TOKEN_SEPARATOR).unwrap_or(inner))
}

fn decode_tokens(interior: &str) -> Result<Vec<u8>, FrameError> {
    interior
        .split(layout::TOKEN_SEPARATOR)
        .enumerate()
        .map(|(position, token)| {
            parse_hex_byte(token, layout::MAX_TOKEN_DIGITS).ok_or_else(|| {
                FrameError::BadHexToken {
                    position,
                    token: token.to_string(),
                }
            })
        })
        .collect()
}
