/// 8-bit additive checksum: sum of all bytes, modulo 256.
pub(crate) fn additive_checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, byte| acc.wrapping_add(*byte))
}

/// Parse a 1–2 digit hexadecimal token into a byte.
pub(crate) fn parse_hex_byte(token: &str, max_digits: usize) -> Option<u8> {
    if token.is_empty() || token.len() > max_digits {
        return None;
    }
    if !token.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u8::from_str_radix(token, 16).ok()
}

/// Render bytes as lowercase, space-separated 2-digit hex.
pub(crate) fn hex_tokens(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
