#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) enum Utf16LeDecodeError {
    OddLength,
    InvalidData,
}

/// Decode a UTF-16LE byte slice until the first NUL (0x0000), if present.
pub(crate) fn decode_utf16le_bytes_z(bytes: &[u8]) -> Result<String, Utf16LeDecodeError> {
    if !bytes.len().is_multiple_of(2) {
        return Err(Utf16LeDecodeError::OddLength);
    }

    let mut units = Vec::with_capacity(bytes.len() / 2);
    for chunk in bytes.chunks_exact(2) {
        units.push(u16::from_le_bytes([chunk[0], chunk[1]]));
    }

    decode_utf16_units_z(&units)
}

/// Decode UTF-16 code units until the first NUL (0x0000), if present.
pub(crate) fn decode_utf16_units_z(units: &[u16]) -> Result<String, Utf16LeDecodeError> {
    let end = units.iter().position(|&c| c == 0).unwrap_or(units.len());
    String::from_utf16(&units[..end]).map_err(|_| Utf16LeDecodeError::InvalidData)
}

/// Encode `s` as UTF-16LE bytes (no terminator).
pub(crate) fn encode_utf16le(s: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len() * 2);
    for cu in s.encode_utf16() {
        out.extend_from_slice(&cu.to_le_bytes());
    }
    out
}

/// Ordinal comparison on UTF-16 code units, matching how the event log runtime sorts names.
pub(crate) fn cmp_utf16_ordinal(a: &str, b: &str) -> std::cmp::Ordering {
    a.encode_utf16().cmp(b.encode_utf16())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_stops_at_nul() {
        let mut bytes = encode_utf16le("Info");
        bytes.extend_from_slice(&[0, 0, b'x', 0]);
        assert_eq!(decode_utf16le_bytes_z(&bytes), Ok("Info".to_string()));
        assert_eq!(
            decode_utf16le_bytes_z(&[0x41]),
            Err(Utf16LeDecodeError::OddLength)
        );
    }

    #[test]
    fn test_ordinal_order_uses_code_units() {
        use std::cmp::Ordering;
        assert_eq!(cmp_utf16_ordinal("B", "a"), Ordering::Less);
        // U+FF21 sorts before U+10000 in UTF-8 byte order but after it as UTF-16 code units.
        assert_eq!(cmp_utf16_ordinal("\u{FF21}", "\u{10000}"), Ordering::Greater);
    }
}
