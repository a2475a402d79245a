use std::fmt::Write;

/// Renders `data` as a canonical hex dump (`hexdump -C` style).
///
/// `offset` is added to the printed addresses, which is handy when dumping a single record out
/// of a larger blob.
pub fn hexdump(data: &[u8], offset: usize) -> String {
    let mut out = String::with_capacity(data.len() * 4 + 16);

    for (i, line) in data.chunks(16).enumerate() {
        let _ = write!(out, "{:08x}:", offset + i * 16);

        for b in line {
            let _ = write!(out, " {:02x}", b);
        }
        // align
        for _ in line.len()..16 {
            out.push_str("   ");
        }

        out.push_str("  |");
        for &c in line {
            // replace all control and non-ascii chars with dots
            if c.is_ascii_graphic() || c == b' ' {
                out.push(c as char);
            } else {
                out.push('.');
            }
        }
        out.push_str("|\n");
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hexdump_formats_lines() {
        let dump = hexdump(b"CRIM\x10\x00\x00\x00", 0x20);
        let expected = format!(
            "00000020: 43 52 49 4d 10 00 00 00{}  |CRIM....|\n",
            " ".repeat(8 * 3)
        );
        assert_eq!(dump, expected);
    }
}
