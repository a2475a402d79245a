use std::fmt::{self, Debug, Display, Write};
use std::str::FromStr;

use byteorder::{ByteOrder, LittleEndian};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("`{input}` is not a valid GUID (expected xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx)")]
pub struct GuidParseError {
    input: String,
}

/// A Windows GUID, stored in its native field layout.
///
/// Serialization follows the in-memory layout of the Win32 `GUID` structure: the first three
/// fields are little-endian, `data4` is a plain byte array.
#[derive(PartialOrd, Ord, PartialEq, Eq, Hash, Clone, Copy, Default)]
pub struct Guid {
    data1: u32,
    data2: u16,
    data3: u16,
    data4: [u8; 8],
}

impl Guid {
    pub const fn new(data1: u32, data2: u16, data3: u16, data4: [u8; 8]) -> Guid {
        Guid {
            data1,
            data2,
            data3,
            data4,
        }
    }

    pub fn from_le_bytes(bytes: [u8; 16]) -> Guid {
        let mut data4 = [0; 8];
        data4.copy_from_slice(&bytes[8..16]);
        Guid {
            data1: LittleEndian::read_u32(&bytes[0..4]),
            data2: LittleEndian::read_u16(&bytes[4..6]),
            data3: LittleEndian::read_u16(&bytes[6..8]),
            data4,
        }
    }

    pub fn to_le_bytes(&self) -> [u8; 16] {
        let mut out = [0; 16];
        LittleEndian::write_u32(&mut out[0..4], self.data1);
        LittleEndian::write_u16(&mut out[4..6], self.data2);
        LittleEndian::write_u16(&mut out[6..8], self.data3);
        out[8..16].copy_from_slice(&self.data4);
        out
    }

    pub fn is_nil(&self) -> bool {
        *self == Guid::default()
    }

    pub fn to_string(&self) -> String {
        // Using `format!` will extend the string multiple time,
        // but we know ahead of time how much space we need.
        let mut s = String::with_capacity(36);

        let _ = write!(
            &mut s,
            "{:08X}-{:04X}-{:04X}-{:02X}{:02X}-{:02X}{:02X}{:02X}{:02X}{:02X}{:02X}",
            self.data1,
            self.data2,
            self.data3,
            self.data4[0],
            self.data4[1],
            self.data4[2],
            self.data4[3],
            self.data4[4],
            self.data4[5],
            self.data4[6],
            self.data4[7]
        );

        s
    }
}

impl FromStr for Guid {
    type Err = GuidParseError;

    /// Accepts the registry format, with or without surrounding braces.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || GuidParseError {
            input: s.to_string(),
        };

        let trimmed = s.trim().trim_start_matches('{').trim_end_matches('}');
        let parts: Vec<&str> = trimmed.split('-').collect();
        if !trimmed.is_ascii()
            || parts.len() != 5
            || [8, 4, 4, 4, 12]
                .iter()
                .zip(&parts)
                .any(|(len, part)| part.len() != *len)
        {
            return Err(err());
        }

        let data1 = u32::from_str_radix(parts[0], 16).map_err(|_| err())?;
        let data2 = u16::from_str_radix(parts[1], 16).map_err(|_| err())?;
        let data3 = u16::from_str_radix(parts[2], 16).map_err(|_| err())?;

        let tail = format!("{}{}", parts[3], parts[4]);
        let mut data4 = [0u8; 8];
        for (i, byte) in data4.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&tail[i * 2..i * 2 + 2], 16).map_err(|_| err())?;
        }

        Ok(Guid::new(data1, data2, data3, data4))
    }
}

impl Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_string())
    }
}

impl Debug for Guid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parses_braced_and_bare_guids() {
        let a: Guid = "{22FB2CD6-0E7B-422B-A0C7-2FAD1FD0E716}".parse().unwrap();
        let b: Guid = "22fb2cd6-0e7b-422b-a0c7-2fad1fd0e716".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "22FB2CD6-0E7B-422B-A0C7-2FAD1FD0E716");
    }

    #[test]
    fn test_le_bytes_layout() {
        let g: Guid = "00112233-4455-6677-8899-AABBCCDDEEFF".parse().unwrap();
        let bytes = g.to_le_bytes();
        assert_eq!(
            bytes,
            [
                0x33, 0x22, 0x11, 0x00, 0x55, 0x44, 0x77, 0x66, 0x88, 0x99, 0xAA, 0xBB, 0xCC, 0xDD,
                0xEE, 0xFF
            ]
        );
        assert_eq!(Guid::from_le_bytes(bytes), g);
    }

    #[test]
    fn test_rejects_malformed_guids() {
        assert!("not-a-guid".parse::<Guid>().is_err());
        assert!("22FB2CD6-0E7B-422B-A0C7".parse::<Guid>().is_err());
        assert!("ZZFB2CD6-0E7B-422B-A0C7-2FAD1FD0E716".parse::<Guid>().is_err());
    }
}
