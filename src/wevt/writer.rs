use byteorder::{ByteOrder, LittleEndian};
use log::trace;

use crate::err::{EncodeError, InternalFault};
use crate::guid::Guid;
use crate::utils::encode_utf16le;

/// Converts a buffer position to an on-disk offset.
pub(crate) fn to_offset(pos: usize) -> Result<u32, EncodeError> {
    u32::try_from(pos).map_err(|_| EncodeError::OutputTooLarge { size: pos })
}

/// Converts a count or index to an on-disk `u32` field.
pub(crate) fn to_u32(field: &'static str, value: usize) -> Result<u32, EncodeError> {
    u32::try_from(value).map_err(|_| EncodeError::ValueOutOfRange {
        field,
        value: value as u64,
    })
}

/// Converts a count or index to an on-disk `u16` field.
pub(crate) fn to_u16(field: &'static str, value: usize) -> Result<u16, EncodeError> {
    u16::try_from(value).map_err(|_| EncodeError::ValueOutOfRange {
        field,
        value: value as u64,
    })
}

/// Byte size of a sized string holding `text`.
pub(crate) fn sized_string_len(text: &str) -> usize {
    let raw = 4 + text.encode_utf16().count() * 2 + 2;
    raw.next_multiple_of(4)
}

/// Growable little-endian buffer with a movable cursor.
///
/// Writes past the end extend the buffer; writes before it overwrite. The high-water mark is
/// the buffer length, so moving the cursor back to fill a placeholder never truncates.
#[derive(Debug, Default)]
pub struct BinaryWriter {
    buf: Vec<u8>,
    pos: usize,
}

impl BinaryWriter {
    pub fn new() -> Self {
        BinaryWriter::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        BinaryWriter {
            buf: Vec::with_capacity(capacity),
            pos: 0,
        }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// The cursor as an on-disk offset.
    pub fn offset(&self) -> Result<u32, EncodeError> {
        to_offset(self.pos)
    }

    /// Moving past the end is allowed; the gap is zero-filled on the next write.
    pub fn set_position(&mut self, pos: usize) {
        self.pos = pos;
    }

    /// Moves the cursor to the high-water mark.
    pub fn seek_end(&mut self) {
        self.pos = self.buf.len();
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    fn ensure(&mut self, end: usize) {
        if end <= self.buf.len() {
            return;
        }
        if end > self.buf.capacity() {
            let target = end.max(self.buf.capacity() * 2);
            trace!("growing writer buffer to {target} bytes");
            self.buf.reserve_exact(target - self.buf.len());
        }
        self.buf.resize(end, 0);
    }

    fn slot(&mut self, n: usize) -> &mut [u8] {
        let start = self.pos;
        self.ensure(start + n);
        self.pos += n;
        &mut self.buf[start..start + n]
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.slot(bytes.len()).copy_from_slice(bytes);
    }

    pub fn write_u8(&mut self, v: u8) {
        self.slot(1)[0] = v;
    }

    pub fn write_u16(&mut self, v: u16) {
        LittleEndian::write_u16(self.slot(2), v);
    }

    pub fn write_u32(&mut self, v: u32) {
        LittleEndian::write_u32(self.slot(4), v);
    }

    pub fn write_u64(&mut self, v: u64) {
        LittleEndian::write_u64(self.slot(8), v);
    }

    pub fn write_guid(&mut self, guid: &Guid) {
        self.write_bytes(&guid.to_le_bytes());
    }

    /// Writes `n` zero bytes and returns where they start.
    pub fn reserve(&mut self, n: usize) -> usize {
        let start = self.pos;
        self.slot(n).fill(0);
        start
    }

    /// Overwrites a previously written `u32` without moving the cursor.
    pub fn patch_u32(&mut self, at: usize, v: u32) -> Result<(), InternalFault> {
        let end = at.checked_add(4).filter(|end| *end <= self.buf.len()).ok_or_else(|| {
            InternalFault::Layout {
                message: format!(
                    "patch at {at} is outside the {} bytes written",
                    self.buf.len()
                ),
            }
        })?;
        LittleEndian::write_u32(&mut self.buf[at..end], v);
        Ok(())
    }

    /// Zero-pads the cursor up to a multiple of `n`.
    pub fn align(&mut self, n: usize) {
        let target = self.pos.next_multiple_of(n);
        let pad = target - self.pos;
        if pad > 0 {
            self.reserve(pad);
        }
    }

    /// Writes a sized UTF-16 string and returns its offset.
    ///
    /// Layout: `u32` total size (including itself, the NUL and padding to four bytes), then
    /// the UTF-16LE text and a NUL unit.
    pub fn write_string(&mut self, text: &str) -> Result<u32, EncodeError> {
        let start = self.offset()?;
        let size = sized_string_len(text);
        self.write_u32(to_u32("string size", size)?);
        let encoded = encode_utf16le(text);
        self.write_bytes(&encoded);
        self.reserve(size - 4 - encoded.len());
        Ok(start)
    }

    /// The written bytes, truncated to the high-water mark.
    pub fn finish(self) -> Result<Vec<u8>, EncodeError> {
        if self.buf.len() > u32::MAX as usize {
            return Err(EncodeError::OutputTooLarge {
                size: self.buf.len(),
            });
        }
        Ok(self.buf)
    }
}
