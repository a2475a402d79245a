use crate::guid::Guid;
use crate::message_id::UNUSED_MESSAGE_ID;
use crate::utils::bytes;

use super::error::{CrimParseError, Result};

pub(super) fn read_sized_utf16_string(
    buf: &[u8],
    offset: u32,
    what: &'static str,
) -> Result<String> {
    let off_usize = u32_to_usize(offset, what, buf.len())?;
    let size = read_u32_named(buf, off_usize, what)?;
    if size < 4 {
        return Err(CrimParseError::SizeOutOfBounds { what, offset, size });
    }
    let end = checked_end(buf.len(), offset, size, what)?;
    decode_utf16_z(&buf[off_usize + 4..end], what, offset)
}

/// A string reference where `0` means "no string".
pub(super) fn read_optional_string(
    buf: &[u8],
    offset: u32,
    what: &'static str,
) -> Result<Option<String>> {
    if offset == 0 {
        Ok(None)
    } else {
        read_sized_utf16_string(buf, offset, what).map(Some)
    }
}

pub(super) fn decode_utf16_z(bytes: &[u8], what: &'static str, offset: u32) -> Result<String> {
    crate::utils::decode_utf16le_bytes_z(bytes)
        .map_err(|_| CrimParseError::InvalidUtf16String { what, offset })
}

fn truncated(buf: &[u8], offset: usize, need: usize, what: &'static str) -> CrimParseError {
    CrimParseError::Truncated {
        what,
        offset: usize_to_u32(offset),
        need,
        have: buf.len().saturating_sub(offset),
    }
}

pub(super) fn read_sig_named(buf: &[u8], offset: usize, what: &'static str) -> Result<[u8; 4]> {
    bytes::read_sig(buf, offset).ok_or_else(|| truncated(buf, offset, 4, what))
}

pub(super) fn read_u8_named(buf: &[u8], offset: usize, what: &'static str) -> Result<u8> {
    bytes::read_u8(buf, offset).ok_or_else(|| truncated(buf, offset, 1, what))
}

pub(super) fn read_u16_named(buf: &[u8], offset: usize, what: &'static str) -> Result<u16> {
    bytes::read_u16_le(buf, offset).ok_or_else(|| truncated(buf, offset, 2, what))
}

pub(super) fn read_u32_named(buf: &[u8], offset: usize, what: &'static str) -> Result<u32> {
    bytes::read_u32_le(buf, offset).ok_or_else(|| truncated(buf, offset, 4, what))
}

pub(super) fn read_u64_named(buf: &[u8], offset: usize, what: &'static str) -> Result<u64> {
    bytes::read_u64_le(buf, offset).ok_or_else(|| truncated(buf, offset, 8, what))
}

pub(super) fn read_guid_named(buf: &[u8], offset: usize, what: &'static str) -> Result<Guid> {
    read_array_named::<16>(buf, offset, what).map(Guid::from_le_bytes)
}

pub(super) fn read_array_named<const N: usize>(
    buf: &[u8],
    offset: usize,
    what: &'static str,
) -> Result<[u8; N]> {
    bytes::read_array::<N>(buf, offset).ok_or_else(|| truncated(buf, offset, N, what))
}

/// `None` for the unused-message sentinel.
pub(super) fn message_id(raw: u32) -> Option<u32> {
    (raw != UNUSED_MESSAGE_ID).then_some(raw)
}

/// `None` for a zero offset.
pub(super) fn nonzero(raw: u32) -> Option<u32> {
    (raw != 0).then_some(raw)
}

pub(super) fn u32_to_usize(offset: u32, what: &'static str, len: usize) -> Result<usize> {
    let off = usize::try_from(offset).map_err(|_| CrimParseError::OffsetOutOfBounds {
        what,
        offset,
        len,
    })?;
    if off > len {
        return Err(CrimParseError::OffsetOutOfBounds { what, offset, len });
    }
    Ok(off)
}

pub(super) fn usize_to_u32(v: usize) -> u32 {
    u32::try_from(v).unwrap_or(u32::MAX)
}

pub(super) fn require_len(buf: &[u8], off: usize, need: usize, what: &'static str) -> Result<()> {
    if off > buf.len() || buf.len().saturating_sub(off) < need {
        return Err(truncated(buf, off, need, what));
    }
    Ok(())
}

pub(super) fn checked_end(len: usize, off: u32, size: u32, what: &'static str) -> Result<usize> {
    let off_usize = u32_to_usize(off, what, len)?;
    let size_usize = usize::try_from(size).map_err(|_| CrimParseError::SizeOutOfBounds {
        what,
        offset: off,
        size,
    })?;
    let end = off_usize
        .checked_add(size_usize)
        .ok_or(CrimParseError::SizeOutOfBounds {
            what,
            offset: off,
            size,
        })?;
    if end > len {
        return Err(CrimParseError::SizeOutOfBounds {
            what,
            offset: off,
            size,
        });
    }
    Ok(end)
}
