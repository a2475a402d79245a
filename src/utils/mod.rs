pub(crate) mod bytes;
mod hexdump;
mod utf16;

pub use self::hexdump::hexdump;
pub(crate) use self::utf16::{cmp_utf16_ordinal, decode_utf16le_bytes_z, encode_utf16le};
