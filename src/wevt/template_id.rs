//! Template identifiers: a digest over the template's XML text and its property types.

use md5::Md5;
use sha2::{Digest, Sha256};

use crate::model::FlatProperty;
use crate::settings::TemplateIdScheme;
use crate::utils::encode_utf16le;

const CURRENT_PREFIX: &[u8] = b"WEVTTEMP";

/// The `(in, out)` type tags of every flattened property, each widened to a little-endian
/// `u32`.
pub fn expanded_type_tags(flat: &[FlatProperty<'_>]) -> Vec<u8> {
    let mut out = Vec::with_capacity(flat.len() * 8);
    for entry in flat {
        let (in_tag, out_tag) = entry.property.type_tags();
        out.extend_from_slice(&u32::from(in_tag).to_le_bytes());
        out.extend_from_slice(&u32::from(out_tag).to_le_bytes());
    }
    out
}

/// The 16-byte identifier stored in a `TEMP` header.
pub fn template_id(scheme: TemplateIdScheme, xml: &str, flat: &[FlatProperty<'_>]) -> [u8; 16] {
    let text = encode_utf16le(xml);
    let types = expanded_type_tags(flat);

    match scheme {
        TemplateIdScheme::Legacy => {
            let inner = Md5::digest(&text);
            let mut outer = Md5::new();
            outer.update(inner);
            outer.update(&types);
            outer.finalize().into()
        }
        TemplateIdScheme::Current => {
            let mut hasher = Sha256::new();
            hasher.update(CURRENT_PREFIX);
            hasher.update(&text);
            hasher.update(&types);
            let digest = hasher.finalize();

            let mut id = [0u8; 16];
            id.copy_from_slice(&digest[..16]);
            // Name-based UUID, version 5.
            id[7] = (id[7] & 0x0F) | 0x50;
            id
        }
    }
}
