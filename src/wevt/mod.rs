//! The `WEVT_TEMPLATE` resource: a `CRIM` blob holding one `WEVT` block per provider.
//!
//! ```text
//! CRIM header (16) | {guid, offset} x providers | WEVT ... | WEVT ...
//! ```
//!
//! All offsets are absolute from the start of the blob. Sub-blocks that are referenced by
//! offset (maps, templates, opcodes, levels, tasks, keywords) are always written before the
//! sub-blocks that reference them, so every offset is known when it is needed.

pub mod binxml;
mod encoder;
mod events;
mod lists;
pub mod manifest;
mod maps;
pub mod offsets;
pub mod template_id;
mod templates;
pub mod writer;

use log::{debug, info};

use crate::err::{EncodeError, InternalFault};
use crate::indexer::ProviderIndex;
use crate::message_id::MessageIds;
use crate::model::Manifest;
use crate::settings::CompilerSettings;

use self::encoder::ProviderEncoder;
use self::writer::{BinaryWriter, to_u32};

pub use self::encoder::{LIST_HEADER_LEN, SLOT_COUNT, WEVT_HEADER_LEN};
pub use self::events::{EVENT_ENTRY_LEN, EVENT_HEADER_LEN, FILTER_ENTRY_LEN};
pub use self::lists::{
    CHANNEL_ENTRY_LEN, ChannelFlags, KEYWORD_ENTRY_LEN, LEVEL_ENTRY_LEN, OPCODE_ENTRY_LEN,
    TASK_ENTRY_LEN,
};
pub use self::maps::{MAP_HEADER_LEN, MAP_ITEM_LEN, QUERY_ENTRY_LEN, QUERY_ITEM_LEN};
pub use self::templates::{
    PROPERTY_RECORD_LEN, PropertyFlags, TEMPLATE_EVENT_DATA, TEMPLATE_HEADER_LEN,
};

pub const CRIM_HEADER_LEN: usize = 16;
pub const PROVIDER_ENTRY_LEN: usize = 20;

/// Kind tag of a `WEVT` slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum BlockKind {
    Level = 0,
    Task = 1,
    Opcode = 2,
    Keyword = 3,
    Event = 4,
    Channel = 5,
    Maps = 6,
    Template = 7,
    NamedQuery = 8,
    Filter = 9,
}

impl BlockKind {
    pub fn from_u32(value: u32) -> Option<BlockKind> {
        Some(match value {
            0 => BlockKind::Level,
            1 => BlockKind::Task,
            2 => BlockKind::Opcode,
            3 => BlockKind::Keyword,
            4 => BlockKind::Event,
            5 => BlockKind::Channel,
            6 => BlockKind::Maps,
            7 => BlockKind::Template,
            8 => BlockKind::NamedQuery,
            9 => BlockKind::Filter,
            _ => return None,
        })
    }

    /// The signature at the start of the sub-block.
    pub fn signature(self) -> [u8; 4] {
        match self {
            BlockKind::Level => *b"LEVL",
            BlockKind::Task => *b"TASK",
            BlockKind::Opcode => *b"OPCO",
            BlockKind::Keyword => *b"KEYW",
            BlockKind::Event => *b"EVNT",
            BlockKind::Channel => *b"CHAN",
            BlockKind::Maps => *b"MAPS",
            BlockKind::Template => *b"TTBL",
            BlockKind::NamedQuery => *b"QTAB",
            BlockKind::Filter => *b"FLTR",
        }
    }
}

/// Encodes the `CRIM` blob for every provider of a manifest.
///
/// `indexes` and `ids` are the side tables produced for the same manifest, one per provider.
pub fn encode_template_resource(
    manifest: &Manifest,
    indexes: &[ProviderIndex],
    ids: &[MessageIds],
    settings: &CompilerSettings,
) -> Result<Vec<u8>, EncodeError> {
    let providers = manifest.providers();
    if indexes.len() != providers.len() || ids.len() != providers.len() {
        return Err(InternalFault::Layout {
            message: format!(
                "{} providers but {} indexes and {} message tables",
                providers.len(),
                indexes.len(),
                ids.len()
            ),
        }
        .into());
    }

    let mut w = BinaryWriter::with_capacity(4096);
    let (major, minor) = settings.get_crim_version();
    w.write_bytes(b"CRIM");
    let length_at = w.reserve(4);
    w.write_u16(major);
    w.write_u16(minor);
    w.write_u32(to_u32("provider count", providers.len())?);

    let mut entries = Vec::with_capacity(providers.len());
    for provider in providers {
        w.write_guid(&provider.guid);
        entries.push(w.reserve(4));
    }

    for (i, provider) in providers.iter().enumerate() {
        let offset =
            ProviderEncoder::new(provider, &indexes[i], &ids[i], settings, &mut w).encode()?;
        w.patch_u32(entries[i], offset)?;
    }

    let length = w.position();
    w.patch_u32(length_at, to_u32("CRIM length", length)?)?;
    debug!("CRIM {major}.{minor}: {} providers", providers.len());

    let bytes = w.finish()?;
    info!("encoded template resource: {} bytes", bytes.len());
    Ok(bytes)
}
