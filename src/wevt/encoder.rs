use log::debug;

use crate::err::EncodeError;
use crate::indexer::ProviderIndex;
use crate::message_id::MessageIds;
use crate::model::{EntityRef, Provider};
use crate::settings::CompilerSettings;

use super::BlockKind;
use super::offsets::OffsetTable;
use super::writer::{BinaryWriter, to_u32};

/// Number of `{kind, offset}` slots in a `WEVT` header.
pub const SLOT_COUNT: usize = 11;

/// `"WEVT"`, length, message identifier, slot count, then the slots.
pub const WEVT_HEADER_LEN: usize = 16 + SLOT_COUNT * 8;

/// Signature, length and entry count.
pub const LIST_HEADER_LEN: usize = 12;

/// Writes one provider's `WEVT` block and every sub-block it owns.
pub(super) struct ProviderEncoder<'a, 'w> {
    pub(super) provider: &'a Provider,
    pub(super) index: &'a ProviderIndex,
    pub(super) ids: &'a MessageIds,
    pub(super) settings: &'a CompilerSettings,
    pub(super) w: &'w mut BinaryWriter,
    pub(super) offsets: OffsetTable<'a>,
}

/// A name string still to be written, and where its offset goes.
pub(super) struct PendingName<'a> {
    pub(super) patch_at: usize,
    pub(super) text: &'a str,
}

impl<'a, 'w> ProviderEncoder<'a, 'w> {
    pub(super) fn new(
        provider: &'a Provider,
        index: &'a ProviderIndex,
        ids: &'a MessageIds,
        settings: &'a CompilerSettings,
        w: &'w mut BinaryWriter,
    ) -> Self {
        ProviderEncoder {
            provider,
            index,
            ids,
            settings,
            w,
            offsets: OffsetTable::new(&index.entities),
        }
    }

    /// Message identifier of `entity` as stored on disk.
    pub(super) fn message_id(&self, entity: EntityRef) -> u32 {
        self.ids.raw(entity)
    }

    /// Writes a list header with placeholder length and count; returns its start.
    pub(super) fn begin_list(&mut self, signature: &[u8; 4]) -> usize {
        let start = self.w.position();
        self.w.write_bytes(signature);
        self.w.reserve(8);
        start
    }

    /// Backfills a list header. An empty list keeps a zero length.
    pub(super) fn finish_list(&mut self, start: usize, count: usize) -> Result<u32, EncodeError> {
        let length = if count == 0 {
            0
        } else {
            to_u32("block length", self.w.position() - start)?
        };
        self.w.patch_u32(start + 4, length)?;
        self.w.patch_u32(start + 8, to_u32("entry count", count)?)?;

        let signature = String::from_utf8_lossy(&self.w.as_slice()[start..start + 4]).into_owned();
        debug!(
            "{signature} at 0x{start:x}: {count} entries, {} bytes",
            self.w.position() - start
        );
        to_u32("block offset", start)
    }

    /// Writes every pending name as a sized string and patches its offset in.
    pub(super) fn write_names(&mut self, names: &[PendingName<'_>]) -> Result<(), EncodeError> {
        for name in names {
            let offset = self.w.write_string(name.text)?;
            self.w.patch_u32(name.patch_at, offset)?;
        }
        Ok(())
    }

    /// Writes the `WEVT` block; returns its offset.
    ///
    /// Producers (maps, templates, opcodes, levels, tasks, keywords) precede the events and
    /// filters that reference them.
    pub(super) fn encode(mut self) -> Result<u32, EncodeError> {
        self.w.align(4);
        let start = self.w.position();
        self.w.write_bytes(b"WEVT");
        let length_at = self.w.reserve(4);
        self.w.write_u32(self.message_id(EntityRef::Provider));
        let count_at = self.w.reserve(4);
        let slots_at = self.w.reserve(SLOT_COUNT * 8);

        let mut slots: Vec<(BlockKind, u32)> = Vec::with_capacity(SLOT_COUNT);
        if let Some(offset) = self.write_channels()? {
            slots.push((BlockKind::Channel, offset));
        }
        if let Some(offset) = self.write_maps()? {
            slots.push((BlockKind::Maps, offset));
        }
        if let Some(offset) = self.write_named_queries()? {
            slots.push((BlockKind::NamedQuery, offset));
        }
        if let Some(offset) = self.write_templates()? {
            slots.push((BlockKind::Template, offset));
        }
        slots.push((BlockKind::Opcode, self.write_opcodes()?));
        slots.push((BlockKind::Level, self.write_levels()?));
        slots.push((BlockKind::Task, self.write_tasks()?));
        slots.push((BlockKind::Keyword, self.write_keywords()?));
        if let Some(offset) = self.write_events()? {
            slots.push((BlockKind::Event, offset));
        }
        if let Some(offset) = self.write_filters()? {
            slots.push((BlockKind::Filter, offset));
        }

        for (i, (kind, offset)) in slots.iter().enumerate() {
            self.w.patch_u32(slots_at + i * 8, *kind as u32)?;
            self.w.patch_u32(slots_at + i * 8 + 4, *offset)?;
        }
        self.w.patch_u32(count_at, to_u32("slot count", slots.len())?)?;

        let length = self.w.position() - start;
        self.w.patch_u32(length_at, to_u32("provider block length", length)?)?;

        debug!(
            "provider `{}` at 0x{start:x}: {} sub-blocks, {length} bytes",
            self.provider.name,
            slots.len()
        );
        to_u32("provider offset", start)
    }
}
