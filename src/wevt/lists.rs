//! Fixed-entry lists: `CHAN`, `LEVL`, `OPCO`, `TASK` and `KEYW`.
//!
//! Each list is its header, the entry array, then the entry names. Entries are written with a
//! zero name offset that is patched once the names follow.

use bitflags::bitflags;

use crate::err::EncodeError;
use crate::model::{ChannelId, EntityRef, KeywordId, LevelId, OpcodeId, TaskId};

use super::encoder::{PendingName, ProviderEncoder};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ChannelFlags: u32 {
        const IMPORTED = 0x1;
        const ENABLED = 0x2;
    }
}

pub const CHANNEL_ENTRY_LEN: usize = 16;
pub const LEVEL_ENTRY_LEN: usize = 12;
pub const OPCODE_ENTRY_LEN: usize = 12;
pub const TASK_ENTRY_LEN: usize = 28;
pub const KEYWORD_ENTRY_LEN: usize = 16;

/// Stable order of `keys`, ties kept in declaration order.
pub(super) fn stable_order<K: Ord>(keys: impl Iterator<Item = K>) -> Vec<usize> {
    let mut order: Vec<(K, usize)> = keys.enumerate().map(|(i, k)| (k, i)).collect();
    order.sort_by(|a, b| a.0.cmp(&b.0));
    order.into_iter().map(|(_, i)| i).collect()
}

/// The opcode field: owning task value in the high half.
pub(super) fn opcode_field(task_value: u16, value: u8) -> u32 {
    (u32::from(task_value) << 16) | u32::from(value)
}

impl ProviderEncoder<'_, '_> {
    pub(super) fn write_channels(&mut self) -> Result<Option<u32>, EncodeError> {
        let provider = self.provider;
        if provider.channels().is_empty() {
            return Ok(None);
        }

        let start = self.begin_list(b"CHAN");
        let mut names = Vec::with_capacity(provider.channels().len());
        for (i, channel) in provider.channels().iter().enumerate() {
            let entity = EntityRef::Channel(ChannelId(i as u32));
            let offset = self.w.offset()?;
            self.offsets.record(entity, offset)?;

            let mut flags = ChannelFlags::empty();
            flags.set(ChannelFlags::IMPORTED, channel.imported);
            flags.set(ChannelFlags::ENABLED, channel.enabled);

            self.w.write_u32(u32::from(channel.value));
            names.push(PendingName {
                patch_at: self.w.reserve(4),
                text: &channel.name,
            });
            self.w.write_u32(flags.bits());
            let message = self.message_id(entity);
            self.w.write_u32(message);
        }
        self.write_names(&names)?;

        self.finish_list(start, provider.channels().len()).map(Some)
    }

    pub(super) fn write_levels(&mut self) -> Result<u32, EncodeError> {
        let provider = self.provider;
        let start = self.begin_list(b"LEVL");
        let order = stable_order(provider.levels().iter().map(|l| l.value));

        let mut names = Vec::with_capacity(order.len());
        for i in order.iter().copied() {
            let level = &provider.levels()[i];
            let entity = EntityRef::Level(LevelId(i as u32));
            let offset = self.w.offset()?;
            self.offsets.record(entity, offset)?;

            self.w.write_u32(u32::from(level.value));
            let message = self.message_id(entity);
            self.w.write_u32(message);
            names.push(PendingName {
                patch_at: self.w.reserve(4),
                text: &level.name,
            });
        }
        self.write_names(&names)?;

        self.finish_list(start, order.len())
    }

    pub(super) fn write_opcodes(&mut self) -> Result<u32, EncodeError> {
        let provider = self.provider;
        let start = self.begin_list(b"OPCO");
        let fields: Vec<u32> = provider
            .opcodes()
            .iter()
            .map(|o| opcode_field(o.task.map(|t| provider[t].value).unwrap_or(0), o.value))
            .collect();
        let order = stable_order(fields.iter().copied());

        let mut names = Vec::with_capacity(order.len());
        for i in order.iter().copied() {
            let entity = EntityRef::Opcode(OpcodeId(i as u32));
            let offset = self.w.offset()?;
            self.offsets.record(entity, offset)?;

            self.w.write_u32(fields[i]);
            let message = self.message_id(entity);
            self.w.write_u32(message);
            names.push(PendingName {
                patch_at: self.w.reserve(4),
                text: &provider.opcodes()[i].name,
            });
        }
        self.write_names(&names)?;

        self.finish_list(start, order.len())
    }

    pub(super) fn write_tasks(&mut self) -> Result<u32, EncodeError> {
        let provider = self.provider;
        let start = self.begin_list(b"TASK");

        let mut names = Vec::with_capacity(provider.tasks().len());
        for (i, task) in provider.tasks().iter().enumerate() {
            let entity = EntityRef::Task(TaskId(i as u32));
            let offset = self.w.offset()?;
            self.offsets.record(entity, offset)?;

            self.w.write_u32(u32::from(task.value));
            let message = self.message_id(entity);
            self.w.write_u32(message);
            self.w.write_guid(&task.event_guid.unwrap_or_default());
            names.push(PendingName {
                patch_at: self.w.reserve(4),
                text: &task.name,
            });
        }
        self.write_names(&names)?;

        self.finish_list(start, provider.tasks().len())
    }

    pub(super) fn write_keywords(&mut self) -> Result<u32, EncodeError> {
        let provider = self.provider;
        let start = self.begin_list(b"KEYW");
        let order = stable_order(provider.keywords().iter().map(|k| k.mask));

        let mut names = Vec::with_capacity(order.len());
        for i in order.iter().copied() {
            let keyword = &provider.keywords()[i];
            let entity = EntityRef::Keyword(KeywordId(i as u32));
            let offset = self.w.offset()?;
            self.offsets.record(entity, offset)?;

            self.w.write_u64(keyword.mask);
            let message = self.message_id(entity);
            self.w.write_u32(message);
            names.push(PendingName {
                patch_at: self.w.reserve(4),
                text: &keyword.name,
            });
        }
        self.write_names(&names)?;

        self.finish_list(start, order.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stable_order_keeps_ties_in_declaration_order() {
        assert_eq!(stable_order([3u32, 1, 3, 0, 1].into_iter()), vec![3, 1, 4, 0, 2]);
        assert_eq!(stable_order(std::iter::empty::<u8>()), Vec::<usize>::new());
    }

    #[test]
    fn test_opcode_field_packs_task_high() {
        assert_eq!(opcode_field(0x12, 0x0A), 0x0012_000A);
        assert_eq!(opcode_field(0, 240), 240);
    }
}
