//! `EVNT` and `FLTR`, the consumers of every other sub-block.

use crate::err::EncodeError;
use crate::model::{EntityRef, EventId, FilterId};

use super::encoder::{PendingName, ProviderEncoder};
use super::lists::stable_order;
use super::writer::to_u32;

pub const EVENT_HEADER_LEN: usize = 16;
pub const EVENT_ENTRY_LEN: usize = 48;
pub const FILTER_ENTRY_LEN: usize = 16;

impl ProviderEncoder<'_, '_> {
    /// Event descriptors sorted by value, then the per-event keyword offset arrays.
    pub(super) fn write_events(&mut self) -> Result<Option<u32>, EncodeError> {
        let provider = self.provider;
        let events = provider.events();
        if events.is_empty() {
            return Ok(None);
        }

        self.w.align(8);
        let start = self.begin_list(b"EVNT");
        self.w.write_u32(0);

        let order = stable_order(events.iter().map(|e| e.value));
        let mut keyword_arrays = Vec::with_capacity(order.len());
        for i in order.iter().copied() {
            let event = &events[i];
            let id = EventId(i as u32);
            let entity = EntityRef::Event(id);
            let offset = self.w.offset()?;
            self.offsets.record(entity, offset)?;

            let template = self.offsets.resolve(event.template.map(EntityRef::Template))?;
            let opcode = self.offsets.resolve(event.opcode.map(EntityRef::Opcode))?;
            let level = self.offsets.resolve(event.level.map(EntityRef::Level))?;
            let task = self.offsets.resolve(event.task.map(EntityRef::Task))?;
            let channel = self.offsets.resolve(event.channel.map(EntityRef::Channel))?;
            let message = self.message_id(entity);
            let keywords = self.index.event_keywords(id);

            self.w.write_u16(event.value);
            self.w.write_u8(event.version);
            self.w.write_u8(event.channel.map(|c| provider[c].value).unwrap_or(0));
            self.w.write_u8(event.level.map(|l| provider[l].value).unwrap_or(0));
            self.w.write_u8(event.opcode.map(|o| provider[o].value).unwrap_or(0));
            self.w.write_u16(event.task.map(|t| provider[t].value).unwrap_or(0));
            self.w.write_u64(keywords);
            self.w.write_u32(message);
            self.w.write_u32(template);
            self.w.write_u32(opcode);
            self.w.write_u32(level);
            self.w.write_u32(task);
            self.w.write_u32(to_u32("event keyword count", event.keywords.len())?);
            keyword_arrays.push((self.w.reserve(4), id));
            self.w.write_u32(channel);
        }

        for (patch_at, id) in keyword_arrays {
            let keywords = &provider[id].keywords;
            if keywords.is_empty() {
                continue;
            }
            let array_offset = self.w.offset()?;
            self.w.patch_u32(patch_at, array_offset)?;
            for keyword in keywords {
                let offset = self.offsets.resolve(Some(EntityRef::Keyword(*keyword)))?;
                self.w.write_u32(offset);
            }
        }

        self.finish_list(start, order.len()).map(Some)
    }

    /// Filter entries in declaration order, then their names.
    pub(super) fn write_filters(&mut self) -> Result<Option<u32>, EncodeError> {
        let provider = self.provider;
        let filters = provider.filters();
        if filters.is_empty() {
            return Ok(None);
        }

        let start = self.begin_list(b"FLTR");
        let trailing_at = self.w.reserve(4);

        let mut names = Vec::with_capacity(filters.len());
        let mut last_template = 0;
        for (i, filter) in filters.iter().enumerate() {
            let entity = EntityRef::Filter(FilterId(i as u32));
            let offset = self.w.offset()?;
            self.offsets.record(entity, offset)?;

            let template = self.offsets.resolve(filter.template.map(EntityRef::Template))?;
            let message = self.message_id(entity);
            last_template = template;

            self.w.write_u8(filter.value);
            self.w.write_u8(filter.version);
            self.w.write_u16(0);
            self.w.write_u32(message);
            names.push(PendingName {
                patch_at: self.w.reserve(4),
                text: &filter.name,
            });
            self.w.write_u32(template);
        }
        self.write_names(&names)?;

        // Older consumers expect the last filter's template offset in the header.
        if self.settings.get_legacy_filter_header() {
            self.w.patch_u32(trailing_at, last_template)?;
        }

        self.finish_list(start, filters.len()).map(Some)
    }
}
