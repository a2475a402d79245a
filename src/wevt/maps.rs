//! `MAPS` (value and bit maps) and `QTAB` (named-query pattern maps).

use crate::err::EncodeError;
use crate::model::{EntityRef, MapId, PatternMapId};
use crate::utils::cmp_utf16_ordinal;

use super::encoder::{PendingName, ProviderEncoder};
use super::writer::to_u32;

/// Signature, length, name offset and item count.
pub const MAP_HEADER_LEN: usize = 16;
pub const MAP_ITEM_LEN: usize = 8;
pub const QUERY_ENTRY_LEN: usize = 16;
pub const QUERY_ITEM_LEN: usize = 8;

impl ProviderEncoder<'_, '_> {
    /// Offset table sorted by map name, the sorted names, then each map in declaration order.
    pub(super) fn write_maps(&mut self) -> Result<Option<u32>, EncodeError> {
        let maps = self.provider.maps();
        if maps.is_empty() {
            return Ok(None);
        }

        let start = self.begin_list(b"MAPS");
        let table_at = self.w.reserve(maps.len() * 4);

        let mut by_name: Vec<usize> = (0..maps.len()).collect();
        by_name.sort_by(|a, b| cmp_utf16_ordinal(&maps[*a].name, &maps[*b].name));

        let mut name_offsets = vec![0u32; maps.len()];
        for &i in &by_name {
            name_offsets[i] = self.w.write_string(&maps[i].name)?;
        }

        for (i, map) in maps.iter().enumerate() {
            let id = MapId(i as u32);
            let map_start = self.w.position();
            let offset = self.w.offset()?;
            self.offsets.record(EntityRef::Map(id), offset)?;

            self.w.write_bytes(&map.kind.signature());
            let length_at = self.w.reserve(4);
            self.w.write_u32(name_offsets[i]);
            self.w.write_u32(to_u32("map item count", map.items.len())?);

            for (item_index, item) in map.items.iter().enumerate() {
                let entity = EntityRef::MapItem {
                    map: id,
                    item: item_index as u32,
                };
                let offset = self.w.offset()?;
                self.offsets.record(entity, offset)?;

                self.w.write_u32(item.value);
                let message = self.message_id(entity);
                self.w.write_u32(message);
            }

            let length = self.w.position() - map_start;
            self.w.patch_u32(length_at, to_u32("map length", length)?)?;
        }

        for (slot, &i) in by_name.iter().enumerate() {
            let offset = self
                .offsets
                .resolve(Some(EntityRef::Map(MapId(i as u32))))?;
            self.w.patch_u32(table_at + slot * 4, offset)?;
        }

        self.finish_list(start, maps.len()).map(Some)
    }

    /// Entry array, then per pattern map its item array followed by its strings.
    pub(super) fn write_named_queries(&mut self) -> Result<Option<u32>, EncodeError> {
        let pattern_maps = self.provider.pattern_maps();
        if pattern_maps.is_empty() {
            return Ok(None);
        }

        let start = self.begin_list(b"QTAB");
        let mut entries = Vec::with_capacity(pattern_maps.len());
        for i in 0..pattern_maps.len() {
            let offset = self.w.offset()?;
            self.offsets
                .record(EntityRef::PatternMap(PatternMapId(i as u32)), offset)?;
            entries.push(self.w.reserve(QUERY_ENTRY_LEN));
        }

        for (entry, pattern_map) in entries.into_iter().zip(pattern_maps) {
            self.w.patch_u32(
                entry + 8,
                to_u32("pattern map item count", pattern_map.items.len())?,
            )?;
            if !pattern_map.items.is_empty() {
                let items_offset = self.w.offset()?;
                self.w.patch_u32(entry + 12, items_offset)?;
            }

            let mut names = vec![
                PendingName {
                    patch_at: entry,
                    text: &pattern_map.name,
                },
                PendingName {
                    patch_at: entry + 4,
                    text: &pattern_map.format,
                },
            ];
            for item in &pattern_map.items {
                let at = self.w.reserve(QUERY_ITEM_LEN);
                names.push(PendingName {
                    patch_at: at,
                    text: &item.name,
                });
                names.push(PendingName {
                    patch_at: at + 4,
                    text: &item.value,
                });
            }
            self.write_names(&names)?;
        }

        self.finish_list(start, pattern_maps.len()).map(Some)
    }
}
