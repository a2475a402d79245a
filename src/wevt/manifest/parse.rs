use crate::guid::Guid;
use crate::model::MapKind;
use crate::wevt::{
    BlockKind, CHANNEL_ENTRY_LEN, CRIM_HEADER_LEN, EVENT_ENTRY_LEN, EVENT_HEADER_LEN,
    FILTER_ENTRY_LEN, KEYWORD_ENTRY_LEN, LEVEL_ENTRY_LEN, LIST_HEADER_LEN, MAP_HEADER_LEN,
    MAP_ITEM_LEN, OPCODE_ENTRY_LEN, PROPERTY_RECORD_LEN, PROVIDER_ENTRY_LEN, PropertyFlags,
    QUERY_ENTRY_LEN, QUERY_ITEM_LEN, SLOT_COUNT, TASK_ENTRY_LEN, TEMPLATE_HEADER_LEN,
    WEVT_HEADER_LEN,
};

use super::error::{CrimParseError, Result};
use super::types::*;
use super::util::*;

impl<'a> CrimManifest<'a> {
    /// Parse a CRIM blob (the payload stored inside a `WEVT_TEMPLATE` resource).
    ///
    /// Every offset is bounds-checked against the blob and every referenced name is decoded,
    /// so a successful parse means all references in the blob resolve.
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        let header = parse_crim_header(data)?;
        let crim_size_usize =
            usize::try_from(header.size).map_err(|_| CrimParseError::SizeOutOfBounds {
                what: "CRIM.size",
                offset: 0,
                size: header.size,
            })?;
        if crim_size_usize > data.len() {
            return Err(CrimParseError::SizeOutOfBounds {
                what: "CRIM.size",
                offset: 0,
                size: header.size,
            });
        }

        let data = &data[..crim_size_usize];

        let provider_count = usize::try_from(header.provider_count).map_err(|_| {
            CrimParseError::CountOutOfBounds {
                what: "CRIM.provider_count",
                offset: 12,
                count: header.provider_count,
            }
        })?;
        let descriptors_len = provider_count.checked_mul(PROVIDER_ENTRY_LEN).ok_or(
            CrimParseError::CountOutOfBounds {
                what: "CRIM.provider_count",
                offset: 12,
                count: header.provider_count,
            },
        )?;
        require_len(
            data,
            CRIM_HEADER_LEN,
            descriptors_len,
            "CRIM provider descriptor array",
        )?;

        let mut providers = Vec::with_capacity(provider_count);
        for i in 0..provider_count {
            let desc_off = CRIM_HEADER_LEN + i * PROVIDER_ENTRY_LEN;
            let guid = read_guid_named(data, desc_off, "CRIM.provider.guid")?;
            let provider_off = read_u32_named(data, desc_off + 16, "CRIM.provider.offset")?;
            providers.push(parse_provider(data, guid, provider_off)?);
        }

        Ok(Self {
            data,
            header,
            providers,
        })
    }
}

fn parse_crim_header(data: &[u8]) -> Result<CrimHeader> {
    let sig = read_sig_named(data, 0, "CRIM signature")?;
    if sig != *b"CRIM" {
        return Err(CrimParseError::InvalidSignature {
            offset: 0,
            expected: *b"CRIM",
            found: sig,
        });
    }

    let size = read_u32_named(data, 4, "CRIM.size")?;
    let major_version = read_u16_named(data, 8, "CRIM.major_version")?;
    let minor_version = read_u16_named(data, 10, "CRIM.minor_version")?;
    let provider_count = read_u32_named(data, 12, "CRIM.provider_count")?;

    if (size as usize) < CRIM_HEADER_LEN {
        return Err(CrimParseError::SizeOutOfBounds {
            what: "CRIM.size",
            offset: 0,
            size,
        });
    }

    Ok(CrimHeader {
        size,
        major_version,
        minor_version,
        provider_count,
    })
}

fn parse_provider(crim: &[u8], guid: Guid, provider_off: u32) -> Result<ProviderBlock<'_>> {
    let off = u32_to_usize(provider_off, "WEVT provider offset", crim.len())?;
    require_len(crim, off, WEVT_HEADER_LEN, "WEVT header")?;

    let sig = read_sig_named(crim, off, "WEVT signature")?;
    if sig != *b"WEVT" {
        return Err(CrimParseError::InvalidSignature {
            offset: provider_off,
            expected: *b"WEVT",
            found: sig,
        });
    }

    let size = read_u32_named(crim, off + 4, "WEVT.size")?;
    let message_identifier = message_id(read_u32_named(crim, off + 8, "WEVT.message_identifier")?);
    let slot_count = read_u32_named(crim, off + 12, "WEVT.slot_count")?;
    checked_end(crim.len(), provider_off, size, "WEVT.size")?;

    if slot_count as usize > SLOT_COUNT {
        return Err(CrimParseError::CountOutOfBounds {
            what: "WEVT.slot_count",
            offset: provider_off + 12,
            count: slot_count,
        });
    }

    let mut slots = Vec::with_capacity(slot_count as usize);
    for i in 0..slot_count as usize {
        let slot_off = off + 16 + i * 8;
        let kind = read_u32_named(crim, slot_off, "WEVT.slot.kind")?;
        let offset = read_u32_named(crim, slot_off + 4, "WEVT.slot.offset")?;
        let kind = BlockKind::from_u32(kind).ok_or(CrimParseError::UnknownBlockKind {
            offset: usize_to_u32(slot_off),
            kind,
        })?;
        slots.push(Slot { kind, offset });
    }

    let elements = parse_provider_elements(crim, &slots)?;

    Ok(ProviderBlock {
        guid,
        offset: provider_off,
        size,
        message_identifier,
        slots,
        elements,
    })
}

fn parse_provider_elements<'a>(crim: &'a [u8], slots: &[Slot]) -> Result<ProviderElements<'a>> {
    let mut out = ProviderElements::default();

    for slot in slots {
        let off = slot.offset;
        match slot.kind {
            BlockKind::Channel => out.channels = Some(parse_channels(crim, off)?),
            BlockKind::Level => out.levels = Some(parse_levels(crim, off)?),
            BlockKind::Opcode => out.opcodes = Some(parse_opcodes(crim, off)?),
            BlockKind::Task => out.tasks = Some(parse_tasks(crim, off)?),
            BlockKind::Keyword => out.keywords = Some(parse_keywords(crim, off)?),
            BlockKind::Maps => out.maps = Some(parse_maps(crim, off)?),
            BlockKind::NamedQuery => out.named_queries = Some(parse_queries(crim, off)?),
            BlockKind::Template => out.templates = Some(parse_ttbl(crim, off)?),
            BlockKind::Event => out.events = Some(parse_events(crim, off)?),
            BlockKind::Filter => out.filters = Some(parse_filters(crim, off)?),
        }
    }

    Ok(out)
}

/// A validated list header.
struct ListView {
    offset: u32,
    size: u32,
    count: usize,
    /// Absolute start of the entry array.
    entries: usize,
    /// End of the block, or the end of the entry array for an empty block.
    end: usize,
}

fn parse_list(
    crim: &[u8],
    off: u32,
    kind: BlockKind,
    header_len: usize,
    entry_len: usize,
    what: &'static str,
) -> Result<ListView> {
    let off_usize = u32_to_usize(off, what, crim.len())?;
    require_len(crim, off_usize, header_len, what)?;

    let expected = kind.signature();
    let sig = read_sig_named(crim, off_usize, what)?;
    if sig != expected {
        return Err(CrimParseError::InvalidSignature {
            offset: off,
            expected,
            found: sig,
        });
    }

    let size = read_u32_named(crim, off_usize + 4, what)?;
    let count = read_u32_named(crim, off_usize + 8, what)?;
    let count_err = CrimParseError::CountOutOfBounds {
        what,
        offset: off + 8,
        count,
    };

    let count_usize = usize::try_from(count).map_err(|_| count_err.clone())?;
    let entries = off_usize + header_len;
    let entries_end = count_usize
        .checked_mul(entry_len)
        .and_then(|n| entries.checked_add(n))
        .ok_or_else(|| count_err.clone())?;

    let end = if size == 0 {
        // Always-present lists are written empty with a zero size.
        if count != 0 {
            return Err(CrimParseError::SizeOutOfBounds {
                what,
                offset: off,
                size,
            });
        }
        entries
    } else {
        if (size as usize) < header_len {
            return Err(CrimParseError::SizeOutOfBounds {
                what,
                offset: off,
                size,
            });
        }
        let end = checked_end(crim.len(), off, size, what)?;
        if entries_end > end {
            return Err(count_err);
        }
        end
    };

    Ok(ListView {
        offset: off,
        size,
        count: count_usize,
        entries,
        end,
    })
}

fn parse_channels(crim: &[u8], off: u32) -> Result<ChannelDefinitions> {
    let list = parse_list(
        crim,
        off,
        BlockKind::Channel,
        LIST_HEADER_LEN,
        CHANNEL_ENTRY_LEN,
        "CHAN",
    )?;

    let mut channels = Vec::with_capacity(list.count);
    for i in 0..list.count {
        let d_off = list.entries + i * CHANNEL_ENTRY_LEN;
        let name_offset = read_u32_named(crim, d_off + 4, "CHAN.name_offset")?;
        channels.push(ChannelDefinition {
            offset: usize_to_u32(d_off),
            identifier: read_u32_named(crim, d_off, "CHAN.identifier")?,
            name_offset,
            flags: read_u32_named(crim, d_off + 8, "CHAN.flags")?,
            message_identifier: message_id(read_u32_named(
                crim,
                d_off + 12,
                "CHAN.message_identifier",
            )?),
            name: read_optional_string(crim, name_offset, "CHAN name")?,
        });
    }

    Ok(ChannelDefinitions {
        offset: list.offset,
        size: list.size,
        channels,
    })
}

fn parse_levels(crim: &[u8], off: u32) -> Result<LevelDefinitions> {
    let list = parse_list(crim, off, BlockKind::Level, LIST_HEADER_LEN, LEVEL_ENTRY_LEN, "LEVL")?;

    let mut levels = Vec::with_capacity(list.count);
    for i in 0..list.count {
        let d_off = list.entries + i * LEVEL_ENTRY_LEN;
        let data_offset = read_u32_named(crim, d_off + 8, "LEVL.data_offset")?;
        levels.push(LevelDefinition {
            offset: usize_to_u32(d_off),
            identifier: read_u32_named(crim, d_off, "LEVL.identifier")?,
            message_identifier: message_id(read_u32_named(
                crim,
                d_off + 4,
                "LEVL.message_identifier",
            )?),
            data_offset,
            name: read_optional_string(crim, data_offset, "LEVL data")?,
        });
    }

    Ok(LevelDefinitions {
        offset: list.offset,
        size: list.size,
        levels,
    })
}

fn parse_opcodes(crim: &[u8], off: u32) -> Result<OpcodeDefinitions> {
    let list = parse_list(crim, off, BlockKind::Opcode, LIST_HEADER_LEN, OPCODE_ENTRY_LEN, "OPCO")?;

    let mut opcodes = Vec::with_capacity(list.count);
    for i in 0..list.count {
        let d_off = list.entries + i * OPCODE_ENTRY_LEN;
        let data_offset = read_u32_named(crim, d_off + 8, "OPCO.data_offset")?;
        opcodes.push(OpcodeDefinition {
            offset: usize_to_u32(d_off),
            identifier: read_u32_named(crim, d_off, "OPCO.identifier")?,
            message_identifier: message_id(read_u32_named(
                crim,
                d_off + 4,
                "OPCO.message_identifier",
            )?),
            data_offset,
            name: read_optional_string(crim, data_offset, "OPCO data")?,
        });
    }

    Ok(OpcodeDefinitions {
        offset: list.offset,
        size: list.size,
        opcodes,
    })
}

fn parse_tasks(crim: &[u8], off: u32) -> Result<TaskDefinitions> {
    let list = parse_list(crim, off, BlockKind::Task, LIST_HEADER_LEN, TASK_ENTRY_LEN, "TASK")?;

    let mut tasks = Vec::with_capacity(list.count);
    for i in 0..list.count {
        let d_off = list.entries + i * TASK_ENTRY_LEN;
        let data_offset = read_u32_named(crim, d_off + 24, "TASK.data_offset")?;
        tasks.push(TaskDefinition {
            offset: usize_to_u32(d_off),
            identifier: read_u32_named(crim, d_off, "TASK.identifier")?,
            message_identifier: message_id(read_u32_named(
                crim,
                d_off + 4,
                "TASK.message_identifier",
            )?),
            mui_identifier: read_guid_named(crim, d_off + 8, "TASK.mui_identifier")?,
            data_offset,
            name: read_optional_string(crim, data_offset, "TASK data")?,
        });
    }

    Ok(TaskDefinitions {
        offset: list.offset,
        size: list.size,
        tasks,
    })
}

fn parse_keywords(crim: &[u8], off: u32) -> Result<KeywordDefinitions> {
    let list = parse_list(
        crim,
        off,
        BlockKind::Keyword,
        LIST_HEADER_LEN,
        KEYWORD_ENTRY_LEN,
        "KEYW",
    )?;

    let mut keywords = Vec::with_capacity(list.count);
    for i in 0..list.count {
        let d_off = list.entries + i * KEYWORD_ENTRY_LEN;
        let data_offset = read_u32_named(crim, d_off + 12, "KEYW.data_offset")?;
        keywords.push(KeywordDefinition {
            offset: usize_to_u32(d_off),
            identifier: read_u64_named(crim, d_off, "KEYW.identifier")?,
            message_identifier: message_id(read_u32_named(
                crim,
                d_off + 8,
                "KEYW.message_identifier",
            )?),
            data_offset,
            name: read_optional_string(crim, data_offset, "KEYW data")?,
        });
    }

    Ok(KeywordDefinitions {
        offset: list.offset,
        size: list.size,
        keywords,
    })
}

fn parse_maps(crim: &[u8], off: u32) -> Result<MapsDefinitions> {
    let list = parse_list(crim, off, BlockKind::Maps, LIST_HEADER_LEN, 4, "MAPS")?;

    let mut map_offsets = Vec::with_capacity(list.count);
    for i in 0..list.count {
        map_offsets.push(read_u32_named(crim, list.entries + i * 4, "MAPS.map_offset")?);
    }

    // The offset table is ordered by name; the maps themselves are parsed in file order.
    let mut file_order = map_offsets.clone();
    file_order.sort_unstable();
    file_order.dedup();

    let mut maps = Vec::with_capacity(file_order.len());
    for map_off in file_order {
        maps.push(parse_map(crim, map_off, list.end)?);
    }

    Ok(MapsDefinitions {
        offset: list.offset,
        size: list.size,
        map_offsets,
        maps,
    })
}

fn parse_map(crim: &[u8], off: u32, maps_end: usize) -> Result<MapDefinition> {
    let off_usize = u32_to_usize(off, "MAPS map offset", maps_end)?;
    require_len(&crim[..maps_end], off_usize, MAP_HEADER_LEN, "map header")?;

    let sig = read_sig_named(crim, off_usize, "map signature")?;
    let kind = if sig == MapKind::Value.signature() {
        MapKind::Value
    } else if sig == MapKind::Bit.signature() {
        MapKind::Bit
    } else {
        return Err(CrimParseError::InvalidSignature {
            offset: off,
            expected: MapKind::Value.signature(),
            found: sig,
        });
    };

    let size = read_u32_named(crim, off_usize + 4, "map size")?;
    let name_offset = read_u32_named(crim, off_usize + 8, "map name_offset")?;
    let count = read_u32_named(crim, off_usize + 12, "map entry_count")?;
    let end = checked_end(maps_end, off, size, "map size")?;

    let fits = (count as usize)
        .checked_mul(MAP_ITEM_LEN)
        .and_then(|n| n.checked_add(off_usize + MAP_HEADER_LEN))
        .is_some_and(|items_end| items_end <= end);
    if !fits {
        return Err(CrimParseError::CountOutOfBounds {
            what: "map entry_count",
            offset: off + 12,
            count,
        });
    }

    let mut entries = Vec::with_capacity(count as usize);
    for i in 0..count as usize {
        let e_off = off_usize + MAP_HEADER_LEN + i * MAP_ITEM_LEN;
        entries.push(MapEntry {
            offset: usize_to_u32(e_off),
            identifier: read_u32_named(crim, e_off, "map entry identifier")?,
            message_identifier: message_id(read_u32_named(
                crim,
                e_off + 4,
                "map entry message_identifier",
            )?),
        });
    }

    Ok(MapDefinition {
        offset: off,
        kind,
        size,
        name_offset,
        name: read_optional_string(crim, name_offset, "map name")?,
        entries,
    })
}

fn parse_queries(crim: &[u8], off: u32) -> Result<QueryTable> {
    let list = parse_list(
        crim,
        off,
        BlockKind::NamedQuery,
        LIST_HEADER_LEN,
        QUERY_ENTRY_LEN,
        "QTAB",
    )?;

    let mut queries = Vec::with_capacity(list.count);
    for i in 0..list.count {
        let q_off = list.entries + i * QUERY_ENTRY_LEN;
        let name_offset = read_u32_named(crim, q_off, "QTAB.name_offset")?;
        let format_offset = read_u32_named(crim, q_off + 4, "QTAB.format_offset")?;
        let item_count = read_u32_named(crim, q_off + 8, "QTAB.item_count")?;
        let items_offset = read_u32_named(crim, q_off + 12, "QTAB.items_offset")?;

        let items_off = u32_to_usize(items_offset, "QTAB.items_offset", list.end)?;
        let items_len = (item_count as usize)
            .checked_mul(QUERY_ITEM_LEN)
            .ok_or(CrimParseError::CountOutOfBounds {
                what: "QTAB.item_count",
                offset: usize_to_u32(q_off + 8),
                count: item_count,
            })?;
        if item_count > 0 {
            require_len(&crim[..list.end], items_off, items_len, "QTAB items")?;
        }

        let mut items = Vec::with_capacity(item_count as usize);
        for j in 0..item_count as usize {
            let it_off = items_off + j * QUERY_ITEM_LEN;
            let name_offset = read_u32_named(crim, it_off, "QTAB.item.name_offset")?;
            let value_offset = read_u32_named(crim, it_off + 4, "QTAB.item.value_offset")?;
            items.push(NamedQueryItem {
                offset: usize_to_u32(it_off),
                name_offset,
                name: read_optional_string(crim, name_offset, "QTAB item name")?,
                value_offset,
                value: read_optional_string(crim, value_offset, "QTAB item value")?,
            });
        }

        queries.push(NamedQuery {
            offset: usize_to_u32(q_off),
            name_offset,
            name: read_optional_string(crim, name_offset, "QTAB name")?,
            format_offset,
            format: read_optional_string(crim, format_offset, "QTAB format")?,
            items_offset,
            items,
        });
    }

    Ok(QueryTable {
        offset: list.offset,
        size: list.size,
        queries,
    })
}

fn parse_ttbl(crim: &[u8], off: u32) -> Result<TemplateTable<'_>> {
    // Every TEMP is at least a header long, which bounds the count by the block size.
    let list = parse_list(
        crim,
        off,
        BlockKind::Template,
        LIST_HEADER_LEN,
        TEMPLATE_HEADER_LEN,
        "TTBL",
    )?;

    let mut templates = Vec::new();
    let mut cur = list.entries;
    for _ in 0..list.count {
        let template = parse_temp(crim, cur, list.end)?;
        cur += template.size as usize;
        templates.push(template);
    }

    Ok(TemplateTable {
        offset: list.offset,
        size: list.size,
        templates,
    })
}

fn parse_temp(crim: &[u8], cur: usize, end: usize) -> Result<TemplateDefinition<'_>> {
    let temp_off = usize_to_u32(cur);
    require_len(&crim[..end], cur, TEMPLATE_HEADER_LEN, "TEMP header")?;

    let sig = read_sig_named(crim, cur, "TEMP signature")?;
    if sig != *b"TEMP" {
        return Err(CrimParseError::InvalidSignature {
            offset: temp_off,
            expected: *b"TEMP",
            found: sig,
        });
    }

    let size = read_u32_named(crim, cur + 4, "TEMP.size")?;
    if (size as usize) < TEMPLATE_HEADER_LEN {
        return Err(CrimParseError::SizeOutOfBounds {
            what: "TEMP.size",
            offset: temp_off,
            size,
        });
    }
    let temp_end = checked_end(end, temp_off, size, "TEMP.size")?;

    let property_count = read_u32_named(crim, cur + 8, "TEMP.property_count")?;
    let top_level_count = read_u32_named(crim, cur + 12, "TEMP.top_level_count")?;
    let properties_offset = read_u32_named(crim, cur + 16, "TEMP.properties_offset")?;
    let flags = read_u32_named(crim, cur + 20, "TEMP.flags")?;
    let identifier = read_array_named::<16>(crim, cur + 24, "TEMP.identifier")?;

    if top_level_count > property_count {
        return Err(CrimParseError::CountOutOfBounds {
            what: "TEMP.top_level_count",
            offset: temp_off + 12,
            count: top_level_count,
        });
    }

    let properties_off = properties_offset as usize;
    if properties_off < cur + TEMPLATE_HEADER_LEN || properties_off > temp_end {
        return Err(CrimParseError::OffsetOutOfBounds {
            what: "TEMP.properties_offset",
            offset: properties_offset,
            len: temp_end,
        });
    }
    let binxml = &crim[cur + TEMPLATE_HEADER_LEN..properties_off];

    let records_len = (property_count as usize)
        .checked_mul(PROPERTY_RECORD_LEN)
        .ok_or(CrimParseError::CountOutOfBounds {
            what: "TEMP.property_count",
            offset: temp_off + 8,
            count: property_count,
        })?;
    require_len(&crim[..temp_end], properties_off, records_len, "template property records")?;

    let mut properties = Vec::with_capacity(property_count as usize);
    for i in 0..property_count as usize {
        let p_off = properties_off + i * PROPERTY_RECORD_LEN;
        let flags =
            PropertyFlags::from_bits_retain(read_u32_named(crim, p_off, "TEMP.property.flags")?);
        let shape = if flags.contains(PropertyFlags::STRUCT) {
            PropertyShape::Struct {
                member_start: read_u16_named(crim, p_off + 4, "TEMP.property.member_start")?,
                member_count: read_u16_named(crim, p_off + 6, "TEMP.property.member_count")?,
            }
        } else {
            PropertyShape::Data {
                input_type: read_u8_named(crim, p_off + 4, "TEMP.property.input_type")?,
                output_type: read_u8_named(crim, p_off + 5, "TEMP.property.output_type")?,
                map_offset: nonzero(read_u32_named(crim, p_off + 8, "TEMP.property.map_offset")?),
            }
        };
        let name_offset = read_u32_named(crim, p_off + 16, "TEMP.property.name_offset")?;
        let names_start = properties_off + records_len;
        if name_offset != 0
            && ((name_offset as usize) < names_start || name_offset as usize >= temp_end)
        {
            return Err(CrimParseError::OffsetOutOfBounds {
                what: "template property name_offset",
                offset: name_offset,
                len: temp_end,
            });
        }

        properties.push(TemplateProperty {
            offset: usize_to_u32(p_off),
            flags,
            shape,
            count: read_u16_named(crim, p_off + 12, "TEMP.property.count")?,
            length: read_u16_named(crim, p_off + 14, "TEMP.property.length")?,
            name_offset,
            name: read_optional_string(&crim[..temp_end], name_offset, "template property name")?,
        });
    }

    Ok(TemplateDefinition {
        offset: temp_off,
        size,
        property_count,
        top_level_count,
        properties_offset,
        flags,
        identifier,
        binxml,
        properties,
    })
}

fn parse_events(crim: &[u8], off: u32) -> Result<EventDefinitions> {
    let list = parse_list(crim, off, BlockKind::Event, EVENT_HEADER_LEN, EVENT_ENTRY_LEN, "EVNT")?;

    let mut events = Vec::with_capacity(list.count);
    for i in 0..list.count {
        let e_off = list.entries + i * EVENT_ENTRY_LEN;
        let keyword_count = read_u32_named(crim, e_off + 36, "EVNT.event.keyword_count")?;
        let keywords_offset = read_u32_named(crim, e_off + 40, "EVNT.event.keywords_offset")?;

        let mut keyword_offsets = Vec::new();
        if keyword_count > 0 {
            let k_off = u32_to_usize(keywords_offset, "EVNT.event.keywords_offset", list.end)?;
            let need = (keyword_count as usize).checked_mul(4).ok_or(
                CrimParseError::CountOutOfBounds {
                    what: "EVNT.event.keyword_count",
                    offset: usize_to_u32(e_off + 36),
                    count: keyword_count,
                },
            )?;
            require_len(&crim[..list.end], k_off, need, "EVNT keyword offsets")?;
            keyword_offsets.reserve(keyword_count as usize);
            for j in 0..keyword_count as usize {
                keyword_offsets.push(read_u32_named(crim, k_off + j * 4, "EVNT keyword offset")?);
            }
        }

        events.push(EventDefinition {
            offset: usize_to_u32(e_off),
            identifier: read_u16_named(crim, e_off, "EVNT.event.identifier")?,
            version: read_u8_named(crim, e_off + 2, "EVNT.event.version")?,
            channel: read_u8_named(crim, e_off + 3, "EVNT.event.channel")?,
            level: read_u8_named(crim, e_off + 4, "EVNT.event.level")?,
            opcode: read_u8_named(crim, e_off + 5, "EVNT.event.opcode")?,
            task: read_u16_named(crim, e_off + 6, "EVNT.event.task")?,
            keywords: read_u64_named(crim, e_off + 8, "EVNT.event.keywords")?,
            message_identifier: message_id(read_u32_named(
                crim,
                e_off + 16,
                "EVNT.event.message_identifier",
            )?),
            template_offset: nonzero(read_u32_named(
                crim,
                e_off + 20,
                "EVNT.event.template_offset",
            )?),
            opcode_offset: nonzero(read_u32_named(crim, e_off + 24, "EVNT.event.opcode_offset")?),
            level_offset: nonzero(read_u32_named(crim, e_off + 28, "EVNT.event.level_offset")?),
            task_offset: nonzero(read_u32_named(crim, e_off + 32, "EVNT.event.task_offset")?),
            keyword_offsets,
            channel_offset: nonzero(read_u32_named(crim, e_off + 44, "EVNT.event.channel_offset")?),
        });
    }

    Ok(EventDefinitions {
        offset: list.offset,
        size: list.size,
        events,
    })
}

fn parse_filters(crim: &[u8], off: u32) -> Result<FilterDefinitions> {
    let list = parse_list(crim, off, BlockKind::Filter, 16, FILTER_ENTRY_LEN, "FLTR")?;
    let trailing = read_u32_named(crim, list.entries - 4, "FLTR.trailing")?;

    let mut filters = Vec::with_capacity(list.count);
    for i in 0..list.count {
        let f_off = list.entries + i * FILTER_ENTRY_LEN;
        let name_offset = read_u32_named(crim, f_off + 8, "FLTR.name_offset")?;
        filters.push(FilterDefinition {
            offset: usize_to_u32(f_off),
            value: read_u8_named(crim, f_off, "FLTR.value")?,
            version: read_u8_named(crim, f_off + 1, "FLTR.version")?,
            message_identifier: message_id(read_u32_named(
                crim,
                f_off + 4,
                "FLTR.message_identifier",
            )?),
            name_offset,
            name: read_optional_string(crim, name_offset, "FLTR name")?,
            template_offset: nonzero(read_u32_named(crim, f_off + 12, "FLTR.template_offset")?),
        });
    }

    Ok(FilterDefinitions {
        offset: list.offset,
        size: list.size,
        trailing,
        filters,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_rejects_bad_signature_and_truncation() {
        assert!(matches!(
            CrimManifest::parse(b"MIRC\x10\0\0\0\x03\0\x01\0\0\0\0\0"),
            Err(CrimParseError::InvalidSignature { offset: 0, .. })
        ));
        assert!(matches!(
            CrimManifest::parse(b"CRIM\x10\0"),
            Err(CrimParseError::Truncated { what: "CRIM.size", .. })
        ));
    }

    #[test]
    fn test_parses_empty_blob() {
        let blob = b"CRIM\x10\0\0\0\x03\0\x01\0\0\0\0\0";
        let manifest = CrimManifest::parse(blob).unwrap();
        assert_eq!(
            manifest.header,
            CrimHeader {
                size: 16,
                major_version: 3,
                minor_version: 1,
                provider_count: 0
            }
        );
        assert!(manifest.providers.is_empty());
    }

    fn compiled_blob() -> Vec<u8> {
        use crate::compiler::Compiler;
        use crate::diagnostics::Diagnostics;
        use crate::model::*;
        use crate::settings::CompilerSettings;

        let mut p = Provider::new("Sample", Guid::default());
        let network = p.add_keyword(Keyword::new("Network", 0x1)).unwrap();
        let args = p
            .add_template(
                Template::new("Args").with_property(DataProperty::new("A", InType::UInt32)),
            )
            .unwrap();
        p.add_event(Event {
            keywords: vec![network],
            template: Some(args),
            ..Event::new(1, 0)
        })
        .unwrap();
        let mut manifest = Manifest::new();
        manifest.add_provider(p).unwrap();

        let mut diagnostics = Diagnostics::new();
        Compiler::new(CompilerSettings::new())
            .compile(&manifest, &mut diagnostics)
            .unwrap()
            .template
            .unwrap()
    }

    fn slot_offset(blob: &[u8], kind: BlockKind) -> usize {
        let manifest = CrimManifest::parse(blob).unwrap();
        manifest.providers[0]
            .slots
            .iter()
            .find(|slot| slot.kind == kind)
            .unwrap()
            .offset as usize
    }

    #[test]
    fn test_rejects_huge_template_count() {
        let mut blob = compiled_blob();
        let ttbl = slot_offset(&blob, BlockKind::Template);
        blob[ttbl + 8..ttbl + 12].copy_from_slice(&u32::MAX.to_le_bytes());

        assert!(matches!(
            CrimManifest::parse(&blob),
            Err(CrimParseError::CountOutOfBounds { what: "TTBL", .. })
        ));
    }

    #[test]
    fn test_rejects_huge_event_keyword_count() {
        let mut blob = compiled_blob();
        let evnt = slot_offset(&blob, BlockKind::Event);
        let keyword_count_at = evnt + EVENT_HEADER_LEN + 36;
        blob[keyword_count_at..keyword_count_at + 4].copy_from_slice(&u32::MAX.to_le_bytes());

        assert!(CrimManifest::parse(&blob).is_err());
    }

    #[test]
    fn test_provider_descriptors_must_fit() {
        let blob = b"CRIM\x10\0\0\0\x03\0\x01\0\x01\0\0\0";
        assert!(matches!(
            CrimManifest::parse(blob),
            Err(CrimParseError::Truncated {
                what: "CRIM provider descriptor array",
                ..
            })
        ));
    }
}
