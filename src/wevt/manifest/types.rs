use crate::guid::Guid;
use crate::model::MapKind;
use crate::wevt::{BlockKind, PropertyFlags};

#[derive(Debug, Clone)]
pub struct CrimManifest<'a> {
    /// Slice limited to CRIM.size (no trailing bytes).
    pub data: &'a [u8],
    pub header: CrimHeader,
    pub providers: Vec<ProviderBlock<'a>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrimHeader {
    pub size: u32,
    pub major_version: u16,
    pub minor_version: u16,
    pub provider_count: u32,
}

#[derive(Debug, Clone)]
pub struct ProviderBlock<'a> {
    pub guid: Guid,
    /// Offset of the WEVT block, relative to the start of the CRIM blob.
    pub offset: u32,
    pub size: u32,
    pub message_identifier: Option<u32>,
    /// The used slots, in file order.
    pub slots: Vec<Slot>,
    pub elements: ProviderElements<'a>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub kind: BlockKind,
    pub offset: u32,
}

#[derive(Debug, Clone, Default)]
pub struct ProviderElements<'a> {
    pub channels: Option<ChannelDefinitions>,
    pub levels: Option<LevelDefinitions>,
    pub opcodes: Option<OpcodeDefinitions>,
    pub tasks: Option<TaskDefinitions>,
    pub keywords: Option<KeywordDefinitions>,
    pub maps: Option<MapsDefinitions>,
    pub named_queries: Option<QueryTable>,
    pub templates: Option<TemplateTable<'a>>,
    pub events: Option<EventDefinitions>,
    pub filters: Option<FilterDefinitions>,
}

#[derive(Debug, Clone)]
pub struct ChannelDefinitions {
    pub offset: u32,
    pub size: u32,
    pub channels: Vec<ChannelDefinition>,
}

#[derive(Debug, Clone)]
pub struct ChannelDefinition {
    pub offset: u32,
    pub identifier: u32,
    pub name_offset: u32,
    pub flags: u32,
    pub message_identifier: Option<u32>,
    pub name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LevelDefinitions {
    pub offset: u32,
    pub size: u32,
    pub levels: Vec<LevelDefinition>,
}

#[derive(Debug, Clone)]
pub struct LevelDefinition {
    pub offset: u32,
    pub identifier: u32,
    pub message_identifier: Option<u32>,
    pub data_offset: u32,
    pub name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OpcodeDefinitions {
    pub offset: u32,
    pub size: u32,
    pub opcodes: Vec<OpcodeDefinition>,
}

#[derive(Debug, Clone)]
pub struct OpcodeDefinition {
    pub offset: u32,
    /// Owning task value in the high half, opcode value in the low half.
    pub identifier: u32,
    pub message_identifier: Option<u32>,
    pub data_offset: u32,
    pub name: Option<String>,
}

impl OpcodeDefinition {
    pub fn task(&self) -> u16 {
        (self.identifier >> 16) as u16
    }

    pub fn value(&self) -> u16 {
        (self.identifier & 0xFFFF) as u16
    }
}

#[derive(Debug, Clone)]
pub struct TaskDefinitions {
    pub offset: u32,
    pub size: u32,
    pub tasks: Vec<TaskDefinition>,
}

#[derive(Debug, Clone)]
pub struct TaskDefinition {
    pub offset: u32,
    pub identifier: u32,
    pub message_identifier: Option<u32>,
    pub mui_identifier: Guid,
    pub data_offset: u32,
    pub name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct KeywordDefinitions {
    pub offset: u32,
    pub size: u32,
    pub keywords: Vec<KeywordDefinition>,
}

#[derive(Debug, Clone)]
pub struct KeywordDefinition {
    pub offset: u32,
    pub identifier: u64,
    pub message_identifier: Option<u32>,
    pub data_offset: u32,
    pub name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MapsDefinitions {
    pub offset: u32,
    pub size: u32,
    /// Map offsets ordered by map name.
    pub map_offsets: Vec<u32>,
    /// Maps in file order.
    pub maps: Vec<MapDefinition>,
}

#[derive(Debug, Clone)]
pub struct MapDefinition {
    pub offset: u32,
    pub kind: MapKind,
    pub size: u32,
    pub name_offset: u32,
    pub name: Option<String>,
    pub entries: Vec<MapEntry>,
}

#[derive(Debug, Clone)]
pub struct MapEntry {
    pub offset: u32,
    pub identifier: u32,
    pub message_identifier: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct QueryTable {
    pub offset: u32,
    pub size: u32,
    pub queries: Vec<NamedQuery>,
}

#[derive(Debug, Clone)]
pub struct NamedQuery {
    pub offset: u32,
    pub name_offset: u32,
    pub name: Option<String>,
    pub format_offset: u32,
    pub format: Option<String>,
    pub items_offset: u32,
    pub items: Vec<NamedQueryItem>,
}

#[derive(Debug, Clone)]
pub struct NamedQueryItem {
    pub offset: u32,
    pub name_offset: u32,
    pub name: Option<String>,
    pub value_offset: u32,
    pub value: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TemplateTable<'a> {
    pub offset: u32,
    pub size: u32,
    pub templates: Vec<TemplateDefinition<'a>>,
}

#[derive(Debug, Clone)]
pub struct TemplateDefinition<'a> {
    pub offset: u32,
    pub size: u32,
    pub property_count: u32,
    pub top_level_count: u32,
    pub properties_offset: u32,
    pub flags: u32,
    pub identifier: [u8; 16],
    /// The BinXml payload, including any alignment padding.
    pub binxml: &'a [u8],
    pub properties: Vec<TemplateProperty>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyShape {
    Data {
        input_type: u8,
        output_type: u8,
        map_offset: Option<u32>,
    },
    Struct {
        member_start: u16,
        member_count: u16,
    },
}

#[derive(Debug, Clone)]
pub struct TemplateProperty {
    pub offset: u32,
    pub flags: PropertyFlags,
    pub shape: PropertyShape,
    pub count: u16,
    pub length: u16,
    pub name_offset: u32,
    pub name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EventDefinitions {
    pub offset: u32,
    pub size: u32,
    pub events: Vec<EventDefinition>,
}

#[derive(Debug, Clone)]
pub struct EventDefinition {
    pub offset: u32,
    pub identifier: u16,
    pub version: u8,
    pub channel: u8,
    pub level: u8,
    pub opcode: u8,
    pub task: u16,
    pub keywords: u64,
    pub message_identifier: Option<u32>,
    pub template_offset: Option<u32>,
    pub opcode_offset: Option<u32>,
    pub level_offset: Option<u32>,
    pub task_offset: Option<u32>,
    /// Offsets of the event's `KEYW` entries.
    pub keyword_offsets: Vec<u32>,
    pub channel_offset: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct FilterDefinitions {
    pub offset: u32,
    pub size: u32,
    /// The header field after the count.
    pub trailing: u32,
    pub filters: Vec<FilterDefinition>,
}

#[derive(Debug, Clone)]
pub struct FilterDefinition {
    pub offset: u32,
    pub value: u8,
    pub version: u8,
    pub message_identifier: Option<u32>,
    pub name_offset: u32,
    pub name: Option<String>,
    pub template_offset: Option<u32>,
}

impl ProviderBlock<'_> {
    /// Resolve a template definition by its offset (as stored in EVNT.template_offset).
    pub fn template_by_offset(&self, offset: u32) -> Option<&TemplateDefinition<'_>> {
        self.elements
            .templates
            .as_ref()
            .and_then(|t| t.templates.iter().find(|tpl| tpl.offset == offset))
    }

    pub fn map_by_offset(&self, offset: u32) -> Option<&MapDefinition> {
        self.elements
            .maps
            .as_ref()
            .and_then(|m| m.maps.iter().find(|map| map.offset == offset))
    }

    pub fn slot(&self, kind: BlockKind) -> Option<u32> {
        self.slots.iter().find(|s| s.kind == kind).map(|s| s.offset)
    }
}

impl CrimManifest<'_> {
    pub fn provider(&self, guid: &Guid) -> Option<&ProviderBlock<'_>> {
        self.providers.iter().find(|p| p.guid == *guid)
    }
}
