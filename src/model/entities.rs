use crate::diagnostics::SourceLocation;
use crate::guid::Guid;

use super::{ChannelId, KeywordId, LevelId, OpcodeId, TaskId, TemplateId};

/// A reference to a localized string, plus an optional fixed message identifier.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Message {
    /// Key into the per-culture string tables.
    pub string_id: String,
    /// Keep this identifier instead of generating one.
    pub explicit_id: Option<u32>,
    pub location: Option<SourceLocation>,
}

impl Message {
    pub fn new(string_id: impl Into<String>) -> Self {
        Message {
            string_id: string_id.into(),
            explicit_id: None,
            location: None,
        }
    }

    pub fn with_explicit_id(mut self, id: u32) -> Self {
        self.explicit_id = Some(id);
        self
    }

    pub fn with_location(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub name: String,
    pub value: u8,
    pub imported: bool,
    pub enabled: bool,
    pub message: Option<Message>,
}

impl Channel {
    pub fn new(name: impl Into<String>, value: u8) -> Self {
        Channel {
            name: name.into(),
            value,
            imported: false,
            enabled: false,
            message: None,
        }
    }

    /// Channel values below 16 are reserved for the operating system's global channels.
    pub fn is_reserved(&self) -> bool {
        self.value < 16
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Level {
    pub name: String,
    pub value: u8,
    pub message: Option<Message>,
}

impl Level {
    pub fn new(name: impl Into<String>, value: u8) -> Self {
        Level {
            name: name.into(),
            value,
            message: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub name: String,
    pub value: u16,
    pub event_guid: Option<Guid>,
    pub message: Option<Message>,
}

impl Task {
    pub fn new(name: impl Into<String>, value: u16) -> Self {
        Task {
            name: name.into(),
            value,
            event_guid: None,
            message: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opcode {
    pub name: String,
    pub value: u8,
    /// Opcodes may be scoped to a single task.
    pub task: Option<TaskId>,
    pub message: Option<Message>,
}

impl Opcode {
    pub fn new(name: impl Into<String>, value: u8) -> Self {
        Opcode {
            name: name.into(),
            value,
            task: None,
            message: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyword {
    pub name: String,
    pub mask: u64,
    pub message: Option<Message>,
}

impl Keyword {
    pub fn new(name: impl Into<String>, mask: u64) -> Self {
        Keyword {
            name: name.into(),
            mask,
            message: None,
        }
    }

    /// Index of the single bit set in the mask.
    pub fn bit_position(&self) -> u32 {
        self.mask.trailing_zeros()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MapKind {
    Value,
    Bit,
}

impl MapKind {
    pub fn signature(self) -> [u8; 4] {
        match self {
            MapKind::Value => *b"VMAP",
            MapKind::Bit => *b"BMAP",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapItem {
    pub value: u32,
    pub message: Option<Message>,
}

impl MapItem {
    pub fn new(value: u32) -> Self {
        MapItem {
            value,
            message: None,
        }
    }

    pub fn with_message(mut self, message: Message) -> Self {
        self.message = Some(message);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Map {
    pub name: String,
    pub kind: MapKind,
    pub items: Vec<MapItem>,
}

impl Map {
    pub fn new(name: impl Into<String>, kind: MapKind, items: Vec<MapItem>) -> Self {
        Map {
            name: name.into(),
            kind,
            items,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub name: String,
    pub value: u8,
    pub version: u8,
    pub template: Option<TemplateId>,
    pub message: Option<Message>,
}

impl Filter {
    pub fn new(name: impl Into<String>, value: u8, version: u8) -> Self {
        Filter {
            name: name.into(),
            value,
            version,
            template: None,
            message: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternMapItem {
    pub name: String,
    pub value: String,
}

/// A named-query pattern map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternMap {
    pub name: String,
    pub format: String,
    pub items: Vec<PatternMapItem>,
}

impl PatternMap {
    pub fn new(name: impl Into<String>, format: impl Into<String>) -> Self {
        PatternMap {
            name: name.into(),
            format: format.into(),
            items: vec![],
        }
    }

    pub fn with_item(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.items.push(PatternMapItem {
            name: name.into(),
            value: value.into(),
        });
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Event {
    pub value: u16,
    pub version: u8,
    pub channel: Option<ChannelId>,
    pub level: Option<LevelId>,
    pub task: Option<TaskId>,
    pub opcode: Option<OpcodeId>,
    pub keywords: Vec<KeywordId>,
    pub template: Option<TemplateId>,
    pub symbol: Option<String>,
    pub message: Option<Message>,
}

impl Event {
    pub fn new(value: u16, version: u8) -> Self {
        Event {
            value,
            version,
            ..Default::default()
        }
    }
}
