use std::ops::Index;

use hashbrown::HashMap as FastMap;

use crate::diagnostics::SourceLocation;
use crate::err::ModelError;
use crate::guid::Guid;

use super::*;

/// An instrumentation provider and every entity it declares.
///
/// Collections keep declaration order; handles returned by the `add_*` methods index them.
///
/// Handles are plain indices and do not record which provider issued them. A handle from
/// another provider is rejected only when it is out of range here, so callers must pass
/// handles back to the provider that returned them.
#[derive(Debug, Clone)]
pub struct Provider {
    pub name: String,
    pub guid: Guid,
    pub symbol: Option<String>,
    pub message: Option<Message>,
    pub location: Option<SourceLocation>,
    channels: Vec<Channel>,
    levels: Vec<Level>,
    tasks: Vec<Task>,
    opcodes: Vec<Opcode>,
    keywords: Vec<Keyword>,
    maps: Vec<Map>,
    templates: Vec<Template>,
    filters: Vec<Filter>,
    pattern_maps: Vec<PatternMap>,
    events: Vec<Event>,
}

/// One entity of a provider, borrowed.
#[derive(Debug, Clone, Copy)]
pub enum ProviderItem<'a> {
    Provider(&'a Provider),
    Channel(ChannelId, &'a Channel),
    Level(LevelId, &'a Level),
    Task(TaskId, &'a Task),
    Opcode(OpcodeId, &'a Opcode),
    Keyword(KeywordId, &'a Keyword),
    MapItem(MapId, u32, &'a Map),
    Filter(FilterId, &'a Filter),
    Event(EventId, &'a Event),
}

impl<'a> ProviderItem<'a> {
    pub fn entity(&self) -> EntityRef {
        match *self {
            ProviderItem::Provider(_) => EntityRef::Provider,
            ProviderItem::Channel(id, _) => EntityRef::Channel(id),
            ProviderItem::Level(id, _) => EntityRef::Level(id),
            ProviderItem::Task(id, _) => EntityRef::Task(id),
            ProviderItem::Opcode(id, _) => EntityRef::Opcode(id),
            ProviderItem::Keyword(id, _) => EntityRef::Keyword(id),
            ProviderItem::MapItem(map, item, _) => EntityRef::MapItem { map, item },
            ProviderItem::Filter(id, _) => EntityRef::Filter(id),
            ProviderItem::Event(id, _) => EntityRef::Event(id),
        }
    }

    pub fn message(&self) -> Option<&'a Message> {
        match *self {
            ProviderItem::Provider(p) => p.message.as_ref(),
            ProviderItem::Channel(_, c) => c.message.as_ref(),
            ProviderItem::Level(_, l) => l.message.as_ref(),
            ProviderItem::Task(_, t) => t.message.as_ref(),
            ProviderItem::Opcode(_, o) => o.message.as_ref(),
            ProviderItem::Keyword(_, k) => k.message.as_ref(),
            ProviderItem::MapItem(_, item, map) => map
                .items
                .get(item as usize)
                .and_then(|i| i.message.as_ref()),
            ProviderItem::Filter(_, f) => f.message.as_ref(),
            ProviderItem::Event(_, e) => e.message.as_ref(),
        }
    }
}

macro_rules! collection {
    ($($field:ident: $ty:ty;)+) => {
        $(
            pub fn $field(&self) -> &[$ty] {
                &self.$field
            }
        )+
    };
}

macro_rules! index_by {
    ($($id:ident => $field:ident: $ty:ty;)+) => {
        $(
            impl Index<$id> for Provider {
                type Output = $ty;

                fn index(&self, id: $id) -> &$ty {
                    &self.$field[id.index()]
                }
            }
        )+
    };
}

index_by! {
    ChannelId => channels: Channel;
    LevelId => levels: Level;
    TaskId => tasks: Task;
    OpcodeId => opcodes: Opcode;
    KeywordId => keywords: Keyword;
    MapId => maps: Map;
    TemplateId => templates: Template;
    FilterId => filters: Filter;
    PatternMapId => pattern_maps: PatternMap;
    EventId => events: Event;
}

fn next_id(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}

impl Provider {
    pub fn new(name: impl Into<String>, guid: Guid) -> Self {
        Provider {
            name: name.into(),
            guid,
            symbol: None,
            message: None,
            location: None,
            channels: vec![],
            levels: vec![],
            tasks: vec![],
            opcodes: vec![],
            keywords: vec![],
            maps: vec![],
            templates: vec![],
            filters: vec![],
            pattern_maps: vec![],
            events: vec![],
        }
    }

    pub fn with_message(mut self, message: Message) -> Self {
        self.message = Some(message);
        self
    }

    collection! {
        channels: Channel;
        levels: Level;
        tasks: Task;
        opcodes: Opcode;
        keywords: Keyword;
        maps: Map;
        templates: Template;
        filters: Filter;
        pattern_maps: PatternMap;
        events: Event;
    }

    fn duplicate_value(&self, kind: &'static str, value: u64) -> ModelError {
        ModelError::DuplicateValue {
            provider: self.name.clone(),
            kind,
            value,
        }
    }

    fn dangling(&self, kind: &'static str, index: usize) -> ModelError {
        ModelError::DanglingHandle {
            provider: self.name.clone(),
            kind,
            index,
        }
    }

    fn check_handle(&self, kind: &'static str, index: usize, len: usize) -> Result<(), ModelError> {
        if index < len {
            Ok(())
        } else {
            Err(self.dangling(kind, index))
        }
    }

    pub fn add_channel(&mut self, channel: Channel) -> Result<ChannelId, ModelError> {
        if self.channels.iter().any(|c| c.value == channel.value) {
            return Err(self.duplicate_value("channel", u64::from(channel.value)));
        }
        let id = ChannelId(next_id(self.channels.len()));
        self.channels.push(channel);
        Ok(id)
    }

    pub fn add_level(&mut self, level: Level) -> Result<LevelId, ModelError> {
        if self.levels.iter().any(|l| l.value == level.value) {
            return Err(self.duplicate_value("level", u64::from(level.value)));
        }
        let id = LevelId(next_id(self.levels.len()));
        self.levels.push(level);
        Ok(id)
    }

    pub fn add_task(&mut self, task: Task) -> Result<TaskId, ModelError> {
        if self.tasks.iter().any(|t| t.value == task.value) {
            return Err(self.duplicate_value("task", u64::from(task.value)));
        }
        let id = TaskId(next_id(self.tasks.len()));
        self.tasks.push(task);
        Ok(id)
    }

    pub fn add_opcode(&mut self, opcode: Opcode) -> Result<OpcodeId, ModelError> {
        if let Some(task) = opcode.task {
            self.check_handle("task", task.index(), self.tasks.len())?;
        }
        if self
            .opcodes
            .iter()
            .any(|o| o.task == opcode.task && o.value == opcode.value)
        {
            return Err(self.duplicate_value("opcode", u64::from(opcode.value)));
        }
        let id = OpcodeId(next_id(self.opcodes.len()));
        self.opcodes.push(opcode);
        Ok(id)
    }

    pub fn add_keyword(&mut self, keyword: Keyword) -> Result<KeywordId, ModelError> {
        if keyword.mask.count_ones() != 1 {
            return Err(ModelError::InvalidKeywordMask {
                name: keyword.name,
                mask: keyword.mask,
            });
        }
        if self.keywords.iter().any(|k| k.mask == keyword.mask) {
            return Err(self.duplicate_value("keyword", keyword.mask));
        }
        let id = KeywordId(next_id(self.keywords.len()));
        self.keywords.push(keyword);
        Ok(id)
    }

    pub fn add_map(&mut self, map: Map) -> Result<MapId, ModelError> {
        if self.maps.iter().any(|m| m.name == map.name) {
            return Err(ModelError::DuplicateName {
                provider: self.name.clone(),
                kind: "map",
                name: map.name,
            });
        }
        let id = MapId(next_id(self.maps.len()));
        self.maps.push(map);
        Ok(id)
    }

    pub fn add_template(&mut self, template: Template) -> Result<TemplateId, ModelError> {
        if self.templates.iter().any(|t| t.name == template.name) {
            return Err(ModelError::DuplicateName {
                provider: self.name.clone(),
                kind: "template",
                name: template.name,
            });
        }
        for map in template.referenced_maps() {
            self.check_handle("map", map.index(), self.maps.len())?;
        }
        template.validate()?;

        let id = TemplateId(next_id(self.templates.len()));
        self.templates.push(template);
        Ok(id)
    }

    pub fn add_filter(&mut self, filter: Filter) -> Result<FilterId, ModelError> {
        if let Some(template) = filter.template {
            self.check_handle("template", template.index(), self.templates.len())?;
        }
        if self
            .filters
            .iter()
            .any(|f| f.value == filter.value && f.version == filter.version)
        {
            return Err(self.duplicate_value("filter", u64::from(filter.value)));
        }
        let id = FilterId(next_id(self.filters.len()));
        self.filters.push(filter);
        Ok(id)
    }

    pub fn add_pattern_map(&mut self, pattern_map: PatternMap) -> Result<PatternMapId, ModelError> {
        if self.pattern_maps.iter().any(|m| m.name == pattern_map.name) {
            return Err(ModelError::DuplicateName {
                provider: self.name.clone(),
                kind: "pattern map",
                name: pattern_map.name,
            });
        }
        let id = PatternMapId(next_id(self.pattern_maps.len()));
        self.pattern_maps.push(pattern_map);
        Ok(id)
    }

    pub fn add_event(&mut self, event: Event) -> Result<EventId, ModelError> {
        if let Some(channel) = event.channel {
            self.check_handle("channel", channel.index(), self.channels.len())?;
        }
        if let Some(level) = event.level {
            self.check_handle("level", level.index(), self.levels.len())?;
        }
        if let Some(task) = event.task {
            self.check_handle("task", task.index(), self.tasks.len())?;
        }
        if let Some(opcode) = event.opcode {
            self.check_handle("opcode", opcode.index(), self.opcodes.len())?;
        }
        if let Some(template) = event.template {
            self.check_handle("template", template.index(), self.templates.len())?;
        }
        for keyword in &event.keywords {
            self.check_handle("keyword", keyword.index(), self.keywords.len())?;
        }
        if self
            .events
            .iter()
            .any(|e| e.value == event.value && e.version == event.version)
        {
            return Err(self.duplicate_value("event", u64::from(event.value)));
        }

        let id = EventId(next_id(self.events.len()));
        self.events.push(event);
        Ok(id)
    }

    /// Every entity that can carry a message, in message-identifier assignment order.
    pub fn items(&self) -> impl Iterator<Item = ProviderItem<'_>> {
        fn ids<T>(v: &[T]) -> impl Iterator<Item = (u32, &T)> {
            v.iter().enumerate().map(|(i, t)| (next_id(i), t))
        }

        std::iter::once(ProviderItem::Provider(self))
            .chain(ids(&self.channels).map(|(i, c)| ProviderItem::Channel(ChannelId(i), c)))
            .chain(ids(&self.levels).map(|(i, l)| ProviderItem::Level(LevelId(i), l)))
            .chain(ids(&self.tasks).map(|(i, t)| ProviderItem::Task(TaskId(i), t)))
            .chain(ids(&self.opcodes).map(|(i, o)| ProviderItem::Opcode(OpcodeId(i), o)))
            .chain(ids(&self.keywords).map(|(i, k)| ProviderItem::Keyword(KeywordId(i), k)))
            .chain(ids(&self.maps).flat_map(|(i, m)| {
                (0..next_id(m.items.len())).map(move |item| ProviderItem::MapItem(MapId(i), item, m))
            }))
            .chain(ids(&self.filters).map(|(i, f)| ProviderItem::Filter(FilterId(i), f)))
            .chain(ids(&self.events).map(|(i, e)| ProviderItem::Event(EventId(i), e)))
    }
}

/// Localized strings of one culture.
#[derive(Debug, Clone, Default)]
pub struct StringTable {
    /// Culture name, e.g. `en-US`.
    pub culture: String,
    pub lang_id: u16,
    strings: FastMap<String, String, ahash::RandomState>,
}

impl StringTable {
    pub fn new(culture: impl Into<String>, lang_id: u16) -> Self {
        StringTable {
            culture: culture.into(),
            lang_id,
            strings: FastMap::with_hasher(ahash::RandomState::new()),
        }
    }

    pub fn insert(&mut self, id: impl Into<String>, text: impl Into<String>) -> Option<String> {
        self.strings.insert(id.into(), text.into())
    }

    pub fn with_string(mut self, id: impl Into<String>, text: impl Into<String>) -> Self {
        self.insert(id, text);
        self
    }

    pub fn get(&self, id: &str) -> Option<&str> {
        self.strings.get(id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

/// The full compilation input: providers in index order plus the string tables.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    providers: Vec<Provider>,
    string_tables: Vec<StringTable>,
}

impl Manifest {
    pub fn new() -> Self {
        Manifest::default()
    }

    /// Append a provider, returning its provider index.
    pub fn add_provider(&mut self, provider: Provider) -> Result<usize, ModelError> {
        if self.providers.iter().any(|p| p.guid == provider.guid) {
            return Err(ModelError::DuplicateProvider {
                what: "GUID",
                value: provider.guid.to_string(),
            });
        }
        if self.providers.iter().any(|p| p.name == provider.name) {
            return Err(ModelError::DuplicateProvider {
                what: "name",
                value: provider.name,
            });
        }
        self.providers.push(provider);
        Ok(self.providers.len() - 1)
    }

    pub fn add_string_table(&mut self, table: StringTable) {
        self.string_tables.push(table);
    }

    pub fn providers(&self) -> &[Provider] {
        &self.providers
    }

    pub fn string_tables(&self) -> &[StringTable] {
        &self.string_tables
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_duplicate_values_are_rejected() {
        let mut p = Provider::new("P", Guid::default());
        p.add_level(Level::new("a", 4)).unwrap();
        assert_eq!(
            p.add_level(Level::new("b", 4)),
            Err(ModelError::DuplicateValue {
                provider: "P".to_string(),
                kind: "level",
                value: 4
            })
        );

        let t = p.add_task(Task::new("t", 1)).unwrap();
        p.add_opcode(Opcode::new("o", 10)).unwrap();
        // Same opcode value under a different task is fine.
        p.add_opcode(Opcode {
            task: Some(t),
            ..Opcode::new("o2", 10)
        })
        .unwrap();
        assert!(p.add_opcode(Opcode::new("o3", 10)).is_err());
    }

    #[test]
    fn test_keyword_mask_must_be_single_bit() {
        let mut p = Provider::new("P", Guid::default());
        assert!(matches!(
            p.add_keyword(Keyword::new("k", 0x3)),
            Err(ModelError::InvalidKeywordMask { .. })
        ));
        assert!(p.add_keyword(Keyword::new("k", 0)).is_err());
        assert!(p.add_keyword(Keyword::new("k", 0x8000_0000_0000_0000)).is_ok());
    }

    #[test]
    fn test_dangling_handles_are_rejected() {
        let mut p = Provider::new("P", Guid::default());
        let event = Event {
            level: Some(LevelId(3)),
            ..Event::new(1, 0)
        };
        assert_eq!(
            p.add_event(event),
            Err(ModelError::DanglingHandle {
                provider: "P".to_string(),
                kind: "level",
                index: 3
            })
        );
    }

    #[test]
    fn test_foreign_handle_out_of_range_is_rejected() {
        let mut other = Provider::new("Other", Guid::default());
        other.add_level(Level::new("a", 1)).unwrap();
        let foreign = other.add_level(Level::new("b", 2)).unwrap();

        let mut p = Provider::new("P", Guid::default());
        p.add_level(Level::new("a", 1)).unwrap();
        let event = Event {
            level: Some(foreign),
            ..Event::new(1, 0)
        };
        assert_eq!(
            p.add_event(event),
            Err(ModelError::DanglingHandle {
                provider: "P".to_string(),
                kind: "level",
                index: 1
            })
        );
    }

    #[test]
    fn test_items_follow_assignment_order() {
        let mut p = Provider::new("P", Guid::default());
        p.add_event(Event::new(1, 0)).unwrap();
        p.add_keyword(Keyword::new("k", 1)).unwrap();
        p.add_channel(Channel::new("c", 16)).unwrap();
        p.add_map(Map::new(
            "m",
            MapKind::Value,
            vec![MapItem::new(0), MapItem::new(1)],
        ))
        .unwrap();

        let kinds: Vec<EntityRef> = p.items().map(|i| i.entity()).collect();
        assert_eq!(
            kinds,
            vec![
                EntityRef::Provider,
                EntityRef::Channel(ChannelId(0)),
                EntityRef::Keyword(KeywordId(0)),
                EntityRef::MapItem {
                    map: MapId(0),
                    item: 0
                },
                EntityRef::MapItem {
                    map: MapId(0),
                    item: 1
                },
                EntityRef::Event(EventId(0)),
            ]
        );
    }

    #[test]
    fn test_manifest_rejects_duplicate_providers() {
        let mut m = Manifest::new();
        let guid: Guid = "22FB2CD6-0E7B-422B-A0C7-2FAD1FD0E716".parse().unwrap();
        assert_eq!(m.add_provider(Provider::new("A", guid)), Ok(0));
        assert!(m.add_provider(Provider::new("B", guid)).is_err());
        assert!(m.add_provider(Provider::new("A", Guid::default())).is_err());
    }
}
