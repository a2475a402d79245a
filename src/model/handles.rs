use super::Provider;

macro_rules! handle {
    ($($(#[$meta:meta])* $name:ident;)+) => {
        $(
            $(#[$meta])*
            ///
            /// Only meaningful for the provider that issued it.
            #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
            pub struct $name(pub(crate) u32);

            impl $name {
                /// Position in the owning provider's declaration order.
                pub fn index(self) -> usize {
                    self.0 as usize
                }
            }
        )+
    };
}

handle! {
    ChannelId;
    LevelId;
    TaskId;
    OpcodeId;
    KeywordId;
    MapId;
    TemplateId;
    FilterId;
    PatternMapId;
    EventId;
}

/// Any entity of a single provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityRef {
    Provider,
    Channel(ChannelId),
    Level(LevelId),
    Task(TaskId),
    Opcode(OpcodeId),
    Keyword(KeywordId),
    Map(MapId),
    MapItem { map: MapId, item: u32 },
    Template(TemplateId),
    Filter(FilterId),
    PatternMap(PatternMapId),
    Event(EventId),
}

/// Dense slot numbering for every [`EntityRef`] of one provider.
///
/// Side tables (offsets, message identifiers) are plain vectors indexed by these slots.
#[derive(Debug, Clone)]
pub struct EntityIndex {
    channels: usize,
    levels: usize,
    tasks: usize,
    opcodes: usize,
    keywords: usize,
    maps: usize,
    /// Slot of the first item of every map; the last element is the end of the item range.
    map_items: Vec<usize>,
    templates: usize,
    filters: usize,
    pattern_maps: usize,
    events: usize,
    len: usize,
}

impl EntityIndex {
    pub fn new(provider: &Provider) -> Self {
        // Slot 0 belongs to the provider itself.
        let mut next = 1;
        let mut take = |n: usize| {
            let start = next;
            next += n;
            start
        };

        let channels = take(provider.channels().len());
        let levels = take(provider.levels().len());
        let tasks = take(provider.tasks().len());
        let opcodes = take(provider.opcodes().len());
        let keywords = take(provider.keywords().len());
        let maps = take(provider.maps().len());

        let mut map_items = Vec::with_capacity(provider.maps().len() + 1);
        for map in provider.maps() {
            map_items.push(take(map.items.len()));
        }
        map_items.push(take(0));

        let templates = take(provider.templates().len());
        let filters = take(provider.filters().len());
        let pattern_maps = take(provider.pattern_maps().len());
        let events = take(provider.events().len());
        let len = take(0);

        EntityIndex {
            channels,
            levels,
            tasks,
            opcodes,
            keywords,
            maps,
            map_items,
            templates,
            filters,
            pattern_maps,
            events,
            len,
        }
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The slot of `entity`, or `None` when it is out of range for this provider.
    pub fn slot(&self, entity: EntityRef) -> Option<usize> {
        let (base, end, i) = match entity {
            EntityRef::Provider => return Some(0),
            EntityRef::Channel(id) => (self.channels, self.levels, id.index()),
            EntityRef::Level(id) => (self.levels, self.tasks, id.index()),
            EntityRef::Task(id) => (self.tasks, self.opcodes, id.index()),
            EntityRef::Opcode(id) => (self.opcodes, self.keywords, id.index()),
            EntityRef::Keyword(id) => (self.keywords, self.maps, id.index()),
            EntityRef::Map(id) => (self.maps, self.map_items[0], id.index()),
            EntityRef::MapItem { map, item } => {
                let start = *self.map_items.get(map.index())?;
                let end = *self.map_items.get(map.index() + 1)?;
                (start, end, item as usize)
            }
            EntityRef::Template(id) => (self.templates, self.filters, id.index()),
            EntityRef::Filter(id) => (self.filters, self.pattern_maps, id.index()),
            EntityRef::PatternMap(id) => (self.pattern_maps, self.events, id.index()),
            EntityRef::Event(id) => (self.events, self.len, id.index()),
        };

        let slot = base.checked_add(i)?;
        (slot < end).then_some(slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guid::Guid;
    use crate::model::{Level, Map, MapItem, MapKind};

    #[test]
    fn test_slots_are_dense_and_disjoint() {
        let mut p = Provider::new("P", Guid::default());
        let l0 = p.add_level(Level::new("a", 1)).unwrap();
        let l1 = p.add_level(Level::new("b", 2)).unwrap();
        let m0 = p
            .add_map(Map::new(
                "m0",
                MapKind::Value,
                vec![MapItem::new(1), MapItem::new(2)],
            ))
            .unwrap();
        let m1 = p
            .add_map(Map::new("m1", MapKind::Bit, vec![MapItem::new(4)]))
            .unwrap();

        let index = EntityIndex::new(&p);
        let slots: Vec<usize> = [
            EntityRef::Provider,
            EntityRef::Level(l0),
            EntityRef::Level(l1),
            EntityRef::Map(m0),
            EntityRef::Map(m1),
            EntityRef::MapItem { map: m0, item: 0 },
            EntityRef::MapItem { map: m0, item: 1 },
            EntityRef::MapItem { map: m1, item: 0 },
        ]
        .into_iter()
        .map(|e| index.slot(e).unwrap())
        .collect();

        assert_eq!(slots, (0..8).collect::<Vec<_>>());
        assert_eq!(index.len(), 8);
        assert_eq!(index.slot(EntityRef::MapItem { map: m0, item: 2 }), None);
        assert_eq!(index.slot(EntityRef::Level(LevelId(2))), None);
    }
}
