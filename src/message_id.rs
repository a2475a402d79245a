//! Deterministic message identifiers.
//!
//! An identifier packs a kind tag, the provider index and a kind-specific payload:
//!
//! ```text
//!  31    28 27    24 23                              0
//! +--------+--------+---------------------------------+
//! |  tag   | prov.  |             payload             |
//! +--------+--------+---------------------------------+
//! ```
//!
//! Kinds with an inherent value (levels, tasks, opcodes, keywords, filters, events) derive the
//! payload from it. The others use a counter that starts at 1 for every provider.

use log::trace;

use crate::diagnostics::Diagnostics;
use crate::err::{AssignError, IdError, InternalFault};
use crate::model::{EntityIndex, EntityRef, Manifest, MapKind, Provider, ProviderItem};

/// Side-table value of an entity without a message.
pub const UNUSED_MESSAGE_ID: u32 = 0xFFFF_FFFF;

/// The provider field is four bits wide.
pub const MAX_PROVIDER_INDEX: usize = 0xF;

const PAYLOAD_MASK: u32 = 0x00FF_FFFF;

mod tag {
    pub const EVENT_RESERVED_CHANNEL: u32 = 0x0;
    pub const KEYWORD: u32 = 0x1;
    pub const OPCODE: u32 = 0x3;
    pub const LEVEL: u32 = 0x5;
    pub const FILTER: u32 = 0x5;
    pub const TASK: u32 = 0x7;
    pub const PROVIDER: u32 = 0x9;
    pub const EVENT: u32 = 0xB;
    pub const CHANNEL: u32 = 0xC;
    pub const VALUE_MAP_ITEM: u32 = 0xD;
    pub const BIT_MAP_ITEM: u32 = 0xE;
}

/// Filter payloads are marked to keep them apart from level payloads, which share the tag.
const FILTER_MARKER: u32 = 0x80_0000;

fn pack(tag: u32, provider_index: usize, payload: u32) -> u32 {
    // `provider_index` is checked by the caller.
    (tag << 28) | ((provider_index as u32 & 0xF) << 24) | (payload & PAYLOAD_MASK)
}

/// Generates identifiers for one provider.
#[derive(Debug, Clone)]
pub struct MessageIdGenerator {
    provider_counter: u32,
    channel_counter: u32,
    value_map_counter: u32,
    bit_map_counter: u32,
}

impl Default for MessageIdGenerator {
    fn default() -> Self {
        MessageIdGenerator {
            provider_counter: 1,
            channel_counter: 1,
            value_map_counter: 1,
            bit_map_counter: 1,
        }
    }
}

fn bump(counter: &mut u32) -> u32 {
    let value = *counter;
    *counter = counter.wrapping_add(1);
    value
}

impl MessageIdGenerator {
    pub fn new() -> Self {
        MessageIdGenerator::default()
    }

    /// The generated identifier of `item`, ignoring any explicit identifier on its message.
    pub fn create_id(
        &mut self,
        provider: &Provider,
        item: &ProviderItem<'_>,
        provider_index: usize,
    ) -> Result<u32, IdError> {
        if provider_index > MAX_PROVIDER_INDEX {
            return Err(IdError::ProviderIndexOutOfRange {
                index: provider_index,
            });
        }

        let (tag, payload) = match *item {
            ProviderItem::Provider(_) => (tag::PROVIDER, bump(&mut self.provider_counter)),
            ProviderItem::Channel(..) => (tag::CHANNEL, bump(&mut self.channel_counter)),
            ProviderItem::Level(_, level) => (tag::LEVEL, u32::from(level.value)),
            ProviderItem::Task(_, task) => (tag::TASK, u32::from(task.value)),
            ProviderItem::Opcode(_, opcode) => {
                let task = opcode.task.map(|t| provider[t].value).unwrap_or(0);
                (
                    tag::OPCODE,
                    (u32::from(task & 0xFF) << 16) | u32::from(opcode.value),
                )
            }
            ProviderItem::Keyword(_, keyword) => (tag::KEYWORD, keyword.bit_position()),
            ProviderItem::MapItem(_, _, map) => match map.kind {
                MapKind::Value => (tag::VALUE_MAP_ITEM, bump(&mut self.value_map_counter)),
                MapKind::Bit => (tag::BIT_MAP_ITEM, bump(&mut self.bit_map_counter)),
            },
            ProviderItem::Filter(_, filter) => (
                tag::FILTER,
                FILTER_MARKER | (u32::from(filter.version) << 8) | u32::from(filter.value),
            ),
            ProviderItem::Event(_, event) => {
                let reserved = event
                    .channel
                    .is_none_or(|c| provider[c].is_reserved());
                let tag = if reserved {
                    tag::EVENT_RESERVED_CHANNEL
                } else {
                    tag::EVENT
                };
                (
                    tag,
                    (u32::from(event.version) << 16) | u32::from(event.value),
                )
            }
        };

        Ok(pack(tag, provider_index, payload))
    }
}

/// Message identifiers of one provider's entities, indexed by [`EntityIndex`] slot.
#[derive(Debug, Clone)]
pub struct MessageIds {
    index: EntityIndex,
    ids: Vec<u32>,
}

impl MessageIds {
    pub fn new(index: EntityIndex) -> Self {
        let ids = vec![UNUSED_MESSAGE_ID; index.len()];
        MessageIds { index, ids }
    }

    /// The assigned identifier, or `None` for entities without a message.
    pub fn get(&self, entity: EntityRef) -> Option<u32> {
        self.index
            .slot(entity)
            .and_then(|slot| self.ids.get(slot).copied())
            .filter(|id| *id != UNUSED_MESSAGE_ID)
    }

    /// The on-disk value: the identifier or [`UNUSED_MESSAGE_ID`].
    pub fn raw(&self, entity: EntityRef) -> u32 {
        self.get(entity).unwrap_or(UNUSED_MESSAGE_ID)
    }

    /// Assign once; a second assignment is an internal fault.
    pub(crate) fn assign(&mut self, entity: EntityRef, id: u32) -> Result<(), InternalFault> {
        let slot = self
            .index
            .slot(entity)
            .ok_or(InternalFault::UnresolvedOffset { entity })?;
        let current = self
            .ids
            .get_mut(slot)
            .ok_or(InternalFault::UnresolvedOffset { entity })?;
        if *current != UNUSED_MESSAGE_ID {
            return Err(InternalFault::DuplicateMessageId { entity });
        }
        *current = id;
        Ok(())
    }

    pub fn assigned_count(&self) -> usize {
        self.ids.iter().filter(|id| **id != UNUSED_MESSAGE_ID).count()
    }
}

/// Assign identifiers for every message of one provider.
pub fn assign_provider_message_ids(
    provider: &Provider,
    provider_index: usize,
    diagnostics: &mut Diagnostics,
) -> Result<MessageIds, AssignError> {
    let mut generator = MessageIdGenerator::new();
    let mut ids = MessageIds::new(EntityIndex::new(provider));

    for item in provider.items() {
        let Some(message) = item.message() else {
            continue;
        };

        let id = match message.explicit_id {
            Some(id) => id,
            None => match generator.create_id(provider, &item, provider_index) {
                Ok(id) => id,
                Err(e) => {
                    diagnostics.error(
                        message.location.as_ref().or(provider.location.as_ref()),
                        format_args!("cannot generate a message identifier for `{}`: {e}", message.string_id),
                    );
                    return Err(e.into());
                }
            },
        };

        trace!("message `{}` -> 0x{id:08X}", message.string_id);
        ids.assign(item.entity(), id)?;
    }

    Ok(ids)
}

/// Assign identifiers for every provider, in provider order.
pub fn assign_message_ids(
    manifest: &Manifest,
    diagnostics: &mut Diagnostics,
) -> Result<Vec<MessageIds>, AssignError> {
    manifest
        .providers()
        .iter()
        .enumerate()
        .map(|(i, provider)| assign_provider_message_ids(provider, i, diagnostics))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guid::Guid;
    use crate::model::*;
    use pretty_assertions::assert_eq;

    fn id_of(p: &Provider, entity: EntityRef, provider_index: usize) -> u32 {
        let mut d = Diagnostics::new();
        let ids = assign_provider_message_ids(p, provider_index, &mut d).unwrap();
        ids.raw(entity)
    }

    #[test]
    fn test_value_derived_ids() {
        let mut p = Provider::new("P", Guid::default());
        let task = p
            .add_task(Task {
                message: Some(Message::new("task")),
                ..Task::new("t", 0x1234)
            })
            .unwrap();
        let level = p
            .add_level(Level {
                message: Some(Message::new("lvl")),
                ..Level::new("Info", 4)
            })
            .unwrap();
        let opcode = p
            .add_opcode(Opcode {
                task: Some(task),
                message: Some(Message::new("op")),
                ..Opcode::new("o", 10)
            })
            .unwrap();
        let filter = p
            .add_filter(Filter {
                message: Some(Message::new("f")),
                ..Filter::new("f", 3, 2)
            })
            .unwrap();

        assert_eq!(id_of(&p, EntityRef::Task(task), 2), 0x7200_1234);
        assert_eq!(id_of(&p, EntityRef::Level(level), 2), 0x5200_0004);
        assert_eq!(id_of(&p, EntityRef::Opcode(opcode), 2), 0x3234_000A);
        assert_eq!(id_of(&p, EntityRef::Filter(filter), 0), 0x5080_0203);
    }

    #[test]
    fn test_counters_start_at_one_per_kind() {
        let mut p = Provider::new("P", Guid::default()).with_message(Message::new("p"));
        let c0 = p
            .add_channel(Channel {
                message: Some(Message::new("c0")),
                ..Channel::new("a", 16)
            })
            .unwrap();
        let c1 = p
            .add_channel(Channel {
                message: Some(Message::new("c1")),
                ..Channel::new("b", 17)
            })
            .unwrap();
        let vmap = p
            .add_map(Map::new(
                "v",
                MapKind::Value,
                vec![
                    MapItem::new(7).with_message(Message::new("v7")),
                    MapItem::new(8).with_message(Message::new("v8")),
                ],
            ))
            .unwrap();
        let bmap = p
            .add_map(Map::new(
                "b",
                MapKind::Bit,
                vec![MapItem::new(1).with_message(Message::new("b1"))],
            ))
            .unwrap();

        let mut d = Diagnostics::new();
        let ids = assign_provider_message_ids(&p, 1, &mut d).unwrap();
        assert_eq!(ids.raw(EntityRef::Provider), 0x9100_0001);
        assert_eq!(ids.raw(EntityRef::Channel(c0)), 0xC100_0001);
        assert_eq!(ids.raw(EntityRef::Channel(c1)), 0xC100_0002);
        assert_eq!(ids.raw(EntityRef::MapItem { map: vmap, item: 1 }), 0xD100_0002);
        assert_eq!(ids.raw(EntityRef::MapItem { map: bmap, item: 0 }), 0xE100_0001);
    }

    #[test]
    fn test_event_tag_depends_on_channel() {
        let mut p = Provider::new("P", Guid::default());
        let system = p.add_channel(Channel::new("System", 8)).unwrap();
        let own = p.add_channel(Channel::new("Operational", 16)).unwrap();
        let e0 = p
            .add_event(Event {
                message: Some(Message::new("e0")),
                ..Event::new(100, 1)
            })
            .unwrap();
        let e1 = p
            .add_event(Event {
                channel: Some(system),
                message: Some(Message::new("e1")),
                ..Event::new(101, 0)
            })
            .unwrap();
        let e2 = p
            .add_event(Event {
                channel: Some(own),
                message: Some(Message::new("e2")),
                ..Event::new(102, 0)
            })
            .unwrap();

        let mut d = Diagnostics::new();
        let ids = assign_provider_message_ids(&p, 0, &mut d).unwrap();
        assert_eq!(ids.raw(EntityRef::Event(e0)), 0x0001_0064);
        assert_eq!(ids.raw(EntityRef::Event(e1)), 0x0000_0065);
        assert_eq!(ids.raw(EntityRef::Event(e2)), 0xB000_0066);
    }

    #[test]
    fn test_explicit_ids_are_kept_and_unused_stay_sentinel() {
        let mut p = Provider::new("P", Guid::default());
        let l = p
            .add_level(Level {
                message: Some(Message::new("lvl").with_explicit_id(0x1234_5678)),
                ..Level::new("a", 1)
            })
            .unwrap();
        let silent = p.add_level(Level::new("b", 2)).unwrap();

        let mut d = Diagnostics::new();
        let ids = assign_provider_message_ids(&p, 0, &mut d).unwrap();
        assert_eq!(ids.get(EntityRef::Level(l)), Some(0x1234_5678));
        assert_eq!(ids.get(EntityRef::Level(silent)), None);
        assert_eq!(ids.raw(EntityRef::Level(silent)), UNUSED_MESSAGE_ID);
        assert_eq!(ids.assigned_count(), 1);
    }

    #[test]
    fn test_provider_index_out_of_range_is_reported() {
        let mut p = Provider::new("P", Guid::default());
        p.add_keyword(Keyword {
            message: Some(Message::new("kw")),
            ..Keyword::new("k", 1)
        })
        .unwrap();

        let mut d = Diagnostics::new();
        let err = assign_provider_message_ids(&p, 16, &mut d).unwrap_err();
        assert!(matches!(
            err,
            AssignError::Id(IdError::ProviderIndexOutOfRange { index: 16 })
        ));
        assert_eq!(d.error_count(), 1);

        let mut generator = MessageIdGenerator::new();
        let item = p.items().nth(1).unwrap();
        assert!(generator.create_id(&p, &item, 16).is_err());
        assert_eq!(generator.create_id(&p, &item, 15), Ok(0x1F00_0000));
    }

    #[test]
    fn test_double_assignment_is_an_internal_fault() {
        let p = Provider::new("P", Guid::default());
        let mut ids = MessageIds::new(EntityIndex::new(&p));
        ids.assign(EntityRef::Provider, 1).unwrap();
        assert_eq!(
            ids.assign(EntityRef::Provider, 2),
            Err(InternalFault::DuplicateMessageId {
                entity: EntityRef::Provider
            })
        );
    }
}
