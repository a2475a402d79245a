use crate::err::InternalFault;
use crate::model::{EntityIndex, EntityRef};

/// Where each entity of one provider was written.
#[derive(Debug, Clone)]
pub struct OffsetTable<'a> {
    index: &'a EntityIndex,
    offsets: Vec<Option<u32>>,
}

impl<'a> OffsetTable<'a> {
    pub fn new(index: &'a EntityIndex) -> Self {
        OffsetTable {
            index,
            offsets: vec![None; index.len()],
        }
    }

    fn slot(&self, entity: EntityRef) -> Result<usize, InternalFault> {
        self.index
            .slot(entity)
            .ok_or(InternalFault::UnresolvedOffset { entity })
    }

    pub fn record(&mut self, entity: EntityRef, offset: u32) -> Result<(), InternalFault> {
        let slot = self.slot(entity)?;
        match &mut self.offsets[slot] {
            Some(_) => Err(InternalFault::DuplicateOffset { entity }),
            empty => {
                *empty = Some(offset);
                Ok(())
            }
        }
    }

    pub fn get(&self, entity: EntityRef) -> Option<u32> {
        self.index
            .slot(entity)
            .and_then(|slot| self.offsets[slot])
    }

    /// `None` resolves to `0`; an entity that was never written is an encoder bug.
    pub fn resolve(&self, entity: Option<EntityRef>) -> Result<u32, InternalFault> {
        match entity {
            None => Ok(0),
            Some(entity) => self
                .get(entity)
                .ok_or(InternalFault::UnresolvedOffset { entity }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guid::Guid;
    use crate::model::{Level, Provider};

    #[test]
    fn test_resolve_distinguishes_absent_from_unwritten() {
        let mut p = Provider::new("P", Guid::default());
        let a = p.add_level(Level::new("a", 1)).unwrap();
        let b = p.add_level(Level::new("b", 2)).unwrap();
        let index = EntityIndex::new(&p);

        let mut offsets = OffsetTable::new(&index);
        offsets.record(EntityRef::Level(a), 0x40).unwrap();

        assert_eq!(offsets.resolve(None), Ok(0));
        assert_eq!(offsets.resolve(Some(EntityRef::Level(a))), Ok(0x40));
        assert_eq!(
            offsets.resolve(Some(EntityRef::Level(b))),
            Err(InternalFault::UnresolvedOffset {
                entity: EntityRef::Level(b)
            })
        );
        assert!(offsets.record(EntityRef::Level(a), 0x50).is_err());
    }
}
