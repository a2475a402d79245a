//! `TTBL`: one `TEMP` per template.
//!
//! A `TEMP` is a 40-byte header, the BinXml payload, the 20-byte property records in flattened
//! order and finally the property names.

use bitflags::bitflags;
use log::{Level, log_enabled, trace};

use crate::err::{EncodeError, InternalFault};
use crate::model::{Cardinality, EntityRef, FlatProperty, Property, Template, TemplateId};
use crate::utils::hexdump;

use super::binxml::{template_binxml, template_xml};
use super::encoder::{PendingName, ProviderEncoder};
use super::template_id::template_id;
use super::writer::{to_u16, to_u32};

pub const TEMPLATE_HEADER_LEN: usize = 40;
pub const PROPERTY_RECORD_LEN: usize = 20;

/// `TEMP` header flag: the payload is an `EventData` document.
pub const TEMPLATE_EVENT_DATA: u32 = 0x1;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PropertyFlags: u32 {
        const STRUCT = 0x1;
        /// Length comes from the sibling property whose index is stored.
        const PARAM_LENGTH = 0x2;
        /// Count comes from the sibling property whose index is stored.
        const PARAM_COUNT = 0x4;
        const FIXED_LENGTH = 0x10;
        const FIXED_COUNT = 0x20;
    }
}

/// Resolves a count or length to its on-disk value and flag.
fn cardinality(
    template: &Template,
    flat: &[FlatProperty<'_>],
    entry: &FlatProperty<'_>,
    value: Option<&Cardinality>,
    fixed: PropertyFlags,
    param: PropertyFlags,
    default: u16,
) -> Result<(u16, PropertyFlags), EncodeError> {
    match value {
        None => Ok((default, PropertyFlags::empty())),
        Some(Cardinality::Fixed(n)) => Ok((*n, fixed)),
        Some(Cardinality::Property(name)) => {
            // Model insertion already checked the reference.
            let index = Template::resolve_sibling(flat, &entry.scope, name).ok_or_else(|| {
                InternalFault::Layout {
                    message: format!(
                        "property `{}` of template `{}` references missing sibling `{name}`",
                        entry.property.name(),
                        template.name
                    ),
                }
            })?;
            Ok((to_u16("property index", index)?, param))
        }
    }
}

impl ProviderEncoder<'_, '_> {
    pub(super) fn write_templates(&mut self) -> Result<Option<u32>, EncodeError> {
        let templates = self.provider.templates();
        if templates.is_empty() {
            return Ok(None);
        }

        let start = self.begin_list(b"TTBL");
        for (i, template) in templates.iter().enumerate() {
            self.write_template(TemplateId(i as u32), template)?;
        }
        self.finish_list(start, templates.len()).map(Some)
    }

    fn write_template(&mut self, id: TemplateId, template: &Template) -> Result<(), EncodeError> {
        let flat = template.flatten();
        let top_level = flat.iter().take_while(|f| f.scope.start == 0).count();
        let xml = template_xml(template, &flat)?;
        let guid = template_id(self.settings.get_template_id_scheme(), &xml, &flat);
        let payload = template_binxml(&flat)?;

        let start = self.w.position();
        let offset = self.w.offset()?;
        self.offsets.record(EntityRef::Template(id), offset)?;

        self.w.write_bytes(b"TEMP");
        let size_at = self.w.reserve(4);
        self.w.write_u32(to_u32("property count", flat.len())?);
        self.w.write_u32(to_u32("top-level property count", top_level)?);
        let properties_at = self.w.reserve(4);
        self.w.write_u32(TEMPLATE_EVENT_DATA);
        self.w.write_bytes(&guid);

        self.w.write_bytes(&payload);
        self.w.align(4);

        let properties_offset = self.w.offset()?;
        let mut names = Vec::with_capacity(flat.len());
        for entry in &flat {
            let at = self.write_property(template, &flat, entry)?;
            names.push(PendingName {
                patch_at: at + 16,
                text: entry.property.name(),
            });
        }
        self.write_names(&names)?;

        // With no properties this is the end of the TEMP.
        let properties_offset = if flat.is_empty() {
            self.w.offset()?
        } else {
            properties_offset
        };
        self.w.patch_u32(properties_at, properties_offset)?;

        let size = self.w.position() - start;
        self.w.patch_u32(size_at, to_u32("template size", size)?)?;

        trace!(
            "TEMP `{}` at 0x{start:x}: {} properties, {} payload bytes",
            template.name,
            flat.len(),
            payload.len()
        );
        if log_enabled!(Level::Trace) {
            trace!("TEMP `{}` payload:\n{}", template.name, hexdump(&payload, 0));
        }
        Ok(())
    }

    /// Writes one property record with a zero name offset; returns its start.
    fn write_property(
        &mut self,
        template: &Template,
        flat: &[FlatProperty<'_>],
        entry: &FlatProperty<'_>,
    ) -> Result<usize, EncodeError> {
        let (count, count_flag) = cardinality(
            template,
            flat,
            entry,
            entry.property.count(),
            PropertyFlags::FIXED_COUNT,
            PropertyFlags::PARAM_COUNT,
            1,
        )?;
        let (length, length_flag) = cardinality(
            template,
            flat,
            entry,
            entry.property.length(),
            PropertyFlags::FIXED_LENGTH,
            PropertyFlags::PARAM_LENGTH,
            0,
        )?;
        let mut flags = count_flag | length_flag;

        let at = self.w.position();
        match entry.property {
            Property::Data(data) => {
                let map_offset = self.offsets.resolve(data.map.map(EntityRef::Map))?;
                self.w.write_u32(flags.bits());
                self.w.write_u8(data.in_type.code());
                self.w.write_u8(data.out_type.code());
                self.w.write_u16(0);
                self.w.write_u32(map_offset);
            }
            Property::Struct(_) => {
                flags |= PropertyFlags::STRUCT;
                self.w.write_u32(flags.bits());
                self.w.write_u16(to_u16("member start", entry.members.start)?);
                self.w.write_u16(to_u16("member count", entry.members.len())?);
                self.w.write_u32(0);
            }
        }
        self.w.write_u16(count);
        self.w.write_u16(length);
        self.w.reserve(4);

        Ok(at)
    }
}
