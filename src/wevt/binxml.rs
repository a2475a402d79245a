//! Template payloads: BinXml with inline names, plus the equivalent XML text.
//!
//! Both render the same document:
//!
//! ```xml
//! <EventData>
//!   <Data Name="a">%1</Data>
//!   <ComplexData Name="s"><Data Name="x">%3</Data></ComplexData>
//! </EventData>
//! ```
//!
//! Substitutions use the flattened property index (`%N` in text is one-based).

use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};

use crate::err::EncodeError;
use crate::model::{FlatProperty, Property, Template};
use crate::utils::encode_utf16le;

use super::writer::{BinaryWriter, to_u16, to_u32};

mod token {
    pub const END_OF_STREAM: u8 = 0x00;
    pub const OPEN_START_ELEMENT: u8 = 0x01;
    pub const CLOSE_START_ELEMENT: u8 = 0x02;
    pub const CLOSE_EMPTY_ELEMENT: u8 = 0x03;
    pub const END_ELEMENT: u8 = 0x04;
    pub const VALUE: u8 = 0x05;
    pub const ATTRIBUTE: u8 = 0x06;
    pub const OPTIONAL_SUBSTITUTION: u8 = 0x0E;
    pub const FRAGMENT_HEADER: u8 = 0x0F;
    /// On a start element: an attribute list follows. On an attribute: another attribute follows.
    pub const MORE: u8 = 0x40;
}

const STRING_VALUE_TYPE: u8 = 0x01;
const ARRAY_FLAG: u8 = 0x80;
const NO_DEPENDENCY: u16 = 0xFFFF;

const EVENT_DATA: &str = "EventData";
const DATA: &str = "Data";
const COMPLEX_DATA: &str = "ComplexData";
const NAME: &str = "Name";

/// `hash = hash * 65599 + code_unit` over UTF-16, truncated to 16 bits.
pub fn name_hash(name: &str) -> u16 {
    let hash = name
        .encode_utf16()
        .fold(0u32, |h, cu| h.wrapping_mul(65599).wrapping_add(u32::from(cu)));
    (hash & 0xFFFF) as u16
}

fn write_inline_name(w: &mut BinaryWriter, name: &str) -> Result<(), EncodeError> {
    w.write_u16(name_hash(name));
    w.write_u16(to_u16("name length", name.encode_utf16().count())?);
    w.write_bytes(&encode_utf16le(name));
    w.write_u16(0);
    Ok(())
}

/// Writes an open-start token and returns the position of its data-size field.
fn open_element(
    w: &mut BinaryWriter,
    name: &str,
    name_attribute: Option<&str>,
) -> Result<usize, EncodeError> {
    let flags = if name_attribute.is_some() { token::MORE } else { 0 };
    w.write_u8(token::OPEN_START_ELEMENT | flags);
    w.write_u16(NO_DEPENDENCY);
    let size_at = w.reserve(4);
    write_inline_name(w, name)?;

    if let Some(value) = name_attribute {
        let list_size_at = w.reserve(4);
        w.write_u8(token::ATTRIBUTE);
        write_inline_name(w, NAME)?;
        w.write_u8(token::VALUE);
        w.write_u8(STRING_VALUE_TYPE);
        w.write_u16(to_u16("attribute length", value.encode_utf16().count())?);
        w.write_bytes(&encode_utf16le(value));
        let list_size = w.position() - (list_size_at + 4);
        w.patch_u32(list_size_at, to_u32("attribute list size", list_size)?)?;
    }

    Ok(size_at)
}

fn close_element(w: &mut BinaryWriter, size_at: usize) -> Result<(), EncodeError> {
    w.write_u8(token::END_ELEMENT);
    let size = w.position() - (size_at + 4);
    w.patch_u32(size_at, to_u32("element size", size)?)?;
    Ok(())
}

fn write_property(
    w: &mut BinaryWriter,
    flat: &[FlatProperty<'_>],
    index: usize,
) -> Result<(), EncodeError> {
    let entry = &flat[index];
    match entry.property {
        Property::Data(data) => {
            let size_at = open_element(w, DATA, Some(&data.name))?;
            w.write_u8(token::CLOSE_START_ELEMENT);

            let mut value_type = data.in_type.binxml_value_type();
            if data.count.is_some() {
                value_type |= ARRAY_FLAG;
            }
            w.write_u8(token::OPTIONAL_SUBSTITUTION);
            w.write_u16(to_u16("substitution index", index)?);
            w.write_u8(value_type);

            close_element(w, size_at)
        }
        Property::Struct(s) => {
            let size_at = open_element(w, COMPLEX_DATA, Some(&s.name))?;
            w.write_u8(token::CLOSE_START_ELEMENT);
            for member in entry.members.clone() {
                write_property(w, flat, member)?;
            }
            close_element(w, size_at)
        }
    }
}

/// The BinXml fragment stored in a `TEMP` entry.
pub fn template_binxml(flat: &[FlatProperty<'_>]) -> Result<Vec<u8>, EncodeError> {
    let mut w = BinaryWriter::new();
    w.write_bytes(&[token::FRAGMENT_HEADER, 0x01, 0x01, 0x00]);

    let size_at = open_element(&mut w, EVENT_DATA, None)?;
    let top_level: Vec<usize> = flat
        .iter()
        .enumerate()
        .take_while(|(_, f)| f.scope.start == 0)
        .map(|(i, _)| i)
        .collect();

    if top_level.is_empty() {
        w.write_u8(token::CLOSE_EMPTY_ELEMENT);
        let size = w.position() - (size_at + 4);
        w.patch_u32(size_at, to_u32("element size", size)?)?;
    } else {
        w.write_u8(token::CLOSE_START_ELEMENT);
        for i in top_level {
            write_property(&mut w, flat, i)?;
        }
        close_element(&mut w, size_at)?;
    }

    w.write_u8(token::END_OF_STREAM);
    w.finish()
}

fn xml_property(
    xml: &mut Writer<Vec<u8>>,
    flat: &[FlatProperty<'_>],
    index: usize,
) -> std::io::Result<()> {
    let entry = &flat[index];
    let (element, name) = match entry.property {
        Property::Data(d) => (DATA, d.name.as_str()),
        Property::Struct(s) => (COMPLEX_DATA, s.name.as_str()),
    };

    xml.write_event(Event::Start(
        BytesStart::new(element).with_attributes([(NAME, name)]),
    ))?;
    match entry.property {
        Property::Data(_) => {
            let text = format!("%{}", index + 1);
            xml.write_event(Event::Text(BytesText::new(&text)))?;
        }
        Property::Struct(_) => {
            for member in entry.members.clone() {
                xml_property(xml, flat, member)?;
            }
        }
    }
    xml.write_event(Event::End(BytesEnd::new(element)))?;
    Ok(())
}

fn render_xml(flat: &[FlatProperty<'_>]) -> std::io::Result<Vec<u8>> {
    let mut xml = Writer::new(Vec::new());
    let top_level: Vec<usize> = (0..flat.len())
        .take_while(|i| flat[*i].scope.start == 0)
        .collect();

    if top_level.is_empty() {
        xml.write_event(Event::Empty(BytesStart::new(EVENT_DATA)))?;
    } else {
        xml.write_event(Event::Start(BytesStart::new(EVENT_DATA)))?;
        for i in top_level {
            xml_property(&mut xml, flat, i)?;
        }
        xml.write_event(Event::End(BytesEnd::new(EVENT_DATA)))?;
    }
    Ok(xml.into_inner())
}

/// The canonical, unindented XML text of a template.
pub fn template_xml(template: &Template, flat: &[FlatProperty<'_>]) -> Result<String, EncodeError> {
    let bytes = render_xml(flat).map_err(|e| EncodeError::Xml {
        template: template.name.clone(),
        source: e.into(),
    })?;
    // Only `&str` input was written.
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
