
use std::str::FromStr;

use evtmc::model::*;
use evtmc::wevt::{BlockKind, PropertyFlags};
use evtmc::wevt::manifest::{CrimManifest, PropertyShape};
use evtmc::{Compiler, CompilerSettings, Diagnostics, Guid};
use fixtures::*;
use pretty_assertions::assert_eq;

fn compile_template(manifest: &Manifest) -> Vec<u8> {
    ensure_env_logger_initialized();
    let mut diagnostics = Diagnostics::new();
    let artifacts = Compiler::new(CompilerSettings::new())
        .compile(manifest, &mut diagnostics)
        .expect("compilation should succeed");
    assert!(!diagnostics.error_occurred());
    artifacts.template.expect("a template resource")
}

fn u32_at(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(buf[offset..offset + 4].try_into().unwrap())
}

#[test]
fn it_encodes_a_one_level_provider_to_the_documented_layout() {
    let blob = compile_template(&one_level_manifest());

    let mut expected = Vec::new();
    // CRIM header, version 3.1, one provider.
    expected.extend_from_slice(b"CRIM");
    expected.extend_from_slice(&216u32.to_le_bytes());
    expected.extend_from_slice(&[3, 0, 1, 0]);
    expected.extend_from_slice(&1u32.to_le_bytes());
    expected.extend_from_slice(&sample_guid().to_le_bytes());
    expected.extend_from_slice(&36u32.to_le_bytes());
    // WEVT header: no provider message, four used slots.
    expected.extend_from_slice(b"WEVT");
    expected.extend_from_slice(&180u32.to_le_bytes());
    expected.extend_from_slice(&0xFFFF_FFFFu32.to_le_bytes());
    expected.extend_from_slice(&4u32.to_le_bytes());
    for (kind, offset) in [(2u32, 140u32), (0, 152), (1, 192), (3, 204)] {
        expected.extend_from_slice(&kind.to_le_bytes());
        expected.extend_from_slice(&offset.to_le_bytes());
    }
    expected.extend_from_slice(&[0; 7 * 8]);
    // Empty OPCO.
    expected.extend_from_slice(b"OPCO");
    expected.extend_from_slice(&[0; 8]);
    // LEVL with `Info` (4).
    expected.extend_from_slice(b"LEVL");
    expected.extend_from_slice(&40u32.to_le_bytes());
    expected.extend_from_slice(&1u32.to_le_bytes());
    expected.extend_from_slice(&4u32.to_le_bytes());
    expected.extend_from_slice(&0xFFFF_FFFFu32.to_le_bytes());
    expected.extend_from_slice(&176u32.to_le_bytes());
    expected.extend_from_slice(&16u32.to_le_bytes());
    expected.extend_from_slice(&[b'I', 0, b'n', 0, b'f', 0, b'o', 0, 0, 0, 0, 0]);
    // Empty TASK and KEYW.
    expected.extend_from_slice(b"TASK");
    expected.extend_from_slice(&[0; 8]);
    expected.extend_from_slice(b"KEYW");
    expected.extend_from_slice(&[0; 8]);

    assert_eq!(blob, expected);
}

#[test]
fn it_round_trips_every_offset_through_the_reader() {
    let blob = compile_template(&full_manifest());
    let crim = CrimManifest::parse(&blob).expect("the reader accepts encoder output");

    assert_eq!(crim.header.size as usize, blob.len());
    let provider = crim.provider(&sample_guid()).expect("provider present");
    assert_eq!(provider.message_identifier, Some(0x9000_0001));
    assert_eq!(
        provider.slots.iter().map(|s| s.kind).collect::<Vec<_>>(),
        vec![
            BlockKind::Channel,
            BlockKind::Maps,
            BlockKind::NamedQuery,
            BlockKind::Template,
            BlockKind::Opcode,
            BlockKind::Level,
            BlockKind::Task,
            BlockKind::Keyword,
            BlockKind::Event,
            BlockKind::Filter,
        ]
    );
    let elements = &provider.elements;

    let channels = &elements.channels.as_ref().unwrap().channels;
    assert_eq!(channels.len(), 1);
    assert_eq!(channels[0].identifier, 16);
    assert_eq!(channels[0].flags, 0x2);
    assert_eq!(channels[0].name.as_deref(), Some("Contoso-Sample/Operational"));

    let levels = &elements.levels.as_ref().unwrap().levels;
    assert_eq!(
        levels
            .iter()
            .map(|l| (l.identifier, l.name.as_deref(), l.message_identifier))
            .collect::<Vec<_>>(),
        vec![
            (3, Some("win:Warning"), Some(0x5000_0003)),
            (4, Some("win:Informational"), Some(0x5000_0004)),
        ]
    );

    let opcodes = &elements.opcodes.as_ref().unwrap().opcodes;
    assert_eq!(opcodes.len(), 1);
    assert_eq!((opcodes[0].task(), opcodes[0].value()), (1, 10));
    assert_eq!(opcodes[0].message_identifier, Some(0x3001_000A));

    let tasks = &elements.tasks.as_ref().unwrap().tasks;
    assert_eq!(
        tasks[0].mui_identifier,
        Guid::from_str("0b5e7c1a-1111-4222-8333-944455556666").unwrap()
    );

    let keywords = &elements.keywords.as_ref().unwrap().keywords;
    assert_eq!(
        keywords
            .iter()
            .map(|k| (k.identifier, k.message_identifier))
            .collect::<Vec<_>>(),
        vec![(0x1, Some(0x1000_0000)), (0x2, Some(0x1000_0001))]
    );

    // The offset table is sorted by name, the maps follow declaration order.
    let maps = elements.maps.as_ref().unwrap();
    assert_eq!(maps.maps[0].name.as_deref(), Some("StatusMap"));
    assert_eq!(maps.maps[1].name.as_deref(), Some("FlagsMap"));
    assert_eq!(maps.map_offsets, vec![maps.maps[1].offset, maps.maps[0].offset]);
    assert_eq!(
        maps.maps[0]
            .entries
            .iter()
            .map(|e| (e.identifier, e.message_identifier))
            .collect::<Vec<_>>(),
        vec![(1, Some(0xD000_0001)), (0, Some(0xD000_0002))]
    );

    let queries = &elements.named_queries.as_ref().unwrap().queries;
    assert_eq!(queries[0].name.as_deref(), Some("ConnectQuery"));
    assert_eq!(queries[0].format.as_deref(), Some("Host=%1"));
    assert_eq!(
        queries[0]
            .items
            .iter()
            .map(|i| (i.name.as_deref(), i.value.as_deref()))
            .collect::<Vec<_>>(),
        vec![(Some("Host"), Some("example.org")), (Some("Port"), Some("443"))]
    );

    let templates = &elements.templates.as_ref().unwrap().templates;
    assert_eq!(templates.len(), 1);
    let temp = &templates[0];
    assert_eq!((temp.property_count, temp.top_level_count, temp.flags), (4, 4, 1));
    assert_eq!(temp.identifier[7] & 0xF0, 0x50);
    assert_eq!(&temp.binxml[..4], &[0x0F, 0x01, 0x01, 0x00]);
    assert_eq!(
        temp.properties
            .iter()
            .map(|p| p.name.as_deref())
            .collect::<Vec<_>>(),
        vec![Some("Host"), Some("Status"), Some("Size"), Some("Blob")]
    );
    let PropertyShape::Data { map_offset, .. } = temp.properties[1].shape else {
        panic!("expected a data property");
    };
    assert_eq!(map_offset, Some(maps.maps[0].offset));
    assert_eq!(provider.map_by_offset(maps.maps[0].offset).unwrap().kind, MapKind::Value);
    assert_eq!(provider.map_by_offset(maps.maps[1].offset).unwrap().kind, MapKind::Bit);
    let blob_property = &temp.properties[3];
    assert_eq!(blob_property.flags, PropertyFlags::PARAM_LENGTH);
    assert_eq!((blob_property.count, blob_property.length), (1, 2));

    let events = &elements.events.as_ref().unwrap().events;
    assert_eq!(
        events
            .iter()
            .map(|e| (e.identifier, e.version))
            .collect::<Vec<_>>(),
        vec![(7, 1), (100, 0)]
    );
    assert_eq!(elements.events.as_ref().unwrap().offset % 8, 0);

    let idle = &events[0];
    assert_eq!(idle.message_identifier, Some(0x0001_0007));
    assert_eq!(idle.template_offset, None);
    assert!(idle.keyword_offsets.is_empty());

    let connect = &events[1];
    assert_eq!(connect.message_identifier, Some(0xB000_0064));
    assert_eq!(connect.keywords, 0x8000_0000_0000_0003);
    assert_eq!((connect.channel, connect.level, connect.opcode, connect.task), (16, 4, 10, 1));
    assert_eq!(connect.template_offset, Some(temp.offset));
    assert!(provider.template_by_offset(temp.offset).is_some());
    assert_eq!(connect.level_offset, Some(levels[1].offset));
    assert_eq!(connect.opcode_offset, Some(opcodes[0].offset));
    assert_eq!(connect.task_offset, Some(tasks[0].offset));
    assert_eq!(connect.channel_offset, Some(channels[0].offset));
    assert_eq!(
        connect.keyword_offsets,
        vec![keywords[0].offset, keywords[1].offset]
    );

    let filters = elements.filters.as_ref().unwrap();
    assert_eq!(filters.trailing, 0);
    assert_eq!(filters.filters[0].name.as_deref(), Some("ConnectFilter"));
    assert_eq!(filters.filters[0].template_offset, Some(temp.offset));
    assert_eq!(filters.filters[0].message_identifier, Some(0x5080_0001));

    // Every sub-block offset recorded in the slots starts with its signature.
    for slot in &provider.slots {
        let at = slot.offset as usize;
        assert_eq!(&blob[at..at + 4], &slot.kind.signature());
    }
    assert_eq!(u32_at(&blob, provider.offset as usize + 12), 10);
}

#[test]
fn it_sorts_stably_regardless_of_declaration_order() {
    fn manifest(levels: &[(&str, u8)], events: &[(u16, u8)]) -> Manifest {
        let mut p = Provider::new("Sample-Order", sample_guid());
        for (name, value) in levels {
            p.add_level(Level::new(*name, *value)).unwrap();
        }
        for (value, version) in events {
            p.add_event(Event::new(*value, *version)).unwrap();
        }
        let mut m = Manifest::new();
        m.add_provider(p).unwrap();
        m
    }

    let a = compile_template(&manifest(&[("b", 2), ("a", 1), ("c", 3)], &[(5, 0)]));
    let b = compile_template(&manifest(&[("c", 3), ("b", 2), ("a", 1)], &[(5, 0)]));
    assert_eq!(a, b);

    // Events sharing a value keep declaration order.
    let ties = compile_template(&manifest(&[], &[(5, 1), (2, 0), (5, 0)]));
    let crim = CrimManifest::parse(&ties).unwrap();
    let events = &crim.providers[0].elements.events.as_ref().unwrap().events;
    assert_eq!(
        events
            .iter()
            .map(|e| (e.identifier, e.version))
            .collect::<Vec<_>>(),
        vec![(2, 0), (5, 1), (5, 0)]
    );
}

#[test]
fn it_keeps_map_items_in_declaration_order() {
    let mut p = Provider::new("Sample-Maps", sample_guid());
    let items = |values: &[u32]| -> Vec<MapItem> {
        values
            .iter()
            .map(|v| MapItem::new(*v).with_message(Message::new(format!("item.{v}"))))
            .collect()
    };
    p.add_map(Map::new("Values", MapKind::Value, items(&[5, 1, 3])))
        .unwrap();
    p.add_map(Map::new("Bits", MapKind::Bit, items(&[0x4, 0x1])))
        .unwrap();
    let mut m = Manifest::new();
    m.add_provider(p).unwrap();

    let blob = compile_template(&m);
    let crim = CrimManifest::parse(&blob).unwrap();
    let maps = &crim.providers[0].elements.maps.as_ref().unwrap().maps;

    // The signature alone tells value maps from bit maps.
    let values = maps.iter().find(|m| m.kind == MapKind::Value).unwrap();
    let bits = maps.iter().find(|m| m.kind == MapKind::Bit).unwrap();
    assert_eq!(&blob[values.offset as usize..values.offset as usize + 4], b"VMAP");
    assert_eq!(&blob[bits.offset as usize..bits.offset as usize + 4], b"BMAP");

    assert_eq!(
        values
            .entries
            .iter()
            .map(|e| (e.identifier, e.message_identifier))
            .collect::<Vec<_>>(),
        vec![
            (5, Some(0xD000_0001)),
            (1, Some(0xD000_0002)),
            (3, Some(0xD000_0003))
        ]
    );
    assert_eq!(
        bits.entries
            .iter()
            .map(|e| (e.identifier, e.message_identifier))
            .collect::<Vec<_>>(),
        vec![(0x4, Some(0xE000_0001)), (0x1, Some(0xE000_0002))]
    );
}

#[test]
fn it_writes_the_legacy_filter_header_when_enabled() {
    ensure_env_logger_initialized();
    let manifest = full_manifest();
    let mut diagnostics = Diagnostics::new();
    let artifacts = Compiler::new(CompilerSettings::new().legacy_filter_header(true))
        .compile(&manifest, &mut diagnostics)
        .unwrap();
    let blob = artifacts.template.unwrap();
    let crim = CrimManifest::parse(&blob).unwrap();
    let provider = &crim.providers[0];
    let temp_offset = provider.elements.templates.as_ref().unwrap().templates[0].offset;
    assert_eq!(provider.elements.filters.as_ref().unwrap().trailing, temp_offset);
}

#[test]
fn it_derives_template_ids_from_shape_only() {
    fn with_template(template: Template, crim_version: (u16, u16), compat: u32) -> [u8; 16] {
        let mut p = Provider::new("Sample-Templates", sample_guid());
        p.add_template(template).unwrap();
        let mut m = Manifest::new();
        m.add_provider(p).unwrap();

        ensure_env_logger_initialized();
        let settings = CompilerSettings::new()
            .crim_version(crim_version.0, crim_version.1)
            .compat_level(compat);
        let mut diagnostics = Diagnostics::new();
        let blob = Compiler::new(settings)
            .compile(&m, &mut diagnostics)
            .unwrap()
            .template
            .unwrap();
        let crim = CrimManifest::parse(&blob).unwrap();
        crim.providers[0].elements.templates.as_ref().unwrap().templates[0].identifier
    }

    let shape = |name: &str, out: OutType| {
        Template::new(name)
            .with_property(DataProperty::new("Value", InType::UInt32).with_out_type(out))
    };

    let a = with_template(shape("A", OutType::UnsignedInt), (3, 1), 3);
    let renamed = with_template(shape("B", OutType::UnsignedInt), (3, 1), 3);
    let hex = with_template(shape("A", OutType::HexInt32), (3, 1), 3);
    assert_eq!(a, renamed);
    assert_ne!(a, hex);
    assert_eq!(a[7] & 0xF0, 0x50);

    let legacy = with_template(shape("A", OutType::UnsignedInt), (3, 1), 1);
    assert_ne!(a, legacy);
    assert_eq!(legacy, with_template(shape("C", OutType::UnsignedInt), (2, 0), 1));
}
