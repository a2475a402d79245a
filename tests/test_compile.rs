
use std::fs;

use evtmc::model::*;
use evtmc::{CompileError, Compiler, CompilerSettings, CrimManifest, Diagnostics, Guid, IdError};
use fixtures::*;
use pretty_assertions::assert_eq;
use tempfile::tempdir;

fn u32_at(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(buf[offset..offset + 4].try_into().unwrap())
}

#[test]
fn it_writes_all_artifacts_to_a_directory() {
    ensure_env_logger_initialized();
    let dir = tempdir().unwrap();
    let mut diagnostics = Diagnostics::new();
    let compiler = Compiler::new(CompilerSettings::new().base_name("contoso"));

    let mut written = compiler
        .compile_to_dir(&full_manifest(), dir.path(), &mut diagnostics)
        .unwrap();
    written.sort();
    assert_eq!(
        written,
        vec![
            dir.path().join("MSG00409.bin"),
            dir.path().join("contoso.rc"),
            dir.path().join("contosoTEMP.BIN"),
        ]
    );
    assert!(diagnostics.is_empty());

    let template = fs::read(dir.path().join("contosoTEMP.BIN")).unwrap();
    assert!(CrimManifest::parse(&template).is_ok());

    let script = fs::read_to_string(dir.path().join("contoso.rc")).unwrap();
    assert_eq!(
        script,
        "LANGUAGE 0x9,0x1\r\n1 11 \"MSG00409.bin\"\r\n1 WEVT_TEMPLATE \"contosoTEMP.BIN\"\r\n"
    );
}

#[test]
fn it_builds_message_tables_in_identifier_runs() {
    ensure_env_logger_initialized();
    let mut diagnostics = Diagnostics::new();
    let artifacts = Compiler::new(CompilerSettings::new())
        .compile(&full_manifest(), &mut diagnostics)
        .unwrap();

    assert_eq!(artifacts.message_tables.len(), 1);
    let table = &artifacts.message_tables[0];
    assert_eq!(table.table.records.len(), 14);
    assert_eq!(
        table.table.records.first().map(|r| (r.id, r.text.as_str())),
        Some((0x0001_0007, "Idle."))
    );

    let bytes = &table.bytes;
    let block_count = u32_at(bytes, 0) as usize;
    let blocks: Vec<(u32, u32)> = (0..block_count)
        .map(|i| (u32_at(bytes, 4 + i * 12), u32_at(bytes, 8 + i * 12)))
        .collect();
    assert_eq!(
        blocks,
        vec![
            (0x0001_0007, 0x0001_0007),
            (0x1000_0000, 0x1000_0001),
            (0x3001_000A, 0x3001_000A),
            (0x5000_0003, 0x5000_0004),
            (0x5080_0001, 0x5080_0001),
            (0x7000_0001, 0x7000_0001),
            (0x9000_0001, 0x9000_0001),
            (0xB000_0064, 0xB000_0064),
            (0xC000_0001, 0xC000_0001),
            (0xD000_0001, 0xD000_0002),
            (0xE000_0001, 0xE000_0001),
        ]
    );

    // The first entry directly follows the block array.
    let first = u32_at(bytes, 12) as usize;
    assert_eq!(first, 4 + block_count * 12);
    let length = u16::from_le_bytes([bytes[first], bytes[first + 1]]) as usize;
    let flags = u16::from_le_bytes([bytes[first + 2], bytes[first + 3]]);
    assert_eq!((length, flags), (16, 1));
    assert_eq!(
        &bytes[first + 4..first + 14],
        &[b'I', 0, b'd', 0, b'l', 0, b'e', 0, b'.', 0]
    );
}

#[test]
fn it_warns_about_missing_strings_but_still_compiles() {
    ensure_env_logger_initialized();
    let mut manifest = one_level_manifest();
    let mut p = Provider::new("Sample-Second", Guid::default());
    p.add_level(Level {
        message: Some(Message::new("level.undefined")),
        ..Level::new("Info", 4)
    })
    .unwrap();
    manifest.add_provider(p).unwrap();
    manifest.add_string_table(StringTable::new("de-DE", 0x0407));

    let mut diagnostics = Diagnostics::new();
    let artifacts = Compiler::new(CompilerSettings::new())
        .compile(&manifest, &mut diagnostics)
        .unwrap();
    assert_eq!(diagnostics.error_count(), 0);
    assert_eq!(diagnostics.messages().len(), 1);
    assert!(artifacts.message_tables[0].table.records.is_empty());
    assert_eq!(artifacts.message_tables[0].table.file_name(), "MSG00407.bin");
}

#[test]
fn it_fails_without_output_for_provider_index_sixteen() {
    ensure_env_logger_initialized();
    let mut manifest = Manifest::new();
    for i in 0..17u32 {
        let guid = Guid::new(i + 1, 0, 0, [0; 8]);
        let mut p = Provider::new(format!("Sample-{i}"), guid);
        p.add_keyword(Keyword {
            message: Some(Message::new("kw")),
            ..Keyword::new("k", 0x1)
        })
        .unwrap();
        manifest.add_provider(p).unwrap();
    }

    let dir = tempdir().unwrap();
    let mut diagnostics = Diagnostics::new();
    let err = Compiler::new(CompilerSettings::new())
        .compile_to_dir(&manifest, dir.path(), &mut diagnostics)
        .unwrap_err();

    assert!(matches!(
        err,
        CompileError::MessageIds(IdError::ProviderIndexOutOfRange { index: 16 })
    ));
    assert!(diagnostics.error_occurred());
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn it_refuses_to_compile_after_earlier_errors() {
    let mut diagnostics = Diagnostics::new();
    diagnostics.error(None, "bad manifest");
    let err = Compiler::new(CompilerSettings::new())
        .compile(&one_level_manifest(), &mut diagnostics)
        .unwrap_err();
    assert!(matches!(err, CompileError::PriorErrors { count: 1 }));
}
