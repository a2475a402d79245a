//! Per-culture message tables (`RT_MESSAGETABLE` payloads).
//!
//! A table is serialized as `MESSAGE_RESOURCE_DATA`:
//!
//! ```text
//! u32 block_count
//! block_count x { u32 low_id, u32 high_id, u32 entries_offset }
//! per block, per id: { u16 length, u16 flags, text, NUL, zero padding to 4 }
//! ```
//!
//! A block covers a run of consecutive identifiers. `flags` is 1 for UTF-16 text and 0 for
//! text in the ANSI code page.

use encoding::{EncoderTrap, EncodingRef};
use hashbrown::HashMap as FastMap;
use log::{debug, info, warn};

use crate::diagnostics::Diagnostics;
use crate::err::EncodeError;
use crate::message_id::MessageIds;
use crate::model::{Manifest, StringTable};
use crate::settings::CompilerSettings;
use crate::utils::encode_utf16le;
use crate::wevt::writer::{BinaryWriter, to_u16, to_u32};

pub const MESSAGE_BLOCK_LEN: usize = 12;
pub const MESSAGE_ENTRY_HEADER_LEN: usize = 4;
pub const MESSAGE_FLAG_UNICODE: u16 = 0x1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRecord {
    pub id: u32,
    pub text: String,
    pub is_ansi: bool,
}

/// The messages of one culture, sorted by identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageTable {
    pub culture: String,
    pub lang_id: u16,
    pub records: Vec<MessageRecord>,
}

/// A run of consecutive identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageBlock {
    pub low_id: u32,
    pub high_id: u32,
    /// Index of the first record of the run.
    pub first: usize,
}

impl MessageTable {
    /// Collects every message with an assigned identifier whose string exists in `strings`.
    ///
    /// Missing strings are reported as warnings and skipped. Two messages that share an
    /// identifier must have the same text; a conflict is reported as an error.
    pub fn collect(
        manifest: &Manifest,
        ids: &[MessageIds],
        strings: &StringTable,
        ansi: bool,
        diagnostics: &mut Diagnostics,
    ) -> Self {
        let mut records: Vec<MessageRecord> = Vec::new();
        let mut seen: FastMap<u32, usize, ahash::RandomState> =
            FastMap::with_hasher(ahash::RandomState::new());

        for (provider, ids) in manifest.providers().iter().zip(ids) {
            for item in provider.items() {
                let Some(message) = item.message() else {
                    continue;
                };
                let Some(id) = ids.get(item.entity()) else {
                    continue;
                };
                let location = message.location.as_ref().or(provider.location.as_ref());

                let Some(text) = strings.get(&message.string_id) else {
                    diagnostics.warning(
                        location,
                        format_args!(
                            "string `{}` is not defined for culture `{}`",
                            message.string_id, strings.culture
                        ),
                    );
                    continue;
                };

                match seen.get(&id) {
                    Some(&existing) if records[existing].text == text => {}
                    Some(_) => diagnostics.error(
                        location,
                        format_args!(
                            "message identifier 0x{id:08X} is used by `{}` with different text in culture `{}`",
                            message.string_id, strings.culture
                        ),
                    ),
                    None => {
                        seen.insert(id, records.len());
                        records.push(MessageRecord {
                            id,
                            text: text.to_string(),
                            is_ansi: ansi,
                        });
                    }
                }
            }
        }

        records.sort_by_key(|r| r.id);
        debug!(
            "culture `{}` (0x{:04X}): {} messages",
            strings.culture,
            strings.lang_id,
            records.len()
        );

        MessageTable {
            culture: strings.culture.clone(),
            lang_id: strings.lang_id,
            records,
        }
    }

    /// `MSG<LANGID>.bin`, with the language identifier as five hex digits.
    pub fn file_name(&self) -> String {
        format!("MSG{:05X}.bin", self.lang_id)
    }

    pub fn blocks(&self) -> Vec<MessageBlock> {
        let mut blocks: Vec<MessageBlock> = Vec::new();
        for (i, record) in self.records.iter().enumerate() {
            match blocks.last_mut() {
                Some(block) if block.high_id.checked_add(1) == Some(record.id) => {
                    block.high_id = record.id;
                }
                _ => blocks.push(MessageBlock {
                    low_id: record.id,
                    high_id: record.id,
                    first: i,
                }),
            }
        }
        blocks
    }

    pub fn to_bytes(&self, codec: EncodingRef) -> Result<Vec<u8>, EncodeError> {
        let blocks = self.blocks();
        let mut w = BinaryWriter::with_capacity(
            4 + blocks.len() * MESSAGE_BLOCK_LEN + self.records.len() * 32,
        );

        w.write_u32(to_u32("message block count", blocks.len())?);
        let mut entries_at = Vec::with_capacity(blocks.len());
        for block in &blocks {
            w.write_u32(block.low_id);
            w.write_u32(block.high_id);
            entries_at.push(w.reserve(4));
        }

        for (block, patch_at) in blocks.iter().zip(entries_at) {
            let offset = w.offset()?;
            w.patch_u32(patch_at, offset)?;

            let count = (block.high_id - block.low_id) as usize + 1;
            for record in &self.records[block.first..block.first + count] {
                write_entry(&mut w, record, codec)?;
            }
        }

        w.finish()
    }
}

fn write_entry(
    w: &mut BinaryWriter,
    record: &MessageRecord,
    codec: EncodingRef,
) -> Result<(), EncodeError> {
    let (mut text, flags) = if record.is_ansi {
        let bytes = codec
            .encode(&record.text, EncoderTrap::Strict)
            .map_err(|reason| EncodeError::CodePage {
                id: record.id,
                code_page: codec.name(),
                reason: reason.into_owned(),
            })?;
        (bytes, 0)
    } else {
        (encode_utf16le(&record.text), MESSAGE_FLAG_UNICODE)
    };

    text.extend_from_slice(if record.is_ansi { &[0] } else { &[0, 0] });
    let padded = (MESSAGE_ENTRY_HEADER_LEN + text.len() + 3) & !3;
    text.resize(padded - MESSAGE_ENTRY_HEADER_LEN, 0);

    w.write_u16(to_u16("message entry length", padded)?);
    w.write_u16(flags);
    w.write_bytes(&text);
    Ok(())
}

/// Builds one table per string table of the manifest, in string-table order.
pub fn build_message_tables(
    manifest: &Manifest,
    ids: &[MessageIds],
    settings: &CompilerSettings,
    diagnostics: &mut Diagnostics,
) -> Vec<MessageTable> {
    let ansi = settings.get_ansi_messages();
    let build = |strings: &StringTable| {
        let mut local = Diagnostics::new();
        let table = MessageTable::collect(manifest, ids, strings, ansi, &mut local);
        (table, local)
    };

    let results = collect_tables(manifest.string_tables(), settings.get_num_threads(), build);

    let mut tables = Vec::with_capacity(results.len());
    for (table, local) in results {
        diagnostics.merge(local);
        tables.push(table);
    }
    info!("built {} message tables", tables.len());
    tables
}

#[cfg(feature = "multithreading")]
fn collect_tables<F>(
    string_tables: &[StringTable],
    num_threads: usize,
    build: F,
) -> Vec<(MessageTable, Diagnostics)>
where
    F: Fn(&StringTable) -> (MessageTable, Diagnostics) + Sync,
{
    use rayon::prelude::*;

    if string_tables.len() < 2 || num_threads == 1 {
        return string_tables.iter().map(build).collect();
    }

    match rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build()
    {
        Ok(pool) => pool.install(|| string_tables.par_iter().map(&build).collect()),
        Err(e) => {
            warn!("failed to start a thread pool, building message tables sequentially: {e}");
            string_tables.iter().map(build).collect()
        }
    }
}

#[cfg(not(feature = "multithreading"))]
fn collect_tables<F>(
    string_tables: &[StringTable],
    _num_threads: usize,
    build: F,
) -> Vec<(MessageTable, Diagnostics)>
where
    F: Fn(&StringTable) -> (MessageTable, Diagnostics),
{
    string_tables.iter().map(build).collect()
}
