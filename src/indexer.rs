//! Per-provider derived data computed once before emission.

use log::debug;

use crate::diagnostics::Diagnostics;
use crate::model::{ChannelId, EntityIndex, EventId, Manifest, Provider};

/// Keyword bits reserved for channels, counted down from bit 63.
pub const MAX_CHANNEL_KEYWORD_BITS: usize = 8;

/// Events sharing a `(level, keyword mask)` pair share one enable bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnableBit {
    pub bit: usize,
    pub level: u8,
    pub keywords: u64,
}

#[derive(Debug, Clone)]
pub struct ProviderIndex {
    /// Position of the provider in the manifest.
    pub provider_index: usize,
    pub entities: EntityIndex,
    channel_masks: Vec<u64>,
    event_keywords: Vec<u64>,
    event_enable_bits: Vec<usize>,
    enable_bits: Vec<EnableBit>,
}

impl ProviderIndex {
    pub fn new(provider: &Provider, provider_index: usize) -> Self {
        let channel_masks: Vec<u64> = (0..provider.channels().len())
            .map(|i| {
                if i < MAX_CHANNEL_KEYWORD_BITS {
                    1u64 << (63 - i)
                } else {
                    0
                }
            })
            .collect();

        let mut event_keywords = Vec::with_capacity(provider.events().len());
        let mut event_enable_bits = Vec::with_capacity(provider.events().len());
        let mut enable_bits: Vec<EnableBit> = vec![];

        for event in provider.events() {
            let mut mask = event
                .keywords
                .iter()
                .fold(0u64, |acc, k| acc | provider[*k].mask);
            if let Some(channel) = event.channel {
                mask |= channel_masks.get(channel.index()).copied().unwrap_or(0);
            }

            let level = event.level.map(|l| provider[l].value).unwrap_or(0);
            let bit = match enable_bits
                .iter()
                .find(|b| b.level == level && b.keywords == mask)
            {
                Some(existing) => existing.bit,
                None => {
                    let bit = enable_bits.len();
                    enable_bits.push(EnableBit {
                        bit,
                        level,
                        keywords: mask,
                    });
                    bit
                }
            };

            event_keywords.push(mask);
            event_enable_bits.push(bit);
        }

        debug!(
            "indexed provider `{}` (#{}): {} channel bit(s), {} enable bit(s)",
            provider.name,
            provider_index,
            channel_masks.iter().filter(|m| **m != 0).count(),
            enable_bits.len()
        );

        ProviderIndex {
            provider_index,
            entities: EntityIndex::new(provider),
            channel_masks,
            event_keywords,
            event_enable_bits,
            enable_bits,
        }
    }

    /// Reserved keyword bit owned by a channel, `0` past the eighth channel.
    pub fn channel_mask(&self, channel: ChannelId) -> u64 {
        self.channel_masks.get(channel.index()).copied().unwrap_or(0)
    }

    /// Declared keywords of an event merged with its channel bit.
    pub fn event_keywords(&self, event: EventId) -> u64 {
        self.event_keywords.get(event.index()).copied().unwrap_or(0)
    }

    pub fn event_enable_bit(&self, event: EventId) -> Option<usize> {
        self.event_enable_bits.get(event.index()).copied()
    }

    /// Enable bits in first-seen order.
    pub fn enable_bits(&self) -> &[EnableBit] {
        &self.enable_bits
    }
}

/// Index every provider of the manifest, in order.
pub fn index_manifest(manifest: &Manifest, diagnostics: &mut Diagnostics) -> Vec<ProviderIndex> {
    manifest
        .providers()
        .iter()
        .enumerate()
        .map(|(i, provider)| {
            if provider.channels().len() > MAX_CHANNEL_KEYWORD_BITS {
                diagnostics.warning(
                    provider.location.as_ref(),
                    format_args!(
                        "provider `{}` declares {} channels; only the first {} get a reserved keyword bit",
                        provider.name,
                        provider.channels().len(),
                        MAX_CHANNEL_KEYWORD_BITS
                    ),
                );
            }
            ProviderIndex::new(provider, i)
        })
        .collect()
}
