use std::fmt;

use encoding::EncodingRef;
use encoding::all::WINDOWS_1252;
use encoding::label::encoding_from_whatwg_label;
use serde::Deserialize;
use thiserror::Error;

/// Which digest produces template identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateIdScheme {
    /// Nested MD5, used by older toolchains.
    Legacy,
    /// Truncated SHA-256 with a version nibble.
    Current,
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to parse compiler settings")]
    Json(#[from] serde_json::Error),

    #[error("unknown code page label `{0}`")]
    UnknownCodePage(String),
}

#[derive(Clone)]
pub struct CompilerSettings {
    crim_major_version: u16,
    crim_minor_version: u16,
    compat_level: u32,
    legacy_template_id_threshold: u32,
    legacy_filter_header: bool,
    ansi_messages: bool,
    ansi_codec: EncodingRef,
    base_name: String,
    num_threads: usize,
}

impl fmt::Debug for CompilerSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompilerSettings")
            .field("crim_major_version", &self.crim_major_version)
            .field("crim_minor_version", &self.crim_minor_version)
            .field("compat_level", &self.compat_level)
            .field(
                "legacy_template_id_threshold",
                &self.legacy_template_id_threshold,
            )
            .field("legacy_filter_header", &self.legacy_filter_header)
            .field("ansi_messages", &self.ansi_messages)
            .field("ansi_codec", &self.ansi_codec.name())
            .field("base_name", &self.base_name)
            .field("num_threads", &self.num_threads)
            .finish()
    }
}

impl PartialEq for CompilerSettings {
    fn eq(&self, other: &Self) -> bool {
        self.crim_major_version == other.crim_major_version
            && self.crim_minor_version == other.crim_minor_version
            && self.compat_level == other.compat_level
            && self.legacy_template_id_threshold == other.legacy_template_id_threshold
            && self.legacy_filter_header == other.legacy_filter_header
            && self.ansi_messages == other.ansi_messages
            && self.ansi_codec.name() == other.ansi_codec.name()
            && self.base_name == other.base_name
            && self.num_threads == other.num_threads
    }
}

impl Default for CompilerSettings {
    fn default() -> Self {
        CompilerSettings {
            crim_major_version: 3,
            crim_minor_version: 1,
            compat_level: 3,
            legacy_template_id_threshold: 3,
            legacy_filter_header: false,
            ansi_messages: false,
            ansi_codec: WINDOWS_1252,
            base_name: "manifest".to_string(),
            num_threads: 0,
        }
    }
}

/// On-disk form of [`CompilerSettings`]; every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct SettingsFile {
    crim_version: Option<(u16, u16)>,
    compat_level: Option<u32>,
    legacy_template_id_threshold: Option<u32>,
    legacy_filter_header: Option<bool>,
    ansi_messages: Option<bool>,
    code_page: Option<String>,
    base_name: Option<String>,
    num_threads: Option<usize>,
}

impl CompilerSettings {
    pub fn new() -> Self {
        CompilerSettings::default()
    }

    /// Read settings from JSON; missing keys keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        let file: SettingsFile = serde_json::from_str(json)?;
        let mut settings = CompilerSettings::default();

        if let Some((major, minor)) = file.crim_version {
            settings = settings.crim_version(major, minor);
        }
        if let Some(level) = file.compat_level {
            settings = settings.compat_level(level);
        }
        if let Some(threshold) = file.legacy_template_id_threshold {
            settings = settings.legacy_template_id_threshold(threshold);
        }
        if let Some(flag) = file.legacy_filter_header {
            settings = settings.legacy_filter_header(flag);
        }
        if let Some(flag) = file.ansi_messages {
            settings = settings.ansi_messages(flag);
        }
        if let Some(label) = file.code_page {
            let codec = encoding_from_whatwg_label(&label)
                .ok_or_else(|| SettingsError::UnknownCodePage(label.clone()))?;
            settings = settings.ansi_codec(codec);
        }
        if let Some(name) = file.base_name {
            settings = settings.base_name(name);
        }
        if let Some(n) = file.num_threads {
            settings = settings.num_threads(n);
        }

        Ok(settings)
    }

    pub fn crim_version(mut self, major: u16, minor: u16) -> Self {
        self.crim_major_version = major;
        self.crim_minor_version = minor;
        self
    }

    pub fn compat_level(mut self, level: u32) -> Self {
        self.compat_level = level;
        self
    }

    /// Compat levels below this use the legacy template identifier scheme.
    pub fn legacy_template_id_threshold(mut self, threshold: u32) -> Self {
        self.legacy_template_id_threshold = threshold;
        self
    }

    /// Store the last filter's template offset in the `FLTR` header.
    pub fn legacy_filter_header(mut self, enabled: bool) -> Self {
        self.legacy_filter_header = enabled;
        self
    }

    /// Write message-table text in the ANSI code page instead of UTF-16.
    pub fn ansi_messages(mut self, enabled: bool) -> Self {
        self.ansi_messages = enabled;
        self
    }

    pub fn ansi_codec(mut self, ansi_codec: EncodingRef) -> Self {
        self.ansi_codec = ansi_codec;
        self
    }

    /// Stem of the emitted file names.
    pub fn base_name(mut self, name: impl Into<String>) -> Self {
        self.base_name = name.into();
        self
    }

    /// Worker threads for message tables; `0` lets rayon decide.
    pub fn num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = num_threads;
        self
    }

    pub fn get_crim_version(&self) -> (u16, u16) {
        (self.crim_major_version, self.crim_minor_version)
    }

    pub fn get_template_id_scheme(&self) -> TemplateIdScheme {
        if self.compat_level < self.legacy_template_id_threshold {
            TemplateIdScheme::Legacy
        } else {
            TemplateIdScheme::Current
        }
    }

    pub fn get_legacy_filter_header(&self) -> bool {
        self.legacy_filter_header
    }

    pub fn get_ansi_messages(&self) -> bool {
        self.ansi_messages
    }

    pub fn get_ansi_codec(&self) -> EncodingRef {
        self.ansi_codec
    }

    pub fn get_base_name(&self) -> &str {
        &self.base_name
    }

    pub fn get_num_threads(&self) -> usize {
        self.num_threads
    }

    /// File name of the binary template resource.
    pub fn template_file_name(&self) -> String {
        format!("{}TEMP.BIN", self.base_name)
    }

    /// File name of the resource script.
    pub fn resource_script_file_name(&self) -> String {
        format!("{}.rc", self.base_name)
    }
}
