//! The `.rc` script that links the compiled artifacts into a binary.

use std::fmt::Write;

use crate::message_table::MessageTable;

const LINE_END: &str = "\r\n";

/// `(primary, sub)` language of a LANGID.
pub fn split_lang_id(lang_id: u16) -> (u16, u16) {
    (lang_id & 0x3FF, lang_id >> 10)
}

/// One `LANGUAGE` + message-table pair per culture, then the template resource if any.
pub fn resource_script(tables: &[MessageTable], template_file: Option<&str>) -> String {
    let mut out = String::new();

    for table in tables {
        let (primary, sub) = split_lang_id(table.lang_id);
        // Writing to a `String` cannot fail.
        let _ = write!(out, "LANGUAGE 0x{primary:x},0x{sub:x}{LINE_END}");
        let _ = write!(out, "1 11 \"{}\"{LINE_END}", table.file_name());
    }

    if let Some(file) = template_file {
        let _ = write!(out, "1 WEVT_TEMPLATE \"{file}\"{LINE_END}");
    }

    out
}
