//! Reading back a `WEVT_TEMPLATE` payload (CRIM/WEVT/...).
//!
//! The reader understands exactly the layout produced by [`crate::wevt::encode_template_resource`]
//! and is used to inspect compiled resources and to check that every offset written by the
//! encoder lands on the structure it names.
//!
//! Parsing is deterministic (no signature scanning) and every offset is validated relative to
//! the CRIM blob. Unknown header fields are preserved as raw integers.
//!
//! This module is split into:
//! - `types`: a typed view of the CRIM structures
//! - `parse`: parsing and bounds validation
//! - `error`: a small error enum that makes failures actionable in tests/tooling

mod error;
mod parse;
mod types;
mod util;

pub use error::CrimParseError;
pub use types::*;
