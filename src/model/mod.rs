//! The in-memory description of instrumentation providers that the compiler consumes.
//!
//! Entities live in per-provider arenas and refer to each other through dense typed handles.
//! Insertion enforces the invariants later stages rely on (unique values, single-bit keyword
//! masks, no dangling handles, resolvable property references), so nothing downstream needs
//! to re-check them.

mod entities;
mod handles;
mod provider;
mod template;
mod types;

pub use entities::*;
pub use handles::*;
pub use provider::*;
pub use template::*;
pub use types::*;
