#![deny(unused_must_use)]
#![forbid(unsafe_code)]
//! A compiler for Windows event instrumentation manifests.
//!
//! The input is an already validated [`model::Manifest`]. The compiler assigns message
//! identifiers, encodes the binary `WEVT_TEMPLATE` resource (a `CRIM` blob), builds one message
//! table per culture and writes a resource script that ties them together.
//!
//! ```
//! use evtmc::model::{Level, Manifest, Provider};
//! use evtmc::{Compiler, CompilerSettings, Diagnostics, Guid};
//!
//! let mut provider = Provider::new("Sample", Guid::default());
//! provider.add_level(Level::new("Info", 4)).unwrap();
//!
//! let mut manifest = Manifest::new();
//! manifest.add_provider(provider).unwrap();
//!
//! let mut diagnostics = Diagnostics::new();
//! let artifacts = Compiler::new(CompilerSettings::new())
//!     .compile(&manifest, &mut diagnostics)
//!     .unwrap();
//! assert_eq!(&artifacts.template.unwrap()[..4], b"CRIM");
//! ```

pub use compiler::{Artifacts, Compiler, MessageTableArtifact};
pub use diagnostics::{Diagnostic, Diagnostics, ErrorTrap, Severity, SourceLocation};
pub use err::{
    AssignError, CompileError, EncodeError, IdError, InternalFault, ModelError,
};
pub use guid::{Guid, GuidParseError};
pub use message_id::{MessageIdGenerator, MessageIds, UNUSED_MESSAGE_ID, assign_message_ids};
pub use message_table::{MessageTable, build_message_tables};
pub use settings::{CompilerSettings, SettingsError, TemplateIdScheme};
pub use wevt::encode_template_resource;
pub use wevt::manifest::{CrimManifest, CrimParseError};

pub mod compiler;
pub mod diagnostics;
pub mod err;
pub mod guid;
pub mod indexer;
pub mod message_id;
pub mod message_table;
pub mod model;
pub mod resource_script;
pub mod settings;
pub mod utils;
pub mod wevt;
