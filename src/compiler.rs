//! Runs the compilation stages in order and collects their outputs.
//!
//! Stage 1 derives the side tables (provider indexes and message identifiers) from the
//! immutable model. Stage 2 emits the artifacts; each one is guarded by its own
//! [`ErrorTrap`](crate::diagnostics::ErrorTrap) so a failing artifact is dropped while the
//! others are still produced.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::diagnostics::Diagnostics;
use crate::err::{CompileError, EncodeError};
use crate::indexer::{ProviderIndex, index_manifest};
use crate::message_id::{MessageIds, assign_message_ids};
use crate::message_table::{MessageTable, build_message_tables};
use crate::model::Manifest;
use crate::resource_script::resource_script;
use crate::settings::CompilerSettings;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageTableArtifact {
    pub table: MessageTable,
    pub bytes: Vec<u8>,
}

/// Everything a compilation produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Artifacts {
    /// The `WEVT_TEMPLATE` payload; `None` without providers or when encoding failed.
    pub template: Option<Vec<u8>>,
    pub message_tables: Vec<MessageTableArtifact>,
    pub resource_script: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Compiler {
    settings: CompilerSettings,
}

impl Compiler {
    pub fn new(settings: CompilerSettings) -> Self {
        Compiler { settings }
    }

    pub fn settings(&self) -> &CompilerSettings {
        &self.settings
    }

    /// Compile `manifest` in memory.
    ///
    /// Fails without output if errors were reported before the call, if message identifiers
    /// cannot be assigned, on an internal fault, or if any artifact reported an error.
    pub fn compile(
        &self,
        manifest: &Manifest,
        diagnostics: &mut Diagnostics,
    ) -> Result<Artifacts, CompileError> {
        let before = diagnostics.error_count();
        let artifacts = self.emit(manifest, diagnostics)?;

        let count = diagnostics.error_count() - before;
        if count > 0 {
            return Err(CompileError::EmissionFailed { count });
        }
        Ok(artifacts)
    }

    /// Compile `manifest` and write the artifacts into `dir`.
    ///
    /// Artifacts that were produced are written even if another one failed. A file that
    /// cannot be written is reported, and whatever part of it reached the disk is removed.
    /// Returns the written paths.
    pub fn compile_to_dir(
        &self,
        manifest: &Manifest,
        dir: impl AsRef<Path>,
        diagnostics: &mut Diagnostics,
    ) -> Result<Vec<PathBuf>, CompileError> {
        let dir = dir.as_ref();
        let before = diagnostics.error_count();
        let artifacts = self.emit(manifest, diagnostics)?;

        let mut files: Vec<(PathBuf, &[u8])> = Vec::new();
        if let Some(template) = &artifacts.template {
            files.push((dir.join(self.settings.template_file_name()), template.as_slice()));
        }
        for artifact in &artifacts.message_tables {
            files.push((dir.join(artifact.table.file_name()), artifact.bytes.as_slice()));
        }
        if let Some(script) = &artifacts.resource_script {
            files.push((
                dir.join(self.settings.resource_script_file_name()),
                script.as_bytes(),
            ));
        }

        let mut written = Vec::with_capacity(files.len());
        for (path, bytes) in files {
            let trap = diagnostics.trap();
            if let Err(e) = write_artifact(&path, bytes) {
                diagnostics.error(
                    None,
                    format_args!("failed to write `{}`: {e}", path.display()),
                );
            }
            if trap.tripped(diagnostics) {
                continue;
            }
            debug!("wrote {} ({} bytes)", path.display(), bytes.len());
            written.push(path);
        }

        let count = diagnostics.error_count() - before;
        if count > 0 {
            return Err(CompileError::EmissionFailed { count });
        }
        info!("wrote {} files to {}", written.len(), dir.display());
        Ok(written)
    }

    /// Runs both stages; artifacts whose trap tripped are left out.
    fn emit(
        &self,
        manifest: &Manifest,
        diagnostics: &mut Diagnostics,
    ) -> Result<Artifacts, CompileError> {
        if diagnostics.error_occurred() {
            return Err(CompileError::PriorErrors {
                count: diagnostics.error_count(),
            });
        }

        let mut trap = diagnostics.trap();
        let indexes = index_manifest(manifest, diagnostics);
        let ids = assign_message_ids(manifest, diagnostics)?;

        let template = self.emit_template(manifest, &indexes, &ids, diagnostics)?;
        let template = if trap.tripped(diagnostics) {
            None
        } else {
            template
        };

        trap.reset(diagnostics);
        let message_tables = self.emit_message_tables(manifest, &ids, diagnostics);
        let message_tables = if trap.tripped(diagnostics) {
            Vec::new()
        } else {
            message_tables
        };

        trap.reset(diagnostics);
        let template_file = template
            .as_ref()
            .map(|_| self.settings.template_file_name());
        let tables: Vec<MessageTable> = message_tables.iter().map(|a| a.table.clone()).collect();
        let script = resource_script(&tables, template_file.as_deref());
        let resource_script = if trap.tripped(diagnostics) {
            None
        } else {
            Some(script)
        };

        info!(
            "compiled {} providers: template {}, {} message tables",
            manifest.providers().len(),
            template.as_ref().map_or(0, Vec::len),
            message_tables.len()
        );

        Ok(Artifacts {
            template,
            message_tables,
            resource_script,
        })
    }

    fn emit_template(
        &self,
        manifest: &Manifest,
        indexes: &[ProviderIndex],
        ids: &[MessageIds],
        diagnostics: &mut Diagnostics,
    ) -> Result<Option<Vec<u8>>, CompileError> {
        if manifest.providers().is_empty() {
            return Ok(None);
        }

        match crate::wevt::encode_template_resource(manifest, indexes, ids, &self.settings) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(EncodeError::Internal(fault)) => Err(fault.into()),
            Err(e) => {
                diagnostics.error(
                    None,
                    format_args!("failed to encode the template resource: {e}"),
                );
                Ok(None)
            }
        }
    }

    fn emit_message_tables(
        &self,
        manifest: &Manifest,
        ids: &[MessageIds],
        diagnostics: &mut Diagnostics,
    ) -> Vec<MessageTableArtifact> {
        let codec = self.settings.get_ansi_codec();
        let mut out = Vec::new();
        for table in build_message_tables(manifest, ids, &self.settings, diagnostics) {
            match table.to_bytes(codec) {
                Ok(bytes) => out.push(MessageTableArtifact { table, bytes }),
                Err(e) => diagnostics.error(
                    None,
                    format_args!("failed to encode the message table for `{}`: {e}", table.culture),
                ),
            }
        }
        out
    }
}

fn write_artifact(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let result = File::create(path).and_then(|mut file| {
        file.write_all(bytes)?;
        file.flush()
    });
    if result.is_err() {
        // Best effort; the file may not exist at all.
        let _ = fs::remove_file(path);
    }
    result
}
