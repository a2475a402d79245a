//! Severity-tagged compiler messages.
//!
//! Every stage reports user-facing problems here instead of failing fast, so a single run can
//! surface as many issues as possible. Stages that need to know whether *they* failed take an
//! [`ErrorTrap`] before starting and check it afterwards.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Dropped on report.
    Ignored,
    Note,
    Warning,
    /// Counted; fails the compilation.
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Ignored => "ignored",
            Severity::Note => "note",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        f.write_str(s)
    }
}

/// Where in the (external) manifest source an entity was declared.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize)]
pub struct SourceLocation {
    pub file: Option<PathBuf>,
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    pub fn new(file: impl Into<PathBuf>, line: u32, column: u32) -> Self {
        SourceLocation {
            file: Some(file.into()),
            line,
            column,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file {
            Some(file) => write!(f, "{}({},{})", file.display(), self.line, self.column),
            None => write!(f, "({},{})", self.line, self.column),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub location: Option<SourceLocation>,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(location) = &self.location {
            write!(f, "{location}: ")?;
        }
        write!(f, "{}: {}", self.severity, self.message)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    messages: Vec<Diagnostic>,
    error_count: usize,
}

impl Diagnostics {
    pub fn new() -> Self {
        Diagnostics::default()
    }

    /// Record a message. `Error` increments the error counter, `Ignored` is dropped.
    ///
    /// Every recorded message is mirrored to the `log` facade.
    pub fn report(
        &mut self,
        severity: Severity,
        location: Option<&SourceLocation>,
        message: impl fmt::Display,
    ) {
        let diagnostic = Diagnostic {
            severity,
            location: location.cloned(),
            message: message.to_string(),
        };

        match severity {
            Severity::Ignored => return,
            Severity::Note => log::info!("{diagnostic}"),
            Severity::Warning => log::warn!("{diagnostic}"),
            Severity::Error => {
                log::error!("{diagnostic}");
                self.error_count += 1;
            }
        }

        self.messages.push(diagnostic);
    }

    pub fn error(&mut self, location: Option<&SourceLocation>, message: impl fmt::Display) {
        self.report(Severity::Error, location, message)
    }

    pub fn warning(&mut self, location: Option<&SourceLocation>, message: impl fmt::Display) {
        self.report(Severity::Warning, location, message)
    }

    pub fn note(&mut self, location: Option<&SourceLocation>, message: impl fmt::Display) {
        self.report(Severity::Note, location, message)
    }

    pub fn error_occurred(&self) -> bool {
        self.error_count > 0
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn messages(&self) -> &[Diagnostic] {
        &self.messages
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Start a trap at the current error count.
    pub fn trap(&self) -> ErrorTrap {
        ErrorTrap {
            checkpoint: self.error_count,
        }
    }

    /// Append diagnostics collected elsewhere (e.g. on a worker thread).
    pub fn merge(&mut self, other: Diagnostics) {
        self.error_count += other.error_count;
        self.messages.extend(other.messages);
    }

    /// One JSON object per line, in report order.
    pub fn to_jsonl(&self) -> serde_json::Result<String> {
        let mut out = String::new();
        for message in &self.messages {
            out.push_str(&serde_json::to_string(message)?);
            out.push('\n');
        }
        Ok(out)
    }
}

/// Detects whether new errors were reported since a checkpoint.
#[derive(Debug, Clone, Copy)]
pub struct ErrorTrap {
    checkpoint: usize,
}

impl ErrorTrap {
    pub fn tripped(&self, diagnostics: &Diagnostics) -> bool {
        diagnostics.error_count > self.checkpoint
    }

    pub fn reset(&mut self, diagnostics: &Diagnostics) {
        self.checkpoint = diagnostics.error_count;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_only_errors_are_counted_and_ignored_is_dropped() {
        let mut d = Diagnostics::new();
        d.report(Severity::Ignored, None, "dropped");
        d.note(None, "a note");
        d.warning(None, "a warning");
        assert!(!d.error_occurred());
        assert_eq!(d.messages().len(), 2);

        d.error(None, format_args!("bad value {}", 16));
        assert!(d.error_occurred());
        assert_eq!(d.error_count(), 1);
        assert_eq!(d.messages()[2].message, "bad value 16");
    }

    #[test]
    fn test_trap_detects_new_errors_since_checkpoint() {
        let mut d = Diagnostics::new();
        d.error(None, "earlier failure");

        let mut trap = d.trap();
        assert!(!trap.tripped(&d));

        d.warning(None, "not an error");
        assert!(!trap.tripped(&d));

        d.error(None, "new failure");
        assert!(trap.tripped(&d));

        trap.reset(&d);
        assert!(!trap.tripped(&d));
    }

    #[test]
    fn test_display_includes_location() {
        let mut d = Diagnostics::new();
        let loc = SourceLocation::new("provider.man", 12, 7);
        d.error(Some(&loc), "duplicate level");
        assert_eq!(
            d.messages()[0].to_string(),
            "provider.man(12,7): error: duplicate level"
        );
    }

    #[test]
    fn test_merge_keeps_error_count() {
        let mut a = Diagnostics::new();
        let mut b = Diagnostics::new();
        b.error(None, "from worker");
        b.note(None, "done");
        a.merge(b);
        assert_eq!(a.error_count(), 1);
        assert_eq!(a.messages().len(), 2);
        assert!(a.to_jsonl().unwrap().contains("\"severity\":\"error\""));
    }
}
