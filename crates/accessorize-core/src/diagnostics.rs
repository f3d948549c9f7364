//! User-facing notes and warnings tied to source locations.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    Note,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Note => write!(f, "note"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// A located message, 1-based line and column
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub file: PathBuf,
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}: {}: {}",
            self.file.display(),
            self.line,
            self.column,
            self.severity,
            self.message
        )
    }
}

/// Byte offset to line/column mapping for one buffer
#[derive(Debug, Clone)]
pub struct LineIndex {
    line_starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(source.match_indices('\n').map(|(i, _)| i + 1));
        Self { line_starts }
    }

    /// 1-based line and column of `offset`
    pub fn location(&self, offset: usize) -> (usize, usize) {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next - 1,
        };
        (line + 1, offset - self.line_starts[line] + 1)
    }
}

/// Collects diagnostics for one file and mirrors them to the log
#[derive(Debug)]
pub struct Diagnostics {
    file: PathBuf,
    lines: LineIndex,
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new(file: &Path, source: &str) -> Self {
        Self {
            file: file.to_path_buf(),
            lines: LineIndex::new(source),
            items: Vec::new(),
        }
    }

    pub fn warning(&mut self, offset: usize, message: impl Into<String>) {
        self.push(Severity::Warning, offset, message.into());
    }

    pub fn note(&mut self, offset: usize, message: impl Into<String>) {
        self.push(Severity::Note, offset, message.into());
    }

    /// Warning located in another file of the unit (a context header)
    pub fn warning_in(&mut self, file: &Path, source: &str, offset: usize, message: impl Into<String>) {
        let (line, column) = LineIndex::new(source).location(offset);
        self.record(Diagnostic {
            severity: Severity::Warning,
            file: file.to_path_buf(),
            line,
            column,
            message: message.into(),
        });
    }

    fn push(&mut self, severity: Severity, offset: usize, message: String) {
        let (line, column) = self.lines.location(offset);
        self.record(Diagnostic {
            severity,
            file: self.file.clone(),
            line,
            column,
            message,
        });
    }

    fn record(&mut self, diagnostic: Diagnostic) {
        let severity = diagnostic.severity;
        match severity {
            Severity::Warning => warn!("{diagnostic}"),
            Severity::Note => debug!("{diagnostic}"),
        }
        self.items.push(diagnostic);
    }

    pub fn warning_count(&self) -> usize {
        self.items.iter().filter(|d| d.severity == Severity::Warning).count()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_index() {
        let index = LineIndex::new("ab\ncd\n\nef");
        assert_eq!(index.location(0), (1, 1));
        assert_eq!(index.location(1), (1, 2));
        assert_eq!(index.location(3), (2, 1));
        assert_eq!(index.location(6), (3, 1));
        assert_eq!(index.location(8), (4, 2));
    }

    #[test]
    fn test_diagnostic_display() {
        let mut diags = Diagnostics::new(Path::new("main.cpp"), "int x;\n  foo.x++;\n");
        diags.warning(9, "cannot rewrite");
        diags.note(0, "context");
        assert_eq!(diags.warning_count(), 1);

        let items = diags.into_vec();
        assert_eq!(items[0].to_string(), "main.cpp:2:3: warning: cannot rewrite");
        assert_eq!(items[1].to_string(), "main.cpp:1:1: note: context");
    }
}
