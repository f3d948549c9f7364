//! # Accessorize Core
//!
//! Source-to-source refactoring engine for C++ that encapsulates member
//! fields behind synthesized accessors:
//! - C++ syntax access layer built on tree-sitter (declarations, statements,
//!   expressions with spans)
//! - The Accessors transform: field selection, usage matching, rewrite
//!   planning and accessor synthesis
//! - A text splicer that applies queued edits against the original buffer
//! - Configuration, compilation-database discovery and a per-file driver
//!
//! The command-line front end lives in the `accessorize-cli` crate.

#![warn(clippy::all)]

pub mod ast;
pub mod compile_db;
pub mod config;
pub mod diagnostics;
pub mod driver;
pub mod parser;
pub mod rewrite;
pub mod transform;

// Re-export commonly used types
pub use ast::{Decl, NodeId, Span, SyntaxTree, TranslationUnit};
pub use compile_db::CompilationDatabase;
pub use config::ConfigSection;
pub use diagnostics::{Diagnostic, Severity};
pub use driver::{Driver, FileReport, OutputMode, RunSummary};
pub use parser::CppParser;
pub use rewrite::{EditKind, EditQueue, PendingEdit, SpliceError};
pub use transform::{CompilationUnit, Transform, TransformOutcome};

/// Accessorize version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize tracing for accessorize components.
///
/// `RUST_LOG` takes precedence; otherwise `verbosity` picks the level
/// (0 = info, 1 = debug, 2+ = trace). Output goes to stderr so that
/// rewritten sources can be streamed on stdout.
pub fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("accessorize_core={level},accessorize={level}"))
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Error types for accessorize operations
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Reading or writing a source file failed
    #[error("I/O error on {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// tree-sitter could not produce a syntax tree
    #[error("Parse error: {0}")]
    Parse(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed JSON input
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// compile_commands.json missing or unusable
    #[error("Compilation database error: {0}")]
    CompileDb(String),

    /// A configured transform name has no implementation
    #[error("Unknown transform: {0}")]
    UnknownTransform(String),

    /// Queued edits could not be applied
    #[error("Splice error: {0}")]
    Splice(#[from] rewrite::SpliceError),
}

impl Error {
    pub(crate) fn io(path: impl Into<std::path::PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for accessorize operations
pub type Result<T> = std::result::Result<T, Error>;
