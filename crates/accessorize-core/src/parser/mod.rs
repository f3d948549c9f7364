//! C++ parser: tree-sitter-cpp front end lowered into `ast` types.

use std::path::PathBuf;

use tracing::debug;

use crate::ast::TranslationUnit;
use crate::{Error, Result};

mod lower;

#[cfg(test)]
mod tests;

use lower::Lowering;

/// C++ parser backed by tree-sitter-cpp
pub struct CppParser {
    parser: tree_sitter::Parser,
}

impl CppParser {
    pub fn new() -> Result<Self> {
        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&tree_sitter_cpp::LANGUAGE.into())
            .map_err(|e| Error::Parse(format!("Failed to set C++ language: {e}")))?;

        Ok(Self { parser })
    }

    /// Parse one source file into a translation unit.
    ///
    /// Syntax errors do not fail the parse; they are flagged on the unit
    /// and the remaining tree is lowered best-effort.
    pub fn parse(&mut self, path: impl Into<PathBuf>, source: impl Into<String>) -> Result<TranslationUnit> {
        let path = path.into();
        let source = source.into();
        let tree = self
            .parser
            .parse(&source, None)
            .ok_or_else(|| Error::Parse(format!("tree-sitter produced no tree for {}", path.display())))?;

        let root = tree.root_node();
        let has_errors = root.has_error();
        let mut lowering = Lowering::new(&source);
        let decls = lowering.lower_translation_unit(root);
        let (syntax, includes) = lowering.finish();

        debug!(
            file = %path.display(),
            nodes = syntax.len(),
            decls = decls.len(),
            has_errors,
            "parsed translation unit"
        );

        Ok(TranslationUnit {
            path,
            source,
            tree: syntax,
            decls,
            includes,
            has_errors,
        })
    }
}
