//! Field Selector: resolve configured qualified names to field declarations.

use indexmap::{IndexMap, IndexSet};
use tracing::debug;

use crate::ast::{Span, TypeRef};
use crate::diagnostics::Diagnostics;
use crate::transform::CompilationUnit;

/// A field configured for encapsulation, resolved to its declaration
#[derive(Debug, Clone, PartialEq)]
pub struct TargetField {
    pub qualified_name: String,
    /// Unqualified field name
    pub name: String,
    pub declared_type: TypeRef,
    /// `declared_type` with top-level const added, spelled
    pub const_type: String,
    /// Qualified name of the owning record
    pub owner: String,
    /// The owning record is declared in the unit's own file
    pub owned_by_unit: bool,
    /// Declaration span in the file that declares it
    pub span: Span,
}

/// Targets keyed by qualified name, in discovery order
pub type TargetSet = IndexMap<String, TargetField>;

pub struct FieldSelector {
    wanted: IndexSet<String>,
}

impl FieldSelector {
    pub fn new(fields: &[String]) -> Self {
        Self {
            wanted: fields.iter().map(|f| f.trim_start_matches("::").to_string()).collect(),
        }
    }

    /// Scan every record of the unit and its headers. Names that match
    /// nothing are skipped without a diagnostic.
    pub fn select(&self, unit: &CompilationUnit, diags: &mut Diagnostics) -> TargetSet {
        let mut targets = TargetSet::new();

        for (index, tu) in unit.units().enumerate() {
            let owned_by_unit = index == 0;
            for record in tu.records() {
                for field in &record.fields {
                    if !self.wanted.contains(&field.qualified_name) || targets.contains_key(&field.qualified_name) {
                        continue;
                    }
                    if field.ty.array {
                        let message = format!(
                            "field '{}' has array type and cannot be returned by reference; skipped",
                            field.qualified_name
                        );
                        if owned_by_unit {
                            diags.warning(field.span.start, message);
                        } else {
                            diags.warning_in(tu.path(), &tu.source, field.span.start, message);
                        }
                        continue;
                    }

                    debug!(
                        field = %field.qualified_name,
                        file = %tu.path().display(),
                        owned_by_unit,
                        "selected target field"
                    );
                    targets.insert(
                        field.qualified_name.clone(),
                        TargetField {
                            qualified_name: field.qualified_name.clone(),
                            name: field.name.clone(),
                            declared_type: field.ty.clone(),
                            const_type: field.ty.const_spelled(),
                            owner: record.qualified_name.clone(),
                            owned_by_unit,
                            span: field.span,
                        },
                    );
                }
            }
        }

        for name in &self.wanted {
            if !targets.contains_key(name) {
                debug!(field = %name, "configured field not declared in this unit");
            }
        }
        targets
    }
}
