/*!
# Transforms

Source transformations applied to one compilation unit at a time.

## Overview

A configuration section names transforms and their parameters. Each name is
mapped to a variant of the closed [`Transform`] enum when the section is
loaded; a variant is constructed with its parsed parameters and never reads
shared state afterwards.

Every transform runs the same protocol: collect over the whole unit first,
queue text edits, flush the queue once at the end.

## Example Usage

```rust,ignore
use accessorize_core::transform::{CompilationUnit, Transform};

let transform = Transform::from_config("Accessors", &serde_json::json!(["Foo::x"]))?;
let unit = CompilationUnit::new(parser.parse("main.cpp", source)?);
let outcome = transform.run(&unit)?;
```
*/

pub mod accessors;

pub use accessors::{AccessorsConfig, AccessorsTransform, UsageScope};

use indexmap::IndexMap;
use serde_json::Value;

use crate::ast::TranslationUnit;
use crate::diagnostics::Diagnostic;
use crate::{Error, Result};

/// The file being rewritten plus read-only declaration context
#[derive(Debug, Clone)]
pub struct CompilationUnit {
    pub primary: TranslationUnit,
    /// Headers reached through local `#include` directives
    pub context: Vec<TranslationUnit>,
}

impl CompilationUnit {
    pub fn new(primary: TranslationUnit) -> Self {
        Self {
            primary,
            context: Vec::new(),
        }
    }

    pub fn with_context(mut self, context: Vec<TranslationUnit>) -> Self {
        self.context = context;
        self
    }

    /// Primary file first, then context headers in discovery order
    pub fn units(&self) -> impl Iterator<Item = &TranslationUnit> {
        std::iter::once(&self.primary).chain(self.context.iter())
    }
}

/// Counters reported per unit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformStats {
    pub targets: usize,
    pub reads: usize,
    pub writes: usize,
    pub hoisted: usize,
    pub unsupported: usize,
    pub escapes: usize,
    /// Members named like a target on an object of unknown type
    pub unresolved: usize,
    pub accessors_inserted: usize,
}

impl TransformStats {
    pub fn merge(&mut self, other: &TransformStats) {
        self.targets += other.targets;
        self.reads += other.reads;
        self.writes += other.writes;
        self.hoisted += other.hoisted;
        self.unsupported += other.unsupported;
        self.escapes += other.escapes;
        self.unresolved += other.unresolved;
        self.accessors_inserted += other.accessors_inserted;
    }
}

#[derive(Debug, Clone, Default)]
pub struct TransformOutcome {
    /// Full rewritten text, or `None` when nothing changed
    pub rewritten: Option<String>,
    pub diagnostics: Vec<Diagnostic>,
    pub stats: TransformStats,
}

#[derive(Debug, Clone)]
pub enum Transform {
    Accessors(AccessorsTransform),
}

impl Transform {
    /// Build a transform from its configured name and parameters
    pub fn from_config(name: &str, params: &Value) -> Result<Self> {
        match name {
            "Accessors" | "AccessorsTransform" => {
                let config = AccessorsConfig::from_value(params)?;
                Ok(Transform::Accessors(AccessorsTransform::new(config)))
            }
            other => Err(Error::UnknownTransform(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Transform::Accessors(_) => "Accessors",
        }
    }

    pub fn run(&self, unit: &CompilationUnit) -> Result<TransformOutcome> {
        match self {
            Transform::Accessors(transform) => transform.run(unit),
        }
    }
}

/// Build every transform of a section in configuration order
pub fn build_transforms(transforms: &IndexMap<String, Value>) -> Result<Vec<Transform>> {
    transforms
        .iter()
        .map(|(name, params)| Transform::from_config(name, params))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_config_names() {
        let transform = Transform::from_config("Accessors", &json!(["Foo::x"])).unwrap();
        assert_eq!(transform.name(), "Accessors");

        let legacy = Transform::from_config("AccessorsTransform", &json!(["Foo::x"])).unwrap();
        assert_eq!(legacy.name(), "Accessors");
    }

    #[test]
    fn test_unknown_transform() {
        let err = Transform::from_config("RenameEverything", &json!([])).unwrap_err();
        assert!(matches!(err, Error::UnknownTransform(name) if name == "RenameEverything"));
    }

    #[test]
    fn test_build_transforms_keeps_order() {
        let mut map = IndexMap::new();
        map.insert("Accessors".to_string(), json!(["A::a"]));
        map.insert("AccessorsTransform".to_string(), json!({"Fields": ["B::b"], "Scope": "main"}));

        let transforms = build_transforms(&map).unwrap();
        assert_eq!(transforms.len(), 2);
        let Transform::Accessors(second) = &transforms[1];
        assert_eq!(second.config().fields, vec!["B::b".to_string()]);
        assert_eq!(second.config().scope, UsageScope::Main);
    }
}
