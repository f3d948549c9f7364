/*!
# Accessors Transform

Encapsulates configured member fields behind synthesized accessors.

## Pipeline

1. **Field Selector** resolves configured qualified names to field
   declarations across the unit and its headers.
2. **Usage Matcher** walks every function body in scope once, resolving the
   class of each member access base and handing matches to the planner.
3. **Rewrite Planner** classifies the usage (read, assignment, compound
   assignment, increment/decrement) and picks an in-place or hoisted rewrite
   depending on the statement that contains it.
4. **Accessor Synthesizer** inserts `getX() const`, `getX()` and `setX()`
   into each owning record declared by the unit's own file.

All edits go to one [`EditQueue`](crate::rewrite::EditQueue), applied once
against the original text.

```text
struct Foo { int x; };          struct Foo { int x; const int &getX() const { return x; } ... };
foo.x += 3;               =>    foo.setX( foo.getX() + 3 );
int z = foo.x++;                int z = foo.getX();
                                foo.setX( foo.getX() + 1 );
```
*/

mod matcher;
mod planner;
mod resolve;
mod selector;
mod synthesizer;


pub use planner::{getter_name, setter_name, Operation, Strategy};
pub use resolve::{ClassIndex, TypeEnv};
pub use selector::{FieldSelector, TargetField, TargetSet};
pub use synthesizer::{AccessorSpec, AccessorSynthesizer, InsertionAnchor};

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::ast::FunctionDecl;
use crate::diagnostics::Diagnostics;
use crate::transform::{CompilationUnit, TransformOutcome, TransformStats};
use crate::{Error, Result};

use matcher::UsageMatcher;

/// Which function bodies are searched for usages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum UsageScope {
    /// Every function and method body
    #[default]
    #[serde(alias = "all", alias = "ALL")]
    All,
    /// Only free functions named `main`
    #[serde(alias = "main", alias = "MAIN")]
    Main,
}

impl UsageScope {
    pub fn includes(&self, function: &FunctionDecl) -> bool {
        match self {
            UsageScope::All => true,
            UsageScope::Main => function.name == "main" && function.record.is_none(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AccessorsConfig {
    /// Fully-qualified field names (`ns::Foo::x`)
    pub fields: Vec<String>,
    #[serde(default)]
    pub scope: UsageScope,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawParams {
    Fields(Vec<String>),
    Full(AccessorsConfig),
}

impl AccessorsConfig {
    /// Parse transform parameters: a list of names or a `{Fields, Scope}` map
    pub fn from_value(params: &Value) -> Result<Self> {
        let raw = RawParams::deserialize(params).map_err(|err| {
            Error::Config(format!(
                "Accessors expects a list of qualified field names or {{\"Fields\": [...], \"Scope\": \"all\"|\"main\"}}: {err}"
            ))
        })?;
        Ok(match raw {
            RawParams::Fields(fields) => AccessorsConfig {
                fields,
                scope: UsageScope::default(),
            },
            RawParams::Full(config) => config,
        })
    }
}

#[derive(Debug, Clone)]
pub struct AccessorsTransform {
    config: AccessorsConfig,
}

impl AccessorsTransform {
    pub fn new(config: AccessorsConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AccessorsConfig {
        &self.config
    }

    pub fn run(&self, unit: &CompilationUnit) -> Result<TransformOutcome> {
        let primary = &unit.primary;
        let mut diags = Diagnostics::new(primary.path(), &primary.source);
        if primary.has_errors {
            diags.warning(0, "file contains syntax errors; rewriting what could be parsed");
        }

        let targets = FieldSelector::new(&self.config.fields).select(unit, &mut diags);
        let mut stats = TransformStats {
            targets: targets.len(),
            ..Default::default()
        };
        if targets.is_empty() {
            debug!(file = %primary.path().display(), "no target fields in unit");
            return Ok(TransformOutcome {
                rewritten: None,
                diagnostics: diags.into_vec(),
                stats,
            });
        }

        let index = ClassIndex::build(unit);
        let mut queue = {
            let mut matcher = UsageMatcher::new(unit, &index, &targets, &mut diags);
            for function in primary.functions() {
                if self.config.scope.includes(function) {
                    matcher.scan_function(function);
                }
            }
            let (queue, matched) = matcher.finish();
            stats.merge(&matched);
            queue
        };

        stats.accessors_inserted = AccessorSynthesizer::new(primary).emit(&targets, &mut queue, &mut diags);

        let rewritten = queue.apply(&primary.source, 0)?;
        info!(
            file = %primary.path().display(),
            targets = stats.targets,
            reads = stats.reads,
            writes = stats.writes,
            hoisted = stats.hoisted,
            accessors = stats.accessors_inserted,
            "accessors transform finished"
        );
        Ok(TransformOutcome {
            rewritten: (rewritten != primary.source).then_some(rewritten),
            diagnostics: diags.into_vec(),
            stats,
        })
    }
}
