//! Accessor Synthesizer: getter/setter text and its insertion point in the
//! owning record.

use indexmap::IndexMap;
use tracing::debug;

use crate::ast::types::reference_to;
use crate::ast::{RecordDecl, TranslationUnit};
use crate::diagnostics::Diagnostics;
use crate::rewrite::EditQueue;

use super::planner::{getter_name, setter_name};
use super::selector::{TargetField, TargetSet};

/// Where an accessor block goes inside the owning record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertionAnchor {
    /// Offset of the record's closing `}`
    BeforeCloseBrace(usize),
    /// End offset of the last user-provided method
    AfterMember(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessorSpec {
    pub field_name: String,
    pub getter_name: String,
    pub setter_name: String,
    pub owner_type: String,
    pub insertion_anchor: InsertionAnchor,
    /// Field type with top-level const, spelled
    pub const_type: String,
    /// Field type as declared, spelled
    pub value_type: String,
    pub emit_getters: bool,
    pub emit_setter: bool,
}

impl AccessorSpec {
    /// Member definitions, one per line
    pub fn members(&self) -> Vec<String> {
        let field = &self.field_name;
        let mut out = Vec::with_capacity(3);
        if self.emit_getters {
            out.push(format!(
                "{}{}() const {{ return {field}; }}",
                reference_to(&self.const_type),
                self.getter_name
            ));
            out.push(format!(
                "{}{}() {{ return {field}; }}",
                reference_to(&self.value_type),
                self.getter_name
            ));
        }
        if self.emit_setter {
            out.push(format!(
                "void {}({}_{field}) {{ {field} = _{field}; }}",
                self.setter_name,
                reference_to(&self.const_type)
            ));
        }
        out
    }
}

pub struct AccessorSynthesizer<'u> {
    unit: &'u TranslationUnit,
}

impl<'u> AccessorSynthesizer<'u> {
    pub fn new(unit: &'u TranslationUnit) -> Self {
        Self { unit }
    }

    pub fn anchor(&self, record: &RecordDecl) -> InsertionAnchor {
        for method in record.user_methods() {
            debug!(
                record = %record.qualified_name,
                method = %method.name,
                at = %method.span,
                "user-provided method"
            );
        }
        match record.user_methods().last() {
            Some(method) => InsertionAnchor::AfterMember(method.span.end),
            None => InsertionAnchor::BeforeCloseBrace(record.close_brace),
        }
    }

    /// One spec per target owned by this file, with colliding accessors
    /// switched off
    pub fn specs(&self, targets: &TargetSet, diags: &mut Diagnostics) -> Vec<AccessorSpec> {
        let mut specs = Vec::new();
        for target in targets.values().filter(|t| t.owned_by_unit) {
            let Some(record) = self.unit.find_record(&target.owner) else {
                debug!(field = %target.qualified_name, "owning record not found in unit");
                continue;
            };
            specs.push(self.spec_for(target, record, diags));
        }
        specs
    }

    fn spec_for(&self, target: &TargetField, record: &RecordDecl, diags: &mut Diagnostics) -> AccessorSpec {
        let getter = getter_name(&target.name);
        let setter = setter_name(&target.name);

        let emit_getters = !record.has_member(&getter);
        if !emit_getters {
            diags.warning(
                target.span.start,
                format!("'{}' already declares '{getter}'; getters not generated", record.qualified_name),
            );
        }
        let emit_setter = !record.has_member(&setter);
        if !emit_setter {
            diags.warning(
                target.span.start,
                format!("'{}' already declares '{setter}'; setter not generated", record.qualified_name),
            );
        }

        AccessorSpec {
            field_name: target.name.clone(),
            getter_name: getter,
            setter_name: setter,
            owner_type: record.qualified_name.clone(),
            insertion_anchor: self.anchor(record),
            const_type: target.const_type.clone(),
            value_type: target.declared_type.spelled(),
            emit_getters,
            emit_setter,
        }
    }

    /// Queue every accessor block; returns the number of members inserted
    pub fn emit(&self, targets: &TargetSet, queue: &mut EditQueue, diags: &mut Diagnostics) -> usize {
        let mut inserted = 0;
        // field line indent per owner, used for blocks before the brace
        let mut member_indent: IndexMap<String, String> = IndexMap::new();
        for target in targets.values().filter(|t| t.owned_by_unit) {
            member_indent
                .entry(target.owner.clone())
                .or_insert_with(|| self.indent_at(target.span.start));
        }

        for spec in self.specs(targets, diags) {
            let members = spec.members();
            if members.is_empty() {
                continue;
            }
            inserted += members.len();

            match spec.insertion_anchor {
                InsertionAnchor::AfterMember(end) => {
                    debug!(record = %spec.owner_type, field = %spec.field_name, offset = end, "inserting accessors after last method");
                    let same_line = self
                        .unit
                        .find_record(&spec.owner_type)
                        .is_some_and(|record| !self.unit.source[end..record.close_brace].contains('\n'));
                    if same_line {
                        queue.insert_after(end, format!(" {}", members.join(" ")));
                    } else {
                        let indent = self.indent_at(end);
                        let text: String = members.iter().map(|m| format!("\n{indent}{m}")).collect();
                        queue.insert_after(end, text);
                    }
                }
                InsertionAnchor::BeforeCloseBrace(brace) => {
                    debug!(record = %spec.owner_type, field = %spec.field_name, offset = brace, "inserting accessors before closing brace");
                    let line_start = self.line_start(brace);
                    if self.unit.source[line_start..brace].trim().is_empty() {
                        let indent = member_indent.get(&spec.owner_type).cloned().unwrap_or_default();
                        let text: String = members.iter().map(|m| format!("{indent}{m}\n")).collect();
                        queue.insert_before(line_start, text);
                    } else {
                        queue.insert_before(brace, format!("{} ", members.join(" ")));
                    }
                }
            }
        }
        inserted
    }

    fn line_start(&self, offset: usize) -> usize {
        self.unit.source[..offset].rfind('\n').map_or(0, |i| i + 1)
    }

    /// Leading whitespace of the line containing `offset`
    fn indent_at(&self, offset: usize) -> String {
        let start = self.line_start(offset);
        self.unit.source[start..]
            .chars()
            .take_while(|c| *c == ' ' || *c == '\t')
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::CppParser;
    use std::path::Path;

    fn parse(source: &str) -> TranslationUnit {
        CppParser::new().unwrap().parse("foo.cpp", source).unwrap()
    }

    #[test]
    fn test_anchor_ignores_defaulted_members() {
        let unit = parse(
            r#"
struct A { int x; };
struct B {
    B() = default;
    int x;
};
struct C {
    C();
    void first() {}
    int x;
    void last();
};
"#,
        );
        let synth = AccessorSynthesizer::new(&unit);

        let a = unit.find_record("A").unwrap();
        assert_eq!(synth.anchor(a), InsertionAnchor::BeforeCloseBrace(a.close_brace));
        let b = unit.find_record("B").unwrap();
        assert_eq!(synth.anchor(b), InsertionAnchor::BeforeCloseBrace(b.close_brace));

        let c = unit.find_record("C").unwrap();
        let last = c.methods.iter().find(|m| m.name == "last").unwrap();
        assert_eq!(synth.anchor(c), InsertionAnchor::AfterMember(last.span.end));
    }

    #[test]
    fn test_member_text() {
        let spec = AccessorSpec {
            field_name: "name".to_string(),
            getter_name: "getName".to_string(),
            setter_name: "setName".to_string(),
            owner_type: "Foo".to_string(),
            insertion_anchor: InsertionAnchor::BeforeCloseBrace(0),
            const_type: "char *const".to_string(),
            value_type: "char *".to_string(),
            emit_getters: true,
            emit_setter: true,
        };
        assert_eq!(
            spec.members(),
            vec![
                "char *const &getName() const { return name; }",
                "char *&getName() { return name; }",
                "void setName(char *const &_name) { name = _name; }",
            ]
        );
    }

    #[test]
    fn test_collisions_are_skipped() {
        let unit = parse("struct Foo {\n    int x;\n    int getX() const { return x; }\n};\n");
        let record = unit.find_record("Foo").unwrap();
        let field = &record.fields[0];
        let mut targets = TargetSet::new();
        targets.insert(
            field.qualified_name.clone(),
            TargetField {
                qualified_name: field.qualified_name.clone(),
                name: field.name.clone(),
                declared_type: field.ty.clone(),
                const_type: field.ty.const_spelled(),
                owner: record.qualified_name.clone(),
                owned_by_unit: true,
                span: field.span,
            },
        );

        let mut diags = Diagnostics::new(Path::new("foo.cpp"), &unit.source);
        let specs = AccessorSynthesizer::new(&unit).specs(&targets, &mut diags);
        assert_eq!(specs.len(), 1);
        assert!(!specs[0].emit_getters);
        assert!(specs[0].emit_setter);
        assert_eq!(specs[0].members(), vec!["void setX(const int &_x) { x = _x; }"]);
        assert_eq!(diags.warning_count(), 1);
    }
}
