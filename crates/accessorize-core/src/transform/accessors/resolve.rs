//! Lightweight static typing: which record a member expression reads from.

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::ast::types::{element_type_argument, lookup_name};
use crate::ast::{
    ExprKind, FieldDecl, FunctionDecl, MemberDecl, Node, NodeId, RecordDecl, SyntaxTree, TypeRef, UnaryOp,
};
use crate::transform::CompilationUnit;

const MAX_BASE_DEPTH: usize = 16;

/// Every record visible to a compilation unit, by qualified name.
/// The first declaration seen wins (primary file before headers).
pub struct ClassIndex<'u> {
    records: IndexMap<String, &'u RecordDecl>,
}

impl<'u> ClassIndex<'u> {
    pub fn build(unit: &'u CompilationUnit) -> Self {
        let mut records = IndexMap::new();
        for tu in unit.units() {
            for record in tu.records() {
                records.entry(record.qualified_name.clone()).or_insert(record);
            }
        }
        Self { records }
    }

    pub fn get(&self, qualified_name: &str) -> Option<&'u RecordDecl> {
        self.records.get(qualified_name).copied()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Resolve a written type name from inside `scope`: innermost enclosing
    /// scope first, then a unique match on the trailing name
    pub fn resolve_type_name(&self, written: &str, scope: &[String]) -> Option<String> {
        let name = lookup_name(written);
        if name.is_empty() {
            return None;
        }
        if written.trim_start().starts_with("::") {
            return self.records.contains_key(&name).then_some(name);
        }

        for depth in (0..=scope.len()).rev() {
            let candidate = if depth == 0 {
                name.clone()
            } else {
                format!("{}::{}", scope[..depth].join("::"), name)
            };
            if self.records.contains_key(&candidate) {
                return Some(candidate);
            }
        }

        let suffix = format!("::{name}");
        let mut matches = self.records.keys().filter(|q| q.ends_with(&suffix));
        match (matches.next(), matches.next()) {
            (Some(only), None) => Some(only.clone()),
            _ => None,
        }
    }

    /// Record reached through a declared type: the type itself, or the
    /// element of a standard container or smart pointer
    pub fn resolve_value_type(&self, written: &str, scope: &[String]) -> Option<String> {
        self.resolve_type_name(written, scope).or_else(|| {
            let element = element_type_argument(written)?;
            self.resolve_type_name(element, scope)
        })
    }

    /// Find `field` on `class` or, failing that, on its bases
    pub fn lookup_field(&self, class: &str, field: &str) -> Option<(&'u RecordDecl, &'u FieldDecl)> {
        self.lookup_field_at(class, field, 0)
    }

    fn lookup_field_at(&self, class: &str, field: &str, depth: usize) -> Option<(&'u RecordDecl, &'u FieldDecl)> {
        if depth > MAX_BASE_DEPTH {
            return None;
        }
        let record = self.get(class)?;
        if let Some(decl) = record.fields.iter().find(|f| f.name == field) {
            return Some((record, decl));
        }
        record.bases.iter().find_map(|base| {
            let base = self.resolve_type_name(base, &record.scope)?;
            self.lookup_field_at(&base, field, depth + 1)
        })
    }

    /// Record class named by a field's declared type
    pub fn class_of_field(&self, owner: &RecordDecl, field: &FieldDecl) -> Option<String> {
        self.resolve_value_type(&field.ty.base, &owner.inner_scope())
    }

    /// Find method `name` on `class` or its bases
    pub fn lookup_method(&self, class: &str, name: &str) -> Option<(&'u RecordDecl, &'u MemberDecl)> {
        self.lookup_method_at(class, name, 0)
    }

    fn lookup_method_at(&self, class: &str, name: &str, depth: usize) -> Option<(&'u RecordDecl, &'u MemberDecl)> {
        if depth > MAX_BASE_DEPTH {
            return None;
        }
        let record = self.get(class)?;
        if let Some(method) = record.methods.iter().find(|m| m.name == name) {
            return Some((record, method));
        }
        record.bases.iter().find_map(|base| {
            let base = self.resolve_type_name(base, &record.scope)?;
            self.lookup_method_at(&base, name, depth + 1)
        })
    }

    /// Record class returned by method `name` of `class`
    pub fn method_return_class(&self, class: &str, name: &str) -> Option<String> {
        let (owner, method) = self.lookup_method(class, name)?;
        let returns = method.return_type.as_ref()?;
        self.resolve_value_type(&returns.base, &owner.inner_scope())
    }
}

/// Block-scoped variable environment for one function body
pub struct TypeEnv<'a, 'u> {
    index: &'a ClassIndex<'u>,
    /// Namespace-scope variables by qualified name
    globals: HashMap<String, Option<String>>,
    /// Namespace-scope functions by qualified name, with their return class
    functions: HashMap<String, Option<String>>,
    scopes: Vec<HashMap<String, Option<String>>>,
    this_class: Option<String>,
    scope_path: Vec<String>,
}

impl<'a, 'u> TypeEnv<'a, 'u> {
    pub fn new(index: &'a ClassIndex<'u>, unit: &CompilationUnit) -> Self {
        let mut env = Self {
            index,
            globals: HashMap::new(),
            functions: HashMap::new(),
            scopes: Vec::new(),
            this_class: None,
            scope_path: Vec::new(),
        };
        for tu in unit.units() {
            for (qualified, var) in tu.globals() {
                let scope: Vec<String> = qualified.split("::").map(str::to_string).collect();
                let class = index.resolve_value_type(&var.ty.base, &scope[..scope.len() - 1]);
                env.globals.entry(qualified).or_insert(class);
            }
            for function in tu.functions().into_iter().filter(|f| f.record.is_none()) {
                let class = function
                    .return_type
                    .as_ref()
                    .and_then(|ty| index.resolve_value_type(&ty.base, &function.scope));
                env.functions.entry(function.qualified_name.clone()).or_insert(class);
            }
        }
        env
    }

    /// Reset for a new function: parameters in scope, `this` bound for methods
    pub fn enter_function(&mut self, function: &FunctionDecl) {
        self.scopes.clear();
        self.this_class = function
            .record
            .as_deref()
            .and_then(|record| self.index.resolve_type_name(record, &function.scope));
        self.scope_path = match self.this_class.as_deref().and_then(|c| self.index.get(c)) {
            Some(record) => record.inner_scope(),
            None => function.scope.clone(),
        };

        self.push_scope();
        for param in &function.params {
            self.declare(&param.name, &param.ty, None);
        }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    pub fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    /// Bind a local. `auto` takes the class of its initializer.
    pub fn declare(&mut self, name: &str, ty: &TypeRef, init_class: Option<String>) {
        let class = if ty.is_auto() {
            init_class
        } else {
            self.index.resolve_value_type(&ty.base, &self.scope_path)
        };
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), class);
        }
    }

    fn lookup(&self, name: &str) -> Option<String> {
        if !name.contains("::") {
            for scope in self.scopes.iter().rev() {
                if let Some(class) = scope.get(name) {
                    return class.clone();
                }
            }
            // Implicit member access inside a method
            if let Some(class) = self.this_class.as_deref() {
                if let Some((owner, field)) = self.index.lookup_field(class, name) {
                    return self.index.class_of_field(owner, field);
                }
            }
        }

        self.lookup_namespace(&self.globals, name).cloned().flatten()
    }

    /// Innermost enclosing namespace first
    fn lookup_namespace<'m>(
        &self,
        map: &'m HashMap<String, Option<String>>,
        name: &str,
    ) -> Option<&'m Option<String>> {
        let name = name.trim_start_matches("::");
        (0..=self.scope_path.len()).rev().find_map(|depth| {
            let candidate = if depth == 0 {
                name.to_string()
            } else {
                format!("{}::{}", self.scope_path[..depth].join("::"), name)
            };
            map.get(&candidate)
        })
    }

    /// Record class produced by calling `callee`: a method, a free
    /// function, a constructor or `std::move`
    fn class_of_call(&self, tree: &SyntaxTree, callee: NodeId, args: &[NodeId]) -> Option<String> {
        match tree.node(callee) {
            Node::Expr(ExprKind::Paren(inner)) => self.class_of_call(tree, *inner, args),
            Node::Expr(ExprKind::Member { base, field, .. }) => {
                let class = self.class_of(tree, *base)?;
                self.index.method_return_class(&class, field)
            }
            Node::Expr(ExprKind::Identifier(name)) => {
                if matches!(name.as_str(), "std::move" | "std::forward" | "move" | "forward") {
                    return args.first().and_then(|arg| self.class_of(tree, *arg));
                }
                if !name.contains("::") {
                    if let Some(class) = self.this_class.as_deref() {
                        if self.index.lookup_method(class, name).is_some() {
                            return self.index.method_return_class(class, name);
                        }
                    }
                }
                if let Some(class) = self.lookup_namespace(&self.functions, name) {
                    return class.clone();
                }
                self.index.resolve_type_name(name, &self.scope_path)
            }
            _ => None,
        }
    }

    /// Record class of the elements a range-for iterates over
    pub fn element_class_of(&self, tree: &SyntaxTree, range: NodeId) -> Option<String> {
        match tree.node(range) {
            Node::Group(items) => items.first().and_then(|item| self.class_of(tree, *item)),
            _ => self.class_of(tree, range),
        }
    }

    /// Static record class of an expression, when it can be derived
    pub fn class_of(&self, tree: &SyntaxTree, id: NodeId) -> Option<String> {
        match tree.node(id) {
            Node::Expr(expr) => match expr {
                ExprKind::Identifier(name) => self.lookup(name),
                ExprKind::This => self.this_class.clone(),
                ExprKind::Paren(inner) => self.class_of(tree, *inner),
                ExprKind::Member { base, field, .. } => {
                    let class = self.class_of(tree, *base)?;
                    let (owner, decl) = self.index.lookup_field(&class, field)?;
                    self.index.class_of_field(owner, decl)
                }
                ExprKind::Subscript { base, .. } => self.class_of(tree, *base),
                ExprKind::Unary {
                    op: UnaryOp::Deref,
                    operand,
                } => self.class_of(tree, *operand),
                ExprKind::Call { callee, args } => self.class_of_call(tree, *callee, args),
                ExprKind::Conditional {
                    consequence,
                    alternative,
                    ..
                } => consequence
                    .and_then(|branch| self.class_of(tree, branch))
                    .or_else(|| self.class_of(tree, *alternative)),
                ExprKind::Comma { rhs, .. } => self.class_of(tree, *rhs),
                ExprKind::Assign { .. }
                | ExprKind::Binary { .. }
                | ExprKind::Update { .. }
                | ExprKind::Unary { .. }
                | ExprKind::Lambda { .. }
                | ExprKind::Other(_) => None,
            },
            Node::Stmt(_) | Node::Group(_) => None,
        }
    }

    /// Qualified name of the field a member expression accesses
    pub fn resolve_member(&self, tree: &SyntaxTree, id: NodeId) -> Option<String> {
        let Node::Expr(ExprKind::Member { base, field, .. }) = tree.node(id) else {
            return None;
        };
        let class = self.class_of(tree, *base)?;
        let (_, decl) = self.index.lookup_field(&class, field)?;
        Some(decl.qualified_name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::CppParser;

    fn compile(source: &str) -> CompilationUnit {
        let mut parser = CppParser::new().unwrap();
        CompilationUnit::new(parser.parse("main.cpp", source).unwrap())
    }

    #[test]
    fn test_resolve_type_name_by_scope() {
        let unit = compile(
            r#"
struct Foo { int a; };
namespace ns {
struct Foo { int b; };
namespace inner { struct Bar { int c; }; }
}
"#,
        );
        let index = ClassIndex::build(&unit);
        assert_eq!(index.len(), 3);

        let ns = vec!["ns".to_string()];
        assert_eq!(index.resolve_type_name("Foo", &ns).as_deref(), Some("ns::Foo"));
        assert_eq!(index.resolve_type_name("Foo", &[]).as_deref(), Some("Foo"));
        assert_eq!(index.resolve_type_name("::Foo", &ns).as_deref(), Some("Foo"));
        assert_eq!(index.resolve_type_name("const struct Foo", &[]).as_deref(), Some("Foo"));
        // unique trailing-name match
        assert_eq!(index.resolve_type_name("Bar", &[]).as_deref(), Some("ns::inner::Bar"));
        assert_eq!(index.resolve_type_name("int", &[]), None);
    }

    #[test]
    fn test_lookup_field_through_bases() {
        let unit = compile(
            r#"
struct Base { int id; };
struct Mid : Base { int mid; };
struct Leaf : public Mid { int leaf; };
"#,
        );
        let index = ClassIndex::build(&unit);
        let (owner, field) = index.lookup_field("Leaf", "id").expect("inherited field");
        assert_eq!(owner.qualified_name, "Base");
        assert_eq!(field.qualified_name, "Base::id");
        assert!(index.lookup_field("Leaf", "missing").is_none());
    }

    #[test]
    fn test_class_of_members_and_pointers() {
        let unit = compile(
            r#"
struct Inner { int v; };
struct Outer { Inner in; Inner *items; };
Outer global;
void f(Outer *p) {
    auto &alias = global;
    p->in.v = 1;
    alias.items[0].v = 2;
}
"#,
        );
        let index = ClassIndex::build(&unit);
        let mut env = TypeEnv::new(&index, &unit);
        let function = unit.primary.functions()[0];
        env.enter_function(function);
        env.push_scope();
        let global_class = env.lookup("global");
        assert_eq!(global_class.as_deref(), Some("Outer"));
        env.declare("alias", &TypeRef::named("auto"), global_class);

        let tree = &unit.primary.tree;
        let resolved: Vec<String> = tree.ids().filter_map(|id| env.resolve_member(tree, id)).collect();
        assert_eq!(
            resolved,
            vec!["Outer::in", "Inner::v", "Outer::items", "Inner::v"]
        );
    }
}
