//! Declaration tree: namespaces, records, functions and variables.

use super::{NodeId, Span, TypeRef};

#[derive(Debug, Clone, PartialEq)]
pub enum Decl {
    Namespace {
        name: Option<String>,
        decls: Vec<Decl>,
    },
    Record(RecordDecl),
    Function(FunctionDecl),
    Variable {
        /// Enclosing namespace path
        scope: Vec<String>,
        var: VarDecl,
    },
}

/// A variable, parameter or local declaration
#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub name: String,
    pub ty: TypeRef,
    pub init: Option<NodeId>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Struct,
    Class,
    Union,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordDecl {
    pub kind: RecordKind,
    pub name: String,
    pub qualified_name: String,
    /// Enclosing namespace/record path, outermost first
    pub scope: Vec<String>,
    /// Base classes as written
    pub bases: Vec<String>,
    /// Non-static data members in declaration order
    pub fields: Vec<FieldDecl>,
    /// Member functions in declaration order
    pub methods: Vec<MemberDecl>,
    /// Names of every other member (static data, typedefs, nested types)
    pub other_members: Vec<String>,
    /// Nested records and inline method definitions
    pub decls: Vec<Decl>,
    pub span: Span,
    /// Offset of the closing `}` of the body
    pub close_brace: usize,
}

impl RecordDecl {
    /// Path used to resolve names written inside the record body
    pub fn inner_scope(&self) -> Vec<String> {
        let mut scope = self.scope.clone();
        scope.push(self.name.clone());
        scope
    }

    pub fn has_member(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name == name)
            || self.methods.iter().any(|m| m.name == name)
            || self.other_members.iter().any(|m| m == name)
    }

    /// User-provided methods: not defaulted, not deleted
    pub fn user_methods(&self) -> impl Iterator<Item = &MemberDecl> {
        self.methods.iter().filter(|m| m.user_provided)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub name: String,
    pub qualified_name: String,
    pub ty: TypeRef,
    /// The whole member declaration, including `;`
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    Constructor,
    Destructor,
    Method,
    Operator,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemberDecl {
    pub name: String,
    pub kind: MemberKind,
    pub user_provided: bool,
    /// `None` for constructors, destructors and conversion operators
    pub return_type: Option<TypeRef>,
    /// The whole member declaration or definition
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    /// Unqualified name (`main`, `bump`, `~Foo`)
    pub name: String,
    pub qualified_name: String,
    /// Enclosing namespace path, used for name lookup inside the body
    pub scope: Vec<String>,
    /// Qualified record for inline methods; the written qualifier for
    /// out-of-line definitions (`Foo::bar` gives `Foo`)
    pub record: Option<String>,
    pub params: Vec<VarDecl>,
    pub return_type: Option<TypeRef>,
    pub body: Option<NodeId>,
    pub span: Span,
}

pub(crate) fn collect_records<'a>(decls: &'a [Decl], out: &mut Vec<&'a RecordDecl>) {
    for decl in decls {
        match decl {
            Decl::Namespace { decls, .. } => collect_records(decls, out),
            Decl::Record(record) => {
                out.push(record);
                collect_records(&record.decls, out);
            }
            Decl::Function(_) | Decl::Variable { .. } => {}
        }
    }
}

pub(crate) fn collect_functions<'a>(decls: &'a [Decl], out: &mut Vec<&'a FunctionDecl>) {
    for decl in decls {
        match decl {
            Decl::Namespace { decls, .. } => collect_functions(decls, out),
            Decl::Record(record) => collect_functions(&record.decls, out),
            Decl::Function(function) => out.push(function),
            Decl::Variable { .. } => {}
        }
    }
}

pub(crate) fn collect_globals<'a>(decls: &'a [Decl], out: &mut Vec<(String, &'a VarDecl)>) {
    for decl in decls {
        match decl {
            Decl::Namespace { decls, .. } => collect_globals(decls, out),
            Decl::Variable { scope, var } => {
                let mut qualified = scope.clone();
                qualified.push(var.name.clone());
                out.push((qualified.join("::"), var));
            }
            Decl::Record(_) | Decl::Function(_) => {}
        }
    }
}
