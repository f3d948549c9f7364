//! Lowering from tree-sitter-cpp concrete syntax into `ast` types.
//!
//! Lowering never fails: constructs the rewrite engine does not model are
//! kept as `Other`/`Group` nodes so that spans and nesting stay intact.

use tree_sitter::Node as TsNode;

use crate::ast::{
    AssignOp, CompoundOp, Decl, ExprKind, FieldDecl, Fixity, FunctionDecl, LoopKind, MemberDecl, MemberKind, Node,
    RecordDecl, RecordKind, RefKind, Span, StmtKind, SyntaxTree, TypeRef, UnaryOp, UpdateOp, VarDecl,
};
use crate::ast::NodeId;

pub(super) struct Lowering<'s> {
    source: &'s str,
    tree: SyntaxTree,
    includes: Vec<String>,
}

/// Name and type carried by one declarator
struct Declared<'t> {
    name: Option<String>,
    ty: TypeRef,
    value: Option<TsNode<'t>>,
}

impl<'s> Lowering<'s> {
    pub(super) fn new(source: &'s str) -> Self {
        Self {
            source,
            tree: SyntaxTree::new(),
            includes: Vec::new(),
        }
    }

    pub(super) fn finish(mut self) -> (SyntaxTree, Vec<String>) {
        self.tree.link_parents();
        (self.tree, self.includes)
    }

    fn text(&self, node: TsNode) -> &'s str {
        &self.source[node.byte_range()]
    }

    fn span(node: TsNode) -> Span {
        Span::new(node.start_byte(), node.end_byte())
    }

    fn named_children<'t>(node: TsNode<'t>) -> Vec<TsNode<'t>> {
        let mut cursor = node.walk();
        let children = node
            .named_children(&mut cursor)
            .filter(|child| child.kind() != "comment")
            .collect();
        children
    }

    // ---- declarations -------------------------------------------------

    pub(super) fn lower_translation_unit(&mut self, root: TsNode) -> Vec<Decl> {
        let mut decls = Vec::new();
        self.convert_decl_items(root, &[], &mut decls);
        decls
    }

    fn convert_decl_items(&mut self, node: TsNode, scope: &[String], out: &mut Vec<Decl>) {
        for child in Self::named_children(node) {
            self.convert_decl_item(child, scope, out);
        }
    }

    fn convert_decl_item(&mut self, node: TsNode, scope: &[String], out: &mut Vec<Decl>) {
        match node.kind() {
            "namespace_definition" => self.convert_namespace(node, scope, out),

            "class_specifier" | "struct_specifier" | "union_specifier" => {
                if let Some(record) = self.convert_record(node, scope, None) {
                    out.push(Decl::Record(record));
                }
            }

            "function_definition" => {
                if let Some(function) = self.convert_function(node, scope, None) {
                    out.push(Decl::Function(function));
                }
            }

            "declaration" | "type_definition" => self.convert_declaration(node, scope, out),

            "template_declaration"
            | "linkage_specification"
            | "declaration_list"
            | "preproc_ifdef"
            | "preproc_if"
            | "preproc_else"
            | "preproc_elif"
            | "preproc_elifdef" => self.convert_decl_items(node, scope, out),

            "preproc_include" => {
                if let Some(path) = node.child_by_field_name("path") {
                    if path.kind() == "string_literal" {
                        let quoted = self.text(path);
                        self.includes.push(quoted.trim_matches('"').to_string());
                    }
                }
            }

            _ => {}
        }
    }

    fn convert_namespace(&mut self, node: TsNode, scope: &[String], out: &mut Vec<Decl>) {
        let segments: Vec<String> = node
            .child_by_field_name("name")
            .map(|name| {
                self.text(name)
                    .split("::")
                    .map(|s| s.trim().trim_start_matches("inline").trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let mut inner_scope = scope.to_vec();
        inner_scope.extend(segments.iter().cloned());

        let mut decls = Vec::new();
        if let Some(body) = node.child_by_field_name("body") {
            self.convert_decl_items(body, &inner_scope, &mut decls);
        }

        if segments.is_empty() {
            out.push(Decl::Namespace { name: None, decls });
            return;
        }
        // `namespace a::b { }` nests one namespace per segment
        let nested = segments.into_iter().rev().fold(decls, |inner, name| {
            vec![Decl::Namespace {
                name: Some(name),
                decls: inner,
            }]
        });
        out.extend(nested);
    }

    /// Namespace-scope `declaration` or `typedef`: records in the type
    /// position, function prototypes and global variables
    fn convert_declaration(&mut self, node: TsNode, scope: &[String], out: &mut Vec<Decl>) {
        let is_typedef = node.kind() == "type_definition";
        let declarators: Vec<TsNode> = {
            let mut cursor = node.walk();
            node.children_by_field_name("declarator", &mut cursor).collect()
        };

        if let Some(ty) = node.child_by_field_name("type") {
            if is_record_specifier(ty) {
                let typedef_name = if is_typedef {
                    declarators.first().and_then(|d| self.declarator_name(*d))
                } else {
                    None
                };
                if let Some(record) = self.convert_record(ty, scope, typedef_name) {
                    out.push(Decl::Record(record));
                }
            }
        }
        if is_typedef {
            return;
        }

        for declarator in declarators {
            if let Some(function) = function_declarator(declarator) {
                if let Some(decl) = self.convert_prototype(node, declarator, function, scope) {
                    out.push(Decl::Function(decl));
                }
                continue;
            }
            let declared = self.convert_declarator(node, Some(declarator));
            if let Some(name) = declared.name {
                let init = declared.value.map(|value| self.lower(value));
                out.push(Decl::Variable {
                    scope: scope.to_vec(),
                    var: VarDecl {
                        name,
                        ty: declared.ty,
                        init,
                        span: Self::span(declarator),
                    },
                });
            }
        }
    }

    fn convert_record(&mut self, node: TsNode, scope: &[String], name_hint: Option<String>) -> Option<RecordDecl> {
        let body = node.child_by_field_name("body")?;
        let name = node
            .child_by_field_name("name")
            .map(|n| crate::ast::types::lookup_name(self.text(n)))
            .or(name_hint)?;

        let kind = match node.kind() {
            "class_specifier" => RecordKind::Class,
            "union_specifier" => RecordKind::Union,
            _ => RecordKind::Struct,
        };

        let mut qualified = scope.to_vec();
        qualified.push(name.clone());

        let mut record = RecordDecl {
            kind,
            name,
            qualified_name: qualified.join("::"),
            scope: scope.to_vec(),
            bases: self.convert_bases(node),
            fields: Vec::new(),
            methods: Vec::new(),
            other_members: Vec::new(),
            decls: Vec::new(),
            span: Self::span(node),
            close_brace: body.end_byte().saturating_sub(1),
        };

        let mut cursor = body.walk();
        if let Some(close) = body.children(&mut cursor).filter(|c| c.kind() == "}").last() {
            record.close_brace = close.start_byte();
        }

        self.convert_members(body, &mut record);
        Some(record)
    }

    fn convert_bases(&self, node: TsNode) -> Vec<String> {
        let mut cursor = node.walk();
        let Some(clause) = node.children(&mut cursor).find(|c| c.kind() == "base_class_clause") else {
            return Vec::new();
        };
        Self::named_children(clause)
            .into_iter()
            .filter(|c| !matches!(c.kind(), "access_specifier" | "virtual"))
            .map(|c| self.text(c).to_string())
            .collect()
    }

    fn convert_members(&mut self, list: TsNode, record: &mut RecordDecl) {
        for member in Self::named_children(list) {
            match member.kind() {
                "field_declaration" => self.convert_field_declaration(member, record),

                "function_definition" => {
                    let inner_scope = record.inner_scope();
                    let qualified = record.qualified_name.clone();
                    if let Some(function) = self.convert_function(member, &inner_scope, Some(qualified)) {
                        record.methods.push(MemberDecl {
                            kind: member_kind(&function.name, &record.name),
                            name: function.name.clone(),
                            user_provided: self.is_user_provided(member),
                            return_type: function.return_type.clone(),
                            span: Self::span(member),
                        });
                        record.decls.push(Decl::Function(function));
                    }
                }

                // Constructor and destructor prototypes, defaulted members
                "declaration" => {
                    let mut cursor = member.walk();
                    let declarators: Vec<TsNode> =
                        member.children_by_field_name("declarator", &mut cursor).collect();
                    for declarator in declarators {
                        let Some(name) = self.declarator_name(declarator) else {
                            continue;
                        };
                        if function_declarator(declarator).is_some() {
                            record.methods.push(MemberDecl {
                                kind: member_kind(&name, &record.name),
                                name,
                                user_provided: self.is_user_provided(member),
                                return_type: self.return_type(member, declarator),
                                span: Self::span(member),
                            });
                        } else {
                            record.other_members.push(name);
                        }
                    }
                }

                "template_declaration" | "preproc_ifdef" | "preproc_if" | "preproc_else" | "preproc_elif" => {
                    self.convert_members(member, record)
                }

                "type_definition" => {
                    let mut cursor = member.walk();
                    let names: Vec<String> = member
                        .children_by_field_name("declarator", &mut cursor)
                        .filter_map(|d| self.declarator_name(d))
                        .collect();
                    record.other_members.extend(names);
                }

                "alias_declaration" => {
                    if let Some(name) = member.child_by_field_name("name") {
                        record.other_members.push(self.text(name).to_string());
                    }
                }

                _ => {}
            }
        }
    }

    fn convert_field_declaration(&mut self, member: TsNode, record: &mut RecordDecl) {
        if let Some(ty) = member.child_by_field_name("type") {
            if is_record_specifier(ty) {
                let inner_scope = record.inner_scope();
                if let Some(nested) = self.convert_record(ty, &inner_scope, None) {
                    record.other_members.push(nested.name.clone());
                    record.decls.push(Decl::Record(nested));
                }
            } else if ty.kind() == "enum_specifier" {
                if let Some(name) = ty.child_by_field_name("name") {
                    record.other_members.push(self.text(name).to_string());
                }
            }
        }

        let is_static = has_storage_class(member, self.source, "static");
        let mut cursor = member.walk();
        let declarators: Vec<TsNode> = member.children_by_field_name("declarator", &mut cursor).collect();
        for declarator in declarators {
            if function_declarator(declarator).is_some() {
                if let Some(name) = self.declarator_name(declarator) {
                    record.methods.push(MemberDecl {
                        kind: member_kind(&name, &record.name),
                        name,
                        user_provided: self.is_user_provided(member),
                        return_type: self.return_type(member, declarator),
                        span: Self::span(member),
                    });
                }
                continue;
            }

            let declared = self.convert_declarator(member, Some(declarator));
            let Some(name) = declared.name else { continue };
            if is_static {
                record.other_members.push(name);
                continue;
            }
            record.fields.push(FieldDecl {
                qualified_name: format!("{}::{}", record.qualified_name, name),
                name,
                ty: declared.ty,
                span: Self::span(member),
            });
        }
    }

    fn is_user_provided(&self, member: TsNode) -> bool {
        let mut cursor = member.walk();
        let has_clause = member
            .children(&mut cursor)
            .any(|c| matches!(c.kind(), "default_method_clause" | "delete_method_clause"));
        let text = self.text(member).trim_end().trim_end_matches(';').trim_end();
        !(has_clause || text.ends_with("= default") || text.ends_with("= delete"))
    }

    fn convert_function(&mut self, node: TsNode, scope: &[String], record: Option<String>) -> Option<FunctionDecl> {
        let declarator = node.child_by_field_name("declarator")?;
        let function = function_declarator(declarator)?;
        let mut decl = self.convert_prototype(node, declarator, function, scope)?;
        decl.span = Self::span(node);
        if record.is_some() {
            decl.record = record;
        }
        decl.body = node.child_by_field_name("body").map(|body| self.lower(body));
        Some(decl)
    }

    /// Name, parameters, return type and owning record of a function
    /// declarator
    fn convert_prototype(
        &mut self,
        node: TsNode,
        declarator: TsNode,
        function: TsNode,
        scope: &[String],
    ) -> Option<FunctionDecl> {
        let written = self.declarator_name(function)?;
        let (record, name) = match written.rsplit_once("::") {
            Some((owner, name)) => (Some(owner.to_string()), name.to_string()),
            None => (None, written.clone()),
        };

        let mut qualified = scope.to_vec();
        qualified.push(written);

        let params = function
            .child_by_field_name("parameters")
            .map(|list| self.convert_parameters(list))
            .unwrap_or_default();

        Some(FunctionDecl {
            name,
            qualified_name: qualified.join("::"),
            scope: scope.to_vec(),
            record,
            params,
            return_type: self.return_type(node, declarator),
            body: None,
            span: Self::span(node),
        })
    }

    /// Specifier plus declarator parts in front of the function name;
    /// `None` when the declaration has no type (constructors, destructors)
    fn return_type(&self, node: TsNode, declarator: TsNode) -> Option<TypeRef> {
        let ty = self.convert_declarator(node, Some(declarator)).ty;
        (!ty.base.is_empty()).then_some(ty)
    }

    fn convert_parameters(&mut self, list: TsNode) -> Vec<VarDecl> {
        let mut params = Vec::new();
        for param in Self::named_children(list) {
            if !matches!(param.kind(), "parameter_declaration" | "optional_parameter_declaration") {
                continue;
            }
            let declarator = param.child_by_field_name("declarator");
            let declared = self.convert_declarator(param, declarator);
            let Some(name) = declared.name else { continue };
            let init = param.child_by_field_name("default_value").map(|value| self.lower(value));
            params.push(VarDecl {
                name,
                ty: declared.ty,
                init,
                span: Self::span(param),
            });
        }
        params
    }

    /// Unqualified or qualified name introduced by a declarator
    fn declarator_name(&self, node: TsNode) -> Option<String> {
        match node.kind() {
            "identifier" | "field_identifier" | "type_identifier" | "destructor_name" | "operator_name"
            | "qualified_identifier" => Some(self.text(node).to_string()),
            "template_function" => node.child_by_field_name("name").map(|n| self.text(n).to_string()),
            _ => {
                let inner = node
                    .child_by_field_name("declarator")
                    .or_else(|| Self::named_children(node).into_iter().next())?;
                self.declarator_name(inner)
            }
        }
    }

    /// Combine the specifier of `decl` with the parts contributed by one of
    /// its declarators
    fn convert_declarator<'t>(&self, decl: TsNode<'t>, declarator: Option<TsNode<'t>>) -> Declared<'t> {
        let mut ty = TypeRef::default();
        if let Some(spec) = decl.child_by_field_name("type") {
            ty.base = if is_record_specifier(spec) {
                spec.child_by_field_name("name")
                    .map(|n| self.text(n).to_string())
                    .unwrap_or_default()
            } else {
                self.text(spec).to_string()
            };
        }
        for child in Self::named_children(decl) {
            if child.kind() == "type_qualifier" {
                match self.text(child) {
                    "const" | "constexpr" => ty.is_const = true,
                    "volatile" => ty.is_volatile = true,
                    _ => {}
                }
            }
        }

        let mut declared = Declared {
            name: None,
            ty,
            value: decl.child_by_field_name("value"),
        };

        let mut current = declarator;
        while let Some(node) = current {
            current = match node.kind() {
                "init_declarator" => {
                    declared.value = node.child_by_field_name("value");
                    node.child_by_field_name("declarator")
                }
                "pointer_declarator" => {
                    let const_pointer = Self::named_children(node)
                        .iter()
                        .any(|c| c.kind() == "type_qualifier" && self.text(*c) == "const");
                    declared.ty.pointers.push(const_pointer);
                    node.child_by_field_name("declarator")
                }
                "reference_declarator" => {
                    let rvalue = self.text(node).trim_start().starts_with("&&");
                    declared.ty.reference = Some(if rvalue { RefKind::Rvalue } else { RefKind::Lvalue });
                    Self::named_children(node).into_iter().next()
                }
                "array_declarator" => {
                    declared.ty.array = true;
                    node.child_by_field_name("declarator")
                }
                "parenthesized_declarator" | "attributed_declarator" => {
                    Self::named_children(node).into_iter().next()
                }
                "function_declarator" => None,
                _ => {
                    declared.name = self.declarator_name(node);
                    None
                }
            };
        }
        declared
    }

    // ---- statements and expressions -----------------------------------

    fn alloc(&mut self, node: TsNode, lowered: Node) -> NodeId {
        self.tree.alloc(Self::span(node), lowered)
    }

    fn lower_children(&mut self, node: TsNode) -> Vec<NodeId> {
        Self::named_children(node)
            .into_iter()
            .map(|child| self.lower(child))
            .collect()
    }

    fn lower_field(&mut self, node: TsNode, field: &str) -> Option<NodeId> {
        node.child_by_field_name(field).map(|child| self.lower(child))
    }

    /// Lower a field that must exist; a missing node (error recovery)
    /// becomes an empty group at the parent's end
    fn lower_required(&mut self, node: TsNode, field: &str) -> NodeId {
        match node.child_by_field_name(field) {
            Some(child) => self.lower(child),
            None => self
                .tree
                .alloc(Span::new(node.end_byte(), node.end_byte()), Node::Group(Vec::new())),
        }
    }

    pub(super) fn lower(&mut self, node: TsNode) -> NodeId {
        match node.kind() {
            "compound_statement" => {
                let children = self.lower_children(node);
                self.alloc(node, Node::Stmt(StmtKind::Compound(children)))
            }
            "expression_statement" => {
                let expr = Self::named_children(node).into_iter().next().map(|e| self.lower(e));
                self.alloc(node, Node::Stmt(StmtKind::Expr(expr)))
            }
            "declaration" => self.convert_local_declaration(node),
            "return_statement" => {
                let value = Self::named_children(node).into_iter().next().map(|e| self.lower(e));
                self.alloc(node, Node::Stmt(StmtKind::Return(value)))
            }
            "throw_statement" => {
                let value = Self::named_children(node).into_iter().next().map(|e| self.lower(e));
                self.alloc(node, Node::Stmt(StmtKind::Throw(value)))
            }
            "if_statement" => self.convert_if_statement(node),
            "switch_statement" => {
                let condition = self.lower_required(node, "condition");
                let body = self.lower_required(node, "body");
                self.alloc(node, Node::Stmt(StmtKind::Switch { condition, body }))
            }
            "case_statement" => self.convert_case_statement(node),
            "while_statement" | "do_statement" | "for_statement" | "for_range_loop" => {
                self.convert_loop(node)
            }
            "else_clause" => match Self::named_children(node).into_iter().next() {
                Some(inner) => self.lower(inner),
                None => self.alloc(node, Node::Group(Vec::new())),
            },

            "field_expression" => self.convert_field_expression(node),
            "assignment_expression" => self.convert_assignment(node),
            "binary_expression" => {
                let lhs = self.lower_required(node, "left");
                let rhs = self.lower_required(node, "right");
                let op = node
                    .child_by_field_name("operator")
                    .map(|o| self.text(o).to_string())
                    .unwrap_or_default();
                self.alloc(node, Node::Expr(ExprKind::Binary { op, lhs, rhs }))
            }
            "conditional_expression" => {
                let condition = self.lower_required(node, "condition");
                let consequence = self.lower_field(node, "consequence");
                let alternative = self.lower_required(node, "alternative");
                self.alloc(
                    node,
                    Node::Expr(ExprKind::Conditional {
                        condition,
                        consequence,
                        alternative,
                    }),
                )
            }
            "comma_expression" => {
                let lhs = self.lower_required(node, "left");
                let rhs = self.lower_required(node, "right");
                self.alloc(node, Node::Expr(ExprKind::Comma { lhs, rhs }))
            }
            "compound_literal_expression" => self.convert_compound_literal(node),
            "update_expression" => self.convert_update(node),
            "unary_expression" | "pointer_expression" => self.convert_unary(node),
            "parenthesized_expression" => match Self::named_children(node).into_iter().next() {
                Some(inner) => {
                    let inner = self.lower(inner);
                    self.alloc(node, Node::Expr(ExprKind::Paren(inner)))
                }
                None => self.alloc(node, Node::Expr(ExprKind::Other(Vec::new()))),
            },
            "call_expression" => {
                let callee = self.lower_required(node, "function");
                let args = match node.child_by_field_name("arguments") {
                    Some(list) => self.lower_children(list),
                    None => Vec::new(),
                };
                self.alloc(node, Node::Expr(ExprKind::Call { callee, args }))
            }
            "subscript_expression" => self.convert_subscript(node),
            "lambda_expression" => self.convert_lambda(node),
            "identifier" | "qualified_identifier" => {
                let name = self.text(node).to_string();
                self.alloc(node, Node::Expr(ExprKind::Identifier(name)))
            }
            "this" => self.alloc(node, Node::Expr(ExprKind::This)),

            "string_literal" | "raw_string_literal" | "concatenated_string" | "char_literal" | "number_literal"
            | "true" | "false" | "null" | "nullptr" | "user_defined_literal" => {
                self.alloc(node, Node::Expr(ExprKind::Other(Vec::new())))
            }

            "break_statement" | "continue_statement" | "goto_statement" | "type_definition"
            | "alias_declaration" | "using_declaration" | "static_assert_declaration" => {
                self.alloc(node, Node::Stmt(StmtKind::Other(Vec::new())))
            }

            kind if kind.ends_with("_expression") => {
                let children = self.lower_children(node);
                self.alloc(node, Node::Expr(ExprKind::Other(children)))
            }
            kind if kind.ends_with("_statement") => {
                let children = self.lower_children(node);
                self.alloc(node, Node::Stmt(StmtKind::Other(children)))
            }
            _ => {
                let children = self.lower_children(node);
                self.alloc(node, Node::Group(children))
            }
        }
    }

    fn convert_local_declaration(&mut self, node: TsNode) -> NodeId {
        let mut cursor = node.walk();
        let declarators: Vec<TsNode> = node.children_by_field_name("declarator", &mut cursor).collect();

        let mut vars = Vec::new();
        if declarators.is_empty() {
            // Condition declarations keep their initializer on the node
            let declared = self.convert_declarator(node, None);
            if let Some(value) = declared.value {
                let init = self.lower(value);
                vars.push(VarDecl {
                    name: declared.name.unwrap_or_default(),
                    ty: declared.ty,
                    init: Some(init),
                    span: Self::span(node),
                });
            }
        }
        for declarator in declarators {
            if function_declarator(declarator).is_some() {
                continue;
            }
            let declared = self.convert_declarator(node, Some(declarator));
            let Some(name) = declared.name else { continue };
            let init = declared.value.map(|value| self.lower(value));
            vars.push(VarDecl {
                name,
                ty: declared.ty,
                init,
                span: Self::span(declarator),
            });
        }
        self.alloc(node, Node::Stmt(StmtKind::Decl(vars)))
    }

    fn convert_if_statement(&mut self, node: TsNode) -> NodeId {
        let condition = self.lower_required(node, "condition");
        let then_branch = self.lower_required(node, "consequence");
        let else_branch = self.lower_field(node, "alternative");
        self.alloc(
            node,
            Node::Stmt(StmtKind::If {
                condition,
                then_branch,
                else_branch,
            }),
        )
    }

    fn convert_case_statement(&mut self, node: TsNode) -> NodeId {
        let value_node = node.child_by_field_name("value");
        let value = value_node.map(|v| self.lower(v));
        let body = Self::named_children(node)
            .into_iter()
            .filter(|child| Some(child.id()) != value_node.map(|v| v.id()))
            .map(|child| self.lower(child))
            .collect();
        self.alloc(node, Node::Stmt(StmtKind::Case { value, body }))
    }

    fn convert_loop(&mut self, node: TsNode) -> NodeId {
        let kind = match node.kind() {
            "while_statement" => LoopKind::While,
            "do_statement" => LoopKind::DoWhile,
            "for_range_loop" => LoopKind::RangeFor,
            _ => LoopKind::For,
        };

        let (init, condition, update, element, range) = match kind {
            LoopKind::RangeFor => {
                let init = self.lower_field(node, "initializer");
                let declared = self.convert_declarator(node, node.child_by_field_name("declarator"));
                let element = declared.name.map(|name| VarDecl {
                    name,
                    ty: declared.ty,
                    init: None,
                    span: Self::span(node),
                });
                let range = self.lower_field(node, "right");
                (init, None, None, element, range)
            }
            LoopKind::For => {
                let init = self.lower_field(node, "initializer");
                let condition = self.lower_field(node, "condition");
                let update = self.lower_field(node, "update");
                (init, condition, update, None, None)
            }
            LoopKind::While | LoopKind::DoWhile => {
                let condition = self.lower_field(node, "condition");
                (None, condition, None, None, None)
            }
        };
        let body = self.lower_required(node, "body");

        self.alloc(
            node,
            Node::Stmt(StmtKind::Loop {
                kind,
                init,
                condition,
                update,
                element,
                range,
                body,
            }),
        )
    }

    fn convert_field_expression(&mut self, node: TsNode) -> NodeId {
        let (Some(argument), Some(field)) = (node.child_by_field_name("argument"), node.child_by_field_name("field"))
        else {
            let children = self.lower_children(node);
            return self.alloc(node, Node::Expr(ExprKind::Other(children)));
        };
        let arrow = self.source[argument.end_byte()..field.start_byte()].contains("->");
        let base = self.lower(argument);
        let field = self.text(field).to_string();
        self.alloc(node, Node::Expr(ExprKind::Member { base, arrow, field }))
    }

    fn convert_assignment(&mut self, node: TsNode) -> NodeId {
        let lhs = self.lower_required(node, "left");
        let rhs = self.lower_required(node, "right");
        let token = node
            .child_by_field_name("operator")
            .map(|o| self.text(o))
            .unwrap_or("=");
        let op = match CompoundOp::from_assign_token(token) {
            Some(compound) => AssignOp::Compound(compound),
            None => AssignOp::Plain,
        };
        self.alloc(node, Node::Expr(ExprKind::Assign { op, lhs, rhs }))
    }

    fn convert_update(&mut self, node: TsNode) -> NodeId {
        let (Some(operator), Some(argument)) =
            (node.child_by_field_name("operator"), node.child_by_field_name("argument"))
        else {
            let children = self.lower_children(node);
            return self.alloc(node, Node::Expr(ExprKind::Other(children)));
        };
        let op = if self.text(operator) == "--" {
            UpdateOp::Decrement
        } else {
            UpdateOp::Increment
        };
        let fixity = if operator.start_byte() < argument.start_byte() {
            Fixity::Prefix
        } else {
            Fixity::Postfix
        };
        let operand = self.lower(argument);
        self.alloc(node, Node::Expr(ExprKind::Update { op, fixity, operand }))
    }

    fn convert_unary(&mut self, node: TsNode) -> NodeId {
        let op = node
            .child_by_field_name("operator")
            .and_then(|o| UnaryOp::from_token(self.text(o)));
        match (op, node.child_by_field_name("argument")) {
            (Some(op), Some(argument)) => {
                let operand = self.lower(argument);
                self.alloc(node, Node::Expr(ExprKind::Unary { op, operand }))
            }
            _ => {
                let children = self.lower_children(node);
                self.alloc(node, Node::Expr(ExprKind::Other(children)))
            }
        }
    }

    fn convert_subscript(&mut self, node: TsNode) -> NodeId {
        let Some(argument) = node.child_by_field_name("argument") else {
            let children = self.lower_children(node);
            return self.alloc(node, Node::Expr(ExprKind::Other(children)));
        };
        let base = self.lower(argument);
        let mut index = Vec::new();
        for child in Self::named_children(node) {
            if child.id() == argument.id() {
                continue;
            }
            if child.kind() == "subscript_argument_list" {
                index.extend(self.lower_children(child));
            } else {
                index.push(self.lower(child));
            }
        }
        self.alloc(node, Node::Expr(ExprKind::Subscript { base, index }))
    }

    /// `Foo{...}` is modelled as a call of the type name
    fn convert_compound_literal(&mut self, node: TsNode) -> NodeId {
        let Some(ty) = node.child_by_field_name("type") else {
            let children = self.lower_children(node);
            return self.alloc(node, Node::Expr(ExprKind::Other(children)));
        };
        let name = self.text(ty).to_string();
        let callee = self.alloc(ty, Node::Expr(ExprKind::Identifier(name)));
        let args = match node.child_by_field_name("value") {
            Some(list) => self.lower_children(list),
            None => Vec::new(),
        };
        self.alloc(node, Node::Expr(ExprKind::Call { callee, args }))
    }

    fn convert_lambda(&mut self, node: TsNode) -> NodeId {
        let params = node
            .child_by_field_name("declarator")
            .and_then(|d| d.child_by_field_name("parameters"))
            .map(|list| self.convert_parameters(list))
            .unwrap_or_default();
        let body = self.lower_field(node, "body");
        self.alloc(node, Node::Expr(ExprKind::Lambda { params, body }))
    }
}

fn is_record_specifier(node: TsNode) -> bool {
    matches!(node.kind(), "class_specifier" | "struct_specifier" | "union_specifier")
        && node.child_by_field_name("body").is_some()
}

fn has_storage_class(node: TsNode, source: &str, class: &str) -> bool {
    let mut cursor = node.walk();
    let found = node
        .children(&mut cursor)
        .any(|c| c.kind() == "storage_class_specifier" && &source[c.byte_range()] == class);
    found
}

/// The function declarator inside `node`, unless it declares a pointer or
/// reference to function
fn function_declarator(node: TsNode) -> Option<TsNode> {
    let mut current = node;
    loop {
        match current.kind() {
            "function_declarator" => {
                let inner = current.child_by_field_name("declarator")?;
                return (inner.kind() != "parenthesized_declarator").then_some(current);
            }
            // Functions returning pointers or references
            "pointer_declarator" => current = current.child_by_field_name("declarator")?,
            "reference_declarator" | "attributed_declarator" => {
                let mut cursor = current.walk();
                let inner = current.named_children(&mut cursor).next();
                current = inner?;
            }
            _ => return None,
        }
    }
}

fn member_kind(name: &str, record: &str) -> MemberKind {
    if name.starts_with('~') {
        MemberKind::Destructor
    } else if name.starts_with("operator") {
        MemberKind::Operator
    } else if name == record {
        MemberKind::Constructor
    } else {
        MemberKind::Method
    }
}
