//! Usage Matcher: one traversal over function bodies, queueing rewrites for
//! every usage of a target field.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::ast::{AssignOp, ExprKind, FunctionDecl, Node, NodeId, StmtKind, SyntaxTree, TranslationUnit, UnaryOp};
use crate::diagnostics::Diagnostics;
use crate::rewrite::EditQueue;
use crate::transform::{CompilationUnit, TransformStats};

use super::planner::{Boundary, HoistSide, MatchSite, Operation, Position, RewritePlanner, SiteParts, Strategy};
use super::resolve::{ClassIndex, TypeEnv};
use super::selector::{TargetField, TargetSet};

pub struct UsageMatcher<'a, 'u> {
    unit: &'u TranslationUnit,
    tree: &'u SyntaxTree,
    targets: &'a TargetSet,
    env: TypeEnv<'a, 'u>,
    planner: RewritePlanner,
    diags: &'a mut Diagnostics,
    queue: EditQueue,
    /// Boundary statements already wrapped in a block
    wrapped: HashSet<NodeId>,
    /// Closing braces, queued once the wrapped statement has been visited
    pending_closes: HashMap<NodeId, String>,
    stats: TransformStats,
}

impl<'a, 'u> UsageMatcher<'a, 'u> {
    pub fn new(
        unit: &'u CompilationUnit,
        index: &'a ClassIndex<'u>,
        targets: &'a TargetSet,
        diags: &'a mut Diagnostics,
    ) -> Self {
        Self {
            unit: &unit.primary,
            tree: &unit.primary.tree,
            targets,
            env: TypeEnv::new(index, unit),
            planner: RewritePlanner::new(),
            diags,
            queue: EditQueue::new(),
            wrapped: HashSet::new(),
            pending_closes: HashMap::new(),
            stats: TransformStats::default(),
        }
    }

    pub fn scan_function(&mut self, function: &FunctionDecl) {
        let Some(body) = function.body else { return };
        debug!(function = %function.qualified_name, "scanning function body");
        self.env.enter_function(function);
        self.visit(body);
    }

    pub fn finish(self) -> (EditQueue, TransformStats) {
        (self.queue, self.stats)
    }

    fn visit(&mut self, id: NodeId) {
        let tree = self.tree;
        match tree.node(id) {
            Node::Expr(expr) => self.visit_expr(id, expr),
            Node::Stmt(stmt) => {
                self.visit_stmt(stmt);
                if let Some(close) = self.pending_closes.remove(&id) {
                    self.queue.insert_after(tree.span(id).end, close);
                }
            }
            Node::Group(children) => self.visit_all(children),
        }
    }

    fn visit_all(&mut self, ids: &[NodeId]) {
        for &id in ids {
            self.visit(id);
        }
    }

    fn visit_opt(&mut self, id: Option<NodeId>) {
        if let Some(id) = id {
            self.visit(id);
        }
    }

    fn visit_expr(&mut self, id: NodeId, expr: &'u ExprKind) {
        let tree = self.tree;
        match expr {
            ExprKind::Assign { op, lhs, rhs } => {
                let member = tree.unparen(*lhs);
                match self.target_of(member) {
                    Some(target) => {
                        let operation = match op {
                            AssignOp::Plain => Operation::SimpleAssign,
                            AssignOp::Compound(op) => Operation::CompoundAssign(*op),
                        };
                        self.rewrite_site(id, member, target, operation, Some(*rhs));
                    }
                    None => {
                        self.visit(*lhs);
                        self.visit(*rhs);
                    }
                }
            }
            ExprKind::Update { op, fixity, operand } => {
                let member = tree.unparen(*operand);
                match self.target_of(member) {
                    Some(target) => {
                        let operation = Operation::Update {
                            op: *op,
                            fixity: *fixity,
                        };
                        self.rewrite_site(id, member, target, operation, None);
                    }
                    None => self.visit(*operand),
                }
            }
            ExprKind::Unary {
                op: UnaryOp::AddressOf,
                operand,
            } => {
                let member = tree.unparen(*operand);
                match self.target_of(member) {
                    Some(target) => {
                        self.report_escape(id, target, "its address is taken");
                        self.visit_member_base(member);
                    }
                    None => self.visit(*operand),
                }
            }
            ExprKind::Member { base, field, .. } => match self.target_of(id) {
                Some(target) => self.rewrite_site(id, id, target, Operation::Read, None),
                None => {
                    self.report_unresolved(id, *base, field);
                    self.visit(*base);
                }
            },
            ExprKind::Lambda { params, body } => {
                self.env.push_scope();
                for param in params {
                    self.visit_opt(param.init);
                    self.env.declare(&param.name, &param.ty, None);
                }
                self.visit_opt(*body);
                self.env.pop_scope();
            }
            ExprKind::Binary { lhs, rhs, .. } | ExprKind::Comma { lhs, rhs } => {
                self.visit(*lhs);
                self.visit(*rhs);
            }
            ExprKind::Conditional {
                condition,
                consequence,
                alternative,
            } => {
                self.visit(*condition);
                self.visit_opt(*consequence);
                self.visit(*alternative);
            }
            ExprKind::Unary { operand, .. } => self.visit(*operand),
            ExprKind::Paren(inner) => self.visit(*inner),
            ExprKind::Call { callee, args } => {
                self.visit(*callee);
                self.visit_all(args);
            }
            ExprKind::Subscript { base, index } => {
                self.visit(*base);
                self.visit_all(index);
            }
            ExprKind::Identifier(_) | ExprKind::This => {}
            ExprKind::Other(children) => self.visit_all(children),
        }
    }

    fn visit_stmt(&mut self, stmt: &'u StmtKind) {
        let tree = self.tree;
        match stmt {
            StmtKind::Compound(children) => {
                self.env.push_scope();
                self.visit_all(children);
                self.env.pop_scope();
            }
            StmtKind::Expr(expr) | StmtKind::Return(expr) | StmtKind::Throw(expr) => self.visit_opt(*expr),
            StmtKind::Decl(vars) => {
                for var in vars {
                    let init_class = var.init.and_then(|init| self.env.class_of(tree, init));
                    if let Some(init) = var.init {
                        let member = tree.unparen(init);
                        match self.target_of(member) {
                            Some(target) if var.ty.is_mutable_lvalue_ref() => {
                                self.report_escape(init, target, "it is bound to a non-const reference");
                                self.visit_member_base(member);
                            }
                            _ => self.visit(init),
                        }
                    }
                    self.env.declare(&var.name, &var.ty, init_class);
                }
            }
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.env.push_scope();
                self.visit(*condition);
                self.visit(*then_branch);
                self.visit_opt(*else_branch);
                self.env.pop_scope();
            }
            StmtKind::Switch { condition, body } => {
                self.env.push_scope();
                self.visit(*condition);
                self.visit(*body);
                self.env.pop_scope();
            }
            StmtKind::Case { value, body } => {
                self.visit_opt(*value);
                self.visit_all(body);
            }
            StmtKind::Loop {
                init,
                condition,
                update,
                element,
                range,
                body,
                ..
            } => {
                self.env.push_scope();
                self.visit_opt(*init);
                self.visit_opt(*condition);
                self.visit_opt(*update);
                self.visit_opt(*range);
                if let Some(element) = element {
                    let element_class = range.and_then(|range| self.env.element_class_of(tree, range));
                    self.env.declare(&element.name, &element.ty, element_class);
                }
                self.visit(*body);
                self.env.pop_scope();
            }
            StmtKind::Other(children) => self.visit_all(children),
        }
    }

    fn visit_member_base(&mut self, member: NodeId) {
        if let Node::Expr(ExprKind::Member { base, .. }) = self.tree.node(member) {
            self.visit(*base);
        }
    }

    fn target_of(&self, member: NodeId) -> Option<&'a TargetField> {
        let targets = self.targets;
        let qualified = self.env.resolve_member(self.tree, member)?;
        targets.get(&qualified)
    }

    /// A member named like a target whose object type is unknown
    fn report_unresolved(&mut self, member: NodeId, base: NodeId, field: &str) {
        let targets = self.targets;
        let Some(target) = targets.values().find(|t| t.name == field) else {
            return;
        };
        if self.env.class_of(self.tree, base).is_some() {
            return;
        }
        self.stats.unresolved += 1;
        let span = self.tree.span(member);
        self.diags.warning(
            span.start,
            format!(
                "cannot resolve the object type in '{}'; a usage of '{}' may be left unchanged",
                self.unit.text(span),
                target.qualified_name
            ),
        );
    }

    fn report_escape(&mut self, at: NodeId, target: &TargetField, how: &str) {
        self.stats.escapes += 1;
        self.diags.warning(
            self.tree.span(at).start,
            format!(
                "'{}' escapes the accessors: {how}; left unchanged",
                target.qualified_name
            ),
        );
    }

    fn rewrite_site(
        &mut self,
        expr: NodeId,
        member: NodeId,
        target: &'a TargetField,
        operation: Operation,
        rhs: Option<NodeId>,
    ) {
        let tree = self.tree;
        let Node::Expr(ExprKind::Member { base, arrow, .. }) = tree.node(member) else {
            return;
        };
        let site = MatchSite {
            expr,
            span: tree.span(expr),
            target,
            arrow: *arrow,
            operation,
        };

        let boundary = match operation {
            Operation::Read => None,
            _ => self.boundary(expr),
        };
        let strategy = self.planner.strategy(operation, boundary.as_ref().map(|b| b.position));

        if let Strategy::Unsupported(reason) = &strategy {
            self.stats.unsupported += 1;
            self.diags.warning(
                site.span.start,
                format!(
                    "cannot rewrite {} of '{}': {reason}",
                    operation.describe(),
                    target.qualified_name
                ),
            );
            self.visit(*base);
            self.visit_opt(rhs);
            return;
        }

        if operation.duplicates_base() && tree.any(*base, &has_side_effects) {
            self.diags.note(
                site.span.start,
                format!(
                    "base expression of '{}' has side effects and is evaluated twice after the rewrite",
                    target.qualified_name
                ),
            );
        }

        let parts = SiteParts {
            base: self.render(*base),
            rhs: rhs.map(|rhs| self.render(rhs)),
            rhs_is_primary: rhs.map_or(true, |rhs| is_primary(tree, rhs)),
        };
        let Some(plan) = self.planner.plan(&site, &strategy, &parts) else {
            return;
        };

        debug!(
            field = %target.qualified_name,
            operation = operation.describe(),
            strategy = ?strategy,
            at = %site.span,
            "rewriting usage"
        );
        // a hoisted site leaves a bare getter call; parentheses around it go
        let replaced = match plan.hoisted {
            Some(_) => tree.span(self.strip_parens_up(expr)),
            None => site.span,
        };
        self.queue.replace(replaced, plan.replacement);
        match operation {
            Operation::Read => self.stats.reads += 1,
            _ => self.stats.writes += 1,
        }

        if let (Some((side, text)), Some(boundary)) = (plan.hoisted, boundary) {
            self.hoist(&boundary, side, &text);
        }
    }

    fn hoist(&mut self, boundary: &Boundary, side: HoistSide, text: &str) {
        let indent = &boundary.indent;
        if boundary.needs_block && self.wrapped.insert(boundary.stmt) {
            self.queue.insert_before(boundary.span.start, format!("{{\n{indent}"));
            self.pending_closes.insert(boundary.stmt, format!("\n{indent}}}"));
        }
        match side {
            HoistSide::Before => self
                .queue
                .insert_before(boundary.span.start, format!("{text};\n{indent}")),
            HoistSide::After => self.queue.insert_after(boundary.span.end, format!("\n{indent}{text};")),
        }
        self.stats.hoisted += 1;
    }

    /// Source text of `id` with the rewrites found inside it applied.
    /// Edits anchored outside the span are forwarded to the enclosing queue.
    fn render(&mut self, id: NodeId) -> String {
        let span = self.tree.span(id);
        let outer = std::mem::take(&mut self.queue);
        self.visit(id);
        let produced = std::mem::replace(&mut self.queue, outer);
        let (inner, forwarded) = produced.partition(span);
        self.queue.extend(forwarded);

        let text = self.unit.text(span);
        match inner.apply(text, span.start) {
            Ok(rendered) => rendered,
            Err(err) => {
                self.diags
                    .warning(span.start, format!("nested rewrites could not be combined: {err}"));
                text.to_string()
            }
        }
    }

    fn strip_parens_up(&self, mut id: NodeId) -> NodeId {
        while let Some(parent) = self.tree.parent(id) {
            match self.tree.node(parent) {
                Node::Expr(ExprKind::Paren(_)) => id = parent,
                _ => break,
            }
        }
        id
    }

    /// Walk up from a site to the statement its helpers attach to
    fn boundary(&self, expr: NodeId) -> Option<Boundary> {
        let tree = self.tree;
        let mut child = expr;
        // set once the walk leaves an operand that is not always evaluated
        // exactly where the statement is
        let mut guarded = None;
        while let Some(parent) = tree.parent(child) {
            let stmt = match tree.node(parent) {
                Node::Stmt(stmt) => stmt,
                Node::Expr(parent_expr) => {
                    guarded = guarded.or_else(|| sequenced_operand(parent_expr, child));
                    child = parent;
                    continue;
                }
                Node::Group(_) => {
                    child = parent;
                    continue;
                }
            };

            let position = match stmt {
                StmtKind::Expr(Some(e)) if tree.unparen(*e) == expr => Position::Whole,
                StmtKind::Expr(_) => Position::Inline { after_allowed: true },
                StmtKind::Decl(_) if self.in_statement_slot(parent) => Position::Inline { after_allowed: true },
                StmtKind::Decl(_) => {
                    child = parent;
                    continue;
                }
                StmtKind::Return(_) | StmtKind::Throw(_) => Position::Inline { after_allowed: false },
                StmtKind::If { .. } | StmtKind::Switch { .. } => Position::Inline { after_allowed: false },
                StmtKind::Case { .. } => Position::Fixed("a case label"),
                StmtKind::Loop {
                    init,
                    condition,
                    update,
                    range,
                    ..
                } => {
                    if *init == Some(child) {
                        if tree.unparen(child) == expr {
                            Position::Whole
                        } else {
                            Position::Inline { after_allowed: false }
                        }
                    } else if *update == Some(child) && tree.unparen(child) == expr {
                        Position::Whole
                    } else if *update == Some(child) {
                        Position::Fixed("a loop update")
                    } else if *range == Some(child) {
                        Position::Inline { after_allowed: false }
                    } else if *condition == Some(child) {
                        Position::Fixed("a loop condition")
                    } else {
                        Position::Fixed("a loop")
                    }
                }
                StmtKind::Compound(_) | StmtKind::Other(_) => Position::Fixed("this statement"),
            };
            let position = match guarded {
                Some(context) => Position::Fixed(context),
                None => position,
            };

            let span = tree.span(parent);
            return Some(Boundary {
                stmt: parent,
                span,
                position,
                needs_block: !self.directly_in_block(parent),
                indent: self.indent_at(span.start),
            });
        }
        None
    }

    /// Whether `stmt` occupies a position that holds a statement
    fn in_statement_slot(&self, stmt: NodeId) -> bool {
        let Some(parent) = self.tree.parent(stmt) else {
            return false;
        };
        match self.tree.node(parent) {
            Node::Stmt(StmtKind::Compound(_)) | Node::Stmt(StmtKind::Other(_)) => true,
            Node::Stmt(StmtKind::Case { body, .. }) => body.contains(&stmt),
            Node::Stmt(StmtKind::If {
                then_branch,
                else_branch,
                ..
            }) => *then_branch == stmt || *else_branch == Some(stmt),
            Node::Stmt(StmtKind::Loop { body, .. }) | Node::Stmt(StmtKind::Switch { body, .. }) => *body == stmt,
            _ => false,
        }
    }

    fn directly_in_block(&self, stmt: NodeId) -> bool {
        match self.tree.parent(stmt).map(|p| self.tree.node(p)) {
            Some(Node::Stmt(StmtKind::Compound(_))) => true,
            Some(Node::Stmt(StmtKind::Case { body, .. })) => body.contains(&stmt),
            _ => false,
        }
    }

    fn indent_at(&self, offset: usize) -> String {
        let source = &self.unit.source;
        let line_start = source[..offset].rfind('\n').map_or(0, |i| i + 1);
        source[line_start..offset]
            .chars()
            .take_while(|c| *c == ' ' || *c == '\t')
            .collect()
    }
}

/// Operands whose evaluation is conditional on, or ordered against, a
/// sibling: hoisting a mutation out of them changes behaviour
fn sequenced_operand(parent: &ExprKind, child: NodeId) -> Option<&'static str> {
    match parent {
        ExprKind::Conditional {
            consequence,
            alternative,
            ..
        } if *consequence == Some(child) || *alternative == child => Some("a conditionally evaluated operand"),
        ExprKind::Binary { op, rhs, .. } if *rhs == child && matches!(op.as_str(), "&&" | "||" | "and" | "or") => {
            Some("a conditionally evaluated operand")
        }
        ExprKind::Comma { .. } => Some("a comma operand"),
        _ => None,
    }
}

fn has_side_effects(node: &Node) -> bool {
    matches!(
        node,
        Node::Expr(ExprKind::Assign { .. }) | Node::Expr(ExprKind::Update { .. }) | Node::Expr(ExprKind::Call { .. })
    )
}

/// Binds at least as tightly as any binary operator
fn is_primary(tree: &SyntaxTree, id: NodeId) -> bool {
    match tree.node(id) {
        Node::Expr(ExprKind::Binary { .. })
        | Node::Expr(ExprKind::Assign { .. })
        | Node::Expr(ExprKind::Conditional { .. })
        | Node::Expr(ExprKind::Comma { .. })
        | Node::Expr(ExprKind::Lambda { .. }) => false,
        Node::Expr(ExprKind::Other(children)) => children.is_empty(),
        Node::Expr(_) => true,
        Node::Stmt(_) | Node::Group(_) => false,
    }
}
