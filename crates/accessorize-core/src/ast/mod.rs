//! Lowered C++ syntax used by the rewrite engine.
//!
//! Executable code (function bodies) lives in a `SyntaxTree` arena addressed
//! by `NodeId`; declarations form a separate owned tree (`Decl`) that points
//! into the arena for bodies and initializers.

pub mod decl;
pub mod types;

pub use decl::{Decl, FieldDecl, FunctionDecl, MemberDecl, MemberKind, RecordDecl, RecordKind, VarDecl};
pub use types::{RefKind, TypeRef};

use std::fmt;
use std::ops::Range;
use std::path::{Path, PathBuf};

/// Half-open byte range into a source buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end);
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, other: Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Index of a node in a `SyntaxTree`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Compound-assignment operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompoundOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Shl,
    Shr,
    BitAnd,
    BitOr,
    BitXor,
}

impl CompoundOp {
    /// Parse the assignment token (`+=`, `and_eq`, ...)
    pub fn from_assign_token(token: &str) -> Option<Self> {
        Some(match token {
            "+=" => Self::Add,
            "-=" => Self::Sub,
            "*=" => Self::Mul,
            "/=" => Self::Div,
            "%=" => Self::Rem,
            "<<=" => Self::Shl,
            ">>=" => Self::Shr,
            "&=" | "and_eq" => Self::BitAnd,
            "|=" | "or_eq" => Self::BitOr,
            "^=" | "xor_eq" => Self::BitXor,
            _ => return None,
        })
    }

    /// The plain binary operator this assignment applies
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Rem => "%",
            Self::Shl => "<<",
            Self::Shr => ">>",
            Self::BitAnd => "&",
            Self::BitOr => "|",
            Self::BitXor => "^",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Plain,
    Compound(CompoundOp),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOp {
    Increment,
    Decrement,
}

impl UpdateOp {
    pub fn arithmetic(&self) -> &'static str {
        match self {
            Self::Increment => "+",
            Self::Decrement => "-",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fixity {
    Prefix,
    Postfix,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    AddressOf,
    Deref,
    Minus,
    Plus,
    Not,
    BitNot,
}

impl UnaryOp {
    pub fn from_token(token: &str) -> Option<Self> {
        Some(match token {
            "&" => Self::AddressOf,
            "*" => Self::Deref,
            "-" => Self::Minus,
            "+" => Self::Plus,
            "!" | "not" => Self::Not,
            "~" | "compl" => Self::BitNot,
            _ => return None,
        })
    }
}

/// Expression shapes the rewrite engine distinguishes
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// `base.field` or `base->field`
    Member {
        base: NodeId,
        arrow: bool,
        field: String,
    },
    Assign {
        op: AssignOp,
        lhs: NodeId,
        rhs: NodeId,
    },
    Binary {
        op: String,
        lhs: NodeId,
        rhs: NodeId,
    },
    /// `condition ? consequence : alternative`; the GNU `a ?: b` form has
    /// no consequence
    Conditional {
        condition: NodeId,
        consequence: Option<NodeId>,
        alternative: NodeId,
    },
    /// `lhs, rhs`
    Comma {
        lhs: NodeId,
        rhs: NodeId,
    },
    Update {
        op: UpdateOp,
        fixity: Fixity,
        operand: NodeId,
    },
    Unary {
        op: UnaryOp,
        operand: NodeId,
    },
    Paren(NodeId),
    Call {
        callee: NodeId,
        args: Vec<NodeId>,
    },
    Subscript {
        base: NodeId,
        index: Vec<NodeId>,
    },
    Lambda {
        params: Vec<VarDecl>,
        body: Option<NodeId>,
    },
    Identifier(String),
    This,
    /// Any other expression; children in source order
    Other(Vec<NodeId>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopKind {
    While,
    DoWhile,
    For,
    RangeFor,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Compound(Vec<NodeId>),
    Expr(Option<NodeId>),
    /// Local declaration; initializers are children
    Decl(Vec<VarDecl>),
    Return(Option<NodeId>),
    Throw(Option<NodeId>),
    If {
        condition: NodeId,
        then_branch: NodeId,
        else_branch: Option<NodeId>,
    },
    Switch {
        condition: NodeId,
        body: NodeId,
    },
    /// `case`/`default` label together with the statements it owns
    Case {
        value: Option<NodeId>,
        body: Vec<NodeId>,
    },
    Loop {
        kind: LoopKind,
        init: Option<NodeId>,
        condition: Option<NodeId>,
        update: Option<NodeId>,
        /// Range-for element declaration and range expression
        element: Option<VarDecl>,
        range: Option<NodeId>,
        body: NodeId,
    },
    Other(Vec<NodeId>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Expr(ExprKind),
    Stmt(StmtKind),
    /// Syntax that is neither an expression nor a statement: argument and
    /// initializer lists, condition clauses, else clauses, error nodes
    Group(Vec<NodeId>),
}

impl Node {
    /// Direct children in source order
    pub fn children(&self) -> Vec<NodeId> {
        match self {
            Node::Expr(expr) => match expr {
                ExprKind::Member { base, .. } => vec![*base],
                ExprKind::Assign { lhs, rhs, .. }
                | ExprKind::Binary { lhs, rhs, .. }
                | ExprKind::Comma { lhs, rhs } => vec![*lhs, *rhs],
                ExprKind::Conditional {
                    condition,
                    consequence,
                    alternative,
                } => {
                    let mut out = vec![*condition];
                    out.extend(consequence.iter().copied());
                    out.push(*alternative);
                    out
                }
                ExprKind::Update { operand, .. } | ExprKind::Unary { operand, .. } => vec![*operand],
                ExprKind::Paren(inner) => vec![*inner],
                ExprKind::Call { callee, args } => {
                    let mut out = vec![*callee];
                    out.extend(args.iter().copied());
                    out
                }
                ExprKind::Subscript { base, index } => {
                    let mut out = vec![*base];
                    out.extend(index.iter().copied());
                    out
                }
                ExprKind::Lambda { params, body } => params
                    .iter()
                    .filter_map(|p| p.init)
                    .chain(body.iter().copied())
                    .collect(),
                ExprKind::Identifier(_) | ExprKind::This => Vec::new(),
                ExprKind::Other(children) => children.clone(),
            },
            Node::Stmt(stmt) => match stmt {
                StmtKind::Compound(children) | StmtKind::Other(children) => children.clone(),
                StmtKind::Expr(expr) | StmtKind::Return(expr) | StmtKind::Throw(expr) => {
                    expr.iter().copied().collect()
                }
                StmtKind::Decl(vars) => vars.iter().filter_map(|v| v.init).collect(),
                StmtKind::If {
                    condition,
                    then_branch,
                    else_branch,
                } => {
                    let mut out = vec![*condition, *then_branch];
                    out.extend(else_branch.iter().copied());
                    out
                }
                StmtKind::Switch { condition, body } => vec![*condition, *body],
                StmtKind::Case { value, body } => {
                    value.iter().copied().chain(body.iter().copied()).collect()
                }
                StmtKind::Loop {
                    init,
                    condition,
                    update,
                    range,
                    body,
                    ..
                } => {
                    let mut out: Vec<NodeId> = [init, condition, update, range]
                        .into_iter()
                        .filter_map(|n| *n)
                        .collect();
                    out.push(*body);
                    out
                }
            },
            Node::Group(children) => children.clone(),
        }
    }

    pub fn as_expr(&self) -> Option<&ExprKind> {
        match self {
            Node::Expr(expr) => Some(expr),
            _ => None,
        }
    }

    pub fn as_stmt(&self) -> Option<&StmtKind> {
        match self {
            Node::Stmt(stmt) => Some(stmt),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct NodeData {
    span: Span,
    node: Node,
}

/// Arena of lowered statements and expressions for one source file.
///
/// The parent index is built once by `link_parents` after lowering; it is a
/// lookup table only and never owns anything.
#[derive(Debug, Clone, Default)]
pub struct SyntaxTree {
    nodes: Vec<NodeData>,
    parents: Vec<Option<NodeId>>,
}

impl SyntaxTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn alloc(&mut self, span: Span, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(NodeData { span, node });
        id
    }

    /// Build the child-to-parent index
    pub(crate) fn link_parents(&mut self) {
        let mut parents = vec![None; self.nodes.len()];
        for (index, data) in self.nodes.iter().enumerate() {
            for child in data.node.children() {
                parents[child.index()] = Some(NodeId(index as u32));
            }
        }
        self.parents = parents;
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()].node
    }

    pub fn span(&self, id: NodeId) -> Span {
        self.nodes[id.index()].span
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.parents.get(id.index()).copied().flatten()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Every node id, in allocation order (children before parents)
    pub fn ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len() as u32).map(NodeId)
    }

    /// Follow parentheses down to the wrapped expression
    pub fn unparen(&self, mut id: NodeId) -> NodeId {
        while let Node::Expr(ExprKind::Paren(inner)) = self.node(id) {
            id = *inner;
        }
        id
    }

    /// Whether any node in the subtree satisfies `pred`
    pub fn any(&self, id: NodeId, pred: &dyn Fn(&Node) -> bool) -> bool {
        let node = self.node(id);
        pred(node) || node.children().into_iter().any(|child| self.any(child, pred))
    }
}

/// One parsed source file
#[derive(Debug, Clone)]
pub struct TranslationUnit {
    pub path: PathBuf,
    pub source: String,
    pub tree: SyntaxTree,
    pub decls: Vec<Decl>,
    /// Quoted `#include "..."` targets, in order of appearance
    pub includes: Vec<String>,
    /// tree-sitter reported syntax errors somewhere in the file
    pub has_errors: bool,
}

impl TranslationUnit {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn text(&self, span: Span) -> &str {
        &self.source[span.range()]
    }

    /// All records, depth-first in declaration order
    pub fn records(&self) -> Vec<&RecordDecl> {
        let mut out = Vec::new();
        decl::collect_records(&self.decls, &mut out);
        out
    }

    /// All function definitions and declarations, depth-first
    pub fn functions(&self) -> Vec<&FunctionDecl> {
        let mut out = Vec::new();
        decl::collect_functions(&self.decls, &mut out);
        out
    }

    /// Namespace-scope variables with their qualified names
    pub fn globals(&self) -> Vec<(String, &VarDecl)> {
        let mut out = Vec::new();
        decl::collect_globals(&self.decls, &mut out);
        out
    }

    pub fn find_record(&self, qualified_name: &str) -> Option<&RecordDecl> {
        self.records()
            .into_iter()
            .find(|record| record.qualified_name == qualified_name)
    }
}
