//! Rewrite Planner: classify a usage site and compute its replacement text.

use crate::ast::{CompoundOp, Fixity, NodeId, Span, UpdateOp};

use super::selector::TargetField;

/// What a usage site does to the field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Read,
    SimpleAssign,
    CompoundAssign(CompoundOp),
    Update { op: UpdateOp, fixity: Fixity },
}

impl Operation {
    /// Shapes whose rewrite repeats the base expression
    pub fn duplicates_base(&self) -> bool {
        matches!(self, Operation::CompoundAssign(_) | Operation::Update { .. })
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Operation::Read => "read",
            Operation::SimpleAssign => "assignment",
            Operation::CompoundAssign(_) => "compound assignment",
            Operation::Update {
                op: UpdateOp::Increment,
                ..
            } => "increment",
            Operation::Update {
                op: UpdateOp::Decrement,
                ..
            } => "decrement",
        }
    }
}

/// Where the site sits relative to its top-level statement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    /// The site is the whole statement, or a `for` clause whose value is
    /// discarded
    Whole,
    /// Helper statements may go before the boundary, and after it when
    /// `after_allowed`
    Inline { after_allowed: bool },
    /// Evaluated repeatedly or in a constant context; no helper statements
    Fixed(&'static str),
}

/// The statement that hoisted helpers attach to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Boundary {
    pub stmt: NodeId,
    pub span: Span,
    pub position: Position,
    /// The statement is not directly inside a block or case body
    pub needs_block: bool,
    /// Leading whitespace of the statement's line
    pub indent: String,
}

#[derive(Debug, Clone, Copy)]
pub struct MatchSite<'t> {
    /// The expression replaced by the rewrite (assignment, update or member)
    pub expr: NodeId,
    pub span: Span,
    pub target: &'t TargetField,
    pub arrow: bool,
    pub operation: Operation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    InPlace,
    HoistBefore,
    HoistAfter,
    Unsupported(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoistSide {
    Before,
    After,
}

/// Rendered pieces of a site: base and right-hand side with nested
/// rewrites already applied
#[derive(Debug, Clone, Default)]
pub struct SiteParts {
    pub base: String,
    pub rhs: Option<String>,
    /// The right-hand side binds tighter than any binary operator
    pub rhs_is_primary: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewritePlan {
    /// Replaces the site expression
    pub replacement: String,
    /// Helper statement (without `;`) and the side it goes on
    pub hoisted: Option<(HoistSide, String)>,
}

pub fn getter_name(field: &str) -> String {
    format!("get{}", capitalize(field))
}

pub fn setter_name(field: &str) -> String {
    format!("set{}", capitalize(field))
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[derive(Debug, Default)]
pub struct RewritePlanner;

impl RewritePlanner {
    pub fn new() -> Self {
        Self
    }

    /// Pick a strategy for an operation at a position. Reads are always
    /// in place and need no boundary.
    pub fn strategy(&self, operation: Operation, position: Option<Position>) -> Strategy {
        if operation == Operation::Read {
            return Strategy::InPlace;
        }
        let Some(position) = position else {
            return Strategy::Unsupported("no enclosing statement".to_string());
        };

        match (operation, position) {
            (_, Position::Whole) => Strategy::InPlace,
            (_, Position::Fixed(context)) => {
                Strategy::Unsupported(format!("its value is used in {context}, where no statement can be inserted"))
            }
            (
                Operation::Update {
                    fixity: Fixity::Postfix,
                    ..
                },
                Position::Inline { after_allowed: false },
            ) => Strategy::Unsupported(
                "the old value is used but no statement can follow the enclosing statement".to_string(),
            ),
            (
                Operation::Update {
                    fixity: Fixity::Postfix,
                    ..
                },
                Position::Inline { after_allowed: true },
            ) => Strategy::HoistAfter,
            (_, Position::Inline { .. }) => Strategy::HoistBefore,
        }
    }

    pub fn plan(&self, site: &MatchSite, strategy: &Strategy, parts: &SiteParts) -> Option<RewritePlan> {
        let access = if site.arrow { "->" } else { "." };
        let base = &parts.base;
        let getter = format!("{base}{access}{}()", getter_name(&site.target.name));
        let setter = |value: &str| format!("{base}{access}{}( {value} )", setter_name(&site.target.name));

        let mutation = match site.operation {
            Operation::Read => None,
            Operation::SimpleAssign => Some(setter(parts.rhs.as_deref().unwrap_or_default())),
            Operation::CompoundAssign(op) => {
                let rhs = parts.rhs.as_deref().unwrap_or_default();
                let rhs = if parts.rhs_is_primary {
                    rhs.to_string()
                } else {
                    format!("({rhs})")
                };
                Some(setter(&format!("{getter} {} {rhs}", op.as_str())))
            }
            Operation::Update { op, .. } => Some(setter(&format!("{getter} {} 1", op.arithmetic()))),
        };

        match (strategy, mutation) {
            (Strategy::Unsupported(_), _) => None,
            (_, None) => Some(RewritePlan {
                replacement: getter,
                hoisted: None,
            }),
            (Strategy::InPlace, Some(mutation)) => Some(RewritePlan {
                replacement: mutation,
                hoisted: None,
            }),
            (Strategy::HoistBefore, Some(mutation)) => Some(RewritePlan {
                replacement: getter,
                hoisted: Some((HoistSide::Before, mutation)),
            }),
            (Strategy::HoistAfter, Some(mutation)) => Some(RewritePlan {
                replacement: getter,
                hoisted: Some((HoistSide::After, mutation)),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::TypeRef;
    use pretty_assertions::assert_eq;

    fn target() -> TargetField {
        TargetField {
            qualified_name: "Foo::x".to_string(),
            name: "x".to_string(),
            declared_type: TypeRef::named("int"),
            const_type: "const int".to_string(),
            owner: "Foo".to_string(),
            owned_by_unit: true,
            span: Span::default(),
        }
    }

    fn site(target: &TargetField, operation: Operation) -> MatchSite<'_> {
        MatchSite {
            expr: placeholder_id(),
            span: Span::default(),
            target,
            arrow: false,
            operation,
        }
    }

    fn placeholder_id() -> NodeId {
        let mut tree = crate::ast::SyntaxTree::new();
        tree.alloc(Span::default(), crate::ast::Node::Group(Vec::new()))
    }

    fn parts(base: &str, rhs: Option<&str>, rhs_is_primary: bool) -> SiteParts {
        SiteParts {
            base: base.to_string(),
            rhs: rhs.map(str::to_string),
            rhs_is_primary,
        }
    }

    #[test]
    fn test_accessor_names() {
        assert_eq!(getter_name("x"), "getX");
        assert_eq!(setter_name("count"), "setCount");
        assert_eq!(getter_name("_raw"), "get_raw");
    }

    #[test]
    fn test_strategy_table() {
        let planner = RewritePlanner::new();
        let prefix = Operation::Update {
            op: UpdateOp::Increment,
            fixity: Fixity::Prefix,
        };
        let postfix = Operation::Update {
            op: UpdateOp::Increment,
            fixity: Fixity::Postfix,
        };
        let inline = Position::Inline { after_allowed: true };
        let before_only = Position::Inline { after_allowed: false };

        assert_eq!(planner.strategy(Operation::Read, None), Strategy::InPlace);
        assert_eq!(planner.strategy(postfix, Some(Position::Whole)), Strategy::InPlace);
        assert_eq!(planner.strategy(prefix, Some(inline)), Strategy::HoistBefore);
        assert_eq!(planner.strategy(postfix, Some(inline)), Strategy::HoistAfter);
        assert_eq!(planner.strategy(Operation::SimpleAssign, Some(before_only)), Strategy::HoistBefore);
        assert!(matches!(planner.strategy(postfix, Some(before_only)), Strategy::Unsupported(_)));
        assert!(matches!(
            planner.strategy(Operation::CompoundAssign(CompoundOp::Add), Some(Position::Fixed("a loop condition"))),
            Strategy::Unsupported(_)
        ));
    }

    #[test]
    fn test_plan_texts() {
        let planner = RewritePlanner::new();
        let target = target();

        let compound = site(&target, Operation::CompoundAssign(CompoundOp::Add));
        let plan = planner
            .plan(&compound, &Strategy::InPlace, &parts("foo", Some("3"), true))
            .unwrap();
        assert_eq!(plan.replacement, "foo.setX( foo.getX() + 3 )");

        let plan = planner
            .plan(&compound, &Strategy::HoistBefore, &parts("foo", Some("a + b"), false))
            .unwrap();
        assert_eq!(plan.replacement, "foo.getX()");
        assert_eq!(
            plan.hoisted,
            Some((HoistSide::Before, "foo.setX( foo.getX() + (a + b) )".to_string()))
        );

        let mut arrow = site(&target, Operation::Update {
            op: UpdateOp::Decrement,
            fixity: Fixity::Postfix,
        });
        arrow.arrow = true;
        let plan = planner.plan(&arrow, &Strategy::HoistAfter, &parts("p", None, true)).unwrap();
        assert_eq!(plan.replacement, "p->getX()");
        assert_eq!(plan.hoisted, Some((HoistSide::After, "p->setX( p->getX() - 1 )".to_string())));

        let assign = site(&target, Operation::SimpleAssign);
        let plan = planner.plan(&assign, &Strategy::InPlace, &parts("foo", Some("3"), true)).unwrap();
        assert_eq!(plan.replacement, "foo.setX( 3 )");

        assert!(planner
            .plan(&assign, &Strategy::Unsupported("loop".to_string()), &parts("foo", None, true))
            .is_none());
    }
}
