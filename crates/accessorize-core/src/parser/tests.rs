use crate::ast::{AssignOp, CompoundOp, Decl, ExprKind, Fixity, MemberKind, Node, RecordKind, StmtKind, UpdateOp};

use super::CppParser;

fn parse(source: &str) -> crate::ast::TranslationUnit {
    let mut parser = CppParser::new().expect("C++ grammar loads");
    parser.parse("test.cpp", source).expect("parse succeeds")
}

#[test]
fn test_record_fields_and_methods() {
    let unit = parse(
        r#"
namespace geo {
class Point {
public:
    Point() = default;
    Point(int x, int y);
    ~Point();
    int norm() const { return x * x + y * y; }
    bool operator==(const Point &other) const;
    static int count;
    using Coord = int;
private:
    int x, y;
    const char *label;
    double samples[4];
};
}
"#,
    );

    assert!(!unit.has_errors);
    let record = unit.find_record("geo::Point").expect("record found");
    assert_eq!(record.kind, RecordKind::Class);
    assert_eq!(record.scope, vec!["geo".to_string()]);

    let fields: Vec<&str> = record.fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(fields, vec!["x", "y", "label", "samples"]);
    assert_eq!(record.fields[0].qualified_name, "geo::Point::x");
    assert_eq!(record.fields[2].ty.spelled(), "const char *");
    assert!(record.fields[3].ty.array);

    let kinds: Vec<(&str, MemberKind, bool)> = record
        .methods
        .iter()
        .map(|m| (m.name.as_str(), m.kind, m.user_provided))
        .collect();
    assert_eq!(
        kinds,
        vec![
            ("Point", MemberKind::Constructor, false),
            ("Point", MemberKind::Constructor, true),
            ("~Point", MemberKind::Destructor, true),
            ("norm", MemberKind::Method, true),
            ("operator==", MemberKind::Operator, true),
        ]
    );
    assert!(record.has_member("count"));
    assert!(record.has_member("Coord"));
    assert_eq!(&unit.source[record.close_brace..record.close_brace + 2], "};");
}

#[test]
fn test_nested_namespace_and_bases() {
    let unit = parse(
        r#"
namespace a::b {
struct Base { int id; };
struct Derived : public Base, private Other { int extra; };
}
"#,
    );

    let names: Vec<String> = unit.records().iter().map(|r| r.qualified_name.clone()).collect();
    assert_eq!(names, vec!["a::b::Base", "a::b::Derived"]);
    let derived = unit.find_record("a::b::Derived").unwrap();
    assert_eq!(derived.bases, vec!["Base", "Other"]);
}

#[test]
fn test_functions_and_out_of_line_methods() {
    let unit = parse(
        r#"
#include "point.h"
#include <vector>

int Point::norm() const { return x; }

int main(int argc, char **argv) {
    return 0;
}

void declared_only(int);
"#,
    );

    assert_eq!(unit.includes, vec!["point.h".to_string()]);
    let functions = unit.functions();
    assert_eq!(functions.len(), 3);

    assert_eq!(functions[0].name, "norm");
    assert_eq!(functions[0].record.as_deref(), Some("Point"));
    assert!(functions[0].body.is_some());

    assert_eq!(functions[1].name, "main");
    assert_eq!(functions[1].params.len(), 2);
    assert_eq!(functions[1].params[1].ty.pointers.len(), 2);

    assert_eq!(functions[2].name, "declared_only");
    assert!(functions[2].body.is_none());
}

#[test]
fn test_expression_lowering() {
    let unit = parse(
        r#"
void f(Foo &foo, Foo *p) {
    foo.x = 3;
    p->x += 2;
    ++foo.x;
    foo.x--;
    int *q = &foo.x;
}
"#,
    );
    let tree = &unit.tree;

    let mut assigns = Vec::new();
    let mut updates = Vec::new();
    let mut arrows = Vec::new();
    let mut address_of = 0;
    let body = unit.functions()[0].body.unwrap();
    collect(tree, body, &mut |node| match node {
        Node::Expr(ExprKind::Assign { op, .. }) => assigns.push(*op),
        Node::Expr(ExprKind::Update { op, fixity, .. }) => updates.push((*op, *fixity)),
        Node::Expr(ExprKind::Member { arrow, field, .. }) => arrows.push((field.clone(), *arrow)),
        Node::Expr(ExprKind::Unary { op: crate::ast::UnaryOp::AddressOf, .. }) => address_of += 1,
        _ => {}
    });

    assert_eq!(assigns, vec![AssignOp::Plain, AssignOp::Compound(CompoundOp::Add)]);
    assert_eq!(
        updates,
        vec![
            (UpdateOp::Increment, Fixity::Prefix),
            (UpdateOp::Decrement, Fixity::Postfix),
        ]
    );
    assert_eq!(arrows.iter().filter(|(_, arrow)| *arrow).count(), 1);
    assert_eq!(arrows.len(), 5);
    assert_eq!(address_of, 1);
}

#[test]
fn test_conditional_comma_and_return_types() {
    let unit = parse(
        r#"
struct Holder {
    Holder();
    Foo &get();
    const Foo *peek() const { return nullptr; }
};
Foo make();
void h(bool c, Foo &foo) {
    int a = c ? foo.x : 0;
    int d = (foo.x++, 2);
    auto e = Foo{1};
}
"#,
    );

    let holder = unit.find_record("Holder").unwrap();
    let returns: Vec<Option<String>> = holder
        .methods
        .iter()
        .map(|m| m.return_type.as_ref().map(|ty| ty.base.clone()))
        .collect();
    assert_eq!(returns, vec![None, Some("Foo".to_string()), Some("Foo".to_string())]);
    let peek = holder.methods[2].return_type.as_ref().unwrap();
    assert!(peek.is_const && peek.is_pointer());

    let functions = unit.functions();
    let make = functions.iter().find(|f| f.name == "make").unwrap();
    assert_eq!(make.return_type.as_ref().map(|ty| ty.base.as_str()), Some("Foo"));
    let h = functions.iter().find(|f| f.name == "h").unwrap();
    assert_eq!(h.return_type.as_ref().map(|ty| ty.base.as_str()), Some("void"));

    let tree = &unit.tree;
    let mut conditionals = 0;
    let mut commas = 0;
    let mut callees = Vec::new();
    collect(tree, h.body.unwrap(), &mut |node| match node {
        Node::Expr(ExprKind::Conditional { consequence, .. }) => {
            assert!(consequence.is_some());
            conditionals += 1;
        }
        Node::Expr(ExprKind::Comma { .. }) => commas += 1,
        Node::Expr(ExprKind::Call { callee, .. }) => callees.push(*callee),
        _ => {}
    });
    assert_eq!(conditionals, 1);
    assert_eq!(commas, 1);
    assert_eq!(callees.len(), 1);
    assert_eq!(tree.node(callees[0]), &Node::Expr(ExprKind::Identifier("Foo".to_string())));
}

#[test]
fn test_statement_lowering_and_parents() {
    let unit = parse(
        r#"
void g(Foo &foo) {
    if (foo.x > 0)
        foo.x = 1;
    for (int i = 0; i < 3; foo.x++) {
    }
    switch (foo.x) {
    case 1:
        foo.x = 2;
        break;
    }
}
"#,
    );
    let tree = &unit.tree;
    let body = unit.functions()[0].body.unwrap();

    let Some(StmtKind::Compound(stmts)) = tree.node(body).as_stmt() else {
        panic!("function body is a compound statement");
    };
    assert_eq!(stmts.len(), 3);

    let Some(StmtKind::If { then_branch, else_branch, .. }) = tree.node(stmts[0]).as_stmt() else {
        panic!("expected if statement");
    };
    assert!(else_branch.is_none());
    assert!(matches!(tree.node(*then_branch), Node::Stmt(StmtKind::Expr(Some(_)))));
    assert_eq!(tree.parent(*then_branch), Some(stmts[0]));

    let Some(StmtKind::Loop { init, update, .. }) = tree.node(stmts[1]).as_stmt() else {
        panic!("expected for loop");
    };
    assert!(matches!(tree.node(init.unwrap()), Node::Stmt(StmtKind::Decl(_))));
    assert!(matches!(tree.node(update.unwrap()), Node::Expr(ExprKind::Update { .. })));

    let mut cases = 0;
    collect(tree, stmts[2], &mut |node| {
        if let Node::Stmt(StmtKind::Case { value, body }) = node {
            assert!(value.is_some());
            assert_eq!(body.len(), 2);
            cases += 1;
        }
    });
    assert_eq!(cases, 1);
}

#[test]
fn test_syntax_errors_are_flagged() {
    let unit = parse("struct Foo { int x; };\nvoid f() { foo.x = ; }\n");
    assert!(unit.has_errors);
    assert!(unit.find_record("Foo").is_some());
}

#[test]
fn test_typedef_struct_takes_declarator_name() {
    let unit = parse("typedef struct { int x; } Plain;\n");
    let record = unit.find_record("Plain").expect("typedef name used");
    assert_eq!(record.fields.len(), 1);
    assert!(matches!(unit.decls[0], Decl::Record(_)));
}

fn collect(tree: &crate::ast::SyntaxTree, id: crate::ast::NodeId, visit: &mut dyn FnMut(&Node)) {
    visit(tree.node(id));
    for child in tree.node(id).children() {
        collect(tree, child, visit);
    }
}
