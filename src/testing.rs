//! Construction helpers shared by the test modules: surface AST builders
//! and a pre-populated type table.

use crate::ast::{BinOp, CallArg, Expr, ExprNode, Location};
use crate::type_::{TypeRef, TypeTable};

pub(crate) fn loc(line: u32) -> Location {
    Location::new("test.src", line)
}

pub(crate) fn expr(node: ExprNode) -> Expr {
    Expr::new(loc(1), node)
}

/// The same expression reported at a different line.
pub(crate) fn at(line: u32, mut expression: Expr) -> Expr {
    expression.location = loc(line);
    expression
}

pub(crate) fn int(value: i64) -> Expr {
    expr(ExprNode::Int(value))
}

pub(crate) fn string(value: &str) -> Expr {
    expr(ExprNode::String(value.into()))
}

pub(crate) fn symbol(value: &str) -> Expr {
    expr(ExprNode::Symbol(value.into()))
}

pub(crate) fn boolean(value: bool) -> Expr {
    expr(ExprNode::Bool(value))
}

pub(crate) fn nil() -> Expr {
    expr(ExprNode::Nil)
}

pub(crate) fn var(name: &str) -> Expr {
    expr(ExprNode::Var(name.into()))
}

pub(crate) fn wildcard() -> Expr {
    expr(ExprNode::Discard)
}

pub(crate) fn tuple(elements: Vec<Expr>) -> Expr {
    expr(ExprNode::Tuple(elements))
}

pub(crate) fn array(elements: Vec<Expr>) -> Expr {
    expr(ExprNode::Array(elements))
}

pub(crate) fn call(function: &str, arguments: Vec<Expr>) -> Expr {
    expr(ExprNode::Call {
        function: function.into(),
        arguments: arguments
            .into_iter()
            .map(|value| CallArg {
                label: None,
                location: value.location.clone(),
                value,
            })
            .collect(),
    })
}

pub(crate) fn call_named(function: &str, arguments: Vec<(&str, Expr)>) -> Expr {
    expr(ExprNode::Call {
        function: function.into(),
        arguments: arguments
            .into_iter()
            .map(|(label, value)| CallArg {
                label: Some(label.into()),
                location: value.location.clone(),
                value,
            })
            .collect(),
    })
}

pub(crate) fn binop(name: BinOp, left: Expr, right: Expr) -> Expr {
    expr(ExprNode::BinOp {
        name,
        left: Box::new(left),
        right: Box::new(right),
    })
}

pub(crate) fn both(left: Expr, right: Expr) -> Expr {
    binop(BinOp::And, left, right)
}

pub(crate) fn either(left: Expr, right: Expr) -> Expr {
    binop(BinOp::Or, left, right)
}

pub(crate) fn gt(left: Expr, right: Expr) -> Expr {
    binop(BinOp::GtInt, left, right)
}

pub(crate) fn not(inner: Expr) -> Expr {
    expr(ExprNode::Not(Box::new(inner)))
}

pub(crate) fn where_(pattern: Expr, guard: Expr) -> Expr {
    expr(ExprNode::Where {
        pattern: Box::new(pattern),
        guard: Box::new(guard),
    })
}

pub(crate) fn ascribe(pattern: Option<Expr>, annotation: Expr) -> Expr {
    expr(ExprNode::Ascribe {
        pattern: pattern.map(Box::new),
        annotation: Box::new(annotation),
    })
}

pub(crate) fn interpolate(inner: Expr) -> Expr {
    expr(ExprNode::Interpolate(Box::new(inner)))
}

pub(crate) fn splat(inner: Expr) -> Expr {
    expr(ExprNode::Splat(Box::new(inner)))
}

pub(crate) fn quote(inner: Expr) -> Expr {
    expr(ExprNode::Quote(Box::new(inner)))
}

pub(crate) fn arm(pattern: Expr, body: Expr) -> Expr {
    expr(ExprNode::Arm {
        pattern: Box::new(pattern),
        body: Box::new(body),
    })
}

pub(crate) fn block(statements: Vec<Expr>) -> Expr {
    expr(ExprNode::Block(statements))
}

pub(crate) fn arms(cases: Vec<Expr>) -> Expr {
    block(cases)
}

pub(crate) fn assign(name: &str, value: Expr) -> Expr {
    expr(ExprNode::Assign {
        name: name.into(),
        value: Box::new(value),
    })
}

pub(crate) fn if_(condition: Expr, then_branch: Expr, else_branch: Option<Expr>) -> Expr {
    expr(ExprNode::If {
        condition: Box::new(condition),
        then_branch: Box::new(then_branch),
        else_branch: else_branch.map(Box::new),
    })
}

pub(crate) fn match_fail() -> Expr {
    expr(ExprNode::MatchFail)
}

pub(crate) fn match_return(value: Expr) -> Expr {
    expr(ExprNode::MatchReturn(Box::new(value)))
}

/// A table with a handful of struct and abstract types the tests share:
/// `Foo{x, y}`, `Pair{first, second}`, the abstract `Shape` with
/// `Circle{radius}` and `Square{side}` beneath it, and a host binding
/// `not_a_type` that is not a type.
pub(crate) fn table() -> TypeTable {
    let mut table = TypeTable::new();
    _ = table.insert_struct("Foo", TypeRef::ANY, vec![("x", TypeRef::ANY), ("y", TypeRef::ANY)]);
    _ = table.insert_struct(
        "Pair",
        TypeRef::ANY,
        vec![("first", TypeRef::ANY), ("second", TypeRef::ANY)],
    );
    let shape = table.insert_abstract("Shape", TypeRef::ANY);
    _ = table.insert_struct("Circle", shape, vec![("radius", TypeRef::INT)]);
    _ = table.insert_struct("Square", shape, vec![("side", TypeRef::INT)]);
    table.insert_value("not_a_type");
    table
}
