//! The public entry points of the compiler.

use ecow::EcoString;
use std::sync::Arc;

use crate::ast::{Expr, ExprNode, Statement};
use crate::automaton::minimize::minimize;
use crate::automaton::{Builder, PartialArm};
use crate::bind::pattern::{Bindings, BoundPattern};
use crate::bind::Binder;
use crate::emit;
use crate::error::{Result, Warning};
use crate::reference;
use crate::type_::TypeOracle;


/// The outcome of compiling one match form: the statement list to splice
/// into the host program, the variable holding the expression's value
/// once the statements have run, and any warnings.
#[derive(Debug, Clone)]
pub struct CompiledMatch {
    pub statements: Vec<Statement>,
    pub value: EcoString,
    pub warnings: Vec<Warning>,
}

/// Compile `match scrutinee { pattern => result; ... }` through the
/// deduplicated decision automaton.
pub fn compile_match(
    scrutinee: &Expr,
    arms: &Expr,
    oracle: &dyn TypeOracle,
) -> Result<CompiledMatch> {
    let mut binder = Binder::new(oracle);
    let bound = binder.bind_arms(arms)?;
    let arms = bound.into_iter().map(PartialArm::from_bound).collect();
    let automaton = Builder::new(oracle).build(arms);
    let minimized = minimize(&automaton);
    let (statements, value) = emit::emit(&mut binder, &minimized, scrutinee);
    Ok(CompiledMatch {
        statements,
        value,
        warnings: automaton.warnings,
    })
}

/// Compile the same form arm by arm with no sharing. Semantically
/// equivalent to [`compile_match`]; used as a test oracle.
pub fn compile_match_reference(
    scrutinee: &Expr,
    arms: &Expr,
    oracle: &dyn TypeOracle,
) -> Result<CompiledMatch> {
    let mut binder = Binder::new(oracle);
    let bound = binder.bind_arms(arms)?;
    let (statements, value) = reference::emit_chain(&mut binder, &bound, scrutinee);
    Ok(CompiledMatch {
        statements,
        value,
        warnings: Vec::new(),
    })
}

/// Compile the boolean form: does the scrutinee match the pattern? On a
/// successful match the pattern's variables are assigned in the caller's
/// scope.
pub fn compile_is_match(
    scrutinee: &Expr,
    pattern: &Expr,
    oracle: &dyn TypeOracle,
) -> Result<CompiledMatch> {
    let mut binder = Binder::new(oracle);
    let (bound, bindings) = binder.bind_case(pattern)?;
    let location = pattern.location.clone();

    let mut body = introductions(&bindings, &location);
    body.push(Expr::new(location.clone(), ExprNode::Bool(true)));
    let matched = PartialArm::new(
        0,
        location.clone(),
        bound,
        bindings,
        Arc::new(Expr::new(location.clone(), ExprNode::Block(body))),
    );
    let missed = PartialArm::new(
        1,
        location.clone(),
        BoundPattern::true_at(location.clone()),
        Bindings::new(),
        Arc::new(Expr::new(location, ExprNode::Bool(false))),
    );

    let automaton = Builder::new(oracle).build(vec![matched, missed]);
    let minimized = minimize(&automaton);
    let (statements, value) = emit::emit(&mut binder, &minimized, scrutinee);
    Ok(CompiledMatch {
        statements,
        value,
        warnings: Vec::new(),
    })
}

/// Compile the unary form `pattern = value`: the whole expression
/// evaluates to the value and the pattern's variables are assigned in the
/// caller's scope, or a match failure is raised.
pub fn compile_assignment(
    pattern: &Expr,
    value: &Expr,
    oracle: &dyn TypeOracle,
) -> Result<CompiledMatch> {
    let mut binder = Binder::new(oracle);
    let (bound, bindings) = binder.bind_case(pattern)?;
    let location = pattern.location.clone();

    let mut body = introductions(&bindings, &location);
    body.push(emit::var(crate::bind::SUBJECT, &location));
    let matched = PartialArm::new(
        0,
        location.clone(),
        bound,
        bindings,
        Arc::new(Expr::new(location, ExprNode::Block(body))),
    );

    let automaton = Builder::new(oracle).build(vec![matched]);
    let minimized = minimize(&automaton);
    let (statements, value) = emit::emit(&mut binder, &minimized, value);
    Ok(CompiledMatch {
        statements,
        value,
        warnings: Vec::new(),
    })
}

/// Assignments making the pattern's variables visible to the caller.
fn introductions(bindings: &Bindings, location: &crate::ast::Location) -> Vec<Expr> {
    bindings
        .iter()
        .map(|(name, temp)| {
            Expr::new(
                location.clone(),
                ExprNode::Assign {
                    name: name.clone(),
                    value: Box::new(emit::var(temp, location)),
                },
            )
        })
        .collect()
}
