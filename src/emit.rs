//! Laying the minimized automaton out as straight-line host code.
//!
//! The automaton is placed depth first, true branches before false ones,
//! so that a test's success path falls through to the next statement
//! whenever possible. Labels are introduced only where fall-through is
//! impossible: the false side of every test, and any node some edge has
//! to jump to because its target was placed elsewhere. Arm bodies are
//! treated as small statement lists so the early-exit markers can be
//! found and lowered: `match_fail` jumps to the continuation holding the
//! remaining arms, `match_return` stores the result and jumps to the
//! completion label.

use ecow::{eco_format, EcoString};
use std::collections::{HashMap, HashSet};

use crate::ast::{BinOp, Expr, ExprNode, Location, Statement};
use crate::automaton::minimize::{MinAction, Minimized};
use crate::bind::pattern::{BoundPattern, RelOp};
use crate::bind::{Binder, SUBJECT};

/// The variable the whole match expression's value ends up in.
pub const RESULT: &str = "$result";

pub(crate) fn var(name: &str, location: &Location) -> Expr {
    Expr::new(location.clone(), ExprNode::Var(name.into()))
}

/// The host expression performing a fetch.
pub(crate) fn fetch_value(fetch: &BoundPattern) -> Expr {
    let location = fetch.location().clone();
    let node = match fetch {
        BoundPattern::FetchField { input, label, .. } => ExprNode::FieldAccess {
            container: Box::new(var(input, &location)),
            label: label.clone(),
        },
        BoundPattern::FetchIndex { input, index, .. } => ExprNode::Index {
            container: Box::new(var(input, &location)),
            index: *index,
        },
        BoundPattern::FetchSlice {
            input,
            first,
            from_end,
            ..
        } => ExprNode::Slice {
            container: Box::new(var(input, &location)),
            first: *first,
            from_end: *from_end,
        },
        BoundPattern::FetchLength { input, .. } => {
            ExprNode::Length(Box::new(var(input, &location)))
        }
        BoundPattern::FetchExpression { expression, .. } => return expression.clone(),
        _ => unreachable!("expected a fetch pattern"),
    };
    Expr::new(location, node)
}

/// The host expression deciding a test.
pub(crate) fn test_condition(test: &BoundPattern) -> Expr {
    let location = test.location().clone();
    let node = match test {
        BoundPattern::EqualValue { input, value, .. } => ExprNode::BinOp {
            name: BinOp::Eq,
            left: Box::new(var(input, &location)),
            right: Box::new(value.clone()),
        },
        BoundPattern::TypeTest { input, type_, .. } => ExprNode::TypeCheck {
            value: Box::new(var(input, &location)),
            type_: *type_,
        },
        BoundPattern::Relational {
            input,
            operator,
            constant,
            ..
        } => ExprNode::BinOp {
            name: match operator {
                RelOp::Equal => BinOp::Eq,
                RelOp::GreaterOrEqual => BinOp::GtEqInt,
            },
            left: Box::new(var(input, &location)),
            right: Box::new(Expr::new(location.clone(), ExprNode::Int(*constant))),
        },
        BoundPattern::WhereTest {
            input, inverted, ..
        } => {
            if *inverted {
                ExprNode::Not(Box::new(var(input, &location)))
            } else {
                return var(input, &location);
            }
        }
        _ => unreachable!("expected a test pattern"),
    };
    Expr::new(location, node)
}

/// An emitted statement list under construction, with the label gensym
/// and the shared arm-body lowering. Used by both the automaton emitter
/// and the arm-by-arm reference compiler.
#[derive(Debug)]
pub(crate) struct Code {
    pub statements: Vec<Statement>,
    pub done: EcoString,
    next_label: usize,
}

impl Code {
    pub fn new() -> Self {
        let mut code = Self {
            statements: Vec::new(),
            done: EcoString::default(),
            next_label: 0,
        };
        code.done = code.fresh_label();
        code
    }

    pub fn fresh_label(&mut self) -> EcoString {
        let label = eco_format!("l{}", self.next_label);
        self.next_label += 1;
        label
    }

    pub fn push(&mut self, statement: Statement) {
        self.statements.push(statement);
    }

    /// Lower an arm body. Returns whether the lowered code ended with an
    /// unconditional jump, in which case no jump to the completion label
    /// is needed after it.
    pub fn lower_body(&mut self, body: &Expr, fail: Option<&EcoString>) -> bool {
        let statements: &[Expr] = match &body.node {
            ExprNode::Block(statements) => statements,
            _ => std::slice::from_ref(body),
        };
        if statements.is_empty() {
            self.push(Statement::Assign {
                name: RESULT.into(),
                value: Expr::new(body.location.clone(), ExprNode::Nil),
            });
            return false;
        }
        let mut diverged = false;
        let last = statements.len() - 1;
        for (position, statement) in statements.iter().enumerate() {
            diverged = self.lower_statement(statement, fail, position == last);
        }
        diverged
    }

    fn lower_statement(&mut self, statement: &Expr, fail: Option<&EcoString>, last: bool) -> bool {
        match &statement.node {
            ExprNode::MatchFail => {
                let target = fail
                    .cloned()
                    .expect("a continuation for arms containing match_fail");
                self.push(Statement::Jump(target));
                true
            }

            ExprNode::MatchReturn(value) => {
                self.push(Statement::Assign {
                    name: RESULT.into(),
                    value: (**value).clone(),
                });
                let done = self.done.clone();
                self.push(Statement::Jump(done));
                true
            }

            ExprNode::If {
                condition,
                then_branch,
                else_branch,
            } if statement.contains_early_exit() => {
                let end = self.fresh_label();
                let else_label = match else_branch {
                    Some(_) => self.fresh_label(),
                    None => end.clone(),
                };
                self.push(Statement::JumpUnless {
                    condition: (**condition).clone(),
                    target: else_label.clone(),
                });
                self.lower_branch(then_branch, fail);
                if let Some(else_branch) = else_branch {
                    self.push(Statement::Jump(end.clone()));
                    self.push(Statement::Label(else_label));
                    self.lower_branch(else_branch, fail);
                }
                self.push(Statement::Label(end));
                if last {
                    self.push(Statement::Assign {
                        name: RESULT.into(),
                        value: Expr::new(statement.location.clone(), ExprNode::Nil),
                    });
                }
                false
            }

            _ if last => {
                self.push(Statement::Assign {
                    name: RESULT.into(),
                    value: statement.clone(),
                });
                false
            }

            ExprNode::Assign { name, value } => {
                self.push(Statement::Assign {
                    name: name.clone(),
                    value: (**value).clone(),
                });
                false
            }

            _ => {
                self.push(Statement::Effect(statement.clone()));
                false
            }
        }
    }

    fn lower_branch(&mut self, branch: &Expr, fail: Option<&EcoString>) {
        let statements: &[Expr] = match &branch.node {
            ExprNode::Block(statements) => statements,
            _ => std::slice::from_ref(branch),
        };
        for statement in statements {
            _ = self.lower_statement(statement, fail, false);
        }
    }
}

/// Lay out a minimized automaton as a statement list evaluating to the
/// match result.
pub fn emit(
    binder: &mut Binder<'_>,
    minimized: &Minimized,
    scrutinee: &Expr,
) -> (Vec<Statement>, EcoString) {
    let mut emitter = Emitter {
        binder,
        minimized,
        code: Code::new(),
        order: Vec::new(),
        position: HashMap::new(),
        labels: HashMap::new(),
        location: scrutinee.location.clone(),
    };
    emitter.place(minimized.entry);
    emitter.resolve_labels();
    emitter.run(scrutinee)
}

#[derive(Debug)]
struct Emitter<'a, 'oracle> {
    binder: &'a mut Binder<'oracle>,
    minimized: &'a Minimized,
    code: Code,
    order: Vec<usize>,
    position: HashMap<usize, usize>,
    labels: HashMap<usize, EcoString>,
    location: Location,
}

impl Emitter<'_, '_> {
    /// Choose the position of every reachable node, placing each exactly
    /// once, with a test's true branch immediately after it when free.
    fn place(&mut self, node: usize) {
        if self.position.contains_key(&node) {
            return;
        }
        _ = self.position.insert(node, self.order.len());
        self.order.push(node);
        match self.minimized.nodes[node].action {
            MinAction::Fetch { next, .. } => self.place(next),
            MinAction::Test {
                if_true, if_false, ..
            } => {
                self.place(if_true);
                self.place(if_false);
            }
            MinAction::Success {
                otherwise: Some(otherwise),
                ..
            } => self.place(otherwise),
            MinAction::Success {
                otherwise: None, ..
            }
            | MinAction::Fail => {}
        }
    }

    /// Give a label to every node some edge has to jump to.
    fn resolve_labels(&mut self) {
        let mut targets = HashSet::new();
        for (position, &node) in self.order.iter().enumerate() {
            match self.minimized.nodes[node].action {
                MinAction::Fetch { next, .. } => {
                    if !falls_through(&self.position, position, next) {
                        _ = targets.insert(next);
                    }
                }
                MinAction::Test {
                    if_true, if_false, ..
                } => {
                    _ = targets.insert(if_false);
                    if !falls_through(&self.position, position, if_true) {
                        _ = targets.insert(if_true);
                    }
                }
                MinAction::Success {
                    otherwise: Some(otherwise),
                    ..
                } => {
                    _ = targets.insert(otherwise);
                }
                MinAction::Success {
                    otherwise: None, ..
                }
                | MinAction::Fail => {}
            }
        }
        for &node in &self.order {
            if targets.contains(&node) {
                let label = self.code.fresh_label();
                _ = self.labels.insert(node, label);
            }
        }
    }

    fn run(mut self, scrutinee: &Expr) -> (Vec<Statement>, EcoString) {
        let assertions = self.binder.assertions().to_vec();
        for assertion in assertions {
            self.code.push(Statement::Assert {
                location: assertion.location,
                annotation: assertion.annotation,
                expected: assertion.expected,
            });
        }
        self.code.push(Statement::Assign {
            name: SUBJECT.into(),
            value: scrutinee.clone(),
        });

        for position in 0..self.order.len() {
            let node = self.order[position];
            if let Some(label) = self.labels.get(&node) {
                self.code.push(Statement::Label(label.clone()));
            }
            self.emit_node(position, node);
        }

        let done = self.code.done.clone();
        self.code.push(Statement::Label(done));
        tracing::debug!(statements = self.code.statements.len(), "emitted match");
        (self.code.statements, RESULT.into())
    }

    fn emit_node(&mut self, position: usize, node: usize) {
        let action = self.minimized.nodes[node].action.clone();
        match action {
            MinAction::Fetch { fetch, next } => {
                let temp = self.binder.get_temp(&fetch);
                self.code.push(Statement::Assign {
                    name: temp,
                    value: fetch_value(&fetch),
                });
                self.continue_to(position, next);
            }

            MinAction::Test {
                test,
                if_true,
                if_false,
            } => {
                let target = self.label_of(if_false);
                self.code.push(Statement::JumpUnless {
                    condition: test_condition(&test),
                    target,
                });
                self.continue_to(position, if_true);
            }

            MinAction::Success { arm, otherwise } => {
                self.code.push(Statement::Site(arm.location.clone()));
                let fail = otherwise.map(|otherwise| self.label_of(otherwise));
                let diverged = self.code.lower_body(&arm.body, fail.as_ref());
                if !diverged && position + 1 != self.order.len() {
                    let done = self.code.done.clone();
                    self.code.push(Statement::Jump(done));
                }
            }

            MinAction::Fail => {
                self.code.push(Statement::FailMatch {
                    location: self.location.clone(),
                    subject: var(SUBJECT, &self.location),
                });
            }
        }
    }

    fn continue_to(&mut self, position: usize, target: usize) {
        if !falls_through(&self.position, position, target) {
            let label = self.label_of(target);
            self.code.push(Statement::Jump(label));
        }
    }

    fn label_of(&self, node: usize) -> EcoString {
        self.labels
            .get(&node)
            .cloned()
            .expect("a label for every jump target")
    }
}

fn falls_through(position: &HashMap<usize, usize>, from: usize, target: usize) -> bool {
    position.get(&target).copied() == Some(from + 1)
}
