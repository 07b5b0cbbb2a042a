//! The brute-force reference compiler.
//!
//! Each arm is compiled into its own straight-line `if`/`else` chain with
//! no sharing between arms: a test that fails jumps to the next arm's
//! label, and every arm re-emits every fetch it needs. The output is
//! semantically equivalent to the automaton compiler's and exists to be
//! diffed against it in tests.

use ecow::EcoString;

use crate::ast::{Expr, Statement};
use crate::bind::pattern::BoundPattern;
use crate::bind::{Binder, BoundArm, SUBJECT};
use crate::emit::{fetch_value, test_condition, var, Code, RESULT};

/// Compile bound arms as an arm-by-arm chain of checks over the subject.
pub fn emit_chain(
    binder: &mut Binder<'_>,
    arms: &[BoundArm],
    scrutinee: &Expr,
) -> (Vec<Statement>, EcoString) {
    let mut code = Code::new();
    for assertion in binder.assertions().to_vec() {
        code.push(Statement::Assert {
            location: assertion.location,
            annotation: assertion.annotation,
            expected: assertion.expected,
        });
    }
    code.push(Statement::Assign {
        name: SUBJECT.into(),
        value: scrutinee.clone(),
    });

    for arm in arms {
        let next_arm = code.fresh_label();
        emit_pattern(binder, &mut code, &arm.pattern, &next_arm);
        code.push(Statement::Site(arm.location.clone()));
        let diverged = code.lower_body(&arm.body, Some(&next_arm));
        if !diverged {
            let done = code.done.clone();
            code.push(Statement::Jump(done));
        }
        code.push(Statement::Label(next_arm));
    }

    code.push(Statement::FailMatch {
        location: scrutinee.location.clone(),
        subject: var(SUBJECT, &scrutinee.location),
    });
    let done = code.done.clone();
    code.push(Statement::Label(done));
    (code.statements, RESULT.into())
}

fn emit_pattern(binder: &mut Binder<'_>, code: &mut Code, pattern: &BoundPattern, fail: &EcoString) {
    match pattern {
        BoundPattern::True { .. } => {}
        BoundPattern::False { .. } => code.push(Statement::Jump(fail.clone())),

        BoundPattern::And { subpatterns, .. } => {
            for subpattern in subpatterns.iter() {
                emit_pattern(binder, code, subpattern, fail);
            }
        }

        BoundPattern::Or { subpatterns, .. } => {
            let matched = code.fresh_label();
            let last = subpatterns.len() - 1;
            for (position, alternative) in subpatterns.iter().enumerate() {
                if position == last {
                    emit_pattern(binder, code, alternative, fail);
                } else {
                    let next_alternative = code.fresh_label();
                    emit_pattern(binder, code, alternative, &next_alternative);
                    code.push(Statement::Jump(matched.clone()));
                    code.push(Statement::Label(next_alternative));
                }
            }
            code.push(Statement::Label(matched));
        }

        _ if pattern.is_fetch() => {
            let temp = binder.get_temp(pattern);
            code.push(Statement::Assign {
                name: temp,
                value: fetch_value(pattern),
            });
        }

        _ => code.push(Statement::JumpUnless {
            condition: test_condition(pattern),
            target: fail.clone(),
        }),
    }
}
