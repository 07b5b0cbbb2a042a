//! Rewriting bound patterns under the outcome of a chosen action.
//!
//! When the automaton performs a fetch, every structurally equal fetch in
//! every surviving arm is already done and becomes `True`. When it decides
//! a test, the test itself becomes `True` or `False` depending on the
//! branch, and other tests over the same temporary may be decided with it:
//! a narrower type test subsumes a wider one, a decided length equality
//! rules the other lengths out, and two checks of the same guard collapse
//! whatever their polarity. Conjunctions and disjunctions re-normalise
//! after every rewrite so that arms shrink or disappear.

use crate::bind::pattern::{and, or, BoundPattern, RelOp};
use crate::type_::{TypeOracle, TypeRef};

/// Replace every subpattern structurally equal to the performed fetch
/// with `True`.
pub fn remove_fetch(pattern: &BoundPattern, fetch: &BoundPattern) -> BoundPattern {
    if pattern == fetch {
        return BoundPattern::true_at(pattern.location().clone());
    }
    match pattern {
        BoundPattern::And {
            location,
            subpatterns,
        } => and(
            location.clone(),
            subpatterns
                .iter()
                .map(|subpattern| remove_fetch(subpattern, fetch))
                .collect(),
        ),
        BoundPattern::Or {
            location,
            subpatterns,
        } => or(
            location.clone(),
            subpatterns
                .iter()
                .map(|subpattern| remove_fetch(subpattern, fetch))
                .collect(),
        ),
        _ => pattern.clone(),
    }
}

/// Rewrite a pattern knowing that `test` evaluated to `sense`.
pub fn apply_test(
    pattern: &BoundPattern,
    test: &BoundPattern,
    sense: bool,
    oracle: &dyn TypeOracle,
) -> BoundPattern {
    let location = pattern.location().clone();
    if pattern == test {
        return BoundPattern::boolean(sense, location);
    }

    match (pattern, test) {
        (
            BoundPattern::TypeTest {
                input: required_input,
                type_: required,
                ..
            },
            BoundPattern::TypeTest {
                input: tested_input,
                type_: tested,
                ..
            },
        ) if required_input == tested_input => {
            if sense {
                if oracle.subtype(*tested, *required) {
                    BoundPattern::boolean(true, location)
                } else if oracle.intersect(*tested, *required) == TypeRef::NEVER {
                    BoundPattern::boolean(false, location)
                } else {
                    // Either strictly narrower than the decided test or
                    // overlapping it; the check is still needed.
                    pattern.clone()
                }
            } else if oracle.subtype(*required, *tested) {
                BoundPattern::boolean(false, location)
            } else {
                pattern.clone()
            }
        }

        (
            BoundPattern::WhereTest {
                input: required_input,
                inverted: required_inverted,
                ..
            },
            BoundPattern::WhereTest {
                input: tested_input,
                inverted: tested_inverted,
                ..
            },
        ) if required_input == tested_input => {
            BoundPattern::boolean((required_inverted == tested_inverted) == sense, location)
        }

        (
            BoundPattern::Relational {
                input: required_input,
                operator,
                constant,
                ..
            },
            BoundPattern::Relational {
                input: tested_input,
                operator: tested_operator,
                constant: tested_constant,
                ..
            },
        ) if required_input == tested_input => {
            match relational_decides(*tested_operator, *tested_constant, sense, *operator, *constant)
            {
                Some(value) => BoundPattern::boolean(value, location),
                None => pattern.clone(),
            }
        }

        (
            BoundPattern::EqualValue {
                input: required_input,
                value,
                ..
            },
            BoundPattern::EqualValue {
                input: tested_input,
                value: tested_value,
                ..
            },
        ) if required_input == tested_input
            && sense
            && value.node.is_literal()
            && tested_value.node.is_literal() =>
        {
            // Distinct literals denote distinct values, so at most one
            // equality over the same temporary can hold.
            BoundPattern::boolean(value == tested_value, location)
        }

        (
            BoundPattern::And {
                location,
                subpatterns,
            },
            _,
        ) => and(
            location.clone(),
            subpatterns
                .iter()
                .map(|subpattern| apply_test(subpattern, test, sense, oracle))
                .collect(),
        ),
        (
            BoundPattern::Or {
                location,
                subpatterns,
            },
            _,
        ) => or(
            location.clone(),
            subpatterns
                .iter()
                .map(|subpattern| apply_test(subpattern, test, sense, oracle))
                .collect(),
        ),

        _ => pattern.clone(),
    }
}

/// Whether knowing `x <tested_operator> tested_constant == tested_sense`
/// decides `x <operator> constant`, and if so what it decides it to.
fn relational_decides(
    tested_operator: RelOp,
    tested_constant: i64,
    tested_sense: bool,
    operator: RelOp,
    constant: i64,
) -> Option<bool> {
    match (tested_operator, tested_sense) {
        // x == c
        (RelOp::Equal, true) => Some(match operator {
            RelOp::Equal => constant == tested_constant,
            RelOp::GreaterOrEqual => tested_constant >= constant,
        }),
        // x != c
        (RelOp::Equal, false) => match operator {
            RelOp::Equal if constant == tested_constant => Some(false),
            RelOp::Equal | RelOp::GreaterOrEqual => None,
        },
        // x >= c
        (RelOp::GreaterOrEqual, true) => match operator {
            RelOp::GreaterOrEqual if constant <= tested_constant => Some(true),
            RelOp::Equal if constant < tested_constant => Some(false),
            RelOp::Equal | RelOp::GreaterOrEqual => None,
        },
        // x < c
        (RelOp::GreaterOrEqual, false) => match operator {
            RelOp::GreaterOrEqual if constant >= tested_constant => Some(false),
            RelOp::Equal if constant >= tested_constant => Some(false),
            RelOp::Equal | RelOp::GreaterOrEqual => None,
        },
    }
}
