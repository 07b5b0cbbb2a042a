//! The bound-pattern algebra: the internal representation the binder
//! lowers surface patterns into.
//!
//! A bound pattern is either a *fetch* (a pure projection from an input
//! temporary into a new temporary), a *test* (a boolean predicate over a
//! temporary), a conjunction, a disjunction, or one of the trivial
//! patterns `True` and `False`. Fetches do work, tests branch; keeping
//! them distinct is what lets the automaton share a fetch between arms
//! and give a test two successors.
//!
//! Equality and hashing ignore source locations. Two structurally equal
//! fetches are *the same* fetch: they are interned to a single temporary
//! by the binder, and replacing one with `True` in the automaton replaces
//! every occurrence.

use ecow::EcoString;
use std::hash::{Hash, Hasher};
use vec1::Vec1;

use crate::ast::{Expr, Location};
use crate::type_::TypeRef;

/// An insertion-ordered immutable mapping from user-visible variable names
/// to the temporaries holding their values. Clones are cheap; every
/// automaton node's arms carry their own copy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Bindings(im::Vector<(EcoString, EcoString)>);

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&EcoString> {
        self.0
            .iter()
            .find(|(bound, _)| bound == name)
            .map(|(_, temp)| temp)
    }

    /// Bind a name, replacing any existing binding in place.
    pub fn bind(&self, name: EcoString, temp: EcoString) -> Self {
        let mut inner = self.0.clone();
        match inner.iter().position(|(bound, _)| *bound == name) {
            Some(index) => {
                _ = inner.set(index, (name, temp));
            }
            None => inner.push_back((name, temp)),
        }
        Self(inner)
    }

    pub fn singleton(name: EcoString, temp: EcoString) -> Self {
        Self::new().bind(name, temp)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(EcoString, EcoString)> {
        self.0.iter()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// The comparison operators needed by sequence length checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelOp {
    Equal,
    GreaterOrEqual,
}

#[derive(Debug, Clone)]
pub enum BoundPattern {
    /// Always matches, no runtime work.
    True { location: Location },
    /// Never matches; produced by simplification only.
    False { location: Location },

    /// The input equals the value of a host expression.
    EqualValue {
        location: Location,
        input: EcoString,
        value: Expr,
        bindings: Bindings,
    },
    /// The input is a member of a resolved type.
    TypeTest {
        location: Location,
        input: EcoString,
        type_: TypeRef,
    },
    /// Numeric comparison of a temporary against a constant.
    Relational {
        location: Location,
        input: EcoString,
        operator: RelOp,
        constant: i64,
    },
    /// Boolean check of a precomputed guard temporary.
    WhereTest {
        location: Location,
        input: EcoString,
        inverted: bool,
    },

    /// Project a named field out of the input.
    FetchField {
        location: Location,
        input: EcoString,
        label: EcoString,
        type_: TypeRef,
    },
    /// Project a one-based element; negative indices count from the end.
    FetchIndex {
        location: Location,
        input: EcoString,
        index: i64,
        type_: TypeRef,
    },
    /// Project the sub-sequence between `first` skipped elements at the
    /// front and `from_end` skipped elements at the back.
    FetchSlice {
        location: Location,
        input: EcoString,
        first: u32,
        from_end: u32,
        type_: TypeRef,
    },
    /// Project the input's length.
    FetchLength {
        location: Location,
        input: EcoString,
        type_: TypeRef,
    },
    /// Evaluate a host expression over already-fetched temporaries: guard
    /// results and the phi merges of disjunction bindings. When `key` is
    /// set the fetch's temporary is the key itself rather than an interned
    /// gensym, which is how the two sides of a disjunction are made to
    /// store into the same phi temporary.
    FetchExpression {
        location: Location,
        input: EcoString,
        expression: Expr,
        bindings: Bindings,
        key: Option<EcoString>,
        type_: TypeRef,
    },

    And {
        location: Location,
        subpatterns: Vec1<BoundPattern>,
    },
    Or {
        location: Location,
        subpatterns: Vec1<BoundPattern>,
    },
}

impl BoundPattern {
    pub fn location(&self) -> &Location {
        match self {
            BoundPattern::True { location }
            | BoundPattern::False { location }
            | BoundPattern::EqualValue { location, .. }
            | BoundPattern::TypeTest { location, .. }
            | BoundPattern::Relational { location, .. }
            | BoundPattern::WhereTest { location, .. }
            | BoundPattern::FetchField { location, .. }
            | BoundPattern::FetchIndex { location, .. }
            | BoundPattern::FetchSlice { location, .. }
            | BoundPattern::FetchLength { location, .. }
            | BoundPattern::FetchExpression { location, .. }
            | BoundPattern::And { location, .. }
            | BoundPattern::Or { location, .. } => location,
        }
    }

    pub fn is_fetch(&self) -> bool {
        matches!(
            self,
            BoundPattern::FetchField { .. }
                | BoundPattern::FetchIndex { .. }
                | BoundPattern::FetchSlice { .. }
                | BoundPattern::FetchLength { .. }
                | BoundPattern::FetchExpression { .. }
        )
    }

    pub fn is_test(&self) -> bool {
        matches!(
            self,
            BoundPattern::EqualValue { .. }
                | BoundPattern::TypeTest { .. }
                | BoundPattern::Relational { .. }
                | BoundPattern::WhereTest { .. }
        )
    }

    /// Whether this pattern matches every input. A conjunction must be
    /// irrefutable throughout; a disjunction needs one irrefutable
    /// alternative. Fetches always succeed but still cost work, so they
    /// do not count.
    pub fn is_irrefutable(&self) -> bool {
        match self {
            BoundPattern::True { .. } => true,
            BoundPattern::And { subpatterns, .. } => {
                subpatterns.iter().all(BoundPattern::is_irrefutable)
            }
            BoundPattern::Or { subpatterns, .. } => {
                subpatterns.iter().any(BoundPattern::is_irrefutable)
            }
            BoundPattern::False { .. }
            | BoundPattern::EqualValue { .. }
            | BoundPattern::TypeTest { .. }
            | BoundPattern::Relational { .. }
            | BoundPattern::WhereTest { .. }
            | BoundPattern::FetchField { .. }
            | BoundPattern::FetchIndex { .. }
            | BoundPattern::FetchSlice { .. }
            | BoundPattern::FetchLength { .. }
            | BoundPattern::FetchExpression { .. } => false,
        }
    }

    pub fn true_at(location: Location) -> Self {
        BoundPattern::True { location }
    }

    pub fn false_at(location: Location) -> Self {
        BoundPattern::False { location }
    }

    pub fn boolean(value: bool, location: Location) -> Self {
        if value {
            Self::true_at(location)
        } else {
            Self::false_at(location)
        }
    }
}

/// Conjoin patterns, applying the boolean laws: nested conjunctions are
/// flattened, `True` parts are dropped, and any `False` part makes the
/// whole conjunction `False`.
pub fn and(location: Location, parts: Vec<BoundPattern>) -> BoundPattern {
    let mut flattened = Vec::with_capacity(parts.len());
    for part in parts {
        match part {
            BoundPattern::True { .. } => {}
            BoundPattern::False { .. } => return BoundPattern::false_at(location),
            BoundPattern::And { subpatterns, .. } => flattened.extend(subpatterns.into_vec()),
            other => flattened.push(other),
        }
    }
    match flattened.len() {
        0 => BoundPattern::true_at(location),
        1 => flattened.remove(0),
        _ => BoundPattern::And {
            location,
            subpatterns: Vec1::try_from_vec(flattened).expect("conjunction with two subpatterns"),
        },
    }
}

/// Disjoin patterns: nested disjunctions are flattened, `False`
/// alternatives are dropped, and alternatives after the first irrefutable
/// one can never be tried and are dropped with it retained.
pub fn or(location: Location, parts: Vec<BoundPattern>) -> BoundPattern {
    let mut flattened: Vec<BoundPattern> = Vec::with_capacity(parts.len());
    'parts: for part in parts {
        let alternatives = match part {
            BoundPattern::False { .. } => continue,
            BoundPattern::Or { subpatterns, .. } => subpatterns.into_vec(),
            other => vec![other],
        };
        for alternative in alternatives {
            let stop = alternative.is_irrefutable();
            flattened.push(alternative);
            if stop {
                break 'parts;
            }
        }
    }
    match flattened.len() {
        0 => BoundPattern::false_at(location),
        1 => flattened.remove(0),
        _ => BoundPattern::Or {
            location,
            subpatterns: Vec1::try_from_vec(flattened).expect("disjunction with two subpatterns"),
        },
    }
}

impl PartialEq for BoundPattern {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (BoundPattern::True { .. }, BoundPattern::True { .. })
            | (BoundPattern::False { .. }, BoundPattern::False { .. }) => true,

            (
                BoundPattern::EqualValue {
                    input: a_input,
                    value: a_value,
                    bindings: a_bindings,
                    ..
                },
                BoundPattern::EqualValue {
                    input: b_input,
                    value: b_value,
                    bindings: b_bindings,
                    ..
                },
            ) => a_input == b_input && a_value == b_value && a_bindings == b_bindings,

            (
                BoundPattern::TypeTest {
                    input: a_input,
                    type_: a_type,
                    ..
                },
                BoundPattern::TypeTest {
                    input: b_input,
                    type_: b_type,
                    ..
                },
            ) => a_input == b_input && a_type == b_type,

            (
                BoundPattern::Relational {
                    input: a_input,
                    operator: a_operator,
                    constant: a_constant,
                    ..
                },
                BoundPattern::Relational {
                    input: b_input,
                    operator: b_operator,
                    constant: b_constant,
                    ..
                },
            ) => a_input == b_input && a_operator == b_operator && a_constant == b_constant,

            (
                BoundPattern::WhereTest {
                    input: a_input,
                    inverted: a_inverted,
                    ..
                },
                BoundPattern::WhereTest {
                    input: b_input,
                    inverted: b_inverted,
                    ..
                },
            ) => a_input == b_input && a_inverted == b_inverted,

            (
                BoundPattern::FetchField {
                    input: a_input,
                    label: a_label,
                    ..
                },
                BoundPattern::FetchField {
                    input: b_input,
                    label: b_label,
                    ..
                },
            ) => a_input == b_input && a_label == b_label,

            (
                BoundPattern::FetchIndex {
                    input: a_input,
                    index: a_index,
                    ..
                },
                BoundPattern::FetchIndex {
                    input: b_input,
                    index: b_index,
                    ..
                },
            ) => a_input == b_input && a_index == b_index,

            (
                BoundPattern::FetchSlice {
                    input: a_input,
                    first: a_first,
                    from_end: a_from_end,
                    ..
                },
                BoundPattern::FetchSlice {
                    input: b_input,
                    first: b_first,
                    from_end: b_from_end,
                    ..
                },
            ) => a_input == b_input && a_first == b_first && a_from_end == b_from_end,

            (
                BoundPattern::FetchLength { input: a_input, .. },
                BoundPattern::FetchLength { input: b_input, .. },
            ) => a_input == b_input,

            (
                BoundPattern::FetchExpression {
                    input: a_input,
                    expression: a_expression,
                    bindings: a_bindings,
                    key: a_key,
                    ..
                },
                BoundPattern::FetchExpression {
                    input: b_input,
                    expression: b_expression,
                    bindings: b_bindings,
                    key: b_key,
                    ..
                },
            ) => {
                a_input == b_input
                    && a_expression == b_expression
                    && a_bindings == b_bindings
                    && a_key == b_key
            }

            (
                BoundPattern::And {
                    subpatterns: a_subpatterns,
                    ..
                },
                BoundPattern::And {
                    subpatterns: b_subpatterns,
                    ..
                },
            )
            | (
                BoundPattern::Or {
                    subpatterns: a_subpatterns,
                    ..
                },
                BoundPattern::Or {
                    subpatterns: b_subpatterns,
                    ..
                },
            ) => a_subpatterns == b_subpatterns,

            _ => false,
        }
    }
}

impl Eq for BoundPattern {}

impl Hash for BoundPattern {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            BoundPattern::True { .. } | BoundPattern::False { .. } => {}

            BoundPattern::EqualValue {
                input,
                value,
                bindings,
                ..
            } => {
                input.hash(state);
                value.hash(state);
                bindings.hash(state);
            }

            BoundPattern::TypeTest { input, type_, .. } => {
                input.hash(state);
                type_.hash(state);
            }

            BoundPattern::Relational {
                input,
                operator,
                constant,
                ..
            } => {
                input.hash(state);
                operator.hash(state);
                constant.hash(state);
            }

            BoundPattern::WhereTest {
                input, inverted, ..
            } => {
                input.hash(state);
                inverted.hash(state);
            }

            BoundPattern::FetchField { input, label, .. } => {
                input.hash(state);
                label.hash(state);
            }

            BoundPattern::FetchIndex { input, index, .. } => {
                input.hash(state);
                index.hash(state);
            }

            BoundPattern::FetchSlice {
                input,
                first,
                from_end,
                ..
            } => {
                input.hash(state);
                first.hash(state);
                from_end.hash(state);
            }

            BoundPattern::FetchLength { input, .. } => input.hash(state),

            BoundPattern::FetchExpression {
                input,
                expression,
                bindings,
                key,
                ..
            } => {
                input.hash(state);
                expression.hash(state);
                bindings.hash(state);
                key.hash(state);
            }

            BoundPattern::And { subpatterns, .. } | BoundPattern::Or { subpatterns, .. } => {
                for subpattern in subpatterns.iter() {
                    subpattern.hash(state);
                }
            }
        }
    }
}
