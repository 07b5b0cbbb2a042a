//! Lowering surface patterns into bound patterns.
//!
//! The binder owns the state shared by a whole compilation: the gensym
//! counter, the fetch-to-temporary intern cache, the types known for each
//! temporary, and the runtime type assertions accumulated while resolving
//! type annotations. Interning is what makes deduplication work later on:
//! the same projection written in ten arms becomes one fetch bound to one
//! temporary, and the automaton only ever performs it once.

use ecow::{eco_format, EcoString};
use itertools::Itertools;
use std::collections::{HashMap, HashSet};

use crate::ast::{BinOp, Expr, ExprNode, Location};
use crate::bind::pattern::{and, or, Bindings, BoundPattern, RelOp};
use crate::error::{Error, Result};
use crate::type_::{TypeOracle, TypeRef};

pub mod pattern;


/// The temporary holding the evaluated scrutinee. A `$` prefix keeps every
/// generated name out of the user's namespace.
pub const SUBJECT: &str = "$subject";

/// A check recorded at compile time and re-run by the emitted code: the
/// annotation expression must still resolve to the same type at the match
/// site that it resolved to here.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeAssertion {
    pub location: Location,
    pub annotation: Expr,
    pub expected: TypeRef,
}

/// One arm lowered to its internal form: the bound pattern, the variables
/// the pattern introduces, and the result body with pattern-variable
/// references already rewritten to their temporaries.
#[derive(Debug, Clone)]
pub struct BoundArm {
    pub index: usize,
    pub location: Location,
    pub pattern: BoundPattern,
    pub bindings: Bindings,
    pub body: Expr,
}

#[derive(Debug)]
pub struct Binder<'oracle> {
    oracle: &'oracle dyn TypeOracle,
    uid: usize,
    /// Fetches interned by structural equality: the temporary's name is a
    /// pure function of the fetch's key within one compilation.
    temps: HashMap<BoundPattern, EcoString>,
    temp_types: HashMap<EcoString, TypeRef>,
    assertions: Vec<TypeAssertion>,
    asserted: HashSet<Expr>,
    /// Every name bound by any pattern of the arm currently being lowered,
    /// including names later dropped because only one side of a
    /// disjunction bound them. Referencing a dropped name is an error
    /// rather than a silent fall-back to a host variable.
    pattern_variables: HashSet<EcoString>,
}

impl<'oracle> Binder<'oracle> {
    pub fn new(oracle: &'oracle dyn TypeOracle) -> Self {
        Self {
            oracle,
            uid: 0,
            temps: HashMap::new(),
            temp_types: HashMap::new(),
            assertions: Vec::new(),
            asserted: HashSet::new(),
            pattern_variables: HashSet::new(),
        }
    }

    pub fn input(&self) -> EcoString {
        SUBJECT.into()
    }

    pub fn oracle(&self) -> &'oracle dyn TypeOracle {
        self.oracle
    }

    pub fn assertions(&self) -> &[TypeAssertion] {
        &self.assertions
    }

    fn fresh_temp(&mut self) -> EcoString {
        let temp = eco_format!("${}", self.uid);
        self.uid += 1;
        temp
    }

    /// The temporary a fetch stores into. Structurally equal fetches get
    /// the same temporary; a keyed expression fetch stores into its key,
    /// which is how both sides of a disjunction share a phi temporary.
    pub fn get_temp(&mut self, fetch: &BoundPattern) -> EcoString {
        if let BoundPattern::FetchExpression { key: Some(key), .. } = fetch {
            _ = self.temp_types.insert(key.clone(), fetch_type(fetch));
            return key.clone();
        }
        if let Some(temp) = self.temps.get(fetch) {
            return temp.clone();
        }
        let temp = self.fresh_temp();
        _ = self.temp_types.insert(temp.clone(), fetch_type(fetch));
        _ = self.temps.insert(fetch.clone(), temp.clone());
        temp
    }

    pub fn type_of(&self, temp: &str) -> TypeRef {
        self.temp_types.get(temp).copied().unwrap_or(TypeRef::ANY)
    }

    /// Lower a whole arms block: either a block of `pattern => result`
    /// cases or a single bare case.
    pub fn bind_arms(&mut self, arms: &Expr) -> Result<Vec<BoundArm>> {
        let cases: &[Expr] = match &arms.node {
            ExprNode::Block(statements) => statements,
            ExprNode::Arm { .. } => std::slice::from_ref(arms),
            _ => {
                return Err(Error::UnrecognizedBlock {
                    location: arms.location.clone(),
                })
            }
        };

        let mut bound_arms = Vec::with_capacity(cases.len());
        for (index, case) in cases.iter().enumerate() {
            let ExprNode::Arm { pattern, body } = &case.node else {
                return Err(Error::UnrecognizedCase {
                    location: case.location.clone(),
                });
            };
            self.pattern_variables.clear();
            let input = self.input();
            let (pattern, bindings) = self.bind_pattern(pattern, &input, Bindings::new())?;
            let (body, _) = self.substitute(body, &bindings)?;
            bound_arms.push(BoundArm {
                index,
                location: case.location.clone(),
                pattern,
                bindings,
                body,
            });
        }
        tracing::debug!(arms = bound_arms.len(), "bound match arms");
        Ok(bound_arms)
    }

    /// Lower a single pattern against the subject, for the boolean and
    /// assignment forms of the compiler.
    pub fn bind_case(&mut self, pattern: &Expr) -> Result<(BoundPattern, Bindings)> {
        self.pattern_variables.clear();
        let input = self.input();
        self.bind_pattern(pattern, &input, Bindings::new())
    }

    /// Lower one surface pattern testing the value held by `input`.
    /// Returns the bound pattern together with the bindings extended by
    /// any variables the pattern introduced.
    pub fn bind_pattern(
        &mut self,
        source: &Expr,
        input: &EcoString,
        bindings: Bindings,
    ) -> Result<(BoundPattern, Bindings)> {
        let location = source.location.clone();
        match &source.node {
            ExprNode::Discard => Ok((BoundPattern::true_at(location), bindings)),

            ExprNode::Int(_)
            | ExprNode::String(_)
            | ExprNode::Symbol(_)
            | ExprNode::Bool(_)
            | ExprNode::Nil
            | ExprNode::Quote(_) => Ok((
                BoundPattern::EqualValue {
                    location,
                    input: input.clone(),
                    value: source.clone(),
                    bindings: Bindings::new(),
                },
                bindings,
            )),

            ExprNode::Interpolate(inner) => {
                let (value, captured) = self.substitute(inner, &bindings)?;
                Ok((
                    BoundPattern::EqualValue {
                        location,
                        input: input.clone(),
                        value,
                        bindings: captured,
                    },
                    bindings,
                ))
            }

            ExprNode::Var(name) => match bindings.get(name) {
                // A repeated variable is an equality test against the
                // value captured at its first occurrence.
                Some(temp) => {
                    let temp = temp.clone();
                    Ok((
                        BoundPattern::EqualValue {
                            location: location.clone(),
                            input: input.clone(),
                            value: Expr::new(location, ExprNode::Var(temp.clone())),
                            bindings: Bindings::singleton(name.clone(), temp),
                        },
                        bindings,
                    ))
                }
                None => {
                    _ = self.pattern_variables.insert(name.clone());
                    Ok((
                        BoundPattern::true_at(location),
                        bindings.bind(name.clone(), input.clone()),
                    ))
                }
            },

            ExprNode::Ascribe {
                pattern,
                annotation,
            } => self.bind_ascription(source, pattern.as_deref(), annotation, input, bindings),

            ExprNode::Call {
                function,
                arguments,
            } => self.bind_constructor(source, function, arguments, input, bindings),

            ExprNode::Tuple(elements) => {
                self.bind_sequence(location, elements, TypeRef::TUPLE, input, bindings)
            }
            ExprNode::Array(elements) => {
                self.bind_sequence(location, elements, TypeRef::SEQUENCE, input, bindings)
            }

            ExprNode::BinOp {
                name: BinOp::And,
                left,
                right,
            } => {
                let (left_bound, bindings) = self.bind_pattern(left, input, bindings)?;
                let (right_bound, bindings) = self.bind_pattern(right, input, bindings)?;
                Ok((and(location, vec![left_bound, right_bound]), bindings))
            }

            ExprNode::BinOp {
                name: BinOp::Or,
                left,
                right,
            } => self.bind_disjunction(source, left, right, input, bindings),

            ExprNode::Where { pattern, guard } => {
                let (bound, bindings) = self.bind_pattern(pattern, input, bindings)?;
                let shredded = self.shred_where(guard, false, &bindings)?;
                Ok((and(location, vec![bound, shredded]), bindings))
            }

            ExprNode::BinOp { .. }
            | ExprNode::Not(_)
            | ExprNode::Splat(_)
            | ExprNode::Arm { .. }
            | ExprNode::Block(_)
            | ExprNode::Assign { .. }
            | ExprNode::If { .. }
            | ExprNode::FieldAccess { .. }
            | ExprNode::Index { .. }
            | ExprNode::Slice { .. }
            | ExprNode::Length(_)
            | ExprNode::TypeCheck { .. }
            | ExprNode::MatchFail
            | ExprNode::MatchReturn(_) => Err(Error::UnrecognizedPattern { location }),
        }
    }

    fn bind_ascription(
        &mut self,
        source: &Expr,
        pattern: Option<&Expr>,
        annotation: &Expr,
        input: &EcoString,
        bindings: Bindings,
    ) -> Result<(BoundPattern, Bindings)> {
        let location = source.location.clone();
        // `::(T where g)` splits into the type part and a guard over the
        // pattern's bindings.
        let (type_expression, guard) = match &annotation.node {
            ExprNode::Where { pattern, guard } => (pattern.as_ref(), Some(guard.as_ref())),
            _ => (annotation, None),
        };
        let type_ = self.resolve_annotation(type_expression, &source.location)?;

        let mut parts = Vec::new();
        if type_ != TypeRef::ANY {
            parts.push(BoundPattern::TypeTest {
                location: location.clone(),
                input: input.clone(),
                type_,
            });
        }
        let mut bindings = bindings;
        if let Some(pattern) = pattern {
            let (bound, extended) = self.bind_pattern(pattern, input, bindings)?;
            bindings = extended;
            parts.push(bound);
        }
        if let Some(guard) = guard {
            parts.push(self.shred_where(guard, false, &bindings)?);
        }
        Ok((and(location, parts), bindings))
    }

    fn bind_constructor(
        &mut self,
        source: &Expr,
        function: &EcoString,
        arguments: &[crate::ast::CallArg],
        input: &EcoString,
        mut bindings: Bindings,
    ) -> Result<(BoundPattern, Bindings)> {
        let location = source.location.clone();
        let annotation = Expr::new(location.clone(), ExprNode::Var(function.clone()));
        let type_ = self.resolve_annotation(&annotation, &source.location)?;
        let field_names = self.oracle.field_names(type_);

        let named = arguments
            .iter()
            .filter(|argument| argument.label.is_some())
            .count();
        if named != 0 && named != arguments.len() {
            return Err(Error::MixedFieldStyle { location });
        }

        let fields: Vec<(EcoString, &Expr)> = if named == 0 {
            if arguments.len() != field_names.len() {
                return Err(Error::WrongFieldCount {
                    location,
                    name: function.clone(),
                    fields: field_names.len(),
                    patterns: arguments.len(),
                });
            }
            field_names
                .iter()
                .cloned()
                .zip(arguments.iter().map(|argument| &argument.value))
                .collect()
        } else {
            let mut seen = HashSet::new();
            let mut fields = Vec::with_capacity(arguments.len());
            for argument in arguments {
                let label = argument.label.clone().expect("argument with a label");
                if !seen.insert(label.clone()) {
                    return Err(Error::DuplicateNamedField {
                        location: argument.location.clone(),
                        label,
                    });
                }
                if !field_names.contains(&label) {
                    return Err(Error::UnknownField {
                        location: argument.location.clone(),
                        name: function.clone(),
                        label,
                    });
                }
                fields.push((label, &argument.value));
            }
            fields
        };

        let mut parts = vec![BoundPattern::TypeTest {
            location: location.clone(),
            input: input.clone(),
            type_,
        }];
        for (label, subpattern) in fields {
            let field_type = self.oracle.field_type(type_, &label);
            let fetch = BoundPattern::FetchField {
                location: subpattern.location.clone(),
                input: input.clone(),
                label,
                type_: field_type,
            };
            let temp = self.get_temp(&fetch);
            parts.push(fetch);
            let (bound, extended) = self.bind_pattern(subpattern, &temp, bindings)?;
            bindings = extended;
            parts.push(bound);
        }
        Ok((and(location, parts), bindings))
    }

    fn bind_sequence(
        &mut self,
        location: Location,
        elements: &[Expr],
        sequence_type: TypeRef,
        input: &EcoString,
        mut bindings: Bindings,
    ) -> Result<(BoundPattern, Bindings)> {
        let splats = elements
            .iter()
            .positions(|element| matches!(element.node, ExprNode::Splat(_)))
            .collect_vec();
        if splats.len() > 1 {
            return Err(Error::MultipleSplats {
                location: elements[splats[1]].location.clone(),
            });
        }
        let splat = splats.first().copied();
        let count = elements.len();

        let mut parts = vec![BoundPattern::TypeTest {
            location: location.clone(),
            input: input.clone(),
            type_: sequence_type,
        }];
        let length_fetch = BoundPattern::FetchLength {
            location: location.clone(),
            input: input.clone(),
            type_: TypeRef::INT,
        };
        let length_temp = self.get_temp(&length_fetch);
        parts.push(length_fetch);
        parts.push(match splat {
            Some(_) => BoundPattern::Relational {
                location: location.clone(),
                input: length_temp,
                operator: RelOp::GreaterOrEqual,
                constant: count as i64 - 1,
            },
            None => BoundPattern::Relational {
                location: location.clone(),
                input: length_temp,
                operator: RelOp::Equal,
                constant: count as i64,
            },
        });

        for (position, element) in elements.iter().enumerate() {
            let (fetch, subpattern) = match &element.node {
                ExprNode::Splat(inner) => (
                    BoundPattern::FetchSlice {
                        location: element.location.clone(),
                        input: input.clone(),
                        first: position as u32,
                        from_end: (count - 1 - position) as u32,
                        type_: sequence_type,
                    },
                    inner.as_ref(),
                ),
                _ => {
                    // Elements after the splat are addressed from the end,
                    // `-1` being the last element.
                    let index = match splat {
                        Some(splat) if position > splat => position as i64 - count as i64,
                        _ => position as i64 + 1,
                    };
                    (
                        BoundPattern::FetchIndex {
                            location: element.location.clone(),
                            input: input.clone(),
                            index,
                            type_: TypeRef::ANY,
                        },
                        element,
                    )
                }
            };
            let temp = self.get_temp(&fetch);
            parts.push(fetch);
            let (bound, extended) = self.bind_pattern(subpattern, &temp, bindings)?;
            bindings = extended;
            parts.push(bound);
        }
        Ok((and(location, parts), bindings))
    }

    fn bind_disjunction(
        &mut self,
        source: &Expr,
        left: &Expr,
        right: &Expr,
        input: &EcoString,
        bindings: Bindings,
    ) -> Result<(BoundPattern, Bindings)> {
        let location = source.location.clone();
        let (mut left_bound, left_bindings) = self.bind_pattern(left, input, bindings.clone())?;
        let (mut right_bound, right_bindings) = self.bind_pattern(right, input, bindings.clone())?;

        // Only variables bound on both sides survive the disjunction.
        // Where the two sides used different temporaries the branches are
        // merged through a phi temporary both sides store into.
        let mut merged = bindings.clone();
        for (name, left_temp) in left_bindings.iter() {
            if bindings.contains(name) {
                continue;
            }
            let Some(right_temp) = right_bindings.get(name) else {
                continue;
            };
            if left_temp == right_temp {
                merged = merged.bind(name.clone(), left_temp.clone());
                continue;
            }
            // A fresh phi is allocated even when a side already holds a
            // phi from a nested disjunction; phis never chain.
            let phi = self.fresh_temp();
            let left_fetch = self.phi_fetch(&location, name, left_temp, &phi);
            let right_fetch = self.phi_fetch(&location, name, right_temp, &phi);
            left_bound = and(location.clone(), vec![left_bound, left_fetch]);
            right_bound = and(location.clone(), vec![right_bound, right_fetch]);
            merged = merged.bind(name.clone(), phi);
        }
        Ok((or(location, vec![left_bound, right_bound]), merged))
    }

    fn phi_fetch(
        &mut self,
        location: &Location,
        name: &EcoString,
        source_temp: &EcoString,
        phi: &EcoString,
    ) -> BoundPattern {
        let fetch = BoundPattern::FetchExpression {
            location: location.clone(),
            input: source_temp.clone(),
            expression: Expr::new(location.clone(), ExprNode::Var(source_temp.clone())),
            bindings: Bindings::singleton(name.clone(), source_temp.clone()),
            key: Some(phi.clone()),
            type_: self.type_of(source_temp),
        };
        _ = self.get_temp(&fetch);
        fetch
    }

    /// Decompose a `where` guard into fetch/test pairs, pushing negation
    /// inward by De Morgan so that `!(a && b)` guards still produce one
    /// test per conjunct.
    fn shred_where(
        &mut self,
        guard: &Expr,
        inverted: bool,
        bindings: &Bindings,
    ) -> Result<BoundPattern> {
        let location = guard.location.clone();
        match &guard.node {
            ExprNode::Not(inner) => self.shred_where(inner, !inverted, bindings),

            ExprNode::BinOp {
                name: name @ (BinOp::And | BinOp::Or),
                left,
                right,
            } => {
                let parts = vec![
                    self.shred_where(left, inverted, bindings)?,
                    self.shred_where(right, inverted, bindings)?,
                ];
                if (*name == BinOp::And) != inverted {
                    Ok(and(location, parts))
                } else {
                    Ok(or(location, parts))
                }
            }

            _ => {
                let (expression, captured) = self.substitute(guard, bindings)?;
                let fetch = BoundPattern::FetchExpression {
                    location: location.clone(),
                    input: self.input(),
                    expression,
                    bindings: captured,
                    key: None,
                    type_: TypeRef::BOOL,
                };
                let temp = self.get_temp(&fetch);
                Ok(and(
                    location.clone(),
                    vec![
                        fetch,
                        BoundPattern::WhereTest {
                            location,
                            input: temp,
                            inverted,
                        },
                    ],
                ))
            }
        }
    }

    fn resolve_annotation(&mut self, annotation: &Expr, location: &Location) -> Result<TypeRef> {
        let type_ = self.oracle.resolve_type(annotation, location)?;
        if self.asserted.insert(annotation.clone()) {
            self.assertions.push(TypeAssertion {
                location: location.clone(),
                annotation: annotation.clone(),
                expected: type_,
            });
        }
        Ok(type_)
    }

    /// Rewrite pattern-variable references in a host expression to their
    /// temporaries, so user code cannot mutate a pattern variable.
    /// Returns the rewritten expression and the bindings it captured.
    pub fn substitute(&self, expression: &Expr, bindings: &Bindings) -> Result<(Expr, Bindings)> {
        let mut captured = Bindings::new();
        let expression = self.substitute_expr(expression, bindings, &mut captured)?;
        Ok((expression, captured))
    }

    fn substitute_expr(
        &self,
        expression: &Expr,
        bindings: &Bindings,
        captured: &mut Bindings,
    ) -> Result<Expr> {
        let location = expression.location.clone();
        let node = match &expression.node {
            ExprNode::Var(name) => {
                if let Some(temp) = bindings.get(name) {
                    *captured = captured.bind(name.clone(), temp.clone());
                    ExprNode::Var(temp.clone())
                } else if self.pattern_variables.contains(name) {
                    return Err(Error::UndefinedPatternVariable {
                        location,
                        name: name.clone(),
                    });
                } else {
                    return Ok(expression.clone());
                }
            }

            // Quoted fragments are data, not references.
            ExprNode::Int(_)
            | ExprNode::String(_)
            | ExprNode::Symbol(_)
            | ExprNode::Bool(_)
            | ExprNode::Nil
            | ExprNode::Discard
            | ExprNode::Quote(_)
            | ExprNode::TypeCheck { .. }
            | ExprNode::MatchFail => return Ok(expression.clone()),

            ExprNode::Call {
                function,
                arguments,
            } => ExprNode::Call {
                function: function.clone(),
                arguments: arguments
                    .iter()
                    .map(|argument| {
                        Ok(crate::ast::CallArg {
                            label: argument.label.clone(),
                            location: argument.location.clone(),
                            value: self.substitute_expr(&argument.value, bindings, captured)?,
                        })
                    })
                    .collect::<Result<_>>()?,
            },

            ExprNode::Tuple(elements) => ExprNode::Tuple(
                elements
                    .iter()
                    .map(|element| self.substitute_expr(element, bindings, captured))
                    .collect::<Result<_>>()?,
            ),
            ExprNode::Array(elements) => ExprNode::Array(
                elements
                    .iter()
                    .map(|element| self.substitute_expr(element, bindings, captured))
                    .collect::<Result<_>>()?,
            ),
            ExprNode::Block(statements) => ExprNode::Block(
                statements
                    .iter()
                    .map(|statement| self.substitute_expr(statement, bindings, captured))
                    .collect::<Result<_>>()?,
            ),

            ExprNode::BinOp { name, left, right } => ExprNode::BinOp {
                name: *name,
                left: Box::new(self.substitute_expr(left, bindings, captured)?),
                right: Box::new(self.substitute_expr(right, bindings, captured)?),
            },
            ExprNode::Not(inner) => {
                ExprNode::Not(Box::new(self.substitute_expr(inner, bindings, captured)?))
            }

            ExprNode::Where { pattern, guard } => ExprNode::Where {
                pattern: Box::new(self.substitute_expr(pattern, bindings, captured)?),
                guard: Box::new(self.substitute_expr(guard, bindings, captured)?),
            },
            ExprNode::Ascribe {
                pattern,
                annotation,
            } => ExprNode::Ascribe {
                pattern: match pattern {
                    Some(pattern) => {
                        Some(Box::new(self.substitute_expr(pattern, bindings, captured)?))
                    }
                    None => None,
                },
                annotation: Box::new(self.substitute_expr(annotation, bindings, captured)?),
            },
            ExprNode::Interpolate(inner) => ExprNode::Interpolate(Box::new(
                self.substitute_expr(inner, bindings, captured)?,
            )),
            ExprNode::Splat(inner) => {
                ExprNode::Splat(Box::new(self.substitute_expr(inner, bindings, captured)?))
            }

            ExprNode::Arm { pattern, body } => ExprNode::Arm {
                pattern: Box::new(self.substitute_expr(pattern, bindings, captured)?),
                body: Box::new(self.substitute_expr(body, bindings, captured)?),
            },
            ExprNode::Assign { name, value } => ExprNode::Assign {
                name: name.clone(),
                value: Box::new(self.substitute_expr(value, bindings, captured)?),
            },
            ExprNode::If {
                condition,
                then_branch,
                else_branch,
            } => ExprNode::If {
                condition: Box::new(self.substitute_expr(condition, bindings, captured)?),
                then_branch: Box::new(self.substitute_expr(then_branch, bindings, captured)?),
                else_branch: match else_branch {
                    Some(branch) => {
                        Some(Box::new(self.substitute_expr(branch, bindings, captured)?))
                    }
                    None => None,
                },
            },

            ExprNode::FieldAccess { container, label } => ExprNode::FieldAccess {
                container: Box::new(self.substitute_expr(container, bindings, captured)?),
                label: label.clone(),
            },
            ExprNode::Index { container, index } => ExprNode::Index {
                container: Box::new(self.substitute_expr(container, bindings, captured)?),
                index: *index,
            },
            ExprNode::Slice {
                container,
                first,
                from_end,
            } => ExprNode::Slice {
                container: Box::new(self.substitute_expr(container, bindings, captured)?),
                first: *first,
                from_end: *from_end,
            },
            ExprNode::Length(inner) => {
                ExprNode::Length(Box::new(self.substitute_expr(inner, bindings, captured)?))
            }
            ExprNode::MatchReturn(inner) => ExprNode::MatchReturn(Box::new(
                self.substitute_expr(inner, bindings, captured)?,
            )),
        };
        Ok(Expr::new(location, node))
    }
}

fn fetch_type(fetch: &BoundPattern) -> TypeRef {
    match fetch {
        BoundPattern::FetchField { type_, .. }
        | BoundPattern::FetchIndex { type_, .. }
        | BoundPattern::FetchSlice { type_, .. }
        | BoundPattern::FetchLength { type_, .. }
        | BoundPattern::FetchExpression { type_, .. } => *type_,
        _ => TypeRef::ANY,
    }
}
