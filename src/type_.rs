//! The compile-time view of the host's types.
//!
//! The core never inspects user types directly; it asks a small pure
//! oracle. [`TypeTable`] is the concrete oracle used by the test suite and
//! by hosts with a simple nominal type system: named types arranged in
//! single-inheritance chains under `Any`, with `Never` as the empty type.

use ecow::EcoString;
use std::collections::{HashMap, HashSet};

use crate::ast::{Expr, ExprNode, Location};
use crate::error::{Error, Result};

/// An opaque handle to a resolved type. Handles are cheap to copy and
/// compare; all structure lives behind the oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeRef(u32);

impl TypeRef {
    /// The top type: every value is a member.
    pub const ANY: TypeRef = TypeRef(0);
    /// The empty type: no value is a member.
    pub const NEVER: TypeRef = TypeRef(1);
    pub const INT: TypeRef = TypeRef(2);
    pub const BOOL: TypeRef = TypeRef(3);
    pub const STRING: TypeRef = TypeRef(4);
    pub const SYMBOL: TypeRef = TypeRef(5);
    pub const NIL: TypeRef = TypeRef(6);
    /// Anything with a length and one-based element access.
    pub const SEQUENCE: TypeRef = TypeRef(7);
    pub const TUPLE: TypeRef = TypeRef(8);
}

/// The queries the binder and simplifier need answered about types.
/// All four are pure: equal arguments always produce equal answers.
pub trait TypeOracle {
    /// Map a type expression to a type handle. Failures are reported at
    /// the given pattern location.
    fn resolve_type(&self, expression: &Expr, location: &Location) -> Result<TypeRef>;

    /// The names of a type's fields in positional-binding order. May be
    /// fewer than the type's raw fields if the oracle hides synthetic ones.
    fn field_names(&self, type_: TypeRef) -> Vec<EcoString>;

    /// The type of a named field, or `Any` when unknown.
    fn field_type(&self, type_: TypeRef, label: &str) -> TypeRef;

    fn subtype(&self, a: TypeRef, b: TypeRef) -> bool;

    /// The intersection of two types, `Never` when they are disjoint.
    fn intersect(&self, a: TypeRef, b: TypeRef) -> TypeRef;
}

impl std::fmt::Debug for dyn TypeOracle + '_ {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TypeOracle")
    }
}

#[derive(Debug, Clone)]
struct TypeInfo {
    name: EcoString,
    parent: TypeRef,
    /// `None` for abstract types, `Some` (possibly empty) for structs.
    fields: Option<Vec<(EcoString, TypeRef)>>,
}

/// A nominal type registry implementing [`TypeOracle`].
#[derive(Debug, Clone)]
pub struct TypeTable {
    types: Vec<TypeInfo>,
    names: HashMap<EcoString, TypeRef>,
    /// Host bindings known to hold something other than a type, so that
    /// `::x` over one of them reports a non-type error.
    values: HashSet<EcoString>,
}

impl TypeTable {
    pub fn new() -> Self {
        let mut table = Self {
            types: Vec::new(),
            names: HashMap::new(),
            values: HashSet::new(),
        };
        // Registration order must agree with the `TypeRef` constants.
        _ = table.register("Any", TypeRef::ANY, None);
        _ = table.register("Never", TypeRef::ANY, None);
        _ = table.register("Int", TypeRef::ANY, None);
        _ = table.register("Bool", TypeRef::ANY, None);
        _ = table.register("String", TypeRef::ANY, None);
        _ = table.register("Symbol", TypeRef::ANY, None);
        _ = table.register("Nil", TypeRef::ANY, None);
        _ = table.register("Sequence", TypeRef::ANY, None);
        _ = table.register("Tuple", TypeRef::SEQUENCE, None);
        table
    }

    fn register(
        &mut self,
        name: &str,
        parent: TypeRef,
        fields: Option<Vec<(EcoString, TypeRef)>>,
    ) -> TypeRef {
        let reference = TypeRef(self.types.len() as u32);
        self.types.push(TypeInfo {
            name: name.into(),
            parent,
            fields,
        });
        _ = self.names.insert(name.into(), reference);
        reference
    }

    /// Register an abstract type. Abstract types have no fields and exist
    /// to be matched with `::T` and refined against.
    pub fn insert_abstract(&mut self, name: &str, parent: TypeRef) -> TypeRef {
        self.register(name, parent, None)
    }

    /// Register a struct type with named fields in declaration order.
    pub fn insert_struct(
        &mut self,
        name: &str,
        parent: TypeRef,
        fields: Vec<(&str, TypeRef)>,
    ) -> TypeRef {
        let fields = fields
            .into_iter()
            .map(|(label, type_)| (EcoString::from(label), type_))
            .collect();
        self.register(name, parent, Some(fields))
    }

    /// Register a host binding that is not a type.
    pub fn insert_value(&mut self, name: &str) {
        _ = self.values.insert(name.into());
    }

    pub fn lookup(&self, name: &str) -> Option<TypeRef> {
        self.names.get(name).copied()
    }

    pub fn name(&self, type_: TypeRef) -> &EcoString {
        &self.types[type_.0 as usize].name
    }

    pub fn fields(&self, type_: TypeRef) -> Option<&[(EcoString, TypeRef)]> {
        self.types[type_.0 as usize].fields.as_deref()
    }

    fn is_subtype(&self, a: TypeRef, b: TypeRef) -> bool {
        if b == TypeRef::ANY || a == TypeRef::NEVER {
            return true;
        }
        let mut current = a;
        loop {
            if current == b {
                return true;
            }
            let parent = self.types[current.0 as usize].parent;
            if parent == current || current == TypeRef::ANY {
                return false;
            }
            current = parent;
        }
    }
}

impl Default for TypeTable {
    fn default() -> Self {
        Self::new()
    }
}

fn describe(expression: &Expr) -> EcoString {
    match &expression.node {
        ExprNode::Var(name) => name.clone(),
        ExprNode::Int(i) => ecow::eco_format!("{i}"),
        ExprNode::String(s) => ecow::eco_format!("\"{s}\""),
        ExprNode::Symbol(s) => ecow::eco_format!(":{s}"),
        ExprNode::Bool(b) => ecow::eco_format!("{b}"),
        _ => "this expression".into(),
    }
}

impl TypeOracle for TypeTable {
    fn resolve_type(&self, expression: &Expr, location: &Location) -> Result<TypeRef> {
        match &expression.node {
            ExprNode::Var(name) if self.values.contains(name) => Err(Error::NonType {
                location: location.clone(),
                name: name.clone(),
            }),
            ExprNode::Var(name) => self.lookup(name).ok_or_else(|| Error::UnresolvedType {
                location: location.clone(),
                name: name.clone(),
            }),
            _ => Err(Error::NonType {
                location: location.clone(),
                name: describe(expression),
            }),
        }
    }

    fn field_names(&self, type_: TypeRef) -> Vec<EcoString> {
        self.fields(type_)
            .map(|fields| fields.iter().map(|(label, _)| label.clone()).collect())
            .unwrap_or_default()
    }

    fn field_type(&self, type_: TypeRef, label: &str) -> TypeRef {
        self.fields(type_)
            .and_then(|fields| {
                fields
                    .iter()
                    .find(|(name, _)| name == label)
                    .map(|(_, type_)| *type_)
            })
            .unwrap_or(TypeRef::ANY)
    }

    fn subtype(&self, a: TypeRef, b: TypeRef) -> bool {
        self.is_subtype(a, b)
    }

    fn intersect(&self, a: TypeRef, b: TypeRef) -> TypeRef {
        if self.is_subtype(a, b) {
            a
        } else if self.is_subtype(b, a) {
            b
        } else {
            // Single-inheritance chains cannot share descendants.
            TypeRef::NEVER
        }
    }
}
