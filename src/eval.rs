//! A small interpreter for emitted statement lists, used by the tests to
//! check the compiled code's behaviour rather than its shape. Plays the
//! role the host language would play in production: it owns the values,
//! runs the straight-line code, and raises the match failure when told to.

use ecow::EcoString;
use std::collections::HashMap;

use crate::ast::{BinOp, CallArg, Expr, ExprNode, Statement};
use crate::type_::{TypeOracle, TypeRef, TypeTable};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Value {
    Int(i64),
    Bool(bool),
    Str(EcoString),
    Symbol(EcoString),
    Nil,
    Tuple(Vec<Value>),
    Array(Vec<Value>),
    Struct { type_: TypeRef, fields: Vec<Value> },
    Quoted(Expr),
    Type(TypeRef),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum EvalError {
    MatchFailure(Value),
    UndefinedVariable(EcoString),
    TypeBindingChanged(EcoString),
    Unsupported(&'static str),
}

pub(crate) type Env = HashMap<EcoString, Value>;

/// Runs statement lists against a type table and a set of host globals.
#[derive(Debug)]
pub(crate) struct Machine<'table> {
    table: &'table TypeTable,
    globals: Env,
}

impl<'table> Machine<'table> {
    pub fn new(table: &'table TypeTable) -> Self {
        Self {
            table,
            globals: Env::new(),
        }
    }

    /// Define a host global visible to interpolations, guards and
    /// runtime type assertions.
    pub fn define(&mut self, name: &str, value: Value) {
        _ = self.globals.insert(name.into(), value);
    }

    /// Run the statements in a fresh scope and return the value variable.
    pub fn run(&self, statements: &[Statement], value: &str) -> Result<Value, EvalError> {
        let mut env = Env::new();
        self.run_with_env(statements, value, &mut env)
    }

    /// Run the statements in the given scope, so tests can observe which
    /// names the compiled code introduced.
    pub fn run_with_env(
        &self,
        statements: &[Statement],
        value: &str,
        env: &mut Env,
    ) -> Result<Value, EvalError> {
        let labels: HashMap<&EcoString, usize> = statements
            .iter()
            .enumerate()
            .filter_map(|(index, statement)| match statement {
                Statement::Label(label) => Some((label, index)),
                _ => None,
            })
            .collect();
        let jump = |target: &EcoString| {
            labels
                .get(target)
                .copied()
                .ok_or(EvalError::Unsupported("jump to a missing label"))
        };

        let mut pc = 0;
        let mut fuel = 100_000_u32;
        while pc < statements.len() {
            fuel = fuel
                .checked_sub(1)
                .ok_or(EvalError::Unsupported("statement limit exceeded"))?;
            match &statements[pc] {
                Statement::Assign { name, value } => {
                    let value = self.eval(value, env)?;
                    _ = env.insert(name.clone(), value);
                }
                Statement::Effect(expression) => {
                    _ = self.eval(expression, env)?;
                }
                Statement::Label(_) | Statement::Site(_) => {}
                Statement::Jump(target) => {
                    pc = jump(target)?;
                    continue;
                }
                Statement::JumpUnless { condition, target } => {
                    match self.eval(condition, env)? {
                        Value::Bool(true) => {}
                        Value::Bool(false) => {
                            pc = jump(target)?;
                            continue;
                        }
                        _ => return Err(EvalError::Unsupported("non-boolean condition")),
                    }
                }
                Statement::Assert {
                    annotation,
                    expected,
                    ..
                } => {
                    let name = match &annotation.node {
                        ExprNode::Var(name) => name.clone(),
                        _ => "type".into(),
                    };
                    match self.eval(annotation, env)? {
                        Value::Type(type_) if type_ == *expected => {}
                        _ => return Err(EvalError::TypeBindingChanged(name)),
                    }
                }
                Statement::FailMatch { subject, .. } => {
                    return Err(EvalError::MatchFailure(self.eval(subject, env)?));
                }
            }
            pc += 1;
        }
        env.get(value)
            .cloned()
            .ok_or_else(|| EvalError::UndefinedVariable(value.into()))
    }

    fn lookup(&self, name: &EcoString, env: &Env) -> Result<Value, EvalError> {
        if let Some(value) = env.get(name) {
            return Ok(value.clone());
        }
        if let Some(value) = self.globals.get(name) {
            return Ok(value.clone());
        }
        if let Some(type_) = self.table.lookup(name) {
            return Ok(Value::Type(type_));
        }
        Err(EvalError::UndefinedVariable(name.clone()))
    }

    fn eval(&self, expression: &Expr, env: &mut Env) -> Result<Value, EvalError> {
        match &expression.node {
            ExprNode::Int(value) => Ok(Value::Int(*value)),
            ExprNode::String(value) => Ok(Value::Str(value.clone())),
            ExprNode::Symbol(value) => Ok(Value::Symbol(value.clone())),
            ExprNode::Bool(value) => Ok(Value::Bool(*value)),
            ExprNode::Nil => Ok(Value::Nil),
            ExprNode::Quote(inner) => Ok(Value::Quoted((**inner).clone())),

            ExprNode::Var(name) => self.lookup(name, env),

            ExprNode::Tuple(elements) => Ok(Value::Tuple(self.eval_all(elements, env)?)),
            ExprNode::Array(elements) => Ok(Value::Array(self.eval_all(elements, env)?)),

            ExprNode::Call {
                function,
                arguments,
            } => self.construct(function, arguments, env),

            ExprNode::FieldAccess { container, label } => {
                let container = self.eval(container, env)?;
                let Value::Struct { type_, fields } = container else {
                    return Err(EvalError::Unsupported("field access on a non-struct"));
                };
                let defs = self
                    .table
                    .fields(type_)
                    .ok_or(EvalError::Unsupported("field access on an abstract type"))?;
                let position = defs
                    .iter()
                    .position(|(name, _)| name == label)
                    .ok_or(EvalError::Unsupported("unknown field"))?;
                fields
                    .get(position)
                    .cloned()
                    .ok_or(EvalError::Unsupported("missing field value"))
            }

            ExprNode::Index { container, index } => {
                let elements = self.sequence_of(container, env)?.1;
                index_sequence(&elements, *index)
            }

            ExprNode::Slice {
                container,
                first,
                from_end,
            } => {
                let (tuple, elements) = self.sequence_of(container, env)?;
                let first = *first as usize;
                let from_end = *from_end as usize;
                if first + from_end > elements.len() {
                    return Err(EvalError::Unsupported("slice out of range"));
                }
                let slice = elements[first..elements.len() - from_end].to_vec();
                Ok(if tuple {
                    Value::Tuple(slice)
                } else {
                    Value::Array(slice)
                })
            }

            ExprNode::Length(container) => {
                let elements = self.sequence_of(container, env)?.1;
                Ok(Value::Int(elements.len() as i64))
            }

            ExprNode::TypeCheck { value, type_ } => {
                let value = self.eval(value, env)?;
                Ok(Value::Bool(self.is_instance(&value, *type_)))
            }

            ExprNode::BinOp { name, left, right } => self.binop(*name, left, right, env),

            ExprNode::Not(inner) => match self.eval(inner, env)? {
                Value::Bool(value) => Ok(Value::Bool(!value)),
                _ => Err(EvalError::Unsupported("negating a non-boolean")),
            },

            ExprNode::If {
                condition,
                then_branch,
                else_branch,
            } => match self.eval(condition, env)? {
                Value::Bool(true) => self.eval(then_branch, env),
                Value::Bool(false) => match else_branch {
                    Some(branch) => self.eval(branch, env),
                    None => Ok(Value::Nil),
                },
                _ => Err(EvalError::Unsupported("non-boolean condition")),
            },

            ExprNode::Block(statements) => {
                let mut value = Value::Nil;
                for statement in statements {
                    value = self.eval(statement, env)?;
                }
                Ok(value)
            }

            ExprNode::Assign { name, value } => {
                let value = self.eval(value, env)?;
                _ = env.insert(name.clone(), value.clone());
                Ok(value)
            }

            ExprNode::Interpolate(inner) => self.eval(inner, env),

            ExprNode::Discard
            | ExprNode::Where { .. }
            | ExprNode::Ascribe { .. }
            | ExprNode::Splat(_)
            | ExprNode::Arm { .. }
            | ExprNode::MatchFail
            | ExprNode::MatchReturn(_) => {
                Err(EvalError::Unsupported("pattern syntax evaluated as code"))
            }
        }
    }

    fn eval_all(&self, elements: &[Expr], env: &mut Env) -> Result<Vec<Value>, EvalError> {
        elements
            .iter()
            .map(|element| self.eval(element, env))
            .collect()
    }

    /// A container's elements together with whether it was a tuple.
    fn sequence_of(
        &self,
        container: &Expr,
        env: &mut Env,
    ) -> Result<(bool, Vec<Value>), EvalError> {
        match self.eval(container, env)? {
            Value::Tuple(elements) => Ok((true, elements)),
            Value::Array(elements) => Ok((false, elements)),
            _ => Err(EvalError::Unsupported("sequence operation on a scalar")),
        }
    }

    fn construct(
        &self,
        function: &EcoString,
        arguments: &[CallArg],
        env: &mut Env,
    ) -> Result<Value, EvalError> {
        let type_ = self
            .table
            .lookup(function)
            .ok_or_else(|| EvalError::UndefinedVariable(function.clone()))?;
        let defs = self
            .table
            .fields(type_)
            .ok_or(EvalError::Unsupported("constructing a non-struct type"))?
            .to_vec();
        let mut fields = vec![Value::Nil; defs.len()];
        let named = arguments.iter().any(|argument| argument.label.is_some());
        if named {
            for argument in arguments {
                let label = argument
                    .label
                    .as_ref()
                    .ok_or(EvalError::Unsupported("mixed constructor arguments"))?;
                let position = defs
                    .iter()
                    .position(|(name, _)| name == label)
                    .ok_or(EvalError::Unsupported("unknown constructor field"))?;
                fields[position] = self.eval(&argument.value, env)?;
            }
        } else {
            if arguments.len() != defs.len() {
                return Err(EvalError::Unsupported("wrong constructor arity"));
            }
            for (position, argument) in arguments.iter().enumerate() {
                fields[position] = self.eval(&argument.value, env)?;
            }
        }
        Ok(Value::Struct { type_, fields })
    }

    fn is_instance(&self, value: &Value, type_: TypeRef) -> bool {
        if type_ == TypeRef::ANY {
            return true;
        }
        let dynamic = match value {
            Value::Int(_) => TypeRef::INT,
            Value::Bool(_) => TypeRef::BOOL,
            Value::Str(_) => TypeRef::STRING,
            Value::Symbol(_) => TypeRef::SYMBOL,
            Value::Nil => TypeRef::NIL,
            Value::Tuple(_) => TypeRef::TUPLE,
            Value::Array(_) => TypeRef::SEQUENCE,
            Value::Struct { type_, .. } => *type_,
            Value::Quoted(_) | Value::Type(_) => return false,
        };
        self.table.subtype(dynamic, type_)
    }

    fn binop(
        &self,
        name: BinOp,
        left: &Expr,
        right: &Expr,
        env: &mut Env,
    ) -> Result<Value, EvalError> {
        // Boolean operators short-circuit.
        if let BinOp::And | BinOp::Or = name {
            let left = match self.eval(left, env)? {
                Value::Bool(value) => value,
                _ => return Err(EvalError::Unsupported("non-boolean operand")),
            };
            return match (name, left) {
                (BinOp::And, false) => Ok(Value::Bool(false)),
                (BinOp::Or, true) => Ok(Value::Bool(true)),
                _ => self.eval(right, env),
            };
        }

        let left = self.eval(left, env)?;
        let right = self.eval(right, env)?;
        match name {
            BinOp::Eq => Ok(Value::Bool(left == right)),
            BinOp::NotEq => Ok(Value::Bool(left != right)),
            BinOp::LtInt
            | BinOp::LtEqInt
            | BinOp::GtInt
            | BinOp::GtEqInt
            | BinOp::AddInt
            | BinOp::SubInt
            | BinOp::MultInt => {
                let (Value::Int(left), Value::Int(right)) = (left, right) else {
                    return Err(EvalError::Unsupported("non-integer operand"));
                };
                Ok(match name {
                    BinOp::LtInt => Value::Bool(left < right),
                    BinOp::LtEqInt => Value::Bool(left <= right),
                    BinOp::GtInt => Value::Bool(left > right),
                    BinOp::GtEqInt => Value::Bool(left >= right),
                    BinOp::AddInt => Value::Int(left + right),
                    BinOp::SubInt => Value::Int(left - right),
                    BinOp::MultInt => Value::Int(left * right),
                    _ => unreachable!("integer operator"),
                })
            }
            BinOp::And | BinOp::Or => unreachable!("handled above"),
        }
    }
}

fn index_sequence(elements: &[Value], index: i64) -> Result<Value, EvalError> {
    let length = elements.len() as i64;
    let position = match index {
        _ if index > 0 => index - 1,
        _ if index < 0 => length + index,
        _ => return Err(EvalError::Unsupported("index zero")),
    };
    if position < 0 || position >= length {
        return Err(EvalError::Unsupported("index out of range"));
    }
    Ok(elements[position as usize].clone())
}
