//! Runtime values and the value protocol.
//!
//! Every value supports the same small contract: `get_type`, the three call
//! forms (`call_as_function`, `call_as_constructor`, `call_as_extends`),
//! `get_member`, and the primitive casts. Values that are not callable or
//! have no such member answer with a script-level error.

mod array;
mod builtin;
mod exception;

use std::fmt;
use std::rc::Rc;

use osc_ir::Symbol;

pub use array::ArrayValue;
pub use builtin::BuiltinType;
pub use exception::ExceptionObject;
pub(crate) use exception::describe_thrown;

use crate::call_stack::CallStack;
use crate::errors::{
    illegal_argument, no_such_member, not_callable, unsupported_operation, EvalError, EvalResult,
};
use crate::function::Function;
use crate::member_table::MemberTable;
use crate::reference::Reference;
use crate::scope::ScopeRef;

/// A runtime value.
///
/// Functions, objects and exceptions have identity: equality compares
/// handles, not contents.
#[derive(Clone, Debug, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Exact(i64),
    Inexact(f64),
    Str(Rc<str>),
    Array(ArrayValue),
    Function(Rc<Function>),
    /// A script object: the scope holding its public and protected members.
    Object(ScopeRef),
    /// A built-in type, bound by name in the global scope.
    Type(BuiltinType),
    Exception(Rc<ExceptionObject>),
}

impl Value {
    pub fn string(text: &str) -> Self {
        Value::Str(Rc::from(text))
    }

    pub fn exception(exception: ExceptionObject) -> Self {
        Value::Exception(Rc::new(exception))
    }

    pub fn array(elements: Vec<Value>) -> Self {
        Value::Array(ArrayValue::new(elements))
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The built-in type this value is an instance of.
    pub fn builtin_type(&self) -> BuiltinType {
        match self {
            Value::Null => BuiltinType::Null,
            Value::Bool(_) => BuiltinType::Boolean,
            Value::Exact(_) => BuiltinType::ExactNumber,
            Value::Inexact(_) => BuiltinType::InexactNumber,
            Value::Str(_) => BuiltinType::String,
            Value::Array(_) => BuiltinType::Array,
            Value::Function(_) | Value::Type(_) => BuiltinType::Function,
            Value::Object(_) => BuiltinType::Object,
            Value::Exception(exception) => exception.exception_type(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.builtin_type().name()
    }

    /// The value's type: the constructing function for script objects, a
    /// built-in type otherwise.
    pub fn get_type(&self) -> Value {
        if let Value::Object(scope) = self {
            if let Some(function) = scope.constructed_by() {
                return Value::Function(function);
            }
        }
        Value::Type(self.builtin_type())
    }

    /// Whether this value is an instance of `ty`.
    pub fn is_a(&self, ty: &Value) -> bool {
        match self {
            Value::Object(scope) => match scope.constructed_by() {
                Some(function) => function.extends(ty),
                None => matches!(ty, Value::Type(BuiltinType::Object)),
            },
            Value::Function(function) => function.is_a(ty),
            other => matches!(ty, Value::Type(t) if other.builtin_type().is_subtype(*t)),
        }
    }

    pub fn call_as_function(&self, stack: &mut CallStack, args: Option<MemberTable>) -> EvalResult {
        match self {
            Value::Function(function) => function.call_as_function(stack, args),
            Value::Type(ty) => ty.call_as_function(args),
            other => Err(not_callable(other.type_name())),
        }
    }

    pub fn call_as_constructor(
        &self,
        stack: &mut CallStack,
        args: Option<MemberTable>,
    ) -> EvalResult {
        match self {
            Value::Function(function) => function.call_as_constructor(stack, args),
            Value::Type(ty) => ty.call_as_constructor(stack, args),
            other => Err(not_callable(other.type_name())),
        }
    }

    /// Run this value's constructor body against an already-allocated
    /// object, as the super-constructor step of a subclass constructor.
    pub fn call_as_extends(
        &self,
        stack: &mut CallStack,
        object: &ScopeRef,
        args: Option<MemberTable>,
    ) -> Result<(), EvalError> {
        match self {
            Value::Function(function) => function.call_as_extends(stack, object, args),
            Value::Type(BuiltinType::Object) => {
                if let Some(args) = args {
                    args.free();
                }
                Ok(())
            }
            Value::Type(ty) => Err(unsupported_operation(format!(
                "{}: cannot extend",
                ty.name()
            ))),
            other => Err(not_callable(other.type_name())),
        }
    }

    /// Object-style member access.
    ///
    /// Returns `Ok(None)` for a missing member unless `throw` is set, in
    /// which case it fails with "no such member".
    pub fn get_member(&self, id: Symbol, throw: bool) -> Result<Option<Reference>, EvalError> {
        let found = match self {
            Value::Object(scope) => return scope.get_member(id, throw),
            Value::Function(function) => return function.get_member(id, throw),
            Value::Exception(exception) => match id.as_str() {
                "message" => Some(Reference::constant(Value::string(exception.message()))),
                "cause" => Some(Reference::constant(exception.cause().unwrap_or_default())),
                _ => None,
            },
            Value::Array(array) if id.as_str() == "length" => {
                Some(Reference::constant(length_value(array.len())))
            }
            Value::Str(text) if id.as_str() == "length" => {
                Some(Reference::constant(length_value(text.chars().count())))
            }
            _ => None,
        };
        match found {
            Some(reference) => Ok(Some(reference)),
            None if throw => Err(no_such_member(id)),
            None => Ok(None),
        }
    }

    pub fn cast_to_string(&self) -> String {
        match self {
            Value::Null => "null".to_owned(),
            Value::Bool(b) => b.to_string(),
            Value::Exact(n) => n.to_string(),
            Value::Inexact(x) => x.to_string(),
            Value::Str(s) => s.to_string(),
            Value::Array(_) => self.render(0, &mut Vec::new()),
            Value::Function(function) => function.cast_to_string(),
            Value::Object(scope) => match scope.constructed_by() {
                Some(function) => format!("[object: {}]", function.name()),
                None => "[object]".to_owned(),
            },
            Value::Type(ty) => ty.name().to_owned(),
            Value::Exception(_) => describe_thrown(self),
        }
    }

    /// String form of a value nested `depth` causes deep in an exception
    /// description. `open` holds the arrays being rendered further out; one
    /// met again renders as `[...]`.
    fn render(&self, depth: usize, open: &mut Vec<ArrayValue>) -> String {
        match self {
            Value::Array(array) => {
                if open.iter().any(|outer| outer.ptr_eq(array)) {
                    return "[...]".to_owned();
                }
                open.push(array.clone());
                let parts: Vec<String> = array
                    .to_vec()
                    .iter()
                    .map(|element| element.render(depth, open))
                    .collect();
                open.pop();
                format!("[{}]", parts.join(", "))
            }
            Value::Exception(_) => exception::describe_at(self, depth, open),
            other => other.cast_to_string(),
        }
    }

    /// Element-wise array equality. A pair of arrays already being compared
    /// further out counts as equal, so self-containing arrays terminate.
    fn structural_eq(&self, other: &Value, open: &mut Vec<(ArrayValue, ArrayValue)>) -> bool {
        let (Value::Array(a), Value::Array(b)) = (self, other) else {
            return self == other;
        };
        if a.ptr_eq(b) || open.iter().any(|(x, y)| x.ptr_eq(a) && y.ptr_eq(b)) {
            return true;
        }
        let (xs, ys) = (a.to_vec(), b.to_vec());
        if xs.len() != ys.len() {
            return false;
        }
        open.push((a.clone(), b.clone()));
        let equal = xs.iter().zip(&ys).all(|(x, y)| x.structural_eq(y, open));
        open.pop();
        equal
    }

    pub fn cast_to_boolean(&self) -> Result<bool, EvalError> {
        match self {
            Value::Bool(b) => Ok(*b),
            other => Err(unsupported_operation(format!(
                "{}: castToBoolean",
                other.type_name()
            ))),
        }
    }

    #[allow(
        clippy::cast_possible_truncation,
        reason = "inexact-to-exact conversion truncates toward zero"
    )]
    pub fn cast_to_exact(&self) -> Result<i64, EvalError> {
        match self {
            Value::Exact(n) => Ok(*n),
            Value::Inexact(x) => Ok(*x as i64),
            Value::Str(s) => s
                .trim()
                .parse()
                .map_err(|_| illegal_argument(format!("not an exact number: {s}"))),
            other => Err(unsupported_operation(format!(
                "{}: castToExactNumber",
                other.type_name()
            ))),
        }
    }

    #[allow(
        clippy::cast_precision_loss,
        reason = "exact-to-inexact conversion rounds large magnitudes"
    )]
    pub fn cast_to_inexact(&self) -> Result<f64, EvalError> {
        match self {
            Value::Exact(n) => Ok(*n as f64),
            Value::Inexact(x) => Ok(*x),
            Value::Str(s) => s
                .trim()
                .parse()
                .map_err(|_| illegal_argument(format!("not an inexact number: {s}"))),
            other => Err(unsupported_operation(format!(
                "{}: castToInexactNumber",
                other.type_name()
            ))),
        }
    }
}

fn length_value(len: usize) -> Value {
    Value::Exact(i64::try_from(len).unwrap_or(i64::MAX))
}

impl PartialEq for Value {
    #[allow(clippy::float_cmp, reason = "script equality on inexact numbers is exact")]
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Exact(a), Value::Exact(b)) => a == b,
            (Value::Inexact(a), Value::Inexact(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(_), Value::Array(_)) => self.structural_eq(other, &mut Vec::new()),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => ScopeRef::ptr_eq(a, b),
            (Value::Type(a), Value::Type(b)) => a == b,
            (Value::Exception(a), Value::Exception(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.cast_to_string())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Exact(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Exact(i64::from(n))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Inexact(x)
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::string(text)
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests;
