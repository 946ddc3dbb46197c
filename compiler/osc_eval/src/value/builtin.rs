use std::rc::Rc;

use osc_ir::{MemberIndexTable, Symbol};

use crate::call_stack::CallStack;
use crate::errors::{arity_mismatch, unsupported_operation, EvalError, EvalResult};
use crate::member_table::MemberTable;
use crate::scope::ScopeRef;

use super::{ExceptionObject, Value};

/// Types built into the runtime.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BuiltinType {
    Object,
    Function,
    Array,
    Boolean,
    ExactNumber,
    InexactNumber,
    String,
    Null,
    Exception,
    NoSuchMemberException,
    NullReferenceException,
    IllegalArgumentException,
    UnsupportedOperationException,
}

impl BuiltinType {
    /// Types bound by name in every global scope.
    pub const GLOBALS: &'static [BuiltinType] = &[
        BuiltinType::Object,
        BuiltinType::Function,
        BuiltinType::Array,
        BuiltinType::Boolean,
        BuiltinType::ExactNumber,
        BuiltinType::InexactNumber,
        BuiltinType::String,
        BuiltinType::Exception,
        BuiltinType::NoSuchMemberException,
        BuiltinType::NullReferenceException,
        BuiltinType::IllegalArgumentException,
        BuiltinType::UnsupportedOperationException,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BuiltinType::Object => "Object",
            BuiltinType::Function => "Function",
            BuiltinType::Array => "Array",
            BuiltinType::Boolean => "Boolean",
            BuiltinType::ExactNumber => "ExactNumber",
            BuiltinType::InexactNumber => "InexactNumber",
            BuiltinType::String => "String",
            BuiltinType::Null => "Null",
            BuiltinType::Exception => "Exception",
            BuiltinType::NoSuchMemberException => "NoSuchMemberException",
            BuiltinType::NullReferenceException => "NullReferenceException",
            BuiltinType::IllegalArgumentException => "IllegalArgumentException",
            BuiltinType::UnsupportedOperationException => "UnsupportedOperationException",
        }
    }

    /// Direct supertype; `Object` is the root.
    pub fn parent(self) -> Option<BuiltinType> {
        match self {
            BuiltinType::Object => None,
            BuiltinType::NoSuchMemberException
            | BuiltinType::NullReferenceException
            | BuiltinType::IllegalArgumentException
            | BuiltinType::UnsupportedOperationException => Some(BuiltinType::Exception),
            _ => Some(BuiltinType::Object),
        }
    }

    pub fn is_subtype(self, of: BuiltinType) -> bool {
        let mut ty = Some(self);
        while let Some(current) = ty {
            if current == of {
                return true;
            }
            ty = current.parent();
        }
        false
    }

    pub fn is_exception(self) -> bool {
        self.is_subtype(BuiltinType::Exception)
    }

    /// Conversion call, e.g. `String(42)`.
    pub(crate) fn call_as_function(self, args: Option<MemberTable>) -> EvalResult {
        let values = take_values(args);
        match self {
            BuiltinType::String => Ok(Value::string(&self.single(&values)?.cast_to_string())),
            BuiltinType::Boolean => Ok(Value::Bool(self.single(&values)?.cast_to_boolean()?)),
            BuiltinType::ExactNumber => Ok(Value::Exact(self.single(&values)?.cast_to_exact()?)),
            BuiltinType::InexactNumber => {
                Ok(Value::Inexact(self.single(&values)?.cast_to_inexact()?))
            }
            BuiltinType::Array => Ok(Value::array(values)),
            _ => Err(unsupported_operation(format!(
                "{}: cannot call as function",
                self.name()
            ))),
        }
    }

    pub(crate) fn call_as_constructor(
        self,
        stack: &mut CallStack,
        args: Option<MemberTable>,
    ) -> EvalResult {
        if self.is_exception() {
            let values = take_values(args);
            if values.len() > 2 {
                return Err(arity_mismatch(Symbol::intern(self.name()), 2, false, values.len()));
            }
            let mut values = values.into_iter();
            let message = values.next().map(|v| v.cast_to_string()).unwrap_or_default();
            let exception = ExceptionObject::new(self, message);
            if let Some(cause) = values.next() {
                exception.set_cause(cause);
            }
            return Ok(Value::exception(exception));
        }
        match self {
            BuiltinType::Object => {
                let values = take_values(args);
                if !values.is_empty() {
                    return Err(arity_mismatch(Symbol::intern("Object"), 0, false, values.len()));
                }
                let global = stack.global().clone();
                let object =
                    ScopeRef::new_object(&global, Rc::new(MemberIndexTable::default()), None);
                Ok(Value::Object(object))
            }
            BuiltinType::Function | BuiltinType::Null => Err(unsupported_operation(format!(
                "{}: cannot call as constructor",
                self.name()
            ))),
            _ => self.call_as_function(args),
        }
    }

    fn single<'v>(self, values: &'v [Value]) -> Result<&'v Value, EvalError> {
        match values {
            [value] => Ok(value),
            _ => Err(arity_mismatch(Symbol::intern(self.name()), 1, false, values.len())),
        }
    }
}

fn take_values(args: Option<MemberTable>) -> Vec<Value> {
    match args {
        Some(table) => {
            let values = table.values();
            table.free();
            values
        }
        None => Vec::new(),
    }
}
