use std::cell::RefCell;

use crate::errors::EvalBacktrace;

use super::{ArrayValue, BuiltinType, Value};

/// How many `cause` links a description follows before giving up.
const MAX_DESCRIBE_DEPTH: usize = 5;

const UNKNOWN_MESSAGE: &str = "<<unknown exception message>>";

/// Instance of one of the built-in exception types.
#[derive(Debug)]
pub struct ExceptionObject {
    ty: BuiltinType,
    message: String,
    cause: RefCell<Option<Value>>,
    /// Call stack snapshot taken the first time the exception was thrown.
    backtrace: RefCell<Option<EvalBacktrace>>,
}

impl ExceptionObject {
    pub fn new(ty: BuiltinType, message: impl Into<String>) -> Self {
        ExceptionObject {
            ty,
            message: message.into(),
            cause: RefCell::new(None),
            backtrace: RefCell::new(None),
        }
    }

    #[inline]
    pub fn exception_type(&self) -> BuiltinType {
        self.ty
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn cause(&self) -> Option<Value> {
        self.cause.borrow().clone()
    }

    pub fn set_cause(&self, cause: Value) {
        *self.cause.borrow_mut() = Some(cause);
    }

    pub fn backtrace(&self) -> Option<EvalBacktrace> {
        self.backtrace.borrow().clone()
    }

    /// Record `backtrace` unless an earlier throw already did.
    pub fn preserve_backtrace(&self, backtrace: &EvalBacktrace) {
        let mut slot = self.backtrace.borrow_mut();
        if slot.is_none() {
            *slot = Some(backtrace.clone());
        }
    }
}

/// Human-readable description of a thrown value.
///
/// Follows `cause` links, and gives up with a fixed sentinel once the chain
/// is deeper than [`MAX_DESCRIBE_DEPTH`], so a self-referential cause cannot
/// loop forever. The depth carries through arrays a cause holds.
pub(crate) fn describe_thrown(value: &Value) -> String {
    describe_at(value, 0, &mut Vec::new())
}

pub(super) fn describe_at(value: &Value, depth: usize, open: &mut Vec<ArrayValue>) -> String {
    if depth > MAX_DESCRIBE_DEPTH {
        return UNKNOWN_MESSAGE.to_owned();
    }
    match value {
        Value::Exception(exception) => {
            let mut text = format!("{}: {}", exception.ty.name(), exception.message);
            if let Some(cause) = exception.cause() {
                text.push_str("\ncaused by: ");
                text.push_str(&describe_at(&cause, depth + 1, open));
            }
            text
        }
        other => other.render(depth, open),
    }
}
