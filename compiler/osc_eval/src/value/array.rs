use std::fmt;

use crate::errors::{unsupported_operation, EvalError};
use crate::local::LocalCell;

use super::Value;

/// Script array. Clones share storage.
#[derive(Clone)]
pub struct ArrayValue {
    elements: LocalCell<Vec<Value>>,
    /// Frozen arrays reject writes; used for the auto var-args view.
    frozen: bool,
}

impl ArrayValue {
    pub fn new(elements: Vec<Value>) -> Self {
        ArrayValue {
            elements: LocalCell::new(elements),
            frozen: false,
        }
    }

    pub fn frozen(elements: Vec<Value>) -> Self {
        ArrayValue {
            elements: LocalCell::new(elements),
            frozen: true,
        }
    }

    pub fn len(&self) -> usize {
        self.elements.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.borrow().is_empty()
    }

    #[inline]
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.elements.borrow().get(index).cloned()
    }

    /// Store `value` at `index`, growing the array with `null` as needed.
    pub fn set(&self, index: usize, value: Value) -> Result<(), EvalError> {
        self.check_writable()?;
        let mut elements = self.elements.borrow_mut();
        if elements.len() <= index {
            elements.resize(index + 1, Value::Null);
        }
        elements[index] = value;
        Ok(())
    }

    pub fn push(&self, value: Value) -> Result<(), EvalError> {
        self.check_writable()?;
        self.elements.borrow_mut().push(value);
        Ok(())
    }

    pub fn to_vec(&self) -> Vec<Value> {
        self.elements.borrow().clone()
    }

    pub fn ptr_eq(&self, other: &ArrayValue) -> bool {
        LocalCell::ptr_eq(&self.elements, &other.elements)
    }

    fn check_writable(&self) -> Result<(), EvalError> {
        if self.frozen {
            Err(unsupported_operation("write to a read-only array"))
        } else {
            Ok(())
        }
    }
}

impl fmt::Debug for ArrayValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Rendered rather than derived: an array may contain itself.
        let elements = Value::Array(self.clone()).cast_to_string();
        f.debug_struct("ArrayValue")
            .field("elements", &format_args!("{elements}"))
            .field("frozen", &self.frozen)
            .finish()
    }
}
