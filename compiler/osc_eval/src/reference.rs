//! Member slots.
//!
//! A [`Reference`] is one mutable storage cell plus its permission tag.
//! Handles are cheap to clone and every clone aliases the same cell: a
//! closure that captured a reference sees later writes made through the
//! member table that produced it.

use std::fmt;

use osc_ir::{Permission, Symbol};

use crate::errors::{const_reassignment, EvalError};
use crate::local::LocalCell;
use crate::value::Value;

struct Slot {
    value: Value,
    permission: Permission,
    /// Set by the first `declare`; zero-filled slots stay undeclared.
    declared: bool,
    /// Set by the first script-level write; `CONST` slots refuse a second.
    written: bool,
}

impl Slot {
    fn empty(value: Value) -> Self {
        Slot {
            value,
            permission: Permission::PUBLIC,
            declared: false,
            written: false,
        }
    }
}

/// Shared handle to one storage cell.
#[derive(Clone)]
pub struct Reference(LocalCell<Slot>);

impl Reference {
    /// An undeclared slot holding `null`.
    pub fn null() -> Self {
        Reference(LocalCell::new(Slot::empty(Value::Null)))
    }

    /// An undeclared slot holding `value`.
    pub fn new(value: Value) -> Self {
        Reference(LocalCell::new(Slot::empty(value)))
    }

    /// A declared slot with the given permission.
    pub fn with_permission(value: Value, permission: Permission) -> Self {
        Reference(LocalCell::new(Slot {
            value,
            permission: permission.declared(),
            declared: true,
            written: false,
        }))
    }

    /// A declared, already-written `CONST` slot.
    pub fn constant(value: Value) -> Self {
        let reference = Self::with_permission(value, Permission::PUBLIC | Permission::CONST);
        reference.0.borrow_mut().written = true;
        reference
    }

    /// Current value.
    #[inline]
    pub fn get(&self) -> Value {
        self.0.borrow().value.clone()
    }

    #[inline]
    pub fn permission(&self) -> Permission {
        self.0.borrow().permission
    }

    #[inline]
    pub fn is_declared(&self) -> bool {
        self.0.borrow().declared
    }

    /// Tombstoned slots read as absent.
    #[inline]
    pub fn is_invalid(&self) -> bool {
        self.0.borrow().permission.is_invalid()
    }

    /// Fix this slot's permission on first declaration.
    ///
    /// Later declarations of the same slot leave the tier alone.
    pub fn declare(&self, permission: Permission) {
        let mut slot = self.0.borrow_mut();
        if !slot.declared {
            slot.permission = permission.declared();
            slot.declared = true;
        }
    }

    /// Script-level write.
    pub fn assign(&self, value: Value) -> Result<(), EvalError> {
        self.assign_named(None, value)
    }

    /// Script-level write, naming the member in the const-violation error.
    pub fn assign_named(&self, name: Option<Symbol>, value: Value) -> Result<(), EvalError> {
        let mut slot = self.0.borrow_mut();
        if slot.written && slot.permission.is_const() {
            return Err(const_reassignment(name));
        }
        slot.value = value;
        slot.written = true;
        Ok(())
    }

    /// Store `value` as the slot's first write, bypassing the const check.
    ///
    /// Used by the host to install bindings a script must not overwrite.
    pub fn initialize(&self, value: Value) {
        let mut slot = self.0.borrow_mut();
        slot.value = value;
        slot.written = true;
    }

    /// Host re-initialisation: store `value` and forget any earlier write.
    pub fn reset(&self, value: Value) {
        let mut slot = self.0.borrow_mut();
        slot.value = value;
        slot.written = false;
    }

    #[inline]
    pub fn reset_null(&self) {
        self.reset(Value::Null);
    }

    /// Tombstone the slot.
    pub fn invalidate(&self) {
        let mut slot = self.0.borrow_mut();
        slot.permission.insert(Permission::INVALID);
        slot.value = Value::Null;
    }

    /// Whether both handles alias the same cell.
    #[inline]
    pub fn ptr_eq(a: &Reference, b: &Reference) -> bool {
        LocalCell::ptr_eq(&a.0, &b.0)
    }

    /// Whether no one but the caller holds this cell.
    #[inline]
    pub(crate) fn is_unique(&self) -> bool {
        self.0.is_unique()
    }

    /// Return a recycled cell to its freshly-allocated state.
    pub(crate) fn recycle(&self) {
        *self.0.borrow_mut() = Slot::empty(Value::Null);
    }
}

impl Default for Reference {
    fn default() -> Self {
        Self::null()
    }
}

impl fmt::Debug for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = self.0.borrow();
        f.debug_struct("Reference")
            .field("value", &slot.value)
            .field("permission", &slot.permission)
            .finish()
    }
}
