//! Single-threaded shared cell used for every piece of aliased runtime state.

use std::cell::{BorrowError, BorrowMutError, Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

/// Reference-counted interior-mutable cell.
///
/// Wraps `Rc<RefCell<T>>` so that references, scopes, arrays and the members
/// arena all allocate through one factory. Not `Send`: each call stack and
/// everything reachable from it belongs to one thread.
#[repr(transparent)]
pub(crate) struct LocalCell<T>(Rc<RefCell<T>>);

impl<T> LocalCell<T> {
    #[inline]
    pub(crate) fn new(value: T) -> Self {
        LocalCell(Rc::new(RefCell::new(value)))
    }

    #[inline]
    pub(crate) fn borrow(&self) -> Ref<'_, T> {
        self.0.borrow()
    }

    #[inline]
    pub(crate) fn borrow_mut(&self) -> RefMut<'_, T> {
        self.0.borrow_mut()
    }

    #[inline]
    pub(crate) fn try_borrow(&self) -> Result<Ref<'_, T>, BorrowError> {
        self.0.try_borrow()
    }

    /// Mutable borrow that reports contention instead of panicking.
    ///
    /// Used on cleanup paths that may run during unwinding.
    #[inline]
    pub(crate) fn try_borrow_mut(&self) -> Result<RefMut<'_, T>, BorrowMutError> {
        self.0.try_borrow_mut()
    }

    /// Whether both handles point at the same cell.
    #[inline]
    pub(crate) fn ptr_eq(a: &Self, b: &Self) -> bool {
        Rc::ptr_eq(&a.0, &b.0)
    }

    /// Whether this is the only handle to the cell.
    #[inline]
    pub(crate) fn is_unique(&self) -> bool {
        Rc::strong_count(&self.0) == 1
    }
}

impl<T> Clone for LocalCell<T> {
    #[inline]
    fn clone(&self) -> Self {
        LocalCell(Rc::clone(&self.0))
    }
}

impl<T: fmt::Debug> fmt::Debug for LocalCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.try_borrow() {
            Ok(inner) => f.debug_tuple("LocalCell").field(&*inner).finish(),
            Err(_) => f.write_str("LocalCell(<borrowed>)"),
        }
    }
}

impl<T: Default> Default for LocalCell<T> {
    fn default() -> Self {
        LocalCell::new(T::default())
    }
}
