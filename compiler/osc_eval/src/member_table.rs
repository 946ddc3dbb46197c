//! Member tables: the storage behind every scope and argument list.
//!
//! A table is indexed by slot number; the `Symbol -> slot` mapping lives in
//! the scope's `MemberIndexTable`. Storage is either a slice of the call
//! stack's members arena or an ordinary vector. An arena table is moved to
//! the heap ("copied out") whenever something needs it to outlive or
//! out-grow its slice. Reference identities survive the move. A slice that
//! an inner frame sits on top of cannot be handed back at that point; the
//! table keeps it reserved and returns it when freed.

use std::fmt;

use crate::arena::ArenaHandle;
use crate::reference::Reference;
use crate::value::Value;

enum Storage {
    /// `refs.len()` always equals the table's logical length.
    Heap(Vec<Reference>),
    /// Slots `[off, off + cap)` of the arena.
    Arena {
        arena: ArenaHandle,
        off: usize,
        cap: usize,
    },
}

/// Arena slice a copied-out table still holds.
struct Reservation {
    arena: ArenaHandle,
    off: usize,
    cap: usize,
}

/// Indexable, growable sequence of [`Reference`]s.
pub struct MemberTable {
    storage: Storage,
    len: usize,
    reserved: Option<Reservation>,
}

impl MemberTable {
    /// Empty heap table.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        MemberTable {
            storage: Storage::Heap(Vec::with_capacity(capacity)),
            len: 0,
            reserved: None,
        }
    }

    /// Heap table holding `values` in order.
    pub fn from_values<I>(values: I) -> Self
    where
        I: IntoIterator<Item = Value>,
    {
        let refs: Vec<Reference> = values.into_iter().map(Reference::new).collect();
        MemberTable {
            len: refs.len(),
            storage: Storage::Heap(refs),
            reserved: None,
        }
    }

    pub(crate) fn in_arena(arena: ArenaHandle, off: usize, cap: usize) -> Self {
        MemberTable {
            storage: Storage::Arena { arena, off, cap },
            len: 0,
            reserved: None,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether the table still borrows a slice of the members arena.
    #[inline]
    pub fn is_arena_backed(&self) -> bool {
        matches!(self.storage, Storage::Arena { .. })
    }

    /// The stable reference at `index`, growing the table if needed.
    ///
    /// Slots between the old length and `index` are zero-filled with
    /// `null`. Repeated calls return the same cell until the table is freed.
    pub fn reference_at(&mut self, index: usize) -> Reference {
        if index >= self.len {
            self.ensure_capacity(index + 1);
            self.len = index + 1;
        }
        match &mut self.storage {
            Storage::Heap(refs) => {
                if refs.len() <= index {
                    refs.resize_with(index + 1, Reference::null);
                }
                refs[index].clone()
            }
            Storage::Arena { arena, off, .. } => arena.borrow_mut().slot(*off + index),
        }
    }

    /// The reference at `index`, without growing or materialising anything.
    pub(crate) fn reference_if_present(&self, index: usize) -> Option<Reference> {
        if index >= self.len {
            return None;
        }
        match &self.storage {
            Storage::Heap(refs) => refs.get(index).cloned(),
            Storage::Arena { arena, off, .. } => arena.borrow().peek(*off + index),
        }
    }

    /// Value at `index`; untouched slots read as `null`.
    pub fn value_at(&self, index: usize) -> Option<Value> {
        if index >= self.len {
            return None;
        }
        Some(
            self.reference_if_present(index)
                .map_or(Value::Null, |reference| reference.get()),
        )
    }

    /// Snapshot of every value, in slot order.
    pub fn values(&self) -> Vec<Value> {
        (0..self.len).filter_map(|i| self.value_at(i)).collect()
    }

    /// Make room for `capacity` slots without changing the logical length.
    ///
    /// An arena table on top of the arena, allocated by the innermost
    /// frame, grows in place; any other arena table is copied out.
    pub fn ensure_capacity(&mut self, capacity: usize) {
        let copy_out = match &mut self.storage {
            Storage::Heap(refs) => {
                refs.reserve(capacity.saturating_sub(refs.len()));
                false
            }
            Storage::Arena { arena, off, cap } => {
                if capacity <= *cap {
                    false
                } else if arena.borrow_mut().try_grow(*off, *cap, capacity - *cap) {
                    *cap = capacity;
                    false
                } else {
                    true
                }
            }
        };
        if copy_out {
            self.copy_out(capacity);
        }
    }

    /// Move an arena table to the heap, keeping the same references.
    fn copy_out(&mut self, capacity: usize) {
        let (refs, reserved) = match &self.storage {
            Storage::Heap(_) => return,
            Storage::Arena { arena: handle, off, cap } => {
                let mut arena = handle.borrow_mut();
                let refs = arena.take_range(*off, self.len, capacity);
                let reserved = (!arena.pop_if_top(*off, *cap)).then(|| Reservation {
                    arena: handle.clone(),
                    off: *off,
                    cap: *cap,
                });
                tracing::debug!(
                    off,
                    len = self.len,
                    reserved = reserved.is_some(),
                    "member table copied out of the arena"
                );
                (refs, reserved)
            }
        };
        self.storage = Storage::Heap(refs);
        self.reserved = reserved;
    }

    /// Independent table sharing this table's references.
    ///
    /// Writes through either table are visible through the other. An arena
    /// table is copied out first, so the result stays valid after the frame
    /// that allocated the original pops.
    pub fn safe_copy(&mut self) -> MemberTable {
        self.copy_out(self.len);
        let refs = self.references();
        MemberTable {
            len: refs.len(),
            storage: Storage::Heap(refs),
            reserved: None,
        }
    }

    fn references(&self) -> Vec<Reference> {
        match &self.storage {
            Storage::Heap(refs) => refs.clone(),
            Storage::Arena { arena, off, .. } => {
                let mut arena = arena.borrow_mut();
                (0..self.len).map(|i| arena.slot(off + i)).collect()
            }
        }
    }

    /// Set every slot back to `null`.
    pub fn reset(&mut self) {
        match &self.storage {
            Storage::Heap(refs) => refs.iter().for_each(Reference::reset_null),
            Storage::Arena { arena, off, .. } => arena.borrow_mut().reset_range(*off, self.len),
        }
    }

    /// Release the table.
    ///
    /// An arena slice, or the slice a copied-out table still reserves, is
    /// recycled, and the watermark drops if the slice is on top. Heap
    /// storage is simply dropped.
    pub fn free(self) {
        let slice = match self.storage {
            Storage::Arena { arena, off, cap } => Some((arena, off, cap)),
            Storage::Heap(_) => self
                .reserved
                .map(|Reservation { arena, off, cap }| (arena, off, cap)),
        };
        if let Some((arena, off, cap)) = slice {
            let mut arena = arena.borrow_mut();
            arena.release_range(off, off + cap);
            arena.pop_if_top(off, cap);
        }
    }

    /// Empty the table and reserve `capacity` slots.
    pub fn reinit(&mut self, capacity: usize) {
        self.truncate(0);
        self.ensure_capacity(capacity);
    }

    /// Shorten the table to `len` slots, releasing the rest.
    pub fn truncate(&mut self, len: usize) {
        if len >= self.len {
            return;
        }
        match &mut self.storage {
            Storage::Heap(refs) => refs.truncate(len),
            Storage::Arena { arena, off, .. } => {
                arena.borrow_mut().release_range(*off + len, *off + self.len);
            }
        }
        self.len = len;
    }

    /// Append one value.
    pub fn push(&mut self, value: Value) {
        let index = self.len;
        self.reference_at(index).reset(value);
    }

    pub fn push1(&mut self, value: Value) {
        self.push(value);
    }

    pub fn push2(&mut self, v1: Value, v2: Value) {
        self.ensure_capacity(self.len + 2);
        self.push(v1);
        self.push(v2);
    }

    pub fn push3(&mut self, v1: Value, v2: Value, v3: Value) {
        self.ensure_capacity(self.len + 3);
        self.push(v1);
        self.push(v2);
        self.push(v3);
    }

    pub fn push4(&mut self, v1: Value, v2: Value, v3: Value, v4: Value) {
        self.ensure_capacity(self.len + 4);
        self.push(v1);
        self.push(v2);
        self.push(v3);
        self.push(v4);
    }
}

impl Default for MemberTable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MemberTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.storage {
            Storage::Heap(_) => f
                .debug_struct("MemberTable")
                .field("len", &self.len)
                .finish(),
            Storage::Arena { off, cap, .. } => f
                .debug_struct("MemberTable")
                .field("len", &self.len)
                .field("off", off)
                .field("cap", cap)
                .finish(),
        }
    }
}
