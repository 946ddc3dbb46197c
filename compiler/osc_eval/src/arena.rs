//! The members arena.
//!
//! One per call stack. Member tables for scopes that cannot escape their
//! frame borrow a contiguous slice of it; the slice is handed back in LIFO
//! order when the frame pops. Slots hold `Reference` handles rather than
//! values, so growing the backing vector never changes a live reference's
//! identity.

use crate::errors::{arena_exhausted, EvalError};
use crate::local::LocalCell;
use crate::reference::Reference;

/// Shared handle to a call stack's arena.
pub(crate) type ArenaHandle = LocalCell<MembersArena>;

pub(crate) struct MembersArena {
    /// Lazily materialised slots. `None` is a slot never touched, or one
    /// whose reference was moved out to the heap.
    slots: Vec<Option<Reference>>,
    /// First free slot.
    watermark: usize,
    /// Watermark recorded by each open frame, outermost first. Slots below
    /// the last mark belong to an outer frame.
    frame_marks: Vec<usize>,
    /// Hard ceiling on `watermark`.
    capacity: usize,
}

impl MembersArena {
    pub(crate) fn new(capacity: usize) -> Self {
        MembersArena {
            slots: Vec::with_capacity(capacity.min(256)),
            watermark: 0,
            frame_marks: Vec::new(),
            capacity,
        }
    }

    /// Record the watermark for a frame opening at `depth`.
    pub(crate) fn open_frame(&mut self, depth: usize) -> usize {
        self.frame_marks.truncate(depth);
        self.frame_marks.push(self.watermark);
        self.watermark
    }

    /// Release everything the frame at `depth` allocated.
    pub(crate) fn close_frame(&mut self, depth: usize, mark: usize) {
        self.frame_marks.truncate(depth);
        self.release_to(mark);
    }

    /// Lowest slot the innermost open frame owns.
    #[inline]
    fn floor(&self) -> usize {
        self.frame_marks.last().copied().unwrap_or(0)
    }

    #[inline]
    pub(crate) fn watermark(&self) -> usize {
        self.watermark
    }

    /// Carve `size` slots off the top.
    pub(crate) fn allocate(&mut self, size: usize) -> Result<usize, EvalError> {
        let available = self.capacity - self.watermark;
        if size > available {
            return Err(arena_exhausted(size, available, self.capacity));
        }
        let off = self.watermark;
        self.watermark += size;
        if self.slots.len() < self.watermark {
            self.slots.resize_with(self.watermark, || None);
        }
        Ok(off)
    }

    /// Whether `[off, off + len)` is the topmost live slice and belongs to
    /// the innermost frame. Only such a slice may move the watermark.
    #[inline]
    pub(crate) fn is_top(&self, off: usize, len: usize) -> bool {
        off + len == self.watermark && off >= self.floor()
    }

    /// Extend the top slice in place. Returns `false` if the slice is not on
    /// top, belongs to an outer frame, or the arena is full; the caller then
    /// moves to the heap.
    pub(crate) fn try_grow(&mut self, off: usize, len: usize, extra: usize) -> bool {
        if !self.is_top(off, len) || extra > self.capacity - self.watermark {
            return false;
        }
        self.watermark += extra;
        if self.slots.len() < self.watermark {
            self.slots.resize_with(self.watermark, || None);
        }
        true
    }

    /// The reference at `index`, created on first touch.
    pub(crate) fn slot(&mut self, index: usize) -> Reference {
        if self.slots.len() <= index {
            self.slots.resize_with(index + 1, || None);
        }
        self.slots[index].get_or_insert_with(Reference::null).clone()
    }

    /// The reference at `index`, if one was ever created.
    pub(crate) fn peek(&self, index: usize) -> Option<Reference> {
        self.slots.get(index).and_then(Clone::clone)
    }

    /// Move `[off, off + len)` out of the arena.
    ///
    /// The arena keeps no handle to the moved references, so recycling the
    /// slice later cannot clobber a cell the heap copy still uses.
    pub(crate) fn take_range(&mut self, off: usize, len: usize, capacity: usize) -> Vec<Reference> {
        let mut refs = Vec::with_capacity(capacity.max(len));
        for index in off..off + len {
            let reference = self
                .slots
                .get_mut(index)
                .and_then(Option::take)
                .unwrap_or_else(Reference::null);
            refs.push(reference);
        }
        refs
    }

    /// Drop the watermark to `off` if `[off, off + len)` is on top.
    pub(crate) fn pop_if_top(&mut self, off: usize, len: usize) -> bool {
        let top = self.is_top(off, len);
        if top {
            self.watermark = off;
        }
        top
    }

    /// `reset_null` every materialised reference in `[off, off + len)`.
    pub(crate) fn reset_range(&mut self, off: usize, len: usize) {
        let end = (off + len).min(self.slots.len());
        for reference in self.slots[off.min(end)..end].iter().flatten() {
            reference.reset_null();
        }
    }

    /// Make `[from, to)` reusable.
    ///
    /// References nobody else holds are recycled in place. Shared ones are
    /// forgotten, leaving the outside holder the only owner.
    pub(crate) fn release_range(&mut self, from: usize, to: usize) {
        let end = to.min(self.slots.len());
        for slot in &mut self.slots[from.min(end)..end] {
            match slot {
                Some(reference) if reference.is_unique() => reference.recycle(),
                Some(_) => *slot = None,
                None => {}
            }
        }
    }

    /// Release everything above `mark` and lower the watermark to it.
    pub(crate) fn release_to(&mut self, mark: usize) {
        if mark >= self.watermark {
            return;
        }
        self.release_range(mark, self.watermark);
        self.watermark = mark;
    }
}
