use std::ops::{Deref, DerefMut};

use super::CallStack;

/// RAII guard that pops the frame it was created for.
///
/// The evaluator runs against the guard through `DerefMut`, so the frame is
/// popped and its arena slots released even when a panic unwinds through
/// the evaluation.
pub(super) struct FrameGuard<'a> {
    stack: &'a mut CallStack,
}

impl<'a> FrameGuard<'a> {
    pub(super) fn new(stack: &'a mut CallStack) -> Self {
        FrameGuard { stack }
    }
}

impl Drop for FrameGuard<'_> {
    fn drop(&mut self) {
        self.stack.pop_frame();
    }
}

impl Deref for FrameGuard<'_> {
    type Target = CallStack;

    fn deref(&self) -> &Self::Target {
        self.stack
    }
}

impl DerefMut for FrameGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.stack
    }
}
