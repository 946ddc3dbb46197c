//! Host stack growth for deep script recursion.
//!
//! Every script frame runs through [`ensure_sufficient_stack`], so the
//! configured frame ceiling, not the host thread's stack size, decides how
//! deep a script may recurse.
//!
//! On wasm32, where `stacker` is unavailable, the closure is called directly.

/// Run `f`, first growing the host stack if it is nearly exhausted.
#[inline]
#[cfg(not(target_arch = "wasm32"))]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    /// Minimum stack space to keep available (100KB red zone).
    const RED_ZONE: usize = 100 * 1024;

    /// Stack space to allocate when growing (1MB).
    const STACK_PER_RECURSION: usize = 1024 * 1024;

    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}

#[inline]
#[cfg(target_arch = "wasm32")]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    f()
}
