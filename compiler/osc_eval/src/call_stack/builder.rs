use crate::config::{ExecutionMode, RuntimeConfig};
use crate::global::global_scope;
use crate::scope::ScopeRef;

use super::CallStack;

/// Builder for [`CallStack`].
///
/// ```text
/// let stack = CallStack::builder()
///     .mode(ExecutionMode::Bounded { depth: 64 })
///     .build();
/// ```
#[derive(Debug, Default)]
pub struct RuntimeBuilder {
    config: RuntimeConfig,
    mode: ExecutionMode,
    global: Option<ScopeRef>,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole configuration.
    #[must_use]
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn max_frame_depth(mut self, depth: usize) -> Self {
        self.config.max_frame_depth = depth;
        self
    }

    #[must_use]
    pub fn members_arena_capacity(mut self, capacity: usize) -> Self {
        self.config.members_arena_capacity = capacity;
        self
    }

    #[must_use]
    pub fn skip_scope_fast_path(mut self, enabled: bool) -> Self {
        self.config.skip_scope_fast_path = enabled;
        self
    }

    #[must_use]
    pub fn use_compiler(mut self, enabled: bool) -> Self {
        self.config.use_compiler = enabled;
        self
    }

    /// Run against `global` instead of the thread's shared global scope.
    #[must_use]
    pub fn global_scope(mut self, global: ScopeRef) -> Self {
        self.global = Some(global);
        self
    }

    pub fn build(self) -> CallStack {
        let config = self.mode.apply(self.config);
        tracing::debug!(
            max_frame_depth = config.max_frame_depth,
            members_arena_capacity = config.members_arena_capacity,
            "building call stack"
        );
        CallStack::from_parts(config, self.global.unwrap_or_else(global_scope))
    }
}
