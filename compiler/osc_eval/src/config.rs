//! Runtime configuration.

/// Frame-depth ceiling used when nothing else is configured.
pub const DEFAULT_MAX_FRAME_DEPTH: usize = 2048;

/// Members arena size used when nothing else is configured.
pub const DEFAULT_MEMBERS_ARENA_CAPACITY: usize = 8192;

/// Tunables for one call stack.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Pushing a frame past this depth is a fatal stack overflow.
    pub max_frame_depth: usize,
    /// Slots in the members arena. Exhausting it is fatal.
    pub members_arena_capacity: usize,
    /// Run argument-less calls of parameterless, local-free functions
    /// directly in the enclosing scope.
    pub skip_scope_fast_path: bool,
    /// Prefer the compiler backend when building evaluators.
    pub use_compiler: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            max_frame_depth: DEFAULT_MAX_FRAME_DEPTH,
            members_arena_capacity: DEFAULT_MEMBERS_ARENA_CAPACITY,
            skip_scope_fast_path: true,
            use_compiler: true,
        }
    }
}

/// Execution policy preset.
///
/// Enum dispatch: each variant answers the policy questions through its
/// methods.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum ExecutionMode {
    /// Ordinary script execution with the configured limits.
    #[default]
    Interpret,
    /// Tight frame ceiling for untrusted or test code.
    Bounded {
        /// Maximum frame depth.
        depth: usize,
    },
}

impl ExecutionMode {
    /// Frame ceiling this mode imposes, or `None` to keep the configured one.
    #[inline]
    pub fn max_frame_depth(&self) -> Option<usize> {
        match self {
            Self::Interpret => None,
            Self::Bounded { depth } => Some(*depth),
        }
    }

    #[inline]
    pub fn is_bounded(&self) -> bool {
        matches!(self, Self::Bounded { .. })
    }

    /// `config` with this mode's limits applied.
    pub fn apply(&self, mut config: RuntimeConfig) -> RuntimeConfig {
        if let Some(depth) = self.max_frame_depth() {
            config.max_frame_depth = config.max_frame_depth.min(depth);
        }
        config
    }
}
