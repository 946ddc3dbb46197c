//! osc Eval - scope/value runtime and call-frame machinery for osc scripts.
//!
//! This crate is what evaluator nodes run against. It does not parse or
//! walk syntax; a front end hands it [`NodeEvaluator`]s and it provides the
//! environment they execute in.
//!
//! # Architecture
//!
//! - `Value` / `Reference`: script values and the shared mutable slots that
//!   hold them. Closures capture slots, never copies.
//! - `MemberTable`: a scope's slots, either on the heap or borrowed from the
//!   call stack's members arena.
//! - `ScopeRef`: one node of the scope chain (global, block, function call,
//!   constructor, object, fork) with lexical lookup and `this`/`super`/
//!   `callee` resolution.
//! - `Function` / `FunctionData`: script functions, argument mapping and the
//!   call, construct and extends protocols.
//! - `CallStack`: frames, the members arena, scope pooling and backtraces.
//! - `EvaluatorFactories`: picks a compiler or interpreter backend per node.
//!
//! # Memory model
//!
//! Values are `Rc`-based and single-threaded; each script thread owns a
//! `CallStack` and a global scope. Scopes that no nested function can
//! capture live in the arena and are released in LIFO order when their
//! frame pops. Everything else is reference counted. Reference cycles
//! between objects are not collected.

mod arena;
mod call_stack;
mod config;
pub mod errors;
mod evaluator;
mod function;
mod global;
mod local;
mod member_table;
mod reference;
mod scope;
mod stack;
mod value;

#[cfg(test)]
mod testing;
#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests;

use std::sync::Once;

pub use osc_ir::{
    MemberIndexTable, MemberIndexTableBuilder, Permission, PermissionTier, ScopeShape, Symbol,
};

pub use call_stack::{CallStack, FrameInfo, RuntimeBuilder};
pub use config::{
    ExecutionMode, RuntimeConfig, DEFAULT_MAX_FRAME_DEPTH, DEFAULT_MEMBERS_ARENA_CAPACITY,
};
pub use errors::{
    BacktraceFrame, EvalBacktrace, EvalError, EvalErrorKind, EvalNote, EvalResult, Severity,
};
pub use evaluator::{BackendError, EvaluatorFactories, NodeEvaluator, NodeEvaluatorFactory};
pub use function::{Function, FunctionData, FunctionDataBuilder, Param};
pub use global::{global_scope, new_global_scope, reset_global_scope};
pub use member_table::MemberTable;
pub use reference::Reference;
pub use scope::{ScopeRef, ScopeVariant};
pub use stack::ensure_sufficient_stack;
pub use value::{ArrayValue, BuiltinType, ExceptionObject, Value};

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for debug output.
///
/// Safe to call more than once. Does nothing unless `RUST_LOG` is set, e.g.
/// `RUST_LOG=osc_eval=debug` or `RUST_LOG=osc_eval=trace` for per-frame
/// spans.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_ok() {
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(EnvFilter::from_default_env())
                .init();
        }
    });
}
