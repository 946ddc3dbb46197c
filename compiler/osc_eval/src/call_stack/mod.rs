//! Call stack and frame allocator.
//!
//! One `CallStack` per script-execution thread. It records a frame for every
//! evaluator running, owns the members arena that non-escaping scopes borrow
//! their storage from, and keeps a pool of recycled scope objects.
//!
//! # Frame lifecycle
//!
//! [`CallStack::push_frame`] checks the depth ceiling, records the arena
//! watermark, runs the evaluator and then, on every exit path (including a
//! panic unwinding through it), pops the frame: basic scopes allocated in
//! the frame return to the pool and every arena slot above the recorded
//! watermark is recycled.
//!
//! # Arena versus heap
//!
//! A scope whose shape says a nested function might close over it is always
//! heap-allocated, since a captured reference must stay valid after its
//! frame returns. Everything else borrows a slice of the arena, released in
//! LIFO order with the frames.

mod builder;
mod guard;

use std::fmt;
use std::rc::Rc;

use osc_ir::{MemberIndexTable, Symbol};
use smallvec::SmallVec;

pub use builder::RuntimeBuilder;
use guard::FrameGuard;

use crate::arena::{ArenaHandle, MembersArena};
use crate::config::RuntimeConfig;
use crate::errors::{stack_overflow, BacktraceFrame, EvalBacktrace, EvalError, EvalResult};
use crate::evaluator::NodeEvaluator;
use crate::function::{Function, MappedArgs};
use crate::local::LocalCell;
use crate::member_table::MemberTable;
use crate::scope::{FunctionCall, ScopeData, ScopeKind, ScopeRef, ScopeVariant};
use crate::stack::ensure_sufficient_stack;
use crate::value::Value;

struct Frame {
    evaluator: Rc<dyn NodeEvaluator>,
    /// Scope last reported for this frame.
    scope: ScopeRef,
    /// Line last reported for this frame, `0` before the first report.
    line: u32,
    /// Arena watermark when the frame was pushed.
    members_mark: usize,
    /// Basic scopes allocated while this frame was on top.
    scopes: SmallVec<[ScopeRef; 4]>,
}

/// Read-only view of one frame.
#[derive(Clone, Copy, Debug)]
pub struct FrameInfo<'a> {
    pub id: Symbol,
    pub file: &'a str,
    pub line: u32,
    pub scope: &'a ScopeRef,
}

/// Per-thread frame stack, members arena and scope pool.
pub struct CallStack {
    frames: Vec<Frame>,
    arena: ArenaHandle,
    scope_pool: Vec<ScopeRef>,
    config: RuntimeConfig,
    global: ScopeRef,
}

impl CallStack {
    /// Call stack with default configuration over this thread's global
    /// scope.
    pub fn new() -> Self {
        RuntimeBuilder::new().build()
    }

    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    pub(crate) fn from_parts(config: RuntimeConfig, global: ScopeRef) -> Self {
        CallStack {
            frames: Vec::new(),
            arena: LocalCell::new(MembersArena::new(config.members_arena_capacity)),
            scope_pool: Vec::new(),
            config,
            global,
        }
    }

    /// Run `evaluator` in `scope` as a new frame.
    ///
    /// Fails with a fatal stack overflow past the configured depth. The
    /// first error to leave a frame gets the call stack's backtrace
    /// attached; a thrown exception object keeps it for later rethrows.
    #[tracing::instrument(level = "trace", skip_all, fields(depth = self.frames.len()))]
    pub fn push_frame(
        &mut self,
        evaluator: &Rc<dyn NodeEvaluator>,
        scope: &ScopeRef,
    ) -> EvalResult {
        if self.frames.len() >= self.config.max_frame_depth {
            return Err(stack_overflow(self.config.max_frame_depth).with_backtrace(self.capture()));
        }
        let members_mark = self.arena.borrow_mut().open_frame(self.frames.len());
        self.frames.push(Frame {
            evaluator: Rc::clone(evaluator),
            scope: scope.clone(),
            line: 0,
            members_mark,
            scopes: SmallVec::new(),
        });

        let mut frame = FrameGuard::new(self);
        ensure_sufficient_stack(|| {
            let result = evaluator.eval_node(&mut frame, scope);
            result.map_err(|err| frame.annotate(err))
        })
    }

    /// Pop the top frame and release what it allocated.
    pub(crate) fn pop_frame(&mut self) {
        let Some(frame) = self.frames.pop() else {
            return;
        };
        let Frame {
            evaluator,
            scope,
            scopes,
            members_mark,
            line: _,
        } = frame;
        drop((evaluator, scope));

        for scope in scopes {
            if !scope.is_unique() {
                // Still referenced from outside the frame; keep its values.
                scope.promote();
            } else if scope.recycle().is_some() {
                self.scope_pool.push(scope);
            }
        }

        match self.arena.try_borrow_mut() {
            Ok(mut arena) => arena.close_frame(self.frames.len(), members_mark),
            Err(_) => tracing::debug!("members arena busy while popping a frame"),
        }
    }

    fn annotate(&self, err: EvalError) -> EvalError {
        if err.backtrace.is_some() {
            return err;
        }
        let backtrace = self.capture();
        if let Some(Value::Exception(exception)) = err.thrown_value() {
            exception.preserve_backtrace(&backtrace);
        }
        err.with_backtrace(backtrace)
    }

    /// Member table for `size` slots.
    ///
    /// Inside a frame the table is a slice of the arena, released when the
    /// frame pops; outside any frame it lives on the heap.
    pub fn allocate_member_table(&mut self, size: usize) -> Result<MemberTable, EvalError> {
        if self.frames.is_empty() {
            return Ok(MemberTable::with_capacity(size));
        }
        let off = self.arena.borrow_mut().allocate(size)?;
        Ok(MemberTable::in_arena(self.arena.clone(), off, size))
    }

    /// Block scope with shape `index`, chained to `previous`.
    ///
    /// Arena-backed and recycled when the current frame pops, unless the
    /// shape may be captured by a nested function.
    pub fn allocate_basic_scope(
        &mut self,
        previous: &ScopeRef,
        index: Rc<MemberIndexTable>,
    ) -> Result<ScopeRef, EvalError> {
        if index.captures_nested_functions() || self.frames.is_empty() {
            return Ok(ScopeRef::new_basic(previous, index));
        }
        let members = self.allocate_member_table(index.len())?;
        let data = ScopeData::new(Some(previous.clone()), index, members, ScopeKind::Basic, true);
        let scope = self.pooled_scope(data);
        if let Some(frame) = self.frames.last_mut() {
            frame.scopes.push(scope.clone());
        }
        Ok(scope)
    }

    /// Scope for one call of `function`, holding the mapped arguments.
    ///
    /// Pooled when the arguments still live in the arena; a capturing
    /// function's arguments were already moved to the heap.
    pub(crate) fn allocate_function_scope(
        &mut self,
        function: &Rc<Function>,
        previous: &ScopeRef,
        index: Rc<MemberIndexTable>,
        args: MappedArgs,
        this_override: Option<Value>,
    ) -> ScopeRef {
        let MappedArgs {
            mut members,
            trailing,
        } = args;
        members.ensure_capacity(index.len());
        let pooled = members.is_arena_backed();
        let kind = ScopeKind::Function(FunctionCall::new(
            Rc::clone(function),
            this_override,
            trailing,
        ));
        let data = ScopeData::new(Some(previous.clone()), index, members, kind, pooled);
        if pooled {
            self.pooled_scope(data)
        } else {
            ScopeRef::from_data(data)
        }
    }

    fn pooled_scope(&mut self, data: ScopeData) -> ScopeRef {
        match self.scope_pool.pop() {
            Some(scope) => {
                scope.reinit(data);
                scope
            }
            None => {
                tracing::debug!(depth = self.frames.len(), "scope pool empty, allocating");
                ScopeRef::from_data(data)
            }
        }
    }

    /// Release a scope at the end of its execution extent.
    ///
    /// Heap scopes are left alone. A pooled function scope releases its
    /// argument table and, when the caller's handle is the last one, goes
    /// back to the pool. Pooled basic scopes are released with their frame.
    pub fn free_scope(&mut self, scope: &ScopeRef) {
        match scope.pooled_variant() {
            None | Some(ScopeVariant::Basic) => {}
            Some(_) if scope.is_unique() => {
                if let Some(members) = scope.recycle() {
                    members.free();
                    self.scope_pool.push(scope.clone());
                }
            }
            Some(_) => scope.promote(),
        }
    }

    /// Record the current line of the top frame.
    pub fn set_line_number(&mut self, line: u32) {
        if let Some(frame) = self.frames.last_mut() {
            frame.line = line;
        }
    }

    /// Record the current scope and line of the top frame.
    pub fn set_scope_and_line(&mut self, scope: &ScopeRef, line: u32) {
        if let Some(frame) = self.frames.last_mut() {
            frame.scope = scope.clone();
            frame.line = line;
        }
    }

    pub fn current_id(&self) -> Option<Symbol> {
        self.frames.last().map(|frame| frame.evaluator.id())
    }

    pub fn current_line(&self) -> Option<u32> {
        self.frames.last().map(|frame| frame.line)
    }

    pub fn current_scope(&self) -> Option<ScopeRef> {
        self.frames.last().map(|frame| frame.scope.clone())
    }

    /// Frames from the innermost to the root.
    pub fn frames(&self) -> impl Iterator<Item = FrameInfo<'_>> + '_ {
        self.frames.iter().rev().map(|frame| FrameInfo {
            id: frame.evaluator.id(),
            file: frame.evaluator.file(),
            line: frame.line,
            scope: &frame.scope,
        })
    }

    /// Snapshot of the current frames for diagnostics.
    pub fn capture(&self) -> EvalBacktrace {
        EvalBacktrace::new(
            self.frames()
                .map(|frame| BacktraceFrame {
                    name: frame.id.as_str().to_owned(),
                    file: frame.file.to_owned(),
                    line: frame.line,
                })
                .collect(),
        )
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// First free slot of the members arena.
    pub fn members_watermark(&self) -> usize {
        self.arena.borrow().watermark()
    }

    /// Scope objects waiting for reuse.
    pub fn pooled_scope_count(&self) -> usize {
        self.scope_pool.len()
    }

    #[inline]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Global scope this stack's scripts run against.
    #[inline]
    pub fn global(&self) -> &ScopeRef {
        &self.global
    }
}

impl Default for CallStack {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CallStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallStack")
            .field("depth", &self.frames.len())
            .field("members_watermark", &self.members_watermark())
            .field("pooled_scopes", &self.scope_pool.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
