//! Scope chain.
//!
//! A scope is one environment node: a member table addressed through a
//! shared `MemberIndexTable`, a link to the previous (enclosing) scope, and a
//! variant describing how `this`, `super` and `callee` resolve and where new
//! members land. Variants are a sum type dispatched by `match`:
//!
//! - `Global`: root of every chain, holds the built-in types.
//! - `Basic`: a lexical block.
//! - `Function`: one call of a script function.
//! - `Constructor`: one constructor body; private members stay here, every
//!   other declaration lands on the object being built.
//! - `Object`: a script object's public and protected members.
//! - `Fork`: a superclass constructor re-entered for a subclass instance.
//!   Lookup falls through to the superclass's lexical context while members
//!   and `this` resolve against the instance.
//!
//! Borrows of a scope's cell are never held across a call into another
//! scope, so walking a chain that passes through the same cell twice (a
//! constructor and its object, say) cannot conflict.

use std::fmt;
use std::rc::Rc;

use osc_ir::{MemberIndexTable, Permission, Symbol};

use crate::call_stack::CallStack;
use crate::errors::{no_such_member, EvalError};
use crate::function::Function;
use crate::local::LocalCell;
use crate::member_table::MemberTable;
use crate::reference::Reference;
use crate::value::{ArrayValue, Value};

/// Which kind of environment a scope is.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ScopeVariant {
    Global,
    Basic,
    Function,
    Constructor,
    Object,
    Fork,
}

/// Per-call state of a function scope.
pub(crate) struct FunctionCall {
    pub(crate) function: Rc<Function>,
    /// Receiver supplied by the caller instead of the lexical `this`.
    pub(crate) this_override: Option<Value>,
    /// Arguments past the declared parameters.
    pub(crate) trailing: Vec<Value>,
    /// Cached `in` binding, built on first lookup.
    auto_vargs: Option<Reference>,
}

impl FunctionCall {
    pub(crate) fn new(
        function: Rc<Function>,
        this_override: Option<Value>,
        trailing: Vec<Value>,
    ) -> Self {
        FunctionCall {
            function,
            this_override,
            trailing,
            auto_vargs: None,
        }
    }

    fn auto_vargs(&mut self) -> Reference {
        let trailing = &self.trailing;
        self.auto_vargs
            .get_or_insert_with(|| {
                Reference::constant(Value::Array(ArrayValue::frozen(trailing.clone())))
            })
            .clone()
    }
}

pub(crate) enum ScopeKind {
    Global,
    Basic,
    Function(FunctionCall),
    Constructor { function: Rc<Function> },
    Object { function: Option<Rc<Function>> },
    Fork { object: ScopeRef },
}

impl ScopeKind {
    fn variant(&self) -> ScopeVariant {
        match self {
            ScopeKind::Global => ScopeVariant::Global,
            ScopeKind::Basic => ScopeVariant::Basic,
            ScopeKind::Function(_) => ScopeVariant::Function,
            ScopeKind::Constructor { .. } => ScopeVariant::Constructor,
            ScopeKind::Object { .. } => ScopeVariant::Object,
            ScopeKind::Fork { .. } => ScopeVariant::Fork,
        }
    }
}

pub(crate) struct ScopeData {
    previous: Option<ScopeRef>,
    index: Rc<MemberIndexTable>,
    members: MemberTable,
    kind: ScopeKind,
    /// Allocated by a call stack from its arena and scope pool.
    pooled: bool,
}

impl ScopeData {
    pub(crate) fn new(
        previous: Option<ScopeRef>,
        index: Rc<MemberIndexTable>,
        members: MemberTable,
        kind: ScopeKind,
        pooled: bool,
    ) -> Self {
        ScopeData {
            previous,
            index,
            members,
            kind,
            pooled,
        }
    }

    fn heap(previous: Option<ScopeRef>, index: Rc<MemberIndexTable>, kind: ScopeKind) -> Self {
        let members = MemberTable::with_capacity(index.len());
        ScopeData::new(previous, index, members, kind, false)
    }

    /// Own member, for variants that store members in their own table.
    fn stored_member(&mut self, id: Symbol) -> Option<Reference> {
        let slot = self.index.get(id);
        match &mut self.kind {
            ScopeKind::Function(call) => match slot {
                // Every name in a function's shape resolves locally, reading
                // `null` until assigned.
                Some(slot) => {
                    let reference = self.members.reference_at(slot);
                    (!reference.is_invalid()).then_some(reference)
                }
                None if id == Symbol::VARGS_IN => Some(call.auto_vargs()),
                None => None,
            },
            _ => {
                let reference = self.members.reference_if_present(slot?)?;
                (reference.is_declared() && !reference.is_invalid()).then_some(reference)
            }
        }
    }
}

/// Shared handle to a scope.
#[derive(Clone)]
pub struct ScopeRef(LocalCell<ScopeData>);

impl ScopeRef {
    pub(crate) fn from_data(data: ScopeData) -> Self {
        ScopeRef(LocalCell::new(data))
    }

    /// An empty global scope with no built-ins installed.
    pub fn new_global() -> Self {
        Self::from_data(ScopeData::heap(
            None,
            Rc::new(MemberIndexTable::default()),
            ScopeKind::Global,
        ))
    }

    /// Heap-allocated block scope.
    pub fn new_basic(previous: &ScopeRef, index: Rc<MemberIndexTable>) -> Self {
        Self::from_data(ScopeData::heap(
            Some(previous.clone()),
            index,
            ScopeKind::Basic,
        ))
    }

    pub(crate) fn new_object(
        previous: &ScopeRef,
        index: Rc<MemberIndexTable>,
        function: Option<Rc<Function>>,
    ) -> Self {
        Self::from_data(ScopeData::heap(
            Some(previous.clone()),
            index,
            ScopeKind::Object { function },
        ))
    }

    /// Private constructor scope layered over `previous`, which is either
    /// the object itself or a fork onto it.
    pub(crate) fn new_constructor(
        previous: &ScopeRef,
        index: Rc<MemberIndexTable>,
        function: Rc<Function>,
    ) -> Self {
        Self::from_data(ScopeData::heap(
            Some(previous.clone()),
            index,
            ScopeKind::Constructor { function },
        ))
    }

    pub(crate) fn new_fork(previous: &ScopeRef, object: &ScopeRef) -> Self {
        Self::from_data(ScopeData::heap(
            Some(previous.clone()),
            Rc::new(MemberIndexTable::default()),
            ScopeKind::Fork {
                object: object.clone(),
            },
        ))
    }

    pub fn variant(&self) -> ScopeVariant {
        self.0.borrow().kind.variant()
    }

    pub fn previous(&self) -> Option<ScopeRef> {
        self.0.borrow().previous.clone()
    }

    #[inline]
    pub fn ptr_eq(a: &ScopeRef, b: &ScopeRef) -> bool {
        LocalCell::ptr_eq(&a.0, &b.0)
    }

    /// Whether the caller's handle is the only one.
    #[inline]
    pub(crate) fn is_unique(&self) -> bool {
        self.0.is_unique()
    }

    /// Variant of a pooled scope, `None` for heap scopes. Also `None` while
    /// the scope is borrowed, which only happens during a panic unwind.
    pub(crate) fn pooled_variant(&self) -> Option<ScopeVariant> {
        let data = self.0.try_borrow().ok()?;
        data.pooled.then(|| data.kind.variant())
    }

    pub fn is_arena_backed(&self) -> bool {
        self.0.borrow().members.is_arena_backed()
    }

    /// Number of slots in this scope's own member table.
    pub fn member_count(&self) -> usize {
        self.0.borrow().members.len()
    }

    /// Names of the members declared directly in this scope.
    pub fn member_names(&self) -> Vec<Symbol> {
        let data = self.0.borrow();
        let mut names: Vec<(usize, Symbol)> = data
            .index
            .iter()
            .filter(|&(_, slot)| {
                data.members
                    .reference_if_present(slot)
                    .is_some_and(|r| r.is_declared() && !r.is_invalid())
            })
            .map(|(id, slot)| (slot, id))
            .collect();
        names.sort_unstable_by_key(|&(slot, _)| slot);
        names.into_iter().map(|(_, id)| id).collect()
    }

    /// The function whose constructor built this object scope.
    pub fn constructed_by(&self) -> Option<Rc<Function>> {
        match &self.0.borrow().kind {
            ScopeKind::Object { function } => function.clone(),
            ScopeKind::Fork { object } => object.constructed_by(),
            _ => None,
        }
    }

    /// The function a function or constructor scope is executing.
    pub(crate) fn executing_function(&self) -> Option<Rc<Function>> {
        match &self.0.borrow().kind {
            ScopeKind::Function(call) => Some(Rc::clone(&call.function)),
            ScopeKind::Constructor { function } => Some(Rc::clone(function)),
            _ => None,
        }
    }

    /// Member bound directly in this scope, without consulting parents.
    pub fn own_member(&self, id: Symbol) -> Option<Reference> {
        let fork_object = match &self.0.borrow().kind {
            ScopeKind::Fork { object } => Some(object.clone()),
            _ => None,
        };
        match fork_object {
            Some(object) => object.own_member(id),
            None => self.0.borrow_mut().stored_member(id),
        }
    }

    /// Declare `id` in this scope and return its slot.
    ///
    /// Re-declaring returns the same reference. A constructor scope keeps
    /// private members and forwards the rest to the object under
    /// construction; a fork forwards everything to its object.
    pub fn create_member(&self, id: Symbol, permission: Permission) -> Reference {
        let redirect = {
            let data = self.0.borrow();
            match &data.kind {
                ScopeKind::Constructor { .. } if !permission.declared().is_private() => {
                    data.previous.clone()
                }
                ScopeKind::Fork { object } => Some(object.clone()),
                _ => None,
            }
        };
        if let Some(target) = redirect {
            return target.create_member(id, permission);
        }

        let mut data = self.0.borrow_mut();
        let data = &mut *data;
        let slot = match data.index.get(id) {
            Some(slot) => slot,
            // A name outside the shared shape; the scope gets its own copy
            // of the table so sibling instances are unaffected.
            None => Rc::make_mut(&mut data.index).insert(id, permission),
        };
        let reference = data.members.reference_at(slot);
        reference.declare(permission);
        reference
    }

    /// Resolve `id` lexically: this scope, then each previous scope up to
    /// the global root. `None` if nothing binds it.
    pub fn lookup_in_scope(&self, id: Symbol) -> Option<Reference> {
        let mut scope = self.clone();
        loop {
            if let Some(reference) = scope.own_member(id) {
                return Some(reference);
            }
            scope = scope.previous()?;
        }
    }

    /// Object-style access: this scope's own members, then static members
    /// along the constructing function's super chain.
    pub fn get_member(&self, id: Symbol, throw: bool) -> Result<Option<Reference>, EvalError> {
        let found = self.own_member(id).or_else(|| {
            self.constructed_by()
                .and_then(|function| function.type_member(id))
        });
        match found {
            Some(reference) => Ok(Some(reference)),
            None if throw => Err(no_such_member(id)),
            None => Ok(None),
        }
    }

    /// The receiver for `this`.
    pub fn get_this(&self) -> Option<Value> {
        let mut scope = self.clone();
        loop {
            let next = {
                let data = scope.0.borrow();
                match &data.kind {
                    ScopeKind::Function(FunctionCall {
                        this_override: Some(this),
                        ..
                    }) => return Some(this.clone()),
                    ScopeKind::Object { .. } => return Some(Value::Object(scope.clone())),
                    ScopeKind::Fork { object } => return Some(Value::Object(object.clone())),
                    ScopeKind::Global => return None,
                    _ => data.previous.clone(),
                }
            };
            scope = next?;
        }
    }

    /// The value `super` names.
    ///
    /// Inside a method that replaced an inherited member, the replaced
    /// member. Inside a constructor or on an object, the super function.
    pub fn get_super(&self) -> Option<Value> {
        let mut scope = self.clone();
        loop {
            let next = {
                let data = scope.0.borrow();
                match &data.kind {
                    ScopeKind::Function(call) => match call.function.overridden() {
                        Some(overridden) => return Some(overridden.clone()),
                        None => data.previous.clone(),
                    },
                    ScopeKind::Constructor { function } => {
                        return Some(function.super_function().clone())
                    }
                    ScopeKind::Object {
                        function: Some(function),
                    } => return Some(function.super_function().clone()),
                    ScopeKind::Fork { object } => return object.get_super(),
                    ScopeKind::Global | ScopeKind::Object { function: None } => return None,
                    ScopeKind::Basic => data.previous.clone(),
                }
            };
            scope = next?;
        }
    }

    /// The function currently executing, for `callee`.
    pub fn get_callee(&self) -> Option<Value> {
        let mut scope = self.clone();
        loop {
            if let Some(function) = scope.executing_function() {
                return Some(Value::Function(function));
            }
            let next = {
                let data = scope.0.borrow();
                match data.kind {
                    ScopeKind::Basic => data.previous.clone(),
                    _ => None,
                }
            };
            scope = next?;
        }
    }

    /// End of this scope's execution extent.
    ///
    /// Pooled scopes go back to `stack`; heap scopes are left to the
    /// reference count.
    pub fn free(&self, stack: &mut CallStack) {
        stack.free_scope(self);
    }

    /// Move arena-backed members to the heap.
    pub(crate) fn promote(&self) {
        if let Ok(mut data) = self.0.try_borrow_mut() {
            data.pooled = false;
            if data.members.is_arena_backed() {
                let copy = data.members.safe_copy();
                data.members = copy;
            }
        }
    }

    /// Drop everything the scope holds and hand back its member table.
    ///
    /// `None` if the scope is borrowed, which only happens while unwinding
    /// from a panic inside an evaluator.
    pub(crate) fn recycle(&self) -> Option<MemberTable> {
        let mut data = self.0.try_borrow_mut().ok()?;
        data.previous = None;
        data.kind = ScopeKind::Basic;
        data.pooled = false;
        Some(std::mem::take(&mut data.members))
    }

    /// Reuse a recycled scope for new contents.
    pub(crate) fn reinit(&self, data: ScopeData) {
        *self.0.borrow_mut() = data;
    }

    /// Forget every member, keeping the scope's identity.
    pub(crate) fn clear_members(&self) {
        let mut data = self.0.borrow_mut();
        data.index = Rc::new(MemberIndexTable::default());
        data.members = MemberTable::new();
    }
}

impl fmt::Debug for ScopeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(data) => f
                .debug_struct("ScopeRef")
                .field("variant", &data.kind.variant())
                .field("members", &data.members.len())
                .finish(),
            Err(_) => f.write_str("ScopeRef(<borrowed>)"),
        }
    }
}
