//! Scope shapes: symbol-to-slot mappings shared by every instance of a scope.
//!
//! The front end computes one [`ScopeShape`] per function body or block.
//! Every invocation of that body reuses the same tables, so a member lookup
//! is a hash probe on a `Symbol` followed by an index into the instance's
//! member table.

use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::{Permission, PermissionTier, Symbol};

/// Immutable `Symbol -> slot` mapping for one permission-filtered view of a
/// scope shape.
///
/// Slots are dense: the n-th admitted declaration gets slot `n`. Parameters
/// are declared first, so parameter `i` lives in slot `i` of the
/// [`PermissionTier::All`] and [`PermissionTier::Private`] views.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MemberIndexTable {
    slots: FxHashMap<Symbol, usize>,
    names: Vec<Symbol>,
    permissions: Vec<Permission>,
    captures_nested_functions: bool,
}

impl MemberIndexTable {
    /// Start building a table.
    pub fn builder() -> MemberIndexTableBuilder {
        MemberIndexTableBuilder::default()
    }

    /// Slot of `id`, if declared.
    #[inline]
    pub fn get(&self, id: Symbol) -> Option<usize> {
        self.slots.get(&id).copied()
    }

    /// Whether `id` is declared.
    #[inline]
    pub fn contains(&self, id: Symbol) -> bool {
        self.slots.contains_key(&id)
    }

    /// Number of slots.
    #[inline]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Symbol declared at `slot`.
    pub fn symbol_at(&self, slot: usize) -> Option<Symbol> {
        self.names.get(slot).copied()
    }

    /// Declared permission of `slot`.
    pub fn permission_at(&self, slot: usize) -> Option<Permission> {
        self.permissions.get(slot).copied()
    }

    /// Whether the body this shape belongs to declares a nested function.
    ///
    /// Such a function may close over the scope's bindings, so instances of
    /// the shape must keep their storage off the members arena.
    #[inline]
    pub fn captures_nested_functions(&self) -> bool {
        self.captures_nested_functions
    }

    /// Add `id` if absent and return its slot.
    ///
    /// Shapes are normally complete when built. This exists for bindings
    /// created at runtime that the front end did not predeclare; callers
    /// holding a shared table go through `Rc::make_mut` first.
    pub fn insert(&mut self, id: Symbol, permission: Permission) -> usize {
        if let Some(slot) = self.get(id) {
            return slot;
        }
        let slot = self.names.len();
        self.slots.insert(id, slot);
        self.names.push(id);
        self.permissions.push(permission.declared());
        slot
    }

    /// `(symbol, slot)` pairs in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (Symbol, usize)> + '_ {
        self.names.iter().copied().zip(0..)
    }
}

/// Builder for [`MemberIndexTable`].
#[derive(Debug, Default)]
pub struct MemberIndexTableBuilder {
    table: MemberIndexTable,
}

impl MemberIndexTableBuilder {
    /// Declare `id`. Re-declaring keeps the first slot.
    #[must_use]
    pub fn declare(mut self, id: Symbol, permission: Permission) -> Self {
        self.table.insert(id, permission);
        self
    }

    /// Mark the body as declaring a nested function.
    #[must_use]
    pub fn captures_nested_functions(mut self, captures: bool) -> Self {
        self.table.captures_nested_functions = captures;
        self
    }

    pub fn build(self) -> MemberIndexTable {
        self.table
    }
}

/// The three permission-filtered views of one scope shape.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScopeShape {
    all: Rc<MemberIndexTable>,
    public_protected: Rc<MemberIndexTable>,
    private: Rc<MemberIndexTable>,
}

impl ScopeShape {
    /// Build all three views from declarations in source order.
    ///
    /// Declarations without an access tier are treated as `PUBLIC`.
    pub fn from_declarations<I>(declarations: I, captures_nested_functions: bool) -> Self
    where
        I: IntoIterator<Item = (Symbol, Permission)>,
    {
        let mut all = MemberIndexTable::builder();
        let mut public_protected = MemberIndexTable::builder();
        let mut private = MemberIndexTable::builder();

        for (id, permission) in declarations {
            let permission = permission.declared();
            all = all.declare(id, permission);
            if PermissionTier::PublicProtected.admits(permission) {
                public_protected = public_protected.declare(id, permission);
            }
            if PermissionTier::Private.admits(permission) {
                private = private.declare(id, permission);
            }
        }

        ScopeShape {
            all: Rc::new(all.captures_nested_functions(captures_nested_functions).build()),
            public_protected: Rc::new(
                public_protected
                    .captures_nested_functions(captures_nested_functions)
                    .build(),
            ),
            private: Rc::new(
                private
                    .captures_nested_functions(captures_nested_functions)
                    .build(),
            ),
        }
    }

    /// A shape with no declarations.
    pub fn empty() -> Self {
        Self::from_declarations(std::iter::empty(), false)
    }

    /// The view for `tier`.
    #[inline]
    pub fn table(&self, tier: PermissionTier) -> &Rc<MemberIndexTable> {
        match tier {
            PermissionTier::All => &self.all,
            PermissionTier::PublicProtected => &self.public_protected,
            PermissionTier::Private => &self.private,
        }
    }

    #[inline]
    pub fn captures_nested_functions(&self) -> bool {
        self.all.captures_nested_functions()
    }
}

impl Default for ScopeShape {
    fn default() -> Self {
        Self::empty()
    }
}
