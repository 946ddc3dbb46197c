//! Interned identifier.
//!
//! A `Symbol` is a small dense integer standing in for a member name. Two
//! symbols with equal text are the same symbol, so lookups compare integers.

use std::fmt;

/// Interned name identifier.
///
/// Ids are dense: the n-th distinct string interned gets id `n`. The first
/// few ids are reserved for names the runtime resolves specially and are
/// identical in every [`SymbolInterner`](crate::SymbolInterner) instance.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(transparent)]
pub struct Symbol(u32);

impl Symbol {
    /// Pre-interned empty string.
    pub const EMPTY: Symbol = Symbol(0);
    /// `this`: the receiver object.
    pub const THIS: Symbol = Symbol(1);
    /// `super`: the overridden member or super constructor.
    pub const SUPER: Symbol = Symbol(2);
    /// `callee`: the function being invoked.
    pub const CALLEE: Symbol = Symbol(3);
    /// `in`: trailing arguments not claimed by a declared parameter.
    pub const VARGS_IN: Symbol = Symbol(4);
    /// Name given to anonymous functions.
    pub const ANON: Symbol = Symbol(5);

    /// Reserved names, in id order.
    pub(crate) const RESERVED: &'static [&'static str] =
        &["", "this", "super", "callee", "in", "anon"];

    /// Create from a raw id.
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Symbol(raw)
    }

    /// Get the raw id.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// The id as a table index.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Whether this is one of the reserved, specially-resolved names.
    #[inline]
    pub const fn is_reserved(self) -> bool {
        (self.0 as usize) < Self::RESERVED.len()
    }

    /// Intern `name` in the process-wide interner.
    pub fn intern(name: &str) -> Symbol {
        crate::symbols().intern(name)
    }

    /// Text of this symbol, resolved through the process-wide interner.
    pub fn as_str(self) -> &'static str {
        crate::symbols().lookup(self)
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", self.0)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Default for Symbol {
    fn default() -> Self {
        Self::EMPTY
    }
}
