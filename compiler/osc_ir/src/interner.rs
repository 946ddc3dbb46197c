//! String interner backing every member lookup.
//!
//! Interning is idempotent and there is no removal: a symbol lives for the
//! rest of the process. Interned strings are leaked to get `'static`
//! lifetimes, so lookups hand out plain `&'static str`.

use super::Symbol;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::OnceLock;

struct InternTable {
    /// Map from string content to id.
    map: FxHashMap<&'static str, u32>,
    /// Id-indexed string storage.
    strings: Vec<&'static str>,
}

/// Error when interning a string fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InternError {
    /// More distinct names than fit in a `u32` id.
    Overflow { count: usize },
}

impl std::fmt::Display for InternError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InternError::Overflow { count } => write!(
                f,
                "symbol table exceeded capacity: {count} names, max is {}",
                u32::MAX
            ),
        }
    }
}

impl std::error::Error for InternError {}

/// Interner mapping names to dense [`Symbol`] ids.
///
/// Amortised O(1) intern and lookup. Script execution is single threaded,
/// but the table is process-wide so it sits behind a `RwLock`; the read
/// path is the common one.
pub struct SymbolInterner {
    table: RwLock<InternTable>,
}

impl SymbolInterner {
    /// Create an interner holding only the reserved symbols.
    ///
    /// Hermetic tests build their own instance; the runtime uses
    /// [`symbols()`].
    pub fn new() -> Self {
        let mut table = InternTable {
            map: FxHashMap::default(),
            strings: Vec::with_capacity(256),
        };
        for (id, name) in (0u32..).zip(Symbol::RESERVED.iter().copied()) {
            table.map.insert(name, id);
            table.strings.push(name);
        }
        Self {
            table: RwLock::new(table),
        }
    }

    /// Try to intern a string, returning its symbol or an error on overflow.
    pub fn try_intern(&self, s: &str) -> Result<Symbol, InternError> {
        if let Some(&id) = self.table.read().map.get(s) {
            return Ok(Symbol::from_raw(id));
        }

        let mut guard = self.table.write();
        // Another caller may have won the race between the two locks.
        if let Some(&id) = guard.map.get(s) {
            return Ok(Symbol::from_raw(id));
        }

        let id = u32::try_from(guard.strings.len()).map_err(|_| InternError::Overflow {
            count: guard.strings.len(),
        })?;
        let leaked: &'static str = Box::leak(s.to_owned().into_boxed_str());
        guard.strings.push(leaked);
        guard.map.insert(leaked, id);
        Ok(Symbol::from_raw(id))
    }

    /// Intern a string, returning its symbol.
    ///
    /// # Panics
    /// Panics past `u32::MAX` distinct names. Use `try_intern` to handle that.
    #[inline]
    pub fn intern(&self, s: &str) -> Symbol {
        self.try_intern(s).unwrap_or_else(|e| panic!("{e}"))
    }

    /// Look up an already-interned string without inserting it.
    pub fn get(&self, s: &str) -> Option<Symbol> {
        self.table.read().map.get(s).copied().map(Symbol::from_raw)
    }

    /// Text for a symbol.
    ///
    /// Unknown ids (from a different interner instance) resolve to `""`.
    pub fn lookup(&self, symbol: Symbol) -> &'static str {
        self.table
            .read()
            .strings
            .get(symbol.index())
            .copied()
            .unwrap_or("")
    }

    /// Number of interned names, reserved ones included.
    pub fn len(&self) -> usize {
        self.table.read().strings.len()
    }

    /// Whether only the reserved names are interned.
    pub fn is_empty(&self) -> bool {
        self.len() <= Symbol::RESERVED.len()
    }
}

impl Default for SymbolInterner {
    fn default() -> Self {
        Self::new()
    }
}

/// Process-wide interner, created on first use.
pub fn symbols() -> &'static SymbolInterner {
    static SYMBOLS: OnceLock<SymbolInterner> = OnceLock::new();
    SYMBOLS.get_or_init(SymbolInterner::new)
}
