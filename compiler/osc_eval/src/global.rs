//! The global scope.
//!
//! Each thread lazily creates one global scope on first use. Values are
//! `Rc`-based and stay on the thread that made them, so "process-wide" here
//! means one per script-execution thread. Hermetic tests build their own
//! with [`new_global_scope`] and hand it to a `RuntimeBuilder`.

use osc_ir::{Permission, Symbol};

use crate::scope::ScopeRef;
use crate::value::{BuiltinType, Value};

thread_local! {
    static GLOBAL: ScopeRef = new_global_scope();
}

/// This thread's shared global scope.
pub fn global_scope() -> ScopeRef {
    GLOBAL.with(Clone::clone)
}

/// Drop every global binding and reinstall the built-ins.
///
/// Resets in place: call stacks already holding the global scope see the
/// fresh bindings.
pub fn reset_global_scope() {
    GLOBAL.with(|global| {
        global.clear_members();
        install_builtins(global);
    });
    tracing::debug!("global scope reset");
}

/// A new global scope, independent of the thread's shared one.
pub fn new_global_scope() -> ScopeRef {
    let scope = ScopeRef::new_global();
    install_builtins(&scope);
    scope
}

fn install_builtins(scope: &ScopeRef) {
    for &ty in BuiltinType::GLOBALS {
        scope
            .create_member(Symbol::intern(ty.name()), Permission::PUBLIC | Permission::CONST)
            .initialize(Value::Type(ty));
    }
}
