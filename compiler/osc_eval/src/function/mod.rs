//! Script function values and the call protocol.
//!
//! A `Function` pairs shared [`FunctionData`] with the scope it was defined
//! in. Three entry points run its body:
//!
//! - [`Function::call_as_function`]: an ordinary call.
//! - [`Function::call_as_constructor`]: `new F(...)`; builds an object.
//! - [`Function::call_as_extends`]: the superclass step of a subclass
//!   constructor, run against the subclass's object.

mod data;

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::rc::Rc;

use osc_ir::{PermissionTier, Symbol};

pub use data::{FunctionData, FunctionDataBuilder, Param};
pub(crate) use data::MappedArgs;

use crate::call_stack::CallStack;
use crate::errors::{
    internal_invariant, no_such_member, unsupported_operation, EvalError, EvalResult,
};
use crate::evaluator::NodeEvaluator;
use crate::member_table::MemberTable;
use crate::reference::Reference;
use crate::scope::{ScopeRef, ScopeVariant};
use crate::value::{BuiltinType, Value};

/// A callable script function.
pub struct Function {
    /// Scope free variables resolve through; fixed for the value's life.
    enclosing: ScopeRef,
    super_fn: Value,
    data: Rc<FunctionData>,
    /// Members declared by the static initialiser.
    static_scope: Option<ScopeRef>,
    /// The member this function replaced on the object under construction.
    overridden: Option<Value>,
}

impl Function {
    /// Create a function value defined in `enclosing`.
    ///
    /// `super_fn` defaults to the built-in `Object` root. A static
    /// initialiser, if any, runs now, once.
    pub fn new(
        stack: &mut CallStack,
        enclosing: &ScopeRef,
        super_fn: Option<Value>,
        data: Rc<FunctionData>,
    ) -> Result<Rc<Function>, EvalError> {
        let overridden = if enclosing.variant() == ScopeVariant::Constructor
            && data.name() != Symbol::ANON
        {
            replaced_member(enclosing, data.name())
        } else {
            None
        };

        let static_scope = match data.static_body() {
            Some(body) => {
                let scope =
                    ScopeRef::new_basic(enclosing, body.member_index_table(PermissionTier::All));
                stack.push_frame(body, &scope)?;
                Some(scope)
            }
            None => None,
        };

        Ok(Rc::new(Function {
            enclosing: enclosing.clone(),
            super_fn: super_fn.unwrap_or(Value::Type(BuiltinType::Object)),
            data,
            static_scope,
            overridden,
        }))
    }

    pub fn data(&self) -> &Rc<FunctionData> {
        &self.data
    }

    pub fn enclosing_scope(&self) -> &ScopeRef {
        &self.enclosing
    }

    pub fn super_function(&self) -> &Value {
        &self.super_fn
    }

    pub fn overridden(&self) -> Option<&Value> {
        self.overridden.as_ref()
    }

    pub fn static_scope(&self) -> Option<&ScopeRef> {
        self.static_scope.as_ref()
    }

    pub fn name(&self) -> &'static str {
        self.data.name().as_str()
    }

    pub fn comment(&self) -> Option<&str> {
        self.data.comment()
    }

    pub fn min_arg_count(&self) -> usize {
        self.data.min_arity()
    }

    pub fn takes_var_args(&self) -> bool {
        self.data.is_variadic()
    }

    pub fn arg_names(&self) -> Vec<Symbol> {
        self.data
            .params()
            .iter()
            .chain(self.data.rest_param().as_ref())
            .map(|param| param.name)
            .collect()
    }

    pub fn cast_to_string(&self) -> String {
        format!("[function: {}]", self.name())
    }

    /// Whether a function value is an instance of `ty`.
    pub fn is_a(self: &Rc<Self>, ty: &Value) -> bool {
        matches!(ty, Value::Type(t) if BuiltinType::Function.is_subtype(*t)) || self.extends(ty)
    }

    /// Whether objects this function constructs are instances of `ty`.
    pub fn extends(self: &Rc<Self>, ty: &Value) -> bool {
        if let Value::Function(other) = ty {
            if Rc::ptr_eq(self, other) {
                return true;
            }
        }
        match &self.super_fn {
            Value::Function(parent) => parent.extends(ty),
            Value::Type(root) => matches!(ty, Value::Type(t) if root.is_subtype(*t)),
            _ => false,
        }
    }

    /// Member declared by this function's static initialiser.
    pub fn static_member(&self, id: Symbol) -> Option<Reference> {
        self.static_scope.as_ref()?.own_member(id)
    }

    /// Static member visible on instances: inherited ones first, then this
    /// function's own.
    pub(crate) fn type_member(&self, id: Symbol) -> Option<Reference> {
        let inherited = match &self.super_fn {
            Value::Function(parent) => parent.type_member(id),
            _ => None,
        };
        inherited.or_else(|| self.static_member(id))
    }

    pub fn get_member(&self, id: Symbol, throw: bool) -> Result<Option<Reference>, EvalError> {
        match self.static_member(id) {
            Some(reference) => Ok(Some(reference)),
            None if throw => Err(no_such_member(id)),
            None => Ok(None),
        }
    }

    pub fn call_as_function(
        self: &Rc<Self>,
        stack: &mut CallStack,
        args: Option<MemberTable>,
    ) -> EvalResult {
        self.call_with_this(stack, args, None)
    }

    /// Call with an explicit receiver bound as `this`.
    pub fn call_with_this(
        self: &Rc<Self>,
        stack: &mut CallStack,
        args: Option<MemberTable>,
        this: Option<Value>,
    ) -> EvalResult {
        if !matches!(self.super_fn, Value::Type(BuiltinType::Object)) {
            if let Some(args) = args {
                args.free();
            }
            return Err(unsupported_operation(format!(
                "{}: cannot call as function",
                self.name()
            )));
        }

        let data = &self.data;
        if args.is_none()
            && this.is_none()
            && self.overridden.is_none()
            && data.skips_scope()
            && stack.config().skip_scope_fast_path
        {
            return stack.push_frame(data.body(), &self.enclosing);
        }

        let args = match args {
            Some(args) => args,
            None => stack.allocate_member_table(0)?,
        };
        let mapped = data.map_args(args)?;
        let index = data.body().member_index_table(PermissionTier::All);
        let scope = stack.allocate_function_scope(self, &self.enclosing, index, mapped, this);
        let mut guard = ScopeGuard::new(stack, scope);
        guard.eval(data.body())
    }

    /// `new F(args)`: build an object and run the constructor chain on it.
    pub fn call_as_constructor(
        self: &Rc<Self>,
        stack: &mut CallStack,
        args: Option<MemberTable>,
    ) -> EvalResult {
        let body = self.data.body();
        let object = ScopeRef::new_object(
            &self.enclosing,
            body.member_index_table(PermissionTier::PublicProtected),
            Some(Rc::clone(self)),
        );
        let scope = ScopeRef::new_constructor(
            &object,
            body.member_index_table(PermissionTier::Private),
            Rc::clone(self),
        );
        self.construct(stack, &scope, &object, args)?;
        Ok(Value::Object(object))
    }

    /// Run this constructor against a subclass's `object`.
    ///
    /// The body's free variables resolve through this function's own
    /// enclosing scope; `this` and public declarations go to `object`.
    pub fn call_as_extends(
        self: &Rc<Self>,
        stack: &mut CallStack,
        object: &ScopeRef,
        args: Option<MemberTable>,
    ) -> Result<(), EvalError> {
        let fork = ScopeRef::new_fork(&self.enclosing, object);
        let scope = ScopeRef::new_constructor(
            &fork,
            self.data
                .body()
                .member_index_table(PermissionTier::Private),
            Rc::clone(self),
        );
        self.construct(stack, &scope, object, args)
    }

    fn construct(
        &self,
        stack: &mut CallStack,
        scope: &ScopeRef,
        object: &ScopeRef,
        args: Option<MemberTable>,
    ) -> Result<(), EvalError> {
        self.data.add_args(scope, args)?;
        let super_args = match self.data.super_args() {
            Some(evaluator) => super_arg_table(stack.push_frame(evaluator, scope)?)?,
            None => None,
        };
        self.super_fn.call_as_extends(stack, object, super_args)?;
        stack.push_frame(self.data.body(), scope)?;
        Ok(())
    }
}

/// The member named `name` already on the object a constructor scope is
/// building.
fn replaced_member(constructor: &ScopeRef, name: Symbol) -> Option<Value> {
    match constructor.get_this()? {
        Value::Object(object) => object.own_member(name).map(|reference| reference.get()),
        _ => None,
    }
}

fn super_arg_table(value: Value) -> Result<Option<MemberTable>, EvalError> {
    match value {
        Value::Null => Ok(None),
        Value::Array(array) => Ok(Some(MemberTable::from_values(array.to_vec()))),
        other => Err(internal_invariant(format!(
            "superclass arguments evaluated to {}",
            other.type_name()
        ))),
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.name())
            .field("super_fn", &self.super_fn.type_name())
            .field("data", &self.data)
            .finish_non_exhaustive()
    }
}

/// RAII guard that frees a function-call scope when dropped.
///
/// Derefs to the call stack so the body runs through the guard. The scope is
/// released on every exit path, including unwinding from a panic.
pub(crate) struct ScopeGuard<'a> {
    stack: &'a mut CallStack,
    scope: ScopeRef,
}

impl<'a> ScopeGuard<'a> {
    pub(crate) fn new(stack: &'a mut CallStack, scope: ScopeRef) -> Self {
        ScopeGuard { stack, scope }
    }

    /// Evaluate `body` in a new frame over the guarded scope.
    pub(crate) fn eval(&mut self, body: &Rc<dyn NodeEvaluator>) -> EvalResult {
        self.stack.push_frame(body, &self.scope)
    }
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        self.stack.free_scope(&self.scope);
    }
}

impl Deref for ScopeGuard<'_> {
    type Target = CallStack;

    fn deref(&self) -> &Self::Target {
        self.stack
    }
}

impl DerefMut for ScopeGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.stack
    }
}
