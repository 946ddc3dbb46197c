//! Per-definition function metadata.

use std::fmt;
use std::rc::Rc;

use osc_ir::{Permission, Symbol};

use crate::errors::{arity_mismatch, EvalError};
use crate::evaluator::NodeEvaluator;
use crate::member_table::MemberTable;
use crate::scope::ScopeRef;
use crate::value::{ArrayValue, Value};

/// One declared parameter.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Param {
    pub name: Symbol,
    pub permission: Permission,
}

/// Argument table ready to become a function scope's members.
pub(crate) struct MappedArgs {
    pub(crate) members: MemberTable,
    /// Arguments past the declared non-variadic parameters; for a variadic
    /// function, the values the rest parameter collected.
    pub(crate) trailing: Vec<Value>,
}

/// Shape data shared by every `Function` created from one definition.
///
/// The body's `PermissionTier::All` member index table must place the
/// parameters at slots `0..n` in declaration order, followed by the rest
/// parameter if there is one. Argument tables map straight onto those slots.
pub struct FunctionData {
    name: Symbol,
    body: Rc<dyn NodeEvaluator>,
    static_body: Option<Rc<dyn NodeEvaluator>>,
    super_args: Option<Rc<dyn NodeEvaluator>>,
    params: Vec<Param>,
    rest: Option<Param>,
    captures_nested_functions: bool,
    has_block_locals: bool,
    /// The body names `callee` or `super`.
    uses_implicit_bindings: bool,
    comment: Option<Rc<str>>,
}

impl FunctionData {
    pub fn builder(name: Symbol, body: Rc<dyn NodeEvaluator>) -> FunctionDataBuilder {
        FunctionDataBuilder {
            data: FunctionData {
                name,
                body,
                static_body: None,
                super_args: None,
                params: Vec::new(),
                rest: None,
                captures_nested_functions: false,
                has_block_locals: false,
                uses_implicit_bindings: false,
                comment: None,
            },
        }
    }

    #[inline]
    pub fn name(&self) -> Symbol {
        self.name
    }

    pub fn body(&self) -> &Rc<dyn NodeEvaluator> {
        &self.body
    }

    pub fn static_body(&self) -> Option<&Rc<dyn NodeEvaluator>> {
        self.static_body.as_ref()
    }

    /// Evaluator for the superclass argument list; yields an array value,
    /// or `null` for no arguments.
    pub fn super_args(&self) -> Option<&Rc<dyn NodeEvaluator>> {
        self.super_args.as_ref()
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn rest_param(&self) -> Option<Param> {
        self.rest
    }

    /// Number of required arguments.
    #[inline]
    pub fn min_arity(&self) -> usize {
        self.params.len()
    }

    #[inline]
    pub fn is_variadic(&self) -> bool {
        self.rest.is_some()
    }

    /// Whether a nested function declared in the body might close over
    /// the call's bindings. Such calls never use the members arena.
    #[inline]
    pub fn captures_nested_functions(&self) -> bool {
        self.captures_nested_functions
    }

    #[inline]
    pub fn has_block_locals(&self) -> bool {
        self.has_block_locals
    }

    #[inline]
    pub fn uses_implicit_bindings(&self) -> bool {
        self.uses_implicit_bindings
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    /// Whether a call with no arguments may run the body directly in the
    /// enclosing scope. `callee` and `super` resolve through the function
    /// scope, so a body naming either always gets one.
    pub(crate) fn skips_scope(&self) -> bool {
        !self.has_block_locals
            && !self.uses_implicit_bindings
            && self.params.is_empty()
            && self.rest.is_none()
    }

    fn accepts(&self, got: usize) -> bool {
        let nargs = self.params.len();
        got == nargs || (self.is_variadic() && got >= nargs)
    }

    /// Normalise a call's arguments into the layout the body expects.
    ///
    /// Capturing functions get a heap copy sharing the caller's references.
    /// For a variadic function the surplus collapses into one array stored
    /// in the rest slot. On an arity error the table is released before
    /// returning.
    pub(crate) fn map_args(&self, mut args: MemberTable) -> Result<MappedArgs, EvalError> {
        if self.captures_nested_functions {
            args = args.safe_copy();
        }
        let got = args.len();
        if !self.accepts(got) {
            args.free();
            return Err(arity_mismatch(
                self.name,
                self.params.len(),
                self.is_variadic(),
                got,
            ));
        }

        let nargs = self.params.len();
        let trailing: Vec<Value> = (nargs..got).filter_map(|i| args.value_at(i)).collect();
        if self.is_variadic() {
            let rest = Value::Array(ArrayValue::new(trailing.clone()));
            args.truncate(nargs);
            args.push(rest);
        }
        Ok(MappedArgs {
            members: args,
            trailing,
        })
    }

    /// Declare the parameters in `scope` and bind the arguments to them.
    pub(crate) fn add_args(
        &self,
        scope: &ScopeRef,
        args: Option<MemberTable>,
    ) -> Result<(), EvalError> {
        let args = args.unwrap_or_default();
        let got = args.len();
        if !self.accepts(got) {
            args.free();
            return Err(arity_mismatch(
                self.name,
                self.params.len(),
                self.is_variadic(),
                got,
            ));
        }

        let values = args.values();
        args.free();
        let mut values = values.into_iter();
        for param in &self.params {
            let value = values.next().unwrap_or_default();
            scope
                .create_member(param.name, param.permission)
                .assign_named(Some(param.name), value)?;
        }
        if let Some(rest) = self.rest {
            let rest_value = Value::array(values.collect());
            scope
                .create_member(rest.name, rest.permission)
                .assign_named(Some(rest.name), rest_value)?;
        }
        Ok(())
    }
}

impl fmt::Debug for FunctionData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionData")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("rest", &self.rest)
            .field("captures_nested_functions", &self.captures_nested_functions)
            .field("has_block_locals", &self.has_block_locals)
            .field("uses_implicit_bindings", &self.uses_implicit_bindings)
            .finish_non_exhaustive()
    }
}

/// Builder for [`FunctionData`].
pub struct FunctionDataBuilder {
    data: FunctionData,
}

impl FunctionDataBuilder {
    /// Append a required parameter.
    #[must_use]
    pub fn param(mut self, name: Symbol, permission: Permission) -> Self {
        self.data.params.push(Param { name, permission });
        self
    }

    /// Set the parameter collecting surplus arguments.
    #[must_use]
    pub fn rest_param(mut self, name: Symbol, permission: Permission) -> Self {
        self.data.rest = Some(Param { name, permission });
        self
    }

    #[must_use]
    pub fn static_body(mut self, body: Rc<dyn NodeEvaluator>) -> Self {
        self.data.static_body = Some(body);
        self
    }

    #[must_use]
    pub fn super_args(mut self, args: Rc<dyn NodeEvaluator>) -> Self {
        self.data.super_args = Some(args);
        self
    }

    #[must_use]
    pub fn captures_nested_functions(mut self, captures: bool) -> Self {
        self.data.captures_nested_functions = captures;
        self
    }

    #[must_use]
    pub fn has_block_locals(mut self, has_locals: bool) -> Self {
        self.data.has_block_locals = has_locals;
        self
    }

    #[must_use]
    pub fn uses_implicit_bindings(mut self, uses: bool) -> Self {
        self.data.uses_implicit_bindings = uses;
        self
    }

    #[must_use]
    pub fn comment(mut self, comment: &str) -> Self {
        self.data.comment = Some(Rc::from(comment));
        self
    }

    pub fn build(self) -> Rc<FunctionData> {
        Rc::new(self.data)
    }
}
