//! A miniature expression language for driving the runtime in tests.
//!
//! Just enough syntax to declare members, define and call functions, build
//! objects, throw and catch. Every node evaluates straight against the
//! runtime's public operations.

use std::rc::Rc;

use osc_ir::{MemberIndexTable, Permission, PermissionTier, ScopeShape, Symbol};

use crate::call_stack::CallStack;
use crate::errors::{no_such_member, unsupported_operation, EvalError, EvalResult};
use crate::evaluator::NodeEvaluator;
use crate::function::{Function, FunctionData};
use crate::global::new_global_scope;
use crate::member_table::MemberTable;
use crate::scope::ScopeRef;
use crate::value::Value;

pub(crate) fn sym(name: &str) -> Symbol {
    Symbol::intern(name)
}

/// Call stack over a fresh global scope, so tests never share bindings.
pub(crate) fn isolated_stack() -> CallStack {
    CallStack::builder().global_scope(new_global_scope()).build()
}

pub(crate) enum Expr {
    Lit(Value),
    Var(Symbol),
    Declare(Symbol, Permission, Box<Expr>),
    Assign(Symbol, Box<Expr>),
    SetMember(Box<Expr>, Symbol, Box<Expr>),
    /// Evaluate in a new block scope with the given shape.
    Block(Rc<MemberIndexTable>, Vec<Expr>),
    Seq(Vec<Expr>),
    /// Function definition with an optional superclass expression.
    Define(Rc<FunctionData>, Option<Box<Expr>>),
    Call(Box<Expr>, Vec<Expr>),
    CallMethod(Box<Expr>, Symbol, Vec<Expr>),
    New(Box<Expr>, Vec<Expr>),
    Member(Box<Expr>, Symbol),
    This,
    Super,
    Callee,
    Add(Box<Expr>, Box<Expr>),
    Throw(Box<Expr>),
    Try(Box<Expr>, Symbol, Box<Expr>),
    Array(Vec<Expr>),
    Line(u32),
    Panic,
}

impl Expr {
    /// Whether `callee` or `super` appears outside any nested definition.
    fn names_implicit_binding(&self) -> bool {
        match self {
            Expr::Super | Expr::Callee => true,
            Expr::Lit(_)
            | Expr::Var(_)
            | Expr::This
            | Expr::Line(_)
            | Expr::Panic
            | Expr::Define(..) => false,
            Expr::Declare(_, _, inner)
            | Expr::Assign(_, inner)
            | Expr::Member(inner, _)
            | Expr::Throw(inner) => inner.names_implicit_binding(),
            Expr::SetMember(lhs, _, rhs) | Expr::Add(lhs, rhs) | Expr::Try(lhs, _, rhs) => {
                lhs.names_implicit_binding() || rhs.names_implicit_binding()
            }
            Expr::Block(_, body) | Expr::Seq(body) | Expr::Array(body) => {
                body.iter().any(Expr::names_implicit_binding)
            }
            Expr::Call(callee, args)
            | Expr::CallMethod(callee, _, args)
            | Expr::New(callee, args) => {
                callee.names_implicit_binding() || args.iter().any(Expr::names_implicit_binding)
            }
        }
    }
}

// Constructors, to keep test programs readable.

pub(crate) fn lit(value: impl Into<Value>) -> Expr {
    Expr::Lit(value.into())
}

pub(crate) fn var(name: &str) -> Expr {
    Expr::Var(sym(name))
}

pub(crate) fn declare(name: &str, init: Expr) -> Expr {
    Expr::Declare(sym(name), Permission::PUBLIC, Box::new(init))
}

pub(crate) fn declare_with(name: &str, permission: Permission, init: Expr) -> Expr {
    Expr::Declare(sym(name), permission, Box::new(init))
}

pub(crate) fn assign(name: &str, value: Expr) -> Expr {
    Expr::Assign(sym(name), Box::new(value))
}

pub(crate) fn set_member(object: Expr, name: &str, value: Expr) -> Expr {
    Expr::SetMember(Box::new(object), sym(name), Box::new(value))
}

pub(crate) fn block(shape: &ScopeShape, body: Vec<Expr>) -> Expr {
    Expr::Block(Rc::clone(shape.table(PermissionTier::All)), body)
}

pub(crate) fn define(data: Rc<FunctionData>) -> Expr {
    Expr::Define(data, None)
}

pub(crate) fn define_extending(data: Rc<FunctionData>, super_fn: Expr) -> Expr {
    Expr::Define(data, Some(Box::new(super_fn)))
}

pub(crate) fn call(callee: Expr, args: Vec<Expr>) -> Expr {
    Expr::Call(Box::new(callee), args)
}

pub(crate) fn call_method(object: Expr, name: &str, args: Vec<Expr>) -> Expr {
    Expr::CallMethod(Box::new(object), sym(name), args)
}

pub(crate) fn new(callee: Expr, args: Vec<Expr>) -> Expr {
    Expr::New(Box::new(callee), args)
}

pub(crate) fn member(object: Expr, name: &str) -> Expr {
    Expr::Member(Box::new(object), sym(name))
}

pub(crate) fn add(lhs: Expr, rhs: Expr) -> Expr {
    Expr::Add(Box::new(lhs), Box::new(rhs))
}

pub(crate) fn throw(value: Expr) -> Expr {
    Expr::Throw(Box::new(value))
}

pub(crate) fn try_catch(body: Expr, name: &str, handler: Expr) -> Expr {
    Expr::Try(Box::new(body), sym(name), Box::new(handler))
}

/// An evaluator node: one expression plus the shape of the scope it runs in.
pub(crate) struct Node {
    id: Symbol,
    shape: ScopeShape,
    body: Expr,
}

impl Node {
    pub(crate) fn new(name: &str, body: Expr) -> Self {
        Node {
            id: sym(name),
            shape: ScopeShape::empty(),
            body,
        }
    }

    pub(crate) fn with_shape(mut self, shape: ScopeShape) -> Self {
        self.shape = shape;
        self
    }

    pub(crate) fn into_evaluator(self) -> Rc<dyn NodeEvaluator> {
        Rc::new(self)
    }
}

impl NodeEvaluator for Node {
    fn eval_node(&self, stack: &mut CallStack, scope: &ScopeRef) -> EvalResult {
        eval(&self.body, stack, scope)
    }

    fn id(&self) -> Symbol {
        self.id
    }

    fn file(&self) -> &str {
        "test.osc"
    }

    fn member_index_table(&self, tier: PermissionTier) -> Rc<MemberIndexTable> {
        Rc::clone(self.shape.table(tier))
    }
}

/// Evaluator running an arbitrary closure.
pub(crate) struct NativeNode<F> {
    id: Symbol,
    run: F,
}

impl<F> NodeEvaluator for NativeNode<F>
where
    F: Fn(&mut CallStack, &ScopeRef) -> EvalResult,
{
    fn eval_node(&self, stack: &mut CallStack, scope: &ScopeRef) -> EvalResult {
        (self.run)(stack, scope)
    }

    fn id(&self) -> Symbol {
        self.id
    }

    fn file(&self) -> &str {
        "native.osc"
    }

    fn member_index_table(&self, _tier: PermissionTier) -> Rc<MemberIndexTable> {
        Rc::new(MemberIndexTable::default())
    }
}

pub(crate) fn native_node<F>(name: &str, run: F) -> Rc<dyn NodeEvaluator>
where
    F: Fn(&mut CallStack, &ScopeRef) -> EvalResult + 'static,
{
    Rc::new(NativeNode { id: sym(name), run })
}

/// Definition of a test function.
pub(crate) struct FnDef {
    name: Symbol,
    params: Vec<(Symbol, Permission)>,
    rest: Option<Symbol>,
    locals: Vec<(Symbol, Permission)>,
    captures: bool,
    body: Expr,
    static_body: Option<Expr>,
    super_args: Option<Expr>,
}

impl FnDef {
    pub(crate) fn new(name: &str, body: Expr) -> Self {
        FnDef {
            name: sym(name),
            params: Vec::new(),
            rest: None,
            locals: Vec::new(),
            captures: false,
            body,
            static_body: None,
            super_args: None,
        }
    }

    pub(crate) fn param(mut self, name: &str) -> Self {
        self.params.push((sym(name), Permission::PUBLIC));
        self
    }

    pub(crate) fn private_param(mut self, name: &str) -> Self {
        self.params.push((sym(name), Permission::PRIVATE));
        self
    }

    pub(crate) fn rest(mut self, name: &str) -> Self {
        self.rest = Some(sym(name));
        self
    }

    pub(crate) fn local(mut self, name: &str, permission: Permission) -> Self {
        self.locals.push((sym(name), permission));
        self
    }

    pub(crate) fn captures(mut self) -> Self {
        self.captures = true;
        self
    }

    pub(crate) fn static_body(mut self, body: Expr) -> Self {
        self.static_body = Some(body);
        self
    }

    pub(crate) fn super_args(mut self, args: Vec<Expr>) -> Self {
        self.super_args = Some(Expr::Array(args));
        self
    }

    pub(crate) fn build(self) -> Rc<FunctionData> {
        let declarations = self
            .params
            .iter()
            .copied()
            .chain(self.rest.map(|rest| (rest, Permission::PUBLIC)))
            .chain(self.locals.iter().copied());
        let shape = ScopeShape::from_declarations(declarations, self.captures);
        let name = self.name.as_str();
        let uses_implicit_bindings = self.body.names_implicit_binding();
        let body = Node::new(name, self.body).with_shape(shape).into_evaluator();

        let mut builder = FunctionData::builder(self.name, body)
            .captures_nested_functions(self.captures)
            .has_block_locals(!self.locals.is_empty())
            .uses_implicit_bindings(uses_implicit_bindings);
        for (param, permission) in self.params {
            builder = builder.param(param, permission);
        }
        if let Some(rest) = self.rest {
            builder = builder.rest_param(rest, Permission::PUBLIC);
        }
        if let Some(static_body) = self.static_body {
            builder = builder.static_body(Node::new(name, static_body).into_evaluator());
        }
        if let Some(super_args) = self.super_args {
            builder = builder.super_args(Node::new(name, super_args).into_evaluator());
        }
        builder.build()
    }
}

/// Run `body` as a top-level script against the stack's global scope.
pub(crate) fn run(stack: &mut CallStack, body: Expr) -> EvalResult {
    let global = stack.global().clone();
    let scope = ScopeRef::new_basic(&global, Rc::new(MemberIndexTable::default()));
    let main = Node::new("main", body).into_evaluator();
    stack.push_frame(&main, &scope)
}

/// Argument table for `values`: arena-backed inside a frame.
pub(crate) fn arg_table(
    stack: &mut CallStack,
    values: Vec<Value>,
) -> Result<Option<MemberTable>, EvalError> {
    if values.is_empty() {
        return Ok(None);
    }
    let mut table = stack.allocate_member_table(values.len())?;
    for value in values {
        table.push(value);
    }
    Ok(Some(table))
}

fn eval_all(
    exprs: &[Expr],
    stack: &mut CallStack,
    scope: &ScopeRef,
) -> Result<Vec<Value>, EvalError> {
    exprs.iter().map(|expr| eval(expr, stack, scope)).collect()
}

fn eval_seq(exprs: &[Expr], stack: &mut CallStack, scope: &ScopeRef) -> EvalResult {
    let mut last = Value::Null;
    for expr in exprs {
        last = eval(expr, stack, scope)?;
    }
    Ok(last)
}

fn eval(expr: &Expr, stack: &mut CallStack, scope: &ScopeRef) -> EvalResult {
    match expr {
        Expr::Lit(value) => Ok(value.clone()),
        Expr::Var(id) => scope
            .lookup_in_scope(*id)
            .map(|reference| reference.get())
            .ok_or_else(|| no_such_member(*id)),
        Expr::Declare(id, permission, init) => {
            let value = eval(init, stack, scope)?;
            scope
                .create_member(*id, *permission)
                .assign_named(Some(*id), value.clone())?;
            Ok(value)
        }
        Expr::Assign(id, value) => {
            let value = eval(value, stack, scope)?;
            let reference = scope.lookup_in_scope(*id).ok_or_else(|| no_such_member(*id))?;
            reference.assign_named(Some(*id), value.clone())?;
            Ok(value)
        }
        Expr::SetMember(object, id, value) => {
            let object = eval(object, stack, scope)?;
            let value = eval(value, stack, scope)?;
            match &object {
                Value::Object(target) => target
                    .create_member(*id, Permission::PUBLIC)
                    .assign_named(Some(*id), value.clone())?,
                other => {
                    return Err(unsupported_operation(format!(
                        "{}: member assignment",
                        other.type_name()
                    )))
                }
            }
            Ok(value)
        }
        Expr::Block(index, body) => {
            let inner = stack.allocate_basic_scope(scope, Rc::clone(index))?;
            eval_seq(body, stack, &inner)
        }
        Expr::Seq(body) => eval_seq(body, stack, scope),
        Expr::Define(data, super_fn) => {
            let super_fn = match super_fn {
                Some(expr) => Some(eval(expr, stack, scope)?),
                None => None,
            };
            let function = Function::new(stack, scope, super_fn, Rc::clone(data))?;
            Ok(Value::Function(function))
        }
        Expr::Call(callee, args) => {
            let callee = eval(callee, stack, scope)?;
            let values = eval_all(args, stack, scope)?;
            let args = arg_table(stack, values)?;
            callee.call_as_function(stack, args)
        }
        Expr::CallMethod(object, id, args) => {
            let this = eval(object, stack, scope)?;
            let method = this
                .get_member(*id, true)?
                .map(|reference| reference.get())
                .unwrap_or_default();
            let values = eval_all(args, stack, scope)?;
            let args = arg_table(stack, values)?;
            match method {
                Value::Function(function) => function.call_with_this(stack, args, Some(this)),
                other => other.call_as_function(stack, args),
            }
        }
        Expr::New(callee, args) => {
            let callee = eval(callee, stack, scope)?;
            let values = eval_all(args, stack, scope)?;
            let args = arg_table(stack, values)?;
            callee.call_as_constructor(stack, args)
        }
        Expr::Member(object, id) => Ok(eval(object, stack, scope)?
            .get_member(*id, true)?
            .map(|reference| reference.get())
            .unwrap_or_default()),
        Expr::This => Ok(scope.get_this().unwrap_or_default()),
        Expr::Super => Ok(scope.get_super().unwrap_or_default()),
        Expr::Callee => Ok(scope.get_callee().unwrap_or_default()),
        Expr::Add(lhs, rhs) => {
            let lhs = eval(lhs, stack, scope)?;
            let rhs = eval(rhs, stack, scope)?;
            match (&lhs, &rhs) {
                (Value::Exact(a), Value::Exact(b)) => Ok(Value::Exact(a + b)),
                (Value::Str(_), _) | (_, Value::Str(_)) => Ok(Value::string(&format!(
                    "{}{}",
                    lhs.cast_to_string(),
                    rhs.cast_to_string()
                ))),
                _ => Ok(Value::Inexact(lhs.cast_to_inexact()? + rhs.cast_to_inexact()?)),
            }
        }
        Expr::Throw(value) => Err(EvalError::throw(eval(value, stack, scope)?)),
        Expr::Try(body, id, handler) => match eval(body, stack, scope) {
            Ok(value) => Ok(value),
            Err(err) if err.is_catchable() => {
                let caught = err.to_value().unwrap_or_default();
                let inner = ScopeRef::new_basic(scope, Rc::new(MemberIndexTable::default()));
                inner.create_member(*id, Permission::PUBLIC).initialize(caught);
                eval(handler, stack, &inner)
            }
            Err(err) => Err(err),
        },
        Expr::Array(items) => Ok(Value::array(eval_all(items, stack, scope)?)),
        Expr::Line(line) => {
            stack.set_line_number(*line);
            Ok(Value::Null)
        }
        Expr::Panic => panic!("evaluator panicked"),
    }
}
