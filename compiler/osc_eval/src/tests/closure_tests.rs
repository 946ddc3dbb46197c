//! Closures share bindings with the scope they were defined in.

use osc_ir::{Permission, ScopeShape};
use pretty_assertions::assert_eq;

use crate::testing::{
    add, assign, block, call, declare, define, isolated_stack, lit, run, sym, var, Expr, FnDef,
};
use crate::{CallStack, Value};

fn make_then_mutate() -> Expr {
    // function make() { var x = 1; var inner = function() { x }; x = 2; inner() }
    let inner = FnDef::new("inner", var("x")).build();
    let make = FnDef::new(
        "make",
        Expr::Seq(vec![
            declare("x", lit(1)),
            declare("inner", define(inner)),
            assign("x", lit(2)),
            call(var("inner"), Vec::new()),
        ]),
    )
    .local("x", Permission::PUBLIC)
    .local("inner", Permission::PUBLIC)
    .captures()
    .build();

    Expr::Seq(vec![
        declare("make", define(make)),
        call(var("make"), Vec::new()),
    ])
}

fn counter_program() -> Expr {
    // function counter() { var n = 0; function() { n = n + 1 } }
    let inc = FnDef::new("inc", assign("n", add(var("n"), lit(1)))).build();
    let counter = FnDef::new(
        "counter",
        Expr::Seq(vec![declare("n", lit(0)), define(inc)]),
    )
    .local("n", Permission::PUBLIC)
    .captures()
    .build();

    Expr::Seq(vec![
        declare("counter", define(counter)),
        declare("tick", call(var("counter"), Vec::new())),
        call(var("tick"), Vec::new()),
        call(var("tick"), Vec::new()),
        call(var("tick"), Vec::new()),
    ])
}

fn stacks() -> [CallStack; 2] {
    [
        isolated_stack(),
        CallStack::builder()
            .global_scope(crate::new_global_scope())
            .skip_scope_fast_path(false)
            .build(),
    ]
}

#[test]
fn test_closure_sees_later_writes() {
    for mut stack in stacks() {
        assert_eq!(run(&mut stack, make_then_mutate()).unwrap(), Value::Exact(2));
        assert_eq!(stack.members_watermark(), 0);
    }
}

#[test]
fn test_closure_outlives_its_frame() {
    for mut stack in stacks() {
        assert_eq!(run(&mut stack, counter_program()).unwrap(), Value::Exact(3));
    }
}

#[test]
fn test_independent_closure_instances() {
    let inc = FnDef::new("inc", assign("n", add(var("n"), lit(1)))).build();
    let counter = FnDef::new(
        "counter",
        Expr::Seq(vec![declare("n", lit(10)), define(inc)]),
    )
    .local("n", Permission::PUBLIC)
    .captures()
    .build();

    let mut stack = isolated_stack();
    let result = run(
        &mut stack,
        Expr::Seq(vec![
            declare("counter", define(counter)),
            declare("a", call(var("counter"), Vec::new())),
            declare("b", call(var("counter"), Vec::new())),
            call(var("a"), Vec::new()),
            call(var("a"), Vec::new()),
            call(var("b"), Vec::new()),
            Expr::Array(vec![call(var("a"), Vec::new()), call(var("b"), Vec::new())]),
        ]),
    )
    .unwrap();
    assert_eq!(result, Value::array(vec![Value::Exact(13), Value::Exact(12)]));
}

#[test]
fn test_capturing_block_survives_frame() {
    // { var y = 5; var get = function() { y } } get()
    let shape = ScopeShape::from_declarations([(sym("y"), Permission::PUBLIC)], true);
    let getter = FnDef::new("get", var("y")).build();
    let program = Expr::Seq(vec![
        declare("get", lit(0)),
        block(
            &shape,
            vec![
                declare("y", lit(5)),
                assign("get", define(getter)),
            ],
        ),
        call(var("get"), Vec::new()),
    ]);

    let mut stack = isolated_stack();
    assert_eq!(run(&mut stack, program).unwrap(), Value::Exact(5));
}

#[test]
fn test_block_locals_shadow_and_vanish() {
    let shape = ScopeShape::from_declarations([(sym("x"), Permission::PUBLIC)], false);
    let program = Expr::Seq(vec![
        declare("x", lit(1)),
        declare(
            "seen",
            block(&shape, vec![declare("x", lit(2)), var("x")]),
        ),
        Expr::Array(vec![var("seen"), var("x")]),
    ]);

    let mut stack = isolated_stack();
    assert_eq!(
        run(&mut stack, program).unwrap(),
        Value::array(vec![Value::Exact(2), Value::Exact(1)])
    );
    assert_eq!(stack.pooled_scope_count(), 1);
}
