use super::*;
use crate::errors::EvalErrorKind;
use crate::testing::{isolated_stack, sym};
use pretty_assertions::assert_eq;

fn exception(ty: BuiltinType, message: &str) -> Value {
    Value::exception(ExceptionObject::new(ty, message))
}

// === Types ===

#[test]
fn test_builtin_types_of_primitives() {
    assert_eq!(Value::Null.builtin_type(), BuiltinType::Null);
    assert_eq!(Value::Bool(true).builtin_type(), BuiltinType::Boolean);
    assert_eq!(Value::Exact(1).type_name(), "ExactNumber");
    assert_eq!(Value::Inexact(1.5).type_name(), "InexactNumber");
    assert_eq!(Value::string("s").get_type(), Value::Type(BuiltinType::String));
    assert_eq!(Value::Type(BuiltinType::Array).type_name(), "Function");
}

#[test]
fn test_is_a_walks_builtin_hierarchy() {
    let err = exception(BuiltinType::NoSuchMemberException, "gone");
    assert!(err.is_a(&Value::Type(BuiltinType::NoSuchMemberException)));
    assert!(err.is_a(&Value::Type(BuiltinType::Exception)));
    assert!(err.is_a(&Value::Type(BuiltinType::Object)));
    assert!(!err.is_a(&Value::Type(BuiltinType::IllegalArgumentException)));
    assert!(Value::Exact(3).is_a(&Value::Type(BuiltinType::Object)));
    assert!(!Value::Exact(3).is_a(&Value::Type(BuiltinType::String)));
}

// === Equality ===

#[test]
fn test_equality_is_by_identity_for_reference_types() {
    let a = exception(BuiltinType::Exception, "x");
    let b = exception(BuiltinType::Exception, "x");
    assert_eq!(a, a.clone());
    assert_ne!(a, b);

    assert_eq!(Value::array(vec![Value::Exact(1)]), Value::array(vec![Value::Exact(1)]));
    assert_eq!(Value::string("abc"), Value::from("abc"));
    assert_ne!(Value::Exact(1), Value::Inexact(1.0));
}

// === Casts ===

#[test]
fn test_cast_to_string() {
    assert_eq!(Value::Null.cast_to_string(), "null");
    assert_eq!(Value::Bool(false).cast_to_string(), "false");
    assert_eq!(Value::Exact(-4).cast_to_string(), "-4");
    assert_eq!(
        Value::array(vec![Value::Exact(1), Value::string("a")]).cast_to_string(),
        "[1, a]"
    );
    assert_eq!(Value::Type(BuiltinType::Object).to_string(), "Object");
}

#[test]
fn test_numeric_casts() {
    assert_eq!(Value::Inexact(2.9).cast_to_exact().unwrap(), 2);
    assert_eq!(Value::string(" 42 ").cast_to_exact().unwrap(), 42);
    assert_eq!(Value::Exact(3).cast_to_inexact().unwrap(), 3.0);

    let err = Value::string("forty").cast_to_exact().unwrap_err();
    assert!(matches!(err.kind, EvalErrorKind::IllegalArgument { .. }));
    let err = Value::Null.cast_to_inexact().unwrap_err();
    assert!(matches!(err.kind, EvalErrorKind::UnsupportedOperation { .. }));
}

#[test]
fn test_cast_to_boolean_only_accepts_booleans() {
    assert!(Value::Bool(true).cast_to_boolean().unwrap());
    assert!(Value::Exact(1).cast_to_boolean().is_err());
}

// === Members ===

#[test]
fn test_exception_members() {
    let cause = exception(BuiltinType::Exception, "root");
    let outer = ExceptionObject::new(BuiltinType::IllegalArgumentException, "bad");
    outer.set_cause(cause.clone());
    let outer = Value::exception(outer);

    let message = outer.get_member(sym("message"), true).unwrap().unwrap();
    assert_eq!(message.get(), Value::string("bad"));
    let found = outer.get_member(sym("cause"), true).unwrap().unwrap();
    assert_eq!(found.get(), cause);
}

#[test]
fn test_length_members() {
    let array = Value::array(vec![Value::Null, Value::Null]);
    assert_eq!(
        array.get_member(sym("length"), true).unwrap().map(|r| r.get()),
        Some(Value::Exact(2))
    );
    assert_eq!(
        Value::string("héllo")
            .get_member(sym("length"), true)
            .unwrap()
            .map(|r| r.get()),
        Some(Value::Exact(5))
    );
}

#[test]
fn test_missing_member_throws_only_when_asked() {
    assert!(Value::Exact(1).get_member(sym("nope"), false).unwrap().is_none());
    let err = Value::Exact(1).get_member(sym("nope"), true).unwrap_err();
    assert!(matches!(err.kind, EvalErrorKind::NoSuchMember { ref name } if name == "nope"));
}

// === Calls ===

#[test]
fn test_non_callable_values() {
    let mut stack = isolated_stack();
    let err = Value::Exact(1).call_as_function(&mut stack, None).unwrap_err();
    assert_eq!(
        err.kind,
        EvalErrorKind::NotCallable {
            type_name: "ExactNumber".to_owned()
        }
    );
    assert!(Value::Null.call_as_constructor(&mut stack, None).is_err());
}

#[test]
fn test_builtin_conversions() {
    let mut stack = isolated_stack();
    let args = MemberTable::from_values([Value::Exact(12)]);
    let text = Value::Type(BuiltinType::String)
        .call_as_function(&mut stack, Some(args))
        .unwrap();
    assert_eq!(text, Value::string("12"));

    let args = MemberTable::from_values([Value::string("7")]);
    let number = Value::Type(BuiltinType::ExactNumber)
        .call_as_function(&mut stack, Some(args))
        .unwrap();
    assert_eq!(number, Value::Exact(7));

    let err = Value::Type(BuiltinType::String)
        .call_as_function(&mut stack, None)
        .unwrap_err();
    assert!(matches!(err.kind, EvalErrorKind::ArityMismatch { expected: 1, got: 0, .. }));
}

#[test]
fn test_builtin_exception_constructor() {
    let mut stack = isolated_stack();
    let cause = exception(BuiltinType::Exception, "inner");
    let args = MemberTable::from_values([Value::string("outer"), cause.clone()]);
    let value = Value::Type(BuiltinType::IllegalArgumentException)
        .call_as_constructor(&mut stack, Some(args))
        .unwrap();

    let Value::Exception(object) = &value else {
        panic!("expected an exception, got {value:?}");
    };
    assert_eq!(object.exception_type(), BuiltinType::IllegalArgumentException);
    assert_eq!(object.message(), "outer");
    assert_eq!(object.cause(), Some(cause));
    assert_eq!(
        value.cast_to_string(),
        "IllegalArgumentException: outer\ncaused by: Exception: inner"
    );
}

#[test]
fn test_builtin_object_constructor() {
    let mut stack = isolated_stack();
    let object = Value::Type(BuiltinType::Object)
        .call_as_constructor(&mut stack, None)
        .unwrap();
    assert!(matches!(object, Value::Object(_)));
    assert_eq!(object.get_type(), Value::Type(BuiltinType::Object));
    assert!(object.is_a(&Value::Type(BuiltinType::Object)));
}

#[test]
fn test_extending_builtin_object_is_a_no_op() {
    let mut stack = isolated_stack();
    let object = ScopeRef::new_global();
    let args = MemberTable::from_values([Value::Exact(1)]);
    Value::Type(BuiltinType::Object)
        .call_as_extends(&mut stack, &object, Some(args))
        .unwrap();

    let err = Value::Type(BuiltinType::Array)
        .call_as_extends(&mut stack, &object, None)
        .unwrap_err();
    assert!(matches!(err.kind, EvalErrorKind::UnsupportedOperation { .. }));
}

// === Exceptions ===

#[test]
fn test_describe_stops_on_cyclic_cause() {
    let object = Rc::new(ExceptionObject::new(BuiltinType::Exception, "loop"));
    object.set_cause(Value::Exception(Rc::clone(&object)));
    let text = Value::Exception(Rc::clone(&object)).cast_to_string();
    assert!(text.starts_with("Exception: loop\ncaused by: Exception: loop"));
    assert!(text.ends_with("<<unknown exception message>>"));
    // Break the cycle so the test does not leak.
    object.set_cause(Value::Null);
}

#[test]
fn test_describe_stops_on_cause_array_holding_the_exception() {
    let object = Rc::new(ExceptionObject::new(BuiltinType::Exception, "loop"));
    let wrapper = Value::Exception(Rc::clone(&object));
    object.set_cause(Value::array(vec![wrapper.clone()]));

    let text = crate::errors::EvalError::throw(wrapper).to_string();
    assert_eq!(
        text,
        "Exception: loop\ncaused by: [Exception: loop\ncaused by: [...]]"
    );
    object.set_cause(Value::Null);
}

#[test]
fn test_self_containing_array_renders_and_compares() {
    let a = ArrayValue::new(vec![Value::Exact(1)]);
    a.push(Value::Array(a.clone())).unwrap();
    let b = ArrayValue::new(vec![Value::Exact(1)]);
    b.push(Value::Array(b.clone())).unwrap();
    let c = ArrayValue::new(vec![Value::Exact(2)]);
    c.push(Value::Array(c.clone())).unwrap();

    assert_eq!(Value::Array(a.clone()).cast_to_string(), "[1, [...]]");
    assert!(Value::Array(a.clone()) == Value::Array(a.clone()));
    assert!(Value::Array(a.clone()) == Value::Array(b.clone()));
    assert!(Value::Array(a.clone()) != Value::Array(c.clone()));
    assert!(format!("{a:?}").contains("[1, [...]]"));

    // Break the cycles so the test does not leak.
    for array in [a, b, c] {
        array.set(1, Value::Null).unwrap();
    }
}

#[test]
fn test_frozen_array_rejects_writes() {
    let array = ArrayValue::frozen(vec![Value::Exact(1)]);
    assert!(array.is_frozen());
    assert!(array.push(Value::Null).is_err());
    assert!(array.set(0, Value::Null).is_err());
    assert_eq!(array.get(0), Some(Value::Exact(1)));

    let open = ArrayValue::new(Vec::new());
    open.set(2, Value::Bool(true)).unwrap();
    assert_eq!(open.to_vec(), vec![Value::Null, Value::Null, Value::Bool(true)]);
}
