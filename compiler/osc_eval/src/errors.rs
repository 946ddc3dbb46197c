//! Runtime error types.
//!
//! Every fallible runtime operation returns `Result<_, EvalError>`. The
//! `kind` says what went wrong; [`EvalErrorKind::severity`] says whether a
//! script `catch` may intercept it.
//!
//! Factory functions (`illegal_argument()`, `stack_overflow()`, ...) are the
//! public way to build errors. They are `#[cold]`: every one of them sits on
//! a failure path.

use std::fmt;

use osc_ir::Symbol;

use crate::value::{describe_thrown, BuiltinType, ExceptionObject, Value};

/// Result of evaluating a node or calling a value.
pub type EvalResult = Result<Value, EvalError>;

/// How far an error is allowed to propagate.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Severity {
    /// Recoverable; script `try`/`catch` may intercept it.
    Script,
    /// Terminates the current script run. Only the embedding host sees it.
    Fatal,
    /// The script asked the host to exit.
    Exit,
}

/// Structured error category.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum EvalErrorKind {
    /// A script value raised with `throw`.
    #[error("{}", describe_thrown(.0))]
    Thrown(Value),

    #[error("illegal argument: {message}")]
    IllegalArgument { message: String },

    #[error("wrong number of args! {name} expects {}{expected}, got {got}", at_least(.variadic))]
    ArityMismatch {
        name: String,
        expected: usize,
        variadic: bool,
        got: usize,
    },

    #[error("no such member: {name}")]
    NoSuchMember { name: String },

    #[error("{operation}: unsupported operation")]
    UnsupportedOperation { operation: String },

    #[error("cannot reassign const member{}", member_suffix(.name))]
    ConstReassignment { name: String },

    #[error("{type_name} is not callable")]
    NotCallable { type_name: String },

    #[error("stack overflow: more than {depth} frames")]
    StackOverflow { depth: usize },

    #[error(
        "members arena exhausted: {requested} slots requested, {available} of {capacity} free"
    )]
    ArenaExhausted {
        requested: usize,
        available: usize,
        capacity: usize,
    },

    #[error("internal invariant violated: {message}")]
    InternalInvariant { message: String },

    #[error("exit requested with code {code}")]
    Exit { code: i32 },
}

fn at_least(variadic: &bool) -> &'static str {
    if *variadic {
        "at least "
    } else {
        ""
    }
}

fn member_suffix(name: &str) -> String {
    if name.is_empty() {
        String::new()
    } else {
        format!(" {name}")
    }
}

impl EvalErrorKind {
    /// Where this kind sits in the error taxonomy.
    pub fn severity(&self) -> Severity {
        match self {
            Self::Thrown(_)
            | Self::IllegalArgument { .. }
            | Self::ArityMismatch { .. }
            | Self::NoSuchMember { .. }
            | Self::UnsupportedOperation { .. }
            | Self::ConstReassignment { .. }
            | Self::NotCallable { .. } => Severity::Script,
            Self::StackOverflow { .. }
            | Self::ArenaExhausted { .. }
            | Self::InternalInvariant { .. } => Severity::Fatal,
            Self::Exit { .. } => Severity::Exit,
        }
    }

    /// Built-in exception type a script sees when it catches this kind.
    fn exception_type(&self) -> Option<BuiltinType> {
        match self {
            Self::IllegalArgument { .. }
            | Self::ArityMismatch { .. }
            | Self::ConstReassignment { .. } => Some(BuiltinType::IllegalArgumentException),
            Self::NoSuchMember { .. } => Some(BuiltinType::NoSuchMemberException),
            Self::UnsupportedOperation { .. } | Self::NotCallable { .. } => {
                Some(BuiltinType::UnsupportedOperationException)
            }
            _ => None,
        }
    }
}

/// Context note attached to an error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EvalNote {
    pub message: String,
}

impl EvalNote {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// One frame of an [`EvalBacktrace`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BacktraceFrame {
    /// Name of the evaluator running in the frame.
    pub name: String,
    /// File the evaluator came from.
    pub file: String,
    /// Last line recorded for the frame, `0` if none was.
    pub line: u32,
}

/// Immutable snapshot of the call stack, innermost frame first.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EvalBacktrace {
    frames: Vec<BacktraceFrame>,
}

impl EvalBacktrace {
    pub fn new(frames: Vec<BacktraceFrame>) -> Self {
        Self { frames }
    }

    pub fn frames(&self) -> &[BacktraceFrame] {
        &self.frames
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }
}

impl fmt::Display for EvalBacktrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.frames.is_empty() {
            return Ok(());
        }
        writeln!(f, "stack backtrace:")?;
        for (i, frame) in self.frames.iter().enumerate() {
            write!(f, "  {i}: {}", frame.name)?;
            if !frame.file.is_empty() {
                write!(f, " at {}:{}", frame.file, frame.line)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Runtime error.
#[derive(Clone, Debug, PartialEq)]
pub struct EvalError {
    pub kind: EvalErrorKind,
    /// Call stack at the point the error left its innermost frame.
    pub backtrace: Option<EvalBacktrace>,
    pub notes: Vec<EvalNote>,
}

impl EvalError {
    fn from_kind(kind: EvalErrorKind) -> Self {
        Self {
            kind,
            backtrace: None,
            notes: Vec::new(),
        }
    }

    /// Raise a script value.
    ///
    /// Idempotent with respect to diagnostics: an exception object that
    /// already carries a backtrace (because it was thrown and caught before)
    /// keeps it.
    pub fn throw(value: Value) -> Self {
        let backtrace = match &value {
            Value::Exception(exception) => exception.backtrace(),
            _ => None,
        };
        Self {
            kind: EvalErrorKind::Thrown(value),
            backtrace,
            notes: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_backtrace(mut self, backtrace: EvalBacktrace) -> Self {
        self.backtrace = Some(backtrace);
        self
    }

    #[must_use]
    pub fn with_note(mut self, note: EvalNote) -> Self {
        self.notes.push(note);
        self
    }

    #[inline]
    pub fn severity(&self) -> Severity {
        self.kind.severity()
    }

    /// Whether a script-level `catch` may intercept this error.
    #[inline]
    pub fn is_catchable(&self) -> bool {
        self.severity() == Severity::Script
    }

    /// The thrown script value, if this is a `throw`.
    pub fn thrown_value(&self) -> Option<&Value> {
        match &self.kind {
            EvalErrorKind::Thrown(value) => Some(value),
            _ => None,
        }
    }

    /// The value a script `catch` clause binds.
    ///
    /// Thrown values come back unchanged. Other script-level kinds become a
    /// built-in exception object carrying this error's backtrace, so throwing
    /// the result again reproduces the same diagnostics. Fatal and exit
    /// kinds have no script representation.
    pub fn to_value(&self) -> Option<Value> {
        if let EvalErrorKind::Thrown(value) = &self.kind {
            return Some(value.clone());
        }
        let ty = self.kind.exception_type()?;
        let exception = ExceptionObject::new(ty, self.kind.to_string());
        if let Some(backtrace) = &self.backtrace {
            exception.preserve_backtrace(backtrace);
        }
        Some(Value::exception(exception))
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        for note in &self.notes {
            write!(f, "\n  note: {}", note.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for EvalError {}

impl From<EvalErrorKind> for EvalError {
    fn from(kind: EvalErrorKind) -> Self {
        Self::from_kind(kind)
    }
}

// Script-level errors

/// Bad argument value.
#[cold]
pub fn illegal_argument(message: impl Into<String>) -> EvalError {
    EvalError::from_kind(EvalErrorKind::IllegalArgument {
        message: message.into(),
    })
}

/// Wrong number of arguments to a script function.
#[cold]
pub fn arity_mismatch(name: Symbol, expected: usize, variadic: bool, got: usize) -> EvalError {
    EvalError::from_kind(EvalErrorKind::ArityMismatch {
        name: name.as_str().to_owned(),
        expected,
        variadic,
        got,
    })
}

/// Member lookup that must succeed found nothing.
#[cold]
pub fn no_such_member(name: Symbol) -> EvalError {
    EvalError::from_kind(EvalErrorKind::NoSuchMember {
        name: name.as_str().to_owned(),
    })
}

#[cold]
pub fn unsupported_operation(operation: impl Into<String>) -> EvalError {
    EvalError::from_kind(EvalErrorKind::UnsupportedOperation {
        operation: operation.into(),
    })
}

/// Second write to a `CONST` slot.
#[cold]
pub fn const_reassignment(name: Option<Symbol>) -> EvalError {
    EvalError::from_kind(EvalErrorKind::ConstReassignment {
        name: name.map(|n| n.as_str().to_owned()).unwrap_or_default(),
    })
}

#[cold]
pub fn not_callable(type_name: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::NotCallable {
        type_name: type_name.to_owned(),
    })
}

// Fatal errors

/// Frame depth ceiling exceeded.
#[cold]
pub fn stack_overflow(depth: usize) -> EvalError {
    EvalError::from_kind(EvalErrorKind::StackOverflow { depth })
}

/// Members arena cannot satisfy an allocation.
#[cold]
pub fn arena_exhausted(requested: usize, available: usize, capacity: usize) -> EvalError {
    EvalError::from_kind(EvalErrorKind::ArenaExhausted {
        requested,
        available,
        capacity,
    })
}

#[cold]
pub fn internal_invariant(message: impl Into<String>) -> EvalError {
    EvalError::from_kind(EvalErrorKind::InternalInvariant {
        message: message.into(),
    })
}

// Host requests

/// The script asked the host process to exit.
#[cold]
pub fn exit(code: i32) -> EvalError {
    EvalError::from_kind(EvalErrorKind::Exit { code })
}
