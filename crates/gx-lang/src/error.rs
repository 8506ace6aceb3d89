//! Error types for parsing, compilation, and execution.

use thiserror::Error;

use crate::value::Kind;

/// Syntax error from the PEG parser.
///
/// Reports the grammar rule that was being matched at the furthest position
/// the parser reached, with a 1-based line and column. No program is produced
/// on a parse failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("parse error in rule `{rule}` at line {line}, column {column}")]
pub struct ParseError {
    /// Innermost grammar rule that had consumed input at the failure point.
    pub rule: &'static str,
    pub line: usize,
    pub column: usize,
}

/// Author error detected while lowering parse events to bytecode.
///
/// These are detectable before any record is processed, unlike
/// [`RuntimeError`]s which depend on input data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("undefined reference: {0}")]
    UndefinedReference(String),

    #[error("cannot mutate the entire input record")]
    MutateRoot,

    #[error("unknown function: {0}")]
    UnknownFunction(String),

    #[error("numeric literal out of range: {0}")]
    LiteralOutOfRange(String),
}

/// Either failure mode of [`crate::compile`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScriptError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Compile(#[from] CompileError),
}

/// Fault while executing a compiled program against one record.
///
/// A runtime error aborts the current run only; the program is untouched and
/// the VM resets itself on the next run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error("stack underflow: tried to pop from empty stack")]
    StackUnderflow,

    #[error("invalid operation '{left} {op} {right}'")]
    InvalidOperation {
        op: &'static str,
        left: Kind,
        right: Kind,
    },

    #[error("expected {expected} on the stack, found {found}")]
    TypeMismatch { expected: &'static str, found: Kind },

    #[error("constant index {index} out of range")]
    InvalidConstant { index: usize },

    #[error("invalid register {register}")]
    InvalidRegister { register: usize },

    #[error("read of register {register} before any assignment")]
    UninitializedRegister { register: usize },

    #[error("jump target was never patched")]
    UnpatchedJump,

    #[error("builtin index {index} out of range")]
    InvalidBuiltin { index: usize },

    #[error("cannot dereference into a {kind} value")]
    BadDereference { kind: Kind },

    #[error("no such field `{key}` on a feature")]
    UnknownField { key: String },

    #[error("field `{key}` is not writable")]
    NotWritable { key: String },

    #[error("no matching function call: {signature}")]
    NoMatchingCall { signature: String },

    #[error("integer division by zero")]
    DivisionByZero,

    #[error("cannot parse {text:?} as {kind}")]
    ParseFailure { kind: &'static str, text: String },

    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("output channel closed")]
    OutputClosed,
}
