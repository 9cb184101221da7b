// error.rs - Engine error type

use thiserror::Error;

/// Every failure an executing program can raise. Primitives return these;
/// `query` propagates them without catching. Surface wrappers (the REPL)
/// catch at their boundary, the CLI runner lets them abort the process.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("parameter stack underflow")]
    StackUnderflow,

    #[error("return stack underflow")]
    ReturnStackUnderflow,

    #[error("compilation stack underflow")]
    CompilationStackUnderflow,

    #[error("unknown word: {0}")]
    UnknownWord(String),

    #[error("branch offset is not a finite number")]
    BadBranch,

    #[error("0branch needs a finite number on the stack")]
    BadStackForZeroBranch,

    #[error("-stackFrame needs two cells of the same definition")]
    BadStackFrame,

    #[error("clone needs an array")]
    CloneNonArray,

    #[error("each needs an array on top of the stack")]
    EachNeedsArray,

    #[error("compileNow: target is not a literal: {0}")]
    CompileNowNotPrimitive(String),

    #[error("placeholder word cannot be called")]
    UncallableCalled,

    #[error("{0}")]
    UserThrow(String),

    #[error("invalid regex: {0}")]
    BadRegex(String),

    #[error("unexpected end of input")]
    UnexpectedEndOfInput,

    #[error("host: {0}")]
    Host(String),
}
