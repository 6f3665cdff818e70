use tails_core::{ValueError, ValueType};

/// Stack operation errors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StackError {
    /// Tried to pop from an empty stack.
    Underflow,
    /// Invalid stack index.
    InvalidIndex(usize),
}

impl std::fmt::Display for StackError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StackError::Underflow => write!(f, "stack underflow"),
            StackError::InvalidIndex(i) => write!(f, "invalid stack index: {}", i),
        }
    }
}

impl std::error::Error for StackError {}

/// Runtime error during execution.
///
/// The compiler's checker prevents underflow and type errors in compiled
/// words, so most of these indicate a tampered word or a bug; the
/// `Value`-delegated failures (arithmetic, LENGTH) are the real surface.
#[derive(Clone, Debug, PartialEq)]
pub enum RunError {
    /// Stack error (underflow, bad index).
    Stack(StackError),
    /// Value operation failure (type mismatch, division by zero).
    Value(ValueError),
    /// CALL or IFELSE applied to a non-quote value.
    NotAQuote(ValueType),
    /// Word has no effect or body to execute.
    Unrunnable(String),
    /// Malformed compiled code.
    InvalidBytecode(String),
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunError::Stack(e) => write!(f, "{}", e),
            RunError::Value(e) => write!(f, "{}", e),
            RunError::NotAQuote(t) => write!(f, "can't call a value of type {}", t),
            RunError::Unrunnable(name) => write!(f, "word `{}` cannot be executed", name),
            RunError::InvalidBytecode(msg) => write!(f, "invalid bytecode: {}", msg),
        }
    }
}

impl std::error::Error for RunError {}

impl From<StackError> for RunError {
    fn from(e: StackError) -> Self {
        RunError::Stack(e)
    }
}

impl From<ValueError> for RunError {
    fn from(e: ValueError) -> Self {
        RunError::Value(e)
    }
}
