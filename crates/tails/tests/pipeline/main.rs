//! End-to-end pipeline tests: source text → compile → run → stack.

mod arithmetic;
mod control;
mod definitions;
mod expressions;
mod quotes;
mod strings;

use tails::{Error, Value, eval};

/// Runs a Forth-syntax program on an empty stack and checks the resulting
/// numbers (bottom to top).
pub fn assert_stack_eq(source: &str, expected: &[f64]) {
    let result = eval(source).unwrap_or_else(|err| panic!("{:?} failed: {}", source, err));
    let expected: Vec<Value> = expected.iter().map(|&n| Value::number(n)).collect();
    assert_eq!(result, expected, "wrong result for {:?}", source);
}

/// Checks that a program fails to compile.
pub fn assert_compile_error(source: &str) {
    match eval(source) {
        Err(Error::Compile(_)) => {}
        Err(other) => panic!("{:?} failed at runtime, not compile time: {}", source, other),
        Ok(result) => panic!("{:?} unexpectedly compiled and ran: {:?}", source, result),
    }
}
