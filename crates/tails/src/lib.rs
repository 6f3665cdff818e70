//! Tails: a tiny Forth-family language with a stack-checking compiler.
//!
//! This crate ties the compiler front end and the interpreter together and
//! exposes one-call evaluation helpers. The heavy lifting lives in
//! `tails-core` (types), `tails-lang` (compiler), and `tails-vm` (runtime).

use thiserror::Error;

pub use tails_core::{
    CompileError, Instr, Opcode, Param, StackEffect, TypeSet, Value, ValueType, Word, op_word,
    vocabulary,
};
pub use tails_lang::{Compiler, Parser, forth};
pub use tails_vm::{RunError, Stack, run};

/// Any failure from source text to result values.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Run(#[from] RunError),
}

/// Compiles and runs a Forth-syntax program on an empty stack, returning
/// the resulting values (bottom to top).
pub fn eval(source: &str) -> Result<Vec<Value>, Error> {
    let mut stack = Stack::new();
    eval_onto(source, &mut stack)?;
    Ok(stack.as_slice().to_vec())
}

/// Compiles a Forth-syntax program against the values already on `stack`
/// and runs it there. This is the REPL entry point: each line may consume
/// values left by earlier lines.
pub fn eval_onto(source: &str, stack: &mut Stack) -> Result<(), Error> {
    let word = forth::parse_with_inputs(source, stack.as_slice())?;
    run(&word, stack)?;
    Ok(())
}

/// Compiles and runs an infix expression (with an optional
/// `( inputs -- outputs )` parameter header) on an empty stack.
pub fn eval_expression(source: &str) -> Result<Vec<Value>, Error> {
    let mut stack = Stack::new();
    eval_expression_onto(source, &mut stack)?;
    Ok(stack.as_slice().to_vec())
}

/// Compiles and runs an infix expression against an existing stack; the
/// expression's declared inputs are taken from the top of the stack.
pub fn eval_expression_onto(source: &str, stack: &mut Stack) -> Result<(), Error> {
    let word = Parser::parse(source)?;
    run(&word, stack)?;
    Ok(())
}
