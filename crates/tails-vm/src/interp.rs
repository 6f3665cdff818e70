//! The interpreter dispatch loop.
//!
//! Executes compiled code against a caller-owned [`Stack`]. Dispatch is a
//! plain match over the opcode; branches adjust the program counter,
//! interpreted calls recurse, and tail calls replace the current frame.
//! The checker guarantees depth and typing for words that came out of the
//! compiler, so most error paths here only trigger on tampered code.

use std::sync::Arc;

use tails_core::{Instr, Opcode, Param, Value, Word, WordBody, vocabulary};

use crate::error::{RunError, StackError};
use crate::io;
use crate::stack::Stack;

/// Runs a word against a stack.
///
/// Requires the stack to hold at least the word's declared inputs, and
/// pre-sizes it for the word's peak depth.
pub fn run(word: &Word, stack: &mut Stack) -> Result<(), RunError> {
    let Some(effect) = word.effect() else {
        return Err(RunError::Unrunnable(
            word.name().unwrap_or("<anonymous>").to_string(),
        ));
    };
    if stack.depth() < effect.input_count() {
        return Err(StackError::Underflow.into());
    }
    if !effect.max_is_unknown() {
        stack.reserve(effect.max() as usize);
    }
    match word.body() {
        WordBody::Compiled(code) => execute(code.clone(), 0, stack),
        WordBody::Native(op) => {
            let code: Arc<[Instr]> = vec![Instr::new(*op), Instr::new(Opcode::Return)].into();
            execute(code, 0, stack)
        }
    }
}

fn int_param(instr: &Instr) -> Result<i32, RunError> {
    instr
        .int_param()
        .ok_or_else(|| RunError::InvalidBytecode("missing integer parameter".into()))
}

fn jump(pc: usize, offset: i32) -> Result<usize, RunError> {
    let target = pc as i64 + offset as i64;
    if target < 0 {
        return Err(RunError::InvalidBytecode("branch before start of code".into()));
    }
    Ok(target as usize)
}

fn pop_number(stack: &mut Stack) -> Result<f64, RunError> {
    let value = stack.pop()?;
    value
        .as_number()
        .ok_or_else(|| RunError::InvalidBytecode("expected a number".into()))
}

fn call_quote(value: &Value, stack: &mut Stack) -> Result<(), RunError> {
    match value.as_quote() {
        Some(quote) => run(quote, stack),
        None => Err(RunError::NotAQuote(value.value_type())),
    }
}

fn execute(code: Arc<[Instr]>, start: usize, stack: &mut Stack) -> Result<(), RunError> {
    let mut code = code;
    let mut pc = start;
    loop {
        let Some(instr) = code.get(pc) else {
            return Err(RunError::InvalidBytecode("ran off the end of code".into()));
        };
        let instr = instr.clone();
        pc += 1;
        match instr.opcode {
            Opcode::Return => return Ok(()),
            Opcode::Nop => {}

            Opcode::Branch => pc = jump(pc, int_param(&instr)?)?,
            Opcode::ZBranch => {
                let offset = int_param(&instr)?;
                if !stack.pop()?.is_truthy() {
                    pc = jump(pc, offset)?;
                }
            }
            Opcode::Recurse => {
                let target = jump(pc, int_param(&instr)?)?;
                execute(code.clone(), target, stack)?;
            }
            Opcode::Interp => match &instr.param {
                Param::Word(word) => run(word, stack)?,
                _ => return Err(RunError::InvalidBytecode("call without a word".into())),
            },
            Opcode::TailInterp => match &instr.param {
                Param::Word(word) => match word.instrs() {
                    Some(callee) => {
                        code = callee.clone();
                        pc = 0;
                    }
                    None => return Err(RunError::InvalidBytecode("tail call to a primitive".into())),
                },
                _ => return Err(RunError::InvalidBytecode("call without a word".into())),
            },

            Opcode::Literal => match &instr.param {
                Param::Val(value) => stack.push(value.clone()),
                _ => return Err(RunError::InvalidBytecode("literal without a value".into())),
            },
            Opcode::Int => stack.push(Value::number(int_param(&instr)? as f64)),
            Opcode::Zero => stack.push(Value::number(0.0)),
            Opcode::One => stack.push(Value::number(1.0)),
            Opcode::Null => stack.push(Value::Null),

            Opcode::Drop => stack.drop_top()?,
            Opcode::Dup => stack.dup()?,
            Opcode::Over => stack.over()?,
            Opcode::Rot => stack.rot()?,
            Opcode::Swap => stack.swap()?,
            Opcode::RotN => stack.rotate(int_param(&instr)?)?,

            Opcode::Eq => binary(stack, |a, b| Ok(bool_value(a == b)))?,
            Opcode::Ne => binary(stack, |a, b| Ok(bool_value(a != b)))?,
            Opcode::EqZero => unary(stack, |v| bool_value(v == Value::number(0.0)))?,
            Opcode::NeZero => unary(stack, |v| bool_value(v != Value::number(0.0)))?,
            Opcode::Gt => binary(stack, |a, b| Ok(bool_value(a.compare(&b).is_gt())))?,
            Opcode::Ge => binary(stack, |a, b| Ok(bool_value(a.compare(&b).is_ge())))?,
            Opcode::Lt => binary(stack, |a, b| Ok(bool_value(a.compare(&b).is_lt())))?,
            Opcode::Le => binary(stack, |a, b| Ok(bool_value(a.compare(&b).is_le())))?,
            Opcode::GtZero => {
                unary(stack, |v| bool_value(v.compare(&Value::number(0.0)).is_gt()))?
            }
            Opcode::LtZero => {
                unary(stack, |v| bool_value(v.compare(&Value::number(0.0)).is_lt()))?
            }

            Opcode::Plus => binary(stack, |a, b| Ok(a.add(&b)?))?,
            Opcode::Minus => binary(stack, |a, b| Ok(a.sub(&b)?))?,
            Opcode::Mult => binary(stack, |a, b| Ok(a.mul(&b)?))?,
            Opcode::Div => binary(stack, |a, b| Ok(a.div(&b)?))?,
            Opcode::Mod => binary(stack, |a, b| Ok(a.rem(&b)?))?,
            Opcode::Abs => {
                let n = pop_number(stack)?;
                stack.push(Value::number(n.abs()));
            }
            Opcode::Max => binary(stack, |a, b| {
                Ok(if a.compare(&b).is_ge() { a } else { b })
            })?,
            Opcode::Min => binary(stack, |a, b| {
                Ok(if a.compare(&b).is_le() { a } else { b })
            })?,

            Opcode::Length => {
                let value = stack.pop()?;
                stack.push(value.length()?);
            }

            Opcode::Call => {
                let callee = stack.pop()?;
                call_quote(&callee, stack)?;
            }
            Opcode::IfElse => {
                let if_false = stack.pop()?;
                let if_true = stack.pop()?;
                let test = stack.pop()?;
                let chosen = if test.is_truthy() { if_true } else { if_false };
                call_quote(&chosen, stack)?;
            }
            Opcode::Define => {
                let name = stack.pop()?;
                let quote = stack.pop()?;
                let Some(name) = name.as_str() else {
                    return Err(RunError::InvalidBytecode("DEFINE needs a name string".into()));
                };
                let Some(word) = quote.as_quote() else {
                    return Err(RunError::NotAQuote(quote.value_type()));
                };
                // Defined words are pinned in the vocabulary for the process
                // lifetime.
                let named = Arc::new(word.renamed(name));
                vocabulary::active_mut().define(named);
            }

            Opcode::GetArg => stack.get_arg(int_param(&instr)?)?,
            Opcode::SetArg => stack.set_arg(int_param(&instr)?)?,
            Opcode::Locals => {
                let count = int_param(&instr)?;
                stack.push_locals(count.max(0) as usize);
            }
            Opcode::DropArgs => match instr.param {
                Param::Drop { locals, results } => {
                    stack.drop_frame(locals as usize, results as usize)?;
                }
                _ => return Err(RunError::InvalidBytecode("DROPARGS without counts".into())),
            },

            Opcode::Print => {
                let value = stack.pop()?;
                io::print_value(&value);
            }
            Opcode::Sp => io::print_space(),
            Opcode::Nl => io::print_newline(),
            Opcode::Nlq => io::print_newline_if_needed(),
        }
    }
}

fn bool_value(b: bool) -> Value {
    Value::number(if b { 1.0 } else { 0.0 })
}

// Pops ( a b -- ) and pushes f(a, b).
fn binary(
    stack: &mut Stack,
    f: impl FnOnce(Value, Value) -> Result<Value, RunError>,
) -> Result<(), RunError> {
    let b = stack.pop()?;
    let a = stack.pop()?;
    stack.push(f(a, b)?);
    Ok(())
}

// Replaces the top value with f(top).
fn unary(stack: &mut Stack, f: impl FnOnce(Value) -> Value) -> Result<(), RunError> {
    let value = stack.pop()?;
    stack.push(f(value));
    Ok(())
}
