//! The Tails REPL.
//!
//! Each line is compiled as a top-level program whose inputs are the values
//! already on the stack; its results stay on the stack for the next line.
//! An empty line clears the stack.

use std::io::{BufRead, Write};

use tails::{Stack, Value, eval_onto};

fn print_stack(stack: &Stack) {
    let mut out = std::io::stdout();
    let _ = write!(out, "-->");
    for value in stack.as_slice() {
        match value {
            Value::String(s) => {
                let _ = write!(out, " \"{}\"", s);
            }
            value => {
                let _ = write!(out, " {}", value);
            }
        }
    }
    let _ = writeln!(out);
}

fn prompt() {
    let mut out = std::io::stdout();
    let _ = write!(out, "> ");
    let _ = out.flush();
}

fn main() {
    let stdin = std::io::stdin();
    let mut stack = Stack::new();

    prompt();
    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        let line = line.trim();
        if line.is_empty() {
            stack.clear();
        } else if let Err(err) = eval_onto(line, &mut stack) {
            eprintln!("error: {}", err);
        }
        print_stack(&stack);
        prompt();
    }
}
