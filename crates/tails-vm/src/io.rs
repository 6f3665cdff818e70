//! Console output for the printing words.
//!
//! Tracks whether anything has been written to the current line so that
//! `NL?` can emit a newline only when one is needed.

use std::cell::Cell;
use std::io::Write;

use tails_core::Value;

thread_local! {
    static AT_LINE_START: Cell<bool> = const { Cell::new(true) };
}

fn emit(text: &str) {
    let mut out = std::io::stdout();
    let _ = out.write_all(text.as_bytes());
    let _ = out.flush();
    if let Some(last) = text.chars().last() {
        AT_LINE_START.with(|flag| flag.set(last == '\n'));
    }
}

/// `.`: prints a value.
pub fn print_value(value: &Value) {
    emit(&value.to_string());
}

/// `SP.`: prints a space.
pub fn print_space() {
    emit(" ");
}

/// `NL.`: prints a newline.
pub fn print_newline() {
    emit("\n");
}

/// `NL?`: prints a newline unless the current line is empty.
pub fn print_newline_if_needed() {
    if !AT_LINE_START.with(|flag| flag.get()) {
        emit("\n");
    }
}
