//! String scenarios.

use super::assert_stack_eq;
use tails::{Value, eval};

#[test]
fn string_literal() {
    let result = eval(r#""hello""#).unwrap();
    assert_eq!(result, [Value::string("hello")]);
}

#[test]
fn concatenation() {
    let result = eval(r#""Hi" "There" +"#).unwrap();
    assert_eq!(result, [Value::string("HiThere")]);
}

#[test]
fn length() {
    assert_stack_eq(r#""hello" LENGTH"#, &[5.0]);
    assert_stack_eq(r#""" LENGTH"#, &[0.0]);
}

#[test]
fn strings_in_conditionals() {
    let result = eval(r#"1 IF "truthy" ELSE "falsey" THEN"#).unwrap();
    assert_eq!(result, [Value::string("truthy")]);
}

#[test]
fn escapes() {
    let result = eval(r#""a\"b""#).unwrap();
    assert_eq!(result, [Value::string("a\"b")]);
}

#[test]
fn strings_are_truthy() {
    assert_stack_eq(r#""x" IF 1 ELSE 2 THEN"#, &[1.0]);
}

#[test]
fn null_is_falsy() {
    assert_stack_eq("NULL IF 1 ELSE 2 THEN", &[2.0]);
}
