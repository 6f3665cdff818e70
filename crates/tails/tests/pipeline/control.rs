//! IF/ELSE/THEN and BEGIN/WHILE/REPEAT scenarios.

use super::{assert_compile_error, assert_stack_eq};

#[test]
fn if_else_then_true() {
    assert_stack_eq("1 IF 123 ELSE 666 THEN", &[123.0]);
}

#[test]
fn if_else_then_false() {
    assert_stack_eq("0 IF 123 ELSE 666 THEN", &[666.0]);
}

#[test]
fn if_without_else_balanced() {
    assert_stack_eq("10 1 IF 2 + THEN", &[12.0]);
    assert_stack_eq("10 0 IF 2 + THEN", &[10.0]);
}

#[test]
fn nested_conditionals() {
    assert_stack_eq("1 IF 0 IF 1 ELSE 2 THEN ELSE 3 THEN", &[2.0]);
    assert_stack_eq("0 IF 0 IF 1 ELSE 2 THEN ELSE 3 THEN", &[3.0]);
}

#[test]
fn countdown_factorial_loop() {
    assert_stack_eq("1 5 BEGIN DUP WHILE SWAP OVER * SWAP 1 - REPEAT DROP", &[120.0]);
}

#[test]
fn loop_runs_zero_times() {
    assert_stack_eq("1 0 BEGIN DUP WHILE SWAP OVER * SWAP 1 - REPEAT DROP", &[1.0]);
}

#[test]
fn unterminated_if_fails() {
    assert_compile_error("1 IF 2");
    assert_compile_error("1 IF 2 ELSE 3");
    assert_compile_error("1 BEGIN DUP WHILE DROP 1");
}

#[test]
fn mismatched_control_words_fail() {
    assert_compile_error("ELSE");
    assert_compile_error("1 2 THEN");
    assert_compile_error("1 WHILE REPEAT");
}

#[test]
fn arms_must_agree_on_depth() {
    // The then-arm pushes a value, the else-arm doesn't.
    assert_compile_error("1 IF 2 ELSE THEN");
    // An if-arm that leaves a value without an else to match it.
    assert_compile_error("1 IF 2 THEN");
}
