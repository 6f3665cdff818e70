//! Arithmetic and stack-shuffle scenarios.

use super::{assert_compile_error, assert_stack_eq};

#[test]
fn subtraction_with_negative_literal() {
    assert_stack_eq("3 -4 -", &[7.0]);
}

#[test]
fn add_dup_abs() {
    assert_stack_eq("4 3 + DUP + ABS", &[14.0]);
}

#[test]
fn division_is_floating_point() {
    assert_stack_eq("3 4 /", &[0.75]);
}

#[test]
fn modulo() {
    assert_stack_eq("7 3 MOD", &[1.0]);
}

#[test]
fn abs_of_literals() {
    assert_stack_eq("-1234 ABS", &[1234.0]);
    assert_stack_eq("1234 ABS", &[1234.0]);
}

#[test]
fn min_and_max() {
    assert_stack_eq("3 4 MAX", &[4.0]);
    assert_stack_eq("4 3 MAX", &[4.0]);
    assert_stack_eq("3 4 MIN", &[3.0]);
}

#[test]
fn stack_shuffles() {
    assert_stack_eq("1 2 3 ROT", &[2.0, 3.0, 1.0]);
    assert_stack_eq("1 2 SWAP", &[2.0, 1.0]);
    assert_stack_eq("1 2 OVER", &[1.0, 2.0, 1.0]);
    assert_stack_eq("1 2 DROP", &[1.0]);
}

#[test]
fn comparisons_yield_numbers() {
    assert_stack_eq("3 4 <", &[1.0]);
    assert_stack_eq("3 4 >", &[0.0]);
    assert_stack_eq("3 3 =", &[1.0]);
    assert_stack_eq("5 0>", &[1.0]);
    assert_stack_eq("0 0=", &[1.0]);
}

#[test]
fn int16_packing_is_invisible() {
    // Values inside and outside the 16-bit literal range behave the same.
    assert_stack_eq("32767 1 +", &[32768.0]);
    assert_stack_eq("32768 1 +", &[32769.0]);
    assert_stack_eq("-32768 1 -", &[-32769.0]);
    assert_stack_eq("2.5 2 *", &[5.0]);
}

#[test]
fn underflow_fails_to_compile() {
    assert_compile_error("DUP");
    assert_compile_error("1 +");
}

#[test]
fn numeric_words_reject_strings() {
    assert_compile_error(r#""a" 1 *"#);
    assert_compile_error(r#"1 "a" -"#);
}
