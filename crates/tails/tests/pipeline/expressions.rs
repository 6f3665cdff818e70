//! Infix expression scenarios (the Pratt parser front end).

use tails::{Error, Stack, Value, eval_expression, eval_expression_onto};

fn assert_expr_eq(source: &str, expected: &[f64]) {
    let result =
        eval_expression(source).unwrap_or_else(|err| panic!("{:?} failed: {}", source, err));
    let expected: Vec<Value> = expected.iter().map(|&n| Value::number(n)).collect();
    assert_eq!(result, expected, "wrong result for {:?}", source);
}

fn assert_expr_error(source: &str) {
    match eval_expression(source) {
        Err(Error::Compile(_)) => {}
        Err(other) => panic!("{:?} failed at runtime, not compile time: {}", source, other),
        Ok(result) => panic!("{:?} unexpectedly compiled and ran: {:?}", source, result),
    }
}

fn eval_with_inputs(source: &str, inputs: &[f64]) -> Vec<Value> {
    let mut stack = Stack::new();
    for &n in inputs {
        stack.push(Value::number(n));
    }
    eval_expression_onto(source, &mut stack)
        .unwrap_or_else(|err| panic!("{:?} failed: {}", source, err));
    stack.as_slice().to_vec()
}

#[test]
fn precedence() {
    assert_expr_eq("3 + 4 * 5", &[23.0]);
    assert_expr_eq("3 * 4 + 5", &[17.0]);
    assert_expr_eq("1 + 2 * 3 - 4", &[3.0]);
}

#[test]
fn left_associativity() {
    assert_expr_eq("10 - 2 - 3", &[5.0]);
    assert_expr_eq("100 / 10 / 2", &[5.0]);
}

#[test]
fn grouping() {
    assert_expr_eq("2 * (3 + 4)", &[14.0]);
    assert_expr_eq("0 + ((1 + 2) * 3)", &[9.0]);
}

#[test]
fn unary_minus() {
    assert_expr_eq("1 - -2", &[3.0]);
    assert_expr_eq("10 + - (2 + 3)", &[5.0]);
}

#[test]
fn comparisons() {
    assert_expr_eq("3 < 4", &[1.0]);
    assert_expr_eq("3 >= 4", &[0.0]);
    assert_expr_eq("1 + 2 == 3", &[1.0]);
}

#[test]
fn conditional() {
    assert_expr_eq("1 if: 2 else: 3", &[2.0]);
    assert_expr_eq("0 if: 2 else: 3", &[3.0]);
    assert_expr_eq("2 > 1 if: 10 + 1 else: 20 + 2", &[11.0]);
}

#[test]
fn conditional_without_else_must_not_leave_a_value() {
    assert_expr_error("1 if: 2");
    assert_expr_eq("let x = 1; 0 if: x := 9; x", &[1.0]);
    assert_expr_eq("let x = 1; 1 if: x := 9; x", &[9.0]);
}

#[test]
fn conditional_arity_mismatch_fails() {
    assert_expr_error("1 if: 2");
    assert_expr_error("1 if: 2 else: 3; 4 if: 5");
}

#[test]
fn sequencing_drops_left_values() {
    assert_expr_eq("1; 2", &[2.0]);
    assert_expr_eq("1 + 1; 2 + 2; 3 + 3", &[6.0]);
}

#[test]
fn locals() {
    assert_expr_eq("let x = 3; x * x + 1", &[10.0]);
    assert_expr_eq("let a = 2; let b = 5; a * b", &[10.0]);
}

#[test]
fn local_redeclaration_fails() {
    assert_expr_error("let x = 1; let x = 2");
}

#[test]
fn locals_can_be_reassigned() {
    assert_expr_eq("let x = 1; x := x + 10; x", &[11.0]);
}

#[test]
fn function_parameters() {
    assert_eq!(
        eval_with_inputs("(a# b# -- #) a * b", &[3.0, 4.0]),
        [Value::number(12.0)]
    );
    assert_eq!(
        eval_with_inputs("(a# b# -- #) a - b", &[10.0, 4.0]),
        [Value::number(6.0)]
    );
}

#[test]
fn parameter_assignment() {
    assert_eq!(
        eval_with_inputs("(a# -- #) a := a + 1; a", &[5.0]),
        [Value::number(6.0)]
    );
}

#[test]
fn parameters_mix_with_locals() {
    assert_eq!(
        eval_with_inputs("(n# -- #) let twice = n + n; twice * twice", &[3.0]),
        [Value::number(36.0)]
    );
}

#[test]
fn unknown_symbol_fails() {
    assert_expr_error("nonesuch + 1");
    assert_expr_error("1 ?? 2");
}

#[test]
fn dangling_operator_fails() {
    assert_expr_error("1 +");
    assert_expr_error("* 2");
}
