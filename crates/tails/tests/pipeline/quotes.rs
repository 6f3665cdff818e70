//! Quotation literals and IFELSE.

use super::{assert_compile_error, assert_stack_eq};
use tails::{Value, eval};

#[test]
fn ifelse_picks_the_first_quote_when_truthy() {
    assert_stack_eq("3 4 1 [*] [+] IFELSE", &[12.0]);
}

#[test]
fn ifelse_picks_the_second_quote_when_falsy() {
    assert_stack_eq("3 4 0 [*] [+] IFELSE", &[7.0]);
}

#[test]
fn ifelse_with_string_results() {
    let result = eval(r#"1 ["yes"] ["no"] IFELSE"#).unwrap();
    assert_eq!(result, [Value::string("yes")]);
    let result = eval(r#"0 ["yes"] ["no"] IFELSE"#).unwrap();
    assert_eq!(result, [Value::string("no")]);
}

#[test]
fn ifelse_with_declared_signatures() {
    assert_stack_eq("3 4 1 [(a# b# -- #) *] [(a# b# -- #) +] IFELSE", &[12.0]);
}

#[test]
fn ifelse_arms_may_differ_in_arity_if_nets_agree() {
    // [*] is (# # -- #), [DROP] is (x --); both have a net of -1.
    assert_stack_eq("3 4 1 [*] [DROP] IFELSE", &[12.0]);
    assert_stack_eq("3 4 0 [*] [DROP] IFELSE", &[3.0]);
}

#[test]
fn ifelse_arms_with_different_nets_fail() {
    assert_compile_error("3 4 1 [*] [DROP DROP] IFELSE");
}

#[test]
fn ifelse_requires_literal_quotes() {
    // A quote hidden behind a SWAP is no longer a literal on the simulated
    // stack, so its effect is unknown.
    assert_compile_error("3 4 1 [*] SWAP IFELSE");
    assert_compile_error("1 2 3 IFELSE");
}

#[test]
fn quote_values_are_inert() {
    // A quote is just a value until something calls it.
    let result = eval("3 [DUP] DROP").unwrap();
    assert_eq!(result, [Value::number(3.0)]);
}

#[test]
fn quotes_with_unbalanced_bodies_fail() {
    assert_compile_error("[ IF ]");
    assert_compile_error("[ 1 IF 2 ]");
}
