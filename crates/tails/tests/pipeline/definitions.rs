//! DEFINE, recursion, and tail-call conversion.

use super::assert_stack_eq;
use tails::{Value, eval, vocabulary};

#[test]
fn define_registers_a_word() {
    assert_stack_eq(r#"[(n# -- #) 3 *] "pipeline-thrice" DEFINE 0"#, &[0.0]);
    // Lookup is case-insensitive.
    assert_stack_eq("8 pipeline-thrice Pipeline-Thrice", &[72.0]);
}

#[test]
fn recursive_factorial() {
    assert_stack_eq(
        r#"[(n# -- #) DUP 1 > IF DUP 1 - RECURSE * ELSE DROP 1 THEN] "pipeline-factorial" DEFINE 0"#,
        &[0.0],
    );
    assert_stack_eq("5 pipeline-factorial", &[120.0]);
    assert_stack_eq("1 pipeline-factorial", &[1.0]);

    let word = vocabulary::active().lookup("pipeline-factorial").unwrap();
    assert!(word.is_recursive());
    assert!(word.effect().unwrap().max_is_unknown());
}

#[test]
fn tail_recursive_factorial() {
    // fact(f, n) -> fact(f * n, n - 1) when n > 1, else f.
    assert_stack_eq(
        r#"[(f# i# -- #) DUP 1 > IF DUP ROT * SWAP 1 - RECURSE ELSE DROP THEN] "pipeline-fact" DEFINE 0"#,
        &[0.0],
    );
    assert_stack_eq("1 5 pipeline-fact", &[120.0]);

    let word = vocabulary::active().lookup("pipeline-fact").unwrap();
    assert!(!word.is_recursive());
    // The RECURSE was rewritten to a backward branch.
    assert!(
        word.instrs()
            .unwrap()
            .iter()
            .all(|i| i.opcode != tails::Opcode::Recurse)
    );
    assert_eq!(word.effect().unwrap().max(), 4);
}

#[test]
fn tail_recursion_runs_in_constant_stack() {
    // Triangle numbers by accumulation; deep enough that a non-converted
    // call chain would overflow the host stack.
    assert_stack_eq(
        r#"[(f# i# -- #) DUP 1 > IF DUP ROT + SWAP 1 - RECURSE ELSE DROP THEN] "pipeline-tri" DEFINE 0"#,
        &[0.0],
    );
    assert_stack_eq("1 100000 pipeline-tri", &[5000050000.0]);
}

#[test]
fn defined_words_compose() {
    assert_stack_eq(r#"[(n# -- #) DUP *] "pipeline-square" DEFINE 0"#, &[0.0]);
    assert_stack_eq("4 3 + pipeline-square DUP + pipeline-square ABS", &[9604.0]);
}

#[test]
fn define_consumes_its_arguments() {
    let result = eval(r#"[(n# -- #) 1 +] "pipeline-incr" DEFINE"#).unwrap();
    assert_eq!(result, Vec::<Value>::new());
}
