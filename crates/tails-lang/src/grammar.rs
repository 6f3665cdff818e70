//! The built-in expression grammar.
//!
//! One-shot initialized; parsers layer their own symbol table (function
//! parameters, locals) on top of this shared one.

use std::sync::OnceLock;

use smallvec::SmallVec;

use tails_core::{CompileError, CompileResult, Opcode, Param, StackEffect, op_word};

use crate::pratt::{FnParam, Parser, Symbol, SymbolTable};
use crate::tokenizer::TokenKind;

pub fn grammar() -> &'static SymbolTable {
    static GRAMMAR: OnceLock<SymbolTable> = OnceLock::new();
    GRAMMAR.get_or_init(build)
}

fn build() -> SymbolTable {
    let mut table = SymbolTable::new();

    table.add(Symbol::token(")"));
    table.add(Symbol::token("(").make_prefix_fn(5, parse_group));

    table.add(Symbol::token(";").make_infix_fn(0, 1, parse_sequence));

    table.add(Symbol::token("else:"));
    table.add(Symbol::token("if:").make_infix_fn(5, 6, parse_if));

    table.add(Symbol::token("let").make_prefix_fn(5, parse_let));
    table.add(Symbol::token(":=").make_infix(11, 10));
    table.add(Symbol::token("=").make_infix(21, 20));

    table.add(Symbol::word("==", op_word(Opcode::Eq).clone()).make_infix(30, 31));

    table.add(Symbol::word("<", op_word(Opcode::Lt).clone()).make_infix(40, 41));
    table.add(Symbol::word("<=", op_word(Opcode::Le).clone()).make_infix(40, 41));
    table.add(Symbol::word(">", op_word(Opcode::Gt).clone()).make_infix(40, 41));
    table.add(Symbol::word(">=", op_word(Opcode::Ge).clone()).make_infix(40, 41));

    table.add(Symbol::word("+", op_word(Opcode::Plus).clone()).make_infix(50, 51));
    table.add(
        Symbol::word("-", op_word(Opcode::Minus).clone())
            .make_infix(50, 51)
            .make_prefix_fn(50, parse_negate),
    );
    table.add(Symbol::word("*", op_word(Opcode::Mult).clone()).make_infix(60, 61));
    table.add(Symbol::word("/", op_word(Opcode::Div).clone()).make_infix(60, 61));

    table
}

// `( expr )`
fn parse_group(parser: &mut Parser) -> CompileResult<StackEffect> {
    let inner = parser.next_expression(5)?;
    parser.require_token(")")?;
    Ok(inner)
}

// `lhs ; rhs`: drops the values of lhs, keeps the values of rhs.
fn parse_sequence(lhs: &StackEffect, parser: &mut Parser) -> CompileResult<StackEffect> {
    if parser.at_end()? {
        return Ok(lhs.clone()); // trailing ';' is allowed
    }
    let span = parser.here();
    for _ in 0..lhs.output_count() {
        parser.compile_op(Opcode::Drop, span)?;
    }
    let rhs = parser.next_expression(1)?;
    if rhs.input_count() > 0 {
        return Err(CompileError::at(
            "stack underflow on the right side of ';'",
            span,
        ));
    }
    let inputs: SmallVec<_> = lhs.inputs().into();
    let outputs: SmallVec<_> = rhs.outputs().into();
    Ok(StackEffect::from_parts(inputs, outputs))
}

// `test if: then-expr` with optional `else: else-expr`.
fn parse_if(lhs: &StackEffect, parser: &mut Parser) -> CompileResult<StackEffect> {
    let span = parser.here();
    if lhs.output_count() != 1 {
        return Err(CompileError::at(
            "left side of 'if:' must produce a value",
            span,
        ));
    }
    let zbranch = op_word(Opcode::ZBranch).clone();
    let mut branch_pos = parser
        .compiler()
        .add_instruction(&zbranch, Param::Int(-1), Some(span));
    let mut then_effect = parser.next_expression(6)?;

    if parser.if_token("else:")? {
        let branch = op_word(Opcode::Branch).clone();
        let else_pos = parser
            .compiler()
            .add_instruction(&branch, Param::Int(-1), Some(span));
        parser.compiler().fix_branch(branch_pos);
        branch_pos = else_pos;
        let else_effect = parser.next_expression(6)?;
        if else_effect.output_count() != then_effect.output_count() {
            return Err(CompileError::at(
                "'if:' and 'else:' clauses must produce the same number of values",
                span,
            ));
        }
        for slot in 0..then_effect.output_count() {
            let merged = then_effect.outputs()[slot].union(else_effect.outputs()[slot]);
            then_effect.outputs_mut()[slot] = merged;
        }
    } else if then_effect.output_count() != 0 {
        return Err(CompileError::at(
            "'if:' without 'else:' cannot produce a value",
            span,
        ));
    }
    parser.compiler().fix_branch(branch_pos);

    let inputs: SmallVec<_> = lhs.inputs().into();
    let outputs: SmallVec<_> = then_effect.outputs().into();
    Ok(StackEffect::from_parts(inputs, outputs))
}

// `let NAME = expr`: reserves a local slot typed by the right-hand side.
fn parse_let(parser: &mut Parser) -> CompileResult<StackEffect> {
    let token = parser.next_token()?;
    if token.kind != TokenKind::Identifier {
        return Err(CompileError::at(
            "expected a local variable name",
            token.span,
        ));
    }
    let name = token.text.clone();
    if parser.symbols().itself_has(&name) {
        return Err(CompileError::at(
            format!("{} is already a local variable", name),
            token.span,
        ));
    }

    parser.require_token("=")?;
    let rhs = parser.next_expression(1)?;
    if rhs.input_count() != 0 || rhs.output_count() != 1 {
        return Err(CompileError::at(
            format!("no value to assign to {}", name),
            token.span,
        ));
    }
    let types = rhs.outputs()[0];

    let offset = parser.compiler().reserve_local(types);
    parser
        .symbols()
        .add(Symbol::param(&name, FnParam { types, offset }));
    parser.compiler().add_set_arg(offset, Some(token.span));
    Ok(StackEffect::new())
}

// Prefix `-`: compiles as `0 expr -`.
fn parse_negate(parser: &mut Parser) -> CompileResult<StackEffect> {
    let span = parser.here();
    parser.compile_op(Opcode::Zero, span)?;
    let operand = parser.next_expression(50)?;
    if operand.input_count() != 0 || operand.output_count() != 1 {
        return Err(CompileError::at("invalid operand for prefix '-'", span));
    }
    parser.compile_op(Opcode::Minus, span)?;
    let zero = op_word(Opcode::Zero);
    let minus = op_word(Opcode::Minus);
    match (zero.effect(), minus.effect()) {
        (Some(push), Some(sub)) => push.then(&operand)?.then(sub),
        _ => Err(CompileError::at("missing arithmetic effect", span)),
    }
}
