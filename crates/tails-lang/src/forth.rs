//! The Forth-style word parser: whitespace-separated tokens, postfix order.
//!
//! Supports literals, word calls, `IF`/`ELSE`/`THEN`, `BEGIN`/`WHILE`/
//! `REPEAT`, `RECURSE`, and `[...]` quote literals with an optional
//! `( inputs -- outputs )` signature header. Word lookup is
//! case-insensitive against the active vocabulary stack.

use std::sync::Arc;

use tails_core::{
    CompileError, CompileResult, Opcode, Pos, Span, StackEffect, Value, Word, vocabulary,
};

use crate::compiler::Compiler;

/// Parses a top-level program with no stack inputs.
pub fn parse(source: &str) -> CompileResult<Arc<Word>> {
    parse_with_inputs(source, &[])
}

/// Parses a top-level program whose declared inputs are the given live
/// stack values (bottom to top). The REPL uses this so each line can
/// consume values left by earlier lines.
pub fn parse_with_inputs(source: &str, inputs: &[Value]) -> CompileResult<Arc<Word>> {
    let mut compiler = Compiler::new();
    compiler.set_input_stack(inputs);
    let mut parser = ForthParser { src: source, pos: 0 };
    parser.compile_into(&mut compiler, None)?;
    compiler.finish()
}

struct ForthParser<'s> {
    src: &'s str,
    pos: usize,
}

impl<'s> ForthParser<'s> {
    fn remaining(&self) -> &'s str {
        &self.src[self.pos..]
    }

    fn peek_char(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn skip_whitespace(&mut self) {
        let rest = self.remaining();
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn span_from(&self, start: usize) -> Span {
        Span::new(Pos::new(start as u32), Pos::new(self.pos as u32))
    }

    // A token runs to whitespace or a bracket/quote delimiter.
    fn read_token(&mut self) -> (&'s str, Span) {
        let start = self.pos;
        for c in self.remaining().chars() {
            if c.is_whitespace() || c == '[' || c == ']' || c == '"' {
                break;
            }
            self.pos += c.len_utf8();
        }
        (&self.src[start..self.pos], self.span_from(start))
    }

    fn read_through(&mut self, delim: char) -> Option<&'s str> {
        let rest = self.remaining();
        let index = rest.find(delim)?;
        self.pos += index + delim.len_utf8();
        Some(&rest[..index])
    }

    fn read_string(&mut self) -> CompileResult<(String, Span)> {
        let start = self.pos;
        self.pos += 1; // opening quote
        let mut contents = String::new();
        let mut chars = self.remaining().char_indices();
        while let Some((index, c)) = chars.next() {
            match c {
                '"' => {
                    self.pos += index + 1;
                    return Ok((contents, self.span_from(start)));
                }
                '\\' => match chars.next() {
                    Some((_, 'n')) => contents.push('\n'),
                    Some((_, 't')) => contents.push('\t'),
                    Some((_, escaped)) => contents.push(escaped),
                    None => break,
                },
                c => contents.push(c),
            }
        }
        Err(CompileError::at(
            "unclosed string literal",
            self.span_from(start),
        ))
    }

    fn compile_into(&mut self, c: &mut Compiler, end_delim: Option<char>) -> CompileResult<()> {
        loop {
            self.skip_whitespace();
            match self.peek_char() {
                None => {
                    if end_delim.is_some() {
                        return Err(CompileError::at(
                            "missing ']' to end quotation",
                            Span::at(Pos::new(self.pos as u32)),
                        ));
                    }
                    return Ok(());
                }
                Some(ch) if Some(ch) == end_delim => {
                    self.pos += ch.len_utf8();
                    return Ok(());
                }
                Some('[') => {
                    let start = self.pos;
                    self.pos += 1;
                    let quote = self.parse_quote()?;
                    c.add_literal(Value::quote(quote), Some(self.span_from(start)));
                }
                Some(']') => {
                    return Err(CompileError::at(
                        "']' without a matching '['",
                        Span::at(Pos::new(self.pos as u32)),
                    ));
                }
                Some('"') => {
                    let (contents, span) = self.read_string()?;
                    c.add_literal(Value::string(contents), Some(span));
                }
                Some(_) => {
                    let (token, span) = self.read_token();
                    self.compile_token(c, token, span)?;
                }
            }
        }
    }

    // `[ (sig)? ...body ]`: compiles the body as an anonymous word. Without
    // a signature the inputs and outputs are inferred.
    fn parse_quote(&mut self) -> CompileResult<Arc<Word>> {
        let mut sub = Compiler::new();
        self.skip_whitespace();
        if self.peek_char() == Some('(') {
            let start = self.pos;
            self.pos += 1;
            let Some(sig) = self.read_through(')') else {
                return Err(CompileError::at(
                    "missing ')' to end stack effect",
                    self.span_from(start),
                ));
            };
            let effect =
                StackEffect::parse(sig).map_err(|e| e.with_span(self.span_from(start)))?;
            sub.set_stack_effect(effect, false, false);
        }
        self.compile_into(&mut sub, Some(']'))?;
        sub.finish()
    }

    fn compile_token(&mut self, c: &mut Compiler, token: &str, span: Span) -> CompileResult<()> {
        if token.eq_ignore_ascii_case("IF") {
            c.push_branch('i', Some(Opcode::ZBranch));
        } else if token.eq_ignore_ascii_case("ELSE") {
            let if_pos = c
                .pop_branch("i")
                .map_err(|_| CompileError::at("ELSE without a matching IF", span))?;
            c.push_branch('e', Some(Opcode::Branch));
            c.fix_branch(if_pos);
        } else if token.eq_ignore_ascii_case("THEN") {
            let pos = c
                .pop_branch("ie")
                .map_err(|_| CompileError::at("THEN without a matching IF", span))?;
            c.fix_branch(pos);
        } else if token.eq_ignore_ascii_case("BEGIN") {
            c.push_branch('b', None);
        } else if token.eq_ignore_ascii_case("WHILE") {
            c.push_branch('w', Some(Opcode::ZBranch));
        } else if token.eq_ignore_ascii_case("REPEAT") {
            let while_pos = c
                .pop_branch("w")
                .map_err(|_| CompileError::at("REPEAT without a matching WHILE", span))?;
            let begin_pos = c
                .pop_branch("b")
                .map_err(|_| CompileError::at("REPEAT without a matching BEGIN", span))?;
            c.add_branch_back_to(begin_pos);
            c.fix_branch(while_pos);
        } else if token.eq_ignore_ascii_case("RECURSE") {
            c.add_recurse(Some(span));
        } else if let Some(word) = vocabulary::active().lookup(token) {
            c.add_word(&word, Some(span))?;
        } else if let Ok(number) = token.parse::<f64>() {
            if number.is_nan() || number.is_infinite() {
                return Err(CompileError::at("invalid number", span));
            }
            c.add_literal(Value::number(number), Some(span));
        } else {
            return Err(CompileError::at(
                format!("unknown word '{}'", token),
                span,
            ));
        }
        Ok(())
    }
}
