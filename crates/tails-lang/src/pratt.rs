//! A top-down operator-precedence (Pratt) parser.
//!
//! The grammar is data, not code: a [`Symbol`] records how a token parses in
//! prefix, infix, and postfix position, with binding priorities and optional
//! custom handlers. Most symbol-specific behavior lives in the symbol table;
//! the parser itself is the small priority-driven loop in
//! [`Parser::next_expression`].

use std::collections::HashMap;
use std::sync::Arc;

use smallvec::smallvec;

use tails_core::{
    CompileError, CompileResult, EffectParser, Opcode, Span, StackEffect, TypeSet, Value, Word,
    op_word,
};

use crate::compiler::Compiler;
use crate::grammar::grammar;
use crate::tokenizer::{Token, TokenKind, Tokenizer};

/// Binding priority of an operator. Higher binds tighter.
pub type Priority = i32;

/// A named function parameter or local variable: its types and its slot
/// offset (≤ 0 for parameters, ≥ 1 for locals).
#[derive(Copy, Clone, Debug)]
pub struct FnParam {
    pub types: TypeSet,
    pub offset: i32,
}

pub type PrefixFn = fn(&mut Parser) -> CompileResult<StackEffect>;
pub type InfixFn = fn(&StackEffect, &mut Parser) -> CompileResult<StackEffect>;

#[derive(Clone, Debug)]
enum SymbolValue {
    None,
    Word(Arc<Word>),
    Literal(Value),
    Param(FnParam),
}

/// A grammar symbol: how one token parses.
#[derive(Clone, Debug)]
pub struct Symbol {
    token: String,
    value: SymbolValue,
    prefix_priority: Option<Priority>,
    left_priority: Option<Priority>,
    right_priority: Option<Priority>,
    postfix_priority: Option<Priority>,
    custom_prefix: Option<PrefixFn>,
    custom_infix: Option<InfixFn>,
    custom_postfix: Option<InfixFn>,
}

impl Symbol {
    /// A bare token with no parse behavior of its own (`)`, `else:`).
    pub fn token(text: &str) -> Symbol {
        Symbol {
            token: text.to_string(),
            value: SymbolValue::None,
            prefix_priority: None,
            left_priority: None,
            right_priority: None,
            postfix_priority: None,
            custom_prefix: None,
            custom_infix: None,
            custom_postfix: None,
        }
    }

    /// A token whose default handlers compile a call to `word`.
    pub fn word(text: &str, word: Arc<Word>) -> Symbol {
        let mut symbol = Symbol::token(text);
        symbol.value = SymbolValue::Word(word);
        symbol
    }

    /// A token that compiles to pushing a constant.
    pub fn literal(text: &str, value: Value) -> Symbol {
        let mut symbol = Symbol::token(text);
        symbol.value = SymbolValue::Literal(value);
        symbol
    }

    /// A function parameter or local variable name.
    pub fn param(text: &str, param: FnParam) -> Symbol {
        let mut symbol = Symbol::token(text);
        symbol.value = SymbolValue::Param(param);
        symbol.prefix_priority = Some(99);
        symbol
    }

    pub fn make_prefix(mut self, priority: Priority) -> Symbol {
        self.prefix_priority = Some(priority);
        self
    }

    pub fn make_prefix_fn(mut self, priority: Priority, handler: PrefixFn) -> Symbol {
        self.prefix_priority = Some(priority);
        self.custom_prefix = Some(handler);
        self
    }

    pub fn make_infix(mut self, left: Priority, right: Priority) -> Symbol {
        self.left_priority = Some(left);
        self.right_priority = Some(right);
        self
    }

    pub fn make_infix_fn(mut self, left: Priority, right: Priority, handler: InfixFn) -> Symbol {
        self.custom_infix = Some(handler);
        self.make_infix(left, right)
    }

    pub fn make_postfix(mut self, priority: Priority) -> Symbol {
        self.postfix_priority = Some(priority);
        self
    }

    pub fn make_postfix_fn(mut self, priority: Priority, handler: InfixFn) -> Symbol {
        self.custom_postfix = Some(handler);
        self.make_postfix(priority)
    }

    pub fn name(&self) -> &str {
        &self.token
    }

    pub fn is_prefix(&self) -> bool {
        self.prefix_priority.is_some()
    }

    pub fn is_infix(&self) -> bool {
        self.left_priority.is_some()
    }

    pub fn is_postfix(&self) -> bool {
        self.postfix_priority.is_some()
    }
}

/// A dictionary of symbols, optionally inheriting from a parent table.
/// Lookup is case-insensitive.
#[derive(Default)]
pub struct SymbolTable {
    parent: Option<&'static SymbolTable>,
    symbols: HashMap<String, Symbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parent(parent: &'static SymbolTable) -> Self {
        Self {
            parent: Some(parent),
            symbols: HashMap::new(),
        }
    }

    pub fn add(&mut self, symbol: Symbol) {
        self.symbols.insert(symbol.token.to_uppercase(), symbol);
    }

    pub fn get(&self, token: &str) -> Option<&Symbol> {
        let key = token.to_uppercase();
        match self.symbols.get(&key) {
            Some(symbol) => Some(symbol),
            None => self.parent.and_then(|p| p.get(token)),
        }
    }

    pub fn has(&self, token: &str) -> bool {
        self.get(token).is_some()
    }

    /// True if this table itself defines the token; does not consult parent.
    pub fn itself_has(&self, token: &str) -> bool {
        self.symbols.contains_key(&token.to_uppercase())
    }
}

/// The expression parser. Single-use: construct per source string.
pub struct Parser<'s> {
    symbols: SymbolTable,
    tokens: Tokenizer<'s>,
    compiler: Compiler,
    effect: StackEffect,
    declared: bool,
}

impl<'s> Parser<'s> {
    pub fn new(source: &'s str) -> Parser<'s> {
        Parser {
            symbols: SymbolTable::with_parent(grammar()),
            tokens: Tokenizer::with_symbols(source, grammar()),
            compiler: Compiler::new(),
            effect: StackEffect::new(),
            declared: false,
        }
    }

    /// Parses a complete top-level expression, with an optional leading
    /// `( inputs -- outputs )` parameter header, and compiles it.
    pub fn parse(source: &str) -> CompileResult<Arc<Word>> {
        Parser::new(source).run()
    }

    fn run(mut self) -> CompileResult<Arc<Word>> {
        if self.if_token("(")? {
            self.parse_parameter_header()?;
        }
        let expr = self.next_expression(Priority::MIN)?;
        if !self.tokens.at_end()? {
            let span = self.tokens.peek()?.span;
            return Err(CompileError::at("expected input to end here", span));
        }
        if !self.declared {
            self.compiler.set_stack_effect(expr, false, true);
        }
        self.compiler.finish()
    }

    // `( a# b -- c )`: named inputs become parameter symbols with stack
    // offsets 0, -1, ... counting down from the top of the stack.
    fn parse_parameter_header(&mut self) -> CompileResult<()> {
        let Some(header) = self.tokens.skip_through(')') else {
            return Err(CompileError::new("missing ')' to end parameter list"));
        };
        let parsed = EffectParser::parse(header)?;
        for (slot, name) in parsed.input_names.iter().enumerate() {
            if name.is_empty() {
                return Err(CompileError::new("unnamed parameter"));
            }
            let types = parsed.effect.inputs()[slot];
            self.symbols.add(Symbol::param(
                name,
                FnParam {
                    types,
                    offset: -(slot as i32),
                },
            ));
        }
        self.effect = parsed.effect.clone();
        let infer_outputs = parsed.effect.output_count() == 0;
        self.compiler
            .set_stack_effect(parsed.effect, false, infer_outputs);
        self.compiler.preserve_args();
        self.declared = true;
        Ok(())
    }

    /// The core Pratt loop: parses and compiles an expression until an
    /// operator binds looser than `min_priority`.
    pub fn next_expression(&mut self, min_priority: Priority) -> CompileResult<StackEffect> {
        let first = self.tokens.next()?;
        let mut lhs = match first.kind {
            TokenKind::End => {
                return Err(CompileError::at("unexpected end of input", first.span));
            }
            TokenKind::Number => self.compile_literal(Value::number(first.number), first.span)?,
            TokenKind::Str => {
                self.compile_literal(Value::string(first.string.clone()), first.span)?
            }
            TokenKind::Identifier | TokenKind::Operator => {
                let Some(symbol) = self.symbols.get(&first.text).cloned() else {
                    return Err(CompileError::at(
                        format!("unknown symbol \"{}\"", first.text),
                        first.span,
                    ));
                };
                match &symbol.value {
                    SymbolValue::Literal(value) => {
                        self.compile_literal(value.clone(), first.span)?
                    }
                    SymbolValue::Param(param) => self.parse_param(*param, first.span)?,
                    _ if symbol.is_prefix() => self.parse_prefix(&symbol, first.span)?,
                    _ => {
                        return Err(CompileError::at(
                            format!("{} cannot begin an expression", symbol.token),
                            first.span,
                        ));
                    }
                }
            }
        };

        loop {
            let peeked = self.tokens.peek()?.clone();
            match peeked.kind {
                TokenKind::End => break,
                TokenKind::Number | TokenKind::Str => {
                    return Err(CompileError::at("expected an operator", peeked.span));
                }
                _ => {}
            }
            let Some(symbol) = self.symbols.get(&peeked.text).cloned() else {
                return Err(CompileError::at(
                    format!("unknown symbol \"{}\"", peeked.text),
                    peeked.span,
                ));
            };
            if let Some(priority) = symbol.postfix_priority {
                if priority < min_priority {
                    break;
                }
                self.tokens.next()?;
                lhs = self.parse_postfix(&lhs, &symbol, peeked.span)?;
            } else if let Some(priority) = symbol.left_priority {
                if priority < min_priority {
                    break;
                }
                self.tokens.next()?;
                lhs = self.parse_infix(&lhs, &symbol, peeked.span)?;
            } else {
                break;
            }
        }
        Ok(lhs)
    }

    fn parse_prefix(&mut self, symbol: &Symbol, span: Span) -> CompileResult<StackEffect> {
        if let Some(handler) = symbol.custom_prefix {
            return handler(self);
        }
        let Some(priority) = symbol.prefix_priority else {
            return Err(CompileError::at(
                format!("{} cannot begin an expression", symbol.token),
                span,
            ));
        };
        let lhs = self.next_expression(priority)?;
        let SymbolValue::Word(word) = &symbol.value else {
            return Err(CompileError::at(
                format!("{} cannot begin an expression", symbol.token),
                span,
            ));
        };
        self.compile_call(&word.clone(), span)?;
        let Some(effect) = word.effect() else {
            return Err(CompileError::at("word has no known stack effect", span));
        };
        lhs.then(effect).map_err(|e| e.with_span(span))
    }

    fn parse_infix(
        &mut self,
        lhs: &StackEffect,
        symbol: &Symbol,
        span: Span,
    ) -> CompileResult<StackEffect> {
        if let Some(handler) = symbol.custom_infix {
            return handler(lhs, self);
        }
        let Some(right) = symbol.right_priority else {
            return Err(CompileError::at(
                format!("'{}' is not allowed here", symbol.token),
                span,
            ));
        };
        let rhs = self.next_expression(right)?;
        let inputs = lhs.then(&rhs).map_err(|e| e.with_span(span))?;
        let SymbolValue::Word(word) = &symbol.value else {
            return Err(CompileError::at(
                format!("'{}' is not allowed here", symbol.token),
                span,
            ));
        };
        self.compile_call(&word.clone(), span)?;
        let Some(effect) = word.effect() else {
            return Err(CompileError::at("word has no known stack effect", span));
        };
        inputs.then(effect).map_err(|e| e.with_span(span))
    }

    fn parse_postfix(
        &mut self,
        lhs: &StackEffect,
        symbol: &Symbol,
        span: Span,
    ) -> CompileResult<StackEffect> {
        if let Some(handler) = symbol.custom_postfix {
            return handler(lhs, self);
        }
        let SymbolValue::Word(word) = &symbol.value else {
            return Err(CompileError::at(
                format!("'{}' is not allowed here", symbol.token),
                span,
            ));
        };
        self.compile_call(&word.clone(), span)?;
        let Some(effect) = word.effect() else {
            return Err(CompileError::at("word has no known stack effect", span));
        };
        lhs.then(effect).map_err(|e| e.with_span(span))
    }

    // A parameter name compiles to GETARG, or to SETARG when followed by `:=`.
    fn parse_param(&mut self, param: FnParam, span: Span) -> CompileResult<StackEffect> {
        if self.if_token(":=")? {
            let rhs = self.next_expression(10)?;
            if rhs.input_count() != 0 || rhs.output_count() != 1 {
                return Err(CompileError::at("no value to assign", span));
            }
            self.compiler.add_set_arg(param.offset, Some(span));
            Ok(StackEffect::new())
        } else {
            self.compiler.add_get_arg(param.offset, Some(span));
            Ok(StackEffect::from_parts(smallvec![], smallvec![param.types]))
        }
    }

    pub fn compile_literal(&mut self, value: Value, span: Span) -> CompileResult<StackEffect> {
        let types = TypeSet::of(value.value_type());
        self.compiler.add_literal(value, Some(span));
        Ok(StackEffect::from_parts(smallvec![], smallvec![types]))
    }

    /// Compiles a call to a word.
    pub fn compile_call(&mut self, word: &Arc<Word>, span: Span) -> CompileResult<()> {
        self.compiler.add_word(word, Some(span))?;
        Ok(())
    }

    /// Compiles a call to a core word by opcode.
    pub fn compile_op(&mut self, op: Opcode, span: Span) -> CompileResult<()> {
        self.compile_call(&op_word(op).clone(), span)
    }

    /// Consumes the next token and returns true if its text matches.
    pub fn if_token(&mut self, text: &str) -> CompileResult<bool> {
        if self.tokens.peek()?.text != text {
            return Ok(false);
        }
        self.tokens.next()?;
        Ok(true)
    }

    /// Consumes the next token if its text matches; else fails.
    pub fn require_token(&mut self, text: &str) -> CompileResult<()> {
        let token = self.tokens.peek()?;
        if token.text == text {
            self.tokens.next()?;
            Ok(())
        } else {
            let span = token.span;
            Err(CompileError::at(format!("expected \"{}\"", text), span))
        }
    }

    pub fn next_token(&mut self) -> CompileResult<Token> {
        self.tokens.next()
    }

    pub fn at_end(&mut self) -> CompileResult<bool> {
        self.tokens.at_end()
    }

    pub fn here(&self) -> Span {
        self.tokens.here()
    }

    pub fn compiler(&mut self) -> &mut Compiler {
        &mut self.compiler
    }

    pub fn symbols(&mut self) -> &mut SymbolTable {
        &mut self.symbols
    }

    pub fn declared_effect(&self) -> &StackEffect {
        &self.effect
    }
}
