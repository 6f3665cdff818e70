//! The compiler: a linear builder that assembles an interpreted word from a
//! stream of word references.
//!
//! The IR is an arena of [`SourceWord`] records addressed by index, so
//! branch links are plain integers rather than pointers. Index 0 is a
//! reserved LOCALS slot, emitted only when locals exist; the last entry is
//! always a NOP placeholder standing for "the next instruction", which lets
//! forward branches be fixed before their target exists.

use std::sync::Arc;

use tails_core::{
    CompileError, CompileResult, Opcode, Param, Span, StackEffect, TypeSet, Value, Word,
    WordFlags, op_word, vocabulary,
};

use crate::asm::{Assembler, disassemble_word};
use crate::checker;

/// A stable reference to an instruction in the compiler's IR.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct InstrPos(pub(crate) usize);

/// One IR record: a word reference plus branch links and per-point state.
pub(crate) struct SourceWord {
    pub(crate) word: Arc<Word>,
    pub(crate) param: Param,
    pub(crate) branch_to: Option<usize>,
    pub(crate) is_branch_dest: bool,
    pub(crate) erased: bool,
    pub(crate) tail_call: bool,
    /// GETARG/SETARG offset already rewritten by the checker.
    pub(crate) adjusted: bool,
    pub(crate) pc: usize,
    /// Memoized checker state, for branch destinations.
    pub(crate) known: Option<checker::EffectStack>,
    pub(crate) span: Option<Span>,
}

impl SourceWord {
    fn new(word: Arc<Word>, param: Param, span: Option<Span>) -> Self {
        Self {
            word,
            param,
            branch_to: None,
            is_branch_dest: false,
            erased: false,
            tail_call: false,
            adjusted: false,
            pc: 0,
            known: None,
            span,
        }
    }

    fn placeholder() -> Self {
        Self::new(op_word(Opcode::Nop).clone(), Param::None, None)
    }

    pub(crate) fn op(&self) -> Option<Opcode> {
        self.word.opcode()
    }
}

/// Single-use builder: construct, add instructions, `finish()`.
pub struct Compiler {
    pub(crate) name: Option<String>,
    pub(crate) flags: WordFlags,
    pub(crate) words: Vec<SourceWord>,
    pub(crate) effect: StackEffect,
    pub(crate) can_add_inputs: bool,
    pub(crate) can_add_outputs: bool,
    locals: Vec<TypeSet>,
    uses_args: bool,
    control: Vec<(char, usize)>,
}

impl Compiler {
    pub fn new() -> Compiler {
        let mut locals_slot = SourceWord::new(
            op_word(Opcode::Locals).clone(),
            Param::Int(0),
            None,
        );
        locals_slot.erased = true;
        Compiler {
            name: None,
            flags: WordFlags::NONE,
            words: vec![locals_slot, SourceWord::placeholder()],
            effect: StackEffect::new(),
            can_add_inputs: true,
            can_add_outputs: true,
            locals: Vec::new(),
            uses_args: false,
            control: Vec::new(),
        }
    }

    pub fn named(name: impl Into<String>) -> Compiler {
        let mut compiler = Compiler::new();
        compiler.name = Some(name.into());
        compiler
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    /// Declares what the word's stack effect must be. With `can_add_inputs`,
    /// the checker may deepen the inputs; with `can_add_outputs`, extra
    /// values left on the stack extend the outputs.
    pub fn set_stack_effect(
        &mut self,
        effect: StackEffect,
        can_add_inputs: bool,
        can_add_outputs: bool,
    ) {
        self.effect = effect;
        self.can_add_inputs = can_add_inputs;
        self.can_add_outputs = can_add_outputs;
    }

    /// Sets the input effect from live stack values (bottom to top).
    /// The outputs are left open. Used by the REPL.
    pub fn set_input_stack(&mut self, values: &[Value]) {
        let mut effect = StackEffect::new();
        for value in values {
            effect.add_input(TypeSet::of(value.value_type()));
        }
        self.set_stack_effect(effect, false, true);
    }

    pub fn set_inline(&mut self) {
        self.flags = self.flags.with(WordFlags::INLINE);
    }

    /// Marks the word as keeping its arguments on the stack until RETURN,
    /// forcing DROPARGS cleanup. The Pratt parser uses this for named
    /// function parameters.
    pub fn preserve_args(&mut self) {
        self.uses_args = true;
    }

    pub fn effect(&self) -> &StackEffect {
        &self.effect
    }

    pub fn control_depth(&self) -> usize {
        self.control.len()
    }

    // The trailing placeholder's index: "the next instruction to be added".
    fn placeholder(&self) -> usize {
        self.words.len() - 1
    }

    fn push_instr(&mut self, word: Arc<Word>, param: Param, span: Option<Span>) -> InstrPos {
        let index = self.placeholder();
        let was_dest = self.words[index].is_branch_dest;
        self.words[index] = SourceWord::new(word, param, span);
        self.words[index].is_branch_dest = was_dest;
        self.words.push(SourceWord::placeholder());
        InstrPos(index)
    }

    /// Adds a call to a word. Inline words are expanded in place; magic
    /// words are rejected (they're for compiler emission only).
    pub fn add_word(&mut self, word: &Arc<Word>, span: Option<Span>) -> CompileResult<InstrPos> {
        if word.is_magic() {
            let err = CompileError::new(format!(
                "`{}` cannot be used in source code",
                word.name().unwrap_or("?")
            ));
            return Err(match span {
                Some(s) => err.with_span(s),
                None => err,
            });
        }
        if word.is_inline() {
            self.add_inline(word, span)
        } else {
            Ok(self.push_instr(word.clone(), Param::None, span))
        }
    }

    /// Low-level append of a word with an explicit parameter. No magic
    /// check; this is how parsers emit branches.
    pub fn add_instruction(
        &mut self,
        word: &Arc<Word>,
        param: Param,
        span: Option<Span>,
    ) -> InstrPos {
        self.push_instr(word.clone(), param, span)
    }

    /// Expands a word's body at the current position. Native words are
    /// added normally; interpreted words are walked via the disassembler,
    /// with internal branch targets re-linked into this IR.
    pub fn add_inline(&mut self, word: &Arc<Word>, span: Option<Span>) -> CompileResult<InstrPos> {
        if word.is_native() {
            return Ok(self.push_instr(word.clone(), Param::None, span));
        }
        let Some(code) = word.instrs() else {
            return Err(CompileError::new("interpreted word without a body"));
        };
        let refs = disassemble_word(code)?;
        let body_len = refs.len() - 1; // trailing RETURN is not inlined
        let start = self.placeholder();

        let mut added = Vec::with_capacity(body_len);
        let mut branches = Vec::new();
        for (index, word_ref) in refs.iter().take(body_len).enumerate() {
            let pos = self.push_instr(word_ref.word.clone(), word_ref.param.clone(), span);
            if matches!(
                word_ref.word.opcode(),
                Some(Opcode::Branch) | Some(Opcode::ZBranch)
            ) {
                if let Param::Int(offset) = word_ref.param {
                    branches.push((pos.0, index as i64 + 1 + offset as i64));
                }
            }
            added.push(pos.0);
        }
        // Re-link internal branches; a branch to the stripped RETURN becomes
        // a branch to whatever follows the inlined body.
        for (pos, target) in branches {
            if target < 0 || target as usize > body_len {
                return Err(CompileError::new("branch out of range in inlined word"));
            }
            let target_pos = if target as usize == body_len {
                self.placeholder()
            } else {
                added[target as usize]
            };
            self.words[pos].branch_to = Some(target_pos);
            self.words[pos].param = Param::Int(-1);
            self.words[target_pos].is_branch_dest = true;
        }
        Ok(InstrPos(start))
    }

    /// Adds an instruction pushing a literal value. Whole numbers that fit
    /// in 16 bits use the compact INT encoding.
    pub fn add_literal(&mut self, value: Value, span: Option<Span>) -> InstrPos {
        if let Value::Number(n) = value {
            if n.fract() == 0.0 && (-32768.0..=32767.0).contains(&n) {
                return self.push_instr(
                    op_word(Opcode::Int).clone(),
                    Param::Int(n as i32),
                    span,
                );
            }
        }
        self.push_instr(op_word(Opcode::Literal).clone(), Param::Val(value), span)
    }

    /// Reads a function argument (offset ≤ 0) or local (offset ≥ 1).
    pub fn add_get_arg(&mut self, offset: i32, span: Option<Span>) -> InstrPos {
        self.uses_args = true;
        self.push_instr(op_word(Opcode::GetArg).clone(), Param::Int(offset), span)
    }

    /// Writes a function argument or local from a popped value.
    pub fn add_set_arg(&mut self, offset: i32, span: Option<Span>) -> InstrPos {
        self.push_instr(op_word(Opcode::SetArg).clone(), Param::Int(offset), span)
    }

    /// Allocates a local variable slot, updating the leading LOCALS
    /// instruction. Returns the (1-based) slot offset.
    pub fn reserve_local(&mut self, types: TypeSet) -> i32 {
        self.locals.push(types);
        let offset = self.locals.len() as i32;
        self.words[0].erased = false;
        self.words[0].param = Param::Int(offset);
        offset
    }

    /// Adds a recursive call to the word being compiled.
    pub fn add_recurse(&mut self, span: Option<Span>) -> InstrPos {
        let pos = self.push_instr(op_word(Opcode::Recurse).clone(), Param::Int(-1), span);
        self.words[pos.0].branch_to = Some(0);
        self.words[0].is_branch_dest = true;
        pos
    }

    /// Adds an unconditional branch back to an earlier position.
    pub fn add_branch_back_to(&mut self, pos: InstrPos) {
        let branch = self.push_instr(op_word(Opcode::Branch).clone(), Param::Int(-1), None);
        self.words[branch.0].branch_to = Some(pos.0);
        self.words[pos.0].is_branch_dest = true;
    }

    /// Adds a branch instruction (unless `branch` is None) and pushes its
    /// position onto the control stack under `tag`. With None, the recorded
    /// position is the next instruction to be added.
    pub fn push_branch(&mut self, tag: char, branch: Option<Opcode>) -> InstrPos {
        let pos = match branch {
            Some(op) => self.push_instr(op_word(op).clone(), Param::Int(-1), None),
            None => InstrPos(self.placeholder()),
        };
        self.control.push((tag, pos.0));
        pos
    }

    /// Pops the control stack; the popped tag must be one of `allowed`.
    pub fn pop_branch(&mut self, allowed: &str) -> CompileResult<InstrPos> {
        if let Some(&(tag, pos)) = self.control.last() {
            if allowed.contains(tag) {
                self.control.pop();
                return Ok(InstrPos(pos));
            }
        }
        Err(CompileError::new("no matching IF or BEGIN"))
    }

    /// Retargets an earlier BRANCH/ZBRANCH at the next instruction to be
    /// added, creating a forward branch.
    pub fn fix_branch(&mut self, src: InstrPos) {
        let target = self.placeholder();
        self.words[src.0].branch_to = Some(target);
        self.words[target].is_branch_dest = true;
    }

    // True if `index` is a RETURN, or a BRANCH chain ending in one.
    pub(crate) fn returns_immediately(&self, index: usize) -> bool {
        let mut index = index;
        let mut hops = 0;
        loop {
            let Some(sw) = self.words.get(index) else {
                return false;
            };
            match sw.op() {
                Some(Opcode::Return) => return true,
                Some(Opcode::Branch) => match sw.branch_to {
                    Some(target) if hops <= self.words.len() => {
                        hops += 1;
                        index = target;
                    }
                    _ => return false,
                },
                _ => return false,
            }
        }
    }

    // First non-erased index after `index`.
    pub(crate) fn next_active(&self, index: usize) -> usize {
        let mut next = index + 1;
        while next < self.words.len() && self.words[next].erased {
            next += 1;
        }
        next
    }

    /// Finishes the word: validates, checks the stack effect, optimizes,
    /// assembles, and registers it in the current vocabulary if named.
    pub fn finish(mut self) -> CompileResult<Arc<Word>> {
        if !self.control.is_empty() {
            return Err(CompileError::new(
                "unfinished IF-ELSE-THEN or BEGIN-WHILE-REPEAT",
            ));
        }

        // Words that keep their args or have locals clean up before RETURN.
        if self.uses_args || !self.locals.is_empty() {
            let count = self.effect.input_count() + self.locals.len();
            if count > 0 {
                self.push_instr(
                    op_word(Opcode::DropArgs).clone(),
                    Param::Drop {
                        locals: count as u8,
                        results: self.effect.output_count() as u8,
                    },
                    None,
                );
            }
        }

        // Replace the trailing placeholder with RETURN.
        let end = self.placeholder();
        debug_assert_eq!(self.words[end].op(), Some(Opcode::Nop));
        let was_dest = self.words[end].is_branch_dest;
        self.words[end] = SourceWord::new(op_word(Opcode::Return).clone(), Param::None, None);
        self.words[end].is_branch_dest = was_dest;

        // Compute the stack effect and do the type checking.
        checker::compute_effect(&mut self)?;

        // First pass: erase unreachable instructions, convert tail
        // recursion, collapse branch chains, and assign pc offsets.
        let mut after_branch = false;
        let mut pc = 0usize;
        for i in 0..self.words.len() {
            if self.words[i].erased {
                self.words[i].pc = pc;
                continue;
            }
            if after_branch && !self.words[i].is_branch_dest {
                self.words[i].erased = true;
                self.words[i].pc = pc;
                continue;
            }
            if self.words[i].op() == Some(Opcode::Recurse) {
                if self.returns_immediately(self.next_active(i)) {
                    self.words[i].word = op_word(Opcode::Branch).clone();
                } else {
                    self.flags = self.flags.with(WordFlags::RECURSIVE);
                }
            }
            if let Some(mut target) = self.words[i].branch_to {
                let mut hops = 0;
                while self.words[target].op() == Some(Opcode::Branch) && hops <= self.words.len()
                {
                    match self.words[target].branch_to {
                        Some(next) => target = next,
                        None => break,
                    }
                    hops += 1;
                }
                self.words[i].branch_to = Some(target);
            }
            if !self.words[i].word.is_native() && self.returns_immediately(self.next_active(i)) {
                self.words[i].tail_call = true;
            }
            self.words[i].pc = pc;
            pc += 1;
            after_branch = self.words[i].op() == Some(Opcode::Branch);
        }

        // Second pass: emit, resolving branch targets to relative offsets.
        let mut asm = Assembler::new();
        for i in 0..self.words.len() {
            let sw = &self.words[i];
            if sw.erased {
                continue;
            }
            let param = match sw.branch_to {
                Some(target) => {
                    Param::Int(self.words[target].pc as i32 - sw.pc as i32 - 1)
                }
                None => sw.param.clone(),
            };
            asm.add(&sw.word, param, sw.tail_call);
        }

        let word = Arc::new(Word::compiled(
            self.name.clone(),
            self.effect.clone(),
            self.flags,
            asm.finish(),
        ));
        if word.name().is_some() {
            vocabulary::active_mut().define(word.clone());
        }
        Ok(word)
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}
