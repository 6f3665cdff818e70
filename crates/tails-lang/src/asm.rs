//! Assembling word references into flat code, and back.

use std::sync::Arc;

use tails_core::{CompileError, CompileResult, Instr, Opcode, Param, Word, WordBody, op_word};

/// A reference to a word plus its instruction parameter, if any.
/// The unit the assembler consumes and the disassembler produces.
#[derive(Clone, Debug)]
pub struct WordRef {
    pub word: Arc<Word>,
    pub param: Param,
}

impl WordRef {
    pub fn new(word: Arc<Word>) -> Self {
        Self {
            word,
            param: Param::None,
        }
    }

    pub fn with_param(word: Arc<Word>, param: Param) -> Self {
        Self { word, param }
    }
}

impl PartialEq for WordRef {
    fn eq(&self, other: &Self) -> bool {
        *self.word == *other.word && self.param == other.param
    }
}

/// Packs `(word, param)` pairs into a flat instruction vector.
/// Interpreted words become INTERP (or TAILINTERP) carrying the callee.
#[derive(Default)]
pub struct Assembler {
    instrs: Vec<Instr>,
}

impl Assembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn code_size(&self) -> usize {
        self.instrs.len()
    }

    pub fn add(&mut self, word: &Arc<Word>, param: Param, tail: bool) {
        match word.body() {
            WordBody::Native(op) => self.instrs.push(Instr {
                opcode: *op,
                param,
            }),
            WordBody::Compiled(_) => self.instrs.push(Instr {
                opcode: if tail {
                    Opcode::TailInterp
                } else {
                    Opcode::Interp
                },
                param: Param::Word(word.clone()),
            }),
        }
    }

    pub fn add_ref(&mut self, word_ref: &WordRef) {
        self.add(&word_ref.word, word_ref.param.clone(), false);
    }

    pub fn finish(self) -> Vec<Instr> {
        self.instrs
    }
}

/// Assembles a sequence of word references.
pub fn assemble(refs: &[WordRef]) -> Vec<Instr> {
    let mut asm = Assembler::new();
    for word_ref in refs {
        asm.add_ref(word_ref);
    }
    asm.finish()
}

/// Walks flat code, resolving each instruction back to a word reference.
pub struct Disassembler<'a> {
    code: &'a [Instr],
    pos: usize,
}

impl<'a> Disassembler<'a> {
    pub fn new(code: &'a [Instr]) -> Self {
        Self { code, pos: 0 }
    }

    /// Index of the next instruction to be read.
    pub fn offset(&self) -> usize {
        self.pos
    }

    pub fn next(&mut self) -> CompileResult<WordRef> {
        let Some(instr) = self.code.get(self.pos) else {
            return Err(CompileError::new("ran off the end of compiled code"));
        };
        self.pos += 1;
        match instr.opcode {
            Opcode::Interp | Opcode::TailInterp => match &instr.param {
                Param::Word(word) => Ok(WordRef::new(word.clone())),
                _ => Err(CompileError::new("interpreted call without a word parameter")),
            },
            op => Ok(WordRef::with_param(op_word(op).clone(), instr.param.clone())),
        }
    }
}

/// Disassembles a whole word body: stops at the first RETURN not jumped over
/// by an earlier branch. The result includes the trailing RETURN.
pub fn disassemble_word(code: &[Instr]) -> CompileResult<Vec<WordRef>> {
    let mut refs = Vec::new();
    let mut dis = Disassembler::new(code);
    let mut max_target = 0usize;
    loop {
        let index = dis.offset();
        let word_ref = dis.next()?;
        let op = word_ref.word.opcode();
        if matches!(
            op,
            Some(Opcode::Branch) | Some(Opcode::ZBranch) | Some(Opcode::Recurse)
        ) {
            if let Param::Int(offset) = word_ref.param {
                let target = index as i64 + 1 + offset as i64;
                if target >= 0 {
                    max_target = max_target.max(target as usize);
                }
            }
        }
        let is_return = op == Some(Opcode::Return);
        refs.push(word_ref);
        if is_return && index >= max_target {
            return Ok(refs);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tails_core::{StackEffect, Value, WordFlags};

    fn native_ref(op: Opcode) -> WordRef {
        WordRef::new(op_word(op).clone())
    }

    #[test]
    fn round_trip_simple() {
        let refs = vec![
            WordRef::with_param(
                op_word(Opcode::Int).clone(),
                Param::Int(3),
            ),
            WordRef::with_param(
                op_word(Opcode::Literal).clone(),
                Param::Val(Value::string("hi")),
            ),
            native_ref(Opcode::Dup),
            native_ref(Opcode::Plus),
            native_ref(Opcode::Return),
        ];
        let code = assemble(&refs);
        assert_eq!(code.len(), refs.len());
        assert_eq!(disassemble_word(&code).unwrap(), refs);
    }

    #[test]
    fn round_trip_interpreted_call() {
        let callee = Arc::new(Word::compiled(
            None,
            StackEffect::parse("--").unwrap(),
            WordFlags::NONE,
            vec![Instr::new(Opcode::Return)],
        ));
        let refs = vec![WordRef::new(callee), native_ref(Opcode::Return)];
        let code = assemble(&refs);
        assert_eq!(code[0].opcode, Opcode::Interp);
        assert_eq!(disassemble_word(&code).unwrap(), refs);
    }

    #[test]
    fn round_trip_with_branches() {
        let refs = vec![
            WordRef::with_param(op_word(Opcode::ZBranch).clone(), Param::Int(2)),
            native_ref(Opcode::One),
            WordRef::with_param(op_word(Opcode::Branch).clone(), Param::Int(1)),
            native_ref(Opcode::Zero),
            native_ref(Opcode::Return),
        ];
        let code = assemble(&refs);
        assert_eq!(disassemble_word(&code).unwrap(), refs);
    }

    #[test]
    fn stops_at_final_return_only() {
        // A branch jumps over a RETURN; disassembly must not stop there.
        let refs = vec![
            WordRef::with_param(op_word(Opcode::ZBranch).clone(), Param::Int(1)),
            native_ref(Opcode::Return),
            native_ref(Opcode::Nop),
            native_ref(Opcode::Return),
        ];
        let code = assemble(&refs);
        let out = disassemble_word(&code).unwrap();
        assert_eq!(out.len(), 4);
    }

    #[test]
    fn tail_calls_disassemble_to_the_callee() {
        let callee = Arc::new(Word::compiled(
            None,
            StackEffect::parse("--").unwrap(),
            WordFlags::NONE,
            vec![Instr::new(Opcode::Return)],
        ));
        let mut asm = Assembler::new();
        asm.add(&callee, Param::None, true);
        asm.add(op_word(Opcode::Return), Param::None, false);
        let code = asm.finish();
        assert_eq!(code[0].opcode, Opcode::TailInterp);
        let refs = disassemble_word(&code).unwrap();
        assert_eq!(*refs[0].word, *callee);
    }
}
