//! The opcode universe and the primitive-word registry.
//!
//! `define_opcodes!` is the single source of truth: each entry carries the
//! opcode, its source name, its textual stack effect ("" when the effect
//! depends on the instruction parameter and is special-cased by the
//! checker), and its flags. The `Opcode` enum, the primitive `Word` table,
//! and the core vocabulary are all derived from this list.

use std::sync::{Arc, OnceLock};

use smallvec::smallvec;

use crate::effect::StackEffect;
use crate::types::TypeSet;
use crate::word::{Word, WordFlags};

macro_rules! define_opcodes {
    ( $( $variant:ident => $name:literal, $effect:literal, [ $($flag:ident),* ] ; )* ) => {
        /// Native opcodes, in their stable enumeration order.
        #[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
        #[repr(u8)]
        pub enum Opcode {
            $( $variant, )*
        }

        impl Opcode {
            /// Every opcode, in enumeration order.
            pub const ALL: &'static [Opcode] = &[ $( Opcode::$variant, )* ];

            /// The source-level name of the word implementing this opcode.
            pub fn name(self) -> &'static str {
                match self {
                    $( Opcode::$variant => $name, )*
                }
            }

            fn effect_text(self) -> &'static str {
                match self {
                    $( Opcode::$variant => $effect, )*
                }
            }

            fn word_flags(self) -> WordFlags {
                match self {
                    $( Opcode::$variant => WordFlags::NONE $( .with(WordFlags::$flag) )*, )*
                }
            }
        }
    };
}

define_opcodes! {
    Interp     => "_INTERP",     "",                     [MAGIC, WORD_PARAM];
    TailInterp => "_TAILINTERP", "",                     [MAGIC, WORD_PARAM];
    Literal    => "_LITERAL",    "-- x",                 [MAGIC, VAL_PARAM];
    Int        => "_INT",        "-- #",                 [MAGIC, INT_PARAM];
    Return     => "_RETURN",     "--",                   [MAGIC];
    Branch     => "BRANCH",      "--",                   [MAGIC, INT_PARAM];
    ZBranch    => "0BRANCH",     "x --",                 [MAGIC, INT_PARAM];
    Nop        => "NOP",         "--",                   [];
    Recurse    => "_RECURSE",    "",                     [MAGIC, INT_PARAM];
    Drop       => "DROP",        "x --",                 [];
    Dup        => "DUP",         "a -- a a",             [];
    Over       => "OVER",        "a b -- a b a",         [];
    Rot        => "ROT",         "a b c -- b c a",       [];
    RotN       => "ROTN",        "",                     [MAGIC, INT_PARAM];
    Swap       => "SWAP",        "a b -- b a",           [];
    Zero       => "0",           "-- #",                 [];
    One        => "1",           "-- #",                 [];
    Eq         => "=",           "a b -- #",             [];
    Ne         => "<>",          "a b -- #",             [];
    EqZero     => "0=",          "x -- #",               [];
    NeZero     => "0<>",         "x -- #",               [];
    Ge         => ">=",          "a b -- #",             [];
    Gt         => ">",           "a b -- #",             [];
    GtZero     => "0>",          "x -- #",               [];
    Le         => "<=",          "a b -- #",             [];
    Lt         => "<",           "a b -- #",             [];
    LtZero     => "0<",          "x -- #",               [];
    Abs        => "ABS",         "# -- #",               [];
    Max        => "MAX",         "a b -- a",             [];
    Min        => "MIN",         "a b -- a",             [];
    Div        => "/",           "a# b# -- #",           [];
    Mod        => "MOD",         "a# b# -- #",           [];
    Minus      => "-",           "a# b# -- #",           [];
    Mult       => "*",           "a# b# -- #",           [];
    Plus       => "+",           "a#$[] b#$[] -- b",     [];
    Call       => "CALL",        "",                     [MAGIC];
    Null       => "NULL",        "",                     [];
    Length     => "LENGTH",      "x$[]{} -- #",          [];
    IfElse     => "IFELSE",      "",                     [];
    Define     => "DEFINE",      "?q s$ --",             [];
    GetArg     => "_GETARG",     "",                     [MAGIC, INT_PARAM];
    SetArg     => "_SETARG",     "",                     [MAGIC, INT_PARAM];
    Locals     => "_LOCALS",     "",                     [MAGIC, INT_PARAM];
    DropArgs   => "_DROPARGS",   "",                     [MAGIC, INT_PARAM];
    Print      => ".",           "x --",                 [];
    Sp         => "SP.",         "--",                   [];
    Nl         => "NL.",         "--",                   [];
    Nlq        => "NL?",         "--",                   [];
}

fn build_words() -> Vec<Arc<Word>> {
    Opcode::ALL
        .iter()
        .map(|&op| {
            let effect = if op == Opcode::Null {
                // The textual form cannot express a null-only slot.
                Some(StackEffect::from_parts(
                    smallvec![],
                    smallvec![TypeSet::null_only()],
                ))
            } else {
                match op.effect_text() {
                    "" => None,
                    text => match StackEffect::parse(text) {
                        Ok(effect) => Some(effect),
                        Err(err) => panic!("bad builtin effect for {:?}: {}", op, err),
                    },
                }
            };
            Arc::new(Word::native(op.name(), op, effect, op.word_flags()))
        })
        .collect()
}

fn words() -> &'static [Arc<Word>] {
    static WORDS: OnceLock<Vec<Arc<Word>>> = OnceLock::new();
    WORDS.get_or_init(build_words)
}

/// The primitive `Word` implementing an opcode.
pub fn op_word(op: Opcode) -> &'static Arc<Word> {
    &words()[op as usize]
}

/// All primitive words, in opcode order.
pub fn all_op_words() -> &'static [Arc<Word>] {
    words()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ValueType;

    #[test]
    fn table_is_consistent() {
        for (i, &op) in Opcode::ALL.iter().enumerate() {
            assert_eq!(op as usize, i);
            let word = op_word(op);
            assert_eq!(word.opcode(), Some(op));
            assert_eq!(word.name(), Some(op.name().to_uppercase().as_str()));
        }
    }

    #[test]
    fn polymorphic_effects_preserve_inputs() {
        let dup = op_word(Opcode::Dup).effect().unwrap();
        assert_eq!(dup.input_count(), 1);
        assert_eq!(dup.output_count(), 2);
        assert_eq!(dup.outputs()[0].input_match(), Some(0));
        assert_eq!(dup.outputs()[1].input_match(), Some(0));

        let swap = op_word(Opcode::Swap).effect().unwrap();
        assert_eq!(swap.outputs()[0].input_match(), Some(1));
        assert_eq!(swap.outputs()[1].input_match(), Some(0));

        let rot = op_word(Opcode::Rot).effect().unwrap();
        assert_eq!(rot.outputs()[0].input_match(), Some(2));
    }

    #[test]
    fn magic_words_are_flagged() {
        assert!(op_word(Opcode::Branch).is_magic());
        assert!(op_word(Opcode::Literal).is_magic());
        assert!(op_word(Opcode::Call).is_magic());
        assert!(!op_word(Opcode::Dup).is_magic());
        assert!(!op_word(Opcode::IfElse).is_magic());
    }

    #[test]
    fn weird_effects_are_absent() {
        assert!(op_word(Opcode::Interp).effect().is_none());
        assert!(op_word(Opcode::GetArg).effect().is_none());
        assert!(op_word(Opcode::IfElse).effect().is_none());
        assert!(op_word(Opcode::Return).effect().is_some());
    }

    #[test]
    fn null_pushes_exactly_null() {
        let null = op_word(Opcode::Null).effect().unwrap();
        assert_eq!(null.output_count(), 1);
        assert!(null.outputs()[0].can_be(ValueType::Null));
        assert!(!null.outputs()[0].can_be(ValueType::Number));
    }

    #[test]
    fn plus_accepts_strings_and_arrays() {
        let plus = op_word(Opcode::Plus).effect().unwrap();
        assert!(plus.inputs()[0].can_be(ValueType::Number));
        assert!(plus.inputs()[0].can_be(ValueType::String));
        assert!(plus.inputs()[0].can_be(ValueType::Array));
        assert!(!plus.inputs()[0].can_be(ValueType::Quote));
        assert_eq!(plus.outputs()[0].input_match(), Some(0));
    }
}
