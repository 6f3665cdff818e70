//! Core types for the Tails language.
//!
//! This crate provides the foundational types shared by the compiler and the
//! interpreter:
//! - source spans and positions
//! - runtime values and type sets
//! - stack effects and their textual form
//! - the word model and the opcode registry
//! - vocabularies and the global scope stack
//! - the compile-error type

pub mod effect;
pub mod error;
pub mod instr;
pub mod opcode;
pub mod span;
pub mod types;
pub mod value;
pub mod vocabulary;
pub mod word;

// Re-export commonly used types at crate root
pub use effect::{EffectParser, StackEffect, UNKNOWN_MAX};
pub use error::{CompileError, CompileResult};
pub use instr::{Instr, Param};
pub use opcode::{Opcode, all_op_words, op_word};
pub use span::{Pos, Span};
pub use types::{TypeSet, ValueType};
pub use value::{Value, ValueError};
pub use vocabulary::{Vocabulary, VocabularyStack};
pub use word::{ParamKind, Word, WordBody, WordFlags};
