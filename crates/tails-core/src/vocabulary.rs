//! Name → word lookup tables and the global scope stack.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::opcode::{Opcode, all_op_words};
use crate::word::Word;

/// A lookup table from (case-folded) word names to word descriptors.
#[derive(Clone, Debug, Default)]
pub struct Vocabulary {
    words: HashMap<String, Arc<Word>>,
}

impl Vocabulary {
    pub fn new() -> Self {
        Self::default()
    }

    /// The vocabulary of core words, derived from the opcode registry.
    pub fn core() -> Self {
        let mut vocab = Vocabulary::new();
        for word in all_op_words() {
            vocab.add(word.clone());
        }
        vocab
    }

    /// Registers a word under its name. Anonymous words are ignored.
    pub fn add(&mut self, word: Arc<Word>) {
        if let Some(name) = word.name() {
            self.words.insert(name.to_uppercase(), word.clone());
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&Arc<Word>> {
        self.words.get(&name.to_uppercase())
    }

    /// Reverse lookup: the registered word dispatching to `op`.
    pub fn lookup_opcode(&self, op: Opcode) -> Option<&Arc<Word>> {
        self.words.values().find(|w| w.opcode() == Some(op))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Word>> {
        self.words.values()
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// A stack of vocabulary scopes. Lookup walks from the innermost scope out;
/// new definitions land in the innermost (current) scope.
#[derive(Clone, Debug)]
pub struct VocabularyStack {
    scopes: Vec<Vocabulary>,
}

impl VocabularyStack {
    pub fn new() -> Self {
        Self {
            scopes: vec![Vocabulary::core()],
        }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(Vocabulary::new());
    }

    /// Drops the innermost scope. The core scope cannot be popped.
    pub fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<Word>> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.lookup(name).cloned())
    }

    pub fn lookup_opcode(&self, op: Opcode) -> Option<Arc<Word>> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.lookup_opcode(op).cloned())
    }

    /// Registers a word in the current scope.
    pub fn define(&mut self, word: Arc<Word>) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.add(word);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Word>> {
        self.scopes.iter().flat_map(|scope| scope.iter())
    }
}

impl Default for VocabularyStack {
    fn default() -> Self {
        Self::new()
    }
}

static ACTIVE: LazyLock<RwLock<VocabularyStack>> =
    LazyLock::new(|| RwLock::new(VocabularyStack::new()));

/// The process-wide vocabulary stack. Initialized once from the opcode
/// registry; compilation on multiple threads must be serialized by callers.
pub fn active() -> RwLockReadGuard<'static, VocabularyStack> {
    match ACTIVE.read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

pub fn active_mut() -> RwLockWriteGuard<'static, VocabularyStack> {
    match ACTIVE.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
