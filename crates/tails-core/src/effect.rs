//! Stack effects: the static API of a word.
//!
//! A [`StackEffect`] describes how many values a word reads from the stack
//! and their allowed types, how many it leaves and their potential types,
//! and the peak depth its own stack frame reaches while it runs. The
//! compiler's checker verifies every compiled word against one of these, and
//! the interpreter uses `max` to pre-size the stack.

use smallvec::SmallVec;

use crate::error::{CompileError, CompileResult};
use crate::types::{TypeSet, ValueType};

/// Sentinel for "peak depth not known at compile time" (non-tail recursion).
pub const UNKNOWN_MAX: u16 = u16::MAX;

pub type TypeVec = SmallVec<[TypeSet; 4]>;

/// `(inputs, outputs, max)` with per-slot type sets.
///
/// Slot 0 of `inputs`/`outputs` is the top of the stack. `max` is the peak
/// depth of the word's own frame (so it is never less than the input count
/// or the output count).
#[derive(Clone, Debug, Default)]
pub struct StackEffect {
    inputs: TypeVec,
    outputs: TypeVec,
    max: u16,
}

impl StackEffect {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_parts(inputs: TypeVec, outputs: TypeVec) -> Self {
        let mut effect = Self {
            inputs,
            outputs,
            max: 0,
        };
        effect.update_max(0);
        effect
    }

    /// Parse the textual form, e.g. `"a b# -- b# a"`. See [`EffectParser`].
    pub fn parse(text: &str) -> CompileResult<StackEffect> {
        Ok(EffectParser::parse(text)?.effect)
    }

    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    pub fn output_count(&self) -> usize {
        self.outputs.len()
    }

    /// Net change in stack depth from entry to exit.
    pub fn net(&self) -> isize {
        self.outputs.len() as isize - self.inputs.len() as isize
    }

    /// Peak frame depth, or [`UNKNOWN_MAX`].
    pub fn max(&self) -> u16 {
        self.max
    }

    pub fn max_is_unknown(&self) -> bool {
        self.max == UNKNOWN_MAX
    }

    /// Input types, top of stack first.
    pub fn inputs(&self) -> &[TypeSet] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[TypeSet] {
        &self.outputs
    }

    pub fn inputs_mut(&mut self) -> &mut [TypeSet] {
        &mut self.inputs
    }

    pub fn outputs_mut(&mut self) -> &mut [TypeSet] {
        &mut self.outputs
    }

    /// Adds an input at the top of the stack.
    pub fn add_input(&mut self, entry: TypeSet) {
        self.inputs.insert(0, entry);
        self.update_max(0);
    }

    /// Adds an output at the top of the stack.
    pub fn add_output(&mut self, entry: TypeSet) {
        self.outputs.insert(0, entry);
        self.update_max(0);
    }

    pub fn add_input_at_bottom(&mut self, entry: TypeSet) {
        self.inputs.push(entry);
        self.update_max(0);
    }

    pub fn add_output_at_bottom(&mut self, entry: TypeSet) {
        self.outputs.push(entry);
        self.update_max(0);
    }

    pub fn clear_outputs(&mut self) {
        self.outputs.clear();
        self.update_max(0);
    }

    /// Returns a copy with the peak depth raised to at least `max`.
    pub fn with_max(mut self, max: usize) -> Self {
        self.update_max(max);
        self
    }

    pub fn with_unknown_max(mut self) -> Self {
        self.max = UNKNOWN_MAX;
        self
    }

    fn update_max(&mut self, m: usize) {
        if self.max == UNKNOWN_MAX {
            return;
        }
        let floor = self.inputs.len().max(self.outputs.len()).max(m);
        let floor = floor.min(UNKNOWN_MAX as usize) as u16;
        if floor > self.max {
            self.max = floor;
        }
    }

    /// The effect of running `self` and then `next`.
    ///
    /// `next` cannot need more inputs than `self` leaves, and the types must
    /// be compatible. Outputs of `next` that mirror its inputs are resolved
    /// against `self`'s outputs.
    pub fn then(&self, next: &StackEffect) -> CompileResult<StackEffect> {
        let a_outs = self.output_count();
        let b_ins = next.input_count();
        if a_outs < b_ins {
            return Err(CompileError::new("stack underflow combining effects"));
        }
        for i in 0..b_ins {
            if self.outputs[i].minus(next.inputs[i]).exists() {
                return Err(CompileError::new(format!(
                    "type mismatch combining effects: {} is not {}",
                    self.outputs[i], next.inputs[i]
                )));
            }
        }

        let mut result = StackEffect::from_parts(self.inputs.clone(), next.outputs.clone());

        // Unconsumed outputs of `self` remain below the new outputs:
        for i in b_ins..a_outs {
            result.add_output_at_bottom(self.outputs[i]);
        }

        // Resolve input matches against what was actually on the stack:
        for out in result.outputs.iter_mut() {
            if let Some(slot) = out.input_match() {
                if slot < a_outs {
                    let actual = self.outputs[slot];
                    if actual.is_multi() {
                        out.set_input_match(actual, slot);
                    } else {
                        *out = actual;
                    }
                }
            }
        }

        let b_peak = a_outs - b_ins + next.max as usize;
        if self.max_is_unknown() || next.max_is_unknown() {
            result.max = UNKNOWN_MAX;
        } else {
            result.update_max((self.max as usize).max(b_peak));
        }
        Ok(result)
    }
}

impl PartialEq for StackEffect {
    fn eq(&self, other: &Self) -> bool {
        self.inputs == other.inputs && self.outputs == other.outputs && self.max == other.max
    }
}

impl std::fmt::Display for StackEffect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for entry in self.inputs.iter().rev() {
            write!(f, "{} ", entry)?;
        }
        f.write_str("--")?;
        for entry in self.outputs.iter().rev() {
            write!(f, " {}", entry)?;
        }
        Ok(())
    }
}

/// Parser for the textual stack-effect form.
///
/// Slots are whitespace-separated tokens on either side of `--`:
/// - alphanumerics/`_` name the slot;
/// - `#` allows number, `$` string, `[` or `]` array, `{` or `}` map,
///   `?` quote (when not the final character of the token);
/// - a final `?` allows null;
/// - `/k` on an output declares it mirrors input slot `k` (top = 0);
/// - an output named like an input mirrors that input;
/// - a token with no type characters (or only the null mark) allows any type.
#[derive(Clone, Debug, Default)]
pub struct EffectParser {
    pub effect: StackEffect,
    /// Slot names, top of stack first. Unnamed slots are empty strings.
    pub input_names: Vec<String>,
    pub output_names: Vec<String>,
}

impl EffectParser {
    pub fn parse(text: &str) -> CompileResult<EffectParser> {
        // Collected in source (bottom-to-top) order, reversed at the end.
        let mut inputs: Vec<(TypeSet, String)> = Vec::new();
        let mut outputs: Vec<(TypeSet, String, Option<usize>)> = Vec::new();
        let mut seen_separator = false;

        for token in text.split_whitespace() {
            if token == "--" {
                if seen_separator {
                    return Err(CompileError::new("duplicate stack separator"));
                }
                seen_separator = true;
                continue;
            }
            let (types, name, matched) = Self::parse_slot(token)?;
            if seen_separator {
                outputs.push((types, name, matched));
            } else {
                if matched.is_some() {
                    return Err(CompileError::new("input slot cannot declare a match"));
                }
                inputs.push((types, name));
            }
        }
        if !seen_separator {
            return Err(CompileError::new("missing stack separator in effect"));
        }

        inputs.reverse();
        outputs.reverse();

        let mut parser = EffectParser::default();
        for (types, name) in &inputs {
            parser.effect.add_input_at_bottom(*types);
            parser.input_names.push(name.clone());
        }
        for (types, name, matched) in &outputs {
            let mut entry = *types;
            let slot = match matched {
                Some(k) => Some(*k),
                None if !name.is_empty() => inputs.iter().position(|(_, n)| n == name),
                None => None,
            };
            if let Some(k) = slot {
                if k >= inputs.len() {
                    return Err(CompileError::new(format!(
                        "effect output refers to input {} but there are only {} inputs",
                        k,
                        inputs.len()
                    )));
                }
                entry.set_input_match(inputs[k].0, k);
            }
            parser.effect.add_output_at_bottom(entry);
            parser.output_names.push(name.clone());
        }
        Ok(parser)
    }

    fn parse_slot(token: &str) -> CompileResult<(TypeSet, String, Option<usize>)> {
        let mut types = TypeSet::none();
        let mut name = String::new();
        let mut matched = None;
        let mut allows_null = false;

        let chars: Vec<char> = token.chars().collect();
        let mut i = 0;
        while i < chars.len() {
            let c = chars[i];
            match c {
                '#' => types.add(ValueType::Number),
                '$' => types.add(ValueType::String),
                '[' | ']' => types.add(ValueType::Array),
                '{' | '}' => types.add(ValueType::Map),
                '?' => {
                    if i + 1 == chars.len() {
                        allows_null = true;
                    } else {
                        types.add(ValueType::Quote);
                    }
                }
                '/' => {
                    let digits: String =
                        chars[i + 1..].iter().take_while(|c| c.is_ascii_digit()).collect();
                    if digits.is_empty() {
                        return Err(CompileError::new("expected slot index after '/'"));
                    }
                    i += digits.len();
                    matched = Some(digits.parse::<usize>().map_err(|_| {
                        CompileError::new("invalid slot index in effect")
                    })?);
                }
                c if c.is_alphanumeric() || c == '_' => name.push(c),
                _ => {
                    return Err(CompileError::new(format!(
                        "unknown stack type symbol '{}'",
                        c
                    )));
                }
            }
            i += 1;
        }

        if allows_null {
            types.add(ValueType::Null);
        }
        // No type marks (or only the null mark) means any type.
        if !types.exists() || types == TypeSet::null_only() {
            types.add_all();
        }
        Ok((types, name, matched))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_effect() {
        let sfx = StackEffect::parse("--").unwrap();
        assert_eq!(sfx.input_count(), 0);
        assert_eq!(sfx.output_count(), 0);
        assert_eq!(sfx.max(), 0);
    }

    #[test]
    fn untyped_slots_allow_anything() {
        let sfx = StackEffect::parse("a -- b").unwrap();
        assert_eq!(sfx.input_count(), 1);
        assert_eq!(sfx.output_count(), 1);
        assert!(sfx.inputs()[0].can_be_any());
        assert!(sfx.outputs()[0].can_be_any());
        assert_eq!(sfx.max(), 1);
    }

    #[test]
    fn typed_slots() {
        let sfx = StackEffect::parse("aaa# bbb#? -- ccc$ ddd[]?").unwrap();
        assert_eq!(sfx.input_count(), 2);
        assert_eq!(sfx.output_count(), 2);
        // Slot 0 is the top of the stack, i.e. the rightmost token.
        assert!(sfx.inputs()[0].can_be(ValueType::Number));
        assert!(sfx.inputs()[0].can_be(ValueType::Null));
        assert!(sfx.inputs()[1].can_be(ValueType::Number));
        assert!(!sfx.inputs()[1].can_be(ValueType::Null));
        assert_eq!(sfx.outputs()[1], TypeSet::of(ValueType::String));
        assert!(sfx.outputs()[0].can_be(ValueType::Array));
        assert!(sfx.outputs()[0].can_be(ValueType::Null));
        assert_eq!(sfx.outputs()[1].input_match(), None);
    }

    #[test]
    fn name_matching_preserves_inputs() {
        let parsed = EffectParser::parse("apple ball# cat -- ball# cat apple").unwrap();
        let sfx = &parsed.effect;
        assert_eq!(sfx.input_count(), 3);
        assert_eq!(sfx.output_count(), 3);
        assert_eq!(sfx.outputs()[0].input_match(), Some(2)); // apple
        assert_eq!(sfx.outputs()[1].input_match(), Some(0)); // cat
        assert_eq!(sfx.outputs()[2].input_match(), Some(1)); // ball
        assert!(sfx.outputs()[2].can_be(ValueType::Number));

        assert_eq!(parsed.input_names, ["cat", "ball", "apple"]);
        assert_eq!(parsed.output_names, ["apple", "cat", "ball"]);
    }

    #[test]
    fn explicit_match_index() {
        let sfx = StackEffect::parse("a b -- x/1").unwrap();
        assert_eq!(sfx.outputs()[0].input_match(), Some(1));
    }

    #[test]
    fn quote_and_map_marks() {
        let sfx = StackEffect::parse("?q s$ -- m{}").unwrap();
        assert_eq!(sfx.inputs()[1], TypeSet::of(ValueType::Quote));
        assert_eq!(sfx.inputs()[0], TypeSet::of(ValueType::String));
        assert_eq!(sfx.outputs()[0], TypeSet::of(ValueType::Map));
    }

    #[test]
    fn missing_separator_is_an_error() {
        assert!(StackEffect::parse("a b").is_err());
        assert!(StackEffect::parse("a -- b -- c").is_err());
    }

    #[test]
    fn compose_simple() {
        // (-- #) then (# # -- #) underflows;
        // (-- #) twice then (# # -- #) is (-- #).
        let lit = StackEffect::parse("-- #").unwrap();
        let add = StackEffect::parse("a# b# -- #").unwrap();
        assert!(lit.then(&add).is_err());

        let two = lit.then(&lit).unwrap();
        assert_eq!(two.output_count(), 2);
        let sum = two.then(&add).unwrap();
        assert_eq!(sum.input_count(), 0);
        assert_eq!(sum.output_count(), 1);
        assert_eq!(sum.max(), 2);
    }

    #[test]
    fn compose_resolves_input_matches() {
        // Push a number, then DUP ("a -- a a"): both outputs become numbers.
        let lit = StackEffect::parse("-- #").unwrap();
        let dup = StackEffect::parse("a -- a a").unwrap();
        let sfx = lit.then(&dup).unwrap();
        assert_eq!(sfx.output_count(), 2);
        assert_eq!(sfx.outputs()[0], TypeSet::of(ValueType::Number));
        assert_eq!(sfx.outputs()[1], TypeSet::of(ValueType::Number));
    }

    #[test]
    fn compose_type_mismatch() {
        let lit = StackEffect::parse("-- $").unwrap();
        let abs = StackEffect::parse("# -- #").unwrap();
        assert!(lit.then(&abs).is_err());
    }

    #[test]
    fn max_floor() {
        let sfx = StackEffect::parse("a b -- c").unwrap();
        assert_eq!(sfx.max(), 2);
        assert_eq!(sfx.clone().with_max(5).max(), 5);
        assert!(sfx.with_unknown_max().max_is_unknown());
    }
}
