//! Value types and sets of value types.

/// The dynamic type of a [`crate::value::Value`].
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum ValueType {
    Null,
    Number,
    String,
    Array,
    Map,
    Quote,
}

impl ValueType {
    pub fn name(self) -> &'static str {
        match self {
            ValueType::Null => "null",
            ValueType::Number => "number",
            ValueType::String => "string",
            ValueType::Array => "array",
            ValueType::Map => "map",
            ValueType::Quote => "quote",
        }
    }

    fn bit(self) -> u8 {
        match self {
            ValueType::Null => TypeSet::NULL,
            ValueType::Number => TypeSet::NUMBER,
            ValueType::String => TypeSet::STRING,
            ValueType::Array => TypeSet::ARRAY,
            ValueType::Map => TypeSet::MAP,
            ValueType::Quote => TypeSet::QUOTE,
        }
    }
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

const ALL_TYPES: [ValueType; 6] = [
    ValueType::Null,
    ValueType::Number,
    ValueType::String,
    ValueType::Array,
    ValueType::Map,
    ValueType::Quote,
];

/// A set of value types describing one slot of a stack effect.
///
/// Besides the five value types and a null-allowed bit, an output slot can
/// record that its runtime type equals the type of input slot `k` at call
/// time (`input_match`). Equality compares the type bits only.
#[derive(Copy, Clone, Debug, Default)]
pub struct TypeSet {
    flags: u8,
    // Input slot number + 1; 0 means no match.
    matched: u8,
}

impl TypeSet {
    const NULL: u8 = 0x01;
    const NUMBER: u8 = 0x02;
    const STRING: u8 = 0x04;
    const ARRAY: u8 = 0x08;
    const MAP: u8 = 0x10;
    const QUOTE: u8 = 0x20;
    const ALL: u8 = 0x3F;

    pub const fn none() -> Self {
        Self {
            flags: 0,
            matched: 0,
        }
    }

    /// Any type, null included.
    pub const fn any() -> Self {
        Self {
            flags: Self::ALL,
            matched: 0,
        }
    }

    pub const fn null_only() -> Self {
        Self {
            flags: Self::NULL,
            matched: 0,
        }
    }

    pub fn of(t: ValueType) -> Self {
        Self {
            flags: t.bit(),
            matched: 0,
        }
    }

    pub fn exists(&self) -> bool {
        self.flags != 0
    }

    pub fn can_be(&self, t: ValueType) -> bool {
        self.flags & t.bit() != 0
    }

    pub fn can_be_any(&self) -> bool {
        self.flags == Self::ALL
    }

    /// True if more than one type is allowed.
    pub fn is_multi(&self) -> bool {
        let t = self.flags;
        t != 0 && (t & (t - 1)) != 0
    }

    pub fn add(&mut self, t: ValueType) {
        self.flags |= t.bit();
    }

    pub fn add_all(&mut self) {
        self.flags = Self::ALL;
    }

    pub fn first_type(&self) -> Option<ValueType> {
        ALL_TYPES.iter().copied().find(|t| self.can_be(*t))
    }

    /// The input slot this output's type mirrors, if any.
    pub fn input_match(&self) -> Option<usize> {
        if self.matched == 0 {
            None
        } else {
            Some(self.matched as usize - 1)
        }
    }

    /// Declare that this slot mirrors input `slot`, taking that input's types.
    pub fn set_input_match(&mut self, input: TypeSet, slot: usize) {
        debug_assert!(slot < u8::MAX as usize);
        self.flags = input.flags;
        self.matched = slot as u8 + 1;
    }

    pub fn clear_input_match(&mut self) {
        self.matched = 0;
    }

    /// Builder form: same types, tagged to mirror input `slot`.
    pub fn matching(mut self, slot: usize) -> Self {
        self.matched = slot as u8 + 1;
        self
    }

    pub fn union(self, other: TypeSet) -> TypeSet {
        TypeSet {
            flags: self.flags | other.flags,
            matched: 0,
        }
    }

    pub fn intersect(self, other: TypeSet) -> TypeSet {
        TypeSet {
            flags: self.flags & other.flags,
            matched: 0,
        }
    }

    /// Types allowed by `self` but not by `other`.
    pub fn minus(self, other: TypeSet) -> TypeSet {
        TypeSet {
            flags: self.flags & !other.flags,
            matched: 0,
        }
    }

    pub fn type_flags(&self) -> u8 {
        self.flags
    }
}

impl PartialEq for TypeSet {
    fn eq(&self, other: &Self) -> bool {
        self.flags == other.flags
    }
}

impl std::fmt::Display for TypeSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.can_be_any() {
            return f.write_str("any");
        }
        let mut first = true;
        for t in ALL_TYPES {
            if self.can_be(t) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(t.name())?;
                first = false;
            }
        }
        if first {
            f.write_str("none")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_any() {
        let none = TypeSet::none();
        assert!(!none.exists());
        assert!(!none.can_be(ValueType::Number));

        let any = TypeSet::any();
        assert!(any.can_be_any());
        assert!(any.can_be(ValueType::Null));
        assert!(any.is_multi());
    }

    #[test]
    fn single_type() {
        let num = TypeSet::of(ValueType::Number);
        assert!(num.can_be(ValueType::Number));
        assert!(!num.can_be(ValueType::String));
        assert!(!num.is_multi());
        assert_eq!(num.first_type(), Some(ValueType::Number));
    }

    #[test]
    fn set_algebra() {
        let mut ns = TypeSet::of(ValueType::Number);
        ns.add(ValueType::String);
        let s = TypeSet::of(ValueType::String);

        assert_eq!(ns.intersect(s), s);
        assert_eq!(ns.minus(s), TypeSet::of(ValueType::Number));
        assert!(!s.minus(ns).exists());
        assert_eq!(s.union(TypeSet::of(ValueType::Number)), ns);
    }

    #[test]
    fn input_match() {
        let input = TypeSet::of(ValueType::Number);
        let mut out = TypeSet::any();
        assert_eq!(out.input_match(), None);

        out.set_input_match(input, 2);
        assert_eq!(out.input_match(), Some(2));
        assert_eq!(out, input); // equality ignores the match slot

        let tagged = TypeSet::any().matching(0);
        assert_eq!(tagged.input_match(), Some(0));
    }

    #[test]
    fn display() {
        assert_eq!(TypeSet::any().to_string(), "any");
        assert_eq!(TypeSet::of(ValueType::Number).to_string(), "number");
        let mut ts = TypeSet::of(ValueType::String);
        ts.add(ValueType::Array);
        assert_eq!(ts.to_string(), "string|array");
    }
}
