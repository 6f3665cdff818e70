//! Runtime values.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::types::ValueType;
use crate::word::Word;

/// A tagged runtime value.
///
/// Heap variants share their payload via `Arc`, so cloning a value (the
/// interpreter does it constantly) is cheap. A quote wraps an unnamed
/// compiled word.
#[derive(Clone, Debug, Default)]
pub enum Value {
    #[default]
    Null,
    Number(f64),
    String(Arc<str>),
    Array(Arc<Vec<Value>>),
    Map(Arc<BTreeMap<String, Value>>),
    Quote(Arc<Word>),
}

/// A runtime failure produced by a value operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ValueError {
    /// Operands of incompatible types.
    TypeMismatch {
        op: &'static str,
        lhs: ValueType,
        rhs: ValueType,
    },
    /// Integer division or modulo by zero.
    DivisionByZero,
    /// `length` of a value that has none.
    NoLength(ValueType),
}

impl std::fmt::Display for ValueError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueError::TypeMismatch { op, lhs, rhs } => {
                write!(f, "cannot apply '{}' to {} and {}", op, lhs, rhs)
            }
            ValueError::DivisionByZero => write!(f, "division by zero"),
            ValueError::NoLength(t) => write!(f, "{} has no length", t),
        }
    }
}

impl std::error::Error for ValueError {}

impl Value {
    pub fn number(n: f64) -> Self {
        Value::Number(n)
    }

    pub fn string(s: impl Into<Arc<str>>) -> Self {
        Value::String(s.into())
    }

    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Arc::new(items))
    }

    pub fn map(entries: BTreeMap<String, Value>) -> Self {
        Value::Map(Arc::new(entries))
    }

    pub fn quote(word: Arc<Word>) -> Self {
        Value::Quote(word)
    }

    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Null => ValueType::Null,
            Value::Number(_) => ValueType::Number,
            Value::String(_) => ValueType::String,
            Value::Array(_) => ValueType::Array,
            Value::Map(_) => ValueType::Map,
            Value::Quote(_) => ValueType::Quote,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        self.as_number().map(|n| n as i64)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_quote(&self) -> Option<&Arc<Word>> {
        match self {
            Value::Quote(w) => Some(w),
            _ => None,
        }
    }

    /// False iff null or numerically zero.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Number(n) => *n != 0.0,
            _ => true,
        }
    }

    /// Element count of strings (in characters), arrays, and maps.
    pub fn length(&self) -> Result<Value, ValueError> {
        match self {
            Value::String(s) => Ok(Value::number(s.chars().count() as f64)),
            Value::Array(items) => Ok(Value::number(items.len() as f64)),
            Value::Map(entries) => Ok(Value::number(entries.len() as f64)),
            other => Err(ValueError::NoLength(other.value_type())),
        }
    }

    /// `+`: numeric addition, or string/array concatenation.
    pub fn add(&self, other: &Value) -> Result<Value, ValueError> {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::number(a + b)),
            (Value::String(a), Value::String(b)) => {
                let mut s = String::with_capacity(a.len() + b.len());
                s.push_str(a);
                s.push_str(b);
                Ok(Value::string(s))
            }
            (Value::Array(a), Value::Array(b)) => {
                let mut items = Vec::with_capacity(a.len() + b.len());
                items.extend(a.iter().cloned());
                items.extend(b.iter().cloned());
                Ok(Value::array(items))
            }
            _ => Err(self.mismatch("+", other)),
        }
    }

    pub fn sub(&self, other: &Value) -> Result<Value, ValueError> {
        self.numeric_op("-", other, |a, b| a - b)
    }

    pub fn mul(&self, other: &Value) -> Result<Value, ValueError> {
        self.numeric_op("*", other, |a, b| a * b)
    }

    /// Floating-point division; dividing by zero yields an infinity.
    pub fn div(&self, other: &Value) -> Result<Value, ValueError> {
        self.numeric_op("/", other, |a, b| a / b)
    }

    /// Integer modulo.
    pub fn rem(&self, other: &Value) -> Result<Value, ValueError> {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => {
                let b = *b as i64;
                if b == 0 {
                    return Err(ValueError::DivisionByZero);
                }
                Ok(Value::number((*a as i64 % b) as f64))
            }
            _ => Err(self.mismatch("MOD", other)),
        }
    }

    fn numeric_op(
        &self,
        op: &'static str,
        other: &Value,
        f: impl Fn(f64, f64) -> f64,
    ) -> Result<Value, ValueError> {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::number(f(*a, *b))),
            _ => Err(self.mismatch(op, other)),
        }
    }

    fn mismatch(&self, op: &'static str, other: &Value) -> ValueError {
        ValueError::TypeMismatch {
            op,
            lhs: self.value_type(),
            rhs: other.value_type(),
        }
    }

    /// Total ordering: by type tag across types, natural order within one.
    pub fn compare(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a.total_cmp(b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Array(a), Value::Array(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    let ord = x.compare(y);
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                a.len().cmp(&b.len())
            }
            (Value::Map(a), Value::Map(b)) => a.len().cmp(&b.len()),
            (Value::Quote(a), Value::Quote(b)) => {
                (Arc::as_ptr(a) as usize).cmp(&(Arc::as_ptr(b) as usize))
            }
            _ => self.value_type().cmp(&other.value_type()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Quote(a), Value::Quote(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            Value::String(s) => f.write_str(s),
            Value::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Value::Map(entries) => {
                f.write_str("{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                f.write_str("}")
            }
            Value::Quote(word) => match word.name() {
                Some(name) => write!(f, "[{}]", name),
                None => f.write_str("[quote]"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn types() {
        assert_eq!(Value::Null.value_type(), ValueType::Null);
        assert_eq!(Value::number(3.0).value_type(), ValueType::Number);
        assert_eq!(Value::string("x").value_type(), ValueType::String);
        assert_eq!(Value::array(vec![]).value_type(), ValueType::Array);
    }

    #[test]
    fn truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::number(0.0).is_truthy());
        assert!(Value::number(-1.0).is_truthy());
        assert!(Value::string("").is_truthy());
        assert!(Value::array(vec![]).is_truthy());
    }

    #[test]
    fn arithmetic() {
        let a = Value::number(3.0);
        let b = Value::number(4.0);
        assert_eq!(a.add(&b).unwrap(), Value::number(7.0));
        assert_eq!(a.sub(&b).unwrap(), Value::number(-1.0));
        assert_eq!(a.mul(&b).unwrap(), Value::number(12.0));
        assert_eq!(a.div(&b).unwrap(), Value::number(0.75));
        assert_eq!(Value::number(7.0).rem(&a).unwrap(), Value::number(1.0));
    }

    #[test]
    fn string_concat() {
        let hi = Value::string("Hi");
        let there = Value::string("There");
        assert_eq!(hi.add(&there).unwrap(), Value::string("HiThere"));
    }

    #[test]
    fn array_concat() {
        let a = Value::array(vec![Value::number(1.0)]);
        let b = Value::array(vec![Value::number(2.0)]);
        assert_eq!(
            a.add(&b).unwrap(),
            Value::array(vec![Value::number(1.0), Value::number(2.0)])
        );
    }

    #[test]
    fn type_mismatch() {
        let err = Value::string("a").add(&Value::number(1.0)).unwrap_err();
        assert!(matches!(err, ValueError::TypeMismatch { op: "+", .. }));
        assert_eq!(
            Value::number(1.0).rem(&Value::number(0.0)),
            Err(ValueError::DivisionByZero)
        );
    }

    #[test]
    fn lengths() {
        assert_eq!(
            Value::string("hello").length().unwrap(),
            Value::number(5.0)
        );
        assert_eq!(
            Value::array(vec![Value::Null; 3]).length().unwrap(),
            Value::number(3.0)
        );
        assert!(Value::number(3.0).length().is_err());
    }

    #[test]
    fn ordering() {
        assert_eq!(
            Value::number(3.0).compare(&Value::number(4.0)),
            Ordering::Less
        );
        assert_eq!(
            Value::string("b").compare(&Value::string("a")),
            Ordering::Greater
        );
        // Cross-type comparison orders by type tag.
        assert_eq!(
            Value::Null.compare(&Value::number(0.0)),
            Ordering::Less
        );
    }

    #[test]
    fn display() {
        assert_eq!(Value::number(120.0).to_string(), "120");
        assert_eq!(Value::number(0.75).to_string(), "0.75");
        assert_eq!(Value::string("hi").to_string(), "hi");
        assert_eq!(
            Value::array(vec![Value::number(1.0), Value::number(2.0)]).to_string(),
            "[1 2]"
        );
    }
}
