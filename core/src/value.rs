//! Dynamic column values exchanged with drivers and stored in records.

use core::fmt;

/// Element type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ScalarType {
    Bool,
    Int,
    Float,
    Text,
    Bytes,
}

/// A single column value.
///
/// `Array` holds the elements of an array column (PostgreSQL `int8[]`,
/// `text[]`, ...). A NULL array and an empty array are distinct values but
/// both contain no elements.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Array(Vec<Value>),
}

impl Value {
    /// Zero value of a non-nullable column of type `ty`.
    pub fn zero(ty: ScalarType) -> Self {
        match ty {
            ScalarType::Bool => Value::Bool(false),
            ScalarType::Int => Value::Int(0),
            ScalarType::Float => Value::Float(0.0),
            ScalarType::Text => Value::Text(String::new()),
            ScalarType::Bytes => Value::Bytes(Vec::new()),
        }
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// `true` for NULL and for the zero value of every scalar type.
    pub fn is_zero(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Bool(b) => !b,
            Value::Int(i) => *i == 0,
            Value::Float(f) => *f == 0.0,
            Value::Text(s) => s.is_empty(),
            Value::Bytes(b) => b.is_empty(),
            Value::Array(a) => a.is_empty(),
        }
    }

    /// Elements of an array value; NULL yields none.
    ///
    /// A scalar is treated as a one-element array.
    pub fn elements(&self) -> &[Value] {
        match self {
            Value::Null => &[],
            Value::Array(items) => items,
            other => core::slice::from_ref(other),
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Coerces a driver value into the representation used for `ty`.
    ///
    /// Drivers without a native boolean (SQLite) hand back integers, and
    /// integer literals may arrive for float columns.
    pub fn coerce(self, ty: ScalarType) -> Self {
        match (ty, self) {
            (ScalarType::Bool, Value::Int(i)) => Value::Bool(i != 0),
            (ScalarType::Float, Value::Int(i)) => Value::Float(i as f64),
            (ScalarType::Bytes, Value::Text(s)) => Value::Bytes(s.into_bytes()),
            (ty, Value::Array(items)) => {
                Value::Array(items.into_iter().map(|v| v.coerce(ty)).collect())
            }
            (_, v) => v,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Text(s) => write!(f, "{s:?}"),
            Value::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Value::Array(items) => {
                f.write_str("{")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("}")
            }
        }
    }
}

macro_rules! impl_from_int {
    ($($ty:ty),*) => { $(
        impl From<$ty> for Value {
            #[inline]
            fn from(v: $ty) -> Self {
                Value::Int(i64::from(v))
            }
        }
    )* }
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<bool> for Value {
    #[inline]
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f32> for Value {
    #[inline]
    fn from(v: f32) -> Self {
        Value::Float(f64::from(v))
    }
}

impl From<f64> for Value {
    #[inline]
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    #[inline]
    fn from(v: &str) -> Self {
        Value::Text(v.to_owned())
    }
}

impl From<String> for Value {
    #[inline]
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Array(v.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_values_are_zero() {
        for ty in [
            ScalarType::Bool,
            ScalarType::Int,
            ScalarType::Float,
            ScalarType::Text,
            ScalarType::Bytes,
        ] {
            assert!(Value::zero(ty).is_zero(), "{ty:?}");
            assert!(!Value::zero(ty).is_null());
        }
    }

    #[test]
    fn elements_of_null_and_empty_are_empty() {
        assert!(Value::Null.elements().is_empty());
        assert!(Value::Array(vec![]).elements().is_empty());
        assert_eq!(Value::from(vec![1, 2]).elements().len(), 2);
        assert_eq!(Value::Int(7).elements(), &[Value::Int(7)]);
    }

    #[test]
    fn coerce_sqlite_booleans() {
        assert_eq!(Value::Int(1).coerce(ScalarType::Bool), Value::Bool(true));
        assert_eq!(Value::Int(0).coerce(ScalarType::Bool), Value::Bool(false));
        assert_eq!(Value::Int(2).coerce(ScalarType::Float), Value::Float(2.0));
        assert_eq!(Value::Null.coerce(ScalarType::Int), Value::Null);
    }

    #[test]
    fn display_array() {
        assert_eq!(Value::from(vec![1, 2, 3]).to_string(), "{1,2,3}");
        assert_eq!(Value::from("a").to_string(), "\"a\"");
    }
}
