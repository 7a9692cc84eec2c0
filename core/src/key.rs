//! Composite keys correlating fetched rows with their owners.

use core::fmt;

use compact_str::CompactString;
use smallvec::SmallVec;

use crate::value::Value;

/// Hashable form of one [`Value`].
///
/// Floats compare by bit pattern, which is what a map key needs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyPart {
    Null,
    Bool(bool),
    Int(i64),
    Float(u64),
    Text(CompactString),
    Bytes(Vec<u8>),
    List(Vec<KeyPart>),
}

impl From<&Value> for KeyPart {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => KeyPart::Null,
            Value::Bool(b) => KeyPart::Bool(*b),
            Value::Int(i) => KeyPart::Int(*i),
            Value::Float(f) => KeyPart::Float(f.to_bits()),
            Value::Text(s) => KeyPart::Text(CompactString::from(s.as_str())),
            Value::Bytes(b) => KeyPart::Bytes(b.clone()),
            Value::Array(items) => KeyPart::List(items.iter().map(KeyPart::from).collect()),
        }
    }
}

impl fmt::Display for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPart::Null => f.write_str("NULL"),
            KeyPart::Bool(b) => write!(f, "{b}"),
            KeyPart::Int(i) => write!(f, "{i}"),
            KeyPart::Float(bits) => write!(f, "{}", f64::from_bits(*bits)),
            KeyPart::Text(s) => write!(f, "{s:?}"),
            KeyPart::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            KeyPart::List(items) => {
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

/// Ordered tuple of key parts used as a map key.
///
/// Two keys are equal iff they were built from equal values in the same
/// order. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct CompositeKey(SmallVec<[KeyPart; 2]>);

impl CompositeKey {
    pub fn new<'a, I>(values: I) -> Self
    where
        I: IntoIterator<Item = &'a Value>,
    {
        Self(values.into_iter().map(KeyPart::from).collect())
    }

    #[inline]
    pub fn parts(&self) -> &[KeyPart] {
        &self.0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `true` if any part is NULL; such a key can never match in SQL.
    pub fn has_null(&self) -> bool {
        self.0.iter().any(|p| matches!(p, KeyPart::Null))
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, part) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{part}")?;
        }
        f.write_str(")")
    }
}

/// Builds the scalar keys a value tuple stands for.
///
/// Positions flagged in `exploded` hold arrays: every element becomes its own
/// key part, producing the cartesian product across flagged positions. An
/// array itself is never used as a key part. A NULL or empty array yields no
/// keys, and keys containing NULL are dropped.
pub fn expand_keys(values: &[Value], exploded: &[bool]) -> Vec<CompositeKey> {
    debug_assert_eq!(values.len(), exploded.len());

    let mut keys: Vec<SmallVec<[KeyPart; 2]>> = vec![SmallVec::new()];
    for (value, &explode) in values.iter().zip(exploded) {
        if explode {
            let elements = value.elements();
            let mut next = Vec::with_capacity(keys.len() * elements.len());
            for key in &keys {
                for element in elements {
                    let mut k = key.clone();
                    k.push(KeyPart::from(element));
                    next.push(k);
                }
            }
            keys = next;
        } else {
            for key in &mut keys {
                key.push(KeyPart::from(value));
            }
        }
        if keys.is_empty() {
            break;
        }
    }

    keys.into_iter()
        .map(CompositeKey)
        .filter(|k| !k.has_null())
        .collect()
}
