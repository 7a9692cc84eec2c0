//! Dynamic struct instances.
//!
//! A [`Record`] is shaped by its type's declaration: one [`Slot`] per
//! declared field, in declaration order. Embedded structs are nested records
//! and are addressed with a [`FieldPath`] of slot offsets computed once by
//! the registry.

use core::fmt;

use smallvec::SmallVec;

use crate::value::Value;

/// Storage of one declared field.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    /// Column value
    Value(Value),
    /// Nested struct held by value (embeds, value relations)
    Struct(Box<Record>),
    /// Nested struct held by pointer; `None` is unset
    Ptr(Option<Box<Record>>),
    /// Slice of structs (plural relations)
    List(Vec<Record>),
}

impl Slot {
    /// Nested record reachable through this slot, if any.
    pub fn record(&self) -> Option<&Record> {
        match self {
            Slot::Struct(rec) => Some(rec),
            Slot::Ptr(Some(rec)) => Some(rec),
            _ => None,
        }
    }

    pub fn record_mut(&mut self) -> Option<&mut Record> {
        match self {
            Slot::Struct(rec) => Some(rec),
            Slot::Ptr(Some(rec)) => Some(rec),
            _ => None,
        }
    }
}

/// One struct instance.
///
/// `Clone` is a structural deep copy: no slot of the copy shares storage with
/// the original.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    slots: Vec<Slot>,
}

impl Record {
    #[inline]
    pub fn new(slots: Vec<Slot>) -> Self {
        Self { slots }
    }

    #[inline]
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// Slot at `path`, descending through nested records.
    pub fn slot(&self, path: &FieldPath) -> Option<&Slot> {
        let (last, parents) = path.0.split_last()?;
        let mut rec = self;
        for &i in parents {
            rec = rec.slots.get(usize::from(i))?.record()?;
        }
        rec.slots.get(usize::from(*last))
    }

    pub fn slot_mut(&mut self, path: &FieldPath) -> Option<&mut Slot> {
        let (last, parents) = path.0.split_last()?;
        let mut rec = self;
        for &i in parents {
            rec = rec.slots.get_mut(usize::from(i))?.record_mut()?;
        }
        rec.slots.get_mut(usize::from(*last))
    }

    /// Column value at `path`.
    pub fn get(&self, path: &FieldPath) -> Option<&Value> {
        match self.slot(path)? {
            Slot::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Stores `value` at `path`. Returns `false` if the path does not lead to
    /// a value slot.
    pub fn set(&mut self, path: &FieldPath, value: Value) -> bool {
        match self.slot_mut(path) {
            Some(Slot::Value(v)) => {
                *v = value;
                true
            }
            _ => false,
        }
    }

    /// Nested record at `path` (value struct or non-nil pointer).
    pub fn child(&self, path: &FieldPath) -> Option<&Record> {
        self.slot(path)?.record()
    }

    pub fn child_mut(&mut self, path: &FieldPath) -> Option<&mut Record> {
        self.slot_mut(path)?.record_mut()
    }

    /// Elements of the slice at `path`; empty if the path is not a slice.
    pub fn list(&self, path: &FieldPath) -> &[Record] {
        match self.slot(path) {
            Some(Slot::List(items)) => items,
            _ => &[],
        }
    }
}

/// Slot offsets leading from a record to a nested field.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct FieldPath(SmallVec<[u16; 4]>);

impl FieldPath {
    #[inline]
    pub fn new(index: u16) -> Self {
        Self(smallvec::smallvec![index])
    }

    /// `self` followed by `rest`.
    pub fn join(&self, rest: &FieldPath) -> Self {
        let mut out = self.0.clone();
        out.extend_from_slice(&rest.0);
        Self(out)
    }

    #[inline]
    pub fn indices(&self) -> &[u16] {
        &self.0
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Debug for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.iter()).finish()
    }
}

impl From<&[u16]> for FieldPath {
    fn from(indices: &[u16]) -> Self {
        Self(SmallVec::from_slice(indices))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Record {
        Record::new(vec![
            Slot::Value(Value::Int(1)),
            Slot::Struct(Box::new(Record::new(vec![
                Slot::Value(Value::from("inner")),
                Slot::Ptr(None),
            ]))),
            Slot::List(vec![]),
        ])
    }

    #[test]
    fn nested_paths() {
        let mut rec = sample();
        let inner = FieldPath::from(&[1u16, 0][..]);
        assert_eq!(rec.get(&inner), Some(&Value::from("inner")));

        assert!(rec.set(&inner, Value::from("changed")));
        assert_eq!(rec.get(&inner), Some(&Value::from("changed")));

        // nil pointer cannot be descended into
        let through_nil = FieldPath::from(&[1u16, 1, 0][..]);
        assert_eq!(rec.get(&through_nil), None);
        assert!(!rec.set(&through_nil, Value::Null));
    }

    #[test]
    fn set_rejects_non_value_slot() {
        let mut rec = sample();
        assert!(!rec.set(&FieldPath::new(2), Value::Int(3)));
        assert!(rec.list(&FieldPath::new(2)).is_empty());
    }

    #[test]
    fn clone_is_deep() {
        let mut a = sample();
        let b = a.clone();
        a.set(&FieldPath::from(&[1u16, 0][..]), Value::from("mutated"));
        assert_eq!(b.get(&FieldPath::from(&[1u16, 0][..])), Some(&Value::from("inner")));
    }
}
