use compact_str::CompactString;
use smallvec::SmallVec;

use crate::record::{FieldPath, Record};
use crate::schema::decl::Valuer;
use crate::value::{ScalarType, Value};

/// One addressable column of a table.
#[derive(Debug, Clone)]
pub struct Field {
    /// Declared field name (`AuthorID`)
    pub name: CompactString,
    /// Column name (`author_id`)
    pub column: CompactString,
    /// Additional lookup names from `alt:`
    pub alt: SmallVec<[CompactString; 1]>,
    pub path: FieldPath,
    pub ty: ScalarType,
    pub nullable: bool,
    pub is_array: bool,
    pub is_pk: bool,
    pub scan_only: bool,
    pub null_zero: bool,
    pub soft_delete: bool,
    pub(crate) valuer: Option<Valuer>,
    /// Embedding depth the field was promoted from (0 = declared directly)
    pub(crate) depth: u16,
}

impl Field {
    /// Raw stored value.
    #[inline]
    pub fn get<'r>(&self, record: &'r Record) -> Option<&'r Value> {
        record.get(&self.path)
    }

    /// Value as bound in SQL and hashed in composite keys: the stored value
    /// after the field's custom conversion. Missing paths read as NULL.
    pub fn key_value(&self, record: &Record) -> Value {
        match (self.get(record), self.valuer) {
            (Some(v), Some(valuer)) => valuer(v),
            (Some(v), None) => v.clone(),
            (None, _) => Value::Null,
        }
    }

    /// Stores a scanned value, coercing driver representations and
    /// replacing NULL with the zero value on non-nullable scalar fields.
    pub fn set(&self, record: &mut Record, value: Value) -> bool {
        let value = if value.is_null() {
            if self.nullable || self.is_array {
                Value::Null
            } else {
                Value::zero(self.ty)
            }
        } else {
            value.coerce(self.ty)
        };
        record.set(&self.path, value)
    }

    /// Zero value this field starts with in a fresh record.
    pub fn zero(&self) -> Value {
        if self.nullable || self.is_array {
            Value::Null
        } else {
            Value::zero(self.ty)
        }
    }

    /// `true` if `name` is the column name or one of the `alt:` names.
    pub fn answers_to(&self, name: &str) -> bool {
        self.column == name || self.alt.iter().any(|a| a == name)
    }

    /// Copy of the field reached through `prefix` and stored under a new column.
    pub(crate) fn promoted(&self, prefix: &FieldPath, column: CompactString, depth: u16) -> Self {
        Field {
            column,
            path: prefix.join(&self.path),
            depth,
            ..self.clone()
        }
    }
}
