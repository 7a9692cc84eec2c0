//! [`Connection`] for `rusqlite::Connection`.
//!
//! SQLite has no array type; binding an array value fails, and registries
//! for [`Dialect::SQLite`](crate::Dialect::SQLite) reject array-keyed
//! relations up front.

use ::rusqlite::types::{FromSql, FromSqlResult, ToSqlOutput, ValueRef};
use ::rusqlite::{ToSql, params_from_iter};

use super::{Connection, Rows, VecRows};
use crate::error::DriverError;
use crate::value::Value;

impl ToSql for Value {
    fn to_sql(&self) -> ::rusqlite::Result<ToSqlOutput<'_>> {
        use ::rusqlite::types::Value as Owned;

        Ok(match self {
            Value::Null => ToSqlOutput::Owned(Owned::Null),
            Value::Bool(b) => ToSqlOutput::Owned(Owned::Integer(i64::from(*b))),
            Value::Int(i) => ToSqlOutput::Owned(Owned::Integer(*i)),
            Value::Float(f) => ToSqlOutput::Owned(Owned::Real(*f)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Bytes(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
            Value::Array(_) => {
                return Err(::rusqlite::Error::ToSqlConversionFailure(
                    "sqlite cannot bind an array value".into(),
                ));
            }
        })
    }
}

impl FromSql for Value {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        Ok(match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::Int(i),
            ValueRef::Real(r) => Value::Float(r),
            ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => Value::Bytes(b.to_vec()),
        })
    }
}

impl Connection for ::rusqlite::Connection {
    /// Rows are read eagerly; the statement is finalized before returning.
    fn query<'c>(
        &'c mut self,
        sql: &str,
        params: &[Value],
    ) -> Result<Box<dyn Rows + 'c>, DriverError> {
        let mut stmt = self.prepare(sql)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let width = columns.len();

        let mut out = Vec::new();
        let mut rows = stmt.query(params_from_iter(params.iter()))?;
        while let Some(row) = rows.next()? {
            let values = (0..width)
                .map(|i| row.get::<_, Value>(i))
                .collect::<::rusqlite::Result<Vec<_>>>()?;
            out.push(values);
        }
        Ok(Box::new(VecRows::new(columns, out)))
    }
}
