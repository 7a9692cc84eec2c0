//! [`Connection`] for the synchronous `postgres::Client`.

use std::error::Error;

use ::postgres::types::{FromSql, IsNull, Kind, ToSql, Type, to_sql_checked};
use bytes::BytesMut;

use super::{Connection, Rows, VecRows};
use crate::error::DriverError;
use crate::value::Value;

impl ToSql for Value {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        match self {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(b) => b.to_sql(ty, out),
            // narrow to the declared column width
            Value::Int(i) => match *ty {
                Type::INT2 => i16::try_from(*i)?.to_sql(ty, out),
                Type::INT4 => i32::try_from(*i)?.to_sql(ty, out),
                Type::OID => u32::try_from(*i)?.to_sql(ty, out),
                _ => i.to_sql(ty, out),
            },
            Value::Float(f) => match *ty {
                // FLOAT4 keeps about 7 significant digits; the rounding is
                // accepted, overflowing to infinity is not
                Type::FLOAT4 => {
                    let narrowed = *f as f32;
                    if f.is_finite() && !narrowed.is_finite() {
                        return Err(format!("{f} is out of range for {ty}").into());
                    }
                    narrowed.to_sql(ty, out)
                }
                _ => f.to_sql(ty, out),
            },
            Value::Text(s) => s.as_str().to_sql(ty, out),
            Value::Bytes(b) => b.as_slice().to_sql(ty, out),
            Value::Array(items) => match ty.kind() {
                Kind::Array(_) => items.to_sql(ty, out),
                _ => Err(format!("cannot bind an array as {ty}").into()),
            },
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

impl<'a> FromSql<'a> for Value {
    fn from_sql(ty: &Type, raw: &'a [u8]) -> Result<Self, Box<dyn Error + Sync + Send>> {
        Ok(match *ty {
            Type::BOOL => Value::Bool(bool::from_sql(ty, raw)?),
            Type::INT2 => Value::Int(i16::from_sql(ty, raw)?.into()),
            Type::INT4 => Value::Int(i32::from_sql(ty, raw)?.into()),
            Type::INT8 => Value::Int(i64::from_sql(ty, raw)?),
            Type::OID => Value::Int(u32::from_sql(ty, raw)?.into()),
            Type::FLOAT4 => Value::Float(f32::from_sql(ty, raw)?.into()),
            Type::FLOAT8 => Value::Float(f64::from_sql(ty, raw)?),
            Type::BYTEA => Value::Bytes(Vec::<u8>::from_sql(ty, raw)?),
            _ => match ty.kind() {
                Kind::Array(_) => Value::Array(Vec::<Value>::from_sql(ty, raw)?),
                _ => Value::Text(String::from_sql(ty, raw)?),
            },
        })
    }

    fn from_sql_null(_ty: &Type) -> Result<Self, Box<dyn Error + Sync + Send>> {
        Ok(Value::Null)
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}

impl Connection for ::postgres::Client {
    /// Prepares `sql` to learn the result columns, then reads every row.
    fn query<'c>(
        &'c mut self,
        sql: &str,
        params: &[Value],
    ) -> Result<Box<dyn Rows + 'c>, DriverError> {
        let statement = self.prepare(sql)?;
        let columns: Vec<String> = statement
            .columns()
            .iter()
            .map(|c| c.name().to_owned())
            .collect();
        let params: Vec<&(dyn ToSql + Sync)> =
            params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();

        let rows = ::postgres::Client::query(self, &statement, &params)?;
        let values = rows
            .iter()
            .map(|row| {
                (0..columns.len())
                    .map(|i| row.try_get::<_, Value>(i))
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Box::new(VecRows::new(columns, values)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binds_int_with_column_width() {
        let mut out = BytesMut::new();
        Value::Int(7).to_sql(&Type::INT4, &mut out).unwrap();
        assert_eq!(&out[..], &7i32.to_be_bytes());

        let mut out = BytesMut::new();
        assert!(Value::Int(i64::MAX).to_sql(&Type::INT2, &mut out).is_err());
    }

    #[test]
    fn float4_rounds_but_rejects_overflow() {
        let mut out = BytesMut::new();
        Value::Float(1.5).to_sql(&Type::FLOAT4, &mut out).unwrap();
        assert_eq!(&out[..], &1.5f32.to_be_bytes());

        let mut out = BytesMut::new();
        assert!(Value::Float(1e300).to_sql(&Type::FLOAT4, &mut out).is_err());
        let mut out = BytesMut::new();
        assert!(Value::Float(f64::INFINITY).to_sql(&Type::FLOAT4, &mut out).is_ok());
    }

    #[test]
    fn decodes_by_column_type() {
        let raw = 42i64.to_be_bytes();
        assert_eq!(Value::from_sql(&Type::INT8, &raw).unwrap(), Value::Int(42));
        assert_eq!(Value::from_sql(&Type::TEXT, b"hi").unwrap(), Value::from("hi"));
        assert_eq!(Value::from_sql_null(&Type::TEXT).unwrap(), Value::Null);
    }

    #[test]
    fn array_needs_array_column() {
        let mut out = BytesMut::new();
        assert!(Value::from(vec![1, 2]).to_sql(&Type::INT8, &mut out).is_err());

        let mut out = BytesMut::new();
        assert!(Value::from(vec![1, 2]).to_sql(&Type::INT8_ARRAY, &mut out).is_ok());
    }
}
