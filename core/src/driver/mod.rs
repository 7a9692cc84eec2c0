//! Connection seam between the query layer and a database client.
//!
//! The query layer hands rendered SQL and ordered parameters to a
//! [`Connection`] and reads rows back through [`Rows`]. Adapters for
//! `rusqlite` and `postgres` are behind their features; tests and other
//! clients implement the two traits directly.

#[cfg(feature = "postgres-sync")]
pub mod postgres;
#[cfg(feature = "rusqlite")]
pub mod rusqlite;

use crate::error::DriverError;
use crate::value::Value;

/// Result set of one statement, read row by row.
pub trait Rows {
    /// Result column names, in row order.
    fn columns(&self) -> &[String];

    /// Next row, one value per column; `None` once exhausted.
    fn next_row(&mut self) -> Result<Option<Vec<Value>>, DriverError>;
}

/// Executes one statement with positional parameters.
pub trait Connection {
    fn query<'c>(
        &'c mut self,
        sql: &str,
        params: &[Value],
    ) -> Result<Box<dyn Rows + 'c>, DriverError>;
}

impl<C: Connection + ?Sized> Connection for &mut C {
    fn query<'c>(
        &'c mut self,
        sql: &str,
        params: &[Value],
    ) -> Result<Box<dyn Rows + 'c>, DriverError> {
        (**self).query(sql, params)
    }
}

/// Buffered rows.
#[derive(Debug, Clone, Default)]
pub struct VecRows {
    columns: Vec<String>,
    rows: std::vec::IntoIter<Vec<Value>>,
}

impl VecRows {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self {
            columns,
            rows: rows.into_iter(),
        }
    }
}

impl Rows for VecRows {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn next_row(&mut self) -> Result<Option<Vec<Value>>, DriverError> {
        Ok(self.rows.next())
    }
}
