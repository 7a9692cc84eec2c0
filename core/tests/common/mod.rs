#![allow(dead_code)]

use std::collections::VecDeque;

use relink_core::schema::FieldType;
use relink_core::{Connection, DriverError, Rows, ScalarType, Value, VecRows};

pub const INT: FieldType = FieldType::Scalar(ScalarType::Int);
pub const TEXT: FieldType = FieldType::Scalar(ScalarType::Text);
pub const INTS: FieldType = FieldType::Array(ScalarType::Int);

/// Connection that answers statements from a script, in order, and keeps
/// every statement it was given.
#[derive(Debug, Default)]
pub struct Scripted {
    replies: VecDeque<VecRows>,
    pub log: Vec<(String, Vec<Value>)>,
}

impl Scripted {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(mut self, columns: &[&str], rows: Vec<Vec<Value>>) -> Self {
        let columns = columns.iter().map(|c| (*c).to_owned()).collect();
        self.replies.push_back(VecRows::new(columns, rows));
        self
    }

    pub fn statements(&self) -> Vec<&str> {
        self.log.iter().map(|(sql, _)| sql.as_str()).collect()
    }

    pub fn params(&self, i: usize) -> &[Value] {
        &self.log[i].1
    }
}

impl Connection for Scripted {
    fn query<'c>(
        &'c mut self,
        sql: &str,
        params: &[Value],
    ) -> Result<Box<dyn Rows + 'c>, DriverError> {
        self.log.push((sql.to_owned(), params.to_vec()));
        match self.replies.pop_front() {
            Some(rows) => Ok(Box::new(rows)),
            None => Err(format!("no scripted reply for {sql}").into()),
        }
    }
}

pub fn ints(values: &[i64]) -> Value {
    Value::Array(values.iter().copied().map(Value::Int).collect())
}
