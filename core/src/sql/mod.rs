mod chunk;

pub use chunk::*;

use std::borrow::Cow;

use compact_str::CompactString;
use smallvec::SmallVec;

use crate::dialect::{Dialect, DialectExt};
use crate::error::{RelinkError, Result};
use crate::value::Value;

/// SQL fragment builder with flat chunk storage.
///
/// Uses `SmallVec<[SqlChunk; 8]>` for inline storage of typical SQL fragments
/// without heap allocation. Nothing is rendered until [`Sql::build`] is
/// called with a dialect.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sql {
    pub chunks: SmallVec<[SqlChunk; 8]>,
}

impl Sql {
    /// Creates an empty SQL fragment
    #[inline]
    pub const fn empty() -> Self {
        Self {
            chunks: SmallVec::new_const(),
        }
    }

    /// Creates SQL with raw text (unquoted)
    #[inline]
    pub fn raw(text: impl Into<Cow<'static, str>>) -> Self {
        Self {
            chunks: smallvec::smallvec![SqlChunk::raw(text)],
        }
    }

    /// Creates SQL with a quoted identifier
    #[inline]
    pub fn ident(name: impl Into<CompactString>) -> Self {
        Self {
            chunks: smallvec::smallvec![SqlChunk::ident(name)],
        }
    }

    /// Creates SQL with a qualified column reference
    #[inline]
    pub fn column(table: impl Into<CompactString>, column: impl Into<CompactString>) -> Self {
        Self {
            chunks: smallvec::smallvec![SqlChunk::column(table, column)],
        }
    }

    /// Creates SQL with a single parameter value
    #[inline]
    pub fn param(value: impl Into<Value>) -> Self {
        Self {
            chunks: smallvec::smallvec![SqlChunk::param(value)],
        }
    }

    /// Parses a caller-written fragment with `?` placeholders.
    ///
    /// Each `?` consumes the next value of `params`; `??` is a literal `?`
    /// (needed for the PostgreSQL `?|` family of operators). The number of
    /// placeholders must match the number of values.
    ///
    /// ```
    /// use relink_core::sql::Sql;
    /// use relink_core::Dialect;
    ///
    /// let sql = Sql::fragment("price > ? AND tags ?? 'new'", vec![10.into()]).unwrap();
    /// let (text, params) = sql.build(Dialect::PostgreSQL);
    /// assert_eq!(text, "price > $1 AND tags ? 'new'");
    /// assert_eq!(params.len(), 1);
    /// ```
    pub fn fragment(text: &str, params: Vec<Value>) -> Result<Self> {
        let mut sql = Sql::empty();
        let mut params = params.into_iter();
        let mut literal = String::new();
        let mut chars = text.chars().peekable();
        let mut expected = 0usize;

        while let Some(c) = chars.next() {
            if c != '?' {
                literal.push(c);
                continue;
            }
            if chars.peek() == Some(&'?') {
                chars.next();
                literal.push('?');
                continue;
            }
            expected += 1;
            if !literal.is_empty() {
                sql.push(SqlChunk::raw(core::mem::take(&mut literal)));
            }
            match params.next() {
                Some(value) => {
                    sql.push(SqlChunk::Param(value));
                }
                None => {
                    return Err(RelinkError::Query(format!(
                        "{text:?} has more placeholders than the {} parameters given",
                        expected - 1
                    )));
                }
            }
        }
        if !literal.is_empty() {
            sql.push(SqlChunk::raw(literal));
        }

        let extra = params.count();
        if extra > 0 {
            return Err(RelinkError::Query(format!(
                "{text:?} has {expected} placeholders but {} parameters were given",
                expected + extra
            )));
        }
        Ok(sql)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    #[inline]
    pub fn push(&mut self, chunk: SqlChunk) -> &mut Self {
        self.chunks.push(chunk);
        self
    }

    #[inline]
    pub fn push_raw(&mut self, text: &'static str) -> &mut Self {
        self.push(SqlChunk::raw_static(text))
    }

    #[inline]
    pub fn push_column(&mut self, table: &str, column: &str) -> &mut Self {
        self.push(SqlChunk::column(table, column))
    }

    #[inline]
    pub fn push_param(&mut self, value: Value) -> &mut Self {
        self.push(SqlChunk::Param(value))
    }

    /// Appends every chunk of `other`.
    #[inline]
    pub fn append(&mut self, other: Sql) -> &mut Self {
        self.chunks.extend(other.chunks);
        self
    }

    /// Appends `items` separated by `sep`.
    pub fn append_joined<I>(&mut self, items: I, sep: &'static str) -> &mut Self
    where
        I: IntoIterator<Item = Sql>,
    {
        for (i, item) in items.into_iter().enumerate() {
            if i > 0 {
                self.push_raw(sep);
            }
            self.append(item);
        }
        self
    }

    /// Wraps the fragment in parentheses.
    pub fn parens(mut self) -> Self {
        self.chunks.insert(0, SqlChunk::raw_static("("));
        self.push_raw(")");
        self
    }

    /// Renders the fragment for `dialect`, returning the text and the bound
    /// values in placeholder order.
    pub fn build(&self, dialect: Dialect) -> (String, Vec<Value>) {
        let mut out = String::with_capacity(self.chunks.len() * 8);
        let mut params = Vec::new();
        for chunk in &self.chunks {
            match chunk {
                SqlChunk::Raw(text) => out.push_str(text),
                SqlChunk::Ident(name) => dialect.quote_ident(&mut out, name),
                SqlChunk::Column { table, column } => {
                    dialect.quote_ident(&mut out, table);
                    out.push('.');
                    dialect.quote_ident(&mut out, column);
                }
                SqlChunk::Param(value) => {
                    params.push(value.clone());
                    out.push_str(&dialect.render_placeholder(params.len()));
                }
            }
        }
        (out, params)
    }
}

impl From<&'static str> for Sql {
    fn from(text: &'static str) -> Self {
        Sql::raw(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragment_splits_placeholders() {
        let sql = Sql::fragment("a = ? AND b = ?", vec![1.into(), "x".into()]).unwrap();
        let (text, params) = sql.build(Dialect::SQLite);
        assert_eq!(text, "a = ? AND b = ?");
        assert_eq!(params, vec![Value::Int(1), Value::from("x")]);

        let (text, _) = sql.build(Dialect::PostgreSQL);
        assert_eq!(text, "a = $1 AND b = $2");
    }

    #[test]
    fn fragment_escaped_question_mark() {
        let sql = Sql::fragment("data ?? 'k'", vec![]).unwrap();
        assert_eq!(sql.build(Dialect::PostgreSQL).0, "data ? 'k'");
    }

    #[test]
    fn fragment_count_mismatch() {
        assert!(matches!(
            Sql::fragment("a = ? AND b = ?", vec![1.into()]),
            Err(RelinkError::Query(_))
        ));
        assert!(matches!(
            Sql::fragment("a = 1", vec![1.into()]),
            Err(RelinkError::Query(_))
        ));
    }

    #[test]
    fn build_quotes_columns() {
        let mut sql = Sql::column("book", "author_id");
        sql.push_raw(" = ").push_param(Value::Int(7));
        let (text, params) = sql.parens().build(Dialect::PostgreSQL);
        assert_eq!(text, "(\"book\".\"author_id\" = $1)");
        assert_eq!(params, vec![Value::Int(7)]);
    }

    #[test]
    fn append_joined_separates() {
        let mut sql = Sql::empty();
        sql.append_joined([Sql::ident("a"), Sql::ident("b"), Sql::ident("c")], ", ");
        assert_eq!(sql.build(Dialect::MySQL).0, "`a`, `b`, `c`");
    }
}
