use std::borrow::Cow;

use compact_str::CompactString;

use crate::value::Value;

/// A SQL chunk represents a part of an SQL statement.
///
/// - `Raw` - Unquoted SQL text (keywords, operators, punctuation)
/// - `Ident` - Quoted identifier (`"books"`)
/// - `Column` - Qualified column reference (`"book"."author_id"`)
/// - `Param` - Bound value, rendered as the dialect's placeholder
#[derive(Debug, Clone, PartialEq)]
pub enum SqlChunk {
    /// Raw SQL text (unquoted)
    /// Renders as: text (no quotes, as-is)
    Raw(Cow<'static, str>),

    /// Quoted identifier for table, alias and column names
    /// Renders as: "name" (with quotes)
    Ident(CompactString),

    /// Column qualified by a table alias
    /// Renders as: "alias"."column"
    Column {
        table: CompactString,
        column: CompactString,
    },

    /// Parameter value
    /// Renders as: ? or $1 depending on the dialect
    Param(Value),
}

impl SqlChunk {
    #[inline]
    pub const fn raw_static(text: &'static str) -> Self {
        Self::Raw(Cow::Borrowed(text))
    }

    #[inline]
    pub fn raw(text: impl Into<Cow<'static, str>>) -> Self {
        Self::Raw(text.into())
    }

    #[inline]
    pub fn ident(name: impl Into<CompactString>) -> Self {
        Self::Ident(name.into())
    }

    #[inline]
    pub fn column(table: impl Into<CompactString>, column: impl Into<CompactString>) -> Self {
        Self::Column {
            table: table.into(),
            column: column.into(),
        }
    }

    #[inline]
    pub fn param(value: impl Into<Value>) -> Self {
        Self::Param(value.into())
    }
}
