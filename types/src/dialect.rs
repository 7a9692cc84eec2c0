//! Unified database dialect enum
//!
//! Single source of truth for dialect identification. The relation composer
//! asks the dialect for its placeholder style, its identifier quote and the
//! default [`DialectFeatures`] it supports.

use crate::features::DialectFeatures;

/// SQL dialect for database-specific behavior
///
/// # Examples
///
/// ```
/// use relink_types::Dialect;
///
/// let dialect = Dialect::PostgreSQL;
/// assert!(dialect.uses_numbered_placeholders());
///
/// let sqlite = Dialect::SQLite;
/// assert!(!sqlite.uses_numbered_placeholders());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Dialect {
    /// SQLite - uses `?` positional placeholders
    #[default]
    SQLite,

    /// PostgreSQL - uses `$1, $2, ...` numbered placeholders
    PostgreSQL,

    /// MySQL - uses `?` positional placeholders
    MySQL,
}

impl Dialect {
    /// Returns `true` if this dialect uses numbered placeholders (`$1, $2, ...`)
    #[inline]
    #[must_use]
    pub const fn uses_numbered_placeholders(&self) -> bool {
        matches!(self, Dialect::PostgreSQL)
    }

    /// Parse a dialect from a string (case-insensitive)
    ///
    /// Supports various common aliases:
    /// - SQLite: `"sqlite"`, `"turso"`, `"libsql"`
    /// - PostgreSQL: `"postgresql"`, `"postgres"`, `"pg"`
    /// - MySQL: `"mysql"`
    ///
    /// ```
    /// use relink_types::Dialect;
    ///
    /// assert_eq!(Dialect::parse("sqlite"), Some(Dialect::SQLite));
    /// assert_eq!(Dialect::parse("pg"), Some(Dialect::PostgreSQL));
    /// assert_eq!(Dialect::parse("unknown"), None);
    /// ```
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("sqlite")
            || s.eq_ignore_ascii_case("turso")
            || s.eq_ignore_ascii_case("libsql")
        {
            Some(Dialect::SQLite)
        } else if s.eq_ignore_ascii_case("postgresql")
            || s.eq_ignore_ascii_case("postgres")
            || s.eq_ignore_ascii_case("pg")
        {
            Some(Dialect::PostgreSQL)
        } else if s.eq_ignore_ascii_case("mysql") {
            Some(Dialect::MySQL)
        } else {
            None
        }
    }

    /// Quote character used around identifiers.
    #[inline]
    #[must_use]
    pub const fn ident_quote(&self) -> char {
        match self {
            Dialect::SQLite | Dialect::PostgreSQL => '"',
            Dialect::MySQL => '`',
        }
    }

    /// Capabilities this dialect has out of the box.
    ///
    /// - PostgreSQL: row-value `IN` and the `ANY` / `@>` array operators
    /// - MySQL: row-value `IN` only
    /// - SQLite: neither (row values on the right of `IN` need a subquery)
    #[must_use]
    pub const fn features(&self) -> DialectFeatures {
        match self {
            Dialect::PostgreSQL => DialectFeatures::new().composite_in(true).array_ops(true),
            Dialect::MySQL => DialectFeatures::new().composite_in(true),
            Dialect::SQLite => DialectFeatures::new(),
        }
    }

    /// Get the dialect name as a lowercase string
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Dialect::SQLite => "sqlite",
            Dialect::PostgreSQL => "postgresql",
            Dialect::MySQL => "mysql",
        }
    }
}

impl core::fmt::Display for Dialect {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for Dialect {
    type Err = DialectParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Dialect::parse(s).ok_or(DialectParseError)
    }
}

/// Error returned when parsing an unknown dialect string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialectParseError;

impl core::fmt::Display for DialectParseError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("unknown dialect")
    }
}

impl std::error::Error for DialectParseError {}
