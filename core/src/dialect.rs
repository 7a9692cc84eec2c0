//! Dialect type re-exported from relink-types with core-specific extensions.

use std::borrow::Cow;

/// Re-export the unified Dialect enum from relink-types
pub use relink_types::{Dialect, DialectFeatures};

/// Extension trait for Dialect-specific rendering
pub trait DialectExt {
    /// Renders a placeholder for this dialect with the given 1-based index.
    ///
    /// Returns `Cow::Borrowed("?")` for SQLite/MySQL (zero allocation),
    /// `Cow::Owned` for PostgreSQL numbered placeholders.
    ///
    /// # Examples
    /// - PostgreSQL: `$1`, `$2`, `$3`
    /// - SQLite/MySQL: `?`
    fn render_placeholder(&self, index: usize) -> Cow<'static, str>;

    /// Appends `ident` to `out`, quoted, doubling any embedded quote.
    fn quote_ident(&self, out: &mut String, ident: &str);
}

impl DialectExt for Dialect {
    #[inline]
    fn render_placeholder(&self, index: usize) -> Cow<'static, str> {
        match self {
            Dialect::PostgreSQL => Cow::Owned(format!("${}", index)),
            Dialect::SQLite | Dialect::MySQL => Cow::Borrowed("?"),
        }
    }

    fn quote_ident(&self, out: &mut String, ident: &str) {
        let quote = self.ident_quote();
        out.push(quote);
        for c in ident.chars() {
            if c == quote {
                out.push(quote);
            }
            out.push(c);
        }
        out.push(quote);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders() {
        assert_eq!(Dialect::PostgreSQL.render_placeholder(3), "$3");
        assert_eq!(Dialect::SQLite.render_placeholder(3), "?");
    }

    #[test]
    fn quoting() {
        let mut out = String::new();
        Dialect::PostgreSQL.quote_ident(&mut out, "we\"ird");
        assert_eq!(out, "\"we\"\"ird\"");

        let mut out = String::new();
        Dialect::MySQL.quote_ident(&mut out, "books");
        assert_eq!(out, "`books`");
    }
}
