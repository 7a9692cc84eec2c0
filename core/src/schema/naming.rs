//! Default names for columns, models and tables.

use compact_str::{CompactString, ToCompactString};
use heck::ToSnakeCase;

/// Column name of a field without an explicit name: `AuthorID` -> `author_id`.
pub fn column_name(field: &str) -> CompactString {
    field.to_snake_case().to_compact_string()
}

/// Model name of a Rust type path: `app::models::BookGenre<T>` -> `book_genre`.
pub fn model_name(type_name: &str) -> CompactString {
    let base = type_name.split('<').next().unwrap_or(type_name);
    let last = base.rsplit("::").next().unwrap_or(base);
    column_name(last)
}

/// Table name of a model: the plural of its last word.
pub fn table_name(model: &str) -> CompactString {
    let mut out = CompactString::from(model);
    if let Some(stem) = model.strip_suffix('y') {
        let before = stem.chars().last();
        if before.is_some_and(|c| !"aeiou".contains(c)) {
            out = CompactString::from(stem);
            out.push_str("ies");
            return out;
        }
    }
    if ["s", "x", "z", "ch", "sh"].iter().any(|s| model.ends_with(s)) {
        out.push_str("es");
    } else {
        out.push('s');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn columns() {
        assert_eq!(column_name("AuthorID"), "author_id");
        assert_eq!(column_name("item_ids"), "item_ids");
        assert_eq!(column_name("createdAt"), "created_at");
    }

    #[test]
    fn models() {
        assert_eq!(model_name("app::models::BookGenre"), "book_genre");
        assert_eq!(model_name("Item"), "item");
        assert_eq!(model_name("crate::Wrapper<crate::Item>"), "wrapper");
    }

    #[test]
    fn tables() {
        assert_eq!(table_name("book"), "books");
        assert_eq!(table_name("category"), "categories");
        assert_eq!(table_name("key"), "keys");
        assert_eq!(table_name("address"), "addresses");
        assert_eq!(table_name("box"), "boxes");
        assert_eq!(table_name("branch"), "branches");
        assert_eq!(table_name("book_genre"), "book_genres");
    }
}
