#![cfg(feature = "rusqlite")]

mod common;

use common::{INT, TEXT};
use relink_core::schema::{FieldType, Model, TableDecl};
use relink_core::{Dialect, Registry, ScalarType, Value};
use rusqlite::Connection;

struct Author;
impl Model for Author {
    fn declare() -> TableDecl {
        TableDecl::new()
            .field("ID", INT, ",pk")
            .field("Name", TEXT, "")
            .field("Books", FieldType::slice_of::<Book>(), "rel:has-many")
    }
}

struct Book;
impl Model for Book {
    fn declare() -> TableDecl {
        TableDecl::new()
            .field("ID", INT, ",pk")
            .field("AuthorID", INT, "")
            .field("Title", TEXT, "")
            .field("DeletedAt", FieldType::Nullable(ScalarType::Int), ",soft_delete")
            .field("Author", FieldType::ptr_of::<Author>(), "rel:belongs-to")
    }
}

fn setup_db() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE authors (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
         CREATE TABLE books (
             id INTEGER PRIMARY KEY,
             author_id INTEGER NOT NULL,
             title TEXT NOT NULL,
             deleted_at INTEGER
         );
         INSERT INTO authors VALUES (1, 'le guin'), (2, 'banks'), (3, 'unpublished');
         INSERT INTO books VALUES
             (10, 1, 'the dispossessed', NULL),
             (11, 2, 'excession', NULL),
             (12, 1, 'the lathe of heaven', NULL),
             (13, 2, 'withdrawn', 1700000000);",
    )
    .unwrap();
    conn
}

fn titles(registry: &Registry, author: &relink_core::Record) -> Vec<String> {
    let authors = registry.table::<Author>().unwrap();
    let books = registry.table::<Book>().unwrap();
    authors
        .many(author, "Books")
        .iter()
        .map(|b| books.value(b, "title").and_then(Value::as_str).unwrap().to_owned())
        .collect()
}

#[test]
fn has_many_against_sqlite() {
    let mut conn = setup_db();
    let registry = Registry::new(Dialect::SQLite);

    let authors = registry
        .select::<Author>()
        .unwrap()
        .relation_with("Books", |q| q.order_expr("?TableAlias.id"))
        .order_expr("?TableAlias.id")
        .scan(&mut conn)
        .unwrap();

    assert_eq!(authors.len(), 3);
    assert_eq!(titles(&registry, &authors[0]), ["the dispossessed", "the lathe of heaven"]);
    assert_eq!(titles(&registry, &authors[1]), ["excession"]);
    assert!(titles(&registry, &authors[2]).is_empty());
}

#[test]
fn soft_deleted_rows_can_be_included() {
    let mut conn = setup_db();
    let registry = Registry::new(Dialect::SQLite);

    let authors = registry
        .select::<Author>()
        .unwrap()
        .where_expr("?TableAlias.id = ?", vec![Value::Int(2)])
        .relation_with("Books", |q| q.order_expr("?TableAlias.id"))
        .with_deleted()
        .scan(&mut conn)
        .unwrap();

    assert_eq!(titles(&registry, &authors[0]), ["excession", "withdrawn"]);
}

#[test]
fn belongs_to_with_nested_has_many() {
    let mut conn = setup_db();
    let registry = Registry::new(Dialect::SQLite);

    let books = registry
        .select::<Book>()
        .unwrap()
        .relation("Author.Books")
        .order_expr("?TableAlias.id")
        .scan(&mut conn)
        .unwrap();

    let book = registry.table::<Book>().unwrap();
    let author = registry.table::<Author>().unwrap();
    assert_eq!(books.len(), 3);

    let excession = &books[1];
    let banks = book.one(excession, "Author").unwrap();
    assert_eq!(author.value(banks, "name"), Some(&Value::from("banks")));
    assert_eq!(titles(&registry, banks), ["excession"]);
}
