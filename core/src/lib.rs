//! Relation resolution and query composition over dynamically described
//! models.
//!
//! Models describe their columns and relations once through
//! [`Model::declare`](schema::Model::declare). A [`Registry`] turns the
//! declaration into a cached [`Table`](schema::Table) descriptor, resolving
//! each relation to its keys. [`SelectQuery`] then loads records together
//! with their relations: singular relations through `LEFT JOIN`s, plural
//! relations through one follow-up query each, whose rows are distributed to
//! their owners by key. Array-typed key columns are matched element by
//! element.
//!
//! ```
//! use relink_core::prelude::*;
//! use relink_core::{FieldType, Model, TableDecl};
//!
//! struct Author;
//! impl Model for Author {
//!     fn declare() -> TableDecl {
//!         TableDecl::new().field("ID", FieldType::Scalar(ScalarType::Int), ",pk")
//!     }
//! }
//!
//! struct Book;
//! impl Model for Book {
//!     fn declare() -> TableDecl {
//!         TableDecl::new()
//!             .field("ID", FieldType::Scalar(ScalarType::Int), ",pk")
//!             .field("AuthorID", FieldType::Scalar(ScalarType::Int), "")
//!             .field("Author", FieldType::ptr_of::<Author>(), "rel:belongs-to")
//!     }
//! }
//!
//! let registry = Registry::new(Dialect::SQLite);
//! let (sql, _) = registry.select::<Book>()?.relation("Author").to_sql()?;
//! assert!(sql.contains("LEFT JOIN \"authors\" AS \"book__author\""));
//! # Ok::<(), relink_core::RelinkError>(())
//! ```

#[macro_use]
mod tracing;

pub mod config;
pub mod dialect;
pub mod driver;
pub mod error;
pub mod key;
pub mod query;
pub mod record;
pub mod schema;
pub mod sql;
pub mod value;

pub use config::RegistryConfig;
pub use dialect::{Dialect, DialectFeatures};
pub use driver::{Connection, Rows, VecRows};
pub use error::{ConfigError, DriverError, RelinkError, Result};
pub use key::{CompositeKey, expand_keys};
pub use query::{RelationFn, SelectQuery};
pub use record::{FieldPath, Record, Slot};
pub use schema::{FieldType, Model, Registry, TableDecl};
pub use value::{ScalarType, Value};

/// Prelude module for commonly used types
pub mod prelude {
    pub use crate::{
        Connection, Dialect, Record, Registry, RelinkError, ScalarType, SelectQuery, Value,
    };
}
