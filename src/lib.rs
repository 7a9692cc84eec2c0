//! # relink
//!
//! Relation loading for struct-mapped models, on SQLite and PostgreSQL.
//!
//! Models declare their columns and relations through [`Model`]. A
//! [`Registry`] resolves each declaration into a table descriptor once and
//! shares it; [`SelectQuery`] loads records with their has-one,
//! belongs-to, has-many, polymorphic and many-to-many relations, including
//! relations keyed by array columns on PostgreSQL.
//!
//! ## Database Support
//!
//! | Database   | Driver   | Feature Flag    |
//! |------------|----------|-----------------|
//! | SQLite     | rusqlite | `rusqlite`      |
//! | PostgreSQL | postgres | `postgres-sync` |
//!
//! Other clients plug in by implementing [`Connection`].

mod db;

pub use db::Db;

/// Result type for relink operations
pub use relink_core::Result;

/// Database dialect enum
pub use relink_types::{Dialect, DialectFeatures};

pub use relink_core::{
    CompositeKey, Connection, Record, RegistryConfig, Rows, ScalarType, SelectQuery, Slot,
    Value, VecRows,
};

/// Error types
pub mod error {
    pub use relink_core::error::{ConfigError, DriverError, RelinkError};
}

/// Model declarations, descriptors and the registry.
pub mod schema {
    pub use relink_core::schema::*;
}

pub use schema::{FieldType, Model, Registry, TableDecl};

/// Raw SQL fragments.
pub mod sql {
    pub use relink_core::sql::{Sql, SqlChunk};
}

pub mod prelude {
    pub use crate::Db;
    pub use relink_core::prelude::*;
    pub use relink_core::schema::{FieldType, Model, TableDecl};
}
