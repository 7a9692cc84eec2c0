//! Shared type definitions for relink
//!
//! - [`Dialect`] - Database dialect enum (SQLite, PostgreSQL, MySQL)
//! - [`DialectFeatures`] - optional capabilities a dialect supports
//!
//! # Features
//!
//! - `serde` - Enable serde serialization/deserialization

mod dialect;
mod features;

pub use dialect::{Dialect, DialectParseError};
pub use features::DialectFeatures;

/// Prelude module for commonly used types
pub mod prelude {
    pub use crate::{Dialect, DialectFeatures};
}
