//! Query composition and relation loading.

mod assemble;
mod join;
mod scan;
mod select;

pub use select::{RelationFn, SelectQuery};
