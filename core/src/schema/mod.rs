//! Model declarations, table descriptors and the registry that caches them.

mod decl;
mod field;
pub mod naming;
mod registry;
mod relation;
mod table;
mod tag;

pub use decl::{FieldDecl, FieldType, Model, TableDecl, TypeRef, Valuer};
pub use field::Field;
pub use registry::Registry;
pub use relation::{
    ArraySide, Discriminator, KeyPair, ManyToMany, Relation, RelationKind, Storage,
};
pub use table::{Table, TableShape};
pub use tag::Tag;
