//! Model declarations.
//!
//! A [`Model`] describes its shape with a [`TableDecl`]: the fields in
//! declaration order, each with a [`FieldType`] and a tag string. The
//! registry turns the declaration into a table descriptor once per type.

use core::any::TypeId;
use core::fmt;
use core::hash::{Hash, Hasher};

use compact_str::CompactString;

use crate::value::{ScalarType, Value};

/// A record type known to the registry.
///
/// ```
/// use relink_core::schema::{FieldType, Model, TableDecl};
/// use relink_core::ScalarType;
///
/// struct Author;
///
/// impl Model for Author {
///     fn declare() -> TableDecl {
///         TableDecl::new()
///             .field("id", FieldType::Scalar(ScalarType::Int), ",pk")
///             .field("name", FieldType::Scalar(ScalarType::Text), "")
///     }
/// }
/// ```
pub trait Model: 'static {
    fn declare() -> TableDecl;
}

/// Custom conversion applied to a field's value before it is bound as a
/// parameter or used in a composite key.
pub type Valuer = fn(&Value) -> Value;

/// Identity of a [`Model`] type plus its declaration function.
#[derive(Clone, Copy)]
pub struct TypeRef {
    id: TypeId,
    name: &'static str,
    declare: fn() -> TableDecl,
}

impl TypeRef {
    #[inline]
    pub fn of<M: Model>() -> Self {
        Self {
            id: TypeId::of::<M>(),
            name: core::any::type_name::<M>(),
            declare: M::declare,
        }
    }

    #[inline]
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Full type path, as reported by `type_name`.
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Last path segment without generic arguments.
    pub fn short_name(&self) -> &'static str {
        let base = self.name.split('<').next().unwrap_or(self.name);
        base.rsplit("::").next().unwrap_or(base)
    }

    #[inline]
    pub fn declare(&self) -> TableDecl {
        (self.declare)()
    }
}

impl PartialEq for TypeRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeRef {}

impl Hash for TypeRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Type of a declared field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// Non-nullable column; NULL scans as the zero value
    Scalar(ScalarType),
    /// Nullable column (`Option<T>` / pointer)
    Nullable(ScalarType),
    /// Array column (`Vec<T>`); nil and empty both hold no elements
    Array(ScalarType),
    /// Struct held by value
    Struct(TypeRef),
    /// Struct held by pointer
    Ptr(TypeRef),
    /// Slice of structs
    Slice(TypeRef),
}

impl FieldType {
    #[inline]
    pub fn struct_of<M: Model>() -> Self {
        FieldType::Struct(TypeRef::of::<M>())
    }

    #[inline]
    pub fn ptr_of<M: Model>() -> Self {
        FieldType::Ptr(TypeRef::of::<M>())
    }

    #[inline]
    pub fn slice_of<M: Model>() -> Self {
        FieldType::Slice(TypeRef::of::<M>())
    }

    /// Column element type, `None` for struct-typed fields.
    pub fn scalar(&self) -> Option<ScalarType> {
        match self {
            FieldType::Scalar(t) | FieldType::Nullable(t) | FieldType::Array(t) => Some(*t),
            _ => None,
        }
    }

    /// Target model of struct-typed fields.
    pub fn target(&self) -> Option<TypeRef> {
        match self {
            FieldType::Struct(t) | FieldType::Ptr(t) | FieldType::Slice(t) => Some(*t),
            _ => None,
        }
    }
}

/// One declared field.
#[derive(Debug, Clone)]
pub struct FieldDecl {
    pub name: CompactString,
    pub ty: FieldType,
    pub tag: CompactString,
    /// Anonymous (embedded) field whose members are promoted
    pub anonymous: bool,
    pub valuer: Option<Valuer>,
}

/// Declaration of a model: table-level tag plus fields.
#[derive(Debug, Clone, Default)]
pub struct TableDecl {
    pub tag: CompactString,
    pub fields: Vec<FieldDecl>,
}

impl TableDecl {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Table-level tag: `table:<name>`, `alias:<alias>`.
    pub fn tag(mut self, tag: &str) -> Self {
        self.tag = CompactString::from(tag);
        self
    }

    pub fn field(mut self, name: &str, ty: FieldType, tag: &str) -> Self {
        self.fields.push(FieldDecl {
            name: CompactString::from(name),
            ty,
            tag: CompactString::from(tag),
            anonymous: false,
            valuer: None,
        });
        self
    }

    /// Anonymous embed held by value; its fields are promoted.
    pub fn embed(self, ty: TypeRef, tag: &str) -> Self {
        self.anonymous(FieldType::Struct(ty), tag)
    }

    /// Anonymous embed held by pointer; its fields are promoted.
    pub fn embed_ptr(self, ty: TypeRef, tag: &str) -> Self {
        self.anonymous(FieldType::Ptr(ty), tag)
    }

    /// Sets the value conversion of the most recently declared field.
    pub fn valuer(mut self, valuer: Valuer) -> Self {
        if let Some(last) = self.fields.last_mut() {
            last.valuer = Some(valuer);
        }
        self
    }

    fn anonymous(mut self, ty: FieldType, tag: &str) -> Self {
        let name = ty.target().map_or("", |t| t.short_name());
        self.fields.push(FieldDecl {
            name: CompactString::from(name),
            ty,
            tag: CompactString::from(tag),
            anonymous: true,
            valuer: None,
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Base;
    impl Model for Base {
        fn declare() -> TableDecl {
            TableDecl::new().field("id", FieldType::Scalar(ScalarType::Int), ",pk")
        }
    }

    struct Other;
    impl Model for Other {
        fn declare() -> TableDecl {
            TableDecl::new()
        }
    }

    #[test]
    fn type_ref_identity() {
        assert_eq!(TypeRef::of::<Base>(), TypeRef::of::<Base>());
        assert_ne!(TypeRef::of::<Base>(), TypeRef::of::<Other>());
        assert_eq!(TypeRef::of::<Base>().short_name(), "Base");
        assert_eq!(TypeRef::of::<Base>().declare().fields.len(), 1);
    }

    #[test]
    fn embed_uses_type_name() {
        let decl = TableDecl::new()
            .embed(TypeRef::of::<Base>(), "extend")
            .field("name", FieldType::Nullable(ScalarType::Text), "")
            .valuer(|v| v.clone());
        assert!(decl.fields[0].anonymous);
        assert_eq!(decl.fields[0].name, "Base");
        assert!(decl.fields[1].valuer.is_some());
    }
}
