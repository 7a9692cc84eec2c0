use core::any::TypeId;
use core::ops::Deref;
use std::sync::Arc;

use compact_str::{CompactString, format_compact};
use hashbrown::HashMap;
use hashbrown::hash_map::Entry;
use smallvec::SmallVec;

use crate::error::ConfigError;
use crate::record::{FieldPath, Record, Slot};
use crate::schema::decl::{FieldType, TypeRef};
use crate::schema::field::Field;
use crate::schema::naming;
use crate::schema::relation::{Relation, RelationSpec, Storage};
use crate::schema::tag::Tag;
use crate::value::Value;

/// Fields-only descriptor of a model: columns, keys, naming and the zero
/// record. Relations are recorded as unresolved specs; see [`Table`].
#[derive(Debug)]
pub struct TableShape {
    type_ref: TypeRef,
    model_name: CompactString,
    name: CompactString,
    alias: CompactString,
    fields: Vec<Field>,
    /// Lookup-only fields (nested columns of `scanonly` structs)
    hidden: Vec<Field>,
    field_map: HashMap<CompactString, usize>,
    pks: SmallVec<[usize; 2]>,
    soft_delete: Option<usize>,
    pub(crate) relation_specs: Vec<RelationSpec>,
    template: Record,
}

impl TableShape {
    #[inline]
    pub fn type_ref(&self) -> TypeRef {
        self.type_ref
    }

    /// Short Rust type name, used in messages.
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_ref.short_name()
    }

    #[inline]
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// Columns in declaration order, embedded columns in place.
    #[inline]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Field by column name, `alt:` name or `scanonly` nested name.
    pub fn field(&self, name: &str) -> Option<&Field> {
        let i = *self.field_map.get(name)?;
        self.fields
            .get(i)
            .or_else(|| self.hidden.get(i - self.fields.len()))
    }

    pub fn pks(&self) -> impl ExactSizeIterator<Item = &Field> + '_ {
        self.pks.iter().map(|&i| &self.fields[i])
    }

    pub fn soft_delete_field(&self) -> Option<&Field> {
        self.soft_delete.map(|i| &self.fields[i])
    }

    /// Columns selected by default.
    pub fn select_fields(&self) -> impl Iterator<Item = &Field> + '_ {
        self.fields.iter().filter(|f| !f.scan_only)
    }

    /// Columns included in INSERT / UPDATE lists.
    pub fn writable_fields(&self) -> impl Iterator<Item = &Field> + '_ {
        self.fields.iter().filter(|f| !f.scan_only)
    }

    /// Fresh record holding zero values.
    #[inline]
    pub fn new_record(&self) -> Record {
        self.template.clone()
    }

    /// Stored value of `column` in `record`.
    pub fn value<'r>(&self, record: &'r Record, column: &str) -> Option<&'r Value> {
        self.field(column)?.get(record)
    }

    pub fn set(&self, record: &mut Record, column: &str, value: Value) -> bool {
        match self.field(column) {
            Some(field) => field.set(record, value),
            None => false,
        }
    }

    /// Related record of a singular relation; `None` when unset.
    pub fn one<'r>(&self, record: &'r Record, relation: &str) -> Option<&'r Record> {
        record.child(&self.relation_spec(relation)?.path)
    }

    /// Related records of a plural relation.
    pub fn many<'r>(&self, record: &'r Record, relation: &str) -> &'r [Record] {
        match self.relation_spec(relation) {
            Some(spec) => record.list(&spec.path),
            None => &[],
        }
    }

    pub(crate) fn relation_spec(&self, name: &str) -> Option<&RelationSpec> {
        self.relation_specs
            .iter()
            .find(|s| s.name == name || s.column == name)
    }

    pub(crate) fn malformed(&self, field: &str, tag: &str, reason: String) -> ConfigError {
        malformed(self.type_name(), field, tag, reason)
    }
}

fn malformed(type_name: &str, field: &str, tag: &str, reason: String) -> ConfigError {
    ConfigError::MalformedTag {
        type_name: type_name.to_owned(),
        field: field.to_owned(),
        tag: tag.to_owned(),
        reason,
    }
}

/// Table descriptor with resolved relations.
///
/// Derefs to its [`TableShape`].
#[derive(Debug)]
pub struct Table {
    shape: Arc<TableShape>,
    relations: Vec<Arc<Relation>>,
}

impl Table {
    pub(crate) fn new(shape: Arc<TableShape>, relations: Vec<Arc<Relation>>) -> Self {
        Self { shape, relations }
    }

    #[inline]
    pub fn shape(&self) -> &Arc<TableShape> {
        &self.shape
    }

    /// Relations in declaration order.
    #[inline]
    pub fn relations(&self) -> &[Arc<Relation>] {
        &self.relations
    }

    /// Relation by field name or SQL name.
    pub fn relation(&self, name: &str) -> Option<&Arc<Relation>> {
        self.relations
            .iter()
            .find(|r| r.name == name || r.column == name)
    }
}

impl Deref for Table {
    type Target = TableShape;

    fn deref(&self) -> &TableShape {
        &self.shape
    }
}

/// Walks a declaration into a shape. `stack` holds the types currently
/// being built; it is how self-containment is detected.
pub(crate) fn build_shape(
    type_ref: TypeRef,
    stack: &mut Vec<TypeId>,
) -> Result<TableShape, ConfigError> {
    stack.push(type_ref.id());
    let shape = build_inner(type_ref, stack);
    stack.pop();
    shape
}

#[derive(Default)]
struct Collected {
    fields: Vec<Field>,
    hidden: Vec<Field>,
    specs: Vec<RelationSpec>,
}

impl Collected {
    /// `anonymous` embeds keep key flags and relations; prefixed embeds are
    /// plain column groups.
    fn promote(&mut self, inner: &TableShape, at: &FieldPath, prefix: &str, anonymous: bool) {
        for f in &inner.fields {
            let column = format_compact!("{prefix}{}", f.column);
            let mut field = f.promoted(at, column, f.depth + 1);
            if !anonymous {
                field.is_pk = false;
                field.soft_delete = false;
            }
            self.fields.push(field);
        }
        for f in &inner.hidden {
            let column = format_compact!("{prefix}{}", f.column);
            self.hidden.push(f.promoted(at, column, f.depth + 1));
        }
        if anonymous {
            for spec in &inner.relation_specs {
                self.specs.push(spec.promoted(at));
            }
        }
    }
}

fn build_inner(type_ref: TypeRef, stack: &mut Vec<TypeId>) -> Result<TableShape, ConfigError> {
    let type_name = type_ref.short_name();
    let decl = type_ref.declare();
    let table_tag =
        Tag::parse(&decl.tag).map_err(|reason| malformed(type_name, "<table>", &decl.tag, reason))?;

    let mut model_name = naming::model_name(type_ref.name());
    let mut name = naming::table_name(&model_name);
    let mut alias = model_name.clone();

    let mut collected = Collected::default();
    let mut slots = Vec::with_capacity(decl.fields.len());

    for decl_field in decl.fields {
        let tag = Tag::parse(&decl_field.tag)
            .map_err(|reason| malformed(type_name, &decl_field.name, &decl_field.tag, reason))?;
        if tag.is_ignored() {
            continue;
        }

        let index = u16::try_from(slots.len()).map_err(|_| ConfigError::TooManyFields {
            type_name: type_name.to_owned(),
            limit: usize::from(u16::MAX) + 1,
        })?;
        let path = FieldPath::new(index);
        let column = if tag.name.is_empty() {
            naming::column_name(&decl_field.name)
        } else {
            tag.name.clone()
        };
        let recursive = |field: &str| ConfigError::RecursiveStruct {
            type_name: type_name.to_owned(),
            field: field.to_owned(),
        };

        match decl_field.ty {
            FieldType::Scalar(ty) | FieldType::Nullable(ty) | FieldType::Array(ty) => {
                let field = Field {
                    alt: tag.get_all("alt").map(CompactString::from).collect(),
                    path,
                    ty,
                    nullable: matches!(decl_field.ty, FieldType::Nullable(_)),
                    is_array: matches!(decl_field.ty, FieldType::Array(_)) || tag.has("array"),
                    is_pk: tag.has("pk"),
                    scan_only: tag.has("scanonly"),
                    null_zero: tag.has("nullzero"),
                    soft_delete: tag.has("soft_delete"),
                    valuer: decl_field.valuer,
                    depth: 0,
                    name: decl_field.name,
                    column,
                };
                slots.push(Slot::Value(field.zero()));
                collected.fields.push(field);
            }

            FieldType::Struct(target) | FieldType::Ptr(target) if decl_field.anonymous => {
                if stack.contains(&target.id()) {
                    // A pointer embed of an enclosing type is skipped.
                    if matches!(decl_field.ty, FieldType::Ptr(_)) {
                        continue;
                    }
                    return Err(recursive(&decl_field.name));
                }
                let inner = build_shape(target, stack)?;
                if tag.has("extend") {
                    model_name = inner.model_name.clone();
                    name = inner.name.clone();
                    alias = inner.alias.clone();
                }
                collected.promote(&inner, &path, "", true);
                slots.push(Slot::Struct(Box::new(inner.template)));
            }

            FieldType::Struct(target) | FieldType::Ptr(target)
                if tag.has("embed") || tag.has("scanonly") =>
            {
                if stack.contains(&target.id()) {
                    return Err(recursive(&decl_field.name));
                }
                let inner = build_shape(target, stack)?;
                if let Some(prefix) = tag.get("embed") {
                    collected.promote(&inner, &path, prefix, false);
                } else {
                    for f in &inner.fields {
                        let mut hidden =
                            f.promoted(&path, format_compact!("{column}__{}", f.column), 1);
                        hidden.scan_only = true;
                        collected.hidden.push(hidden);
                    }
                }
                slots.push(Slot::Struct(Box::new(inner.template)));
            }

            FieldType::Struct(target) => {
                if stack.contains(&target.id()) {
                    return Err(recursive(&decl_field.name));
                }
                let inner = build_shape(target, stack)?;
                slots.push(Slot::Struct(Box::new(inner.template)));
                collected.specs.push(RelationSpec::new(
                    decl_field.name,
                    column,
                    path,
                    Storage::Value,
                    target,
                    tag,
                ));
            }

            FieldType::Ptr(target) => {
                slots.push(Slot::Ptr(None));
                collected.specs.push(RelationSpec::new(
                    decl_field.name,
                    column,
                    path,
                    Storage::Pointer,
                    target,
                    tag,
                ));
            }

            FieldType::Slice(target) => {
                slots.push(Slot::List(Vec::new()));
                collected.specs.push(RelationSpec::new(
                    decl_field.name,
                    column,
                    path,
                    Storage::Slice,
                    target,
                    tag,
                ));
            }
        }
    }

    if let Some(table) = table_tag.get("table") {
        name = CompactString::from(table);
    }
    if let Some(a) = table_tag.get("alias") {
        alias = CompactString::from(a);
    }

    let fields = shadow(collected.fields, |f| (f.column.clone(), f.depth));
    let specs = shadow(collected.specs, |s| (s.name.clone(), s.depth));

    let mut field_map = HashMap::with_capacity(fields.len());
    for (i, f) in fields.iter().enumerate() {
        field_map.insert(f.column.clone(), i);
    }
    for (i, f) in fields.iter().enumerate() {
        for alt in &f.alt {
            field_map.entry(alt.clone()).or_insert(i);
        }
    }
    for (j, f) in collected.hidden.iter().enumerate() {
        field_map.entry(f.column.clone()).or_insert(fields.len() + j);
    }

    let pks = fields
        .iter()
        .enumerate()
        .filter(|(_, f)| f.is_pk)
        .map(|(i, _)| i)
        .collect();
    let soft_delete = fields.iter().position(|f| f.soft_delete);

    Ok(TableShape {
        type_ref,
        model_name,
        name,
        alias,
        fields,
        hidden: collected.hidden,
        field_map,
        pks,
        soft_delete,
        relation_specs: specs,
        template: Record::new(slots),
    })
}

/// Applies promotion rules: the shallowest candidate of a name wins, and
/// among candidates at the same depth the first declared wins.
fn shadow<T>(candidates: Vec<T>, key: impl Fn(&T) -> (CompactString, u16)) -> Vec<T> {
    let mut best: HashMap<CompactString, (usize, u16)> = HashMap::with_capacity(candidates.len());
    for (i, c) in candidates.iter().enumerate() {
        let (name, depth) = key(c);
        match best.entry(name) {
            Entry::Occupied(mut e) => {
                if e.get().1 > depth {
                    e.insert((i, depth));
                }
            }
            Entry::Vacant(e) => {
                e.insert((i, depth));
            }
        }
    }
    candidates
        .into_iter()
        .enumerate()
        .filter(|(i, c)| best.get(&key(c).0).is_some_and(|&(winner, _)| winner == *i))
        .map(|(_, c)| c)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::decl::{Model, TableDecl};
    use crate::value::ScalarType;

    fn shape<M: Model>() -> Result<TableShape, ConfigError> {
        build_shape(TypeRef::of::<M>(), &mut Vec::new())
    }

    const INT: FieldType = FieldType::Scalar(ScalarType::Int);
    const TEXT: FieldType = FieldType::Scalar(ScalarType::Text);

    struct Base;
    impl Model for Base {
        fn declare() -> TableDecl {
            TableDecl::new()
                .field("ID", INT, ",pk")
                .field("Name", TEXT, ",alt:title")
                .field("Extra", TEXT, "")
        }
    }

    struct Wrapper;
    impl Model for Wrapper {
        fn declare() -> TableDecl {
            TableDecl::new()
                .embed(TypeRef::of::<Base>(), "extend")
                .field("Extra", FieldType::Nullable(ScalarType::Text), "")
                .field("Skip", INT, "-")
        }
    }

    #[test]
    fn embed_promotes_and_direct_field_shadows() {
        let t = shape::<Wrapper>().unwrap();
        let columns: Vec<_> = t.fields().iter().map(|f| f.column.as_str()).collect();
        assert_eq!(columns, vec!["id", "name", "extra"]);
        assert_eq!(t.pks().count(), 1);

        // the direct Extra (nullable, slot 1) shadows Base.Extra
        let extra = t.field("extra").unwrap();
        assert!(extra.nullable);
        assert_eq!(extra.path, FieldPath::new(1));

        // promoted Name lives inside the embed slot
        assert_eq!(t.field("title").unwrap().path, FieldPath::from(&[0u16, 1][..]));
        assert!(t.field("skip").is_none());
    }

    #[test]
    fn extend_adopts_table_identity() {
        let t = shape::<Wrapper>().unwrap();
        assert_eq!(t.name(), "bases");
        assert_eq!(t.alias(), "base");
    }

    struct Named;
    impl Model for Named {
        fn declare() -> TableDecl {
            TableDecl::new()
                .tag("table:people,alias:p")
                .field("ID", INT, ",pk")
                .field("Home", FieldType::struct_of::<Base>(), "embed:home_")
                .field("Stats", FieldType::struct_of::<Base>(), "scanonly")
        }
    }

    #[test]
    fn table_tag_prefix_embed_and_scanonly() {
        let t = shape::<Named>().unwrap();
        assert_eq!(t.name(), "people");
        assert_eq!(t.alias(), "p");
        assert!(t.field("home_name").is_some());
        assert_eq!(t.fields().len(), 4);

        let hidden = t.field("stats__name").unwrap();
        assert!(hidden.scan_only);
        assert_eq!(hidden.path, FieldPath::from(&[2u16, 1][..]));
        assert_eq!(t.select_fields().count(), 4);
    }

    struct SelfPtr;
    impl Model for SelfPtr {
        fn declare() -> TableDecl {
            TableDecl::new()
                .embed_ptr(TypeRef::of::<SelfPtr>(), "")
                .field("ID", INT, ",pk")
        }
    }

    struct SelfValue;
    impl Model for SelfValue {
        fn declare() -> TableDecl {
            TableDecl::new()
                .field("ID", INT, ",pk")
                .field("Inner", FieldType::struct_of::<SelfValue>(), "")
        }
    }

    #[test]
    fn recursion_rules() {
        let t = shape::<SelfPtr>().unwrap();
        assert_eq!(t.fields().len(), 1);
        assert_eq!(t.field("id").unwrap().path, FieldPath::new(0));

        assert!(matches!(
            shape::<SelfValue>(),
            Err(ConfigError::RecursiveStruct { .. })
        ));
    }

    struct BadTag;
    impl Model for BadTag {
        fn declare() -> TableDecl {
            TableDecl::new().field("Author", FieldType::ptr_of::<Base>(), ",join:author_id")
        }
    }

    #[test]
    fn malformed_tag_is_reported() {
        match shape::<BadTag>() {
            Err(ConfigError::MalformedTag { field, .. }) => assert_eq!(field, "Author"),
            other => panic!("unexpected {other:?}"),
        }
    }

    struct Wide;
    impl Model for Wide {
        fn declare() -> TableDecl {
            (0..=usize::from(u16::MAX) + 1)
                .fold(TableDecl::new(), |decl, i| decl.field(&format!("F{i}"), INT, ""))
        }
    }

    #[test]
    fn field_count_is_bounded_by_path_width() {
        match shape::<Wide>() {
            Err(ConfigError::TooManyFields { limit, .. }) => assert_eq!(limit, 65536),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn record_template_and_readers() {
        let t = shape::<Base>().unwrap();
        let mut rec = t.new_record();
        assert_eq!(t.value(&rec, "id"), Some(&Value::Int(0)));
        assert!(t.set(&mut rec, "name", Value::from("x")));
        assert_eq!(t.value(&rec, "title"), Some(&Value::from("x")));
        assert!(!t.set(&mut rec, "missing", Value::Null));
    }
}
