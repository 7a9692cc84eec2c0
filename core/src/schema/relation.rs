//! Relation descriptors and their classification.

use std::sync::Arc;

use compact_str::{CompactString, format_compact};
use smallvec::SmallVec;

use crate::error::ConfigError;
use crate::record::FieldPath;
use crate::relink_warn;
use crate::schema::decl::TypeRef;
use crate::schema::field::Field;
use crate::schema::registry::Registry;
use crate::schema::table::TableShape;
use crate::schema::tag::Tag;

/// How the relation field holds the related record(s).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Storage {
    /// Struct held by value; unset means the zero record
    Value,
    /// Struct held by pointer; unset means `None`
    Pointer,
    /// Slice of structs
    Slice,
}

/// A relation field as declared, before its keys are resolved.
#[derive(Debug, Clone)]
pub(crate) struct RelationSpec {
    pub name: CompactString,
    pub column: CompactString,
    pub path: FieldPath,
    pub storage: Storage,
    pub target: TypeRef,
    pub tag: Tag,
    pub depth: u16,
}

impl RelationSpec {
    pub(crate) fn new(
        name: CompactString,
        column: CompactString,
        path: FieldPath,
        storage: Storage,
        target: TypeRef,
        tag: Tag,
    ) -> Self {
        Self {
            name,
            column,
            path,
            storage,
            target,
            tag,
            depth: 0,
        }
    }

    pub(crate) fn promoted(&self, at: &FieldPath) -> Self {
        Self {
            path: at.join(&self.path),
            depth: self.depth + 1,
            ..self.clone()
        }
    }
}

/// Which column of a key pair holds an array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArraySide {
    #[default]
    None,
    /// The base (owner side) column is the array
    Base,
    /// The join (target side) column is the array
    Join,
}

/// One positional key correspondence: `base` must match `join`.
#[derive(Debug, Clone)]
pub struct KeyPair {
    pub base: Field,
    pub join: Field,
    pub array: ArraySide,
}

impl KeyPair {
    fn new(base: Field, join: Field) -> Result<Self, (Field, Field)> {
        let array = match (base.is_array, join.is_array) {
            (true, true) => return Err((base, join)),
            (true, false) => ArraySide::Base,
            (false, true) => ArraySide::Join,
            (false, false) => ArraySide::None,
        };
        Ok(Self { base, join, array })
    }
}

/// Discriminator restricting the target rows of a polymorphic relation.
#[derive(Debug, Clone)]
pub struct Discriminator {
    /// Column on the target holding the owner type
    pub field: Field,
    pub value: CompactString,
}

/// Join table of a many-to-many relation.
#[derive(Debug, Clone)]
pub struct ManyToMany {
    pub table: Arc<TableShape>,
    /// Join table column (`base`) to target column (`join`)
    pub target_pairs: SmallVec<[KeyPair; 2]>,
}

/// The five relation shapes.
#[derive(Debug, Clone)]
pub enum RelationKind {
    HasOne,
    BelongsTo,
    HasMany,
    Polymorphic(Discriminator),
    ManyToMany(Box<ManyToMany>),
}

impl RelationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationKind::HasOne => "has-one",
            RelationKind::BelongsTo => "belongs-to",
            RelationKind::HasMany => "has-many",
            RelationKind::Polymorphic(_) => "polymorphic-has-many",
            RelationKind::ManyToMany(_) => "many-to-many",
        }
    }
}

/// Resolved relation edge from an owner table to a target table.
///
/// For has-one, belongs-to, has-many and polymorphic relations `pairs` map
/// owner columns to target columns. For many-to-many relations they map
/// owner columns to join table columns, and [`ManyToMany::target_pairs`]
/// continues from the join table to the target.
#[derive(Debug, Clone)]
pub struct Relation {
    /// Declared field name (`Author`)
    pub name: CompactString,
    /// SQL name (`author`), used in join aliases and column prefixes
    pub column: CompactString,
    pub path: FieldPath,
    pub storage: Storage,
    pub target: TypeRef,
    pub target_table: Arc<TableShape>,
    pub kind: RelationKind,
    pub pairs: SmallVec<[KeyPair; 2]>,
}

impl Relation {
    /// Has-one and belongs-to: resolved with a `LEFT JOIN`.
    #[inline]
    pub fn is_singular(&self) -> bool {
        matches!(self.kind, RelationKind::HasOne | RelationKind::BelongsTo)
    }

    /// `true` if any key comparison is a set-membership test.
    pub fn is_array(&self) -> bool {
        let own = self.pairs.iter().any(|p| p.array != ArraySide::None);
        match &self.kind {
            RelationKind::ManyToMany(m2m) => {
                own || m2m.target_pairs.iter().any(|p| p.array != ArraySide::None)
            }
            _ => own,
        }
    }
}

/// Resolves a relation spec of `owner` into a descriptor.
pub(crate) fn resolve(
    registry: &Registry,
    owner: &TableShape,
    spec: &RelationSpec,
) -> Result<Relation, ConfigError> {
    let cx = Cx {
        registry,
        owner,
        spec,
    };
    let target = registry.shape(spec.target)?;

    if let Some(table) = spec.tag.get("m2m") {
        return cx.many_to_many(table, target);
    }

    let polymorphic = spec.tag.has("polymorphic") || spec.tag.joins().any(|(b, _)| b == "type");
    let kind = if polymorphic {
        None
    } else {
        match spec.tag.get("rel") {
            Some("has-one") => Some(RelationKind::HasOne),
            Some("belongs-to") => Some(RelationKind::BelongsTo),
            Some("has-many") => Some(RelationKind::HasMany),
            Some(other) => return Err(cx.invalid(format!("unknown relation kind {other:?}"))),
            None if spec.storage == Storage::Slice => Some(RelationKind::HasMany),
            None => Some(RelationKind::BelongsTo),
        }
    };

    let plural = matches!(kind, None | Some(RelationKind::HasMany));
    if plural != (spec.storage == Storage::Slice) {
        let shape = if plural { "a slice" } else { "a struct or pointer" };
        let kind_name = kind.as_ref().map_or("polymorphic", RelationKind::as_str);
        return Err(cx.invalid(format!("{kind_name} relation must be declared on {shape} field")));
    }

    let explicit: Vec<(&str, &str)> = spec.tag.joins().filter(|(b, _)| *b != "type").collect();
    let mut columns: Vec<(Field, Field)> = Vec::new();
    if !explicit.is_empty() {
        for (base, join) in explicit {
            columns.push((cx.field(owner, base)?, cx.field(&target, join)?));
        }
    } else if matches!(kind, Some(RelationKind::BelongsTo)) {
        if target.pks().len() == 0 {
            return Err(cx.invalid(format!("{} has no primary key", target.type_name())));
        }
        for pk in target.pks() {
            let base = format_compact!("{}_{}", spec.column, pk.column);
            columns.push((cx.field(owner, &base)?, pk.clone()));
        }
    } else {
        if owner.pks().len() == 0 {
            return Err(cx.invalid(format!("{} has no primary key", owner.type_name())));
        }
        for pk in owner.pks() {
            let join = format_compact!("{}_{}", owner.model_name(), pk.column);
            columns.push((pk.clone(), cx.field(&target, &join)?));
        }
    }

    let mut pairs = cx.pairs(columns)?;
    if spec.tag.has("array") && pairs.iter().all(|p| p.array == ArraySide::None) {
        relink_warn!(
            model = owner.type_name(),
            relation = %spec.name,
            "array on the relation field is deprecated, tag the key field instead"
        );
        if pairs.len() != 1 {
            return Err(cx.invalid(
                "array relation with several keys must tag the array key field".to_owned(),
            ));
        }
        pairs[0].array = ArraySide::Base;
    }

    let kind = match kind {
        Some(kind) => kind,
        None => RelationKind::Polymorphic(cx.discriminator(&target)?),
    };

    let relation = Relation {
        name: spec.name.clone(),
        column: spec.column.clone(),
        path: spec.path.clone(),
        storage: spec.storage,
        target: spec.target,
        target_table: target,
        kind,
        pairs,
    };
    cx.check_array_support(&relation)?;
    Ok(relation)
}

struct Cx<'a> {
    registry: &'a Registry,
    owner: &'a TableShape,
    spec: &'a RelationSpec,
}

impl Cx<'_> {
    fn invalid(&self, reason: String) -> ConfigError {
        ConfigError::InvalidRelation {
            type_name: self.owner.type_name().to_owned(),
            relation: self.spec.name.to_string(),
            reason,
        }
    }

    fn field(&self, table: &TableShape, column: &str) -> Result<Field, ConfigError> {
        table
            .field(column)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownField {
                type_name: self.owner.type_name().to_owned(),
                relation: self.spec.name.to_string(),
                column: column.to_owned(),
                table: table.name().to_owned(),
            })
    }

    fn pairs(&self, columns: Vec<(Field, Field)>) -> Result<SmallVec<[KeyPair; 2]>, ConfigError> {
        columns
            .into_iter()
            .map(|(base, join)| {
                KeyPair::new(base, join).map_err(|(base, join)| ConfigError::ArrayOnBothSides {
                    type_name: self.owner.type_name().to_owned(),
                    relation: self.spec.name.to_string(),
                    base: base.column.to_string(),
                    join: join.column.to_string(),
                })
            })
            .collect()
    }

    fn discriminator(&self, target: &TableShape) -> Result<Discriminator, ConfigError> {
        let column = self
            .spec
            .tag
            .joins()
            .find(|(b, _)| *b == "type")
            .map(|(_, j)| j)
            .ok_or_else(|| {
                self.invalid("polymorphic relation needs join:type=<column>".to_owned())
            })?;
        let value = match self.spec.tag.get("polymorphic") {
            Some(v) if !v.is_empty() => CompactString::from(v),
            _ => CompactString::from(self.owner.model_name()),
        };
        Ok(Discriminator {
            field: self.field(target, column)?,
            value,
        })
    }

    fn many_to_many(&self, table: &str, target: Arc<TableShape>) -> Result<Relation, ConfigError> {
        if self.spec.storage != Storage::Slice {
            return Err(self.invalid("many-to-many relation must be declared on a slice field".to_owned()));
        }
        let join_type = self
            .registry
            .model_by_table(table)
            .ok_or_else(|| ConfigError::UnknownJoinTable {
                type_name: self.owner.type_name().to_owned(),
                relation: self.spec.name.to_string(),
                table: table.to_owned(),
            })?;
        let jt = self.registry.shape(join_type)?;

        let owner_cols = self.join_table_columns(&jt, self.owner)?;
        let target_cols = self.join_table_columns(&jt, &target)?;

        let owner_pks: Vec<Field> = self.owner.pks().cloned().collect();
        let target_pks: Vec<Field> = target.pks().cloned().collect();
        self.same_length(owner_pks.len(), owner_cols.len())?;
        self.same_length(target_pks.len(), target_cols.len())?;

        let pairs = self.pairs(owner_pks.into_iter().zip(owner_cols).collect())?;
        if pairs.iter().any(|p| p.array == ArraySide::Base) {
            return Err(self.invalid("many-to-many owner key cannot be an array".to_owned()));
        }
        let target_pairs = self.pairs(target_cols.into_iter().zip(target_pks).collect())?;

        let relation = Relation {
            name: self.spec.name.clone(),
            column: self.spec.column.clone(),
            path: self.spec.path.clone(),
            storage: self.spec.storage,
            target: self.spec.target,
            target_table: target,
            kind: RelationKind::ManyToMany(Box::new(ManyToMany {
                table: jt,
                target_pairs,
            })),
            pairs,
        };
        self.check_array_support(&relation)?;
        Ok(relation)
    }

    /// Columns of the join table referencing `side`, found through the join
    /// model's own relation to `side`, else by `<model>_<pk>` naming.
    fn join_table_columns(
        &self,
        jt: &TableShape,
        side: &TableShape,
    ) -> Result<Vec<Field>, ConfigError> {
        let link = jt
            .relation_specs
            .iter()
            .find(|s| s.target == side.type_ref());
        if let Some(link) = link {
            let explicit: Vec<&str> = link.tag.joins().map(|(base, _)| base).collect();
            if !explicit.is_empty() {
                return explicit.into_iter().map(|c| self.field(jt, c)).collect();
            }
            return side
                .pks()
                .map(|pk| self.field(jt, &format_compact!("{}_{}", link.column, pk.column)))
                .collect();
        }
        side.pks()
            .map(|pk| self.field(jt, &format_compact!("{}_{}", side.model_name(), pk.column)))
            .collect()
    }

    fn same_length(&self, base: usize, join: usize) -> Result<(), ConfigError> {
        if base == join && base > 0 {
            return Ok(());
        }
        Err(ConfigError::KeyLengthMismatch {
            type_name: self.owner.type_name().to_owned(),
            relation: self.spec.name.to_string(),
            base,
            join,
        })
    }

    fn check_array_support(&self, relation: &Relation) -> Result<(), ConfigError> {
        if relation.is_array() && !self.registry.features().supports_array_ops() {
            return Err(ConfigError::ArrayUnsupported {
                type_name: self.owner.type_name().to_owned(),
                relation: self.spec.name.to_string(),
                dialect: self.registry.dialect().to_string(),
            });
        }
        Ok(())
    }
}
