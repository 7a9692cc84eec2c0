//! Join conditions and owner-batch predicates for each relation shape.

use compact_str::format_compact;
use hashbrown::HashSet;

use crate::dialect::DialectFeatures;
use crate::key::CompositeKey;
use crate::record::Record;
use crate::schema::{ArraySide, Field, KeyPair, RelationKind, Relation};
use crate::sql::Sql;
use crate::value::Value;

use super::select::SelectQuery;

/// `"alias"."deleted_at" IS NULL`, or `= <zero>` for non-nullable columns.
pub(crate) fn not_deleted(alias: &str, field: &Field) -> Sql {
    let mut sql = Sql::column(alias, field.column.as_str());
    if field.nullable || field.null_zero {
        sql.push_raw(" IS NULL");
    } else {
        sql.push_raw(" = ").push_param(Value::zero(field.ty));
    }
    sql
}

/// One key comparison between two aliased columns.
///
/// - array on the base side: `base @> ARRAY[join]`
/// - array on the join side: `base = ANY(join)`
/// - otherwise: `join = base`
pub(crate) fn pair_condition(base_alias: &str, join_alias: &str, pair: &KeyPair) -> Sql {
    let base = Sql::column(base_alias, pair.base.column.as_str());
    let join = Sql::column(join_alias, pair.join.column.as_str());
    let mut sql = Sql::empty();
    match pair.array {
        ArraySide::Base => {
            sql.append(base).push_raw(" @> ARRAY[").append(join).push_raw("]");
        }
        ArraySide::Join => {
            sql.append(base).push_raw(" = ANY(").append(join).push_raw(")");
        }
        ArraySide::None => {
            sql.append(join).push_raw(" = ").append(base);
        }
    }
    sql
}

/// `ON` condition of a singular join.
pub(crate) fn singular_on(base_alias: &str, join_alias: &str, relation: &Relation) -> Sql {
    let mut on = Sql::empty();
    on.append_joined(
        relation
            .pairs
            .iter()
            .map(|pair| pair_condition(base_alias, join_alias, pair)),
        " AND ",
    );
    on.parens()
}

/// Distinct base key tuples of the owner batch, in first-seen order.
///
/// Tuples with a NULL scalar, and owners whose array key holds no elements,
/// contribute nothing.
fn owner_tuples(pairs: &[KeyPair], owners: &[&Record]) -> Vec<Vec<Value>> {
    let mut seen = HashSet::new();
    let mut tuples = Vec::new();
    for owner in owners {
        let values: Vec<Value> = pairs.iter().map(|p| p.base.key_value(owner)).collect();
        let usable = pairs.iter().zip(&values).all(|(pair, value)| match pair.array {
            ArraySide::Base => !value.elements().is_empty(),
            _ => !value.is_null(),
        });
        if usable && seen.insert(CompositeKey::new(&values)) {
            tuples.push(values);
        }
    }
    tuples
}

/// Predicate restricting `alias` (the relation's join side) to rows that
/// belong to one of `owners`. `None` when no owner contributes a key.
///
/// OR-chains are returned bare; callers parenthesize when combining.
pub(crate) fn owner_predicate(
    alias: &str,
    pairs: &[KeyPair],
    owners: &[&Record],
    features: DialectFeatures,
) -> Option<Sql> {
    let tuples = owner_tuples(pairs, owners);
    if tuples.is_empty() {
        return None;
    }
    let column = |pair: &KeyPair| Sql::column(alias, pair.join.column.as_str());

    if pairs.iter().any(|p| p.array != ArraySide::None) {
        return Some(array_predicate(alias, pairs, tuples));
    }

    let mut sql = Sql::empty();
    if features.supports_composite_in() {
        if let [pair] = pairs {
            sql.append(column(pair)).push_raw(" IN (");
            sql.append_joined(tuples.into_iter().flatten().map(Sql::param), ", ");
            sql.push_raw(")");
        } else {
            let mut columns = Sql::empty();
            columns.append_joined(pairs.iter().map(column), ", ");
            sql.append(columns.parens()).push_raw(" IN (");
            sql.append_joined(
                tuples.into_iter().map(|tuple| {
                    let mut values = Sql::empty();
                    values.append_joined(tuple.into_iter().map(Sql::param), ", ");
                    values.parens()
                }),
                ", ",
            );
            sql.push_raw(")");
        }
        return Some(sql);
    }

    // (c1 = ? AND c2 = ?) OR (c1 = ? AND c2 = ?)
    sql.append_joined(
        tuples.into_iter().map(|tuple| {
            let mut term = Sql::empty();
            term.append_joined(
                pairs.iter().zip(tuple).map(|(pair, value)| {
                    let mut eq = column(pair);
                    eq.push_raw(" = ").push_param(value);
                    eq
                }),
                " AND ",
            );
            if pairs.len() > 1 { term.parens() } else { term }
        }),
        " OR ",
    );
    Some(sql)
}

fn array_predicate(alias: &str, pairs: &[KeyPair], tuples: Vec<Vec<Value>>) -> Sql {
    // A single owner-side array: one `= ANY(?)` over the union of elements.
    if let [pair] = pairs {
        if pair.array == ArraySide::Base {
            let mut seen = HashSet::new();
            let union: Vec<Value> = tuples
                .iter()
                .flat_map(|t| t[0].elements())
                .filter(|v| !v.is_null() && seen.insert(CompositeKey::new(core::iter::once(*v))))
                .cloned()
                .collect();
            let mut sql = Sql::column(alias, pair.join.column.as_str());
            sql.push_raw(" = ANY(").push_param(Value::Array(union)).push_raw(")");
            return sql;
        }
    }

    let mut sql = Sql::empty();
    sql.append_joined(
        tuples.into_iter().map(|tuple| {
            let mut term = Sql::empty();
            term.append_joined(
                pairs.iter().zip(tuple).map(|(pair, value)| {
                    let column = Sql::column(alias, pair.join.column.as_str());
                    let mut cond = Sql::empty();
                    match pair.array {
                        ArraySide::Base => {
                            cond.append(column).push_raw(" = ANY(").push_param(value).push_raw(")");
                        }
                        ArraySide::Join => {
                            cond.push_param(value).push_raw(" = ANY(").append(column).push_raw(")");
                        }
                        ArraySide::None => {
                            cond.append(column).push_raw(" = ").push_param(value);
                        }
                    }
                    cond
                }),
                " AND ",
            );
            if pairs.len() > 1 { term.parens() } else { term }
        }),
        " OR ",
    );
    sql
}

/// Restricts `query` (over the relation's target) to the rows belonging to
/// `owners`. Returns `None` when no owner contributes a key, in which case
/// no query needs to run.
pub(crate) fn compose_many<'r>(
    mut query: SelectQuery<'r>,
    relation: &Relation,
    owners: &[&Record],
) -> Option<SelectQuery<'r>> {
    let features = query.registry().features();
    match &relation.kind {
        RelationKind::HasMany => {
            let alias = query.alias().to_owned();
            let predicate = owner_predicate(&alias, &relation.pairs, owners, features)?;
            query.push_where(predicate);
        }
        RelationKind::Polymorphic(discriminator) => {
            let alias = query.alias().to_owned();
            let predicate = owner_predicate(&alias, &relation.pairs, owners, features)?;
            query.push_where(predicate);
            let mut kind = Sql::column(alias.as_str(), discriminator.field.column.as_str());
            kind.push_raw(" = ")
                .push_param(Value::Text(discriminator.value.to_string()));
            query.push_where(kind);
        }
        RelationKind::ManyToMany(m2m) => {
            let jt_alias = m2m.table.alias();
            let predicate = owner_predicate(jt_alias, &relation.pairs, owners, features)?;

            let mut join = Sql::raw("JOIN ");
            join.append(Sql::ident(m2m.table.name()))
                .push_raw(" AS ")
                .append(Sql::ident(jt_alias))
                .push_raw(" ON ")
                .append(predicate.parens());
            query.push_join(join);

            let target_alias = query.alias().to_owned();
            for pair in &m2m.target_pairs {
                query.push_where(pair_condition(jt_alias, &target_alias, pair));
            }
            for pair in &relation.pairs {
                query.push_capture(
                    Sql::column(jt_alias, pair.join.column.as_str()),
                    format_compact!("__m2m__{}", pair.join.column),
                );
            }
        }
        RelationKind::HasOne | RelationKind::BelongsTo => return None,
    }
    Some(query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Dialect;
    use crate::record::{FieldPath, Slot};
    use crate::value::ScalarType;
    use smallvec::SmallVec;

    fn field(column: &str, index: u16, is_array: bool) -> Field {
        Field {
            name: column.into(),
            column: column.into(),
            alt: SmallVec::new(),
            path: FieldPath::new(index),
            ty: ScalarType::Int,
            nullable: true,
            is_array,
            is_pk: false,
            scan_only: false,
            null_zero: false,
            soft_delete: false,
            valuer: None,
            depth: 0,
        }
    }

    fn pair(base: Field, join: Field) -> KeyPair {
        let array = match (base.is_array, join.is_array) {
            (true, _) => ArraySide::Base,
            (_, true) => ArraySide::Join,
            _ => ArraySide::None,
        };
        KeyPair { base, join, array }
    }

    fn owner(values: &[Value]) -> Record {
        Record::new(values.iter().cloned().map(Slot::Value).collect())
    }

    fn render(sql: Sql) -> (String, Vec<Value>) {
        sql.build(Dialect::PostgreSQL)
    }

    const ALL: DialectFeatures = DialectFeatures::new().composite_in(true).array_ops(true);
    const NONE: DialectFeatures = DialectFeatures::new();

    #[test]
    fn single_column_in_is_deduplicated() {
        let pairs = [pair(field("id", 0, false), field("author_id", 0, false))];
        let owners = [
            owner(&[Value::Int(1)]),
            owner(&[Value::Int(2)]),
            owner(&[Value::Int(1)]),
            owner(&[Value::Null]),
        ];
        let refs: Vec<&Record> = owners.iter().collect();
        let (text, params) = render(owner_predicate("book", &pairs, &refs, ALL).unwrap());
        assert_eq!(text, "\"book\".\"author_id\" IN ($1, $2)");
        assert_eq!(params, vec![Value::Int(1), Value::Int(2)]);
    }

    #[test]
    fn composite_in_and_or_chain() {
        let pairs = [
            pair(field("a", 0, false), field("x", 0, false)),
            pair(field("b", 1, false), field("y", 1, false)),
        ];
        let owners = [
            owner(&[Value::Int(1), Value::Int(2)]),
            owner(&[Value::Int(3), Value::Int(4)]),
            owner(&[Value::Int(1), Value::Int(2)]),
        ];
        let refs: Vec<&Record> = owners.iter().collect();

        let (text, params) = render(owner_predicate("t", &pairs, &refs, ALL).unwrap());
        assert_eq!(text, "(\"t\".\"x\", \"t\".\"y\") IN (($1, $2), ($3, $4))");
        assert_eq!(params.len(), 4);

        let (text, params) = render(owner_predicate("t", &pairs, &refs, NONE).unwrap());
        assert_eq!(
            text,
            "(\"t\".\"x\" = $1 AND \"t\".\"y\" = $2) OR (\"t\".\"x\" = $3 AND \"t\".\"y\" = $4)"
        );
        assert_eq!(params.len(), 4);
    }

    #[test]
    fn single_column_or_chain() {
        let pairs = [pair(field("id", 0, false), field("author_id", 0, false))];
        let owners = [owner(&[Value::Int(1)]), owner(&[Value::Int(2)])];
        let refs: Vec<&Record> = owners.iter().collect();
        let (text, _) = render(owner_predicate("b", &pairs, &refs, NONE).unwrap());
        assert_eq!(text, "\"b\".\"author_id\" = $1 OR \"b\".\"author_id\" = $2");
    }

    #[test]
    fn owner_array_uses_union_any() {
        let pairs = [pair(field("item_ids", 0, true), field("id", 0, false))];
        let owners = [
            owner(&[Value::from(vec![1, 2])]),
            owner(&[Value::from(vec![2, 3])]),
            owner(&[Value::Array(vec![])]),
            owner(&[Value::Null]),
        ];
        let refs: Vec<&Record> = owners.iter().collect();
        let (text, params) = render(owner_predicate("item", &pairs, &refs, ALL).unwrap());
        assert_eq!(text, "\"item\".\"id\" = ANY($1)");
        assert_eq!(params, vec![Value::from(vec![1, 2, 3])]);
    }

    #[test]
    fn target_array_uses_any_per_owner() {
        let pairs = [pair(field("id", 0, false), field("order_ids", 0, true))];
        let owners = [owner(&[Value::Int(7)]), owner(&[Value::Int(8)])];
        let refs: Vec<&Record> = owners.iter().collect();
        let (text, params) = render(owner_predicate("item", &pairs, &refs, ALL).unwrap());
        assert_eq!(
            text,
            "$1 = ANY(\"item\".\"order_ids\") OR $2 = ANY(\"item\".\"order_ids\")"
        );
        assert_eq!(params, vec![Value::Int(7), Value::Int(8)]);
    }

    #[test]
    fn empty_batch_composes_nothing() {
        let pairs = [pair(field("item_ids", 0, true), field("id", 0, false))];
        let owners = [owner(&[Value::Array(vec![])]), owner(&[Value::Null])];
        let refs: Vec<&Record> = owners.iter().collect();
        assert!(owner_predicate("item", &pairs, &refs, ALL).is_none());
    }

    #[test]
    fn pair_conditions() {
        let eq = pair(field("author_id", 0, false), field("id", 0, false));
        assert_eq!(
            render(pair_condition("book", "book__author", &eq)).0,
            "\"book__author\".\"id\" = \"book\".\"author_id\""
        );

        let contains = pair(field("tag_ids", 0, true), field("id", 0, false));
        assert_eq!(
            render(pair_condition("a", "b", &contains)).0,
            "\"a\".\"tag_ids\" @> ARRAY[\"b\".\"id\"]"
        );

        let any = pair(field("id", 0, false), field("owner_ids", 0, true));
        assert_eq!(
            render(pair_condition("a", "b", &any)).0,
            "\"a\".\"id\" = ANY(\"b\".\"owner_ids\")"
        );
    }

    #[test]
    fn soft_delete_predicates() {
        let mut f = field("deleted_at", 0, false);
        assert_eq!(render(not_deleted("t", &f)).0, "\"t\".\"deleted_at\" IS NULL");

        f.nullable = false;
        let (text, params) = render(not_deleted("t", &f));
        assert_eq!(text, "\"t\".\"deleted_at\" = $1");
        assert_eq!(params, vec![Value::Int(0)]);
    }
}
