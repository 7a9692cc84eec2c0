//! Distributes the rows of a plural relation query to their owners.

use hashbrown::HashMap;
use smallvec::SmallVec;

use crate::error::{RelinkError, Result};
use crate::key::{CompositeKey, expand_keys};
use crate::record::{Record, Slot};
use crate::schema::{ArraySide, Relation, RelationKind};
use crate::value::Value;

use super::scan::Scanned;

/// Appends every row to the relation slice of each owner it matches.
///
/// Keys are correlated on scalar elements: an array key stands for each of
/// its elements, so one row can match several owners and one owner can
/// match several rows. The first matching owner receives the scanned record
/// and every further owner receives a deep copy.
///
/// All rows are matched before any owner is touched: a row matching no
/// owner fails with [`RelinkError::Orphan`] and leaves every owner as it was.
pub(crate) fn bind(
    relation: &Relation,
    owner_table: &str,
    owners: &mut [&mut Record],
    rows: Vec<Scanned>,
) -> Result<usize> {
    let base_explode: SmallVec<[bool; 2]> = relation
        .pairs
        .iter()
        .map(|p| p.array == ArraySide::Base)
        .collect();
    let join_explode: SmallVec<[bool; 2]> = relation
        .pairs
        .iter()
        .map(|p| p.array == ArraySide::Join)
        .collect();

    let mut index: HashMap<CompositeKey, SmallVec<[usize; 4]>> = HashMap::new();
    for (i, owner) in owners.iter().enumerate() {
        let values: Vec<Value> = relation.pairs.iter().map(|p| p.base.key_value(owner)).collect();
        for key in expand_keys(&values, &base_explode) {
            let slot = index.entry(key).or_default();
            if slot.last() != Some(&i) {
                slot.push(i);
            }
        }
    }

    let mut plan: Vec<SmallVec<[usize; 2]>> = Vec::with_capacity(rows.len());
    for row in &rows {
        let values = row_key(relation, row);
        let mut targets = SmallVec::new();
        for key in expand_keys(&values, &join_explode) {
            for &owner in index.get(&key).into_iter().flatten() {
                if !targets.contains(&owner) {
                    targets.push(owner);
                }
            }
        }
        if targets.is_empty() {
            return Err(RelinkError::Orphan {
                relation: relation.name.to_string(),
                table: owner_table.to_owned(),
                key: CompositeKey::new(&values).to_string(),
            });
        }
        plan.push(targets);
    }

    let count = rows.len();
    for (row, targets) in rows.into_iter().zip(plan) {
        let Some((&first, rest)) = targets.split_first() else {
            continue;
        };
        for &owner in rest {
            push(owners[owner], relation, row.record.clone());
        }
        push(owners[first], relation, row.record);
    }
    Ok(count)
}

/// Join-side key of a fetched row: the target columns, or for many-to-many
/// the join table columns captured alongside the row.
fn row_key(relation: &Relation, row: &Scanned) -> Vec<Value> {
    match relation.kind {
        RelationKind::ManyToMany(_) => row.captures.clone(),
        _ => relation
            .pairs
            .iter()
            .map(|p| p.join.key_value(&row.record))
            .collect(),
    }
}

fn push(owner: &mut Record, relation: &Relation, record: Record) {
    if let Some(Slot::List(items)) = owner.slot_mut(&relation.path) {
        items.push(record);
    }
}
