//! Maps result rows onto records, including columns of singular joins.

use compact_str::CompactString;
use hashbrown::HashSet;

use crate::driver::Rows;
use crate::error::{RelinkError, Result};
use crate::key::CompositeKey;
use crate::record::{Record, Slot};
use crate::schema::{Field, Relation, Storage, Table};
use crate::sql::Sql;
use crate::value::Value;

use super::select::SingularJoin;

/// One scanned row: the record plus any captured join-table keys.
#[derive(Debug, Clone)]
pub(crate) struct Scanned {
    pub record: Record,
    pub captures: Vec<Value>,
}

enum Target<'a> {
    Own(&'a Field),
    Joined(usize, &'a Field),
    Capture(usize),
}

fn plan<'a>(
    table: &'a Table,
    joins: &'a [SingularJoin<'_>],
    captures: &[(Sql, CompactString)],
    columns: &[String],
) -> Result<Vec<Target<'a>>> {
    columns
        .iter()
        .map(|name| {
            if let Some(i) = captures.iter().position(|(_, alias)| alias == name) {
                return Ok(Target::Capture(i));
            }
            if let Some(field) = table.field(name) {
                return Ok(Target::Own(field));
            }
            // longest matching `prefix__` wins
            let mut best: Option<(usize, &'a Field)> = None;
            for (j, join) in joins.iter().enumerate() {
                let Some(rest) = name
                    .strip_prefix(join.prefix.as_str())
                    .and_then(|r| r.strip_prefix("__"))
                else {
                    continue;
                };
                if let Some(field) = join.table.field(rest) {
                    let longer = best.is_none_or(|(b, _)| joins[b].prefix.len() < join.prefix.len());
                    if longer {
                        best = Some((j, field));
                    }
                }
            }
            match best {
                Some((j, field)) => Ok(Target::Joined(j, field)),
                None => Err(RelinkError::ScanShape {
                    table: table.name().to_owned(),
                    column: name.clone(),
                }),
            }
        })
        .collect()
}

/// Reads every row of `rows` into records of `table`.
///
/// A joined record is only created once one of its columns is non-NULL, so
/// an unmatched `LEFT JOIN` leaves the relation unset. When a singular join
/// compares arrays one owner can come back on several rows; only the first
/// row per owner is kept. An owner is identified by its primary key, or by
/// all of its selected columns when the table has none, together with the
/// join table keys captured for a many-to-many relation.
pub(crate) fn scan_rows<R: Rows + ?Sized>(
    table: &Table,
    joins: &[SingularJoin<'_>],
    captures: &[(Sql, CompactString)],
    rows: &mut R,
) -> Result<Vec<Scanned>> {
    let targets = plan(table, joins, captures, rows.columns())?;
    let dedupe = joins.iter().any(|j| j.relation.is_array());
    let keyed_by_pk = table.pks().len() > 0;
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    while let Some(values) = rows.next_row()? {
        if values.len() != targets.len() {
            return Err(RelinkError::Query(format!(
                "row has {} values for {} columns",
                values.len(),
                targets.len()
            )));
        }

        let mut record = table.new_record();
        let mut joined: Vec<Option<Record>> = vec![None; joins.len()];
        let mut captured = vec![Value::Null; captures.len()];

        let mut own_values = Vec::new();
        for (target, value) in targets.iter().zip(values) {
            match target {
                Target::Own(field) => {
                    if dedupe && !keyed_by_pk {
                        own_values.push(value.clone());
                    }
                    field.set(&mut record, value);
                }
                Target::Joined(j, field) => {
                    if !value.is_null() {
                        let rec = joined[*j].get_or_insert_with(|| joins[*j].table.new_record());
                        field.set(rec, value);
                    }
                }
                Target::Capture(i) => captured[*i] = value,
            }
        }

        // a row is a duplicate of an earlier one when its own key and its
        // captured join table keys are both equal
        if dedupe {
            let mut key: Vec<Value> = if keyed_by_pk {
                table.pks().map(|f| f.key_value(&record)).collect()
            } else {
                own_values
            };
            key.extend(captured.iter().cloned());
            if !seen.insert(CompositeKey::new(&key)) {
                continue;
            }
        }

        // children come after their parents, so attach bottom-up
        for j in (0..joins.len()).rev() {
            let Some(child) = joined[j].take() else {
                continue;
            };
            let parent = match joins[j].parent {
                None => Some(&mut record),
                Some(p) => joined[p].as_mut(),
            };
            if let Some(parent) = parent {
                attach(parent, joins[j].relation, child);
            }
        }

        out.push(Scanned {
            record,
            captures: captured,
        });
    }
    Ok(out)
}

fn attach(owner: &mut Record, relation: &Relation, child: Record) {
    if let Some(slot) = owner.slot_mut(&relation.path) {
        *slot = match relation.storage {
            Storage::Pointer => Slot::Ptr(Some(Box::new(child))),
            Storage::Value | Storage::Slice => Slot::Struct(Box::new(child)),
        };
    }
}
