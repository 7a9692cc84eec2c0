use std::sync::Arc;

use compact_str::{CompactString, format_compact};

use crate::dialect::DialectExt;
use crate::driver::Connection;
use crate::error::{RelinkError, Result};
use crate::record::{FieldPath, Record};
use crate::schema::{Registry, Relation, Table};
use crate::sql::Sql;
use crate::value::Value;
use crate::{relink_trace_bind, relink_trace_query};

use super::scan::{Scanned, scan_rows};
use super::{assemble, join};

/// Callback customizing the query that loads one relation.
pub type RelationFn<'r> = Box<dyn FnOnce(SelectQuery<'r>) -> SelectQuery<'r> + 'r>;

/// Placeholder replaced by the quoted alias of the query's table.
const TABLE_ALIAS: &str = "?TableAlias";

#[derive(Debug, Clone)]
pub(crate) enum Column {
    /// Field or column name; known columns are qualified with the alias
    Field(CompactString),
    Expr(Sql),
}

/// Requested relation, with the relations requested beneath it.
pub(crate) struct JoinNode<'r> {
    relation: Arc<Relation>,
    table: Arc<Table>,
    /// Callback of a plural relation, run once the owners are known
    apply: Option<RelationFn<'r>>,
    /// Column override of a singular relation
    columns: Vec<Column>,
    /// Extra `ON` conditions of a singular relation
    on: Vec<Sql>,
    children: Vec<JoinNode<'r>>,
}

impl<'r> JoinNode<'r> {
    fn new(relation: Arc<Relation>, table: Arc<Table>) -> Self {
        Self {
            relation,
            table,
            apply: None,
            columns: Vec::new(),
            on: Vec::new(),
            children: Vec::new(),
        }
    }
}

/// Singular relation flattened into the `LEFT JOIN` list of its owner query.
pub(crate) struct SingularJoin<'a> {
    pub relation: &'a Relation,
    pub table: &'a Table,
    /// Index of the join this one hangs off; `None` for the root table
    pub parent: Option<usize>,
    pub alias: CompactString,
    /// Result column prefix, `author__profile`
    pub prefix: CompactString,
    columns: &'a [Column],
    on: &'a [Sql],
}

/// Plural relation loaded by a follow-up query.
struct PluralFetch<'r> {
    owner_table: CompactString,
    /// Singular relation paths from the root record to the owner record
    via: Vec<FieldPath>,
    node: JoinNode<'r>,
}

/// SELECT over one model, with relation loading.
///
/// Builder methods never fail on the spot: the first error is kept and
/// returned by [`to_sql`](Self::to_sql) or [`scan`](Self::scan).
///
/// Singular relations (has-one, belongs-to) are fetched in the same
/// statement with a `LEFT JOIN` per relation. Plural relations (has-many,
/// polymorphic, many-to-many) are fetched with one extra query per relation
/// once the owners are scanned, and distributed to them by key.
pub struct SelectQuery<'r> {
    registry: &'r Registry,
    table: Arc<Table>,
    alias: CompactString,
    columns: Vec<Column>,
    captures: Vec<(Sql, CompactString)>,
    joins: Vec<Sql>,
    wheres: Vec<Sql>,
    orders: Vec<Sql>,
    limit: Option<u64>,
    offset: Option<u64>,
    with_deleted: bool,
    relations: Vec<JoinNode<'r>>,
    err: Option<RelinkError>,
}

impl<'r> SelectQuery<'r> {
    pub(crate) fn new(registry: &'r Registry, table: Arc<Table>) -> Self {
        let alias = CompactString::from(table.alias());
        Self::with_alias(registry, table, alias)
    }

    fn with_alias(registry: &'r Registry, table: Arc<Table>, alias: CompactString) -> Self {
        Self {
            registry,
            table,
            alias,
            columns: Vec::new(),
            captures: Vec::new(),
            joins: Vec::new(),
            wheres: Vec::new(),
            orders: Vec::new(),
            limit: None,
            offset: None,
            with_deleted: false,
            relations: Vec::new(),
            err: None,
        }
    }

    #[inline]
    pub fn registry(&self) -> &'r Registry {
        self.registry
    }

    #[inline]
    pub fn table(&self) -> &Arc<Table> {
        &self.table
    }

    /// Alias the table is selected under.
    #[inline]
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// First error recorded by a builder method.
    #[inline]
    pub fn err(&self) -> Option<&RelinkError> {
        self.err.as_ref()
    }

    /// Selects `name` instead of the default column list. Known fields are
    /// qualified with the table alias.
    pub fn column(mut self, name: &str) -> Self {
        self.columns.push(Column::Field(name.into()));
        self
    }

    pub fn column_expr(mut self, sql: &str, params: Vec<Value>) -> Self {
        match self.expr(sql, params) {
            Ok(expr) => self.columns.push(Column::Expr(expr)),
            Err(err) => self.fail(err),
        }
        self
    }

    /// Adds a condition, ANDed with the others. `?` binds the next value of
    /// `params` and `?TableAlias` expands to the quoted table alias.
    pub fn where_expr(mut self, sql: &str, params: Vec<Value>) -> Self {
        match self.expr(sql, params) {
            Ok(expr) => self.wheres.push(expr),
            Err(err) => self.fail(err),
        }
        self
    }

    pub fn order_expr(mut self, sql: &str) -> Self {
        match self.expr(sql, Vec::new()) {
            Ok(expr) => self.orders.push(expr),
            Err(err) => self.fail(err),
        }
        self
    }

    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn offset(mut self, n: u64) -> Self {
        self.offset = Some(n);
        self
    }

    /// Includes soft-deleted rows, here and in every relation query.
    pub fn with_deleted(mut self) -> Self {
        self.with_deleted = true;
        self
    }

    /// Loads the relation at `path`. Nested relations are separated by
    /// dots (`Author.Books`); every relation on the path is loaded.
    pub fn relation(self, path: &str) -> Self {
        self.relation_inner(path, None)
    }

    /// Loads the relation at `path`, customizing its query with `apply`.
    ///
    /// For a plural relation `apply` receives the follow-up query over the
    /// target after the owner condition has been added. For a singular
    /// relation it receives a query aliased like the join; its columns
    /// replace the joined columns, its conditions are added to the `ON`
    /// clause and its relations nest under the join. Limit, offset and
    /// order cannot be set on a singular relation and fail the query.
    pub fn relation_with<F>(self, path: &str, apply: F) -> Self
    where
        F: FnOnce(SelectQuery<'r>) -> SelectQuery<'r> + 'r,
    {
        self.relation_inner(path, Some(Box::new(apply)))
    }

    /// Renders the statement for the root table and its singular joins.
    /// Plural relations run as separate statements and are not included.
    pub fn to_sql(&self) -> Result<(String, Vec<Value>)> {
        if let Some(err) = &self.err {
            return Err(replay(err));
        }
        let joins = self.singular_joins();
        Ok(self.render(&joins).build(self.registry.dialect()))
    }

    /// Runs the query and loads every requested relation.
    pub fn scan<C: Connection + ?Sized>(self, conn: &mut C) -> Result<Vec<Record>> {
        Ok(self.fetch(conn)?.into_iter().map(|s| s.record).collect())
    }

    pub(crate) fn push_where(&mut self, sql: Sql) {
        self.wheres.push(sql);
    }

    pub(crate) fn push_join(&mut self, sql: Sql) {
        self.joins.push(sql);
    }

    pub(crate) fn push_capture(&mut self, sql: Sql, alias: CompactString) {
        self.captures.push((sql, alias));
    }

    fn fail(&mut self, err: RelinkError) {
        if self.err.is_none() {
            self.err = Some(err);
        }
    }

    fn expr(&self, sql: &str, params: Vec<Value>) -> Result<Sql> {
        if !sql.contains(TABLE_ALIAS) {
            return Sql::fragment(sql, params);
        }
        let mut alias = String::new();
        self.registry.dialect().quote_ident(&mut alias, &self.alias);
        Sql::fragment(&sql.replace(TABLE_ALIAS, &alias), params)
    }

    fn relation_inner(mut self, path: &str, apply: Option<RelationFn<'r>>) -> Self {
        if self.err.is_none() {
            if let Err(err) = self.add_relation(path, apply) {
                self.fail(err);
            }
        }
        self
    }

    fn add_relation(&mut self, path: &str, mut apply: Option<RelationFn<'r>>) -> Result<()> {
        let registry = self.registry;
        let segments: Vec<&str> = path.split('.').collect();
        let mut table = Arc::clone(&self.table);
        // alias of the statement the current segment is joined into
        let mut base_alias = self.alias.clone();
        let mut prefix = CompactString::default();
        let mut nodes = &mut self.relations;

        for (i, segment) in segments.iter().enumerate() {
            let found = nodes
                .iter()
                .position(|n| n.relation.name == *segment || n.relation.column == *segment);
            let idx = match found {
                Some(idx) => idx,
                None => {
                    let relation = table.relation(segment).cloned().ok_or_else(|| {
                        RelinkError::UnknownRelation {
                            table: table.name().to_owned(),
                            relation: (*segment).to_owned(),
                        }
                    })?;
                    let target = registry.table_of(relation.target)?;
                    nodes.push(JoinNode::new(relation, target));
                    nodes.len() - 1
                }
            };

            let node = &mut nodes[idx];
            if node.relation.is_singular() {
                prefix = if prefix.is_empty() {
                    node.relation.column.clone()
                } else {
                    format_compact!("{prefix}__{}", node.relation.column)
                };
            } else {
                base_alias = CompactString::from(node.table.alias());
                prefix = CompactString::default();
            }

            if i + 1 == segments.len() {
                let Some(apply) = apply.take() else {
                    return Ok(());
                };
                if !node.relation.is_singular() {
                    node.apply = Some(apply);
                    return Ok(());
                }
                let alias = format_compact!("{base_alias}__{prefix}");
                let query = apply(SelectQuery::with_alias(registry, Arc::clone(&node.table), alias));
                if let Some(err) = query.err {
                    return Err(err);
                }
                if query.limit.is_some() || query.offset.is_some() || !query.orders.is_empty() {
                    return Err(RelinkError::Query(format!(
                        "{} is loaded with a join; limit, offset and order do not apply to it",
                        node.relation.name
                    )));
                }
                node.columns = query.columns;
                node.on.extend(query.wheres);
                node.children.extend(query.relations);
                return Ok(());
            }

            table = Arc::clone(&node.table);
            nodes = &mut node.children;
        }
        Ok(())
    }

    fn singular_joins(&self) -> Vec<SingularJoin<'_>> {
        let mut out = Vec::new();
        collect_singular(&self.relations, None, &self.alias, "", &mut out);
        out
    }

    fn render(&self, joins: &[SingularJoin<'_>]) -> Sql {
        let alias = self.alias.as_str();
        let mut columns: Vec<Sql> = Vec::new();
        if self.columns.is_empty() {
            columns.extend(
                self.table
                    .select_fields()
                    .map(|f| Sql::column(alias, f.column.as_str())),
            );
        } else {
            columns.extend(self.columns.iter().map(|c| match c {
                Column::Field(name) => match self.table.field(name) {
                    Some(f) => Sql::column(alias, f.column.as_str()),
                    None => Sql::ident(name.as_str()),
                },
                Column::Expr(expr) => expr.clone(),
            }));
        }
        for (expr, name) in &self.captures {
            let mut column = expr.clone();
            column.push_raw(" AS ").append(Sql::ident(name.as_str()));
            columns.push(column);
        }
        for join in joins {
            joined_columns(join, &mut columns);
        }

        let mut sql = Sql::raw("SELECT ");
        sql.append_joined(columns, ", ")
            .push_raw(" FROM ")
            .append(Sql::ident(self.table.name()))
            .push_raw(" AS ")
            .append(Sql::ident(alias));

        for join in joins {
            let base = match join.parent {
                Some(p) => joins[p].alias.as_str(),
                None => alias,
            };
            let mut on = join::singular_on(base, &join.alias, join.relation);
            if !self.with_deleted {
                if let Some(field) = join.table.soft_delete_field() {
                    on.push_raw(" AND ").append(join::not_deleted(&join.alias, field));
                }
            }
            for extra in join.on {
                on.push_raw(" AND ").append(extra.clone().parens());
            }
            sql.push_raw(" LEFT JOIN ")
                .append(Sql::ident(join.table.name()))
                .push_raw(" AS ")
                .append(Sql::ident(join.alias.as_str()))
                .push_raw(" ON ")
                .append(on);
        }
        for extra in &self.joins {
            sql.push_raw(" ").append(extra.clone());
        }

        let mut wheres: Vec<Sql> = self.wheres.iter().cloned().map(Sql::parens).collect();
        if !self.with_deleted {
            if let Some(field) = self.table.soft_delete_field() {
                wheres.push(join::not_deleted(alias, field));
            }
        }
        if !wheres.is_empty() {
            sql.push_raw(" WHERE ").append_joined(wheres, " AND ");
        }
        if !self.orders.is_empty() {
            sql.push_raw(" ORDER BY ")
                .append_joined(self.orders.iter().cloned(), ", ");
        }
        if let Some(n) = self.limit {
            sql.append(Sql::raw(format!(" LIMIT {n}")));
        }
        if let Some(n) = self.offset {
            sql.append(Sql::raw(format!(" OFFSET {n}")));
        }
        sql
    }

    /// Runs the statement, then every plural relation beneath it.
    pub(crate) fn fetch<C: Connection + ?Sized>(mut self, conn: &mut C) -> Result<Vec<Scanned>> {
        if let Some(err) = self.err.take() {
            return Err(err);
        }

        let mut scanned = {
            let joins = self.singular_joins();
            let (text, params) = self.render(&joins).build(self.registry.dialect());
            relink_trace_query!(text, params.len());
            let mut rows = conn.query(&text, &params)?;
            scan_rows(&self.table, &joins, &self.captures, &mut *rows)?
        };

        let mut plural = Vec::new();
        take_plural(
            core::mem::take(&mut self.relations),
            &self.table,
            &[],
            &mut plural,
        );
        for fetch in plural {
            self.load(fetch, &mut scanned, conn)?;
        }
        Ok(scanned)
    }

    fn load<C: Connection + ?Sized>(
        &self,
        fetch: PluralFetch<'r>,
        scanned: &mut [Scanned],
        conn: &mut C,
    ) -> Result<()> {
        let PluralFetch {
            owner_table,
            via,
            node,
        } = fetch;
        let mut owners: Vec<&mut Record> = scanned
            .iter_mut()
            .filter_map(|s| descend(&mut s.record, &via))
            .collect();
        if owners.is_empty() {
            return Ok(());
        }

        let mut query = SelectQuery::new(self.registry, Arc::clone(&node.table));
        query.with_deleted = self.with_deleted;
        let composed = {
            let refs: Vec<&Record> = owners.iter().map(|o| &**o).collect();
            join::compose_many(query, &node.relation, &refs)
        };
        // no owner has a usable key
        let Some(query) = composed else {
            return Ok(());
        };
        let mut query = match node.apply {
            Some(apply) => apply(query),
            None => query,
        };
        query.relations.extend(node.children);

        let rows = query.fetch(conn)?;
        let count = assemble::bind(&node.relation, &owner_table, &mut owners, rows)?;
        relink_trace_bind!(node.relation.name, count, owners.len());
        Ok(())
    }
}

fn collect_singular<'a>(
    nodes: &'a [JoinNode<'_>],
    parent: Option<usize>,
    root: &str,
    prefix: &str,
    out: &mut Vec<SingularJoin<'a>>,
) {
    for node in nodes.iter().filter(|n| n.relation.is_singular()) {
        let prefix = if prefix.is_empty() {
            node.relation.column.clone()
        } else {
            format_compact!("{prefix}__{}", node.relation.column)
        };
        let idx = out.len();
        out.push(SingularJoin {
            relation: &node.relation,
            table: &node.table,
            parent,
            alias: format_compact!("{root}__{prefix}"),
            prefix: prefix.clone(),
            columns: &node.columns,
            on: &node.on,
        });
        collect_singular(&node.children, Some(idx), root, &prefix, out);
    }
}

fn joined_columns(join: &SingularJoin<'_>, out: &mut Vec<Sql>) {
    let aliased = |column: &str| {
        let mut sql = Sql::column(join.alias.as_str(), column);
        sql.push_raw(" AS ")
            .append(Sql::ident(format_compact!("{}__{column}", join.prefix)));
        sql
    };
    if join.columns.is_empty() {
        out.extend(join.table.select_fields().map(|f| aliased(&f.column)));
        return;
    }
    for column in join.columns {
        out.push(match column {
            Column::Field(name) => {
                aliased(join.table.field(name).map_or(name.as_str(), |f| f.column.as_str()))
            }
            Column::Expr(expr) => expr.clone(),
        });
    }
}

fn take_plural<'r>(
    nodes: Vec<JoinNode<'r>>,
    owner: &Table,
    via: &[FieldPath],
    out: &mut Vec<PluralFetch<'r>>,
) {
    for node in nodes {
        if node.relation.is_singular() {
            let mut next = via.to_vec();
            next.push(node.relation.path.clone());
            let JoinNode {
                table, children, ..
            } = node;
            take_plural(children, &table, &next, out);
        } else {
            out.push(PluralFetch {
                owner_table: CompactString::from(owner.name()),
                via: via.to_vec(),
                node,
            });
        }
    }
}

fn descend<'a>(mut record: &'a mut Record, via: &[FieldPath]) -> Option<&'a mut Record> {
    for path in via {
        record = record.child_mut(path)?;
    }
    Some(record)
}

/// Copy of a stored builder error. Builder errors never come from the
/// driver, so the fallback arm is not expected to run.
fn replay(err: &RelinkError) -> RelinkError {
    match err {
        RelinkError::Config(e) => RelinkError::Config(e.clone()),
        RelinkError::UnknownRelation { table, relation } => RelinkError::UnknownRelation {
            table: table.clone(),
            relation: relation.clone(),
        },
        RelinkError::Query(msg) => RelinkError::Query(msg.clone()),
        other =>RelinkError::Query(other.to_string()),
    }
}
