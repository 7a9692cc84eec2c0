use relink_core::schema::Model;
use relink_core::{Connection, Record, Registry, Result, SelectQuery};

/// Database handle: a registry together with the connection its queries
/// run on.
#[derive(Debug)]
pub struct Db<C> {
    registry: Registry,
    conn: C,
}

impl<C: Connection> Db<C> {
    pub fn new(conn: C, registry: Registry) -> Self {
        Self { registry, conn }
    }

    #[inline]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Gets a mutable reference to the underlying connection
    #[inline]
    pub fn conn_mut(&mut self) -> &mut C {
        &mut self.conn
    }

    pub fn into_inner(self) -> C {
        self.conn
    }

    /// Selects `M` records, with the query customized by `build`.
    ///
    /// ```ignore
    /// let books = db.select::<Book>(|q| q.relation("Author").limit(10))?;
    /// ```
    pub fn select<M: Model>(
        &mut self,
        build: impl FnOnce(SelectQuery<'_>) -> SelectQuery<'_>,
    ) -> Result<Vec<Record>> {
        let Self { registry, conn } = self;
        build(registry.select::<M>()?).scan(conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relink_core::schema::{FieldType, TableDecl};
    use relink_core::{Dialect, DriverError, Rows, ScalarType, Value, VecRows};

    struct Tag;
    impl Model for Tag {
        fn declare() -> TableDecl {
            TableDecl::new()
                .field("ID", FieldType::Scalar(ScalarType::Int), ",pk")
                .field("Name", FieldType::Scalar(ScalarType::Text), "")
        }
    }

    #[derive(Default)]
    struct Recorder {
        statements: Vec<String>,
    }

    impl Connection for Recorder {
        fn query<'c>(
            &'c mut self,
            sql: &str,
            _params: &[Value],
        ) -> std::result::Result<Box<dyn Rows + 'c>, DriverError> {
            self.statements.push(sql.to_owned());
            Ok(Box::new(VecRows::new(
                vec!["id".into(), "name".into()],
                vec![vec![Value::Int(1), Value::from("rust")]],
            )))
        }
    }

    #[test]
    fn select_runs_on_the_wrapped_connection() {
        let mut db = Db::new(Recorder::default(), Registry::new(Dialect::SQLite));
        let tags = db.select::<Tag>(|q| q.limit(1)).unwrap();

        let table = db.registry().table::<Tag>().unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(table.value(&tags[0], "name"), Some(&Value::from("rust")));
        assert_eq!(
            db.into_inner().statements,
            ["SELECT \"tag\".\"id\", \"tag\".\"name\" FROM \"tags\" AS \"tag\" LIMIT 1"]
        );
    }
}
