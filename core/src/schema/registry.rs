use core::any::TypeId;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use compact_str::CompactString;
use hashbrown::HashMap;

use crate::config::RegistryConfig;
use crate::dialect::{Dialect, DialectFeatures};
use crate::error::{ConfigError, Result};
use crate::query::SelectQuery;
use crate::relink_trace_registry;
use crate::schema::decl::{Model, TypeRef};
use crate::schema::relation::resolve;
use crate::schema::table::{Table, TableShape, build_shape};

/// Cached outcome of building a descriptor. Errors are cached too, so a bad
/// declaration reports the same error on every lookup.
type Cell<T> = Arc<OnceLock<core::result::Result<Arc<T>, ConfigError>>>;

/// Table descriptors keyed by model type.
///
/// Descriptors are built on first use and shared afterwards. Concurrent first
/// lookups of the same type build it once: callers race only for the map
/// entry, then wait on that type's cell while one of them fills it. The map
/// lock is never held during a build.
///
/// ```
/// use relink_core::schema::{FieldType, Model, Registry, TableDecl};
/// use relink_core::{Dialect, ScalarType};
///
/// struct Item;
///
/// impl Model for Item {
///     fn declare() -> TableDecl {
///         TableDecl::new().field("ID", FieldType::Scalar(ScalarType::Int), ",pk")
///     }
/// }
///
/// let registry = Registry::new(Dialect::PostgreSQL);
/// let table = registry.table::<Item>().unwrap();
/// assert_eq!(table.name(), "items");
/// ```
#[derive(Debug)]
pub struct Registry {
    config: RegistryConfig,
    shapes: RwLock<HashMap<TypeId, Cell<TableShape>>>,
    tables: RwLock<HashMap<TypeId, Cell<Table>>>,
    by_name: RwLock<HashMap<CompactString, TypeRef>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::with_config(RegistryConfig::default())
    }
}

impl Registry {
    pub fn new(dialect: Dialect) -> Self {
        Self::with_config(RegistryConfig::new(dialect))
    }

    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            config,
            shapes: RwLock::default(),
            tables: RwLock::default(),
            by_name: RwLock::default(),
        }
    }

    #[inline]
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    #[inline]
    pub fn dialect(&self) -> Dialect {
        self.config.dialect
    }

    #[inline]
    pub fn features(&self) -> DialectFeatures {
        self.config.features()
    }

    /// Descriptor of `M` with relations resolved.
    #[inline]
    pub fn table<M: Model>(&self) -> Result<Arc<Table>> {
        self.table_of(TypeRef::of::<M>())
    }

    pub fn table_of(&self, type_ref: TypeRef) -> Result<Arc<Table>> {
        let cell = cell(&self.tables, type_ref.id());
        Ok(cell.get_or_init(|| self.build_table(type_ref)).clone()?)
    }

    /// Fields-only descriptor; does not resolve relations.
    pub fn shape_of(&self, type_ref: TypeRef) -> Result<Arc<TableShape>> {
        Ok(self.shape(type_ref)?)
    }

    /// Makes `M` discoverable by its table name, which `m2m:<table>` needs.
    pub fn register<M: Model>(&self) -> Result<Arc<TableShape>> {
        self.register_type(TypeRef::of::<M>())
    }

    pub fn register_type(&self, type_ref: TypeRef) -> Result<Arc<TableShape>> {
        let shape = self.shape(type_ref)?;
        self.by_name
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(CompactString::from(shape.name()), type_ref);
        Ok(shape)
    }

    /// Starts a SELECT over `M`.
    pub fn select<M: Model>(&self) -> Result<SelectQuery<'_>> {
        self.select_of(TypeRef::of::<M>())
    }

    pub fn select_of(&self, type_ref: TypeRef) -> Result<SelectQuery<'_>> {
        Ok(SelectQuery::new(self, self.table_of(type_ref)?))
    }

    pub(crate) fn shape(&self, type_ref: TypeRef) -> core::result::Result<Arc<TableShape>, ConfigError> {
        let cell = cell(&self.shapes, type_ref.id());
        cell.get_or_init(|| build_shape(type_ref, &mut Vec::new()).map(Arc::new))
            .clone()
    }

    pub(crate) fn model_by_table(&self, name: &str) -> Option<TypeRef> {
        self.by_name
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .copied()
    }

    /// Resolving relations only reads shapes, never other tables, so no
    /// table cell is entered while another is being filled.
    fn build_table(&self, type_ref: TypeRef) -> core::result::Result<Arc<Table>, ConfigError> {
        let shape = self.shape(type_ref)?;
        let relations = shape
            .relation_specs
            .iter()
            .map(|spec| resolve(self, &shape, spec).map(Arc::new))
            .collect::<core::result::Result<Vec<_>, _>>()?;
        relink_trace_registry!(type_ref.name(), shape.name());
        Ok(Arc::new(Table::new(shape, relations)))
    }
}

fn cell<T>(map: &RwLock<HashMap<TypeId, Cell<T>>>, id: TypeId) -> Cell<T> {
    if let Some(cell) = map
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&id)
    {
        return Arc::clone(cell);
    }
    let mut map = map.write().unwrap_or_else(PoisonError::into_inner);
    Arc::clone(map.entry(id).or_default())
}
