use thiserror::Error;

/// Error type returned by driver adapters, passed through unchanged.
pub type DriverError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A model declaration the registry refuses to accept.
///
/// Detected the first time the offending type is looked up. The registry
/// caches the error, so every later lookup of the same type reports it again.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Tag string that does not follow the tag grammar
    #[error("{type_name}: malformed tag {tag:?} on {field}: {reason}")]
    MalformedTag {
        type_name: String,
        field: String,
        tag: String,
        reason: String,
    },

    /// Relation names a column the owner (or target) does not have
    #[error("{type_name}: relation {relation} references unknown column {column:?} on {table}")]
    UnknownField {
        type_name: String,
        relation: String,
        column: String,
        table: String,
    },

    /// Base and join key lists differ in length
    #[error("{type_name}: relation {relation} pairs {base} base keys with {join} join keys")]
    KeyLengthMismatch {
        type_name: String,
        relation: String,
        base: usize,
        join: usize,
    },

    /// Both columns of one key pair are arrays
    #[error("{type_name}: relation {relation} compares array column {base:?} with array column {join:?}")]
    ArrayOnBothSides {
        type_name: String,
        relation: String,
        base: String,
        join: String,
    },

    /// Array-keyed relation declared for a dialect without `ANY` / `@>`
    #[error("{type_name}: relation {relation} is array-keyed but {dialect} has no array operators")]
    ArrayUnsupported {
        type_name: String,
        relation: String,
        dialect: String,
    },

    /// `m2m:<table>` names a table no registered model maps to
    #[error("{type_name}: relation {relation} uses join table {table:?}, which is not registered")]
    UnknownJoinTable {
        type_name: String,
        relation: String,
        table: String,
    },

    /// A struct contains itself by value
    #[error("{type_name}: field {field} contains {type_name} by value")]
    RecursiveStruct { type_name: String, field: String },

    /// More fields than a field path can address
    #[error("{type_name}: declares more than {limit} fields")]
    TooManyFields { type_name: String, limit: usize },

    /// Anything else wrong with a relation declaration
    #[error("{type_name}: relation {relation}: {reason}")]
    InvalidRelation {
        type_name: String,
        relation: String,
        reason: String,
    },
}

#[derive(Debug, Error)]
pub enum RelinkError {
    /// Invalid model declaration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A fetched related row matches no owner in the batch
    #[error("{relation} relation does not have base {table} with key {key} (check join conditions)")]
    Orphan {
        relation: String,
        table: String,
        key: String,
    },

    /// The database returned a column the model cannot hold
    #[error("{table} does not have column {column:?}")]
    ScanShape { table: String, column: String },

    /// Relation name not declared on the model
    #[error("{table} does not have relation {relation:?}")]
    UnknownRelation { table: String, relation: String },

    /// Error raised by the driver while executing or iterating
    #[error("Execution error: {0}")]
    Execution(#[from] DriverError),

    /// Error in a query built by the caller
    #[error("Query error: {0}")]
    Query(String),
}

/// Result type for relink operations
pub type Result<T> = std::result::Result<T, RelinkError>;
