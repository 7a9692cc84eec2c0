//! Tracing utilities for query and relation-loading observability.
//!
//! Enable the `tracing` feature to emit events via the `tracing` crate.
//! These macros no-op when the feature is disabled, avoiding `#[cfg]` boilerplate
//! at every call site.

/// Emit a debug-level tracing event with the SQL text and parameter count.
///
/// ```ignore
/// relink_trace_query!(&sql, params.len());
/// ```
#[macro_export]
macro_rules! relink_trace_query {
    ($sql:expr, $param_count:expr) => {
        #[cfg(feature = "tracing")]
        ::tracing::debug!(sql = %$sql, params = $param_count, "relink.query");
    };
}

/// Emit a debug-level event when the registry builds a descriptor.
#[macro_export]
macro_rules! relink_trace_registry {
    ($type_name:expr, $table:expr) => {
        #[cfg(feature = "tracing")]
        ::tracing::debug!(model = %$type_name, table = %$table, "relink.registry");
    };
}

/// Emit a trace-level event after a relation fetch moved rows into owners.
#[macro_export]
macro_rules! relink_trace_bind {
    ($relation:expr, $rows:expr, $owners:expr) => {
        #[cfg(feature = "tracing")]
        ::tracing::trace!(relation = %$relation, rows = $rows, owners = $owners, "relink.bind");
    };
}

/// Emit a warn-level event for declarations that still work but are deprecated.
#[macro_export]
macro_rules! relink_warn {
    ($($arg:tt)+) => {
        #[cfg(feature = "tracing")]
        ::tracing::warn!($($arg)+);
    };
}
