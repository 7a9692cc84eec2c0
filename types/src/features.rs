//! Dialect capability flags consulted by the relation composer.

/// Set of optional SQL capabilities.
///
/// Starts empty; [`Dialect::features`](crate::Dialect::features) returns the
/// default set for each dialect, and callers may switch individual flags off
/// (for example to force the `OR`-chain strategy on a database that lacks
/// row-value `IN`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DialectFeatures {
    composite_in: bool,
    array_ops: bool,
}

impl DialectFeatures {
    /// No optional capabilities.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            composite_in: false,
            array_ops: false,
        }
    }

    /// `(a, b) IN ((1, 2), (3, 4))` predicates.
    #[must_use]
    pub const fn composite_in(mut self, on: bool) -> Self {
        self.composite_in = on;
        self
    }

    /// `x = ANY(arr)` and `arr @> ARRAY[x]` operators.
    #[must_use]
    pub const fn array_ops(mut self, on: bool) -> Self {
        self.array_ops = on;
        self
    }

    #[inline]
    #[must_use]
    pub const fn supports_composite_in(&self) -> bool {
        self.composite_in
    }

    #[inline]
    #[must_use]
    pub const fn supports_array_ops(&self) -> bool {
        self.array_ops
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_toggle_independently() {
        let f = DialectFeatures::new().composite_in(true);
        assert!(f.supports_composite_in());
        assert!(!f.supports_array_ops());

        let f = f.array_ops(true).composite_in(false);
        assert!(!f.supports_composite_in());
        assert!(f.supports_array_ops());
    }
}
