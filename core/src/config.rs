//! Registry configuration.

use crate::dialect::{Dialect, DialectFeatures};

/// Settings a [`Registry`](crate::schema::Registry) is built with.
///
/// `features` overrides the capabilities the dialect implies; leave it unset
/// to use [`Dialect::features`].
///
/// With the `serde` feature the config can be read from the host
/// application's settings:
///
/// ```ignore
/// let config: RegistryConfig = serde_json::from_str(r#"{"dialect":"postgresql"}"#)?;
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RegistryConfig {
    pub dialect: Dialect,
    pub features: Option<DialectFeatures>,
}

impl RegistryConfig {
    #[inline]
    pub const fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            features: None,
        }
    }

    #[inline]
    pub const fn with_features(mut self, features: DialectFeatures) -> Self {
        self.features = Some(features);
        self
    }

    /// Effective capabilities.
    #[inline]
    pub const fn features(&self) -> DialectFeatures {
        match self.features {
            Some(features) => features,
            None => self.dialect.features(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn features_default_from_dialect() {
        let pg = RegistryConfig::new(Dialect::PostgreSQL);
        assert!(pg.features().supports_array_ops());

        let sqlite = RegistryConfig::new(Dialect::SQLite);
        assert!(!sqlite.features().supports_composite_in());

        let forced = sqlite.with_features(DialectFeatures::new().composite_in(true));
        assert!(forced.features().supports_composite_in());
        assert!(!forced.features().supports_array_ops());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn deserialize_from_json() {
        let config: RegistryConfig =
            serde_json::from_str(r#"{"dialect":"postgresql","features":{"array_ops":false}}"#)
                .unwrap();
        assert_eq!(config.dialect, Dialect::PostgreSQL);
        assert!(!config.features().supports_array_ops());
        assert!(!config.features().supports_composite_in());

        let config: RegistryConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, RegistryConfig::default());
    }
}
