use rds_types::{DEFAULT_ADAPTER, DEFAULT_BASE_URL, DEFAULT_ID_ATTRIBUTE};
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Store-wide settings applied to every registered resource.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Link relations of freshly injected items automatically.
    pub link_on_inject: bool,
    /// Primary-key attribute for definitions that do not name one.
    pub default_id_attribute: String,
    /// Base URL for definitions that do not name one.
    pub default_base_url: String,
    /// Adapter for definitions that do not name one.
    pub default_adapter: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            link_on_inject: true,
            default_id_attribute: DEFAULT_ID_ATTRIBUTE.into(),
            default_base_url: DEFAULT_BASE_URL.into(),
            default_adapter: DEFAULT_ADAPTER.into(),
        }
    }
}

impl StoreConfig {
    /// Parse a config from TOML. Missing keys keep their defaults.
    pub fn from_toml_str(input: &str) -> StoreResult<Self> {
        toml::from_str(input).map_err(|e| StoreError::Config(e.to_string()))
    }

    /// Config with eager linking turned off.
    pub fn lazy_links() -> Self {
        Self {
            link_on_inject: false,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = StoreConfig::default();
        assert!(c.link_on_inject);
        assert_eq!(c.default_id_attribute, "id");
        assert_eq!(c.default_base_url, "/");
        assert_eq!(c.default_adapter, "http");
    }

    #[test]
    fn toml_overrides_some_keys() {
        let c = StoreConfig::from_toml_str(
            r#"
            link_on_inject = false
            default_base_url = "http://test.example.com"
            "#,
        )
        .unwrap();
        assert!(!c.link_on_inject);
        assert_eq!(c.default_base_url, "http://test.example.com");
        assert_eq!(c.default_adapter, "http");
    }

    #[test]
    fn empty_toml_is_default() {
        assert_eq!(StoreConfig::from_toml_str("").unwrap(), StoreConfig::default());
    }

    #[test]
    fn malformed_toml_is_rejected() {
        let err = StoreConfig::from_toml_str("link_on_inject = \"yes\"").unwrap_err();
        assert!(matches!(err, StoreError::Config(_)));
    }

    #[test]
    fn lazy_links_disables_linking() {
        assert!(!StoreConfig::lazy_links().link_on_inject);
    }
}
