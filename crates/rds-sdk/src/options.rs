use rds_types::Attributes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Options for [`DataStore::find`](crate::DataStore::find).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FindOptions {
    /// Always call the adapter, even if the item is cached or a request for
    /// it is already in flight.
    pub bypass_cache: bool,
    /// Inject the response into the store. When off, the caller gets a
    /// detached item and no inject hooks run.
    pub cache_response: bool,
    /// Parent keys for nested endpoints and extra query parameters.
    pub params: Attributes,
}

impl Default for FindOptions {
    fn default() -> Self {
        Self {
            bypass_cache: false,
            cache_response: true,
            params: Attributes::new(),
        }
    }
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bypass_cache(mut self) -> Self {
        self.bypass_cache = true;
        self
    }

    pub fn cache_response(mut self, cache: bool) -> Self {
        self.cache_response = cache;
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults() {
        let o = FindOptions::default();
        assert!(!o.bypass_cache);
        assert!(o.cache_response);
        assert!(o.params.is_empty());
    }

    #[test]
    fn builder_and_json_agree() {
        let built = FindOptions::new()
            .bypass_cache()
            .cache_response(false)
            .param("approvedBy", json!(4));
        let parsed: FindOptions = serde_json::from_value(json!({
            "bypassCache": true,
            "cacheResponse": false,
            "params": {"approvedBy": 4}
        }))
        .unwrap();
        assert_eq!(built, parsed);
    }

    #[test]
    fn missing_fields_keep_defaults() {
        let parsed: FindOptions = serde_json::from_value(json!({"bypassCache": true})).unwrap();
        assert!(parsed.cache_response);
    }
}
