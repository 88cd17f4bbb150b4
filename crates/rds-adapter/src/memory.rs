use std::collections::HashMap;
use std::sync::{Mutex, PoisonError, RwLock};

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::adapter::{Adapter, FindRequest};
use crate::error::{AdapterError, AdapterResult};

/// In-memory adapter serving canned responses keyed by URL.
///
/// Intended for tests and embedding. Every request is recorded in a call
/// log. Unknown URLs fail with [`AdapterError::NotFound`].
pub struct InMemoryAdapter {
    responses: RwLock<HashMap<String, AdapterResult<Value>>>,
    calls: Mutex<Vec<FindRequest>>,
}

impl InMemoryAdapter {
    pub fn new() -> Self {
        Self {
            responses: RwLock::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Serve `payload` for `url`.
    pub fn respond(&self, url: impl Into<String>, payload: Value) {
        self.responses
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(url.into(), Ok(payload));
    }

    /// Fail every request for `url` with `error`.
    pub fn fail(&self, url: impl Into<String>, error: AdapterError) {
        self.responses
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(url.into(), Err(error));
    }

    /// Forget the response registered for `url`.
    pub fn forget(&self, url: &str) -> bool {
        self.responses
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(url)
            .is_some()
    }

    /// Every request received so far, oldest first.
    pub fn calls(&self) -> Vec<FindRequest> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// URLs requested so far, oldest first.
    pub fn urls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|c| c.url.clone())
            .collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl Default for InMemoryAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Adapter for InMemoryAdapter {
    async fn find(&self, request: &FindRequest) -> AdapterResult<Value> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());
        // Give concurrent callers a chance to observe the in-flight request.
        tokio::task::yield_now().await;

        let response = self
            .responses
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&request.url)
            .cloned();
        debug!(url = %request.url, found = response.is_some(), "in-memory find");
        response.unwrap_or_else(|| {
            Err(AdapterError::NotFound {
                url: request.url.clone(),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rds_types::{Attributes, ResourceDefinition, ResourceId};
    use serde_json::json;
    use std::sync::Arc;

    fn request(url: &str) -> FindRequest {
        FindRequest {
            resource: Arc::new(ResourceDefinition::new("post")),
            id: ResourceId::from(5),
            url: url.into(),
            params: Attributes::new(),
        }
    }

    #[tokio::test]
    async fn serves_registered_payload() {
        let adapter = InMemoryAdapter::new();
        adapter.respond("/post/5", json!({"id": 5}));
        let payload = adapter.find(&request("/post/5")).await.unwrap();
        assert_eq!(payload, json!({"id": 5}));
        assert_eq!(adapter.urls(), vec!["/post/5".to_string()]);
    }

    #[tokio::test]
    async fn unknown_url_is_not_found() {
        let adapter = InMemoryAdapter::default();
        let err = adapter.find(&request("/post/6")).await.unwrap_err();
        assert_eq!(err, AdapterError::NotFound { url: "/post/6".into() });
        assert_eq!(adapter.call_count(), 1);
    }

    #[tokio::test]
    async fn scripted_failure_and_forget() {
        let adapter = InMemoryAdapter::new();
        adapter.fail("/post/5", AdapterError::Http { status: 500, body: json!("boom") });
        assert!(matches!(
            adapter.find(&request("/post/5")).await,
            Err(AdapterError::Http { status: 500, .. })
        ));
        assert!(adapter.forget("/post/5"));
        assert!(!adapter.forget("/post/5"));
        assert_eq!(adapter.calls().len(), 1);
    }
}
