use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use rds_adapter::{resolve_endpoint, Adapter, FindRequest};
use rds_diff::AttributeDiff;
use rds_store::{
    parse_id, DigestReport, Injected, Item, Registry, ResourceHooks, StoreConfig, StoreError,
};
use rds_types::{Attributes, ResourceDefinition, ResourceId, Timestamp};
use serde_json::Value;
use tracing::{debug, debug_span, info, warn, Instrument};
use uuid::Uuid;

use crate::coordinator::{join, Coordinator, Lease, PendingKey, Ticket};
use crate::error::{SdkError, SdkResult};
use crate::options::FindOptions;

/// Client-side resource data store.
///
/// Owns the [`Registry`] of resource types, the adapters they fetch
/// through, and the bookkeeping that de-duplicates concurrent fetches.
/// Synchronous operations run to completion under the registry lock; the
/// lock is never held while waiting on an adapter.
pub struct DataStore {
    registry: RwLock<Registry>,
    adapters: RwLock<HashMap<String, Arc<dyn Adapter>>>,
    coordinator: Coordinator,
}

impl DataStore {
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            registry: RwLock::new(Registry::new(config)),
            adapters: RwLock::new(HashMap::new()),
            coordinator: Coordinator::new(),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Registry> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Registry> {
        self.registry.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` against the registry under the read lock.
    pub fn with_registry<R>(&self, f: impl FnOnce(&Registry) -> R) -> R {
        f(&self.read())
    }

    // ---- Registration ----

    pub fn register_resource(
        &self,
        definition: ResourceDefinition,
    ) -> SdkResult<Arc<ResourceDefinition>> {
        Ok(self.write().register(definition)?)
    }

    pub fn register_resource_with_hooks(
        &self,
        definition: ResourceDefinition,
        hooks: Arc<dyn ResourceHooks>,
    ) -> SdkResult<Arc<ResourceDefinition>> {
        Ok(self.write().register_with_hooks(definition, hooks)?)
    }

    /// Register `adapter` under `name`, returning the adapter it replaced.
    pub fn register_adapter(
        &self,
        name: impl Into<String>,
        adapter: Arc<dyn Adapter>,
    ) -> Option<Arc<dyn Adapter>> {
        let name = name.into();
        info!(adapter = %name, "adapter registered");
        self.adapters
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name, adapter)
    }

    fn adapter(&self, name: &str) -> SdkResult<Arc<dyn Adapter>> {
        self.adapters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| SdkError::AdapterNotFound(name.to_string()))
    }

    // ---- Inject / eject ----

    pub fn inject(&self, resource: &str, attrs: Value) -> SdkResult<Injected> {
        Ok(self.write().inject(resource, attrs)?)
    }

    pub fn eject(&self, resource: &str, id: &Value) -> SdkResult<Option<Item>> {
        let removed = self.write().eject(resource, id)?;
        if let Ok(id) = ResourceId::from_value(id) {
            self.coordinator.forget(&(resource.to_string(), id));
        }
        Ok(removed)
    }

    pub fn eject_all(&self, resource: &str) -> SdkResult<Vec<Item>> {
        let removed = self.write().eject_all(resource)?;
        self.coordinator.forget_resource(resource);
        Ok(removed)
    }

    // ---- Find ----

    /// Fetch one item through its resource's adapter, or serve it from the
    /// cache.
    ///
    /// Concurrent calls for the same item share one adapter call unless
    /// `bypass_cache` is set. Adapter errors are returned unchanged.
    pub async fn find(&self, resource: &str, id: &Value, options: FindOptions) -> SdkResult<Item> {
        const OP: &str = "find";
        let (definition, id) = {
            let reg = self.read();
            let definition = reg
                .definition(resource)
                .ok_or_else(|| StoreError::nonexistent(OP, resource))?;
            (definition, parse_id(OP, id)?)
        };
        let key: PendingKey = (resource.to_string(), id.clone());

        let lease = match self.coordinator.begin(key.clone(), options.bypass_cache, || {
            self.read().store(resource).and_then(|s| s.get(&id).cloned())
        }) {
            Ticket::Join(rx) => {
                debug!(resource, %id, "joining in-flight find");
                return join(rx, key).await;
            }
            Ticket::Cached(item) => return Ok(item),
            Ticket::Lead(lease) => lease,
        };

        let request_id = Uuid::now_v7();
        let span = debug_span!("find", %request_id, resource, %id, seq = lease.seq());
        let result = self
            .fetch(&definition, &id, options, &lease)
            .instrument(span)
            .await;
        lease.settle(&result);
        result
    }

    async fn fetch(
        &self,
        definition: &Arc<ResourceDefinition>,
        id: &ResourceId,
        options: FindOptions,
        lease: &Lease<'_>,
    ) -> SdkResult<Item> {
        const OP: &str = "find";
        let resource = definition.name.as_str();
        let adapter = self.adapter(definition.adapter())?;
        let (request, hooks) = {
            let reg = self.read();
            let endpoint = resolve_endpoint(&reg, definition, id, options.params);
            let hooks = reg
                .hooks(resource)
                .ok_or_else(|| StoreError::nonexistent(OP, resource))?;
            let request = FindRequest {
                resource: Arc::clone(definition),
                id: id.clone(),
                url: endpoint.url,
                params: endpoint.params,
            };
            (request, hooks)
        };

        debug!(url = %request.url, "adapter find");
        let raw = adapter.find(&request).await?;
        let attrs = match hooks
            .deserialize(definition, raw)
            .map_err(|e| StoreError::unhandled(OP, e))?
        {
            Value::Object(attrs) => attrs,
            other => {
                return Err(StoreError::illegal(
                    OP,
                    format!("response: Must be an object! (got {})", rds_types::value_kind(&other)),
                )
                .into())
            }
        };

        if !options.cache_response {
            return Ok(Item::new(attrs));
        }
        self.apply(resource, attrs, lease)
    }

    /// Write a fetched response into the store unless a later-issued fetch
    /// for the same item already did.
    fn apply(
        &self,
        resource: &str,
        attrs: Attributes,
        lease: &Lease<'_>,
    ) -> SdkResult<Item> {
        let mut reg = self.write();
        if !lease.is_latest() {
            warn!(resource, seq = lease.seq(), "stale find response not applied");
            return Ok(Item::new(attrs));
        }

        let injected = reg.inject_with(resource, Value::Object(attrs), false)?;
        lease.record_applied();
        let item = injected
            .first()
            .cloned()
            .ok_or_else(|| StoreError::illegal("find", "response: empty payload"))?;
        let id_attribute = reg
            .definition(resource)
            .map(|d| d.id_attribute().to_string())
            .unwrap_or_default();
        if let Some(stored_id) = item
            .get(&id_attribute)
            .and_then(|v| ResourceId::from_value(&v).ok())
        {
            reg.mark_saved(resource, &stored_id)?;
        }
        reg.after_inject(resource, std::slice::from_ref(&item))?;
        Ok(item)
    }

    // ---- Reads ----

    pub fn get(&self, resource: &str, id: &Value) -> SdkResult<Option<Item>> {
        Ok(self.read().get(resource, id)?)
    }

    pub fn filter(&self, resource: &str, params: Option<&Value>) -> SdkResult<Vec<Item>> {
        Ok(self.read().filter(resource, params)?)
    }

    pub fn changes(&self, resource: &str, id: &Value) -> SdkResult<AttributeDiff> {
        Ok(self.read().changes(resource, id)?)
    }

    pub fn previous(&self, resource: &str, id: &Value) -> SdkResult<Option<Attributes>> {
        Ok(self.read().previous(resource, id)?)
    }

    pub fn has_changes(&self, resource: &str, id: &Value) -> SdkResult<bool> {
        Ok(self.read().has_changes(resource, id)?)
    }

    pub fn last_modified(&self, resource: &str, id: &Value) -> SdkResult<Option<Timestamp>> {
        Ok(self.read().last_modified(resource, id)?)
    }

    pub fn collection_modified(&self, resource: &str) -> SdkResult<Timestamp> {
        Ok(self.read().collection_modified(resource)?)
    }

    pub fn last_saved(&self, resource: &str, id: &Value) -> SdkResult<Option<Timestamp>> {
        Ok(self.read().last_saved(resource, id)?)
    }

    pub fn collection_saved(&self, resource: &str) -> SdkResult<Option<Timestamp>> {
        Ok(self.read().collection_saved(resource)?)
    }

    pub fn serialize(&self, resource: &str, id: &Value) -> SdkResult<Option<Value>> {
        Ok(self.read().serialize(resource, id)?)
    }

    // ---- Linking and change detection ----

    pub fn link_all(
        &self,
        resource: &str,
        params: Option<&Value>,
        relation_names: &[&str],
    ) -> SdkResult<Vec<Item>> {
        Ok(self.read().link_all(resource, params, relation_names)?)
    }

    /// Run one change-detection pass over every resource type.
    pub fn digest(&self) -> DigestReport {
        self.write().digest()
    }

    /// Number of fetches other callers can currently join.
    pub fn pending_requests(&self) -> usize {
        self.coordinator.pending_len()
    }
}

impl Default for DataStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DataStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let adapters: Vec<String> = self
            .adapters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        // Pending lock before registry lock, as in `find`.
        let pending = self.pending_requests();
        f.debug_struct("DataStore")
            .field("registry", &*self.read())
            .field("adapters", &adapters)
            .field("pending", &pending)
            .finish()
    }
}
