use std::collections::HashMap;
use std::sync::Arc;

use rds_diff::AttributeDiff;
use rds_types::{Attributes, MonotonicClock, ResourceDefinition, ResourceId, Timestamp};
use serde_json::Value;
use tracing::info;

use crate::config::StoreConfig;
use crate::error::{parse_id, StoreError, StoreResult};
use crate::hooks::{NoOpHooks, ResourceHooks};
use crate::item::Item;
use crate::query::Query;
use crate::store::ResourceStore;

/// One registered resource type: definition, hooks, and store.
pub(crate) struct Resource {
    pub(crate) definition: Arc<ResourceDefinition>,
    pub(crate) hooks: Arc<dyn ResourceHooks>,
    pub(crate) store: ResourceStore,
}

/// Context object holding every registered resource type.
///
/// All core operations go through a `Registry` instead of process-wide
/// state, so independent registries never see each other's items.
pub struct Registry {
    pub(crate) config: StoreConfig,
    pub(crate) clock: MonotonicClock,
    pub(crate) resources: HashMap<String, Resource>,
}

impl Registry {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            clock: MonotonicClock::new(),
            resources: HashMap::new(),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Register a resource type without hooks.
    pub fn register(&mut self, definition: ResourceDefinition) -> StoreResult<Arc<ResourceDefinition>> {
        self.register_with_hooks(definition, Arc::new(NoOpHooks))
    }

    /// Register a resource type. Unset optional fields take the config
    /// defaults. Creates the type's empty store.
    pub fn register_with_hooks(
        &mut self,
        definition: ResourceDefinition,
        hooks: Arc<dyn ResourceHooks>,
    ) -> StoreResult<Arc<ResourceDefinition>> {
        const OP: &str = "defineResource";
        definition
            .validate()
            .map_err(|e| StoreError::illegal(OP, format!("definition: {e}")))?;
        if self.resources.contains_key(&definition.name) {
            return Err(StoreError::DuplicateResource {
                op: OP,
                resource: definition.name,
            });
        }

        let definition = Arc::new(definition.with_defaults(
            &self.config.default_id_attribute,
            &self.config.default_base_url,
            &self.config.default_adapter,
        ));
        info!(
            resource = %definition.name,
            relations = definition.relations.len(),
            adapter = definition.adapter(),
            "resource registered"
        );
        self.resources.insert(
            definition.name.clone(),
            Resource {
                definition: Arc::clone(&definition),
                hooks,
                store: ResourceStore::new(),
            },
        );
        Ok(definition)
    }

    pub fn is_registered(&self, resource: &str) -> bool {
        self.resources.contains_key(resource)
    }

    /// Registered type names, sorted.
    pub fn resource_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.resources.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn definition(&self, resource: &str) -> Option<Arc<ResourceDefinition>> {
        self.resources.get(resource).map(|r| Arc::clone(&r.definition))
    }

    pub fn hooks(&self, resource: &str) -> Option<Arc<dyn ResourceHooks>> {
        self.resources.get(resource).map(|r| Arc::clone(&r.hooks))
    }

    pub fn store(&self, resource: &str) -> Option<&ResourceStore> {
        self.resources.get(resource).map(|r| &r.store)
    }

    /// Next timestamp from the registry clock.
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub(crate) fn resource(&self, op: &'static str, resource: &str) -> StoreResult<&Resource> {
        self.resources
            .get(resource)
            .ok_or_else(|| StoreError::nonexistent(op, resource))
    }

    pub(crate) fn resource_mut(
        &mut self,
        op: &'static str,
        resource: &str,
    ) -> StoreResult<&mut Resource> {
        self.resources
            .get_mut(resource)
            .ok_or_else(|| StoreError::nonexistent(op, resource))
    }

    /// Type check first, then id shape.
    fn resource_and_id(
        &self,
        op: &'static str,
        resource: &str,
        id: &Value,
    ) -> StoreResult<(&Resource, ResourceId)> {
        let r = self.resource(op, resource)?;
        let id = parse_id(op, id)?;
        Ok((r, id))
    }

    // ---- Reads ----

    /// The canonical item with primary key `id`.
    pub fn get(&self, resource: &str, id: &Value) -> StoreResult<Option<Item>> {
        let (r, id) = self.resource_and_id("get", resource, id)?;
        Ok(r.store.get(&id).cloned())
    }

    /// Items matching the filter query `params` (`None` selects everything).
    pub fn filter(&self, resource: &str, params: Option<&Value>) -> StoreResult<Vec<Item>> {
        const OP: &str = "filter";
        let r = self.resource(OP, resource)?;
        let query = parse_query(OP, params)?;
        Ok(query.apply(r.store.items()))
    }

    /// The diff recorded by the last digest that saw `id` change.
    pub fn changes(&self, resource: &str, id: &Value) -> StoreResult<AttributeDiff> {
        let (r, id) = self.resource_and_id("changes", resource, id)?;
        Ok(r.store.changes(&id).cloned().unwrap_or_default())
    }

    /// Copy of the snapshot the next digest will diff against.
    pub fn previous(&self, resource: &str, id: &Value) -> StoreResult<Option<Attributes>> {
        let (r, id) = self.resource_and_id("previous", resource, id)?;
        Ok(r.store.previous(&id).cloned())
    }

    pub fn has_changes(&self, resource: &str, id: &Value) -> StoreResult<bool> {
        let (r, id) = self.resource_and_id("hasChanges", resource, id)?;
        Ok(r.store.changes(&id).is_some_and(|d| !d.is_empty()))
    }

    pub fn last_modified(&self, resource: &str, id: &Value) -> StoreResult<Option<Timestamp>> {
        let (r, id) = self.resource_and_id("lastModified", resource, id)?;
        Ok(r.store.modified(&id))
    }

    pub fn collection_modified(&self, resource: &str) -> StoreResult<Timestamp> {
        Ok(self.resource("lastModified", resource)?.store.collection_modified())
    }

    pub fn last_saved(&self, resource: &str, id: &Value) -> StoreResult<Option<Timestamp>> {
        let (r, id) = self.resource_and_id("lastSaved", resource, id)?;
        Ok(r.store.saved(&id))
    }

    pub fn collection_saved(&self, resource: &str) -> StoreResult<Option<Timestamp>> {
        Ok(self.resource("lastSaved", resource)?.store.collection_saved())
    }

    /// Record a successful persistence of `id`. Returns the new timestamp,
    /// or `None` if the item is not stored.
    pub fn mark_saved(&mut self, resource: &str, id: &ResourceId) -> StoreResult<Option<Timestamp>> {
        let now = self.clock.now();
        let r = self.resource_mut("markSaved", resource)?;
        Ok(r.store.mark_saved(id, now).then_some(now))
    }

    /// Canonical attributes of `id` passed through the `serialize` hook.
    /// Relation fields are never part of the output.
    pub fn serialize(&self, resource: &str, id: &Value) -> StoreResult<Option<Value>> {
        const OP: &str = "serialize";
        let (r, id) = self.resource_and_id(OP, resource, id)?;
        let Some(item) = r.store.get(&id) else {
            return Ok(None);
        };
        r.hooks
            .serialize(&r.definition, item.to_json())
            .map(Some)
            .map_err(|e| StoreError::unhandled(OP, e))
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("resources", &self.resource_names())
            .field("config", &self.config)
            .finish()
    }
}

/// Parse optional query params; `None` and `null` select everything.
pub(crate) fn parse_query(op: &'static str, params: Option<&Value>) -> StoreResult<Query> {
    match params {
        None => Ok(Query::all()),
        Some(params) => Query::parse(params).map_err(|message| StoreError::illegal(op, message)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rds_types::Relation;
    use serde_json::json;

    fn registry() -> Registry {
        let mut reg = Registry::default();
        reg.register(ResourceDefinition::new("post").with_endpoint("posts"))
            .unwrap();
        reg
    }

    #[test]
    fn register_applies_config_defaults() {
        let mut reg = Registry::new(StoreConfig {
            default_base_url: "http://test.example.com".into(),
            ..Default::default()
        });
        let def = reg.register(ResourceDefinition::new("user")).unwrap();
        assert_eq!(def.base_url(), "http://test.example.com");
        assert_eq!(def.id_attribute(), "id");
        assert!(reg.is_registered("user"));
        assert!(reg.store("user").unwrap().is_empty());
    }

    #[test]
    fn duplicate_registration_rejected() {
        let mut reg = registry();
        let err = reg.register(ResourceDefinition::new("post")).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateResource { .. }));
    }

    #[test]
    fn invalid_definition_rejected() {
        let mut reg = Registry::default();
        let def = ResourceDefinition::new("org")
            .with_relation(Relation::has_many("user", "id", "orgId"));
        let err = reg.register(def).unwrap_err();
        assert!(matches!(err, StoreError::IllegalArgument { op: "defineResource", .. }));
    }

    #[test]
    fn reads_check_type_before_id() {
        let reg = registry();
        // Unregistered type wins even though the id is malformed too.
        let err = reg.changes("does not exist", &json!({})).unwrap_err();
        assert!(matches!(err, StoreError::NonexistentResource { .. }));

        let err = reg.previous("post", &json!(true)).unwrap_err();
        assert_eq!(err.to_string(), "previous: id: Must be a string or a number!");
    }

    #[test]
    fn reads_on_unknown_id_are_empty() {
        let reg = registry();
        assert!(reg.get("post", &json!(5)).unwrap().is_none());
        assert!(reg.changes("post", &json!(5)).unwrap().is_empty());
        assert!(reg.previous("post", &json!(5)).unwrap().is_none());
        assert!(!reg.has_changes("post", &json!(5)).unwrap());
        assert!(reg.last_modified("post", &json!(5)).unwrap().is_none());
        assert!(reg.last_saved("post", &json!(5)).unwrap().is_none());
        assert_eq!(reg.collection_modified("post").unwrap(), Timestamp::zero());
        assert!(reg.collection_saved("post").unwrap().is_none());
        assert!(reg.serialize("post", &json!(5)).unwrap().is_none());
    }

    #[test]
    fn filter_rejects_non_object_params() {
        let reg = registry();
        let err = reg.filter("post", Some(&json!(5))).unwrap_err();
        assert!(matches!(err, StoreError::IllegalArgument { op: "filter", .. }));
        assert!(reg.filter("post", Some(&Value::Null)).unwrap().is_empty());
    }

    #[test]
    fn mark_saved_requires_stored_item() {
        let mut reg = registry();
        assert!(reg.mark_saved("post", &ResourceId::from(1)).unwrap().is_none());
    }

    #[test]
    fn resource_names_sorted() {
        let mut reg = registry();
        reg.register(ResourceDefinition::new("comment")).unwrap();
        assert_eq!(reg.resource_names(), vec!["comment", "post"]);
    }
}
