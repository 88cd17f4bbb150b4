use std::sync::Arc;

use rds_types::{value_kind, Attributes, ResourceId};
use serde_json::Value;
use tracing::debug;

use crate::error::{parse_id, StoreError, StoreResult};
use crate::item::Item;
use crate::registry::Registry;

/// Stored handle(s) returned by `inject`, shaped like the input.
#[derive(Clone, Debug)]
pub enum Injected {
    One(Item),
    Many(Vec<Item>),
}

impl Injected {
    /// The single item, or the first of many.
    pub fn first(&self) -> Option<&Item> {
        match self {
            Self::One(item) => Some(item),
            Self::Many(items) => items.first(),
        }
    }

    pub fn items(&self) -> &[Item] {
        match self {
            Self::One(item) => std::slice::from_ref(item),
            Self::Many(items) => items,
        }
    }

    pub fn into_items(self) -> Vec<Item> {
        match self {
            Self::One(item) => vec![item],
            Self::Many(items) => items,
        }
    }

    pub fn len(&self) -> usize {
        self.items().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items().is_empty()
    }
}

impl Registry {
    /// Insert or merge one attribute object or an array of them, running
    /// both inject hooks.
    pub fn inject(&mut self, resource: &str, attrs: Value) -> StoreResult<Injected> {
        self.inject_with(resource, attrs, true)
    }

    /// Like [`inject`](Self::inject), but `after_inject` only runs when
    /// `run_after_inject` is set. Callers that skip it run
    /// [`after_inject`](Self::after_inject) themselves once their own
    /// bookkeeping is done.
    ///
    /// Every argument check and every `before_inject` call happens before
    /// the store is touched, so a rejected call leaves it unchanged.
    pub fn inject_with(
        &mut self,
        resource: &str,
        attrs: Value,
        run_after_inject: bool,
    ) -> StoreResult<Injected> {
        const OP: &str = "inject";
        let (definition, hooks) = {
            let r = self.resource(OP, resource)?;
            (Arc::clone(&r.definition), Arc::clone(&r.hooks))
        };

        let (bags, many) = split_bags(OP, attrs)?;
        let id_attribute = definition.id_attribute();
        let mut prepared: Vec<(ResourceId, Attributes)> = Vec::with_capacity(bags.len());
        for mut bag in bags {
            hooks
                .before_inject(&definition, &mut bag)
                .map_err(|e| StoreError::unhandled(OP, e))?;
            let id = bag
                .get(id_attribute)
                .and_then(|v| ResourceId::from_value(v).ok())
                .ok_or_else(|| {
                    StoreError::illegal(
                        OP,
                        format!("attrs: Must contain the property specified by `idAttribute` ({id_attribute})!"),
                    )
                })?;
            prepared.push((id, bag));
        }

        let now = self.clock.now();
        let store = &mut self.resource_mut(OP, resource)?.store;
        let mut items = Vec::with_capacity(prepared.len());
        let mut created = 0usize;
        for (id, bag) in prepared {
            let item = match store.get(&id) {
                Some(existing) => {
                    existing.merge(bag);
                    existing.clone()
                }
                None => {
                    let item = Item::new(bag);
                    store.insert(id, item.clone(), now);
                    created += 1;
                    item
                }
            };
            items.push(item);
        }
        store.touch(now);
        debug!(
            resource,
            injected = items.len(),
            created,
            total = store.len(),
            "inject"
        );

        if definition.has_relations() && self.config.link_on_inject {
            self.link_items(&definition, &items, &[]);
        }
        if run_after_inject {
            self.after_inject(resource, &items)?;
        }

        Ok(match items.len() {
            1 if !many => Injected::One(items.swap_remove(0)),
            _ => Injected::Many(items),
        })
    }

    /// Run the `after_inject` hook for each of `items`.
    pub fn after_inject(&self, resource: &str, items: &[Item]) -> StoreResult<()> {
        const OP: &str = "inject";
        let r = self.resource(OP, resource)?;
        for item in items {
            r.hooks
                .after_inject(&r.definition, item)
                .map_err(|e| StoreError::unhandled(OP, e))?;
        }
        Ok(())
    }

    /// Remove the item keyed by `id` together with all of its tracking state.
    /// Removing an id that is not stored is a no-op.
    pub fn eject(&mut self, resource: &str, id: &Value) -> StoreResult<Option<Item>> {
        const OP: &str = "eject";
        self.resource(OP, resource)?;
        let id = parse_id(OP, id)?;
        let now = self.clock.now();
        let store = &mut self.resource_mut(OP, resource)?.store;
        let removed = store.remove(&id);
        store.touch(now);
        debug!(resource, %id, removed = removed.is_some(), "eject");
        Ok(removed)
    }

    /// Remove every item of `resource`, clearing all tracking maps and
    /// closing every observer.
    pub fn eject_all(&mut self, resource: &str) -> StoreResult<Vec<Item>> {
        const OP: &str = "ejectAll";
        let now = self.clock.now();
        let store = &mut self.resource_mut(OP, resource)?.store;
        let removed = store.clear();
        store.touch(now);
        debug!(resource, removed = removed.len(), "eject all");
        Ok(removed)
    }
}

fn split_bags(op: &'static str, attrs: Value) -> StoreResult<(Vec<Attributes>, bool)> {
    match attrs {
        Value::Object(bag) => Ok((vec![bag], false)),
        Value::Array(values) => {
            let bags = values
                .into_iter()
                .map(|value| match value {
                    Value::Object(bag) => Ok(bag),
                    other => Err(StoreError::illegal(
                        op,
                        format!("attrs: Must be an object or an array! (got an array holding {})", value_kind(&other)),
                    )),
                })
                .collect::<StoreResult<Vec<_>>>()?;
            Ok((bags, true))
        }
        other => Err(StoreError::illegal(
            op,
            format!("attrs: Must be an object or an array! (got {})", value_kind(&other)),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::ResourceHooks;
    use crate::error::HookError;
    use rds_types::{ResourceDefinition, Timestamp};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn registry() -> Registry {
        let mut reg = Registry::default();
        reg.register(ResourceDefinition::new("post").with_endpoint("posts"))
            .unwrap();
        reg
    }

    fn one(injected: Injected) -> Item {
        match injected {
            Injected::One(item) => item,
            Injected::Many(items) => panic!("expected one item, got {}", items.len()),
        }
    }

    // ---- Inject ----

    #[test]
    fn inject_then_get_returns_same_item() {
        let mut reg = registry();
        let item = one(reg.inject("post", json!({"id": 5, "author": "John"})).unwrap());
        let got = reg.get("post", &json!(5)).unwrap().expect("stored");
        assert!(got.ptr_eq(&item));
        // String and number spellings of the key agree.
        assert!(reg.get("post", &json!("5")).unwrap().unwrap().ptr_eq(&item));

        let store = reg.store("post").unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.is_consistent("id"));
        assert!(reg.last_modified("post", &json!(5)).unwrap().is_some());
        assert!(reg.last_saved("post", &json!(5)).unwrap().is_some());
        assert_eq!(
            reg.previous("post", &json!(5)).unwrap(),
            Some(item.attributes())
        );
    }

    #[test]
    fn second_inject_merges_in_place() {
        let mut reg = registry();
        let first = one(reg.inject("post", json!({"id": 5, "author": "John", "age": 30})).unwrap());
        let second = one(reg.inject("post", json!({"id": 5, "author": "Johnny"})).unwrap());

        assert!(first.ptr_eq(&second));
        assert_eq!(first.get("author"), Some(json!("Johnny")));
        assert_eq!(first.get("age"), Some(json!(30)));
        assert_eq!(reg.store("post").unwrap().len(), 1);
    }

    #[test]
    fn float_and_integer_keys_name_one_item() {
        let mut reg = registry();
        let item = one(reg.inject("post", json!({"id": 5.0, "author": "John"})).unwrap());
        assert!(reg.get("post", &json!(5)).unwrap().unwrap().ptr_eq(&item));

        let merged = one(reg.inject("post", json!({"id": 5, "author": "Johnny"})).unwrap());
        assert!(merged.ptr_eq(&item));
        let store = reg.store("post").unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.is_consistent("id"));
    }

    #[test]
    fn inject_array_keeps_shape_and_order() {
        let mut reg = registry();
        let injected = reg
            .inject("post", json!([{"id": 1}, {"id": 2}, {"id": 3}]))
            .unwrap();
        assert!(matches!(injected, Injected::Many(_)));
        let ids: Vec<Value> = injected.items().iter().filter_map(|i| i.get("id")).collect();
        assert_eq!(ids, vec![json!(1), json!(2), json!(3)]);

        let single_array = reg.inject("post", json!([{"id": 4}])).unwrap();
        assert!(matches!(single_array, Injected::Many(ref v) if v.len() == 1));
        assert_eq!(reg.store("post").unwrap().len(), 4);
    }

    #[test]
    fn inject_updates_collection_modified() {
        let mut reg = registry();
        assert_eq!(reg.collection_modified("post").unwrap(), Timestamp::zero());
        reg.inject("post", json!({"id": 1})).unwrap();
        let first = reg.collection_modified("post").unwrap();
        reg.inject("post", json!({"id": 1, "title": "x"})).unwrap();
        assert!(reg.collection_modified("post").unwrap().is_after(&first));
    }

    #[test]
    fn inject_rejects_bad_shapes_before_mutation() {
        let mut reg = registry();
        for bad in [json!("post"), json!(5), json!(null), json!([{"id": 1}, 7])] {
            let err = reg.inject("post", bad).unwrap_err();
            assert!(matches!(err, StoreError::IllegalArgument { op: "inject", .. }));
        }
        // Second bag lacks a key: nothing from the batch is stored.
        let err = reg
            .inject("post", json!([{"id": 1}, {"title": "no key"}]))
            .unwrap_err();
        assert!(err.to_string().contains("idAttribute"));
        let err = reg.inject("post", json!({"id": {"nested": 1}})).unwrap_err();
        assert!(matches!(err, StoreError::IllegalArgument { .. }));
        assert!(reg.store("post").unwrap().is_empty());
    }

    #[test]
    fn inject_unregistered_type() {
        let mut reg = registry();
        let err = reg.inject("does not exist", json!("garbage")).unwrap_err();
        assert!(matches!(err, StoreError::NonexistentResource { op: "inject", .. }));
    }

    #[test]
    fn inject_honours_custom_id_attribute() {
        let mut reg = Registry::default();
        reg.register(ResourceDefinition::new("doc").with_id_attribute("_id"))
            .unwrap();
        reg.inject("doc", json!({"_id": "a1", "id": 99})).unwrap();
        assert!(reg.get("doc", &json!("a1")).unwrap().is_some());
        assert!(reg.get("doc", &json!(99)).unwrap().is_none());
    }

    // ---- Hooks ----

    #[derive(Default)]
    struct CountingHooks {
        before: AtomicUsize,
        after: AtomicUsize,
    }

    impl ResourceHooks for CountingHooks {
        fn before_inject(
            &self,
            _definition: &ResourceDefinition,
            attrs: &mut Attributes,
        ) -> Result<(), HookError> {
            self.before.fetch_add(1, Ordering::SeqCst);
            attrs.insert("touched".into(), json!(true));
            Ok(())
        }

        fn after_inject(&self, _definition: &ResourceDefinition, _item: &Item) -> Result<(), HookError> {
            self.after.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FailingHooks;

    impl ResourceHooks for FailingHooks {
        fn before_inject(
            &self,
            _definition: &ResourceDefinition,
            attrs: &mut Attributes,
        ) -> Result<(), HookError> {
            if attrs.get("id") == Some(&json!(13)) {
                return Err("unlucky id".into());
            }
            Ok(())
        }
    }

    #[test]
    fn hooks_run_once_per_bag() {
        let hooks = Arc::new(CountingHooks::default());
        let mut reg = Registry::default();
        reg.register_with_hooks(ResourceDefinition::new("post"), hooks.clone())
            .unwrap();

        let injected = reg.inject("post", json!([{"id": 1}, {"id": 2}])).unwrap();
        assert_eq!(hooks.before.load(Ordering::SeqCst), 2);
        assert_eq!(hooks.after.load(Ordering::SeqCst), 2);
        assert_eq!(injected.items()[0].get("touched"), Some(json!(true)));

        reg.inject_with("post", json!({"id": 3}), false).unwrap();
        assert_eq!(hooks.before.load(Ordering::SeqCst), 3);
        assert_eq!(hooks.after.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn failing_hook_surfaces_as_unhandled() {
        let mut reg = Registry::default();
        reg.register_with_hooks(ResourceDefinition::new("post"), Arc::new(FailingHooks))
            .unwrap();
        let err = reg.inject("post", json!([{"id": 12}, {"id": 13}])).unwrap_err();
        match &err {
            StoreError::Unhandled { op, source } => {
                assert_eq!(*op, "inject");
                assert_eq!(source.to_string(), "unlucky id");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(reg.store("post").unwrap().is_empty());
    }

    // ---- Eject ----

    #[test]
    fn eject_round_trip_clears_tracking() {
        let mut reg = registry();
        let item = one(reg.inject("post", json!({"id": 5, "author": "John"})).unwrap());
        item.set("author", json!("Sally"));
        reg.digest();
        assert!(reg.has_changes("post", &json!(5)).unwrap());
        let before = reg.collection_modified("post").unwrap();

        let removed = reg.eject("post", &json!(5)).unwrap().expect("removed");
        assert!(removed.ptr_eq(&item));
        assert!(reg.get("post", &json!(5)).unwrap().is_none());
        assert!(reg.changes("post", &json!(5)).unwrap().is_empty());
        assert!(reg.previous("post", &json!(5)).unwrap().is_none());
        assert!(reg.last_modified("post", &json!(5)).unwrap().is_none());
        assert!(reg.last_saved("post", &json!(5)).unwrap().is_none());
        assert!(reg.collection_modified("post").unwrap().is_after(&before));

        let store = reg.store("post").unwrap();
        assert!(store.is_empty());
        assert_eq!(store.observer_count(), 0);
        assert!(store.is_consistent("id"));
    }

    #[test]
    fn eject_missing_id_is_noop() {
        let mut reg = registry();
        reg.inject("post", json!({"id": 1})).unwrap();
        assert!(reg.eject("post", &json!(2)).unwrap().is_none());
        assert_eq!(reg.store("post").unwrap().len(), 1);
    }

    #[test]
    fn eject_checks_type_before_id() {
        let mut reg = registry();
        let err = reg.eject("does not exist", &json!({})).unwrap_err();
        assert!(matches!(err, StoreError::NonexistentResource { op: "eject", .. }));
        let err = reg.eject("post", &json!({})).unwrap_err();
        assert_eq!(err.to_string(), "eject: id: Must be a string or a number!");
    }

    #[test]
    fn eject_all_clears_everything() {
        let mut reg = registry();
        reg.inject("post", json!([{"id": 1}, {"id": 2}])).unwrap();
        reg.get("post", &json!(1)).unwrap().unwrap().set("title", json!("x"));
        reg.digest();

        let removed = reg.eject_all("post").unwrap();
        assert_eq!(removed.len(), 2);
        let store = reg.store("post").unwrap();
        assert!(store.is_empty());
        assert_eq!(store.observer_count(), 0);
        assert!(store.changes.is_empty());
        assert!(store.previous_attributes.is_empty());
        assert!(store.modified.is_empty());
        assert!(store.saved.is_empty());
        assert!(reg.collection_modified("post").unwrap() > Timestamp::zero());
    }
}
