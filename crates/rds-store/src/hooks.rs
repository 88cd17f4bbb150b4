use rds_types::{Attributes, ResourceDefinition};
use serde_json::Value;

use crate::error::HookError;
use crate::item::Item;

/// Optional per-resource lifecycle hooks.
///
/// Hooks run synchronously inside store operations. Any error they return is
/// surfaced to the caller as [`StoreError::Unhandled`](crate::StoreError)
/// with the hook's error kept as the source. Every method has a pass-through
/// default, so implementors only override what they need.
pub trait ResourceHooks: Send + Sync {
    /// Called for every attribute bag before `inject` touches the store.
    fn before_inject(
        &self,
        definition: &ResourceDefinition,
        attrs: &mut Attributes,
    ) -> Result<(), HookError> {
        let _ = (definition, attrs);
        Ok(())
    }

    /// Called for every item once `inject` has stored it.
    fn after_inject(&self, definition: &ResourceDefinition, item: &Item) -> Result<(), HookError> {
        let _ = (definition, item);
        Ok(())
    }

    /// Translate canonical attributes into the payload sent to an adapter.
    fn serialize(&self, definition: &ResourceDefinition, attrs: Value) -> Result<Value, HookError> {
        let _ = definition;
        Ok(attrs)
    }

    /// Translate a raw adapter payload into attributes.
    fn deserialize(
        &self,
        definition: &ResourceDefinition,
        payload: Value,
    ) -> Result<Value, HookError> {
        let _ = definition;
        Ok(payload)
    }
}

/// Hooks that do nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpHooks;

impl ResourceHooks for NoOpHooks {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn noop_hooks_pass_through() {
        let def = ResourceDefinition::new("post");
        let hooks = NoOpHooks;

        let mut attrs = Attributes::new();
        attrs.insert("id".into(), json!(1));
        hooks.before_inject(&def, &mut attrs).unwrap();
        assert_eq!(attrs.len(), 1);

        let payload = json!({"id": 1, "title": "x"});
        assert_eq!(hooks.deserialize(&def, payload.clone()).unwrap(), payload);
        assert_eq!(hooks.serialize(&def, payload.clone()).unwrap(), payload);

        let item = Item::new(attrs);
        hooks.after_inject(&def, &item).unwrap();
    }
}
