//! URL construction for `find` requests.
//!
//! A resource with a parent relation is fetched below its parent:
//! `base_url/parent_endpoint/parent_id/endpoint/id`, recursively for the
//! parent's own parent.

use std::collections::HashSet;

use rds_store::Registry;
use rds_types::{Attributes, ResourceDefinition, ResourceId};

/// Resolved location of one item.
#[derive(Clone, Debug, PartialEq)]
pub struct Endpoint {
    pub url: String,
    /// Query parameters not consumed by the path.
    pub params: Attributes,
}

/// Join path segments with `/`, collapsing repeated slashes. The `//` after a
/// URL scheme is kept.
pub fn make_path(segments: &[&str]) -> String {
    let joined = segments
        .iter()
        .filter(|s| !s.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("/");

    let mut out = String::with_capacity(joined.len());
    for c in joined.chars() {
        if c == '/' && out.ends_with('/') {
            let before_run = out.trim_end_matches('/').chars().last();
            let run = out.len() - out.trim_end_matches('/').len();
            if !(before_run == Some(':') && run == 1) {
                continue;
            }
        }
        out.push(c);
    }
    out
}

/// Resolve the URL of item `id` of `definition`.
///
/// The parent id comes from `params[foreign_key]` when present; any value
/// there that is not a string or number turns nesting off. Otherwise the
/// cached item's foreign-key attribute is used. Consumed keys are removed
/// from the returned params. Nesting stops at the first parent already on the
/// path, so cyclic parent data cannot recurse forever.
pub fn resolve_endpoint(
    registry: &Registry,
    definition: &ResourceDefinition,
    id: &ResourceId,
    mut params: Attributes,
) -> Endpoint {
    let mut visited = HashSet::new();
    let path = endpoint_path(registry, definition, Some(id), &mut params, &mut visited);
    Endpoint {
        url: make_path(&[definition.base_url(), &path, id.as_str()]),
        params,
    }
}

fn endpoint_path(
    registry: &Registry,
    definition: &ResourceDefinition,
    id: Option<&ResourceId>,
    params: &mut Attributes,
    visited: &mut HashSet<(String, ResourceId)>,
) -> String {
    let endpoint = definition.endpoint().to_string();
    let Some(parent) = definition.parent() else {
        return endpoint;
    };
    let Some(parent_definition) = registry.definition(&parent.target) else {
        return endpoint;
    };

    let key = parent.foreign_key.as_str();
    let parent_id = match params.remove(key) {
        Some(value) => match ResourceId::from_value(&value) {
            Ok(parent_id) => parent_id,
            Err(_) => return endpoint,
        },
        None => {
            let cached = id
                .and_then(|id| registry.store(&definition.name)?.get(id)?.get(key))
                .and_then(|value| ResourceId::from_value(&value).ok());
            match cached {
                Some(parent_id) => parent_id,
                None => return endpoint,
            }
        }
    };

    if !visited.insert((parent_definition.name.clone(), parent_id.clone())) {
        return endpoint;
    }
    let parent_path = endpoint_path(registry, &parent_definition, Some(&parent_id), params, visited);
    make_path(&[&parent_path, parent_id.as_str(), &endpoint])
}
