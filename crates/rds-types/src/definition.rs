use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Primary-key attribute used when a definition does not name one.
pub const DEFAULT_ID_ATTRIBUTE: &str = "id";

/// Base URL used when neither the definition nor the config names one.
pub const DEFAULT_BASE_URL: &str = "/";

/// Adapter used when neither the definition nor the config names one.
pub const DEFAULT_ADAPTER: &str = "http";

// ---------------------------------------------------------------------------
// Relations
// ---------------------------------------------------------------------------

/// Direction of a declared relation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RelationKind {
    /// The owning item carries a foreign key pointing at one target item.
    BelongsTo,
    /// Target items carry a foreign key pointing back at the owning item.
    HasMany,
    /// Like `HasMany`, but only the first matching target is attached.
    HasOne,
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BelongsTo => write!(f, "belongsTo"),
            Self::HasMany => write!(f, "hasMany"),
            Self::HasOne => write!(f, "hasOne"),
        }
    }
}

/// A declared relation between two resource types.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relation {
    pub kind: RelationKind,
    /// Name of the related resource type.
    pub target: String,
    /// Field on the owning item that receives the linked reference(s).
    pub local_field: String,
    /// Attribute holding the key. Lives on the owning item for `BelongsTo`
    /// and on the target items for `HasMany`/`HasOne`.
    pub foreign_key: String,
    /// Marks a `BelongsTo` target as the path parent for nested endpoints.
    #[serde(default)]
    pub parent: bool,
}

impl Relation {
    pub fn belongs_to(
        target: impl Into<String>,
        local_field: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self {
            kind: RelationKind::BelongsTo,
            target: target.into(),
            local_field: local_field.into(),
            foreign_key: foreign_key.into(),
            parent: false,
        }
    }

    pub fn has_many(
        target: impl Into<String>,
        local_field: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self {
            kind: RelationKind::HasMany,
            ..Self::belongs_to(target, local_field, foreign_key)
        }
    }

    pub fn has_one(
        target: impl Into<String>,
        local_field: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self {
            kind: RelationKind::HasOne,
            ..Self::belongs_to(target, local_field, foreign_key)
        }
    }

    /// Flag this relation as the endpoint parent.
    pub fn as_parent(mut self) -> Self {
        self.parent = true;
        self
    }

    /// Returns `true` if `name` selects this relation, either by target type
    /// or by local field.
    pub fn is_named(&self, name: &str) -> bool {
        self.target == name || self.local_field == name
    }
}

// ---------------------------------------------------------------------------
// ResourceDefinition
// ---------------------------------------------------------------------------

/// Static configuration of one resource type.
///
/// Optional fields fall back to the store-wide defaults when the definition
/// is registered; the accessor methods fall back to the crate constants.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDefinition {
    pub name: String,
    #[serde(default)]
    pub id_attribute: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub default_adapter: Option<String>,
    #[serde(default)]
    pub relations: Vec<Relation>,
}

impl ResourceDefinition {
    /// A definition with every optional field left to the defaults.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id_attribute: None,
            endpoint: None,
            base_url: None,
            default_adapter: None,
            relations: Vec::new(),
        }
    }

    pub fn with_id_attribute(mut self, attr: impl Into<String>) -> Self {
        self.id_attribute = Some(attr.into());
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_adapter(mut self, adapter: impl Into<String>) -> Self {
        self.default_adapter = Some(adapter.into());
        self
    }

    pub fn with_relation(mut self, relation: Relation) -> Self {
        self.relations.push(relation);
        self
    }

    /// Primary-key attribute name.
    pub fn id_attribute(&self) -> &str {
        self.id_attribute.as_deref().unwrap_or(DEFAULT_ID_ATTRIBUTE)
    }

    /// Endpoint path segment. Defaults to the type name.
    pub fn endpoint(&self) -> &str {
        self.endpoint.as_deref().unwrap_or(&self.name)
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    pub fn adapter(&self) -> &str {
        self.default_adapter.as_deref().unwrap_or(DEFAULT_ADAPTER)
    }

    pub fn has_relations(&self) -> bool {
        !self.relations.is_empty()
    }

    /// The `BelongsTo` relation flagged as endpoint parent, if any.
    pub fn parent(&self) -> Option<&Relation> {
        self.relations
            .iter()
            .find(|r| r.parent && r.kind == RelationKind::BelongsTo)
    }

    /// Relations selected by `names`. An empty selection means all of them.
    pub fn select_relations<'a>(&'a self, names: &[&str]) -> Vec<&'a Relation> {
        if names.is_empty() {
            return self.relations.iter().collect();
        }
        self.relations
            .iter()
            .filter(|r| names.iter().any(|n| r.is_named(n)))
            .collect()
    }

    /// Fill unset optional fields from the given defaults.
    pub fn with_defaults(mut self, id_attribute: &str, base_url: &str, adapter: &str) -> Self {
        self.id_attribute.get_or_insert_with(|| id_attribute.to_string());
        self.base_url.get_or_insert_with(|| base_url.to_string());
        self.default_adapter.get_or_insert_with(|| adapter.to_string());
        self
    }

    /// Structural checks run at registration.
    pub fn validate(&self) -> Result<(), TypeError> {
        if self.name.trim().is_empty() {
            return Err(TypeError::InvalidDefinition(
                "name must not be empty".into(),
            ));
        }
        if self.id_attribute().is_empty() {
            return Err(TypeError::InvalidDefinition(format!(
                "{}: idAttribute must not be empty",
                self.name
            )));
        }

        let mut fields = HashSet::new();
        let mut parents = 0;
        for relation in &self.relations {
            if relation.target.is_empty()
                || relation.local_field.is_empty()
                || relation.foreign_key.is_empty()
            {
                return Err(TypeError::InvalidDefinition(format!(
                    "{}: {} relation needs a target, localField and foreignKey",
                    self.name, relation.kind
                )));
            }
            if relation.local_field == self.id_attribute() {
                return Err(TypeError::InvalidDefinition(format!(
                    "{}: relation field {} shadows the primary key",
                    self.name, relation.local_field
                )));
            }
            if !fields.insert(relation.local_field.as_str()) {
                return Err(TypeError::InvalidDefinition(format!(
                    "{}: duplicate relation field {}",
                    self.name, relation.local_field
                )));
            }
            if relation.parent {
                if relation.kind != RelationKind::BelongsTo {
                    return Err(TypeError::InvalidDefinition(format!(
                        "{}: only belongsTo relations can be a parent",
                        self.name
                    )));
                }
                parents += 1;
            }
        }
        if parents > 1 {
            return Err(TypeError::InvalidDefinition(format!(
                "{}: at most one parent relation is allowed",
                self.name
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> ResourceDefinition {
        ResourceDefinition::new("user")
            .with_relation(Relation::belongs_to("organization", "organization", "organizationId").as_parent())
            .with_relation(Relation::has_one("profile", "profile", "userId"))
            .with_relation(Relation::has_many("comment", "comments", "approvedBy"))
    }

    #[test]
    fn defaults_apply_when_unset() {
        let def = ResourceDefinition::new("post");
        assert_eq!(def.id_attribute(), "id");
        assert_eq!(def.endpoint(), "post");
        assert_eq!(def.base_url(), "/");
        assert_eq!(def.adapter(), "http");
    }

    #[test]
    fn with_defaults_keeps_explicit_values() {
        let def = ResourceDefinition::new("post")
            .with_base_url("http://api.example.com")
            .with_defaults("_id", "/api", "local");
        assert_eq!(def.id_attribute(), "_id");
        assert_eq!(def.base_url(), "http://api.example.com");
        assert_eq!(def.adapter(), "local");
    }

    #[test]
    fn parent_relation_lookup() {
        let def = user();
        let parent = def.parent().expect("user has a parent");
        assert_eq!(parent.target, "organization");
        assert!(ResourceDefinition::new("x").parent().is_none());
    }

    #[test]
    fn select_relations_by_target_or_field() {
        let def = user();
        assert_eq!(def.select_relations(&[]).len(), 3);
        assert_eq!(def.select_relations(&["profile"]).len(), 1);
        let by_field = def.select_relations(&["comments"]);
        assert_eq!(by_field.len(), 1);
        assert_eq!(by_field[0].kind, RelationKind::HasMany);
        assert!(def.select_relations(&["nothing"]).is_empty());
    }

    #[test]
    fn validate_accepts_well_formed_definition() {
        assert!(user().validate().is_ok());
    }

    #[test]
    fn validate_rejects_blank_name() {
        let err = ResourceDefinition::new("  ").validate().unwrap_err();
        assert!(matches!(err, TypeError::InvalidDefinition(_)));
    }

    #[test]
    fn validate_rejects_two_parents() {
        let def = ResourceDefinition::new("comment")
            .with_relation(Relation::belongs_to("user", "user", "userId").as_parent())
            .with_relation(Relation::belongs_to("post", "post", "postId").as_parent());
        assert!(def.validate().is_err());
    }

    #[test]
    fn validate_rejects_has_many_parent() {
        let def = ResourceDefinition::new("org")
            .with_relation(Relation::has_many("user", "users", "orgId").as_parent());
        assert!(def.validate().is_err());
    }

    #[test]
    fn validate_rejects_field_shadowing_primary_key() {
        let def = ResourceDefinition::new("org")
            .with_relation(Relation::has_one("user", "id", "orgId"));
        assert!(def.validate().is_err());
    }

    #[test]
    fn validate_rejects_duplicate_fields() {
        let def = ResourceDefinition::new("org")
            .with_relation(Relation::has_one("user", "owner", "orgId"))
            .with_relation(Relation::has_one("admin", "owner", "orgId"));
        assert!(def.validate().is_err());
    }

    #[test]
    fn definition_deserializes_from_json() {
        let def: ResourceDefinition = serde_json::from_value(serde_json::json!({
            "name": "comment",
            "endpoint": "comments",
            "relations": [
                {"kind": "belongsTo", "target": "user", "localField": "approver",
                 "foreignKey": "approvedBy", "parent": true}
            ]
        }))
        .unwrap();
        assert_eq!(def.endpoint(), "comments");
        assert_eq!(def.relations[0].kind, RelationKind::BelongsTo);
        assert!(def.relations[0].parent);
        assert!(def.id_attribute.is_none());
    }
}
