//! Item entity type
//!
//! An Item is a persisted instance of an ItemType: a dynamic attribute-value
//! map (validated against the resolved requirements) plus a dynamic
//! association map keyed by the association key of the governing rule.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::catalog::attribute::default_revision;
use crate::core::audit::Audit;
use crate::core::identity::{EntityId, EntityPrefix};
use crate::core::value::AttributeValue;

/// The stored value under one association key: a single id for
/// one-to-one/many-to-one classes, a list otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AssociationValue {
    Single(EntityId),
    Multiple(Vec<EntityId>),
}

impl AssociationValue {
    /// The linked ids, regardless of shape
    pub fn ids(&self) -> Vec<EntityId> {
        match self {
            AssociationValue::Single(id) => vec![*id],
            AssociationValue::Multiple(ids) => ids.clone(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            AssociationValue::Single(_) => 1,
            AssociationValue::Multiple(ids) => ids.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            AssociationValue::Single(_) => false,
            AssociationValue::Multiple(ids) => ids.is_empty(),
        }
    }

    pub fn contains(&self, id: EntityId) -> bool {
        match self {
            AssociationValue::Single(stored) => *stored == id,
            AssociationValue::Multiple(ids) => ids.contains(&id),
        }
    }
}

/// A master-data entity instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: EntityId,

    /// The item type this instance belongs to
    pub item_type: EntityId,

    /// Category reference
    pub category: EntityId,

    /// Family reference
    pub family: EntityId,

    /// Attribute values keyed by attribute id
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<EntityId, AttributeValue>,

    /// Stored links keyed by association key
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub associations: BTreeMap<String, AssociationValue>,

    /// Soft-delete flag; inactive items are excluded from candidate
    /// listings unless explicitly included
    #[serde(default = "default_active")]
    pub active: bool,

    pub audit: Audit,

    #[serde(default = "default_revision")]
    pub revision: u64,
}

fn default_active() -> bool {
    true
}

impl Item {
    pub fn new(
        item_type: EntityId,
        category: EntityId,
        family: EntityId,
        attributes: BTreeMap<EntityId, AttributeValue>,
        actor: &str,
    ) -> Self {
        Self {
            id: EntityId::new(EntityPrefix::Item),
            item_type,
            category,
            family,
            attributes,
            associations: BTreeMap::new(),
            active: true,
            audit: Audit::new(actor),
            revision: 1,
        }
    }

    /// Ids stored under an association key (empty when the key is absent)
    pub fn linked_ids(&self, key: &str) -> Vec<EntityId> {
        self.associations
            .get(key)
            .map(|v| v.ids())
            .unwrap_or_default()
    }

    /// Store links under a key. Single-shape keys replace; list-shape keys
    /// hold the de-duplicated union of existing and incoming ids.
    pub fn put_links(&mut self, key: &str, ids: &[EntityId], single: bool) {
        if single {
            if let Some(last) = ids.last() {
                self.associations
                    .insert(key.to_string(), AssociationValue::Single(*last));
            }
        } else {
            let mut merged = self.linked_ids(key);
            for id in ids {
                if !merged.contains(id) {
                    merged.push(*id);
                }
            }
            self.associations
                .insert(key.to_string(), AssociationValue::Multiple(merged));
        }
    }

    /// Drop the given ids from a key; the key itself is removed once empty.
    /// Absent ids are a no-op.
    pub fn drop_links(&mut self, key: &str, ids: &[EntityId]) {
        let Some(value) = self.associations.get(key) else {
            return;
        };
        let remaining: Vec<EntityId> = value
            .ids()
            .into_iter()
            .filter(|id| !ids.contains(id))
            .collect();
        if remaining.is_empty() {
            self.associations.remove(key);
        } else {
            match value {
                AssociationValue::Single(_) => {
                    self.associations
                        .insert(key.to_string(), AssociationValue::Single(remaining[0]));
                }
                AssociationValue::Multiple(_) => {
                    self.associations
                        .insert(key.to_string(), AssociationValue::Multiple(remaining));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item() -> Item {
        Item::new(
            EntityId::new(EntityPrefix::Type),
            EntityId::new(EntityPrefix::Cat),
            EntityId::new(EntityPrefix::Fam),
            BTreeMap::new(),
            "test",
        )
    }

    #[test]
    fn test_single_key_replaces() {
        let mut it = item();
        let a = EntityId::new(EntityPrefix::Item);
        let b = EntityId::new(EntityPrefix::Item);
        it.put_links("customer_many-to-one", &[a], true);
        it.put_links("customer_many-to-one", &[b], true);
        assert_eq!(
            it.associations["customer_many-to-one"],
            AssociationValue::Single(b)
        );
    }

    #[test]
    fn test_list_key_unions_without_duplicates() {
        let mut it = item();
        let a = EntityId::new(EntityPrefix::Item);
        let b = EntityId::new(EntityPrefix::Item);
        it.put_links("fabric_many-to-many", &[a], false);
        it.put_links("fabric_many-to-many", &[a, b], false);
        assert_eq!(it.linked_ids("fabric_many-to-many"), vec![a, b]);
    }

    #[test]
    fn test_drop_links_removes_empty_key() {
        let mut it = item();
        let a = EntityId::new(EntityPrefix::Item);
        it.put_links("fabric_many-to-many", &[a], false);
        it.drop_links("fabric_many-to-many", &[a]);
        assert!(!it.associations.contains_key("fabric_many-to-many"));
    }

    #[test]
    fn test_remove_then_readd_restores_state() {
        let mut it = item();
        let a = EntityId::new(EntityPrefix::Item);
        let b = EntityId::new(EntityPrefix::Item);
        it.put_links("fabric_many-to-many", &[a, b], false);
        let before = it.associations.clone();

        it.drop_links("fabric_many-to-many", &[b]);
        it.put_links("fabric_many-to-many", &[b], false);
        assert_eq!(it.associations, before);
    }

    #[test]
    fn test_association_value_untagged_serde() {
        let single = AssociationValue::Single(EntityId::new(EntityPrefix::Item));
        let yaml = serde_yml::to_string(&single).unwrap();
        let back: AssociationValue = serde_yml::from_str(&yaml).unwrap();
        assert_eq!(single, back);

        let multi = AssociationValue::Multiple(vec![EntityId::new(EntityPrefix::Item)]);
        let yaml = serde_yml::to_string(&multi).unwrap();
        let back: AssociationValue = serde_yml::from_str(&yaml).unwrap();
        assert_eq!(multi, back);
    }
}
