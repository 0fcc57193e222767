//! Item lifecycle
//!
//! Creation, update and deletion of items, holding the line on the two core
//! guarantees: an item is only ever persisted with every required attribute
//! present and valid, and a creation that names associations persists either
//! the item with all of its links or nothing at all.

use std::collections::BTreeMap;

use crate::assoc::engine::{association_key, reverse_key};
use crate::assoc::AssociationEngine;
use crate::catalog::{validate_value, AttributeDefinition};
use crate::core::error::{CoreError, CoreResult};
use crate::core::identity::{EntityId, EntityPrefix};
use crate::core::value::AttributeValue;
use crate::hierarchy::RequirementResolver;
use crate::store::Store;

use super::model::Item;

const SAVE_RETRIES: usize = 3;

/// Input for item creation. Attribute values arrive keyed by attribute code
/// as raw JSON and are coerced against the declared kind; associations name
/// a rule code and the target ids to link in the same transaction.
#[derive(Debug, Clone, Default)]
pub struct NewItem {
    pub item_type: String,
    pub category: String,
    pub family: String,
    pub attributes: BTreeMap<String, serde_json::Value>,
    pub associations: Vec<(String, Vec<EntityId>)>,
}

/// Input for item update: values to set or overwrite, and attribute codes to
/// clear. Required attributes can be overwritten but never cleared.
#[derive(Debug, Clone, Default)]
pub struct ItemPatch {
    pub set: BTreeMap<String, serde_json::Value>,
    pub clear: Vec<String>,
}

/// Item lifecycle operations over a store
pub struct ItemService<'a> {
    store: &'a Store,
}

impl<'a> ItemService<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Create an item.
    ///
    /// Every required attribute for the item's hierarchy triple must be
    /// present and valid; failures report all missing and invalid codes in
    /// one pass. Named associations are validated before anything is
    /// persisted, so a failing link leaves no item behind.
    pub fn create_item(&self, new: NewItem, actor: &str) -> CoreResult<Item> {
        let type_node = self.store.item_type_by_code(&new.item_type)?;
        let category = self
            .store
            .categories
            .find_by_code(&new.category)?
            .ok_or_else(|| CoreError::not_found(EntityPrefix::Cat, &*new.category))?;
        let family = self
            .store
            .families
            .find_by_code(&new.family)?
            .ok_or_else(|| CoreError::not_found(EntityPrefix::Fam, &*new.family))?;

        let resolver = RequirementResolver::new(self.store);
        let required = resolver.resolve_required(type_node.id, category.id, family.id)?;

        let attributes = self.validate_attributes(&required, &new.attributes)?;

        let mut item = Item::new(type_node.id, category.id, family.id, attributes, actor);

        // Stage every link before the first write hits the store
        let engine = AssociationEngine::new(self.store);
        let mut staged = Vec::with_capacity(new.associations.len());
        for (rule_code, targets) in &new.associations {
            let rule = self.store.rule_by_code(rule_code)?;
            engine.validate_and_stage(&mut item, &rule, targets)?;
            staged.push((rule, targets.clone()));
        }

        let item = self.store.items.insert(item)?;
        for (rule, targets) in staged {
            engine.mirror_add(item.id, &rule, &targets, actor)?;
        }
        Ok(item)
    }

    /// Apply a patch to an item, re-validating the merged attribute set
    /// against the current hierarchy requirements. Retries on concurrent
    /// writers.
    pub fn update_item(&self, id: EntityId, patch: &ItemPatch, actor: &str) -> CoreResult<Item> {
        let mut last_err = None;
        for _ in 0..SAVE_RETRIES {
            let mut item = self.store.must_item(id)?;
            let resolver = RequirementResolver::new(self.store);
            let required = resolver.resolve_required(item.item_type, item.category, item.family)?;

            let mut reasons = Vec::new();
            let mut merged = item.attributes.clone();
            for code in &patch.clear {
                match self.store.attributes.find_by_code(code)? {
                    Some(def) => {
                        if required.iter().any(|r| r.id == def.id) {
                            reasons.push(format!("attribute '{code}' is required and cannot be cleared"));
                        } else {
                            merged.remove(&def.id);
                        }
                    }
                    None => reasons.push(format!("unknown attribute '{code}'")),
                }
            }
            for (code, raw) in &patch.set {
                match self.store.attributes.find_by_code(code)? {
                    Some(def) => match AttributeValue::from_json(def.kind, raw.clone()) {
                        Ok(value) => match validate_value(&def, &value) {
                            Ok(value) => {
                                merged.insert(def.id, value);
                            }
                            Err(errs) => {
                                reasons.extend(errs.into_iter().map(|e| format!("'{code}': {e}")));
                            }
                        },
                        Err(e) => reasons.push(format!("'{code}': {e}")),
                    },
                    None => reasons.push(format!("unknown attribute '{code}'")),
                }
            }
            for def in &required {
                if !merged.get(&def.id).is_some_and(|v| !v.is_empty()) {
                    reasons.push(format!("missing required attribute '{}'", def.code));
                }
            }
            if !reasons.is_empty() {
                return Err(CoreError::validation(reasons));
            }

            item.attributes = merged;
            item.audit.touch(actor);
            match self.store.items.save(item) {
                Ok(saved) => return Ok(saved),
                Err(crate::store::StoreError::RevisionConflict { .. }) => {
                    last_err = Some(CoreError::Conflict(format!("concurrent update on item {id}")));
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(last_err.unwrap_or_else(|| CoreError::Conflict("save retries exhausted".into())))
    }

    /// Soft-delete: the item stays addressable but drops out of candidate
    /// listings and link validation.
    pub fn deactivate_item(&self, id: EntityId, actor: &str) -> CoreResult<Item> {
        self.set_active(id, false, actor)
    }

    pub fn reactivate_item(&self, id: EntityId, actor: &str) -> CoreResult<Item> {
        self.set_active(id, true, actor)
    }

    fn set_active(&self, id: EntityId, active: bool, actor: &str) -> CoreResult<Item> {
        let mut last_err = None;
        for _ in 0..SAVE_RETRIES {
            let mut item = self.store.must_item(id)?;
            item.active = active;
            item.audit.touch(actor);
            match self.store.items.save(item) {
                Ok(saved) => return Ok(saved),
                Err(crate::store::StoreError::RevisionConflict { .. }) => {
                    last_err = Some(CoreError::Conflict(format!("concurrent update on item {id}")));
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(last_err.unwrap_or_else(|| CoreError::Conflict("save retries exhausted".into())))
    }

    /// Hard-delete an item.
    ///
    /// Mirrored entries the item wrote onto its link partners are always
    /// scrubbed. Links other items hold TO this one are scrubbed only for
    /// rules with `cascade_delete`; otherwise they stay behind and surface
    /// as broken in association metadata.
    pub fn delete_item(&self, id: EntityId, actor: &str) -> CoreResult<()> {
        let item = self.store.must_item(id)?;
        let type_node = self
            .store
            .item_types
            .get(item.item_type)?
            .ok_or_else(|| CoreError::not_found(EntityPrefix::Type, item.item_type.to_string()))?;

        let engine = AssociationEngine::new(self.store);
        for rule in self.store.rules.list()? {
            // Forward side: drop our mirror from every linked target
            if rule.source_type == type_node.code {
                let key = association_key(&rule);
                let partners = item.linked_ids(&key);
                if !partners.is_empty() {
                    let rkey = reverse_key(&rule);
                    for partner in partners {
                        if self.store.items.get(partner)?.is_some() {
                            engine.retry_item_update(partner, actor, |p| {
                                p.drop_links(&rkey, &[id]);
                            })?;
                        }
                    }
                }
            }
            // Reverse side: owners pointing at us keep or lose their link
            // depending on the rule's cascade flag
            if rule.target_type == type_node.code && rule.cascade_delete {
                let key = reverse_key(&rule);
                let owners = item.linked_ids(&key);
                let fkey = association_key(&rule);
                for owner in owners {
                    if self.store.items.get(owner)?.is_some() {
                        engine.retry_item_update(owner, actor, |o| {
                            o.drop_links(&fkey, &[id]);
                        })?;
                    }
                }
            }
        }

        self.store.items.remove(id)?;
        Ok(())
    }

    /// Coerce and validate a full attribute map for creation. Reports every
    /// problem at once: unknown codes, kind or constraint violations, and
    /// all missing required attributes.
    fn validate_attributes(
        &self,
        required: &[AttributeDefinition],
        provided: &BTreeMap<String, serde_json::Value>,
    ) -> CoreResult<BTreeMap<EntityId, AttributeValue>> {
        let mut reasons = Vec::new();
        let mut attributes = BTreeMap::new();

        for (code, raw) in provided {
            let def = match required.iter().find(|d| &d.code == code) {
                Some(def) => Some(def.clone()),
                None => self.store.attributes.find_by_code(code)?,
            };
            match def {
                Some(def) => match AttributeValue::from_json(def.kind, raw.clone()) {
                    Ok(value) => match validate_value(&def, &value) {
                        Ok(value) => {
                            attributes.insert(def.id, value);
                        }
                        Err(errs) => {
                            reasons.extend(errs.into_iter().map(|e| format!("'{code}': {e}")));
                        }
                    },
                    Err(e) => reasons.push(format!("'{code}': {e}")),
                },
                None => reasons.push(format!("unknown attribute '{code}'")),
            }
        }

        for def in required {
            if !attributes.get(&def.id).is_some_and(|v| !v.is_empty()) {
                reasons.push(format!("missing required attribute '{}'", def.code));
            }
        }

        if reasons.is_empty() {
            Ok(attributes)
        } else {
            Err(CoreError::validation(reasons))
        }
    }
}
