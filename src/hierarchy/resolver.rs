//! Requirement resolution across the three hierarchies
//!
//! For an (ItemType, Category, Family) triple, compute which attributes an
//! item must carry: the type's own groups, plus the groups of every category
//! on the chain from the item's category to the root, plus the same for the
//! family chain. Fetches are batched per level, and chain walks carry a
//! visited-id guard so a corrupted parent chain can never loop the walk.

use std::collections::HashSet;

use crate::catalog::AttributeDefinition;
use crate::core::error::CoreResult;
use crate::core::identity::{EntityId, EntityPrefix};
use crate::store::{Collection, Document, Store, StoreError};

/// Resolves the required-attribute set for hierarchy triples
pub struct RequirementResolver<'a> {
    store: &'a Store,
}

impl<'a> RequirementResolver<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Resolve the deduplicated required attributes for the triple.
    ///
    /// A category or family id that does not resolve contributes nothing;
    /// only a missing item type is fatal. The first occurrence of an
    /// attribute wins; result order is not semantically meaningful.
    pub fn resolve_required(
        &self,
        item_type: EntityId,
        category: EntityId,
        family: EntityId,
    ) -> CoreResult<Vec<AttributeDefinition>> {
        let type_node = self
            .store
            .item_types
            .get(item_type)?
            .ok_or_else(|| crate::core::CoreError::not_found(EntityPrefix::Type, item_type.to_string()))?;

        let mut group_ids: Vec<EntityId> = type_node.groups.clone();
        group_ids.extend(self.walk_chain(&*self.store.categories, category, |n| {
            (n.parent, n.groups.clone())
        })?);
        group_ids.extend(self.walk_chain(&*self.store.families, family, |n| {
            (n.parent, n.groups.clone())
        })?);

        self.required_from_groups(&group_ids)
    }

    /// Walk a parent chain from `start` to the root, collecting each visited
    /// node's group ids. Cycle-safe via a visited-id set regardless of
    /// whether cycles are possible by construction.
    fn walk_chain<T, F>(
        &self,
        collection: &dyn Collection<T>,
        start: EntityId,
        node_parts: F,
    ) -> Result<Vec<EntityId>, StoreError>
    where
        T: Document,
        F: Fn(&T) -> (Option<EntityId>, Vec<EntityId>),
    {
        let mut groups = Vec::new();
        let mut visited: HashSet<EntityId> = HashSet::new();
        let mut current = Some(start);

        while let Some(id) = current {
            if !visited.insert(id) {
                break;
            }
            // An unresolvable node ends the branch without error.
            let Some(node) = collection.get(id)? else {
                break;
            };
            let (parent, node_groups) = node_parts(&node);
            groups.extend(node_groups);
            current = parent;
        }

        Ok(groups)
    }

    /// One batched group fetch, one batched attribute fetch, then filter to
    /// required definitions deduplicated by id (first occurrence wins).
    fn required_from_groups(
        &self,
        group_ids: &[EntityId],
    ) -> CoreResult<Vec<AttributeDefinition>> {
        let unique_groups = dedup_ids(group_ids);
        let groups = self.store.groups.get_many(&unique_groups)?;

        let mut attr_ids = Vec::new();
        for group in &groups {
            attr_ids.extend(group.attributes.iter().copied());
        }
        let unique_attrs = dedup_ids(&attr_ids);
        let defs = self.store.attributes.get_many(&unique_attrs)?;

        Ok(defs.into_iter().filter(|d| d.required).collect())
    }
}

/// Deduplicate preserving first occurrence
fn dedup_ids(ids: &[EntityId]) -> Vec<EntityId> {
    let mut seen = HashSet::new();
    ids.iter()
        .copied()
        .filter(|id| seen.insert(*id))
        .collect()
}
