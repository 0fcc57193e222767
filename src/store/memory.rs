//! In-memory collection implementation
//!
//! The library default and the backing for tests. Uniqueness and revision
//! checks happen under one write lock, so the optimistic-concurrency contract
//! holds for concurrent callers sharing a store.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::core::identity::EntityId;

use super::{Collection, Document, StoreError};

/// A map-backed collection guarded by a read/write lock
pub struct MemoryCollection<T: Document> {
    inner: RwLock<HashMap<EntityId, T>>,
}

impl<T: Document> MemoryCollection<T> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }
}

impl<T: Document> Default for MemoryCollection<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Document> Collection<T> for MemoryCollection<T> {
    fn get(&self, id: EntityId) -> Result<Option<T>, StoreError> {
        let map = self.inner.read().map_err(poisoned)?;
        Ok(map.get(&id).cloned())
    }

    fn get_many(&self, ids: &[EntityId]) -> Result<Vec<T>, StoreError> {
        let map = self.inner.read().map_err(poisoned)?;
        Ok(ids.iter().filter_map(|id| map.get(id).cloned()).collect())
    }

    fn find_by_code(&self, code: &str) -> Result<Option<T>, StoreError> {
        let map = self.inner.read().map_err(poisoned)?;
        Ok(map.values().find(|d| d.code() == Some(code)).cloned())
    }

    fn list(&self) -> Result<Vec<T>, StoreError> {
        let map = self.inner.read().map_err(poisoned)?;
        Ok(map.values().cloned().collect())
    }

    fn insert(&self, doc: T) -> Result<T, StoreError> {
        let mut map = self.inner.write().map_err(poisoned)?;
        if map.contains_key(&doc.id()) {
            return Err(StoreError::DuplicateId(doc.id()));
        }
        if let Some(code) = doc.code() {
            if map.values().any(|d| d.code() == Some(code)) {
                return Err(StoreError::DuplicateCode {
                    kind: T::PREFIX,
                    code: code.to_string(),
                });
            }
        }
        map.insert(doc.id(), doc.clone());
        Ok(doc)
    }

    fn save(&self, mut doc: T) -> Result<T, StoreError> {
        let mut map = self.inner.write().map_err(poisoned)?;
        let stored = map.get(&doc.id()).ok_or(StoreError::Missing(doc.id()))?;
        if stored.revision() != doc.revision() {
            return Err(StoreError::RevisionConflict {
                id: doc.id(),
                expected: doc.revision(),
                found: stored.revision(),
            });
        }
        if let Some(code) = doc.code() {
            if map
                .values()
                .any(|d| d.id() != doc.id() && d.code() == Some(code))
            {
                return Err(StoreError::DuplicateCode {
                    kind: T::PREFIX,
                    code: code.to_string(),
                });
            }
        }
        doc.set_revision(doc.revision() + 1);
        map.insert(doc.id(), doc.clone());
        Ok(doc)
    }

    fn remove(&self, id: EntityId) -> Result<bool, StoreError> {
        let mut map = self.inner.write().map_err(poisoned)?;
        Ok(map.remove(&id).is_some())
    }
}

pub(crate) fn poisoned<G>(_: std::sync::PoisonError<G>) -> StoreError {
    StoreError::Io("store lock poisoned".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::AttributeGroup;

    fn collection() -> MemoryCollection<AttributeGroup> {
        MemoryCollection::new()
    }

    #[test]
    fn test_insert_rejects_duplicate_code() {
        let c = collection();
        c.insert(AttributeGroup::new("display".into(), "test")).unwrap();
        let err = c
            .insert(AttributeGroup::new("display".into(), "test"))
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateCode { .. }));
    }

    #[test]
    fn test_save_bumps_revision() {
        let c = collection();
        let group = c.insert(AttributeGroup::new("display".into(), "test")).unwrap();
        assert_eq!(group.revision, 1);
        let saved = c.save(group).unwrap();
        assert_eq!(saved.revision, 2);
    }

    #[test]
    fn test_save_detects_stale_revision() {
        let c = collection();
        let group = c.insert(AttributeGroup::new("display".into(), "test")).unwrap();

        // Two readers take the same copy; the second writer must conflict.
        let first = group.clone();
        let second = group;
        c.save(first).unwrap();
        let err = c.save(second).unwrap_err();
        assert!(matches!(err, StoreError::RevisionConflict { .. }));
    }

    #[test]
    fn test_get_many_skips_unknown() {
        let c = collection();
        let a = c.insert(AttributeGroup::new("a".into(), "test")).unwrap();
        let ghost = EntityId::new(crate::core::EntityPrefix::Grp);
        let got = c.get_many(&[a.id, ghost]).unwrap();
        assert_eq!(got.len(), 1);
    }
}
