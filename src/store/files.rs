//! YAML file-per-document collection
//!
//! Each document lives at `<root>/<collection dir>/<ID>.mdt.yaml` under the
//! project root. Writes go through a temp file and rename so a crashed write
//! never leaves a half-written document behind. A per-collection mutex holds
//! the revision check and the write together, closing the in-process
//! read-modify-write race the same way the memory store does; concurrent
//! processes are coordinated through version control, not file locks.

use std::fs;
use std::marker::PhantomData;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::core::identity::EntityId;
use crate::core::project::Project;

use super::memory::poisoned;
use super::{Collection, Document, StoreError};

/// A collection rooted at the project directory for `T::PREFIX`
pub struct FileCollection<T: Document> {
    project: Project,
    write_lock: Mutex<()>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Document> FileCollection<T> {
    pub fn new(project: Project) -> Self {
        Self {
            project,
            write_lock: Mutex::new(()),
            _marker: PhantomData,
        }
    }

    fn path_for(&self, id: EntityId) -> PathBuf {
        self.project.entity_path(T::PREFIX, &id)
    }

    fn read_doc(&self, path: &PathBuf) -> Result<T, StoreError> {
        let content = fs::read_to_string(path).map_err(|e| StoreError::Io(e.to_string()))?;
        serde_yml::from_str(&content)
            .map_err(|e| StoreError::Corrupt(format!("{}: {}", path.display(), e)))
    }

    fn write_doc(&self, doc: &T) -> Result<(), StoreError> {
        let path = self.path_for(doc.id());
        let yaml = serde_yml::to_string(doc).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        let tmp = path.with_extension("yaml.tmp");
        fs::write(&tmp, yaml).map_err(|e| StoreError::Io(e.to_string()))?;
        fs::rename(&tmp, &path).map_err(|e| StoreError::Io(e.to_string()))?;
        Ok(())
    }
}

impl<T: Document> Collection<T> for FileCollection<T> {
    fn get(&self, id: EntityId) -> Result<Option<T>, StoreError> {
        let path = self.path_for(id);
        if !path.exists() {
            return Ok(None);
        }
        self.read_doc(&path).map(Some)
    }

    fn get_many(&self, ids: &[EntityId]) -> Result<Vec<T>, StoreError> {
        let mut docs = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(doc) = self.get(*id)? {
                docs.push(doc);
            }
        }
        Ok(docs)
    }

    fn find_by_code(&self, code: &str) -> Result<Option<T>, StoreError> {
        for doc in self.list()? {
            if doc.code() == Some(code) {
                return Ok(Some(doc));
            }
        }
        Ok(None)
    }

    fn list(&self) -> Result<Vec<T>, StoreError> {
        let mut docs = Vec::new();
        for path in self.project.iter_entity_files(T::PREFIX) {
            // Unreadable files in the tree are skipped rather than failing
            // the whole listing; `get` on the same document still reports
            // the corruption.
            if let Ok(doc) = self.read_doc(&path) {
                docs.push(doc);
            }
        }
        Ok(docs)
    }

    fn insert(&self, doc: T) -> Result<T, StoreError> {
        let _guard = self.write_lock.lock().map_err(poisoned)?;
        if self.path_for(doc.id()).exists() {
            return Err(StoreError::DuplicateId(doc.id()));
        }
        if let Some(code) = doc.code() {
            if self.find_by_code(code)?.is_some() {
                return Err(StoreError::DuplicateCode {
                    kind: T::PREFIX,
                    code: code.to_string(),
                });
            }
        }
        self.write_doc(&doc)?;
        Ok(doc)
    }

    fn save(&self, mut doc: T) -> Result<T, StoreError> {
        let _guard = self.write_lock.lock().map_err(poisoned)?;
        let stored = self
            .get(doc.id())?
            .ok_or(StoreError::Missing(doc.id()))?;
        if stored.revision() != doc.revision() {
            return Err(StoreError::RevisionConflict {
                id: doc.id(),
                expected: doc.revision(),
                found: stored.revision(),
            });
        }
        if let Some(code) = doc.code() {
            if let Some(other) = self.find_by_code(code)? {
                if other.id() != doc.id() {
                    return Err(StoreError::DuplicateCode {
                        kind: T::PREFIX,
                        code: code.to_string(),
                    });
                }
            }
        }
        doc.set_revision(doc.revision() + 1);
        self.write_doc(&doc)?;
        Ok(doc)
    }

    fn remove(&self, id: EntityId) -> Result<bool, StoreError> {
        let _guard = self.write_lock.lock().map_err(poisoned)?;
        let path = self.path_for(id);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path).map_err(|e| StoreError::Io(e.to_string()))?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::AttributeGroup;
    use tempfile::tempdir;

    fn collection(tmp: &tempfile::TempDir) -> FileCollection<AttributeGroup> {
        let project = Project::init(tmp.path()).unwrap();
        FileCollection::new(project)
    }

    #[test]
    fn test_insert_and_get() {
        let tmp = tempdir().unwrap();
        let c = collection(&tmp);
        let group = c.insert(AttributeGroup::new("display".into(), "test")).unwrap();
        let loaded = c.get(group.id).unwrap().unwrap();
        assert_eq!(loaded.code, "display");
    }

    #[test]
    fn test_file_lands_in_collection_dir() {
        let tmp = tempdir().unwrap();
        let c = collection(&tmp);
        let group = c.insert(AttributeGroup::new("display".into(), "test")).unwrap();
        let expected = tmp
            .path()
            .canonicalize()
            .unwrap()
            .join("catalog/groups")
            .join(format!("{}.mdt.yaml", group.id));
        assert!(expected.exists());
    }

    #[test]
    fn test_duplicate_code_rejected_across_files() {
        let tmp = tempdir().unwrap();
        let c = collection(&tmp);
        c.insert(AttributeGroup::new("display".into(), "test")).unwrap();
        let err = c
            .insert(AttributeGroup::new("display".into(), "test"))
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateCode { .. }));
    }

    #[test]
    fn test_save_checks_disk_revision() {
        let tmp = tempdir().unwrap();
        let c = collection(&tmp);
        let group = c.insert(AttributeGroup::new("display".into(), "test")).unwrap();

        let stale = group.clone();
        c.save(group).unwrap();
        let err = c.save(stale).unwrap_err();
        assert!(matches!(err, StoreError::RevisionConflict { .. }));
    }

    #[test]
    fn test_concurrent_saves_admit_exactly_one_writer() {
        let tmp = tempdir().unwrap();
        let c = collection(&tmp);
        let group = c.insert(AttributeGroup::new("display".into(), "test")).unwrap();
        let barrier = std::sync::Barrier::new(2);

        let results: Vec<Result<AttributeGroup, StoreError>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..2)
                .map(|_| {
                    s.spawn(|| {
                        let doc = c.get(group.id).unwrap().unwrap();
                        barrier.wait();
                        c.save(doc)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, StoreError::RevisionConflict { .. })));
        assert_eq!(c.get(group.id).unwrap().unwrap().revision, group.revision + 1);
    }

    #[test]
    fn test_remove_missing_is_false() {
        let tmp = tempdir().unwrap();
        let c = collection(&tmp);
        let ghost = EntityId::new(crate::core::EntityPrefix::Grp);
        assert!(!c.remove(ghost).unwrap());
    }
}
