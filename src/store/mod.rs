//! Storage layer
//!
//! The engine consumes persistence through the [`Collection`] trait: point
//! lookup, batched fetch by ids, lookup by unique code, full listing, insert
//! with unique-code enforcement, optimistic-revision save, and delete. Two
//! implementations ship: an in-memory store (library default, tests) and a
//! YAML file-per-document store rooted at a project directory.

pub mod files;
pub mod memory;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::assoc::{AssociationDefinition, AssociationRule};
use crate::catalog::{AttributeDefinition, AttributeGroup};
use crate::core::error::CoreError;
use crate::core::identity::{EntityId, EntityPrefix};
use crate::core::project::Project;
use crate::hierarchy::{CategoryNode, FamilyNode, ItemTypeNode};
use crate::item::Item;

/// Errors surfaced by storage implementations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{} with code '{code}' already exists", .kind.noun())]
    DuplicateCode { kind: EntityPrefix, code: String },

    #[error("document already exists: {0}")]
    DuplicateId(EntityId),

    #[error("document does not exist: {0}")]
    Missing(EntityId),

    #[error("revision conflict on {id}: expected {expected}, found {found}")]
    RevisionConflict {
        id: EntityId,
        expected: u64,
        found: u64,
    },

    #[error("corrupt document: {0}")]
    Corrupt(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl From<StoreError> for CoreError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DuplicateCode { .. }
            | StoreError::DuplicateId(_)
            | StoreError::RevisionConflict { .. } => CoreError::Conflict(e.to_string()),
            StoreError::Missing(_) | StoreError::Corrupt(_) | StoreError::Io(_) => {
                CoreError::Storage(e.to_string())
            }
        }
    }
}

/// Common interface for persisted master-data documents
pub trait Document: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// The entity prefix of this document type
    const PREFIX: EntityPrefix;

    /// The document's unique ID
    fn id(&self) -> EntityId;

    /// The document's unique machine code, when the type carries one.
    /// Items are id-addressed only.
    fn code(&self) -> Option<&str>;

    /// Optimistic-concurrency revision
    fn revision(&self) -> u64;

    fn set_revision(&mut self, revision: u64);
}

macro_rules! impl_document {
    ($type:ty, $prefix:expr) => {
        impl Document for $type {
            const PREFIX: EntityPrefix = $prefix;

            fn id(&self) -> EntityId {
                self.id
            }

            fn code(&self) -> Option<&str> {
                Some(&self.code)
            }

            fn revision(&self) -> u64 {
                self.revision
            }

            fn set_revision(&mut self, revision: u64) {
                self.revision = revision;
            }
        }
    };
}

impl_document!(AttributeDefinition, EntityPrefix::Attr);
impl_document!(AttributeGroup, EntityPrefix::Grp);
impl_document!(ItemTypeNode, EntityPrefix::Type);
impl_document!(CategoryNode, EntityPrefix::Cat);
impl_document!(FamilyNode, EntityPrefix::Fam);
impl_document!(AssociationDefinition, EntityPrefix::Assoc);
impl_document!(AssociationRule, EntityPrefix::Rule);

impl Document for Item {
    const PREFIX: EntityPrefix = EntityPrefix::Item;

    fn id(&self) -> EntityId {
        self.id
    }

    fn code(&self) -> Option<&str> {
        None
    }

    fn revision(&self) -> u64 {
        self.revision
    }

    fn set_revision(&mut self, revision: u64) {
        self.revision = revision;
    }
}

/// One logical collection of documents
pub trait Collection<T: Document>: Send + Sync {
    /// Point lookup by id
    fn get(&self, id: EntityId) -> Result<Option<T>, StoreError>;

    /// Batched fetch; unknown ids are skipped, order follows the input
    fn get_many(&self, ids: &[EntityId]) -> Result<Vec<T>, StoreError>;

    /// Lookup by unique code
    fn find_by_code(&self, code: &str) -> Result<Option<T>, StoreError>;

    /// Every document in the collection
    fn list(&self) -> Result<Vec<T>, StoreError>;

    /// Insert a new document, enforcing id and code uniqueness
    fn insert(&self, doc: T) -> Result<T, StoreError>;

    /// Save an existing document. Fails with `RevisionConflict` unless the
    /// document's revision matches the stored one; on success the stored
    /// revision is bumped and the updated document returned.
    fn save(&self, doc: T) -> Result<T, StoreError>;

    /// Delete by id; returns whether a document was removed
    fn remove(&self, id: EntityId) -> Result<bool, StoreError>;
}

/// The eight logical collections the engine operates over
pub struct Store {
    pub attributes: Box<dyn Collection<AttributeDefinition>>,
    pub groups: Box<dyn Collection<AttributeGroup>>,
    pub item_types: Box<dyn Collection<ItemTypeNode>>,
    pub categories: Box<dyn Collection<CategoryNode>>,
    pub families: Box<dyn Collection<FamilyNode>>,
    pub items: Box<dyn Collection<Item>>,
    pub definitions: Box<dyn Collection<AssociationDefinition>>,
    pub rules: Box<dyn Collection<AssociationRule>>,
}

impl Store {
    /// A fresh, empty in-memory store
    pub fn in_memory() -> Self {
        Self {
            attributes: Box::new(memory::MemoryCollection::new()),
            groups: Box::new(memory::MemoryCollection::new()),
            item_types: Box::new(memory::MemoryCollection::new()),
            categories: Box::new(memory::MemoryCollection::new()),
            families: Box::new(memory::MemoryCollection::new()),
            items: Box::new(memory::MemoryCollection::new()),
            definitions: Box::new(memory::MemoryCollection::new()),
            rules: Box::new(memory::MemoryCollection::new()),
        }
    }

    /// A file-backed store over an initialized project directory
    pub fn open(project: Project) -> Self {
        Self {
            attributes: Box::new(files::FileCollection::new(project.clone())),
            groups: Box::new(files::FileCollection::new(project.clone())),
            item_types: Box::new(files::FileCollection::new(project.clone())),
            categories: Box::new(files::FileCollection::new(project.clone())),
            families: Box::new(files::FileCollection::new(project.clone())),
            items: Box::new(files::FileCollection::new(project.clone())),
            definitions: Box::new(files::FileCollection::new(project.clone())),
            rules: Box::new(files::FileCollection::new(project)),
        }
    }

    /// Resolve an item type by code; missing types are fatal
    pub fn item_type_by_code(&self, code: &str) -> Result<ItemTypeNode, CoreError> {
        self.item_types
            .find_by_code(code)?
            .ok_or_else(|| CoreError::not_found(EntityPrefix::Type, code))
    }

    /// Fetch an item or fail with `NotFound`
    pub fn must_item(&self, id: EntityId) -> Result<Item, CoreError> {
        self.items
            .get(id)?
            .ok_or_else(|| CoreError::not_found(EntityPrefix::Item, id.to_string()))
    }

    /// Resolve an association rule by code
    pub fn rule_by_code(&self, code: &str) -> Result<AssociationRule, CoreError> {
        self.rules
            .find_by_code(code)?
            .ok_or_else(|| CoreError::not_found(EntityPrefix::Rule, code))
    }

    /// Fetch an association definition or fail with `NotFound`
    pub fn must_definition(&self, id: EntityId) -> Result<AssociationDefinition, CoreError> {
        self.definitions
            .get(id)?
            .ok_or_else(|| CoreError::not_found(EntityPrefix::Assoc, id.to_string()))
    }
}
