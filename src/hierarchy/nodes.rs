//! Hierarchy node entity types
//!
//! Three interlocking hierarchies jointly determine which attributes an item
//! must carry: a flat ItemType (referencing one Category), a Category tree,
//! and a Family tree (each family pinned to a Category).

use serde::{Deserialize, Serialize};

use crate::catalog::attribute::default_revision;
use crate::core::audit::Audit;
use crate::core::identity::{EntityId, EntityPrefix};

/// An item type: the flat entry point of the hierarchy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemTypeNode {
    pub id: EntityId,

    /// Unique machine code (e.g. "television")
    pub code: String,

    /// Opaque localized display-name key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// The category this type belongs to
    pub category: EntityId,

    /// Attribute groups attached directly to the type
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<EntityId>,

    pub audit: Audit,

    #[serde(default = "default_revision")]
    pub revision: u64,
}

impl ItemTypeNode {
    pub fn new(code: String, category: EntityId, actor: &str) -> Self {
        Self {
            id: EntityId::new(EntityPrefix::Type),
            code,
            name: None,
            category,
            groups: Vec::new(),
            audit: Audit::new(actor),
            revision: 1,
        }
    }
}

/// A category tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryNode {
    pub id: EntityId,

    /// Unique machine code (e.g. "electronics")
    pub code: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Parent category; None at the root.
    /// The parent chain must be acyclic; traversal guards regardless.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<EntityId>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<EntityId>,

    pub audit: Audit,

    #[serde(default = "default_revision")]
    pub revision: u64,
}

impl CategoryNode {
    pub fn new(code: String, parent: Option<EntityId>, actor: &str) -> Self {
        Self {
            id: EntityId::new(EntityPrefix::Cat),
            code,
            name: None,
            parent,
            groups: Vec::new(),
            audit: Audit::new(actor),
            revision: 1,
        }
    }
}

/// A family tree node, pinned to a category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FamilyNode {
    pub id: EntityId,

    /// Unique machine code (e.g. "led_tvs")
    pub code: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// The category this family belongs to (required)
    pub category: EntityId,

    /// Parent family; None at the root of its tree
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<EntityId>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<EntityId>,

    pub audit: Audit,

    #[serde(default = "default_revision")]
    pub revision: u64,
}

impl FamilyNode {
    pub fn new(code: String, category: EntityId, parent: Option<EntityId>, actor: &str) -> Self {
        Self {
            id: EntityId::new(EntityPrefix::Fam),
            code,
            name: None,
            category,
            parent,
            groups: Vec::new(),
            audit: Audit::new(actor),
            revision: 1,
        }
    }
}
