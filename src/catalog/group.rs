//! Attribute group entity type

use serde::{Deserialize, Serialize};

use crate::core::audit::Audit;
use crate::core::identity::{EntityId, EntityPrefix};

use super::attribute::default_revision;

/// A named, ordered bundle of attribute definitions, attachable to
/// hierarchy nodes (item types, categories, families).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeGroup {
    /// Unique identifier
    pub id: EntityId,

    /// Unique machine code (e.g. "tv_display")
    pub code: String,

    /// Opaque localized display-name key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Member attribute ids, in declaration order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<EntityId>,

    /// Audit stamps
    pub audit: Audit,

    /// Optimistic-concurrency revision
    #[serde(default = "default_revision")]
    pub revision: u64,
}

impl AttributeGroup {
    pub fn new(code: String, actor: &str) -> Self {
        Self {
            id: EntityId::new(EntityPrefix::Grp),
            code,
            name: None,
            attributes: Vec::new(),
            audit: Audit::new(actor),
            revision: 1,
        }
    }

    /// Append an attribute, keeping the list duplicate-free
    pub fn add_attribute(&mut self, attribute_id: EntityId) {
        if !self.attributes.contains(&attribute_id) {
            self.attributes.push(attribute_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_attribute_dedupes() {
        let mut group = AttributeGroup::new("tv_display".into(), "test");
        let attr = EntityId::new(EntityPrefix::Attr);
        group.add_attribute(attr);
        group.add_attribute(attr);
        assert_eq!(group.attributes.len(), 1);
    }
}
