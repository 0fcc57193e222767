//! Association rule entity type
//!
//! The fine-grained layer: one concrete source-type/target-type pair of an
//! association definition, carrying its own filter criteria, explicit
//! validation rules and priority. The triple (definition, source type,
//! target type) is unique across the collection.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::catalog::attribute::default_revision;
use crate::core::audit::Audit;
use crate::core::identity::{EntityId, EntityPrefix};

use super::definition::{Cardinality, FilterCriteria};

/// One validation rule applied when links are added or removed under a rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum ValidationRule {
    /// The key must never end up empty
    Required,
    /// The new total must be at least `count`
    MinCount { count: usize },
    /// The new total must be at most `count`
    MaxCount { count: usize },
    /// An incoming target id must not already be linked
    Unique,
    /// Named custom check with opaque parameters. Persisted and surfaced,
    /// but evaluated as pass: the core carries no expression engine.
    Custom {
        name: String,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        params: BTreeMap<String, serde_json::Value>,
    },
}

/// Sort direction for candidate listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

/// A concrete source-type -> target-type association rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssociationRule {
    pub id: EntityId,

    /// Unique machine code (e.g. "ORDER_FABRIC_SELECTION")
    pub code: String,

    /// The definition this rule instantiates
    pub definition: EntityId,

    /// Exactly one source item-type code
    pub source_type: String,

    /// Exactly one target item-type code
    pub target_type: String,

    pub cardinality: Cardinality,

    /// Target-side criteria, layered on top of the definition's target filter
    #[serde(default, skip_serializing_if = "FilterCriteria::is_empty")]
    pub criteria: FilterCriteria,

    /// Validation rules, evaluated in declaration order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validations: Vec<ValidationRule>,

    /// Higher priority wins on lookup; ties break by creation order
    #[serde(default)]
    pub priority: i64,

    /// The association must always hold at least one link
    #[serde(default)]
    pub required: bool,

    /// When a linked target is deleted, scrub the link from its owners
    /// instead of leaving a broken reference
    #[serde(default)]
    pub cascade_delete: bool,

    #[serde(default = "default_active")]
    pub active: bool,

    /// Attribute codes searched by candidate-listing free text
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub searchable: Vec<String>,

    /// Attribute code candidate listings sort by; most-recently-created
    /// first when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<String>,

    #[serde(default)]
    pub sort_direction: SortDirection,

    pub audit: Audit,

    #[serde(default = "default_revision")]
    pub revision: u64,
}

fn default_active() -> bool {
    true
}

impl AssociationRule {
    pub fn new(
        code: String,
        definition: EntityId,
        source_type: String,
        target_type: String,
        cardinality: Cardinality,
        actor: &str,
    ) -> Self {
        Self {
            id: EntityId::new(EntityPrefix::Rule),
            code,
            definition,
            source_type,
            target_type,
            cardinality,
            criteria: FilterCriteria::default(),
            validations: Vec::new(),
            priority: 0,
            required: false,
            cascade_delete: false,
            active: true,
            searchable: Vec::new(),
            sort_by: None,
            sort_direction: SortDirection::default(),
            audit: Audit::new(actor),
            revision: 1,
        }
    }

    /// Whether the rule (flag or validation list) demands a non-empty key
    pub fn requires_link(&self) -> bool {
        self.required || self.validations.contains(&ValidationRule::Required)
    }

    /// The declared maximum link count, when bounded
    pub fn max_count(&self) -> Option<usize> {
        self.validations.iter().find_map(|v| match v {
            ValidationRule::MaxCount { count } => Some(*count),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule() -> AssociationRule {
        AssociationRule::new(
            "ORDER_FABRIC_SELECTION".into(),
            EntityId::new(EntityPrefix::Assoc),
            "order".into(),
            "fabric".into(),
            Cardinality::ManyToMany,
            "test",
        )
    }

    #[test]
    fn test_validation_rule_serde() {
        let rules = vec![
            ValidationRule::Required,
            ValidationRule::MinCount { count: 1 },
            ValidationRule::MaxCount { count: 3 },
            ValidationRule::Unique,
        ];
        let yaml = serde_yml::to_string(&rules).unwrap();
        assert!(yaml.contains("rule: min_count"));
        let back: Vec<ValidationRule> = serde_yml::from_str(&yaml).unwrap();
        assert_eq!(rules, back);
    }

    #[test]
    fn test_requires_link_from_flag_or_validation() {
        let mut r = rule();
        assert!(!r.requires_link());
        r.validations.push(ValidationRule::Required);
        assert!(r.requires_link());

        let mut r = rule();
        r.required = true;
        assert!(r.requires_link());
    }

    #[test]
    fn test_max_count_lookup() {
        let mut r = rule();
        r.validations.push(ValidationRule::MaxCount { count: 3 });
        assert_eq!(r.max_count(), Some(3));
    }
}
