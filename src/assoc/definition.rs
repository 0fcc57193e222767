//! Association definition entity type
//!
//! The coarse layer of the association model: which item types may be linked,
//! in which direction, under which cardinality class, and behind which filter
//! criteria. Concrete source/target pairs are instantiated as
//! [`AssociationRule`](super::rule::AssociationRule)s.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::catalog::attribute::default_revision;
use crate::core::audit::Audit;
use crate::core::identity::{EntityId, EntityPrefix};

/// Relationship cardinality class.
///
/// Determines single-vs-list storage (`one-to-one` and `many-to-one` keys
/// hold a single id) and the reverse-mirroring shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum Cardinality {
    #[serde(rename = "one-to-one")]
    #[clap(name = "one-to-one")]
    OneToOne,
    #[serde(rename = "one-to-many")]
    #[clap(name = "one-to-many")]
    OneToMany,
    #[serde(rename = "many-to-one")]
    #[clap(name = "many-to-one")]
    ManyToOne,
    #[serde(rename = "many-to-many")]
    #[clap(name = "many-to-many")]
    ManyToMany,
}

impl Cardinality {
    /// The cardinality seen from the other end of the link
    pub fn mirror(&self) -> Cardinality {
        match self {
            Cardinality::OneToOne => Cardinality::OneToOne,
            Cardinality::OneToMany => Cardinality::ManyToOne,
            Cardinality::ManyToOne => Cardinality::OneToMany,
            Cardinality::ManyToMany => Cardinality::ManyToMany,
        }
    }

    /// Whether a key of this class stores a single id rather than a list
    pub fn is_single(&self) -> bool {
        matches!(self, Cardinality::OneToOne | Cardinality::ManyToOne)
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Cardinality::OneToOne => "one-to-one",
            Cardinality::OneToMany => "one-to-many",
            Cardinality::ManyToOne => "many-to-one",
            Cardinality::ManyToMany => "many-to-many",
        };
        write!(f, "{}", s)
    }
}

/// One attribute-level filter: operator plus operand, applied to a named
/// attribute of the candidate item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeFilter {
    /// Attribute code the filter applies to
    pub attribute: String,

    #[serde(flatten)]
    pub predicate: FilterPredicate,
}

/// Filter operator with its operand
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operator", rename_all = "lowercase")]
pub enum FilterPredicate {
    /// Exact match
    Equals { value: serde_json::Value },
    /// Case-insensitive substring
    Contains { value: String },
    /// Membership in a value list
    In { values: Vec<serde_json::Value> },
    /// Inclusive numeric bounds; either bound optional
    Range {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
    },
    /// Presence (or required absence) of a non-empty value
    Exists { present: bool },
}

/// Category/family/attribute constraints gating candidate validity and
/// candidate-listing queries. Empty sets pass everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterCriteria {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<EntityId>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub families: Vec<EntityId>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<AttributeFilter>,
}

impl FilterCriteria {
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty() && self.families.is_empty() && self.attributes.is_empty()
    }
}

/// A coarse association declaration between item types
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssociationDefinition {
    pub id: EntityId,

    /// Unique machine code (e.g. "order_customer")
    pub code: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// One-way when true: links may only be created from the source side.
    /// Mirrored entries are written either way so both endpoints can be
    /// queried.
    #[serde(default)]
    pub directional: bool,

    pub cardinality: Cardinality,

    /// Allowed source item-type codes
    pub source_types: Vec<String>,

    /// Allowed target item-type codes
    pub target_types: Vec<String>,

    /// Criteria the source item must satisfy
    #[serde(default, skip_serializing_if = "FilterCriteria::is_empty")]
    pub source_filter: FilterCriteria,

    /// Criteria every target candidate must satisfy
    #[serde(default, skip_serializing_if = "FilterCriteria::is_empty")]
    pub target_filter: FilterCriteria,

    /// Opaque metadata, stored verbatim
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,

    pub audit: Audit,

    #[serde(default = "default_revision")]
    pub revision: u64,
}

impl AssociationDefinition {
    pub fn new(
        code: String,
        cardinality: Cardinality,
        source_types: Vec<String>,
        target_types: Vec<String>,
        actor: &str,
    ) -> Self {
        Self {
            id: EntityId::new(EntityPrefix::Assoc),
            code,
            name: None,
            description: None,
            directional: false,
            cardinality,
            source_types,
            target_types,
            source_filter: FilterCriteria::default(),
            target_filter: FilterCriteria::default(),
            metadata: BTreeMap::new(),
            audit: Audit::new(actor),
            revision: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cardinality_mirror() {
        assert_eq!(Cardinality::OneToOne.mirror(), Cardinality::OneToOne);
        assert_eq!(Cardinality::OneToMany.mirror(), Cardinality::ManyToOne);
        assert_eq!(Cardinality::ManyToOne.mirror(), Cardinality::OneToMany);
        assert_eq!(Cardinality::ManyToMany.mirror(), Cardinality::ManyToMany);
    }

    #[test]
    fn test_single_storage_classes() {
        assert!(Cardinality::OneToOne.is_single());
        assert!(Cardinality::ManyToOne.is_single());
        assert!(!Cardinality::OneToMany.is_single());
        assert!(!Cardinality::ManyToMany.is_single());
    }

    #[test]
    fn test_cardinality_serde_names() {
        let yaml = serde_yml::to_string(&Cardinality::ManyToOne).unwrap();
        assert_eq!(yaml.trim(), "many-to-one");
    }

    #[test]
    fn test_filter_predicate_tagged_by_operator() {
        let f = AttributeFilter {
            attribute: "screen_size".into(),
            predicate: FilterPredicate::Range {
                min: Some(40.0),
                max: None,
            },
        };
        let yaml = serde_yml::to_string(&f).unwrap();
        assert!(yaml.contains("operator: range"));
        let back: AttributeFilter = serde_yml::from_str(&yaml).unwrap();
        assert_eq!(f, back);
    }
}
