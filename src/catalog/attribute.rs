//! Attribute definition entity type

use serde::{Deserialize, Serialize};

use crate::core::audit::Audit;
use crate::core::identity::{EntityId, EntityPrefix};
use crate::core::value::AttributeKind;

/// Per-kind validation constraints.
///
/// Only the fields relevant to the definition's kind are consulted; the rest
/// are ignored by the validator. All bounds are inclusive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Constraints {
    // text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    /// Regex the full text must match
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,

    // number
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_value: Option<f64>,
    /// Value must be a whole number
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub integer: bool,
    /// Value must be strictly greater than zero
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub positive: bool,
    /// Value must be strictly less than zero
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub negative: bool,
    /// Value must not be zero
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub nonzero: bool,
    /// Exact count of integer digits the value must have
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digits: Option<u32>,

    // date
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_date: Option<chrono::NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_date: Option<chrono::NaiveDate>,

    // select / multiselect
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_selected: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_selected: Option<usize>,

    // table
    /// Declared column codes; every row must stay within this shape
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_rows: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_rows: Option<usize>,
}

/// A typed attribute definition in the catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeDefinition {
    /// Unique identifier
    pub id: EntityId,

    /// Unique machine code (e.g. "screen_size")
    pub code: String,

    /// Opaque localized display-name key, passed through uninterpreted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Opaque localized description key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Declared type tag. Immutable after creation.
    pub kind: AttributeKind,

    /// Whether the attribute is required when its group applies
    #[serde(default)]
    pub required: bool,

    /// Declared options for select/multiselect kinds
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,

    /// Validation constraints (mutable, unlike the kind)
    #[serde(default)]
    pub constraints: Constraints,

    /// Audit stamps
    pub audit: Audit,

    /// Optimistic-concurrency revision
    #[serde(default = "default_revision")]
    pub revision: u64,
}

pub(crate) fn default_revision() -> u64 {
    1
}

impl AttributeDefinition {
    pub fn new(code: String, kind: AttributeKind, required: bool, actor: &str) -> Self {
        Self {
            id: EntityId::new(EntityPrefix::Attr),
            code,
            name: None,
            description: None,
            kind,
            required,
            options: Vec::new(),
            constraints: Constraints::default(),
            audit: Audit::new(actor),
            revision: 1,
        }
    }
}
