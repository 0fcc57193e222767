//! Typed associations between items
//!
//! Definitions describe which item types may link and with what cardinality;
//! rules bind a definition to a concrete (source type, target type) pair with
//! filter criteria and validation rules; the engine enforces both while
//! keeping the reverse side of every link in step.

pub mod definition;
pub mod engine;
pub mod query;
pub mod rule;

pub use definition::{
    AssociationDefinition, AttributeFilter, Cardinality, FilterCriteria, FilterPredicate,
};
pub use engine::{association_key, reverse_key, AssociationEngine, BoundRule, Direction};
pub use query::{AssociationMetadata, PageResult, TargetQuery};
pub use rule::{AssociationRule, SortDirection, ValidationRule};
