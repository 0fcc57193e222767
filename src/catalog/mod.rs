//! Attribute catalog - typed attribute definitions and groups

pub mod attribute;
pub mod group;
pub mod validate;

pub use attribute::{AttributeDefinition, Constraints};
pub use group::AttributeGroup;
pub use validate::validate_value;
