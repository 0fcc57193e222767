//! Type hierarchy - item types, category and family trees, and the
//! requirement resolver that walks them

pub mod nodes;
pub mod resolver;

pub use nodes::{CategoryNode, FamilyNode, ItemTypeNode};
pub use resolver::RequirementResolver;
