//! Core module - fundamental types and utilities

pub mod audit;
pub mod config;
pub mod error;
pub mod identity;
pub mod project;
pub mod value;

pub use audit::Audit;
pub use config::Config;
pub use error::{CoreError, CoreResult, ValidationFailure};
pub use identity::{EntityId, EntityPrefix, IdParseError};
pub use project::{Project, ProjectError};
pub use value::{AttributeKind, AttributeValue, TableRow};
