//! Items and their lifecycle

pub mod model;
pub mod service;

pub use model::{AssociationValue, Item};
pub use service::{ItemPatch, ItemService, NewItem};
