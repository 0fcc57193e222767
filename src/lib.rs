//! MDT: Master Data Toolkit
//!
//! Manage items with hierarchy-resolved dynamic attributes and typed,
//! validated associations, stored as plain text files.

pub mod assoc;
pub mod catalog;
pub mod cli;
pub mod core;
pub mod hierarchy;
pub mod item;
pub mod store;
