//! Command implementations

pub mod assoc;
pub mod attr;
pub mod completions;
pub mod group;
pub mod hierarchy;
pub mod init;
pub mod item;
pub mod link;
