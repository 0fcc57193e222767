//! Audit stamps carried by every persisted document

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Creation/update stamps with an opaque actor identifier.
///
/// The actor id comes from the (excluded) auth layer; the core stores it
/// verbatim and never interprets it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Audit {
    /// Creation timestamp
    pub created: DateTime<Utc>,

    /// Actor that created the document
    pub created_by: String,

    /// Last update timestamp
    pub updated: DateTime<Utc>,

    /// Actor that last updated the document
    pub updated_by: String,
}

impl Audit {
    /// Fresh stamps for a newly created document
    pub fn new(actor: &str) -> Self {
        let now = Utc::now();
        Self {
            created: now,
            created_by: actor.to_string(),
            updated: now,
            updated_by: actor.to_string(),
        }
    }

    /// Record an update by the given actor
    pub fn touch(&mut self, actor: &str) {
        self.updated = Utc::now();
        self.updated_by = actor.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_touch_preserves_creation() {
        let mut audit = Audit::new("alice");
        let created = audit.created;
        audit.touch("bob");
        assert_eq!(audit.created, created);
        assert_eq!(audit.created_by, "alice");
        assert_eq!(audit.updated_by, "bob");
        assert!(audit.updated >= created);
    }
}
