//! Canonical persisted record

use serde::{Deserialize, Serialize};

/// A KEV record as kept in the local catalog.
///
/// `known_ransomware` is the only attribute tracked for change detection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KevRecord {
    /// CVE identifier, unique within the store
    pub id: String,
    pub known_ransomware: bool,
}

impl KevRecord {
    pub fn new(id: impl Into<String>, known_ransomware: bool) -> Self {
        Self {
            id: id.into(),
            known_ransomware,
        }
    }
}

impl std::fmt::Display for KevRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.id, self.known_ransomware)
    }
}
