//! Policy for feed entries that cannot be normalized

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// What the reconciliation pass does with an entry lacking a usable cveID
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryPolicy {
    /// Log the entry, leave it out of the diff, and keep going
    #[default]
    Skip,
    /// Stop the pass at the first bad entry
    Abort,
}

impl FromStr for EntryPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(EntryPolicy::Skip),
            "abort" => Ok(EntryPolicy::Abort),
            other => Err(format!("expected 'skip' or 'abort', got '{}'", other)),
        }
    }
}

impl std::fmt::Display for EntryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryPolicy::Skip => f.write_str("skip"),
            EntryPolicy::Abort => f.write_str("abort"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_policy() {
        assert_eq!("skip".parse::<EntryPolicy>(), Ok(EntryPolicy::Skip));
        assert_eq!(" ABORT ".parse::<EntryPolicy>(), Ok(EntryPolicy::Abort));
        assert!("continue".parse::<EntryPolicy>().is_err());
        assert_eq!(EntryPolicy::default(), EntryPolicy::Skip);
    }
}
