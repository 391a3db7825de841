//! JSON Schema validation of the feed and the reported-count cross-check

use crate::fetch::FeedFetcher;
use jsonschema::JSONSchema;
use kevsync_core::{Error, FeedDocument, Result};
use serde_json::Value;
use tracing::{error, info, warn};

/// Outcome of comparing the feed's `count` field to its entry list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountCheck {
    pub reported: Option<i64>,
    pub actual: usize,
}

impl CountCheck {
    pub fn matches(&self) -> bool {
        self.reported
            .and_then(|n| usize::try_from(n).ok())
            .map_or(false, |n| n == self.actual)
    }
}

/// Compare the self-reported count to the real number of entries.
///
/// A mismatch is logged as a warning and never fails; the entry list is
/// authoritative.
pub fn check_count(feed: &FeedDocument) -> CountCheck {
    let check = CountCheck {
        reported: feed.count,
        actual: feed.len(),
    };

    match check.reported {
        Some(reported) if check.matches() => {
            info!("Reported vulnerability count matches actual count: {}", reported);
        }
        Some(reported) => {
            warn!(
                "Reported vulnerability count ({}) does not match actual count ({}).",
                reported, check.actual
            );
        }
        None => {
            warn!(
                "Feed does not report an integer vulnerability count; actual count is {}.",
                check.actual
            );
        }
    }

    check
}

/// A compiled KEV feed schema
pub struct SchemaValidator {
    compiled: JSONSchema,
}

impl SchemaValidator {
    /// Compile a schema document, failing with `SchemaInvalid` if it is malformed
    pub fn compile(schema: &Value) -> Result<Self> {
        let compiled = JSONSchema::compile(schema).map_err(|e| {
            error!("The schema was not valid: {}", e);
            Error::SchemaInvalid(e.to_string())
        })?;

        Ok(Self { compiled })
    }

    /// Fetch the schema at `schema_url` and compile it
    pub async fn fetch(fetcher: &FeedFetcher, schema_url: &str) -> Result<Self> {
        let schema = fetcher.fetch_json(schema_url).await?;
        Self::compile(&schema)
    }

    /// Validate the raw feed, then cross-check its count.
    ///
    /// Every violation is collected before failing.
    pub fn validate(&self, feed: &FeedDocument) -> Result<CountCheck> {
        if let Err(errors) = self.compiled.validate(&feed.raw) {
            let violations: Vec<String> = errors
                .map(|e| {
                    let path = e.instance_path.to_string();
                    let path = if path.is_empty() { String::from("/") } else { path };
                    format!("{}: {}", path, e)
                })
                .collect();

            error!("JSON validation error: {}", violations.join("; "));
            return Err(Error::SchemaViolation { violations });
        }

        info!("KEV JSON is valid against the schema.");
        Ok(check_count(feed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn kev_schema() -> Value {
        json!({
            "$schema": "http://json-schema.org/draft-07/schema#",
            "type": "object",
            "properties": {
                "catalogVersion": {"type": "string"},
                "dateReleased": {"type": "string"},
                "count": {"type": "integer"},
                "vulnerabilities": {"type": "array"}
            },
            "required": ["catalogVersion", "dateReleased", "count", "vulnerabilities"]
        })
    }

    fn feed(count: i64, entries: usize) -> FeedDocument {
        let vulns: Vec<Value> = (0..entries)
            .map(|i| json!({"cveID": format!("CVE-2024-{:05}", i), "knownRansomwareCampaignUse": "Unknown"}))
            .collect();
        FeedDocument::from_value(json!({
            "catalogVersion": "2024.10.17",
            "dateReleased": "2024-10-17T14:50:49.2815Z",
            "count": count,
            "vulnerabilities": vulns
        }))
        .unwrap()
    }

    #[test]
    fn test_valid_feed() {
        let validator = SchemaValidator::compile(&kev_schema()).unwrap();
        let check = validator.validate(&feed(2, 2)).unwrap();
        assert!(check.matches());
    }

    #[test]
    fn test_invalid_schema() {
        let result = SchemaValidator::compile(&json!({"type": "invalid"}));
        assert!(matches!(result, Err(Error::SchemaInvalid(_))));
    }

    #[test]
    fn test_missing_required_field() {
        let validator = SchemaValidator::compile(&kev_schema()).unwrap();
        let mut doc = feed(2, 2);
        doc.raw.as_object_mut().unwrap().remove("count");

        match validator.validate(&doc) {
            Err(Error::SchemaViolation { violations }) => {
                assert_eq!(violations.len(), 1);
                assert!(violations[0].contains("count"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_count_mismatch_is_not_fatal() {
        let validator = SchemaValidator::compile(&kev_schema()).unwrap();
        let check = validator.validate(&feed(5, 4)).unwrap();
        assert!(!check.matches());
        assert_eq!(check.reported, Some(5));
        assert_eq!(check.actual, 4);
    }

    #[test]
    fn test_missing_count_is_mismatch() {
        let doc = FeedDocument::from_value(json!({"vulnerabilities": []})).unwrap();
        let check = check_count(&doc);
        assert!(!check.matches());
        assert_eq!(check.reported, None);
    }

    #[test]
    fn test_negative_count_is_mismatch() {
        assert!(!check_count(&feed(-1, 0)).matches());
    }

    #[test]
    fn test_string_count_is_mismatch() {
        let doc = FeedDocument::from_value(json!({
            "count": "2",
            "vulnerabilities": [{"cveID": "CVE-1"}, {"cveID": "CVE-2"}]
        }))
        .unwrap();

        let check = check_count(&doc);
        assert_eq!(check.reported, None);
        assert_eq!(check.actual, 2);
        assert!(!check.matches());
    }
}
