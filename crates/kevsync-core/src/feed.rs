//! Upstream KEV feed document and its entries

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// CISA Known Exploited Vulnerabilities catalog (JSON)
pub const DEFAULT_KEV_URL: &str =
    "https://www.cisa.gov/sites/default/files/feeds/known_exploited_vulnerabilities.json";

/// JSON Schema describing the CISA KEV catalog
pub const DEFAULT_KEV_SCHEMA_URL: &str =
    "https://www.cisa.gov/sites/default/files/feeds/known_exploited_vulnerabilities_schema.json";

/// URL schemes the fetcher is allowed to retrieve
pub const ALLOWED_URL_SCHEMES: &[&str] = &["http", "https"];

/// The full upstream payload for one sync run.
///
/// `raw` keeps the decoded JSON exactly as received so schema validation
/// sees the real shape rather than our typed view of it.
#[derive(Debug, Clone)]
pub struct FeedDocument {
    pub catalog_version: Option<String>,
    pub date_released: Option<String>,
    /// Self-reported entry count. Informational only.
    pub count: Option<i64>,
    pub vulnerabilities: Vec<FeedEntry>,
    pub raw: Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FeedShape {
    #[serde(default, deserialize_with = "lenient_string")]
    catalog_version: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    date_released: Option<String>,
    #[serde(default, deserialize_with = "lenient_count")]
    count: Option<i64>,
    vulnerabilities: Vec<Value>,
}

impl FeedDocument {
    /// Build a feed document from decoded JSON.
    ///
    /// Fails only if `vulnerabilities` is missing or not an array. Fields of
    /// the wrong type read as absent, and an entry that is not an object
    /// becomes an empty entry for the normalizer to reject.
    pub fn from_value(raw: Value) -> serde_json::Result<Self> {
        let shape = FeedShape::deserialize(&raw)?;
        let vulnerabilities: Vec<FeedEntry> = shape
            .vulnerabilities
            .into_iter()
            .map(|entry| serde_json::from_value::<FeedEntry>(entry).unwrap_or_default())
            .collect();

        Ok(Self {
            catalog_version: shape.catalog_version,
            date_released: shape.date_released,
            count: shape.count,
            vulnerabilities,
            raw,
        })
    }

    /// Number of entries actually present in the feed
    pub fn len(&self) -> usize {
        self.vulnerabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vulnerabilities.is_empty()
    }
}

/// A string, or `None` for null and any other JSON type
fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

/// The string members of an array; anything else reads as empty
fn lenient_strings<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    })
}

/// An integer count; strings, floats and null read as unreported
fn lenient_count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    Ok(Value::deserialize(deserializer)?.as_i64())
}

/// One vulnerability entry as published in the feed.
///
/// Every field is optional and tolerates the wrong JSON type, so one
/// malformed entry cannot fail the decode of the whole catalog; the
/// normalizer decides what is required.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedEntry {
    #[serde(rename = "cveID", default, deserialize_with = "lenient_string")]
    pub cve_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub known_ransomware_campaign_use: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub vendor_project: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub product: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub vulnerability_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub date_added: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub short_description: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub required_action: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub due_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub notes: Option<String>,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub cwes: Vec<String>,
}

impl FeedEntry {
    /// Convenience constructor for the two fields the sync tracks
    pub fn new(cve_id: impl Into<String>, ransomware_use: impl Into<String>) -> Self {
        Self {
            cve_id: Some(cve_id.into()),
            known_ransomware_campaign_use: Some(ransomware_use.into()),
            ..Default::default()
        }
    }
}
