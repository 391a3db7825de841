//! Mapping of raw feed entries to canonical records

use kevsync_core::{Error, FeedEntry, KevRecord, Result};

/// Value of `knownRansomwareCampaignUse` that marks ransomware use
const KNOWN: &str = "known";

/// Normalize a feed entry into a [`KevRecord`].
///
/// The ransomware flag is set only when the indicator equals "known",
/// ignoring case. Fails with `MissingIdentifier` when the cveID is absent or
/// blank; `position` is left at 0 for the caller to fill in.
pub fn normalize(entry: &FeedEntry) -> Result<KevRecord> {
    let id = entry
        .cve_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| Error::MissingIdentifier {
            position: 0,
            vulnerability: entry.vulnerability_name.clone(),
        })?;

    let known_ransomware = entry
        .known_ransomware_campaign_use
        .as_deref()
        .map_or(false, |value| value.to_lowercase() == KNOWN);

    Ok(KevRecord::new(id, known_ransomware))
}
