//! Feed retrieval over HTTP(S)
//!
//! Only `http` and `https` URLs are fetched; anything else is rejected before
//! a request is built. The fetcher never retries, that decision belongs to
//! the orchestrator.

use kevsync_core::{Error, FeedDocument, Result, ALLOWED_URL_SCHEMES};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Maximum number of characters of an undecodable body kept in the error
const SNIPPET_LEN: usize = 120;

/// Parse `raw` and make sure its scheme is on the allow-list
pub fn check_scheme(raw: &str) -> Result<Url> {
    let parsed = Url::parse(raw).map_err(|_| Error::InvalidScheme {
        url: raw.to_string(),
        scheme: leading_scheme(raw),
    })?;

    if !ALLOWED_URL_SCHEMES.contains(&parsed.scheme()) {
        return Err(Error::InvalidScheme {
            url: raw.to_string(),
            scheme: parsed.scheme().to_string(),
        });
    }

    Ok(parsed)
}

/// Best-effort scheme of a string `Url` refused to parse
fn leading_scheme(raw: &str) -> String {
    match raw.split_once("://") {
        Some((scheme, _))
            if !scheme.is_empty()
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')) =>
        {
            scheme.to_ascii_lowercase()
        }
        _ => String::new(),
    }
}

/// HTTP(S) client for the KEV feed and its schema
#[derive(Clone)]
pub struct FeedFetcher {
    client: Client,
}

impl FeedFetcher {
    /// Create a fetcher whose requests are bounded by `timeout`
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(format!("kevsync/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// Retrieve `url` and decode the body as JSON
    pub async fn fetch_json(&self, url: &str) -> Result<Value> {
        let target = check_scheme(url)?;
        debug!("Fetching {}", url);

        let response = self
            .client
            .get(target)
            .send()
            .await
            .map_err(|e| transport_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::RetrievalFailed {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| transport_error(url, e))?;
        debug!("Retrieved {} bytes from {}", body.len(), url);

        decode_json(url, &body)
    }

    /// Retrieve and decode the KEV feed at `url`
    pub async fn fetch_feed(&self, url: &str) -> Result<FeedDocument> {
        let raw = self.fetch_json(url).await?;
        let excerpt = snippet(&raw.to_string());

        FeedDocument::from_value(raw).map_err(|e| Error::DecodeError {
            url: url.to_string(),
            message: format!("not a KEV feed: {}", e),
            snippet: excerpt,
        })
    }
}

fn transport_error(url: &str, err: reqwest::Error) -> Error {
    Error::Transport {
        url: url.to_string(),
        message: err.to_string(),
        timed_out: err.is_timeout(),
    }
}

fn decode_json(url: &str, body: &[u8]) -> Result<Value> {
    let text = std::str::from_utf8(body).map_err(|e| Error::DecodeError {
        url: url.to_string(),
        message: format!("body is not valid UTF-8: {}", e),
        snippet: snippet(&String::from_utf8_lossy(body)),
    })?;

    serde_json::from_str(text).map_err(|e| Error::DecodeError {
        url: url.to_string(),
        message: e.to_string(),
        snippet: snippet(text),
    })
}

fn snippet(text: &str) -> String {
    text.chars().take(SNIPPET_LEN).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_schemes() {
        assert!(check_scheme("https://www.cisa.gov/feed.json").is_ok());
        assert!(check_scheme("http://localhost:8080/feed.json").is_ok());
        assert!(check_scheme("HTTPS://example.com/feed.json").is_ok());
    }

    #[test]
    fn test_rejected_schemes() {
        match check_scheme("ftp://example.com/feed.json") {
            Err(Error::InvalidScheme { scheme, .. }) => assert_eq!(scheme, "ftp"),
            other => panic!("unexpected result: {:?}", other),
        }
        match check_scheme("file:///etc/passwd") {
            Err(Error::InvalidScheme { scheme, .. }) => assert_eq!(scheme, "file"),
            other => panic!("unexpected result: {:?}", other),
        }
        match check_scheme("example.com/feed.json") {
            Err(Error::InvalidScheme { scheme, .. }) => assert_eq!(scheme, ""),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_decode_json_reports_offending_text() {
        match decode_json("https://example.com/feed.json", b"Invalid JSON") {
            Err(Error::DecodeError { snippet, .. }) => assert_eq!(snippet, "Invalid JSON"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_decode_json_rejects_bad_utf8() {
        let err = decode_json("https://example.com/feed.json", &[0xff, 0xfe, b'{']).unwrap_err();
        assert_eq!(err.code(), "DECODE_ERROR");
    }

    #[test]
    fn test_snippet_truncates() {
        let long = "x".repeat(500);
        assert_eq!(snippet(&long).len(), SNIPPET_LEN);
    }
}
