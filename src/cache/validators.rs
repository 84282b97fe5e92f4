//! Response validators carried alongside cached payloads.

use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH,
    LAST_MODIFIED,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// `ETag` / `Last-Modified` values from a response.
///
/// The cache never interprets them; they are handed back to the caller for
/// the next conditional request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Validators {
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}

impl Validators {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_etag(mut self, etag: impl Into<String>) -> Self {
        self.etag = Some(etag.into());
        self
    }

    pub fn with_last_modified(mut self, last_modified: impl Into<String>) -> Self {
        self.last_modified = Some(last_modified.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.etag.is_none() && self.last_modified.is_none()
    }

    /// Read validators from response headers. Non-UTF-8 values are ignored.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let read = |name: HeaderName| {
            headers
                .get(&name)
                .and_then(|v: &HeaderValue| v.to_str().ok())
                .map(str::to_string)
        };
        Self {
            etag: read(ETAG),
            last_modified: read(LAST_MODIFIED),
        }
    }

    /// `If-None-Match` / `If-Modified-Since` headers for a revalidating request.
    pub fn conditional_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let pairs = [
            (IF_NONE_MATCH, self.etag.as_deref()),
            (IF_MODIFIED_SINCE, self.last_modified.as_deref()),
        ];
        for (name, value) in pairs {
            let Some(value) = value else { continue };
            match HeaderValue::from_str(value) {
                Ok(v) => {
                    headers.insert(name, v);
                }
                Err(_) => warn!(header = %name, "validator is not a valid header value"),
            }
        }
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(ETAG, HeaderValue::from_static("W/\"abc\""));
        headers.insert(
            LAST_MODIFIED,
            HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"),
        );

        let v = Validators::from_headers(&headers);
        assert_eq!(v.etag.as_deref(), Some("W/\"abc\""));
        assert_eq!(v.last_modified.as_deref(), Some("Wed, 21 Oct 2015 07:28:00 GMT"));
        assert!(Validators::from_headers(&HeaderMap::new()).is_empty());
    }

    #[test]
    fn test_conditional_headers() {
        let v = Validators::new().with_etag("\"abc\"");
        let headers = v.conditional_headers();
        assert_eq!(headers.get(IF_NONE_MATCH).unwrap(), "\"abc\"");
        assert!(headers.get(IF_MODIFIED_SINCE).is_none());

        let v = Validators::new().with_etag("bad\nvalue").with_last_modified("yesterday");
        let headers = v.conditional_headers();
        assert!(headers.get(IF_NONE_MATCH).is_none());
        assert_eq!(headers.get(IF_MODIFIED_SINCE).unwrap(), "yesterday");
    }

    #[test]
    fn test_serde_shape() {
        let v = Validators::new().with_last_modified("x");
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json["lastModified"], "x");
        assert!(json["etag"].is_null());
    }
}
