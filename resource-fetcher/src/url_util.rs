//! Host-key extraction, trimmed from the dual `url`/`ada-url` abstraction
//! this crate's nearest relative carries: a single origin host always
//! identifies the admission-token bucket a resource belongs to, and there is
//! no second URL backend to abstract over here.

use url::Url;

/// Returns the host this URL should be admission-scheduled under, or `None`
/// for a URL with no host component (e.g. `data:` URIs, which are never
/// buffered or token-limited — callers should fetch them immediately).
#[inline]
#[must_use]
pub fn host_key(url: &Url) -> Option<String> {
    url.host_str().map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_host() {
        let url = Url::parse("http://example.com/a.png").unwrap();
        assert_eq!(host_key(&url).as_deref(), Some("example.com"));
    }

    #[test]
    fn data_uri_has_no_host() {
        let url = Url::parse("data:image/png;base64,AAAA").unwrap();
        assert_eq!(host_key(&url), None);
    }
}
