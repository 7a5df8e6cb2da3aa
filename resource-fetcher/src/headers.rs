//! Small header predicates lifted out of the response-decision tree so the
//! inference algorithm in [`crate::inference`] reads as a status/validator
//! dispatch rather than a thicket of header parsing.

use http::HeaderMap;

/// True if the response's `Content-Type` header names an HTML media type.
///
/// Only the type/subtype is considered; parameters such as `charset` are
/// ignored, matching how a browser decides whether to run the HTML parser.
#[must_use]
pub fn is_html(headers: &HeaderMap) -> bool {
    headers
        .get(http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| {
            let mime = v.split(';').next().unwrap_or(v).trim();
            mime.eq_ignore_ascii_case("text/html")
                || mime.eq_ignore_ascii_case("application/xhtml+xml")
        })
        .unwrap_or(false)
}

/// Returns the `Last-Modified` value if present, otherwise the `ETag`
/// value, or `None` if neither validator is present on the response.
#[must_use]
pub fn last_modified_or_etag(headers: &HeaderMap) -> Option<String> {
    headers
        .get(http::header::LAST_MODIFIED)
        .or_else(|| headers.get(http::header::ETAG))
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
}
