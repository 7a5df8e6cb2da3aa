//! The plain data carried between every component: inferred resources,
//! built request descriptors, and the small config bundle a protocol
//! attaches to a request.

use std::sync::Arc;

use url::Url;

/// What kind of document a discovered sub-resource is, which decides how
/// its completion is processed: a `Css` resource may itself expand the
/// fetch graph, a `Regular` one never does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// An image, script, font, or any other leaf sub-resource.
    Regular,
    /// A stylesheet, whose body is parsed for further embedded resources.
    Css,
}

/// A sub-resource discovered by parsing an HTML document or a CSS
/// stylesheet, before it has been turned into a request.
#[derive(Debug, Clone)]
pub struct EmbeddedResource {
    /// The absolute URI of the sub-resource.
    pub uri: Url,
    /// Whether this is a leaf resource or another stylesheet to recurse into.
    pub kind: ResourceKind,
}

impl EmbeddedResource {
    /// Convenience constructor for a non-CSS sub-resource.
    pub fn regular(uri: Url) -> Self {
        Self { uri, kind: ResourceKind::Regular }
    }

    /// Convenience constructor for a stylesheet sub-resource.
    pub fn css(uri: Url) -> Self {
        Self { uri, kind: ResourceKind::Css }
    }
}

/// The subset of protocol configuration a sub-resource's request needs:
/// which checks to run against the response, and whether the protocol's
/// throttling should apply to this request.
#[derive(Debug, Clone)]
pub struct RequestConfig {
    /// Names of the checks to run on the response, in declaration order.
    pub checks: Vec<String>,
    /// Whether this request participates in the protocol's throttling.
    pub throttled: bool,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self { checks: Vec::new(), throttled: false }
    }
}

/// A built, ready-to-submit request for a sub-resource.
#[derive(Debug, Clone)]
pub struct HttpRequestDescriptor {
    /// The absolute URI to fetch.
    pub uri: Url,
    /// Whether this was discovered inline or is a stylesheet.
    pub kind: ResourceKind,
    /// The request configuration to apply.
    pub config: Arc<RequestConfig>,
}

impl HttpRequestDescriptor {
    /// The host this request should be admission-scheduled under.
    #[must_use]
    pub fn host(&self) -> Option<String> {
        crate::url_util::host_key(&self.uri)
    }
}

/// The outcome of a single sub-resource fetch, as observed by the
/// scheduler. Anything other than a successful response is a `Ko`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The resource was retrieved successfully.
    Ok,
    /// The resource could not be retrieved (non-2xx, connection failure,
    /// timeout — the collaborator does not need to distinguish further).
    Ko,
}

/// The cached inference result for one `(protocol, document URI)` pair:
/// the validator it was computed under, and the request list it produced.
#[derive(Debug, Clone)]
pub struct InferredPageResources {
    /// The `Last-Modified`/`ETag` value the inference was computed against.
    pub validator: String,
    /// The requests inferred from the document at that validator.
    pub requests: Arc<Vec<HttpRequestDescriptor>>,
}

/// Key identifying one document's inferred-resource cache entry. A
/// document is identified by the protocol it was fetched under (so two
/// protocols with different inference settings never share an entry) and
/// its own URI.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InferredResourcesCacheKey {
    /// Identity of the protocol configuration in effect when the document
    /// was inferred.
    pub protocol_id: String,
    /// The document's own URI, as a string for hashing.
    pub document_uri: String,
}

impl InferredResourcesCacheKey {
    /// Build a cache key from a protocol identity and a document URL.
    #[must_use]
    pub fn new(protocol_id: impl Into<String>, document_uri: &Url) -> Self {
        Self { protocol_id: protocol_id.into(), document_uri: document_uri.to_string() }
    }
}
