//! The seams this crate calls out through: an HTML parser, a CSS parser, a
//! resource-to-request builder, session-held cache expiry, stats logging,
//! unbuildable-request reporting, and the actual HTTP submission. Every
//! trait here is object-safe so a caller wires up whatever concrete HTML
//! engine and HTTP client it already has; `resource-fetcher-reqwest`
//! provides a real [`HttpRequestAction`] for `reqwest`.

use std::fmt;
use std::time::Instant;

use url::Url;

use crate::scheduler::SchedulerHandle;
use crate::types::{EmbeddedResource, HttpRequestDescriptor};

/// Extracts the sub-resources an HTML document embeds.
pub trait HtmlParser: Send + Sync {
    /// Parse `body` (the bytes of an HTML document fetched from
    /// `document_uri`) and return the sub-resources a browser identifying
    /// as `user_agent` would fetch while rendering it.
    fn get_embedded_resources(
        &self,
        document_uri: &Url,
        body: &[u8],
        user_agent: &str,
    ) -> Vec<EmbeddedResource>;
}

/// Extracts the sub-resources a CSS stylesheet references.
pub trait CssParser: Send + Sync {
    /// Parse `text` (the body of a stylesheet fetched from `document_uri`)
    /// and return the resources it references (e.g. `url(...)` and
    /// `@import` targets).
    fn extract_resources(&self, document_uri: &Url, text: &str) -> Vec<EmbeddedResource>;
}

/// Converts an inferred sub-resource into a concrete request.
pub trait ResourceRequestBuilder: Send + Sync {
    /// Build a request for `resource`. Returns `Err` with a human-readable
    /// message if the resource cannot be converted (e.g. an unsupported
    /// scheme); the caller logs and drops it rather than propagating.
    fn to_request(
        &self,
        resource: &EmbeddedResource,
        throttled: bool,
    ) -> Result<HttpRequestDescriptor, String>;
}

/// Resolves and builds the requests a test declared explicitly, ahead of
/// any inference.
pub trait HttpRequestDef<S>: Send + Sync {
    /// Resolve this template's request name against `session`.
    fn request_name(&self, session: &S) -> Result<String, String>;
    /// Build the request named `name` using `session`.
    fn build(&self, name: &str, session: &S) -> Result<HttpRequestDescriptor, String>;
}

/// Session-held cache-expiry bookkeeping: when a resource's own cached
/// copy is still fresh, the scheduler replays a synthetic completion
/// instead of fetching it.
pub trait CacheHandling<S>: Send + Sync {
    /// The expiry timestamp the session has recorded for `uri` under
    /// `protocol_id`, if any.
    fn get_expire(&self, protocol_id: &str, session: &S, uri: &Url) -> Option<Instant>;
    /// Return a copy of `session` with `uri`'s expiry entry removed.
    fn clear_expire(&self, session: S, uri: &Url) -> S;
}

/// Appends one page load's aggregate timing and counts to the session.
pub trait SessionStats<S>: Send + Sync {
    /// Fold a completed page's async-resource group result into `session`.
    fn log_group_async_requests(
        &self,
        session: S,
        elapsed: std::time::Duration,
        ok_count: u64,
        ko_count: u64,
    ) -> S;
}

/// Reports a request that could not be built back to the caller's
/// pipeline, distinct from the logging done for inferred resources.
pub trait RequestReporter<S>: Send + Sync {
    /// `name` failed to build against `session` with the given `message`.
    fn report_unbuildable_request(&self, name: &str, session: &S, message: &str);
}

/// Submits a built request. Implementations must not block the calling
/// thread: real work happens on whatever async runtime the collaborator
/// manages internally, reporting back on `reply_to` once it completes.
/// This method itself never suspends, preserving the invariant that a
/// scheduler's own message handlers never yield mid-handler.
pub trait HttpRequestAction<S>: Send + Sync {
    /// Submit `descriptor` on behalf of `session`, replying to the
    /// scheduler behind `reply_to` with the outcome once it is known.
    fn start_http_transaction(
        &self,
        descriptor: HttpRequestDescriptor,
        session: S,
        reply_to: SchedulerHandle<S>,
    );
}

/// The collaborators a scheduler needs to drive one page load, bundled so
/// constructing a scheduler takes one argument instead of seven.
pub struct Collaborators<S> {
    /// Parses HTML documents for embedded resources.
    pub html_parser: std::sync::Arc<dyn HtmlParser>,
    /// Parses CSS stylesheets for embedded resources.
    pub css_parser: std::sync::Arc<dyn CssParser>,
    /// Converts inferred resources into requests.
    pub resource_builder: std::sync::Arc<dyn ResourceRequestBuilder>,
    /// Session-held cache expiry.
    pub cache_handling: std::sync::Arc<dyn CacheHandling<S>>,
    /// Appends aggregate stats to the session at termination.
    pub session_stats: std::sync::Arc<dyn SessionStats<S>>,
    /// Submits built requests.
    pub http_action: std::sync::Arc<dyn HttpRequestAction<S>>,
    /// Reports explicit requests that failed to build.
    pub request_reporter: std::sync::Arc<dyn RequestReporter<S>>,
}

impl<S> Clone for Collaborators<S> {
    fn clone(&self) -> Self {
        Self {
            html_parser: self.html_parser.clone(),
            css_parser: self.css_parser.clone(),
            resource_builder: self.resource_builder.clone(),
            cache_handling: self.cache_handling.clone(),
            session_stats: self.session_stats.clone(),
            http_action: self.http_action.clone(),
            request_reporter: self.request_reporter.clone(),
        }
    }
}

impl<S> fmt::Debug for Collaborators<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

/// Notified exactly once, when a page load's scheduler has no more
/// pending sub-resources, with the session updated to reflect the
/// aggregate result.
pub trait PageLoadContinuation<S>: Send + Sync {
    /// The page load is complete; `session` carries its final state.
    fn resume(&self, session: S);
}
