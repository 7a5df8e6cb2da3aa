//! The two entry points a caller uses to kick off sub-resource fetching
//! for one page load, and the merge rule that lets explicitly declared
//! resources override inferred ones sharing a URI.

use std::fmt;
use std::sync::Arc;

use http::HeaderMap;
use url::Url;

use crate::cache::ResourceCaches;
use crate::collaborators::{Collaborators, HttpRequestDef, PageLoadContinuation};
use crate::explicit;
use crate::headers;
use crate::inference::{self, ResourceFilter};
use crate::scheduler::{spawn_scheduler, SchedulerConfig, SchedulerHandle};
use crate::types::{HttpRequestDescriptor, InferredResourcesCacheKey, RequestConfig};

/// Identity and knobs of the protocol driving a page load: which cache
/// entries its inference results are filed under, whether HTML inference
/// runs at all, the User-Agent handed to the HTML parser, and the
/// per-host admission budget its scheduler enforces.
#[derive(Debug, Clone)]
pub struct ProtocolConfig {
    /// Identity distinguishing this protocol's cache entries from another
    /// protocol's, even for the same document URI.
    pub protocol_id: String,
    /// User-Agent string passed to the HTML parser.
    pub user_agent: String,
    /// Whether HTML responses are scanned for embedded resources at all.
    pub infer_html_resources: bool,
    /// Maximum concurrent in-flight fetches per origin host.
    pub max_connections_per_host: u32,
}

/// Ambient information about the calling virtual user's in-flight
/// transaction, threaded through to every sub-resource dispatch and to the
/// continuation invoked once the page load's resources are all accounted
/// for.
pub struct HttpTx<S> {
    /// Checks and throttling applied to resources this page load discovers
    /// on its own (CSS-referenced sub-resources); resources built by the
    /// caller (explicit resources, or ones converted by
    /// [`crate::collaborators::ResourceRequestBuilder`]) carry their own.
    pub config: Arc<RequestConfig>,
    /// Notified exactly once, when every sub-resource has completed.
    pub continuation: Arc<dyn PageLoadContinuation<S>>,
}

impl<S> fmt::Debug for HttpTx<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTx").field("config", &self.config).finish_non_exhaustive()
    }
}

/// Combine inferred and explicitly declared resources into one list,
/// keyed by URI. When both contribute the same URI the explicit one wins,
/// replacing the inferred entry in place; explicit-only entries are
/// appended. Order within the inferred prefix is otherwise preserved.
#[must_use]
pub fn merge_dedup_by_uri(
    inferred: Vec<HttpRequestDescriptor>,
    explicit: Vec<HttpRequestDescriptor>,
) -> Vec<HttpRequestDescriptor> {
    let mut merged = inferred;
    for request in explicit {
        match merged.iter_mut().find(|existing| existing.uri == request.uri) {
            Some(existing) => *existing = request,
            None => merged.push(request),
        }
    }
    merged
}

fn build_explicit<S>(
    templates: &[Box<dyn HttpRequestDef<S>>],
    session: &S,
    collaborators: &Collaborators<S>,
) -> Vec<HttpRequestDescriptor> {
    if templates.is_empty() {
        return Vec::new();
    }
    explicit::build_explicit_resources(templates, session, collaborators.request_reporter.as_ref())
}

fn scheduler_config<S>(
    caches: &ResourceCaches,
    collaborators: &Collaborators<S>,
    protocol: &ProtocolConfig,
    tx: HttpTx<S>,
    filter: Option<Arc<ResourceFilter>>,
) -> SchedulerConfig<S> {
    SchedulerConfig {
        collaborators: collaborators.clone(),
        caches: Arc::new(caches.clone()),
        protocol_id: protocol.protocol_id.clone(),
        default_config: tx.config,
        filter,
        max_connections_per_host: protocol.max_connections_per_host,
        continuation: tx.continuation,
    }
}

/// Build the sub-resource scheduler for a primary HTML response that was
/// actually fetched (as opposed to served from cache). Returns `None` if
/// neither inference nor explicit resources produced anything to fetch —
/// in that case no scheduler is constructed at all.
#[allow(clippy::too_many_arguments)]
pub async fn resource_fetcher_for_fetched_page<S>(
    caches: &ResourceCaches,
    collaborators: &Collaborators<S>,
    protocol: &ProtocolConfig,
    primary_uri: &Url,
    status_code: Option<u16>,
    headers: &HeaderMap,
    body: Option<&[u8]>,
    is_received: bool,
    explicit_templates: &[Box<dyn HttpRequestDef<S>>],
    filter: Option<Arc<ResourceFilter>>,
    tx: HttpTx<S>,
    session: &S,
) -> Option<SchedulerHandle<S>>
where
    S: Clone + Send + 'static,
{
    let inferred = if protocol.infer_html_resources
        && is_received
        && self::headers::is_html(headers)
    {
        match status_code {
            Some(status_code) => {
                inference::infer_html_resources(
                    caches,
                    collaborators.html_parser.as_ref(),
                    collaborators.resource_builder.as_ref(),
                    &protocol.protocol_id,
                    primary_uri,
                    status_code,
                    headers::last_modified_or_etag(headers).as_deref(),
                    body,
                    &protocol.user_agent,
                    &tx.config,
                    filter.as_deref(),
                )
                .await
            }
            None => Vec::new(),
        }
    } else {
        Vec::new()
    };

    let explicit = build_explicit(explicit_templates, session, collaborators);
    let merged = merge_dedup_by_uri(inferred, explicit);
    if merged.is_empty() {
        return None;
    }

    let config = scheduler_config(caches, collaborators, protocol, tx, filter);
    Some(spawn_scheduler(config, session.clone(), merged))
}

/// Build the sub-resource scheduler for a primary HTML response that was
/// served from cache, so no response body is available: the inferred list
/// comes solely from the process-wide inference cache. Returns `None`
/// under the same condition as
/// [`resource_fetcher_for_fetched_page`].
pub async fn resource_fetcher_for_cached_page<S>(
    caches: &ResourceCaches,
    collaborators: &Collaborators<S>,
    protocol: &ProtocolConfig,
    document_uri: &Url,
    explicit_templates: &[Box<dyn HttpRequestDef<S>>],
    filter: Option<Arc<ResourceFilter>>,
    tx: HttpTx<S>,
    session: &S,
) -> Option<SchedulerHandle<S>>
where
    S: Clone + Send + 'static,
{
    let key = InferredResourcesCacheKey::new(&protocol.protocol_id, document_uri);
    let inferred = caches
        .inferred
        .get(&key)
        .await
        .map(|entry| (*entry.requests).clone())
        .unwrap_or_default();

    let explicit = build_explicit(explicit_templates, session, collaborators);
    let merged = merge_dedup_by_uri(inferred, explicit);
    if merged.is_empty() {
        return None;
    }

    let config = scheduler_config(caches, collaborators, protocol, tx, filter);
    Some(spawn_scheduler(config, session.clone(), merged))
}
