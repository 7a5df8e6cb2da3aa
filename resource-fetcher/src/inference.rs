//! Deciding what to fetch next from a document response: reuse a cached
//! inference, re-parse, or give up, purely as a function of status code
//! and validator. The same decision tree governs an HTML primary document
//! and a CSS body discovered mid-page-load.

use std::sync::Arc;

use url::Url;

use crate::cache::ResourceCaches;
use crate::collaborators::{CssParser, HtmlParser, ResourceRequestBuilder};
use crate::types::{
    EmbeddedResource, HttpRequestDescriptor, InferredPageResources, InferredResourcesCacheKey,
    RequestConfig,
};

/// A resource filter: given a candidate, decide whether to keep it.
/// Supplied by the caller; `None` means no filtering is applied.
pub type ResourceFilter = dyn Fn(&EmbeddedResource) -> bool + Send + Sync;

fn build_requests(
    resources: &[EmbeddedResource],
    builder: &dyn ResourceRequestBuilder,
    filter: Option<&ResourceFilter>,
    throttled: bool,
) -> Vec<HttpRequestDescriptor> {
    resources
        .iter()
        .filter(|r| filter.map_or(true, |f| f(r)))
        .filter_map(|r| match builder.to_request(r, throttled) {
            Ok(req) => Some(req),
            Err(message) => {
                log::error!("could not build request for inferred resource {}: {message}", r.uri);
                None
            }
        })
        .collect()
}

/// Infer the sub-resources an HTML primary response embeds, per the status
/// code / validator decision tree: a `200` with a matching cached
/// validator reuses the cached list without re-parsing; a `200` with a new
/// or absent validator re-parses (and caches, if a validator is present); a
/// `304` reuses the cached list or returns empty with a warning; anything
/// else returns empty.
#[allow(clippy::too_many_arguments)]
pub async fn infer_html_resources(
    caches: &ResourceCaches,
    html_parser: &dyn HtmlParser,
    resource_builder: &dyn ResourceRequestBuilder,
    protocol_id: &str,
    document_uri: &Url,
    status_code: u16,
    validator: Option<&str>,
    body: Option<&[u8]>,
    user_agent: &str,
    config: &Arc<RequestConfig>,
    filter: Option<&ResourceFilter>,
) -> Vec<HttpRequestDescriptor> {
    let key = InferredResourcesCacheKey::new(protocol_id, document_uri);

    match status_code {
        200 => {
            if let Some(validator) = validator {
                if let Some(cached) =
                    caches.inferred.get_if_validator_matches(&key, validator).await
                {
                    return (*cached.requests).clone();
                }
                let Some(body) = body else { return Vec::new() };
                let resources = html_parser.get_embedded_resources(document_uri, body, user_agent);
                let requests =
                    build_requests(&resources, resource_builder, filter, config.throttled);
                caches
                    .inferred
                    .insert(
                        key,
                        InferredPageResources {
                            validator: validator.to_string(),
                            requests: Arc::new(requests.clone()),
                        },
                    )
                    .await;
                requests
            } else {
                let Some(body) = body else { return Vec::new() };
                let resources = html_parser.get_embedded_resources(document_uri, body, user_agent);
                build_requests(&resources, resource_builder, filter, config.throttled)
            }
        }
        304 => match caches.inferred.get(&key).await {
            Some(cached) => (*cached.requests).clone(),
            None => {
                log::warn!(
                    "Got a 304 for {document_uri} but could not find cache entry?!"
                );
                Vec::new()
            }
        },
        _ => Vec::new(),
    }
}

/// Infer the sub-resources a CSS stylesheet references, following the same
/// status/validator decision tree as [`infer_html_resources`], but also
/// maintaining the separate CSS-content cache: a re-parse evicts the old
/// entry first and shares its freshly parsed resource list with any other
/// page load asking for the same CSS URI concurrently.
#[allow(clippy::too_many_arguments)]
pub async fn infer_css_resources(
    caches: &ResourceCaches,
    css_parser: Arc<dyn CssParser>,
    resource_builder: &dyn ResourceRequestBuilder,
    protocol_id: &str,
    css_uri: &Url,
    status_code: u16,
    validator: Option<&str>,
    body: Option<&str>,
    config: &Arc<RequestConfig>,
    filter: Option<&ResourceFilter>,
) -> Vec<HttpRequestDescriptor> {
    let key = InferredResourcesCacheKey::new(protocol_id, css_uri);

    match status_code {
        200 => {
            if let Some(validator) = validator {
                if let Some(cached) =
                    caches.inferred.get_if_validator_matches(&key, validator).await
                {
                    return (*cached.requests).clone();
                }
                let Some(body) = body else { return Vec::new() };
                caches.css_content.invalidate(css_uri.as_str()).await;
                let uri = css_uri.clone();
                let parser = css_parser.clone();
                let body_owned = body.to_string();
                let resources = caches
                    .css_content
                    .get_or_insert_with(css_uri.to_string(), async move {
                        Arc::new(parser.extract_resources(&uri, &body_owned))
                    })
                    .await;
                let requests =
                    build_requests(&resources, resource_builder, filter, config.throttled);
                caches
                    .inferred
                    .insert(
                        key,
                        InferredPageResources {
                            validator: validator.to_string(),
                            requests: Arc::new(requests.clone()),
                        },
                    )
                    .await;
                requests
            } else {
                let Some(body) = body else { return Vec::new() };
                let resources = css_parser.extract_resources(css_uri, body);
                build_requests(&resources, resource_builder, filter, config.throttled)
            }
        }
        304 => match caches.inferred.get(&key).await {
            Some(cached) => (*cached.requests).clone(),
            None => {
                log::warn!("Got a 304 for {css_uri} but could not find cache entry?!");
                Vec::new()
            }
        },
        _ => Vec::new(),
    }
}
