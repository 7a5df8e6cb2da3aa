#![forbid(unsafe_code)]
#![deny(
    missing_docs,
    missing_debug_implementations,
    nonstandard_style,
    unused_qualifications,
    unused_import_braces
)]
//! A [`reqwest`](https://docs.rs/reqwest)-backed
//! [`HttpRequestAction`](resource_fetcher::collaborators::HttpRequestAction)
//! for [`resource-fetcher`](https://docs.rs/resource-fetcher): submits a
//! sub-resource request on a spawned task and reports its outcome back to
//! the page load's scheduler, without ever blocking the caller.

pub mod error;

use std::fmt;
use std::marker::PhantomData;

use reqwest::Client;
use resource_fetcher::collaborators::HttpRequestAction;
use resource_fetcher::headers::last_modified_or_etag;
use resource_fetcher::scheduler::SchedulerHandle;
use resource_fetcher::types::{FetchOutcome, HttpRequestDescriptor, ResourceKind};

pub use error::{ActionError, Result};

/// Submits sub-resource requests through a shared [`reqwest::Client`].
///
/// `S` is the session type threaded through the surrounding page load;
/// this collaborator never inspects or mutates it, only forwards it back
/// unchanged alongside the fetch outcome.
pub struct ReqwestHttpAction<S> {
    client: Client,
    _session: PhantomData<fn() -> S>,
}

impl<S> fmt::Debug for ReqwestHttpAction<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReqwestHttpAction").finish_non_exhaustive()
    }
}

impl<S> ReqwestHttpAction<S> {
    /// Wrap an already-configured client.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client, _session: PhantomData }
    }

    /// Build a client with reqwest's defaults and wrap it.
    pub fn with_default_client() -> Result<Self> {
        Ok(Self::new(Client::builder().build()?))
    }
}

impl<S> HttpRequestAction<S> for ReqwestHttpAction<S>
where
    S: Clone + Send + 'static,
{
    fn start_http_transaction(
        &self,
        descriptor: HttpRequestDescriptor,
        _session: S,
        reply_to: SchedulerHandle<S>,
    ) {
        let client = self.client.clone();
        let uri = descriptor.uri.clone();
        let is_css = descriptor.kind == ResourceKind::Css;

        tokio::spawn(async move {
            match client.get(descriptor.uri).send().await {
                Ok(response) => {
                    let status = response.status();
                    let outcome =
                        if status.is_success() { FetchOutcome::Ok } else { FetchOutcome::Ko };
                    if is_css {
                        let status_code = Some(status.as_u16());
                        let validator = last_modified_or_etag(response.headers());
                        let body = if outcome == FetchOutcome::Ok {
                            response.text().await.ok()
                        } else {
                            None
                        };
                        let _ = reply_to.notify_css(
                            uri,
                            outcome,
                            Box::new(|session| session),
                            status_code,
                            validator,
                            body,
                        );
                    } else {
                        let _ = reply_to.notify_regular(uri, outcome, Box::new(|session| session));
                    }
                }
                Err(err) => {
                    log::warn!("sub-resource fetch failed for {uri}: {err}");
                    if is_css {
                        let _ = reply_to.notify_css(
                            uri,
                            FetchOutcome::Ko,
                            Box::new(|session| session),
                            None,
                            None,
                            None,
                        );
                    } else {
                        let _ = reply_to.notify_regular(
                            uri,
                            FetchOutcome::Ko,
                            Box::new(|session| session),
                        );
                    }
                }
            }
        });
    }
}
