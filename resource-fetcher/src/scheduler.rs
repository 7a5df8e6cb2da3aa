//! The per-host admission scheduler: a single-threaded actor that owns all
//! mutable state for one page load — the session, what's already been
//! seen, the per-host token pool and backlog, and the pending count that
//! decides when the page load is done.
//!
//! Every message handler here runs to completion with no `.await` that
//! could interleave with another handler; the only suspension point is
//! between messages, at the inbox's `recv().await`. That is what lets the
//! rest of the state go unguarded by a lock.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use url::Url;

use crate::cache::ResourceCaches;
use crate::collaborators::{Collaborators, PageLoadContinuation};
use crate::error::{FetchError, Result};
use crate::inference::{self, ResourceFilter};
use crate::types::{FetchOutcome, HttpRequestDescriptor, RequestConfig};

/// A pending mutation to apply to the session, carried by a completion
/// event. Boxed so every collaborator can build one without the scheduler
/// knowing anything about the session's shape.
pub type SessionUpdate<S> = Box<dyn FnOnce(S) -> S + Send>;

/// One message a scheduler's inbox accepts.
pub enum SchedulerEvent<S> {
    /// A non-CSS sub-resource completed.
    Regular {
        /// The URI that was fetched.
        uri: Url,
        /// Whether the fetch succeeded.
        outcome: FetchOutcome,
        /// The session mutation this completion carries.
        update: SessionUpdate<S>,
    },
    /// A CSS sub-resource completed; its body, if fetched, may expand the
    /// set of resources this page load still needs.
    Css {
        /// The URI that was fetched.
        uri: Url,
        /// Whether the fetch succeeded.
        outcome: FetchOutcome,
        /// The session mutation this completion carries.
        update: SessionUpdate<S>,
        /// The response status code, if this was an actual network
        /// completion rather than a cached-hit replay.
        status_code: Option<u16>,
        /// The response's validator, if any.
        validator: Option<String>,
        /// The response body, if the fetch succeeded and returned one.
        body: Option<String>,
    },
}

impl<S> fmt::Debug for SchedulerEvent<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Regular { uri, outcome, .. } => f
                .debug_struct("Regular")
                .field("uri", uri)
                .field("outcome", outcome)
                .finish_non_exhaustive(),
            Self::Css { uri, outcome, status_code, .. } => f
                .debug_struct("Css")
                .field("uri", uri)
                .field("outcome", outcome)
                .field("status_code", status_code)
                .finish_non_exhaustive(),
        }
    }
}

/// A cloneable handle to a running scheduler's inbox. Collaborators hold
/// one of these to report completions; the scheduler holds one of its own
/// to send itself synthetic cached-hit and CSS-expansion events.
pub struct SchedulerHandle<S> {
    sender: mpsc::UnboundedSender<SchedulerEvent<S>>,
}

impl<S> Clone for SchedulerHandle<S> {
    fn clone(&self) -> Self {
        Self { sender: self.sender.clone() }
    }
}

impl<S> fmt::Debug for SchedulerHandle<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchedulerHandle").finish_non_exhaustive()
    }
}

impl<S> SchedulerHandle<S> {
    /// Report the completion of a non-CSS sub-resource.
    pub fn notify_regular(
        &self,
        uri: Url,
        outcome: FetchOutcome,
        update: SessionUpdate<S>,
    ) -> Result<()> {
        self.sender
            .send(SchedulerEvent::Regular { uri, outcome, update })
            .map_err(|_| FetchError::SchedulerGone)
    }

    /// Report the completion of a CSS sub-resource.
    pub fn notify_css(
        &self,
        uri: Url,
        outcome: FetchOutcome,
        update: SessionUpdate<S>,
        status_code: Option<u16>,
        validator: Option<String>,
        body: Option<String>,
    ) -> Result<()> {
        self.sender
            .send(SchedulerEvent::Css { uri, outcome, update, status_code, validator, body })
            .map_err(|_| FetchError::SchedulerGone)
    }
}

/// Owns one page load's worth of admission-scheduling state. Constructed
/// via [`Scheduler::spawn`]; there is no public way to construct one
/// without immediately driving it, since an idle scheduler with pending
/// resources and no task polling its inbox would simply hang.
struct Scheduler<S> {
    session: S,
    protocol_id: String,
    default_config: Arc<RequestConfig>,
    filter: Option<Arc<ResourceFilter>>,
    already_seen: HashSet<String>,
    buffered_by_host: HashMap<String, VecDeque<HttpRequestDescriptor>>,
    available_tokens_by_host: HashMap<String, u32>,
    max_connections_per_host: u32,
    pending: u64,
    ok_count: u64,
    ko_count: u64,
    start: Instant,
    collaborators: Collaborators<S>,
    caches: Arc<ResourceCaches>,
    continuation: Arc<dyn PageLoadContinuation<S>>,
    handle: SchedulerHandle<S>,
}

/// Parameters needed to start a page load's admission scheduler, bundled
/// so [`Scheduler::spawn`] takes one argument instead of a dozen.
pub struct SchedulerConfig<S> {
    /// Collaborators used to infer, build, and dispatch sub-resources.
    pub collaborators: Collaborators<S>,
    /// The process-wide inference caches.
    pub caches: Arc<ResourceCaches>,
    /// Identity of the protocol configuration driving this page load.
    pub protocol_id: String,
    /// Configuration applied to resources this scheduler discovers itself
    /// (CSS-referenced sub-resources), as opposed to ones a caller already
    /// built with their own configuration.
    pub default_config: Arc<RequestConfig>,
    /// An optional predicate restricting which inferred resources are kept.
    pub filter: Option<Arc<ResourceFilter>>,
    /// Maximum number of concurrent in-flight fetches per origin host.
    pub max_connections_per_host: u32,
    /// Notified exactly once, when this page load has no more pending
    /// sub-resources.
    pub continuation: Arc<dyn PageLoadContinuation<S>>,
}

impl<S> fmt::Debug for SchedulerConfig<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchedulerConfig")
            .field("protocol_id", &self.protocol_id)
            .field("max_connections_per_host", &self.max_connections_per_host)
            .finish_non_exhaustive()
    }
}

impl<S> Scheduler<S>
where
    S: Clone + Send + 'static,
{
    /// Start a scheduler for one page load, feeding it `initial_resources`
    /// before it begins processing completion events. Returns a handle
    /// collaborators can use to report completions; nothing is returned
    /// for the terminal result, since that is delivered to
    /// `config.continuation` instead.
    pub fn spawn(
        config: SchedulerConfig<S>,
        session: S,
        initial_resources: Vec<HttpRequestDescriptor>,
    ) -> SchedulerHandle<S> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let handle = SchedulerHandle { sender };
        let mut scheduler = Scheduler {
            session,
            protocol_id: config.protocol_id,
            default_config: config.default_config,
            filter: config.filter,
            already_seen: HashSet::new(),
            buffered_by_host: HashMap::new(),
            available_tokens_by_host: HashMap::new(),
            max_connections_per_host: config.max_connections_per_host,
            pending: 0,
            ok_count: 0,
            ko_count: 0,
            start: Instant::now(),
            collaborators: config.collaborators,
            caches: config.caches,
            continuation: config.continuation,
            handle: handle.clone(),
        };
        let out_handle = handle.clone();
        tokio::spawn(async move {
            log::debug!(
                "page-resource scheduler started with {} initial resources",
                initial_resources.len()
            );
            scheduler.fetch_or_buffer_resources(initial_resources).await;
            scheduler.run(receiver).await;
        });
        out_handle
    }

    async fn run(mut self, mut receiver: mpsc::UnboundedReceiver<SchedulerEvent<S>>) {
        while let Some(event) = receiver.recv().await {
            let terminated = match event {
                SchedulerEvent::Regular { uri, outcome, update } => {
                    self.resource_fetched(uri, outcome, update).await
                }
                SchedulerEvent::Css { uri, outcome, update, status_code, validator, body } => {
                    self.css_fetched(&uri, outcome, status_code, validator, body).await;
                    self.resource_fetched(uri, outcome, update).await
                }
            };
            if terminated {
                break;
            }
        }
    }

    /// Admit `resources`, partitioning into cached hits (replayed
    /// synthetically) and real fetches (dispatched immediately or buffered
    /// per host token availability).
    async fn fetch_or_buffer_resources(&mut self, resources: Vec<HttpRequestDescriptor>) {
        if resources.is_empty() {
            return;
        }
        for resource in &resources {
            self.already_seen.insert(resource.uri.to_string());
        }
        self.pending += resources.len() as u64;

        let now = Instant::now();
        let mut cached_hits = Vec::new();
        let mut non_cached = Vec::new();
        for resource in resources {
            match self.collaborators.cache_handling.get_expire(
                &self.protocol_id,
                &self.session,
                &resource.uri,
            ) {
                None => non_cached.push(resource),
                Some(expiry) if expiry <= now => {
                    self.session = self
                        .collaborators
                        .cache_handling
                        .clear_expire(self.session.clone(), &resource.uri);
                    non_cached.push(resource);
                }
                Some(_) => cached_hits.push(resource),
            }
        }

        for resource in &cached_hits {
            self.handle_cached_resource(resource).await;
        }

        let mut by_host: HashMap<Option<String>, Vec<HttpRequestDescriptor>> = HashMap::new();
        for resource in non_cached {
            by_host.entry(resource.host()).or_default().push(resource);
        }

        for (host, group) in by_host {
            let Some(host) = host else {
                // No host (e.g. a `data:` URI): nothing to admission-schedule.
                for resource in group {
                    self.dispatch(resource).await;
                }
                continue;
            };
            let tokens = *self
                .available_tokens_by_host
                .entry(host.clone())
                .or_insert(self.max_connections_per_host);
            let immediate_count = (tokens as usize).min(group.len());
            let mut iter = group.into_iter();
            let immediate: Vec<_> = (&mut iter).take(immediate_count).collect();
            let buffered: VecDeque<_> = iter.collect();

            for resource in immediate {
                self.dispatch(resource).await;
            }
            self.available_tokens_by_host.insert(host.clone(), tokens - immediate_count as u32);
            if !buffered.is_empty() {
                self.buffered_by_host.entry(host).or_default().extend(buffered);
            }
        }
    }

    /// Derive this request's dispatch from the scheduler's current session
    /// snapshot and hand it to the HTTP collaborator.
    async fn dispatch(&self, resource: HttpRequestDescriptor) {
        self.collaborators.http_action.start_http_transaction(
            resource,
            self.session.clone(),
            self.handle.clone(),
        );
    }

    /// Synthesize a completion event for a resource whose own cache entry
    /// is still fresh, without ever calling the HTTP collaborator.
    async fn handle_cached_resource(&self, resource: &HttpRequestDescriptor) {
        let identity: SessionUpdate<S> = Box::new(|session| session);
        let is_css = self.caches.css_content.get(resource.uri.as_str()).await.is_some();
        let result = if is_css {
            self.handle.notify_css(
                resource.uri.clone(),
                FetchOutcome::Ok,
                identity,
                None,
                None,
                None,
            )
        } else {
            self.handle.notify_regular(resource.uri.clone(), FetchOutcome::Ok, identity)
        };
        if let Err(err) = result {
            log::error!("could not replay cached resource {}: {err}", resource.uri);
        }
    }

    /// Account a completion, and terminate if it was the last one pending;
    /// otherwise release one admission token for its host. Returns `true`
    /// if the page load just terminated.
    async fn resource_fetched(
        &mut self,
        uri: Url,
        outcome: FetchOutcome,
        update: SessionUpdate<S>,
    ) -> bool {
        self.session = update(self.session.clone());
        self.pending -= 1;
        match outcome {
            FetchOutcome::Ok => self.ok_count += 1,
            FetchOutcome::Ko => self.ko_count += 1,
        }

        if self.pending == 0 {
            let elapsed = self.start.elapsed();
            let final_session = self.collaborators.session_stats.log_group_async_requests(
                self.session.clone(),
                elapsed,
                self.ok_count,
                self.ko_count,
            );
            log::debug!(
                "page-resource scheduler finished in {elapsed:?}: ok={}, ko={}",
                self.ok_count,
                self.ko_count
            );
            self.continuation.resume(final_session);
            return true;
        }

        if let Some(host) = crate::url_util::host_key(&uri) {
            self.release_token(&host).await;
        }
        false
    }

    /// Release one admission token for `host`, dispatching or replaying
    /// its buffered backlog as needed. Written as a loop rather than tail
    /// recursion so a long run of consecutive cached buffered resources
    /// cannot grow the stack.
    async fn release_token(&mut self, host: &str) {
        loop {
            let next = match self.buffered_by_host.get_mut(host) {
                Some(queue) => queue.pop_front(),
                None => None,
            };
            let Some(next) = next else {
                *self.available_tokens_by_host.entry(host.to_string()).or_insert(0) += 1;
                return;
            };

            match self.collaborators.cache_handling.get_expire(
                &self.protocol_id,
                &self.session,
                &next.uri,
            ) {
                None => {
                    self.dispatch(next).await;
                    return;
                }
                Some(expiry) if expiry <= Instant::now() => {
                    self.session = self
                        .collaborators
                        .cache_handling
                        .clear_expire(self.session.clone(), &next.uri);
                    self.dispatch(next).await;
                    return;
                }
                Some(_) => {
                    self.handle_cached_resource(&next).await;
                    // Still holding the token: keep draining the backlog.
                }
            }
        }
    }

    /// If a CSS fetch succeeded, infer its sub-resources and admit the
    /// ones not already seen this page load. Runs before
    /// [`Self::resource_fetched`] in the same event so the new resources
    /// are counted as pending before the CSS resource's own completion is
    /// subtracted — otherwise `pending` could transiently hit zero and the
    /// scheduler would terminate mid-expansion.
    async fn css_fetched(
        &mut self,
        uri: &Url,
        outcome: FetchOutcome,
        status_code: Option<u16>,
        validator: Option<String>,
        body: Option<String>,
    ) {
        if outcome != FetchOutcome::Ok {
            return;
        }
        let Some(status_code) = status_code else {
            // A cached-hit replay carries no status code; it cannot expand
            // the graph further than what the CSS cache already recorded.
            return;
        };

        let requests = inference::infer_css_resources(
            &self.caches,
            self.collaborators.css_parser.clone(),
            self.collaborators.resource_builder.as_ref(),
            &self.protocol_id,
            uri,
            status_code,
            validator.as_deref(),
            body.as_deref(),
            &self.default_config,
            self.filter.as_deref(),
        )
        .await;

        let fresh: Vec<_> = requests
            .into_iter()
            .filter(|r| !self.already_seen.contains(r.uri.as_str()))
            .collect();
        self.fetch_or_buffer_resources(fresh).await;
    }
}

/// Start a scheduler for one page load. The only public entry point onto
/// [`Scheduler`]; callers never see the actor type itself, only the handle
/// used to report completions into it.
pub fn spawn_scheduler<S>(
    config: SchedulerConfig<S>,
    session: S,
    initial_resources: Vec<HttpRequestDescriptor>,
) -> SchedulerHandle<S>
where
    S: Clone + Send + 'static,
{
    Scheduler::spawn(config, session, initial_resources)
}
