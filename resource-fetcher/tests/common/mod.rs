//! Shared fixtures for the end-to-end scenario tests: a minimal session
//! type, and hand-written mocks for every collaborator trait, recording
//! what they were asked to do instead of doing real parsing or network
//! I/O.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use resource_fetcher::collaborators::{
    CacheHandling, Collaborators, CssParser, HtmlParser, HttpRequestAction, HttpRequestDef,
    PageLoadContinuation, RequestReporter, ResourceRequestBuilder, SessionStats,
};
use resource_fetcher::scheduler::SchedulerHandle;
use resource_fetcher::types::{EmbeddedResource, FetchOutcome, HttpRequestDescriptor, RequestConfig, ResourceKind};
use url::Url;

/// The virtual-user session type used throughout these tests: an expiry
/// map standing in for real cache-control bookkeeping, and the one slot a
/// page load's aggregate result lands in at termination.
#[derive(Clone, Debug, Default)]
pub struct TestSession {
    pub expirations: HashMap<String, Instant>,
    pub last_group_result: Option<(Duration, u64, u64)>,
}

/// A request a mock [`HttpRequestAction`] was asked to submit, recorded
/// instead of actually dispatched so the test can decide when and how it
/// completes.
pub struct RecordedDispatch {
    pub uri: Url,
    pub session: TestSession,
    pub reply_to: SchedulerHandle<TestSession>,
}

/// Records every dispatch instead of submitting it, handing control of
/// completion timing to the test.
#[derive(Default)]
pub struct RecordingHttpAction {
    pub dispatched: Arc<Mutex<Vec<RecordedDispatch>>>,
}

impl HttpRequestAction<TestSession> for RecordingHttpAction {
    fn start_http_transaction(
        &self,
        descriptor: HttpRequestDescriptor,
        session: TestSession,
        reply_to: SchedulerHandle<TestSession>,
    ) {
        self.dispatched.lock().unwrap().push(RecordedDispatch {
            uri: descriptor.uri,
            session,
            reply_to,
        });
    }
}

/// Returns a fixed list of embedded resources per document URI, standing
/// in for real HTML parsing. Counts how many times it was actually
/// invoked, so tests can assert a cache hit skipped parsing entirely.
#[derive(Default)]
pub struct MapHtmlParser {
    pub by_uri: HashMap<String, Vec<EmbeddedResource>>,
    pub calls: Arc<Mutex<u32>>,
}

impl HtmlParser for MapHtmlParser {
    fn get_embedded_resources(
        &self,
        document_uri: &Url,
        _body: &[u8],
        _user_agent: &str,
    ) -> Vec<EmbeddedResource> {
        *self.calls.lock().unwrap() += 1;
        self.by_uri.get(document_uri.as_str()).cloned().unwrap_or_default()
    }
}

/// Returns a fixed list of embedded resources per stylesheet URI, standing
/// in for real CSS parsing.
#[derive(Default)]
pub struct MapCssParser {
    pub by_uri: HashMap<String, Vec<EmbeddedResource>>,
}

impl CssParser for MapCssParser {
    fn extract_resources(&self, document_uri: &Url, _text: &str) -> Vec<EmbeddedResource> {
        self.by_uri.get(document_uri.as_str()).cloned().unwrap_or_default()
    }
}

/// Converts every embedded resource into a request descriptor with default
/// config, never failing.
pub struct InfallibleResourceBuilder;

impl ResourceRequestBuilder for InfallibleResourceBuilder {
    fn to_request(
        &self,
        resource: &EmbeddedResource,
        throttled: bool,
    ) -> Result<HttpRequestDescriptor, String> {
        Ok(HttpRequestDescriptor {
            uri: resource.uri.clone(),
            kind: resource.kind,
            config: Arc::new(RequestConfig { checks: Vec::new(), throttled }),
        })
    }
}

/// Reads and clears per-URI expiry from the session's expiry map.
pub struct SessionExpiryCacheHandling;

impl CacheHandling<TestSession> for SessionExpiryCacheHandling {
    fn get_expire(
        &self,
        _protocol_id: &str,
        session: &TestSession,
        uri: &Url,
    ) -> Option<Instant> {
        session.expirations.get(uri.as_str()).copied()
    }

    fn clear_expire(&self, mut session: TestSession, uri: &Url) -> TestSession {
        session.expirations.remove(uri.as_str());
        session
    }
}

/// Stashes the aggregate timing/count result into the session at
/// termination.
pub struct RecordingSessionStats;

impl SessionStats<TestSession> for RecordingSessionStats {
    fn log_group_async_requests(
        &self,
        mut session: TestSession,
        elapsed: Duration,
        ok_count: u64,
        ko_count: u64,
    ) -> TestSession {
        session.last_group_result = Some((elapsed, ok_count, ko_count));
        session
    }
}

/// Records every unbuildable explicit request reported to it.
#[derive(Default)]
pub struct RecordingReporter {
    pub reports: Arc<Mutex<Vec<(String, String)>>>,
}

impl RequestReporter<TestSession> for RecordingReporter {
    fn report_unbuildable_request(&self, name: &str, _session: &TestSession, message: &str) {
        self.reports.lock().unwrap().push((name.to_string(), message.to_string()));
    }
}

/// Captures the final session handed to the continuation.
#[derive(Default)]
pub struct CapturingContinuation {
    pub result: Arc<Mutex<Option<TestSession>>>,
}

impl PageLoadContinuation<TestSession> for CapturingContinuation {
    fn resume(&self, session: TestSession) {
        *self.result.lock().unwrap() = Some(session);
    }
}

/// An explicit request template that always resolves to a fixed name and
/// builds a fixed descriptor, for exercising precedence over inference.
pub struct FixedRequestDef {
    pub name: String,
    pub uri: Url,
    pub throttled: bool,
}

impl HttpRequestDef<TestSession> for FixedRequestDef {
    fn request_name(&self, _session: &TestSession) -> Result<String, String> {
        Ok(self.name.clone())
    }

    fn build(&self, _name: &str, _session: &TestSession) -> Result<HttpRequestDescriptor, String> {
        Ok(HttpRequestDescriptor {
            uri: self.uri.clone(),
            kind: ResourceKind::Regular,
            config: Arc::new(RequestConfig { checks: Vec::new(), throttled: self.throttled }),
        })
    }
}

/// Everything a test gets back when it builds a fresh set of mock
/// collaborators: the bundle itself, plus handles onto the state each mock
/// records so the test can make assertions about it.
pub struct Fixture {
    pub collaborators: Collaborators<TestSession>,
    pub dispatched: Arc<Mutex<Vec<RecordedDispatch>>>,
    pub reports: Arc<Mutex<Vec<(String, String)>>>,
    pub html_parse_calls: Arc<Mutex<u32>>,
}

/// Bundles the mocks above into a ready-to-use [`Collaborators`].
pub fn collaborators(
    html: HashMap<String, Vec<EmbeddedResource>>,
    css: HashMap<String, Vec<EmbeddedResource>>,
) -> Fixture {
    let dispatched = Arc::new(Mutex::new(Vec::new()));
    let reports = Arc::new(Mutex::new(Vec::new()));
    let html_parse_calls = Arc::new(Mutex::new(0));
    let collaborators = Collaborators {
        html_parser: Arc::new(MapHtmlParser { by_uri: html, calls: html_parse_calls.clone() }),
        css_parser: Arc::new(MapCssParser { by_uri: css }),
        resource_builder: Arc::new(InfallibleResourceBuilder),
        cache_handling: Arc::new(SessionExpiryCacheHandling),
        session_stats: Arc::new(RecordingSessionStats),
        http_action: Arc::new(RecordingHttpAction { dispatched: dispatched.clone() }),
        request_reporter: Arc::new(RecordingReporter { reports: reports.clone() }),
    };
    Fixture { collaborators, dispatched, reports, html_parse_calls }
}

/// Poll `dispatched` until it holds at least `count` entries, or panic
/// after a short timeout. The scheduler under test runs on a spawned task,
/// so a test must yield back to the runtime for its dispatches to land.
pub async fn wait_for_dispatch_count(
    dispatched: &Arc<Mutex<Vec<RecordedDispatch>>>,
    count: usize,
) {
    for _ in 0..200 {
        if dispatched.lock().unwrap().len() >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("timed out waiting for {count} dispatch(es), got {}", dispatched.lock().unwrap().len());
}

/// Poll `result` until the continuation has fired, or panic after a short
/// timeout.
pub async fn wait_for_termination(
    result: &Arc<Mutex<Option<TestSession>>>,
) -> TestSession {
    for _ in 0..200 {
        if let Some(session) = result.lock().unwrap().clone() {
            return session;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("timed out waiting for page load to terminate");
}

/// Complete a recorded dispatch as a non-CSS resource.
pub fn complete_regular(dispatch: &RecordedDispatch, outcome: FetchOutcome) {
    dispatch
        .reply_to
        .notify_regular(dispatch.uri.clone(), outcome, Box::new(|session| session))
        .expect("scheduler still running");
}

/// Complete a recorded dispatch as a CSS resource, optionally carrying a
/// response that can expand the fetch graph.
pub fn complete_css(
    dispatch: &RecordedDispatch,
    outcome: FetchOutcome,
    status_code: Option<u16>,
    validator: Option<String>,
    body: Option<String>,
) {
    dispatch
        .reply_to
        .notify_css(dispatch.uri.clone(), outcome, Box::new(|session| session), status_code, validator, body)
        .expect("scheduler still running");
}
