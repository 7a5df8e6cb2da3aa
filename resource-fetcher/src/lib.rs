#![forbid(unsafe_code)]
#![deny(
    missing_docs,
    missing_debug_implementations,
    nonstandard_style,
    unused_qualifications,
    unused_import_braces
)]
//! Discovers and fetches a page's embedded sub-resources under a per-host
//! connection budget, on behalf of a load-testing virtual user.
//!
//! Given a primary HTML response (or a cache hit that stands in for one),
//! this crate infers the images, scripts, stylesheets, and CSS-referenced
//! resources a browser would fetch while rendering it; merges those with
//! any resources the test declared explicitly; and drives their concurrent
//! retrieval through a single per-page-load scheduler that never exceeds a
//! configured number of simultaneous connections to any one host.
//!
//! Two bounded, process-wide caches (backed by [`moka`]) let repeated page
//! loads of the same document skip both HTML/CSS re-parsing and
//! re-inference as long as the origin's `Last-Modified`/`ETag` validator
//! hasn't changed.
//!
//! ## Collaborators
//!
//! This crate does not parse HTML or CSS, and does not submit HTTP
//! requests itself — see [`collaborators`] for the traits a caller
//! implements to wire those in. [`resource-fetcher-reqwest`](https://docs.rs/resource-fetcher-reqwest)
//! provides a ready-made [`collaborators::HttpRequestAction`] backed by
//! [`reqwest`](https://docs.rs/reqwest).
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use resource_fetcher::cache::ResourceCaches;
//! use resource_fetcher::collaborators::Collaborators;
//! use resource_fetcher::factory::{resource_fetcher_for_fetched_page, HttpTx, ProtocolConfig};
//! use resource_fetcher::types::RequestConfig;
//!
//! # async fn run<S: Clone + Send + 'static>(
//! #     collaborators: Collaborators<S>,
//! #     continuation: Arc<dyn resource_fetcher::collaborators::PageLoadContinuation<S>>,
//! #     session: S,
//! # ) -> Result<(), Box<dyn std::error::Error>> {
//! let caches = ResourceCaches::new(1_000, 1_000)?;
//! let protocol = ProtocolConfig {
//!     protocol_id: "default".to_string(),
//!     user_agent: "load-probe/1.0".to_string(),
//!     infer_html_resources: true,
//!     max_connections_per_host: 6,
//! };
//! let tx = HttpTx { config: Arc::new(RequestConfig::default()), continuation };
//! let primary_uri = url::Url::parse("https://example.com/")?;
//! let headers = http::HeaderMap::new();
//!
//! resource_fetcher_for_fetched_page(
//!     &caches,
//!     &collaborators,
//!     &protocol,
//!     &primary_uri,
//!     Some(200),
//!     &headers,
//!     Some(b"<html></html>".as_slice()),
//!     true,
//!     &[],
//!     None,
//!     tx,
//!     &session,
//! )
//! .await;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod explicit;
pub mod factory;
pub mod headers;
pub mod inference;
pub mod scheduler;
pub mod types;
pub mod url_util;

pub use error::{FetchError, Result};
pub use scheduler::{SchedulerEvent, SchedulerHandle, SessionUpdate};
