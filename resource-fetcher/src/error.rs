use thiserror::Error;

/// A `Result` typedef to use with the [`FetchError`] type.
pub type Result<T> = std::result::Result<T, FetchError>;

/// Errors this crate can raise itself.
///
/// Per-resource failures (an unbuildable inferred resource, an unresolvable
/// explicit request name, a sub-resource that came back non-`200`) are by
/// design *not* represented here: they are logged and folded into the
/// `ok`/`ko` counters a page load reports at termination, never propagated
/// as a `Result`. This enum only covers failures that prevent a scheduler
/// from being constructed or driven at all.
#[derive(Error, Debug)]
pub enum FetchError {
    /// A cache was configured with a capacity of zero, which `moka` accepts
    /// but which can never hold an entry.
    #[error("cache capacity must be greater than zero")]
    ZeroCapacity,
    /// The scheduler's inbox was dropped while a collaborator still held a
    /// handle to send completion events into it.
    #[error("scheduler for this page load is no longer running")]
    SchedulerGone,
    /// There was an error parsing a URL.
    #[error(transparent)]
    InvalidUrl(#[from] url::ParseError),
}
