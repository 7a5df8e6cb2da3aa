use thiserror::Error;

/// A `Result` typedef to use with the [`ActionError`] type.
pub type Result<T> = std::result::Result<T, ActionError>;

/// Errors constructing a [`crate::ReqwestHttpAction`]. Failures of an
/// individual sub-resource fetch never surface here: they become a `Ko`
/// outcome reported back to the scheduler, the same as any other
/// non-success response.
#[derive(Error, Debug)]
pub enum ActionError {
    /// The underlying `reqwest::Client` could not be built.
    #[error(transparent)]
    ClientBuild(#[from] reqwest::Error),
}
