//! Unified error type for the clinic console.

use clinic_api::ApiError;
use clinic_session::{SessionError, StoreError};

/// Top-level error wrapping every crate-specific error.
///
/// `#[from]` on each variant lets `?` convert sub-crate errors.
#[derive(Debug, thiserror::Error)]
pub enum ClinicError {
    /// Signing in failed (bad credentials, backend down, bad TTL).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The session file could not be opened.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// An authenticated REST call failed.
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl ClinicError {
    /// Returns `true` if the backend no longer accepts the session.
    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, Self::Api(e) if e.is_unauthenticated())
    }
}
