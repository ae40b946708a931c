//! Error types for the session layer.

/// Errors from the durable key/value layer behind the session.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Reading or writing the backing file failed.
    #[error("session store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The backing file exists but is not a JSON object of strings.
    #[error("session store is corrupt: {0}")]
    Corrupt(#[source] serde_json::Error),
}

/// Errors that can occur during session management.
///
/// Expiry is deliberately absent: a lapsed session shows up as an
/// [`AuthState::Unauthenticated`](crate::AuthState) transition with
/// [`SignOutReason::Expired`](crate::SignOutReason), never as an error.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The credential verifier rejected the login. The message comes from
    /// the backend and is meant to be shown to the user.
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    /// The credential verifier could not be reached (network failure,
    /// unreadable response). No login happened.
    #[error("credential verifier unavailable: {0}")]
    VerifierUnavailable(String),

    /// `login` was called with a zero time-to-live.
    #[error("session time-to-live must be greater than zero")]
    InvalidTtl,
}
