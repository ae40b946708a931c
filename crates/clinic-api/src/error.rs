//! Error types for the API layer.

/// Errors from a call to the clinic backend.
///
/// Every variant renders as a message fit for display next to the view
/// that made the call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// The request never produced a response: DNS, connect, timeout,
    /// connection reset while reading the body.
    #[error("network error: {0}")]
    Transport(String),

    /// The backend answered with a non-2xx status other than 401/403.
    /// `message` is the backend's own explanation when it sent one.
    #[error("{message} (HTTP {status})")]
    Server { status: u16, message: String },

    /// No token was available, or the backend answered 401/403.
    /// Callers should sign the user out and send them to the login page.
    #[error("Not authenticated")]
    Unauthenticated,

    /// A 2xx response whose body did not have the expected shape.
    #[error("unexpected response from server: {0}")]
    Decode(String),
}

/// Coarse classification used by views to pick an icon or a next step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Could not reach the backend.
    Transport,
    /// The backend reached, but it failed or answered nonsense.
    Server,
    /// Sign in again.
    Unauthenticated,
}

impl ApiError {
    /// Which of the three failure families this belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport(_) => ErrorKind::Transport,
            Self::Server { .. } | Self::Decode(_) => ErrorKind::Server,
            Self::Unauthenticated => ErrorKind::Unauthenticated,
        }
    }

    /// Returns `true` if the caller should log out.
    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, Self::Unauthenticated)
    }
}
