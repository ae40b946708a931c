//! Hook for verifying credentials against the backend.
//!
//! The session layer does not check passwords itself; the backend owns
//! that. It only needs something that turns [`Credentials`] into a
//! [`Grant`] (identity + token + time-to-live) or a rejection. That
//! something is a [`CredentialVerifier`]:
//! - the HTTP client in `clinic-api` in production
//! - a canned verifier in tests

use crate::{Credentials, Grant, SessionError};

/// Verifies a user's credentials and issues a token.
///
/// `Send + Sync + 'static` so a verifier can be shared with spawned tasks.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use clinic_session::{CredentialVerifier, Credentials, Grant, Identity, SessionError};
///
/// /// Accepts one hard-coded account. Only for demos.
/// struct DemoVerifier;
///
/// impl CredentialVerifier for DemoVerifier {
///     async fn verify(&self, credentials: &Credentials) -> Result<Grant, SessionError> {
///         if credentials.password != "demo" {
///             return Err(SessionError::InvalidCredentials("wrong password".into()));
///         }
///         Ok(Grant {
///             identity: Identity::with_role("Admin"),
///             token: "demo-token".into(),
///             ttl: Duration::from_secs(3600),
///         })
///     }
/// }
/// ```
pub trait CredentialVerifier: Send + Sync + 'static {
    /// Checks the credentials.
    ///
    /// # Returns
    /// - `Ok(Grant)`: accepted; the caller should log in with it
    /// - `Err(SessionError::InvalidCredentials)`: rejected, with the
    ///   backend's message
    /// - `Err(SessionError::VerifierUnavailable)`: the backend could not
    ///   be asked
    fn verify(
        &self,
        credentials: &Credentials,
    ) -> impl std::future::Future<Output = Result<Grant, SessionError>> + Send;
}
