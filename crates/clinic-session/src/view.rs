//! Read-only projection of the session state.
//!
//! Views, the access gate and data fetchers need to *read* the session
//! and react when it changes, but must never mutate it. Instead of
//! handing them the [`SessionManager`](crate::SessionManager) itself,
//! the manager gives out [`SessionView`]s: cheap clones of a
//! `tokio::sync::watch` receiver.

use tokio::sync::watch;

use crate::{AuthState, Identity};

/// A read-only, cloneable handle on the current [`AuthState`].
#[derive(Debug, Clone)]
pub struct SessionView {
    rx: watch::Receiver<AuthState>,
}

impl SessionView {
    pub(crate) fn new(rx: watch::Receiver<AuthState>) -> Self {
        Self { rx }
    }

    /// A view pinned to one state, with no manager behind it.
    ///
    /// Useful for rendering (and testing) a gate decision for a known
    /// state. [`changed`](Self::changed) on such a view returns `None`.
    pub fn fixed(state: AuthState) -> Self {
        let (_tx, rx) = watch::channel(state);
        Self { rx }
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> AuthState {
        self.rx.borrow().clone()
    }

    /// Runs `f` against the current state without cloning it.
    pub fn with_state<R>(&self, f: impl FnOnce(&AuthState) -> R) -> R {
        f(&self.rx.borrow())
    }

    /// The current bearer token, if a session is active.
    pub fn token(&self) -> Option<String> {
        self.with_state(|s| s.token().map(str::to_owned))
    }

    /// The current identity, if a session is active.
    pub fn identity(&self) -> Option<Identity> {
        self.with_state(|s| s.identity().cloned())
    }

    /// Returns `true` once the manager has restored persisted state.
    pub fn is_initialized(&self) -> bool {
        self.with_state(AuthState::is_initialized)
    }

    /// Waits for the next state change and returns the new state.
    ///
    /// Returns `None` once the session manager has been dropped.
    pub async fn changed(&mut self) -> Option<AuthState> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Waits until the manager has left `Uninitialized`.
    ///
    /// If the manager is dropped first, returns whatever state was last
    /// published.
    pub async fn wait_initialized(&mut self) -> AuthState {
        let settled = self
            .rx
            .wait_for(AuthState::is_initialized)
            .await
            .map(|state| state.clone());
        settled.unwrap_or_else(|_| self.state())
    }
}
