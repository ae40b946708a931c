//! The session manager: single source of truth for who is signed in.
//!
//! It is responsible for:
//! - Restoring a persisted session at start-up (and purging a lapsed one)
//! - Logging in and out, mirroring every change into the [`SessionStore`]
//! - Running the one expiry timer that signs the user out on time
//! - Publishing [`AuthState`] changes to [`SessionView`]s
//!
//! # Concurrency note
//!
//! Every transition happens inside one short critical section on a
//! `std::sync::Mutex` that is never held across an `.await`. The expiry
//! timer is a Tokio task; replacing it both aborts the old task and bumps
//! a timer epoch, so a timer that already woke up but lost the race for
//! the lock cannot expire the newer session.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use chrono::TimeDelta;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::store::{clear_session, load_session, save_session, Persisted};
use crate::{
    AuthState, Clock, CredentialVerifier, Credentials, Identity, Session,
    SessionError, SessionStore, SessionView, SignOutReason, SystemClock,
};

/// Manages the client's session.
///
/// Cheap to clone: every clone is a handle on the same state.
///
/// ## Lifecycle
///
/// ```text
/// new() ──→ restore() ──→ login() ──→ logout() / expiry timer
///  │            │             │                │
///  ▼            ▼             ▼                ▼
/// [Uninitialized] [Unauthenticated|Authenticated] [Authenticated] [Unauthenticated]
/// ```
///
/// `login` and `restore` start the expiry timer, so they must be called
/// from within a Tokio runtime.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

struct Inner {
    store: Box<dyn SessionStore>,
    clock: Box<dyn Clock>,
    core: Mutex<Core>,
    /// Holds the published state. Written only while `core` is locked.
    state: watch::Sender<AuthState>,
}

/// Mutable bookkeeping guarded by the manager's lock.
struct Core {
    /// The pending expiry timer, if a session is active.
    timer: Option<ExpiryTimer>,
    /// Incremented every time a timer is armed.
    timer_epoch: u64,
}

struct ExpiryTimer {
    epoch: u64,
    handle: JoinHandle<()>,
}

impl Drop for Core {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.handle.abort();
        }
    }
}

impl SessionManager {
    /// Creates a manager over `store`, using the system clock.
    ///
    /// The manager starts `Uninitialized`; call [`restore`](Self::restore)
    /// before anything consults the session.
    pub fn new(store: impl SessionStore) -> Self {
        Self::with_clock(store, SystemClock)
    }

    /// Creates a manager with an explicit clock.
    pub fn with_clock(store: impl SessionStore, clock: impl Clock) -> Self {
        let (state, _) = watch::channel(AuthState::Uninitialized);
        Self {
            inner: Arc::new(Inner {
                store: Box::new(store),
                clock: Box::new(clock),
                core: Mutex::new(Core {
                    timer: None,
                    timer_epoch: 0,
                }),
                state,
            }),
        }
    }

    /// Reads the persisted session and leaves `Uninitialized`.
    ///
    /// - Nothing stored (or partial/corrupt data) → `Unauthenticated`
    ///   (unusable data is purged).
    /// - A session with time left → `Authenticated`, with the expiry timer
    ///   set to the *remaining* time.
    /// - A lapsed session → purged, `Unauthenticated` with
    ///   [`SignOutReason::Expired`]. `Authenticated` is never published on
    ///   the way.
    ///
    /// Calling it again after initialization is a no-op that returns the
    /// current state.
    pub fn restore(&self) -> AuthState {
        let inner = &self.inner;
        let mut core = inner.lock_core();

        if inner.state.borrow().is_initialized() {
            tracing::debug!("restore skipped, session already initialized");
            return inner.state.borrow().clone();
        }

        let next = match load_session(inner.store.as_ref()) {
            Ok(Persisted::Empty) => AuthState::Unauthenticated {
                reason: SignOutReason::Absent,
            },
            Ok(Persisted::Unusable(why)) => {
                tracing::warn!(reason = why, "discarding unusable persisted session");
                inner.purge_store();
                AuthState::Unauthenticated {
                    reason: SignOutReason::Absent,
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "could not read session store");
                inner.purge_store();
                AuthState::Unauthenticated {
                    reason: SignOutReason::Absent,
                }
            }
            Ok(Persisted::Found(session)) => {
                let now = inner.clock.now();
                match session.remaining_at(now) {
                    Some(remaining) => {
                        inner.arm_timer(&mut core, remaining);
                        tracing::info!(
                            role = %session.identity.role,
                            expires_at = %session.expires_at,
                            remaining_secs = remaining.as_secs(),
                            "session restored"
                        );
                        AuthState::Authenticated(session)
                    }
                    None => {
                        inner.purge_store();
                        tracing::info!(
                            expired_at = %session.expires_at,
                            "persisted session had expired, purged"
                        );
                        AuthState::Unauthenticated {
                            reason: SignOutReason::Expired,
                        }
                    }
                }
            }
        };

        inner.state.send_replace(next.clone());
        next
    }

    /// Starts a session for `identity`, valid for `ttl` from now.
    ///
    /// Writes the session to the store, replaces any previous session and
    /// re-arms the single expiry timer. A store write failure is logged;
    /// the session is still active in memory.
    ///
    /// # Errors
    /// Returns [`SessionError::InvalidTtl`] if `ttl` is zero (or too large
    /// to represent as an instant).
    pub fn login(
        &self,
        identity: Identity,
        token: impl Into<String>,
        ttl: Duration,
    ) -> Result<Session, SessionError> {
        if ttl.is_zero() {
            return Err(SessionError::InvalidTtl);
        }
        let inner = &self.inner;
        let now = inner.clock.now();
        let expires_at = TimeDelta::from_std(ttl)
            .ok()
            .and_then(|delta| now.checked_add_signed(delta))
            .ok_or(SessionError::InvalidTtl)?;

        let session = Session {
            identity,
            token: token.into(),
            issued_at: Some(now),
            expires_at,
        };

        let mut core = inner.lock_core();
        if let Err(e) = save_session(inner.store.as_ref(), &session) {
            tracing::warn!(error = %e, "could not persist session, keeping it in memory only");
        }
        inner.arm_timer(&mut core, ttl);
        inner
            .state
            .send_replace(AuthState::Authenticated(session.clone()));

        tracing::info!(
            role = %session.identity.role,
            expires_at = %session.expires_at,
            "session established"
        );
        Ok(session)
    }

    /// Verifies `credentials` and logs in with the resulting grant.
    ///
    /// # Errors
    /// Whatever the verifier reports ([`SessionError::InvalidCredentials`],
    /// [`SessionError::VerifierUnavailable`]), with no state change, or
    /// [`SessionError::InvalidTtl`] if the backend granted a zero TTL.
    pub async fn sign_in<V: CredentialVerifier>(
        &self,
        verifier: &V,
        credentials: &Credentials,
    ) -> Result<Session, SessionError> {
        let grant = verifier.verify(credentials).await.inspect_err(|e| {
            tracing::info!(email = %credentials.email, error = %e, "sign-in rejected");
        })?;
        self.login(grant.identity, grant.token, grant.ttl)
    }

    /// Ends the session: cancels the timer, clears the store and the
    /// in-memory state. Safe to call at any time, any number of times.
    ///
    /// Before [`restore`](Self::restore) there is no session to end yet, so
    /// the call does nothing and the persisted session stays in the store.
    pub fn logout(&self) {
        self.inner.end_session(SignOutReason::SignedOut, Ending::Logout);
    }

    /// Logs out only if `token` is still the active token.
    ///
    /// For callers reacting to a rejected request: the rejection belongs
    /// to the token the request carried, and a session started since then
    /// must survive it. Returns whether a session was ended.
    pub fn logout_if_token(&self, token: &str) -> bool {
        self.inner
            .end_session(SignOutReason::SignedOut, Ending::Rejected(token))
    }

    // -- Reads ------------------------------------------------------------

    /// Snapshot of the current state.
    pub fn state(&self) -> AuthState {
        self.inner.state.borrow().clone()
    }

    /// The active bearer token, if any.
    pub fn current_token(&self) -> Option<String> {
        self.inner.state.borrow().token().map(str::to_owned)
    }

    /// The active identity, if any.
    pub fn current_identity(&self) -> Option<Identity> {
        self.inner.state.borrow().identity().cloned()
    }

    /// Returns `true` if a session is active.
    pub fn is_authenticated(&self) -> bool {
        self.inner.state.borrow().is_authenticated()
    }

    /// Returns `true` while an expiry timer is pending.
    pub fn has_pending_expiry(&self) -> bool {
        self.inner.lock_core().timer.is_some()
    }

    /// A read-only handle for gates, fetchers and views.
    pub fn view(&self) -> SessionView {
        SessionView::new(self.inner.state.subscribe())
    }

    /// A raw receiver of state changes.
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.inner.state.subscribe()
    }

    /// Resolves once [`restore`](Self::restore) has run.
    pub async fn wait_initialized(&self) -> AuthState {
        self.view().wait_initialized().await
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("state", &*self.inner.state.borrow())
            .finish_non_exhaustive()
    }
}

impl Inner {
    fn lock_core(&self) -> MutexGuard<'_, Core> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn purge_store(&self) {
        if let Err(e) = clear_session(self.store.as_ref()) {
            tracing::warn!(error = %e, "could not clear session store");
        }
    }

    /// Replaces the expiry timer with one firing after `after`.
    fn arm_timer(self: &Arc<Self>, core: &mut Core, after: Duration) {
        core.timer_epoch += 1;
        let epoch = core.timer_epoch;
        // The task only holds a weak handle: dropping the last manager
        // handle must not be kept alive by its own timer.
        let weak: Weak<Self> = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            if let Some(inner) = weak.upgrade() {
                inner.end_session(SignOutReason::Expired, Ending::Timer(epoch));
            }
        });

        if let Some(old) = core.timer.replace(ExpiryTimer { epoch, handle }) {
            old.handle.abort();
            tracing::debug!(replaced_epoch = old.epoch, epoch, "expiry timer replaced");
        }
    }

    /// Shared tail of logout, rejection and expiry. Returns whether an
    /// active session was ended.
    fn end_session(&self, reason: SignOutReason, ending: Ending<'_>) -> bool {
        let mut core = self.lock_core();

        match ending {
            Ending::Timer(epoch) => match &core.timer {
                Some(timer) if timer.epoch == epoch => {
                    // This task is the timer; dropping its handle does not
                    // cancel it.
                    core.timer = None;
                }
                _ => {
                    tracing::debug!(epoch, "stale expiry timer ignored");
                    return false;
                }
            },
            Ending::Rejected(token) => {
                if self.state.borrow().token() != Some(token) {
                    tracing::debug!("rejected token is no longer active, session kept");
                    return false;
                }
                if let Some(timer) = core.timer.take() {
                    timer.handle.abort();
                }
            }
            Ending::Logout => {
                if !self.state.borrow().is_initialized() {
                    tracing::debug!("logout before restore ignored");
                    return false;
                }
                if let Some(timer) = core.timer.take() {
                    timer.handle.abort();
                }
            }
        }

        self.purge_store();

        let previous = self.state.borrow().clone();
        match previous {
            AuthState::Authenticated(session) => {
                self.state
                    .send_replace(AuthState::Unauthenticated { reason });
                match reason {
                    SignOutReason::Expired => tracing::info!(
                        role = %session.identity.role,
                        "session expired, please sign in again"
                    ),
                    _ => tracing::info!(role = %session.identity.role, "signed out"),
                }
                true
            }
            // Already signed out: the store is clean now, nothing to publish.
            AuthState::Unauthenticated { .. } | AuthState::Uninitialized => false,
        }
    }
}

/// What is ending the session.
#[derive(Debug, Clone, Copy)]
enum Ending<'a> {
    /// An explicit logout.
    Logout,
    /// A request carrying this token was rejected by the backend.
    Rejected(&'a str),
    /// The expiry timer with this epoch fired.
    Timer(u64),
}

// =========================================================================
// Tests
// =========================================================================
