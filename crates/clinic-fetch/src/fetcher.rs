//! The filtered data fetcher.
//!
//! Keeps a `{data, loading, error}` view model in step with the *latest*
//! filter parameters, however fast they change and in whatever order the
//! responses come back.
//!
//! # Last request wins
//!
//! Every issued request gets a generation number from a counter that only
//! goes up. When a response arrives it is applied only if its generation
//! is still the current one; otherwise it is dropped on the floor. Stale
//! requests are not cancelled, just ignored.
//!
//! ```text
//!  set region=North ──→ gen 1 ─────────────────────────────┐ (late)
//!  set region=South ──→ gen 2 ──────────┐                  │
//!                                       ▼                  ▼
//!                              applied (gen 2 current)   dropped (1 ≠ 2)
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use clinic_api::{ApiError, FilterParams};
use clinic_session::SessionView;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::Source;

// ---------------------------------------------------------------------------
// FetchState
// ---------------------------------------------------------------------------

/// What a filtered view renders.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchState<T> {
    /// Result of the last applied request. Cleared when a request fails.
    pub data: Option<T>,
    /// `true` while the current generation's request is outstanding.
    pub loading: bool,
    /// Failure of the last applied request.
    pub error: Option<ApiError>,
    /// Generation this state belongs to (0 before the first request).
    pub generation: u64,
    /// Token the applied request was sent with. `None` when no request
    /// was sent.
    pub token: Option<String>,
}

impl<T> Default for FetchState<T> {
    fn default() -> Self {
        Self {
            data: None,
            loading: false,
            error: None,
            generation: 0,
            token: None,
        }
    }
}

impl<T> FetchState<T> {
    /// The error as a display string, if any.
    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }
}

// ---------------------------------------------------------------------------
// FilteredFetcher
// ---------------------------------------------------------------------------

/// Fetches `S`'s data for a mutable [`FilterParams`].
///
/// Cheap to clone; clones share parameters, generation and state. All
/// requests run on spawned Tokio tasks, so the methods that issue them
/// must be called from within a runtime.
pub struct FilteredFetcher<S: Source> {
    shared: Arc<Shared<S>>,
}

impl<S: Source> Clone for FilteredFetcher<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S: Source> std::fmt::Debug for FilteredFetcher<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let core = self.shared.lock_core();
        f.debug_struct("FilteredFetcher")
            .field("params", &core.params)
            .field("generation", &core.generation)
            .finish_non_exhaustive()
    }
}

struct Shared<S: Source> {
    source: S,
    session: SessionView,
    core: Mutex<Core>,
    /// Written only while `core` is locked.
    state: watch::Sender<FetchState<S::Output>>,
}

struct Core {
    params: FilterParams,
    generation: u64,
    /// The current generation's request, while it is outstanding.
    in_flight: Option<InFlight>,
}

struct InFlight {
    generation: u64,
    params: FilterParams,
    token: String,
}

impl<S: Source> FilteredFetcher<S> {
    /// Creates a fetcher. Nothing is requested until [`refresh`](Self::refresh),
    /// a parameter change, or [`watch_session`](Self::watch_session).
    pub fn new(source: S, session: SessionView, params: FilterParams) -> Self {
        let (state, _) = watch::channel(FetchState::default());
        Self {
            shared: Arc::new(Shared {
                source,
                session,
                core: Mutex::new(Core {
                    params,
                    generation: 0,
                    in_flight: None,
                }),
                state,
            }),
        }
    }

    // -- Parameters -------------------------------------------------------

    /// The current parameter set.
    pub fn params(&self) -> FilterParams {
        self.shared.lock_core().params.clone()
    }

    /// Changes one parameter and, if the value actually changed, issues a
    /// request for the new set. Returns whether it changed.
    pub fn set_param(&self, name: &str, value: impl Into<String>) -> bool {
        self.update_params(|params| params.set(name, value))
    }

    /// Resets every parameter to unconstrained (refetching if needed).
    pub fn reset_params(&self) -> bool {
        self.update_params(FilterParams::reset)
    }

    /// Applies several changes and issues at most one request for them.
    ///
    /// `change` returns whether it changed anything; if so, a request
    /// for the resulting set is issued.
    pub fn update_params(&self, change: impl FnOnce(&mut FilterParams) -> bool) -> bool {
        let changed = change(&mut self.shared.lock_core().params);
        if changed {
            // Failures land in the published state.
            let _ = self.refresh();
        }
        changed
    }

    // -- Requests ---------------------------------------------------------

    /// Issues a request for the current parameters and token.
    ///
    /// If the exact same parameters and token are already in flight for
    /// the current generation, no duplicate is sent and that generation
    /// is returned.
    ///
    /// # Errors
    /// [`ApiError::Unauthenticated`] if there is no token. Nothing is sent,
    /// any in-flight request is superseded, and the published state
    /// becomes "no data, not authenticated".
    pub fn refresh(&self) -> Result<u64, ApiError> {
        self.issue(false)
    }

    /// Like [`refresh`](Self::refresh) but always starts a new generation
    /// (the manual "reload" button).
    pub fn reload(&self) -> Result<u64, ApiError> {
        self.issue(true)
    }

    fn issue(&self, force: bool) -> Result<u64, ApiError> {
        let shared = &self.shared;
        let token = shared.session.token();
        let mut core = shared.lock_core();

        let Some(token) = token else {
            core.generation += 1;
            core.in_flight = None;
            let generation = core.generation;
            shared.state.send_replace(FetchState {
                data: None,
                loading: false,
                error: Some(ApiError::Unauthenticated),
                generation,
                token: None,
            });
            tracing::debug!(generation, "no session token, request not issued");
            return Err(ApiError::Unauthenticated);
        };

        if !force {
            if let Some(in_flight) = &core.in_flight {
                if in_flight.params == core.params && in_flight.token == token {
                    tracing::debug!(
                        generation = in_flight.generation,
                        "identical request already in flight"
                    );
                    return Ok(in_flight.generation);
                }
            }
        }

        core.generation += 1;
        let generation = core.generation;
        let params = core.params.clone();
        core.in_flight = Some(InFlight {
            generation,
            params: params.clone(),
            token: token.clone(),
        });
        shared.state.send_modify(|state| {
            state.loading = true;
            state.generation = generation;
        });
        drop(core);

        tracing::debug!(generation, query = ?params.query_pairs(), "request issued");

        let task_shared = Arc::clone(shared);
        tokio::spawn(async move {
            let result = task_shared.source.fetch(&token, &params).await;
            task_shared.apply(generation, token, result);
        });

        Ok(generation)
    }

    /// Spawns the task that keeps the fetcher in step with the session.
    ///
    /// Waits for the session to be restored, requests once, then requests
    /// again every time the token changes. Losing the token supersedes
    /// whatever is in flight and publishes "not authenticated". The task
    /// ends when the session manager is dropped; abort the handle to stop
    /// it earlier.
    pub fn watch_session(&self) -> JoinHandle<()> {
        let fetcher = self.clone();
        let mut view = self.shared.session.clone();
        tokio::spawn(async move {
            let initial = view.wait_initialized().await;
            let mut last_token = initial.token().map(str::to_owned);
            let _ = fetcher.refresh();

            while let Some(state) = view.changed().await {
                let token = state.token().map(str::to_owned);
                if token == last_token {
                    continue;
                }
                last_token = token;
                let _ = fetcher.refresh();
            }
        })
    }

    // -- State ------------------------------------------------------------

    /// Receiver for state changes (for a render loop).
    pub fn subscribe(&self) -> watch::Receiver<FetchState<S::Output>> {
        self.shared.state.subscribe()
    }

    /// The most recently issued generation.
    pub fn generation(&self) -> u64 {
        self.shared.lock_core().generation
    }

    /// Runs `f` against the current state without cloning it.
    pub fn with_state<R>(&self, f: impl FnOnce(&FetchState<S::Output>) -> R) -> R {
        f(&self.shared.state.borrow())
    }
}

impl<S: Source> FilteredFetcher<S>
where
    S::Output: Clone,
{
    /// Snapshot of the current state.
    pub fn state(&self) -> FetchState<S::Output> {
        self.shared.state.borrow().clone()
    }
}

impl<S: Source> Shared<S> {
    fn lock_core(&self) -> MutexGuard<'_, Core> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publishes a response if it still belongs to the current generation.
    fn apply(&self, generation: u64, token: String, result: Result<S::Output, ApiError>) {
        let mut core = self.lock_core();
        if core.generation != generation {
            tracing::debug!(
                generation,
                current = core.generation,
                "stale response discarded"
            );
            return;
        }
        core.in_flight = None;

        let next = match result {
            Ok(data) => FetchState {
                data: Some(data),
                loading: false,
                error: None,
                generation,
                token: Some(token),
            },
            Err(error) => {
                tracing::warn!(generation, %error, "filtered fetch failed");
                FetchState {
                    data: None,
                    loading: false,
                    error: Some(error),
                    generation,
                    token: Some(token),
                }
            }
        };
        self.state.send_replace(next);
    }
}
