//! `Console` builder and wiring.
//!
//! Ties the layers together: REST client → session manager → access
//! gate → filtered fetchers. The builder restores the persisted session
//! before anything can ask the gate, so the first navigation after start
//! up already sees the restored state.

use std::future::Future;

use clinic_api::{ApiClient, ApiError, FilterParams, Resource, SalesApi};
use clinic_fetch::{Endpoint, FetchState, FilteredFetcher, SalesReport};
use clinic_gate::{AccessGate, Navigation, RouteTable};
use clinic_session::{
    AuthState, Credentials, FileStore, MemoryStore, Session, SessionManager, SessionStore,
};
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::{ClinicError, ConsoleConfig};

/// A fetcher for one of the backend's filtered JSON views.
pub type ViewFetcher = FilteredFetcher<Endpoint<Value>>;

/// The sales screen's fetcher.
pub type SalesFetcher = FilteredFetcher<SalesReport>;

/// Builder for a [`Console`].
///
/// # Example
///
/// ```rust,no_run
/// use clinic::prelude::*;
///
/// # async fn run() -> Result<(), ClinicError> {
/// let console = Console::builder()
///     .config(ConsoleConfig::from_env())
///     .build()
///     .await?;
///
/// console
///     .sign_in(&Credentials::new("admin@clinic.test", "secret").with_role("Admin"))
///     .await?;
/// assert_eq!(console.navigate("/dashboard"), Navigation::Render);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct ConsoleBuilder {
    config: ConsoleConfig,
    session: Option<SessionManager>,
    routes: Option<RouteTable>,
}

impl ConsoleBuilder {
    /// A builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: ConsoleConfig) -> Self {
        self.config = config;
        self
    }

    /// Persists the session in `store` instead of the configured file.
    pub fn store(mut self, store: impl SessionStore) -> Self {
        self.session = Some(SessionManager::new(store));
        self
    }

    /// Uses an already constructed session manager (custom clock, shared
    /// store). It is restored by [`build`](Self::build) if it has not been
    /// already.
    pub fn session(mut self, session: SessionManager) -> Self {
        self.session = Some(session);
        self
    }

    /// Replaces the console's route table.
    pub fn routes(mut self, routes: RouteTable) -> Self {
        self.routes = Some(routes);
        self
    }

    /// Restores the session and starts the console.
    ///
    /// # Errors
    /// [`ClinicError::Store`] if the session file cannot be opened,
    /// [`ClinicError::Api`] if the HTTP client cannot be built.
    pub async fn build(self) -> Result<Console, ClinicError> {
        let Self {
            config,
            session,
            routes,
        } = self;

        let api = ApiClient::new(config.api.clone())?;
        let session = match (session, &config.store_path) {
            (Some(session), _) => session,
            (None, Some(path)) => SessionManager::new(FileStore::open(path)?),
            (None, None) => SessionManager::new(MemoryStore::new()),
        };

        session.restore();
        let restored = session.wait_initialized().await;
        tracing::info!(
            base_url = %config.api.base_url,
            authenticated = restored.is_authenticated(),
            "console started"
        );

        let routes = routes
            .unwrap_or_else(|| RouteTable::console_at(&config.login_path, &config.home_path));
        let gate = AccessGate::new(session.view(), routes);

        let dashboard = FilteredFetcher::new(
            Endpoint::dashboard(api.clone()),
            session.view(),
            FilterParams::dashboard(),
        );
        let sales = FilteredFetcher::new(
            SalesReport::new(api.clone()),
            session.view(),
            FilterParams::sales(),
        );

        let tasks = vec![
            dashboard.watch_session(),
            sales.watch_session(),
            spawn_rejection_guard(dashboard.subscribe(), session.clone()),
            spawn_rejection_guard(sales.subscribe(), session.clone()),
        ];

        Ok(Console {
            config,
            session,
            api,
            gate,
            dashboard,
            sales,
            tasks,
        })
    }
}

/// Signs the user out when the backend rejects their token.
///
/// Only the token the rejected request carried is revoked; a session
/// started while it was in flight is left alone.
fn spawn_rejection_guard<T: Send + Sync + 'static>(
    mut rx: watch::Receiver<FetchState<T>>,
    session: SessionManager,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let rejected = {
                let state = rx.borrow_and_update();
                match (&state.error, &state.token) {
                    (Some(error), Some(token)) if error.is_unauthenticated() => {
                        Some(token.clone())
                    }
                    _ => None,
                }
            };
            if let Some(token) = rejected {
                if session.logout_if_token(&token) {
                    tracing::info!("backend rejected the session token, signed out");
                }
            }
        }
    })
}

// ---------------------------------------------------------------------------
// Console
// ---------------------------------------------------------------------------

/// The running console.
///
/// Dropping it stops the background tasks that keep the fetchers in step
/// with the session.
#[derive(Debug)]
pub struct Console {
    config: ConsoleConfig,
    session: SessionManager,
    api: ApiClient,
    gate: AccessGate,
    dashboard: ViewFetcher,
    sales: SalesFetcher,
    tasks: Vec<JoinHandle<()>>,
}

impl Console {
    pub fn builder() -> ConsoleBuilder {
        ConsoleBuilder::new()
    }

    pub fn config(&self) -> &ConsoleConfig {
        &self.config
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn gate(&self) -> &AccessGate {
        &self.gate
    }

    pub fn state(&self) -> AuthState {
        self.session.state()
    }

    // -- Session ----------------------------------------------------------

    /// Verifies `credentials` against the backend and starts a session.
    pub async fn sign_in(&self, credentials: &Credentials) -> Result<Session, ClinicError> {
        Ok(self.session.sign_in(&self.api, credentials).await?)
    }

    pub fn sign_out(&self) {
        self.session.logout();
    }

    // -- Navigation -------------------------------------------------------

    pub fn navigate(&self, path: &str) -> Navigation {
        self.gate.navigate(path)
    }

    // -- Data -------------------------------------------------------------

    /// Dashboard statistics, filtered by region, district and time.
    pub fn dashboard(&self) -> &ViewFetcher {
        &self.dashboard
    }

    /// Sales and profit for the selected window.
    pub fn sales(&self) -> &SalesFetcher {
        &self.sales
    }

    pub fn patients(&self) -> Resource {
        Resource::patients(self.api.clone())
    }

    pub fn pharmacy(&self) -> Resource {
        Resource::pharmacy(self.api.clone())
    }

    /// Sales reports and recording a sale.
    pub fn sales_api(&self) -> SalesApi {
        SalesApi::new(self.api.clone())
    }

    /// Runs an authenticated call with the current token.
    ///
    /// Fails fast with [`ApiError::Unauthenticated`] when nobody is signed
    /// in. If the backend rejects the token while it is still the active
    /// one, the session is ended before the error is returned. A newer
    /// session started during the call is kept.
    ///
    /// ```rust,no_run
    /// # use clinic::prelude::*;
    /// # async fn run(console: &Console) -> Result<(), ClinicError> {
    /// let patients = console.patients();
    /// let list: serde_json::Value = console
    ///     .authorized(|token| async move { patients.list(&token).await })
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn authorized<T, F, Fut>(&self, call: F) -> Result<T, ClinicError>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let token = self
            .session
            .current_token()
            .ok_or(ApiError::Unauthenticated)?;
        match call(token.clone()).await {
            Err(e) if e.is_unauthenticated() => {
                if self.session.logout_if_token(&token) {
                    tracing::info!("backend rejected the session token, signed out");
                }
                Err(e.into())
            }
            result => Ok(result?),
        }
    }
}

impl Drop for Console {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}
