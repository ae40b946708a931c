//! Integration tests for `FilteredFetcher`.
//!
//! Most tests use a scripted source: every request shows up on a channel
//! together with a reply slot, and the test decides when (and in which
//! order) responses arrive.

use std::sync::Arc;
use std::time::Duration;

use clinic_api::filter::{DISTRICT, REGION, SALES_RANGE, TIME_FILTER};
use clinic_api::{ApiClient, ApiConfig, ApiError, FilterParams, SalesRange};
use clinic_fetch::{Endpoint, FetchState, FilteredFetcher, SalesReport, Source};
use clinic_session::{
    AuthState, Identity, MemoryStore, Session, SessionManager, SessionView,
};
use serde_json::{Value, json};
use tokio::sync::{mpsc, oneshot, watch};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// =========================================================================
// Scripted source
// =========================================================================

struct Call {
    token: String,
    params: FilterParams,
    reply: oneshot::Sender<Result<String, ApiError>>,
}

impl Call {
    fn respond(self, result: Result<&str, ApiError>) {
        let _ = self.reply.send(result.map(str::to_owned));
    }
}

struct Scripted {
    calls: mpsc::UnboundedSender<Call>,
}

impl Source for Scripted {
    type Output = String;

    async fn fetch(&self, token: &str, params: &FilterParams) -> Result<String, ApiError> {
        let (reply, rx) = oneshot::channel();
        let call = Call {
            token: token.to_string(),
            params: params.clone(),
            reply,
        };
        if self.calls.send(call).is_err() {
            return Err(ApiError::Transport("test ended".into()));
        }
        rx.await
            .unwrap_or_else(|_| Err(ApiError::Transport("reply dropped".into())))
    }
}

fn scripted() -> (Scripted, mpsc::UnboundedReceiver<Call>) {
    let (calls, rx) = mpsc::unbounded_channel();
    (Scripted { calls }, rx)
}

// =========================================================================
// Helpers
// =========================================================================

fn signed_in(token: &str) -> SessionView {
    SessionView::fixed(AuthState::Authenticated(Session {
        identity: Identity::with_role("Admin"),
        token: token.to_string(),
        issued_at: None,
        expires_at: chrono_far_future(),
    }))
}

fn chrono_far_future() -> chrono::DateTime<chrono::Utc> {
    chrono::DateTime::<chrono::Utc>::MAX_UTC
}

async fn next_call(calls: &mut mpsc::UnboundedReceiver<Call>) -> Call {
    tokio::time::timeout(Duration::from_secs(5), calls.recv())
        .await
        .expect("a request should have been issued")
        .expect("source alive")
}

async fn wait_until<T: Clone>(
    rx: &mut watch::Receiver<FetchState<T>>,
    done: impl FnMut(&FetchState<T>) -> bool,
) -> FetchState<T> {
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(done))
        .await
        .expect("state should settle")
        .expect("fetcher alive")
        .clone()
}

async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

// =========================================================================
// Basic flow
// =========================================================================

#[tokio::test]
async fn test_refresh_sends_full_params_and_token() {
    let (source, mut calls) = scripted();
    let fetcher = FilteredFetcher::new(source, signed_in("tok-1"), FilterParams::dashboard());
    let mut rx = fetcher.subscribe();

    let generation = fetcher.refresh().unwrap();
    assert_eq!(generation, 1);
    assert!(fetcher.with_state(|s| s.loading));

    let call = next_call(&mut calls).await;
    assert_eq!(call.token, "tok-1");
    assert_eq!(call.params, FilterParams::dashboard());
    call.respond(Ok("stats"));

    let state = wait_until(&mut rx, |s| !s.loading).await;
    assert_eq!(state.data.as_deref(), Some("stats"));
    assert_eq!(state.error, None);
    assert_eq!(state.generation, 1);
    assert_eq!(state.token.as_deref(), Some("tok-1"));
}

#[tokio::test]
async fn test_param_change_issues_request_with_new_set() {
    let (source, mut calls) = scripted();
    let fetcher = FilteredFetcher::new(source, signed_in("tok"), FilterParams::dashboard());

    assert!(fetcher.set_param(DISTRICT, "Tamale"));

    let call = next_call(&mut calls).await;
    assert_eq!(call.params.get(DISTRICT), Some("Tamale"));
    assert_eq!(fetcher.params().get(DISTRICT), Some("Tamale"));
}

#[tokio::test]
async fn test_unchanged_param_issues_nothing() {
    let (source, mut calls) = scripted();
    let fetcher = FilteredFetcher::new(source, signed_in("tok"), FilterParams::dashboard());

    assert!(!fetcher.set_param(TIME_FILTER, "all"));
    settle().await;

    assert!(calls.try_recv().is_err());
    assert_eq!(fetcher.generation(), 0);
}

#[tokio::test]
async fn test_update_params_batches_into_one_request() {
    let (source, mut calls) = scripted();
    let fetcher = FilteredFetcher::new(source, signed_in("tok"), FilterParams::dashboard());

    fetcher.update_params(|p| p.set(REGION, "North") | p.set(TIME_FILTER, "month"));

    let call = next_call(&mut calls).await;
    assert_eq!(call.params.get(REGION), Some("North"));
    assert_eq!(call.params.get(TIME_FILTER), Some("month"));
    settle().await;
    assert!(calls.try_recv().is_err());
}

// =========================================================================
// Stale-response suppression
// =========================================================================

#[tokio::test]
async fn test_late_response_for_superseded_params_is_discarded() {
    let (source, mut calls) = scripted();
    let fetcher = FilteredFetcher::new(source, signed_in("tok"), FilterParams::dashboard());
    let mut rx = fetcher.subscribe();

    fetcher.set_param(REGION, "North");
    let p1 = next_call(&mut calls).await;
    fetcher.set_param(REGION, "South");
    let p2 = next_call(&mut calls).await;

    // P2 answers first and is shown.
    p2.respond(Ok("south"));
    let state = wait_until(&mut rx, |s| !s.loading).await;
    assert_eq!(state.data.as_deref(), Some("south"));

    // P1 answers late and changes nothing.
    p1.respond(Ok("north"));
    settle().await;

    let state = fetcher.state();
    assert_eq!(state.data.as_deref(), Some("south"));
    assert_eq!(state.generation, 2);
    assert!(!state.loading);
}

#[tokio::test]
async fn test_loading_tracks_current_generation_only() {
    let (source, mut calls) = scripted();
    let fetcher = FilteredFetcher::new(source, signed_in("tok"), FilterParams::dashboard());

    fetcher.set_param(REGION, "North");
    let p1 = next_call(&mut calls).await;
    fetcher.set_param(REGION, "South");
    let p2 = next_call(&mut calls).await;

    // The superseded request finishing does not end loading.
    p1.respond(Ok("north"));
    settle().await;
    let state = fetcher.state();
    assert!(state.loading);
    assert_eq!(state.data, None);

    p2.respond(Err(ApiError::Server {
        status: 500,
        message: "Failed to load dashboard".into(),
    }));
    let mut rx = fetcher.subscribe();
    let state = wait_until(&mut rx, |s| !s.loading).await;
    assert_eq!(
        state.error_message().as_deref(),
        Some("Failed to load dashboard (HTTP 500)")
    );
    assert_eq!(state.data, None);
}

// =========================================================================
// De-duplication
// =========================================================================

#[tokio::test]
async fn test_refresh_while_identical_request_in_flight_is_joined() {
    let (source, mut calls) = scripted();
    let fetcher = FilteredFetcher::new(source, signed_in("tok"), FilterParams::dashboard());

    let first = fetcher.refresh().unwrap();
    let second = fetcher.refresh().unwrap();

    assert_eq!(first, second);
    let _call = next_call(&mut calls).await;
    settle().await;
    assert!(calls.try_recv().is_err());
}

#[tokio::test]
async fn test_reload_forces_new_generation() {
    let (source, mut calls) = scripted();
    let fetcher = FilteredFetcher::new(source, signed_in("tok"), FilterParams::dashboard());

    let first = fetcher.refresh().unwrap();
    let second = fetcher.reload().unwrap();

    assert_eq!(second, first + 1);
    let _a = next_call(&mut calls).await;
    let _b = next_call(&mut calls).await;
}

// =========================================================================
// Session interplay
// =========================================================================

#[tokio::test]
async fn test_no_token_fails_fast_without_request() {
    let (source, mut calls) = scripted();
    let view = SessionView::fixed(AuthState::Unauthenticated {
        reason: clinic_session::SignOutReason::Absent,
    });
    let fetcher = FilteredFetcher::new(source, view, FilterParams::dashboard());

    assert_eq!(fetcher.refresh(), Err(ApiError::Unauthenticated));
    settle().await;

    assert!(calls.try_recv().is_err());
    let state = fetcher.state();
    assert_eq!(state.error, Some(ApiError::Unauthenticated));
    assert!(!state.loading);
    assert_eq!(state.token, None);
}

#[tokio::test]
async fn test_watch_session_fetches_when_token_appears() {
    let (source, mut calls) = scripted();
    let session = SessionManager::new(MemoryStore::new());
    let fetcher = FilteredFetcher::new(source, session.view(), FilterParams::sales());
    let watcher = fetcher.watch_session();

    session.restore();
    let mut rx = fetcher.subscribe();
    let state = wait_until(&mut rx, |s| s.error.is_some()).await;
    assert_eq!(state.error, Some(ApiError::Unauthenticated));

    session
        .login(Identity::with_role("Admin"), "fresh", Duration::from_secs(3600))
        .unwrap();

    let call = next_call(&mut calls).await;
    assert_eq!(call.token, "fresh");
    watcher.abort();
}

#[tokio::test]
async fn test_logout_discards_in_flight_response() {
    let (source, mut calls) = scripted();
    let store = Arc::new(MemoryStore::new());
    let session = SessionManager::new(Arc::clone(&store));
    session.restore();
    session
        .login(Identity::with_role("Admin"), "tok", Duration::from_secs(3600))
        .unwrap();

    let fetcher = FilteredFetcher::new(source, session.view(), FilterParams::dashboard());
    let watcher = fetcher.watch_session();
    let in_flight = next_call(&mut calls).await;

    session.logout();
    let mut rx = fetcher.subscribe();
    wait_until(&mut rx, |s| s.error == Some(ApiError::Unauthenticated)).await;

    in_flight.respond(Ok("leaked"));
    settle().await;

    let state = fetcher.state();
    assert_eq!(state.data, None);
    assert_eq!(state.error, Some(ApiError::Unauthenticated));
    assert!(calls.try_recv().is_err(), "no fetch without a token");
    watcher.abort();
}

// =========================================================================
// HTTP endpoint
// =========================================================================

#[tokio::test]
async fn test_endpoint_fetches_dashboard_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/dashboard/stats"))
        .and(query_param(REGION, "North"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "visits": 5 })))
        .expect(1)
        .mount(&server)
        .await;

    let client = ApiClient::new(ApiConfig::with_base_url(server.uri())).unwrap();
    let fetcher: FilteredFetcher<Endpoint<Value>> = FilteredFetcher::new(
        Endpoint::dashboard(client),
        signed_in("tok"),
        FilterParams::dashboard(),
    );
    let mut rx = fetcher.subscribe();

    fetcher.set_param(REGION, "North");

    let state = wait_until(&mut rx, |s| s.generation == 1 && !s.loading).await;
    assert_eq!(state.data, Some(json!({ "visits": 5 })));
}

#[tokio::test]
async fn test_sales_report_follows_range_paths() {
    let server = MockServer::start().await;
    for (window, profit, sales, total) in [
        ("/api/sales/last-days/1", "/api/sales/profit/today", json!([]), 0.0),
        (
            "/api/sales/last-30-days",
            "/api/sales/profit/30days",
            json!([{ "profit": 3.0 }, { "profit": 4.5 }]),
            7.5,
        ),
    ] {
        Mock::given(method("GET"))
            .and(path(window))
            .respond_with(ResponseTemplate::new(200).set_body_json(sales))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(profit))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "totalProfit": total })))
            .expect(1)
            .mount(&server)
            .await;
    }

    let client = ApiClient::new(ApiConfig::with_base_url(server.uri())).unwrap();
    let fetcher =
        FilteredFetcher::new(SalesReport::new(client), signed_in("tok"), FilterParams::sales());
    let mut rx = fetcher.subscribe();

    fetcher.refresh().unwrap();
    let state = wait_until(&mut rx, |s| s.generation == 1 && !s.loading).await;
    assert_eq!(state.data.map(|d| d.sales.len()), Some(0));

    fetcher.set_param(SALES_RANGE, SalesRange::Last30.key());
    let state = wait_until(&mut rx, |s| s.generation == 2 && !s.loading).await;
    let summary = state.data.unwrap();
    assert_eq!(summary.sales.len(), 2);
    assert_eq!(summary.total_profit, 7.5);
}
