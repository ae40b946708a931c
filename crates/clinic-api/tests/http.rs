//! Integration tests for `ApiClient`, `Resource` and `SalesApi` against a
//! mock backend.

use std::time::Duration;

use clinic_api::filter::{REGION, TIME_FILTER};
use clinic_api::{
    ApiClient, ApiConfig, ApiError, FilterParams, Resource, SalesApi, SalesRange, SalesSummary,
};
use clinic_session::{CredentialVerifier, Credentials, SessionError};
use serde_json::{Value, json};
use wiremock::matchers::{
    body_json, header, method, path, query_param, query_param_is_missing,
};
use wiremock::{Mock, MockServer, ResponseTemplate};

// =========================================================================
// Helpers
// =========================================================================

fn client_for(server: &MockServer) -> ApiClient {
    ApiClient::new(ApiConfig {
        base_url: server.uri(),
        timeout: Duration::from_secs(5),
    })
    .expect("client should build")
}

// =========================================================================
// Login
// =========================================================================

#[tokio::test]
async fn test_login_success_returns_grant() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/user/login-user"))
        .and(body_json(json!({
            "email": "admin@clinic.test",
            "password": "pw",
            "role": "Admin"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "user": { "role": "Admin", "name": "Kofi" },
            "token": "tok-1",
            "expiresIn": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let grant = client
        .verify(&Credentials::new("admin@clinic.test", "pw").with_role("Admin"))
        .await
        .expect("login should succeed");

    assert_eq!(grant.token, "tok-1");
    assert_eq!(grant.ttl, Duration::from_secs(3600));
    assert_eq!(grant.identity.role.as_str(), "Admin");
    assert_eq!(grant.identity.get_str("name"), Some("Kofi"));
}

#[tokio::test]
async fn test_login_rejected_carries_server_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/user/login-user"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({ "error": "Invalid email or password" })),
        )
        .mount(&server)
        .await;

    let result = client_for(&server)
        .login(&Credentials::new("x@clinic.test", "bad"))
        .await;

    assert!(matches!(
        result,
        Err(SessionError::InvalidCredentials(m)) if m == "Invalid email or password"
    ));
}

#[tokio::test]
async fn test_login_malformed_body_is_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/user/login-user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .mount(&server)
        .await;

    let result = client_for(&server)
        .login(&Credentials::new("x@clinic.test", "pw"))
        .await;

    assert!(matches!(result, Err(SessionError::VerifierUnavailable(_))));
}

#[tokio::test]
async fn test_login_unreachable_backend_is_unavailable() {
    let client = ApiClient::new(ApiConfig {
        base_url: "http://127.0.0.1:1".into(),
        timeout: Duration::from_secs(2),
    })
    .unwrap();

    let result = client.login(&Credentials::new("x@clinic.test", "pw")).await;

    assert!(matches!(result, Err(SessionError::VerifierUnavailable(_))));
}

// =========================================================================
// Authenticated calls
// =========================================================================

#[tokio::test]
async fn test_get_sends_bearer_and_constrained_params_only() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/dashboard/stats"))
        .and(header("authorization", "Bearer tok-1"))
        .and(query_param(REGION, "North"))
        .and(query_param(TIME_FILTER, "week"))
        .and(query_param_is_missing("district"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "patients": 12 })))
        .expect(1)
        .mount(&server)
        .await;

    let mut params = FilterParams::dashboard();
    params.set(REGION, "North");
    params.set(TIME_FILTER, "week");

    let stats: Value = client_for(&server)
        .get("/api/dashboard/stats", "tok-1", &params.query_pairs())
        .await
        .unwrap();

    assert_eq!(stats["patients"], 12);
}

#[tokio::test]
async fn test_get_unconstrained_filters_send_no_params() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/dashboard/stats"))
        .and(query_param_is_missing(REGION))
        .and(query_param_is_missing(TIME_FILTER))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let mut params = FilterParams::dashboard();
    params.set(REGION, "");
    params.set(TIME_FILTER, "all");

    let _: Value = client_for(&server)
        .get("/api/dashboard/stats", "tok", &params.query_pairs())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_forbidden_is_unauthenticated() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let result: Result<Value, _> = client_for(&server).get("/api/sales", "tok", &[]).await;

    assert_eq!(result, Err(ApiError::Unauthenticated));
}

#[tokio::test]
async fn test_server_failure_keeps_status_and_message() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(500)
                .set_body_json(json!({ "error": "Failed to load dashboard" })),
        )
        .mount(&server)
        .await;

    let result: Result<Value, _> = client_for(&server)
        .get("/api/dashboard/stats", "tok", &[])
        .await;

    assert_eq!(
        result,
        Err(ApiError::Server {
            status: 500,
            message: "Failed to load dashboard".into()
        })
    );
}

#[tokio::test]
async fn test_empty_token_fails_fast_without_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let result: Result<Value, _> = client_for(&server).get("/api/sales", "", &[]).await;

    assert_eq!(result, Err(ApiError::Unauthenticated));
}

// =========================================================================
// Resources
// =========================================================================

#[tokio::test]
async fn test_resource_create_posts_record() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/patientsClinic2"))
        .and(body_json(json!({ "name": "Abena", "phone": "024" })))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(json!({ "_id": "p1", "name": "Abena", "phone": "024" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let patients = Resource::patients(client_for(&server));
    let created: Value = patients
        .create("tok", &json!({ "name": "Abena", "phone": "024" }))
        .await
        .unwrap();

    assert_eq!(created["_id"], "p1");
}

#[tokio::test]
async fn test_resource_query_hits_sub_path() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/patientsClinic2/search/by-phone"))
        .and(query_param("phone", "+233 24"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "_id": "p1" }])))
        .expect(1)
        .mount(&server)
        .await;

    let found: Vec<Value> = Resource::patients(client_for(&server))
        .query("tok", "search/by-phone", &[("phone".into(), "+233 24".into())])
        .await
        .unwrap();

    assert_eq!(found.len(), 1);
}

#[tokio::test]
async fn test_resource_delete_with_empty_body_is_null() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/pharmacy/d42"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let deleted: Value = Resource::pharmacy(client_for(&server))
        .delete("tok", "d42")
        .await
        .unwrap();

    assert_eq!(deleted, Value::Null);
}

// =========================================================================
// Sales
// =========================================================================

#[tokio::test]
async fn test_sales_summary_reads_window_and_profit_paths() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/sales/last-7-days"))
        .and(header("authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "drugName": "Paracetamol", "profit": 2.5 }
        ])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/sales/profit/7days"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "totalProfit": 12.75 })))
        .expect(1)
        .mount(&server)
        .await;

    let summary = SalesApi::new(client_for(&server))
        .summary("tok", SalesRange::Last7)
        .await
        .unwrap();

    assert_eq!(summary.sales.len(), 1);
    assert_eq!(summary.total_profit, 12.75);
}

#[tokio::test]
async fn test_sales_profit_missing_total_is_zero() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/sales/profit/today"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let profit = SalesApi::new(client_for(&server))
        .profit("tok", SalesRange::Today)
        .await
        .unwrap();

    assert_eq!(profit, 0.0);
}

#[tokio::test]
async fn test_sales_record_posts_to_record_path() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/sales/record"))
        .and(body_json(json!({ "drugId": "d1", "quantity": 3 })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "_id": "s1" })))
        .expect(1)
        .mount(&server)
        .await;

    let sale: Value = SalesApi::new(client_for(&server))
        .record("tok", &json!({ "drugId": "d1", "quantity": 3 }))
        .await
        .unwrap();

    assert_eq!(sale["_id"], "s1");
}

#[test]
fn test_sales_summary_serializes_camel_case() {
    let summary = SalesSummary {
        sales: vec![],
        total_profit: 4.0,
    };
    assert_eq!(
        serde_json::to_value(&summary).unwrap(),
        json!({ "sales": [], "totalProfit": 4.0 })
    );
}
