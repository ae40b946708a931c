//! HTTP client for the clinic backend.

use std::time::Duration;

use clinic_session::{CredentialVerifier, Credentials, Grant, Identity, SessionError};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{ApiConfig, ApiError};

/// Login endpoint (the credential verifier).
pub const LOGIN_PATH: &str = "/api/user/login-user";

/// Successful login body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    user: Identity,
    token: String,
    /// Seconds.
    expires_in: u64,
}

/// Clinic backend client.
///
/// Cheap to clone: `reqwest::Client` is an `Arc` around a connection pool.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    config: ApiConfig,
}

impl ApiClient {
    /// Builds a client for `config`.
    ///
    /// # Errors
    /// Returns [`ApiError::Transport`] if the TLS backend fails to
    /// initialize.
    pub fn new(config: ApiConfig) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        Ok(Self { http, config })
    }

    /// The settings this client was built with.
    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// Posts credentials to the login endpoint.
    ///
    /// Any non-2xx answer (401 included) is a rejection carrying the
    /// backend's message; only failing to get an answer at all is
    /// [`SessionError::VerifierUnavailable`].
    pub async fn login(&self, credentials: &Credentials) -> Result<Grant, SessionError> {
        let request = self.http.post(self.config.url(LOGIN_PATH)).json(credentials);
        let (status, body) = self
            .send(request)
            .await
            .map_err(|e| SessionError::VerifierUnavailable(e.to_string()))?;

        if !status.is_success() {
            let message = server_message(&body).unwrap_or_else(|| "Login failed".to_string());
            return Err(SessionError::InvalidCredentials(message));
        }

        let login: LoginResponse = serde_json::from_slice(&body).map_err(|e| {
            SessionError::VerifierUnavailable(format!("unexpected login response: {e}"))
        })?;
        tracing::debug!(role = %login.user.role, expires_in = login.expires_in, "login accepted");
        Ok(Grant {
            identity: login.user,
            token: login.token,
            ttl: Duration::from_secs(login.expires_in),
        })
    }

    /// Authenticated `GET` with query parameters.
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        token: &str,
        query: &[(String, String)],
    ) -> Result<T, ApiError> {
        self.call(Method::GET, path, token, |req| req.query(query)).await
    }

    /// Authenticated `POST` with a JSON body.
    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        token: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.call(Method::POST, path, token, |req| req.json(body)).await
    }

    /// Authenticated `PUT` with a JSON body.
    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        token: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.call(Method::PUT, path, token, |req| req.json(body)).await
    }

    /// Authenticated `DELETE`.
    pub async fn delete<T: DeserializeOwned>(&self, path: &str, token: &str) -> Result<T, ApiError> {
        self.call(Method::DELETE, path, token, |req| req).await
    }

    /// Shared path of every authenticated call.
    ///
    /// An empty token fails fast: no request is sent.
    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        token: &str,
        build: impl FnOnce(RequestBuilder) -> RequestBuilder,
    ) -> Result<T, ApiError> {
        if token.is_empty() {
            return Err(ApiError::Unauthenticated);
        }

        let request = build(
            self.http
                .request(method.clone(), self.config.url(path))
                .bearer_auth(token),
        );
        let (status, body) = self.send(request).await?;
        tracing::debug!(%method, path, status = status.as_u16(), "api call finished");

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ApiError::Unauthenticated);
        }
        if !status.is_success() {
            let message = server_message(&body).unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("Request failed")
                    .to_string()
            });
            return Err(ApiError::Server {
                status: status.as_u16(),
                message,
            });
        }

        // `204 No Content` and friends decode as JSON `null`.
        let body: &[u8] = if body.is_empty() { b"null" } else { &body };
        serde_json::from_slice(body).map_err(|e| ApiError::Decode(e.to_string()))
    }

    /// Sends a request and reads the whole body.
    async fn send(&self, request: RequestBuilder) -> Result<(StatusCode, Vec<u8>), ApiError> {
        let response = request
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        Ok((status, body.to_vec()))
    }
}

impl CredentialVerifier for ApiClient {
    async fn verify(&self, credentials: &Credentials) -> Result<Grant, SessionError> {
        self.login(credentials).await
    }
}

/// Pulls a human-readable message out of an error body.
///
/// The backend is not consistent: sometimes `{"error": ...}`, sometimes
/// `{"message": ...}`, sometimes a bare JSON string or plain text.
fn server_message(body: &[u8]) -> Option<String> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => ["error", "message"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_str))
            .map(str::to_owned),
        Ok(Value::String(text)) => Some(text),
        Ok(_) => None,
        Err(_) => {
            let text = String::from_utf8_lossy(body);
            let text = text.trim();
            (!text.is_empty()).then(|| text.to_string())
        }
    }
}
