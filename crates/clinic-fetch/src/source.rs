//! Where a filtered view gets its data from.

use std::marker::PhantomData;

use clinic_api::{ApiClient, ApiError, FilterParams, SalesApi, SalesRange, SalesSummary};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Dashboard statistics endpoint.
pub const DASHBOARD_STATS_PATH: &str = "/api/dashboard/stats";

/// Performs one request for one parameter set.
///
/// The fetcher calls this from a spawned task, so the returned future
/// must be `Send`, and the source itself is shared (`Sync`).
pub trait Source: Send + Sync + 'static {
    /// What a successful request yields.
    type Output: Send + Sync + 'static;

    /// Fetches data for `params` using bearer `token`.
    fn fetch(
        &self,
        token: &str,
        params: &FilterParams,
    ) -> impl std::future::Future<Output = Result<Self::Output, ApiError>> + Send;
}

/// A `GET` endpoint taking the filter set as query parameters.
///
/// `T` is the decoded body, `serde_json::Value` unless the caller has a
/// concrete type for it.
#[derive(Debug)]
pub struct Endpoint<T = Value> {
    client: ApiClient,
    path: String,
    // `fn() -> T` keeps the endpoint Send + Sync whatever `T` is.
    _output: PhantomData<fn() -> T>,
}

impl<T> Clone for Endpoint<T> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            path: self.path.clone(),
            _output: PhantomData,
        }
    }
}

impl<T> Endpoint<T> {
    pub fn new(client: ApiClient, path: impl Into<String>) -> Self {
        Self {
            client,
            path: path.into(),
            _output: PhantomData,
        }
    }

    /// `GET /api/dashboard/stats`.
    pub fn dashboard(client: ApiClient) -> Self {
        Self::new(client, DASHBOARD_STATS_PATH)
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl<T: DeserializeOwned + Send + Sync + 'static> Source for Endpoint<T> {
    type Output = T;

    async fn fetch(&self, token: &str, params: &FilterParams) -> Result<T, ApiError> {
        self.client
            .get(&self.path, token, &params.query_pairs())
            .await
    }
}

/// The sales screen: the window named by the
/// [`SALES_RANGE`](clinic_api::filter::SALES_RANGE) parameter, with its
/// profit total.
#[derive(Debug, Clone)]
pub struct SalesReport {
    api: SalesApi,
}

impl SalesReport {
    pub fn new(client: ApiClient) -> Self {
        Self {
            api: SalesApi::new(client),
        }
    }
}

impl Source for SalesReport {
    type Output = SalesSummary;

    async fn fetch(&self, token: &str, params: &FilterParams) -> Result<SalesSummary, ApiError> {
        let range = params.sales_range().unwrap_or_else(|| {
            tracing::warn!(
                range = ?params.get(clinic_api::filter::SALES_RANGE),
                "unknown sales range, showing today"
            );
            SalesRange::default()
        });
        self.api.summary(token, range).await
    }
}
