//! The sales endpoints.
//!
//! Sales are not a plain collection: the list and the profit total for
//! a window each live at their own path, and the dashboard reports
//! (top sellers, low stock, monthly profit) are separate reads.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::filter::SalesRange;
use crate::{ApiClient, ApiError};

/// Root of the sales endpoints.
pub const SALES_PATH: &str = "/api/sales";

/// One window of sales and the profit made in it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesSummary {
    pub sales: Vec<Value>,
    pub total_profit: f64,
}

/// Client for `/api/sales`.
#[derive(Debug, Clone)]
pub struct SalesApi {
    client: ApiClient,
}

impl SalesApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    fn path(sub: &str) -> String {
        format!("{SALES_PATH}/{sub}")
    }

    /// The sales list and profit for `range`, fetched one after the other.
    pub async fn summary(
        &self,
        token: &str,
        range: SalesRange,
    ) -> Result<SalesSummary, ApiError> {
        let sales = self.window(token, range).await?;
        let total_profit = self.profit(token, range).await?;
        Ok(SalesSummary {
            sales,
            total_profit,
        })
    }

    /// `GET /last-days/1`, `/last-7-days` or `/last-30-days`.
    pub async fn window<T: DeserializeOwned>(
        &self,
        token: &str,
        range: SalesRange,
    ) -> Result<T, ApiError> {
        self.client
            .get(&Self::path(range.sales_path()), token, &[])
            .await
    }

    /// `GET /last-days/{days}`.
    pub async fn last_days<T: DeserializeOwned>(
        &self,
        token: &str,
        days: u32,
    ) -> Result<T, ApiError> {
        self.client
            .get(&Self::path(&format!("last-days/{days}")), token, &[])
            .await
    }

    /// `GET /profit/...`: the window's `totalProfit`, zero when the
    /// backend sends none.
    pub async fn profit(&self, token: &str, range: SalesRange) -> Result<f64, ApiError> {
        let body: Value = self
            .client
            .get(&Self::path(range.profit_path()), token, &[])
            .await?;
        Ok(body
            .get("totalProfit")
            .and_then(Value::as_f64)
            .unwrap_or_default())
    }

    /// `GET /total-profit`.
    pub async fn total_profit<T: DeserializeOwned>(&self, token: &str) -> Result<T, ApiError> {
        self.client.get(&Self::path("total-profit"), token, &[]).await
    }

    /// `GET /top-selling`.
    pub async fn top_selling<T: DeserializeOwned>(&self, token: &str) -> Result<T, ApiError> {
        self.client.get(&Self::path("top-selling"), token, &[]).await
    }

    /// `GET /low-stock`.
    pub async fn low_stock<T: DeserializeOwned>(&self, token: &str) -> Result<T, ApiError> {
        self.client.get(&Self::path("low-stock"), token, &[]).await
    }

    /// `GET /monthly-profit`.
    pub async fn monthly_profit<T: DeserializeOwned>(&self, token: &str) -> Result<T, ApiError> {
        self.client.get(&Self::path("monthly-profit"), token, &[]).await
    }

    /// `POST /record`: records a sale, returns the backend's copy.
    pub async fn record<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        token: &str,
        sale: &B,
    ) -> Result<T, ApiError> {
        self.client.post(&Self::path("record"), token, sale).await
    }

    /// `DELETE /{id}`.
    pub async fn delete<T: DeserializeOwned>(&self, token: &str, id: &str) -> Result<T, ApiError> {
        self.client.delete(&Self::path(id), token).await
    }
}
