//! Thin CRUD wrappers for the console's record screens.
//!
//! Patients and pharmacy items are plain REST collections. The
//! console does not interpret their fields, so records default to
//! `serde_json::Value`; callers with their own record types can ask for
//! those instead, since every method is generic over the payload.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::{ApiClient, ApiError};

/// Patient records.
pub const PATIENTS_PATH: &str = "/api/patientsClinic2";
/// Pharmacy stock items.
pub const PHARMACY_PATH: &str = "/api/pharmacy";

/// One REST collection on the backend.
#[derive(Debug, Clone)]
pub struct Resource {
    client: ApiClient,
    path: String,
}

impl Resource {
    /// A collection rooted at `path`.
    pub fn new(client: ApiClient, path: impl Into<String>) -> Self {
        Self {
            client,
            path: path.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn patients(client: ApiClient) -> Self {
        Self::new(client, PATIENTS_PATH)
    }

    pub fn pharmacy(client: ApiClient) -> Self {
        Self::new(client, PHARMACY_PATH)
    }

    /// Collection root path.
    pub fn path(&self) -> &str {
        &self.path
    }

    fn item_path(&self, sub: &str) -> String {
        format!("{}/{}", self.path, sub.trim_start_matches('/'))
    }

    /// `GET /`: every record.
    pub async fn list<T: DeserializeOwned>(&self, token: &str) -> Result<T, ApiError> {
        self.client.get(&self.path, token, &[]).await
    }

    /// `GET /{id}`.
    pub async fn get<T: DeserializeOwned>(&self, token: &str, id: &str) -> Result<T, ApiError> {
        self.client.get(&self.item_path(id), token, &[]).await
    }

    /// `GET /{sub}?query`: searches and sub-reports such as
    /// `search/by-phone`, `filter` or `low-stock`.
    pub async fn query<T: DeserializeOwned>(
        &self,
        token: &str,
        sub: &str,
        query: &[(String, String)],
    ) -> Result<T, ApiError> {
        self.client.get(&self.item_path(sub), token, query).await
    }

    /// `POST /`: creates a record, returns the backend's copy.
    pub async fn create<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        token: &str,
        record: &B,
    ) -> Result<T, ApiError> {
        self.client.post(&self.path, token, record).await
    }

    /// `POST /{sub}`: actions nested under the collection, e.g.
    /// `{id}/treatment` for patients.
    pub async fn post_to<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        token: &str,
        sub: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.client.post(&self.item_path(sub), token, body).await
    }

    /// `PUT /{id}`.
    pub async fn update<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        token: &str,
        id: &str,
        record: &B,
    ) -> Result<T, ApiError> {
        self.client.put(&self.item_path(id), token, record).await
    }

    /// `DELETE /{id}` (or a nested path such as `{id}/vaccination/{index}`).
    pub async fn delete<T: DeserializeOwned>(&self, token: &str, id: &str) -> Result<T, ApiError> {
        self.client.delete(&self.item_path(id), token).await
    }
}
