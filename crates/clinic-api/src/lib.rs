//! REST plumbing for the clinic console.
//!
//! - **Client** ([`ApiClient`]): login (it is the
//!   [`CredentialVerifier`](clinic_session::CredentialVerifier) in
//!   production) and bearer-authenticated JSON calls.
//! - **Filters** ([`filter::FilterParams`]): named query constraints
//!   whose unconstrained values are left off the wire.
//! - **Resources** ([`Resource`]): CRUD wrappers for patients and
//!   pharmacy items.
//! - **Sales** ([`SalesApi`]): per-window sales and profit, reports,
//!   recording a sale.
//! - **Errors** ([`ApiError`]): transport, server and unauthenticated
//!   failures, each with a displayable message.
//!
//! # Architecture
//!
//! ```text
//! Fetchers / views → ApiClient (bearer token) → reqwest → backend
//! ```

mod client;
mod config;
mod error;
pub mod filter;
mod resource;
mod sales;

pub use client::{ApiClient, LOGIN_PATH};
pub use config::ApiConfig;
pub use error::{ApiError, ErrorKind};
pub use filter::{FilterParams, SalesRange, TimeFilter};
pub use resource::{Resource, PATIENTS_PATH, PHARMACY_PATH};
pub use sales::{SalesApi, SalesSummary, SALES_PATH};
