//! Filtered data fetching for the clinic console.
//!
//! The dashboard and the sales screen both show server-filtered data
//! that must track a set of filter controls and the session token. This
//! crate implements that once:
//!
//! - [`FilteredFetcher`]: owns the parameters, issues requests,
//!   publishes [`FetchState`], discards stale responses
//! - [`Source`]: what actually performs a request; [`Endpoint`] is the
//!   generic HTTP one, [`SalesReport`] the sales screen's
//!
//! The fetcher only *reads* the session through a
//! [`SessionView`](clinic_session::SessionView). When a response says
//! the token is no longer accepted it reports
//! [`ApiError::Unauthenticated`](clinic_api::ApiError) and leaves the
//! decision to log out to its owner.

#![allow(async_fn_in_trait)]

mod fetcher;
mod source;

pub use fetcher::{FetchState, FilteredFetcher};
pub use source::{DASHBOARD_STATS_PATH, Endpoint, SalesReport, Source};
