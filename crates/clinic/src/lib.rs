//! # Clinic
//!
//! Session-aware client core for the clinic management console.
//!
//! A [`Console`] owns one session, keeps it persisted and expires it on
//! time, gates navigation on it, and keeps the dashboard and sales views
//! fetched for the latest filters. Everything a view layer needs is
//! reachable from it.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use clinic::prelude::*;
//!
//! # async fn run() -> Result<(), ClinicError> {
//! let console = Console::builder()
//!     .config(ConsoleConfig::from_env())
//!     .build()
//!     .await?;
//!
//! // Restored before `build` returned, so this is never `Pending`.
//! match console.navigate("/dashboard") {
//!     Navigation::Render => { /* show it */ }
//!     Navigation::Redirect { to } => println!("go to {to}"),
//!     other => println!("{other:?}"),
//! }
//! # Ok(())
//! # }
//! ```

mod config;
mod console;
mod error;

pub use config::{ConsoleConfig, ENV_API_URL, ENV_HTTP_TIMEOUT_SECS, ENV_SESSION_FILE};
pub use console::{Console, ConsoleBuilder, SalesFetcher, ViewFetcher};
pub use error::ClinicError;

/// Everything needed to drive a console.
pub mod prelude {
    pub use crate::{
        ClinicError, Console, ConsoleBuilder, ConsoleConfig, SalesFetcher, ViewFetcher,
    };
    pub use clinic_api::filter::{DISTRICT, REGION, SALES_RANGE, TIME_FILTER};
    pub use clinic_api::{
        ApiConfig, ApiError, ErrorKind, FilterParams, Resource, SalesApi, SalesRange,
        SalesSummary, TimeFilter,
    };
    pub use clinic_fetch::FetchState;
    pub use clinic_gate::{Access, AccessGate, GateDecision, Navigation, RouteTable};
    pub use clinic_session::{
        AuthState, Credentials, FileStore, Identity, MemoryStore, Role, Session,
        SessionManager, SessionStore, SignOutReason,
    };
}
