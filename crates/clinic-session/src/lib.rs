//! Client-side session management for the clinic console.
//!
//! This crate handles the lifecycle of a signed-in user:
//!
//! 1. **Verification**: turning credentials into a token
//!    ([`CredentialVerifier`] trait, implemented by the HTTP client)
//! 2. **Session tracking**: who is signed in and until when
//!    ([`SessionManager`])
//! 3. **Persistence**: surviving restarts through a [`SessionStore`],
//!    and purging sessions that lapsed while the process was gone
//! 4. **Expiry**: one cancellable timer that signs the user out on time
//!
//! # How it fits in the stack
//!
//! ```text
//! Access gate / data fetchers (above)  ← read the session via SessionView
//!     ↕
//! Session layer (this crate)  ← owns the session state machine
//!     ↕
//! Session store (below)  ← durable mirror: user, token, expirationTime
//! ```

#![allow(async_fn_in_trait)]

mod auth;
mod clock;
mod error;
mod manager;
mod session;
pub mod store;
mod view;

pub use auth::CredentialVerifier;
pub use clock::{Clock, SystemClock, TokioClock};
pub use error::{SessionError, StoreError};
pub use manager::SessionManager;
pub use session::{AuthState, Credentials, Grant, Identity, Role, Session, SignOutReason};
pub use store::{FileStore, MemoryStore, SessionStore};
pub use view::SessionView;
