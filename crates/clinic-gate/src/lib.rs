//! Navigation guard for the clinic console.
//!
//! The gate answers one question for the navigation layer: given the
//! current session, may this screen be shown? It reads the session
//! through a [`SessionView`](clinic_session::SessionView) and never
//! changes it.
//!
//! # Key types
//!
//! - [`GateDecision`]: the bare protected-route answer: pending, render
//!   or redirect to login
//! - [`AccessGate`]: decides navigations against a [`RouteTable`]
//! - [`Access`]: who may open a route (anyone, any signed-in user, or
//!   listed roles)

mod gate;
mod route;

pub use gate::{AccessGate, GateDecision, Navigation};
pub use route::{Access, Route, RouteTable};
