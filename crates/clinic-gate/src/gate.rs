//! The access gate.
//!
//! # Decision table
//!
//! ```text
//!                     Uninitialized   Unauthenticated     Authenticated
//! Public route        Render          Render              Render
//! Protected route     Pending         Redirect(login)     Render
//! Roles([..]) route   Pending         Redirect(login)     Render | Forbidden
//! Login route         Pending         Render              Redirect(home)
//! Unknown path        Pending         Redirect(login)     Redirect(home)
//! ```
//!
//! `Pending` means "show a placeholder and ask again once the session has
//! been restored". The gate never redirects while the session state is
//! still unknown.

use std::sync::Arc;

use clinic_session::{AuthState, SessionView};

use crate::{Access, Route, RouteTable};

// ---------------------------------------------------------------------------
// Decisions
// ---------------------------------------------------------------------------

/// Outcome of gating one protected screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// The session has not been restored yet.
    Pending,
    Render,
    RedirectToLogin,
}

impl GateDecision {
    /// Gates a protected screen on `state`.
    pub fn for_state(state: &AuthState) -> Self {
        match state {
            AuthState::Uninitialized => Self::Pending,
            AuthState::Unauthenticated { .. } => Self::RedirectToLogin,
            AuthState::Authenticated(_) => Self::Render,
        }
    }
}

/// Outcome of a navigation through the [`RouteTable`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    Render,
    Pending,
    /// Replace the current location with `to`.
    Redirect { to: String },
    /// Signed in, but the role may not open this route.
    Forbidden,
}

// ---------------------------------------------------------------------------
// AccessGate
// ---------------------------------------------------------------------------

/// Decides navigations from the live session state.
///
/// Cheap to clone. Holds only a [`SessionView`], so it cannot log anyone
/// in or out.
#[derive(Debug, Clone)]
pub struct AccessGate {
    session: SessionView,
    routes: Arc<RouteTable>,
}

impl AccessGate {
    pub fn new(session: SessionView, routes: RouteTable) -> Self {
        Self {
            session,
            routes: Arc::new(routes),
        }
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Gates a protected screen on the current state.
    pub fn decide(&self) -> GateDecision {
        self.session.with_state(GateDecision::for_state)
    }

    /// Decides a navigation to `path` on the current state.
    pub fn navigate(&self, path: &str) -> Navigation {
        self.session.with_state(|state| self.navigate_with(path, state))
    }

    /// Decides a navigation to `path` for an explicit `state`.
    pub fn navigate_with(&self, path: &str, state: &AuthState) -> Navigation {
        let routes = &*self.routes;
        let decision = match routes.get(path) {
            _ if routes.is_login(path) => self.login_screen(state),
            Some(route) => self.route_screen(route, state),
            // Anything unknown lands on the login screen.
            None => match self.login_screen(state) {
                Navigation::Render => Navigation::Redirect {
                    to: routes.login_path().to_string(),
                },
                other => other,
            },
        };
        tracing::debug!(path, ?decision, "navigation decided");
        decision
    }

    fn login_screen(&self, state: &AuthState) -> Navigation {
        match state {
            AuthState::Uninitialized => Navigation::Pending,
            AuthState::Unauthenticated { .. } => Navigation::Render,
            AuthState::Authenticated(_) => Navigation::Redirect {
                to: self.routes.home_path().to_string(),
            },
        }
    }

    fn route_screen(&self, route: &Route, state: &AuthState) -> Navigation {
        if !route.access.requires_session() {
            return Navigation::Render;
        }
        match GateDecision::for_state(state) {
            GateDecision::Pending => Navigation::Pending,
            GateDecision::RedirectToLogin => Navigation::Redirect {
                to: self.routes.login_path().to_string(),
            },
            GateDecision::Render => match state.identity() {
                Some(identity) if route.access.admits(identity) => Navigation::Render,
                _ => Navigation::Forbidden,
            },
        }
    }

    /// Waits until the session has been restored, then decides.
    ///
    /// Never returns [`Navigation::Pending`] unless the session manager
    /// was dropped before restoring.
    pub async fn wait_decision(&self, path: &str) -> Navigation {
        let mut session = self.session.clone();
        let state = session.wait_initialized().await;
        self.navigate_with(path, &state)
    }

    /// Menu entries the current user may open.
    pub fn visible_routes(&self) -> Vec<Route> {
        self.session.with_state(|state| self.visible_routes_for(state))
    }

    /// Menu entries `state` may open: labelled routes that would render.
    pub fn visible_routes_for(&self, state: &AuthState) -> Vec<Route> {
        self.routes
            .iter()
            .filter(|route| route.label.is_some())
            .filter(|route| match (&route.access, state.identity()) {
                (Access::Public, _) => true,
                (access, Some(identity)) => access.admits(identity),
                (_, None) => false,
            })
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use clinic_session::{Identity, Session, SignOutReason};

    fn signed_in(role: &str) -> AuthState {
        AuthState::Authenticated(Session {
            identity: Identity::with_role(role),
            token: "tok".into(),
            issued_at: None,
            expires_at: DateTime::<Utc>::MAX_UTC,
        })
    }

    fn signed_out() -> AuthState {
        AuthState::Unauthenticated {
            reason: SignOutReason::Absent,
        }
    }

    fn gate() -> AccessGate {
        AccessGate::new(SessionView::fixed(AuthState::Uninitialized), RouteTable::console())
    }

    fn redirect(to: &str) -> Navigation {
        Navigation::Redirect { to: to.into() }
    }

    #[test]
    fn test_for_state_covers_every_state() {
        assert_eq!(GateDecision::for_state(&AuthState::Uninitialized), GateDecision::Pending);
        assert_eq!(GateDecision::for_state(&signed_out()), GateDecision::RedirectToLogin);
        assert_eq!(GateDecision::for_state(&signed_in("Admin")), GateDecision::Render);
    }

    #[test]
    fn test_protected_while_uninitialized_is_pending() {
        let gate = gate();
        assert_eq!(gate.decide(), GateDecision::Pending);
        assert_eq!(gate.navigate("/dashboard"), Navigation::Pending);
        assert_eq!(gate.navigate("/salesdashboard"), Navigation::Pending);
    }

    #[test]
    fn test_protected_signed_out_redirects_to_login() {
        let gate = gate();
        assert_eq!(
            gate.navigate_with("/patients", &signed_out()),
            redirect("/login")
        );
    }

    #[test]
    fn test_public_renders_in_every_state() {
        let gate = gate();
        for state in [AuthState::Uninitialized, signed_out(), signed_in("Nurse")] {
            assert_eq!(gate.navigate_with("/intro", &state), Navigation::Render);
        }
    }

    #[test]
    fn test_role_route_forbids_other_roles() {
        let gate = gate();
        assert_eq!(
            gate.navigate_with("/salesdashboard", &signed_in("Nurse")),
            Navigation::Forbidden
        );
        assert_eq!(
            gate.navigate_with("/salesdashboard", &signed_in("Admin")),
            Navigation::Render
        );
    }

    #[test]
    fn test_login_while_signed_in_goes_home() {
        let gate = gate();
        assert_eq!(gate.navigate_with("/login", &signed_in("Admin")), redirect("/center"));
        assert_eq!(gate.navigate_with("/login", &signed_out()), Navigation::Render);
        assert_eq!(gate.navigate_with("/login", &AuthState::Uninitialized), Navigation::Pending);
    }

    #[test]
    fn test_unknown_path_falls_back_to_login() {
        let gate = gate();
        assert_eq!(gate.navigate_with("/nowhere", &signed_out()), redirect("/login"));
        assert_eq!(gate.navigate_with("/nowhere", &signed_in("Admin")), redirect("/center"));
        assert_eq!(
            gate.navigate_with("/nowhere", &AuthState::Uninitialized),
            Navigation::Pending
        );
    }

    #[test]
    fn test_visible_routes_follow_role() {
        let gate = gate();
        let paths = |state: &AuthState| -> Vec<String> {
            gate.visible_routes_for(state)
                .into_iter()
                .map(|r| r.path)
                .collect()
        };

        assert!(paths(&signed_out()).is_empty());
        assert!(!paths(&signed_in("Nurse")).contains(&"/salesdashboard".to_string()));
        assert!(paths(&signed_in("Admin")).contains(&"/salesdashboard".to_string()));
        assert!(paths(&signed_in("Nurse")).contains(&"/patients".to_string()));
    }
}
