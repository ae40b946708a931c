//! Session types: the data structures that describe who is signed in.
//!
//! A "session" is the client's record of an authenticated user. It tracks:
//! - WHO the user is ([`Identity`], which always carries a [`Role`])
//! - HOW requests prove it (an opaque bearer `token`)
//! - UNTIL WHEN it is valid (`expires_at`, an absolute wall-clock instant)

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Role / Identity
// ---------------------------------------------------------------------------

/// The permission tag attached to every identity (`"Admin"`, `"Doctor"`, ...).
///
/// The set of roles is owned by the backend, so this is a string newtype
/// rather than an enum: an unknown role still round-trips through storage
/// and simply fails role checks in the gate.
///
/// `#[serde(transparent)]` stores a `Role("Admin")` as just `"Admin"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(pub String);

impl Role {
    /// Creates a role from anything string-like.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the role name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Role {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// The signed-in user's record, as returned by the credential verifier.
///
/// Only `role` is interpreted by this crate. Every other field the backend
/// sends (name, email, clinic id, ...) is kept verbatim in `attributes`
/// thanks to `#[serde(flatten)]`, so the record survives a trip through
/// the session store without this crate knowing its shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    /// Permission tag used by role-gated navigation.
    pub role: Role,

    /// Remaining fields of the user record, untouched.
    #[serde(flatten)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

impl Identity {
    /// Creates an identity with a role and no other attributes.
    pub fn with_role(role: impl Into<Role>) -> Self {
        Self {
            role: role.into(),
            attributes: serde_json::Map::new(),
        }
    }

    /// Adds a single attribute (builder style).
    pub fn attribute(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Looks up a string attribute such as `"email"` or `"name"`.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(|v| v.as_str())
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// An authenticated session held by the client.
///
/// A session is *valid* while `now < expires_at` and *expired* from
/// `expires_at` on. Expired sessions are never handed out: the
/// [`SessionManager`](crate::SessionManager) purges them as soon as it
/// notices (timer or restore).
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    /// Who is signed in.
    pub identity: Identity,

    /// Bearer credential attached to every authenticated request.
    pub token: String,

    /// When the session was issued.
    ///
    /// Only known for sessions created in this process; `None` after a
    /// restore, because the store keeps just identity, token and expiry.
    pub issued_at: Option<DateTime<Utc>>,

    /// Absolute instant at which the session stops being valid.
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Returns `true` if the session is still valid at `now`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    /// Time left before expiry, or `None` if the session has lapsed.
    ///
    /// `chrono::TimeDelta::to_std` fails for negative spans, which is
    /// exactly the "already expired" case.
    pub fn remaining_at(&self, now: DateTime<Utc>) -> Option<Duration> {
        if !self.is_valid_at(now) {
            return None;
        }
        (self.expires_at - now).to_std().ok()
    }
}

// ---------------------------------------------------------------------------
// AuthState
// ---------------------------------------------------------------------------

/// Why the client is currently unauthenticated.
///
/// The gate treats all three identically (redirect to login); views use
/// the reason to pick a message, e.g. "please sign in again" for
/// [`SignOutReason::Expired`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignOutReason {
    /// Nothing was ever signed in (or the store held nothing usable).
    Absent,
    /// The user logged out explicitly, or a request was rejected as
    /// unauthenticated and the caller logged out.
    SignedOut,
    /// The session reached its expiry instant.
    Expired,
}

/// The session manager's state machine, as observed by everyone else.
///
/// ```text
///   Uninitialized ──restore()──→ Unauthenticated ──login()──→ Authenticated
///         │                            ↑                           │
///         └──────restore()─────────────┼───────────────────────────┤
///                                      └──logout() / expiry────────┘
/// ```
///
/// `Uninitialized` only exists until [`restore`](crate::SessionManager::restore)
/// has run. The access gate must not make a decision while in this state.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthState {
    /// Persisted state has not been read yet.
    Uninitialized,
    /// No usable session.
    Unauthenticated { reason: SignOutReason },
    /// A valid session is active.
    Authenticated(Session),
}

impl AuthState {
    /// Returns `true` once `restore()` has run.
    pub fn is_initialized(&self) -> bool {
        !matches!(self, Self::Uninitialized)
    }

    /// Returns `true` if a session is active.
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }

    /// The active session, if any.
    pub fn session(&self) -> Option<&Session> {
        match self {
            Self::Authenticated(session) => Some(session),
            _ => None,
        }
    }

    /// The active bearer token, if any.
    pub fn token(&self) -> Option<&str> {
        self.session().map(|s| s.token.as_str())
    }

    /// The active identity, if any.
    pub fn identity(&self) -> Option<&Identity> {
        self.session().map(|s| &s.identity)
    }
}

// ---------------------------------------------------------------------------
// Credentials / Grant
// ---------------------------------------------------------------------------

/// What the user types into the login form.
#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
    /// Optional role selector; omitted from the request when `None`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

impl Credentials {
    /// Credentials without a role selector.
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            role: None,
        }
    }

    /// Sets the role selector (builder style).
    pub fn with_role(mut self, role: impl Into<Role>) -> Self {
        self.role = Some(role.into());
        self
    }
}

/// A successful verification: everything needed to call `login`.
#[derive(Debug, Clone, PartialEq)]
pub struct Grant {
    pub identity: Identity,
    pub token: String,
    /// Validity window of the token.
    pub ttl: Duration,
}
