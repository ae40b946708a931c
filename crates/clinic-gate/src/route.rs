//! Route declarations.

use clinic_session::{Identity, Role};

/// Who may open a route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    /// Anyone, signed in or not.
    Public,
    /// Any signed-in user.
    Protected,
    /// Signed-in users holding one of these roles.
    Roles(Vec<Role>),
}

impl Access {
    /// Restricts a route to the given roles.
    pub fn roles<R: Into<Role>>(roles: impl IntoIterator<Item = R>) -> Self {
        Self::Roles(roles.into_iter().map(Into::into).collect())
    }

    /// Returns `true` if the route needs a session at all.
    pub fn requires_session(&self) -> bool {
        !matches!(self, Self::Public)
    }

    /// Whether `identity` may open the route, assuming it is signed in.
    pub fn admits(&self, identity: &Identity) -> bool {
        match self {
            Self::Public | Self::Protected => true,
            Self::Roles(roles) => roles.contains(&identity.role),
        }
    }
}

/// One navigable screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub path: String,
    pub access: Access,
    /// Menu label. Routes without one never show up in menus.
    pub label: Option<String>,
}

/// The set of routes the console knows, plus where the gate sends people.
///
/// ```
/// use clinic_gate::{Access, RouteTable};
///
/// let routes = RouteTable::new("/login", "/center")
///     .public("/intro")
///     .protected("/center")
///     .route("/reports", Access::roles(["Admin"]));
///
/// assert!(routes.get("/reports/").is_some());
/// assert!(routes.get("/nowhere").is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTable {
    routes: Vec<Route>,
    login_path: String,
    home_path: String,
}

impl RouteTable {
    /// An empty table. The login route is registered as public.
    pub fn new(login_path: impl Into<String>, home_path: impl Into<String>) -> Self {
        let login_path = normalize(&login_path.into()).to_string();
        let home_path = normalize(&home_path.into()).to_string();
        Self {
            routes: Vec::new(),
            login_path: login_path.clone(),
            home_path,
        }
        .public(login_path)
    }

    /// The console's screens, with `/login` and `/center`.
    pub fn console() -> Self {
        Self::console_at("/login", "/center")
    }

    /// The console's screens with custom login and home routes.
    ///
    /// Financial reports are limited to administrators; every other
    /// working screen is open to any signed-in user.
    pub fn console_at(login_path: impl Into<String>, home_path: impl Into<String>) -> Self {
        let home_path = home_path.into();
        Self::new(login_path, home_path.clone())
            .public("/")
            .public("/intro")
            .public("/register")
            .labelled(home_path, Access::Protected, "Home")
            .labelled("/dashboard", Access::Protected, "Dashboard")
            .labelled("/appointment", Access::Protected, "Appointments")
            .labelled("/patients", Access::Protected, "Patients")
            .labelled("/pharmacyview", Access::Protected, "Pharmacy")
            .labelled("/recordsale", Access::Protected, "Add Sales")
            .labelled("/lowstockpage", Access::Protected, "Lowstock Drugs")
            .labelled("/salesdashboard", Access::roles(["Admin"]), "Financial Reports")
    }

    /// Declares (or redeclares) a route.
    pub fn route(mut self, path: impl Into<String>, access: Access) -> Self {
        self.insert(Route {
            path: path.into(),
            access,
            label: None,
        });
        self
    }

    /// Declares a route that appears in menus under `label`.
    pub fn labelled(mut self, path: impl Into<String>, access: Access, label: impl Into<String>) -> Self {
        self.insert(Route {
            path: path.into(),
            access,
            label: Some(label.into()),
        });
        self
    }

    pub fn public(self, path: impl Into<String>) -> Self {
        self.route(path, Access::Public)
    }

    pub fn protected(self, path: impl Into<String>) -> Self {
        self.route(path, Access::Protected)
    }

    fn insert(&mut self, mut route: Route) {
        route.path = normalize(&route.path).to_string();
        match self.routes.iter_mut().find(|r| r.path == route.path) {
            Some(existing) => *existing = route,
            None => self.routes.push(route),
        }
    }

    /// Looks a path up, ignoring any query string, fragment or trailing
    /// slash.
    pub fn get(&self, path: &str) -> Option<&Route> {
        let path = normalize(path);
        self.routes.iter().find(|r| r.path == path)
    }

    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    pub fn home_path(&self) -> &str {
        &self.home_path
    }

    pub fn is_login(&self, path: &str) -> bool {
        normalize(path) == self.login_path
    }

    /// All routes in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter()
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::console()
    }
}

/// `/patients/?page=2#top` → `/patients`.
fn normalize(path: &str) -> &str {
    let end = path.find(['?', '#']).unwrap_or(path.len());
    let path = &path[..end];
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() { "/" } else { trimmed }
}
