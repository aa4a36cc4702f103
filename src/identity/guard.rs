use std::collections::BTreeSet;

use crate::gateway::{login_redirect, Navigator};

use super::principal::UserSnapshot;
use super::session::Session;

/// Roles a route accepts. Empty means any authenticated user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleRequirement {
    // lowercased for case-insensitive matching
    roles: BTreeSet<String>,
}

impl RoleRequirement {
    pub fn authenticated() -> Self { Self::default() }

    pub fn any_of<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self { roles: roles.into_iter().map(|r| r.as_ref().trim().to_ascii_lowercase()).filter(|r| !r.is_empty()).collect() }
    }

    pub fn is_empty(&self) -> bool { self.roles.is_empty() }

    pub fn is_satisfied_by(&self, user: &UserSnapshot) -> bool {
        self.is_empty() || user.roles.iter().any(|r| self.roles.contains(&r.to_ascii_lowercase()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectedRoute {
    pub path: String,
    pub requirement: RoleRequirement,
}

impl ProtectedRoute {
    pub fn new(path: impl Into<String>, requirement: RoleRequirement) -> Self {
        Self { path: path.into(), requirement }
    }

    /// Segment-wise prefix match: `/admin` covers `/admin` and `/admin/users`, not `/administrator`.
    pub fn covers(&self, location: &str) -> bool {
        let path = location.split(&['?', '#'][..]).next().unwrap_or(location);
        let base = self.path.trim_end_matches('/');
        if base.is_empty() {
            return true;
        }
        path == base || path.strip_prefix(base).is_some_and(|rest| rest.starts_with('/'))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    Loading,
    Unauthenticated,
    Authenticated,
}

impl GuardState {
    pub fn of(session: &Session) -> Self {
        if session.is_loading {
            GuardState::Loading
        } else if session.is_authenticated && session.user.is_some() {
            GuardState::Authenticated
        } else {
            GuardState::Unauthenticated
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Session hydration or an auth workflow is in flight; show a neutral waiting view.
    Wait,
    /// Send the user to `to` (the login route), remembering `from`.
    Redirect { to: String, from: String },
    Render,
    /// Terminal: authenticated but lacking every required role. No redirect.
    Forbidden,
}

/// Role-based gate for protected views. A pure function of the session and the route.
#[derive(Debug, Clone)]
pub struct RouteGuard {
    login_route: String,
}

impl RouteGuard {
    pub fn new(login_route: impl Into<String>) -> Self { Self { login_route: login_route.into() } }

    pub fn check(&self, session: &Session, route: &ProtectedRoute, requested: &str) -> GuardDecision {
        match GuardState::of(session) {
            GuardState::Loading => GuardDecision::Wait,
            GuardState::Unauthenticated => GuardDecision::Redirect {
                to: login_redirect(&self.login_route, Some(requested)),
                from: requested.to_string(),
            },
            GuardState::Authenticated => match &session.user {
                Some(user) if route.requirement.is_satisfied_by(user) => GuardDecision::Render,
                _ => GuardDecision::Forbidden,
            },
        }
    }

    /// Render a decision. A redirect asks the navigator to move and shows the waiting view
    /// meanwhile.
    pub fn view<V>(
        &self,
        session: &Session,
        route: &ProtectedRoute,
        requested: &str,
        navigator: &dyn Navigator,
        waiting: impl FnOnce() -> V,
        content: impl FnOnce() -> V,
        forbidden: impl FnOnce() -> V,
    ) -> V {
        match self.check(session, route, requested) {
            GuardDecision::Wait => waiting(),
            GuardDecision::Redirect { to, .. } => {
                navigator.navigate(&to);
                waiting()
            }
            GuardDecision::Render => content(),
            GuardDecision::Forbidden => forbidden(),
        }
    }
}

/// The application's protected routes. Anything not listed is public.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<ProtectedRoute>,
}

impl RouteTable {
    pub fn new() -> Self { Self::default() }

    pub fn protect(mut self, path: impl Into<String>, requirement: RoleRequirement) -> Self {
        self.routes.push(ProtectedRoute::new(path, requirement));
        self
    }

    /// Most specific route covering `location`.
    pub fn resolve(&self, location: &str) -> Option<&ProtectedRoute> {
        self.routes
            .iter()
            .filter(|r| r.covers(location))
            .max_by_key(|r| r.path.trim_end_matches('/').len())
    }

    /// Public locations always render; protected ones go through the guard.
    pub fn check(&self, guard: &RouteGuard, session: &Session, location: &str) -> GuardDecision {
        match self.resolve(location) {
            Some(route) => guard.check(session, route, location),
            None => GuardDecision::Render,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::History;

    fn authed(roles: &[&str]) -> Session {
        Session {
            user: Some(UserSnapshot::new("1", "a@b.com", roles.iter().map(|r| r.to_string()).collect())),
            is_authenticated: true,
            is_loading: false,
        }
    }

    fn anonymous() -> Session { Session { user: None, is_authenticated: false, is_loading: false } }

    fn loading() -> Session { Session { user: None, is_authenticated: false, is_loading: true } }

    #[test]
    fn loading_waits() {
        let g = RouteGuard::new("/login");
        let r = ProtectedRoute::new("/dashboard", RoleRequirement::authenticated());
        assert_eq!(g.check(&loading(), &r, "/dashboard"), GuardDecision::Wait);
        // an auth workflow in flight also waits, even with a user present
        let mut s = authed(&["USER"]);
        s.is_loading = true;
        assert_eq!(g.check(&s, &r, "/dashboard"), GuardDecision::Wait);
    }

    #[test]
    fn unauthenticated_redirects_with_origin() {
        let g = RouteGuard::new("/login");
        let r = ProtectedRoute::new("/reservations", RoleRequirement::authenticated());
        assert_eq!(
            g.check(&anonymous(), &r, "/reservations/44"),
            GuardDecision::Redirect { to: "/login?from=%2Freservations%2F44".into(), from: "/reservations/44".into() }
        );
    }

    #[test]
    fn role_intersection_renders_or_forbids() {
        let g = RouteGuard::new("/login");
        let admin = ProtectedRoute::new("/admin", RoleRequirement::any_of(["ADMIN", "SUPER_ADMIN"]));
        assert_eq!(g.check(&authed(&["admin"]), &admin, "/admin"), GuardDecision::Render);
        assert_eq!(g.check(&authed(&["USER", "SUPER_ADMIN"]), &admin, "/admin"), GuardDecision::Render);
        assert_eq!(g.check(&authed(&["USER"]), &admin, "/admin"), GuardDecision::Forbidden);
        assert_eq!(g.check(&authed(&[]), &admin, "/admin"), GuardDecision::Forbidden);

        let any = ProtectedRoute::new("/profile", RoleRequirement::any_of(Vec::<String>::new()));
        assert_eq!(g.check(&authed(&[]), &any, "/profile"), GuardDecision::Render);
    }

    #[test]
    fn view_drives_navigation_only_on_redirect() {
        let g = RouteGuard::new("/login");
        let r = ProtectedRoute::new("/doctor", RoleRequirement::any_of(["DOCTOR"]));
        let nav = History::starting_at("/doctor");

        let v = g.view(&authed(&["USER"]), &r, "/doctor", &nav, || "wait", || "content", || "forbidden");
        assert_eq!(v, "forbidden");
        assert_eq!(nav.entries().len(), 1);

        let v = g.view(&anonymous(), &r, "/doctor", &nav, || "wait", || "content", || "forbidden");
        assert_eq!(v, "wait");
        assert_eq!(nav.current_location().as_deref(), Some("/login?from=%2Fdoctor"));

        let v = g.view(&authed(&["Doctor"]), &r, "/doctor", &nav, || "wait", || "content", || "forbidden");
        assert_eq!(v, "content");
    }

    #[test]
    fn table_resolves_most_specific_route() {
        let table = RouteTable::new()
            .protect("/dashboard", RoleRequirement::authenticated())
            .protect("/admin", RoleRequirement::any_of(["ADMIN"]))
            .protect("/admin/reports", RoleRequirement::any_of(["ADMIN", "AUDITOR"]));
        assert_eq!(table.resolve("/admin/reports?year=2026").unwrap().path, "/admin/reports");
        assert_eq!(table.resolve("/admin/users").unwrap().path, "/admin");
        assert!(table.resolve("/administrator").is_none());
        assert!(table.resolve("/hospitals").is_none());

        let g = RouteGuard::new("/login");
        assert_eq!(table.check(&g, &anonymous(), "/hospitals"), GuardDecision::Render);
        assert_eq!(table.check(&g, &g_session_auditor(), "/admin/reports"), GuardDecision::Render);
        assert_eq!(table.check(&g, &g_session_auditor(), "/admin/users"), GuardDecision::Forbidden);
    }

    fn g_session_auditor() -> Session { authed(&["AUDITOR"]) }
}
