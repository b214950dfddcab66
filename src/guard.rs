//! Navigation Guard Module
//!
//! Decides, before each in-app navigation, whether the destination may be
//! shown. The decision only looks at the stored session; it never waits on
//! the network.

use std::sync::Arc;

use tracing::debug;

use crate::auth::SessionStore;

/// Outcome of a navigation check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    RedirectTo(String),
}

/// Views known to the dashboard
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Login,
    Register,
    Chat,
    Data,
    MatchDetail(String),
    Stats,
}

impl Route {
    /// Resolve a normalized path to a view. `/` lands on the chat view.
    pub fn parse(path: &str) -> Option<Route> {
        let path = normalize_path(path);
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        match segments.as_slice() {
            [] | ["chat"] => Some(Route::Chat),
            ["login"] => Some(Route::Login),
            ["register"] => Some(Route::Register),
            ["data"] => Some(Route::Data),
            ["stats"] => Some(Route::Stats),
            ["match", id] => Some(Route::MatchDetail(id.to_string())),
            _ => None,
        }
    }

    pub fn path(&self) -> String {
        match self {
            Route::Login => "/login".to_string(),
            Route::Register => "/register".to_string(),
            Route::Chat => "/chat".to_string(),
            Route::Data => "/data".to_string(),
            Route::MatchDetail(id) => format!("/match/{}", id),
            Route::Stats => "/stats".to_string(),
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Route::Login => "Login",
            Route::Register => "Register",
            Route::Chat => "AI Assistant",
            Route::Data => "Match Data",
            Route::MatchDetail(_) => "Match Detail",
            Route::Stats => "Statistics",
        }
    }
}

/// Strip query and fragment, force a leading slash, drop trailing slashes
pub fn normalize_path(path: &str) -> String {
    let path = path
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .trim();
    let trimmed = path.trim_matches('/');
    format!("/{}", trimmed)
}

pub struct NavigationGuard {
    session: Arc<SessionStore>,
    public_paths: Vec<String>,
    login_path: String,
}

impl NavigationGuard {
    /// Guard with the default public set: login, register and chat
    pub fn new(session: Arc<SessionStore>, login_path: &str) -> Self {
        let login_path = normalize_path(login_path);
        let public_paths = vec![login_path.clone(), "/register".to_string(), "/chat".to_string()];
        Self {
            session,
            public_paths,
            login_path,
        }
    }

    /// Replace the set of destinations reachable without a session
    pub fn with_public_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.public_paths = paths.into_iter().map(|p| normalize_path(p.as_ref())).collect();
        self
    }

    pub fn is_public(&self, destination: &str) -> bool {
        let destination = normalize_path(destination);
        self.public_paths.iter().any(|p| *p == destination)
    }

    /// Evaluate a navigation to `destination`
    pub fn check(&self, destination: &str) -> GuardDecision {
        let destination = resolve(destination);

        if self.is_public(&destination) {
            return GuardDecision::Allow;
        }

        if !self.session.is_authenticated() {
            debug!("Blocked navigation to {} without a session", destination);
            return GuardDecision::RedirectTo(self.login_path.clone());
        }

        GuardDecision::Allow
    }
}

/// Apply static redirects before the guard sees the destination
fn resolve(destination: &str) -> String {
    let path = normalize_path(destination);
    if path == "/" {
        Route::Chat.path()
    } else {
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn guard() -> (Arc<SessionStore>, NavigationGuard) {
        let session = Arc::new(SessionStore::new(Arc::new(MemoryStorage::new())));
        let guard = NavigationGuard::new(session.clone(), "/login");
        (session, guard)
    }

    #[test]
    fn public_views_need_no_session() {
        let (_, guard) = guard();
        for destination in ["chat", "/login", "/register/", "/chat?session=42"] {
            assert_eq!(guard.check(destination), GuardDecision::Allow, "{}", destination);
        }
    }

    #[test]
    fn root_resolves_to_chat() {
        let (_, guard) = guard();
        assert_eq!(guard.check("/"), GuardDecision::Allow);
    }

    #[test]
    fn protected_view_redirects_without_session() {
        let (_, guard) = guard();
        assert_eq!(
            guard.check("stats"),
            GuardDecision::RedirectTo("/login".to_string())
        );
        assert_eq!(
            guard.check("/match/17"),
            GuardDecision::RedirectTo("/login".to_string())
        );
    }

    #[test]
    fn protected_view_allowed_with_session() {
        let (session, guard) = guard();
        session.set_session("a", "b").unwrap();
        assert_eq!(guard.check("stats"), GuardDecision::Allow);
    }

    #[test]
    fn clearing_session_closes_protected_views() {
        let (session, guard) = guard();
        session.set_session("a", "b").unwrap();
        session.clear_session().unwrap();

        assert_eq!(
            guard.check("/data"),
            GuardDecision::RedirectTo("/login".to_string())
        );
    }

    #[test]
    fn custom_public_paths() {
        let (_, guard) = guard();
        let guard = guard.with_public_paths(["login", "stats"]);

        assert_eq!(guard.check("/stats"), GuardDecision::Allow);
        assert_eq!(
            guard.check("/chat"),
            GuardDecision::RedirectTo("/login".to_string())
        );
    }

    #[test]
    fn route_table() {
        assert_eq!(Route::parse("/"), Some(Route::Chat));
        assert_eq!(Route::parse("match/9"), Some(Route::MatchDetail("9".into())));
        assert_eq!(Route::parse("/stats/"), Some(Route::Stats));
        assert_eq!(Route::parse("/admin"), None);
        assert_eq!(Route::MatchDetail("9".into()).path(), "/match/9");
        assert_eq!(Route::Stats.title(), "Statistics");
    }
}
