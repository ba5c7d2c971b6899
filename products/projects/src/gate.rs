//! Routing guard for the application's views.

use platform_backend::AuthState;
use serde::Serialize;
use tokio::sync::watch;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum View {
    Login,
    Signup,
    Dashboard,
    Projects,
    ProjectNew,
    ProjectDetail,
    ProjectEdit,
    Files,
    Reports,
    Notifications,
    Profile,
    Settings,
    Users,
}

impl View {
    pub const ALL: [View; 13] = [
        View::Login,
        View::Signup,
        View::Dashboard,
        View::Projects,
        View::ProjectNew,
        View::ProjectDetail,
        View::ProjectEdit,
        View::Files,
        View::Reports,
        View::Notifications,
        View::Profile,
        View::Settings,
        View::Users,
    ];

    pub fn slug(self) -> &'static str {
        match self {
            View::Login => "login",
            View::Signup => "signup",
            View::Dashboard => "dashboard",
            View::Projects => "projects",
            View::ProjectNew => "project-new",
            View::ProjectDetail => "project-detail",
            View::ProjectEdit => "project-edit",
            View::Files => "files",
            View::Reports => "reports",
            View::Notifications => "notifications",
            View::Profile => "profile",
            View::Settings => "settings",
            View::Users => "users",
        }
    }

    pub fn parse(slug: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|view| view.slug() == slug)
    }

    /// Views reachable without a session.
    pub fn is_public(self) -> bool {
        matches!(self, View::Login | View::Signup)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GateState {
    Loading,
    Unauthenticated,
    Authenticated,
}

impl From<&AuthState> for GateState {
    fn from(state: &AuthState) -> Self {
        match state {
            AuthState::Loading => GateState::Loading,
            AuthState::SignedOut => GateState::Unauthenticated,
            AuthState::SignedIn(_) => GateState::Authenticated,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GateDecision {
    /// The session check is still running; render nothing yet.
    Wait,
    Admit,
    Redirect(View),
}

/// Decide what happens when `view` is requested in `state`. Approval is not
/// consulted: an unapproved signed-in user is admitted like any other.
pub fn decide(state: GateState, view: View) -> GateDecision {
    match (state, view.is_public()) {
        (GateState::Loading, _) => GateDecision::Wait,
        (GateState::Unauthenticated, true) | (GateState::Authenticated, false) => {
            GateDecision::Admit
        }
        (GateState::Unauthenticated, false) => GateDecision::Redirect(View::Login),
        (GateState::Authenticated, true) => GateDecision::Redirect(View::Dashboard),
    }
}

/// Gate driven by a session's auth-change stream.
pub struct AuthGate {
    states: watch::Receiver<AuthState>,
}

impl AuthGate {
    pub fn new(states: watch::Receiver<AuthState>) -> Self {
        Self { states }
    }

    pub fn state(&self) -> GateState {
        GateState::from(&*self.states.borrow())
    }

    /// Decision for `view` right now, possibly [`GateDecision::Wait`].
    pub fn check(&self, view: View) -> GateDecision {
        decide(self.state(), view)
    }

    /// Wait for the first session check to resolve, then decide. A closed
    /// stream counts as signed out.
    pub async fn resolve(&mut self, view: View) -> GateDecision {
        let state = match self.states.wait_for(|state| !state.is_loading()).await {
            Ok(state) => GateState::from(&*state),
            Err(_) => GateState::Unauthenticated,
        };
        decide(state, view)
    }
}

#[cfg(test)]
mod tests {
    use platform_backend::{AuthSession, AuthUser};
    use serde_json::Value;
    use uuid::Uuid;

    use super::*;

    fn signed_in() -> AuthState {
        AuthState::SignedIn(AuthSession {
            access_token: "a".into(),
            refresh_token: "r".into(),
            expires_at: None,
            user: AuthUser {
                id: Uuid::new_v4(),
                email: None,
                user_metadata: Value::Null,
            },
        })
    }

    #[test]
    fn protected_views_send_visitors_to_login() {
        for view in View::ALL.into_iter().filter(|v| !v.is_public()) {
            assert_eq!(
                decide(GateState::Unauthenticated, view),
                GateDecision::Redirect(View::Login)
            );
            assert_eq!(decide(GateState::Authenticated, view), GateDecision::Admit);
        }
    }

    #[test]
    fn signed_in_users_skip_login_and_signup() {
        assert_eq!(
            decide(GateState::Authenticated, View::Login),
            GateDecision::Redirect(View::Dashboard)
        );
        assert_eq!(
            decide(GateState::Authenticated, View::Signup),
            GateDecision::Redirect(View::Dashboard)
        );
        assert_eq!(decide(GateState::Unauthenticated, View::Signup), GateDecision::Admit);
    }

    #[test]
    fn view_slugs_round_trip() {
        for view in View::ALL {
            assert_eq!(View::parse(view.slug()), Some(view));
        }
        assert_eq!(View::parse("admin"), None);
    }

    #[tokio::test]
    async fn waits_for_the_first_session_check() {
        let (tx, rx) = watch::channel(AuthState::Loading);
        let mut gate = AuthGate::new(rx);
        assert_eq!(gate.check(View::Dashboard), GateDecision::Wait);

        let pending = tokio::spawn(async move { gate.resolve(View::Login).await });
        tx.send_replace(signed_in());
        assert_eq!(
            pending.await.unwrap(),
            GateDecision::Redirect(View::Dashboard)
        );
    }
}
