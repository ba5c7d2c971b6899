use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    AuthSession, BackendClient, BackendResult, Credentials, SignUp, SignUpOutcome, TokenPair,
};

/// Sign-in state as seen by one session.
#[derive(Clone, Debug, PartialEq)]
pub enum AuthState {
    /// The initial session check has not resolved yet.
    Loading,
    SignedOut,
    SignedIn(AuthSession),
}

impl AuthState {
    pub fn session(&self) -> Option<&AuthSession> {
        match self {
            AuthState::SignedIn(session) => Some(session),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, AuthState::Loading)
    }
}

/// Owns the authentication state of one user session and publishes every
/// transition to its observers.
pub struct SessionContext {
    client: BackendClient,
    state: watch::Sender<AuthState>,
}

impl SessionContext {
    /// `client` must be unscoped; it is used for the auth calls themselves.
    pub fn new(client: BackendClient) -> Self {
        let (state, _) = watch::channel(AuthState::Loading);
        Self { client, state }
    }

    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    /// Call `callback` with every state published after this call. The
    /// observer stops when the context is dropped.
    pub fn on_change<F>(&self, callback: F) -> JoinHandle<()>
    where
        F: Fn(&AuthState) + Send + 'static,
    {
        let mut receiver = self.state.subscribe();
        receiver.mark_unchanged();
        tokio::spawn(async move {
            while receiver.changed().await.is_ok() {
                let state = receiver.borrow_and_update().clone();
                callback(&state);
            }
        })
    }

    /// Client scoped to the signed-in user, or the anonymous client.
    pub fn client(&self) -> BackendClient {
        match self.state.borrow().session() {
            Some(session) => self.client.with_token(&session.access_token),
            None => self.client.clone(),
        }
    }

    /// Resolve the initial session from persisted tokens. An expired access
    /// token is refreshed once; anything else that fails leaves the session
    /// signed out.
    pub async fn restore(&self, tokens: Option<TokenPair>) -> AuthState {
        let Some(tokens) = tokens else {
            return self.publish(AuthState::SignedOut);
        };
        let transport = self.client.transport();
        let state = match transport.get_user(&tokens.access_token).await {
            Ok(user) => AuthState::SignedIn(AuthSession {
                access_token: tokens.access_token,
                refresh_token: tokens.refresh_token,
                expires_at: None,
                user,
            }),
            Err(err) if err.is_unauthorized() => {
                debug!("access token rejected, refreshing session");
                match transport.refresh_session(&tokens.refresh_token).await {
                    Ok(session) => AuthState::SignedIn(session),
                    Err(err) => {
                        debug!(error = %err, "session refresh failed");
                        AuthState::SignedOut
                    }
                }
            }
            Err(err) => {
                warn!(error = %err, "session check failed");
                AuthState::SignedOut
            }
        };
        self.publish(state)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> BackendResult<AuthSession> {
        let session = self
            .client
            .transport()
            .sign_in_with_password(&Credentials {
                email: email.trim().to_string(),
                password: password.to_string(),
            })
            .await?;
        info!(user_id = %session.user.id, "signed in");
        self.publish(AuthState::SignedIn(session.clone()));
        Ok(session)
    }

    /// Register a new account. The state only becomes signed-in when the
    /// service hands back a session straight away.
    pub async fn sign_up(&self, request: &SignUp) -> BackendResult<SignUpOutcome> {
        let outcome = self.client.transport().sign_up(request).await?;
        info!(user_id = %outcome.user.id, confirmed = outcome.session.is_some(), "signed up");
        match &outcome.session {
            Some(session) => self.publish(AuthState::SignedIn(session.clone())),
            None => self.publish(AuthState::SignedOut),
        };
        Ok(outcome)
    }

    /// Always ends signed out; a failed remote logout is only logged.
    pub async fn sign_out(&self) {
        let current = self.state.borrow().session().cloned();
        if let Some(session) = current {
            if let Err(err) = self.client.transport().sign_out(&session.access_token).await {
                warn!(error = %err, "remote sign-out failed");
            }
        }
        self.publish(AuthState::SignedOut);
    }

    fn publish(&self, state: AuthState) -> AuthState {
        self.state.send_replace(state.clone());
        state
    }
}
