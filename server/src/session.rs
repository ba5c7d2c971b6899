use axum_extra::extract::cookie::{Cookie, PrivateCookieJar, SameSite};
use platform_backend::{AuthState, AuthUser, SessionContext, TokenPair};
use products_projects::{Workspace, WorkspaceOptions};
use time::Duration as TimeDuration;
use tracing::debug;

use crate::http::{AppState, HttpResult};

pub const SESSION_COOKIE: &str = "__Host-pd_session";

/// Signed-in caller of a request.
#[derive(Clone, Debug)]
pub struct Viewer {
    pub user: AuthUser,
    pub workspace: Workspace,
}

fn read_tokens(jar: &PrivateCookieJar) -> Option<TokenPair> {
    let cookie = jar.get(SESSION_COOKIE)?;
    match serde_json::from_str(cookie.value()) {
        Ok(tokens) => Some(tokens),
        Err(err) => {
            debug!(error = %err, "ignoring unreadable session cookie");
            None
        }
    }
}

pub fn session_cookie(tokens: &TokenPair) -> HttpResult<Cookie<'static>> {
    let value = serde_json::to_string(tokens)
        .map_err(|err| crate::http::HttpError::internal(err.into()))?;
    Ok(Cookie::build((SESSION_COOKIE, value))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .max_age(TimeDuration::days(30))
        .build())
}

pub fn clear_session_cookie(jar: PrivateCookieJar) -> PrivateCookieJar {
    jar.remove(Cookie::build((SESSION_COOKIE, "")).path("/").build())
}

/// Store the tokens of the context's current session in the jar, or clear
/// the cookie when signed out.
pub fn persist(jar: PrivateCookieJar, state: &AuthState) -> HttpResult<PrivateCookieJar> {
    match state {
        AuthState::SignedIn(session) => Ok(jar.add(session_cookie(&session.tokens())?)),
        _ => Ok(clear_session_cookie(jar)),
    }
}

/// Rebuild the caller's session from the cookie. Refreshed tokens are
/// written back; a dead session clears the cookie.
pub async fn restore(
    state: &AppState,
    jar: PrivateCookieJar,
) -> HttpResult<(SessionContext, PrivateCookieJar)> {
    let context = SessionContext::new(state.backend.clone());
    let tokens = read_tokens(&jar);
    let had_cookie = tokens.is_some();
    let restored = context.restore(tokens.clone()).await;
    let jar = match &restored {
        AuthState::SignedIn(session) if Some(session.tokens()) != tokens => {
            debug!("session tokens refreshed");
            persist(jar, &restored)?
        }
        AuthState::SignedOut if had_cookie => clear_session_cookie(jar),
        _ => jar,
    };
    Ok((context, jar))
}

/// The signed-in viewer for `context`, if any.
pub async fn viewer(state: &AppState, context: &SessionContext) -> HttpResult<Option<Viewer>> {
    let Some(session) = context.state().session().cloned() else {
        return Ok(None);
    };
    let workspace = Workspace::load(
        context.client(),
        session.user.id,
        WorkspaceOptions {
            max_upload_bytes: state.config.max_upload_bytes,
        },
    )
    .await?;
    Ok(Some(Viewer {
        user: session.user,
        workspace,
    }))
}
