//! Login and signup on top of the session context.
//!
//! The auth service owns credentials; the application keeps a `users`
//! profile row per account carrying the role and approval flag.

use entity::users;
use platform_api::FieldError;
use platform_backend::{AuthSession, AuthUser, BackendClient, SessionContext, SignUp, SignUpOutcome};
use tracing::info;

use crate::{ProjectsError, ProjectsResult, validation::required_text};

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Clone, Debug)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
}

pub fn validate_registration(input: &Registration) -> Result<(), Vec<FieldError>> {
    let mut errors = Vec::new();
    if let Err(err) = required_text("name", &input.name) {
        errors.push(err);
    }
    let email = input.email.trim();
    if email.is_empty() {
        errors.push(FieldError::new("email", "is required"));
    } else if !email.contains('@') {
        errors.push(FieldError::new("email", "is not a valid address"));
    }
    if input.password.chars().count() < MIN_PASSWORD_LEN {
        errors.push(FieldError::new(
            "password",
            format!("must be at least {MIN_PASSWORD_LEN} characters"),
        ));
    }
    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

/// Make sure the signed-in user has a profile row, creating a pending one
/// if needed. `client` must be scoped to that user.
pub async fn ensure_profile(
    client: &BackendClient,
    user: &AuthUser,
    name: Option<&str>,
) -> ProjectsResult<users::Model> {
    if let Some(profile) = client.find::<users::Model>(user.id).await? {
        return Ok(profile);
    }
    let email = user.email.clone().unwrap_or_default();
    let name = name
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .or(user.display_name())
        .map(str::to_string)
        .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());
    let profile: users::Model = client
        .insert_one(&users::Draft::pending(user.id, name, email))
        .await?;
    info!(user_id = %user.id, "profile created");
    Ok(profile)
}

/// Sign up and, when the service signs the user straight in, create their
/// pending profile row. Otherwise the row is created at first sign-in.
pub async fn register(
    session: &SessionContext,
    input: Registration,
) -> ProjectsResult<SignUpOutcome> {
    validate_registration(&input).map_err(ProjectsError::Validation)?;
    let outcome = session
        .sign_up(&SignUp {
            email: input.email.trim().to_string(),
            password: input.password,
            name: input.name.trim().to_string(),
        })
        .await?;
    if outcome.session.is_some() {
        ensure_profile(&session.client(), &outcome.user, Some(&input.name)).await?;
    }
    Ok(outcome)
}

pub async fn sign_in(
    session: &SessionContext,
    email: &str,
    password: &str,
) -> ProjectsResult<AuthSession> {
    let mut errors = Vec::new();
    if email.trim().is_empty() {
        errors.push(FieldError::new("email", "is required"));
    }
    if password.is_empty() {
        errors.push(FieldError::new("password", "is required"));
    }
    if !errors.is_empty() {
        return Err(ProjectsError::Validation(errors));
    }
    let auth = session.sign_in(email, password).await?;
    ensure_profile(&session.client(), &auth.user, None).await?;
    Ok(auth)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use entity::Table;
    use platform_backend::MemoryTransport;

    use super::*;

    fn session() -> (Arc<MemoryTransport>, SessionContext) {
        let memory = Arc::new(MemoryTransport::new());
        let client = BackendClient::new(memory.clone(), "bucket");
        (memory, SessionContext::new(client))
    }

    #[tokio::test]
    async fn signup_creates_a_pending_profile() {
        let (memory, session) = session();
        let outcome = register(
            &session,
            Registration {
                name: " Mia ".into(),
                email: "mia@example.test".into(),
                password: "s3cret!".into(),
            },
        )
        .await
        .unwrap();
        let profile = session
            .client()
            .find::<users::Model>(outcome.user.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(profile.name, "Mia");
        assert_eq!(profile.role, users::Role::Pending);
        assert!(!profile.approved);
        assert_eq!(memory.rows(Table::Users).len(), 1);
    }

    #[tokio::test]
    async fn invalid_registrations_never_reach_the_backend() {
        let (memory, session) = session();
        let err = register(
            &session,
            Registration {
                name: "".into(),
                email: "nope".into(),
                password: "123".into(),
            },
        )
        .await
        .unwrap_err();
        let ProjectsError::Validation(fields) = err else {
            panic!("expected validation error");
        };
        assert_eq!(fields.len(), 3);
        assert!(memory.rows(Table::Users).is_empty());
    }

    #[tokio::test]
    async fn first_sign_in_backfills_the_profile() {
        let (memory, session) = session();
        let id = memory.seed_account("old@example.test", "password", "Old Timer");
        let auth = sign_in(&session, "old@example.test", "password").await.unwrap();
        assert_eq!(auth.user.id, id);
        let rows = memory.rows(Table::Users);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["name"], "Old Timer");

        sign_in(&session, "old@example.test", "password").await.unwrap();
        assert_eq!(memory.rows(Table::Users).len(), 1);
    }
}
