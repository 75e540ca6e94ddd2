//! Authentication handlers for login and logout.

use axum::{
    extract::{rejection::FormRejection, State},
    response::{IntoResponse, Redirect, Response},
};

use super::password;
use super::{AUTH_USER_KEY, ERROR_KEY, FLASH_KEY, LOGIN_PATH, PROFILE_PATH};
use crate::db::{RepoError, RepoResult, UserRepository};
use crate::domain::User;
use crate::error::AppError;
use crate::forms::Form;
use crate::session::Session;
use crate::state::AppState;

/// Shown when the form is missing a field
pub const MISSING_CREDENTIALS_MESSAGE: &str = "Invalid login credentials";

/// Shown for both unknown emails and wrong passwords
pub const INVALID_LOGIN_MESSAGE: &str = "Invalid login";

pub const LOGIN_SUCCESS_MESSAGE: &str = "Successfully logged in";

pub const LOGOUT_MESSAGE: &str = "You have been logged out";

type PostedPairs = axum::Form<Vec<(String, String)>>;

/// Look up `email` and check `password` against its stored hash.
///
/// `Ok(None)` covers every credential failure (unknown email, wrong password,
/// unusable stored hash); each is logged distinctly but callers cannot tell
/// them apart. Store failures come back as `Err`.
pub fn authenticate(
    users: &dyn UserRepository,
    email: &str,
    password: &str,
) -> RepoResult<Option<User>> {
    let user = match users.get_user_by_email(email) {
        Ok(user) => user,
        Err(RepoError::NotFound) => {
            // Same Argon2 cost as a real account
            password::verify_against_dummy(password);
            tracing::info!("Login failed: no account for {}", email);
            return Ok(None);
        }
        Err(e) => return Err(e),
    };

    match password::verify_password(password, &user.password_hash) {
        Ok(true) => Ok(Some(user)),
        Ok(false) => {
            tracing::info!("Login failed: wrong password for user {}", user.id);
            Ok(None)
        }
        Err(e) => {
            tracing::warn!("Login failed: stored hash for user {} unusable: {}", user.id, e);
            Ok(None)
        }
    }
}

fn reject(session: &Session, message: &str) -> Result<Response, AppError> {
    session.put(ERROR_KEY, message)?;
    Ok(Redirect::to(LOGIN_PATH).into_response())
}

/// POST /login - Process login
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    posted: Result<PostedPairs, FormRejection>,
) -> Result<Response, AppError> {
    let axum::Form(pairs) = posted.map_err(|rejection| {
        tracing::warn!("Malformed login body: {}", rejection);
        AppError::BadRequest(rejection.body_text())
    })?;

    let mut form = Form::new(pairs);
    form.required(&["email", "password"]);
    if !form.valid() {
        return reject(&session, MISSING_CREDENTIALS_MESSAGE);
    }

    let email = form.get("email").to_string();
    let password = form.get("password").to_string();

    // Store I/O and Argon2 both block; keep them off the async workers
    let users = state.users.clone();
    let user = tokio::task::spawn_blocking(move || authenticate(users.as_ref(), &email, &password))
        .await??;

    let Some(user) = user else {
        return reject(&session, INVALID_LOGIN_MESSAGE);
    };

    session.put(AUTH_USER_KEY, &user)?;
    // Prevent session fixation
    session.renew_token()?;
    session.put(FLASH_KEY, LOGIN_SUCCESS_MESSAGE)?;

    tracing::info!("User {} logged in", user.id);
    Ok(Redirect::to(PROFILE_PATH).into_response())
}

/// POST /user/logout - Destroy the session and return to the landing page
pub async fn logout(session: Session) -> Result<Response, AppError> {
    if let Some(user) = session.get::<User>(AUTH_USER_KEY)? {
        tracing::info!("User {} logged out", user.id);
    }

    session.destroy()?;
    session.put(FLASH_KEY, LOGOUT_MESSAGE)?;
    Ok(Redirect::to(LOGIN_PATH).into_response())
}
