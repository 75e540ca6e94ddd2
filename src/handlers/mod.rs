//! Page handlers for the landing and profile pages.

use askama::Template;
use axum::response::{Html, IntoResponse, Redirect, Response};
use chrono::Utc;

use crate::auth::{ClientIp, AUTH_USER_KEY, ERROR_KEY, FLASH_KEY, LOGIN_PATH};
use crate::domain::User;
use crate::error::AppError;
use crate::session::Session;

/// Session key probed by the landing page
pub const TEST_KEY: &str = "test";

/// Data every page template carries.
pub struct PageData {
  pub ip: String,
  pub error: String,
  pub flash: String,
  pub user: Option<User>,
}

impl PageData {
  /// Collect page data, consuming the one-shot `error` and `flash` messages.
  pub fn collect(session: &Session, ip: ClientIp) -> Result<Self, AppError> {
    Ok(Self {
      ip: ip.0,
      error: session.pop_string(ERROR_KEY)?,
      flash: session.pop_string(FLASH_KEY)?,
      user: session.get(AUTH_USER_KEY)?,
    })
  }
}

#[derive(Template)]
#[template(path = "home.html")]
pub struct HomeTemplate {
  pub page: PageData,
  pub test: String,
}

#[derive(Template)]
#[template(path = "profile.html")]
pub struct ProfileTemplate {
  pub page: PageData,
  pub user: User,
}

/// Render a template fully before anything is sent.
pub fn render<T: Template>(template: &T) -> Result<Html<String>, AppError> {
  Ok(Html(template.render()?))
}

/// GET / - Landing page with the login form
pub async fn home(session: Session, ip: ClientIp) -> Result<Html<String>, AppError> {
  let test = match session.get_value(TEST_KEY)? {
    Some(_) => format!("From Session: {}", session.get_string(TEST_KEY)?),
    None => {
      let message = format!("Hit this page at {}", Utc::now().to_rfc3339());
      session.put(TEST_KEY, &message)?;
      message
    }
  };

  let page = PageData::collect(&session, ip)?;
  render(&HomeTemplate { page, test })
}

/// GET /user/profile - Authenticated user's details
pub async fn profile(session: Session, ip: ClientIp) -> Result<Response, AppError> {
  let page = PageData::collect(&session, ip)?;
  let Some(user) = page.user.clone() else {
    // Logged out between the gate and here
    return Ok(Redirect::temporary(LOGIN_PATH).into_response());
  };

  Ok(render(&ProfileTemplate { page, user })?.into_response())
}
