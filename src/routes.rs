//! Route table and middleware stack.

use axum::{
  middleware,
  routing::{get, post},
  Router,
};
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::auth::{self, PROFILE_PATH};
use crate::handlers;
use crate::session::load_and_save;
use crate::state::AppState;

/// Build the application router.
///
/// Request flow: trace -> client IP -> session load/save -> (auth gate) -> handler.
pub fn router(state: AppState) -> Router {
  let protected = Router::new()
    .route(PROFILE_PATH, get(handlers::profile))
    .route("/user/logout", post(auth::logout))
    .route_layer(middleware::from_fn(auth::require_auth));

  Router::new()
    .route("/", get(handlers::home))
    .route("/login", post(auth::login))
    .merge(protected)
    .nest_service("/static", ServeDir::new("static"))
    .layer(middleware::from_fn_with_state(
      state.sessions.clone(),
      load_and_save,
    ))
    .layer(middleware::from_fn(auth::add_client_ip))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}
