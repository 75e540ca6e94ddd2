use std::net::SocketAddr;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use session_gate::config::{self, Config};
use session_gate::db::{self, SqliteUserRepository};
use session_gate::routes;
use session_gate::session::{SessionConfig, SessionManager};
use session_gate::state::AppState;

#[tokio::main]
async fn main() {
  tracing_subscriber::registry()
    .with(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "session_gate=debug,tower_http=debug".into()),
    )
    .with(tracing_subscriber::fmt::layer())
    .init();

  let config = Config::load();

  let users = SqliteUserRepository::open(&config.database_path)
    .expect("Failed to initialize users database");

  if config.seed_admin {
    db::seed_admin(&users).expect("Failed to seed admin account");
  }

  let sessions = SessionManager::new(SessionConfig::from(&config.session));
  sessions.spawn_cleanup(Duration::from_secs(config::SESSION_CLEANUP_INTERVAL_SECS));

  let app = routes::router(AppState::new(users, sessions));

  let listener = tokio::net::TcpListener::bind(&config.bind_addr)
    .await
    .unwrap_or_else(|_| panic!("Failed to bind to {}", config.bind_addr));

  tracing::info!("Server running on http://{}", config.bind_addr);

  axum::serve(
    listener,
    app.into_make_service_with_connect_info::<SocketAddr>(),
  )
  .await
  .expect("Server failed to start");
}
