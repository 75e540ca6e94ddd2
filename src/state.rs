//! Application state shared by every handler.

use std::sync::Arc;

use axum::extract::FromRef;

use crate::db::{SharedRepository, UserRepository};
use crate::session::SessionManager;

/// Application state passed to all handlers
#[derive(Clone)]
pub struct AppState {
    /// User store (SQLite in production, in-memory in tests)
    pub users: SharedRepository,

    /// Server-side session store
    pub sessions: SessionManager,
}

impl AppState {
    pub fn new(users: impl UserRepository + 'static, sessions: SessionManager) -> Self {
        Self {
            users: Arc::new(users),
            sessions,
        }
    }
}

impl FromRef<AppState> for SessionManager {
    fn from_ref(state: &AppState) -> Self {
        state.sessions.clone()
    }
}
