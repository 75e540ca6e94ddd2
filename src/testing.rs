//! Test utilities for database and application setup.
//!
//! Provides helpers that reuse the real schema initialization and the real
//! router, so tests exercise the same wiring as production.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum_extra::extract::cookie::Cookie;
use axum_test::{TestResponse, TestServer};
use tempfile::TempDir;

use crate::db::{MemoryUserRepository, RepoError, RepoResult, SqliteUserRepository, UserRepository};
use crate::domain::{NewUser, User};
use crate::routes;
use crate::session::{SessionConfig, SessionManager};
use crate::state::AppState;

/// SQLite user store in a temporary directory, removed when dropped.
pub struct TestDb {
    /// Temporary directory (kept alive for database file persistence)
    pub temp: TempDir,
    pub repo: SqliteUserRepository,
}

impl TestDb {
    pub fn new() -> RepoResult<Self> {
        let temp =
            TempDir::new().map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
        let repo = SqliteUserRepository::open(&temp.path().join("users.db"))?;
        Ok(Self { temp, repo })
    }

    /// Path of the database file, for reopening.
    pub fn path(&self) -> PathBuf {
        self.temp.path().join("users.db")
    }
}

/// The full router behind an in-process server, plus a handle on its
/// session store for inspecting what requests left behind.
pub struct TestApp {
    pub server: TestServer,
    pub sessions: SessionManager,
}

/// App backed by the seeded in-memory store.
pub fn spawn_app() -> TestApp {
    let repo = MemoryUserRepository::seeded().expect("seed in-memory store");
    spawn_app_with(repo)
}

pub fn spawn_app_with(users: impl UserRepository + 'static) -> TestApp {
    let sessions = SessionManager::new(SessionConfig::default());
    let state = AppState::new(users, sessions.clone());
    let server = TestServer::new(routes::router(state)).expect("build test server");
    TestApp { server, sessions }
}

/// The session cookie set by `response`. Panics when none was set.
pub fn session_cookie(response: &TestResponse) -> Cookie<'static> {
    response.cookie(&SessionConfig::default().cookie_name)
}

/// Seeded in-memory store that counts every repository call.
pub struct CountingRepository {
    inner: MemoryUserRepository,
    calls: Arc<AtomicUsize>,
}

impl CountingRepository {
    pub fn seeded() -> Self {
        Self {
            inner: MemoryUserRepository::seeded().expect("seed in-memory store"),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

impl UserRepository for CountingRepository {
    fn all_users(&self) -> RepoResult<Vec<User>> {
        self.hit();
        self.inner.all_users()
    }

    fn get_user(&self, id: i64) -> RepoResult<User> {
        self.hit();
        self.inner.get_user(id)
    }

    fn get_user_by_email(&self, email: &str) -> RepoResult<User> {
        self.hit();
        self.inner.get_user_by_email(email)
    }

    fn insert_user(&self, user: &NewUser) -> RepoResult<i64> {
        self.hit();
        self.inner.insert_user(user)
    }

    fn update_user(&self, user: &User) -> RepoResult<()> {
        self.hit();
        self.inner.update_user(user)
    }

    fn delete_user(&self, id: i64) -> RepoResult<()> {
        self.hit();
        self.inner.delete_user(id)
    }
}

/// Store whose every call fails as if the backend were down.
pub struct BrokenRepository;

impl UserRepository for BrokenRepository {
    fn all_users(&self) -> RepoResult<Vec<User>> {
        Err(RepoError::Unavailable)
    }

    fn get_user(&self, _id: i64) -> RepoResult<User> {
        Err(RepoError::Unavailable)
    }

    fn get_user_by_email(&self, _email: &str) -> RepoResult<User> {
        Err(RepoError::Unavailable)
    }

    fn insert_user(&self, _user: &NewUser) -> RepoResult<i64> {
        Err(RepoError::Unavailable)
    }

    fn update_user(&self, _user: &User) -> RepoResult<()> {
        Err(RepoError::Unavailable)
    }

    fn delete_user(&self, _id: i64) -> RepoResult<()> {
        Err(RepoError::Unavailable)
    }
}

/// Read-only store holding exactly one row as given, stored hash included.
pub struct FixedRepository(pub User);

impl FixedRepository {
    fn matching(&self, hit: bool) -> RepoResult<User> {
        if hit {
            Ok(self.0.clone())
        } else {
            Err(RepoError::NotFound)
        }
    }
}

impl UserRepository for FixedRepository {
    fn all_users(&self) -> RepoResult<Vec<User>> {
        Ok(vec![self.0.clone()])
    }

    fn get_user(&self, id: i64) -> RepoResult<User> {
        self.matching(self.0.id == id)
    }

    fn get_user_by_email(&self, email: &str) -> RepoResult<User> {
        self.matching(self.0.email.eq_ignore_ascii_case(email))
    }

    fn insert_user(&self, user: &NewUser) -> RepoResult<i64> {
        Err(RepoError::DuplicateEmail(user.email.clone()))
    }

    fn update_user(&self, _user: &User) -> RepoResult<()> {
        Err(RepoError::NotFound)
    }

    fn delete_user(&self, _id: i64) -> RepoResult<()> {
        Err(RepoError::NotFound)
    }
}
