//! The user repository contract shared by the SQLite store and the in-memory
//! stand-in used by tests.

use std::sync::Arc;

use thiserror::Error;

use crate::auth::password::PasswordError;
use crate::domain::{NewUser, User};

#[derive(Debug, Error)]
pub enum RepoError {
  #[error("user not found")]
  NotFound,

  #[error("email already registered: {0}")]
  DuplicateEmail(String),

  /// A thread panicked while holding the store lock.
  #[error("user store unavailable")]
  Unavailable,

  #[error(transparent)]
  Password(#[from] PasswordError),

  #[error("database error: {0}")]
  Database(#[from] rusqlite::Error),
}

pub type RepoResult<T> = std::result::Result<T, RepoError>;

/// CRUD access to user records.
///
/// Implementations are shared across in-flight requests and must serialize
/// writes per row: the last update to a row wins and no field is ever half
/// written. Email lookups ignore ASCII case in both implementations.
pub trait UserRepository: Send + Sync {
  fn all_users(&self) -> RepoResult<Vec<User>>;

  /// Fails with `RepoError::NotFound` for unknown IDs.
  fn get_user(&self, id: i64) -> RepoResult<User>;

  /// Fails with `RepoError::NotFound` when no row matches.
  fn get_user_by_email(&self, email: &str) -> RepoResult<User>;

  /// Hashes the password, stores the row, returns the assigned ID.
  fn insert_user(&self, user: &NewUser) -> RepoResult<i64>;

  /// Replaces the profile fields (names, email, admin flag) of the row with
  /// `user.id` and bumps `updated_at`. The password hash is left alone.
  fn update_user(&self, user: &User) -> RepoResult<()>;

  fn delete_user(&self, id: i64) -> RepoResult<()>;
}

pub type SharedRepository = Arc<dyn UserRepository>;
