pub mod memory;
pub mod repository;
pub mod schema;
pub mod sqlite;

use rusqlite::Connection;
use std::sync::{Arc, Mutex};

use crate::domain::NewUser;

pub use memory::MemoryUserRepository;
pub use repository::{RepoError, RepoResult, SharedRepository, UserRepository};
pub use schema::run_migrations;
pub use sqlite::SqliteUserRepository;

pub type DbPool = Arc<Mutex<Connection>>;

/// Account created on an empty store
pub const SEED_EMAIL: &str = "admin@example.com";
pub const SEED_PASSWORD: &str = "secret";

/// Insert the admin account if the store has no users yet.
/// Returns the new ID, or `None` when users already exist.
pub fn seed_admin(repo: &dyn UserRepository) -> RepoResult<Option<i64>> {
  if !repo.all_users()?.is_empty() {
    return Ok(None);
  }

  let id = repo.insert_user(&NewUser::new("Admin", "User", SEED_EMAIL, SEED_PASSWORD).admin())?;
  tracing::info!("Seeded admin account {} (id {})", SEED_EMAIL, id);
  Ok(Some(id))
}

/// Extension trait for logging errors before discarding them
pub trait LogOnError<T> {
  /// Log the error at warn level and return None
  fn log_warn(self, context: &str) -> Option<T>;
}

impl<T, E: std::fmt::Display> LogOnError<T> for std::result::Result<T, E> {
  fn log_warn(self, context: &str) -> Option<T> {
    match self {
      Ok(v) => Some(v),
      Err(e) => {
        tracing::warn!("{}: {}", context, e);
        None
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_seed_admin_on_empty_store() {
    let repo = MemoryUserRepository::new();
    assert_eq!(seed_admin(&repo).unwrap(), Some(1));
    assert!(repo.get_user_by_email(SEED_EMAIL).unwrap().is_admin);
  }

  #[test]
  fn test_seed_admin_skips_populated_store() {
    let repo = MemoryUserRepository::seeded().unwrap();
    assert_eq!(seed_admin(&repo).unwrap(), None);
    assert_eq!(repo.all_users().unwrap().len(), 1);
  }

  #[test]
  fn test_log_warn() {
    let ok: Result<i32, String> = Ok(3);
    assert_eq!(ok.log_warn("ctx"), Some(3));
    let err: Result<i32, String> = Err("boom".to_string());
    assert_eq!(err.log_warn("ctx"), None);
  }
}
