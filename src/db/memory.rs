//! In-memory user repository.
//!
//! Used by tests and by anything that needs a deterministic store without a
//! database file. `seeded()` holds exactly one known account.

use std::sync::{Mutex, MutexGuard};

use chrono::Utc;

use super::repository::{RepoError, RepoResult, UserRepository};
use super::seed_admin;
use crate::auth::password;
use crate::domain::{NewUser, User};

#[derive(Default)]
struct Rows {
  users: Vec<User>,
  next_id: i64,
}

#[derive(Default)]
pub struct MemoryUserRepository {
  rows: Mutex<Rows>,
}

impl MemoryUserRepository {
  pub fn new() -> Self {
    Self::default()
  }

  /// A store holding `admin@example.com` / `secret` with ID 1.
  pub fn seeded() -> RepoResult<Self> {
    let repo = Self::new();
    seed_admin(&repo)?;
    Ok(repo)
  }

  fn rows(&self) -> RepoResult<MutexGuard<'_, Rows>> {
    self.rows.lock().map_err(|_| RepoError::Unavailable)
  }
}

fn email_taken(rows: &Rows, email: &str, except_id: Option<i64>) -> bool {
  rows
    .users
    .iter()
    .any(|u| Some(u.id) != except_id && u.email.eq_ignore_ascii_case(email))
}

impl UserRepository for MemoryUserRepository {
  fn all_users(&self) -> RepoResult<Vec<User>> {
    let mut users = self.rows()?.users.clone();
    users.sort_by(|a, b| (&a.last_name, &a.first_name).cmp(&(&b.last_name, &b.first_name)));
    Ok(users)
  }

  fn get_user(&self, id: i64) -> RepoResult<User> {
    self
      .rows()?
      .users
      .iter()
      .find(|u| u.id == id)
      .cloned()
      .ok_or(RepoError::NotFound)
  }

  fn get_user_by_email(&self, email: &str) -> RepoResult<User> {
    self
      .rows()?
      .users
      .iter()
      .find(|u| u.email.eq_ignore_ascii_case(email))
      .cloned()
      .ok_or(RepoError::NotFound)
  }

  fn insert_user(&self, user: &NewUser) -> RepoResult<i64> {
    let hash = password::hash_password(&user.password)?;
    let now = Utc::now();

    let mut rows = self.rows()?;
    if email_taken(&rows, &user.email, None) {
      return Err(RepoError::DuplicateEmail(user.email.clone()));
    }

    rows.next_id += 1;
    let id = rows.next_id;
    rows.users.push(User {
      id,
      first_name: user.first_name.clone(),
      last_name: user.last_name.clone(),
      email: user.email.clone(),
      password_hash: hash,
      is_admin: user.is_admin,
      created_at: now,
      updated_at: now,
    });
    Ok(id)
  }

  fn update_user(&self, user: &User) -> RepoResult<()> {
    let mut rows = self.rows()?;
    if !rows.users.iter().any(|u| u.id == user.id) {
      return Err(RepoError::NotFound);
    }
    if email_taken(&rows, &user.email, Some(user.id)) {
      return Err(RepoError::DuplicateEmail(user.email.clone()));
    }

    let row = rows
      .users
      .iter_mut()
      .find(|u| u.id == user.id)
      .ok_or(RepoError::NotFound)?;
    row.first_name = user.first_name.clone();
    row.last_name = user.last_name.clone();
    row.email = user.email.clone();
    row.is_admin = user.is_admin;
    row.updated_at = Utc::now();
    Ok(())
  }

  fn delete_user(&self, id: i64) -> RepoResult<()> {
    let mut rows = self.rows()?;
    let before = rows.users.len();
    rows.users.retain(|u| u.id != id);
    if rows.users.len() == before {
      return Err(RepoError::NotFound);
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::auth::password::verify_password;
  use crate::db::{SEED_EMAIL, SEED_PASSWORD};
  use std::sync::Arc;

  #[test]
  fn test_seeded_store_has_one_admin() {
    let repo = MemoryUserRepository::seeded().unwrap();
    let users = repo.all_users().unwrap();
    assert_eq!(users.len(), 1);

    let admin = repo.get_user_by_email(SEED_EMAIL).unwrap();
    assert_eq!(admin.id, 1);
    assert!(admin.is_admin);
    assert!(verify_password(SEED_PASSWORD, &admin.password_hash).unwrap());
  }

  #[test]
  fn test_unknown_email_is_not_found() {
    let repo = MemoryUserRepository::seeded().unwrap();
    assert!(matches!(
      repo.get_user_by_email("asdsda@asd.com"),
      Err(RepoError::NotFound)
    ));
  }

  #[test]
  fn test_unknown_id_is_not_found() {
    let repo = MemoryUserRepository::seeded().unwrap();
    assert!(matches!(repo.get_user(34), Err(RepoError::NotFound)));
  }

  #[test]
  fn test_insert_and_duplicate() {
    let repo = MemoryUserRepository::seeded().unwrap();
    let id = repo
      .insert_user(&NewUser::new("James", "Bond", "bond@example.com", "secret"))
      .unwrap();
    assert_eq!(id, 2);

    let dup = NewUser::new("J", "B", "BOND@example.com", "secret");
    assert!(matches!(repo.insert_user(&dup), Err(RepoError::DuplicateEmail(_))));
  }

  #[test]
  fn test_update_and_delete() {
    let repo = MemoryUserRepository::seeded().unwrap();
    let mut user = repo.get_user(1).unwrap();
    user.first_name = "Root".to_string();
    repo.update_user(&user).unwrap();
    assert_eq!(repo.get_user(1).unwrap().first_name, "Root");

    repo.delete_user(1).unwrap();
    assert!(matches!(repo.update_user(&user), Err(RepoError::NotFound)));
    assert!(matches!(repo.delete_user(1), Err(RepoError::NotFound)));
  }

  #[test]
  fn test_update_missing_id_is_not_found_even_with_taken_email() {
    let repo = MemoryUserRepository::seeded().unwrap();
    let mut user = repo.get_user(1).unwrap();
    user.id = 99;
    assert!(matches!(repo.update_user(&user), Err(RepoError::NotFound)));
  }

  #[test]
  fn test_concurrent_updates_leave_a_whole_row() {
    let repo = Arc::new(MemoryUserRepository::seeded().unwrap());
    let base = repo.get_user(1).unwrap();

    let handles: Vec<_> = (0..8)
      .map(|i| {
        let repo = Arc::clone(&repo);
        let mut user = base.clone();
        std::thread::spawn(move || {
          user.first_name = format!("first{i}");
          user.last_name = format!("last{i}");
          repo.update_user(&user).unwrap();
        })
      })
      .collect();
    for h in handles {
      h.join().unwrap();
    }

    let user = repo.get_user(1).unwrap();
    let n = user.first_name.trim_start_matches("first");
    assert_eq!(user.last_name, format!("last{n}"));
  }
}
