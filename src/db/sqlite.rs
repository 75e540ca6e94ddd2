//! SQLite-backed user repository.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};

use super::repository::{RepoError, RepoResult, UserRepository};
use super::schema::run_migrations;
use super::DbPool;
use crate::auth::password;
use crate::domain::{NewUser, User};

const USER_COLUMNS: &str =
  "id, first_name, last_name, email, password_hash, is_admin, created_at, updated_at";

pub struct SqliteUserRepository {
  pool: DbPool,
}

impl SqliteUserRepository {
  /// Open (or create) the database file and bring its schema up to date.
  pub fn open(path: &Path) -> RepoResult<Self> {
    if let Some(parent) = path.parent() {
      if let Err(e) = std::fs::create_dir_all(parent) {
        tracing::warn!("Could not create database directory {}: {}", parent.display(), e);
      }
    }

    let conn = Connection::open(path)?;
    Self::from_connection(conn)
  }

  pub fn open_in_memory() -> RepoResult<Self> {
    Self::from_connection(Connection::open_in_memory()?)
  }

  fn from_connection(conn: Connection) -> RepoResult<Self> {
    run_migrations(&conn)?;
    Ok(Self {
      pool: Arc::new(Mutex::new(conn)),
    })
  }

  fn conn(&self) -> RepoResult<MutexGuard<'_, Connection>> {
    self.pool.lock().map_err(|_| {
      tracing::error!("Users database mutex poisoned");
      RepoError::Unavailable
    })
  }

  pub fn user_count(&self) -> RepoResult<i64> {
    let conn = self.conn()?;
    Ok(conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?)
  }
}

impl UserRepository for SqliteUserRepository {
  fn all_users(&self) -> RepoResult<Vec<User>> {
    let conn = self.conn()?;
    let mut stmt = conn.prepare(&format!(
      "SELECT {USER_COLUMNS} FROM users ORDER BY last_name, first_name"
    ))?;
    let users = stmt
      .query_map([], row_to_user)?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(users)
  }

  fn get_user(&self, id: i64) -> RepoResult<User> {
    let conn = self.conn()?;
    conn
      .query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
        params![id],
        row_to_user,
      )
      .optional()?
      .ok_or(RepoError::NotFound)
  }

  fn get_user_by_email(&self, email: &str) -> RepoResult<User> {
    let conn = self.conn()?;
    conn
      .query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
        params![email],
        row_to_user,
      )
      .optional()?
      .ok_or(RepoError::NotFound)
  }

  fn insert_user(&self, user: &NewUser) -> RepoResult<i64> {
    // Hash outside the lock; Argon2 is deliberately slow.
    let hash = password::hash_password(&user.password)?;
    let now = Utc::now().to_rfc3339();

    let conn = self.conn()?;
    conn
      .execute(
        r#"INSERT INTO users
           (first_name, last_name, email, password_hash, is_admin, created_at, updated_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)"#,
        params![
          user.first_name,
          user.last_name,
          user.email,
          hash,
          user.is_admin,
          now
        ],
      )
      .map_err(|e| map_constraint(e, &user.email))?;
    Ok(conn.last_insert_rowid())
  }

  fn update_user(&self, user: &User) -> RepoResult<()> {
    let now = Utc::now().to_rfc3339();
    let conn = self.conn()?;
    let changed = conn
      .execute(
        r#"UPDATE users
           SET first_name = ?1, last_name = ?2, email = ?3, is_admin = ?4, updated_at = ?5
           WHERE id = ?6"#,
        params![
          user.first_name,
          user.last_name,
          user.email,
          user.is_admin,
          now,
          user.id
        ],
      )
      .map_err(|e| map_constraint(e, &user.email))?;

    if changed == 0 {
      return Err(RepoError::NotFound);
    }
    Ok(())
  }

  fn delete_user(&self, id: i64) -> RepoResult<()> {
    let conn = self.conn()?;
    let changed = conn.execute("DELETE FROM users WHERE id = ?1", params![id])?;
    if changed == 0 {
      return Err(RepoError::NotFound);
    }
    Ok(())
  }
}

fn map_constraint(err: rusqlite::Error, email: &str) -> RepoError {
  match &err {
    rusqlite::Error::SqliteFailure(e, _)
      if e.code == ErrorCode::ConstraintViolation
        && e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
    {
      RepoError::DuplicateEmail(email.to_string())
    }
    _ => RepoError::Database(err),
  }
}

fn parse_timestamp(idx: usize, value: String) -> rusqlite::Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(&value)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| {
      rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn row_to_user(row: &rusqlite::Row) -> rusqlite::Result<User> {
  let is_admin: i64 = row.get(5)?;

  Ok(User {
    id: row.get(0)?,
    first_name: row.get(1)?,
    last_name: row.get(2)?,
    email: row.get(3)?,
    password_hash: row.get(4)?,
    is_admin: is_admin != 0,
    created_at: parse_timestamp(6, row.get(6)?)?,
    updated_at: parse_timestamp(7, row.get(7)?)?,
  })
}
