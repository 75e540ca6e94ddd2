use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored account.
///
/// The password hash never leaves the process: it is skipped when a user is
/// serialized into the session bag and comes back empty on the way out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
  pub id: i64,
  pub first_name: String,
  pub last_name: String,
  pub email: String,
  #[serde(skip_serializing, default)]
  pub password_hash: String,
  pub is_admin: bool,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl User {
  pub fn full_name(&self) -> String {
    format!("{} {}", self.first_name, self.last_name).trim().to_string()
  }
}

/// Fields supplied when inserting a user. The store assigns the ID and the
/// timestamps and hashes the plaintext password before it is persisted.
#[derive(Debug, Clone)]
pub struct NewUser {
  pub first_name: String,
  pub last_name: String,
  pub email: String,
  pub password: String,
  pub is_admin: bool,
}

impl NewUser {
  pub fn new(first_name: &str, last_name: &str, email: &str, password: &str) -> Self {
    Self {
      first_name: first_name.to_string(),
      last_name: last_name.to_string(),
      email: email.to_string(),
      password: password.to_string(),
      is_admin: false,
    }
  }

  pub fn admin(mut self) -> Self {
    self.is_admin = true;
    self
  }
}
