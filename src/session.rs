//! In-memory server-side sessions.
//!
//! Each session is a bag of named JSON values keyed by an opaque token that
//! travels in a cookie. Sessions live for a fixed lifetime from creation;
//! access does not extend it. Expired entries are invisible and are swept
//! occasionally on load and periodically by a background task.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::extract::{FromRequestParts, Request, State};
use axum::http::header::VARY;
use axum::http::request::Parts;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::config::{self, SessionSettings};
use crate::db::LogOnError;
use crate::error::AppError;

#[derive(Debug, Error)]
pub enum SessionError {
  /// A thread panicked while holding the session store lock.
  #[error("session store unavailable")]
  Unavailable,

  #[error("session value codec error: {0}")]
  Codec(#[from] serde_json::Error),

  /// The handler ran outside `load_and_save`.
  #[error("no session loaded for this request")]
  NotLoaded,
}

pub type SessionResult<T> = std::result::Result<T, SessionError>;

/// Cookie and lifetime policy.
#[derive(Debug, Clone)]
pub struct SessionConfig {
  pub lifetime: Duration,
  pub cookie_name: String,
  /// Send Max-Age so the cookie survives a browser restart.
  pub persist: bool,
  pub same_site: SameSite,
  pub secure: bool,
  pub http_only: bool,
}

impl Default for SessionConfig {
  fn default() -> Self {
    Self {
      lifetime: Duration::hours(24),
      cookie_name: "session".to_string(),
      persist: true,
      same_site: SameSite::Lax,
      secure: true,
      http_only: true,
    }
  }
}

impl From<&SessionSettings> for SessionConfig {
  fn from(settings: &SessionSettings) -> Self {
    Self {
      lifetime: Duration::try_hours(
        settings
          .lifetime_hours
          .clamp(1, config::MAX_SESSION_LIFETIME_HOURS),
      )
      .unwrap_or_else(|| Duration::hours(config::DEFAULT_SESSION_LIFETIME_HOURS)),
      cookie_name: settings.cookie_name.clone(),
      secure: settings.secure,
      ..Self::default()
    }
  }
}

struct SessionEntry {
  values: HashMap<String, Value>,
  created_at: DateTime<Utc>,
  last_access: DateTime<Utc>,
  expires_at: DateTime<Utc>,
}

impl SessionEntry {
  fn new(lifetime: Duration) -> Self {
    let now = Utc::now();
    Self {
      values: HashMap::new(),
      created_at: now,
      last_access: now,
      // Saturate rather than overflow on absurd lifetimes
      expires_at: now
        .checked_add_signed(lifetime)
        .unwrap_or(DateTime::<Utc>::MAX_UTC),
    }
  }

  fn is_live(&self, now: DateTime<Utc>) -> bool {
    self.expires_at > now
  }
}

struct ManagerInner {
  config: SessionConfig,
  entries: Mutex<HashMap<String, SessionEntry>>,
}

/// Shared handle to the session store. Cheap to clone.
#[derive(Clone)]
pub struct SessionManager {
  inner: Arc<ManagerInner>,
}

impl SessionManager {
  pub fn new(config: SessionConfig) -> Self {
    Self {
      inner: Arc::new(ManagerInner {
        config,
        entries: Mutex::new(HashMap::new()),
      }),
    }
  }

  pub fn config(&self) -> &SessionConfig {
    &self.inner.config
  }

  fn entries(&self) -> SessionResult<MutexGuard<'_, HashMap<String, SessionEntry>>> {
    self.inner.entries.lock().map_err(|_| {
      tracing::error!("Session store mutex poisoned");
      SessionError::Unavailable
    })
  }

  /// Resolve a request's token to a session handle.
  ///
  /// A missing, unknown or expired token yields a fresh handle with a newly
  /// generated token; the client-supplied value is never adopted. Nothing is
  /// stored until the first write.
  pub fn load(&self, token: Option<&str>) -> Session {
    if let Some(token) = token.filter(|t| !t.is_empty()) {
      match self.entries() {
        Ok(mut entries) => {
          // Clean up expired sessions occasionally (~10% chance)
          if rand::random::<u8>() < config::SESSION_CLEANUP_THRESHOLD {
            sweep(&mut entries, Utc::now());
          }

          let now = Utc::now();
          match entries.get_mut(token) {
            Some(entry) if entry.is_live(now) => {
              entry.last_access = now;
              return Session::new(self.clone(), token.to_string());
            }
            Some(_) => {
              entries.remove(token);
            }
            None => {}
          }
        }
        Err(e) => tracing::warn!("Loading session failed, starting fresh: {}", e),
      }
    }

    Session::new(self.clone(), generate_session_id())
  }

  /// Drop every expired session, returning how many were removed.
  pub fn delete_expired(&self) -> SessionResult<usize> {
    let mut entries = self.entries()?;
    Ok(sweep(&mut entries, Utc::now()))
  }

  /// Number of live sessions.
  pub fn len(&self) -> SessionResult<usize> {
    let now = Utc::now();
    Ok(self.entries()?.values().filter(|e| e.is_live(now)).count())
  }

  pub fn is_empty(&self) -> SessionResult<bool> {
    Ok(self.len()? == 0)
  }

  /// Periodically remove expired sessions until the runtime shuts down.
  pub fn spawn_cleanup(&self, period: std::time::Duration) -> tokio::task::JoinHandle<()> {
    let manager = self.clone();
    tokio::spawn(async move {
      let mut ticker = tokio::time::interval(period);
      loop {
        ticker.tick().await;
        if let Some(removed) = manager.delete_expired().log_warn("Session cleanup failed") {
          if removed > 0 {
            tracing::debug!("Removed {} expired sessions", removed);
          }
        }
      }
    })
  }

  /// Cookie carrying `token` until `expires_at`.
  pub fn cookie(&self, token: String, expires_at: DateTime<Utc>) -> Cookie<'static> {
    let config = self.config();
    let mut builder = Cookie::build((config.cookie_name.clone(), token))
      .path("/")
      .http_only(config.http_only)
      .secure(config.secure)
      .same_site(config.same_site);

    if config.persist {
      let remaining = (expires_at - Utc::now()).num_seconds().max(0);
      builder = builder.max_age(time::Duration::seconds(remaining));
    }

    builder.build()
  }

  fn removal_cookie(&self) -> Cookie<'static> {
    Cookie::build((self.config().cookie_name.clone(), ""))
      .path("/")
      .build()
  }
}

fn sweep(entries: &mut HashMap<String, SessionEntry>, now: DateTime<Utc>) -> usize {
  let before = entries.len();
  entries.retain(|_, entry| entry.is_live(now));
  before - entries.len()
}

fn fresh_token(entries: &HashMap<String, SessionEntry>) -> String {
  let mut token = generate_session_id();
  while entries.contains_key(&token) {
    token = generate_session_id();
  }
  token
}

/// Generate a new session token: 32 random bytes, hex encoded.
pub fn generate_session_id() -> String {
  let bytes: [u8; 32] = rand::random();
  hex::encode(bytes)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
  Unmodified,
  Modified,
  Destroyed,
}

struct HandleState {
  token: String,
  status: SessionStatus,
}

/// Request-scoped view of one session.
///
/// Every read and write goes straight to the shared store, so two requests
/// carrying the same token see each other's writes key by key.
#[derive(Clone)]
pub struct Session {
  manager: SessionManager,
  state: Arc<Mutex<HandleState>>,
}

impl Session {
  fn new(manager: SessionManager, token: String) -> Self {
    Self {
      manager,
      state: Arc::new(Mutex::new(HandleState {
        token,
        status: SessionStatus::Unmodified,
      })),
    }
  }

  fn state(&self) -> SessionResult<MutexGuard<'_, HandleState>> {
    self.state.lock().map_err(|_| SessionError::Unavailable)
  }

  pub fn token(&self) -> SessionResult<String> {
    Ok(self.state()?.token.clone())
  }

  pub fn status(&self) -> SessionResult<SessionStatus> {
    Ok(self.state()?.status)
  }

  /// Expiry of the stored session, if it has been stored and is still live.
  pub fn expires_at(&self) -> SessionResult<Option<DateTime<Utc>>> {
    let state = self.state()?;
    let entries = self.manager.entries()?;
    let now = Utc::now();
    Ok(entries
      .get(&state.token)
      .filter(|e| e.is_live(now))
      .map(|e| e.expires_at))
  }

  pub fn get_value(&self, key: &str) -> SessionResult<Option<Value>> {
    let state = self.state()?;
    let entries = self.manager.entries()?;
    let now = Utc::now();
    Ok(entries
      .get(&state.token)
      .filter(|e| e.is_live(now))
      .and_then(|e| e.values.get(key).cloned()))
  }

  pub fn get<T: DeserializeOwned>(&self, key: &str) -> SessionResult<Option<T>> {
    match self.get_value(key)? {
      Some(value) => Ok(Some(serde_json::from_value(value)?)),
      None => Ok(None),
    }
  }

  /// The string under `key`, or an empty string when absent or not a string.
  pub fn get_string(&self, key: &str) -> SessionResult<String> {
    Ok(match self.get_value(key)? {
      Some(Value::String(s)) => s,
      _ => String::new(),
    })
  }

  pub fn exists(&self, key: &str) -> SessionResult<bool> {
    Ok(self.get_value(key)?.is_some())
  }

  /// Store `value` under `key`, creating the session on first write.
  pub fn put<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> SessionResult<()> {
    let value = serde_json::to_value(value)?;
    let mut state = self.state()?;
    let mut entries = self.manager.entries()?;
    let now = Utc::now();
    let lifetime = self.manager.config().lifetime;

    // Expired since load: never revive the old token
    if entries.get(&state.token).is_some_and(|e| !e.is_live(now)) {
      entries.remove(&state.token);
      state.token = fresh_token(&entries);
    }

    let entry = entries
      .entry(state.token.clone())
      .or_insert_with(|| SessionEntry::new(lifetime));
    entry.values.insert(key.to_string(), value);
    entry.last_access = now;
    state.status = SessionStatus::Modified;
    Ok(())
  }

  /// Remove `key` and return its value.
  pub fn pop(&self, key: &str) -> SessionResult<Option<Value>> {
    let mut state = self.state()?;
    let mut entries = self.manager.entries()?;
    let now = Utc::now();

    let popped = entries
      .get_mut(&state.token)
      .filter(|e| e.is_live(now))
      .and_then(|e| e.values.remove(key));
    if popped.is_some() {
      state.status = SessionStatus::Modified;
    }
    Ok(popped)
  }

  /// Get-then-delete for one-shot messages. Empty string when absent.
  pub fn pop_string(&self, key: &str) -> SessionResult<String> {
    Ok(match self.pop(key)? {
      Some(Value::String(s)) => s,
      _ => String::new(),
    })
  }

  pub fn remove(&self, key: &str) -> SessionResult<()> {
    self.pop(key).map(|_| ())
  }

  /// Move the session's values under a fresh token and forget the old one.
  ///
  /// The renewed session gets a full lifetime from now.
  pub fn renew_token(&self) -> SessionResult<()> {
    let mut state = self.state()?;
    let mut entries = self.manager.entries()?;
    let now = Utc::now();
    let lifetime = self.manager.config().lifetime;

    let values = entries
      .remove(&state.token)
      .filter(|e| e.is_live(now))
      .map(|e| e.values)
      .unwrap_or_default();

    let token = fresh_token(&entries);

    let mut entry = SessionEntry::new(lifetime);
    entry.values = values;
    entries.insert(token.clone(), entry);

    state.token = token;
    state.status = SessionStatus::Modified;
    Ok(())
  }

  /// Delete the session. Later writes through this handle start a new
  /// session under a new token.
  pub fn destroy(&self) -> SessionResult<()> {
    let mut state = self.state()?;
    let mut entries = self.manager.entries()?;
    entries.remove(&state.token);
    state.token = generate_session_id();
    state.status = SessionStatus::Destroyed;
    Ok(())
  }

  pub fn created_at(&self) -> SessionResult<Option<DateTime<Utc>>> {
    let state = self.state()?;
    let entries = self.manager.entries()?;
    Ok(entries.get(&state.token).map(|e| e.created_at))
  }

  pub fn last_access(&self) -> SessionResult<Option<DateTime<Utc>>> {
    let state = self.state()?;
    let entries = self.manager.entries()?;
    Ok(entries.get(&state.token).map(|e| e.last_access))
  }
}

impl<S: Send + Sync> FromRequestParts<S> for Session {
  type Rejection = AppError;

  async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
    parts
      .extensions
      .get::<Session>()
      .cloned()
      .ok_or(AppError::Session(SessionError::NotLoaded))
  }
}

/// Middleware: load the session named by the request cookie, hand it to the
/// rest of the stack and write the cookie back if the session changed.
pub async fn load_and_save(
  State(manager): State<SessionManager>,
  jar: CookieJar,
  mut request: Request,
  next: Next,
) -> Response {
  let token = jar.get(&manager.config().cookie_name).map(|c| c.value().to_string());
  let session = manager.load(token.as_deref());
  request.extensions_mut().insert(session.clone());

  let mut response = next.run(request).await;
  response.headers_mut().append(VARY, HeaderValue::from_static("Cookie"));

  let jar = match commit_cookie(&manager, &session, jar) {
    Ok(jar) => jar,
    Err(e) => return AppError::Session(e).into_response(),
  };

  (jar, response).into_response()
}

fn commit_cookie(
  manager: &SessionManager,
  session: &Session,
  jar: CookieJar,
) -> SessionResult<CookieJar> {
  Ok(match session.status()? {
    SessionStatus::Unmodified => jar,
    SessionStatus::Destroyed => jar.remove(manager.removal_cookie()),
    SessionStatus::Modified => match session.expires_at()? {
      Some(expires_at) => jar.add(manager.cookie(session.token()?, expires_at)),
      // Modified and then emptied by expiry: nothing left to point at.
      None => jar.remove(manager.removal_cookie()),
    },
  })
}
