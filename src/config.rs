//! Application configuration.
//!
//! Values are resolved with priority: config.toml > environment (.env is
//! loaded first) > built-in defaults.

use serde::Deserialize;
use std::path::{Path, PathBuf};

// ==================== Defaults ====================

/// Server address to bind to
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8081";

/// Users database file
pub const DEFAULT_DATABASE_PATH: &str = "data/users.db";

/// Fixed session lifetime from creation
pub const DEFAULT_SESSION_LIFETIME_HOURS: i64 = 24;

/// Longest accepted session lifetime (one year)
pub const MAX_SESSION_LIFETIME_HOURS: i64 = 24 * 365;

pub const DEFAULT_SESSION_COOKIE_NAME: &str = "session";

/// Probability threshold for session cleanup on load (0-255, lower = rarer).
/// 25 means ~10% (25/256) of loads sweep expired sessions.
pub const SESSION_CLEANUP_THRESHOLD: u8 = 25;

/// Interval of the background expired-session sweep
pub const SESSION_CLEANUP_INTERVAL_SECS: u64 = 300;

// ==================== config.toml ====================

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    server: Option<ServerSection>,
    database: Option<DatabaseSection>,
    session: Option<SessionSection>,
    seed: Option<SeedSection>,
}

#[derive(Debug, Deserialize)]
struct ServerSection {
    addr: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DatabaseSection {
    path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SessionSection {
    lifetime_hours: Option<i64>,
    cookie_name: Option<String>,
    secure: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct SeedSection {
    admin: Option<bool>,
}

// ==================== Resolved configuration ====================

#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub lifetime_hours: i64,
    pub cookie_name: String,
    pub secure: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub bind_addr: String,
    pub database_path: PathBuf,
    pub session: SessionSettings,
    /// Create the admin account when the users table is empty
    pub seed_admin: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            session: SessionSettings {
                lifetime_hours: DEFAULT_SESSION_LIFETIME_HOURS,
                cookie_name: DEFAULT_SESSION_COOKIE_NAME.to_string(),
                secure: true,
            },
            seed_admin: true,
        }
    }
}

impl Config {
    /// Load from `config.toml` in the working directory and the process
    /// environment.
    pub fn load() -> Self {
        // Load .env file if present
        let _ = dotenvy::dotenv();

        let file = read_file_config(Path::new("config.toml"));
        Self::resolve(file, |key| std::env::var(key).ok())
    }

    fn resolve(file: FileConfig, env: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = env("BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Some(path) = env("DATABASE_PATH") {
            config.database_path = PathBuf::from(path);
        }
        if let Some(hours) = env("SESSION_LIFETIME_HOURS").and_then(|v| v.parse().ok()) {
            config.session.lifetime_hours = hours;
        }
        if let Some(secure) = env("SESSION_COOKIE_SECURE").and_then(|v| parse_bool(&v)) {
            config.session.secure = secure;
        }
        if let Some(seed) = env("SEED_ADMIN").and_then(|v| parse_bool(&v)) {
            config.seed_admin = seed;
        }

        // config.toml wins over the environment
        if let Some(addr) = file.server.and_then(|s| s.addr) {
            config.bind_addr = addr;
        }
        if let Some(path) = file.database.and_then(|d| d.path) {
            config.database_path = PathBuf::from(path);
        }
        if let Some(session) = file.session {
            if let Some(hours) = session.lifetime_hours {
                config.session.lifetime_hours = hours;
            }
            if let Some(name) = session.cookie_name {
                config.session.cookie_name = name;
            }
            if let Some(secure) = session.secure {
                config.session.secure = secure;
            }
        }
        if let Some(seed) = file.seed.and_then(|s| s.admin) {
            config.seed_admin = seed;
        }

        if !(1..=MAX_SESSION_LIFETIME_HOURS).contains(&config.session.lifetime_hours) {
            tracing::warn!(
                "Session lifetime of {} hours is outside 1..={}, using {}",
                config.session.lifetime_hours,
                MAX_SESSION_LIFETIME_HOURS,
                DEFAULT_SESSION_LIFETIME_HOURS
            );
            config.session.lifetime_hours = DEFAULT_SESSION_LIFETIME_HOURS;
        }

        config
    }
}

fn read_file_config(path: &Path) -> FileConfig {
    let Ok(contents) = std::fs::read_to_string(path) else {
        return FileConfig::default();
    };

    match toml::from_str::<FileConfig>(&contents) {
        Ok(config) => {
            tracing::info!("Using configuration from {}", path.display());
            config
        }
        Err(e) => {
            tracing::warn!("Ignoring unreadable {}: {}", path.display(), e);
            FileConfig::default()
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
