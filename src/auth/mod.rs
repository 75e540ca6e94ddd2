//! Login, logout and the session-based route gate.

pub mod handlers;
pub mod middleware;
pub mod password;

pub use handlers::{authenticate, login, logout};
pub use middleware::{add_client_ip, require_auth, ClientIp};

/// Session key holding the authenticated `User`
pub const AUTH_USER_KEY: &str = "user";

/// One-shot error message shown on the next page render
pub const ERROR_KEY: &str = "error";

/// One-shot success message shown on the next page render
pub const FLASH_KEY: &str = "flash";

/// Where anonymous visitors are sent (the landing page carries the login form)
pub const LOGIN_PATH: &str = "/";

pub const PROFILE_PATH: &str = "/user/profile";
